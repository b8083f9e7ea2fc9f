use super::GatewayEvent;
use crate::infrastructure::TaskManager;
use crate::types::Diagnostic;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, broadcast, mpsc};
use tokio::task::{JoinError, JoinHandle};

/// What a handler returns; an `Err` is reported, never propagated.
pub type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Identifies one registration made through [`Dispatcher::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    event: GatewayEvent,
}

impl SubscriptionHandle {
    pub fn event(&self) -> &GatewayEvent {
        &self.event
    }
}

struct Binding {
    id: u64,
    sender: mpsc::UnboundedSender<Value>,
}

/// Routes dispatch payloads to the handlers registered for their event.
///
/// Every subscription gets its own queue and worker task. The worker runs
/// each invocation as a separate task and waits for it before taking the
/// next payload, so a handler sees events in wire order while a slow,
/// failing or panicking handler only ever holds up its own queue.
pub struct Dispatcher {
    bindings: RwLock<HashMap<GatewayEvent, Vec<Binding>>>,
    next_id: AtomicU64,
    workers: Mutex<TaskManager>,
    diagnostics: broadcast::Sender<Diagnostic>,
}

impl Dispatcher {
    pub fn new(diagnostics: broadcast::Sender<Diagnostic>) -> Self {
        Self {
            bindings: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            workers: Mutex::new(TaskManager::new()),
            diagnostics,
        }
    }

    /// Registers `handler` for `event`. Handlers for the same event run in
    /// registration order relative to nothing but themselves.
    pub async fn subscribe<F, Fut>(
        &self,
        event: impl Into<GatewayEvent>,
        handler: F,
    ) -> SubscriptionHandle
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let event = event.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handler: Handler = Arc::new(move |payload: Value| -> BoxFuture<'static, HandlerResult> {
            Box::pin(handler(payload))
        });
        let (sender, receiver) = mpsc::unbounded_channel();

        self.workers.lock().await.spawn(run_worker(
            event.clone(),
            handler,
            receiver,
            self.diagnostics.clone(),
        ));

        self.bindings
            .write()
            .await
            .entry(event.clone())
            .or_default()
            .push(Binding { id, sender });

        tracing::debug!("Registered handler {} for {}", id, event);
        SubscriptionHandle { id, event }
    }

    /// Removes a registration. Payloads already queued for it are still
    /// delivered. Returns `false` if the handle was already removed.
    pub async fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let mut bindings = self.bindings.write().await;
        let Some(list) = bindings.get_mut(&handle.event) else {
            return false;
        };

        let before = list.len();
        list.retain(|binding| binding.id != handle.id);
        let removed = list.len() != before;
        if list.is_empty() {
            bindings.remove(&handle.event);
        }

        if removed {
            tracing::debug!("Removed handler {} for {}", handle.id, handle.event);
        }
        removed
    }

    /// Queues `payload` for every handler of `event` and returns how many
    /// handlers it was queued for. Never waits on a handler.
    pub async fn dispatch(&self, event: &GatewayEvent, payload: Value) -> usize {
        // Snapshot the senders so registration changes never tear this loop.
        let senders: Vec<mpsc::UnboundedSender<Value>> = {
            let bindings = self.bindings.read().await;
            match bindings.get(event) {
                Some(list) => list.iter().map(|b| b.sender.clone()).collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for sender in senders {
            if sender.send(payload.clone()).is_ok() {
                delivered += 1;
            } else {
                tracing::debug!("Handler for {} is gone, skipping", event);
            }
        }
        delivered
    }

    /// Number of handlers currently registered for `event`
    pub async fn handler_count(&self, event: &GatewayEvent) -> usize {
        self.bindings
            .read()
            .await
            .get(event)
            .map_or(0, |list| list.len())
    }

    /// Drops every registration, lets workers drain for up to `grace`, then
    /// abandons whatever is still running.
    pub async fn shutdown(&self, grace: Duration) {
        self.bindings.write().await.clear();
        let workers = std::mem::take(&mut *self.workers.lock().await);

        let aborted = workers.shutdown(grace).await;
        if aborted > 0 {
            tracing::warn!(
                "Abandoned {} handler task(s) still running after {:?}",
                aborted,
                grace
            );
        }
    }
}

/// Aborts the wrapped invocation if the worker itself is aborted.
struct AbortOnDrop(JoinHandle<HandlerResult>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn run_worker(
    event: GatewayEvent,
    handler: Handler,
    mut receiver: mpsc::UnboundedReceiver<Value>,
    diagnostics: broadcast::Sender<Diagnostic>,
) {
    while let Some(payload) = receiver.recv().await {
        let mut invocation = AbortOnDrop(tokio::spawn(handler(payload)));

        let error = match (&mut invocation.0).await {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e.to_string(),
            Err(e) => panic_message(e),
        };

        tracing::error!("Error in handler for {}: {}", event, error);
        let _ = diagnostics.send(Diagnostic::HandlerFailed {
            event: event.to_string(),
            error,
        });
    }
}

fn panic_message(error: JoinError) -> String {
    match error.try_into_panic() {
        Ok(panic) => panic
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .map_or_else(
                || "handler panicked".to_string(),
                |msg| format!("handler panicked: {msg}"),
            ),
        Err(_) => "handler was cancelled".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::time::timeout;

    fn dispatcher() -> (Dispatcher, broadcast::Receiver<Diagnostic>) {
        let (tx, rx) = broadcast::channel(64);
        (Dispatcher::new(tx), rx)
    }

    fn recorder(
        tag: &'static str,
        out: mpsc::UnboundedSender<(&'static str, Value)>,
    ) -> impl Fn(Value) -> BoxFuture<'static, HandlerResult> + Send + Sync + 'static {
        move |payload| {
            let out = out.clone();
            Box::pin(async move {
                let _ = out.send((tag, payload));
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_every_handler_for_an_event_is_invoked() {
        let (dispatcher, _diag) = dispatcher();
        let (tx, mut rx) = mpsc::unbounded_channel();
        dispatcher.subscribe("PING", recorder("a", tx.clone())).await;
        dispatcher.subscribe("PING", recorder("b", tx)).await;

        let delivered = dispatcher
            .dispatch(&GatewayEvent::parse("PING"), json!({"n": 1}))
            .await;
        assert_eq!(delivered, 2);

        let mut seen = vec![rx.recv().await.unwrap(), rx.recv().await.unwrap()];
        seen.sort_by_key(|(tag, _)| *tag);
        assert_eq!(seen[0], ("a", json!({"n": 1})));
        assert_eq!(seen[1], ("b", json!({"n": 1})));
    }

    #[tokio::test]
    async fn test_handler_sees_events_in_wire_order() {
        let (dispatcher, _diag) = dispatcher();
        let (tx, mut rx) = mpsc::unbounded_channel();
        dispatcher
            .subscribe(GatewayEvent::MessageCreate, move |payload: Value| {
                let tx = tx.clone();
                async move {
                    // Later payloads finish faster; order must still hold.
                    let n = payload["n"].as_u64().unwrap_or(0);
                    tokio::time::sleep(Duration::from_millis(20 - n)).await;
                    let _ = tx.send(n);
                    HandlerResult::Ok(())
                }
            })
            .await;

        for n in 0..20 {
            dispatcher
                .dispatch(&GatewayEvent::MessageCreate, json!({"n": n}))
                .await;
        }

        for expected in 0..20 {
            assert_eq!(rx.recv().await, Some(expected));
        }
    }

    #[tokio::test]
    async fn test_unmatched_event_is_a_no_op() {
        let (dispatcher, _diag) = dispatcher();
        assert_eq!(
            dispatcher
                .dispatch(&GatewayEvent::parse("UNKNOWN_EVENT"), Value::Null)
                .await,
            0
        );
    }

    #[tokio::test]
    async fn test_panicking_handler_does_not_affect_sibling() {
        let (dispatcher, mut diag) = dispatcher();
        let (tx, mut rx) = mpsc::unbounded_channel();

        dispatcher
            .subscribe("X", |payload: Value| async move {
                if payload.is_number() {
                    panic!("boom");
                }
                HandlerResult::Ok(())
            })
            .await;
        dispatcher.subscribe("X", recorder("sibling", tx)).await;

        let event = GatewayEvent::parse("X");
        dispatcher.dispatch(&event, json!(1)).await;
        dispatcher.dispatch(&event, json!(2)).await;

        assert_eq!(rx.recv().await, Some(("sibling", json!(1))));
        assert_eq!(rx.recv().await, Some(("sibling", json!(2))));

        match diag.recv().await.unwrap() {
            Diagnostic::HandlerFailed { event, error } => {
                assert_eq!(event, "X");
                assert!(error.contains("boom"), "{error}");
            }
            other => panic!("unexpected diagnostic {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_handler_error_is_reported() {
        let (dispatcher, mut diag) = dispatcher();
        dispatcher
            .subscribe(GatewayEvent::GuildCreate, |_payload: Value| async move {
                HandlerResult::Err("guild cache full".into())
            })
            .await;

        dispatcher
            .dispatch(&GatewayEvent::GuildCreate, Value::Null)
            .await;

        assert_eq!(
            diag.recv().await.unwrap(),
            Diagnostic::HandlerFailed {
                event: "GUILD_CREATE".to_string(),
                error: "guild cache full".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_stuck_handler_does_not_block_dispatch() {
        let (dispatcher, _diag) = dispatcher();
        let (tx, mut rx) = mpsc::unbounded_channel();

        dispatcher
            .subscribe("SLOW", |_payload: Value| async move {
                std::future::pending::<()>().await;
                HandlerResult::Ok(())
            })
            .await;
        dispatcher.subscribe("SLOW", recorder("fast", tx)).await;

        let event = GatewayEvent::parse("SLOW");
        for n in 0..3 {
            let delivered = timeout(Duration::from_secs(1), dispatcher.dispatch(&event, json!(n)))
                .await
                .unwrap();
            assert_eq!(delivered, 2);
        }
        for n in 0..3 {
            assert_eq!(rx.recv().await, Some(("fast", json!(n))));
        }

        dispatcher.shutdown(Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let (dispatcher, _diag) = dispatcher();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = dispatcher.subscribe("PING", recorder("a", tx)).await;
        assert_eq!(handle.event(), &GatewayEvent::parse("PING"));

        assert!(dispatcher.unsubscribe(&handle).await);
        assert!(!dispatcher.unsubscribe(&handle).await);
        assert_eq!(dispatcher.handler_count(handle.event()).await, 0);

        assert_eq!(dispatcher.dispatch(handle.event(), Value::Null).await, 0);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_event_names_are_case_insensitive() {
        let (dispatcher, _diag) = dispatcher();
        let (tx, mut rx) = mpsc::unbounded_channel();
        dispatcher
            .subscribe("message_create", recorder("a", tx))
            .await;

        dispatcher
            .dispatch(&GatewayEvent::parse("MESSAGE_CREATE"), json!("hi"))
            .await;
        assert_eq!(rx.recv().await, Some(("a", json!("hi"))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_stuck_handlers_after_grace() {
        let (dispatcher, _diag) = dispatcher();
        dispatcher
            .subscribe("SLOW", |_payload: Value| async move {
                std::future::pending::<()>().await;
                HandlerResult::Ok(())
            })
            .await;
        dispatcher.dispatch(&GatewayEvent::parse("SLOW"), Value::Null).await;

        let started = tokio::time::Instant::now();
        dispatcher.shutdown(Duration::from_millis(500)).await;
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(
            dispatcher.handler_count(&GatewayEvent::parse("SLOW")).await,
            0
        );
    }
}
