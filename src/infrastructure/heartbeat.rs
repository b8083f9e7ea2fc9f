use crate::client::ConnectionState;
use crate::types::DEFAULT_HEARTBEAT_INTERVAL;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

/// Heartbeat bookkeeping shared between the heartbeat task (which sends)
/// and the reader (which receives acks).
#[derive(Debug, Clone)]
pub struct HeartbeatTimer {
    interval: Duration,
    last_sent_at: Option<Instant>,
    ack_pending: bool,
    latency: Option<Duration>,
}

/// What a timer tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Beat,
    Zombied,
}

/// Requests the heartbeat task makes of the connection driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatSignal {
    /// Write a heartbeat frame now
    Beat,
    /// The previous beat was never acknowledged
    Zombied,
}

impl HeartbeatTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent_at: None,
            ack_pending: false,
            latency: None,
        }
    }

    /// Starts over with a new interval; latency from the old connection is kept
    pub fn reset(&mut self, interval: Duration) {
        self.interval = interval;
        self.last_sent_at = None;
        self.ack_pending = false;
    }

    pub fn on_tick(&mut self, now: Instant) -> Tick {
        if self.ack_pending {
            return Tick::Zombied;
        }
        self.ack_pending = true;
        self.last_sent_at = Some(now);
        Tick::Beat
    }

    /// Clears the pending beat and returns the round trip, if one was in flight
    pub fn acknowledge(&mut self, now: Instant) -> Option<Duration> {
        let rtt = match (self.ack_pending, self.last_sent_at) {
            (true, Some(sent)) => Some(now.saturating_duration_since(sent)),
            _ => None,
        };
        self.ack_pending = false;
        if rtt.is_some() {
            self.latency = rtt;
        }
        rtt
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn ack_pending(&self) -> bool {
        self.ack_pending
    }

    pub fn last_sent_at(&self) -> Option<Instant> {
        self.last_sent_at
    }

    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }
}

impl Default for HeartbeatTimer {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL))
    }
}

pub struct HeartbeatMonitor {
    interval: Duration,
    timer: Arc<Mutex<HeartbeatTimer>>,
    state: watch::Receiver<ConnectionState>,
    signals: mpsc::UnboundedSender<HeartbeatSignal>,
}

impl HeartbeatMonitor {
    pub fn new(
        timer: Arc<Mutex<HeartbeatTimer>>,
        state: watch::Receiver<ConnectionState>,
        signals: mpsc::UnboundedSender<HeartbeatSignal>,
    ) -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL),
            timer,
            state,
            signals,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Resets the shared timer and spawns the heartbeat task.
    ///
    /// The first beat fires after a random fraction of the interval, then
    /// once per interval. Ticks are skipped while the connection is not
    /// `Connected`. The task ends after signalling `Zombied` once, or when
    /// the driver stops listening.
    pub async fn start(self) -> JoinHandle<()> {
        self.timer.lock().await.reset(self.interval);

        tokio::spawn(async move {
            let first = self.interval.mul_f64(rand::rng().random_range(0.0..1.0));
            let mut ticker = time::interval_at(Instant::now() + first, self.interval);
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                if *self.state.borrow() != ConnectionState::Connected {
                    continue;
                }

                let tick = self.timer.lock().await.on_tick(Instant::now());
                match tick {
                    Tick::Zombied => {
                        tracing::warn!("Heartbeat was not acknowledged, connection is zombied");
                        let _ = self.signals.send(HeartbeatSignal::Zombied);
                        break;
                    }
                    Tick::Beat => {
                        if self.signals.send(HeartbeatSignal::Beat).is_err() {
                            break;
                        }
                        tracing::trace!("Heartbeat due");
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(
        interval_ms: u64,
        state: ConnectionState,
    ) -> (
        HeartbeatMonitor,
        Arc<Mutex<HeartbeatTimer>>,
        watch::Sender<ConnectionState>,
        mpsc::UnboundedReceiver<HeartbeatSignal>,
    ) {
        let timer = Arc::new(Mutex::new(HeartbeatTimer::default()));
        let (state_tx, state_rx) = watch::channel(state);
        let (tx, rx) = mpsc::unbounded_channel();
        let monitor = HeartbeatMonitor::new(Arc::clone(&timer), state_rx, tx)
            .with_interval(Duration::from_millis(interval_ms));
        (monitor, timer, state_tx, rx)
    }

    #[test]
    fn test_timer_beats_then_zombies_without_ack() {
        let mut timer = HeartbeatTimer::new(Duration::from_secs(1));
        let now = Instant::now();
        assert_eq!(timer.on_tick(now), Tick::Beat);
        assert!(timer.ack_pending());
        assert_eq!(timer.last_sent_at(), Some(now));
        assert_eq!(timer.on_tick(now), Tick::Zombied);
    }

    #[test]
    fn test_timer_ack_clears_pending_and_measures_latency() {
        let mut timer = HeartbeatTimer::new(Duration::from_secs(1));
        let sent = Instant::now();
        timer.on_tick(sent);
        let rtt = timer.acknowledge(sent + Duration::from_millis(40));
        assert_eq!(rtt, Some(Duration::from_millis(40)));
        assert!(!timer.ack_pending());
        assert_eq!(timer.latency(), Some(Duration::from_millis(40)));
        assert_eq!(timer.on_tick(sent), Tick::Beat);
    }

    #[test]
    fn test_unsolicited_ack_keeps_latency() {
        let mut timer = HeartbeatTimer::new(Duration::from_secs(1));
        assert_eq!(timer.acknowledge(Instant::now()), None);
        assert_eq!(timer.latency(), None);
    }

    #[test]
    fn test_reset_clears_pending() {
        let mut timer = HeartbeatTimer::new(Duration::from_secs(1));
        timer.on_tick(Instant::now());
        timer.reset(Duration::from_secs(5));
        assert!(!timer.ack_pending());
        assert_eq!(timer.last_sent_at(), None);
        assert_eq!(timer.interval(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acknowledged_beats_keep_connection_alive() {
        let (monitor, timer, _state, mut rx) = monitor(1_000, ConnectionState::Connected);
        let handle = monitor.start().await;

        for _ in 0..5 {
            assert_eq!(rx.recv().await, Some(HeartbeatSignal::Beat));
            timer.lock().await.acknowledge(Instant::now());
        }

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_missed_ack_signals_zombied_exactly_once() {
        let (monitor, _timer, _state, mut rx) = monitor(1_000, ConnectionState::Connected);
        let handle = monitor.start().await;

        assert_eq!(rx.recv().await, Some(HeartbeatSignal::Beat));
        assert_eq!(rx.recv().await, Some(HeartbeatSignal::Zombied));
        handle.await.unwrap();
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_beats_while_not_connected() {
        let (monitor, timer, _state, mut rx) = monitor(1_000, ConnectionState::Resuming);
        let handle = monitor.start().await;

        time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
        assert!(!timer.lock().await.ack_pending());

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_beat_within_one_interval() {
        let (monitor, _timer, _state, mut rx) = monitor(1_000, ConnectionState::Connected);
        let started = Instant::now();
        let handle = monitor.start().await;

        assert_eq!(rx.recv().await, Some(HeartbeatSignal::Beat));
        assert!(started.elapsed() <= Duration::from_millis(1_000));

        handle.abort();
    }
}
