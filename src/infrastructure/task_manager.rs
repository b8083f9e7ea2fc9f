use std::time::Duration;
use tokio::task::JoinHandle;

/// Manages background tasks with proper lifecycle handling
pub struct TaskManager {
    handles: Vec<JoinHandle<()>>,
}

impl TaskManager {
    /// Create a new empty task manager
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    /// Spawn a task and track it
    pub fn spawn<F>(&mut self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.handles.retain(|handle| !handle.is_finished());
        let handle = tokio::spawn(future);
        self.handles.push(handle);
    }

    /// Number of tracked tasks that have not finished yet
    pub fn active(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Waits up to `grace` for every task to finish, then aborts the rest.
    ///
    /// Returns how many tasks had to be aborted.
    pub async fn shutdown(mut self, grace: Duration) -> usize {
        let mut handles = std::mem::take(&mut self.handles);
        let deadline = tokio::time::Instant::now() + grace;

        for handle in handles.iter_mut() {
            if tokio::time::timeout_at(deadline, handle).await.is_err() {
                break;
            }
        }

        let mut aborted = 0;
        for handle in &handles {
            if !handle.is_finished() {
                handle.abort();
                aborted += 1;
            }
        }
        aborted
    }

    /// Abort all tasks without waiting
    pub fn abort_all(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
        self.handles.clear();
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        self.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_quick_tasks() {
        let done = Arc::new(AtomicBool::new(false));
        let mut tasks = TaskManager::new();
        let flag = Arc::clone(&done);
        tasks.spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            flag.store(true, Ordering::SeqCst);
        });

        let aborted = tasks.shutdown(Duration::from_secs(1)).await;
        assert_eq!(aborted, 0);
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_stuck_tasks_after_grace() {
        let mut tasks = TaskManager::new();
        tasks.spawn(std::future::pending());
        tasks.spawn(async {});

        let started = tokio::time::Instant::now();
        let aborted = tasks.shutdown(Duration::from_millis(250)).await;
        assert_eq!(aborted, 1);
        assert!(started.elapsed() >= Duration::from_millis(250));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_finished_tasks_are_pruned() {
        let mut tasks = TaskManager::new();
        tasks.spawn(async {});
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        tasks.spawn(std::future::pending());
        assert_eq!(tasks.active(), 1);
        tasks.abort_all();
    }
}
