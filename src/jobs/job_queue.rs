//! `JobQueue` (spec §4.H): an in-memory FIFO of `(job_id, user_id)`.
//! `add_job` is non-blocking for producers; `dequeue` blocks until an item is
//! available or the queue is shut down.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Notify};

pub struct JobQueue {
    items: Mutex<VecDeque<(String, String)>>,
    notify: Notify,
    shutting_down: AtomicBool,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Enqueues `(job_id, user_id)`; the start-order guarantee for the
    /// worker. Non-blocking for producers.
    pub async fn add_job(&self, job_id: impl Into<String>, user_id: impl Into<String>) {
        self.items.lock().await.push_back((job_id.into(), user_id.into()));
        self.notify.notify_one();
    }

    /// Blocks until an item is ready, or returns `None` if shutdown was
    /// signaled and the queue is empty.
    pub async fn dequeue(&self) -> Option<(String, String)> {
        loop {
            {
                let mut items = self.items.lock().await;
                if let Some(item) = items.pop_front() {
                    return Some(item);
                }
                if self.shutting_down.load(Ordering::SeqCst) {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    pub async fn length(&self) -> usize {
        self.items.lock().await.len()
    }

    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Test hook (per the design notes' "global singletons get a reset()").
    pub async fn reset(&self) {
        self.items.lock().await.clear();
        self.shutting_down.store(false, Ordering::SeqCst);
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn fifo_order_is_preserved() {
        let queue = JobQueue::new();
        queue.add_job("j1", "u1").await;
        queue.add_job("j2", "u1").await;

        assert_eq!(queue.dequeue().await, Some(("j1".to_string(), "u1".to_string())));
        assert_eq!(queue.dequeue().await, Some(("j2".to_string(), "u1".to_string())));
    }

    #[tokio::test]
    async fn dequeue_blocks_until_item_arrives() {
        let queue = Arc::new(JobQueue::new());
        let queue2 = queue.clone();
        let handle = tokio::spawn(async move { queue2.dequeue().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.add_job("late", "u1").await;

        let item = handle.await.unwrap();
        assert_eq!(item, Some(("late".to_string(), "u1".to_string())));
    }

    #[tokio::test]
    async fn shutdown_unblocks_dequeue_with_none() {
        let queue = Arc::new(JobQueue::new());
        let queue2 = queue.clone();
        let handle = tokio::spawn(async move { queue2.dequeue().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.shutdown();

        assert_eq!(handle.await.unwrap(), None);
    }

    #[tokio::test]
    async fn length_reflects_pending_items() {
        let queue = JobQueue::new();
        assert_eq!(queue.length().await, 0);
        queue.add_job("j1", "u1").await;
        assert_eq!(queue.length().await, 1);
    }
}
