//! # Deferred Delete Queue
//!
//! Holds watched entries whose file vanished, each paired with a one-shot
//! re-check timer. Timers are scheduled on a [`DelayQueue`] and never block
//! the event loop.
//!
//! A firing timer is not tied to the entry it was scheduled for: every
//! firing takes the oldest waiting entry. With a constant delay the two
//! orders coincide.

use crate::types::WatchedFileInfo;
use futures::StreamExt;
use std::collections::VecDeque;
use std::time::Duration;
use tokio_util::time::DelayQueue;

pub struct DeferredDeleteQueue {
    entries: VecDeque<WatchedFileInfo>,
    timers: DelayQueue<()>,
}

impl DeferredDeleteQueue {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            timers: DelayQueue::new(),
        }
    }

    /// Queue `info` and schedule one re-check `delay` from now.
    ///
    /// Must be called from within a tokio runtime.
    pub fn enqueue(&mut self, info: WatchedFileInfo, delay: Duration) {
        self.entries.push_back(info);
        self.timers.insert((), delay);
    }

    /// Whether `(repo_id, path_in_repo)` is waiting for a re-check.
    pub fn contains(&self, repo_id: &str, path_in_repo: &str) -> bool {
        self.entries
            .iter()
            .any(|info| info.mirrors(repo_id, path_in_repo))
    }

    pub fn pop_oldest(&mut self) -> Option<WatchedFileInfo> {
        self.entries.pop_front()
    }

    /// Wait for the next re-check timer.
    ///
    /// Resolves to `None` immediately when no timer is scheduled; guard with
    /// [`has_pending_timers`](Self::has_pending_timers) inside `select!`.
    pub async fn next_due(&mut self) -> Option<()> {
        self.timers.next().await.map(|expired| expired.into_inner())
    }

    pub fn has_pending_timers(&self) -> bool {
        !self.timers.is_empty()
    }

    /// Number of entries waiting for a re-check.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DeferredDeleteQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DeferredDeleteQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredDeleteQueue")
            .field("entries", &self.entries.len())
            .field("timers", &self.timers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::AccountId;
    use tokio::time::Instant;

    fn info(path: &str) -> WatchedFileInfo {
        WatchedFileInfo::new(AccountId::new("alice"), "repo-1", path)
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let mut queue = DeferredDeleteQueue::new();
        queue.enqueue(info("/a.txt"), Duration::from_secs(5));
        queue.enqueue(info("/b.txt"), Duration::from_secs(5));

        assert!(queue.contains("repo-1", "/a.txt"));
        assert!(!queue.contains("repo-2", "/a.txt"));
        assert_eq!(queue.pop_oldest().unwrap().path_in_repo, "/a.txt");
        assert_eq!(queue.pop_oldest().unwrap().path_in_repo, "/b.txt");
        assert!(queue.pop_oldest().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let mut queue = DeferredDeleteQueue::new();
        let started = Instant::now();
        queue.enqueue(info("/a.txt"), Duration::from_millis(5000));

        assert!(queue.has_pending_timers());
        assert_eq!(queue.next_due().await, Some(()));
        assert!(started.elapsed() >= Duration::from_millis(5000));
        assert!(!queue.has_pending_timers());
        // The entry stays queued until it is popped.
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_next_due_without_timers() {
        let mut queue = DeferredDeleteQueue::new();
        assert!(!queue.has_pending_timers());
        assert_eq!(queue.next_due().await, None);
    }
}
