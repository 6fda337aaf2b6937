//! Work queue for files awaiting triage.
//!
//! Items are keyed by file path and ordered by priority (higher first),
//! then by enqueue order. The handle is cheaply cloneable (inner `Arc`);
//! all access is serialized through a `Mutex`, which keeps a UI-facing
//! statistics poller and the orchestration loop from racing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a queued item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Skipped,
}

impl ItemStatus {
    /// Completed, Failed and Skipped are terminal; a path holding one of
    /// these may be enqueued again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStatus::Pending => write!(f, "pending"),
            ItemStatus::Processing => write!(f, "processing"),
            ItemStatus::Completed => write!(f, "completed"),
            ItemStatus::Failed => write!(f, "failed"),
            ItemStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// One file queued for processing.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub file_path: PathBuf,
    pub status: ItemStatus,
    pub priority: i32,
    pub enqueued_at: DateTime<Utc>,
    /// Monotonic sequence number used to break priority ties in FIFO order.
    seq: u64,
}

/// Per-status counts plus total, serializable for UI pollers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatistics {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total: usize,
}

#[derive(Default)]
struct QueueInner {
    items: HashMap<PathBuf, WorkItem>,
    next_seq: u64,
}

/// Ordered collection of work items with status and priority.
#[derive(Clone, Default)]
pub struct WorkQueue {
    inner: Arc<Mutex<QueueInner>>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a Pending item for `file_path` unless the path is already
    /// present with a non-terminal status. Re-enqueueing a path in a
    /// terminal status resets it to Pending. Returns true if the queue
    /// changed.
    pub fn enqueue<P: AsRef<Path>>(&self, file_path: P, priority: i32) -> bool {
        let path = file_path.as_ref().to_path_buf();
        let mut inner = self.inner.lock().expect("queue lock poisoned");

        if let Some(existing) = inner.items.get(&path) {
            if !existing.status.is_terminal() {
                debug!("Ignoring enqueue of already-queued {}", path.display());
                return false;
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.items.insert(
            path.clone(),
            WorkItem {
                file_path: path,
                status: ItemStatus::Pending,
                priority,
                enqueued_at: Utc::now(),
                seq,
            },
        );
        true
    }

    /// Returns the highest-priority Pending item (ties broken by enqueue
    /// order), or None. Does not mutate status — the caller marks
    /// Processing only once it commits to working the item.
    pub fn next_pending(&self) -> Option<WorkItem> {
        let inner = self.inner.lock().expect("queue lock poisoned");
        inner
            .items
            .values()
            .filter(|item| item.status == ItemStatus::Pending)
            .min_by_key(|item| (std::cmp::Reverse(item.priority), item.seq))
            .cloned()
    }

    /// Transitions an item's status. An unknown path logs and no-ops.
    pub fn update_status<P: AsRef<Path>>(&self, file_path: P, status: ItemStatus) {
        let path = file_path.as_ref();
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        match inner.items.get_mut(path) {
            Some(item) => {
                debug!(
                    "Queue item {} transitioning {} -> {}",
                    path.display(),
                    item.status,
                    status
                );
                item.status = status;
            }
            None => {
                warn!(
                    "Status update for unknown queue item {} ignored",
                    path.display()
                );
            }
        }
    }

    /// Returns the current status of a path, if queued.
    pub fn status_of<P: AsRef<Path>>(&self, file_path: P) -> Option<ItemStatus> {
        let inner = self.inner.lock().expect("queue lock poisoned");
        inner.items.get(file_path.as_ref()).map(|item| item.status)
    }

    /// Counts per status plus total.
    pub fn statistics(&self) -> QueueStatistics {
        let inner = self.inner.lock().expect("queue lock poisoned");
        let mut stats = QueueStatistics::default();
        for item in inner.items.values() {
            match item.status {
                ItemStatus::Pending => stats.pending += 1,
                ItemStatus::Processing => stats.processing += 1,
                ItemStatus::Completed => stats.completed += 1,
                ItemStatus::Failed => stats.failed += 1,
                ItemStatus::Skipped => stats.skipped += 1,
            }
        }
        stats.total = inner.items.len();
        stats
    }

    /// True iff any Pending item exists.
    pub fn has_items(&self) -> bool {
        let inner = self.inner.lock().expect("queue lock poisoned");
        inner
            .items
            .values()
            .any(|item| item.status == ItemStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_and_next_pending() {
        let queue = WorkQueue::new();
        assert!(queue.enqueue("/docs/a.pdf", 0));
        assert!(queue.has_items());

        let next = queue.next_pending().unwrap();
        assert_eq!(next.file_path, PathBuf::from("/docs/a.pdf"));
        assert_eq!(next.status, ItemStatus::Pending);
        // next_pending does not mutate.
        assert_eq!(queue.status_of("/docs/a.pdf"), Some(ItemStatus::Pending));
    }

    #[test]
    fn test_duplicate_enqueue_is_noop() {
        let queue = WorkQueue::new();
        assert!(queue.enqueue("/docs/a.pdf", 0));
        assert!(!queue.enqueue("/docs/a.pdf", 5));

        let stats = queue.statistics();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.pending, 1);
        // Original priority preserved.
        assert_eq!(queue.next_pending().unwrap().priority, 0);
    }

    #[test]
    fn test_enqueue_after_terminal_status_resets() {
        let queue = WorkQueue::new();
        queue.enqueue("/docs/a.pdf", 0);
        queue.update_status("/docs/a.pdf", ItemStatus::Failed);

        assert!(queue.enqueue("/docs/a.pdf", 0));
        assert_eq!(queue.status_of("/docs/a.pdf"), Some(ItemStatus::Pending));
        assert_eq!(queue.statistics().total, 1);
    }

    #[test]
    fn test_priority_order_with_fifo_ties() {
        let queue = WorkQueue::new();
        queue.enqueue("/docs/low.pdf", 0);
        queue.enqueue("/docs/high.pdf", 10);
        queue.enqueue("/docs/also-low.pdf", 0);

        let first = queue.next_pending().unwrap();
        assert_eq!(first.file_path, PathBuf::from("/docs/high.pdf"));
        queue.update_status(&first.file_path, ItemStatus::Completed);

        // Equal priorities drain in enqueue order.
        let second = queue.next_pending().unwrap();
        assert_eq!(second.file_path, PathBuf::from("/docs/low.pdf"));
        queue.update_status(&second.file_path, ItemStatus::Completed);

        let third = queue.next_pending().unwrap();
        assert_eq!(third.file_path, PathBuf::from("/docs/also-low.pdf"));
    }

    #[test]
    fn test_update_status_unknown_path_is_noop() {
        let queue = WorkQueue::new();
        queue.update_status("/docs/ghost.pdf", ItemStatus::Completed);
        assert_eq!(queue.statistics().total, 0);
    }

    #[test]
    fn test_statistics_counts() {
        let queue = WorkQueue::new();
        queue.enqueue("/a", 0);
        queue.enqueue("/b", 0);
        queue.enqueue("/c", 0);
        queue.enqueue("/d", 0);
        queue.update_status("/a", ItemStatus::Completed);
        queue.update_status("/b", ItemStatus::Failed);
        queue.update_status("/c", ItemStatus::Skipped);

        let stats = queue.statistics();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.processing, 0);
        assert_eq!(stats.total, 4);
    }

    #[test]
    fn test_total_counts_distinct_paths() {
        let queue = WorkQueue::new();
        for _ in 0..3 {
            queue.enqueue("/same.pdf", 0);
        }
        queue.enqueue("/other.pdf", 0);
        assert_eq!(queue.statistics().total, 2);
    }

    #[test]
    fn test_has_items_false_when_all_terminal() {
        let queue = WorkQueue::new();
        queue.enqueue("/a", 0);
        assert!(queue.has_items());
        queue.update_status("/a", ItemStatus::Completed);
        assert!(!queue.has_items());
    }

    #[test]
    fn test_clone_shares_state() {
        let queue = WorkQueue::new();
        let other = queue.clone();
        queue.enqueue("/a", 0);
        assert!(other.has_items());
        other.update_status("/a", ItemStatus::Processing);
        assert_eq!(queue.status_of("/a"), Some(ItemStatus::Processing));
    }
}
