//! Thread-safe FIFO queue that drops its oldest entries past a limit.
//!
//! Eviction happens inside [`BoundedQueue::enqueue`], so a read that follows
//! an enqueue never observes more than `limit` entries.

use parking_lot::Mutex;
use std::collections::VecDeque;

/// FIFO queue evicting the oldest entries once it grows over its limit.
///
/// # Examples
///
/// ```
/// use courier_core::collections::BoundedQueue;
///
/// let queue = BoundedQueue::new(2);
/// queue.enqueue("a");
/// queue.enqueue("b");
/// queue.enqueue("c");
///
/// assert_eq!(queue.dequeue(), Some("b"));
/// assert_eq!(queue.dequeue(), Some("c"));
/// assert_eq!(queue.dequeue(), None);
/// ```
#[derive(Debug)]
pub struct BoundedQueue<T> {
    limit: usize,
    items: Mutex<VecDeque<T>>,
}

impl<T> BoundedQueue<T> {
    /// Create a queue retaining at most `limit` entries.
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            items: Mutex::new(VecDeque::with_capacity(limit)),
        }
    }

    /// Append an entry and evict the oldest ones above the limit.
    ///
    /// Returns the number of evicted entries.
    pub fn enqueue(&self, item: T) -> usize {
        let mut items = self.items.lock();
        items.push_back(item);

        let mut evicted = 0;
        while items.len() > self.limit {
            items.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Remove and return the oldest entry.
    pub fn dequeue(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Number of entries currently queued.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Maximum number of retained entries.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.items.lock().clear();
    }
}

impl<T: Clone> BoundedQueue<T> {
    /// Copy of the queued entries, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.items.lock().iter().cloned().collect()
    }
}
