//! Fixed-capacity ring buffer.
//!
//! Once the buffer is full every new item overwrites the oldest one, so it
//! always holds the most recent `capacity` items. Iteration is oldest first.
//!
//! The buffer is not synchronized; wrap it in a lock when sharing it between
//! tasks.
//!
//! ## Example
//!
//! ```rust
//! use courier_core::collections::RingBuffer;
//!
//! let mut buffer = RingBuffer::new(3);
//! for i in 1..=5 {
//!     buffer.push(i);
//! }
//!
//! assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
//! assert_eq!(buffer.count(|x| *x > 3), 2);
//! ```

use std::fmt;

/// Items beyond this count are summarised instead of listed by `Display`.
const DISPLAY_LIMIT: usize = 100;

/// Buffer holding a fixed number of items, overwriting the oldest when full.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: Vec<T>,
    capacity: usize,
    /// Position of the oldest item once the buffer is full.
    head: usize,
}

impl<T> RingBuffer<T> {
    /// Create an empty buffer with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Ring buffer capacity must be greater than 0");

        Self {
            items: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    /// Add an item, overwriting the oldest one if the buffer is full.
    pub fn push(&mut self, item: T) {
        if self.items.len() < self.capacity {
            self.items.push(item);
        } else {
            self.items[self.head] = item;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    /// Iterate over held items, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let (newer, older) = self.items.split_at(self.head);
        older.iter().chain(newer.iter())
    }

    /// First held item (oldest first) matching the predicate.
    pub fn find_first<P>(&self, mut predicate: P) -> Option<&T>
    where
        P: FnMut(&T) -> bool,
    {
        self.iter().find(|item| predicate(item))
    }

    /// All held items matching the predicate, oldest first.
    pub fn find<P>(&self, mut predicate: P) -> Vec<&T>
    where
        P: FnMut(&T) -> bool,
    {
        self.iter().filter(|item| predicate(item)).collect()
    }

    /// Number of held items matching the predicate.
    pub fn count<P>(&self, mut predicate: P) -> usize
    where
        P: FnMut(&T) -> bool,
    {
        self.iter().filter(|item| predicate(item)).count()
    }

    /// Number of items currently held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no item has been added yet.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the buffer has reached its capacity.
    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    /// Maximum number of items held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: PartialEq> RingBuffer<T> {
    /// Whether the buffer holds an item equal to `item`.
    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }
}

impl<T: fmt::Display> fmt::Display for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RingBuffer ")?;

        if self.is_empty() {
            return write!(f, "empty");
        }
        if self.len() > DISPLAY_LIMIT {
            return write!(f, "{} long", self.len());
        }

        write!(f, "[")?;
        for (i, item) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", item)?;
        }
        write!(f, "]")
    }
}

impl<'a, T> IntoIterator for &'a RingBuffer<T> {
    type Item = &'a T;
    type IntoIter = Box<dyn Iterator<Item = &'a T> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_buffer() {
        let buffer: RingBuffer<i32> = RingBuffer::new(4);

        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
        assert_eq!(buffer.iter().count(), 0);
        assert_eq!(buffer.count(|_| true), 0);
        assert!(buffer.find_first(|_| true).is_none());
        assert_eq!(buffer.to_string(), "RingBuffer empty");
    }

    #[test]
    fn test_partially_filled() {
        let mut buffer = RingBuffer::new(4);
        buffer.push(1);
        buffer.push(2);

        assert!(!buffer.is_full());
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(buffer.to_string(), "RingBuffer [1, 2]");
    }

    #[test]
    fn test_overwrites_oldest() {
        let mut buffer = RingBuffer::new(3);
        for i in 1..=7 {
            buffer.push(i);
        }

        assert!(buffer.is_full());
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![5, 6, 7]);
        assert!(buffer.contains(&6));
        assert!(!buffer.contains(&4));
    }

    #[test]
    fn test_predicate_queries() {
        let mut buffer = RingBuffer::new(5);
        for i in 0..8 {
            buffer.push(i);
        }

        assert_eq!(buffer.find_first(|x| x % 2 == 0), Some(&4));
        assert_eq!(buffer.find(|x| *x > 5), vec![&6, &7]);
        assert_eq!(buffer.count(|x| *x >= 3), 5);
    }

    #[test]
    fn test_display_summarises_long_buffers() {
        let mut buffer = RingBuffer::new(150);
        for i in 0..150 {
            buffer.push(i);
        }

        assert_eq!(buffer.to_string(), "RingBuffer 150 long");
    }

    #[test]
    #[should_panic(expected = "capacity must be greater than 0")]
    fn test_zero_capacity_panics() {
        let _ = RingBuffer::<u8>::new(0);
    }

    proptest! {
        #[test]
        fn prop_holds_last_items_in_order(
            items in proptest::collection::vec(any::<i64>(), 0..200),
            capacity in 1usize..32,
        ) {
            let mut buffer = RingBuffer::new(capacity);
            for item in &items {
                buffer.push(*item);
            }

            let skip = items.len().saturating_sub(capacity);
            let expected: Vec<i64> = items[skip..].to_vec();
            let held: Vec<i64> = buffer.iter().copied().collect();

            prop_assert_eq!(buffer.len(), items.len().min(capacity));
            prop_assert_eq!(held, expected);
        }
    }
}
