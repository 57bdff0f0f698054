//! Fixed-capacity FIFO with random access.
//!
//! Pushing into a full buffer evicts the oldest element. Index 0 is always
//! the oldest retained element, `len() - 1` the newest.

use std::collections::VecDeque;

/// Bounded ring buffer backed by a `VecDeque`.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Creates an empty buffer holding at most `capacity` elements (minimum 1).
    ///
    /// Storage for the full capacity is reserved up front.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns the fixed capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of stored elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns true when the next push will evict.
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Appends `item` at the tail, returning the evicted head if the buffer was full.
    pub fn push_back(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Removes and returns the oldest element.
    pub fn pop_front(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Removes and returns the newest element.
    pub fn pop_back(&mut self) -> Option<T> {
        self.items.pop_back()
    }

    /// Returns the element at `index` (0 = oldest).
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Returns the newest element.
    pub fn back(&self) -> Option<&T> {
        self.items.back()
    }

    /// Returns the oldest element.
    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    /// Drops tail elements until at most `len` remain.
    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    /// Removes every element, keeping the capacity.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Iterates oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T> std::ops::Index<usize> for RingBuffer<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}
