// Bounded display buffer
//
// Holds the most recent admitted items, newest first. Order is arrival order;
// nothing here looks at timestamps.

use std::collections::VecDeque;

use crate::error::{FeedError, Result};

/// Fixed-capacity, most-recent-first buffer
#[derive(Debug, Clone)]
pub struct BoundedBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> BoundedBuffer<T> {
    /// Create a buffer holding at most `capacity` items.
    ///
    /// A zero capacity is a setup mistake and is rejected.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(FeedError::config("buffer capacity must be at least 1"));
        }
        Ok(Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Insert at the front, evicting from the back once full.
    ///
    /// Returns the evicted item, if any.
    pub fn admit(&mut self, item: T) -> Option<T> {
        self.items.push_front(item);
        if self.items.len() > self.capacity {
            self.items.pop_back()
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Copy of the current contents, newest first
    pub fn snapshot(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }

    /// One display page (zero-based) of the current contents
    pub fn page(&self, index: usize, size: usize) -> Vec<T> {
        if size == 0 {
            return Vec::new();
        }
        self.items
            .iter()
            .skip(index.saturating_mul(size))
            .take(size)
            .cloned()
            .collect()
    }

    /// Number of display pages of the given size
    pub fn page_count(&self, size: usize) -> usize {
        if size == 0 {
            return 0;
        }
        self.items.len().div_ceil(size)
    }

    /// Most recently admitted item still held
    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
