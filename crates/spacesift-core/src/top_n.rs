//! Bounded tracker that keeps only the largest items of a stream.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::entry::Measured;

/// Most slots reserved up front; the heap grows past this on demand.
const PREALLOCATE_LIMIT: usize = 1024;

/// Heap slot ordered by size alone.
#[derive(Debug)]
struct BySize<T>(T);

impl<T: Measured> PartialEq for BySize<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0.size() == other.0.size()
    }
}

impl<T: Measured> Eq for BySize<T> {}

impl<T: Measured> PartialOrd for BySize<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Measured> Ord for BySize<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.size().cmp(&other.0.size())
    }
}

/// Retains the `capacity` largest items pushed into it.
///
/// Backed by a min-heap whose root is the smallest retained item, so each
/// push costs O(log K) and memory stays O(K) no matter how many items the
/// stream produces.
#[derive(Debug)]
pub struct BoundedTopN<T: Measured> {
    heap: BinaryHeap<Reverse<BySize<T>>>,
    capacity: usize,
}

impl<T: Measured> BoundedTopN<T> {
    /// Create a tracker retaining at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity.min(PREALLOCATE_LIMIT)),
            capacity,
        }
    }

    /// Offer an item. Returns `true` if it was retained.
    pub fn push(&mut self, item: T) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(BySize(item)));
            return true;
        }
        match self.heap.peek() {
            Some(Reverse(min)) if item.size() > min.0.size() => {
                self.heap.pop();
                self.heap.push(Reverse(BySize(item)));
                true
            }
            _ => false,
        }
    }

    /// Smallest retained item.
    pub fn peek_min(&self) -> Option<&T> {
        self.heap.peek().map(|Reverse(slot)| &slot.0)
    }

    /// Number of retained items.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Check if nothing has been retained.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Maximum number of retained items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drain into a vector sorted by size, largest first.
    pub fn into_sorted_desc(mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.heap.len());
        // Pops come out smallest first.
        while let Some(Reverse(slot)) = self.heap.pop() {
            out.push(slot.0);
        }
        out.reverse();
        out
    }
}

impl<T: Measured> Extend<T> for BoundedTopN<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}
