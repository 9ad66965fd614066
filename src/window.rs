use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Bounded min-heap used by the resequencer to absorb local disorder.
///
/// The window never grows past the capacity it was created with, except
/// for the instant inside [`Window::push_then_pop_min`] where the incoming
/// item and the current minimum are compared.
#[derive(Debug)]
pub struct Window<T> {
    heap: BinaryHeap<Reverse<T>>,
    capacity: usize,
}

impl<T: Ord> Window<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Fill the window from `items`, stopping at capacity. Heapify happens
    /// once at the end.
    pub fn fill(&mut self, items: Vec<T>) {
        debug_assert!(self.heap.len() + items.len() <= self.capacity);
        let mut existing = std::mem::take(&mut self.heap).into_vec();
        existing.extend(items.into_iter().map(Reverse));
        self.heap = BinaryHeap::from(existing);
    }

    /// Insert `item` and remove the smallest element of the window plus
    /// `item`, in one step.
    ///
    /// If `item` is not larger than the current minimum it is handed straight
    /// back. Otherwise it replaces the minimum in place and `PeekMut` sifts it
    /// down when dropped. For a binary heap this is the same as a push
    /// followed by a pop, without growing the backing storage.
    pub fn push_then_pop_min(&mut self, item: T) -> T {
        match self.heap.peek_mut() {
            Some(mut top) if top.0 < item => std::mem::replace(&mut top.0, item),
            _ => item,
        }
    }

    pub fn pop_min(&mut self) -> Option<T> {
        self.heap.pop().map(|Reverse(item)| item)
    }

    pub fn peek_min(&self) -> Option<&T> {
        self.heap.peek().map(|Reverse(item)| item)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
