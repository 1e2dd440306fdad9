//! Array-backed binary min-heap of live slab handles, ordered by each item's `expire_at`.
//!
//! Only items with `Some` expiration ever sit in this heap — a never-expiring item has no
//! deadline to track and is addressable solely through the [`Index`](crate::cache::Index).
//! Every handle in the heap keeps [`Item::heap_index`](crate::item::Item::heap_index) in sync
//! with its own array position, so [`ExpirationHeap::remove_at`] and
//! [`ExpirationHeap::update_at`] run in O(log n) instead of requiring a linear scan.

use crate::slab::Slab;
use std::time::Instant;

pub(crate) struct ExpirationHeap {
    handles: Vec<usize>,
}

impl ExpirationHeap {
    pub(crate) fn new() -> Self {
        ExpirationHeap {
            handles: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.handles.clear();
    }

    /// Earliest deadline currently tracked, if any.
    pub(crate) fn peek_deadline<V>(&self, slab: &Slab<V>) -> Option<Instant> {
        self.handles
            .first()
            .map(|&h| expire_at(slab, h).expect("heap entries always carry a deadline"))
    }

    pub(crate) fn peek_handle(&self) -> Option<usize> {
        self.handles.first().copied()
    }

    pub(crate) fn push<V>(&mut self, slab: &mut Slab<V>, handle: usize) {
        let pos = self.handles.len();
        self.handles.push(handle);
        slab.get_mut(handle).heap_index = Some(pos);
        self.sift_up(slab, pos);
    }

    /// Removes and returns the root handle (earliest deadline), if any.
    pub(crate) fn pop<V>(&mut self, slab: &mut Slab<V>) -> Option<usize> {
        if self.handles.is_empty() {
            return None;
        }
        let root = self.handles.swap_remove(0);
        slab.get_mut(root).heap_index = None;
        if !self.handles.is_empty() {
            slab.get_mut(self.handles[0]).heap_index = Some(0);
            self.sift_down(slab, 0);
        }
        Some(root)
    }

    /// Removes the handle currently sitting at heap position `pos`.
    pub(crate) fn remove_at<V>(&mut self, slab: &mut Slab<V>, pos: usize) {
        let last = self.handles.len() - 1;
        if pos != last {
            self.handles.swap(pos, last);
        }
        let removed = self.handles.pop().expect("pos must be a valid heap index");
        slab.get_mut(removed).heap_index = None;
        if pos < self.handles.len() {
            slab.get_mut(self.handles[pos]).heap_index = Some(pos);
            // the item swapped into `pos` can be smaller or larger than the one removed;
            // try both directions, only one will actually move anything.
            self.sift_up(slab, pos);
            self.sift_down(slab, pos);
        }
    }

    /// Re-positions the handle at `pos` after its `expire_at` changed in place.
    pub(crate) fn update_at<V>(&mut self, slab: &mut Slab<V>, pos: usize) {
        self.sift_up(slab, pos);
        self.sift_down(slab, pos);
    }

    fn sift_up<V>(&mut self, slab: &mut Slab<V>, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.less(slab, pos, parent) {
                self.swap(slab, pos, parent);
                pos = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down<V>(&mut self, slab: &mut Slab<V>, mut pos: usize) {
        let len = self.handles.len();
        loop {
            let left = 2 * pos + 1;
            let right = 2 * pos + 2;
            let mut smallest = pos;
            if left < len && self.less(slab, left, smallest) {
                smallest = left;
            }
            if right < len && self.less(slab, right, smallest) {
                smallest = right;
            }
            if smallest == pos {
                break;
            }
            self.swap(slab, pos, smallest);
            pos = smallest;
        }
    }

    fn less<V>(&self, slab: &Slab<V>, a: usize, b: usize) -> bool {
        expire_at(slab, self.handles[a]) < expire_at(slab, self.handles[b])
    }

    fn swap<V>(&mut self, slab: &mut Slab<V>, a: usize, b: usize) {
        self.handles.swap(a, b);
        slab.get_mut(self.handles[a]).heap_index = Some(a);
        slab.get_mut(self.handles[b]).heap_index = Some(b);
    }
}

fn expire_at<V>(slab: &Slab<V>, handle: usize) -> Option<Instant> {
    slab.get(handle).expire_at
}
