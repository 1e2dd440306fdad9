//! Single-owner arena for [`Item`]s. The [`Index`](crate::cache::Index) and the
//! [`ExpirationHeap`](crate::heap::ExpirationHeap) both address items through the `usize`
//! handles this type hands out, rather than holding a pointer or reference to the item
//! itself.

use crate::item::Item;

pub(crate) struct Slab<V> {
    slots: Vec<Option<Item<V>>>,
    free: Vec<usize>,
}

impl<V> Slab<V> {
    pub(crate) fn new() -> Self {
        Slab {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, item: Item<V>) -> usize {
        if let Some(idx) = self.free.pop() {
            self.slots[idx] = Some(item);
            idx
        } else {
            self.slots.push(Some(item));
            self.slots.len() - 1
        }
    }

    pub(crate) fn remove(&mut self, idx: usize) -> Item<V> {
        let item = self.slots[idx]
            .take()
            .expect("slab handle must reference a live slot");
        self.free.push(idx);
        item
    }

    pub(crate) fn get(&self, idx: usize) -> &Item<V> {
        self.slots[idx]
            .as_ref()
            .expect("slab handle must reference a live slot")
    }

    pub(crate) fn get_mut(&mut self, idx: usize) -> &mut Item<V> {
        self.slots[idx]
            .as_mut()
            .expect("slab handle must reference a live slot")
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn insert_get_remove_reuses_slots() {
        let mut slab = Slab::new();
        let a = slab.insert(Item::new("a".into(), 1, Duration::ZERO, None));
        let b = slab.insert(Item::new("b".into(), 2, Duration::ZERO, None));
        assert_eq!(slab.get(a).value, 1);
        assert_eq!(slab.get(b).value, 2);

        let removed = slab.remove(a);
        assert_eq!(removed.value, 1);

        let c = slab.insert(Item::new("c".into(), 3, Duration::ZERO, None));
        assert_eq!(c, a, "freed slot should be reused");
        assert_eq!(slab.get(c).value, 3);
        assert_eq!(slab.get(b).value, 2);
    }
}
