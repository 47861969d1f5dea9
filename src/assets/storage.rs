use std::collections::BTreeMap;
use crate::assets::handle::AssetHandle;

/// Owns assets of one kind and hands out stable handles to them.
/// Handles are never reused, even after `clear`.
pub struct AssetStorage<T> {
    entries: BTreeMap<AssetHandle<T>, T>,
    next_index: u32,
}

impl<T> Default for AssetStorage<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_index: 0,
        }
    }
}

impl<T> AssetStorage<T> {
    pub fn add(&mut self, asset: T) -> AssetHandle<T> {
        let handle = AssetHandle::new(self.next_index);
        self.next_index += 1;
        self.entries.insert(handle, asset);
        handle
    }

    pub fn get(&self, handle: AssetHandle<T>) -> Option<&T> {
        self.entries.get(&handle)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterates in handle order
    pub fn iter(&self) -> impl Iterator<Item = (AssetHandle<T>, &T)> {
        self.entries.iter().map(|(handle, asset)| (*handle, asset))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_returns_incrementing_handles() {
        let mut storage = AssetStorage::default();
        let a = storage.add("a");
        let b = storage.add("b");

        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(storage.get(b), Some(&"b"));
        assert_eq!(storage.len(), 2);
    }

    #[test]
    fn cleared_handles_are_not_reused() {
        let mut storage = AssetStorage::default();
        let a = storage.add(1);
        storage.add(2);

        storage.clear();
        assert!(storage.is_empty());
        assert!(storage.get(a).is_none());
        assert_eq!(storage.add(3).index(), 2);
    }

    #[test]
    fn iteration_follows_handle_order() {
        let mut storage = AssetStorage::default();
        for i in 0..3 {
            storage.add(i * 10);
        }

        let seen: Vec<_> = storage.iter().map(|(h, v)| (h.index(), *v)).collect();
        assert_eq!(seen, vec![(0, 0), (1, 10), (2, 20)]);
    }
}
