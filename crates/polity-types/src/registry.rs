//! Bounded, id-ordered registries.
//!
//! Every registry in the kernel follows one ownership model: it is
//! created with a fixed capacity, it exclusively owns its entries, it
//! keeps them strictly ascending by their natural 64-bit key, and it
//! refuses insertions beyond capacity without mutating anything.
//! Iteration order is therefore identical across runs regardless of
//! insertion order differences in keys -- the sole source of cross-run
//! reproducibility.
//!
//! Cross-registry references are by id only. Lookups return borrows
//! scoped to the registry; callers re-look-up after mutating.

use serde::{Deserialize, Serialize};

/// An entry with a natural 64-bit registry key.
pub trait Keyed {
    /// The natural key this entry is ordered by.
    fn key(&self) -> u64;
}

/// Why a registry mutation was rejected. The registry is unchanged in
/// every error case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The registry is full.
    #[error("registry capacity {capacity} exhausted")]
    CapacityExhausted {
        /// The fixed capacity given at init.
        capacity: usize,
    },

    /// An entry with this key already exists.
    #[error("duplicate registry key {key}")]
    DuplicateKey {
        /// The offending key.
        key: u64,
    },

    /// No entry with this key exists.
    #[error("registry key {key} not found")]
    AbsentKey {
        /// The missing key.
        key: u64,
    },

    /// The zero key means "absent" and cannot name an entry.
    #[error("the zero key is reserved for \"absent\"")]
    ZeroKey,
}

/// A fixed-capacity collection ordered strictly ascending by entry key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedRegistry<T> {
    entries: Vec<T>,
    capacity: usize,
}

impl<T: Keyed> BoundedRegistry<T> {
    /// Create an empty registry that will hold at most `capacity`
    /// entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The fixed capacity given at init.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// The entries in ascending key order.
    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    /// Iterate entries in ascending key order.
    pub fn iter(&self) -> core::slice::Iter<'_, T> {
        self.entries.iter()
    }

    /// Iterate entries mutably in ascending key order. Callers must not
    /// change keys through this iterator.
    pub fn iter_mut(&mut self) -> core::slice::IterMut<'_, T> {
        self.entries.iter_mut()
    }

    /// Find an entry by key.
    pub fn find(&self, key: u64) -> Option<&T> {
        self.entries
            .binary_search_by_key(&key, Keyed::key)
            .ok()
            .and_then(|idx| self.entries.get(idx))
    }

    /// Find an entry mutably by key. The key itself must not be changed.
    pub fn find_mut(&mut self, key: u64) -> Option<&mut T> {
        match self.entries.binary_search_by_key(&key, Keyed::key) {
            Ok(idx) => self.entries.get_mut(idx),
            Err(_) => None,
        }
    }

    /// Insert a new entry at its sorted position.
    ///
    /// Refuses a zero key, a duplicate key, and insertion beyond
    /// capacity; the registry is untouched on refusal.
    pub fn insert(&mut self, entry: T) -> Result<(), RegistryError> {
        let key = entry.key();
        if key == 0 {
            return Err(RegistryError::ZeroKey);
        }
        if self.entries.len() >= self.capacity {
            return Err(RegistryError::CapacityExhausted {
                capacity: self.capacity,
            });
        }
        match self.entries.binary_search_by_key(&key, Keyed::key) {
            Ok(_) => Err(RegistryError::DuplicateKey { key }),
            Err(idx) => {
                self.entries.insert(idx, entry);
                Ok(())
            }
        }
    }

    /// Remove the entry with this key, keeping the remainder ordered.
    pub fn remove(&mut self, key: u64) -> Result<T, RegistryError> {
        match self.entries.binary_search_by_key(&key, Keyed::key) {
            Ok(idx) => Ok(self.entries.remove(idx)),
            Err(_) => Err(RegistryError::AbsentKey { key }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Rec {
        id: u64,
        payload: u32,
    }

    impl Keyed for Rec {
        fn key(&self) -> u64 {
            self.id
        }
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let mut a = BoundedRegistry::new(4);
        let mut b = BoundedRegistry::new(4);
        for id in [3u64, 1, 2] {
            a.insert(Rec { id, payload: 0 }).unwrap();
        }
        for id in [2u64, 3, 1] {
            b.insert(Rec { id, payload: 0 }).unwrap();
        }
        let keys_a: Vec<u64> = a.iter().map(|r| r.id).collect();
        let keys_b: Vec<u64> = b.iter().map(|r| r.id).collect();
        assert_eq!(keys_a, vec![1, 2, 3]);
        assert_eq!(keys_a, keys_b);
    }

    #[test]
    fn capacity_refusal_leaves_registry_unchanged() {
        let mut reg = BoundedRegistry::new(1);
        reg.insert(Rec { id: 1, payload: 9 }).unwrap();
        let err = reg.insert(Rec { id: 2, payload: 0 }).unwrap_err();
        assert_eq!(err, RegistryError::CapacityExhausted { capacity: 1 });
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.find(1).unwrap().payload, 9);
    }

    #[test]
    fn duplicate_and_zero_keys_are_refused() {
        let mut reg = BoundedRegistry::new(4);
        reg.insert(Rec { id: 5, payload: 0 }).unwrap();
        assert_eq!(
            reg.insert(Rec { id: 5, payload: 1 }).unwrap_err(),
            RegistryError::DuplicateKey { key: 5 }
        );
        assert_eq!(
            reg.insert(Rec { id: 0, payload: 1 }).unwrap_err(),
            RegistryError::ZeroKey
        );
    }

    #[test]
    fn remove_keeps_order() {
        let mut reg = BoundedRegistry::new(4);
        for id in [4u64, 2, 9] {
            reg.insert(Rec { id, payload: 0 }).unwrap();
        }
        reg.remove(4).unwrap();
        let keys: Vec<u64> = reg.iter().map(|r| r.id).collect();
        assert_eq!(keys, vec![2, 9]);
        assert!(reg.find(4).is_none());
    }
}
