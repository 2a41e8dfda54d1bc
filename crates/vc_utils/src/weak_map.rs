use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::fmt::{self, Debug};

use hashbrown::hash_map::Entry;

use crate::hash::HashMap;

// -----------------------------------------------------------------------------
// WeakKeyMap

const MIN_PRUNE_THRESHOLD: usize = 16;

struct Slot<K: ?Sized, V> {
    key: Weak<K>,
    value: V,
}

/// A map keyed by the *identity* of an [`Arc`], holding only a [`Weak`] to it.
///
/// Entries whose key has been dropped are invisible to lookups and are pruned
/// lazily: on [`insert`](Self::insert) and
/// [`get_or_insert_with`](Self::get_or_insert_with) once the table grows past a
/// threshold, or explicitly through [`prune`](Self::prune).
///
/// An allocation address can be reused after its `Arc` dies. A slot only
/// matches while its weak key is still alive, and an insert at a reused
/// address replaces the dead slot.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use vc_utils::WeakKeyMap;
///
/// let key = Arc::new(5_u32);
/// let mut map = WeakKeyMap::new();
/// map.insert(&key, "five");
/// assert_eq!(map.get(&key), Some(&"five"));
///
/// drop(key);
/// assert_eq!(map.prune(), 1);
/// assert!(map.is_empty());
/// ```
pub struct WeakKeyMap<K: ?Sized, V> {
    slots: HashMap<usize, Slot<K, V>>,
    prune_at: usize,
}

#[inline]
fn addr_of<K: ?Sized>(key: &Arc<K>) -> usize {
    Arc::as_ptr(key).cast::<()>() as usize
}

impl<K: ?Sized, V> WeakKeyMap<K, V> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self {
            slots: HashMap::default(),
            prune_at: MIN_PRUNE_THRESHOLD,
        }
    }

    /// Returns the value associated with the live `key`.
    pub fn get(&self, key: &Arc<K>) -> Option<&V> {
        match self.slots.get(&addr_of(key)) {
            Some(slot) if slot.key.strong_count() > 0 => Some(&slot.value),
            _ => None,
        }
    }

    /// Returns a mutable reference to the value associated with the live `key`.
    pub fn get_mut(&mut self, key: &Arc<K>) -> Option<&mut V> {
        match self.slots.get_mut(&addr_of(key)) {
            Some(slot) if slot.key.strong_count() > 0 => Some(&mut slot.value),
            _ => None,
        }
    }

    /// Returns `true` if the live `key` has an entry.
    #[inline]
    pub fn contains_key(&self, key: &Arc<K>) -> bool {
        self.get(key).is_some()
    }

    /// Inserts a value for `key`, returning the previous value of a live entry.
    pub fn insert(&mut self, key: &Arc<K>, value: V) -> Option<V> {
        self.prune_if_full();
        let slot = Slot {
            key: Arc::downgrade(key),
            value,
        };
        match self.slots.insert(addr_of(key), slot) {
            Some(old) if old.key.strong_count() > 0 => Some(old.value),
            _ => None,
        }
    }

    /// Returns the value for `key`, inserting `f()` first if absent or dead.
    pub fn get_or_insert_with(&mut self, key: &Arc<K>, f: impl FnOnce() -> V) -> &mut V {
        if !self.contains_key(key) {
            self.prune_if_full();
        }
        let fresh = |value| Slot {
            key: Arc::downgrade(key),
            value,
        };
        let slot = match self.slots.entry(addr_of(key)) {
            Entry::Occupied(mut entry) => {
                if entry.get().key.strong_count() == 0 {
                    entry.insert(fresh(f()));
                }
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(fresh(f())),
        };
        &mut slot.value
    }

    /// Removes the entry for `key`, returning its value.
    pub fn remove(&mut self, key: &Arc<K>) -> Option<V> {
        match self.slots.remove(&addr_of(key)) {
            Some(slot) if slot.key.strong_count() > 0 => Some(slot.value),
            _ => None,
        }
    }

    /// Drops every entry whose key is no longer alive.
    ///
    /// Returns the number of removed entries.
    pub fn prune(&mut self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.key.strong_count() > 0);
        before - self.slots.len()
    }

    /// Keeps the live entries for which `f` returns `true`.
    ///
    /// Dead entries are dropped without calling `f`.
    pub fn retain(&mut self, mut f: impl FnMut(&Arc<K>, &mut V) -> bool) {
        self.slots.retain(|_, slot| match slot.key.upgrade() {
            Some(key) => f(&key, &mut slot.value),
            None => false,
        });
    }

    fn prune_if_full(&mut self) {
        if self.slots.len() >= self.prune_at {
            self.prune();
            self.prune_at = usize::max(self.slots.len() * 2, MIN_PRUNE_THRESHOLD);
        }
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Returns the number of stored entries, including not yet pruned dead ones.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if nothing is stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Collects the live entries as strong keys with value references.
    pub fn live(&self) -> Vec<(Arc<K>, &V)> {
        self.slots
            .values()
            .filter_map(|slot| slot.key.upgrade().map(|key| (key, &slot.value)))
            .collect()
    }

    /// Iterates over the values of live entries.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.slots
            .values_mut()
            .filter(|slot| slot.key.strong_count() > 0)
            .map(|slot| &mut slot.value)
    }
}

impl<K: ?Sized, V> Default for WeakKeyMap<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ?Sized, V: Debug> Debug for WeakKeyMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.slots
                    .values()
                    .filter(|slot| slot.key.strong_count() > 0)
                    .map(|slot| &slot.value),
            )
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;
    use core::fmt::Debug;

    use super::WeakKeyMap;

    #[test]
    fn identity_not_equality() {
        let a = Arc::new(1_i32);
        let b = Arc::new(1_i32);
        let mut map = WeakKeyMap::new();
        map.insert(&a, 'a');
        assert_eq!(map.get(&a), Some(&'a'));
        assert_eq!(map.get(&b), None);
    }

    #[test]
    fn unsized_keys() {
        let a: Arc<dyn Debug + Send + Sync> = Arc::new("a");
        let mut map = WeakKeyMap::new();
        assert_eq!(map.insert(&a, 1), None);
        assert_eq!(map.insert(&a, 2), Some(1));
        *map.get_or_insert_with(&a, || 0) += 1;
        assert_eq!(map.get(&a), Some(&3));
        assert_eq!(map.remove(&a), Some(3));
        assert!(map.is_empty());
    }

    #[test]
    fn retain_skips_dead_keys() {
        let even = Arc::new(2_u32);
        let odd = Arc::new(3_u32);
        let mut map = WeakKeyMap::new();
        map.insert(&even, "even");
        map.insert(&odd, "odd");
        {
            let dead = Arc::new(4_u32);
            map.insert(&dead, "dead");
        }

        let mut seen = 0;
        map.retain(|key, _| {
            seen += 1;
            **key % 2 == 0
        });
        assert_eq!(seen, 2);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&even), Some(&"even"));
    }

    #[test]
    fn dead_keys_are_hidden_and_pruned() {
        let mut map = WeakKeyMap::new();
        let keep = Arc::new(0_u8);
        map.insert(&keep, 0);
        for i in 0..40 {
            let tmp = Arc::new(i as u8);
            map.insert(&tmp, i);
        }
        assert!(map.len() < 41);
        assert_eq!(map.live().len(), 1);

        for i in 0..40 {
            let tmp = Arc::new(i as u8);
            *map.get_or_insert_with(&tmp, || 0) += i;
        }
        assert!(map.len() < 41);
        map.prune();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&keep), Some(&0));
    }
}
