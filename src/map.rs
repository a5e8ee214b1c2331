use alloc::{boxed::Box, string::String};
use core::{
    borrow::Borrow,
    fmt::{self, LowerHex},
    marker::PhantomPinned,
    ptr::NonNull,
};

use cordyceps::Linked;

use crate::{Error, Links, RbTree, Style, TreeNode};

/// An ordered map based on a [red-black tree].
///
/// The map owns one node allocation per entry. Values are stored and handed back untouched, so a
/// caller that keeps ownership of its payloads can store references or indices as `V`.
///
/// [red-black tree]: https://en.wikipedia.org/wiki/Red%E2%80%93black_tree
pub struct RbMap<K: Ord + fmt::Debug, V> {
    tree: RbTree<MapNode<K, V>>,
}

struct MapNode<K, V> {
    links: Links<MapNode<K, V>>,
    key: K,
    value: V,
    _unpin: PhantomPinned,
}

unsafe impl<K, V> Linked<Links<MapNode<K, V>>> for MapNode<K, V> {
    type Handle = Box<Self>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<MapNode<K, V>>> {
        let ptr = ptr.as_ptr();
        unsafe { NonNull::new_unchecked(core::ptr::addr_of_mut!((*ptr).links)) }
    }
}

impl<K: Ord + fmt::Debug, V> TreeNode<Links<MapNode<K, V>>> for MapNode<K, V> {
    type Key = K;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

impl<K: Ord + fmt::Debug, V> RbMap<K, V> {
    /// Creates a new, empty `RbMap`.
    pub const fn new() -> Self {
        Self {
            tree: RbTree::new(),
        }
    }

    /// Returns `true` if the map contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of elements in the map.
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns the height high-water mark of the map. See [`RbTree::height`].
    pub const fn height(&self) -> usize {
        self.tree.height()
    }

    /// Returns the current height of the map. See [`RbTree::exact_height`].
    pub fn exact_height(&self) -> usize {
        self.tree.exact_height()
    }

    /// Inserts `value` under `key`.
    ///
    /// Fails with [`Error::DuplicateKey`] if `key` is already present; the existing value is kept
    /// and `value` is dropped.
    pub fn insert(&mut self, key: K, value: V) -> Result<(), Error> {
        let node = Box::new(MapNode {
            links: Links::new(),
            key,
            value,
            _unpin: PhantomPinned,
        });

        self.tree.insert(node).map_err(|_| Error::DuplicateKey)
    }

    /// Returns `true` if the map contains a value associated with `key`.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains_key(key)
    }

    /// Returns a reference to the value associated with `key`.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.get(key).map(|node| &node.get_ref().value)
    }

    /// Returns a mutable reference to the value associated with `key`.
    #[inline]
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        // SAFETY: Only the value is handed out; the key and links stay untouched.
        unsafe {
            self.tree
                .get_mut(key)
                // SAFETY: Pinning is not structural for `node.value`.
                .map(|node| &mut node.get_unchecked_mut().value)
        }
    }

    /// Returns the first key-value pair in the map.
    ///
    /// The returned key is the minimum key in the map.
    #[inline]
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.tree
            .first()
            .map(|node| (&node.get_ref().key, &node.get_ref().value))
    }

    /// Removes and returns the first key-value pair in the map.
    ///
    /// The returned key is the minimum key in the map.
    #[inline]
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        self.tree.pop_first().map(|node| {
            let MapNode { key, value, .. } = *node;
            (key, value)
        })
    }

    /// Returns the last key-value pair in the map.
    ///
    /// The returned key is the maximum key in the map.
    #[inline]
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.tree
            .last()
            .map(|node| (&node.get_ref().key, &node.get_ref().value))
    }

    /// Removes and returns the last key-value pair in the map.
    ///
    /// The returned key is the maximum key in the map.
    #[inline]
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        self.tree.pop_last().map(|node| {
            let MapNode { key, value, .. } = *node;
            (key, value)
        })
    }

    /// Removes the value associated with `key` from the map and returns it.
    ///
    /// Fails with [`Error::MissingKey`] if `key` is not present.
    #[inline]
    pub fn remove<Q>(&mut self, key: &Q) -> Result<V, Error>
    where
        K: Borrow<Q>,
        Q: Ord + fmt::Debug + ?Sized,
    {
        self.tree
            .remove(key)
            .map(|node| node.value)
            .ok_or(Error::MissingKey)
    }

    /// Removes the entry associated with `key`, passing its value to `f`.
    ///
    /// `f` runs once the entry is unlinked and before this call returns, so the caller can release
    /// whatever the value refers to.
    pub fn remove_with<Q, F>(&mut self, key: &Q, f: F) -> Result<(), Error>
    where
        K: Borrow<Q>,
        Q: Ord + fmt::Debug + ?Sized,
        F: FnOnce(V),
    {
        self.remove(key).map(f)
    }

    /// Returns an iterator over the entries of the map in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.tree.iter().map(|node| (&node.key, &node.value))
    }

    /// Clears the map, removing all elements.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Destroys the map, passing every entry to `f` exactly once in ascending key order.
    pub fn destroy<F>(mut self, mut f: F)
    where
        F: FnMut(K, V),
    {
        self.tree.clear_with(|node| {
            let MapNode { key, value, .. } = *node;
            f(key, value)
        });
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        self.tree.assert_invariants();
    }
}

impl<K: Ord + fmt::Debug + LowerHex, V> RbMap<K, V> {
    /// Returns the compact encoding of the map's tree shape. See [`Visual`](crate::Visual).
    pub fn construct_visual(&self) -> String {
        self.tree.construct_visual()
    }

    /// Returns the compact encoding of the map's tree shape without color markers.
    pub fn construct_shape(&self) -> String {
        use alloc::string::ToString;

        self.tree.visual_with(Style::Shape).to_string()
    }
}

impl<K: Ord + fmt::Debug, V> Default for RbMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + fmt::Debug, V: fmt::Debug> fmt::Debug for RbMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::{cell::Cell, prelude::v1::*, rc::Rc};

    use super::*;

    #[test]
    fn insert_then_get() {
        let mut map = RbMap::new();

        assert_eq!(map.get(&7u64), None);
        assert_eq!(map.insert(7u64, "seven"), Ok(()));
        assert_eq!(map.get(&7), Some(&"seven"));
        assert_eq!(map.len(), 1);
        assert!(!map.is_empty());
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut map = RbMap::new();

        assert_eq!(map.insert(1u32, 10), Ok(()));
        assert_eq!(map.insert(1, 20), Err(Error::DuplicateKey));

        assert_eq!(map.get(&1), Some(&10));
        assert_eq!(map.len(), 1);
        assert_eq!(map.construct_visual(), "1");
    }

    #[test]
    fn remove_missing_key() {
        let mut map: RbMap<u32, ()> = RbMap::new();
        assert_eq!(map.remove(&3), Err(Error::MissingKey));

        map.insert(1, ()).unwrap();
        map.insert(2, ()).unwrap();
        let before = map.construct_visual();

        assert_eq!(map.remove(&3), Err(Error::MissingKey));
        assert_eq!(map.construct_visual(), before);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn remove_with_passes_payload() {
        let mut map = RbMap::new();
        for key in 0u8..8 {
            map.insert(key, u32::from(key) * 100).unwrap();
        }

        let mut released = Vec::new();
        assert_eq!(map.remove_with(&3, |v| released.push(v)), Ok(()));
        assert_eq!(
            map.remove_with(&3, |v| released.push(v)),
            Err(Error::MissingKey)
        );

        assert_eq!(released, [300]);
        assert_eq!(map.len(), 7);
        assert!(!map.contains_key(&3));
        map.assert_invariants();
    }

    #[test]
    fn get_mut_updates_payload() {
        let mut map = RbMap::new();
        map.insert(5u16, 1).unwrap();

        *map.get_mut(&5).unwrap() += 41;
        assert_eq!(map.get(&5), Some(&42));
        assert_eq!(map.get_mut(&6), None);
    }

    #[test]
    fn payloads_are_borrowed() {
        let names = ["zero", "one", "two", "three"];
        let mut map = RbMap::new();

        for (i, name) in names.iter().enumerate() {
            map.insert(i as u32, name).unwrap();
        }

        assert!(core::ptr::eq(*map.get(&2).unwrap(), &names[2]));
    }

    #[test]
    fn first_last_and_pop() {
        let mut map = RbMap::new();
        for key in [5u32, 1, 9, 3, 7] {
            map.insert(key, key * 2).unwrap();
        }

        assert_eq!(map.first_key_value(), Some((&1, &2)));
        assert_eq!(map.last_key_value(), Some((&9, &18)));

        assert_eq!(map.pop_first(), Some((1, 2)));
        assert_eq!(map.pop_last(), Some((9, 18)));
        map.assert_invariants();

        assert_eq!(
            map.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>(),
            [(3, 6), (5, 10), (7, 14)]
        );
    }

    #[test]
    fn destroy_visits_every_entry_once() {
        let mut map = RbMap::new();
        let keys = [0x10u32, 0x14, 0xe, 0xa, 0xc, 0x1, 0x20, 0x15];
        for key in keys {
            map.insert(key, key).unwrap();
        }
        map.remove(&0x14).unwrap();

        let count = map.len();
        let mut seen = Vec::new();
        map.destroy(|key, value| {
            assert_eq!(key, value);
            seen.push(key);
        });

        assert_eq!(seen.len(), count);
        let mut expected: Vec<u32> = keys.iter().copied().filter(|&k| k != 0x14).collect();
        expected.sort_unstable();
        assert_eq!(seen, expected);
    }

    #[test]
    fn drop_releases_payloads() {
        let tracker = Rc::new(Cell::new(0));

        struct Payload(Rc<Cell<usize>>);

        impl Drop for Payload {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let mut map = RbMap::new();
        for key in 0u32..100 {
            map.insert(key, Payload(tracker.clone())).unwrap();
        }

        // The rejected duplicate is dropped immediately.
        assert_eq!(
            map.insert(50, Payload(tracker.clone())),
            Err(Error::DuplicateKey)
        );
        assert_eq!(tracker.get(), 1);

        drop(map.remove(&10));
        assert_eq!(tracker.get(), 2);

        drop(map);
        assert_eq!(tracker.get(), 101);
    }

    #[test]
    fn shape_and_colors() {
        let mut map = RbMap::new();
        for key in [0xau8, 0xb, 0x7, 0x5, 0x3] {
            map.insert(key, ()).unwrap();
        }

        assert_eq!(map.construct_shape(), "a(5(3)(7))(b)");
        assert_eq!(map.construct_visual(), "a(5(*3)(*7))(b)");
        assert_eq!(map.height(), 2);
    }

    #[test]
    fn debug_lists_entries_in_order() {
        let mut map = RbMap::new();
        for key in [3u8, 1, 2] {
            map.insert(key, char::from(b'a' + key)).unwrap();
        }

        assert_eq!(std::format!("{map:?}"), "{1: 'b', 2: 'c', 3: 'd'}");
    }
}
