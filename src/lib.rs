//! An intrusive red-black tree.
#![no_std]

// Conventions used in comments:
// - The parent of a node `x` is denoted `p(x)`, its grandparent `g(x)`.
// - The sibling of `p(x)` is the uncle of `x`.
// - Missing children are treated as black leaves.
//
// The fundamental invariants of a red-black tree are:
// 1. The root is black.
// 2. No red node has a red child.
// 3. Every path from a node to a missing child passes through the same number of black nodes
//    (the black-height of that node).
//
// Corollaries:
// 4. A red node is never the root, so a red parent always has a parent of its own.
// 5. If a node has exactly one child, that child is a red leaf (by (2) and (3)).
// 6. The height of a tree with `n` nodes is at most `2 * log2(n + 1)`.

#[cfg(feature = "alloc")]
extern crate alloc;

// The `Arbitrary` derive in `model` names `::std` paths.
#[cfg(any(test, feature = "std"))]
extern crate std;

use core::{
    borrow::Borrow, cell::UnsafeCell, cmp::Ordering, fmt, marker::PhantomPinned, mem, ops::Not,
    pin::Pin, ptr::NonNull,
};

use cordyceps::Linked;

mod error;
mod iter;
#[cfg(feature = "alloc")]
mod map;
mod visual;

#[cfg(all(feature = "alloc", any(test, feature = "model")))]
pub mod model;

#[cfg(all(test, feature = "alloc"))]
mod tests;

pub use error::Error;
pub use iter::Iter;
#[cfg(feature = "alloc")]
pub use map::RbMap;
pub use visual::{Style, Visual};

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord + fmt::Debug;

    fn key(&self) -> &Self::Key;
}

/// An intrusive red-black tree.
///
/// Nodes embed a [`Links`] record and are handed to the tree through their [`Linked`] handle. The
/// tree owns every inserted node until it is removed or the tree is cleared.
pub struct RbTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
    len: usize,
    height: usize,
}

pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Color {
    Red,
    Black,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    color: Color,
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

impl<T> RbTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> RbTree<T> {
        RbTree {
            root: None,
            len: 0,
            height: 0,
        }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the greatest root-to-leaf edge count observed while inserting.
    ///
    /// This is a high-water mark: removals never lower it, and it is only reset by clearing the
    /// tree. See [`RbTree::exact_height`] for the current height.
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Returns the current height of the tree, in edges, by walking every node.
    ///
    /// This operation completes in _O(n log(n))_ time.
    pub fn exact_height(&self) -> usize {
        let mut height = 0;

        for node in self.iter() {
            let ptr = NonNull::from(node);

            unsafe {
                if !T::links(ptr).as_ref().is_leaf() {
                    continue;
                }

                let mut depth = 0;
                let mut cur = ptr;
                while let Some(parent) = T::links(cur).as_ref().parent() {
                    depth += 1;
                    cur = parent;
                }

                height = height.max(depth);
            }
        }

        height
    }

    /// Returns an iterator over the elements of the tree in ascending key order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        let Some(root) = self.root else {
            assert_eq!(self.len, 0);
            return;
        };

        unsafe {
            assert_eq!(T::links(root).as_ref().parent(), None, "root has a parent");
            assert_eq!(T::links(root).as_ref().color(), Color::Black, "root is red");

            self.assert_invariants_at(root);
        }

        let mut count = 0;
        let mut prev: Option<&T::Key> = None;
        for node in self.iter() {
            if let Some(prev) = prev {
                assert!(
                    prev < node.key(),
                    "keys out of order: {prev:?}, {:?}",
                    node.key()
                );
            }
            prev = Some(node.key());
            count += 1;
        }
        assert_eq!(count, self.len);
    }

    // Checks the color and link invariants of the subtree rooted at `node`, returning its
    // black-height.
    #[allow(clippy::only_used_in_recursion)]
    unsafe fn assert_invariants_at(&self, node: NonNull<T>) -> usize {
        unsafe {
            let color = T::links(node).as_ref().color();
            let mut black_heights = [0; 2];

            for dir in [Dir::Left, Dir::Right] {
                if let Some(child) = T::links(node).as_ref().child(dir) {
                    // Ensure no red node has a red child.
                    if color == Color::Red {
                        assert_eq!(
                            T::links(child).as_ref().color(),
                            Color::Black,
                            "red node {:?} has a red child {:?}",
                            node.as_ref().key(),
                            child.as_ref().key(),
                        );
                    }

                    // Ensure child's parent link points to this node.
                    let parent = T::links(child)
                        .as_ref()
                        .parent()
                        .expect("child parent pointer not set");
                    assert_eq!(node, parent);

                    black_heights[dir as usize] = self.assert_invariants_at(child);
                }
            }

            // Ensure both subtrees have the same black-height.
            assert_eq!(
                black_heights[0],
                black_heights[1],
                "unequal black-heights below {:?}",
                node.as_ref().key(),
            );

            black_heights[0] + (color == Color::Black) as usize
        }
    }

    /// Returns a reference to the node corresponding to `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns a pinned mutable reference to the node corresponding to `key`.
    ///
    /// # Safety
    ///
    /// The caller must not modify the key or the links of the returned node.
    pub unsafe fn get_mut<Q>(&mut self, key: &Q) -> Option<Pin<&mut T>>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_mut())) }
    }

    /// Returns `true` if the tree contains a node corresponding to `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    pub(crate) fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;

        loop {
            let cur = opt_cur?;

            unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => opt_cur = T::links(cur).as_ref().left(),
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => opt_cur = T::links(cur).as_ref().right(),
                }
            }
        }
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        let root = self.root?;

        unsafe {
            let (first, _) = self.min_in_subtree(root);
            Some(Pin::new_unchecked(first.as_ref()))
        }
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        let root = self.root?;

        unsafe {
            let (last, _) = self.max_in_subtree(root);
            Some(Pin::new_unchecked(last.as_ref()))
        }
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        let root = self.root?;

        unsafe {
            let (first, _) = self.min_in_subtree(root);
            Some(self.remove_at(first))
        }
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        let root = self.root?;

        unsafe {
            let (last, _) = self.max_in_subtree(root);
            Some(self.remove_at(last))
        }
    }

    unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { T::links(node).as_mut().set_parent(parent) };
    }

    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that the following conditions hold:
    // - `old_child` is a child node of `parent`.
    // - `new_child` is not a child node of `parent`.
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        unsafe {
            let dir = self.which_child(parent, old_child);

            debug_assert_eq!(
                T::links(parent).as_ref().child(dir),
                Some(old_child),
                "`old_child` must be a child of `parent`"
            );

            if let Some(new_child) = new_child {
                debug_assert_ne!(
                    T::links(parent).as_ref().child(!dir),
                    Some(new_child),
                    "`new_child` must not be a child of `parent`"
                );
            }

            T::links(parent).as_mut().set_child(dir, new_child);
        }
    }

    // Performs a rotation, moving `up` up and its parent `down` down.
    //
    // Colors of affected nodes are not updated.
    fn rotate_at(&mut self, down: NonNull<T>, up: NonNull<T>) {
        unsafe {
            // - `down` becomes the `dir` child of `up`.
            // - `across` goes from the `dir` child of `up` to the `!dir` child of `down`.
            let dir = if T::links(down).as_ref().right() == Some(up) {
                Dir::Left
            } else {
                Dir::Right
            };

            let across = T::links(up).as_ref().child(dir);
            T::links(down).as_mut().set_child(!dir, across);
            self.maybe_set_parent(across, Some(down));

            T::links(up).as_mut().set_child(dir, Some(down));
            let parent = T::links(down).as_mut().set_parent(Some(up));
            T::links(up).as_mut().set_parent(parent);

            self.replace_child_or_set_root(parent, down, Some(up));
        }

        let (up_key, down_key) = unsafe { (up.as_ref().key(), down.as_ref().key()) };
        log::trace!("rotated {up_key:?} over {down_key:?}");
    }

    // Performs a double rotation, moving the grandchild `up` above both its parent `down_first`
    // and its grandparent `down_second`.
    //
    // `up` must be an inner grandchild: the left child of a right child or vice versa.
    //
    // Colors of affected nodes are not updated.
    fn rotate_twice_at(
        &mut self,
        down_second: NonNull<T>,
        down_first: NonNull<T>,
        up: NonNull<T>,
    ) {
        unsafe {
            let dir = if T::links(down_first).as_ref().right() == Some(up) {
                Dir::Right
            } else {
                Dir::Left
            };

            let across_first = T::links(up).as_ref().child(!dir);
            let across_second = T::links(up).as_ref().child(dir);

            self.maybe_set_parent(across_first, Some(down_first));

            T::links(down_first).as_mut().set_child(dir, across_first);
            T::links(down_first).as_mut().set_parent(Some(up));

            self.maybe_set_parent(across_second, Some(down_second));

            T::links(down_second).as_mut().set_child(!dir, across_second);
            let parent = T::links(down_second).as_mut().set_parent(Some(up));

            T::links(up).as_mut().set_parent(parent);
            T::links(up).as_mut().set_child(!dir, Some(down_first));
            T::links(up).as_mut().set_child(dir, Some(down_second));

            self.replace_child_or_set_root(parent, down_second, Some(up));
        }

        log::trace!(
            "double-rotated {:?} over {:?} and {:?}",
            unsafe { up.as_ref().key() },
            unsafe { down_first.as_ref().key() },
            unsafe { down_second.as_ref().key() },
        );
    }

    /// Inserts an item into the tree.
    ///
    /// If the tree already holds an item with an equal key, the tree is left unmodified and `item`
    /// is handed back as the error.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) -> Result<(), T::Handle> {
        let ptr = T::into_ptr(item);
        unsafe { T::links(ptr).as_mut().clear() };

        let Some(root) = self.root else {
            // Tree is empty. Set `item` as the root and return.
            unsafe { T::links(ptr).as_mut().set_color(Color::Black) };

            self.root = Some(ptr);
            self.len += 1;
            return Ok(());
        };

        // Number of edges between the root and the new node.
        let mut depth = 1;
        let mut parent = root;

        // Descend the tree, looking for a missing child to replace.
        loop {
            let ordering = unsafe { ptr.as_ref().key().cmp(parent.as_ref().key()) };

            let dir = match ordering {
                Ordering::Less => Dir::Left,
                Ordering::Equal => {
                    log::debug!("rejected duplicate key {:?}", unsafe { ptr.as_ref().key() });
                    return Err(unsafe { T::from_ptr(ptr) });
                }
                Ordering::Greater => Dir::Right,
            };

            unsafe {
                match T::links(parent).as_ref().child(dir) {
                    // Descend.
                    Some(child) => {
                        parent = child;
                        depth += 1;
                    }

                    // Set `item` as child.
                    None => {
                        T::links(parent).as_mut().set_child(dir, Some(ptr));
                        T::links(ptr).as_mut().set_parent(Some(parent));
                        break;
                    }
                }
            }
        }

        // A rotation replaces the longest chain with a shorter one.
        if self.rebalance_inserted(ptr) {
            depth -= 1;
        }

        self.height = self.height.max(depth);
        self.len += 1;

        Ok(())
    }

    // Performs a bottom-up rebalance of the tree after the insertion of the red node `node`.
    //
    // Returns `true` if the violation was resolved by a rotation.
    fn rebalance_inserted(&mut self, node: NonNull<T>) -> bool {
        let mut x = node;

        unsafe {
            loop {
                let Some(parent) = T::links(x).as_ref().parent() else {
                    // `x` is the root.
                    T::links(x).as_mut().set_color(Color::Black);
                    return false;
                };

                // If the parent is black, no red node has a red child.
                if T::links(parent).as_ref().color() == Color::Black {
                    return false;
                }

                let Some(grandparent) = T::links(parent).as_ref().parent() else {
                    // A red root can only appear transiently; repaint it.
                    T::links(parent).as_mut().set_color(Color::Black);
                    return false;
                };

                let parent_dir = self.which_child(grandparent, parent);
                let uncle = T::links(grandparent).as_ref().child(!parent_dir);

                if self.is_red(uncle) {
                    // Push blackness down from the grandparent and ascend two levels.
                    if let Some(uncle) = uncle {
                        T::links(uncle).as_mut().set_color(Color::Black);
                    }
                    T::links(parent).as_mut().set_color(Color::Black);
                    T::links(grandparent).as_mut().set_color(Color::Red);

                    log::trace!("recolored below {:?}", grandparent.as_ref().key());

                    x = grandparent;
                    continue;
                }

                // The uncle is black or missing; restructure g(x), p(x) and x.
                let up = if self.which_child(parent, x) == parent_dir {
                    self.rotate_at(grandparent, parent);
                    parent
                } else {
                    self.rotate_twice_at(grandparent, parent, x);
                    x
                };

                T::links(up).as_mut().set_color(Color::Black);
                T::links(grandparent).as_mut().set_color(Color::Red);

                return true;
            }
        }
    }

    // Returns the minimum node in the subtree.
    //
    // If the subtree root is not the minimum, also returns the minimum node's parent.
    #[inline]
    unsafe fn min_in_subtree(&self, root: NonNull<T>) -> (NonNull<T>, Option<NonNull<T>>) {
        let mut parent = None;
        let mut cur = root;

        while let Some(left) = unsafe { T::links(cur).as_ref().left() } {
            parent = Some(cur);
            cur = left;
        }

        (cur, parent)
    }

    // Returns the maximum node in the subtree.
    //
    // If the subtree root is not the maximum, also returns the maximum node's parent.
    #[inline]
    unsafe fn max_in_subtree(&self, root: NonNull<T>) -> (NonNull<T>, Option<NonNull<T>>) {
        let mut parent = None;
        let mut cur = root;

        while let Some(right) = unsafe { T::links(cur).as_ref().right() } {
            parent = Some(cur);
            cur = right;
        }

        (cur, parent)
    }

    /// Removes the item corresponding to `key` from the tree.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + fmt::Debug + ?Sized,
    {
        match self.get_raw(key) {
            Some(node) => Some(unsafe { self.remove_at(node) }),
            None => {
                log::debug!("key {key:?} not found for removal");
                None
            }
        }
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        // There are three possible cases:
        //
        // 1. `node` has two children.
        //
        //    In this case `node`'s predecessor[^1] is removed from its own position and assumes
        //    `node`'s place and color. The predecessor's left child is elevated to replace it.
        //
        //    The predecessor by definition has no right child, so this can be treated as a
        //    removal matching case 2 or 3 at the predecessor's old position.
        //
        // 2. `node` has one child.
        //
        //    The child is elevated into `node`'s slot. By corollary (5) the child is a red leaf and
        //    `node` is black.
        //
        // 3. `node` is a leaf.
        //
        //    The parent's slot is cleared.
        //
        // If the node removed from its position was black, every path through the vacated slot
        // has lost one black node. The elevated child (possibly missing) then carries an extra
        // "double black" that `rebalance_removed` pushes up the tree or resolves by rotation.
        //
        // [^1]: The predecessor of a node `a` is the greatest node in `a`'s left subtree.

        unsafe {
            let parent = T::links(node).as_ref().parent();
            let left = T::links(node).as_ref().left();
            let right = T::links(node).as_ref().right();
            let color = T::links(node).as_ref().color();
            let node_slot = parent.map(|p| (p, self.which_child(p, node)));

            let (removed_color, elevated, slot) = match (left, right) {
                (Some(left), Some(right)) => {
                    let (predecessor, predecessor_parent) = self.max_in_subtree(left);
                    let predecessor_color = T::links(predecessor).as_ref().color();
                    let predecessor_left = T::links(predecessor).as_ref().left();

                    let slot = match predecessor_parent {
                        Some(predecessor_parent) => {
                            // Elevate the predecessor's left child to replace it.
                            self.replace_child(predecessor_parent, predecessor, predecessor_left);
                            self.maybe_set_parent(predecessor_left, Some(predecessor_parent));

                            T::links(predecessor).as_mut().set_left(Some(left));
                            T::links(left).as_mut().set_parent(Some(predecessor));

                            (predecessor_parent, Dir::Right)
                        }

                        // The predecessor is `left` itself and keeps its left subtree.
                        None => (predecessor, Dir::Left),
                    };

                    self.replace_child_or_set_root(parent, node, Some(predecessor));

                    // Transfer position and color of `node` to `predecessor`.
                    T::links(predecessor).as_mut().set_parent(parent);
                    T::links(predecessor).as_mut().set_right(Some(right));
                    T::links(predecessor).as_mut().set_color(color);
                    // Left link is updated above iff pred != left.

                    T::links(right).as_mut().set_parent(Some(predecessor));

                    log::trace!(
                        "replaced {:?} with predecessor {:?}",
                        node.as_ref().key(),
                        predecessor.as_ref().key()
                    );

                    (predecessor_color, predecessor_left, Some(slot))
                }

                (Some(child), None) | (None, Some(child)) => {
                    self.replace_child_or_set_root(parent, node, Some(child));
                    T::links(child).as_mut().set_parent(parent);

                    (color, Some(child), node_slot)
                }

                (None, None) => {
                    self.replace_child_or_set_root(parent, node, None);

                    (color, None, node_slot)
                }
            };

            if removed_color == Color::Black {
                self.rebalance_removed(elevated, slot);
            }

            self.len -= 1;

            T::links(node).as_mut().clear();
            T::from_ptr(node)
        }
    }

    // Restores the black-height invariant after a black node was removed from `slot`.
    //
    // `x` is the node now occupying `slot` (possibly missing) and carries an extra black. When
    // `slot` is `None`, `x` is the tree root.
    unsafe fn rebalance_removed(&mut self, mut x: Link<T>, mut slot: Option<(NonNull<T>, Dir)>) {
        unsafe {
            while let Some((parent, dir)) = slot {
                // A red node absorbs the extra black.
                if self.is_red(x) {
                    break;
                }

                let mut sibling = T::links(parent)
                    .as_ref()
                    .child(!dir)
                    .expect("doubly black node must have a sibling");

                if self.color(sibling) == Color::Red {
                    // Rotate the red sibling above the parent so that `x` gets a black sibling.
                    T::links(sibling).as_mut().set_color(Color::Black);
                    T::links(parent).as_mut().set_color(Color::Red);
                    self.rotate_at(parent, sibling);

                    sibling = T::links(parent)
                        .as_ref()
                        .child(!dir)
                        .expect("children of a red node must be present");
                }

                let near = T::links(sibling).as_ref().child(dir);
                let mut far = T::links(sibling).as_ref().child(!dir);

                if !self.is_red(near) && !self.is_red(far) {
                    // Move the extra black up to the parent.
                    T::links(sibling).as_mut().set_color(Color::Red);

                    x = Some(parent);
                    slot = self.slot_of(parent);
                    continue;
                }

                if !self.is_red(far) {
                    if let Some(near) = near {
                        // Rotate the red near nephew above the sibling, making it the new sibling
                        // with a red far child.
                        T::links(near).as_mut().set_color(Color::Black);
                        T::links(sibling).as_mut().set_color(Color::Red);
                        self.rotate_at(sibling, near);

                        far = Some(sibling);
                        sibling = near;
                    }
                }

                // The far nephew is red. Rotate the sibling above the parent and repaint; this
                // adds a black node above `x` without changing the other paths.
                let parent_color = T::links(parent).as_ref().color();
                T::links(sibling).as_mut().set_color(parent_color);
                T::links(parent).as_mut().set_color(Color::Black);
                if let Some(far) = far {
                    T::links(far).as_mut().set_color(Color::Black);
                }
                self.rotate_at(parent, sibling);

                x = self.root;
                break;
            }

            if let Some(x) = x {
                T::links(x).as_mut().set_color(Color::Black);
            }
        }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        self.clear_with(drop);
    }

    /// Clears the tree, passing each removed element to `f`.
    ///
    /// Elements are released in ascending key order, each exactly once, without recursion.
    pub fn clear_with<F>(&mut self, mut f: F)
    where
        F: FnMut(T::Handle),
    {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let (cur, parent) = self.min_in_subtree(cur);
                let parent = parent.or_else(|| T::links(cur).as_ref().parent());

                let right = T::links(cur).as_ref().right();

                // Elevate the node's right child (which may be None).
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                // Release the node. `len` is settled first so a panicking `f` leaves the tree
                // consistent for `Drop`.
                T::links(cur).as_mut().clear();
                self.len -= 1;
                f(T::from_ptr(cur));

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        self.height = 0;

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    // Support methods ========================================================

    #[inline]
    unsafe fn color(&self, node: NonNull<T>) -> Color {
        unsafe { T::links(node).as_ref().color() }
    }

    /// Returns `true` if the pointed-to node is red. Missing nodes are black.
    #[inline]
    unsafe fn is_red(&self, node: Link<T>) -> bool {
        node.is_some_and(|n| unsafe { self.color(n) } == Color::Red)
    }

    #[inline]
    unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        if unsafe { T::links(parent).as_ref().left() } == Some(child) {
            Dir::Left
        } else {
            Dir::Right
        }
    }

    // Returns the parent of `node` and the side of the parent it hangs from.
    #[inline]
    unsafe fn slot_of(&self, node: NonNull<T>) -> Option<(NonNull<T>, Dir)> {
        unsafe {
            let parent = T::links(node).as_ref().parent()?;
            Some((parent, self.which_child(parent, node)))
        }
    }
}

impl<T> Default for RbTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for RbTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                color: Color::Red,
                _unpin: PhantomPinned,
            }),
        }
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.left().is_none() && self.right().is_none()
    }

    #[inline]
    pub(crate) fn color(&self) -> Color {
        unsafe { (*self.inner.get()).color }
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    pub(crate) fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    pub(crate) fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_left(&mut self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    fn set_right(&mut self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    fn set_color(&mut self, color: Color) {
        self.inner.get_mut().color = color;
    }

    // Resets the links to the state of a freshly created, unlinked red node.
    #[inline]
    fn clear(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = None;
        inner.children = [None; 2];
        inner.color = Color::Red;
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent().map(NonNull::as_ptr))
            .field("left", &self.left().map(NonNull::as_ptr))
            .field("right", &self.right().map(NonNull::as_ptr))
            .field("color", &self.color())
            .finish()
    }
}
