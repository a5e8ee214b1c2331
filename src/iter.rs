use core::{iter::FusedIterator, ptr::NonNull};

use crate::{Link, Links, RbTree, TreeNode};

/// An in-order iterator over the elements of an [`RbTree`].
///
/// Created by [`RbTree::iter`].
pub struct Iter<'tree, T: TreeNode<Links<T>> + ?Sized> {
    tree: &'tree RbTree<T>,

    next: Link<T>,
    len: usize,
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iter<'tree, T> {
    pub(crate) fn new(tree: &'tree RbTree<T>) -> Self {
        let next = tree.root.map(|root| unsafe { tree.min_in_subtree(root).0 });

        Iter {
            tree,
            next,
            len: tree.len(),
        }
    }

    // Returns the in-order successor of `cur`.
    unsafe fn successor(&self, cur: NonNull<T>) -> Link<T> {
        unsafe {
            // The successor is the minimum of the right subtree, if there is one.
            if let Some(right) = T::links(cur).as_ref().right() {
                return Some(self.tree.min_in_subtree(right).0);
            }

            // Otherwise, ascend until arriving from a left child.
            let mut child = cur;
            while let Some(parent) = T::links(child).as_ref().parent() {
                if T::links(parent).as_ref().left() == Some(child) {
                    return Some(parent);
                }

                child = parent;
            }

            None
        }
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iterator for Iter<'tree, T> {
    type Item = &'tree T;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;

        self.next = unsafe { self.successor(cur) };
        self.len -= 1;

        Some(unsafe { cur.as_ref() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<T: TreeNode<Links<T>> + ?Sized> ExactSizeIterator for Iter<'_, T> {}

impl<T: TreeNode<Links<T>> + ?Sized> FusedIterator for Iter<'_, T> {}
