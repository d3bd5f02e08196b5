//! An intrusive AVL tree.
//!
//! Items embed a [`Links`] field and are handed to the tree through their
//! [`Linked::Handle`](cordyceps::Linked::Handle). The tree keeps items ordered by key, accepts
//! duplicate keys (each duplicate is placed after the keys equal to it), and restores the AVL
//! balance condition after every insertion and removal. Search, mutation and navigation all
//! complete in _O(log(n))_ time.
//!
//! [`AvlMultiset`] wraps the tree into an owning collection of plain keys.

// Conventions used in comments:
// - The height of an empty subtree is 0 and the height of a leaf is 1.
// - The balance factor of a node `x` is `h(right(x)) - h(left(x))`.
// - A node is left-heavy (right-heavy) if its left (right) subtree is taller by more than one.
//
// The invariants of the tree, checked by `assert_invariants`, are:
// 1. An in-order walk yields keys in non-decreasing order.
// 2. Every balance factor is -1, 0 or 1.
// 3. The parent link of every child points at the node holding it, and the root has no parent.
// 4. The cached height of every linked node equals the height of its subtree.
//
// Unlinked nodes have a cached height of 0, which is how stale handles are told apart from
// members of the tree.

use core::{
    cell::UnsafeCell,
    cmp::Ordering,
    fmt,
    marker::PhantomPinned,
    mem,
    ops::{Bound, Not, RangeBounds},
    pin::Pin,
    ptr::NonNull,
};
use std::borrow::Borrow;

use cordyceps::Linked;

mod cursor;
mod debug;
mod error;
mod iter;
#[cfg(any(test, feature = "model"))]
pub mod model;
pub mod set;
#[cfg(test)]
mod tests;

pub use cursor::{Cursor, CursorMut};
pub use error::Error;
pub use iter::{Iter, Order, Range, Traverse};
pub use set::AvlMultiset;

/// An item which can be linked into an [`AvlTree`], ordered by its key.
pub trait TreeNode<L>: Linked<L> {
    type Key: Ord + fmt::Debug;

    /// Returns the key the item is ordered by. It must not change while the item is linked.
    fn key(&self) -> &Self::Key;
}

/// An intrusive AVL tree.
///
/// The tree does not allocate; it links together items whose ownership is transferred to it on
/// [`insert`](AvlTree::insert) and handed back on removal.
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
    len: usize,
}

/// The links embedded in every item of an [`AvlTree`].
pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Dir {
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
    height: u8,
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree.
    pub const fn new() -> AvlTree<T> {
        AvlTree { root: None, len: 0 }
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

    /// Returns the root element of the tree, or `None` if the tree is empty.
    pub fn root(&self) -> Option<Pin<&T>> {
        self.root.map(|root| unsafe { Pin::new_unchecked(root.as_ref()) })
    }

    /// Returns the height of the tree.
    ///
    /// An empty tree has height 0 and a tree holding a single element has height 1. This reads a
    /// cached value and completes in _O(1)_ time.
    pub fn height(&self) -> usize {
        Self::height_of(self.root).into()
    }

    /// Returns `true` if the subtrees of every node differ in height by at most one.
    ///
    /// Unlike [`height`](AvlTree::height), this walks the whole tree and recomputes every height
    /// from its structure.
    pub fn is_balanced(&self) -> bool {
        Self::measured_height(self.root).is_some()
    }

    // Recomputes the height of the subtree rooted at `node`, or returns `None` if any node in it
    // is unbalanced.
    fn measured_height(node: Link<T>) -> Option<usize> {
        let Some(node) = node else {
            return Some(0);
        };

        let links = unsafe { Self::links(node) };
        let left = Self::measured_height(links.left())?;
        let right = Self::measured_height(links.right())?;

        (left.abs_diff(right) <= 1).then_some(1 + left.max(right))
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        match self.root {
            Some(root) => unsafe {
                assert_eq!(Self::links(root).parent(), None, "root has a parent");

                let count = self.assert_invariants_at(root);
                assert_eq!(count, self.len, "length does not match linked node count");
            },
            None => assert_eq!(self.len, 0, "empty tree has nonzero length"),
        }

        let mut prev: Option<&T::Key> = None;
        for item in self.iter() {
            if let Some(prev) = prev {
                assert!(prev <= item.key(), "{prev:?} ordered before {:?}", item.key());
            }
            prev = Some(item.key());
        }
    }

    // Checks the invariants of the subtree rooted at `node`, returning its node count.
    #[allow(clippy::only_used_in_recursion)]
    unsafe fn assert_invariants_at(&self, node: NonNull<T>) -> usize {
        unsafe {
            let links = Self::links(node);
            let key = node.as_ref().key();

            let left_height = Self::height_of(links.left());
            let right_height = Self::height_of(links.right());

            assert_eq!(
                links.height(),
                1 + left_height.max(right_height),
                "stale cached height at {key:?}"
            );
            assert!(
                left_height.abs_diff(right_height) <= 1,
                "unbalanced at {key:?}: left height {left_height}, right height {right_height}"
            );

            let mut count = 1;

            for dir in [Dir::Left, Dir::Right] {
                if let Some(child) = links.child(dir) {
                    // Ensure child's parent link points to this node.
                    let parent = Self::links(child)
                        .parent()
                        .expect("child parent pointer not set");
                    assert_eq!(node, parent);

                    count += self.assert_invariants_at(child);
                }
            }

            count
        }
    }

    /// Returns a reference to an element whose key is equal to `key`.
    ///
    /// If several elements share the key, any one of them may be returned.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns `true` if the tree contains an element whose key is equal to `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let found = self.search(self.root?, key);
        let found_key: &Q = unsafe { found.as_ref() }.key().borrow();

        (found_key == key).then_some(found)
    }

    // Descends from `start` towards `key`. Returns the first node on the path whose key equals
    // `key`, or the last node visited if none does.
    //
    // Callers needing an exact match must compare the returned key themselves.
    pub(crate) fn search<Q>(&self, start: NonNull<T>, key: &Q) -> NonNull<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut cur = start;

        loop {
            let dir = match key.cmp(unsafe { cur.as_ref() }.key().borrow()) {
                Ordering::Less => Dir::Left,
                Ordering::Equal => return cur,
                Ordering::Greater => Dir::Right,
            };

            match unsafe { Self::links(cur) }.child(dir) {
                Some(child) => cur = child,
                None => return cur,
            }
        }
    }

    /// Returns the element under which an item with key `key` would be attached by
    /// [`insert`](AvlTree::insert).
    ///
    /// Returns `None` if and only if the tree is empty.
    pub fn find_insertion_parent<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (parent, _) = self.insertion_point(key)?;
        unsafe { Some(Pin::new_unchecked(parent.as_ref())) }
    }

    // Descends to the free child slot where `key` belongs. Equal keys descend to the right.
    fn insertion_point<Q>(&self, key: &Q) -> Option<(NonNull<T>, Dir)>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut cur = self.root?;

        loop {
            let cur_key: &Q = unsafe { cur.as_ref() }.key().borrow();
            let dir = if key < cur_key { Dir::Left } else { Dir::Right };

            match unsafe { Self::links(cur) }.child(dir) {
                Some(child) => cur = child,
                None => return Some((cur, dir)),
            }
        }
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        self.root
            .map(|root| unsafe { Pin::new_unchecked(Self::extreme_in_subtree(root, Dir::Left).as_ref()) })
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        self.root
            .map(|root| unsafe { Pin::new_unchecked(Self::extreme_in_subtree(root, Dir::Right).as_ref()) })
    }

    pub(crate) fn first_raw(&self) -> Link<T> {
        self.root.map(|root| Self::extreme_in_subtree(root, Dir::Left))
    }

    pub(crate) fn last_raw(&self) -> Link<T> {
        self.root.map(|root| Self::extreme_in_subtree(root, Dir::Right))
    }

    // Follows `dir` links from `root` until there are none left.
    fn extreme_in_subtree(root: NonNull<T>, dir: Dir) -> NonNull<T> {
        let mut cur = root;

        while let Some(next) = unsafe { Self::links(cur) }.child(dir) {
            cur = next;
        }

        cur
    }

    // Returns the in-order neighbor of `node` in direction `dir`: the successor for `Dir::Right`
    // and the predecessor for `Dir::Left`.
    pub(crate) fn step(node: NonNull<T>, dir: Dir) -> Link<T> {
        unsafe {
            if let Some(child) = Self::links(node).child(dir) {
                return Some(Self::extreme_in_subtree(child, !dir));
            }

            // Climb until arriving from the opposite side.
            let mut cur = node;
            while let Some(parent) = Self::links(cur).parent() {
                if Self::links(parent).child(!dir) == Some(cur) {
                    return Some(parent);
                }

                cur = parent;
            }

            None
        }
    }

    // Returns the leftmost node whose key lies above `bound`.
    fn lower_bound<Q>(&self, bound: Bound<&Q>) -> Link<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;
        let mut found = None;

        while let Some(cur) = opt_cur {
            let key: &Q = unsafe { cur.as_ref() }.key().borrow();
            let above = match bound {
                Bound::Included(low) => key >= low,
                Bound::Excluded(low) => key > low,
                Bound::Unbounded => true,
            };

            let links = unsafe { Self::links(cur) };
            if above {
                found = Some(cur);
                opt_cur = links.left();
            } else {
                opt_cur = links.right();
            }
        }

        found
    }

    // Returns the rightmost node whose key lies below `bound`.
    fn upper_bound<Q>(&self, bound: Bound<&Q>) -> Link<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;
        let mut found = None;

        while let Some(cur) = opt_cur {
            let key: &Q = unsafe { cur.as_ref() }.key().borrow();
            let below = match bound {
                Bound::Included(high) => key <= high,
                Bound::Excluded(high) => key < high,
                Bound::Unbounded => true,
            };

            let links = unsafe { Self::links(cur) };
            if below {
                found = Some(cur);
                opt_cur = links.right();
            } else {
                opt_cur = links.left();
            }
        }

        found
    }

    /// Returns an iterator over the elements whose keys fall within `range`, in ascending order.
    ///
    /// An empty or inverted range yields nothing.
    pub fn range<Q, R>(&self, range: R) -> Range<'_, T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
        R: RangeBounds<Q>,
    {
        let front = self.lower_bound(range.start_bound());
        let back = self.upper_bound(range.end_bound());

        Range::new(front, back)
    }

    /// Returns an in-order iterator over the elements of the tree.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Returns an iterator over the elements of the tree in the given order.
    pub fn traverse(&self, order: Order) -> Traverse<'_, T> {
        Traverse::new(self.root, order)
    }

    /// Returns a cursor pointing at the minimum element, or at the "ghost" non-element if the
    /// tree is empty.
    pub fn cursor_first(&self) -> Cursor<'_, T> {
        Cursor::new(self, self.first_raw())
    }

    /// Returns a cursor pointing at the maximum element, or at the "ghost" non-element if the
    /// tree is empty.
    pub fn cursor_last(&self) -> Cursor<'_, T> {
        Cursor::new(self, self.last_raw())
    }

    /// Returns a cursor pointing at an element whose key is equal to `key`.
    pub fn cursor_at<Q>(&self, key: &Q) -> Option<Cursor<'_, T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        Some(Cursor::new(self, Some(ptr)))
    }

    /// Returns a mutable cursor pointing at the minimum element.
    pub fn cursor_first_mut(&mut self) -> CursorMut<'_, T> {
        let first = self.first_raw();
        CursorMut::new(self, first)
    }

    /// Returns a mutable cursor pointing at the maximum element.
    pub fn cursor_last_mut(&mut self) -> CursorMut<'_, T> {
        let last = self.last_raw();
        CursorMut::new(self, last)
    }

    /// Returns a mutable cursor pointing at an element whose key is equal to `key`.
    pub fn cursor_at_mut<Q>(&mut self, key: &Q) -> Option<CursorMut<'_, T>>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let ptr = self.get_raw(key)?;
        Some(CursorMut::new(self, Some(ptr)))
    }

    #[inline]
    pub(crate) unsafe fn links<'a>(node: NonNull<T>) -> &'a Links<T> {
        unsafe { T::links(node).as_ref() }
    }

    #[inline]
    fn height_of(node: Link<T>) -> u8 {
        node.map(|n| unsafe { Self::links(n).height() })
            .unwrap_or(0)
    }

    fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { Self::links(node).set_parent(parent) };
    }

    #[inline]
    fn replace_child_or_set_root(&mut self, parent: Link<T>, old_child: NonNull<T>, new_child: Link<T>) {
        match parent {
            Some(parent) => self.replace_child(parent, old_child, new_child),
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // The caller must ensure that `old_child` is a child node of `parent` and `new_child` is not.
    fn replace_child(&mut self, parent: NonNull<T>, old_child: NonNull<T>, new_child: Link<T>) {
        let links = unsafe { Self::links(parent) };
        let dir = self.which_child(parent, old_child);

        debug_assert_eq!(
            links.child(dir),
            Some(old_child),
            "`old_child` must be a child of `parent`"
        );
        if let Some(new_child) = new_child {
            debug_assert_ne!(
                links.child(!dir),
                Some(new_child),
                "`new_child` must not be a child of `parent`"
            );
        }

        links.set_child(dir, new_child);
    }

    pub(crate) fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        if unsafe { Self::links(parent) }.left() == Some(child) {
            Dir::Left
        } else {
            Dir::Right
        }
    }

    fn update_height(&mut self, node: NonNull<T>) {
        let links = unsafe { Self::links(node) };
        let height = 1 + Self::height_of(links.left()).max(Self::height_of(links.right()));

        links.set_height(height);
    }

    // Rotates the subtree rooted at `down` in direction `dir`, promoting its `!dir` child into its
    // place. Returns the promoted node.
    //
    // The cached heights of both nodes are refreshed; those of their ancestors are not.
    fn rotate(&mut self, down: NonNull<T>, dir: Dir) -> NonNull<T> {
        unsafe {
            let up = Self::links(down)
                .child(!dir)
                .expect("rotation requires a child to promote");

            // - `down` becomes the `dir` child of `up`.
            // - `across` goes from the `dir` child of `up` to the `!dir` child of `down`.
            let across = Self::links(up).child(dir);
            Self::links(down).set_child(!dir, across);
            self.maybe_set_parent(across, Some(down));

            Self::links(up).set_child(dir, Some(down));
            let parent = Self::links(down).set_parent(Some(up));
            Self::links(up).set_parent(parent);

            self.replace_child_or_set_root(parent, down, Some(up));

            self.update_height(down);
            self.update_height(up);

            log::trace!(
                "rotated {dir:?} at {:?}, promoting {:?}",
                down.as_ref().key(),
                up.as_ref().key()
            );

            up
        }
    }

    // Returns the side of `node` whose subtree is taller by more than one, if any.
    fn heavy_side(&self, node: NonNull<T>) -> Option<Dir> {
        let links = unsafe { Self::links(node) };
        let left = Self::height_of(links.left());
        let right = Self::height_of(links.right());

        match left.cmp(&right) {
            Ordering::Greater if left - right > 1 => Some(Dir::Left),
            Ordering::Less if right - left > 1 => Some(Dir::Right),
            _ => None,
        }
    }

    // Restores balance at `node`, whose `heavy` subtree is too tall. Returns the new root of the
    // subtree.
    fn restore_balance(&mut self, node: NonNull<T>, heavy: Dir) -> NonNull<T> {
        let child = unsafe { Self::links(node) }
            .child(heavy)
            .expect("heavy side must have a child");

        let child_links = unsafe { Self::links(child) };
        let outer = Self::height_of(child_links.child(heavy));
        let inner = Self::height_of(child_links.child(!heavy));

        if outer < inner {
            // Left-right or right-left case: bring the inner grandchild up first.
            self.rotate(child, heavy);
        }

        self.rotate(node, !heavy)
    }

    // Walks from `start` to the root, refreshing cached heights and rotating wherever a node has
    // become left- or right-heavy.
    fn rebalance(&mut self, start: Link<T>) {
        let mut opt_cur = start;

        while let Some(cur) = opt_cur {
            self.update_height(cur);

            let subtree_root = match self.heavy_side(cur) {
                Some(heavy) => self.restore_balance(cur, heavy),
                None => cur,
            };

            opt_cur = unsafe { Self::links(subtree_root) }.parent();
        }
    }

    /// Inserts an item into the tree.
    ///
    /// If the tree already holds items with an equal key, the new item is ordered after them.
    ///
    /// This operation completes in _O(log(n))_ time.
    pub fn insert(&mut self, item: T::Handle) {
        let ptr = T::into_ptr(item);

        unsafe {
            let links = Self::links(ptr);
            debug_assert!(!links.is_linked(), "node is already linked into a tree");
            links.clear();
            links.set_height(1);

            log::trace!("inserting {:?}", ptr.as_ref().key());
        }

        match self.insertion_point(unsafe { ptr.as_ref() }.key()) {
            // Tree is empty. Set `item` as the root.
            None => self.root = Some(ptr),

            Some((parent, dir)) => {
                unsafe {
                    Self::links(parent).set_child(dir, Some(ptr));
                    Self::links(ptr).set_parent(Some(parent));
                }

                self.rebalance(Some(parent));
            }
        }

        self.len += 1;
    }

    // Returns the minimum node in the subtree.
    //
    // If the subtree root is not the minimum, also returns the minimum node's parent.
    #[inline]
    fn min_in_subtree(&self, root: NonNull<T>) -> (NonNull<T>, Option<NonNull<T>>) {
        let mut parent = None;
        let mut cur = root;

        while let Some(left) = unsafe { Self::links(cur) }.left() {
            parent = Some(cur);
            cur = left;
        }

        (cur, parent)
    }

    /// Removes `node` from the tree, returning ownership of it.
    ///
    /// Membership is checked by climbing from `node` to the root of the tree it is linked into,
    /// so this completes in _O(log(n))_ time. A node which was never inserted or was already
    /// removed is reported as [`Error::Detached`]; a node belonging to another tree as
    /// [`Error::ForeignNode`]. In both cases the tree is left untouched.
    ///
    /// # Safety
    ///
    /// `node` must point to a live item. If that item is linked into another tree, the other tree
    /// must also be live.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> Result<T::Handle, Error> {
        if let Err(error) = self.check_membership(node) {
            log::debug!("refusing to remove {:?}: {error}", unsafe { node.as_ref().key() });
            return Err(error);
        }

        Ok(self.unlink(node))
    }

    fn check_membership(&self, node: NonNull<T>) -> Result<(), Error> {
        let links = unsafe { Self::links(node) };
        if !links.is_linked() {
            return Err(Error::Detached);
        }

        let mut top = node;
        while let Some(parent) = unsafe { Self::links(top) }.parent() {
            top = parent;
        }

        if self.root == Some(top) {
            Ok(())
        } else {
            Err(Error::ForeignNode)
        }
    }

    /// Removes an element whose key is equal to `key`, returning it.
    ///
    /// If several elements share the key, any one of them may be removed.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T::Handle>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;
        Some(self.unlink(node))
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        let first = self.first_raw()?;
        Some(self.unlink(first))
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        let last = self.last_raw()?;
        Some(self.unlink(last))
    }

    // Removes `node`, which must be linked into this tree.
    //
    // If `node` has a right child, its successor (the minimum of the right subtree) takes its
    // place, and the successor's right child is elevated to replace the successor. Otherwise its
    // left child, if any, takes its place.
    pub(crate) fn unlink(&mut self, node: NonNull<T>) -> T::Handle {
        unsafe {
            let links = Self::links(node);
            let parent = links.parent();
            let left = links.left();
            let right = links.right();

            log::trace!("removing {:?}", node.as_ref().key());

            let rebalance_from = match right {
                Some(right) => {
                    let (successor, successor_parent) = self.min_in_subtree(right);

                    if let Some(successor_parent) = successor_parent {
                        // Elevate the successor's right child to replace it.
                        let successor_right = Self::links(successor).right();
                        Self::links(successor_parent).set_left(successor_right);
                        self.maybe_set_parent(successor_right, Some(successor_parent));

                        Self::links(successor).set_right(Some(right));
                        Self::links(right).set_parent(Some(successor));
                    }
                    // Right link is updated above iff succ != right.

                    Self::links(successor).set_left(left);
                    self.maybe_set_parent(left, Some(successor));

                    Self::links(successor).set_parent(parent);
                    self.replace_child_or_set_root(parent, node, Some(successor));

                    // The deepest node whose subtree changed.
                    Some(successor_parent.unwrap_or(successor))
                }

                None => {
                    self.replace_child_or_set_root(parent, node, left);
                    self.maybe_set_parent(left, parent);

                    parent
                }
            };

            self.rebalance(rebalance_from);

            links.clear();
            self.len -= 1;

            T::from_ptr(node)
        }
    }

    /// Clears the tree, removing all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let (cur, parent) = self.min_in_subtree(cur);
                let parent = parent.or_else(|| Self::links(cur).parent());

                let right = Self::links(cur).right();

                // Elevate the node's right child (which may be None).
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                // Drop the node.
                Self::links(cur).clear();
                drop(T::from_ptr(cur));
                self.len -= 1;

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }
}

impl<T> Default for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<'tree, T> IntoIterator for &'tree AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    type Item = &'tree T;
    type IntoIter = Iter<'tree, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                height: 0,
                _unpin: PhantomPinned,
            }),
        }
    }

    /// Returns `true` if the item owning these links is currently an element of a tree.
    #[inline]
    pub fn is_linked(&self) -> bool {
        self.height() != 0
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.left().is_none() && self.right().is_none()
    }

    #[inline]
    fn height(&self) -> u8 {
        unsafe { (*self.inner.get()).height }
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
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&self, parent: Link<T>) -> Link<T> {
        unsafe { mem::replace(&mut (*self.inner.get()).parent, parent) }
    }

    #[inline]
    fn set_child(&self, dir: Dir, child: Link<T>) -> Link<T> {
        unsafe { mem::replace(&mut (*self.inner.get()).children[dir as usize], child) }
    }

    #[inline]
    fn set_left(&self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    fn set_right(&self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    fn set_height(&self, height: u8) {
        unsafe { (*self.inner.get()).height = height };
    }

    // Unlinks these links, marking the owning item as detached.
    #[inline]
    fn clear(&self) {
        self.set_parent(None);
        self.set_left(None);
        self.set_right(None);
        self.set_height(0);
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
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("height", &self.height())
            .finish()
    }
}
