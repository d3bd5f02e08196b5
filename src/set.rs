use core::{
    borrow::Borrow,
    fmt,
    marker::PhantomPinned,
    ops::{Bound, RangeBounds},
    ptr::NonNull,
};

use cordyceps::Linked;

use crate::{AvlTree, Links, Order, TreeNode};

/// An ordered multiset based on an [AVL tree].
///
/// Equal keys may be inserted any number of times; each is stored separately and they are
/// yielded next to each other in insertion order.
///
/// [AVL tree]: https://en.wikipedia.org/wiki/AVL_tree
pub struct AvlMultiset<K: Ord + fmt::Debug> {
    tree: AvlTree<SetNode<K>>,
}

struct SetNode<K> {
    links: Links<SetNode<K>>,
    key: K,
    _unpin: PhantomPinned,
}

unsafe impl<K> Linked<Links<SetNode<K>>> for SetNode<K> {
    type Handle = Box<Self>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<SetNode<K>>> {
        let ptr = ptr.as_ptr();
        unsafe { NonNull::new_unchecked(core::ptr::addr_of_mut!((*ptr).links)) }
    }
}

fn node_key<K>(node: &SetNode<K>) -> &K {
    &node.key
}

impl<K: Ord + fmt::Debug> TreeNode<Links<SetNode<K>>> for SetNode<K> {
    type Key = K;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

impl<K: Ord + fmt::Debug> AvlMultiset<K> {
    /// Creates a new, empty `AvlMultiset`.
    pub const fn new() -> Self {
        Self {
            tree: AvlTree::new(),
        }
    }

    /// Returns `true` if the set contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of elements in the set, counting duplicates.
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns the height of the underlying tree.
    pub fn height(&self) -> usize {
        self.tree.height()
    }

    /// Returns `true` if the underlying tree satisfies the AVL balance condition.
    pub fn is_balanced(&self) -> bool {
        self.tree.is_balanced()
    }

    /// Adds `key` to the set.
    pub fn insert(&mut self, key: K) {
        self.tree.insert(Box::new(SetNode {
            links: Links::new(),
            key,
            _unpin: PhantomPinned,
        }));
    }

    /// Returns `true` if the set contains `key` at least once.
    #[inline]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.contains_key(key)
    }

    /// Returns the number of times `key` occurs in the set.
    pub fn count<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree
            .range((Bound::Included(key), Bound::Included(key)))
            .count()
    }

    /// Removes one occurrence of `key` from the set, returning it.
    #[inline]
    pub fn remove<Q>(&mut self, key: &Q) -> Option<K>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.tree.remove(key).map(|node| node.key)
    }

    /// Returns the minimum key in the set.
    #[inline]
    pub fn first(&self) -> Option<&K> {
        self.tree.first().map(|node| &node.get_ref().key)
    }

    /// Returns the maximum key in the set.
    #[inline]
    pub fn last(&self) -> Option<&K> {
        self.tree.last().map(|node| &node.get_ref().key)
    }

    /// Removes and returns the minimum key in the set.
    #[inline]
    pub fn pop_first(&mut self) -> Option<K> {
        self.tree.pop_first().map(|node| node.key)
    }

    /// Removes and returns the maximum key in the set.
    #[inline]
    pub fn pop_last(&mut self) -> Option<K> {
        self.tree.pop_last().map(|node| node.key)
    }

    /// Returns the key following an occurrence of `key` in ascending order.
    ///
    /// Returns `None` if `key` is not in the set or is its maximum. If `key` occurs more than
    /// once, the result may be another occurrence of it.
    pub fn successor<Q>(&self, key: &Q) -> Option<&K>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.neighbors(key)?.1
    }

    /// Returns the key preceding an occurrence of `key` in ascending order.
    ///
    /// Returns `None` if `key` is not in the set or is its minimum. If `key` occurs more than
    /// once, the result may be another occurrence of it.
    pub fn predecessor<Q>(&self, key: &Q) -> Option<&K>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.neighbors(key)?.0
    }

    /// Returns the keys immediately before and after an occurrence of `key`.
    ///
    /// Returns `None` if `key` is not in the set. Otherwise either side is `None` when `key` is
    /// the minimum or maximum of the set.
    pub fn neighbors<Q>(&self, key: &Q) -> Option<(Option<&K>, Option<&K>)>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let (prev, next) = self.tree.cursor_at(key)?.neighbors();
        Some((prev.map(|node| &node.key), next.map(|node| &node.key)))
    }

    /// Returns an iterator over the keys within `range`, in ascending order.
    pub fn range<Q, R>(&self, range: R) -> impl DoubleEndedIterator<Item = &K> + '_
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
        R: RangeBounds<Q>,
    {
        self.tree.range(range).map(node_key)
    }

    /// Returns an iterator over the keys in ascending order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &K> + '_ {
        self.tree.iter().map(node_key)
    }

    /// Returns an iterator over the keys in the given tree order.
    pub fn traverse(&self, order: Order) -> impl Iterator<Item = &K> + '_ {
        self.tree.traverse(order).map(node_key)
    }

    /// Clears the set, removing all elements.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }
}

impl<K: Ord + fmt::Debug> Default for AvlMultiset<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + fmt::Debug> fmt::Debug for AvlMultiset<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.tree, f)
    }
}

impl<K: Ord + fmt::Debug> Extend<K> for AvlMultiset<K> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl<K: Ord + fmt::Debug> FromIterator<K> for AvlMultiset<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut set = AvlMultiset::new();
        set.extend(iter);
        set
    }
}
