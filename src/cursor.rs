use core::{marker::PhantomData, ptr::NonNull};

use crate::{AvlTree, Dir, Links, Order, Traverse, TreeNode};

/// A cursor over an [`AvlTree`].
///
/// A cursor points either to an element of the tree or to a "ghost" non-element that connects the
/// last element to the first.
pub struct Cursor<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    curs: CursorRaw<T>,
    phantom: PhantomData<&'tree AvlTree<T>>,
}

impl<'tree, T> Cursor<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) fn new(tree: &'tree AvlTree<T>, ptr: Option<NonNull<T>>) -> Cursor<'tree, T> {
        Cursor {
            curs: CursorRaw {
                tree: tree.into(),
                ptr,
            },
            phantom: PhantomData,
        }
    }

    /// Moves the cursor to the next element of the `AvlTree`.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method moves it to the first
    /// element. If it is pointing to the last element, this method moves it to the "ghost"
    /// non-element.
    pub fn move_next(&mut self) {
        unsafe { self.curs.advance(Dir::Right) }
    }

    /// Moves the cursor to the previous element of the `AvlTree`.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method moves it to the last
    /// element. If it is pointing to the first element, this method moves it to the "ghost"
    /// non-element.
    pub fn move_prev(&mut self) {
        unsafe { self.curs.advance(Dir::Left) }
    }

    /// Returns a reference to the item pointed to by the cursor.
    ///
    /// This returns `None` if the cursor is currently pointing to the "ghost" non-element.
    pub fn get(&self) -> Option<&'tree T> {
        unsafe { self.curs.get() }
    }

    /// Returns a reference to the next item, the in-order successor of the current one.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the first element.
    /// If it is pointing to the last element, this method returns `None`.
    pub fn peek_next(&self) -> Option<&'tree T> {
        unsafe { self.curs.peek(Dir::Right) }
    }

    /// Returns a reference to the previous item, the in-order predecessor of the current one.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the last element.
    /// If it is pointing to the first element, this method returns `None`.
    pub fn peek_prev(&self) -> Option<&'tree T> {
        unsafe { self.curs.peek(Dir::Left) }
    }

    /// Returns the previous and next items as a pair.
    ///
    /// The first entry is `None` if the current element is the minimum, and the second is `None`
    /// if it is the maximum.
    pub fn neighbors(&self) -> (Option<&'tree T>, Option<&'tree T>) {
        (self.peek_prev(), self.peek_next())
    }

    /// Returns `true` if the current element has a left child.
    ///
    /// Returns `false` at the "ghost" non-element.
    pub fn has_left_child(&self) -> bool {
        unsafe { self.curs.links() }.map_or(false, |links| links.left().is_some())
    }

    /// Returns `true` if the current element has a right child.
    ///
    /// Returns `false` at the "ghost" non-element.
    pub fn has_right_child(&self) -> bool {
        unsafe { self.curs.links() }.map_or(false, |links| links.right().is_some())
    }

    /// Returns `true` if the current element has no children.
    ///
    /// Returns `false` at the "ghost" non-element.
    pub fn is_leaf(&self) -> bool {
        unsafe { self.curs.links() }.map_or(false, |links| links.is_leaf())
    }

    /// Returns the height of the subtree rooted at the current element.
    ///
    /// A leaf has height 1. Returns 0 at the "ghost" non-element.
    pub fn height(&self) -> usize {
        unsafe { self.curs.links() }.map_or(0, |links| links.height().into())
    }

    /// Returns an iterator over the subtree rooted at the current element, in the given order.
    ///
    /// The iterator is empty at the "ghost" non-element.
    pub fn subtree(&self, order: Order) -> Traverse<'tree, T> {
        Traverse::new(self.curs.ptr, order)
    }
}

impl<T> Clone for Cursor<'_, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn clone(&self) -> Self {
        Cursor {
            curs: self.curs,
            phantom: PhantomData,
        }
    }
}

/// A cursor over an [`AvlTree`] which supports editing operations.
///
/// A cursor points either to an element of the tree or to a "ghost" non-element that connects the
/// last element to the first.
pub struct CursorMut<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    curs: CursorRaw<T>,
    phantom: PhantomData<&'tree mut AvlTree<T>>,
}

impl<'tree, T> CursorMut<'tree, T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) fn new(tree: &'tree mut AvlTree<T>, ptr: Option<NonNull<T>>) -> CursorMut<'tree, T> {
        CursorMut {
            curs: CursorRaw {
                tree: tree.into(),
                ptr,
            },
            phantom: PhantomData,
        }
    }

    /// Returns a read-only cursor pointing to the current element.
    ///
    /// The `CursorMut` remains immutably borrowed for the lifetime of the returned `Cursor`.
    pub fn as_cursor(&self) -> Cursor<'_, T> {
        Cursor {
            curs: self.curs,
            phantom: PhantomData,
        }
    }

    /// Moves the cursor to the next element of the `AvlTree`.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method will move it to the first
    /// element. If it is pointing to the last element, this method will move it to the "ghost"
    /// non-element.
    pub fn move_next(&mut self) {
        unsafe { self.curs.advance(Dir::Right) }
    }

    /// Moves the cursor to the previous element of the `AvlTree`.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method will move it to the last
    /// element. If it is pointing to the first element, this method will move it to the "ghost"
    /// non-element.
    pub fn move_prev(&mut self) {
        unsafe { self.curs.advance(Dir::Left) }
    }

    /// Returns a reference to the item pointed to by the cursor.
    ///
    /// This returns `None` if the cursor is currently pointing to the "ghost" non-element.
    pub fn get(&self) -> Option<&T> {
        unsafe { self.curs.get() }
    }

    /// Returns a reference to the next item.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the first element.
    /// If it is pointing to the last element, this method returns `None`.
    pub fn peek_next(&self) -> Option<&T> {
        unsafe { self.curs.peek(Dir::Right) }
    }

    /// Returns a reference to the previous item.
    ///
    /// If the cursor is pointing to the "ghost" non-element, this method returns the last element.
    /// If it is pointing to the first element, this method returns `None`.
    pub fn peek_prev(&self) -> Option<&T> {
        unsafe { self.curs.peek(Dir::Left) }
    }

    /// Removes the current element from the tree.
    ///
    /// This returns the removed element and moves the cursor to the next element. If the cursor is
    /// pointing to the "ghost" non-element, this method returns `None`, and neither the tree nor
    /// the cursor is modified.
    pub fn remove_current(&mut self) -> Option<T::Handle> {
        unsafe { self.curs.remove(Dir::Right) }
    }

    /// Removes the current element from the tree.
    ///
    /// This returns the removed element and moves the cursor to the previous element. If the cursor is
    /// pointing to the "ghost" non-element, this method returns `None`, and neither the tree nor
    /// the cursor is modified.
    pub fn remove_current_and_move_prev(&mut self) -> Option<T::Handle> {
        unsafe { self.curs.remove(Dir::Left) }
    }
}

struct CursorRaw<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    tree: NonNull<AvlTree<T>>,
    ptr: Option<NonNull<T>>,
}

impl<T> Clone for CursorRaw<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for CursorRaw<T> where T: TreeNode<Links<T>> + ?Sized {}

impl<T> CursorRaw<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    // The in-order neighbor in `dir`. The ghost sits between the last and first elements.
    unsafe fn neighbor(&self, dir: Dir) -> Option<NonNull<T>> {
        let tree = unsafe { self.tree.as_ref() };

        match (self.ptr, dir) {
            (Some(p), _) => AvlTree::<T>::step(p, dir),
            (None, Dir::Right) => tree.first_raw(),
            (None, Dir::Left) => tree.last_raw(),
        }
    }

    unsafe fn advance(&mut self, dir: Dir) {
        self.ptr = unsafe { self.neighbor(dir) };
    }

    unsafe fn peek<'a>(&self, dir: Dir) -> Option<&'a T> {
        unsafe { self.neighbor(dir) }.map(|p| unsafe { p.as_ref() })
    }

    unsafe fn links<'a>(&self) -> Option<&'a Links<T>> {
        self.ptr.map(|p| unsafe { AvlTree::<T>::links(p) })
    }

    unsafe fn get<'a>(&self) -> Option<&'a T> {
        self.ptr.map(|p| unsafe { p.as_ref() })
    }

    // Removes the current element and leaves the cursor on its neighbor in `dir`.
    unsafe fn remove(&mut self, dir: Dir) -> Option<T::Handle> {
        let current = self.ptr?;
        unsafe { self.advance(dir) };

        let tree = unsafe { self.tree.as_mut() };
        Some(tree.unlink(current))
    }
}
