use core::{iter::FusedIterator, marker::PhantomData, ptr::NonNull};
use std::collections::VecDeque;

use crate::{AvlTree, Dir, Link, Links, TreeNode};

enum CameFrom {
    Parent,
    LeftChild,
    Here,
    RightChild,
}

/// An in-order iterator over the elements of an [`AvlTree`].
///
/// Walks parent links instead of keeping a stack, so it does not allocate.
pub struct Iter<'tree, T: TreeNode<Links<T>> + ?Sized> {
    tree: &'tree AvlTree<T>,

    front_cur: Link<T>,
    front_from: CameFrom,

    len: usize,
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iter<'tree, T> {
    pub(crate) fn new(tree: &'tree AvlTree<T>) -> Self {
        Iter {
            tree,

            front_cur: tree.root,
            front_from: CameFrom::Parent,
            len: tree.len(),
        }
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iterator for Iter<'tree, T> {
    type Item = &'tree T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }

        let mut cur = self.front_cur?;

        loop {
            match self.front_from {
                CameFrom::Parent => {
                    // Upon entering a new subtree, find the minimum element.
                    while let Some(left) = unsafe { AvlTree::<T>::links(cur) }.left() {
                        cur = left;
                    }

                    // Once the minimum is found, its (empty) left subtree has been exhausted.
                    self.front_from = CameFrom::LeftChild;
                }

                CameFrom::LeftChild => {
                    // The left subtree has been exhausted, so this node is up next. Save off the
                    // iterator state and return it.
                    self.front_cur = Some(cur);
                    self.front_from = CameFrom::Here;
                    self.len -= 1;

                    return Some(unsafe { cur.as_ref() });
                }

                CameFrom::Here => {
                    // The current node was just yielded.
                    if let Some(right) = unsafe { AvlTree::<T>::links(cur) }.right() {
                        // If the right subtree is not empty, go there.
                        self.front_from = CameFrom::Parent;

                        cur = right;
                    } else if let Some(parent) = unsafe { AvlTree::<T>::links(cur) }.parent() {
                        // Otherwise, ascend one level.
                        self.front_from = match self.tree.which_child(parent, cur) {
                            Dir::Left => CameFrom::LeftChild,
                            Dir::Right => CameFrom::RightChild,
                        };

                        cur = parent;
                    } else {
                        unreachable!()
                    }
                }

                CameFrom::RightChild => {
                    // Ascend until we find the successor element.
                    while let Some(parent) = unsafe { AvlTree::<T>::links(cur) }.parent() {
                        match self.tree.which_child(parent, cur) {
                            Dir::Left => {
                                cur = parent;
                                break;
                            }
                            Dir::Right => cur = parent,
                        }
                    }

                    self.front_cur = Some(cur);
                    self.front_from = CameFrom::LeftChild;
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<T: TreeNode<Links<T>> + ?Sized> ExactSizeIterator for Iter<'_, T> {}

impl<T: TreeNode<Links<T>> + ?Sized> FusedIterator for Iter<'_, T> {}

/// The order in which [`Traverse`] visits the nodes of a subtree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Order {
    /// Left subtree, then the node, then the right subtree. Yields keys in ascending order.
    InOrder,
    /// The node, then its left subtree, then its right subtree.
    PreOrder,
    /// Left subtree, then right subtree, then the node.
    PostOrder,
    /// Breadth-first: every node at depth `d` before any node at depth `d + 1`.
    LevelOrder,
}

/// An iterator over a subtree of an [`AvlTree`] in a chosen [`Order`].
///
/// Created by [`AvlTree::traverse`] and [`Cursor::subtree`](crate::Cursor::subtree). Each call
/// starts a fresh walk, so traversing an unmodified tree twice yields the same sequence.
pub struct Traverse<'tree, T: TreeNode<Links<T>> + ?Sized> {
    state: TraverseState<T>,
    phantom: PhantomData<&'tree AvlTree<T>>,
}

enum TraverseState<T: ?Sized> {
    InOrder {
        stack: Vec<NonNull<T>>,
        cur: Link<T>,
    },
    PreOrder {
        stack: Vec<NonNull<T>>,
    },
    // Each node is pushed twice: once to expand its children, once to yield it.
    PostOrder {
        stack: Vec<(NonNull<T>, bool)>,
    },
    LevelOrder {
        queue: VecDeque<NonNull<T>>,
    },
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Traverse<'tree, T> {
    pub(crate) fn new(root: Link<T>, order: Order) -> Self {
        let state = match order {
            Order::InOrder => TraverseState::InOrder {
                stack: Vec::new(),
                cur: root,
            },
            Order::PreOrder => TraverseState::PreOrder {
                stack: root.into_iter().collect(),
            },
            Order::PostOrder => TraverseState::PostOrder {
                stack: root.into_iter().map(|r| (r, false)).collect(),
            },
            Order::LevelOrder => TraverseState::LevelOrder {
                queue: root.into_iter().collect(),
            },
        };

        Traverse {
            state,
            phantom: PhantomData,
        }
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iterator for Traverse<'tree, T> {
    type Item = &'tree T;

    fn next(&mut self) -> Option<Self::Item> {
        let links = |node: NonNull<T>| unsafe { AvlTree::<T>::links(node) };

        let node = match &mut self.state {
            TraverseState::InOrder { stack, cur } => {
                while let Some(node) = *cur {
                    stack.push(node);
                    *cur = links(node).left();
                }

                let node = stack.pop()?;
                *cur = links(node).right();
                node
            }

            TraverseState::PreOrder { stack } => {
                let node = stack.pop()?;

                // Right is pushed first so that the left subtree is visited first.
                stack.extend(links(node).right());
                stack.extend(links(node).left());
                node
            }

            TraverseState::PostOrder { stack } => loop {
                let (node, expanded) = stack.pop()?;

                if expanded {
                    break node;
                }

                stack.push((node, true));
                stack.extend(links(node).right().map(|r| (r, false)));
                stack.extend(links(node).left().map(|l| (l, false)));
            },

            TraverseState::LevelOrder { queue } => {
                let node = queue.pop_front()?;

                queue.extend(links(node).left());
                queue.extend(links(node).right());
                node
            }
        };

        Some(unsafe { node.as_ref() })
    }
}

impl<T: TreeNode<Links<T>> + ?Sized> FusedIterator for Traverse<'_, T> {}

/// An iterator over the elements of an [`AvlTree`] whose keys fall within a range.
///
/// Created by [`AvlTree::range`].
pub struct Range<'tree, T: TreeNode<Links<T>> + ?Sized> {
    // Both ends are `None` once the range is exhausted.
    front: Link<T>,
    back: Link<T>,
    phantom: PhantomData<&'tree AvlTree<T>>,
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Range<'tree, T> {
    // `front` is the first element at or above the lower bound and `back` the last element at or
    // below the upper bound.
    pub(crate) fn new(front: Link<T>, back: Link<T>) -> Self {
        let (front, back) = match (front, back) {
            (Some(f), Some(b)) if unsafe { f.as_ref().key() <= b.as_ref().key() } => (front, back),
            _ => (None, None),
        };

        Range {
            front,
            back,
            phantom: PhantomData,
        }
    }

    fn advance(&mut self, dir: Dir) -> Option<&'tree T> {
        let (cur, end) = match dir {
            Dir::Right => (self.front?, self.back?),
            Dir::Left => (self.back?, self.front?),
        };

        if cur == end {
            self.front = None;
            self.back = None;
        } else {
            let next = AvlTree::<T>::step(cur, dir);
            match dir {
                Dir::Right => self.front = next,
                Dir::Left => self.back = next,
            }
        }

        Some(unsafe { cur.as_ref() })
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iterator for Range<'tree, T> {
    type Item = &'tree T;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance(Dir::Right)
    }
}

impl<T: TreeNode<Links<T>> + ?Sized> DoubleEndedIterator for Range<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.advance(Dir::Left)
    }
}

impl<T: TreeNode<Links<T>> + ?Sized> FusedIterator for Range<'_, T> {}
