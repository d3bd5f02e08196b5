use std::{collections::BTreeMap, ptr::NonNull};

use arbitrary::Arbitrary;
use cordyceps::Linked;
use proptest::strategy::{Just, Strategy};

use crate::{AvlTree, Error, Links, TreeNode};

#[derive(Debug)]
#[repr(C)]
pub struct TestNode {
    pub links: Links<TestNode>,
    pub key: u32,
}

impl TestNode {
    pub fn new(key: u32) -> Box<TestNode> {
        Box::new(TestNode {
            links: Links::new(),
            key,
        })
    }
}

unsafe impl Linked<Links<TestNode>> for TestNode {
    type Handle = Box<TestNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::from(Box::leak(r))
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<TestNode>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<TestNode>> for TestNode {
    type Key = u32;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum ItemValue {
    Index(usize),
    Random(u32),
}

proptest::prop_compose! {
    fn index_strategy()(
        index in 0usize..1000,
    ) -> ItemValue {
        ItemValue::Index(index)
    }
}

proptest::prop_compose! {
    fn random_strategy()(
        random in 0u32..1000,
    ) -> ItemValue {
        ItemValue::Random(random)
    }
}

fn value_strategy() -> impl Strategy<Value = ItemValue> {
    proptest::prop_oneof![index_strategy(), random_strategy()]
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    Insert(ItemValue),
    Get(ItemValue),
    Remove(ItemValue),
    RemoveAt(ItemValue),
    First,
    PopFirst,
    Last,
    PopLast,
    Range(ItemValue, ItemValue),
}

impl Op {
    fn finalize(self, sorted: &[u32]) -> FinalOp {
        fn get_value(v: &[u32], i: ItemValue) -> u32 {
            match i {
                ItemValue::Index(idx) => {
                    if v.is_empty() {
                        idx as u32
                    } else {
                        v[idx % v.len()]
                    }
                }
                ItemValue::Random(v) => v,
            }
        }

        match self {
            Op::Insert(item) => FinalOp::Insert(get_value(sorted, item)),
            Op::Get(item) => FinalOp::Get(get_value(sorted, item)),
            Op::Remove(item) => FinalOp::Remove(get_value(sorted, item)),
            Op::RemoveAt(item) => FinalOp::RemoveAt(get_value(sorted, item)),
            Op::First => FinalOp::First,
            Op::PopFirst => FinalOp::PopFirst,
            Op::Last => FinalOp::Last,
            Op::PopLast => FinalOp::PopLast,
            Op::Range(low, high) => {
                FinalOp::Range(get_value(sorted, low), get_value(sorted, high))
            }
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum FinalOp {
    Insert(u32),
    Get(u32),
    Remove(u32),
    RemoveAt(u32),
    First,
    PopFirst,
    Last,
    PopLast,
    Range(u32, u32),
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        value_strategy().prop_map(Op::Insert),
        value_strategy().prop_map(Op::Get),
        value_strategy().prop_map(Op::Remove),
        value_strategy().prop_map(Op::RemoveAt),
        Just(Op::First),
        Just(Op::PopFirst),
        Just(Op::Last),
        Just(Op::PopLast),
        (value_strategy(), value_strategy()).prop_map(|(low, high)| Op::Range(low, high)),
    ]
}

// Counts of each key, standing in for a multiset.
#[derive(Default)]
struct Multiset {
    counts: BTreeMap<u32, usize>,
    len: usize,
}

impl Multiset {
    fn insert(&mut self, value: u32) {
        *self.counts.entry(value).or_default() += 1;
        self.len += 1;
    }

    fn remove(&mut self, value: u32) -> Option<u32> {
        let count = self.counts.get_mut(&value)?;
        *count -= 1;
        if *count == 0 {
            self.counts.remove(&value);
        }
        self.len -= 1;

        Some(value)
    }

    fn first(&self) -> Option<u32> {
        self.counts.keys().next().copied()
    }

    fn last(&self) -> Option<u32> {
        self.counts.keys().next_back().copied()
    }

    fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.counts
            .iter()
            .flat_map(|(&value, &count)| std::iter::repeat(value).take(count))
    }
}

pub fn run_btree_equivalence(ops: Vec<Op>) {
    let mut sorted_values = Vec::with_capacity(ops.len());
    let mut model = Multiset::default();
    let mut avl: AvlTree<TestNode> = AvlTree::new();

    fn insert_sorted(v: &mut Vec<u32>, value: u32) {
        let idx = v.partition_point(|&x| x <= value);
        v.insert(idx, value);
    }

    fn remove_sorted(v: &mut Vec<u32>, value: u32) {
        if let Ok(idx) = v.binary_search(&value) {
            v.remove(idx);
        }
    }

    #[inline]
    #[allow(clippy::boxed_local)]
    fn node_key(node: Box<TestNode>) -> u32 {
        node.key
    }

    #[inline]
    fn ref_key(node: &TestNode) -> u32 {
        node.key
    }

    for (op_id, op) in ops.into_iter().enumerate() {
        let final_op = op.finalize(&sorted_values);

        match final_op {
            FinalOp::Insert(value) => {
                insert_sorted(&mut sorted_values, value);

                model.insert(value);
                avl.insert(TestNode::new(value));
            }

            FinalOp::Get(value) => {
                let from_model = model.counts.contains_key(&value).then_some(value);
                let from_avl = avl.get(&value).map(|node| node.key);

                assert_eq!(from_model, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Remove(value) => {
                remove_sorted(&mut sorted_values, value);

                let from_model = model.remove(value);
                let from_avl = avl.remove(&value).map(node_key);

                assert_eq!(from_model, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::RemoveAt(value) => {
                remove_sorted(&mut sorted_values, value);

                let from_model = model.remove(value);
                let from_avl = avl.get(&value).map(|node| NonNull::from(node.get_ref()));
                let from_avl = from_avl.map(|ptr| {
                    let node = unsafe { avl.remove_at(ptr) }.expect("found node must be a member");

                    // The removed node is detached and can no longer be removed.
                    let stale = NonNull::from(&*node);
                    assert_eq!(unsafe { avl.remove_at(stale) }.err(), Some(Error::Detached));

                    node_key(node)
                });

                assert_eq!(from_model, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::First => {
                let from_model = model.first();
                let from_avl = avl.first().map(|node| node.key);

                assert_eq!(from_model, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::PopFirst => {
                let from_model = model.first().and_then(|first| model.remove(first));
                if let Some(first) = from_model {
                    remove_sorted(&mut sorted_values, first);
                }
                let from_avl = avl.pop_first().map(node_key);

                assert_eq!(from_model, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Last => {
                let from_model = model.last();
                let from_avl = avl.last().map(|node| node.key);

                assert_eq!(from_model, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::PopLast => {
                let from_model = model.last().and_then(|last| model.remove(last));
                if let Some(last) = from_model {
                    remove_sorted(&mut sorted_values, last);
                }
                let from_avl = avl.pop_last().map(node_key);

                assert_eq!(from_model, from_avl, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Range(low, high) => {
                let from_model: Vec<u32> = model
                    .iter()
                    .filter(|value| (low..=high).contains(value))
                    .collect();
                let from_avl: Vec<u32> = avl.range(low..=high).map(ref_key).collect();
                let from_avl_rev: Vec<u32> = avl.range(low..=high).rev().map(ref_key).collect();

                assert_eq!(from_model, from_avl, "FinalOp #{op_id}: {final_op:?}");
                assert!(
                    from_model.iter().rev().eq(from_avl_rev.iter()),
                    "FinalOp #{op_id}: {final_op:?} (reversed)"
                );
            }
        }

        avl.assert_invariants();
        assert!(avl.is_balanced());
        assert_eq!(model.len, avl.len());
        assert!(model.iter().eq(avl.iter().map(ref_key)));
    }
}

#[derive(Clone, Debug, Arbitrary)]
pub enum CursorOp {
    // Get is not an operation as it's executed on every loop iteration to check equivalence.
    MovePrev,
    MoveNext,
    PeekNext,
    PeekPrev,
    RemoveCurrent,
    RemoveCurrentMovePrev,
}

pub fn cursor_op_strategy() -> impl Strategy<Value = CursorOp> {
    proptest::prop_oneof![
        Just(CursorOp::MovePrev),
        Just(CursorOp::MoveNext),
        Just(CursorOp::PeekNext),
        Just(CursorOp::PeekPrev),
        Just(CursorOp::RemoveCurrent),
        Just(CursorOp::RemoveCurrentMovePrev),
    ]
}

#[derive(Clone, Debug)]
pub struct CursorEquivalenceInput {
    pub values: Vec<u32>,
    pub ops: Vec<CursorOp>,
    pub from_last: bool,
}

impl<'a> arbitrary::Arbitrary<'a> for CursorEquivalenceInput {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let from_last = bool::arbitrary(u)?;

        let num_values = u8::arbitrary(u)? % 100;
        let values = (0..num_values)
            .map(|_| u32::arbitrary(u))
            .collect::<arbitrary::Result<_>>()?;

        let num_ops = u16::arbitrary(u)? % 1000;
        let ops = (0..num_ops)
            .map(|_| CursorOp::arbitrary(u))
            .collect::<arbitrary::Result<_>>()?;

        Ok(CursorEquivalenceInput {
            values,
            ops,
            from_last,
        })
    }
}

// Sorted values with a position; `None` is the ghost between the last and first values.
struct VecCursor {
    items: Vec<u32>,
    pos: Option<usize>,
}

impl VecCursor {
    fn neighbor(&self, forward: bool) -> Option<usize> {
        let len = self.items.len();

        match (self.pos, forward) {
            (Some(i), true) => (i + 1 < len).then_some(i + 1),
            (Some(i), false) => i.checked_sub(1),
            (None, true) => (len > 0).then_some(0),
            (None, false) => len.checked_sub(1),
        }
    }

    fn get(&self) -> Option<&u32> {
        self.pos.map(|i| &self.items[i])
    }

    fn peek(&self, forward: bool) -> Option<&u32> {
        self.neighbor(forward).map(|i| &self.items[i])
    }

    fn step(&mut self, forward: bool) {
        self.pos = self.neighbor(forward);
    }

    fn remove(&mut self, forward: bool) -> Option<u32> {
        let i = self.pos?;
        let next = self.neighbor(forward);
        let removed = self.items.remove(i);

        // Positions after the removed value shift down by one.
        self.pos = next.map(|n| if n > i { n - 1 } else { n });
        Some(removed)
    }
}

/// Checks a mutable cursor over a tree built from `values` against a position in the same values
/// sorted. Duplicates are kept; equal keys are interchangeable for the comparison.
///
/// The cursor starts at the maximum if `from_last` is set and at the minimum otherwise.
pub fn run_cursor_equivalence(values: Vec<u32>, ops: Vec<CursorOp>, from_last: bool) {
    let mut items = values.clone();
    items.sort_unstable();

    let mut avl: AvlTree<TestNode> = AvlTree::new();
    for value in values {
        avl.insert(TestNode::new(value));
    }

    let mut model = VecCursor { items, pos: None };
    model.step(!from_last);

    let mut cursor = if from_last {
        avl.cursor_last_mut()
    } else {
        avl.cursor_first_mut()
    };

    for (op_id, op) in ops.into_iter().enumerate() {
        match op {
            CursorOp::MoveNext => {
                model.step(true);
                cursor.move_next();
            }

            CursorOp::MovePrev => {
                model.step(false);
                cursor.move_prev();
            }

            CursorOp::PeekNext => {
                let w = cursor.peek_next().map(TestNode::key);
                assert_eq!(model.peek(true), w, "CursorOp #{op_id}: {op:?}");
            }

            CursorOp::PeekPrev => {
                let w = cursor.peek_prev().map(TestNode::key);
                assert_eq!(model.peek(false), w, "CursorOp #{op_id}: {op:?}");
            }

            CursorOp::RemoveCurrent => {
                let w = cursor.remove_current().map(|node| node.key);
                assert_eq!(model.remove(true), w, "CursorOp #{op_id}: {op:?}");
            }

            CursorOp::RemoveCurrentMovePrev => {
                let w = cursor.remove_current_and_move_prev().map(|node| node.key);
                assert_eq!(model.remove(false), w, "CursorOp #{op_id}: {op:?}");
            }
        }

        assert_eq!(model.get(), cursor.get().map(TestNode::key), "after #{op_id}");

        let (prev, next) = cursor.as_cursor().neighbors();
        assert_eq!(
            (model.peek(false), model.peek(true)),
            (prev.map(TestNode::key), next.map(TestNode::key)),
            "neighbors after #{op_id}"
        );
    }

    drop(cursor);
    avl.assert_invariants();
    assert!(avl.iter().map(TestNode::key).eq(model.items.iter()));
}
