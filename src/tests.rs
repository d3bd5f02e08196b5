extern crate std;

use std::{ops::Range, prelude::v1::*};

use proptest::prelude::*;

use crate::model::{self, TestNode};

use super::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn insert_find_all(keys: &[u32]) {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        assert_eq!(unsafe { node.as_ref().key() }, key);
    }
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn two_elems_find() {
    insert_find_all(&[0, 1]);
    insert_find_all(&[1, 0]);
}

#[test]
fn three_elems_find() {
    insert_find_all(&[0, 1, 2]);
    insert_find_all(&[0, 2, 1]);
    insert_find_all(&[1, 0, 2]);
    insert_find_all(&[1, 2, 0]);
    insert_find_all(&[2, 0, 1]);
    insert_find_all(&[2, 1, 0]);
}

// Every permutation of `0..n`, in lexicographic order.
fn permutations(n: u32) -> Vec<Vec<u32>> {
    if n == 0 {
        return vec![vec![]];
    }

    let mut out = Vec::new();
    for first in 0..n {
        for rest in permutations(n - 1) {
            let mut perm = vec![first];
            perm.extend(rest.into_iter().map(|k| if k >= first { k + 1 } else { k }));
            out.push(perm);
        }
    }

    out
}

#[test]
fn four_elems_find() {
    for keys in permutations(4) {
        insert_find_all(&keys);
    }
}

#[test]
fn five_elems_find() {
    for keys in permutations(5) {
        insert_find_all(&keys);
    }
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        let removed = unsafe { tree.remove_at(node) }.expect("item not a member");
        assert_eq!(removed.key, *key);
        tree.assert_invariants();
    }

    for &key in keys {
        tree.insert(TestNode::new(key));
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        let node = tree.get_raw(key).expect("item not found");
        let removed = unsafe { tree.remove_at(node) }.expect("item not a member");
        assert_eq!(removed.key, *key);
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn remove_two() {
    insert_remove_all(&[0, 1]);
    insert_remove_all(&[1, 0]);
}

#[test]
fn remove_three() {
    insert_remove_all(&[0, 1, 2]);
    insert_remove_all(&[0, 2, 1]);
    insert_remove_all(&[1, 0, 2]);
    insert_remove_all(&[1, 2, 0]);
    insert_remove_all(&[2, 0, 1]);
    insert_remove_all(&[2, 1, 0]);
}

#[test]
fn remove_four() {
    for keys in permutations(4) {
        insert_remove_all(&keys);
    }
}

#[test]
fn remove_five() {
    for keys in permutations(5) {
        insert_remove_all(&keys);
    }
}

#[derive(Debug)]
#[repr(C)]
struct NameNode {
    links: Links<NameNode>,
    key: &'static str,
}

unsafe impl Linked<Links<NameNode>> for NameNode {
    type Handle = Box<NameNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::from(Box::leak(r))
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<NameNode>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<NameNode>> for NameNode {
    type Key = &'static str;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

const NAMES: [&str; 9] = [
    "les", "cathy", "sam", "frank", "nancy", "violet", "tony", "wendy", "alex",
];

fn name_tree(names: &[&'static str]) -> AvlTree<NameNode> {
    let mut tree = AvlTree::new();

    for &key in names {
        tree.insert(Box::new(NameNode {
            links: Links::new(),
            key,
        }));
        tree.assert_invariants();
    }

    tree
}

fn keys<'a>(nodes: impl Iterator<Item = &'a NameNode>) -> Vec<&'static str> {
    nodes.map(|node| node.key).collect()
}

fn level_order(tree: &AvlTree<NameNode>) -> Vec<&'static str> {
    keys(tree.traverse(Order::LevelOrder))
}

fn remove_name(tree: &mut AvlTree<NameNode>, key: &str) {
    let node = NonNull::from(tree.get(key).expect("name not found").get_ref());
    let removed = unsafe { tree.remove_at(node) }.expect("name not a member");

    assert_eq!(removed.key, key);
    tree.assert_invariants();
}

#[test]
fn single_rotations() {
    init_logging();

    let tree = name_tree(&["les", "cathy", "alex"]);
    assert_eq!(level_order(&tree), ["cathy", "alex", "les"]);

    let tree = name_tree(&["les", "sam", "violet"]);
    assert_eq!(level_order(&tree), ["sam", "les", "violet"]);
}

#[test]
fn double_rotations() {
    init_logging();

    let tree = name_tree(&["les", "cathy", "frank"]);
    assert_eq!(level_order(&tree), ["frank", "cathy", "les"]);

    let tree = name_tree(&["les", "sam", "nancy"]);
    assert_eq!(level_order(&tree), ["nancy", "les", "sam"]);
}

#[test]
fn nine_names_shape() {
    let tree = name_tree(&NAMES);

    assert_eq!(
        level_order(&tree),
        ["les", "cathy", "sam", "alex", "frank", "nancy", "violet", "tony", "wendy"]
    );
    assert_eq!(tree.height(), 4);
    assert!(tree.is_balanced());
    assert_eq!(tree.root().map(|root| root.key), Some("les"));
}

#[test]
fn removals_rebalance() {
    init_logging();

    let mut tree = name_tree(&NAMES);

    // Successor is the immediate right child.
    remove_name(&mut tree, "cathy");
    assert_eq!(
        level_order(&tree),
        ["les", "frank", "sam", "alex", "nancy", "violet", "tony", "wendy"]
    );

    // No right child; removal unbalances the root.
    remove_name(&mut tree, "frank");
    assert_eq!(
        level_order(&tree),
        ["sam", "les", "violet", "alex", "nancy", "tony", "wendy"]
    );

    remove_name(&mut tree, "violet");
    assert_eq!(level_order(&tree), ["sam", "les", "wendy", "alex", "nancy", "tony"]);

    // Root whose successor sits deeper in the right subtree.
    remove_name(&mut tree, "sam");
    assert_eq!(level_order(&tree), ["tony", "les", "wendy", "alex", "nancy"]);

    assert_eq!(tree.len(), 5);
    assert_eq!(keys(tree.iter()), ["alex", "les", "nancy", "tony", "wendy"]);
}

#[test]
fn traversal_orders() {
    let tree = name_tree(&NAMES);

    assert_eq!(
        keys(tree.traverse(Order::InOrder)),
        ["alex", "cathy", "frank", "les", "nancy", "sam", "tony", "violet", "wendy"]
    );
    assert_eq!(
        keys(tree.traverse(Order::PreOrder)),
        ["les", "cathy", "alex", "frank", "sam", "nancy", "violet", "tony", "wendy"]
    );
    assert_eq!(
        keys(tree.traverse(Order::PostOrder)),
        ["alex", "frank", "cathy", "nancy", "tony", "wendy", "violet", "sam", "les"]
    );
    assert_eq!(keys(tree.iter()), keys(tree.traverse(Order::InOrder)));
}

#[test]
fn traversals_restart() {
    let tree = name_tree(&NAMES);

    for order in [
        Order::InOrder,
        Order::PreOrder,
        Order::PostOrder,
        Order::LevelOrder,
    ] {
        let first = keys(tree.traverse(order));
        let second = keys(tree.traverse(order));

        assert_eq!(first.len(), NAMES.len(), "{order:?}");
        assert_eq!(first, second, "{order:?}");
    }
}

#[test]
fn subtree_traversal() {
    let tree = name_tree(&NAMES);
    let sam = tree.cursor_at("sam").expect("sam not found");

    assert!(sam.has_left_child());
    assert!(sam.has_right_child());
    assert!(!sam.is_leaf());
    assert_eq!(sam.height(), 3);
    assert_eq!(
        keys(sam.subtree(Order::PreOrder)),
        ["sam", "nancy", "violet", "tony", "wendy"]
    );
    assert_eq!(
        keys(sam.subtree(Order::LevelOrder)),
        ["sam", "nancy", "violet", "tony", "wendy"]
    );

    let tony = tree.cursor_at("tony").expect("tony not found");
    assert!(tony.is_leaf());
    assert_eq!(tony.height(), 1);
    assert_eq!(keys(tony.subtree(Order::PostOrder)), ["tony"]);
}

#[test]
fn successors_and_predecessors() {
    let tree = name_tree(&NAMES);

    let next = |key: &str| tree.cursor_at(key).and_then(|c| c.peek_next()).map(|n| n.key);
    let prev = |key: &str| tree.cursor_at(key).and_then(|c| c.peek_prev()).map(|n| n.key);

    assert_eq!(next("sam"), Some("tony"));
    assert_eq!(next("les"), Some("nancy"));
    assert_eq!(next("frank"), Some("les"));
    assert_eq!(next("wendy"), None);

    assert_eq!(prev("cathy"), Some("alex"));
    assert_eq!(prev("wendy"), Some("violet"));
    assert_eq!(prev("frank"), Some("cathy"));
    assert_eq!(prev("alex"), None);

    assert_eq!(next("bob"), None);
}

#[test]
fn nearest_neighbors() {
    let tree = name_tree(&NAMES);

    let neighbors = |key: &str| {
        let (prev, next) = tree.cursor_at(key).expect("name not found").neighbors();
        (prev.map(|n| n.key), next.map(|n| n.key))
    };

    assert_eq!(neighbors("les"), (Some("frank"), Some("nancy")));
    assert_eq!(neighbors("alex"), (None, Some("cathy")));
    assert_eq!(neighbors("wendy"), (Some("violet"), None));
}

#[test]
fn range_search() {
    let tree = name_tree(&NAMES);

    assert_eq!(
        keys(tree.range::<&str, _>("e"..="u")),
        ["frank", "les", "nancy", "sam", "tony"]
    );
    assert_eq!(
        keys(tree.range::<&str, _>("e"..="u").rev()),
        ["tony", "sam", "nancy", "les", "frank"]
    );

    // Bounds which are themselves keys.
    assert_eq!(keys(tree.range::<&str, _>("les".."sam")), ["les", "nancy"]);
    assert_eq!(keys(tree.range::<&str, _>("cathy"..="cathy")), ["cathy"]);

    assert_eq!(keys(tree.range::<&str, _>("x"..)), Vec::<&str>::new());
    assert_eq!(keys(tree.range::<&str, _>("u".."e")), Vec::<&str>::new());
    assert_eq!(keys(tree.range::<str, _>(..)).len(), NAMES.len());
}

#[test]
fn range_meets_in_the_middle() {
    let tree = name_tree(&NAMES);
    let mut range = tree.range::<&str, _>("b".."o");

    assert_eq!(range.next().map(|n| n.key), Some("cathy"));
    assert_eq!(range.next_back().map(|n| n.key), Some("nancy"));
    assert_eq!(range.next().map(|n| n.key), Some("frank"));
    assert_eq!(range.next_back().map(|n| n.key), Some("les"));
    assert!(range.next().is_none());
    assert!(range.next_back().is_none());
}

#[test]
fn search_reports_attachment_point() {
    let tree = name_tree(&NAMES);
    let root = tree.root.expect("tree is empty");

    let found = |key: &str| unsafe { tree.search(root, key).as_ref() }.key;

    // Exact matches.
    assert_eq!(found("sam"), "sam");
    assert_eq!(found("alex"), "alex");

    // Last node visited.
    assert_eq!(found("bob"), "alex");
    assert_eq!(found("zed"), "wendy");
    assert_eq!(found("ned"), "nancy");
}

#[test]
fn insertion_parent() {
    let tree = name_tree(&NAMES);
    let parent = |key: &str| tree.find_insertion_parent(key).map(|n| n.key);

    assert_eq!(parent("bob"), Some("alex"));
    assert_eq!(parent("zed"), Some("wendy"));
    // Duplicates go to the right of their equal.
    assert_eq!(parent("les"), Some("nancy"));

    let empty: AvlTree<NameNode> = AvlTree::new();
    assert!(empty.find_insertion_parent("les").is_none());
}

#[test]
fn remove_root_with_one_child() {
    init_logging();

    // Right child only.
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    tree.insert(TestNode::new(1));
    tree.insert(TestNode::new(2));

    assert_eq!(tree.remove(&1).map(|n| n.key), Some(1));
    tree.assert_invariants();
    assert_eq!(tree.root().map(|n| n.key), Some(2));
    assert_eq!(tree.height(), 1);

    // Left child only.
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    tree.insert(TestNode::new(2));
    tree.insert(TestNode::new(1));

    assert_eq!(tree.remove(&2).map(|n| n.key), Some(2));
    tree.assert_invariants();
    assert_eq!(tree.root().map(|n| n.key), Some(1));

    assert_eq!(tree.remove(&1).map(|n| n.key), Some(1));
    assert!(tree.is_empty());
    assert!(tree.root().is_none());
}

#[test]
fn remove_detached_node() {
    init_logging();

    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in 0..8 {
        tree.insert(TestNode::new(key));
    }

    // Never inserted.
    let loose = TestNode::new(3);
    assert!(!loose.links.is_linked());
    assert_eq!(
        unsafe { tree.remove_at(NonNull::from(&*loose)) }.err(),
        Some(Error::Detached)
    );

    // Already removed.
    let node = tree.get_raw(&5).expect("item not found");
    let removed = unsafe { tree.remove_at(node) }.expect("item not a member");
    assert!(!removed.links.is_linked());
    assert_eq!(
        unsafe { tree.remove_at(NonNull::from(&*removed)) }.err(),
        Some(Error::Detached)
    );

    assert_eq!(tree.len(), 7);
    tree.assert_invariants();
}

#[test]
fn remove_foreign_node() {
    init_logging();

    let mut ours: AvlTree<TestNode> = AvlTree::new();
    let mut theirs: AvlTree<TestNode> = AvlTree::new();
    for key in 0..8 {
        ours.insert(TestNode::new(key));
        theirs.insert(TestNode::new(key));
    }

    // A leaf and the root of the other tree.
    let leaf = theirs.get_raw(&7).expect("item not found");
    let root = theirs.root.expect("tree is empty");

    for node in [leaf, root] {
        assert_eq!(
            unsafe { ours.remove_at(node) }.err(),
            Some(Error::ForeignNode)
        );
    }

    assert_eq!(ours.len(), 8);
    assert_eq!(theirs.len(), 8);
    ours.assert_invariants();
    theirs.assert_invariants();
}

#[test]
fn duplicates_by_handle() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    let mut sevens = Vec::new();
    for key in [7, 3, 7, 9, 7, 1] {
        let node = TestNode::new(key);
        if key == 7 {
            sevens.push(NonNull::from(&*node));
        }
        tree.insert(node);
        tree.assert_invariants();
    }

    assert_eq!(tree.range(7..=7).count(), 3);

    // Equal keys keep their insertion order.
    let in_order: Vec<_> = tree
        .range(7..=7)
        .map(|node| NonNull::from(node))
        .collect();
    assert_eq!(in_order, sevens);

    // Remove the middle occurrence specifically.
    let removed = unsafe { tree.remove_at(sevens[1]) }.expect("item not a member");
    assert_eq!(NonNull::from(&*removed), sevens[1]);
    tree.assert_invariants();

    let remaining: Vec<_> = tree
        .range(7..=7)
        .map(|node| NonNull::from(node))
        .collect();
    assert_eq!(remaining, [sevens[0], sevens[2]]);
}

#[test]
fn empty_tree_queries() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    assert!(tree.is_empty());
    assert_eq!(tree.height(), 0);
    assert!(tree.is_balanced());
    assert!(tree.root().is_none());
    assert!(tree.first().is_none());
    assert!(tree.last().is_none());
    assert!(tree.get(&0).is_none());
    assert!(tree.range(0..10).next().is_none());
    assert!(tree.pop_first().is_none());
    assert!(tree.pop_last().is_none());
    assert!(tree.remove(&0).is_none());
    assert!(tree.cursor_first().get().is_none());

    for order in [
        Order::InOrder,
        Order::PreOrder,
        Order::PostOrder,
        Order::LevelOrder,
    ] {
        assert!(tree.traverse(order).next().is_none());
    }

    tree.assert_invariants();
}

#[test]
fn height_stays_logarithmic() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    // Ascending insertion degenerates an unbalanced tree into a list.
    for key in 0..1023 {
        tree.insert(TestNode::new(key));
    }

    tree.assert_invariants();
    assert!(tree.is_balanced());
    assert_eq!(tree.height(), 10);

    for key in (0..1023).step_by(2) {
        assert!(tree.remove(&key).is_some());
    }

    tree.assert_invariants();
    assert_eq!(tree.len(), 511);
    assert!(tree.height() <= 12);
}

#[test]
fn dotgraph_labels_heights() {
    let tree = name_tree(&["les", "cathy", "sam"]);

    let mut out = String::new();
    tree.dotgraph("names", &mut out).expect("formatting failed");

    assert!(out.starts_with("digraph \"graph-names\""));
    assert!(out.contains("[label=\"les:2\"]"));
    assert!(out.contains("[label=\"cathy:1\"]"));
    assert!(out.contains("\"graphnames-les\" -> \"graphnames-sam\";"));
}

#[test]
fn debug_lists_keys() {
    let tree = name_tree(&["les", "cathy", "sam"]);

    assert_eq!(format!("{tree:?}"), r#"{"cathy", "les", "sam"}"#);
}

#[test]
fn cursor_walks_backwards_from_last() {
    let tree = name_tree(&NAMES);

    let mut cursor = tree.cursor_last();
    let mut walked = Vec::new();
    while let Some(node) = cursor.get() {
        walked.push(node.key);
        cursor.move_prev();
    }

    let mut expected = keys(tree.iter());
    expected.reverse();
    assert_eq!(walked, expected);

    // Past the first element is the ghost, which wraps around to the last.
    cursor.move_prev();
    assert_eq!(cursor.get().map(|n| n.key), Some("wendy"));
}

#[test]
fn mutable_cursor_removes_duplicates() {
    init_logging();

    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in [4, 2, 4, 6, 4, 1, 5] {
        tree.insert(TestNode::new(key));
    }

    {
        let mut cursor = tree.cursor_at_mut(&4).expect("item not found");
        assert_eq!(cursor.get().map(|n| n.key), Some(4));

        let removed = cursor.remove_current().expect("cursor at ghost");
        assert_eq!(removed.key, 4);
    }
    tree.assert_invariants();
    assert_eq!(tree.range(4..=4).count(), 2);

    while let Some(mut cursor) = tree.cursor_at_mut(&4) {
        assert!(cursor.remove_current_and_move_prev().is_some());
    }
    tree.assert_invariants();
    assert!(tree.cursor_at_mut(&4).is_none());
    assert_eq!(
        tree.iter().map(|n| n.key).collect::<Vec<_>>(),
        [1, 2, 5, 6]
    );
}

#[test]
fn mutable_cursor_from_last() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in 0..10 {
        tree.insert(TestNode::new(key));
    }

    let mut cursor = tree.cursor_last_mut();
    assert_eq!(cursor.get().map(|n| n.key), Some(9));
    assert!(cursor.peek_next().is_none());
    assert_eq!(cursor.peek_prev().map(|n| n.key), Some(8));

    // Removing the maximum leaves the cursor at the ghost.
    assert_eq!(cursor.remove_current().map(|n| n.key), Some(9));
    assert!(cursor.get().is_none());

    cursor.move_prev();
    assert_eq!(cursor.get().map(|n| n.key), Some(8));
    drop(cursor);

    tree.assert_invariants();
    assert_eq!(tree.len(), 9);
}

#[test]
fn read_only_view_of_mutable_cursor() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in [3, 1, 4, 1, 5, 9, 2, 6] {
        tree.insert(TestNode::new(key));
    }

    let key = |n: Option<&TestNode>| n.map(|n| n.key);
    let mut cursor = tree.cursor_first_mut();

    loop {
        let expected = (key(cursor.peek_prev()), key(cursor.peek_next()));
        let view = cursor.as_cursor();

        assert_eq!(key(view.get()), key(cursor.get()));
        let (prev, next) = view.neighbors();
        assert_eq!((key(prev), key(next)), expected);

        if cursor.get().is_none() {
            break;
        }
        cursor.move_next();
    }
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "node is already linked into a tree")]
fn insert_linked_node() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in 0..4 {
        tree.insert(TestNode::new(key));
    }

    // A second handle to a member. `insert` leaks it before panicking, so it is never freed twice.
    let member = tree.get_raw(&2).expect("item not found");
    tree.insert(unsafe { Box::from_raw(member.as_ptr()) });
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }

    #[test]
    fn cursor_equivalence(
        values in proptest::collection::vec(0u32..200, 0..100),
        ops in proptest::collection::vec(model::cursor_op_strategy(), FUZZ_RANGE),
        from_last in proptest::bool::ANY,
    ) {
        model::run_cursor_equivalence(values, ops, from_last);
    }
}
