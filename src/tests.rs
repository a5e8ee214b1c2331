extern crate std;

use std::{ops::Range, prelude::v1::*};

use proptest::prelude::*;

use crate::model::{self, TestNode};

use super::*;

fn tree_of(keys: &[u32]) -> RbTree<TestNode> {
    let mut tree: RbTree<TestNode> = RbTree::new();

    for &key in keys {
        assert!(tree.insert(TestNode::new(key)).is_ok(), "duplicate {key}");
        tree.assert_invariants();
    }

    tree
}

fn shape(tree: &RbTree<TestNode>) -> String {
    tree.visual_with(Style::Shape).to_string()
}

fn insert_find_all(keys: &[u32]) {
    let tree = tree_of(keys);

    for key in keys {
        let node = tree.get(key).expect("item not found");
        assert_eq!(node.key(), key);
    }

    assert_eq!(tree.len(), keys.len());
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

// Calls `f` with every permutation of `keys`.
fn for_each_permutation(keys: &mut [u32], k: usize, f: &mut impl FnMut(&[u32])) {
    if k == keys.len() {
        f(keys);
        return;
    }

    for i in k..keys.len() {
        keys.swap(k, i);
        for_each_permutation(keys, k + 1, f);
        keys.swap(k, i);
    }
}

#[test]
fn five_elems_find() {
    for_each_permutation(&mut [0, 1, 2, 3, 4], 0, &mut insert_find_all);
}

#[test]
fn find_missing() {
    let tree = tree_of(&[10, 20, 30]);

    assert!(tree.get(&15).is_none());
    assert!(tree.get(&0).is_none());
    assert!(tree.get(&31).is_none());
    assert!(!tree.contains_key(&25));

    let empty: RbTree<TestNode> = RbTree::new();
    assert!(empty.get(&10).is_none());
    assert!(empty.first().is_none());
    assert!(empty.last().is_none());
}

#[test]
fn duplicate_is_handed_back() {
    let mut tree = tree_of(&[0xa, 0xb, 0x7]);
    let before = tree.construct_visual();

    let rejected = tree
        .insert(TestNode::new(0x7))
        .expect_err("duplicate key was accepted");
    assert_eq!(rejected.key, 0x7);

    assert_eq!(tree.len(), 3);
    assert_eq!(tree.construct_visual(), before);
    tree.assert_invariants();
}

#[test]
fn first_insert_is_black_root() {
    let tree = tree_of(&[0x4]);

    assert_eq!(tree.construct_visual(), "4");
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.height(), 0);
}

#[test]
fn uncle_red_recolors() {
    let mut tree = tree_of(&[0xa, 0xb, 0x7]);
    assert_eq!(tree.construct_visual(), "a(*7)(*b)");

    tree.insert(TestNode::new(0x5)).unwrap();
    assert_eq!(tree.construct_visual(), "a(7(*5))(b)");
    assert_eq!(tree.height(), 2);
}

#[test]
fn single_rotation() {
    let tree = tree_of(&[0xa, 0xb, 0x7, 0x5, 0x3]);

    assert_eq!(shape(&tree), "a(5(3)(7))(b)");
    assert_eq!(tree.construct_visual(), "a(5(*3)(*7))(b)");
    assert_eq!(tree.height(), 2);
    assert_eq!(tree.exact_height(), 2);
}

#[test]
fn single_rotation_mirrored() {
    let tree = tree_of(&[0x5, 0x3, 0x7, 0x9, 0xb]);

    assert_eq!(tree.construct_visual(), "5(3)(9(*7)(*b))");
}

#[test]
fn double_rotation() {
    let tree = tree_of(&[0x10, 0x14, 0xe, 0xa, 0xc]);

    assert_eq!(shape(&tree), "10(c(a)(e))(14)");
    assert_eq!(tree.construct_visual(), "10(c(*a)(*e))(14)");
    assert_eq!(tree.height(), 2);
}

#[test]
fn double_rotation_mirrored() {
    let tree = tree_of(&[0x10, 0xc, 0x14, 0x18, 0x16]);

    assert_eq!(tree.construct_visual(), "10(c)(16(*14)(*18))");
}

#[test]
fn rotation_at_root() {
    assert_eq!(tree_of(&[1, 2, 3]).construct_visual(), "2(*1)(*3)");
    assert_eq!(tree_of(&[3, 2, 1]).construct_visual(), "2(*1)(*3)");
    assert_eq!(tree_of(&[1, 3, 2]).construct_visual(), "2(*1)(*3)");
    assert_eq!(tree_of(&[3, 1, 2]).construct_visual(), "2(*1)(*3)");
}

#[test]
fn ascending_inserts_stay_balanced() {
    let keys: Vec<u32> = (0..1024).collect();
    let tree = tree_of(&keys);

    // 1024 nodes fit in 2 * log2(1025) levels.
    assert!(tree.exact_height() <= 20);
    assert!(tree.height() <= 20);
}

#[test]
fn first_and_last() {
    let tree = tree_of(&[5, 1, 9, 3, 7]);

    assert_eq!(tree.first().map(|n| n.key), Some(1));
    assert_eq!(tree.last().map(|n| n.key), Some(9));
    assert_eq!(
        tree.iter().map(|n| n.key).collect::<Vec<_>>(),
        [1, 3, 5, 7, 9]
    );
    assert_eq!(tree.iter().len(), 5);
}

#[test]
fn remove_red_leaf() {
    let mut tree = tree_of(&[0xa, 0xb, 0x7, 0x5]);
    assert_eq!(tree.construct_visual(), "a(7(*5))(b)");

    assert_eq!(tree.remove(&0x5).map(|n| n.key), Some(0x5));
    assert_eq!(tree.construct_visual(), "a(7)(b)");
    tree.assert_invariants();
}

#[test]
fn remove_black_leaf_recolors_sibling() {
    let mut tree = tree_of(&[0xa, 0xb, 0x7, 0x5]);
    tree.remove(&0x5).unwrap();

    tree.remove(&0x7).unwrap();
    assert_eq!(tree.construct_visual(), "a(*b)");
    tree.assert_invariants();
}

#[test]
fn remove_node_with_one_child() {
    let mut tree = tree_of(&[0xa, 0xb, 0x7, 0x5]);

    tree.remove(&0x7).unwrap();
    assert_eq!(tree.construct_visual(), "a(5)(b)");
    tree.assert_invariants();
}

#[test]
fn remove_uses_predecessor() {
    let mut tree = tree_of(&[0xa, 0xb, 0x7, 0x5, 0x3]);

    // The predecessor of the root is the maximum of its left subtree.
    tree.remove(&0xa).unwrap();
    assert_eq!(tree.construct_visual(), "7(5(*3))(b)");
    tree.assert_invariants();

    // The predecessor of 0x5 is its own left child.
    let mut tree = tree_of(&[0xa, 0xb, 0x7, 0x5, 0x3]);
    tree.remove(&0x5).unwrap();
    assert_eq!(tree.construct_visual(), "a(3(*7))(b)");
    tree.assert_invariants();
}

#[test]
fn remove_black_leaf_with_red_sibling() {
    let mut tree = tree_of(&[4, 2, 6, 5, 8, 9]);
    tree.remove(&9).unwrap();
    assert_eq!(tree.construct_visual(), "4(2)(*6(5)(8))");

    tree.remove(&2).unwrap();
    assert_eq!(tree.construct_visual(), "6(4(*5))(8)");
    tree.assert_invariants();
}

#[test]
fn remove_black_leaf_with_red_near_nephew() {
    let mut tree = tree_of(&[4, 2, 6, 5]);
    assert_eq!(tree.construct_visual(), "4(2)(6(*5))");

    tree.remove(&2).unwrap();
    assert_eq!(tree.construct_visual(), "5(4)(6)");
    tree.assert_invariants();
}

#[test]
fn remove_black_leaf_with_red_far_nephew() {
    let mut tree = tree_of(&[4, 2, 8, 1, 3, 6, 9, 5, 7]);
    assert_eq!(tree.construct_visual(), "4(2(*1)(*3))(*8(6(*5)(*7))(9))");

    tree.remove(&9).unwrap();
    assert_eq!(tree.construct_visual(), "4(2(*1)(*3))(*6(5)(8(*7)))");
    tree.assert_invariants();

    tree.remove(&8).unwrap();
    assert_eq!(tree.construct_visual(), "4(2(*1)(*3))(*6(5)(7))");
    tree.assert_invariants();
}

#[test]
fn remove_missing() {
    let mut tree = tree_of(&[1, 2, 3]);
    let before = tree.construct_visual();

    assert!(tree.remove(&4).is_none());
    assert_eq!(tree.construct_visual(), before);
    assert_eq!(tree.len(), 3);

    let mut empty: RbTree<TestNode> = RbTree::new();
    assert!(empty.remove(&1).is_none());
}

#[test]
fn height_is_a_high_water_mark() {
    let mut tree = tree_of(&[0xa, 0xb, 0x7, 0x5, 0x3]);
    assert_eq!(tree.height(), 2);

    for key in [0x3, 0x5, 0x7, 0xb] {
        tree.remove(&key).unwrap();
    }

    assert_eq!(tree.exact_height(), 0);
    assert_eq!(tree.height(), 2);

    tree.clear();
    assert_eq!(tree.height(), 0);
}

#[test]
fn pop_first_and_last() {
    let mut tree = tree_of(&[4, 2, 6, 1, 3, 5, 7]);

    assert_eq!(tree.pop_first().map(|n| n.key), Some(1));
    assert_eq!(tree.pop_last().map(|n| n.key), Some(7));
    tree.assert_invariants();
    assert_eq!(tree.len(), 5);
}

#[test]
fn clear_with_visits_every_node_once() {
    let keys: Vec<u32> = (0..100).map(|i| (i * 37) % 101).collect();
    let mut tree = tree_of(&keys);
    for key in [0, 37, 74] {
        tree.remove(&key).unwrap();
    }

    let expected = tree.len();
    let mut seen = Vec::new();
    tree.clear_with(|node| seen.push(node.key));

    assert_eq!(seen.len(), expected);
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
    assert!(tree.is_empty());
    assert_eq!(tree.construct_visual(), "");
    tree.assert_invariants();
}

#[test]
fn clear_with_panicking_callback_leaves_tree_droppable() {
    let mut tree = tree_of(&[4, 2, 6, 1, 3, 5, 7]);

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        tree.clear_with(|node| {
            if node.key == 3 {
                panic!("failed to release {}", node.key);
            }
        });
    }));
    assert!(result.is_err());

    // 1, 2 and 3 were detached before the callback panicked.
    assert_eq!(tree.len(), 4);
    assert_eq!(tree.iter().map(|n| n.key).collect::<Vec<_>>(), [4, 5, 6, 7]);

    // Dropping the remainder must not trip the teardown count check.
    drop(tree);
}

#[test]
fn arbitrary_ops_drive_the_model() {
    use arbitrary::{Arbitrary, Unstructured};

    let bytes: Vec<u8> = (0..8192u32)
        .map(|i| (i.wrapping_mul(0x9e37_79b9) >> 24) as u8)
        .collect();
    let mut input = Unstructured::new(&bytes);

    let ops = (0..1000)
        .map(|_| model::Op::arbitrary(&mut input))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    model::run_btree_equivalence(ops);
}

#[test]
fn model_covers_callbacks() {
    use model::{KeyChoice, Op};

    let mut ops: Vec<Op> = (0..64).map(|k| Op::Insert(KeyChoice::Any(k))).collect();
    ops.extend([
        Op::RemoveWith(KeyChoice::Any(7)),
        Op::RemoveWith(KeyChoice::Any(7)),
        Op::RemoveWith(KeyChoice::Present(10)),
        Op::Destroy,
        Op::Insert(KeyChoice::Present(3)),
        Op::Get(KeyChoice::Any(3)),
        Op::Destroy,
        Op::PopFirst,
    ]);

    model::run_btree_equivalence(ops);
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree = tree_of(keys);

    for key in keys {
        let node = tree.get_raw(key).expect("item not found");
        let removed = unsafe { tree.remove_at(node) };
        assert_eq!(removed.key, *key);
        tree.assert_invariants();
    }

    assert!(tree.is_empty());

    for &key in keys {
        tree.insert(TestNode::new(key)).unwrap();
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        assert_eq!(tree.remove(key).map(|n| n.key), Some(*key));
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
fn remove_six() {
    for_each_permutation(&mut [0, 1, 2, 3, 4, 5], 0, &mut insert_remove_all);
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
    fn insert_then_find(keys in proptest::collection::vec(any::<u32>(), 0..200)) {
        let mut tree: RbTree<TestNode> = RbTree::new();
        let mut distinct = std::collections::BTreeSet::new();

        for key in keys {
            let inserted = tree.insert(TestNode::new(key)).is_ok();
            prop_assert_eq!(inserted, distinct.insert(key));
            prop_assert_eq!(tree.get(&key).map(|n| n.key), Some(key));
        }

        tree.assert_invariants();
        prop_assert_eq!(tree.len(), distinct.len());
    }
}
