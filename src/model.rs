use std::{collections::BTreeMap, mem, prelude::v1::*, ptr::NonNull};

use arbitrary::Arbitrary;
use cordyceps::Linked;
use proptest::strategy::{Just, Strategy};

use crate::{Error, Links, RbMap, TreeNode};

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

/// How an operation picks its key.
#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum KeyChoice {
    /// The `n`th key currently in the map, modulo its length. Used verbatim when the map is empty.
    Present(usize),

    /// An arbitrary key, usually absent.
    Any(u32),
}

impl KeyChoice {
    fn resolve(self, present: &[u32]) -> u32 {
        match self {
            KeyChoice::Present(n) if present.is_empty() => n as u32,
            KeyChoice::Present(n) => present[n % present.len()],
            KeyChoice::Any(key) => key,
        }
    }
}

fn key_strategy() -> impl Strategy<Value = KeyChoice> {
    proptest::prop_oneof![
        (0usize..1000).prop_map(KeyChoice::Present),
        (0u32..1000).prop_map(KeyChoice::Any),
    ]
}

/// A map operation, replayed against both [`RbMap`] and [`BTreeMap`].
#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    Insert(KeyChoice),
    Get(KeyChoice),
    Remove(KeyChoice),
    RemoveWith(KeyChoice),
    First,
    PopFirst,
    Last,
    PopLast,
    Destroy,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        8 => key_strategy().prop_map(Op::Insert),
        4 => key_strategy().prop_map(Op::Get),
        3 => key_strategy().prop_map(Op::Remove),
        3 => key_strategy().prop_map(Op::RemoveWith),
        1 => Just(Op::First),
        1 => Just(Op::PopFirst),
        1 => Just(Op::Last),
        1 => Just(Op::PopLast),
        1 => Just(Op::Destroy),
    ]
}

// Payload stored alongside each key, distinct from the key so that lookups check the pairing.
fn payload(key: u32) -> u64 {
    (u64::from(key) << 8) | 0xab
}

/// Runs `ops` against both an [`RbMap`] and a [`BTreeMap`], asserting identical results and the
/// red-black invariants after every step.
pub fn run_btree_equivalence(ops: Vec<Op>) {
    let mut btree = BTreeMap::new();
    let mut rb: RbMap<u32, u64> = RbMap::new();
    let mut present: Vec<u32> = Vec::with_capacity(ops.len());

    for (op_id, op) in ops.into_iter().enumerate() {
        present.clear();
        present.extend(btree.keys().copied());

        match op {
            Op::Insert(choice) => {
                let key = choice.resolve(&present);

                let from_btree = !btree.contains_key(&key);
                if from_btree {
                    btree.insert(key, payload(key));
                }
                let from_rb = rb.insert(key, payload(key));

                assert_eq!(
                    from_rb,
                    if from_btree { Ok(()) } else { Err(Error::DuplicateKey) },
                    "op #{op_id}: insert {key}"
                );
            }

            Op::Get(choice) => {
                let key = choice.resolve(&present);

                assert_eq!(btree.get(&key), rb.get(&key), "op #{op_id}: get {key}");
                assert_eq!(btree.contains_key(&key), rb.contains_key(&key));
            }

            Op::Remove(choice) => {
                let key = choice.resolve(&present);

                let from_btree = btree.remove(&key).ok_or(Error::MissingKey);
                let from_rb = rb.remove(&key);

                assert_eq!(from_btree, from_rb, "op #{op_id}: remove {key}");
            }

            Op::RemoveWith(choice) => {
                let key = choice.resolve(&present);

                let from_btree = btree.remove(&key);
                let mut released = None;
                let result = rb.remove_with(&key, |value| {
                    assert!(released.replace(value).is_none(), "callback ran twice");
                });

                assert_eq!(result.is_ok(), from_btree.is_some());
                assert_eq!(from_btree, released, "op #{op_id}: remove_with {key}");
            }

            Op::First => {
                assert_eq!(btree.first_key_value(), rb.first_key_value(), "op #{op_id}");
            }

            Op::PopFirst => {
                assert_eq!(btree.pop_first(), rb.pop_first(), "op #{op_id}");
            }

            Op::Last => {
                assert_eq!(btree.last_key_value(), rb.last_key_value(), "op #{op_id}");
            }

            Op::PopLast => {
                assert_eq!(btree.pop_last(), rb.pop_last(), "op #{op_id}");
            }

            Op::Destroy => {
                let mut released = Vec::with_capacity(rb.len());
                mem::take(&mut rb).destroy(|key, value| released.push((key, value)));

                let expected: Vec<(u32, u64)> = mem::take(&mut btree).into_iter().collect();
                assert_eq!(expected, released, "op #{op_id}: destroy");
                assert_eq!(rb.height(), 0);
            }
        }

        rb.assert_invariants();
        assert_eq!(btree.len(), rb.len());
        assert!(btree.iter().eq(rb.iter()));

        // A red-black tree with `n` nodes is at most `2 * log2(n + 1)` levels deep.
        let log2_ceil = (usize::BITS - rb.len().leading_zeros()) as usize;
        assert!(rb.exact_height() <= 2 * log2_ceil);
    }
}
