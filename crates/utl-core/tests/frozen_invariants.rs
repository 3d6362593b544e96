//! Property tests for frozen nodes built through the public API.

use std::hash::{DefaultHasher, Hash, Hasher};

use proptest::prelude::*;
use utl_core::{AttrMap, FrozenNode, NodeId, NodeView, Tree, Value};

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Build a chain of `expr` nodes whose leaves carry the given numbers.
fn build(tree: &mut Tree, numbers: &[i64]) -> NodeId {
    let leaves: Vec<NodeId> = numbers
        .iter()
        .map(|n| {
            tree.new_node(
                "literal",
                AttrMap::from_iter([("type", Value::from("number")), ("value", Value::from(*n))]),
                [],
            )
            .unwrap()
        })
        .collect();
    tree.new_node("expr", AttrMap::from_iter([("operator", "+")]), leaves)
        .unwrap()
}

#[test]
fn test_frozen_in_nested_attribute() {
    let mut tree = Tree::new();
    let inner = build(&mut tree, &[1, 2]);
    let frozen = tree.freeze(inner);
    let outer = tree
        .new_node("literal", AttrMap::from_iter([("value", frozen.clone())]), [])
        .unwrap();

    let snapshot = tree.freeze(outer);
    let nested = snapshot.attributes().get("value").and_then(Value::as_node);
    assert_eq!(nested, Some(&frozen));
}

#[test]
fn test_frozen_direct_construction_matches_tree() {
    let kid = FrozenNode::new("id", AttrMap::from_iter([("symbol", "a")]), vec![]).unwrap();
    let root = FrozenNode::new("expr", AttrMap::new(), vec![kid]).unwrap();

    let mut tree = Tree::new();
    let a = tree
        .new_node("id", AttrMap::from_iter([("symbol", "a")]), [])
        .unwrap();
    let expr = tree.new_node("expr", AttrMap::new(), [a]).unwrap();

    assert_eq!(root, tree.freeze(expr));
    assert_eq!(hash_of(&root), hash_of(&tree.freeze(expr)));
}

proptest! {
    #[test]
    fn test_equal_nodes_hash_equal(numbers in proptest::collection::vec(-50i64..50, 0..6)) {
        let mut first = Tree::new();
        let mut second = Tree::new();
        // Pad the second arena so the ids differ.
        second.new_node("padding", AttrMap::new(), []).unwrap();

        let a = build(&mut first, &numbers);
        let b = build(&mut second, &numbers);

        let fa = first.freeze(a);
        let fb = second.freeze(b);
        prop_assert_eq!(&fa, &fb);
        prop_assert_eq!(hash_of(&fa), hash_of(&fb));
        prop_assert_eq!(first.node(a), second.node(b));
    }

    #[test]
    fn test_copy_preserves_equality(numbers in proptest::collection::vec(0i64..10, 1..6)) {
        let mut tree = Tree::new();
        let root = build(&mut tree, &numbers);
        let copy = tree.copy(root);
        prop_assert_eq!(tree.node(root), tree.node(copy));
        prop_assert!(tree.parent(copy).is_none());
        for &kid in tree.children(copy) {
            prop_assert_eq!(tree.parent(kid), Some(copy));
        }
    }

    #[test]
    fn test_thaw_round_trip(numbers in proptest::collection::vec(0i64..10, 0..6)) {
        let mut tree = Tree::new();
        let root = build(&mut tree, &numbers);
        let frozen = tree.freeze(root);
        let thawed = tree.thaw(&frozen);
        prop_assert_eq!(tree.freeze(thawed), frozen);
    }
}
