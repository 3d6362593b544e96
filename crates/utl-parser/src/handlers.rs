//! Ready-made [`Handler`](crate::Handler) implementations.
//!
//! - [`ParseTreeHandler`] builds one node per reduction, mirroring the grammar.
//! - [`AstHandler`] builds a compact abstract syntax tree.
//! - [`PrinterHandler`] builds nothing and logs every reduction.

mod ast;
mod parse_tree;
mod printer;

pub use ast::AstHandler;
pub use parse_tree::ParseTreeHandler;
pub use printer::PrinterHandler;

use utl_core::{AttrMap, NodeError, NodeId, Tree};

use crate::handler::{HandlerResult, Reduction};

/// Reduce one step of a recursive list production into a new node holding
/// `first` and `second` in source order.
///
/// The children are adopted as given; a child that already belongs to
/// another node is copied by the tree, so no earlier node is changed.
fn link(
    r: &mut Reduction<'_>,
    symbol: &str,
    first: Option<NodeId>,
    second: Option<NodeId>,
) -> HandlerResult {
    let context = r.context();
    r.tree()
        .new_node(symbol, context, first.into_iter().chain(second))
        .map(Some)
}

/// The items of a list built by [`link`], in source order.
///
/// Nested links carrying the list's own symbol are expanded in place.
fn list_items(tree: &Tree, list: NodeId) -> Vec<NodeId> {
    let symbol = tree.symbol(list);
    let mut items = Vec::new();
    let mut pending = vec![list];
    while let Some(id) = pending.pop() {
        if tree.symbol(id) == symbol {
            pending.extend(tree.children(id).iter().rev());
        } else {
            items.push(id);
        }
    }
    items
}

/// `body`, or an empty `statement_list` with no context standing in for it.
fn body_or_placeholder(tree: &mut Tree, body: Option<NodeId>) -> Result<NodeId, NodeError> {
    match body {
        Some(body) => Ok(body),
        None => tree.new_node("statement_list", AttrMap::new(), []),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;

    #[test]
    fn test_link_builds_new_nodes() {
        let mut tree = Tree::new();
        let a = tree.new_node("a", AttrMap::new(), []).unwrap();
        let b = tree.new_node("b", AttrMap::new(), []).unwrap();

        let mut r = Reduction::new(&mut tree, "ab", "f", Span::new(1..2), 1);
        let tail = link(&mut r, "list", Some(b), None).unwrap().unwrap();
        let mut r = Reduction::new(&mut tree, "ab", "f", Span::new(0..2), 1);
        let list = link(&mut r, "list", Some(a), Some(tail)).unwrap().unwrap();

        assert_ne!(list, tail);
        assert_eq!(tree.children(list), &[a, tail]);
        assert_eq!(tree.children(tail), &[b]);
        assert_eq!(tree.attributes(tail).get_usize("start"), Some(1));
        assert_eq!(tree.attributes(list).get_usize("start"), Some(0));
    }

    #[test]
    fn test_link_leaves_owned_children_alone() {
        let mut tree = Tree::new();
        let a = tree.new_node("a", AttrMap::new(), []).unwrap();
        let owner = tree.new_node("owner", AttrMap::new(), [a]).unwrap();

        let mut r = Reduction::new(&mut tree, "a", "f", Span::new(0..1), 1);
        let list = link(&mut r, "list", Some(a), None).unwrap().unwrap();

        assert_eq!(tree.children(owner), &[a]);
        assert_eq!(tree.parent(a), Some(owner));
        assert_ne!(tree.children(list)[0], a);
    }

    #[test]
    fn test_list_items_expands_nested_links() {
        let mut tree = Tree::new();
        let [a, b, c] = ["a", "b", "c"].map(|s| tree.new_node(s, AttrMap::new(), []).unwrap());
        let inner = tree.new_node("list", AttrMap::new(), [c]).unwrap();
        let middle = tree.new_node("list", AttrMap::new(), [b, inner]).unwrap();
        let left = tree.new_node("list", AttrMap::new(), [a]).unwrap();
        let outer = tree.new_node("list", AttrMap::new(), [left, middle]).unwrap();

        assert_eq!(list_items(&tree, outer), vec![a, b, c]);
        assert_eq!(list_items(&tree, inner), vec![c]);
    }

    #[test]
    fn test_placeholder_has_no_context() {
        let mut tree = Tree::new();
        let id = body_or_placeholder(&mut tree, None).unwrap();
        assert_eq!(tree.symbol(id), "statement_list");
        assert!(tree.attributes(id).is_empty());
    }
}
