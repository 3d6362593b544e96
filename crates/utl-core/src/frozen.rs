//! Immutable, hashable tree nodes.
//!
//! A [`FrozenNode`] is a deep structural snapshot of a node and its subtree.
//! It can be shared freely, compared in constant time when two handles point
//! at the same snapshot, and used as a set member or map key. Its structural
//! hash is computed once at construction.

use std::{
    fmt,
    hash::{DefaultHasher, Hash, Hasher},
    sync::Arc,
};

use crate::{
    attrs::AttrMap,
    error::NodeError,
    symbol::Symbol,
    tree::{NodeId, NodeRef, Tree},
    view::NodeView,
};

struct Inner {
    symbol: Symbol,
    attributes: AttrMap,
    children: Vec<FrozenNode>,
    hash: u64,
}

/// An immutable node with structural equality and a cached structural hash.
///
/// # Examples
///
/// ```
/// use utl_core::{AttrMap, FrozenNode, NodeView, Tree};
///
/// let mut tree = Tree::new();
/// let leaf = tree.new_node("id", AttrMap::from_iter([("symbol", "a")]), [])?;
/// let root = tree.new_node("expr", AttrMap::new(), [leaf])?;
///
/// let frozen = tree.freeze(root);
/// assert_eq!(frozen, FrozenNode::from(tree.node(root)));
/// assert_eq!(frozen.child_nodes().len(), 1);
/// # Ok::<(), utl_core::NodeError>(())
/// ```
#[derive(Clone)]
pub struct FrozenNode(Arc<Inner>);

impl FrozenNode {
    /// Build a frozen node directly.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::EmptySymbol`] if `symbol` is empty.
    pub fn new(
        symbol: &str,
        attributes: AttrMap,
        children: Vec<FrozenNode>,
    ) -> Result<Self, NodeError> {
        if symbol.is_empty() {
            return Err(NodeError::EmptySymbol);
        }
        Ok(Self::build(Symbol::new(symbol), attributes, children))
    }

    fn build(symbol: Symbol, attributes: AttrMap, children: Vec<FrozenNode>) -> Self {
        let mut hasher = DefaultHasher::new();
        symbol.to_text().hash(&mut hasher);
        attributes.hash(&mut hasher);
        for kid in &children {
            kid.0.hash.hash(&mut hasher);
        }
        let hash = hasher.finish();
        Self(Arc::new(Inner {
            symbol,
            attributes,
            children,
            hash,
        }))
    }

    /// Children of this node.
    pub fn children(&self) -> &[FrozenNode] {
        &self.0.children
    }

    /// Copy the snapshot back into `tree` as a new, parentless subtree.
    pub fn unfreeze(&self, tree: &mut Tree) -> NodeId {
        let kids: Vec<NodeId> = self.0.children.iter().map(|kid| kid.unfreeze(tree)).collect();
        tree.insert_raw(self.0.symbol, self.0.attributes.clone(), kids)
    }
}

impl<'t> From<NodeRef<'t>> for FrozenNode {
    fn from(node: NodeRef<'t>) -> Self {
        let kids = node.child_nodes().into_iter().map(FrozenNode::from).collect();
        Self::build(node.symbol(), node.attributes().clone(), kids)
    }
}

impl<'a> NodeView<'a> for &'a FrozenNode {
    fn symbol(self) -> Symbol {
        self.0.symbol
    }

    fn attributes(self) -> &'a AttrMap {
        &self.0.attributes
    }

    fn child_nodes(self) -> Vec<Self> {
        self.0.children.iter().collect()
    }
}

impl PartialEq for FrozenNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.hash == other.0.hash
                && self.0.symbol == other.0.symbol
                && self.0.attributes == other.0.attributes
                && self.0.children == other.0.children)
    }
}

impl Eq for FrozenNode {}

impl Hash for FrozenNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash);
    }
}

impl fmt::Display for FrozenNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_line())
    }
}

impl fmt::Debug for FrozenNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kids: Vec<String> = self.0.children.iter().map(|k| k.0.symbol.to_text()).collect();
        write!(
            f,
            "FrozenNode(\"{}\", ..., [{}])",
            self.0.symbol,
            kids.join(", ")
        )
    }
}
