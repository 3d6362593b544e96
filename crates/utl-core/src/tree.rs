//! Arena-allocated tree nodes.
//!
//! A [`Tree`] owns every node created during a parse. Nodes are addressed by
//! [`NodeId`]; each node records its symbol, its attribute map, its ordered
//! children and its unique parent. The tree upholds two invariants:
//!
//! - every child's parent is the node in whose child list it sits, and
//! - no node is its own ancestor.
//!
//! Attaching a node that already has a parent attaches a deep copy instead,
//! so ownership is never split.

use std::fmt;

use log::trace;

use crate::{
    attrs::AttrMap, error::NodeError, frozen::FrozenNode, symbol::Symbol, view::NodeView,
};

/// Index of a node inside a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in its arena.
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    symbol: Symbol,
    attributes: AttrMap,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

/// Arena holding a forest of nodes.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<NodeData>,
}

impl Tree {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes ever allocated in this arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no node has been allocated.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create a node and attach `children` to it in order.
    ///
    /// Children that already have a parent are copied first.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::EmptySymbol`] for an empty symbol, or the error
    /// from [`Tree::add_child`] if a child cannot be attached.
    pub fn new_node(
        &mut self,
        symbol: &str,
        attributes: AttrMap,
        children: impl IntoIterator<Item = NodeId>,
    ) -> Result<NodeId, NodeError> {
        if symbol.is_empty() {
            return Err(NodeError::EmptySymbol);
        }
        let id = self.insert_raw(Symbol::new(symbol), attributes, Vec::new());
        for child in children {
            self.add_child(id, child)?;
        }
        Ok(id)
    }

    /// Allocate a node whose children are known to be parentless roots.
    pub(crate) fn insert_raw(
        &mut self,
        symbol: Symbol,
        attributes: AttrMap,
        children: Vec<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        for &child in &children {
            self.nodes[child.0].parent = Some(id);
        }
        self.nodes.push(NodeData {
            symbol,
            attributes,
            children,
            parent: None,
        });
        id
    }

    /// Borrow a node for reading.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated by this tree.
    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        assert!(id.0 < self.nodes.len(), "node id {} out of range", id.0);
        NodeRef { tree: self, id }
    }

    /// Borrow a node for reading, if `id` belongs to this tree.
    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_>> {
        (id.0 < self.nodes.len()).then_some(NodeRef { tree: self, id })
    }

    /// The node's symbol.
    pub fn symbol(&self, id: NodeId) -> Symbol {
        self.nodes[id.0].symbol
    }

    /// The node's attributes.
    pub fn attributes(&self, id: NodeId) -> &AttrMap {
        &self.nodes[id.0].attributes
    }

    /// The node's attributes viewed as positional context.
    pub fn context(&self, id: NodeId) -> &AttrMap {
        self.attributes(id)
    }

    /// Replace the node's attribute map.
    pub fn set_attributes(&mut self, id: NodeId, attributes: AttrMap) {
        self.nodes[id.0].attributes = attributes;
    }

    /// The node's children, in order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// The node's parent, if it has one.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Returns `true` if `ancestor` is `node` or lies on its parent chain.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Append `child` to `parent`'s children.
    ///
    /// Returns the id actually attached: `child` itself, or a fresh copy of it
    /// when `child` already had a parent.
    ///
    /// # Errors
    ///
    /// - [`NodeError::SelfChild`] if `child == parent`
    /// - [`NodeError::Cycle`] if `child` is a root that contains `parent`
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<NodeId, NodeError> {
        let child = self.prepare_child(parent, child)?;
        self.nodes[parent.0].children.push(child);
        Ok(child)
    }

    /// Insert `child` as the first of `parent`'s children.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Tree::add_child`].
    pub fn add_first_child(&mut self, parent: NodeId, child: NodeId) -> Result<NodeId, NodeError> {
        let child = self.prepare_child(parent, child)?;
        self.nodes[parent.0].children.insert(0, child);
        Ok(child)
    }

    /// Append every present child in order, skipping `None` entries.
    ///
    /// # Errors
    ///
    /// Stops at the first child that cannot be attached.
    pub fn add_children(
        &mut self,
        parent: NodeId,
        children: impl IntoIterator<Item = Option<NodeId>>,
    ) -> Result<(), NodeError> {
        for child in children.into_iter().flatten() {
            self.add_child(parent, child)?;
        }
        Ok(())
    }

    fn prepare_child(&mut self, parent: NodeId, child: NodeId) -> Result<NodeId, NodeError> {
        if child == parent {
            return Err(NodeError::SelfChild);
        }
        if self.parent(child).is_some() {
            trace!(child = child.0; "Child already attached, attaching a copy");
            return Ok(self.copy(child));
        }
        if self.is_ancestor(child, parent) {
            return Err(NodeError::Cycle);
        }
        self.nodes[child.0].parent = Some(parent);
        Ok(child)
    }

    /// Remove `id` from its parent's children, leaving it a root.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&kid| kid != id);
        }
    }

    /// Deep-copy the subtree at `id`; the copy has no parent.
    pub fn copy(&mut self, id: NodeId) -> NodeId {
        let source = self.nodes[id.0].clone();
        let kids: Vec<NodeId> = source.children.iter().map(|&kid| self.copy(kid)).collect();
        self.insert_raw(source.symbol, source.attributes, kids)
    }

    /// Take an immutable snapshot of the subtree at `id`.
    pub fn freeze(&self, id: NodeId) -> FrozenNode {
        FrozenNode::from(self.node(id))
    }

    /// Copy a frozen snapshot into this tree as a new root.
    pub fn thaw(&mut self, frozen: &FrozenNode) -> NodeId {
        frozen.unfreeze(self)
    }
}

/// A borrowed node inside a [`Tree`].
///
/// Equality is structural over symbol, attributes and children; the parent
/// link and the arena position are ignored.
#[derive(Clone, Copy)]
pub struct NodeRef<'t> {
    tree: &'t Tree,
    id: NodeId,
}

impl<'t> NodeRef<'t> {
    /// The id of this node.
    pub fn id(self) -> NodeId {
        self.id
    }

    /// The tree this node lives in.
    pub fn tree(self) -> &'t Tree {
        self.tree
    }

    /// The parent node, if any.
    pub fn parent(self) -> Option<NodeRef<'t>> {
        self.tree.parent(self.id).map(|id| self.tree.node(id))
    }

    /// The child at `index`.
    pub fn child(self, index: usize) -> Option<NodeRef<'t>> {
        self.tree
            .children(self.id)
            .get(index)
            .map(|&id| self.tree.node(id))
    }

    /// Number of children.
    pub fn child_count(self) -> usize {
        self.tree.children(self.id).len()
    }
}

impl<'t> NodeView<'t> for NodeRef<'t> {
    fn symbol(self) -> Symbol {
        self.tree.symbol(self.id)
    }

    fn attributes(self) -> &'t AttrMap {
        self.tree.attributes(self.id)
    }

    fn child_nodes(self) -> Vec<Self> {
        self.tree
            .children(self.id)
            .iter()
            .map(|&id| NodeRef {
                tree: self.tree,
                id,
            })
            .collect()
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self.tree, other.tree) && self.id == other.id {
            return true;
        }
        self.symbol() == other.symbol()
            && self.attributes() == other.attributes()
            && self.child_count() == other.child_count()
            && self
                .child_nodes()
                .into_iter()
                .zip(other.child_nodes())
                .all(|(a, b)| a == b)
    }
}

impl Eq for NodeRef<'_> {}

impl fmt::Display for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_line())
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kids: Vec<String> = self
            .child_nodes()
            .into_iter()
            .map(|kid| kid.symbol().to_text())
            .collect();
        write!(f, "Node(\"{}\", ..., [{}])", self.symbol(), kids.join(", "))
    }
}
