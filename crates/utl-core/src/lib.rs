//! UTL Core Types
//!
//! This crate provides the tree data structures shared by every stage of the
//! UTL toolkit:
//!
//! - **Values**: The closed set of attribute values ([`Value`])
//! - **Attribute maps**: Immutable, hashable, insertion-ordered maps ([`AttrMap`])
//! - **Trees**: An arena of parent-linked nodes ([`Tree`], [`NodeId`], [`NodeRef`])
//! - **Frozen nodes**: Immutable structural snapshots usable as map keys ([`FrozenNode`])
//! - **Views**: Traversal, search and rendering shared by both node kinds ([`NodeView`])
//!
//! # Example
//!
//! ```
//! use utl_core::{AttrMap, NodeView, Tree};
//!
//! let mut tree = Tree::new();
//! let a = tree.new_node("id", AttrMap::from_iter([("symbol", "a")]), [])?;
//! let b = tree.new_node("id", AttrMap::from_iter([("symbol", "b")]), [])?;
//! let sum = tree.new_node("expr", AttrMap::from_iter([("operator", "+")]), [a, b])?;
//!
//! assert_eq!(tree.node(sum).format(), "expr: +\n    id: a\n    id: b");
//! assert_eq!(tree.parent(a), Some(sum));
//! # Ok::<(), utl_core::NodeError>(())
//! ```

mod attrs;
mod error;
mod frozen;
mod json;
mod symbol;
mod tree;
mod value;
mod view;

pub use attrs::AttrMap;
pub use error::NodeError;
pub use frozen::FrozenNode;
pub use symbol::Symbol;
pub use tree::{NodeId, NodeRef, Tree};
pub use value::Value;
pub use view::{NodeView, Walk};
