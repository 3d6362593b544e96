//! Errors raised while building trees.

use thiserror::Error;

/// A node could not be constructed or attached.
///
/// These indicate a bug in the caller (usually a handler) rather than a
/// problem with the source being analysed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    #[error("node symbol must not be empty")]
    EmptySymbol,

    #[error("a node cannot be its own child")]
    SelfChild,

    #[error("attaching the node would make it its own ancestor")]
    Cycle,
}
