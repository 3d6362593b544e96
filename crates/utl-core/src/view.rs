//! Read-only access shared by mutable and frozen nodes.
//!
//! [`NodeView`] is implemented by [`NodeRef`](crate::NodeRef) (a borrowed
//! node inside a [`Tree`](crate::Tree)) and by `&FrozenNode`. Traversal,
//! search, text rendering and JSON rendering are written once against it.

use crate::{attrs::AttrMap, json, symbol::Symbol, value::Value};

/// Read operations common to every node representation.
pub trait NodeView<'a>: Copy + 'a {
    /// The node's symbol.
    fn symbol(self) -> Symbol;

    /// The node's attributes.
    fn attributes(self) -> &'a AttrMap;

    /// The node's children, in order.
    fn child_nodes(self) -> Vec<Self>;

    /// The attributes viewed as positional context (`file`, `start`, `end`,
    /// `line`).
    fn context(self) -> &'a AttrMap {
        self.attributes()
    }

    /// Depth-first, parent-before-children iteration starting at this node.
    fn walk(self) -> Walk<Self> {
        Walk { stack: vec![self] }
    }

    /// First node in [`walk`](NodeView::walk) order with the given symbol.
    fn find_first(self, symbol: &str) -> Option<Self> {
        let wanted = Symbol::new(symbol);
        self.walk().find(|node| node.symbol() == wanted)
    }

    /// Every node in [`walk`](NodeView::walk) order with the given symbol.
    fn find_all(self, symbol: &str) -> Vec<Self> {
        let wanted = Symbol::new(symbol);
        self.walk().filter(|node| node.symbol() == wanted).collect()
    }

    /// One-line description of the node.
    ///
    /// Nodes with an `operator`, `symbol` or `value` attribute print just that
    /// (`expr: +`, `id: abcd`, `literal: 12.0`), documents print their quoted
    /// text, everything else prints the full attribute map.
    fn display_line(self) -> String {
        let symbol = self.symbol();
        let attrs = self.attributes();
        if let Some(op) = attrs.get("operator") {
            return format!("{symbol}: {}", Plain(op));
        }
        if let Some(name) = attrs.get("symbol") {
            return format!("{symbol}: {}", Plain(name));
        }
        if let Some(value) = attrs.get("value") {
            if let Value::Node(node) = value {
                let kids: Vec<String> = node
                    .child_nodes()
                    .into_iter()
                    .map(|kid| kid.symbol().to_text())
                    .collect();
                return format!("{symbol} (array): {}", kids.join(", "));
            }
            return format!("{symbol}: {}", Plain(value));
        }
        if symbol == "document" {
            if let Some(text) = attrs.get("text") {
                return format!("{symbol}: {text}");
            }
        }
        if attrs.is_empty() {
            format!("{symbol}: ")
        } else {
            format!("{symbol}:  {attrs}")
        }
    }

    /// Indented multi-line rendering of the subtree, four spaces per level.
    fn format(self) -> String {
        let mut out = String::new();
        format_into(self, 0, &mut out);
        out
    }

    /// JSON rendering of the subtree.
    ///
    /// `name` is always present; `attributes` and `children` are omitted
    /// when empty.
    fn json_format(self) -> String {
        json::to_json(self)
    }
}

fn format_into<'a, V: NodeView<'a>>(node: V, depth: usize, out: &mut String) {
    if depth > 0 {
        out.push('\n');
    }
    for _ in 0..depth {
        out.push_str("    ");
    }
    out.push_str(&node.display_line());
    for kid in node.child_nodes() {
        format_into(kid, depth + 1, out);
    }
}

struct Plain<'v>(&'v Value);

impl std::fmt::Display for Plain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt_plain(f)
    }
}

/// Iterator returned by [`NodeView::walk`].
pub struct Walk<V> {
    stack: Vec<V>,
}

impl<'a, V: NodeView<'a>> Iterator for Walk<V> {
    type Item = V;

    fn next(&mut self) -> Option<V> {
        let node = self.stack.pop()?;
        self.stack.extend(node.child_nodes().into_iter().rev());
        Some(node)
    }
}
