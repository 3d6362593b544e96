//! JSON rendering of node trees.
//!
//! The layout is fixed: one `"key": value` pair per line after the first,
//! `"name"` first, then `"attributes"` and `"children"` when non-empty.
//! A `document` node's `text` attribute has embedded double quotes replaced
//! by `&quot;` before escaping.

use std::io;

use log::warn;
use serde::{Serialize, Serializer, ser::SerializeMap};
use serde_json::ser::Formatter;

use crate::{
    attrs::AttrMap,
    value::{Value, format_float},
    view::NodeView,
};

/// Render the subtree at `node` in the layout described above.
pub(crate) fn to_json<'a, V: NodeView<'a>>(node: V) -> String {
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, TreeFormatter);
    if let Err(err) = JsonNode(node).serialize(&mut serializer) {
        warn!(error:% = err; "Failed to render node as JSON");
    }
    String::from_utf8_lossy(&out).into_owned()
}

struct JsonNode<V>(V);

impl<'a, V: NodeView<'a>> Serialize for JsonNode<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let node = self.0;
        let symbol = node.symbol();
        let attrs = node.attributes();
        let kids = node.child_nodes();

        let len = 1 + usize::from(!attrs.is_empty()) + usize::from(!kids.is_empty());
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("name", &symbol.to_text())?;
        if !attrs.is_empty() {
            let attrs = JsonAttrs {
                attrs,
                document: symbol == "document",
            };
            map.serialize_entry("attributes", &attrs)?;
        }
        if !kids.is_empty() {
            let kids: Vec<JsonNode<V>> = kids.into_iter().map(JsonNode).collect();
            map.serialize_entry("children", &kids)?;
        }
        map.end()
    }
}

struct JsonAttrs<'m> {
    attrs: &'m AttrMap,
    document: bool,
}

impl Serialize for JsonAttrs<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.attrs.len()))?;
        for (key, value) in self.attrs.iter() {
            match value {
                Value::String(text) if self.document && key == "text" => {
                    map.serialize_entry(key, &text.replace('"', "&quot;"))?;
                }
                other => map.serialize_entry(key, &JsonValue(other))?,
            }
        }
        map.end()
    }
}

struct JsonValue<'v>(&'v Value);

impl Serialize for JsonValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            // Non-finite floats come out as `null`.
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Node(node) => JsonNode(node).serialize(serializer),
            Value::Map(map) => JsonAttrs {
                attrs: map,
                document: false,
            }
            .serialize(serializer),
        }
    }
}

/// Compact JSON with a line break after every separator and `": "` between
/// key and value. Floats keep their `.0` when integral.
struct TreeFormatter;

impl Formatter for TreeFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if !first {
            writer.write_all(b",\n")?;
        }
        Ok(())
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if !first {
            writer.write_all(b",\n")?;
        }
        Ok(())
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_f64<W: ?Sized + io::Write>(&mut self, writer: &mut W, value: f64) -> io::Result<()> {
        writer.write_all(format_float(value).as_bytes())
    }
}
