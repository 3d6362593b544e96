//! Macro cross-reference.
//!
//! Collects macro definitions and macro calls from parsed trees and joins
//! each call to the definitions of the same name.
//!
//! # Examples
//!
//! ```
//! use utl_parser::{AstHandler, MacroXref, Parser};
//!
//! let source = "[% macro greet; end; greet(); %]";
//! let output = Parser::with_handler(AstHandler::new(false))
//!     .with_file("a.utl")
//!     .parse(source)?;
//!
//! let mut xref = MacroXref::new();
//! xref.add_tree(output.root_node().expect("root"), source);
//!
//! let greet = &xref.macros()[0];
//! assert_eq!(greet.to_string(), "greet() (a.utl:1)");
//! assert_eq!(greet.references["a.utl"][0].call_text, "greet()");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt;

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use utl_core::{AttrMap, NodeView};

/// One call of a macro.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub file: String,
    pub line: usize,
    /// Source text of the whole call, arguments included.
    pub call_text: String,
    pub start: usize,
    /// Full dotted name of the callee.
    #[serde(rename = "macro")]
    pub macro_name: String,
}

/// A macro definition and every call joined to it, grouped by calling file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroRecord {
    pub name: String,
    pub file: String,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    /// Source text of the definition, from `macro` through `end`.
    pub text: String,
    #[serde(default)]
    pub references: IndexMap<String, Vec<CallSite>>,
}

impl MacroRecord {
    /// Record a call of this macro.
    pub fn add_call(&mut self, site: CallSite) {
        self.references
            .entry(site.file.clone())
            .or_default()
            .push(site);
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Rebuild a record from [`MacroRecord::to_json`] output.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a valid macro record.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl fmt::Display for MacroRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}() ({}:{})",
            self.name,
            self.file,
            group_thousands(self.line)
        )
    }
}

/// `1234567` as `1,234,567`.
fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Position and text of a node, read from its context.
struct Located {
    file: String,
    start: usize,
    end: usize,
    line: usize,
    text: String,
}

impl Located {
    fn read(context: &AttrMap, source: &str) -> Self {
        let start = context.get_usize("start").unwrap_or_default();
        let end = context.get_usize("end").unwrap_or(start);
        Self {
            file: context.get_str("file").unwrap_or_default().to_string(),
            start,
            end,
            line: context.get_usize("line").unwrap_or_default(),
            text: source.get(start..end).unwrap_or_default().to_string(),
        }
    }
}

/// Cross-reference of macro definitions and calls across one or more trees.
#[derive(Debug, Clone, Default)]
pub struct MacroXref {
    macros: Vec<MacroRecord>,
    calls: Vec<CallSite>,
}

impl MacroXref {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every definition and call found under `root`.
    ///
    /// `source` must be the exact text `root` was parsed from; it supplies
    /// the definition and call texts. Calls are re-joined across every tree
    /// added so far, so a call may precede the tree defining its macro.
    pub fn add_tree<'a, V: NodeView<'a>>(&mut self, root: V, source: &str) {
        let macros_before = self.macros.len();
        let calls_before = self.calls.len();

        for node in root.walk() {
            if node.symbol() != "macro_defn" {
                continue;
            }
            let context = node.context();
            let Located {
                file,
                start,
                end,
                line,
                text,
            } = Located::read(context, source);
            self.macros.push(MacroRecord {
                name: context.get_str("name").unwrap_or_default().to_string(),
                file,
                start,
                end,
                line,
                text,
                references: IndexMap::new(),
            });
        }

        for node in root.walk() {
            if node.symbol() != "macro_call" {
                continue;
            }
            let context = node.context();
            let located = Located::read(context, source);
            self.calls.push(CallSite {
                file: located.file,
                line: located.line,
                call_text: located.text,
                start: located.start,
                macro_name: context.get_str("macro").unwrap_or_default().to_string(),
            });
        }

        debug!(
            macros = self.macros.len() - macros_before,
            calls = self.calls.len() - calls_before;
            "Collected macro cross-reference"
        );
        self.join();
    }

    fn join(&mut self) {
        for record in &mut self.macros {
            record.references.clear();
        }
        for call in &self.calls {
            for record in self
                .macros
                .iter_mut()
                .filter(|record| record.name == call.macro_name)
            {
                record.add_call(call.clone());
            }
        }
    }

    /// Definitions in discovery order.
    pub fn macros(&self) -> &[MacroRecord] {
        &self.macros
    }

    /// Every call in discovery order, joined or not.
    pub fn calls(&self) -> &[CallSite] {
        &self.calls
    }

    /// Definitions matching `name`.
    pub fn find(&self, name: &str) -> impl Iterator<Item = &MacroRecord> {
        self.macros.iter().filter(move |record| record.name == name)
    }

    /// JSON array of every macro record.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn json_for_macros(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.macros)
    }

    /// JSON array of every call site.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn json_for_refs(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.calls)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{AstHandler, ParseTreeHandler, Parser};

    const MACROS: &str =
        "[% macro fred;\n  a = b + 3;\n  echo;\n  echo a;\n  fred(7);\n  wilma(8);\nend; %]";

    fn xref_for(handler_tree: bool, source: &str, file: &str) -> MacroXref {
        let mut parser = if handler_tree {
            Parser::with_handler(ParseTreeHandler::new(false))
        } else {
            Parser::with_handler(AstHandler::new(false))
        }
        .with_file(file);
        let output = parser.parse(source).unwrap();
        let mut xref = MacroXref::new();
        xref.add_tree(output.root_node().unwrap(), source);
        xref
    }

    #[test]
    fn test_definition_record() {
        let xref = xref_for(false, MACROS, "macros.utl");
        assert_eq!(xref.macros().len(), 1);

        let fred = &xref.macros()[0];
        assert_eq!(fred.name, "fred");
        assert_eq!(fred.file, "macros.utl");
        assert_eq!(fred.start, 3);
        assert_eq!(fred.end, 72);
        assert_eq!(fred.line, 1);
        assert!(fred.text.starts_with("macro fred;"));
        assert!(fred.text.ends_with("end"));
    }

    #[test]
    fn test_calls_join_to_definitions() {
        let xref = xref_for(false, MACROS, "macros.utl");
        let fred = &xref.macros()[0];
        let calls = &fred.references["macros.utl"];
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].call_text, "fred(7)");
        assert_eq!(calls[0].line, 5);
        assert_eq!(calls[0].start, 48);

        let names: Vec<&str> = xref.calls().iter().map(|c| c.macro_name.as_str()).collect();
        assert_eq!(names, vec!["fred", "wilma"]);
        assert_eq!(xref.find("wilma").count(), 0);
    }

    #[test]
    fn test_parse_tree_gives_same_records() {
        let ast = xref_for(false, MACROS, "macros.utl");
        let tree = xref_for(true, MACROS, "macros.utl");
        assert_eq!(ast.macros(), tree.macros());
        assert_eq!(ast.calls(), tree.calls());
    }

    #[test]
    fn test_calls_from_other_files() {
        let defs = "[% macro util.show(x); echo x; end %]";
        let uses = "[% util.show(1); util.show(2); a[1](); %]";

        let mut xref = MacroXref::new();
        for (file, source) in [("uses.utl", uses), ("defs.utl", defs)] {
            let output = Parser::with_handler(AstHandler::new(false))
                .with_file(file)
                .parse(source)
                .unwrap();
            xref.add_tree(output.root_node().unwrap(), source);
        }

        let show = xref.find("util.show").next().unwrap();
        assert_eq!(show.references["uses.utl"].len(), 2);
        assert_eq!(xref.calls()[2].macro_name, "a[1]");
    }

    #[test]
    fn test_json_output() {
        assert_eq!(MacroXref::new().json_for_macros().unwrap(), "[]");

        let xref = xref_for(false, MACROS, "macros.utl");
        let macros: serde_json::Value = serde_json::from_str(&xref.json_for_macros().unwrap()).unwrap();
        assert_eq!(macros[0]["name"], "fred");
        assert_eq!(macros[0]["references"]["macros.utl"][0]["macro"], "fred");

        let refs: serde_json::Value = serde_json::from_str(&xref.json_for_refs().unwrap()).unwrap();
        assert_eq!(refs.as_array().unwrap().len(), 2);
        assert_eq!(refs[1]["call_text"], "wilma(8)");
        assert_eq!(refs[1]["line"], 6);
    }

    #[test]
    fn test_display_groups_thousands() {
        let mut record = xref_for(false, MACROS, "macros.utl").macros()[0].clone();
        assert_eq!(record.to_string(), "fred() (macros.utl:1)");
        record.line = 1234567;
        assert_eq!(record.to_string(), "fred() (macros.utl:1,234,567)");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
    }

    #[test]
    fn test_json_round_trip() {
        let record = xref_for(false, MACROS, "macros.utl").macros()[0].clone();
        let json = record.to_json().unwrap();
        assert_eq!(MacroRecord::from_json(&json).unwrap(), record);
    }

    fn call_site() -> impl Strategy<Value = CallSite> {
        ("[a-z]{1,8}\\.utl", 1usize..500, "[a-z]{1,6}\\([0-9]?\\)", 0usize..10_000, "[a-z.]{1,10}").prop_map(
            |(file, line, call_text, start, macro_name)| CallSite {
                file,
                line,
                call_text,
                start,
                macro_name,
            },
        )
    }

    proptest! {
        #[test]
        fn test_macro_record_json_round_trip(
            name in "[a-z][a-z.]{0,12}",
            file in "[a-z/]{1,12}",
            start in 0usize..10_000,
            len in 0usize..500,
            line in 1usize..1000,
            text in "\\PC{0,40}",
            sites in proptest::collection::vec(call_site(), 0..6),
        ) {
            let mut record = MacroRecord {
                name,
                file,
                start,
                end: start + len,
                line,
                text,
                references: IndexMap::new(),
            };
            for site in sites {
                record.add_call(site);
            }
            let json = record.to_json().unwrap();
            prop_assert_eq!(MacroRecord::from_json(&json).unwrap(), record);
        }
    }
}
