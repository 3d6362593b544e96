//! # UTL Parser
//!
//! Lexer, parser and tree-building handlers for UTL templates. Source text
//! is split into document and code regions, tokenized, and parsed by a
//! grammar that calls a [`Handler`] method for every reduction. The handlers
//! shipped here build either a full parse tree ([`ParseTreeHandler`]) or a
//! compact abstract syntax tree ([`AstHandler`]), or just log what the
//! parser does ([`PrinterHandler`]).
//!
//! Syntax errors are collected and parsing resumes at the next statement
//! boundary unless the parser or one of its handlers is strict. Lexical
//! errors always abort.
//!
//! ## Usage
//!
//! ```
//! # use utl_parser::{AstHandler, MacroXref, Parser, error::ParseError};
//! # use utl_core::NodeView;
//!
//! fn main() -> Result<(), ParseError> {
//!     let source = "<h1>[% title %]</h1>[% macro show(x); echo x; end; show(1) %]";
//!
//!     let mut parser = Parser::with_handler(AstHandler::new(false)).with_file("page.utl");
//!     let output = parser.parse(source)?;
//!     assert_eq!(parser.error_count(), 0);
//!
//!     let root = output.root_node().expect("non-empty template");
//!     assert_eq!(root.find_all("macro_call").len(), 1);
//!
//!     let mut xref = MacroXref::new();
//!     xref.add_tree(root, source);
//!     assert_eq!(xref.macros()[0].references["page.utl"].len(), 1);
//!     Ok(())
//! }
//! ```

pub mod error;
mod handler;
mod handlers;
mod lexer;
mod macro_xref;
mod parser;
mod span;
mod tokens;

pub use handler::{
    ErrorAction, Expr, Handler, HandlerResult, Literal, Lookahead, Reduction, Statement,
    SyntaxError,
};
pub use handlers::{AstHandler, ParseTreeHandler, PrinterHandler};
pub use lexer::{Lexer, tokenize, tokenize_with};
pub use macro_xref::{CallSite, MacroRecord, MacroXref};
pub use parser::{ParseOutput, Parser};
pub use span::{Span, Spanned};
pub use tokens::{Keyword, PositionedToken, Token};
