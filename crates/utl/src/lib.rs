//! UTL - analysis tools for UTL templates.
//!
//! Lexing, parsing, macro cross-referencing and include-tree analysis for
//! the UTL template language. The heavy lifting lives in `utl-core` (trees)
//! and `utl-parser` (lexer, grammar, handlers); this crate ties them to
//! configuration and the filesystem.

pub mod config;
pub mod includes;

mod error;

pub use utl_core::{AttrMap, FrozenNode, NodeId, NodeRef, NodeView, Tree, Value};
pub use utl_parser::{CallSite, MacroRecord, MacroXref, ParseOutput, PositionedToken};

pub use error::UtlError;

use std::{fs, path::Path};

use log::{debug, info, trace};

use utl_parser::{AstHandler, Handler, ParseTreeHandler, Parser, PrinterHandler, error::Diagnostic};

use config::AppConfig;
use includes::{IncludeFile, IncludeResolver};

/// Which tree a parse builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TreeKind {
    /// Compact abstract syntax tree.
    #[default]
    Ast,
    /// One node per grammar reduction.
    ParseTree,
}

/// The result of parsing one template.
#[derive(Debug, Clone)]
pub struct Analysis {
    file: String,
    source: String,
    output: ParseOutput,
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
}

impl Analysis {
    /// The file name recorded in every node's context.
    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn output(&self) -> &ParseOutput {
        &self.output
    }

    /// Root of the built tree.
    pub fn root(&self) -> Option<NodeRef<'_>> {
        self.output.root_node()
    }

    /// Syntax errors and warnings collected during the parse.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Number of syntax errors the parser recovered from.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }
}

/// Builder for analysing UTL templates.
///
/// # Examples
///
/// ```
/// use utl::{Analyzer, TreeKind, config::AppConfig};
///
/// let analyzer = Analyzer::new(AppConfig::default());
/// let analysis = analyzer
///     .parse("page.utl", "[% macro hello; end; hello(); %]", TreeKind::Ast)
///     .expect("Failed to parse");
/// assert_eq!(analysis.error_count(), 0);
///
/// let xref = analyzer.macro_xref([&analysis]);
/// assert_eq!(xref.macros()[0].to_string(), "hello() (page.utl:1)");
/// ```
#[derive(Debug, Default)]
pub struct Analyzer {
    config: AppConfig,
    trace: bool,
}

impl Analyzer {
    /// Create a new analyzer with the given configuration.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            trace: false,
        }
    }

    /// Log every grammar reduction at `info` level while parsing.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Split `source` into tokens.
    ///
    /// # Errors
    ///
    /// Returns `UtlError::Parse` for a lexical error.
    pub fn tokenize<'a>(&self, source: &'a str) -> Result<Vec<PositionedToken<'a>>, UtlError> {
        let tokens = utl_parser::tokenize(source)
            .map_err(|err| UtlError::new_parse_error(err, source))?;
        debug!(tokens = tokens.len(); "Source tokenized");
        Ok(tokens)
    }

    /// Parse `source`, recording `file` in every node's context.
    ///
    /// Syntax errors are recovered from and reported through
    /// [`Analysis::diagnostics`] unless the parser is configured strict.
    ///
    /// # Errors
    ///
    /// Returns `UtlError::Parse` for a lexical error, for the first syntax
    /// error of a strict parse, or when a tree could not be built.
    pub fn parse(
        &self,
        file: &str,
        source: impl Into<String>,
        kind: TreeKind,
    ) -> Result<Analysis, UtlError> {
        let source = source.into();
        let strict = self.config.parser().strict();
        info!(file, kind:?, strict; "Parsing template");

        let mut handlers: Vec<Box<dyn Handler>> = match kind {
            TreeKind::Ast => vec![Box::new(AstHandler::new(strict))],
            TreeKind::ParseTree => vec![Box::new(ParseTreeHandler::new(strict))],
        };
        if self.trace {
            handlers.push(Box::new(PrinterHandler::new(strict)));
        }

        let mut parser = Parser::new(handlers).with_file(file).with_strict(strict);
        let output = match parser.parse(&source) {
            Ok(output) => output,
            Err(err) => return Err(UtlError::new_parse_error(err, source)),
        };

        debug!(file, errors = parser.error_count(), nodes = output.tree.len(); "Template parsed");
        trace!(file; "{}", output.root_node().map(|root| root.format()).unwrap_or_default());

        Ok(Analysis {
            file: file.to_string(),
            diagnostics: parser.diagnostics().to_vec(),
            error_count: parser.error_count(),
            source,
            output,
        })
    }

    /// Read and parse the template at `path`.
    ///
    /// # Errors
    ///
    /// Returns `UtlError::Io` if the file cannot be read, and otherwise the
    /// errors of [`Analyzer::parse`].
    pub fn parse_file(&self, path: impl AsRef<Path>, kind: TreeKind) -> Result<Analysis, UtlError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        self.parse(&path.display().to_string(), source, kind)
    }

    /// Cross-reference macro definitions and calls across `analyses`.
    pub fn macro_xref<'a>(&self, analyses: impl IntoIterator<Item = &'a Analysis>) -> MacroXref {
        let mut xref = MacroXref::new();
        for analysis in analyses {
            if let Some(root) = analysis.root() {
                xref.add_tree(root, analysis.source());
            }
        }
        info!(macros = xref.macros().len(), calls = xref.calls().len(); "Macro cross-reference built");
        xref
    }

    /// An include resolver using the configured search directories.
    pub fn include_resolver(&self) -> IncludeResolver {
        IncludeResolver::new(self.config.includes().options(self.config.parser().strict()))
    }

    /// Build the include tree of the template at `path`.
    ///
    /// # Errors
    ///
    /// See [`IncludeResolver::build`].
    pub fn include_tree(&self, path: impl AsRef<Path>) -> Result<IncludeFile, UtlError> {
        self.include_resolver().build(path)
    }
}
