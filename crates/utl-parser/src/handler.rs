//! The per-production callback interface driven by the parser.
//!
//! The parser calls one [`Handler`] method for every grammar reduction, in
//! bottom-up, left-to-right order. Each method receives a [`Reduction`] with
//! the tree under construction and the positional context of the reduced
//! span, plus the semantic values of the right-hand side. When several
//! handlers are installed, each is called in turn and the first `Some` value
//! becomes the value of the production. All handlers share one tree and see
//! the same child values, so a handler must not modify nodes it receives;
//! it builds new nodes instead, and the tree copies any child that already
//! has a parent.
//!
//! Every method has a default that builds nothing, so a handler only
//! implements the productions it cares about.

use std::fmt;

use log::error;
use utl_core::{AttrMap, NodeError, NodeId, Tree};

use crate::{
    span::{Span, Spanned},
    tokens::Keyword,
};

/// The result of a handler method: the production's semantic value, if any.
pub type HandlerResult = Result<Option<NodeId>, NodeError>;

/// The state shared with handlers during one reduction.
pub struct Reduction<'p> {
    tree: &'p mut Tree,
    source: &'p str,
    file: &'p str,
    span: Span,
    line: usize,
    context: AttrMap,
}

impl<'p> Reduction<'p> {
    pub(crate) fn new(
        tree: &'p mut Tree,
        source: &'p str,
        file: &'p str,
        span: Span,
        line: usize,
    ) -> Self {
        let context = AttrMap::from_iter([
            ("file", utl_core::Value::from(file)),
            ("start", span.start().into()),
            ("end", span.end().into()),
            ("line", line.into()),
        ]);
        Self {
            tree,
            source,
            file,
            span,
            line,
            context,
        }
    }

    /// `{file, start, end, line}` for the reduced span.
    pub fn context(&self) -> AttrMap {
        self.context.clone()
    }

    /// Context for a sub-span of the reduction, e.g. one identifier.
    pub fn context_for(&self, span: Span) -> AttrMap {
        self.context
            .with("start", span.start())
            .with("end", span.end())
    }

    /// The tree that handlers build into.
    pub fn tree(&mut self) -> &mut Tree {
        self.tree
    }

    /// Read-only access to the tree.
    pub fn tree_ref(&self) -> &Tree {
        self.tree
    }

    /// Byte range covered by the right-hand side.
    pub fn span(&self) -> Span {
        self.span
    }

    /// Line of the first token of the right-hand side.
    pub fn line(&self) -> usize {
        self.line
    }

    /// The file name given to the parser.
    pub fn file(&self) -> &str {
        self.file
    }

    /// The complete source text.
    pub fn source(&self) -> &str {
        self.source
    }

    /// Source text covered by `span`, or `""` if it is out of range.
    pub fn text(&self, span: Span) -> &str {
        self.source.get(span.range()).unwrap_or_default()
    }
}

/// Right-hand side of a `statement` reduction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Statement<'a> {
    /// A bare statement terminator.
    Empty,
    /// Verbatim document text.
    Document(&'a str),
    /// `break`, `continue` or `exit`.
    Keyword(Keyword),
    /// Any other statement, with its value.
    Node(Option<NodeId>),
}

/// Right-hand side of an `expr` reduction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expr<'a> {
    /// A literal, array reference, macro call or parenthesised expression.
    Operand(Option<NodeId>),
    /// A bare identifier.
    Id(&'a str),
    /// `not`, `!`, unary `+` or `-`.
    Unary {
        operator: &'a str,
        operand: Option<NodeId>,
    },
    Binary {
        operator: &'a str,
        lhs: Option<NodeId>,
        rhs: Option<NodeId>,
    },
}

/// Right-hand side of a `literal` reduction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal<'a> {
    Number(f64),
    String(&'a str),
    Boolean(bool),
    Null,
    Array(Option<NodeId>),
}

/// The lookahead token that caused a syntax error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookahead {
    pub kind: &'static str,
    pub lexeme: String,
}

/// A syntax error as reported to handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub file: String,
    pub line: usize,
    /// 1-based column of the offending token.
    pub column: usize,
    pub span: Span,
    /// `None` when the error happened at the end of the document.
    pub lookahead: Option<Lookahead>,
}

impl SyntaxError {
    /// Whether the parser ran out of input.
    pub fn at_end(&self) -> bool {
        self.lookahead
            .as_ref()
            .is_none_or(|lookahead| lookahead.kind == "EOF")
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lookahead {
            Some(lookahead) if lookahead.kind != "EOF" => write!(
                f,
                "Syntax error in input line {}, column {} after '{}'!",
                self.line, self.column, lookahead.lexeme
            ),
            _ => write!(f, "Syntax error at end of document!"),
        }
    }
}

/// What the parser should do after a handler has seen a syntax error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Resynchronise at the next statement boundary.
    Continue,
    /// Stop parsing and return the error.
    Abort,
}

/// Callbacks invoked by the parser, one per grammar production.
///
/// `Option<NodeId>` arguments are the values of right-hand-side
/// non-terminals; `None` means no handler produced a value or the optional
/// part was absent.
#[allow(unused_variables)]
pub trait Handler {
    /// Whether a syntax error should abort the parse.
    fn is_strict(&self) -> bool {
        false
    }

    /// Called on every handler for each syntax error.
    ///
    /// The default logs the error and continues unless the handler is strict.
    fn error(&mut self, error: &SyntaxError) -> ErrorAction {
        if self.is_strict() {
            return ErrorAction::Abort;
        }
        error!(file = error.file.as_str(), line = error.line, column = error.column; "{error}");
        ErrorAction::Continue
    }

    /// `utldoc : statement_list`
    fn utldoc(&mut self, r: &mut Reduction<'_>, statement_list: Option<NodeId>) -> HandlerResult {
        Ok(None)
    }

    /// `statement_list : statement | statement statement_list`
    ///
    /// Called right to left once the whole list is known, so `rest` is the
    /// already reduced tail.
    fn statement_list(
        &mut self,
        r: &mut Reduction<'_>,
        statement: Option<NodeId>,
        rest: Option<NodeId>,
    ) -> HandlerResult {
        Ok(None)
    }

    fn statement(&mut self, r: &mut Reduction<'_>, statement: Statement<'_>) -> HandlerResult {
        Ok(None)
    }

    /// `eostmt : SEMI | EOF | END_UTL`, with the terminator's lexeme.
    fn eostmt(&mut self, r: &mut Reduction<'_>, terminator: &str) -> HandlerResult {
        Ok(None)
    }

    /// `echo_stmt : ECHO | ECHO expr`
    fn echo_stmt(&mut self, r: &mut Reduction<'_>, expr: Option<NodeId>) -> HandlerResult {
        Ok(None)
    }

    fn expr(&mut self, r: &mut Reduction<'_>, expr: Expr<'_>) -> HandlerResult {
        Ok(None)
    }

    fn literal(&mut self, r: &mut Reduction<'_>, literal: Literal<'_>) -> HandlerResult {
        Ok(None)
    }

    /// `array_literal : '[' ']' | '[' array_elems ']' | '[' array_elems ',' ']'`
    fn array_literal(&mut self, r: &mut Reduction<'_>, elements: Option<NodeId>) -> HandlerResult {
        Ok(None)
    }

    /// `array_elems : expr | array_elems ',' expr`
    fn array_elems(
        &mut self,
        r: &mut Reduction<'_>,
        expr: Option<NodeId>,
        previous: Option<NodeId>,
    ) -> HandlerResult {
        Ok(None)
    }

    /// `array_ref : expr '[' expr ']'`
    fn array_ref(
        &mut self,
        r: &mut Reduction<'_>,
        variable: Option<NodeId>,
        index: Option<NodeId>,
    ) -> HandlerResult {
        Ok(None)
    }

    /// `macro_call : expr '(' ')' | expr '(' arg_list ')'`
    ///
    /// `name` is the callee's dotted name, or its source text when the
    /// callee is not an identifier path.
    fn macro_call(
        &mut self,
        r: &mut Reduction<'_>,
        callee: Option<NodeId>,
        args: Option<NodeId>,
        name: &str,
    ) -> HandlerResult {
        Ok(None)
    }

    /// `arg_list : arg | arg ',' arg_list`
    fn arg_list(
        &mut self,
        r: &mut Reduction<'_>,
        arg: Option<NodeId>,
        rest: Option<NodeId>,
    ) -> HandlerResult {
        Ok(None)
    }

    /// `arg : expr | STRING COLON expr | ID COLON expr`
    fn arg(
        &mut self,
        r: &mut Reduction<'_>,
        value: Option<NodeId>,
        name: Option<&str>,
    ) -> HandlerResult {
        Ok(None)
    }

    /// `paren_expr : '(' expr ')'`
    fn paren_expr(&mut self, r: &mut Reduction<'_>, expr: Option<NodeId>) -> HandlerResult {
        Ok(None)
    }

    fn if_stmt(
        &mut self,
        r: &mut Reduction<'_>,
        condition: Option<NodeId>,
        body: Option<NodeId>,
        elseifs: Option<NodeId>,
        otherwise: Option<NodeId>,
    ) -> HandlerResult {
        Ok(None)
    }

    /// `abbrev_if_stmt : IF expr THEN statement`
    fn abbrev_if_stmt(
        &mut self,
        r: &mut Reduction<'_>,
        condition: Option<NodeId>,
        statement: Option<NodeId>,
    ) -> HandlerResult {
        Ok(None)
    }

    /// `elseif_stmts : elseif_stmt elseif_stmts`, called right to left.
    fn elseif_stmts(
        &mut self,
        r: &mut Reduction<'_>,
        elseif: Option<NodeId>,
        rest: Option<NodeId>,
    ) -> HandlerResult {
        Ok(None)
    }

    /// `elseif_stmt : ELSEIF expr statement_list`
    fn elseif_stmt(
        &mut self,
        r: &mut Reduction<'_>,
        condition: Option<NodeId>,
        body: Option<NodeId>,
    ) -> HandlerResult {
        Ok(None)
    }

    /// `else_stmt : ELSE statement_list`
    fn else_stmt(&mut self, r: &mut Reduction<'_>, body: Option<NodeId>) -> HandlerResult {
        Ok(None)
    }

    /// `for_stmt : FOR [EACH] expr as_clause eostmt statement_list END`
    fn for_stmt(
        &mut self,
        r: &mut Reduction<'_>,
        each: bool,
        expr: Option<NodeId>,
        as_clause: Option<NodeId>,
        body: Option<NodeId>,
    ) -> HandlerResult {
        Ok(None)
    }

    /// `as_clause : AS ID | AS ID ',' ID`
    fn as_clause(&mut self, r: &mut Reduction<'_>, names: &[Spanned<&str>]) -> HandlerResult {
        Ok(None)
    }

    /// `while_stmt : WHILE expr statement_list END`
    fn while_stmt(
        &mut self,
        r: &mut Reduction<'_>,
        condition: Option<NodeId>,
        body: Option<NodeId>,
    ) -> HandlerResult {
        Ok(None)
    }

    /// `macro_defn : macro_decl eostmt [statement_list] END`
    fn macro_defn(
        &mut self,
        r: &mut Reduction<'_>,
        decl: Option<NodeId>,
        body: Option<NodeId>,
        name: &str,
    ) -> HandlerResult {
        Ok(None)
    }

    /// `macro_decl : MACRO dotted_id ['(' param_list ')']`
    fn macro_decl(
        &mut self,
        r: &mut Reduction<'_>,
        id: Option<NodeId>,
        params: Option<NodeId>,
        name: &str,
    ) -> HandlerResult {
        Ok(None)
    }

    /// `param_list : param_decl | param_decl ',' param_list`, right to left.
    fn param_list(
        &mut self,
        r: &mut Reduction<'_>,
        param: Option<NodeId>,
        rest: Option<NodeId>,
    ) -> HandlerResult {
        Ok(None)
    }

    /// `param_decl : ID | ID '=' expr`
    fn param_decl(
        &mut self,
        r: &mut Reduction<'_>,
        name: Spanned<&str>,
        default: Option<NodeId>,
    ) -> HandlerResult {
        Ok(None)
    }

    /// `dotted_id : ID | ID '.' dotted_id`, right to left.
    fn dotted_id(
        &mut self,
        r: &mut Reduction<'_>,
        head: &str,
        rest: Option<NodeId>,
    ) -> HandlerResult {
        Ok(None)
    }

    /// `include_stmt : INCLUDE expr`
    ///
    /// `file` is set when the target is a plain string literal.
    fn include_stmt(
        &mut self,
        r: &mut Reduction<'_>,
        target: Option<NodeId>,
        file: Option<&str>,
    ) -> HandlerResult {
        Ok(None)
    }

    /// `call_stmt : CALL macro_call`
    fn call_stmt(&mut self, r: &mut Reduction<'_>, call: Option<NodeId>) -> HandlerResult {
        Ok(None)
    }

    /// `default_assignment : DEFAULT expr`
    fn default_assignment(
        &mut self,
        r: &mut Reduction<'_>,
        expr: Option<NodeId>,
    ) -> HandlerResult {
        Ok(None)
    }

    /// `return_stmt : RETURN | RETURN expr`
    fn return_stmt(&mut self, r: &mut Reduction<'_>, expr: Option<NodeId>) -> HandlerResult {
        Ok(None)
    }
}
