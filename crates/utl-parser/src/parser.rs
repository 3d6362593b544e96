//! Parser for UTL token streams.
//!
//! Statements are parsed by recursive descent and expressions by precedence
//! climbing over the operator table below (low to high):
//!
//! | level | operators                     | associativity |
//! |-------|-------------------------------|---------------|
//! | 1     | `or`                          | left          |
//! | 2     | `\|\|`                        | left          |
//! | 3     | `and`                         | left          |
//! | 4     | `&&`                          | left          |
//! | 5     | `=` `+=` `-=` `*=` `/=` `%=`  | none          |
//! | 6     | `is` `not` `==` `!=`          | none          |
//! | 7     | `<` `>` `<=` `>=`             | none          |
//! | 8     | `+` `-`                       | left          |
//! | 9     | `*` `/` `%`                   | left          |
//! | 10    | prefix `!`                    | right         |
//! | 11    | `..` `:`                      | none          |
//! | 12    | `\|`                          | left          |
//! | 14    | prefix `+` `-`                | right         |
//! | 15    | call `(` and index `[`        | postfix       |
//! | 17    | `.`                           | right         |
//!
//! Prefix `not` sits on level 6 as well, so `not a < b` reads as
//! `not (a < b)` while `not a == b` is a syntax error, like `a == b == c`.
//!
//! A second assignment directly after `expr = expr` is re-associated to the
//! right with a warning, so `a = b = c = 5` reads as `a = (b = (c = 5))`.
//!
//! Every reduction is dispatched to the installed [`Handler`]s with the
//! positional context of the reduced span. Syntax errors are recorded as
//! diagnostics and reported to every handler; unless the parse is strict the
//! parser then skips to the next statement boundary and carries on.

use log::{debug, info, trace, warn};
use winnow::{
    Parser as _,
    error::{ContextError, ErrMode},
    stream::{Stream, TokenSlice},
    token::any,
};

use utl_core::{NodeError, NodeId, NodeRef, Tree};

use crate::{
    error::{Diagnostic, DiagnosticCollector, ErrorCode, ParseError},
    handler::{
        ErrorAction, Expr, Handler, HandlerResult, Literal, Lookahead, Reduction, Statement,
        SyntaxError,
    },
    lexer::tokenize,
    span::{Span, Spanned},
    tokens::{Keyword, PositionedToken, Token},
};

/// Context type for parser errors
#[derive(Debug, Clone, PartialEq, Eq)]
enum Context {
    /// Description of what was expected
    Label(&'static str),
    /// Remaining token count (`eof_offset()`) at the offending token
    StartOffset(usize),
    /// A handler broke a tree invariant
    Tree(NodeError),
    /// A strict handler or parser stopped the parse
    Aborted,
}

type Input<'s> = TokenSlice<'s, PositionedToken<'s>>;
type IResult<O> = std::result::Result<O, ErrMode<ContextError<Context>>>;

const ASSIGN_LEVEL: u8 = 5;
const NOT_LEVEL: u8 = 6;
const NOT_OPERAND: u8 = NOT_LEVEL + 1;
const BANG_OPERAND: u8 = 11;
const UMINUS_OPERAND: u8 = 15;
const POSTFIX_LEVEL: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assoc {
    Left,
    Right,
    NonAssoc,
}

fn binary_level(token: &Token<'_>) -> Option<(u8, Assoc)> {
    let level = match token {
        Token::Keyword(Keyword::Or, _) => (1, Assoc::Left),
        Token::DoubleBar => (2, Assoc::Left),
        Token::Keyword(Keyword::And, _) => (3, Assoc::Left),
        Token::DoubleAmp => (4, Assoc::Left),
        Token::Assign | Token::AssignOp(_) => (ASSIGN_LEVEL, Assoc::NonAssoc),
        Token::Keyword(Keyword::Is, _) | Token::Eq | Token::Neq => (NOT_LEVEL, Assoc::NonAssoc),
        Token::Lt | Token::Gt | Token::Lte | Token::Gte => (7, Assoc::NonAssoc),
        Token::Plus | Token::Minus => (8, Assoc::Left),
        Token::Times | Token::Div | Token::Modulus => (9, Assoc::Left),
        Token::Range | Token::Colon => (11, Assoc::NonAssoc),
        Token::Filter => (12, Assoc::Left),
        Token::Dot => (17, Assoc::Right),
        _ => return None,
    };
    Some(level)
}

/// Operator spelling stored on `expr` nodes; word operators are lower-cased.
fn operator_text<'s>(token: &Token<'s>) -> &'s str {
    match token {
        Token::Keyword(keyword, _) => keyword.as_str(),
        other => other.lexeme(),
    }
}

fn is_block_end(token: &Token<'_>) -> bool {
    matches!(
        token,
        Token::Keyword(Keyword::End | Keyword::Else | Keyword::ElseIf, _)
    )
}

fn keyword(keyword: Keyword) -> impl Fn(&Token<'_>) -> bool {
    move |token| token.is_keyword(keyword)
}

/// 1-based column of `offset` within its line.
fn column_of(source: &str, offset: usize) -> usize {
    let before = source.get(..offset).unwrap_or_default();
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    offset - line_start + 1
}

/// Helper to create a Cut error at the current token
fn unexpected(input: &Input<'_>, expected: &'static str) -> ErrMode<ContextError<Context>> {
    let mut e = ContextError::new();
    e.push(Context::Label(expected));
    e.push(Context::StartOffset(input.eof_offset()));
    ErrMode::Cut(e)
}

fn tree_error(err: NodeError) -> ErrMode<ContextError<Context>> {
    let mut e = ContextError::new();
    e.push(Context::Tree(err));
    ErrMode::Cut(e)
}

fn aborted() -> ErrMode<ContextError<Context>> {
    let mut e = ContextError::new();
    e.push(Context::Aborted);
    ErrMode::Cut(e)
}

fn into_context(err: ErrMode<ContextError<Context>>) -> ContextError<Context> {
    match err {
        ErrMode::Backtrack(e) | ErrMode::Cut(e) => e,
        ErrMode::Incomplete(_) => ContextError::new(),
    }
}

/// Look at the next token without consuming it.
fn peek<'s>(input: &mut Input<'s>) -> Option<&'s PositionedToken<'s>> {
    let checkpoint = input.checkpoint();
    let token = input.next_token();
    input.reset(&checkpoint);
    token
}

/// Look at the token after the next one.
fn peek_second<'s>(input: &mut Input<'s>) -> Option<&'s PositionedToken<'s>> {
    let checkpoint = input.checkpoint();
    input.next_token();
    let token = input.next_token();
    input.reset(&checkpoint);
    token
}

/// Consume the next token if it satisfies `pred`.
fn expect<'s>(
    input: &mut Input<'s>,
    expected: &'static str,
    pred: impl Fn(&Token<'s>) -> bool,
) -> IResult<&'s PositionedToken<'s>> {
    any.verify(|token: &PositionedToken<'s>| pred(&token.token))
        .parse_next(input)
        .map_err(|_: ErrMode<ContextError<Context>>| unexpected(input, expected))
}

/// The semantic value of a reduced symbol with the span it covers.
#[derive(Debug, Clone, Copy)]
struct Reduced {
    node: Option<NodeId>,
    span: Span,
    line: usize,
}

impl Reduced {
    fn new(node: Option<NodeId>, span: Span, line: usize) -> Self {
        Self { node, span, line }
    }
}

/// An expression operand.
///
/// `call` marks a reduced `macro_call` that has not yet been reduced to
/// `expr`; `call` statements take it as is.
#[derive(Debug, Clone, Copy)]
struct Operand {
    value: Reduced,
    call: bool,
}

impl From<Reduced> for Operand {
    fn from(value: Reduced) -> Self {
        Self { value, call: false }
    }
}

/// One parse of one token list.
struct Grammar<'s> {
    tokens: &'s [PositionedToken<'s>],
    source: &'s str,
    file: &'s str,
    strict: bool,
    tree: &'s mut Tree,
    handlers: &'s mut [Box<dyn Handler>],
    diagnostics: &'s mut DiagnosticCollector,
}

impl<'s> Grammar<'s> {
    /// Run `f` on every handler; the first `Some` is the production's value.
    fn reduce<F>(
        &mut self,
        production: &'static str,
        span: Span,
        line: usize,
        mut f: F,
    ) -> IResult<Option<NodeId>>
    where
        F: FnMut(&mut dyn Handler, &mut Reduction<'_>) -> HandlerResult,
    {
        trace!(production, start = span.start(), end = span.end(), line; "Reduce");
        let mut reduction = Reduction::new(&mut *self.tree, self.source, self.file, span, line);
        let mut value = None;
        for handler in self.handlers.iter_mut() {
            let result = f(handler.as_mut(), &mut reduction).map_err(tree_error)?;
            if value.is_none() {
                value = result;
            }
        }
        Ok(value)
    }

    fn utldoc(&mut self, input: &mut Input<'s>) -> IResult<Option<NodeId>> {
        let list = self.statement_list(input, true)?;
        let (span, line) = list.map_or((Span::empty_at(0), 1), |list| (list.span, list.line));
        let node = list.and_then(|list| list.node);
        self.reduce("utldoc", span, line, |h, r| h.utldoc(r, node))
    }

    /// Parse statements until input ends or, inside a block, until a block
    /// terminator, then reduce `statement_list` right to left.
    fn statement_list(&mut self, input: &mut Input<'s>, top_level: bool) -> IResult<Option<Reduced>> {
        let mut statements = Vec::new();
        while let Some(next) = peek(input) {
            if !top_level && is_block_end(&next.token) {
                break;
            }
            match self.statement(input) {
                Ok(statement) => statements.push(statement),
                Err(err) => self.recover(input, err)?,
            }
        }

        let Some(last) = statements.last().copied() else {
            return Ok(None);
        };
        let mut rest = None;
        let mut list = None;
        for statement in statements.iter().rev() {
            let span = statement.span.union(last.span);
            let node = self.reduce("statement_list", span, statement.line, |h, r| {
                h.statement_list(r, statement.node, rest)
            })?;
            rest = node;
            list = Some(Reduced::new(node, span, statement.line));
        }
        Ok(list)
    }

    /// Report a syntax error and skip to the next statement boundary.
    ///
    /// Tree errors and aborts are passed through.
    fn recover(&mut self, input: &mut Input<'s>, err: ErrMode<ContextError<Context>>) -> IResult<()> {
        let err = into_context(err);
        if err
            .context()
            .any(|ctx| matches!(ctx, Context::Tree(_) | Context::Aborted))
        {
            return Err(ErrMode::Cut(err));
        }

        if self.report(&err) == ErrorAction::Abort || self.strict {
            return Err(aborted());
        }

        let mut skipped = 0;
        while let Some(token) = peek(input) {
            if matches!(token.token, Token::Eof) {
                break;
            }
            input.next_token();
            skipped += 1;
            if matches!(token.token, Token::Semi | Token::EndUtl { .. }) {
                break;
            }
        }
        debug!(skipped; "Resynchronised after syntax error");
        Ok(())
    }

    /// Record a diagnostic and notify every handler.
    fn report(&mut self, err: &ContextError<Context>) -> ErrorAction {
        let remaining = err.context().find_map(|ctx| match ctx {
            Context::StartOffset(n) => Some(*n),
            _ => None,
        });
        let expected: Vec<&str> = err
            .context()
            .filter_map(|ctx| match ctx {
                Context::Label(label) => Some(*label),
                _ => None,
            })
            .collect();

        let token = remaining.and_then(|n| self.tokens.get(self.tokens.len().saturating_sub(n)));
        let (span, line) = match token {
            Some(token) => (token.span, token.line),
            None => (
                Span::empty_at(self.source.len()),
                self.tokens.last().map_or(1, |t| t.line),
            ),
        };
        let error = SyntaxError {
            file: self.file.to_string(),
            line,
            column: column_of(self.source, span.start()),
            span,
            lookahead: token.map(|token| Lookahead {
                kind: token.kind_name(),
                lexeme: token.lexeme().to_string(),
            }),
        };

        let code = if error.at_end() {
            ErrorCode::E101
        } else {
            ErrorCode::E100
        };
        let mut diagnostic = Diagnostic::error(error.to_string())
            .with_code(code)
            .with_label(span, code.description());
        if !expected.is_empty() {
            diagnostic = diagnostic.with_help(format!("expected {}", expected.join(" or ")));
        }
        self.diagnostics.emit(diagnostic);

        let mut action = ErrorAction::Continue;
        for handler in self.handlers.iter_mut() {
            if handler.error(&error) == ErrorAction::Abort {
                action = ErrorAction::Abort;
            }
        }
        action
    }

    fn statement(&mut self, input: &mut Input<'s>) -> IResult<Reduced> {
        let Some(first) = peek(input) else {
            return Err(unexpected(input, "statement"));
        };
        let line = first.line;

        let statement = match &first.token {
            token if token.is_eostmt() => {
                let end = self.eostmt(input)?;
                return self.finish_statement(Statement::Empty, end.span, line);
            }
            Token::Document(text) => {
                input.next_token();
                return self.finish_statement(Statement::Document(text), first.span, line);
            }
            Token::Keyword(kw @ (Keyword::Break | Keyword::Continue | Keyword::Exit), _) => {
                input.next_token();
                let end = self.eostmt(input)?;
                return self.finish_statement(Statement::Keyword(*kw), first.span.union(end.span), line);
            }
            Token::Keyword(Keyword::If, _) => return self.if_statement(input),
            Token::Keyword(Keyword::Echo, _) => self.echo_stmt(input)?,
            Token::Keyword(Keyword::For, _) => self.for_stmt(input)?,
            Token::Keyword(Keyword::While, _) => self.while_stmt(input)?,
            Token::Keyword(Keyword::Macro, _) => self.macro_defn(input)?,
            Token::Keyword(Keyword::Include, _) => self.include_stmt(input)?,
            Token::Keyword(Keyword::Call, _) => self.call_stmt(input)?,
            Token::Keyword(Keyword::Default, _) => self.default_assignment(input)?,
            Token::Keyword(Keyword::Return, _) => self.return_stmt(input)?,
            _ => {
                let expr = self.expression(input)?;
                self.finish_operand(expr)?
            }
        };

        let end = self.eostmt(input)?;
        self.finish_statement(
            Statement::Node(statement.node),
            statement.span.union(end.span),
            line,
        )
    }

    fn finish_statement(
        &mut self,
        statement: Statement<'_>,
        span: Span,
        line: usize,
    ) -> IResult<Reduced> {
        let node = self.reduce("statement", span, line, |h, r| h.statement(r, statement))?;
        Ok(Reduced::new(node, span, line))
    }

    fn eostmt(&mut self, input: &mut Input<'s>) -> IResult<Reduced> {
        let token = expect(input, "';' or '%]'", Token::is_eostmt)?;
        let terminator = token.lexeme();
        let node = self.reduce("eostmt", token.span, token.line, |h, r| {
            h.eostmt(r, terminator)
        })?;
        Ok(Reduced::new(node, token.span, token.line))
    }

    /// `if_stmt eostmt` or `abbrev_if_stmt`, reduced to `statement`.
    fn if_statement(&mut self, input: &mut Input<'s>) -> IResult<Reduced> {
        let if_token = expect(input, "'if'", keyword(Keyword::If))?;
        let condition = self.expression(input)?;
        let condition = self.finish_operand(condition)?;

        if let Some(then) = peek(input) {
            if then.is_keyword(Keyword::Then) {
                input.next_token();
                let statement = self.statement(input)?;
                let span = if_token.span.union(statement.span);
                let node = self.reduce("abbrev_if_stmt", span, if_token.line, |h, r| {
                    h.abbrev_if_stmt(r, condition.node, statement.node)
                })?;
                return self.finish_statement(Statement::Node(node), span, if_token.line);
            }
        }

        self.eostmt(input)?;
        let body = self.statement_list(input, false)?;

        let mut elseifs = Vec::new();
        while let Some(next) = peek(input) {
            if !next.is_keyword(Keyword::ElseIf) {
                break;
            }
            input.next_token();
            let elseif_condition = self.expression(input)?;
            let elseif_condition = self.finish_operand(elseif_condition)?;
            let elseif_body = self.statement_list(input, false)?;
            let span = elseif_body.map_or(next.span.union(elseif_condition.span), |b| {
                next.span.union(b.span)
            });
            let node = self.reduce("elseif_stmt", span, next.line, |h, r| {
                h.elseif_stmt(r, elseif_condition.node, elseif_body.and_then(|b| b.node))
            })?;
            elseifs.push(Reduced::new(node, span, next.line));
        }
        let elseifs = self.reduce_right("elseif_stmts", &elseifs, |h, r, item, rest| {
            h.elseif_stmts(r, item, rest)
        })?;

        let mut otherwise = None;
        if let Some(next) = peek(input) {
            if next.is_keyword(Keyword::Else) {
                input.next_token();
                let else_body = self.statement_list(input, false)?;
                let span = else_body.map_or(next.span, |b| next.span.union(b.span));
                let node = self.reduce("else_stmt", span, next.line, |h, r| {
                    h.else_stmt(r, else_body.and_then(|b| b.node))
                })?;
                otherwise = Some(Reduced::new(node, span, next.line));
            }
        }

        let end = expect(input, "'end'", keyword(Keyword::End))?;
        let span = if_token.span.union(end.span);
        let node = self.reduce("if_stmt", span, if_token.line, |h, r| {
            h.if_stmt(
                r,
                condition.node,
                body.and_then(|b| b.node),
                elseifs.and_then(|e| e.node),
                otherwise.and_then(|o| o.node),
            )
        })?;

        let terminator = self.eostmt(input)?;
        self.finish_statement(Statement::Node(node), span.union(terminator.span), if_token.line)
    }

    /// Reduce a right-recursive list (`x | x list`) from its last item back.
    fn reduce_right<F>(
        &mut self,
        production: &'static str,
        items: &[Reduced],
        mut f: F,
    ) -> IResult<Option<Reduced>>
    where
        F: FnMut(&mut dyn Handler, &mut Reduction<'_>, Option<NodeId>, Option<NodeId>) -> HandlerResult,
    {
        let Some(last) = items.last().copied() else {
            return Ok(None);
        };
        let mut rest: Option<NodeId> = None;
        let mut list = None;
        for item in items.iter().rev() {
            let span = item.span.union(last.span);
            let node = self.reduce(production, span, item.line, |h, r| f(h, r, item.node, rest))?;
            rest = node;
            list = Some(Reduced::new(node, span, item.line));
        }
        Ok(list)
    }

    fn echo_stmt(&mut self, input: &mut Input<'s>) -> IResult<Reduced> {
        let echo = expect(input, "'echo'", keyword(Keyword::Echo))?;
        let expr = self.optional_expression(input)?;
        let span = expr.map_or(echo.span, |e| echo.span.union(e.span));
        let node = self.reduce("echo_stmt", span, echo.line, |h, r| {
            h.echo_stmt(r, expr.and_then(|e| e.node))
        })?;
        Ok(Reduced::new(node, span, echo.line))
    }

    fn return_stmt(&mut self, input: &mut Input<'s>) -> IResult<Reduced> {
        let ret = expect(input, "'return'", keyword(Keyword::Return))?;
        let expr = self.optional_expression(input)?;
        let span = expr.map_or(ret.span, |e| ret.span.union(e.span));
        let node = self.reduce("return_stmt", span, ret.line, |h, r| {
            h.return_stmt(r, expr.and_then(|e| e.node))
        })?;
        Ok(Reduced::new(node, span, ret.line))
    }

    /// An expression unless the statement ends here.
    fn optional_expression(&mut self, input: &mut Input<'s>) -> IResult<Option<Reduced>> {
        match peek(input) {
            Some(next) if !next.is_eostmt() => {
                let expr = self.expression(input)?;
                Ok(Some(self.finish_operand(expr)?))
            }
            _ => Ok(None),
        }
    }

    fn default_assignment(&mut self, input: &mut Input<'s>) -> IResult<Reduced> {
        let default = expect(input, "'default'", keyword(Keyword::Default))?;
        let expr = self.expression(input)?;
        let expr = self.finish_operand(expr)?;
        let span = default.span.union(expr.span);
        let node = self.reduce("default_assignment", span, default.line, |h, r| {
            h.default_assignment(r, expr.node)
        })?;
        Ok(Reduced::new(node, span, default.line))
    }

    fn include_stmt(&mut self, input: &mut Input<'s>) -> IResult<Reduced> {
        let include = expect(input, "'include'", keyword(Keyword::Include))?;
        let file = match (peek(input), peek_second(input)) {
            (Some(target), Some(after)) if after.is_eostmt() => match target.token {
                Token::StringLiteral(name) => Some(name),
                _ => None,
            },
            _ => None,
        };
        let target = self.expression(input)?;
        let target = self.finish_operand(target)?;
        let span = include.span.union(target.span);
        let node = self.reduce("include_stmt", span, include.line, |h, r| {
            h.include_stmt(r, target.node, file)
        })?;
        Ok(Reduced::new(node, span, include.line))
    }

    fn call_stmt(&mut self, input: &mut Input<'s>) -> IResult<Reduced> {
        let call = expect(input, "'call'", keyword(Keyword::Call))?;
        let expr = self.expression(input)?;
        if !expr.call {
            return Err(unexpected(input, "macro call"));
        }
        let span = call.span.union(expr.value.span);
        let node = self.reduce("call_stmt", span, call.line, |h, r| {
            h.call_stmt(r, expr.value.node)
        })?;
        Ok(Reduced::new(node, span, call.line))
    }

    fn for_stmt(&mut self, input: &mut Input<'s>) -> IResult<Reduced> {
        let for_token = expect(input, "'for'", keyword(Keyword::For))?;
        let each = match peek(input) {
            Some(next) if next.is_keyword(Keyword::Each) => {
                input.next_token();
                true
            }
            _ => false,
        };
        let expr = self.expression(input)?;
        let expr = self.finish_operand(expr)?;
        let as_clause = self.as_clause(input)?;
        self.eostmt(input)?;
        let body = self.statement_list(input, false)?;
        let end = expect(input, "'end'", keyword(Keyword::End))?;

        let span = for_token.span.union(end.span);
        let node = self.reduce("for_stmt", span, for_token.line, |h, r| {
            h.for_stmt(
                r,
                each,
                expr.node,
                as_clause.and_then(|a| a.node),
                body.and_then(|b| b.node),
            )
        })?;
        Ok(Reduced::new(node, span, for_token.line))
    }

    fn as_clause(&mut self, input: &mut Input<'s>) -> IResult<Option<Reduced>> {
        let Some(as_token) = peek(input) else {
            return Ok(None);
        };
        if !as_token.is_keyword(Keyword::As) {
            return Ok(None);
        }
        input.next_token();

        let mut names = vec![self.identifier(input)?];
        if let Some(comma) = peek(input) {
            if matches!(comma.token, Token::Comma) {
                input.next_token();
                names.push(self.identifier(input)?);
            }
        }

        let span = names
            .iter()
            .fold(as_token.span, |span, name| span.union(name.span()));
        let node = self.reduce("as_clause", span, as_token.line, |h, r| {
            h.as_clause(r, &names)
        })?;
        Ok(Some(Reduced::new(node, span, as_token.line)))
    }

    fn identifier(&mut self, input: &mut Input<'s>) -> IResult<Spanned<&'s str>> {
        let token = expect(input, "identifier", |t| matches!(t, Token::Identifier(_)))?;
        Ok(Spanned::new(token.lexeme(), token.span))
    }

    fn while_stmt(&mut self, input: &mut Input<'s>) -> IResult<Reduced> {
        let while_token = expect(input, "'while'", keyword(Keyword::While))?;
        let condition = self.expression(input)?;
        let condition = self.finish_operand(condition)?;
        let body = self.statement_list(input, false)?;
        let end = expect(input, "'end'", keyword(Keyword::End))?;

        let span = while_token.span.union(end.span);
        let node = self.reduce("while_stmt", span, while_token.line, |h, r| {
            h.while_stmt(r, condition.node, body.and_then(|b| b.node))
        })?;
        Ok(Reduced::new(node, span, while_token.line))
    }

    fn macro_defn(&mut self, input: &mut Input<'s>) -> IResult<Reduced> {
        let macro_token = expect(input, "'macro'", keyword(Keyword::Macro))?;
        let line = macro_token.line;

        let names = self.dotted_names(input)?;
        let name = names
            .iter()
            .map(|name| *name.inner())
            .collect::<Vec<_>>()
            .join(".");
        let id = self.dotted_id(&names)?;

        let mut decl_span = names
            .iter()
            .fold(macro_token.span, |span, name| span.union(name.span()));
        let mut params = None;
        if let Some(open) = peek(input) {
            if matches!(open.token, Token::LParen) {
                input.next_token();
                params = self.param_list(input)?;
                let close = expect(input, "')'", |t| matches!(t, Token::RParen))?;
                decl_span = decl_span.union(close.span);
            }
        }
        let decl = self.reduce("macro_decl", decl_span, line, |h, r| {
            h.macro_decl(r, id.and_then(|i| i.node), params.and_then(|p| p.node), &name)
        })?;

        self.eostmt(input)?;
        let body = self.statement_list(input, false)?;
        let end = expect(input, "'end'", keyword(Keyword::End))?;

        let span = macro_token.span.union(end.span);
        let node = self.reduce("macro_defn", span, line, |h, r| {
            h.macro_defn(r, decl, body.and_then(|b| b.node), &name)
        })?;
        Ok(Reduced::new(node, span, line))
    }

    /// `ID ('.' ID)*`
    fn dotted_names(&mut self, input: &mut Input<'s>) -> IResult<Vec<Spanned<&'s str>>> {
        let mut names = vec![self.identifier(input)?];
        while let Some(dot) = peek(input) {
            if !matches!(dot.token, Token::Dot) {
                break;
            }
            input.next_token();
            names.push(self.identifier(input)?);
        }
        Ok(names)
    }

    /// Reduce `dotted_id` from the last name back to the first.
    fn dotted_id(&mut self, names: &[Spanned<&'s str>]) -> IResult<Option<Reduced>> {
        let Some(last) = names.last().copied() else {
            return Ok(None);
        };
        let mut rest: Option<NodeId> = None;
        let mut id = None;
        for name in names.iter().rev() {
            let span = name.span().union(last.span());
            let head = *name.inner();
            let line = self.line_of(span.start());
            let node = self.reduce("dotted_id", span, line, |h, r| h.dotted_id(r, head, rest))?;
            rest = node;
            id = Some(Reduced::new(node, span, line));
        }
        Ok(id)
    }

    fn param_list(&mut self, input: &mut Input<'s>) -> IResult<Option<Reduced>> {
        let mut params = Vec::new();
        if let Some(next) = peek(input) {
            if matches!(next.token, Token::RParen) {
                return Ok(None);
            }
        }
        loop {
            params.push(self.param_decl(input)?);
            match peek(input) {
                Some(next) if matches!(next.token, Token::Comma) => {
                    input.next_token();
                }
                _ => break,
            }
        }
        self.reduce_right("param_list", &params, |h, r, param, rest| {
            h.param_list(r, param, rest)
        })
    }

    fn param_decl(&mut self, input: &mut Input<'s>) -> IResult<Reduced> {
        let name = self.identifier(input)?;
        let line = self.line_of(name.span().start());
        let mut default = None;
        if let Some(assign) = peek(input) {
            if matches!(assign.token, Token::Assign) {
                input.next_token();
                let expr = self.expression(input)?;
                default = Some(self.finish_operand(expr)?);
            }
        }
        let span = default.map_or(name.span(), |d| name.span().union(d.span));
        let node = self.reduce("param_decl", span, line, |h, r| {
            h.param_decl(r, name, default.and_then(|d| d.node))
        })?;
        Ok(Reduced::new(node, span, line))
    }

    fn line_of(&self, offset: usize) -> usize {
        self.tokens
            .iter()
            .find(|token| token.span.start() == offset)
            .map_or(1, |token| token.line)
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expression(&mut self, input: &mut Input<'s>) -> IResult<Operand> {
        self.expr_bp(input, 0)
    }

    /// Reduce a pending `macro_call` operand to `expr`.
    fn finish_operand(&mut self, operand: Operand) -> IResult<Reduced> {
        if !operand.call {
            return Ok(operand.value);
        }
        let Reduced { node, span, line } = operand.value;
        let node = self.reduce("expr", span, line, |h, r| h.expr(r, Expr::Operand(node)))?;
        Ok(Reduced::new(node, span, line))
    }

    fn expr_bp(&mut self, input: &mut Input<'s>, min_level: u8) -> IResult<Operand> {
        let mut lhs = self.prefix(input)?;
        let mut last_nonassoc = None;

        while let Some(next) = peek(input) {
            match next.token {
                Token::LParen if POSTFIX_LEVEL >= min_level => {
                    lhs = self.macro_call(input, lhs)?;
                    continue;
                }
                Token::LBracket if POSTFIX_LEVEL >= min_level => {
                    lhs = self.array_ref(input, lhs)?;
                    continue;
                }
                _ => {}
            }

            let Some((level, assoc)) = binary_level(&next.token) else {
                break;
            };
            if level < min_level {
                break;
            }
            if assoc == Assoc::NonAssoc && last_nonassoc == Some(level) {
                return Err(unexpected(input, "end of expression"));
            }

            input.next_token();
            let operator = operator_text(&next.token);
            let left = self.finish_operand(lhs)?;
            let right = if level == ASSIGN_LEVEL {
                self.assignment_rhs(input)?
            } else {
                let rhs_level = match assoc {
                    Assoc::Right => level,
                    Assoc::Left | Assoc::NonAssoc => level + 1,
                };
                let rhs = self.expr_bp(input, rhs_level)?;
                self.finish_operand(rhs)?
            };
            lhs = self.binary(operator, left, right)?.into();
            last_nonassoc = (assoc == Assoc::NonAssoc).then_some(level);
        }

        Ok(lhs)
    }

    /// Right operand of an assignment, re-associating chained assignments.
    fn assignment_rhs(&mut self, input: &mut Input<'s>) -> IResult<Reduced> {
        let rhs = self.expr_bp(input, ASSIGN_LEVEL + 1)?;
        let rhs = self.finish_operand(rhs)?;

        let Some(next) = peek(input) else {
            return Ok(rhs);
        };
        if !matches!(next.token, Token::Assign | Token::AssignOp(_)) {
            return Ok(rhs);
        }

        warn!(file = self.file, line = next.line; "Chained assignment re-associated to the right");
        self.diagnostics.emit(
            Diagnostic::warning("chained assignment re-associated to the right")
                .with_label(next.span, "second assignment"),
        );
        input.next_token();
        let operator = operator_text(&next.token);
        let further = self.assignment_rhs(input)?;
        self.binary(operator, rhs, further)
    }

    fn binary(&mut self, operator: &str, lhs: Reduced, rhs: Reduced) -> IResult<Reduced> {
        let span = lhs.span.union(rhs.span);
        let node = self.reduce("expr", span, lhs.line, |h, r| {
            h.expr(
                r,
                Expr::Binary {
                    operator,
                    lhs: lhs.node,
                    rhs: rhs.node,
                },
            )
        })?;
        Ok(Reduced::new(node, span, lhs.line))
    }

    fn prefix(&mut self, input: &mut Input<'s>) -> IResult<Operand> {
        let Some(token) = peek(input) else {
            return Err(unexpected(input, "expression"));
        };
        let (span, line) = (token.span, token.line);

        let literal = match &token.token {
            Token::Keyword(Keyword::Not, _) => return self.unary(input, NOT_OPERAND),
            Token::Exclamation => return self.unary(input, BANG_OPERAND),
            Token::Plus | Token::Minus => return self.unary(input, UMINUS_OPERAND),
            Token::Identifier(name) => {
                input.next_token();
                let node = self.reduce("expr", span, line, |h, r| h.expr(r, Expr::Id(name)))?;
                return Ok(Reduced::new(node, span, line).into());
            }
            Token::LParen => return self.paren_expr(input),
            Token::LBracket => return self.array_literal(input),
            Token::Number { value, .. } => Literal::Number(*value),
            Token::StringLiteral(text) => Literal::String(text),
            Token::Keyword(Keyword::True, _) => Literal::Boolean(true),
            Token::Keyword(Keyword::False, _) => Literal::Boolean(false),
            Token::Keyword(Keyword::Null, _) => Literal::Null,
            _ => return Err(unexpected(input, "expression")),
        };

        input.next_token();
        self.literal_expr(literal, span, line)
    }

    /// Reduce `literal`, then `expr : literal`.
    fn literal_expr(&mut self, literal: Literal<'_>, span: Span, line: usize) -> IResult<Operand> {
        let value = self.reduce("literal", span, line, |h, r| h.literal(r, literal))?;
        let node = self.reduce("expr", span, line, |h, r| h.expr(r, Expr::Operand(value)))?;
        Ok(Reduced::new(node, span, line).into())
    }

    fn unary(&mut self, input: &mut Input<'s>, operand_level: u8) -> IResult<Operand> {
        let Some(op) = input.next_token() else {
            return Err(unexpected(input, "operator"));
        };
        let operand = self.expr_bp(input, operand_level)?;
        let operand = self.finish_operand(operand)?;
        // `not` shares the non-associative `is`/`==`/`!=` level.
        if op.token.is_keyword(Keyword::Not) {
            let next_level = peek(input).and_then(|next| binary_level(&next.token));
            if next_level.is_some_and(|(level, _)| level == NOT_LEVEL) {
                return Err(unexpected(input, "end of expression"));
            }
        }
        let operator = operator_text(&op.token);
        let span = op.span.union(operand.span);
        let node = self.reduce("expr", span, op.line, |h, r| {
            h.expr(
                r,
                Expr::Unary {
                    operator,
                    operand: operand.node,
                },
            )
        })?;
        Ok(Reduced::new(node, span, op.line).into())
    }

    fn paren_expr(&mut self, input: &mut Input<'s>) -> IResult<Operand> {
        let open = expect(input, "'('", |t| matches!(t, Token::LParen))?;
        let inner = self.expression(input)?;
        let inner = self.finish_operand(inner)?;
        let close = expect(input, "')'", |t| matches!(t, Token::RParen))?;

        let span = open.span.union(close.span);
        let paren = self.reduce("paren_expr", span, open.line, |h, r| {
            h.paren_expr(r, inner.node)
        })?;
        let node = self.reduce("expr", span, open.line, |h, r| h.expr(r, Expr::Operand(paren)))?;
        Ok(Reduced::new(node, span, open.line).into())
    }

    fn array_literal(&mut self, input: &mut Input<'s>) -> IResult<Operand> {
        let open = expect(input, "'['", |t| matches!(t, Token::LBracket))?;
        let mut elements: Option<Reduced> = None;

        while let Some(next) = peek(input) {
            if matches!(next.token, Token::RBracket) {
                break;
            }
            let expr = self.expression(input)?;
            let expr = self.finish_operand(expr)?;
            let previous = elements;
            let span = previous.map_or(expr.span, |p| p.span.union(expr.span));
            let line = previous.map_or(expr.line, |p| p.line);
            let node = self.reduce("array_elems", span, line, |h, r| {
                h.array_elems(r, expr.node, previous.and_then(|p| p.node))
            })?;
            elements = Some(Reduced::new(node, span, line));

            match peek(input) {
                Some(comma) if matches!(comma.token, Token::Comma) => {
                    input.next_token();
                }
                _ => break,
            }
        }

        let close = expect(input, "']'", |t| matches!(t, Token::RBracket))?;
        let span = open.span.union(close.span);
        let array = self.reduce("array_literal", span, open.line, |h, r| {
            h.array_literal(r, elements.and_then(|e| e.node))
        })?;
        self.literal_expr(Literal::Array(array), span, open.line)
    }

    fn array_ref(&mut self, input: &mut Input<'s>, variable: Operand) -> IResult<Operand> {
        let variable = self.finish_operand(variable)?;
        expect(input, "'['", |t| matches!(t, Token::LBracket))?;
        let index = self.expression(input)?;
        let index = self.finish_operand(index)?;
        let close = expect(input, "']'", |t| matches!(t, Token::RBracket))?;

        let span = variable.span.union(close.span);
        let array_ref = self.reduce("array_ref", span, variable.line, |h, r| {
            h.array_ref(r, variable.node, index.node)
        })?;
        let node = self.reduce("expr", span, variable.line, |h, r| {
            h.expr(r, Expr::Operand(array_ref))
        })?;
        Ok(Reduced::new(node, span, variable.line).into())
    }

    fn macro_call(&mut self, input: &mut Input<'s>, callee: Operand) -> IResult<Operand> {
        let callee = self.finish_operand(callee)?;
        expect(input, "'('", |t| matches!(t, Token::LParen))?;

        let mut args = Vec::new();
        let has_args = peek(input).is_some_and(|next| !matches!(next.token, Token::RParen));
        if has_args {
            loop {
                args.push(self.arg(input)?);
                match peek(input) {
                    Some(next) if matches!(next.token, Token::Comma) => {
                        input.next_token();
                    }
                    _ => break,
                }
            }
        }
        let close = expect(input, "')'", |t| matches!(t, Token::RParen))?;
        let arg_list = self.reduce_right("arg_list", &args, |h, r, arg, rest| {
            h.arg_list(r, arg, rest)
        })?;

        let name: String = self
            .source
            .get(callee.span.range())
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let span = callee.span.union(close.span);
        let node = self.reduce("macro_call", span, callee.line, |h, r| {
            h.macro_call(r, callee.node, arg_list.and_then(|a| a.node), &name)
        })?;
        Ok(Operand {
            value: Reduced::new(node, span, callee.line),
            call: true,
        })
    }

    /// `arg : expr | STRING COLON expr | ID COLON expr`
    fn arg(&mut self, input: &mut Input<'s>) -> IResult<Reduced> {
        let keyed = match (peek(input), peek_second(input)) {
            (Some(name), Some(colon)) if matches!(colon.token, Token::Colon) => {
                match name.token {
                    Token::Identifier(key) | Token::StringLiteral(key) => Some((key, name)),
                    _ => None,
                }
            }
            _ => None,
        };

        let Some((key, name_token)) = keyed else {
            let value = self.expression(input)?;
            let value = self.finish_operand(value)?;
            let node = self.reduce("arg", value.span, value.line, |h, r| {
                h.arg(r, value.node, None)
            })?;
            return Ok(Reduced::new(node, value.span, value.line));
        };

        input.next_token();
        input.next_token();
        let value = self.expression(input)?;
        let value = self.finish_operand(value)?;
        let span = name_token.span.union(value.span);
        let node = self.reduce("arg", span, name_token.line, |h, r| {
            h.arg(r, value.node, Some(key))
        })?;
        Ok(Reduced::new(node, span, name_token.line))
    }
}

/// The tree built by a parse and the value of its `utldoc` reduction.
#[derive(Debug, Clone, Default)]
pub struct ParseOutput {
    pub tree: Tree,
    pub root: Option<NodeId>,
}

impl ParseOutput {
    /// The root node, if a handler produced one.
    pub fn root_node(&self) -> Option<NodeRef<'_>> {
        self.root.map(|id| self.tree.node(id))
    }
}

/// A UTL parser driving a list of handlers.
///
/// # Examples
///
/// ```
/// use utl_core::NodeView;
/// use utl_parser::{AstHandler, Parser};
///
/// let mut parser = Parser::with_handler(AstHandler::new(false)).with_file("page.utl");
/// let output = parser.parse("[% a = b + 3; %]")?;
/// let root = output.root_node().expect("AST root");
/// assert_eq!(root.find_all("id").len(), 2);
/// assert_eq!(parser.error_count(), 0);
/// # Ok::<(), utl_parser::error::ParseError>(())
/// ```
pub struct Parser {
    handlers: Vec<Box<dyn Handler>>,
    file: String,
    strict: bool,
    diagnostics: DiagnosticCollector,
}

impl Parser {
    /// Create a parser that calls `handlers` in order for every reduction.
    pub fn new(handlers: Vec<Box<dyn Handler>>) -> Self {
        Self {
            handlers,
            file: String::new(),
            strict: false,
            diagnostics: DiagnosticCollector::new(),
        }
    }

    /// Create a parser with a single handler.
    pub fn with_handler(handler: impl Handler + 'static) -> Self {
        Self::new(vec![Box::new(handler)])
    }

    /// Set the file name recorded in every context.
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    /// Abort on the first syntax error regardless of the handlers.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn set_file(&mut self, file: impl Into<String>) {
        self.file = file.into();
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn handlers(&self) -> &[Box<dyn Handler>] {
        &self.handlers
    }

    /// Number of syntax errors since construction or the last restart.
    pub fn error_count(&self) -> usize {
        self.diagnostics.error_count()
    }

    /// Syntax errors and warnings since construction or the last restart.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.diagnostics.diagnostics()
    }

    /// Reset error state, optionally installing new handlers.
    pub fn restart(&mut self, handlers: Option<Vec<Box<dyn Handler>>>) {
        if let Some(handlers) = handlers {
            self.handlers = handlers;
        }
        self.diagnostics.clear();
    }

    /// Parse `source`.
    ///
    /// Syntax errors in non-strict mode are counted and recorded; the parse
    /// still returns the tree built from the statements that did parse.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] on a lexical error, when a strict parser or
    /// handler meets a syntax error, or when a handler breaks a tree
    /// invariant.
    pub fn parse(&mut self, source: &str) -> Result<ParseOutput, ParseError> {
        info!(file = self.file.as_str(); "Parsing UTL source");
        let tokens: Vec<PositionedToken<'_>> = tokenize(source)?
            .into_iter()
            .filter(|token| !matches!(token.token, Token::Comment(_) | Token::StartUtl { .. }))
            .collect();

        let errors_before = self.diagnostics.error_count();
        let mut tree = Tree::new();
        let result = {
            let mut grammar = Grammar {
                tokens: &tokens,
                source,
                file: &self.file,
                strict: self.strict,
                tree: &mut tree,
                handlers: &mut self.handlers,
                diagnostics: &mut self.diagnostics,
            };
            let mut input = TokenSlice::new(&tokens);
            grammar.utldoc(&mut input)
        };

        let root = match result {
            Ok(root) => root,
            Err(err) => return Err(self.fatal(into_context(err))),
        };
        debug!(
            file = self.file.as_str(),
            nodes = tree.len(),
            errors = self.diagnostics.error_count() - errors_before;
            "Parse finished"
        );
        Ok(ParseOutput { tree, root })
    }

    fn fatal(&self, err: ContextError<Context>) -> ParseError {
        let tree_err = err.context().find_map(|ctx| match ctx {
            Context::Tree(err) => Some(err.clone()),
            _ => None,
        });
        match tree_err {
            Some(err) => Diagnostic::error(format!("invalid tree construction: {err}"))
                .with_code(ErrorCode::E102)
                .into(),
            None => ParseError::new(self.diagnostics.diagnostics().to_vec()),
        }
    }
}
