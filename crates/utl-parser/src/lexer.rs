//! Lexical analyzer for UTL source text.
//!
//! Source text alternates between document regions, which are passed
//! through verbatim as `DOCUMENT` tokens, and code regions delimited by
//! `[% ... %]`. The lexer keeps a stack of open code regions: an empty stack
//! means document state, anything else means code state.
//!
//! In code state whitespace and `/* ... */` comments are skipped, and the
//! word pair `else if` is read as the single keyword `elseif` whose span
//! still covers the original bytes.
//!
//! [`Lexer::next_token`] streams tokens and yields a synthesized `EOF` exactly
//! once. [`tokenize`] collects the whole stream. Lexical errors are fatal.

use log::{debug, trace};
use winnow::{
    Parser as _,
    ascii::{Caseless, digit1},
    combinator::{alt, cut_err, not, opt, peek, preceded, terminated},
    error::{ContextError, ErrMode, ModalResult},
    stream::{LocatingSlice, Location},
    token::{literal, one_of, take_till, take_until, take_while},
};

use crate::{
    error::{Diagnostic, ErrorCode, ParseError},
    span::Span,
    tokens::{Keyword, PositionedToken, Token},
};

/// Rich diagnostic information for lexer errors.
///
/// Attached to winnow errors via `.context()`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LexerDiagnostic {
    pub code: ErrorCode,
    pub message: &'static str,
    pub help: Option<&'static str>,
    /// Offset of the construct that was left open.
    pub start: usize,
}

type Input<'a> = LocatingSlice<&'a str>;
type IResult<O> = ModalResult<O, ContextError<LexerDiagnostic>>;

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// `[%` or `[%-`
fn start_utl<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    alt((
        literal("[%-").value(Token::StartUtl { trim: true }),
        literal("[%").value(Token::StartUtl { trim: false }),
    ))
    .parse_next(input)
}

/// `%]` or `-%]`
fn end_utl<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    alt((
        literal("-%]").value(Token::EndUtl { trim: true }),
        literal("%]").value(Token::EndUtl { trim: false }),
    ))
    .parse_next(input)
}

/// Verbatim text up to the next `[`, or a lone `[`.
fn document_text<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    alt((
        take_while(1.., |c: char| c != '[').map(Token::Document),
        literal("[").map(Token::Document),
    ))
    .parse_next(input)
}

fn document_token<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    alt((start_utl, end_utl, document_text)).parse_next(input)
}

fn whitespace<'a>(input: &mut Input<'a>) -> IResult<()> {
    take_while(1.., char::is_whitespace).void().parse_next(input)
}

/// `/* ... */`, not nested.
fn comment<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    let start = input.current_token_start();
    preceded(
        literal("/*"),
        cut_err((take_until(0.., "*/"), literal("*/"))).context(LexerDiagnostic {
            code: ErrorCode::E004,
            message: "unterminated comment",
            help: Some("close the comment with `*/`"),
            start,
        }),
    )
    .take()
    .map(Token::Comment)
    .parse_next(input)
}

/// Single- or double-quoted text; there are no escapes.
fn string_literal<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    let start = input.current_token_start();
    let quote = one_of(['"', '\'']).parse_next(input)?;
    cut_err(terminated(take_till(0.., quote), quote))
        .context(LexerDiagnostic {
            code: ErrorCode::E003,
            message: "unterminated string literal",
            help: Some("add the closing quote"),
            start,
        })
        .map(Token::StringLiteral)
        .parse_next(input)
}

/// `\d+(\.\d+)?`
fn number<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    (digit1, opt(('.', digit1)))
        .take()
        .try_map(|text: &'a str| {
            text.parse::<f64>()
                .map(|value| Token::Number { text, value })
        })
        .parse_next(input)
}

/// Identifiers, with reserved words re-tagged case-insensitively.
fn identifier<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., is_ident_char),
    )
        .take()
        .map(|word: &'a str| match Keyword::lookup(word) {
            Some(keyword) => Token::Keyword(keyword, word),
            None => Token::Identifier(word),
        })
        .parse_next(input)
}

/// Whitespace followed by a standalone `if`, completing `else if`.
fn else_if_tail<'a>(input: &mut Input<'a>) -> IResult<()> {
    (
        take_while(1.., char::is_whitespace),
        literal(Caseless("if")),
        peek(not(one_of(is_ident_char))),
    )
        .void()
        .parse_next(input)
}

/// Multi-character operators, checked before their one-character prefixes.
fn multi_char_operator<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    alt((
        literal("..").value(Token::Range),
        alt((
            literal("+="),
            literal("-="),
            literal("*="),
            literal("/="),
            literal("%="),
        ))
        .map(Token::AssignOp),
        literal("==").value(Token::Eq),
        literal("!=").value(Token::Neq),
        literal("<=").value(Token::Lte),
        literal(">=").value(Token::Gte),
        literal("&&").value(Token::DoubleAmp),
        literal("||").value(Token::DoubleBar),
    ))
    .parse_next(input)
}

fn single_char_token<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    alt((
        alt((
            '+'.value(Token::Plus),
            '-'.value(Token::Minus),
            '*'.value(Token::Times),
            '/'.value(Token::Div),
            '%'.value(Token::Modulus),
            '.'.value(Token::Dot),
            '<'.value(Token::Lt),
            '>'.value(Token::Gt),
            '='.value(Token::Assign),
        )),
        alt((
            '!'.value(Token::Exclamation),
            '|'.value(Token::Filter),
            ':'.value(Token::Colon),
            ','.value(Token::Comma),
            ';'.value(Token::Semi),
            '('.value(Token::LParen),
            ')'.value(Token::RParen),
            '['.value(Token::LBracket),
            ']'.value(Token::RBracket),
        )),
    ))
    .parse_next(input)
}

/// One code-state token. `None` means whitespace was skipped.
fn utl_token<'a>(input: &mut Input<'a>) -> IResult<Option<Token<'a>>> {
    if opt(whitespace).parse_next(input)?.is_some() {
        return Ok(None);
    }

    let token = alt((
        comment,             // Must come before '/'
        start_utl,           // Must come before '['
        end_utl,             // Must come before '-' and '%'
        string_literal,
        number,
        identifier,
        multi_char_operator, // Must come before single char operators
        single_char_token,
    ))
    .parse_next(input)?;

    if matches!(token, Token::Keyword(Keyword::Else, _))
        && opt(else_if_tail).parse_next(input)?.is_some()
    {
        return Ok(Some(Token::Keyword(Keyword::ElseIf, "elseif")));
    }
    Ok(Some(token))
}

/// Streaming lexer over one source text.
///
/// # Examples
///
/// ```
/// use utl_parser::Lexer;
///
/// let mut lexer = Lexer::new("hi [% a %]");
/// let kinds: Vec<&str> = std::iter::from_fn(|| lexer.next_token().transpose())
///     .map(|token| token.map(|t| t.kind_name()))
///     .collect::<Result<_, _>>()?;
/// assert_eq!(kinds, ["DOCUMENT", "START_UTL", "ID", "END_UTL", "EOF"]);
/// # Ok::<(), utl_parser::error::Diagnostic>(())
/// ```
pub struct Lexer<'a> {
    source: &'a str,
    input: Input<'a>,
    /// Spans of the `[%` delimiters of the open code regions.
    regions: Vec<Span>,
    keep_comments: bool,
    eof_sent: bool,
    failed: bool,
    line: usize,
    line_offset: usize,
}

impl<'a> Lexer<'a> {
    /// Create a lexer positioned at the start of `source`, in document state.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            input: LocatingSlice::new(source),
            regions: Vec::new(),
            keep_comments: false,
            eof_sent: false,
            failed: false,
            line: 1,
            line_offset: 0,
        }
    }

    /// Emit `COMMENT` tokens instead of skipping comments.
    pub fn with_comments(mut self, keep_comments: bool) -> Self {
        self.keep_comments = keep_comments;
        self
    }

    /// The text being scanned.
    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Whether the lexer is currently inside a code region.
    pub fn in_code(&self) -> bool {
        !self.regions.is_empty()
    }

    /// Return the next token, `EOF` once at end of input, then `None`.
    ///
    /// # Errors
    ///
    /// Returns a [`Diagnostic`] for an illegal character (E001), an unmatched
    /// `%]` (E002), an unterminated string (E003) or comment (E004). The
    /// lexer yields nothing further after an error.
    pub fn next_token(&mut self) -> Result<Option<PositionedToken<'a>>, Diagnostic> {
        if self.failed {
            return Ok(None);
        }
        loop {
            let start = self.input.current_token_start();
            if self.input.is_empty() {
                if self.eof_sent {
                    return Ok(None);
                }
                self.eof_sent = true;
                if let Some(open) = self.regions.last() {
                    debug!(open_regions = self.regions.len(), offset = open.start(); "Input ends inside a code region");
                }
                let line = self.line_at(start);
                return Ok(Some(PositionedToken::new(
                    Token::Eof,
                    Span::empty_at(start),
                    line,
                )));
            }

            let result = if self.regions.is_empty() {
                document_token(&mut self.input).map(Some)
            } else {
                utl_token(&mut self.input)
            };

            let token = match result {
                Ok(Some(token)) => token,
                Ok(None) => continue,
                Err(err) => {
                    self.failed = true;
                    return Err(self.convert_err_mode(err, start));
                }
            };

            match token {
                Token::StartUtl { .. } => {
                    let end = self.input.current_token_start();
                    self.regions.push(Span::new(start..end));
                }
                Token::EndUtl { .. } => {
                    if self.regions.pop().is_none() {
                        self.failed = true;
                        let line = self.line_at(start);
                        let end = self.input.current_token_start();
                        return Err(Diagnostic::error(format!(
                            "Lexical error at line {line}: unmatched '%]'"
                        ))
                        .with_code(ErrorCode::E002)
                        .with_label(Span::new(start..end), ErrorCode::E002.description())
                        .with_help("remove the delimiter or open a region with `[%`"));
                    }
                }
                Token::Comment(_) if !self.keep_comments => continue,
                _ => {}
            }

            let end = self.input.current_token_start();
            let line = self.line_at(start);
            trace!(kind = token.kind_name(), start, end, line; "Lexed token");
            return Ok(Some(PositionedToken::new(token, Span::new(start..end), line)));
        }
    }

    /// 1-based line of `offset`; offsets must be requested in increasing order.
    fn line_at(&mut self, offset: usize) -> usize {
        if offset > self.line_offset {
            let skipped = self.source.get(self.line_offset..offset).unwrap_or_default();
            self.line += skipped.bytes().filter(|b| *b == b'\n').count();
            self.line_offset = offset;
        }
        self.line
    }

    /// Convert a winnow error at `error_pos` to a diagnostic.
    ///
    /// Falls back to E001 (illegal character) when no context is attached.
    fn convert_err_mode(
        &mut self,
        err: ErrMode<ContextError<LexerDiagnostic>>,
        error_pos: usize,
    ) -> Diagnostic {
        let context_error = match err {
            ErrMode::Backtrack(ctx) | ErrMode::Cut(ctx) => ctx,
            ErrMode::Incomplete(_) => ContextError::new(),
        };

        if let Some(LexerDiagnostic {
            code,
            message,
            help,
            start,
        }) = context_error.context().next()
        {
            let line = self.line_at(*start);
            let span = Span::new(*start..self.source.len());
            let mut diag = Diagnostic::error(format!("{message} starting at line {line}"))
                .with_code(*code)
                .with_label(span, code.description());
            if let Some(h) = help {
                diag = diag.with_help(*h);
            }
            return diag;
        }

        let line = self.line_at(error_pos);
        let ch = self.source[error_pos..].chars().next().unwrap_or(' ');
        let span = Span::new(error_pos..error_pos + ch.len_utf8());
        Diagnostic::error(format!(
            "Illegal character '{ch}' in template code at line {line}"
        ))
        .with_code(ErrorCode::E001)
        .with_label(span, ErrorCode::E001.description())
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<PositionedToken<'a>, Diagnostic>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

/// Tokenize `source` completely, including the trailing `EOF`.
///
/// Comments are skipped.
///
/// # Errors
///
/// Returns a [`ParseError`] holding the first lexical error.
pub fn tokenize(source: &str) -> Result<Vec<PositionedToken<'_>>, ParseError> {
    tokenize_with(Lexer::new(source))
}

/// Tokenize with a preconfigured lexer, e.g. one that keeps comments.
///
/// # Errors
///
/// Returns a [`ParseError`] holding the first lexical error.
pub fn tokenize_with(lexer: Lexer<'_>) -> Result<Vec<PositionedToken<'_>>, ParseError> {
    let tokens = lexer.collect::<Result<Vec<_>, _>>()?;
    debug!(tokens = tokens.len(); "Tokenized source");
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn kinds(source: &str) -> Vec<&'static str> {
        tokenize(source)
            .unwrap()
            .iter()
            .map(|t| t.kind_name())
            .collect()
    }

    fn test_single_token(input: &str, expected: Token<'_>) {
        let source = format!("[%{input}");
        let tokens = tokenize(&source).unwrap();
        assert_eq!(tokens.len(), 3, "unexpected tokens for {input:?}: {tokens:?}");
        assert_eq!(tokens[1].token, expected);
    }

    fn lex_error(source: &str) -> Diagnostic {
        let err = tokenize(source).unwrap_err();
        err.diagnostics()[0].clone()
    }

    #[test]
    fn test_keywords() {
        test_single_token("if", Token::Keyword(Keyword::If, "if"));
        test_single_token("END", Token::Keyword(Keyword::End, "END"));
        test_single_token("foreach", Token::Keyword(Keyword::For, "foreach"));
        test_single_token("Then", Token::Keyword(Keyword::Then, "Then"));
        test_single_token("not", Token::Keyword(Keyword::Not, "not"));
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        test_single_token("iffy", Token::Identifier("iffy"));
        test_single_token("forbin", Token::Identifier("forbin"));
        test_single_token("_end2", Token::Identifier("_end2"));
    }

    #[test]
    fn test_numbers() {
        test_single_token(
            "42",
            Token::Number {
                text: "42",
                value: 42.0,
            },
        );
        test_single_token(
            "3.25",
            Token::Number {
                text: "3.25",
                value: 3.25,
            },
        );
    }

    #[test]
    fn test_range_is_not_a_decimal_point() {
        assert_eq!(kinds("[% 1..5"), ["START_UTL", "NUMBER", "RANGE", "NUMBER", "EOF"]);
    }

    #[test]
    fn test_strings() {
        test_single_token("'x'", Token::StringLiteral("x"));
        test_single_token("\"it's\"", Token::StringLiteral("it's"));
        test_single_token("''", Token::StringLiteral(""));
    }

    #[test]
    fn test_operators() {
        test_single_token("+=", Token::AssignOp("+="));
        test_single_token("%=", Token::AssignOp("%="));
        test_single_token("==", Token::Eq);
        test_single_token("!=", Token::Neq);
        test_single_token("<=", Token::Lte);
        test_single_token(">=", Token::Gte);
        test_single_token("&&", Token::DoubleAmp);
        test_single_token("||", Token::DoubleBar);
        test_single_token("..", Token::Range);
        test_single_token("|", Token::Filter);
        test_single_token("!", Token::Exclamation);
        test_single_token("%", Token::Modulus);
        test_single_token("[", Token::LBracket);
    }

    #[test]
    fn test_macro_with_comment_and_literals() {
        let tokens = tokenize("[% macro f(); a = 5 * 3; /* comment */ end; %]").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind_name()).collect();
        assert_eq!(
            kinds,
            [
                "START_UTL",
                "MACRO",
                "ID",
                "LPAREN",
                "RPAREN",
                "SEMI",
                "ID",
                "ASSIGN",
                "NUMBER",
                "TIMES",
                "NUMBER",
                "SEMI",
                "END",
                "SEMI",
                "END_UTL",
                "EOF"
            ]
        );
        assert_eq!(tokens[2].lexeme(), "f");
        assert_eq!(tokens[6].lexeme(), "a");
        assert!(matches!(tokens[8].token, Token::Number { value, .. } if value == 5.0));
        assert!(matches!(tokens[10].token, Token::Number { value, .. } if value == 3.0));
    }

    #[test]
    fn test_else_if_is_merged() {
        let source = "[% if a; else if b; end; %]";
        let tokens = tokenize(source).unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind_name()).collect();
        assert_eq!(
            kinds,
            [
                "START_UTL",
                "IF",
                "ID",
                "SEMI",
                "ELSEIF",
                "ID",
                "SEMI",
                "END",
                "SEMI",
                "END_UTL",
                "EOF"
            ]
        );

        let elseif = &tokens[4];
        assert_eq!(elseif.lexeme(), "elseif");
        assert_eq!(&source[elseif.span.range()], "else if");
        assert_eq!(tokens[5].span.start(), source.find('b').unwrap());
    }

    #[test]
    fn test_else_without_if_stays_else() {
        assert_eq!(
            kinds("[% else iffy"),
            ["START_UTL", "ELSE", "ID", "EOF"]
        );
        assert_eq!(
            kinds("[% ELSE\n\tIF x"),
            ["START_UTL", "ELSEIF", "ID", "EOF"]
        );
    }

    #[test]
    fn test_document_and_lone_bracket() {
        let tokens = tokenize("a[b").unwrap();
        let lexemes: Vec<_> = tokens.iter().map(|t| t.lexeme()).collect();
        assert_eq!(lexemes, ["a", "[", "b", ""]);
        assert!(tokens[..3].iter().all(|t| t.kind_name() == "DOCUMENT"));

        let single = tokenize("[").unwrap();
        assert_eq!(single[0].token, Token::Document("["));
        assert_eq!(single[0].span, Span::new(0..1));
    }

    #[test]
    fn test_trim_delimiters() {
        let tokens = tokenize("[%- a -%]").unwrap();
        assert_eq!(tokens[0].token, Token::StartUtl { trim: true });
        assert_eq!(tokens[2].token, Token::EndUtl { trim: true });
    }

    #[test]
    fn test_nested_regions() {
        assert_eq!(
            kinds("[% [% a %] b %] c"),
            ["START_UTL", "START_UTL", "ID", "END_UTL", "ID", "END_UTL", "DOCUMENT", "EOF"]
        );
    }

    #[test]
    fn test_eof_once() {
        let mut lexer = Lexer::new("");
        let eof = lexer.next_token().unwrap().unwrap();
        assert_eq!(eof.token, Token::Eof);
        assert_eq!(eof.span, Span::new(0..0));
        assert_eq!(eof.line, 1);
        assert!(lexer.next_token().unwrap().is_none());
        assert!(lexer.next_token().unwrap().is_none());
    }

    #[test]
    fn test_line_numbers() {
        let tokens = tokenize("one\ntwo\n[% a;\n  b; %]\n").unwrap();
        let lines: Vec<(&str, usize)> = tokens.iter().map(|t| (t.lexeme(), t.line)).collect();
        assert_eq!(
            lines,
            [
                ("one\ntwo\n", 1),
                ("[%", 3),
                ("a", 3),
                (";", 3),
                ("b", 4),
                (";", 4),
                ("%]", 4),
                ("\n", 4),
                ("", 5)
            ]
        );
    }

    #[test]
    fn test_comments_kept_on_request() {
        let lexer = Lexer::new("[% /* note */ a %]").with_comments(true);
        let tokens = tokenize_with(lexer).unwrap();
        assert_eq!(tokens[1].token, Token::Comment("/* note */"));
        assert_eq!(tokens[2].token, Token::Identifier("a"));
    }

    #[test]
    fn test_illegal_character() {
        let diag = lex_error("[% a $ b %]");
        assert_eq!(diag.code(), Some(ErrorCode::E001));
        assert!(diag.message().contains("'$'"));
        assert_eq!(diag.labels()[0].span(), Span::new(5..6));
    }

    #[test]
    fn test_unmatched_end_delimiter() {
        let diag = lex_error("[% a %]%]");
        assert_eq!(diag.code(), Some(ErrorCode::E002));
        assert_eq!(diag.labels()[0].span(), Span::new(7..9));
    }

    #[test]
    fn test_end_delimiter_inside_document_text_is_text() {
        assert_eq!(kinds("50%] off"), ["DOCUMENT", "EOF"]);
    }

    #[test]
    fn test_unterminated_string_and_comment() {
        assert_eq!(lex_error("[% 'abc").code(), Some(ErrorCode::E003));
        assert_eq!(lex_error("[% /* abc").code(), Some(ErrorCode::E004));
    }

    #[test]
    fn test_lexer_stops_after_error() {
        let mut lexer = Lexer::new("[% $ a");
        assert!(lexer.next_token().unwrap().is_some());
        assert!(lexer.next_token().is_err());
        assert!(lexer.next_token().unwrap().is_none());
    }

    proptest! {
        #[test]
        fn test_document_lexemes_concatenate(text in "[a-z \\n\\[]{0,40}") {
            let tokens = tokenize(&text).unwrap();
            let joined: String = tokens.iter().map(|t| t.lexeme()).collect();
            prop_assert_eq!(joined, text);
        }

        #[test]
        fn test_code_lexemes_concatenate(words in proptest::collection::vec("[a-z]{1,6}|[0-9]{1,3}|[-+*/;=]", 0..12)) {
            let source = format!("[% {} %]", words.join(" "));
            let tokens = tokenize(&source).unwrap();
            let joined: String = tokens.iter().map(|t| t.lexeme()).collect();
            let expected: String = source.chars().filter(|c| !c.is_whitespace()).collect();
            prop_assert_eq!(joined, expected);
        }
    }
}
