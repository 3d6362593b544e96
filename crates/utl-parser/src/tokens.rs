use std::fmt;

use crate::span::Span;

/// Reserved words of the UTL language.
///
/// Matching is case-insensitive; `foreach` is read as [`Keyword::For`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    If,
    Else,
    ElseIf,
    End,
    For,
    Each,
    While,
    Break,
    Continue,
    Exit,
    Return,
    Macro,
    Call,
    Include,
    Echo,
    Default,
    As,
    Is,
    Not,
    And,
    Or,
    Null,
    True,
    False,
    Then,
}

impl Keyword {
    /// Look up a reserved word, ignoring case.
    pub fn lookup(word: &str) -> Option<Self> {
        let keyword = match word.to_ascii_lowercase().as_str() {
            "if" => Keyword::If,
            "else" => Keyword::Else,
            "elseif" => Keyword::ElseIf,
            "end" => Keyword::End,
            "for" | "foreach" => Keyword::For,
            "each" => Keyword::Each,
            "while" => Keyword::While,
            "break" => Keyword::Break,
            "continue" => Keyword::Continue,
            "exit" => Keyword::Exit,
            "return" => Keyword::Return,
            "macro" => Keyword::Macro,
            "call" => Keyword::Call,
            "include" => Keyword::Include,
            "echo" => Keyword::Echo,
            "default" => Keyword::Default,
            "as" => Keyword::As,
            "is" => Keyword::Is,
            "not" => Keyword::Not,
            "and" => Keyword::And,
            "or" => Keyword::Or,
            "null" => Keyword::Null,
            "true" => Keyword::True,
            "false" => Keyword::False,
            "then" => Keyword::Then,
            _ => return None,
        };
        Some(keyword)
    }

    /// Upper-case token kind name, e.g. `ELSEIF`.
    pub fn kind_name(self) -> &'static str {
        match self {
            Keyword::If => "IF",
            Keyword::Else => "ELSE",
            Keyword::ElseIf => "ELSEIF",
            Keyword::End => "END",
            Keyword::For => "FOR",
            Keyword::Each => "EACH",
            Keyword::While => "WHILE",
            Keyword::Break => "BREAK",
            Keyword::Continue => "CONTINUE",
            Keyword::Exit => "EXIT",
            Keyword::Return => "RETURN",
            Keyword::Macro => "MACRO",
            Keyword::Call => "CALL",
            Keyword::Include => "INCLUDE",
            Keyword::Echo => "ECHO",
            Keyword::Default => "DEFAULT",
            Keyword::As => "AS",
            Keyword::Is => "IS",
            Keyword::Not => "NOT",
            Keyword::And => "AND",
            Keyword::Or => "OR",
            Keyword::Null => "NULL",
            Keyword::True => "TRUE",
            Keyword::False => "FALSE",
            Keyword::Then => "THEN",
        }
    }

    /// Lower-case spelling, used for keyword statement nodes.
    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::ElseIf => "elseif",
            Keyword::End => "end",
            Keyword::For => "for",
            Keyword::Each => "each",
            Keyword::While => "while",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
            Keyword::Exit => "exit",
            Keyword::Return => "return",
            Keyword::Macro => "macro",
            Keyword::Call => "call",
            Keyword::Include => "include",
            Keyword::Echo => "echo",
            Keyword::Default => "default",
            Keyword::As => "as",
            Keyword::Is => "is",
            Keyword::Not => "not",
            Keyword::And => "and",
            Keyword::Or => "or",
            Keyword::Null => "null",
            Keyword::True => "true",
            Keyword::False => "false",
            Keyword::Then => "then",
        }
    }
}

/// Token types for the UTL language
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'src> {
    // Regions
    Document(&'src str),
    StartUtl { trim: bool }, // [% or [%-
    EndUtl { trim: bool },   // %] or -%]

    // Literals
    Identifier(&'src str),
    Number { text: &'src str, value: f64 },
    StringLiteral(&'src str), // inner text, no quotes
    Keyword(Keyword, &'src str),

    Comment(&'src str), // /* comment */
    Eof,

    // Punctuation
    Semi,     // ;
    Colon,    // :
    Comma,    // ,
    Dot,      // .
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]

    // Operators
    Assign,             // =
    AssignOp(&'src str), // += -= *= /= %=
    Plus,               // +
    Minus,              // -
    Times,              // *
    Div,                // /
    Modulus,            // %
    Filter,             // |
    Eq,                 // ==
    Neq,                // !=
    Lt,                 // <
    Lte,                // <=
    Gt,                 // >
    Gte,                // >=
    Range,              // ..
    DoubleAmp,          // &&
    DoubleBar,          // ||
    Exclamation,        // !
}

impl<'src> Token<'src> {
    /// The externally visible token kind, e.g. `ID` or `ELSEIF`.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Token::Document(_) => "DOCUMENT",
            Token::StartUtl { .. } => "START_UTL",
            Token::EndUtl { .. } => "END_UTL",
            Token::Identifier(_) => "ID",
            Token::Number { .. } => "NUMBER",
            Token::StringLiteral(_) => "STRING",
            Token::Keyword(keyword, _) => keyword.kind_name(),
            Token::Comment(_) => "COMMENT",
            Token::Eof => "EOF",
            Token::Semi => "SEMI",
            Token::Colon => "COLON",
            Token::Comma => "COMMA",
            Token::Dot => "DOT",
            Token::LParen => "LPAREN",
            Token::RParen => "RPAREN",
            Token::LBracket => "LBRACKET",
            Token::RBracket => "RBRACKET",
            Token::Assign => "ASSIGN",
            Token::AssignOp(_) => "ASSIGNOP",
            Token::Plus => "PLUS",
            Token::Minus => "MINUS",
            Token::Times => "TIMES",
            Token::Div => "DIV",
            Token::Modulus => "MODULUS",
            Token::Filter => "FILTER",
            Token::Eq => "EQ",
            Token::Neq => "NEQ",
            Token::Lt => "LT",
            Token::Lte => "LTE",
            Token::Gt => "GT",
            Token::Gte => "GTE",
            Token::Range => "RANGE",
            Token::DoubleAmp => "DOUBLEAMP",
            Token::DoubleBar => "DOUBLEBAR",
            Token::Exclamation => "EXCLAMATION",
        }
    }

    /// The token's lexeme.
    ///
    /// String literals yield their inner text, a merged `else if` yields
    /// `elseif`, and `EOF` yields the empty string.
    pub fn lexeme(&self) -> &'src str {
        match self {
            Token::Document(text)
            | Token::Identifier(text)
            | Token::StringLiteral(text)
            | Token::Comment(text)
            | Token::AssignOp(text) => *text,
            Token::Number { text, .. } => *text,
            Token::Keyword(_, text) => *text,
            Token::StartUtl { trim: false } => "[%",
            Token::StartUtl { trim: true } => "[%-",
            Token::EndUtl { trim: false } => "%]",
            Token::EndUtl { trim: true } => "-%]",
            Token::Eof => "",
            Token::Semi => ";",
            Token::Colon => ":",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Assign => "=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Times => "*",
            Token::Div => "/",
            Token::Modulus => "%",
            Token::Filter => "|",
            Token::Eq => "==",
            Token::Neq => "!=",
            Token::Lt => "<",
            Token::Lte => "<=",
            Token::Gt => ">",
            Token::Gte => ">=",
            Token::Range => "..",
            Token::DoubleAmp => "&&",
            Token::DoubleBar => "||",
            Token::Exclamation => "!",
        }
    }

    /// Whether this is the given reserved word.
    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        matches!(self, Token::Keyword(k, _) if *k == keyword)
    }

    /// Whether this token can end a statement (`;`, `%]` or end of input).
    pub fn is_eostmt(&self) -> bool {
        matches!(self, Token::Semi | Token::EndUtl { .. } | Token::Eof)
    }
}

/// A token with position information for winnow integration
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedToken<'src> {
    pub token: Token<'src>,
    pub span: Span,
    /// 1-based line of the token's first character.
    pub line: usize,
}

impl<'src> PositionedToken<'src> {
    pub fn new(token: Token<'src>, span: Span, line: usize) -> Self {
        Self { token, span, line }
    }
}

impl<'src> std::ops::Deref for PositionedToken<'src> {
    type Target = Token<'src>;

    fn deref(&self) -> &Self::Target {
        &self.token
    }
}

impl<'src> AsRef<Token<'src>> for PositionedToken<'src> {
    fn as_ref(&self) -> &Token<'src> {
        &self.token
    }
}

impl<'src> fmt::Display for PositionedToken<'src> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' {} {}",
            self.token.kind_name(),
            self.token.lexeme(),
            self.line,
            self.span.start()
        )
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::StringLiteral(s) => write!(f, "'{s}'"),
            Token::Eof => write!(f, "end of document"),
            other => write!(f, "{}", other.lexeme()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup_ignores_case() {
        assert_eq!(Keyword::lookup("IF"), Some(Keyword::If));
        assert_eq!(Keyword::lookup("ForEach"), Some(Keyword::For));
        assert_eq!(Keyword::lookup("iffy"), None);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Token::Identifier("a").kind_name(), "ID");
        assert_eq!(Token::Keyword(Keyword::ElseIf, "elseif").kind_name(), "ELSEIF");
        assert_eq!(Token::AssignOp("+=").kind_name(), "ASSIGNOP");
        assert_eq!(Token::StartUtl { trim: true }.kind_name(), "START_UTL");
    }

    #[test]
    fn test_lexemes() {
        assert_eq!(Token::StartUtl { trim: true }.lexeme(), "[%-");
        assert_eq!(Token::EndUtl { trim: false }.lexeme(), "%]");
        assert_eq!(Token::StringLiteral("x").lexeme(), "x");
        assert_eq!(Token::Eof.lexeme(), "");
        assert_eq!(
            Token::Number {
                text: "5.0",
                value: 5.0
            }
            .lexeme(),
            "5.0"
        );
    }

    #[test]
    fn test_positioned_token_display() {
        let token = PositionedToken::new(Token::Identifier("fred"), Span::new(3..7), 2);
        assert_eq!(token.to_string(), "ID 'fred' 2 3");
        assert_eq!(token.kind_name(), "ID");
    }

    #[test]
    fn test_eostmt_tokens() {
        assert!(Token::Semi.is_eostmt());
        assert!(Token::EndUtl { trim: true }.is_eostmt());
        assert!(Token::Eof.is_eostmt());
        assert!(!Token::Comma.is_eostmt());
    }
}
