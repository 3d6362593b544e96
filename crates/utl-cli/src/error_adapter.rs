//! Rendering of UTL errors and parser diagnostics with miette.
//!
//! Every error becomes one or more [`Report`]s. Lexical and syntax
//! diagnostics carry their source text and labelled spans, and get a code
//! in the `utl::lex` or `utl::syntax` family. A diagnostic without help of
//! its own is given a hint for its error code.

use std::{error::Error, fmt};

use miette::{Diagnostic as MietteDiagnostic, LabeledSpan, Severity, SourceSpan};

use utl::UtlError;
use utl_parser::{
    Span,
    error::{Diagnostic, ErrorCode},
};

/// One rendered unit: a parser diagnostic or a failure outside the parser.
#[derive(Debug)]
pub struct Report<'a> {
    message: String,
    code: Option<String>,
    severity: Severity,
    help: Option<String>,
    labels: Vec<LabeledSpan>,
    source_code: Option<&'a str>,
    cause: Option<&'a (dyn Error + 'static)>,
}

impl<'a> Report<'a> {
    /// A report for a diagnostic raised while parsing `src`.
    pub fn from_diagnostic(diag: &Diagnostic, src: &'a str) -> Self {
        let code = diag.code();
        let help = diag
            .help()
            .map(str::to_string)
            .or_else(|| code.and_then(hint).map(str::to_string));
        let labels = diag
            .labels()
            .iter()
            .map(|label| {
                let message = Some(label.message().to_string());
                let span = to_source_span(label.span());
                if label.is_primary() {
                    LabeledSpan::new_primary_with_span(message, span)
                } else {
                    LabeledSpan::new_with_span(message, span)
                }
            })
            .collect();

        Self {
            message: diag.message().to_string(),
            code: code.map(qualified_code),
            severity: if diag.severity().is_warning() {
                Severity::Warning
            } else {
                Severity::Error
            },
            help,
            labels,
            source_code: Some(src),
            cause: None,
        }
    }

    /// A report for an error with no source location.
    pub fn from_error(err: &'a UtlError) -> Self {
        let (code, help) = match err {
            UtlError::Io(_) => ("utl::io", None),
            UtlError::Parse { .. } => ("utl::syntax", None),
            UtlError::Node(_) => (
                "utl::node",
                Some("a handler built an invalid tree; rerun with --log-level trace to see the reductions"),
            ),
            UtlError::IncludeNotFound(_) => (
                "utl::include",
                Some("check --top, --global-skin and --skin point at the template collection"),
            ),
        };
        Self {
            message: err.to_string(),
            code: Some(code.to_string()),
            severity: Severity::Error,
            help: help.map(str::to_string),
            labels: Vec::new(),
            source_code: None,
            cause: err.source(),
        }
    }
}

/// `utl::lex::E003` or `utl::syntax::E100`.
fn qualified_code(code: ErrorCode) -> String {
    let family = match code {
        ErrorCode::E001 | ErrorCode::E002 | ErrorCode::E003 | ErrorCode::E004 => "lex",
        ErrorCode::E100 | ErrorCode::E101 | ErrorCode::E102 => "syntax",
    };
    format!("utl::{family}::{code}")
}

fn hint(code: ErrorCode) -> Option<&'static str> {
    match code {
        ErrorCode::E001 => Some("only names, numbers, strings and operators may appear inside [% ... %]"),
        ErrorCode::E002 => Some("remove the stray %] or open the code region with [% first"),
        ErrorCode::E003 => Some("close the string with the quote character that opened it"),
        ErrorCode::E004 => Some("close the comment with */"),
        ErrorCode::E101 => Some("every if, for, while and macro block needs a matching end"),
        ErrorCode::E100 | ErrorCode::E102 => None,
    }
}

fn to_source_span(span: Span) -> SourceSpan {
    SourceSpan::new(span.start().into(), span.len())
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for Report<'_> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
    }
}

impl MietteDiagnostic for Report<'_> {
    fn code<'b>(&'b self) -> Option<Box<dyn fmt::Display + 'b>> {
        self.code
            .as_ref()
            .map(|code| Box::new(code) as Box<dyn fmt::Display>)
    }

    fn severity(&self) -> Option<Severity> {
        Some(self.severity)
    }

    fn help<'b>(&'b self) -> Option<Box<dyn fmt::Display + 'b>> {
        self.help
            .as_ref()
            .map(|help| Box::new(help) as Box<dyn fmt::Display>)
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        self.source_code
            .as_ref()
            .map(|src| src as &dyn miette::SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        if self.labels.is_empty() {
            return None;
        }
        Some(Box::new(self.labels.iter().cloned()))
    }
}

/// Reports for `err`: one per diagnostic for a parse failure, otherwise one.
pub fn reports(err: &UtlError) -> Vec<Report<'_>> {
    match err {
        UtlError::Parse { err: parse_err, src } => diagnostic_reports(parse_err.diagnostics(), src),
        _ => vec![Report::from_error(err)],
    }
}

/// Reports for diagnostics collected from a recovered parse of `src`.
pub fn diagnostic_reports<'a>(diagnostics: &[Diagnostic], src: &'a str) -> Vec<Report<'a>> {
    diagnostics
        .iter()
        .map(|diag| Report::from_diagnostic(diag, src))
        .collect()
}

/// Render reports with miette's graphical handler.
pub fn render(reports: &[Report<'_>]) -> Vec<String> {
    let reporter = miette::GraphicalReportHandler::new();
    reports
        .iter()
        .map(|report| {
            let mut writer = String::new();
            if reporter.render_report(&mut writer, report).is_err() {
                writer = report.to_string();
            }
            writer
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::{io, path::PathBuf};

    use utl_parser::error::ParseError;

    use super::*;

    fn code_of(report: &Report<'_>) -> Option<String> {
        report.code().map(|code| code.to_string())
    }

    fn help_of(report: &Report<'_>) -> Option<String> {
        report.help().map(|help| help.to_string())
    }

    #[test]
    fn test_syntax_diagnostic() {
        let diag = Diagnostic::error("Syntax error in input line 1, column 6 after 'b'!")
            .with_code(ErrorCode::E100)
            .with_label(Span::new(5..6), "unexpected token")
            .with_help("expected ';' or '%]'");
        let err = UtlError::new_parse_error(ParseError::from(diag), "[% a b; %]");

        let reports = reports(&err);
        assert_eq!(reports.len(), 1);
        assert_eq!(
            reports[0].to_string(),
            "Syntax error in input line 1, column 6 after 'b'!"
        );
        assert_eq!(code_of(&reports[0]).as_deref(), Some("utl::syntax::E100"));
        assert_eq!(help_of(&reports[0]).as_deref(), Some("expected ';' or '%]'"));
        assert!(reports[0].source_code().is_some());
    }

    #[test]
    fn test_lexical_codes_get_hints() {
        let source = "[% x = 'open %]";
        let cases = [
            (ErrorCode::E001, "utl::lex::E001", "only names"),
            (ErrorCode::E002, "utl::lex::E002", "stray %]"),
            (ErrorCode::E003, "utl::lex::E003", "close the string"),
            (ErrorCode::E004, "utl::lex::E004", "*/"),
            (ErrorCode::E101, "utl::syntax::E101", "matching end"),
        ];
        for (code, qualified, hint) in cases {
            let diag = Diagnostic::error(code.description())
                .with_code(code)
                .with_label(Span::new(7..15), "here");
            let report = Report::from_diagnostic(&diag, source);
            assert_eq!(code_of(&report).as_deref(), Some(qualified));
            let help = help_of(&report).unwrap();
            assert!(help.contains(hint), "{qualified}: {help}");
        }
    }

    #[test]
    fn test_uncoded_warning() {
        let diags = vec![
            Diagnostic::error("first error")
                .with_code(ErrorCode::E100)
                .with_label(Span::new(0..2), "first"),
            Diagnostic::warning("chained assignment re-associated to the right")
                .with_label(Span::new(3..4), "second"),
        ];
        let err = UtlError::new_parse_error(ParseError::from(diags), "[% a = b = c %]");

        let reports = reports(&err);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].to_string(), "first error");
        assert_eq!(help_of(&reports[0]), None);
        assert_eq!(reports[1].severity(), Some(Severity::Warning));
        assert_eq!(code_of(&reports[1]), None);
    }

    #[test]
    fn test_errors_without_location() {
        let err = UtlError::IncludeNotFound(PathBuf::from("head.utl"));
        let reports = reports(&err);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].to_string(), "Include file not found: head.utl");
        assert_eq!(code_of(&reports[0]).as_deref(), Some("utl::include"));
        assert!(help_of(&reports[0]).unwrap().contains("--skin"));
        assert!(reports[0].labels().is_none());

        let err = UtlError::Io(io::Error::other("disk on fire"));
        let report = Report::from_error(&err);
        assert_eq!(report.to_string(), "I/O error: disk on fire");
        assert_eq!(code_of(&report).as_deref(), Some("utl::io"));
        assert_eq!(report.source().map(|e| e.to_string()).as_deref(), Some("disk on fire"));
    }

    #[test]
    fn test_primary_flag_on_labels() {
        let diag = Diagnostic::error("error with labels")
            .with_label(Span::new(0..5), "primary")
            .with_secondary_label(Span::new(10..15), "secondary");

        let report = Report::from_diagnostic(&diag, "some source code");

        let labels: Vec<_> = report.labels().unwrap().collect();
        assert_eq!(labels.len(), 2);
        assert!(labels[0].primary());
        assert!(!labels[1].primary());
        assert_eq!(labels[1].label(), Some("secondary"));
    }

    #[test]
    fn test_render_includes_code_and_hint() {
        let diag = Diagnostic::error("Syntax error at end of document!").with_code(ErrorCode::E101);
        let rendered = render(&diagnostic_reports(std::slice::from_ref(&diag), "[% if a;"));
        assert_eq!(rendered.len(), 1);
        assert!(rendered[0].contains("E101"));
        assert!(rendered[0].contains("matching end"));
    }
}
