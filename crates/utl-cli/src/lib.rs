//! CLI logic for the UTL template tool.
//!
//! Every subcommand reads its input files through the [`utl::Analyzer`] and
//! writes its results to the given writer.

pub mod error_adapter;

mod args;
mod config;

pub use args::{Args, Command};

use std::{
    fs,
    io::{self, Write},
};

use log::{info, warn};

use utl::{Analysis, Analyzer, NodeView, PositionedToken, TreeKind, UtlError, config::AppConfig};

use error_adapter::{diagnostic_reports, render};

/// Run the UTL CLI application
///
/// Returns the exit status the process should end with: the total number
/// of syntax errors for `validate`, zero otherwise.
///
/// # Errors
///
/// Returns `UtlError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Lexical errors and strict-mode syntax errors
/// - Missing include files
pub fn run(args: &Args, out: &mut dyn Write) -> Result<usize, UtlError> {
    let mut app_config = config::load_config(args.config.as_ref())?;

    match &args.command {
        Command::Lex { file } => {
            let source = fs::read_to_string(file)?;
            let tokens = Analyzer::new(app_config).tokenize(&source)?;
            write_tokens(out, &tokens)?;
        }
        Command::Parse {
            file,
            tokens,
            parse_tree,
            json,
            trace,
        } => {
            let analyzer = Analyzer::new(app_config).with_trace(*trace);
            let kind = if *parse_tree {
                TreeKind::ParseTree
            } else {
                TreeKind::Ast
            };
            let analysis = analyzer.parse_file(file, kind)?;
            if *tokens {
                write_tokens(out, &analyzer.tokenize(analysis.source())?)?;
            }
            report(&analysis);
            if let Some(root) = analysis.root() {
                let text = if *json { root.json_format() } else { root.format() };
                writeln!(out, "{text}")?;
            }
        }
        Command::Validate { files } => {
            let analyzer = Analyzer::new(app_config);
            let mut total = 0;
            for file in files {
                let analysis = analyzer.parse_file(file, TreeKind::Ast)?;
                report(&analysis);
                writeln!(out, "{file}: {} syntax error(s)", analysis.error_count())?;
                total += analysis.error_count();
            }
            info!(files = files.len(), errors = total; "Validation finished");
            return Ok(total);
        }
        Command::MacroRefs { files, refs } => {
            let analyzer = Analyzer::new(app_config);
            let analyses = files
                .iter()
                .map(|file| analyzer.parse_file(file, TreeKind::Ast))
                .collect::<Result<Vec<_>, _>>()?;
            let xref = analyzer.macro_xref(&analyses);
            let json = if *refs {
                xref.json_for_refs()
            } else {
                xref.json_for_macros()
            };
            writeln!(out, "{}", json.map_err(io::Error::other)?)?;
        }
        Command::Includes {
            file,
            top,
            global_skin,
            skin,
            no_repeat,
            no_recurse,
            no_file_check,
        } => {
            apply_include_flags(
                &mut app_config,
                top.as_deref(),
                global_skin.as_deref(),
                skin.as_deref(),
                [*no_repeat, *no_recurse, *no_file_check],
            );
            let analyzer = Analyzer::new(app_config);
            let resolver = analyzer.include_resolver();
            let tree = resolver.build(file)?;
            write!(out, "{}", resolver.display(&tree))?;
        }
    }
    Ok(0)
}

/// Command-line flags override the configuration file; a flag that is not
/// given leaves the file's value in place.
fn apply_include_flags(
    config: &mut AppConfig,
    top: Option<&str>,
    global_skin: Option<&str>,
    skin: Option<&str>,
    [no_repeat, no_recurse, no_file_check]: [bool; 3],
) {
    let includes = config.includes_mut();
    if let Some(top) = top {
        includes.set_top(top);
    }
    if let Some(global_skin) = global_skin {
        includes.set_global_skin(global_skin);
    }
    if let Some(skin) = skin {
        includes.set_skin(skin);
    }
    if no_repeat {
        includes.set_no_repeat(true);
    }
    if no_recurse {
        includes.set_no_recurse(true);
    }
    if no_file_check {
        includes.set_no_file_check(true);
    }
}

fn write_tokens(out: &mut dyn Write, tokens: &[PositionedToken<'_>]) -> io::Result<()> {
    for token in tokens {
        writeln!(
            out,
            "{} '{}' {} {}",
            token.token.kind_name(),
            token.token.lexeme(),
            token.line,
            token.span.start()
        )?;
    }
    Ok(())
}

/// Log the syntax errors and warnings a parse recovered from.
fn report(analysis: &Analysis) {
    let reports = diagnostic_reports(analysis.diagnostics(), analysis.source());
    for rendered in render(&reports) {
        warn!(file = analysis.file(); "{rendered}");
    }
}
