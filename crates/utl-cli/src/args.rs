//! Command-line argument definitions for the UTL CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. A subcommand selects the analysis; global arguments
//! control configuration file selection and logging verbosity.

use clap::{Parser, Subcommand};

/// Command-line arguments for the UTL template tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the tokens of a template, one per line
    Lex {
        file: String,
    },

    /// Parse a template and print its tree
    Parse {
        file: String,

        /// Print the tokens before the tree
        #[arg(long)]
        tokens: bool,

        /// Print the full parse tree instead of the AST
        #[arg(long)]
        parse_tree: bool,

        /// Print the tree as JSON
        #[arg(long)]
        json: bool,

        /// Log every grammar reduction at info level
        #[arg(long)]
        trace: bool,
    },

    /// Count syntax errors; the exit code is the total count
    Validate {
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Print the macro cross-reference of a set of templates as JSON
    MacroRefs {
        #[arg(required = true)]
        files: Vec<String>,

        /// Print the flat list of calls instead of the macro records
        #[arg(long)]
        refs: bool,
    },

    /// Print the include tree of a template
    Includes {
        file: String,

        /// Top-level directory of the template collection
        #[arg(long)]
        top: Option<String>,

        /// Global skin overlay to search
        #[arg(long)]
        global_skin: Option<String>,

        /// Application skin overlay to search
        #[arg(long)]
        skin: Option<String>,

        /// Report each file only on its first include
        #[arg(long)]
        no_repeat: bool,

        /// Report only the files included directly
        #[arg(long)]
        no_recurse: bool,

        /// Do not check that include files exist (implies --no-recurse)
        #[arg(long)]
        no_file_check: bool,
    },
}
