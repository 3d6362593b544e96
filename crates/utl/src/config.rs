//! Configuration types for UTL analysis.
//!
//! This module provides configuration structures that control how templates
//! are parsed and how include files are looked up. All types implement
//! [`serde::Deserialize`] for loading from external sources.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining parser and include settings.
//! - [`ParserConfig`] - Controls how syntax errors are treated.
//! - [`IncludeConfig`] - Controls where include files are searched for and how
//!   the include tree is expanded.
//!
//! # Example
//!
//! ```
//! # use utl::config::AppConfig;
//! let config = AppConfig::default();
//! assert!(!config.parser().strict());
//! assert!(config.includes().skin().is_none());
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::includes::IncludeOptions;

/// Top-level configuration combining parser and include settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Parser configuration section.
    #[serde(default)]
    parser: ParserConfig,

    /// Include resolution section.
    #[serde(default)]
    includes: IncludeConfig,
}

impl AppConfig {
    /// Creates a new [`AppConfig`] with the specified sections.
    pub fn new(parser: ParserConfig, includes: IncludeConfig) -> Self {
        Self { parser, includes }
    }

    /// Returns the parser configuration.
    pub fn parser(&self) -> &ParserConfig {
        &self.parser
    }

    /// Returns the include configuration.
    pub fn includes(&self) -> &IncludeConfig {
        &self.includes
    }

    /// Returns the include configuration for modification.
    pub fn includes_mut(&mut self) -> &mut IncludeConfig {
        &mut self.includes
    }
}

/// Parser settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParserConfig {
    /// Abort on the first syntax error instead of resynchronising.
    #[serde(default)]
    strict: bool,
}

impl ParserConfig {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn strict(&self) -> bool {
        self.strict
    }
}

/// Include lookup and expansion settings.
///
/// Include files are looked up relative to `top`, then in the global skin
/// overlay, then in the application skin overlay.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncludeConfig {
    /// Top-level directory of the template collection. Defaults to the
    /// current directory.
    #[serde(default)]
    top: Option<PathBuf>,

    #[serde(default)]
    global_skin: Option<String>,

    #[serde(default)]
    skin: Option<String>,

    /// List a file only the first time a template includes it.
    #[serde(default)]
    no_repeat: bool,

    /// Only list the files included directly by the starting file.
    #[serde(default)]
    no_recurse: bool,

    /// Do not look for include files on disk. Implies `no_recurse`.
    #[serde(default)]
    no_file_check: bool,
}

impl IncludeConfig {
    pub fn top(&self) -> Option<&Path> {
        self.top.as_deref()
    }

    pub fn global_skin(&self) -> Option<&str> {
        self.global_skin.as_deref()
    }

    pub fn skin(&self) -> Option<&str> {
        self.skin.as_deref()
    }

    pub fn no_repeat(&self) -> bool {
        self.no_repeat
    }

    pub fn no_recurse(&self) -> bool {
        self.no_recurse
    }

    pub fn no_file_check(&self) -> bool {
        self.no_file_check
    }

    pub fn set_top(&mut self, top: impl Into<PathBuf>) {
        self.top = Some(top.into());
    }

    pub fn set_global_skin(&mut self, global_skin: impl Into<String>) {
        self.global_skin = Some(global_skin.into());
    }

    pub fn set_skin(&mut self, skin: impl Into<String>) {
        self.skin = Some(skin.into());
    }

    pub fn set_no_repeat(&mut self, no_repeat: bool) {
        self.no_repeat = no_repeat;
    }

    pub fn set_no_recurse(&mut self, no_recurse: bool) {
        self.no_recurse = no_recurse;
    }

    pub fn set_no_file_check(&mut self, no_file_check: bool) {
        self.no_file_check = no_file_check;
    }

    /// Resolver options for these settings.
    pub fn options(&self, strict: bool) -> IncludeOptions {
        IncludeOptions {
            top: self.top.clone().unwrap_or_else(|| PathBuf::from(".")),
            global_skin: self.global_skin.clone(),
            skin: self.skin.clone(),
            no_repeat: self.no_repeat,
            no_recurse: self.no_recurse || self.no_file_check,
            no_file_check: self.no_file_check,
            strict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(!config.parser().strict());
        assert!(config.includes().top().is_none());
        assert!(!config.includes().no_repeat());

        let options = config.includes().options(false);
        assert_eq!(options.top, PathBuf::from("."));
        assert!(!options.no_recurse);
    }

    #[test]
    fn test_no_file_check_implies_no_recurse() {
        let mut includes = IncludeConfig::default();
        includes.set_no_file_check(true);
        let options = includes.options(true);
        assert!(options.no_recurse);
        assert!(options.strict);
    }
}
