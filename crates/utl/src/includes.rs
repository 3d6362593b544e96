//! Include-file resolution.
//!
//! [`IncludeResolver::build`] parses a template with the AST handler, collects
//! its `include` statements and looks each named file up on disk, descending
//! into the files it finds. Names are looked up in order:
//!
//! 1. `<top>/<name>`
//! 2. `<top>/global_skins/<global_skin>/includes/<name>`, when a global skin is set
//! 3. `<top>/skins/<skin>/includes/<name>`, when an application skin is set
//!
//! A file that cannot be found is kept in the tree without a disk path. That
//! is only an error when something asks for it to be parsed.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use indexmap::IndexSet;
use log::{debug, info, warn};

use utl_core::NodeView;
use utl_parser::{AstHandler, ParseOutput, Parser};

use crate::error::UtlError;

/// Prefix of include names that come from an expression rather than a
/// string literal.
const EXPRESSION_PREFIX: &str = "expression: ";

/// Settings for an [`IncludeResolver`].
#[derive(Debug, Clone, Default)]
pub struct IncludeOptions {
    pub top: PathBuf,
    pub global_skin: Option<String>,
    pub skin: Option<String>,
    pub no_repeat: bool,
    pub no_recurse: bool,
    pub no_file_check: bool,
    /// Parse included files with a strict handler.
    pub strict: bool,
}

/// Where an include file was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeSource {
    /// Directly under the top-level directory.
    Top,
    /// The global skin overlay.
    Global,
    /// The application skin overlay.
    Application,
}

impl IncludeSource {
    /// The tag shown next to overlay files; empty for [`IncludeSource::Top`].
    pub fn tag(self) -> &'static str {
        match self {
            IncludeSource::Top => "",
            IncludeSource::Global => "global",
            IncludeSource::Application => "application",
        }
    }
}

impl fmt::Display for IncludeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A template and the files it includes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeFile {
    name: String,
    disk_path: Option<PathBuf>,
    source: Option<IncludeSource>,
    looked_up: bool,
    included: Vec<IncludeFile>,
}

impl IncludeFile {
    /// The name as written in the `include` statement, or the starting path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the file was found, if it was looked for and exists.
    pub fn disk_path(&self) -> Option<&Path> {
        self.disk_path.as_deref()
    }

    pub fn source(&self) -> Option<IncludeSource> {
        self.source
    }

    /// Files included by this one, in statement order.
    pub fn included(&self) -> &[IncludeFile] {
        &self.included
    }

    /// Whether the include named a computed expression instead of a file.
    pub fn is_expression(&self) -> bool {
        self.name.starts_with(EXPRESSION_PREFIX)
    }

    /// Whether the file was looked for on disk and not found.
    pub fn is_missing(&self) -> bool {
        self.looked_up && self.disk_path.is_none()
    }

    fn write_tree(&self, out: &mut String, depth: usize) {
        for include in &self.included {
            out.push_str(&" ".repeat(depth * 4));
            out.push_str(&include.name);
            if include.is_missing() {
                out.push_str(" (not found)");
            } else if let Some(source) = include.source.filter(|s| *s != IncludeSource::Top) {
                out.push_str(&format!(" ({source})"));
            }
            out.push('\n');
            include.write_tree(out, depth + 1);
        }
    }
}

/// Include names found in a parsed AST, in statement order.
///
/// Literal names are returned as written; computed targets are returned as
/// `expression: <source text>`.
pub fn include_names(output: &ParseOutput) -> Vec<String> {
    let Some(root) = output.root_node() else {
        return Vec::new();
    };
    root.find_all("include")
        .into_iter()
        .map(|node| {
            let attrs = node.attributes();
            match attrs.get_str("file") {
                Some(file) => file.to_string(),
                None => format!(
                    "{EXPRESSION_PREFIX}{}",
                    attrs.get_str("expression").unwrap_or_default()
                ),
            }
        })
        .collect()
}

/// Builds include trees.
///
/// # Examples
///
/// ```no_run
/// use utl::includes::{IncludeOptions, IncludeResolver};
///
/// let resolver = IncludeResolver::new(IncludeOptions {
///     top: "/srv/templates".into(),
///     skin: Some("editorial".to_string()),
///     ..IncludeOptions::default()
/// });
/// let tree = resolver.build("/srv/templates/index.html.utl")?;
/// print!("{}", resolver.display(&tree));
/// # Ok::<(), utl::UtlError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct IncludeResolver {
    options: IncludeOptions,
}

impl IncludeResolver {
    pub fn new(options: IncludeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &IncludeOptions {
        &self.options
    }

    /// Find `name` in the top-level directory or one of the skin overlays.
    pub fn locate(&self, name: &str) -> Option<(PathBuf, IncludeSource)> {
        let options = &self.options;
        let mut candidates = vec![(options.top.join(name), IncludeSource::Top)];
        if let Some(global) = &options.global_skin {
            candidates.push((
                options.top.join("global_skins").join(global).join("includes").join(name),
                IncludeSource::Global,
            ));
        }
        if let Some(skin) = &options.skin {
            candidates.push((
                options.top.join("skins").join(skin).join("includes").join(name),
                IncludeSource::Application,
            ));
        }
        candidates.into_iter().find(|(path, _)| path.is_file())
    }

    /// An include record for `name` without its own includes.
    ///
    /// The file is looked up unless file checks are disabled or the name is
    /// an expression.
    pub fn resolve(&self, name: &str) -> IncludeFile {
        let mut file = IncludeFile {
            name: name.to_string(),
            disk_path: None,
            source: None,
            looked_up: false,
            included: Vec::new(),
        };
        if self.options.no_file_check || file.is_expression() {
            return file;
        }
        file.looked_up = true;
        match self.locate(name) {
            Some((path, source)) => {
                debug!(name, path:? = path, source = source.tag(); "Resolved include");
                file.disk_path = Some(path);
                file.source = Some(source);
            }
            None => warn!(name; "Include file not found"),
        }
        file
    }

    /// Parse `start` and build its include tree.
    ///
    /// `start` is used as given when it exists, and otherwise looked up like
    /// any include name.
    ///
    /// # Errors
    ///
    /// Returns [`UtlError::IncludeNotFound`] when `start` cannot be found, or
    /// an I/O or parse error from reading any file in the tree.
    pub fn build(&self, start: impl AsRef<Path>) -> Result<IncludeFile, UtlError> {
        let start = start.as_ref();
        let name = start.display().to_string();
        let mut root = if start.is_file() {
            IncludeFile {
                name,
                disk_path: Some(start.to_path_buf()),
                source: None,
                looked_up: true,
                included: Vec::new(),
            }
        } else {
            self.resolve(&name)
        };

        let mut chain = Vec::new();
        self.expand(&mut root, &mut chain, true)?;
        info!(file = root.name.as_str(), includes = root.included.len(); "Include tree built");
        Ok(root)
    }

    fn expand(
        &self,
        file: &mut IncludeFile,
        chain: &mut Vec<PathBuf>,
        top_level: bool,
    ) -> Result<(), UtlError> {
        let Some(path) = file.disk_path.clone() else {
            if top_level {
                return Err(UtlError::IncludeNotFound(PathBuf::from(&file.name)));
            }
            return Ok(());
        };
        if chain.contains(&path) {
            warn!(file = file.name.as_str(), path:? = path; "Include cycle, not expanding again");
            return Ok(());
        }

        let output = self.parse(file)?;
        let mut names = include_names(&output);
        if self.options.no_repeat {
            names = names.into_iter().collect::<IndexSet<_>>().into_iter().collect();
        }
        file.included = names.iter().map(|name| self.resolve(name)).collect();

        if self.options.no_recurse {
            return Ok(());
        }
        chain.push(path);
        for child in &mut file.included {
            self.expand(child, chain, false)?;
        }
        chain.pop();
        Ok(())
    }

    /// Parse an include record's file with the AST handler.
    ///
    /// # Errors
    ///
    /// Returns [`UtlError::IncludeNotFound`] if the record has no disk path.
    pub fn parse(&self, file: &IncludeFile) -> Result<ParseOutput, UtlError> {
        let path = file
            .disk_path
            .as_deref()
            .ok_or_else(|| UtlError::IncludeNotFound(PathBuf::from(&file.name)))?;
        let source = fs::read_to_string(path)?;
        let file_name = path
            .file_name()
            .map_or_else(|| file.name.clone(), |n| n.to_string_lossy().into_owned());

        let mut parser = Parser::with_handler(AstHandler::new(self.options.strict))
            .with_file(file_name)
            .with_strict(self.options.strict);
        parser
            .parse(&source)
            .map_err(|err| UtlError::new_parse_error(err, source.as_str()))
    }

    /// Render an include tree as indented text.
    pub fn display(&self, tree: &IncludeFile) -> String {
        let mut out = format!(
            "Included by {}{}:\n",
            tree.name,
            if self.options.no_repeat {
                " (repeats omitted)"
            } else {
                ""
            }
        );
        tree.write_tree(&mut out, 1);
        out
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn write(dir: &Path, relative: &str, text: &str) -> PathBuf {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, text).unwrap();
        path
    }

    fn resolver(top: &Path) -> IncludeResolver {
        IncludeResolver::new(IncludeOptions {
            top: top.to_path_buf(),
            global_skin: Some("G".to_string()),
            skin: Some("S".to_string()),
            ..IncludeOptions::default()
        })
    }

    #[test]
    fn test_overlay_search_order() {
        let dir = TempDir::new().unwrap();
        let top = dir.path();
        write(top, "skins/S/includes/foo.utl", "");
        write(top, "global_skins/G/includes/foo.utl", "");
        write(top, "skins/S/includes/app.utl", "");
        write(top, "own.utl", "");

        let resolver = resolver(top);
        assert_eq!(resolver.resolve("foo.utl").source(), Some(IncludeSource::Global));
        assert_eq!(resolver.resolve("app.utl").source(), Some(IncludeSource::Application));
        assert_eq!(resolver.resolve("own.utl").source(), Some(IncludeSource::Top));

        let missing = resolver.resolve("bar.utl");
        assert!(missing.disk_path().is_none());
        assert!(missing.is_missing());
    }

    #[test]
    fn test_missing_file_fails_only_when_parsed() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver(dir.path());
        let missing = resolver.resolve("bar.utl");
        assert!(matches!(
            resolver.parse(&missing),
            Err(UtlError::IncludeNotFound(path)) if path == Path::new("bar.utl")
        ));
    }

    #[test]
    fn test_include_names() {
        let source = "[% include 'a.utl'; include dir + '/b.utl'; if x; include 'a.utl'; end %]";
        let output = Parser::with_handler(AstHandler::new(false)).parse(source).unwrap();
        assert_eq!(
            include_names(&output),
            ["a.utl", "expression: dir + '/b.utl'", "a.utl"]
        );
    }

    #[test]
    fn test_tree_and_display() {
        let dir = TempDir::new().unwrap();
        let top = dir.path();
        let start = write(
            top,
            "page.utl",
            "[% include 'head.utl'; include 'head.utl'; include 'gone.utl'; include name; %]",
        );
        write(top, "skins/S/includes/head.utl", "[% include 'nav.utl'; %]");
        write(top, "nav.utl", "<nav/>");

        let resolver = resolver(top);
        let tree = resolver.build(&start).unwrap();
        assert_eq!(tree.included().len(), 4);
        assert!(tree.included()[3].is_expression());
        assert!(!tree.included()[3].is_missing());
        assert_eq!(tree.included()[0].included()[0].name(), "nav.utl");

        let expected = format!(
            "Included by {}:\n    head.utl (application)\n        nav.utl\n    head.utl (application)\n        nav.utl\n    gone.utl (not found)\n    expression: name\n",
            start.display()
        );
        assert_eq!(resolver.display(&tree), expected);
    }

    #[test]
    fn test_no_repeat_and_no_recurse() {
        let dir = TempDir::new().unwrap();
        let top = dir.path();
        let start = write(top, "page.utl", "[% include 'a.utl'; include 'a.utl'; %]");
        write(top, "a.utl", "[% include 'b.utl' %]");

        let resolver = IncludeResolver::new(IncludeOptions {
            top: top.to_path_buf(),
            no_repeat: true,
            no_recurse: true,
            ..IncludeOptions::default()
        });
        let tree = resolver.build(&start).unwrap();
        assert_eq!(tree.included().len(), 1);
        assert!(tree.included()[0].included().is_empty());
        assert!(resolver.display(&tree).contains("(repeats omitted):"));
    }

    #[test]
    fn test_no_file_check() {
        let dir = TempDir::new().unwrap();
        let top = dir.path();
        let start = write(top, "page.utl", "[% include 'nowhere.utl' %]");
        let resolver = IncludeResolver::new(IncludeOptions {
            top: top.to_path_buf(),
            no_file_check: true,
            no_recurse: true,
            ..IncludeOptions::default()
        });
        let tree = resolver.build(&start).unwrap();
        let child = &tree.included()[0];
        assert!(child.disk_path().is_none());
        assert!(!child.is_missing());
        assert!(resolver.display(&tree).ends_with("    nowhere.utl\n"));
    }

    #[test]
    fn test_cycles_are_not_expanded_twice() {
        let dir = TempDir::new().unwrap();
        let top = dir.path();
        let start = write(top, "a.utl", "[% include 'b.utl' %]");
        write(top, "b.utl", "[% include 'a.utl' %]");

        let tree = IncludeResolver::new(IncludeOptions {
            top: top.to_path_buf(),
            ..IncludeOptions::default()
        })
        .build(&start)
        .unwrap();

        let b = &tree.included()[0];
        let a_again = &b.included()[0];
        assert_eq!(a_again.name(), "a.utl");
        assert!(a_again.included().is_empty());
    }

    #[test]
    fn test_missing_start_file() {
        let dir = TempDir::new().unwrap();
        let result = resolver(dir.path()).build(dir.path().join("absent.utl"));
        assert!(matches!(result, Err(UtlError::IncludeNotFound(_))));
    }
}
