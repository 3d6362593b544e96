//! Integration tests for the Analyzer API.

use std::fs;

use tempfile::TempDir;

use utl::{
    Analyzer, NodeView, TreeKind, UtlError,
    config::{AppConfig, IncludeConfig, ParserConfig},
    includes::IncludeSource,
};

#[test]
fn test_parse_ast_and_parse_tree() {
    let analyzer = Analyzer::default();
    let source = "<p>[% a = b + 3; %]</p>";

    let ast = analyzer.parse("page.utl", source, TreeKind::Ast).unwrap();
    assert_eq!(ast.root().unwrap().symbol(), "statement_list");
    assert_eq!(ast.file(), "page.utl");

    let tree = analyzer.parse("page.utl", source, TreeKind::ParseTree).unwrap();
    assert_eq!(tree.root().unwrap().symbol(), "utldoc");
}

#[test]
fn test_syntax_errors_are_collected() {
    let analysis = Analyzer::default()
        .parse("page.utl", "[% a b; c d; %]", TreeKind::Ast)
        .unwrap();
    assert!(analysis.has_errors());
    assert_eq!(analysis.error_count(), 2);
    assert_eq!(analysis.diagnostics().len(), 2);
}

#[test]
fn test_strict_config_aborts() {
    let config = AppConfig::new(ParserConfig::new(true), IncludeConfig::default());
    let result = Analyzer::new(config).parse("page.utl", "[% a b; %]", TreeKind::Ast);
    match result {
        Err(UtlError::Parse { src, err }) => {
            assert_eq!(src, "[% a b; %]");
            assert_eq!(err.diagnostics().len(), 1);
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn test_lexical_error() {
    let analyzer = Analyzer::default();
    assert!(matches!(analyzer.tokenize("[% a @ %]"), Err(UtlError::Parse { .. })));
    assert!(matches!(
        analyzer.parse("page.utl", "[% a %]%]", TreeKind::Ast),
        Err(UtlError::Parse { .. })
    ));
}

#[test]
fn test_trace_keeps_tree() {
    let analysis = Analyzer::default()
        .with_trace(true)
        .parse("page.utl", "[% x = 1; %]", TreeKind::Ast)
        .unwrap();
    assert_eq!(analysis.root().unwrap().child_count(), 1);
}

#[test]
fn test_macro_xref_across_files() {
    let dir = TempDir::new().unwrap();
    let defs = dir.path().join("defs.utl");
    let page = dir.path().join("page.utl");
    fs::write(&defs, "[% macro show(x); echo x; end %]").unwrap();
    fs::write(&page, "[% show(1);\nshow(2); %]").unwrap();

    let analyzer = Analyzer::default();
    let analyses = [
        analyzer.parse_file(&defs, TreeKind::Ast).unwrap(),
        analyzer.parse_file(&page, TreeKind::Ast).unwrap(),
    ];
    let xref = analyzer.macro_xref(&analyses);

    let show = xref.find("show").next().unwrap();
    let calls = &show.references[&page.display().to_string()];
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].line, 2);
}

#[test]
fn test_missing_file() {
    let result = Analyzer::default().parse_file("/definitely/not/here.utl", TreeKind::Ast);
    assert!(matches!(result, Err(UtlError::Io(_))));
}

#[test]
fn test_include_resolution_with_overlays() {
    let dir = TempDir::new().unwrap();
    let top = dir.path();
    let foo = top.join("skins/S/includes/foo.utl");
    fs::create_dir_all(foo.parent().unwrap()).unwrap();
    fs::write(&foo, "").unwrap();
    let start = top.join("index.utl");
    fs::write(&start, "[% include 'foo.utl'; include 'bar.utl'; %]").unwrap();

    let mut config = AppConfig::default();
    let includes = config.includes_mut();
    includes.set_top(top);
    includes.set_global_skin("G");
    includes.set_skin("S");

    let analyzer = Analyzer::new(config);
    let tree = analyzer.include_tree(&start).unwrap();
    let [found, missing] = tree.included() else {
        panic!("expected two includes");
    };

    assert_eq!(found.name(), "foo.utl");
    assert_eq!(found.source(), Some(IncludeSource::Application));
    assert_eq!(found.source().unwrap().to_string(), "application");
    assert_eq!(found.disk_path(), Some(foo.as_path()));

    assert_eq!(missing.name(), "bar.utl");
    assert!(missing.disk_path().is_none());

    let resolver = analyzer.include_resolver();
    assert!(resolver.parse(found).is_ok());
    assert!(matches!(
        resolver.parse(missing),
        Err(UtlError::IncludeNotFound(_))
    ));
}
