use std::{fs, path::Path};

use tempfile::tempdir;

use utl_cli::{Args, Command, run};

fn args(command: Command) -> Args {
    Args {
        command,
        config: None,
        log_level: "off".to_string(),
    }
}

fn run_to_string(command: Command) -> (usize, String) {
    let mut out = Vec::new();
    let status = run(&args(command), &mut out).expect("command should succeed");
    (status, String::from_utf8(out).expect("output is UTF-8"))
}

fn write(dir: &Path, name: &str, text: &str) -> String {
    let path = dir.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, text).unwrap();
    path.to_string_lossy().to_string()
}

#[test]
fn e2e_lex() {
    let dir = tempdir().unwrap();
    let file = write(dir.path(), "a.utl", "<b>[% x = 1 %]");

    let (status, out) = run_to_string(Command::Lex { file });
    assert_eq!(status, 0);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "DOCUMENT '<b>' 1 0");
    assert_eq!(lines[2], "ID 'x' 1 6");
    assert_eq!(lines.last(), Some(&"EOF '' 1 14"));
}

#[test]
fn e2e_parse_ast_and_json() {
    let dir = tempdir().unwrap();
    let file = write(dir.path(), "a.utl", "[% a = b + 3; %]");

    let (_, out) = run_to_string(Command::Parse {
        file: file.clone(),
        tokens: false,
        parse_tree: false,
        json: false,
        trace: false,
    });
    assert!(out.contains("expr: =\n        id: a"), "{out}");

    let (_, out) = run_to_string(Command::Parse {
        file: file.clone(),
        tokens: true,
        parse_tree: true,
        json: true,
        trace: true,
    });
    assert!(out.starts_with("START_UTL '[%' 1 0\n"), "{out}");
    assert!(out.contains("{\"name\": \"utldoc\""), "{out}");
}

#[test]
fn e2e_validate_counts_errors() {
    let dir = tempdir().unwrap();
    let good = write(dir.path(), "good.utl", "[% if a; b; end %]");
    let bad = write(dir.path(), "bad.utl", "[% a b; c d; %]");

    let (status, out) = run_to_string(Command::Validate {
        files: vec![good.clone(), bad.clone()],
    });
    assert_eq!(status, 2);
    assert!(out.contains(&format!("{good}: 0 syntax error(s)")));
    assert!(out.contains(&format!("{bad}: 2 syntax error(s)")));
}

#[test]
fn e2e_lexical_error_fails() {
    let dir = tempdir().unwrap();
    let file = write(dir.path(), "a.utl", "[% a $ b %]");
    let mut out = Vec::new();
    assert!(run(&args(Command::Validate { files: vec![file] }), &mut out).is_err());
}

#[test]
fn e2e_macro_refs() {
    let dir = tempdir().unwrap();
    let defs = write(dir.path(), "defs.utl", "[% macro greet(name); echo name; end %]");
    let page = write(dir.path(), "page.utl", "[% greet('a'); greet('b'); %]");

    let (_, out) = run_to_string(Command::MacroRefs {
        files: vec![defs, page.clone()],
        refs: false,
    });
    assert!(out.starts_with('['));
    assert!(out.contains("\"name\":\"greet\""));
    assert!(out.contains("\"call_text\":\"greet('b')\""));

    let (_, out) = run_to_string(Command::MacroRefs {
        files: vec![page],
        refs: true,
    });
    assert_eq!(out.matches("\"macro\":\"greet\"").count(), 2);
}

#[test]
fn e2e_includes() {
    let dir = tempdir().unwrap();
    let top = dir.path();
    let start = write(top, "index.utl", "[% include 'foo.utl'; include 'bar.utl'; %]");
    write(top, "skins/S/includes/foo.utl", "<p>foo</p>");

    let (_, out) = run_to_string(Command::Includes {
        file: start.clone(),
        top: Some(top.to_string_lossy().to_string()),
        global_skin: Some("G".to_string()),
        skin: Some("S".to_string()),
        no_repeat: false,
        no_recurse: false,
        no_file_check: false,
    });
    assert_eq!(
        out,
        format!("Included by {start}:\n    foo.utl (application)\n    bar.utl (not found)\n")
    );
}

#[test]
fn e2e_explicit_config() {
    let dir = tempdir().unwrap();
    let config = write(dir.path(), "config.toml", "[parser]\nstrict = true\n");
    let file = write(dir.path(), "a.utl", "[% a b; %]");

    let args = Args {
        command: Command::Validate { files: vec![file] },
        config: Some(config),
        log_level: "off".to_string(),
    };
    let mut out = Vec::new();
    assert!(run(&args, &mut out).is_err());
}
