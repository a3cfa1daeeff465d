//! End-to-end tests for the `nsi` binary: write a `.ns` file, run the
//! interpreter on it, and assert stdout and the exit code.

use std::path::PathBuf;
use std::process::{Command, Output};

/// Find the nsi binary next to the test executable.
fn find_nsi() -> PathBuf {
    let mut path = std::env::current_exe()
        .expect("cannot find current exe")
        .parent()
        .expect("cannot find parent dir")
        .to_path_buf();
    if path.file_name().is_some_and(|n| n == "deps") {
        path = path.parent().expect("deps has a parent").to_path_buf();
    }
    let nsi = path.join(if cfg!(windows) { "nsi.exe" } else { "nsi" });
    assert!(
        nsi.exists(),
        "nsi binary not found at {}. Run `cargo build -p nsi` first.",
        nsi.display()
    );
    nsi
}

/// Run a source file (plus optional sibling modules) through nsi.
fn run_program(main: &str, modules: &[(&str, &str)], args: &[&str]) -> Output {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let main_path = dir.path().join("main.ns");
    std::fs::write(&main_path, main).expect("failed to write main.ns");
    for (name, body) in modules {
        std::fs::write(dir.path().join(name), body).expect("failed to write module");
    }
    Command::new(find_nsi())
        .arg(&main_path)
        .args(args)
        .output()
        .expect("failed to invoke nsi")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn prints_arithmetic_result() {
    let output = run_program("let x = 1 + 2 * 3; print(x);", &[], &[]);
    assert!(output.status.success());
    assert_eq!(stdout_of(&output), "7\n");
}

#[test]
fn exit_code_is_top_level_number() {
    let output = run_program("let x = 40; x + 2;", &[], &[]);
    assert_eq!(output.status.code(), Some(42));
}

#[test]
fn exit_code_zero_for_non_number() {
    let output = run_program("print(\"done\");", &[], &[]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_of(&output), "done\n");
}

#[test]
fn parse_error_exits_one_and_reports() {
    let output = run_program("let x = ;", &[], &[]);
    assert_eq!(output.status.code(), Some(1));
    let text = stdout_of(&output);
    assert!(text.contains("Syntax error"), "missing heading:\n{text}");
    assert!(text.contains("empty expression"), "missing message:\n{text}");
}

#[test]
fn runtime_error_exits_one_and_reports() {
    let output = run_program("missing();", &[], &[]);
    assert_eq!(output.status.code(), Some(1));
    let text = stdout_of(&output);
    assert!(text.contains("Runtime Error"), "missing heading:\n{text}");
    assert!(text.contains("No such variable"), "missing message:\n{text}");
}

#[test]
fn parse_error_trace_names_enclosing_constructs() {
    let output = run_program("fn f() { let x = ; }", &[], &[]);
    assert_eq!(output.status.code(), Some(1));
    let text = stdout_of(&output);
    assert!(text.contains("in Function"), "missing trace:\n{text}");
    assert!(text.contains("in Let"), "missing trace:\n{text}");
}

#[test]
fn ast_flag_dumps_the_tree_and_exits_zero() {
    let output = run_program("let x = 1 + 2;", &[], &["--ast"]);
    assert_eq!(output.status.code(), Some(0));
    let text = stdout_of(&output);
    assert!(text.contains("Block"), "missing root:\n{text}");
    assert!(text.contains("Let"), "missing let:\n{text}");
    assert!(text.contains("Binary `+`"), "missing operator:\n{text}");
}

#[test]
fn imports_resolve_next_to_the_main_file() {
    let output = run_program(
        "import util; print(util.greeting);",
        &[("util.ns", "let greeting = \"hey\";")],
        &[],
    );
    assert!(output.status.success(), "stdout: {}", stdout_of(&output));
    assert_eq!(stdout_of(&output), "hey\n");
}

#[test]
fn require_loads_a_component() {
    let output = run_program(
        "let c = require(\"widget\"); print(c);",
        &[("widget.ns", "@export let component = 3;")],
        &[],
    );
    assert!(output.status.success(), "stdout: {}", stdout_of(&output));
    assert_eq!(stdout_of(&output), "3\n");
}
