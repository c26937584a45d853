//! Binary smoke tests.

use std::io::Write;
use std::process::{Command, Output};

use tempfile::TempDir;

fn lamtrace(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_lamtrace"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run lamtrace")
}

fn write_script(dir: &TempDir, name: &str, source: &str) -> String {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(source.as_bytes()).unwrap();
    path.display().to_string()
}

#[test]
fn test_run_prints_trace() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        &dir,
        "main.js",
        "function bar(x) { return x + 1; }\nfunction foo() { return bar(1); }\nfoo();\n",
    );

    let output = lamtrace(&["--silent", "run", &script, "--values", "--returns", "--prefix", "t"]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(
        stdout.lines().collect::<Vec<_>>(),
        vec![
            "Start tracing JavaScript",
            "t: λ foo()",
            "t: λ bar(1)",
            "t: λ bar return 2",
            "t: λ foo return 2",
        ]
    );
}

#[test]
fn test_run_steps_with_eval() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "lib.js", "function add(a, b) {\n  return a + b;\n}\n");

    let output = lamtrace(&["--silent", "run", &script, "--steps", "--eval", "add(2, 3)"]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(
        stdout.lines().collect::<Vec<_>>(),
        vec!["Start tracing JavaScript", "λ add lib.js:2:3"]
    );
}

#[test]
fn test_run_quiet_reports_count() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "main.js", "function foo() {}\nfoo();\nfoo();\n");

    let output = lamtrace(&["run", &script, "--quiet"]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("2 events (2 calls, 0 steps, 0 returns)"));
}

#[test]
fn test_run_missing_script_fails() {
    let output = lamtrace(&["run", "/nonexistent/script.js"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_run_runaway_recursion_fails_cleanly() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        &dir,
        "loop.js",
        "function f(n) { return f(n + 1); }\nf(0);\n",
    );

    let output = lamtrace(&["run", &script, "--returns"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("maximum call depth of 128 exceeded"));
}

#[test]
fn test_check_lists_functions() {
    let dir = TempDir::new().unwrap();
    let script = write_script(
        &dir,
        "check.js",
        "function foo() {\n  bar();\n}\nfunction bar() { }\n",
    );

    let output = lamtrace(&["check", &script]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(
        stdout.lines().collect::<Vec<_>>(),
        vec!["λ foo check.js:2:3", "λ bar check.js:4:18"]
    );
}

#[test]
fn test_check_reports_parse_errors() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "broken.js", "function f( {");

    let output = lamtrace(&["check", &script]);
    assert_eq!(output.status.code(), Some(1));
}
