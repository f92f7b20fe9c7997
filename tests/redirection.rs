use std::os::unix::fs::PermissionsExt;

use test_util::{run, script};

#[test]
fn output_file_is_truncated() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");
    std::fs::write(&out, "a much longer line that must disappear\n").unwrap();
    let r = run(script(&format!("echo second > {}", out.display())));
    assert_eq!(r.code, Some(0), "stderr: {}", r.stderr);
    assert!(r.stdout.is_empty());
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "second\n");
}

#[test]
fn created_output_is_private() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("new.txt");
    run(script(&format!("echo x > {}", out.display())));
    let mode = std::fs::metadata(&out).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn input_and_output_together() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let out = dir.path().join("out.txt");
    std::fs::write(&input, "b\na\nc\n").unwrap();
    let r = run(script(&format!("sort < {} > {}", input.display(), out.display())));
    assert_eq!(r.code, Some(0), "stderr: {}", r.stderr);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "a\nb\nc\n");
}

#[test]
fn input_only() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    std::fs::write(&input, "hello\n").unwrap();
    let r = run(script(&format!("cat < {}", input.display())));
    assert_eq!(r.stdout, "hello\n");
}

#[test]
fn missing_input_launches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.txt");
    let marker = dir.path().join("marker");
    let r = run(script(&format!("touch {} < {}", marker.display(), missing.display())));
    assert!(r.stderr.contains("no such file"), "stderr: {}", r.stderr);
    assert_eq!(r.code, Some(1));
    assert!(!marker.exists());
}

#[test]
fn dangling_output_operator() {
    let r = run(script("echo hi >"));
    assert!(r.stdout.is_empty());
    assert!(r.stderr.contains("syntax error"), "stderr: {}", r.stderr);
    assert_eq!(r.code, Some(2));
}

#[test]
fn wrong_token_after_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    std::fs::write(&input, "x\n").unwrap();
    let r = run(script(&format!("cat < {} extra", input.display())));
    assert!(r.stdout.is_empty());
    assert!(r.stderr.contains("expected '>'"), "stderr: {}", r.stderr);
}

#[test]
fn builtin_output_goes_to_file_and_stdout_returns() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("pwd.txt");
    let mut cmd = script(&format!("pwd > {}\necho back", out.display()));
    cmd.current_dir(dir.path());
    let r = run(cmd);
    assert_eq!(r.stdout, "back\n");
    let expected = dir.path().canonicalize().unwrap();
    assert_eq!(std::fs::read_to_string(&out).unwrap().trim_end(), expected.to_str().unwrap());
}

#[test]
fn input_then_dangling_output_launches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    std::fs::write(&input, "x\n").unwrap();
    let r = run(script(&format!("cat < {} >\necho next", input.display())));
    assert_eq!(r.stdout, "next\n");
    assert!(r.stderr.contains("missing file name after '>'"), "stderr: {}", r.stderr);
}
