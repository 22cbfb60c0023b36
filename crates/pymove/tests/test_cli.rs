#![allow(clippy::disallowed_methods)] // insta macros use unwrap internally

use insta::assert_snapshot;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Run pymove inside `root` and return (stdout, stderr, exit_code)
fn run_pymove(root: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_pymove"))
        .arg("--repo-root")
        .arg(root)
        .args(args)
        .env("RUST_LOG", "off")
        .env_remove("PYMOVE_EXTENSIONS")
        .env_remove("PYMOVE_EXCLUDE")
        .env_remove("PYMOVE_NESTING")
        .env_remove("PYMOVE_NAMESPACE_PACKAGES")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code().unwrap_or(-1);

    (stdout, stderr, exit_code)
}

fn sample_repo() -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let root = temp.path();
    fs::create_dir_all(root.join("pkg")).expect("create pkg");
    fs::write(root.join("pkg/__init__.py"), "").expect("write");
    fs::write(root.join("pkg/module.py"), "").expect("write");
    fs::write(root.join("app.py"), "from pkg import module\n").expect("write");
    fs::write(root.join("other.py"), "from pkg import module, helper\n").expect("write");
    temp
}

#[test]
fn test_help_lists_commands() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let (stdout, _, exit_code) = run_pymove(temp.path(), &["--help"]);

    assert_eq!(exit_code, 0);
    for command in ["move-file", "move-folder", "move", "rewrite"] {
        assert!(stdout.contains(command), "missing {command} in help");
    }
}

#[test]
fn test_move_file_prints_summary() {
    let temp = sample_repo();
    let root = temp.path();

    let (stdout, stderr, exit_code) = run_pymove(root, &["move-file", "pkg/module.py", "module.py"]);

    assert_eq!(exit_code, 0, "Command failed with stderr: {}", stderr);
    assert_snapshot!(stdout, @r#"
    1 modules moved, 1 files changed
      app.py
    1 imports left unchanged:
      other.py:1: `from pkg import ...` mixes moved modules (module) with other names (helper)
    "#);
    assert!(root.join("module.py").is_file());
    assert_eq!(
        fs::read_to_string(root.join("app.py")).expect("read"),
        "import module\n"
    );
}

#[test]
fn test_dry_run_leaves_repository_alone() {
    let temp = sample_repo();
    let root = temp.path();

    let (stdout, _, exit_code) = run_pymove(root, &["--dry-run", "move", "pkg", "lib/"]);

    assert_eq!(exit_code, 0);
    assert!(stdout.starts_with("2 modules moved, 2 files would change"));
    assert!(root.join("pkg/module.py").is_file());
    assert!(!root.join("lib").exists());
}

#[test]
fn test_move_folder_rejects_file() {
    let temp = sample_repo();
    let root = temp.path();

    let (_, stderr, exit_code) = run_pymove(root, &["move-folder", "app.py", "lib"]);

    assert_ne!(exit_code, 0);
    assert!(stderr.contains("expected a directory"), "stderr: {stderr}");
    assert!(root.join("app.py").is_file());
}

#[test]
fn test_rewrite_after_manual_rename() {
    let temp = sample_repo();
    let root = temp.path();
    fs::rename(root.join("pkg/module.py"), root.join("pkg/renamed.py")).expect("rename");

    let (_, stderr, exit_code) = run_pymove(root, &["rewrite", "pkg/module.py", "pkg/renamed.py"]);

    assert_eq!(exit_code, 0, "Command failed with stderr: {}", stderr);
    assert_eq!(
        fs::read_to_string(root.join("app.py")).expect("read"),
        "from pkg import renamed as module\n"
    );
}
