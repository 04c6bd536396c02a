use crate::common::file::{FileSpec, write_file};
use assert_cmd::Command;
use assert_fs::TempDir;
use rstest::fixture;
use std::path::Path;

#[fixture]
pub fn repository_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

#[fixture]
pub fn init_repository_dir(repository_dir: TempDir) -> TempDir {
    run_scriv_command(repository_dir.path(), &["init"])
        .assert()
        .success();

    write_file(FileSpec::new(
        repository_dir.path().join("a.txt"),
        "one\ntwo\nthree\nfour\nfive\n".to_string(),
    ));
    scriv_commit(repository_dir.path(), "a.txt", "Initial commit")
        .assert()
        .success();

    repository_dir
}

pub fn run_scriv_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("scriv").expect("Failed to find scriv binary");
    cmd.envs(vec![
        ("NO_PAGER", "1"),
        ("SCRIV_AUTHOR_NAME", "Test Author"),
        ("SCRIV_AUTHOR_EMAIL", "test@example.com"),
    ]);
    cmd.current_dir(dir);
    for arg in args {
        cmd.arg(arg);
    }
    cmd
}

pub fn scriv_commit(dir: &Path, file: &str, message: &str) -> Command {
    run_scriv_command(dir, &["commit", file, "-m", message])
}

pub fn scriv_commit_on(dir: &Path, file: &str, message: &str, branch: &str) -> Command {
    run_scriv_command(dir, &["commit", file, "-m", message, "-b", branch])
}

/// Run a commit and pull the short version id out of its output
pub fn commit_and_capture_id(dir: &Path, file: &str, message: &str, branch: &str) -> String {
    let output = scriv_commit_on(dir, file, message, branch)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let output = String::from_utf8(output).expect("commit output is not utf-8");

    let pattern = regex::Regex::new(r"\[\S+ ([0-9a-f]{7})\]").expect("invalid pattern");
    pattern
        .captures(&output)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_string())
        .expect("commit output carries no version id")
}
