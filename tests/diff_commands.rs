use assert_fs::TempDir;
use predicates::prelude::predicate;
use rstest::rstest;

mod common;
use common::command::{commit_and_capture_id, init_repository_dir, run_scriv_command};
use common::file::{FileSpec, write_file};

#[rstest]
fn diff_shows_added_and_removed_lines(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;

    write_file(FileSpec::new(
        dir.path().join("b.txt"),
        "alpha\nbeta\n".to_string(),
    ));
    let first = commit_and_capture_id(dir.path(), "b.txt", "first", "main");

    write_file(FileSpec::new(
        dir.path().join("b.txt"),
        "alpha\ngamma\nbeta\n".to_string(),
    ));
    let second = commit_and_capture_id(dir.path(), "b.txt", "second", "main");

    run_scriv_command(dir.path(), &["diff", "b.txt", &first, &second])
        .assert()
        .success()
        .stdout(predicate::str::contains("+gamma"))
        .stdout(predicate::str::contains(" alpha"))
        .stdout(predicate::str::contains(" beta"));
    Ok(())
}

#[rstest]
fn diff_of_a_version_with_itself_shows_no_changes(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;

    write_file(FileSpec::new(
        dir.path().join("b.txt"),
        "alpha\nbeta\n".to_string(),
    ));
    let first = commit_and_capture_id(dir.path(), "b.txt", "first", "main");

    let assert = run_scriv_command(dir.path(), &["diff", "b.txt", &first, &first])
        .assert()
        .success();
    let output = String::from_utf8(assert.get_output().stdout.clone())?;
    // everything after the two header lines is an unchanged line
    assert!(output.lines().skip(2).all(|line| line.starts_with(' ')));
    Ok(())
}

#[rstest]
fn diff_against_an_unknown_document_fails(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;

    run_scriv_command(dir.path(), &["diff", "ghost.txt", "aaaa", "bbbb"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no document named ghost.txt"));
    Ok(())
}
