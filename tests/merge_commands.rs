use assert_fs::TempDir;
use predicates::prelude::predicate;
use rstest::rstest;

mod common;
use common::command::{init_repository_dir, run_scriv_command, scriv_commit, scriv_commit_on};
use common::file::{FileSpec, write_file};

/// History:
///       A (base, main)
///      / \
///     B   C
///     |   |
///   main  feature
///
/// B edits the first line, C edits the last: the merge must combine both
/// without a conflict.
#[rstest]
fn merge_simple_divergence(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;

    run_scriv_command(dir.path(), &["branch", "create", "feature"])
        .assert()
        .success();

    // Commit B on main: edit the first line
    write_file(FileSpec::new(
        dir.path().join("a.txt"),
        "ONE\ntwo\nthree\nfour\nfive\n".to_string(),
    ));
    scriv_commit(dir.path(), "a.txt", "Commit B - main change")
        .assert()
        .success();

    // Commit C on feature: edit the last line
    write_file(FileSpec::new(
        dir.path().join("a.txt"),
        "one\ntwo\nthree\nfour\nFIVE\n".to_string(),
    ));
    scriv_commit_on(dir.path(), "a.txt", "Commit C - feature change", "feature")
        .assert()
        .success();

    run_scriv_command(dir.path(), &["merge", "feature", "main"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Merged feature into main"));

    run_scriv_command(dir.path(), &["show", "a.txt", "-b", "main"])
        .assert()
        .success()
        .stdout(predicate::eq("ONE\ntwo\nthree\nfour\nFIVE\n"));
    Ok(())
}

#[rstest]
fn merge_with_overlapping_edits_conflicts(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;

    run_scriv_command(dir.path(), &["branch", "create", "feature"])
        .assert()
        .success();

    write_file(FileSpec::new(
        dir.path().join("a.txt"),
        "one\nMAIN\nthree\nfour\nfive\n".to_string(),
    ));
    scriv_commit(dir.path(), "a.txt", "main edit").assert().success();

    write_file(FileSpec::new(
        dir.path().join("a.txt"),
        "one\nFEATURE\nthree\nfour\nfive\n".to_string(),
    ));
    scriv_commit_on(dir.path(), "a.txt", "feature edit", "feature")
        .assert()
        .success();

    run_scriv_command(dir.path(), &["merge", "feature", "main"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("merge conflict in a.txt"))
        .stderr(predicate::str::contains("line 2"));

    // the conflicting merge applied nothing
    run_scriv_command(dir.path(), &["show", "a.txt", "-b", "main"])
        .assert()
        .success()
        .stdout(predicate::eq("one\nMAIN\nthree\nfour\nfive\n"));
    Ok(())
}

#[rstest]
fn merge_fast_forwards_an_untouched_target(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;

    run_scriv_command(dir.path(), &["branch", "create", "feature"])
        .assert()
        .success();

    write_file(FileSpec::new(
        dir.path().join("a.txt"),
        "one\ntwo\nthree\nfour\nfive\nsix\n".to_string(),
    ));
    scriv_commit_on(dir.path(), "a.txt", "feature edit", "feature")
        .assert()
        .success();

    run_scriv_command(dir.path(), &["merge", "feature", "main"])
        .assert()
        .success();

    run_scriv_command(dir.path(), &["show", "a.txt", "-b", "main"])
        .assert()
        .success()
        .stdout(predicate::eq("one\ntwo\nthree\nfour\nfive\nsix\n"));
    Ok(())
}

#[rstest]
fn merge_with_nothing_to_do_reports_up_to_date(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;

    run_scriv_command(dir.path(), &["branch", "create", "feature"])
        .assert()
        .success();

    run_scriv_command(dir.path(), &["merge", "feature", "main"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Already up to date"));
    Ok(())
}

#[rstest]
fn merge_carries_documents_new_on_the_source(
    init_repository_dir: TempDir,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = init_repository_dir;

    run_scriv_command(dir.path(), &["branch", "create", "feature"])
        .assert()
        .success();

    write_file(FileSpec::new(
        dir.path().join("b.txt"),
        "fresh\n".to_string(),
    ));
    scriv_commit_on(dir.path(), "b.txt", "add b", "feature")
        .assert()
        .success();

    run_scriv_command(dir.path(), &["merge", "feature", "main"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 document(s) updated"));

    run_scriv_command(dir.path(), &["show", "b.txt", "-b", "main"])
        .assert()
        .success()
        .stdout(predicate::eq("fresh\n"));
    Ok(())
}
