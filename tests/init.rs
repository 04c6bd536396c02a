use predicates::prelude::predicate;

mod common;
use common::command::run_scriv_command;

#[test]
fn new_repository_is_initialized_with_store_directory() -> Result<(), Box<dyn std::error::Error>> {
    let dir = assert_fs::TempDir::new()?;

    run_scriv_command(dir.path(), &["init"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Initialized empty scriv repository in",
        ));

    assert!(dir.path().join(".scriv/repository").exists());
    assert!(dir.path().join(".scriv/objects").exists());
    assert!(dir.path().join(".scriv/refs/heads/main").exists());
    Ok(())
}

#[test]
fn reinitializing_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = assert_fs::TempDir::new()?;

    run_scriv_command(dir.path(), &["init"]).assert().success();
    run_scriv_command(dir.path(), &["init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already a scriv repository"));
    Ok(())
}

#[test]
fn commands_outside_a_repository_fail() -> Result<(), Box<dyn std::error::Error>> {
    let dir = assert_fs::TempDir::new()?;

    run_scriv_command(dir.path(), &["branch", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a scriv repository"));
    Ok(())
}
