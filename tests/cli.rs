use assert_cmd::Command;
use predicates::prelude::*;

fn tokenlens() -> Command {
    Command::cargo_bin("tokenlens").unwrap()
}

#[test]
fn help_lists_subcommands() {
    tokenlens()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("report"))
        .stdout(predicate::str::contains("init"));
}

#[test]
fn report_help_lists_filter_flags() {
    tokenlens()
        .args(["report", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--user"))
        .stdout(predicate::str::contains("--model"))
        .stdout(predicate::str::contains("--function"));
}

#[test]
fn report_without_warehouse_fails_with_hint() {
    let isolated = tempfile::tempdir().unwrap();

    tokenlens()
        .arg("report")
        .env_remove("SNOWFLAKE_HOST")
        .env_remove("SNOWFLAKE_ACCOUNT")
        .env("SNOWFLAKE_HOME", isolated.path())
        .env("XDG_CONFIG_HOME", isolated.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Failed to acquire a warehouse session",
        ));
}
