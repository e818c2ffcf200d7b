//! Tests for `shelldeck update`.

use predicates::prelude::*;

use super::common::{TestEnv, locked_rev};

const DESCRIPTOR: &str = r#"
[inputs]
toolset = "store:./registry"

[[shells]]
platforms = "all"
packages = ["compiler"]
"#;

fn locked_at_r1() -> TestEnv {
  let env = TestEnv::with_toolset(DESCRIPTOR);
  env.write_file("registry/latest", "r1");
  env.cmd().args(["resolve", "--platform", "x86_64-linux"]).assert().success();
  env.write_file("registry/latest", "r2");
  env
}

#[test]
fn update_moves_to_latest() {
  let env = locked_at_r1();

  env
    .cmd()
    .arg("update")
    .assert()
    .success()
    .stdout(predicate::str::contains("Updated"))
    .stdout(predicate::str::contains("toolset"));

  assert_eq!(locked_rev(&env.root(), "toolset").as_deref(), Some("r2"));
}

#[test]
fn dry_run_leaves_lock_alone() {
  let env = locked_at_r1();

  env
    .cmd()
    .args(["update", "--dry-run"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Would update"));

  assert_eq!(locked_rev(&env.root(), "toolset").as_deref(), Some("r1"));
}

#[test]
fn up_to_date_inputs_report_no_changes() {
  let env = TestEnv::with_toolset(DESCRIPTOR);
  env.cmd().args(["resolve", "--platform", "x86_64-linux"]).assert().success();

  env
    .cmd()
    .arg("update")
    .assert()
    .success()
    .stdout(predicate::str::contains("up to date"));
}

#[test]
fn unknown_input_fails() {
  let env = TestEnv::with_toolset(DESCRIPTOR);

  env
    .cmd()
    .args(["update", "nope"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("'nope' is not declared"));
}
