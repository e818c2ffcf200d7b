//! Tests for `shelldeck resolve`.

use predicates::prelude::*;

use super::common::{TestEnv, locked_rev};

const DESCRIPTOR: &str = r#"
[inputs]
toolset = "store:./registry"

[[shells]]
platforms = "all"
packages = ["compiler"]
"#;

#[test]
fn resolve_prints_packages() {
  let env = TestEnv::with_toolset(DESCRIPTOR);

  env
    .cmd()
    .args(["resolve", "--platform", "x86_64-linux"])
    .assert()
    .success()
    .stdout(predicate::str::contains("x86_64-linux"))
    .stdout(predicate::str::contains("compiler"));

  assert_eq!(locked_rev(&env.root(), "toolset").as_deref(), Some("r2"));
}

#[test]
fn resolve_all_json_covers_default_platforms() {
  let env = TestEnv::with_toolset(DESCRIPTOR);

  let output = env.cmd().args(["resolve", "--all", "--json"]).output().unwrap();

  assert!(output.status.success());
  let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let reports = reports.as_array().unwrap();
  assert_eq!(reports.len(), 4);
  for report in reports {
    assert_eq!(report["environment"]["revisions"]["toolset"], "r2");
  }
}

#[test]
fn resolve_uses_lock_over_latest() {
  let env = TestEnv::with_toolset(DESCRIPTOR);
  env.cmd().args(["resolve", "--platform", "x86_64-linux"]).assert().success();
  env.write_file("registry/latest", "r1");

  let output = env
    .cmd()
    .args(["resolve", "--platform", "x86_64-linux", "--json"])
    .output()
    .unwrap();

  let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(reports[0]["environment"]["revisions"]["toolset"], "r2");
}

#[test]
fn offline_without_lock_fails() {
  let env = TestEnv::with_toolset(DESCRIPTOR);

  env
    .cmd()
    .args(["--offline", "resolve", "--platform", "x86_64-linux"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("offline"));
}

#[test]
fn offline_env_var_with_lock_succeeds() {
  let env = TestEnv::with_toolset(DESCRIPTOR);
  env.cmd().args(["resolve", "--platform", "x86_64-linux"]).assert().success();

  env
    .cmd()
    .env("SHELLDECK_OFFLINE", "1")
    .args(["resolve", "--platform", "x86_64-linux"])
    .assert()
    .success();
}

#[test]
fn missing_package_names_platform() {
  let env = TestEnv::with_toolset(&DESCRIPTOR.replace("[\"compiler\"]", "[\"linker\"]"));

  env
    .cmd()
    .args(["resolve", "--platform", "aarch64-darwin"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("linker"))
    .stderr(predicate::str::contains("aarch64-darwin"));
}
