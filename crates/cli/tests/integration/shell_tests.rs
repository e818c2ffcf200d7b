//! Tests for `shelldeck shell`.

use predicates::prelude::*;

use super::common::{TestEnv, locked_rev};

fn descriptor(hook: &str) -> String {
  format!(
    r#"
[inputs]
toolset = "store:./registry"

[[shells]]
platforms = ["linux", "darwin"]
packages = ["compiler"]
hook = {hook}
"#
  )
}

#[test]
#[cfg(unix)]
fn run_executes_hook_in_environment() {
  let env = TestEnv::with_toolset(&descriptor(r#"["compiler --version"]"#));

  env
    .cmd()
    .args(["shell", "--run"])
    .assert()
    .success()
    .stdout(predicate::str::contains("compiler r2"));

  assert_eq!(locked_rev(&env.root(), "toolset").as_deref(), Some("r2"));
}

#[test]
#[cfg(unix)]
fn run_exits_with_failing_hook_code() {
  let env = TestEnv::with_toolset(&descriptor(r#"["echo first", "exit 3", "touch third"]"#));

  env
    .cmd()
    .args(["shell", "--run"])
    .assert()
    .code(3)
    .stdout(predicate::str::contains("first"))
    .stderr(predicate::str::contains("exited with code 3"));

  assert!(!env.exists("third"));
}

#[test]
#[cfg(unix)]
fn run_exports_platform_variables() {
  let env = TestEnv::with_toolset(&descriptor(r#"["echo $SHELLDECK_PLATFORM $SHELLDECK_PACKAGES"]"#));

  env
    .cmd()
    .args(["shell", "--run", "--platform", "aarch64-darwin"])
    .assert()
    .success()
    .stdout(predicate::str::contains("aarch64-darwin compiler"));
}

#[test]
fn undeclared_platform_fails_without_lock() {
  let env = TestEnv::with_toolset(&descriptor("[]"));

  env
    .cmd()
    .args(["shell", "--run", "--platform", "windows"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("not supported"));

  assert!(!env.exists("shelldeck.lock"));
}

#[test]
#[cfg(unix)]
fn hook_timeout_exits_124() {
  let env = TestEnv::with_toolset(&descriptor(r#"["sleep 10"]"#));

  env
    .cmd()
    .args(["--timeout", "200ms", "shell", "--run"])
    .assert()
    .code(124)
    .stderr(predicate::str::contains("timed out"));
}

#[test]
#[cfg(unix)]
fn json_output_reports_hook_result() {
  let env = TestEnv::with_toolset(&descriptor(r#"["compiler --version"]"#));

  let output = env
    .cmd()
    .args(["--output", "json", "shell", "--run"])
    .output()
    .unwrap();

  assert!(output.status.success());
  let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(value["exit_code"], 0);
  assert!(value["stdout"].as_str().unwrap().contains("compiler r2"));
}

#[test]
#[cfg(unix)]
fn json_timeout_lists_completed_commands() {
  let env = TestEnv::with_toolset(&descriptor(r#"["echo first", "sleep 10"]"#));

  let output = env
    .cmd()
    .args(["--output", "json", "--timeout", "500ms", "shell", "--run"])
    .output()
    .unwrap();

  assert_eq!(output.status.code(), Some(124));
  let steps: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(steps.as_array().map(Vec::len), Some(1));
  assert_eq!(steps[0]["stdout"].as_str().map(str::trim), Some("first"));
  assert!(String::from_utf8_lossy(&output.stderr).contains("1 earlier command(s) completed"));
}
