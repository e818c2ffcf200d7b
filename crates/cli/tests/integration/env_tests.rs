//! Tests for `shelldeck env`.

use predicates::prelude::*;

use super::common::TestEnv;

const DESCRIPTOR: &str = r#"
[inputs]
toolset = "store:./registry"

[[shells]]
platforms = "all"
packages = ["compiler"]
env = { GREETING = "hello" }
"#;

#[test]
fn bash_script_exports_variables_and_path() {
  let env = TestEnv::with_toolset(DESCRIPTOR);

  env
    .cmd()
    .args(["env", "--shell", "bash", "--platform", "x86_64-linux"])
    .assert()
    .success()
    .stdout(predicate::str::contains("export GREETING='hello'"))
    .stdout(predicate::str::contains("export SHELLDECK_PLATFORM='x86_64-linux'"))
    .stdout(predicate::str::contains("pkgs/compiler/bin"));
}

#[test]
fn fish_script_uses_set() {
  let env = TestEnv::with_toolset(DESCRIPTOR);

  env
    .cmd()
    .args(["env", "--shell", "fish", "--platform", "x86_64-linux"])
    .assert()
    .success()
    .stdout(predicate::str::contains("set -gx GREETING 'hello'"));
}
