//! End-to-end provisioning through a session.

use shelldeck_lib::inputs::Revision;
use shelldeck_lib::inputs::lock::LockFile;
use shelldeck_lib::materialize::on_search_path;
use shelldeck_lib::platform::Platform;
use shelldeck_lib::resolve::ResolveError;
use shelldeck_lib::session::{Session, SessionError, SessionOptions};

use super::common::{Project, quiet};

const TOOLSET: &str = r#"
description = "compiler shell"

[inputs]
toolset = { url = "store:./registry", rev = "R" }

[[shells]]
platforms = ["linux"]
packages = ["compiler"]
hook = ["compiler --version"]
"#;

fn toolset_project() -> Project {
  let project = Project::new();
  project.add_revision("R", false);
  project.add_revision("S", true);
  project.add_package("R", "compiler", "compiler 1.2.3");
  project.add_package("S", "compiler", "compiler 2.0.0");
  project.write_descriptor(TOOLSET);
  project
}

// =============================================================================
// Pinned input scenario
// =============================================================================

#[tokio::test]
#[cfg(unix)]
async fn pinned_toolset_runs_compiler_version() {
  let project = toolset_project();
  let (session, _) = project.session(quiet());
  let linux = Platform::parse_requested("linux").unwrap();

  let provisioned = session.provision(linux).await.unwrap();

  let compiler = provisioned.resolved.package("compiler").unwrap();
  assert_eq!(compiler.revision, Revision::new("R"));
  assert!(on_search_path(&provisioned.activated, &compiler.artifact.join("bin")));
  assert_eq!(provisioned.hook.exit_code, 0);
  assert!(
    provisioned.hook.stdout.contains("1.2.3"),
    "stdout: {}",
    provisioned.hook.stdout
  );
}

#[tokio::test]
async fn undeclared_windows_fails_before_any_lookup() {
  let project = toolset_project();
  let (session, backend) = project.session(quiet());
  let windows = Platform::parse_requested("windows").unwrap();

  let result = session.provision(windows).await;

  assert!(matches!(
    result,
    Err(SessionError::Resolve(ResolveError::UnsupportedPlatform { .. }))
  ));
  assert_eq!(backend.calls(), 0);
  assert!(!session.lock_path().exists());
}

#[tokio::test]
async fn pinned_revision_is_stable_across_sessions() {
  let project = toolset_project();
  let linux = Platform::parse_requested("linux").unwrap();

  let (first, _) = project.session(quiet());
  let a = first.resolve(linux).await.unwrap();
  first.save_lock().unwrap();

  let (second, _) = project.session(quiet());
  let b = second.resolve(linux).await.unwrap();

  assert_eq!(a.revisions, b.revisions);
  assert_eq!(b.revisions.get("toolset"), Some(&Revision::new("R")));
}

#[tokio::test]
async fn lock_conflict_is_reported_not_resolved() {
  let project = toolset_project();
  let linux = Platform::parse_requested("linux").unwrap();
  let (session, _) = project.session(quiet());
  session.resolve(linux).await.unwrap();
  session.save_lock().unwrap();

  project.write_descriptor(&TOOLSET.replace("rev = \"R\"", "rev = \"S\""));
  let (session, _) = project.session(quiet());
  let err = session.resolve(linux).await.unwrap_err();

  assert!(err.to_string().contains("shelldeck update toolset"), "{err}");
  let lock = LockFile::load(session.lock_path()).unwrap().unwrap();
  assert_eq!(lock.get("toolset").map(|l| l.rev.as_str()), Some("R"));
}

// =============================================================================
// Hook failure
// =============================================================================

#[tokio::test]
#[cfg(unix)]
async fn hook_halts_at_first_failure() {
  let project = toolset_project();
  let marker = project.root().join("c-ran");
  project.write_descriptor(&TOOLSET.replace(
    "hook = [\"compiler --version\"]",
    &format!("hook = [\"echo a\", \"exit 3\", \"touch '{}'\"]", marker.display()),
  ));
  let (session, _) = project.session(quiet());

  let provisioned = session
    .provision(Platform::parse_requested("linux").unwrap())
    .await
    .unwrap();

  assert_eq!(provisioned.hook.exit_code, 3);
  assert_eq!(provisioned.hook.failed_index, Some(1));
  assert_eq!(provisioned.hook.commands_run(), 2);
  assert!(!marker.exists());

  let err = provisioned.hook.into_result().unwrap_err();
  assert_eq!(err.index, 1);
  assert_eq!(err.exit_code, 3);
}

#[tokio::test]
async fn missing_package_names_package_and_platform() {
  let project = toolset_project();
  project.write_descriptor(&TOOLSET.replace("packages = [\"compiler\"]", "packages = [\"linker\"]"));
  let (session, _) = project.session(quiet());
  let linux = Platform::parse_requested("linux").unwrap();

  let err = session.resolve(linux).await.unwrap_err();

  match err {
    SessionError::Resolve(ResolveError::PackageNotFound { name, platform, .. }) => {
      assert_eq!(name, "linker");
      assert_eq!(platform, linux);
    }
    other => panic!("unexpected error: {other}"),
  }
}

#[test]
fn shell_env_cannot_override_search_path() {
  let project = toolset_project();
  project.write_descriptor(&TOOLSET.replace(
    "hook = [\"compiler --version\"]",
    "env = { PATH = \"/usr/bin:/bin\" }\nhook = [\"compiler --version\"]",
  ));

  let err = Session::open(&project.descriptor_path(), quiet(), SessionOptions::default()).unwrap_err();

  match err {
    SessionError::Descriptor(e) => assert!(e.to_string().contains("shells[0].env.PATH"), "{e}"),
    other => panic!("expected a descriptor error, got {other:?}"),
  }
}
