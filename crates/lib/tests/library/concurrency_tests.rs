//! Shared cache behaviour across concurrent platform resolutions.

use std::sync::Arc;

use shelldeck_lib::cancel::CancelToken;
use shelldeck_lib::inputs::InputRef;
use shelldeck_lib::inputs::source;

use super::common::{Project, quiet};

const MULTI: &str = r#"
[inputs]
toolset = "store:./registry"

[[shells]]
platforms = "all"
packages = ["compiler"]
"#;

fn multi_project() -> Project {
  let project = Project::new();
  project.add_revision("r1", false);
  project.add_revision("r2", true);
  project.add_package("r1", "compiler", "1");
  project.add_package("r2", "compiler", "2");
  project.write_descriptor(MULTI);
  project
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn all_platforms_share_one_fetch() {
  let project = multi_project();
  let (session, backend) = project.session(quiet());

  let platforms = session.declared_platforms();
  let results = session.resolve_many(&platforms).await;

  assert_eq!(results.len(), 4);
  for (platform, result) in &results {
    let env = result.as_ref().unwrap_or_else(|e| panic!("{platform}: {e}"));
    assert_eq!(env.platform, *platform);
    assert_eq!(env.revisions.get("toolset").map(|r| r.as_str()), Some("r2"));
  }
  assert_eq!(backend.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_for_one_input_agree() {
  let project = multi_project();
  let (session, backend) = project.session(quiet());
  let registry = Arc::clone(session.registry());
  let (locator, _) = source::parse("store:./registry").unwrap();
  let input = InputRef::new("toolset", locator);

  let mut handles = Vec::new();
  for _ in 0..16 {
    let registry = Arc::clone(&registry);
    let input = input.clone();
    handles.push(tokio::spawn(async move {
      registry.resolve(&input, &CancelToken::new()).await
    }));
  }

  let mut revisions = Vec::new();
  for handle in handles {
    revisions.push(handle.await.unwrap().unwrap().revision);
  }

  assert!(revisions.iter().all(|r| r.as_str() == "r2"));
  assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn cancelled_session_stops_resolution() {
  let project = multi_project();
  let (session, backend) = project.session(quiet());
  session.cancel_token().cancel();

  let platforms = session.declared_platforms();
  let result = session.resolve(platforms[0]).await;

  assert!(result.is_err());
  assert_eq!(backend.calls(), 0);
}
