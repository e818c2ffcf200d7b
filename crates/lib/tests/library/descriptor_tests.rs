//! Descriptor loading from disk.

use std::fs;

use shelldeck_lib::descriptor::{self, DescriptorError};

use super::common::Project;

const SAMPLE: &str = r#"
description = "Rust development shell"

[inputs]
toolset = "store:./registry#r1"
utils = { url = "path:./utils" }

[[shells]]
name = "default"
platforms = ["linux", "aarch64-darwin"]
packages = [{ name = "rustup", input = "toolset" }, { name = "openssl", input = "utils" }]
env = { RUST_BACKTRACE = "1" }
hook = [
  "rustup show",
  { components = ["clippy", "rustfmt"] },
]
"#;

#[test]
fn identical_text_loads_identically() {
  let a = descriptor::load(SAMPLE).unwrap();
  let b = descriptor::load(SAMPLE).unwrap();
  assert_eq!(a, b);
}

#[test]
fn rendered_descriptor_loads_back() {
  let original = descriptor::load(SAMPLE).unwrap();
  let rendered = original.to_toml();
  assert_eq!(descriptor::load(&rendered).unwrap(), original);
}

#[test]
fn load_file_records_base_dir() {
  let project = Project::new();
  project.write_descriptor(SAMPLE);

  let file = descriptor::load_file(&project.descriptor_path()).unwrap();
  assert_eq!(file.base_dir, dunce::canonicalize(project.root()).unwrap());
  assert_eq!(file.descriptor.inputs.len(), 2);
}

#[test]
fn undeclared_input_reports_field_path() {
  let text = SAMPLE.replace("input = \"utils\"", "input = \"missing\"");
  let err = descriptor::load(&text).unwrap_err();
  match err {
    DescriptorError::Validation { path, .. } => assert_eq!(path, "shells[0].packages[1]"),
    other => panic!("unexpected error: {other}"),
  }
}

#[test]
fn malformed_file_reports_location() {
  let project = Project::new();
  fs::write(project.descriptor_path(), "[inputs]\ntoolset = \n").unwrap();

  let err = descriptor::load_file(&project.descriptor_path()).unwrap_err();
  assert!(err.location().is_some(), "{err}");
}
