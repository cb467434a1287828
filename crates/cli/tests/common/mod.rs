//! Shared test helpers for CLI integration tests.
//!
//! Builds a small operator project whose toolchain is replaced by shell
//! stubs. Every stub appends its command line to a log file so tests can
//! assert which steps ran.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

const GO_STUB: &str = r#"#!/bin/sh
echo "go $*" >> "$TOOL_LOG"
name=$(basename "$2")
mkdir -p "$GOBIN"
case "$1" in
  get)
    printf '#!/bin/sh\necho "%s $*" >> "$TOOL_LOG"\n' "$name" > "$GOBIN/$name"
    ;;
  install)
    printf '#!/bin/sh\necho %s\n' "$name" > "$GOBIN/$name"
    ;;
esac
chmod +x "$GOBIN/$name"
"#;

const DOCKER_STUB: &str = r#"#!/bin/sh
echo "docker $*" >> "$TOOL_LOG"
case "$1" in
  build)
    for arg; do dir="$arg"; done
    cat "$dir/app.conf" >> "$TOOL_LOG"
    ls "$dir" >> "$TOOL_LOG"
    ;;
  save)
    echo archive > "${2#--output=}"
    ;;
esac
"#;

const GZIP_STUB: &str = r#"#!/bin/sh
echo "gzip $*" >> "$TOOL_LOG"
mv "$2" "$2.gz"
"#;

const DEP_STUB: &str = r#"#!/bin/sh
echo "dep $*" >> "$TOOL_LOG"
mkdir -p vendor
"#;

const FAILING_STUB: &str = "#!/bin/sh\nexit 3\n";

/// Isolated project with stubbed tools.
pub struct TestProject {
  pub temp: TempDir,
}

impl TestProject {
  pub fn new() -> Self {
    Self::with_docker(DOCKER_STUB)
  }

  /// A project whose image builder always fails.
  pub fn with_failing_docker() -> Self {
    Self::with_docker(FAILING_STUB)
  }

  fn with_docker(docker: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let project = Self { temp };

    let tools = project.temp.path().join("tools");
    fs::create_dir_all(&tools).unwrap();
    for (name, script) in [("go", GO_STUB), ("docker", docker), ("gzip", GZIP_STUB), ("dep", DEP_STUB)] {
      let path = tools.join(name);
      fs::write(&path, script).unwrap();
      fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    let manifest = format!(
      r#"
[project]
name = "widget-operator"
version = "0.3.1"
module = "github.com/acme/widget-operator"

[codegen]
groups = ["widgets:v1alpha1"]

[tools]
dep = "{tools}/dep"
go = "{tools}/go"
docker = "{tools}/docker"
gzip = "{tools}/gzip"
"#,
      tools = tools.display()
    );

    let root = project.root();
    project.write_file("root/buildchain.toml", &manifest);
    project.write_file("root/hack/boilerplate.go.txt", "// Copyright Acme\n");
    project.write_file("root/pkg/apis/widgets/v1alpha1/types.go", "package v1alpha1\n");
    project.write_file("root/cmd/widget-controller/main.go", "package main\n");
    project.write_file("root/images/web/app.conf.in", "name={{image_name}}\n");
    project.write_file("root/images/web/Dockerfile", "FROM scratch\n");
    fs::create_dir_all(root.join("vendor")).unwrap();
    project
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
  }

  pub fn root(&self) -> PathBuf {
    self.temp.path().join("root")
  }

  pub fn log_path(&self) -> PathBuf {
    self.temp.path().join("tools.log")
  }

  /// Everything the stubs logged so far.
  pub fn log(&self) -> String {
    fs::read_to_string(self.log_path()).unwrap_or_default()
  }

  pub fn clear_log(&self) {
    let _ = fs::remove_file(self.log_path());
  }

  pub fn exists(&self, relative: impl AsRef<Path>) -> bool {
    self.root().join(relative).exists()
  }

  /// A buildchain command rooted at this project.
  pub fn cmd(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("buildchain");
    cmd.arg("--root").arg(self.root()).env("TOOL_LOG", self.log_path());
    cmd
  }
}
