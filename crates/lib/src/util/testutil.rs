//! Test utilities for buildchain-lib.
//!
//! Shell helpers for tests that spawn real processes, a recording
//! [`CommandRunner`] that stands in for the toolchain, and a fixture project.

use std::cell::RefCell;
use std::fs;
use std::path::Path;

use crate::config::{Config, Manifest, RunOptions};
use crate::exec::{CommandRunner, ExecError, Invocation};
use crate::layout::Layout;

/// Returns the shell command and args to execute a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), script.to_string()])
}

type SideEffect = Box<dyn Fn(&Invocation) -> std::io::Result<()>>;

/// Records every invocation instead of running it.
///
/// Side effects emulate what the real tool would leave on disk (for example a
/// compiled binary); `fail_on` makes invocations of one program fail.
#[derive(Default)]
pub struct RecordingRunner {
  calls: RefCell<Vec<Invocation>>,
  side_effect: Option<SideEffect>,
  fail_on: Option<String>,
}

impl RecordingRunner {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_side_effect(mut self, f: impl Fn(&Invocation) -> std::io::Result<()> + 'static) -> Self {
    self.side_effect = Some(Box::new(f));
    self
  }

  pub fn failing_on(mut self, program: &str) -> Self {
    self.fail_on = Some(program.to_string());
    self
  }

  pub fn calls(&self) -> Vec<Invocation> {
    self.calls.borrow().clone()
  }

  /// Calls whose program name (without directories) is `program`.
  pub fn calls_to(&self, program: &str) -> Vec<Invocation> {
    self
      .calls
      .borrow()
      .iter()
      .filter(|inv| inv.program_name() == program)
      .cloned()
      .collect()
  }

  pub fn clear(&self) {
    self.calls.borrow_mut().clear();
  }
}

impl CommandRunner for RecordingRunner {
  async fn run(&self, invocation: &Invocation) -> Result<(), ExecError> {
    self.calls.borrow_mut().push(invocation.clone());

    if self.fail_on.as_deref() == Some(invocation.program_name()) {
      return Err(ExecError::Failed {
        command: invocation.to_string(),
        code: Some(1),
      });
    }

    if let Some(effect) = &self.side_effect {
      effect(invocation).map_err(|source| ExecError::Spawn {
        program: invocation.program.clone(),
        source,
      })?;
    }

    Ok(())
  }
}

/// Side effect that emulates `go install <module>/cmd/<unit>` by writing an
/// executable stub to `$GOBIN/<unit>`.
pub fn fake_go_install(invocation: &Invocation) -> std::io::Result<()> {
  if invocation.args.first().map(String::as_str) != Some("install") {
    return Ok(());
  }
  let (Some(pkg), Some(gobin)) = (invocation.args.get(1), invocation.env.get("GOBIN")) else {
    return Ok(());
  };
  let unit = pkg.rsplit('/').next().unwrap_or(pkg);
  let path = Path::new(gobin).join(unit);
  fs::create_dir_all(gobin)?;
  fs::write(&path, format!("#!/bin/sh\necho {unit}\n"))?;
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
  }
  Ok(())
}

pub const FIXTURE_MANIFEST: &str = r#"
[project]
name = "widget-operator"
version = "0.3.1"
module = "github.com/acme/widget-operator"

[codegen]
groups = ["widgets:v1alpha1"]
"#;

/// Lay out a small operator project under `root` and return its config.
pub fn fixture_project(root: &Path) -> Config {
  let write = |rel: &str, content: &str| {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
  };

  write("buildchain.toml", FIXTURE_MANIFEST);
  write("hack/boilerplate.go.txt", "// Copyright Acme\n");
  write("pkg/apis/widgets/v1alpha1/types.go", "package v1alpha1\n\ntype Widget struct{}\n");
  write("pkg/apis/widgets/v1alpha1/doc.go", "// +k8s:deepcopy-gen=package\npackage v1alpha1\n");
  write("cmd/widget-controller/main.go", "package main\n");
  write("cmd/widget-webhook/main.go", "package main\n");
  write("images/web/app.conf.in", "name={{image_name}}\n");
  write("images/web/static/index.html", "<h1>hi</h1>\n");
  fs::create_dir_all(root.join("vendor")).unwrap();

  let manifest = Manifest::load(root).unwrap();
  Config::new(manifest, Layout::new(root), RunOptions::default())
}
