//! External tool invocation.
//!
//! Every toolchain step (vendoring, code generators, compiler, image builder,
//! exporter, compressor) is described as an [`Invocation`] and handed to a
//! [`CommandRunner`]. [`SystemRunner`] spawns real child processes; tests
//! substitute a recording runner.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ExecError {
  /// The program could not be started at all.
  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// The program ran and exited unsuccessfully.
  #[error("command failed with {}: {command}", describe_exit(.code))]
  Failed { command: String, code: Option<i32> },
}

fn describe_exit(code: &Option<i32>) -> String {
  match code {
    Some(code) => format!("exit code {code}"),
    None => "no exit code (terminated by signal)".to_string(),
  }
}

/// One external program run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub program: String,
  pub args: Vec<String>,
  pub cwd: Option<PathBuf>,
  pub env: BTreeMap<String, String>,
}

impl Invocation {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: None,
      env: BTreeMap::new(),
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cwd = Some(dir.into());
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  /// Program name without any directory, for matching in logs and tests.
  pub fn program_name(&self) -> &str {
    self
      .program
      .rsplit(['/', '\\'])
      .next()
      .unwrap_or(&self.program)
  }
}

impl fmt::Display for Invocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.program)?;
    for arg in &self.args {
      if arg.is_empty() || arg.contains(char::is_whitespace) {
        write!(f, " '{arg}'")?;
      } else {
        write!(f, " {arg}")?;
      }
    }
    Ok(())
  }
}

/// Runs external programs to completion.
pub trait CommandRunner {
  /// Run `invocation` and wait for it. A non-zero exit is an error.
  fn run(&self, invocation: &Invocation) -> impl Future<Output = Result<(), ExecError>>;
}

/// Spawns child processes with the parent's stdio.
///
/// Tool output goes straight to the terminal; the environment is inherited
/// and extended with the invocation's variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
  async fn run(&self, invocation: &Invocation) -> Result<(), ExecError> {
    info!(command = %invocation, "running");

    let mut command = Command::new(&invocation.program);
    command.args(&invocation.args).envs(&invocation.env);
    if let Some(cwd) = &invocation.cwd {
      command.current_dir(cwd);
    }

    debug!(cwd = ?invocation.cwd, env = ?invocation.env, "spawning process");

    let status = command.status().await.map_err(|source| ExecError::Spawn {
      program: invocation.program.clone(),
      source,
    })?;

    if !status.success() {
      return Err(ExecError::Failed {
        command: invocation.to_string(),
        code: status.code(),
      });
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::shell_cmd;
  use tempfile::TempDir;

  fn shell(script: &str) -> Invocation {
    let (program, args) = shell_cmd(script);
    Invocation::new(program).args(args)
  }

  #[test]
  fn display_quotes_arguments_with_spaces() {
    let inv = Invocation::new("docker").args(["build", "--tag=acme/web:1.0", "/tmp/stage dir"]);
    assert_eq!(inv.to_string(), "docker build --tag=acme/web:1.0 '/tmp/stage dir'");
  }

  #[test]
  fn program_name_strips_directories() {
    assert_eq!(Invocation::new("/usr/local/bin/go").program_name(), "go");
    assert_eq!(Invocation::new("gzip").program_name(), "gzip");
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn system_runner_success() {
    SystemRunner.run(&shell("exit 0")).await.unwrap();
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn system_runner_reports_exit_code() {
    let err = SystemRunner.run(&shell("exit 3")).await.unwrap_err();
    assert!(matches!(err, ExecError::Failed { code: Some(3), .. }));
  }

  #[tokio::test]
  async fn system_runner_missing_program() {
    let err = SystemRunner
      .run(&Invocation::new("buildchain-no-such-program-xyz"))
      .await
      .unwrap_err();
    assert!(matches!(err, ExecError::Spawn { .. }));
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn system_runner_sets_cwd_and_env() {
    let temp = TempDir::new().unwrap();
    let inv = shell("printf '%s' \"$MARKER\" > marker").cwd(temp.path()).env("MARKER", "here");

    SystemRunner.run(&inv).await.unwrap();

    assert_eq!(std::fs::read_to_string(temp.path().join("marker")).unwrap(), "here");
  }
}
