//! Errors surfaced by a pipeline run.
//!
//! Every stage failure propagates unchanged to the caller; nothing is retried
//! or recovered locally.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::exec::ExecError;
use crate::fetch::FetchError;
use crate::gate::GateError;
use crate::stage::StageError;

#[derive(Debug, Error)]
pub enum BuildError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  /// An external tool failed or could not be started.
  #[error(transparent)]
  Exec(#[from] ExecError),

  /// A download failed or did not match its digest.
  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error(transparent)]
  Gate(#[from] GateError),

  #[error(transparent)]
  Stage(#[from] StageError),

  #[error("{path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("image '{name}' has no source directory at {path}")]
  ImageNotFound { name: String, path: PathBuf },

  #[error("compiling '{unit}' did not produce {path}")]
  MissingBinary { unit: String, path: PathBuf },
}

impl BuildError {
  pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> BuildError {
    let path = path.into();
    move |source| BuildError::Io { path, source }
  }
}
