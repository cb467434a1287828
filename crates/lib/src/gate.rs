//! Content-hash gate for code generation.
//!
//! The gate digests the sources that feed the code generators and compares
//! the result with the digest recorded after the last successful generation.
//! Only raw file bytes are hashed, in lexicographic order of absolute path.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::util::hash::{ContentHash, HashError, hash_files};

#[derive(Debug, Error)]
pub enum GateError {
  #[error("invalid glob pattern '{pattern}': {source}")]
  Pattern {
    pattern: String,
    #[source]
    source: globset::Error,
  },

  #[error("failed to walk {root}: {message}")]
  Walk { root: PathBuf, message: String },

  #[error(transparent)]
  Hash(#[from] HashError),

  #[error("failed to access digest marker {path}: {source}")]
  Marker {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, GateError> {
  let mut builder = GlobSetBuilder::new();
  for pattern in patterns {
    let glob = Glob::new(pattern).map_err(|source| GateError::Pattern {
      pattern: pattern.clone(),
      source,
    })?;
    builder.add(glob);
  }
  builder.build().map_err(|source| GateError::Pattern {
    pattern: patterns.join(", "),
    source,
  })
}

/// Which files under `root` feed the digest.
///
/// Patterns are matched against the path relative to `root`. A file is
/// selected when it matches an include pattern and no exclude pattern.
#[derive(Debug, Clone)]
pub struct SourceSelector {
  root: PathBuf,
  include: GlobSet,
  exclude: GlobSet,
}

impl SourceSelector {
  pub fn new(root: impl Into<PathBuf>, include: &[String], exclude: &[String]) -> Result<Self, GateError> {
    Ok(Self {
      root: root.into(),
      include: build_globset(include)?,
      exclude: build_globset(exclude)?,
    })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn is_selected(&self, relative: &Path) -> bool {
    self.include.is_match(relative) && !self.exclude.is_match(relative)
  }

  /// Selected files, sorted bytewise by absolute path. Symlinks are followed.
  /// A missing root selects nothing.
  pub fn files(&self) -> Result<Vec<PathBuf>, GateError> {
    if !self.root.exists() {
      return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&self.root).follow_links(true) {
      let entry = entry.map_err(|e| GateError::Walk {
        root: self.root.clone(),
        message: e.to_string(),
      })?;
      if !entry.file_type().is_file() {
        continue;
      }
      let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
      if self.is_selected(relative) {
        files.push(entry.into_path());
      }
    }

    files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    Ok(files)
  }

  /// Digest of the selected files' contents.
  pub fn compute_digest(&self) -> Result<ContentHash, GateError> {
    let files = self.files()?;
    debug!(root = %self.root.display(), count = files.len(), "hashing generation inputs");
    Ok(hash_files(&files)?)
  }
}

/// The persisted digest of the last successful generation.
#[derive(Debug, Clone)]
pub struct DigestMarker {
  path: PathBuf,
}

impl DigestMarker {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// The recorded digest, or `None` if the marker is absent or empty.
  pub fn read(&self) -> Result<Option<String>, GateError> {
    match fs::read_to_string(&self.path) {
      Ok(content) => {
        let digest = content.trim();
        Ok((!digest.is_empty()).then(|| digest.to_ascii_lowercase()))
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(source) => Err(GateError::Marker {
        path: self.path.clone(),
        source,
      }),
    }
  }

  /// Record `digest`, atomically replacing any previous value.
  pub fn write(&self, digest: &ContentHash) -> Result<(), GateError> {
    let marker_error = |source| GateError::Marker {
      path: self.path.clone(),
      source,
    };
    let temp_path = self.path.with_extension("tmp");
    fs::write(&temp_path, format!("{digest}\n")).map_err(marker_error)?;
    fs::rename(&temp_path, &self.path).map_err(marker_error)?;
    Ok(())
  }
}

/// Outcome of a gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateStatus {
  /// Sources are unchanged since the last successful generation.
  Fresh,
  /// Regeneration is needed; commit `digest` once it succeeds.
  Stale { digest: ContentHash },
}

#[derive(Debug, Clone)]
pub struct Gate {
  selector: SourceSelector,
  marker: DigestMarker,
}

impl Gate {
  pub fn new(selector: SourceSelector, marker: DigestMarker) -> Self {
    Self { selector, marker }
  }

  pub fn check(&self) -> Result<GateStatus, GateError> {
    let digest = self.selector.compute_digest()?;
    let recorded = self.marker.read()?;

    if recorded.as_deref() == Some(digest.as_str()) {
      info!(digest = %digest, "generated code is up to date");
      return Ok(GateStatus::Fresh);
    }

    info!(
      current = %digest,
      recorded = recorded.as_deref().unwrap_or("<none>"),
      "generation inputs changed"
    );
    Ok(GateStatus::Stale { digest })
  }

  /// Record a successful generation.
  pub fn commit(&self, digest: &ContentHash) -> Result<(), GateError> {
    self.marker.write(digest)?;
    debug!(path = %self.marker.path().display(), digest = %digest, "digest marker written");
    Ok(())
  }
}
