//! Image build context staging.
//!
//! Helpers that assemble a staging directory from an image source tree:
//! template rendering during the copy, the `Downloads` descriptor, and the
//! compiled binaries.

use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::consts::TEMPLATE_EXTENSION;
use crate::template::{TemplateEngine, TemplateError, Variables};

#[derive(Debug, Error)]
pub enum StageError {
  #[error("{path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to walk {root}: {message}")]
  Walk { root: PathBuf, message: String },

  #[error("failed to render template {path}: {source}")]
  Template {
    path: PathBuf,
    #[source]
    source: TemplateError,
  },

  #[error("invalid Downloads entry on line {line}: {message}")]
  Descriptor { line: usize, message: String },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StageError + '_ {
  move |source| StageError::Io {
    path: path.to_path_buf(),
    source,
  }
}

/// The destination name for a source file: templates lose their `.in`.
///
/// Returns the name and whether the file is a template. Names that are not
/// valid UTF-8 pass through untouched.
fn staged_name(file_name: &OsStr) -> (&OsStr, bool) {
  let path = Path::new(file_name);
  match (path.extension(), path.file_stem()) {
    (Some(ext), Some(stem)) if ext == TEMPLATE_EXTENSION => (stem, true),
    _ => (file_name, false),
  }
}

/// Recursively copy `src` into `dest`, rendering template files.
///
/// Files whose name ends in `.in` are rendered through `engine` with `local`
/// and written without the suffix. Permissions of every file are preserved.
/// Returns the staged file paths in walk order.
pub fn copy_tree(src: &Path, dest: &Path, engine: &TemplateEngine, local: &Variables) -> Result<Vec<PathBuf>, StageError> {
  let mut staged = Vec::new();

  for entry in WalkDir::new(src).sort_by_file_name() {
    let entry = entry.map_err(|e| StageError::Walk {
      root: src.to_path_buf(),
      message: e.to_string(),
    })?;
    let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());

    if entry.file_type().is_dir() {
      let target = dest.join(relative);
      fs::create_dir_all(&target).map_err(io_error(&target))?;
      continue;
    }

    let (name, is_template) = staged_name(entry.file_name());
    let target = dest.join(relative).with_file_name(name);

    if is_template {
      render_file(entry.path(), &target, engine, local)?;
      debug!(src = %entry.path().display(), dest = %target.display(), "rendered template");
    } else {
      fs::copy(entry.path(), &target).map_err(io_error(entry.path()))?;
    }
    staged.push(target);
  }

  Ok(staged)
}

fn render_file(src: &Path, dest: &Path, engine: &TemplateEngine, local: &Variables) -> Result<(), StageError> {
  let text = fs::read_to_string(src).map_err(io_error(src))?;
  let rendered = engine.render(&text, local).map_err(|source| StageError::Template {
    path: src.to_path_buf(),
    source,
  })?;
  fs::write(dest, rendered).map_err(io_error(dest))?;

  let permissions = fs::metadata(src).map_err(io_error(src))?.permissions();
  fs::set_permissions(dest, permissions).map_err(io_error(dest))?;
  Ok(())
}

/// One line of a `Downloads` descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadEntry {
  pub sha256: String,
  pub url: String,
  /// Destination relative to the staging root.
  pub target: PathBuf,
}

/// Parse a `Downloads` descriptor.
///
/// Each entry is `<sha256> <url> <relative-path>` separated by whitespace.
/// `#` comments and lines that do not have exactly three fields are ignored.
/// A target that is
/// absolute or climbs out of the staging root is an error.
pub fn parse_downloads(content: &str) -> Result<Vec<DownloadEntry>, StageError> {
  let mut entries = Vec::new();

  for (idx, line) in content.lines().enumerate() {
    if line.trim_start().starts_with('#') {
      continue;
    }
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [sha256, url, target] = fields[..] else {
      continue;
    };

    let target = PathBuf::from(target);
    let escapes = target
      .components()
      .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
      return Err(StageError::Descriptor {
        line: idx + 1,
        message: format!("output path '{}' must stay inside the build context", target.display()),
      });
    }

    entries.push(DownloadEntry {
      sha256: sha256.to_string(),
      url: url.to_string(),
      target,
    });
  }

  Ok(entries)
}

/// Copy a file into the staging tree, creating parent directories.
pub fn place_file(src: &Path, dest: &Path) -> Result<(), StageError> {
  if let Some(parent) = dest.parent() {
    fs::create_dir_all(parent).map_err(io_error(parent))?;
  }
  fs::copy(src, dest).map_err(io_error(src))?;
  Ok(())
}

/// Copy compiled binaries into the root of `dest`, keeping their names.
pub fn copy_binaries(binaries: &[PathBuf], dest: &Path) -> Result<(), StageError> {
  for binary in binaries {
    let Some(name) = binary.file_name() else {
      continue;
    };
    fs::copy(binary, dest.join(name)).map_err(io_error(binary))?;
  }
  Ok(())
}
