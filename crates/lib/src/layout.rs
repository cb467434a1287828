//! Project directory layout.
//!
//! Every path the pipeline reads or writes is derived from the project root
//! here, once, and handed around inside [`Layout`]. Directories are only
//! created when [`Layout::ensure_workspace`] is called.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::consts::{
  COMMANDS_DIR, DIGEST_MARKER, DOWNLOADS_DIR, IMAGES_DIR, ROOT_ENV, VENDOR_DIR, WORKSPACE_DIR,
};

/// Resolve the project root.
///
/// Precedence: explicit path (from `--root`), then `BUILDCHAIN_ROOT`, then the
/// current directory. The result is canonicalized without UNC prefixes.
pub fn resolve_root(explicit: Option<&Path>) -> io::Result<PathBuf> {
  let root = match explicit {
    Some(path) => path.to_path_buf(),
    None => match std::env::var(ROOT_ENV) {
      Ok(value) if !value.is_empty() => PathBuf::from(value),
      _ => std::env::current_dir()?,
    },
  };
  dunce::canonicalize(&root)
}

/// Fixed set of working paths for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
  pub root: PathBuf,
  pub workspace: PathBuf,
  pub bin: PathBuf,
  pub pkg: PathBuf,
  pub src: PathBuf,
  pub downloads: PathBuf,
  pub digest_marker: PathBuf,
  pub vendor: PathBuf,
  pub commands: PathBuf,
  pub images: PathBuf,
}

impl Layout {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    let root = root.into();
    let workspace = root.join(WORKSPACE_DIR);
    Self {
      bin: workspace.join("bin"),
      pkg: workspace.join("pkg"),
      src: workspace.join("src"),
      workspace,
      downloads: root.join(DOWNLOADS_DIR),
      digest_marker: root.join(DIGEST_MARKER),
      vendor: root.join(VENDOR_DIR),
      commands: root.join(COMMANDS_DIR),
      images: root.join(IMAGES_DIR),
      root,
    }
  }

  /// Create the isolated dependency workspace (`bin/`, `pkg/`, `src/`).
  pub fn ensure_workspace(&self) -> io::Result<()> {
    for dir in [&self.bin, &self.pkg, &self.src] {
      if !dir.is_dir() {
        debug!(path = %dir.display(), "creating workspace directory");
        fs::create_dir_all(dir)?;
      }
    }
    Ok(())
  }

  /// Source tree of one image's build context.
  pub fn image_dir(&self, name: &str) -> PathBuf {
    self.images.join(name)
  }

  /// Where the compiler places the binary for a build unit.
  pub fn binary_path(&self, unit: &str) -> PathBuf {
    self.bin.join(format!("{unit}{}", std::env::consts::EXE_SUFFIX))
  }
}

/// Sorted names of the immediate subdirectories of `dir`.
///
/// A missing directory yields an empty list.
pub fn subdirectory_names(dir: &Path) -> io::Result<Vec<String>> {
  if !dir.is_dir() {
    return Ok(Vec::new());
  }

  let mut names = Vec::new();
  for entry in fs::read_dir(dir)? {
    let entry = entry?;
    if entry.file_type()?.is_dir() {
      names.push(entry.file_name().to_string_lossy().to_string());
    }
  }
  names.sort();
  Ok(names)
}
