//! Project manifest (`buildchain.toml`) and the resolved run configuration.
//!
//! The manifest is read once at startup. Everything later stages need
//! (project identity, layout, tool names, run flags) travels in [`Config`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::consts::MANIFEST_FILENAME;
use crate::layout::Layout;
use crate::template::MissingVariable;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("project manifest not found: {0}")]
  NotFound(PathBuf),

  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid manifest {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: Box<toml::de::Error>,
  },

  #[error("invalid manifest: {0}")]
  Invalid(String),
}

/// On-disk shape of `buildchain.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
  pub project: ProjectSection,
  #[serde(default)]
  pub codegen: CodegenSection,
  #[serde(default)]
  pub images: ImagesSection,
  #[serde(default)]
  pub tools: ToolsSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
  pub name: String,
  pub version: String,
  /// Import path of the project, passed to tools instead of aliasing the
  /// checkout into the workspace `src/` tree.
  pub module: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodegenSection {
  /// API package directory, relative to the project root.
  pub apis: String,
  /// `group:version` pairs to generate for.
  pub groups: Vec<String>,
  /// License header file, relative to the project root.
  pub header: String,
  /// Root of the files feeding the digest gate, relative to the project root.
  pub watch_root: String,
  pub include: Vec<String>,
  pub exclude: Vec<String>,
}

impl Default for CodegenSection {
  fn default() -> Self {
    Self {
      apis: "pkg/apis".to_string(),
      groups: Vec::new(),
      header: "hack/boilerplate.go.txt".to_string(),
      watch_root: "pkg".to_string(),
      include: vec!["**/*.go".to_string()],
      exclude: vec!["**/zz_generated*.go".to_string(), "client/**".to_string()],
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateMode {
  #[default]
  Strict,
  Lenient,
}

impl From<TemplateMode> for MissingVariable {
  fn from(mode: TemplateMode) -> Self {
    match mode {
      TemplateMode::Strict => MissingVariable::Error,
      TemplateMode::Lenient => MissingVariable::Empty,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesSection {
  /// Images to build; empty means every subdirectory of `images/`.
  pub names: Vec<String>,
  pub templates: TemplateMode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsSection {
  pub dep: String,
  pub go: String,
  pub docker: String,
  pub gzip: String,
}

impl Default for ToolsSection {
  fn default() -> Self {
    Self {
      dep: "dep".to_string(),
      go: "go".to_string(),
      docker: "docker".to_string(),
      gzip: "gzip".to_string(),
    }
  }
}

/// An API group and version to run the code generators for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiGroup {
  pub group: String,
  pub version: String,
}

impl Manifest {
  pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
    let manifest: Manifest = toml::from_str(content).map_err(|e| ConfigError::Parse {
      path: path.to_path_buf(),
      source: Box::new(e),
    })?;
    manifest.validate()?;
    Ok(manifest)
  }

  pub fn load(root: &Path) -> Result<Self, ConfigError> {
    let path = root.join(MANIFEST_FILENAME);
    if !path.is_file() {
      return Err(ConfigError::NotFound(path));
    }
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
      path: path.clone(),
      source,
    })?;
    Self::from_toml(&content, &path)
  }

  fn validate(&self) -> Result<(), ConfigError> {
    for (field, value) in [
      ("project.name", &self.project.name),
      ("project.version", &self.project.version),
      ("project.module", &self.project.module),
    ] {
      if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must not be empty")));
      }
    }
    self.api_groups()?;
    Ok(())
  }

  pub fn api_groups(&self) -> Result<Vec<ApiGroup>, ConfigError> {
    self
      .codegen
      .groups
      .iter()
      .map(|entry| match entry.split_once(':') {
        Some((group, version)) if !group.is_empty() && !version.is_empty() => Ok(ApiGroup {
          group: group.to_string(),
          version: version.to_string(),
        }),
        _ => Err(ConfigError::Invalid(format!(
          "codegen group '{entry}' must look like 'group:version'"
        ))),
      })
      .collect()
  }
}

/// Run options set from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
  /// Raise the verbosity of the external code generators.
  pub debug: bool,
}

/// Everything a pipeline run needs, computed once.
#[derive(Debug, Clone)]
pub struct Config {
  pub manifest: Manifest,
  pub layout: Layout,
  pub options: RunOptions,
}

impl Config {
  pub fn load(root: &Path, options: RunOptions) -> Result<Self, ConfigError> {
    let manifest = Manifest::load(root)?;
    Ok(Self::new(manifest, Layout::new(root), options))
  }

  pub fn new(manifest: Manifest, layout: Layout, options: RunOptions) -> Self {
    Self {
      manifest,
      layout,
      options,
    }
  }

  pub fn project(&self) -> &ProjectSection {
    &self.manifest.project
  }

  pub fn tools(&self) -> &ToolsSection {
    &self.manifest.tools
  }

  /// Resolve a manifest-relative path against the project root.
  pub fn project_path(&self, relative: &str) -> PathBuf {
    self.layout.root.join(relative)
  }
}
