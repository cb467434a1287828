//! The build pipeline.
//!
//! Stages run as memoized tasks in dependency order:
//!
//! ```text
//! resolve_paths -> vendor -> generate -> compile -> image(name) -> export
//! ```
//!
//! Asking for a stage runs every stage it depends on first, each at most once
//! per [`Pipeline`]. Any failure aborts the run and is returned unchanged.

pub mod codegen;
pub mod image;

use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::BuildError;
use crate::exec::{CommandRunner, Invocation};
use crate::fetch::DownloadCache;
use crate::layout::{Layout, subdirectory_names};
use crate::task::{TaskKey, TaskRegistry};
use crate::template::{TemplateEngine, Variables};

use self::image::ImageContext;

/// A toolchain invocation inside the isolated workspace.
///
/// Runs from the project root with `GOPATH` and `GOBIN` pointing into the
/// workspace, so nothing leaks into the user's environment.
pub(crate) fn tool(program: impl Into<String>, layout: &Layout) -> Invocation {
  Invocation::new(program)
    .cwd(&layout.root)
    .env("GOPATH", layout.workspace.to_string_lossy())
    .env("GOBIN", layout.bin.to_string_lossy())
}

/// Result of `buildchain binaries`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinariesReport {
  /// Whether the code generators ran.
  pub regenerated: bool,
  pub binaries: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltImage {
  pub name: String,
  pub tag: String,
  pub archive: Option<PathBuf>,
}

/// Result of `buildchain images`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagesReport {
  pub binaries: BinariesReport,
  pub images: Vec<BuiltImage>,
}

pub struct Pipeline<'a, R> {
  config: &'a Config,
  runner: &'a R,
  downloads: DownloadCache,
  templates: TemplateEngine,
  tasks: TaskRegistry,
  staging_parent: Option<PathBuf>,
}

impl<'a, R: CommandRunner> Pipeline<'a, R> {
  pub fn new(config: &'a Config, runner: &'a R) -> Self {
    let project = config.project();
    let global = Variables::from([
      ("project".to_string(), project.name.clone()),
      ("version".to_string(), project.version.clone()),
      ("module".to_string(), project.module.clone()),
    ]);

    Self {
      config,
      runner,
      downloads: DownloadCache::new(&config.layout.downloads),
      templates: TemplateEngine::new(global, config.manifest.images.templates.into()),
      tasks: TaskRegistry::new(),
      staging_parent: None,
    }
  }

  /// Create image staging directories under `dir` instead of the system
  /// temporary directory.
  pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.staging_parent = Some(dir.into());
    self
  }

  pub fn tasks(&self) -> &TaskRegistry {
    &self.tasks
  }

  /// Create the isolated workspace and return the project layout.
  pub async fn resolve_paths(&mut self) -> Result<Layout, BuildError> {
    let layout = &self.config.layout;
    self
      .tasks
      .get_or_try_run(TaskKey::new("resolve_paths"), || prepare_layout(layout))
      .await
  }

  /// Install vendored dependencies unless `vendor/` already exists.
  pub async fn vendor(&mut self) -> Result<(), BuildError> {
    let layout = self.resolve_paths().await?;
    let (config, runner) = (self.config, self.runner);
    self
      .tasks
      .get_or_try_run(TaskKey::new("vendor"), || install_vendor(config, runner, &layout))
      .await
  }

  /// Run the code generators if their inputs changed. Returns whether they ran.
  pub async fn generate(&mut self) -> Result<bool, BuildError> {
    self.vendor().await?;
    let (config, runner) = (self.config, self.runner);
    self
      .tasks
      .get_or_try_run(TaskKey::new("generate"), || codegen::generate(config, runner))
      .await
  }

  /// Compile every unit under `cmd/`. Returns binary paths in unit order.
  pub async fn compile(&mut self) -> Result<Vec<PathBuf>, BuildError> {
    self.generate().await?;
    let (config, runner) = (self.config, self.runner);
    self
      .tasks
      .get_or_try_run(TaskKey::new("compile"), || compile_units(config, runner))
      .await
  }

  /// Build one image. Returns its tag.
  pub async fn image(&mut self, name: &str) -> Result<String, BuildError> {
    let binaries = self.compile().await?;
    let ctx = ImageContext {
      config: self.config,
      runner: self.runner,
      downloads: &self.downloads,
      templates: &self.templates,
      staging_parent: self.staging_parent.as_deref(),
    };
    self
      .tasks
      .get_or_try_run(TaskKey::with_args("image", [name]), || image::build(ctx, name, &binaries))
      .await
  }

  /// Save a built image to `<root>/<tag>.tar`, gzipped when `compress` is set.
  pub async fn export(&mut self, tag: &str, compress: bool) -> Result<PathBuf, BuildError> {
    let (config, runner) = (self.config, self.runner);
    let key = TaskKey::with_args("export", [tag.to_string(), compress.to_string()]);
    self
      .tasks
      .get_or_try_run(key, || image::export(config, runner, tag, compress))
      .await
  }

  /// Images to build: the configured names, else every directory in `images/`.
  pub fn image_names(&self) -> Result<Vec<String>, BuildError> {
    let configured = &self.config.manifest.images.names;
    if !configured.is_empty() {
      return Ok(configured.clone());
    }
    let images = &self.config.layout.images;
    subdirectory_names(images).map_err(BuildError::io(images))
  }

  pub async fn build_binaries(&mut self) -> Result<BinariesReport, BuildError> {
    let regenerated = self.generate().await?;
    let binaries = self.compile().await?;
    Ok(BinariesReport { regenerated, binaries })
  }

  /// Build every image, saving each when `save` or `compress` is set.
  pub async fn build_images(&mut self, save: bool, compress: bool) -> Result<ImagesReport, BuildError> {
    let binaries = self.build_binaries().await?;
    let names = self.image_names()?;
    if names.is_empty() {
      warn!(path = %self.config.layout.images.display(), "no images to build");
    }

    let mut images = Vec::with_capacity(names.len());
    for name in names {
      let tag = self.image(&name).await?;
      let archive = if save || compress {
        Some(self.export(&tag, compress).await?)
      } else {
        None
      };
      images.push(BuiltImage { name, tag, archive });
    }

    Ok(ImagesReport { binaries, images })
  }
}

async fn prepare_layout(layout: &Layout) -> Result<Layout, BuildError> {
  layout.ensure_workspace().map_err(BuildError::io(&layout.workspace))?;
  info!(root = %layout.root.display(), "project paths resolved");
  Ok(layout.clone())
}

async fn install_vendor<R: CommandRunner>(config: &Config, runner: &R, layout: &Layout) -> Result<(), BuildError> {
  if layout.vendor.is_dir() {
    info!("vendor directory present, skipping dependency install");
    return Ok(());
  }

  info!("installing vendored dependencies");
  let invocation = tool(&config.tools().dep, layout).args(["ensure", "-vendor-only"]);
  runner.run(&invocation).await?;
  Ok(())
}

fn unit_package(module: &str, unit: &str) -> String {
  format!("{module}/cmd/{unit}")
}

async fn compile_units<R: CommandRunner>(config: &Config, runner: &R) -> Result<Vec<PathBuf>, BuildError> {
  let layout = &config.layout;
  let units = subdirectory_names(&layout.commands).map_err(BuildError::io(&layout.commands))?;
  if units.is_empty() {
    warn!(path = %layout.commands.display(), "no build units found");
  }

  let mut binaries = Vec::with_capacity(units.len());
  for unit in &units {
    info!(unit = %unit, "compiling");
    let install = tool(&config.tools().go, layout)
      .arg("install")
      .arg(unit_package(&config.project().module, unit));
    runner.run(&install).await?;

    let binary = layout.binary_path(unit);
    if !binary.is_file() {
      return Err(BuildError::MissingBinary {
        unit: unit.clone(),
        path: binary,
      });
    }
    binaries.push(binary);
  }

  Ok(binaries)
}
