//! Container image staging, build and export.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{Config, ProjectSection};
use crate::consts::{APP_NAME, DOWNLOADS_DESCRIPTOR};
use crate::error::BuildError;
use crate::exec::{CommandRunner, Invocation};
use crate::fetch::DownloadCache;
use crate::stage::{copy_binaries, copy_tree, parse_downloads, place_file};
use crate::template::{TemplateEngine, Variables};

/// `<project>/<image>:<version>`
pub fn image_tag(project: &ProjectSection, name: &str) -> String {
  format!("{}/{name}:{}", project.name, project.version)
}

/// File name of the saved archive for `tag`.
pub fn archive_name(tag: &str) -> String {
  format!("{}.tar", tag.replace(['/', ':'], "_"))
}

/// Borrowed pipeline state an image build needs.
pub(crate) struct ImageContext<'p, R> {
  pub config: &'p Config,
  pub runner: &'p R,
  pub downloads: &'p DownloadCache,
  pub templates: &'p TemplateEngine,
  pub staging_parent: Option<&'p Path>,
}

/// Stage the build context for `name` and build it. Returns the image tag.
///
/// The staging directory is removed whether or not the build succeeds.
pub(crate) async fn build<R: CommandRunner>(
  ctx: ImageContext<'_, R>,
  name: &str,
  binaries: &[PathBuf],
) -> Result<String, BuildError> {
  let source = ctx.config.layout.image_dir(name);
  if !source.is_dir() {
    return Err(BuildError::ImageNotFound {
      name: name.to_string(),
      path: source,
    });
  }

  let tag = image_tag(ctx.config.project(), name);
  info!(image = name, tag = %tag, "building image");

  let prefix = format!("{APP_NAME}-{name}-");
  let mut builder = tempfile::Builder::new();
  builder.prefix(&prefix);
  let staging = match ctx.staging_parent {
    Some(parent) => builder.tempdir_in(parent),
    None => builder.tempdir(),
  }
  .map_err(BuildError::io(ctx.staging_parent.map_or_else(std::env::temp_dir, Path::to_path_buf)))?;

  let staging_path = staging.path().to_path_buf();
  let built = stage_and_build(&ctx, name, &tag, &source, &staging_path, binaries).await;
  let cleanup = staging.close().map_err(BuildError::io(&staging_path));
  debug!(path = %staging_path.display(), "staging directory removed");

  built.and(cleanup)?;
  Ok(tag)
}

async fn stage_and_build<R: CommandRunner>(
  ctx: &ImageContext<'_, R>,
  name: &str,
  tag: &str,
  source: &Path,
  staging: &Path,
  binaries: &[PathBuf],
) -> Result<(), BuildError> {
  let local = Variables::from([
    ("image_name".to_string(), name.to_string()),
    ("image_tag".to_string(), tag.to_string()),
  ]);
  let staged = copy_tree(source, staging, ctx.templates, &local)?;
  debug!(image = name, files = staged.len(), "image sources staged");

  let descriptor = staging.join(DOWNLOADS_DESCRIPTOR);
  if descriptor.is_file() {
    let content = fs::read_to_string(&descriptor).map_err(BuildError::io(&descriptor))?;
    for entry in parse_downloads(&content)? {
      let cached = ctx.downloads.fetch(&entry.url, &entry.sha256).await?;
      place_file(&cached, &staging.join(&entry.target))?;
      debug!(url = %entry.url, target = %entry.target.display(), "download staged");
    }
  }

  copy_binaries(binaries, staging)?;

  let build = Invocation::new(&ctx.config.tools().docker)
    .arg("build")
    .arg(format!("--tag={tag}"))
    .arg(staging.to_string_lossy())
    .cwd(&ctx.config.layout.root);
  ctx.runner.run(&build).await?;
  Ok(())
}

/// Save `tag` to an archive in the project root, optionally gzipped.
pub(crate) async fn export<R: CommandRunner>(
  config: &Config,
  runner: &R,
  tag: &str,
  compress: bool,
) -> Result<PathBuf, BuildError> {
  let root = &config.layout.root;
  let archive = root.join(archive_name(tag));

  let save = Invocation::new(&config.tools().docker)
    .arg("save")
    .arg(format!("--output={}", archive.display()))
    .arg(tag)
    .cwd(root);
  runner.run(&save).await?;

  if !compress {
    info!(tag, archive = %archive.display(), "image saved");
    return Ok(archive);
  }

  let gzip = Invocation::new(&config.tools().gzip)
    .arg("--force")
    .arg(archive.to_string_lossy())
    .cwd(root);
  runner.run(&gzip).await?;

  let mut compressed = archive.into_os_string();
  compressed.push(".gz");
  let compressed = PathBuf::from(compressed);
  info!(tag, archive = %compressed.display(), "image saved");
  Ok(compressed)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tag_combines_project_image_and_version() {
    let project = ProjectSection {
      name: "widget-operator".to_string(),
      version: "0.3.1".to_string(),
      module: "github.com/acme/widget-operator".to_string(),
    };
    assert_eq!(image_tag(&project, "web"), "widget-operator/web:0.3.1");
  }

  #[test]
  fn archive_name_is_filesystem_safe() {
    assert_eq!(archive_name("widget-operator/web:0.3.1"), "widget-operator_web_0.3.1.tar");
    assert_eq!(archive_name("plain"), "plain.tar");
  }
}
