//! Implementation of the `buildchain images` command.

use std::time::Instant;

use anyhow::{Context, Result};

use buildchain_lib::{Pipeline, SystemRunner};

use super::{ProjectArgs, runtime};
use crate::output::{format_duration, print_info, print_stat, print_success, symbols};

/// Build binaries and images, optionally saving and compressing each image.
///
/// `compress` implies `save`.
pub fn cmd_images(args: &ProjectArgs, save: bool, compress: bool) -> Result<()> {
  let start = Instant::now();
  let config = args.load_config()?;
  let runner = SystemRunner;

  let report = runtime()?
    .block_on(Pipeline::new(&config, &runner).build_images(save, compress))
    .context("Build failed")?;

  println!();
  if report.images.is_empty() {
    print_info("No images to build");
  } else {
    print_success("Images built");
  }
  print_stat("Binaries", &report.binaries.binaries.len().to_string());
  for image in &report.images {
    print_stat(&image.name, &image.tag);
    if let Some(archive) = &image.archive {
      print_stat(&image.name, &format!("{} {}", symbols::ARROW, archive.display()));
    }
  }
  print_stat("Duration", &format_duration(start.elapsed()));

  Ok(())
}
