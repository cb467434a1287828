//! Implementation of the `buildchain binaries` command.

use std::time::Instant;

use anyhow::{Context, Result};

use buildchain_lib::{Pipeline, SystemRunner};

use super::{ProjectArgs, runtime};
use crate::output::{format_duration, print_stat, print_success};

/// Vendor, generate and compile, then print what was built.
pub fn cmd_binaries(args: &ProjectArgs) -> Result<()> {
  let start = Instant::now();
  let config = args.load_config()?;
  let runner = SystemRunner;

  let report = runtime()?
    .block_on(Pipeline::new(&config, &runner).build_binaries())
    .context("Build failed")?;

  println!();
  print_success("Binaries built");
  print_stat(
    "Code generation",
    if report.regenerated { "regenerated" } else { "up to date" },
  );
  for binary in &report.binaries {
    print_stat("Binary", &binary.display().to_string());
  }
  print_stat("Duration", &format_duration(start.elapsed()));

  Ok(())
}
