mod binaries;
mod images;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;
use tracing::debug;

use buildchain_lib::layout::resolve_root;
use buildchain_lib::{Config, RunOptions};

pub use binaries::cmd_binaries;
pub use images::cmd_images;

/// Flags shared by every subcommand.
pub struct ProjectArgs {
  pub root: Option<PathBuf>,
  pub debug: bool,
}

impl ProjectArgs {
  pub fn load_config(&self) -> Result<Config> {
    let root = resolve_root(self.root.as_deref()).context("Failed to resolve project root")?;
    debug!(root = %root.display(), "project root");
    let config = Config::load(&root, RunOptions { debug: self.debug })?;
    Ok(config)
  }
}

/// Single-threaded runtime; pipeline stages run one after another.
pub fn runtime() -> Result<Runtime> {
  tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("Failed to create async runtime")
}
