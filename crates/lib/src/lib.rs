//! buildchain-lib: build orchestration for Kubernetes-style operator projects
//!
//! This crate provides the engine behind the `buildchain` command:
//! - `Config`: the project manifest, directory layout and run options
//! - `TaskRegistry`: memoized stages, each run at most once per invocation
//! - `Gate`: content-hash check that decides whether code generation runs
//! - `DownloadCache`: content-addressed, verified downloads
//! - `TemplateEngine`: `{{ name }}` substitution for image build contexts
//! - `Pipeline`: vendor, generate, compile, then build and export images

pub mod config;
pub mod consts;
pub mod error;
pub mod exec;
pub mod fetch;
pub mod gate;
pub mod layout;
pub mod pipeline;
pub mod stage;
pub mod task;
pub mod template;
pub mod util;

pub use config::{Config, RunOptions};
pub use error::BuildError;
pub use exec::{CommandRunner, SystemRunner};
pub use pipeline::{BinariesReport, BuiltImage, ImagesReport, Pipeline};
