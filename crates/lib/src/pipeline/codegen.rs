//! Code generator invocations.
//!
//! The four Kubernetes-style generators run in a fixed order. Each receives
//! the project's module path explicitly, writes under the project root
//! (`--output-base` plus `--trim-path-prefix`), and shares one license header.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::config::{ApiGroup, Config};
use crate::error::BuildError;
use crate::exec::{CommandRunner, Invocation};
use crate::gate::{DigestMarker, Gate, GateError, GateStatus, SourceSelector};
use crate::layout::Layout;
use crate::pipeline::tool;

const GENERATOR_MODULE: &str = "k8s.io/code-generator/cmd";
const DEBUG_VERBOSITY: [&str; 2] = ["-v", "4"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generator {
  DeepCopy,
  Client,
  Lister,
  Informer,
}

/// Execution order.
pub const GENERATORS: [Generator; 4] = [Generator::DeepCopy, Generator::Client, Generator::Lister, Generator::Informer];

impl Generator {
  pub fn binary(self) -> &'static str {
    match self {
      Generator::DeepCopy => "deepcopy-gen",
      Generator::Client => "client-gen",
      Generator::Lister => "lister-gen",
      Generator::Informer => "informer-gen",
    }
  }

  /// Import path handed to the source-fetch tool.
  pub fn package(self) -> String {
    format!("{GENERATOR_MODULE}/{}", self.binary())
  }
}

/// Inputs shared by all generator invocations.
#[derive(Debug, Clone)]
pub struct CodegenContext {
  pub module: String,
  pub layout: Layout,
  pub header: PathBuf,
  pub apis_package: String,
  pub groups: Vec<ApiGroup>,
  pub debug: bool,
}

impl CodegenContext {
  pub fn from_config(config: &Config, groups: Vec<ApiGroup>) -> Self {
    let module = config.project().module.clone();
    let apis = config.manifest.codegen.apis.trim_matches('/');
    Self {
      apis_package: format!("{module}/{apis}"),
      module,
      layout: config.layout.clone(),
      header: config.project_path(&config.manifest.codegen.header),
      groups,
      debug: config.options.debug,
    }
  }

  fn input_dirs(&self) -> String {
    self
      .groups
      .iter()
      .map(|g| format!("{}/{}/{}", self.apis_package, g.group, g.version))
      .collect::<Vec<_>>()
      .join(",")
  }

  fn client_package(&self, leaf: &str) -> String {
    format!("{}/pkg/client/{leaf}", self.module)
  }

  fn common_args(&self) -> Vec<String> {
    let mut args = vec![
      format!("--go-header-file={}", self.header.display()),
      format!("--output-base={}", self.layout.root.display()),
      format!("--trim-path-prefix={}", self.module),
    ];
    if self.debug {
      args.extend(DEBUG_VERBOSITY.map(String::from));
    }
    args
  }

  pub fn invocation(&self, generator: Generator) -> Invocation {
    let specific = match generator {
      Generator::DeepCopy => vec![
        format!("--input-dirs={}", self.input_dirs()),
        format!("--bounding-dirs={}", self.apis_package),
        "--output-file-base=zz_generated.deepcopy".to_string(),
      ],
      Generator::Client => vec![
        "--clientset-name=versioned".to_string(),
        format!("--input-base={}", self.apis_package),
        format!(
          "--input={}",
          self
            .groups
            .iter()
            .map(|g| format!("{}/{}", g.group, g.version))
            .collect::<Vec<_>>()
            .join(",")
        ),
        format!("--output-package={}", self.client_package("clientset")),
      ],
      Generator::Lister => vec![
        format!("--input-dirs={}", self.input_dirs()),
        format!("--output-package={}", self.client_package("listers")),
      ],
      Generator::Informer => vec![
        format!("--input-dirs={}", self.input_dirs()),
        format!(
          "--versioned-clientset-package={}/versioned",
          self.client_package("clientset")
        ),
        format!("--listers-package={}", self.client_package("listers")),
        format!("--output-package={}", self.client_package("informers")),
      ],
    };

    let program = self.layout.bin.join(generator.binary());
    tool(program.to_string_lossy(), &self.layout)
      .args(specific)
      .args(self.common_args())
  }
}

/// The gate guarding code generation for this project.
pub fn codegen_gate(config: &Config) -> Result<Gate, GateError> {
  let codegen = &config.manifest.codegen;
  let selector = SourceSelector::new(
    config.project_path(&codegen.watch_root),
    &codegen.include,
    &codegen.exclude,
  )?;
  Ok(Gate::new(selector, DigestMarker::new(&config.layout.digest_marker)))
}

/// Whether a generator binary is already installed in the workspace.
pub fn is_installed(layout: &Layout, generator: Generator) -> bool {
  layout.binary_path(generator.binary()).is_file()
}

/// Regenerate client code if the gate reports stale sources.
///
/// Returns whether the generators ran. The digest is committed only after
/// all four generators succeed, so a failed run is retried next time.
pub(crate) async fn generate<R: CommandRunner>(config: &Config, runner: &R) -> Result<bool, BuildError> {
  let gate = codegen_gate(config)?;
  let GateStatus::Stale { digest } = gate.check()? else {
    return Ok(false);
  };

  let groups = config.manifest.api_groups()?;
  if groups.is_empty() {
    warn!("no API groups configured, skipping code generation");
    return Ok(false);
  }

  let ctx = CodegenContext::from_config(config, groups);
  for generator in GENERATORS {
    if is_installed(&ctx.layout, generator) {
      debug!(generator = generator.binary(), "generator already installed");
      continue;
    }
    let install = tool(&config.tools().go, &ctx.layout).arg("get").arg(generator.package());
    runner.run(&install).await?;
  }

  for generator in GENERATORS {
    info!(generator = generator.binary(), "generating");
    runner.run(&ctx.invocation(generator)).await?;
  }

  gate.commit(&digest)?;
  Ok(true)
}
