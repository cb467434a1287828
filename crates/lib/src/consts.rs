pub const APP_NAME: &str = "buildchain";

/// Project manifest file name, looked up in the project root.
pub const MANIFEST_FILENAME: &str = "buildchain.toml";

/// Environment variable overriding the project root.
pub const ROOT_ENV: &str = "BUILDCHAIN_ROOT";

/// Isolated dependency workspace (handed to tools as `GOPATH`).
pub const WORKSPACE_DIR: &str = ".gopath";

/// Content-addressed download cache, one file per verified SHA-256.
pub const DOWNLOADS_DIR: &str = ".downloads";

/// Single-line hex digest of the code generation inputs at the last successful run.
pub const DIGEST_MARKER: &str = ".codegen.sha256";

/// Vendored dependency tree produced by the vendoring tool.
pub const VENDOR_DIR: &str = "vendor";

/// One build unit per subdirectory.
pub const COMMANDS_DIR: &str = "cmd";

/// One image build context per subdirectory.
pub const IMAGES_DIR: &str = "images";

/// Files with this extension are rendered and written without it.
pub const TEMPLATE_EXTENSION: &str = "in";

/// Per-image list of verified downloads to place in the build context.
pub const DOWNLOADS_DESCRIPTOR: &str = "Downloads";

/// Length of a lowercase hex SHA-256 digest.
pub const SHA256_HEX_LEN: usize = 64;
