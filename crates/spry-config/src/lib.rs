//! Configuration for the spry dev server.
//!
//! Options are layered from defaults, a `spry.toml` (or the `spry` field of
//! `package.json`), `HOST`/`PORT` and `SPRY_*` environment variables and
//! finally command-line overrides. The result is frozen into a
//! [`ConfigSnapshot`] that a running server instance owns for its lifetime.

pub mod discovery;
pub mod env;
pub mod error;
pub mod options;
pub mod snapshot;

pub use discovery::{ConfigDiscovery, CONFIG_FILE_NAME, PACKAGE_JSON_FIELD};
pub use env::{env_file_candidates, load_env_files};
pub use error::{ConfigError, Result};
pub use options::{DevOptions, Features, Mode, Overrides, ReloadOptions, WatchOptions};
pub use snapshot::{ConfigLoader, ConfigSnapshot};
