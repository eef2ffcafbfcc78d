use std::path::PathBuf;

use clap::{Args, Subcommand};
use spry_config::{ConfigLoader, Mode, Overrides};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the dev server
    ///
    /// Serves the project root, rebuilding resources on demand and pushing
    /// updates to connected browsers. Editing the config file or an env file
    /// restarts the server on the same port.
    Start(StartArgs),
}

/// Arguments for `spry start`
#[derive(Args, Debug, Clone, Default)]
pub struct StartArgs {
    /// Host to bind
    ///
    /// Overrides `host` in spry.toml and the HOST/SPRY_HOST variables.
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Port to bind (0 picks a free port)
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Working directory used for config discovery and env files
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Directory served as `/`, relative to the working directory
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Explicit config file instead of discovery
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl StartArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            root: self.root.clone(),
            host: self.host.clone(),
            port: self.port,
            mode: Some(Mode::Start),
        }
    }

    /// Loader for the snapshots of this invocation.
    pub fn loader(&self) -> ConfigLoader {
        let cwd = self.cwd.clone().unwrap_or_else(|| PathBuf::from("."));
        ConfigLoader::new(cwd)
            .with_config_path(self.config.clone())
            .with_overrides(self.overrides())
    }
}
