//! Frozen configuration snapshots.
//!
//! A [`ConfigSnapshot`] is built fresh from every source on each boot. A
//! running server holds it behind an `Arc` and never mutates it; a restart
//! replaces it with a newly loaded one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Serialized};
use path_clean::PathClean;

use crate::discovery::ConfigDiscovery;
use crate::env::{env_file_candidates, load_env_files};
use crate::error::{ConfigError, Result};
use crate::options::{DevOptions, Features, Mode, Overrides, ReloadOptions, WatchOptions};

/// Effective, normalized options for one server instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSnapshot {
    pub cwd: PathBuf,
    /// Absolute directory served as `/`
    pub root: PathBuf,
    pub host: String,
    pub port: u16,
    pub mode: Mode,
    pub alias: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
    pub features: Features,
    pub entries: Vec<String>,
    pub reload: ReloadOptions,
    pub watch: WatchOptions,
    /// Config file the options were read from, if any
    pub config_file: Option<PathBuf>,
    /// Files whose change requires a restart (config and env files)
    pub watch_files: Vec<PathBuf>,
}

impl ConfigSnapshot {
    /// Snapshot with default options serving `root` directly.
    ///
    /// Performs no discovery or I/O. Useful for embedding and tests.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let options = DevOptions::default();
        Self {
            cwd: root.clone(),
            root,
            host: options.host,
            port: options.port,
            mode: options.mode,
            alias: options.alias,
            env: options.env,
            features: options.features,
            entries: options.entries,
            reload: options.reload,
            watch: options.watch,
            config_file: None,
            watch_files: Vec::new(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.mode.is_production()
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Loads snapshots from the filesystem and environment.
///
/// # Example
///
/// ```no_run
/// use spry_config::{ConfigLoader, Overrides};
///
/// let loader = ConfigLoader::new(".").with_overrides(Overrides {
///     port: Some(3000),
///     ..Overrides::default()
/// });
/// let snapshot = loader.load().unwrap();
/// assert_eq!(snapshot.port, 3000);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    cwd: PathBuf,
    config_path: Option<PathBuf>,
    overrides: Overrides,
}

impl ConfigLoader {
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            config_path: None,
            overrides: Overrides::default(),
        }
    }

    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Pin the port for subsequent loads.
    ///
    /// Called once the first instance has bound, so that restarts come back
    /// on the same address.
    pub fn pin_port(&mut self, port: u16) {
        self.overrides.port = Some(port);
    }

    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    /// Load and normalize a fresh snapshot.
    ///
    /// Priority: CLI overrides > `SPRY_*` env > `HOST`/`PORT` env > config file > defaults
    pub fn load(&self) -> Result<ConfigSnapshot> {
        let cwd = if self.cwd.is_absolute() {
            self.cwd.clone()
        } else {
            std::env::current_dir()?.join(&self.cwd)
        }
        .clean();

        if !cwd.is_dir() {
            return Err(ConfigError::CwdNotFound(cwd));
        }

        let discovery = ConfigDiscovery::new(&cwd).with_explicit(self.config_path.clone());
        let config_file = discovery.find();

        let mut figment = Figment::new().merge(Serialized::defaults(DevOptions::default()));
        if let Some(path) = &config_file {
            figment = figment.merge(discovery.provider(path)?);
        }
        figment = figment
            .merge(Env::raw().only(&["host", "port"]))
            .merge(Env::prefixed("SPRY_").only(&["host", "port", "root", "mode"]))
            .merge(Serialized::defaults(&self.overrides));

        let options: DevOptions = figment.extract()?;
        options.validate()?;

        let snapshot = normalize(options, cwd, config_file)?;
        tracing::debug!(
            root = %snapshot.root.display(),
            port = snapshot.port,
            mode = snapshot.mode.as_str(),
            "configuration loaded"
        );
        Ok(snapshot)
    }
}

fn normalize(
    options: DevOptions,
    cwd: PathBuf,
    config_file: Option<PathBuf>,
) -> Result<ConfigSnapshot> {
    let root = match &options.root {
        Some(root) if root.is_absolute() => root.clean(),
        Some(root) => cwd.join(root).clean(),
        None => {
            let public = cwd.join("public");
            if public.is_dir() { public } else { cwd.clone() }
        }
    };

    if !root.is_dir() {
        return Err(ConfigError::RootNotFound(root));
    }

    let mut env = load_env_files(&cwd, options.mode)?;
    env.extend(options.env);

    let mut watch_files = Vec::new();
    if let Some(path) = &config_file {
        watch_files.push(path.clone());
    }
    watch_files.extend(env_file_candidates(&cwd, options.mode));

    Ok(ConfigSnapshot {
        cwd,
        root,
        host: options.host,
        port: options.port,
        mode: options.mode,
        alias: options.alias,
        env,
        features: options.features,
        entries: options.entries,
        reload: options.reload,
        watch: options.watch,
        config_file,
        watch_files,
    })
}
