//! File-based config discovery.
//!
//! Handles finding the spry configuration file for a project directory and
//! turning it into a figment provider.

use std::fs;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Format, Json, Toml};
use serde_json::Value;

use crate::error::{ConfigError, Result};

pub const CONFIG_FILE_NAME: &str = "spry.toml";
pub const PACKAGE_JSON_FIELD: &str = "spry";

/// Searches a project directory for its configuration file.
///
/// # Example
///
/// ```no_run
/// use spry_config::ConfigDiscovery;
///
/// let discovery = ConfigDiscovery::new(".");
/// if let Some(path) = discovery.find() {
///     println!("using {}", path.display());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ConfigDiscovery {
    cwd: PathBuf,
    explicit: Option<PathBuf>,
}

impl ConfigDiscovery {
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            explicit: None,
        }
    }

    /// Use a specific config file instead of searching.
    pub fn with_explicit(mut self, path: Option<PathBuf>) -> Self {
        self.explicit = path.map(|p| if p.is_absolute() { p } else { self.cwd.join(p) });
        self
    }

    /// Find a config file.
    ///
    /// Searches in this order:
    /// 1. explicit path, when one was given
    /// 2. `spry.toml`
    /// 3. `package.json` with a `spry` field
    pub fn find(&self) -> Option<PathBuf> {
        if let Some(explicit) = &self.explicit {
            return Some(explicit.clone());
        }

        let toml_path = self.cwd.join(CONFIG_FILE_NAME);
        if toml_path.is_file() {
            return Some(toml_path);
        }

        let pkg_path = self.cwd.join("package.json");
        if pkg_path.is_file() {
            if let Ok(content) = fs::read_to_string(&pkg_path) {
                if let Ok(parsed) = serde_json::from_str::<Value>(&content) {
                    if parsed.get(PACKAGE_JSON_FIELD).is_some_and(|v| !v.is_null()) {
                        return Some(pkg_path);
                    }
                }
            }
        }

        None
    }

    /// Build a figment provider for the given config file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` when an explicit path does not exist.
    pub fn provider(&self, path: &Path) -> Result<Figment> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        if path.file_name() == Some(std::ffi::OsStr::new("package.json")) {
            return Ok(Figment::from(Json::file(path)).focus(PACKAGE_JSON_FIELD));
        }

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(Figment::from(Json::file(path))),
            Some("toml") | None => Ok(Figment::from(Toml::file(path))),
            Some(other) => Err(ConfigError::InvalidValue {
                field: "config".to_string(),
                hint: Some(format!("unsupported config format '.{other}', use spry.toml")),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn find_returns_none_when_no_config() {
        let dir = TempDir::new().unwrap();
        assert!(ConfigDiscovery::new(dir.path()).find().is_none());
    }

    #[test]
    fn find_prefers_toml_over_package_json() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "port = 4000\n").unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{ "spry": { "port": 5000 } }"#,
        )
        .unwrap();

        let found = ConfigDiscovery::new(dir.path()).find().unwrap();
        assert_eq!(found.file_name().unwrap(), CONFIG_FILE_NAME);
    }

    #[test]
    fn package_json_without_field_is_ignored() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("package.json"), r#"{ "name": "app" }"#).unwrap();
        assert!(ConfigDiscovery::new(dir.path()).find().is_none());
    }

    #[test]
    fn explicit_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let discovery =
            ConfigDiscovery::new(dir.path()).with_explicit(Some(PathBuf::from("custom.toml")));
        let path = discovery.find().unwrap();
        assert!(matches!(
            discovery.provider(&path),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("spry.yaml");
        fs::write(&path, "port: 1").unwrap();
        let discovery = ConfigDiscovery::new(dir.path());
        assert!(matches!(
            discovery.provider(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
