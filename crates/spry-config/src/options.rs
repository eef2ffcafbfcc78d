//! User-facing option types.
//!
//! These mirror the keys accepted in `spry.toml`. Every field has a default
//! so an empty project needs no configuration at all.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Which command the options are being resolved for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Development server with live updates
    #[default]
    Start,
    /// Production build
    Build,
}

impl Mode {
    pub fn is_production(self) -> bool {
        matches!(self, Mode::Build)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Start => "development",
            Mode::Build => "production",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevOptions {
    /// Directory served as `/`. Relative to `cwd`.
    #[serde(default)]
    pub root: Option<PathBuf>,

    #[serde(default = "default_host")]
    pub host: String,

    /// `0` lets the OS pick a free port.
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub mode: Mode,

    /// Import specifier prefix -> replacement path (relative to the root).
    #[serde(default)]
    pub alias: BTreeMap<String, String>,

    /// Values exposed to scripts as `import.meta.env.KEY`.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub features: Features,

    /// Entry scripts. A change to one of these forces a full reload.
    #[serde(default = "default_entries")]
    pub entries: Vec<String>,

    #[serde(default)]
    pub reload: ReloadOptions,

    #[serde(default)]
    pub watch: WatchOptions,
}

impl Default for DevOptions {
    fn default() -> Self {
        Self {
            root: None,
            host: default_host(),
            port: default_port(),
            mode: Mode::default(),
            alias: BTreeMap::new(),
            env: BTreeMap::new(),
            features: Features::default(),
            entries: default_entries(),
            reload: ReloadOptions::default(),
            watch: WatchOptions::default(),
        }
    }
}

impl DevOptions {
    /// Check values that serde cannot reject on its own.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "host".to_string(),
                hint: Some("host cannot be empty".to_string()),
            });
        }

        if self.watch.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::InvalidValue {
                field: "watch.debounce_ms".to_string(),
                hint: Some(format!("must be at most {MAX_DEBOUNCE_MS}ms")),
            });
        }

        for (from, to) in &self.alias {
            if from.is_empty() || to.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "alias".to_string(),
                    hint: Some("alias keys and targets cannot be empty".to_string()),
                });
            }
        }

        Ok(())
    }
}

/// Optional feature toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    /// Inject hot-update acceptance into modules (development only)
    #[serde(default = "default_true")]
    pub hot: bool,

    /// Compile `.less` stylesheets
    #[serde(default = "default_true")]
    pub styles: bool,

    #[serde(default)]
    pub sourcemap: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            hot: true,
            styles: true,
            sourcemap: false,
        }
    }
}

/// Rules deciding when a change needs a full page reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadOptions {
    /// Glob patterns (relative to the root) that always force a full reload.
    #[serde(default = "default_full_reload")]
    pub full: Vec<String>,

    /// Turn every scoped update into a full reload.
    #[serde(default)]
    pub always: bool,
}

impl Default for ReloadOptions {
    fn default() -> Self {
        Self {
            full: default_full_reload(),
            always: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchOptions {
    /// Path prefixes or `*.ext` patterns ignored by the source watcher.
    #[serde(default = "default_watch_ignore")]
    pub ignore: Vec<String>,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            ignore: default_watch_ignore(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// Command-line overrides, merged over every other source.
///
/// Only fields that are set take part in the merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
}

const MAX_DEBOUNCE_MS: u64 = 10_000;

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_entries() -> Vec<String> {
    vec!["index.js".into(), "index.ts".into(), "index.tsx".into()]
}

fn default_full_reload() -> Vec<String> {
    vec!["**/*.html".into()]
}

fn default_watch_ignore() -> Vec<String> {
    vec![
        "node_modules".into(),
        ".git".into(),
        "dist".into(),
        "*.log".into(),
    ]
}

fn default_debounce_ms() -> u64 {
    50
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let options = DevOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.port, 8080);
        assert!(options.features.hot);
        assert_eq!(options.mode, Mode::Start);
    }

    #[test]
    fn empty_host_is_rejected() {
        let options = DevOptions {
            host: "  ".to_string(),
            ..DevOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "host"
        ));
    }

    #[test]
    fn oversized_debounce_is_rejected() {
        let mut options = DevOptions::default();
        options.watch.debounce_ms = 60_000;
        assert!(options.validate().is_err());
    }

    #[test]
    fn mode_production_flag() {
        assert!(Mode::Build.is_production());
        assert!(!Mode::Start.is_production());
        assert_eq!(Mode::Start.as_str(), "development");
    }

    #[test]
    fn overrides_skip_unset_fields() {
        let overrides = Overrides {
            port: Some(3000),
            ..Overrides::default()
        };
        let value = serde_json::to_value(&overrides).unwrap();
        assert_eq!(value, serde_json::json!({ "port": 3000 }));
    }
}
