use std::sync::Arc;

use crate::engine::StyleEngine;
use crate::inline::InlineImportEngine;

/// Environment variable that turns the stylesheet engine off.
pub const DISABLE_ENV: &str = "SPRY_DISABLE_STYLES";

/// Where a [`StylesPlugin`](crate::StylesPlugin) gets its engine from.
///
/// Resolved once when the plugin is built; an unavailable engine is reported
/// per request instead of failing startup.
#[derive(Debug, Clone)]
pub enum EngineProvider {
    Available(Arc<dyn StyleEngine>),
    Unavailable { reason: String },
}

impl EngineProvider {
    /// The built-in `@import`-inlining engine.
    pub fn builtin() -> Self {
        Self::with_engine(InlineImportEngine)
    }

    pub fn with_engine(engine: impl StyleEngine + 'static) -> Self {
        Self::Available(Arc::new(engine))
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// The built-in engine unless `SPRY_DISABLE_STYLES` is set.
    pub fn from_env() -> Self {
        Self::from_flag(std::env::var(DISABLE_ENV).ok().as_deref())
    }

    /// Provider for a `features.styles` setting, honouring the environment.
    pub fn resolve(enabled: bool) -> Self {
        if enabled {
            Self::from_env()
        } else {
            Self::unavailable("styles are disabled by `features.styles = false`")
        }
    }

    fn from_flag(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("true" | "1") => Self::unavailable(format!("styles are disabled by {DISABLE_ENV}")),
            _ => Self::builtin(),
        }
    }

    pub fn engine(&self) -> Option<&Arc<dyn StyleEngine>> {
        match self {
            EngineProvider::Available(engine) => Some(engine),
            EngineProvider::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.engine().is_some()
    }
}

impl Default for EngineProvider {
    fn default() -> Self {
        Self::builtin()
    }
}
