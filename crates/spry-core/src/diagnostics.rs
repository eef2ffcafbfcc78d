//! Structured build diagnostics.
//!
//! Plugins report failures as [`HookError`]. The engine wraps them into a
//! [`BuildError`] that records which stage and plugin failed, and renders a
//! code frame when a location is known. `BuildError` is `Clone` because one
//! failed build is handed to every waiter of a shared in-flight build.

mod frame;
mod miette;

pub use frame::{line_col_to_offset, render_code_frame};

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Pipeline stage a build failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStage {
    Resolve,
    Load,
    Transform,
}

impl BuildStage {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildStage::Resolve => "resolve",
            BuildStage::Load => "load",
            BuildStage::Transform => "transform",
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 1-based line and column inside a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// File the location points into, when it differs from the resource
    pub file: Option<PathBuf>,
    pub line: u32,
    pub column: u32,
}

/// Error returned by a plugin hook.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HookError {
    pub message: String,
    pub location: Option<SourceLocation>,
    /// Pre-rendered frame, for hooks that know better than the engine
    pub code_frame: Option<String>,
    pub hint: Option<String>,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            code_frame: None,
            hint: None,
        }
    }

    pub fn with_location(mut self, line: u32, column: u32) -> Self {
        self.location = Some(SourceLocation {
            file: None,
            line,
            column,
        });
        self
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        if let Some(location) = &mut self.location {
            location.file = Some(file.into());
        }
        self
    }

    pub fn with_code_frame(mut self, frame: impl Into<String>) -> Self {
        self.code_frame = Some(frame.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Result type returned by plugin hooks
pub type HookResult<T> = Result<T, HookError>;

/// A failed resolve, load or transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildError {
    pub stage: BuildStage,
    /// Requested resource or specifier
    pub id: String,
    /// Plugin that raised the error, if any
    pub plugin: Option<String>,
    pub message: String,
    pub location: Option<SourceLocation>,
    pub code_frame: Option<String>,
    pub hint: Option<String>,
}

impl BuildError {
    pub fn new(stage: BuildStage, id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage,
            id: id.into(),
            plugin: None,
            message: message.into(),
            location: None,
            code_frame: None,
            hint: None,
        }
    }

    /// The requested resource does not exist.
    pub fn not_found(id: impl Into<String>) -> Self {
        let id = id.into();
        let message = format!("Cannot find '{id}'");
        Self::new(BuildStage::Resolve, id, message)
    }

    /// Wrap a hook failure.
    ///
    /// When the hook supplied a location but no frame, the frame is rendered
    /// from `source`, the content the hook was given.
    pub fn from_hook(
        stage: BuildStage,
        plugin: &str,
        id: &str,
        error: HookError,
        source: Option<&str>,
    ) -> Self {
        let code_frame = error.code_frame.or_else(|| {
            let location = error.location.as_ref()?;
            if location.file.is_some() {
                return None;
            }
            render_code_frame(source?, location.line, location.column)
        });

        Self {
            stage,
            id: id.to_string(),
            plugin: Some(plugin.to_string()),
            message: error.message,
            location: error.location,
            code_frame,
            hint: error.hint,
        }
    }

    /// Resolution failures map to "not found" responses.
    pub fn is_not_found(&self) -> bool {
        self.stage == BuildStage::Resolve
    }

    /// Single-line summary used in the client overlay and the console.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        if let Some(plugin) = &self.plugin {
            out.push_str(&format!("[{plugin}] "));
        }
        out.push_str(&self.message);
        if let Some(location) = &self.location {
            let file = location
                .file
                .as_ref()
                .map(|f| f.display().to_string())
                .unwrap_or_else(|| self.id.clone());
            out.push_str(&format!(" ({file}:{}:{})", location.line, location.column));
        } else if !self.message.contains(&self.id) {
            out.push_str(&format!(" ({})", self.id));
        }
        out
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.summary())
    }
}

impl std::error::Error for BuildError {}

impl From<BuildError> for HookError {
    fn from(err: BuildError) -> Self {
        Self {
            message: err.message,
            location: err.location,
            code_frame: err.code_frame,
            hint: err.hint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_error_frame_is_rendered_from_source() {
        let error = HookError::new("Unexpected token").with_location(2, 3);
        let built = BuildError::from_hook(
            BuildStage::Transform,
            "demo",
            "a.js",
            error,
            Some("let a = 1;\nle b = 2;\n"),
        );

        let frame = built.code_frame.as_deref().unwrap();
        assert!(frame.contains("> 2 | le b = 2;"));
        assert_eq!(built.plugin.as_deref(), Some("demo"));
        assert_eq!(built.summary(), "[demo] Unexpected token (a.js:2:3)");
    }

    #[test]
    fn foreign_file_location_skips_frame() {
        let error = HookError::new("bad")
            .with_location(1, 1)
            .with_file("/project/vars.less");
        let built = BuildError::from_hook(BuildStage::Load, "styles", "a.less", error, Some("x"));
        assert!(built.code_frame.is_none());
    }

    #[test]
    fn not_found_is_a_resolve_error() {
        let err = BuildError::not_found("missing.js");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "resolve failed: Cannot find 'missing.js'");
    }
}
