//! Stylesheet engine contract.
//!
//! An engine turns one stylesheet into CSS. Imports are fetched through an
//! [`ImportLoader`] supplied by the caller, so the engine never touches the
//! filesystem itself and every file it reads is reported back in
//! [`RenderOutput::imports`].

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Failure reported by a [`StyleEngine`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The stylesheet does not compile.
    #[error("{message}")]
    Syntax {
        message: String,
        /// File the error points into, which may be an imported one
        file: PathBuf,
        line: u32,
        column: u32,
        /// Full text of `file`, for rendering a code frame
        contents: Option<String>,
    },

    /// An `@import` could not be loaded.
    #[error("Cannot import '{specifier}': {message}")]
    Import {
        specifier: String,
        /// File containing the `@import`
        file: PathBuf,
        line: u32,
        message: String,
    },

    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// File, line and column the error points at, if known.
    pub fn location(&self) -> Option<(&Path, u32, u32)> {
        match self {
            EngineError::Syntax {
                file, line, column, ..
            } => Some((file, *line, *column)),
            EngineError::Import { file, line, .. } => Some((file, *line, 1)),
            EngineError::Other(_) => None,
        }
    }
}

/// Input of one render.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub code: &'a str,
    /// Absolute path of the stylesheet
    pub file: &'a Path,
    /// Produce a source map when the engine supports it
    pub sourcemap: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOutput {
    pub css: String,
    pub map: Option<String>,
    /// Absolute paths of every file pulled in through `@import`
    pub imports: Vec<PathBuf>,
}

/// A file fetched for an `@import`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImport {
    pub path: PathBuf,
    pub contents: String,
}

/// Fetches imported stylesheets on behalf of an engine.
#[async_trait]
pub trait ImportLoader: Send + Sync {
    /// Load `specifier` as written in a file located in `current_dir`.
    async fn load(&self, specifier: &str, current_dir: &Path) -> Result<LoadedImport, String>;
}

/// A stylesheet compiler.
#[async_trait]
pub trait StyleEngine: Send + Sync + Debug {
    fn name(&self) -> &str;

    async fn render(
        &self,
        request: RenderRequest<'_>,
        loader: &dyn ImportLoader,
    ) -> Result<RenderOutput, EngineError>;
}
