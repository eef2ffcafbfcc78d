//! Source runtime abstraction.
//!
//! The build engine never touches the filesystem directly. It goes through a
//! [`Runtime`], which lets tests and embedders serve sources from memory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use path_clean::PathClean;
use rustc_hash::FxHashMap;

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that can occur during runtime operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Runtime error: {0}")]
    Other(String),
}

/// Read access to project sources.
#[async_trait]
pub trait Runtime: Send + Sync + std::fmt::Debug {
    /// Read a file's bytes
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>>;

    /// Check whether a regular file exists at `path`
    fn is_file(&self, path: &Path) -> bool;
}

/// Runtime that combines virtual files with filesystem access.
///
/// Virtual files are checked first, then the runtime falls back to the
/// filesystem. Relative paths are resolved against the root.
#[derive(Debug, Clone)]
pub struct SourceRuntime {
    virtual_files: Arc<RwLock<FxHashMap<PathBuf, Vec<u8>>>>,
    root: PathBuf,
}

impl SourceRuntime {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            virtual_files: Arc::new(RwLock::new(FxHashMap::default())),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Add or replace a virtual file.
    pub fn add_virtual_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let normalized = self.normalize(path.as_ref());
        self.virtual_files.write().insert(normalized, content.into());
    }

    pub fn remove_virtual_file(&self, path: impl AsRef<Path>) -> bool {
        let normalized = self.normalize(path.as_ref());
        self.virtual_files.write().remove(&normalized).is_some()
    }

    fn normalize(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.clean()
        } else {
            self.root.join(path).clean()
        }
    }
}

#[async_trait]
impl Runtime for SourceRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let path = self.normalize(path);
        if let Some(content) = self.virtual_files.read().get(&path) {
            return Ok(content.clone());
        }

        tokio::task::spawn_blocking(move || {
            std::fs::read(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RuntimeError::FileNotFound(path.clone())
                } else {
                    RuntimeError::Io(format!("Failed to read {}: {}", path.display(), e))
                }
            })
        })
        .await
        .map_err(|e| RuntimeError::Other(format!("Task join error: {e}")))?
    }

    fn is_file(&self, path: &Path) -> bool {
        let path = self.normalize(path);
        self.virtual_files.read().contains_key(&path) || path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn virtual_files_shadow_disk() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.js"), "disk").unwrap();

        let runtime = SourceRuntime::new(dir.path());
        runtime.add_virtual_file("a.js", "memory");

        let content = runtime.read_file(Path::new("a.js")).await.unwrap();
        assert_eq!(content, b"memory");

        runtime.remove_virtual_file("a.js");
        let content = runtime.read_file(&dir.path().join("a.js")).await.unwrap();
        assert_eq!(content, b"disk");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let runtime = SourceRuntime::new(dir.path());

        let err = runtime.read_file(Path::new("missing.js")).await.unwrap_err();
        assert!(matches!(err, RuntimeError::FileNotFound(_)));
        assert!(!runtime.is_file(Path::new("missing.js")));
    }
}
