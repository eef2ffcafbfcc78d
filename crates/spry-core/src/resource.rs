//! Resource identity.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use path_clean::PathClean;
use serde::{Deserialize, Serialize};

/// Identifier of a servable resource: a root-relative path with forward
/// slashes, no leading slash and no `..` segments.
///
/// ```
/// use spry_core::ResourceId;
///
/// let id = ResourceId::from_request("/src/app.ts?t=123").unwrap();
/// assert_eq!(id.as_str(), "src/app.ts");
/// assert_eq!(id.extension(), Some("ts"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Build an id from a URL path. Query strings and fragments are dropped.
    ///
    /// Returns `None` for paths that escape the root or name no file.
    pub fn from_request(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = path.replace('\\', "/");

        let mut segments = Vec::new();
        for segment in path.split('/') {
            match segment {
                "" | "." => {}
                ".." => return None,
                other => segments.push(other),
            }
        }

        if segments.is_empty() {
            return None;
        }
        Some(Self(segments.join("/")))
    }

    /// Build an id from an import specifier.
    ///
    /// `./` and `../` specifiers are joined with the importer's directory;
    /// anything else is taken as root-relative.
    pub fn from_specifier(specifier: &str, importer: Option<&ResourceId>) -> Option<Self> {
        let specifier = specifier.split(['?', '#']).next().unwrap_or_default();
        let relative = specifier.starts_with("./") || specifier.starts_with("../");
        let base = match importer {
            Some(importer) if relative => importer.0.rsplit_once('/').map_or("", |(dir, _)| dir),
            _ => "",
        };

        let mut segments: Vec<&str> = Vec::new();
        for segment in base.split('/').chain(specifier.split('/')) {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop()?;
                }
                other => segments.push(other),
            }
        }

        if segments.is_empty() {
            return None;
        }
        Some(Self(segments.join("/")))
    }

    /// Build an id from a filesystem path located under `root`.
    pub fn from_path(root: &Path, path: &Path) -> Option<Self> {
        let path = if path.is_absolute() {
            path.clean()
        } else {
            root.join(path).clean()
        };
        let relative = path.strip_prefix(root).ok()?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => segments.push(part.to_str()?.to_string()),
                Component::CurDir => {}
                _ => return None,
            }
        }

        if segments.is_empty() {
            return None;
        }
        Some(Self(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Absolute location of the resource's source file.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }

    /// File extension, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let file = self.0.rsplit('/').next()?;
        let (stem, ext) = file.rsplit_once('.')?;
        if stem.is_empty() { None } else { Some(ext) }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
