//! Dependency tracking between upstream files and built resources.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use path_clean::PathClean;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::resource::ResourceId;

/// Records which resources were built from which files.
///
/// Edges are stored per upstream file in a set, so registering the same
/// edge twice has no effect. Lookups are one level deep.
#[derive(Debug, Default)]
pub struct DependencyTracker {
    edges: RwLock<FxHashMap<PathBuf, FxHashSet<ResourceId>>>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `downstream` was built from `upstream`.
    ///
    /// Returns `true` when the edge is new.
    pub fn register(&self, upstream: impl AsRef<Path>, downstream: ResourceId) -> bool {
        let upstream = upstream.as_ref().clean();
        self.edges
            .write()
            .entry(upstream)
            .or_default()
            .insert(downstream)
    }

    /// Replace every edge pointing at `downstream` with edges from `upstreams`.
    pub fn replace(&self, downstream: &ResourceId, upstreams: impl IntoIterator<Item = PathBuf>) {
        let mut edges = self.edges.write();
        edges.retain(|_, dependents| {
            dependents.remove(downstream);
            !dependents.is_empty()
        });
        for upstream in upstreams {
            edges
                .entry(upstream.clean())
                .or_default()
                .insert(downstream.clone());
        }
    }

    /// Resources registered against `upstream`, in sorted order.
    pub fn dependents(&self, upstream: impl AsRef<Path>) -> BTreeSet<ResourceId> {
        let upstream = upstream.as_ref().clean();
        self.edges
            .read()
            .get(&upstream)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Files `downstream` was last built from, in sorted order.
    pub fn upstreams_of(&self, downstream: &ResourceId) -> BTreeSet<PathBuf> {
        self.edges
            .read()
            .iter()
            .filter(|(_, dependents)| dependents.contains(downstream))
            .map(|(upstream, _)| upstream.clone())
            .collect()
    }

    /// Drop every edge pointing at `downstream`.
    pub fn remove_downstream(&self, downstream: &ResourceId) {
        self.replace(downstream, std::iter::empty());
    }

    /// Number of upstream files with at least one dependent.
    pub fn len(&self) -> usize {
        self.edges.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.read().is_empty()
    }

    pub fn clear(&self) {
        self.edges.write().clear();
    }
}
