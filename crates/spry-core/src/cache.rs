//! Transform cache.
//!
//! Entries are only inserted by the build engine and only removed by
//! invalidation or [`TransformCache::clear`]. Every invalidation advances a
//! generation counter; a build records the generation it started at and may
//! only commit if nothing it depends on was invalidated since.
//!
//! Invalidation history is kept only as far back as the oldest running
//! build. With no build running it is dropped entirely.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use path_clean::PathClean;
use rustc_hash::FxHashMap;

use crate::resource::ResourceId;

/// Output of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub id: ResourceId,
    pub content: String,
    pub source_map: Option<String>,
    /// Absolute files the content was produced from
    pub upstream: BTreeSet<PathBuf>,
}

impl CacheEntry {
    pub fn depends_on(&self, path: &Path) -> bool {
        self.upstream.contains(path)
    }
}

/// Point in the cache's invalidation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(u64);

#[derive(Debug, Default)]
struct CacheState {
    entries: FxHashMap<ResourceId, Arc<CacheEntry>>,
    counter: u64,
    /// Generation at which each id was last invalidated
    invalidated: FxHashMap<ResourceId, u64>,
    /// Generation at which each file last changed
    changed: FxHashMap<PathBuf, u64>,
    cleared: u64,
    /// Start generations of running builds, with multiplicity
    running: BTreeMap<u64, usize>,
}

impl CacheState {
    fn bump(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }

    /// Drop history no running build can observe.
    fn prune(&mut self) {
        match self.running.keys().next().copied() {
            None => {
                self.invalidated.clear();
                self.changed.clear();
            }
            Some(oldest) => {
                self.invalidated.retain(|_, at| *at > oldest);
                self.changed.retain(|_, at| *at > oldest);
            }
        }
    }

    fn is_stale(&self, id: &ResourceId, upstream: Option<&BTreeSet<PathBuf>>, since: u64) -> bool {
        if self.cleared > since {
            return true;
        }
        if self.invalidated.get(id).is_some_and(|&at| at > since) {
            return true;
        }
        upstream.is_some_and(|files| {
            files
                .iter()
                .any(|file| self.changed.get(file).is_some_and(|&at| at > since))
        })
    }
}

#[derive(Debug, Default)]
pub struct TransformCache {
    state: RwLock<CacheState>,
}

impl TransformCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ResourceId) -> Option<Arc<CacheEntry>> {
        self.state.read().entries.get(id).cloned()
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.state.read().entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Current generation.
    pub fn generation(&self) -> Generation {
        Generation(self.state.read().counter)
    }

    /// Register a build starting now. Taken before its first await and
    /// released with [`TransformCache::finish`].
    pub fn begin(&self) -> Generation {
        let mut state = self.state.write();
        let at = state.counter;
        *state.running.entry(at).or_default() += 1;
        Generation(at)
    }

    /// Release a build registered with [`TransformCache::begin`].
    pub fn finish(&self, started: Generation) {
        let mut state = self.state.write();
        if let Some(count) = state.running.get_mut(&started.0) {
            *count -= 1;
            if *count == 0 {
                state.running.remove(&started.0);
            }
        }
        state.prune();
    }

    /// Whether `id` itself was invalidated after `since`.
    pub fn is_stale(&self, id: &ResourceId, since: Generation) -> bool {
        self.state.read().is_stale(id, None, since.0)
    }

    /// Whether `id`, or any of `files`, was invalidated after `since`.
    pub fn is_stale_with(
        &self,
        id: &ResourceId,
        files: &BTreeSet<PathBuf>,
        since: Generation,
    ) -> bool {
        self.state.read().is_stale(id, Some(files), since.0)
    }

    /// Insert a finished build unless it went stale while running.
    ///
    /// Returns `false` when the entry was discarded.
    pub fn commit(&self, entry: Arc<CacheEntry>, started: Generation) -> bool {
        let mut state = self.state.write();
        if state.is_stale(&entry.id, Some(&entry.upstream), started.0) {
            return false;
        }
        state.entries.insert(entry.id.clone(), entry);
        true
    }

    /// Number of recorded invalidations still kept for running builds.
    pub fn history_len(&self) -> usize {
        let state = self.state.read();
        state.invalidated.len() + state.changed.len()
    }

    /// Evict one resource. Returns `true` if an entry was present.
    pub fn invalidate(&self, id: &ResourceId) -> bool {
        let mut state = self.state.write();
        let at = state.bump();
        if !state.running.is_empty() {
            state.invalidated.insert(id.clone(), at);
        }
        state.entries.remove(id).is_some()
    }

    /// Record a change to `path` and evict every entry built from it.
    ///
    /// Returns the evicted ids.
    pub fn invalidate_path(&self, path: &Path) -> BTreeSet<ResourceId> {
        let path = path.clean();
        let mut state = self.state.write();
        let at = state.bump();

        let evicted: BTreeSet<ResourceId> = state
            .entries
            .values()
            .filter(|entry| entry.depends_on(&path))
            .map(|entry| entry.id.clone())
            .collect();
        for id in &evicted {
            state.entries.remove(id);
        }
        if !state.running.is_empty() {
            state.changed.insert(path, at);
        }
        evicted
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut state = self.state.write();
        let at = state.bump();
        state.cleared = at;
        state.entries.clear();
        state.invalidated.clear();
        state.changed.clear();
    }
}
