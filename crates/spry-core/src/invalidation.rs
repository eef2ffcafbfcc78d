//! Change invalidation.
//!
//! A changed file evicts every cached resource built from it, every
//! resource the tracker lists as its dependent, and whatever plugins report
//! from `watch_change`. Eviction always completes before the resulting
//! notification is published.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use path_clean::PathClean;
use rustc_hash::FxHashSet;
use spry_config::ConfigSnapshot;

use crate::bus::LiveUpdateBus;
use crate::engine::BuildEngine;
use crate::plugin::HookUsage;
use crate::protocol::LiveMessage;
use crate::resource::ResourceId;

#[derive(Debug, thiserror::Error)]
#[error("invalid reload pattern '{pattern}': {source}")]
pub struct ReloadPolicyError {
    pub pattern: String,
    #[source]
    pub source: globset::Error,
}

/// Decides which changes need a full page reload.
#[derive(Debug, Clone)]
pub struct ReloadPolicy {
    root: PathBuf,
    patterns: GlobSet,
    files: FxHashSet<PathBuf>,
    always: bool,
}

impl ReloadPolicy {
    /// Policy from glob patterns relative to `root`.
    pub fn new(root: impl Into<PathBuf>, patterns: &[String]) -> Result<Self, ReloadPolicyError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|source| ReloadPolicyError {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        let patterns = builder.build().map_err(|source| ReloadPolicyError {
            pattern: patterns.join(", "),
            source,
        })?;

        Ok(Self {
            root: root.into(),
            patterns,
            files: FxHashSet::default(),
            always: false,
        })
    }

    /// Policy for a configuration: `reload.full` patterns, entry scripts and
    /// the config file.
    pub fn from_config(config: &ConfigSnapshot) -> Result<Self, ReloadPolicyError> {
        let entries = config.entries.iter().map(|entry| config.root.join(entry));
        Ok(Self::new(&config.root, &config.reload.full)?
            .with_files(entries.chain(config.config_file.clone()))
            .with_always(config.reload.always))
    }

    /// Absolute files that always force a reload.
    pub fn with_files(mut self, files: impl IntoIterator<Item = PathBuf>) -> Self {
        self.files.extend(files.into_iter().map(|file| file.clean()));
        self
    }

    /// Turn every non-empty invalidation into a reload.
    pub fn with_always(mut self, always: bool) -> Self {
        self.always = always;
        self
    }

    pub fn always(&self) -> bool {
        self.always
    }

    pub fn matches(&self, path: &Path) -> bool {
        let path = path.clean();
        if self.files.contains(&path) {
            return true;
        }
        path.strip_prefix(&self.root)
            .is_ok_and(|relative| self.patterns.is_match(relative))
    }
}

/// Outcome of one file change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invalidation {
    pub evicted: BTreeSet<ResourceId>,
    pub needs_full_reload: bool,
}

impl Invalidation {
    /// Nothing depends on the change.
    pub fn is_noop(&self) -> bool {
        self.evicted.is_empty() && !self.needs_full_reload
    }

    /// Notification for connected clients, if any is due.
    pub fn message(&self) -> Option<LiveMessage> {
        if self.needs_full_reload {
            Some(LiveMessage::Reload)
        } else if self.evicted.is_empty() {
            None
        } else {
            Some(LiveMessage::update(&self.evicted))
        }
    }
}

/// Maps file changes to evictions and notifications.
#[derive(Debug, Clone)]
pub struct InvalidationDispatcher {
    engine: BuildEngine,
    policy: ReloadPolicy,
    bus: LiveUpdateBus,
}

impl InvalidationDispatcher {
    pub fn new(engine: BuildEngine, policy: ReloadPolicy, bus: LiveUpdateBus) -> Self {
        Self {
            engine,
            policy,
            bus,
        }
    }

    pub fn policy(&self) -> &ReloadPolicy {
        &self.policy
    }

    /// Evict everything affected by a change to `path`.
    pub fn on_file_changed(&self, path: &Path) -> Invalidation {
        let path = path.clean();
        let cache = self.engine.cache();

        let mut evicted = cache.invalidate_path(&path);

        for id in self.engine.tracker().dependents(&path) {
            cache.invalidate(&id);
            evicted.insert(id);
        }

        for (_, plugin) in self.engine.pipeline().with_hook(HookUsage::WATCH_CHANGE) {
            for id in plugin.plugin().watch_change(&path) {
                tracing::trace!(plugin = plugin.name(), %id, "watch_change");
                cache.invalidate(&id);
                evicted.insert(id);
            }
        }

        let needs_full_reload =
            self.policy.matches(&path) || (self.policy.always() && !evicted.is_empty());

        Invalidation {
            evicted,
            needs_full_reload,
        }
    }

    /// Evict, then publish at most one notification.
    pub fn dispatch(&self, path: &Path) -> Invalidation {
        let invalidation = self.on_file_changed(path);

        match invalidation.message() {
            Some(message) => {
                let delivered = self.bus.publish(message);
                tracing::debug!(
                    path = %path.display(),
                    evicted = invalidation.evicted.len(),
                    reload = invalidation.needs_full_reload,
                    delivered,
                    "change dispatched"
                );
            }
            None => tracing::trace!(path = %path.display(), "change has no dependents"),
        }

        invalidation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_are_relative_to_root() {
        let policy = ReloadPolicy::new("/p", &["**/*.html".to_string()]).unwrap();
        assert!(policy.matches(Path::new("/p/index.html")));
        assert!(policy.matches(Path::new("/p/pages/about.html")));
        assert!(!policy.matches(Path::new("/p/app.js")));
        assert!(!policy.matches(Path::new("/elsewhere/index.html")));
    }

    #[test]
    fn listed_files_match_outside_root() {
        let policy = ReloadPolicy::new("/p/public", &[])
            .unwrap()
            .with_files([PathBuf::from("/p/spry.toml")]);
        assert!(policy.matches(Path::new("/p/./spry.toml")));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = ReloadPolicy::new("/p", &["a[".to_string()]).unwrap_err();
        assert_eq!(err.pattern, "a[");
    }

    #[test]
    fn message_follows_outcome() {
        let mut invalidation = Invalidation::default();
        assert!(invalidation.is_noop());
        assert_eq!(invalidation.message(), None);

        invalidation
            .evicted
            .insert(ResourceId::from_request("/a.css").unwrap());
        assert!(matches!(invalidation.message(), Some(LiveMessage::Update { .. })));

        invalidation.needs_full_reload = true;
        assert_eq!(invalidation.message(), Some(LiveMessage::Reload));
    }
}
