//! Per-build plugin context.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use path_clean::PathClean;

use super::{OrderedPipeline, ResolvedId};
use crate::diagnostics::{HookError, HookResult};
use crate::resource::ResourceId;
use crate::runtime::{Runtime, RuntimeError, SourceRuntime};

/// Options passed to resolve hooks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Resolution is for a top-level request rather than an import
    pub is_entry: bool,
    /// Skip the calling plugin when resolving through the context
    pub skip_self: bool,
}

/// State shared by every hook call of one build.
#[derive(Debug)]
pub(crate) struct BuildScope {
    pub(crate) root: PathBuf,
    pub(crate) runtime: Arc<dyn Runtime>,
    pub(crate) pipeline: Arc<OrderedPipeline>,
    watch_files: Mutex<BTreeSet<PathBuf>>,
}

impl BuildScope {
    pub(crate) fn new(
        root: PathBuf,
        runtime: Arc<dyn Runtime>,
        pipeline: Arc<OrderedPipeline>,
    ) -> Arc<Self> {
        Arc::new(Self {
            root,
            runtime,
            pipeline,
            watch_files: Mutex::new(BTreeSet::new()),
        })
    }

    pub(crate) fn add_watch_file(&self, path: &Path) {
        let path = if path.is_absolute() {
            path.clean()
        } else {
            self.root.join(path).clean()
        };
        self.watch_files.lock().insert(path);
    }

    pub(crate) fn take_watch_files(&self) -> BTreeSet<PathBuf> {
        std::mem::take(&mut *self.watch_files.lock())
    }

    pub(crate) fn context(self: &Arc<Self>, plugin_index: Option<usize>) -> PluginContext {
        PluginContext {
            scope: Arc::clone(self),
            plugin_index,
        }
    }
}

/// Handle given to every hook call.
///
/// Files registered with [`add_watch_file`](Self::add_watch_file) become
/// upstream dependencies of the resource being built.
#[derive(Debug, Clone)]
pub struct PluginContext {
    scope: Arc<BuildScope>,
    plugin_index: Option<usize>,
}

impl PluginContext {
    /// Context outside of any build, backed by the filesystem and an empty
    /// pipeline. Lets hooks be called directly.
    pub fn detached(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let runtime: Arc<dyn Runtime> = Arc::new(SourceRuntime::new(root.clone()));
        BuildScope::new(root, runtime, Arc::new(OrderedPipeline::default())).context(None)
    }

    /// Files registered so far through [`add_watch_file`](Self::add_watch_file).
    pub fn watch_files(&self) -> Vec<PathBuf> {
        self.scope.watch_files.lock().iter().cloned().collect()
    }

    pub fn root(&self) -> &Path {
        &self.scope.root
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.scope.runtime
    }

    /// Declare that the current resource depends on `path`.
    ///
    /// Relative paths are resolved against the root.
    pub fn add_watch_file(&self, path: impl AsRef<Path>) {
        self.scope.add_watch_file(path.as_ref());
    }

    /// Read a source file as UTF-8.
    pub async fn read_to_string(&self, path: &Path) -> HookResult<String> {
        let bytes = self
            .scope
            .runtime
            .read_file(path)
            .await
            .map_err(|e| match e {
                RuntimeError::FileNotFound(path) => {
                    HookError::new(format!("Cannot find '{}'", path.display()))
                }
                other => HookError::new(other.to_string()),
            })?;
        String::from_utf8(bytes)
            .map_err(|_| HookError::new(format!("'{}' is not valid UTF-8", path.display())))
    }

    /// Resolve a specifier through the pipeline.
    ///
    /// With `opts.skip_self` the calling plugin's own resolve hook is skipped,
    /// which lets a plugin build on what the rest of the pipeline resolves to.
    pub async fn resolve(
        &self,
        specifier: &str,
        importer: Option<&ResourceId>,
        opts: ResolveOptions,
    ) -> HookResult<Option<ResolvedId>> {
        let skip = if opts.skip_self {
            self.plugin_index
        } else {
            None
        };
        let pipeline = Arc::clone(&self.scope.pipeline);
        pipeline
            .resolve_with(&self.scope, specifier, importer, opts, skip)
            .await
            .map(|resolved| resolved.map(|(_, id)| id))
            .map_err(HookError::from)
    }
}
