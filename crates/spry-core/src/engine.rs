//! On-demand build engine.
//!
//! ```text
//! build(id) → cache hit? → done
//!           → in flight? → await the shared build
//!           → load hooks (first answer wins, else read from the runtime)
//!           → transform hooks (in order)
//!           → commit to cache unless invalidated meanwhile
//! ```
//!
//! Concurrent requests for the same id share a single build, which runs as
//! its own task so it completes its bookkeeping even if every request
//! waiting on it is dropped. A request only starts a second build when the
//! running one went stale: its id, its source file or one of its known
//! upstream files was invalidated after it started.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use path_clean::PathClean;
use rustc_hash::FxHashMap;

use crate::cache::{CacheEntry, Generation, TransformCache};
use crate::diagnostics::{BuildError, BuildStage};
use crate::graph::DependencyTracker;
use crate::plugin::{BuildScope, HookUsage, OrderedPipeline, ResolveOptions, TransformOutput};
use crate::resource::ResourceId;
use crate::runtime::{Runtime, RuntimeError};

/// Result of a build
pub type BuildResult = Result<Arc<CacheEntry>, BuildError>;

type SharedBuild = Shared<BoxFuture<'static, BuildResult>>;

struct InFlight {
    started: Generation,
    serial: u64,
    future: SharedBuild,
}

struct EngineInner {
    root: PathBuf,
    pipeline: Arc<OrderedPipeline>,
    runtime: Arc<dyn Runtime>,
    cache: TransformCache,
    tracker: DependencyTracker,
    in_flight: Mutex<FxHashMap<ResourceId, InFlight>>,
    next_serial: AtomicU64,
}

/// Builds resources through the plugin pipeline and caches the results.
///
/// Cloning is cheap; clones share the cache, the tracker and in-flight
/// builds.
#[derive(Clone)]
pub struct BuildEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for BuildEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildEngine")
            .field("root", &self.inner.root)
            .field("plugins", &self.inner.pipeline.names())
            .field("cached", &self.inner.cache.len())
            .finish()
    }
}

impl BuildEngine {
    pub fn new(
        root: impl Into<PathBuf>,
        pipeline: OrderedPipeline,
        runtime: Arc<dyn Runtime>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                root: root.into(),
                pipeline: Arc::new(pipeline),
                runtime,
                cache: TransformCache::new(),
                tracker: DependencyTracker::new(),
                in_flight: Mutex::new(FxHashMap::default()),
                next_serial: AtomicU64::new(0),
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn pipeline(&self) -> &OrderedPipeline {
        &self.inner.pipeline
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.inner.runtime
    }

    pub fn cache(&self) -> &TransformCache {
        &self.inner.cache
    }

    pub fn tracker(&self) -> &DependencyTracker {
        &self.inner.tracker
    }

    /// Number of builds currently running.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    /// Build `id`, or return the cached result.
    pub async fn build(&self, id: &ResourceId) -> BuildResult {
        if let Some(entry) = self.inner.cache.get(id) {
            tracing::trace!(%id, "cache hit");
            return Ok(entry);
        }

        let future = {
            let mut in_flight = self.inner.in_flight.lock();
            if let Some(entry) = self.inner.cache.get(id) {
                return Ok(entry);
            }

            match in_flight.get(id) {
                Some(pending) if !self.went_stale(id, pending.started) => {
                    tracing::trace!(%id, "joining in-flight build");
                    pending.future.clone()
                }
                _ => {
                    let started = self.inner.cache.begin();
                    let serial = self.inner.next_serial.fetch_add(1, Ordering::Relaxed);
                    let task = tokio::spawn(self.clone().run(id.clone(), started, serial));
                    let task_id = id.clone();
                    let future = async move {
                        task.await.unwrap_or_else(|err| {
                            Err(BuildError::new(
                                BuildStage::Transform,
                                task_id.as_str(),
                                format!("build task failed: {err}"),
                            ))
                        })
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(
                        id.clone(),
                        InFlight {
                            started,
                            serial,
                            future: future.clone(),
                        },
                    );
                    future
                }
            }
        };

        future.await
    }

    /// Resolve a request path or import specifier to a resource.
    ///
    /// Resolve hooks run first; without an answer the specifier is taken as
    /// a path under the root, which must exist.
    pub async fn resolve(
        &self,
        specifier: &str,
        importer: Option<&ResourceId>,
    ) -> Result<ResourceId, BuildError> {
        let scope = self.scope();
        let opts = ResolveOptions {
            is_entry: importer.is_none(),
            skip_self: false,
        };

        if let Some((plugin, resolved)) = self
            .inner
            .pipeline
            .resolve_with(&scope, specifier, importer, opts, None)
            .await?
        {
            return self.to_resource(&resolved.id).ok_or_else(|| {
                let mut err = BuildError::new(
                    BuildStage::Resolve,
                    specifier,
                    format!("'{}' is outside the served root", resolved.id),
                );
                err.plugin = Some(plugin);
                err
            });
        }

        let id = ResourceId::from_specifier(specifier, importer)
            .ok_or_else(|| BuildError::not_found(specifier))?;
        if self.inner.runtime.is_file(&id.to_path(&self.inner.root)) {
            Ok(id)
        } else {
            Err(BuildError::not_found(id.as_str()))
        }
    }

    /// Evict one resource.
    pub fn invalidate(&self, id: &ResourceId) -> bool {
        self.inner.cache.invalidate(id)
    }

    /// Drop every cached result and dependency edge.
    pub fn clear(&self) {
        self.inner.cache.clear();
        self.inner.tracker.clear();
    }

    /// Whether a build of `id` started at `started` can no longer commit.
    fn went_stale(&self, id: &ResourceId, started: Generation) -> bool {
        let mut files: BTreeSet<PathBuf> = self.inner.tracker.upstreams_of(id);
        files.insert(id.to_path(&self.inner.root).clean());
        self.inner.cache.is_stale_with(id, &files, started)
    }

    fn scope(&self) -> Arc<BuildScope> {
        BuildScope::new(
            self.inner.root.clone(),
            Arc::clone(&self.inner.runtime),
            Arc::clone(&self.inner.pipeline),
        )
    }

    fn to_resource(&self, resolved: &str) -> Option<ResourceId> {
        let path = Path::new(resolved);
        if path.is_absolute() && path.starts_with(&self.inner.root) {
            ResourceId::from_path(&self.inner.root, path)
        } else {
            ResourceId::from_request(resolved)
        }
    }

    async fn run(self, id: ResourceId, started: Generation, serial: u64) -> BuildResult {
        let _running = Running {
            engine: &self,
            id: &id,
            started,
            serial,
        };
        let timer = Instant::now();
        let result = self.execute(&id).await.map(Arc::new);

        match &result {
            Ok(entry) => {
                if self.inner.cache.commit(Arc::clone(entry), started) {
                    self.inner
                        .tracker
                        .replace(&id, entry.upstream.iter().cloned());
                    tracing::debug!(
                        %id,
                        elapsed_ms = timer.elapsed().as_millis() as u64,
                        "built"
                    );
                } else {
                    tracing::debug!(%id, "discarding build invalidated while running");
                }
            }
            Err(err) => tracing::debug!(%id, error = %err, "build failed"),
        }

        result
    }

    async fn execute(&self, id: &ResourceId) -> Result<CacheEntry, BuildError> {
        let scope = self.scope();
        let pipeline = &self.inner.pipeline;
        let source_path = id.to_path(&self.inner.root);
        scope.add_watch_file(&source_path);

        let mut loaded = None;
        for (index, plugin) in pipeline.with_hook(HookUsage::LOAD) {
            let ctx = scope.context(Some(index));
            match plugin.plugin().load(&ctx, id).await {
                Ok(Some(output)) => {
                    tracing::trace!(%id, plugin = plugin.name(), "loaded by plugin");
                    loaded = Some(output);
                    break;
                }
                Ok(None) => {}
                Err(err) => {
                    return Err(BuildError::from_hook(
                        BuildStage::Load,
                        plugin.name(),
                        id.as_str(),
                        err,
                        None,
                    ));
                }
            }
        }

        let TransformOutput { mut code, mut map } = match loaded {
            Some(output) => output,
            None => self.read_source(id, &source_path).await?,
        };

        for (index, plugin) in pipeline.with_hook(HookUsage::TRANSFORM) {
            let ctx = scope.context(Some(index));
            match plugin.plugin().transform(&ctx, &code, id).await {
                Ok(Some(output)) => {
                    code = output.code;
                    if output.map.is_some() {
                        map = output.map;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    return Err(BuildError::from_hook(
                        BuildStage::Transform,
                        plugin.name(),
                        id.as_str(),
                        err,
                        Some(&code),
                    ));
                }
            }
        }

        Ok(CacheEntry {
            id: id.clone(),
            content: code,
            source_map: map,
            upstream: scope.take_watch_files(),
        })
    }

    async fn read_source(
        &self,
        id: &ResourceId,
        path: &Path,
    ) -> Result<TransformOutput, BuildError> {
        let bytes = self
            .inner
            .runtime
            .read_file(path)
            .await
            .map_err(|err| match err {
                RuntimeError::FileNotFound(_) => BuildError::not_found(id.as_str()),
                other => BuildError::new(BuildStage::Load, id.as_str(), other.to_string()),
            })?;

        let code = String::from_utf8(bytes).map_err(|_| {
            BuildError::new(
                BuildStage::Load,
                id.as_str(),
                "binary content cannot go through the transform pipeline",
            )
        })?;
        Ok(TransformOutput::code(code))
    }
}

/// Releases a build's bookkeeping when it ends, including by panic.
struct Running<'a> {
    engine: &'a BuildEngine,
    id: &'a ResourceId,
    started: Generation,
    serial: u64,
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        let inner = &self.engine.inner;
        let mut in_flight = inner.in_flight.lock();
        if in_flight
            .get(self.id)
            .is_some_and(|pending| pending.serial == self.serial)
        {
            in_flight.remove(self.id);
        }
        inner.cache.finish(self.started);
    }
}
