//! Shared fixtures for engine and invalidation tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use spry_core::{
    BuildEngine, HookError, HookResult, HookUsage, OrderedPipeline, PipelineMode, Plugin,
    PluginContext, PluginDescriptor, ResourceId, SourceRuntime, TransformOutput, compose,
    plugin::BuiltinSet,
};
use tokio::sync::Notify;

pub const ROOT: &str = "/virtual";

pub fn id(path: &str) -> ResourceId {
    ResourceId::from_request(path).unwrap()
}

pub fn root_path(relative: &str) -> PathBuf {
    Path::new(ROOT).join(relative)
}

/// Engine over in-memory files with only the given plugins.
pub fn engine(files: &[(&str, &str)], plugins: Vec<PluginDescriptor>) -> BuildEngine {
    let runtime = SourceRuntime::new(ROOT);
    for (path, content) in files {
        runtime.add_virtual_file(path, *content);
    }
    let pipeline: OrderedPipeline = compose(plugins, &BuiltinSet::default(), PipelineMode::default());
    BuildEngine::new(ROOT, pipeline, Arc::new(runtime))
}

/// Counts transform calls and appends a marker comment.
#[derive(Debug, Default)]
pub struct Probe {
    pub calls: AtomicUsize,
    /// Fail this many calls before succeeding
    pub failures: AtomicUsize,
    pub started: Notify,
    pub release: Option<Notify>,
}

impl Probe {
    pub fn gated() -> Self {
        Self {
            release: Some(Notify::new()),
            ..Self::default()
        }
    }

    pub fn failing(times: usize) -> Self {
        Self {
            failures: AtomicUsize::new(times),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Wrapper so one probe can be shared with the test body.
#[derive(Debug, Clone)]
pub struct ProbePlugin(pub Arc<Probe>);

#[async_trait]
impl Plugin for ProbePlugin {
    fn name(&self) -> &str {
        "probe"
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::TRANSFORM
    }

    async fn transform(
        &self,
        _ctx: &PluginContext,
        code: &str,
        _id: &ResourceId,
    ) -> HookResult<Option<TransformOutput>> {
        self.0.calls.fetch_add(1, Ordering::SeqCst);
        self.0.started.notify_one();
        if let Some(release) = &self.0.release {
            release.notified().await;
        }

        let remaining = self.0.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.0.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(HookError::new("probe failure").with_location(1, 1));
        }

        Ok(Some(TransformOutput::code(format!("{code}\n/* probed */"))))
    }
}

/// For `*.bundle.js`, inlines the file named on its first line and declares
/// it as an upstream dependency.
#[derive(Debug, Default)]
pub struct InlinePlugin;

#[async_trait]
impl Plugin for InlinePlugin {
    fn name(&self) -> &str {
        "inline"
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::TRANSFORM
    }

    async fn transform(
        &self,
        ctx: &PluginContext,
        code: &str,
        id: &ResourceId,
    ) -> HookResult<Option<TransformOutput>> {
        if !id.as_str().ends_with(".bundle.js") {
            return Ok(None);
        }
        let target = code.lines().next().unwrap_or_default().trim();
        let path = ctx.root().join(target);
        let inlined = ctx.read_to_string(&path).await?;
        ctx.add_watch_file(&path);
        Ok(Some(TransformOutput::code(inlined)))
    }
}

/// Reports a fixed set of ids for any change of `trigger`.
#[derive(Debug)]
pub struct WatchPlugin {
    pub trigger: PathBuf,
    pub ids: Vec<ResourceId>,
}

#[async_trait]
impl Plugin for WatchPlugin {
    fn name(&self) -> &str {
        "watch"
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::WATCH_CHANGE
    }

    fn watch_change(&self, path: &Path) -> Vec<ResourceId> {
        if path == self.trigger {
            self.ids.clone()
        } else {
            Vec::new()
        }
    }
}
