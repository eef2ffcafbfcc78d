//! Plugin ordering.
//!
//! Caller plugins are partitioned by their [`Enforce`] tag and built-in
//! plugins are spliced in at fixed positions, after every caller plugin
//! that is not `post`:
//!
//! ```text
//! user pre → user default → built-in pre-resolution → built-in post-resolution → user post
//! ```
//!
//! The partition is stable: plugins keep their relative order within a phase.

use std::sync::Arc;

use super::{BuildScope, Enforce, HookUsage, PluginDescriptor, ResolveOptions, ResolvedId};
use crate::diagnostics::{BuildError, BuildStage};
use crate::resource::ResourceId;

/// Mode flags that decide which built-ins are included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineMode {
    pub production: bool,
    /// Hot module updates requested
    pub hot: bool,
}

/// When a built-in plugin takes part in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Always,
    /// Outside production only
    Development,
    /// Outside production, and only with hot updates enabled
    Hot,
}

impl Condition {
    pub fn applies(self, mode: PipelineMode) -> bool {
        match self {
            Condition::Always => true,
            Condition::Development => !mode.production,
            Condition::Hot => !mode.production && mode.hot,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Builtin {
    pub descriptor: PluginDescriptor,
    pub condition: Condition,
}

impl Builtin {
    pub fn always(descriptor: PluginDescriptor) -> Self {
        Self {
            descriptor,
            condition: Condition::Always,
        }
    }

    pub fn when(condition: Condition, descriptor: PluginDescriptor) -> Self {
        Self {
            descriptor,
            condition,
        }
    }
}

/// Built-in plugins, run as two blocks between the caller's default and
/// post phases.
#[derive(Debug, Clone, Default)]
pub struct BuiltinSet {
    pub pre_resolution: Vec<Builtin>,
    pub post_resolution: Vec<Builtin>,
}

/// Plugins in execution order.
#[derive(Debug, Clone, Default)]
pub struct OrderedPipeline {
    plugins: Vec<PluginDescriptor>,
}

/// Compose the execution order. Pure: the same input always yields the same
/// pipeline.
pub fn compose(
    plugins: Vec<PluginDescriptor>,
    builtins: &BuiltinSet,
    mode: PipelineMode,
) -> OrderedPipeline {
    let mut pre = Vec::new();
    let mut default = Vec::new();
    let mut post = Vec::new();

    for plugin in plugins {
        match plugin.enforce() {
            Enforce::Pre => pre.push(plugin),
            Enforce::Default => default.push(plugin),
            Enforce::Post => post.push(plugin),
        }
    }

    let active = |block: &[Builtin]| -> Vec<PluginDescriptor> {
        block
            .iter()
            .filter(|builtin| builtin.condition.applies(mode))
            .map(|builtin| builtin.descriptor.clone())
            .collect()
    };

    let mut ordered = pre;
    ordered.extend(default);
    ordered.extend(active(&builtins.pre_resolution));
    ordered.extend(active(&builtins.post_resolution));
    ordered.extend(post);

    OrderedPipeline { plugins: ordered }
}

impl OrderedPipeline {
    pub fn plugins(&self) -> &[PluginDescriptor] {
        &self.plugins
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(PluginDescriptor::name).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Plugins implementing `hook`, with their pipeline index.
    pub fn with_hook(
        &self,
        hook: HookUsage,
    ) -> impl Iterator<Item = (usize, &PluginDescriptor)> + '_ {
        self.plugins
            .iter()
            .enumerate()
            .filter(move |(_, plugin)| plugin.has_hook(hook))
    }

    /// Run resolve hooks in order, skipping the plugin at `skip`.
    ///
    /// Returns the answering plugin's name with its answer.
    pub(crate) async fn resolve_with(
        &self,
        scope: &Arc<BuildScope>,
        specifier: &str,
        importer: Option<&ResourceId>,
        opts: ResolveOptions,
        skip: Option<usize>,
    ) -> Result<Option<(String, ResolvedId)>, BuildError> {
        for (index, plugin) in self.with_hook(HookUsage::RESOLVE) {
            if Some(index) == skip {
                continue;
            }

            let ctx = scope.context(Some(index));
            match plugin
                .plugin()
                .resolve(&ctx, specifier, importer, &opts)
                .await
            {
                Ok(Some(resolved)) => return Ok(Some((plugin.name().to_string(), resolved))),
                Ok(None) => {}
                Err(err) => {
                    return Err(BuildError::from_hook(
                        BuildStage::Resolve,
                        plugin.name(),
                        specifier,
                        err,
                        None,
                    ));
                }
            }
        }
        Ok(None)
    }
}
