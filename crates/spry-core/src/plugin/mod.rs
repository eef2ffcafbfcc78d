//! Plugin contract.
//!
//! A plugin declares the hooks it implements through [`HookUsage`]; the
//! pipeline only calls hooks whose bit is set. Plugins are composed into an
//! [`OrderedPipeline`] once per server instance and are immutable afterwards.

mod context;
mod ordering;

pub use context::{PluginContext, ResolveOptions};
pub(crate) use context::BuildScope;
pub use ordering::{Builtin, BuiltinSet, Condition, OrderedPipeline, PipelineMode, compose};

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize};

use crate::diagnostics::HookResult;
use crate::resource::ResourceId;

bitflags! {
    /// Hooks a plugin implements.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HookUsage: u8 {
        const RESOLVE = 1 << 0;
        const LOAD = 1 << 1;
        const TRANSFORM = 1 << 2;
        const WATCH_CHANGE = 1 << 3;
    }
}

/// Execution phase tag.
///
/// Deserializes leniently: a missing or unrecognized tag is `Default`, so
/// plugin metadata written for newer phases still loads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Enforce {
    Pre,
    #[default]
    Default,
    Post,
}

impl Enforce {
    /// Parse a phase tag. Missing and unknown tags mean `Default`.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("pre") => Enforce::Pre,
            Some("post") => Enforce::Post,
            _ => Enforce::Default,
        }
    }
}

impl<'de> Deserialize<'de> for Enforce {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = Option::<String>::deserialize(deserializer)?;
        Ok(Enforce::from_tag(tag.as_deref()))
    }
}

/// Answer of a resolve hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedId {
    /// Root-relative path, URL path or absolute file path
    pub id: String,
}

impl ResolvedId {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Content produced by a load or transform hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub code: String,
    pub map: Option<String>,
}

impl TransformOutput {
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            map: None,
        }
    }

    pub fn with_map(mut self, map: impl Into<String>) -> Self {
        self.map = Some(map.into());
        self
    }
}

pub type LoadOutput = TransformOutput;

/// A transform plugin.
///
/// Every hook is optional. A hook that does not apply to a resource returns
/// `Ok(None)` and the pipeline moves on to the next plugin.
#[async_trait]
pub trait Plugin: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn enforce(&self) -> Enforce {
        Enforce::Default
    }

    fn register_hook_usage(&self) -> HookUsage;

    /// Map a specifier to a resource. First answer wins.
    async fn resolve(
        &self,
        _ctx: &PluginContext,
        _specifier: &str,
        _importer: Option<&ResourceId>,
        _opts: &ResolveOptions,
    ) -> HookResult<Option<ResolvedId>> {
        Ok(None)
    }

    /// Produce the initial content of a resource. First answer wins.
    async fn load(&self, _ctx: &PluginContext, _id: &ResourceId) -> HookResult<Option<LoadOutput>> {
        Ok(None)
    }

    /// Replace the content of a resource. Every transform runs in order.
    async fn transform(
        &self,
        _ctx: &PluginContext,
        _code: &str,
        _id: &ResourceId,
    ) -> HookResult<Option<TransformOutput>> {
        Ok(None)
    }

    /// Resources that must be rebuilt because `path` changed.
    fn watch_change(&self, _path: &Path) -> Vec<ResourceId> {
        Vec::new()
    }
}

pub type SharedPlugin = Arc<dyn Plugin>;

/// A plugin with its metadata captured at composition time.
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    name: String,
    enforce: Enforce,
    hooks: HookUsage,
    plugin: SharedPlugin,
}

impl PluginDescriptor {
    pub fn new(plugin: SharedPlugin) -> Self {
        Self {
            name: plugin.name().to_string(),
            enforce: plugin.enforce(),
            hooks: plugin.register_hook_usage(),
            plugin,
        }
    }

    pub fn from_plugin<P: Plugin + 'static>(plugin: P) -> Self {
        Self::new(Arc::new(plugin))
    }

    /// Override the phase declared by the plugin.
    pub fn with_enforce(mut self, enforce: Enforce) -> Self {
        self.enforce = enforce;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enforce(&self) -> Enforce {
        self.enforce
    }

    pub fn hooks(&self) -> HookUsage {
        self.hooks
    }

    pub fn has_hook(&self, hook: HookUsage) -> bool {
        self.hooks.contains(hook)
    }

    pub fn plugin(&self) -> &SharedPlugin {
        &self.plugin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Named(&'static str);

    impl Plugin for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn enforce(&self) -> Enforce {
            Enforce::Post
        }

        fn register_hook_usage(&self) -> HookUsage {
            HookUsage::TRANSFORM | HookUsage::WATCH_CHANGE
        }
    }

    #[test]
    fn unknown_tags_are_default() {
        let parse = |json: &str| serde_json::from_str::<Enforce>(json).unwrap();
        assert_eq!(parse("null"), Enforce::Default);
        assert_eq!(parse(r#""pre""#), Enforce::Pre);
        assert_eq!(parse(r#""post""#), Enforce::Post);
        assert_eq!(parse(r#""later""#), Enforce::Default);
        assert_eq!(serde_json::to_string(&Enforce::Pre).unwrap(), r#""pre""#);
    }

    #[test]
    fn descriptor_captures_metadata() {
        let descriptor = PluginDescriptor::from_plugin(Named("demo"));
        assert_eq!(descriptor.name(), "demo");
        assert_eq!(descriptor.enforce(), Enforce::Post);
        assert!(descriptor.has_hook(HookUsage::TRANSFORM));
        assert!(!descriptor.has_hook(HookUsage::LOAD));

        let descriptor = descriptor.with_enforce(Enforce::Pre);
        assert_eq!(descriptor.enforce(), Enforce::Pre);
    }
}
