//! # spry-core
//!
//! On-demand transform pipeline, dependency-aware invalidation and live
//! update plumbing for the spry dev server.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use spry_config::ConfigSnapshot;
//! use spry_core::{BuildEngine, ResourceId, SourceRuntime, builtins};
//!
//! # async fn example() -> Result<(), spry_core::BuildError> {
//! let config = ConfigSnapshot::for_root("./public");
//! let pipeline = builtins::pipeline_for(&config, Vec::new());
//! let engine = BuildEngine::new(&config.root, pipeline, Arc::new(SourceRuntime::new(&config.root)));
//!
//! let id = engine.resolve("/src/app", None).await?;
//! let entry = engine.build(&id).await?;
//! println!("{}", entry.content);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`plugin`]: plugin contract and ordering
//! - [`engine`]: cached on-demand builds
//! - [`graph`]: upstream file → resource edges
//! - [`invalidation`]: file change → eviction → notification
//! - [`bus`] / [`protocol`]: live-update fan-out and wire messages

pub mod builtins;
pub mod bus;
pub mod cache;
pub mod diagnostics;
pub mod engine;
pub mod graph;
pub mod invalidation;
pub mod plugin;
pub mod protocol;
pub mod resource;
pub mod runtime;

pub use bus::{ClientId, LiveUpdateBus};
pub use cache::{CacheEntry, Generation, TransformCache};
pub use diagnostics::{
    BuildError, BuildStage, HookError, HookResult, SourceLocation, render_code_frame,
};
pub use engine::{BuildEngine, BuildResult};
pub use graph::DependencyTracker;
pub use invalidation::{Invalidation, InvalidationDispatcher, ReloadPolicy, ReloadPolicyError};
pub use plugin::{
    Enforce, HookUsage, LoadOutput, OrderedPipeline, PipelineMode, Plugin, PluginContext,
    PluginDescriptor, ResolveOptions, ResolvedId, SharedPlugin, TransformOutput, compose,
};
pub use protocol::{Change, ChangeKind, LiveMessage};
pub use resource::ResourceId;
pub use runtime::{Runtime, RuntimeError, RuntimeResult, SourceRuntime};
