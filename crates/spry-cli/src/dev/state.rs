//! Shared state of one server instance.

use std::sync::Arc;

use spry_config::ConfigSnapshot;
use spry_core::builtins::pipeline_for;
use spry_core::{
    BuildEngine, InvalidationDispatcher, LiveUpdateBus, PluginDescriptor, ReloadPolicy,
    SourceRuntime,
};
use spry_plugin_styles::{EngineProvider, StylesPlugin};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::dev::reporter::Reporter;
use crate::error::Result;

/// Everything request handlers and the source watcher share.
///
/// Built from one [`ConfigSnapshot`] and dropped with the instance; a
/// restart builds a new one from scratch.
#[derive(Debug)]
pub struct DevState {
    pub config: Arc<ConfigSnapshot>,
    pub engine: BuildEngine,
    pub bus: LiveUpdateBus,
    pub dispatcher: InvalidationDispatcher,
    pub reporter: Reporter,
    /// Live sessions, drained on close
    pub sockets: TaskTracker,
    /// Cancelled when the instance shuts down
    pub shutdown: CancellationToken,
}

pub type SharedState = Arc<DevState>;

impl DevState {
    /// State with the standard plugins for `config`.
    pub fn new(config: ConfigSnapshot) -> Result<SharedState> {
        let styles = StylesPlugin::new(EngineProvider::resolve(config.features.styles))
            .with_sourcemap(config.features.sourcemap);
        Self::with_plugins(config, vec![PluginDescriptor::from_plugin(styles)])
    }

    pub fn with_plugins(
        config: ConfigSnapshot,
        plugins: Vec<PluginDescriptor>,
    ) -> Result<SharedState> {
        let policy = ReloadPolicy::from_config(&config)?;
        let runtime = SourceRuntime::new(&config.root);
        let engine = BuildEngine::new(&config.root, pipeline_for(&config, plugins), Arc::new(runtime));
        Ok(Self::assemble(config, engine, policy))
    }

    /// State around an engine built by the caller.
    pub fn with_engine(config: ConfigSnapshot, engine: BuildEngine) -> Result<SharedState> {
        let policy = ReloadPolicy::from_config(&config)?;
        Ok(Self::assemble(config, engine, policy))
    }

    fn assemble(config: ConfigSnapshot, engine: BuildEngine, policy: ReloadPolicy) -> SharedState {
        let bus = LiveUpdateBus::new();
        let dispatcher = InvalidationDispatcher::new(engine.clone(), policy, bus.clone());
        Arc::new(Self {
            config: Arc::new(config),
            engine,
            reporter: Reporter::new(bus.clone()),
            bus,
            dispatcher,
            sockets: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        })
    }
}
