//! Built-in plugins.
//!
//! Both blocks run after the caller's `pre` and default plugins and before
//! its `post` plugins, in table order.
//!
//! | Block | Plugin | Condition |
//! |---|---|---|
//! | pre-resolution | `alias` | always |
//! | pre-resolution | `hot-accept` | development with `features.hot` |
//! | post-resolution | `json` | always |
//! | post-resolution | `process-env` | always |
//! | post-resolution | `resolve-extensions` | always |

mod alias;
mod env;
mod extensions;
mod hot;
mod json;

pub use alias::AliasPlugin;
pub use env::ProcessEnvPlugin;
pub use extensions::{RESOLVE_EXTENSIONS, ResolveExtensionsPlugin};
pub use hot::HotAcceptPlugin;
pub use json::JsonPlugin;

use spry_config::ConfigSnapshot;

use crate::plugin::{
    Builtin, BuiltinSet, Condition, OrderedPipeline, PipelineMode, PluginDescriptor, compose,
};
use crate::resource::ResourceId;

/// The standard built-in set for a configuration.
pub fn standard(config: &ConfigSnapshot) -> BuiltinSet {
    BuiltinSet {
        pre_resolution: vec![
            Builtin::always(PluginDescriptor::from_plugin(AliasPlugin::new(
                config.alias.clone(),
            ))),
            Builtin::when(
                Condition::Hot,
                PluginDescriptor::from_plugin(HotAcceptPlugin),
            ),
        ],
        post_resolution: vec![
            Builtin::always(PluginDescriptor::from_plugin(JsonPlugin)),
            Builtin::always(PluginDescriptor::from_plugin(ProcessEnvPlugin::new(
                config.mode,
                config.env.clone(),
            ))),
            Builtin::always(PluginDescriptor::from_plugin(ResolveExtensionsPlugin)),
        ],
    }
}

/// Mode flags for a configuration.
pub fn pipeline_mode(config: &ConfigSnapshot) -> PipelineMode {
    PipelineMode {
        production: config.is_production(),
        hot: config.features.hot,
    }
}

/// Compose caller plugins with the standard built-ins for `config`.
pub fn pipeline_for(config: &ConfigSnapshot, plugins: Vec<PluginDescriptor>) -> OrderedPipeline {
    compose(plugins, &standard(config), pipeline_mode(config))
}

/// Whether `id` is a script module.
pub(crate) fn is_script(id: &ResourceId) -> bool {
    matches!(
        id.extension(),
        Some("js" | "mjs" | "cjs" | "jsx" | "ts" | "mts" | "tsx")
    )
}
