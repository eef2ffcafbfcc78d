//! Stylesheet preprocessing for the spry dev server.
//!
//! [`StylesPlugin`] compiles `.less` resources through a [`StyleEngine`]
//! chosen once, at construction, by an [`EngineProvider`]. The default
//! provider uses the built-in [`InlineImportEngine`]; setting
//! `SPRY_DISABLE_STYLES=true` leaves the plugin without an engine, in which
//! case `.less` requests fail with an install hint instead of crashing the
//! server.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use spry_core::{Enforce, PluginDescriptor};
//! use spry_plugin_styles::{EngineProvider, StylesPlugin};
//!
//! let styles = StylesPlugin::new(EngineProvider::resolve(true)).with_sourcemap(false);
//! let descriptor = PluginDescriptor::from_plugin(styles).with_enforce(Enforce::Pre);
//! assert_eq!(descriptor.name(), "styles");
//! ```

mod engine;
mod inline;
mod plugin;
mod provider;

pub use engine::{
    EngineError, ImportLoader, LoadedImport, RenderOutput, RenderRequest, StyleEngine,
};
pub use inline::InlineImportEngine;
pub use plugin::StylesPlugin;
pub use provider::{DISABLE_ENV, EngineProvider};
