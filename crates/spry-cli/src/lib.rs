//! spry CLI - the `spry` binary and its dev server.
//!
//! # Architecture
//!
//! - [`cli`] - argument parsing with clap
//! - [`commands`] - command implementations
//! - [`dev`] - HTTP server, WebSocket live-update transport, file watching
//!   and the restartable instance lifecycle
//! - [`error`] - CLI error type and miette conversion
//! - [`logger`] - tracing subscriber setup
//! - [`ui`] - status lines, spinner and banner
//!
//! # Example
//!
//! ```rust,no_run
//! use spry_cli::dev::{RunningServer, StartOptions};
//! use spry_config::ConfigSnapshot;
//!
//! # async fn run() -> spry_cli::Result<()> {
//! let server = RunningServer::start(ConfigSnapshot::for_root("./public"), StartOptions::default()).await?;
//! println!("listening on {}", server.local_addr());
//! server.close().await;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod commands;
pub mod dev;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{CliError, Result, ResultExt};
