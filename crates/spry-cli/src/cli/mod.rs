//! Command-line interface definition.
//!
//! - `spry start` - serve a project with live updates

mod commands;

use clap::Parser;

pub use commands::{Command, StartArgs};

/// spry - on-demand dev server for front-end sources
#[derive(Parser, Debug)]
#[command(
    name = "spry",
    version,
    about = "On-demand dev server with live updates",
    long_about = "spry serves a project's sources straight from disk, transforming each\n\
                  resource the first time it is requested and pushing updates to the\n\
                  browser when files change."
)]
pub struct Cli {
    /// Log debug events from the spry crates
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Never color output, even on a terminal
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}
