//! `spry start`: serve until Ctrl+C, restarting on config changes.

use std::time::{Duration, Instant};

use tokio::signal;

use crate::cli::StartArgs;
use crate::dev::{ConfigReloader, FileChange, RunningServer, StartOptions, Supervisor};
use crate::error::Result;
use crate::ui;

/// Execute the start command.
///
/// Only configuration errors at the first boot and a failed first bind end
/// the process; later errors are printed and the last good instance keeps
/// serving.
pub async fn execute(args: StartArgs) -> Result<()> {
    let started = Instant::now();
    let supervisor = Supervisor::start(args.loader(), StartOptions::default()).await?;
    if let Some(server) = supervisor.current() {
        announce(server, started.elapsed());
    }

    let mut reloader = ConfigReloader::new(supervisor)?;
    ui::info("Press Ctrl+C to stop");

    loop {
        tokio::select! {
            Some(change) = reloader.changed() => restart(&mut reloader, &change).await,
            _ = signal::ctrl_c() => {
                ui::info("Shutting down...");
                break;
            }
        }
    }

    reloader.shutdown().await;
    ui::success("Server stopped");
    Ok(())
}

async fn restart(reloader: &mut ConfigReloader, change: &FileChange) {
    let name = change
        .path()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| change.path().display().to_string());
    ui::warning(&format!("{name} changed, restarting server..."));

    let spinner = ui::Spinner::new("Restarting server...");
    let started = Instant::now();
    match reloader.restart().await {
        Ok(port) => {
            spinner.finish(&format!(
                "Server restarted on port {port} in {}",
                ui::format_duration(started.elapsed())
            ));
        }
        Err(err) => {
            spinner.fail("Restart failed");
            ui::error(&err.to_string());
            if reloader.supervisor().current().is_some() {
                ui::info("Still serving the previous configuration");
            } else {
                ui::warning("No server is running; fix the problem and save again");
            }
        }
    }
}

fn announce(server: &RunningServer, ready_in: Duration) {
    ui::print_banner(&server.addresses(), &server.config().root, ready_in);
    if let Some(file) = &server.config().config_file {
        ui::info(&format!("Using {}", file.display()));
    }
}
