//! Restarts on configuration changes.
//!
//! Only the files listed by [`Supervisor::config_files`] are watched here.
//! Source files go through each instance's own watcher and the invalidation
//! dispatcher; they never restart the server.

use tokio::sync::mpsc;

use crate::dev::lifecycle::Supervisor;
use crate::dev::watcher::{FileChange, FileWatcher};
use crate::error::Result;

const CONFIG_DEBOUNCE_MS: u64 = 100;

/// A [`Supervisor`] plus the watcher over its config files.
pub struct ConfigReloader {
    supervisor: Supervisor,
    /// Kept alive for the lifetime of `changes`
    _watcher: FileWatcher,
    changes: mpsc::Receiver<FileChange>,
}

impl ConfigReloader {
    pub fn new(supervisor: Supervisor) -> Result<Self> {
        let (watcher, changes) = watch(&supervisor)?;
        Ok(Self {
            supervisor,
            _watcher: watcher,
            changes,
        })
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Wait for the next config file change.
    ///
    /// Returns `None` once the watcher has stopped.
    pub async fn changed(&mut self) -> Option<FileChange> {
        self.changes.recv().await
    }

    /// Restart the instance and watch the new snapshot's config files.
    ///
    /// The watch list is refreshed whether or not the restart succeeds, so
    /// a fixed config is picked up on the next save. Returns the new port.
    pub async fn restart(&mut self) -> Result<u16> {
        let outcome = self.supervisor.restart().await.map(|server| server.port());

        match watch(&self.supervisor) {
            Ok((watcher, changes)) => {
                self._watcher = watcher;
                self.changes = changes;
            }
            Err(err) => {
                tracing::warn!(error = %err, "keeping the previous config watcher");
            }
        }
        outcome
    }

    pub async fn shutdown(self) {
        self.supervisor.shutdown().await;
    }
}

fn watch(supervisor: &Supervisor) -> Result<(FileWatcher, mpsc::Receiver<FileChange>)> {
    let files = supervisor.config_files();
    tracing::debug!(files = files.len(), "watching config files");
    FileWatcher::files(files, CONFIG_DEBOUNCE_MS)
}
