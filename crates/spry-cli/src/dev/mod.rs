//! The dev server: HTTP and live-update surface, file watching and the
//! instance lifecycle.

pub mod connections;
pub mod lifecycle;
pub mod reload;
pub mod reporter;
pub mod retry;
pub mod server;
pub mod state;
pub mod watcher;

pub use connections::ConnectionSet;
pub use lifecycle::{RunningServer, StartOptions, Supervisor};
pub use reload::ConfigReloader;
pub use reporter::Reporter;
pub use retry::RetryPolicy;
pub use server::{CLIENT_SCRIPT_PATH, LIVE_SOCKET_PATH, router};
pub use state::{DevState, SharedState};
pub use watcher::{FileChange, FileWatcher};
