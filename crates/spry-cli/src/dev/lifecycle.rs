//! Server instances and hot restart.
//!
//! A [`RunningServer`] owns everything bound to one [`ConfigSnapshot`]: the
//! listener, its connections, the live-update bus and the source watcher.
//! The [`Supervisor`] replaces the instance when configuration changes,
//! keeping the port the first instance resolved.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use spry_config::{ConfigLoader, ConfigSnapshot};
use spry_core::{LiveMessage, LiveUpdateBus, ReloadPolicy};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dev::connections::{ConnectionSet, accept_loop};
use crate::dev::retry::RetryPolicy;
use crate::dev::server::router;
use crate::dev::state::{DevState, SharedState};
use crate::dev::watcher::FileWatcher;
use crate::error::{CliError, Result};

/// How long live sessions get to flush the restart notice.
const SESSION_DRAIN: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct StartOptions {
    /// Watch the served root for source changes
    pub watch: bool,
    /// Applied when binding the listener
    pub retry: RetryPolicy,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            watch: true,
            retry: RetryPolicy::default(),
        }
    }
}

/// One bound server instance.
#[derive(Debug)]
pub struct RunningServer {
    state: SharedState,
    local_addr: SocketAddr,
    connections: ConnectionSet,
    stop: CancellationToken,
    accept: JoinHandle<()>,
    watcher: Option<JoinHandle<()>>,
}

impl RunningServer {
    /// Bind and start serving `config`.
    ///
    /// Port 0 binds an OS-assigned port; [`port`](Self::port) reports the
    /// one actually bound.
    pub async fn start(config: ConfigSnapshot, options: StartOptions) -> Result<Self> {
        let state = DevState::new(config)?;
        Self::serve(state, options).await
    }

    /// Start serving a prepared state.
    pub async fn serve(state: SharedState, options: StartOptions) -> Result<Self> {
        let addr = format!("{}:{}", state.config.host, state.config.port);
        let listener = options
            .retry
            .run(|| bind(&addr), CliError::is_addr_in_use)
            .await?;
        let local_addr = listener.local_addr()?;
        tracing::debug!(%local_addr, root = %state.config.root.display(), "listening");

        let watcher = if options.watch {
            Some(watch_sources(&state)?)
        } else {
            None
        };

        let connections = ConnectionSet::new();
        let stop = CancellationToken::new();
        let accept = tokio::spawn(accept_loop(
            listener,
            router(state.clone()),
            connections.clone(),
            stop.clone(),
        ));

        Ok(Self {
            state,
            local_addr,
            connections,
            stop,
            accept,
            watcher,
        })
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Addresses to print for the operator.
    ///
    /// A wildcard bind is shown as the loopback address plus the wildcard.
    pub fn addresses(&self) -> Vec<SocketAddr> {
        let ip = self.local_addr.ip();
        if !ip.is_unspecified() {
            return vec![self.local_addr];
        }
        let loopback = match ip {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
        };
        vec![SocketAddr::new(loopback, self.port()), self.local_addr]
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn config(&self) -> &ConfigSnapshot {
        &self.state.config
    }

    pub fn bus(&self) -> &LiveUpdateBus {
        &self.state.bus
    }

    pub fn open_connections(&self) -> usize {
        self.connections.open()
    }

    /// Shut the instance down.
    ///
    /// Clients are told about the restart and the channel is closed before
    /// any socket is destroyed; the listener is released last.
    pub async fn close(self) {
        let notified = self.state.bus.publish(LiveMessage::restarting());
        self.state.bus.close();

        self.state.sockets.close();
        if tokio::time::timeout(SESSION_DRAIN, self.state.sockets.wait())
            .await
            .is_err()
        {
            tracing::debug!("live sessions still open, closing them");
        }
        self.state.shutdown.cancel();
        let _ = tokio::time::timeout(SESSION_DRAIN, self.state.sockets.wait()).await;

        self.connections.destroy().await;

        self.stop.cancel();
        if let Err(err) = self.accept.await {
            tracing::debug!(error = %err, "accept loop ended abnormally");
        }

        if let Some(watcher) = self.watcher {
            watcher.abort();
        }
        self.state.engine.clear();
        tracing::debug!(notified, addr = %self.local_addr, "server closed");
    }
}

async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr).await.map_err(|source| CliError::Bind {
        addr: addr.to_string(),
        source,
    })
}

/// Feed source changes into the dispatcher until aborted.
fn watch_sources(state: &SharedState) -> Result<JoinHandle<()>> {
    let config = &state.config;
    let (watcher, mut rx) = FileWatcher::tree(
        config.root.clone(),
        config.watch.ignore.clone(),
        config.watch.debounce_ms,
    )?;

    let state = state.clone();
    Ok(tokio::spawn(async move {
        let _watcher = watcher;
        while let Some(change) = rx.recv().await {
            state.reporter.reset();
            let invalidation = state.dispatcher.dispatch(change.path());
            if !invalidation.is_noop() {
                tracing::info!(
                    path = %change.path().display(),
                    evicted = invalidation.evicted.len(),
                    reload = invalidation.needs_full_reload,
                    "file changed"
                );
            }
        }
    }))
}

/// Owns the current instance and replaces it on configuration changes.
#[derive(Debug)]
pub struct Supervisor {
    loader: ConfigLoader,
    options: StartOptions,
    current: Option<RunningServer>,
    /// Config files of the last loaded snapshot, kept when a boot fails
    watch_files: Vec<PathBuf>,
}

impl Supervisor {
    /// Boot the first instance and pin its port for later restarts.
    ///
    /// The first bind is not retried: a busy port at startup is fatal.
    pub async fn start(mut loader: ConfigLoader, options: StartOptions) -> Result<Self> {
        let config = loader.load()?;
        let first = StartOptions {
            retry: RetryPolicy::none(),
            ..options
        };
        let watch_files = config.watch_files.clone();
        let server = RunningServer::start(config, first).await?;
        loader.pin_port(server.port());

        Ok(Self {
            loader,
            options,
            current: Some(server),
            watch_files,
        })
    }

    pub fn current(&self) -> Option<&RunningServer> {
        self.current.as_ref()
    }

    /// Files whose change calls for a restart.
    ///
    /// Taken from the last snapshot that loaded, so they stay watched while
    /// no instance is running.
    pub fn config_files(&self) -> Vec<PathBuf> {
        self.watch_files.clone()
    }

    /// Replace the running instance with one built from a fresh snapshot.
    ///
    /// The snapshot is loaded and validated first; if that fails the
    /// current instance keeps serving and the error is returned.
    pub async fn restart(&mut self) -> Result<&RunningServer> {
        let config = self.loader.load()?;
        self.watch_files = config.watch_files.clone();
        ReloadPolicy::from_config(&config)?;

        if let Some(old) = self.current.take() {
            old.close().await;
        }

        let server = RunningServer::start(config, self.options).await?;
        tracing::debug!(port = server.port(), "server restarted");
        Ok(self.current.insert(server))
    }

    pub async fn shutdown(mut self) {
        if let Some(server) = self.current.take() {
            server.close().await;
        }
    }
}
