//! Accept loop with tracked connections.
//!
//! Each accepted socket is served on its own task, registered in a
//! [`ConnectionSet`] so that shutting down can terminate every open
//! connection, keep-alive ones included, instead of waiting for them.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Open HTTP connections of one server instance.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSet {
    tracker: TaskTracker,
    kill: CancellationToken,
    open: Arc<AtomicUsize>,
}

struct OpenGuard(Arc<AtomicUsize>);

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of connections currently being served.
    pub fn open(&self) -> usize {
        self.open.load(Ordering::Acquire)
    }

    /// Serve `stream` until the peer leaves or [`destroy`](Self::destroy).
    pub fn serve(&self, stream: TcpStream, router: Router) {
        self.open.fetch_add(1, Ordering::AcqRel);
        let guard = OpenGuard(Arc::clone(&self.open));
        let kill = self.kill.clone();

        self.tracker.spawn(async move {
            let _guard = guard;
            let service = TowerToHyperService::new(router);
            let conn = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .with_upgrades();

            tokio::select! {
                result = conn => {
                    if let Err(err) = result {
                        tracing::debug!(error = %err, "connection ended with error");
                    }
                }
                _ = kill.cancelled() => {
                    tracing::trace!("connection destroyed");
                }
            }
        });
    }

    /// Terminate every open connection and wait until they are gone.
    ///
    /// Upgraded sockets are not covered; they are closed by their session.
    pub async fn destroy(&self) {
        self.kill.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

/// Accept connections until `stop` is cancelled. The listener is dropped,
/// releasing the port, when this returns.
pub async fn accept_loop(
    listener: TcpListener,
    router: Router,
    connections: ConnectionSet,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::trace!(%peer, "accepted");
                    connections.serve(stream, router.clone());
                }
                Err(err) => {
                    tracing::debug!(error = %err, "accept failed");
                }
            }
        }
    }
    tracing::debug!("listener released");
}
