use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::http::connection::Connection;
use crate::server::handler::Handler;

const ACCEPT_BACKOFF_BASE: Duration = Duration::from_millis(5);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// A running server: a listening socket plus its background accept loop.
///
/// Every accepted connection gets its own task and serves one request.
/// Dropping the server stops accepting, like [`Server::close`] without
/// waiting.
pub struct Server {
    local_addr: SocketAddr,
    open: Arc<AtomicBool>,
    shutdown: broadcast::Sender<()>,
    accept_task: Option<JoinHandle<()>>,
}

impl Server {
    /// Listens on `port` on all interfaces and starts accepting.
    pub async fn serve<H: Handler>(port: u16, handler: H) -> anyhow::Result<Self> {
        Self::bind(("0.0.0.0", port), handler).await
    }

    /// Listens on `addr` and starts accepting. Only the bind can fail.
    pub async fn bind<A, H>(addr: A, handler: H) -> anyhow::Result<Self>
    where
        A: ToSocketAddrs,
        H: Handler,
    {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Listening on {}", local_addr);

        let open = Arc::new(AtomicBool::new(true));
        let (shutdown, shutdown_rx) = broadcast::channel(1);

        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::new(handler),
            Arc::clone(&open),
            shutdown_rx,
        ));

        Ok(Self {
            local_addr,
            open,
            shutdown,
            accept_task: Some(accept_task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Stops accepting and waits for the accept loop to release the socket.
    ///
    /// Connections already being served keep running. Closing twice is an
    /// error.
    pub async fn close(&mut self) -> anyhow::Result<()> {
        let task = self
            .accept_task
            .take()
            .ok_or_else(|| anyhow::anyhow!("server already closed"))?;

        self.open.store(false, Ordering::Release);
        let _ = self.shutdown.send(());
        task.await?;

        info!("Server on {} closed", self.local_addr);
        Ok(())
    }
}

async fn accept_loop<H: Handler>(
    listener: TcpListener,
    handler: Arc<H>,
    open: Arc<AtomicBool>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut failures = 0u32;

    loop {
        let accepted = tokio::select! {
            _ = shutdown.recv() => break,
            res = listener.accept() => res,
        };

        // A close racing with accept wins; the socket is dropped unserved.
        if !open.load(Ordering::Acquire) {
            break;
        }

        let (socket, peer) = match accepted {
            Ok(ok) => ok,
            Err(e) => {
                failures = failures.saturating_add(1);
                let delay = accept_backoff(failures);
                warn!(error = %e, failures, ?delay, "Failed to accept connection");

                // Persistent errors like EMFILE would otherwise spin the loop.
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = tokio::time::sleep(delay) => continue,
                }
            }
        };
        failures = 0;
        debug!(%peer, "Accepted connection");

        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            let mut conn = Connection::new(socket, handler);
            if let Err(e) = conn.run().await {
                error!(%peer, error = %e, "Connection error");
            }
        });
    }

    info!("Accept loop stopped");
}

/// Delay before the next accept after `failures` consecutive errors.
fn accept_backoff(failures: u32) -> Duration {
    let shift = failures.saturating_sub(1).min(16);
    ACCEPT_BACKOFF_BASE
        .saturating_mul(1 << shift)
        .min(ACCEPT_BACKOFF_MAX)
}
