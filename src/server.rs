//! FastAGI connection server: accept loop, per-connection workers, drain

use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::constants::DEFAULT_CONNECTION_DEADLINE_MS;
use crate::error::{AgiError, AgiResult};
use crate::session::AgiSession;

/// Application callback invoked once per accepted FastAGI connection.
///
/// The token is a cooperative cancellation scope: it is cancelled when the
/// server shuts down or the connection deadline fires, and the handler is
/// expected to return promptly once it observes cancellation. The returned
/// error is logged by the worker and not interpreted further; retry policy,
/// if desired, belongs to the handler.
///
/// Any `Fn(CancellationToken, Arc<AgiSession>) -> impl Future` closure
/// implements this trait:
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use asterisk_agi_tokio::{AgiResult, AgiSession, FastAgiServer};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> AgiResult<()> {
/// let server = FastAgiServer::bind(
///     "127.0.0.1:4573",
///     |_cancel: CancellationToken, session: Arc<AgiSession>| async move {
///         session.answer().await?;
///         session.stream_file("welcome", "").await?;
///         session.hangup().await
///     },
/// )
/// .await?;
/// server.serve().await
/// # }
/// ```
pub trait AgiHandler: Send + Sync + 'static {
    /// Handle one session. Called on the connection's own worker task.
    fn handle(
        &self,
        cancel: CancellationToken,
        session: Arc<AgiSession>,
    ) -> Pin<Box<dyn Future<Output = AgiResult<()>> + Send>>;
}

impl<F, Fut> AgiHandler for F
where
    F: Fn(CancellationToken, Arc<AgiSession>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AgiResult<()>> + Send + 'static,
{
    fn handle(
        &self,
        cancel: CancellationToken,
        session: Arc<AgiSession>,
    ) -> Pin<Box<dyn Future<Output = AgiResult<()>> + Send>> {
        Box::pin((self)(cancel, session))
    }
}

/// Server parameters fixed at bind time.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Hard deadline applied to each accepted connection, covering the
    /// environment read and the whole handler run. Default: 30 seconds.
    pub connection_deadline: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            connection_deadline: Duration::from_millis(DEFAULT_CONNECTION_DEADLINE_MS),
        }
    }
}

/// Handle for stopping a running [`FastAgiServer`] from another task.
#[derive(Clone)]
pub struct ServerHandle {
    cancel: CancellationToken,
    done_rx: watch::Receiver<bool>,
}

impl ServerHandle {
    /// Signal shutdown and wait until the accept loop has exited and every
    /// in-flight worker has finished. Idempotent.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let mut done_rx = self.done_rx.clone();
        while !*done_rx.borrow_and_update() {
            if done_rx.changed().await.is_err() {
                // Server dropped without serving; nothing left to drain.
                break;
            }
        }
    }

    /// The server-wide cancellation scope.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// TCP server accepting FastAGI connections from Asterisk.
///
/// One tokio task per accepted connection; acceptance never blocks on
/// request handling. There is no admission control — load limiting, if
/// needed, belongs outside this server.
pub struct FastAgiServer {
    listener: TcpListener,
    handler: Arc<dyn AgiHandler>,
    options: ServerOptions,
    cancel: CancellationToken,
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
}

impl std::fmt::Debug for FastAgiServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastAgiServer")
            .field("listener", &self.listener)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl FastAgiServer {
    /// Bind the listening socket. Fails with [`AgiError::Bind`] if the
    /// address is unavailable.
    pub async fn bind(
        addr: impl ToSocketAddrs + ToString,
        handler: impl AgiHandler,
    ) -> AgiResult<Self> {
        Self::bind_with_options(addr, handler, ServerOptions::default()).await
    }

    /// [`bind`](Self::bind) with explicit [`ServerOptions`].
    pub async fn bind_with_options(
        addr: impl ToSocketAddrs + ToString,
        handler: impl AgiHandler,
        options: ServerOptions,
    ) -> AgiResult<Self> {
        let listener = TcpListener::bind(&addr).await.map_err(|e| AgiError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;
        info!(addr = %addr.to_string(), "FastAGI server listening");

        let (done_tx, done_rx) = watch::channel(false);
        Ok(Self {
            listener,
            handler: Arc::new(handler),
            options,
            cancel: CancellationToken::new(),
            done_tx,
            done_rx,
        })
    }

    /// Local address of the listening socket.
    pub fn local_addr(&self) -> AgiResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle for stopping the server from another task.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            cancel: self.cancel.clone(),
            done_rx: self.done_rx.clone(),
        }
    }

    /// Accept connections until stopped or a fatal accept failure.
    ///
    /// A stop requested through [`ServerHandle::stop`] terminates the loop
    /// normally (`Ok`); any other accept failure is fatal and surfaced as
    /// [`AgiError::Accept`]. Either way, the listener is closed and all
    /// in-flight workers are drained before this returns.
    pub async fn serve(self) -> AgiResult<()> {
        let Self {
            listener,
            handler,
            options,
            cancel,
            done_tx,
            done_rx: _,
        } = self;

        let mut workers: JoinSet<()> = JoinSet::new();

        let result = loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("FastAGI server stop requested");
                    break Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, in_flight = workers.len() + 1, "accepted FastAGI connection");
                        // Reap already-finished workers so the set does not
                        // grow unbounded on a long-lived server.
                        while workers.try_join_next().is_some() {}

                        let deadline = Instant::now() + options.connection_deadline;
                        workers.spawn(handle_connection(
                            stream,
                            peer,
                            Arc::clone(&handler),
                            cancel.child_token(),
                            deadline,
                        ));
                    }
                    Err(e) => {
                        error!(error = %e, "accept failed, shutting down");
                        cancel.cancel();
                        break Err(AgiError::Accept(e));
                    }
                },
            }
        };

        // Close the listener first, then wait for the in-flight workers.
        // Workers cannot outlive their connection deadline, so the drain is
        // bounded even with unresponsive peers.
        drop(listener);
        if !workers.is_empty() {
            info!(in_flight = workers.len(), "draining FastAGI workers");
        }
        while workers.join_next().await.is_some() {}

        let _ = done_tx.send(true);
        result
    }
}

/// One worker per accepted connection.
///
/// The connection is closed and the worker leaves the in-flight set on every
/// exit path: normal return, handler error, deadline expiry, or panic. A
/// panicking handler never takes the accept loop down with it.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<dyn AgiHandler>,
    cancel: CancellationToken,
    deadline: Instant,
) {
    let run = timeout_at(deadline, run_session(stream, peer, handler, cancel.clone()));
    match AssertUnwindSafe(run).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(_elapsed)) => warn!(%peer, "connection deadline expired, dropping session"),
        Err(_) => error!(%peer, "connection worker panicked"),
    }
    // Release the session scope no matter how the worker terminated.
    cancel.cancel();
}

async fn run_session(
    stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<dyn AgiHandler>,
    cancel: CancellationToken,
) {
    let (read_half, write_half) = stream.into_split();

    let session = match AgiSession::with_cancellation(read_half, write_half, cancel.clone()).await {
        Ok(session) => Arc::new(session),
        Err(e) => {
            warn!(%peer, error = %e, "failed to read AGI environment");
            return;
        }
    };

    if let Err(e) = handler.handle(cancel, Arc::clone(&session)).await {
        warn!(%peer, error = %e, "AGI handler failed");
    }
    session.close();
}
