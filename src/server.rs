//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//!
//! The server reacts by:
//! 1. Immediately stopping `listener.accept()`, so no new connections are made.
//! 2. Asking every open connection to close once its in-flight request is
//!    answered. Idle keep-alive connections close at once.
//! 3. Waiting at most the drain timeout for that, then aborting whatever is
//!    left.
//! 4. Returning from [`Server::serve`], which lets `main` exit cleanly.
//!
//! The gateway's default request timeout is 300 s, far beyond the default
//! grace period. Raise `terminationGracePeriodSeconds` accordingly if
//! in-flight model calls must survive a rollout.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::logger::ACCESS_LOG_TARGET;
use crate::response::ResponseBody;
use crate::router::Router;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    suppressed: Arc<[String]>,
    drain_timeout: Duration,
}

const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    pub fn bind(addr: SocketAddr) -> Self {
        Self { addr, suppressed: Arc::from(Vec::new()), drain_timeout: DEFAULT_DRAIN_TIMEOUT }
    }

    /// How long shutdown waits for open connections before aborting them.
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Paths whose requests are not written to the access log.
    pub fn suppress_access_log(mut self, paths: Arc<[String]>) -> Self {
        self.suppressed = paths;
        self
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), but stops accepting when `signal`
    /// resolves instead of on a process signal.
    pub async fn serve_with_shutdown(
        self,
        router: Router,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let router = Arc::new(router);
        let suppressed = self.suppressed;

        info!(addr = %self.addr, "ollama-gateway listening");

        let builder = ConnBuilder::new(TokioExecutor::new());
        let graceful = GracefulShutdown::new();
        let mut tasks = tokio::task::JoinSet::new();

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Shutdown first so a SIGTERM stops accepting even with
                // connections queued.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let suppressed = Arc::clone(&suppressed);
                    let io = TokioIo::new(stream);

                    // Called once per request on the connection.
                    let svc = service_fn(move |req| {
                        let router = Arc::clone(&router);
                        let suppressed = Arc::clone(&suppressed);
                        async move { dispatch(&router, req, remote_addr, &suppressed).await }
                    });

                    let conn = graceful.watch(builder.serve_connection(io, svc).into_owned());
                    tasks.spawn(async move {
                        if let Err(e) = conn.await {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the set does not grow
                // without bound.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        drop(listener);

        let drained = async {
            graceful.shutdown().await;
            while tasks.join_next().await.is_some() {}
        };
        if tokio::time::timeout(self.drain_timeout, drained).await.is_err() {
            warn!(remaining = tasks.len(), "drain timeout elapsed, aborting open connections");
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        info!("ollama-gateway stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Routes one request, writes the access-log line, hands the response to hyper.
///
/// Infallible: every failure is already a rendered response.
async fn dispatch(
    router: &Router,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
    suppressed: &[String],
) -> Result<http::Response<ResponseBody>, std::convert::Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let version = req.version();
    let started = Instant::now();

    let response = router.handle(req).await;

    if !suppressed.iter().any(|p| *p == path) {
        info!(
            target: ACCESS_LOG_TARGET,
            "{remote_addr} - \"{method} {path} {version:?}\" {} {:.1}ms",
            response.status().as_u16(),
            started.elapsed().as_secs_f64() * 1000.0,
        );
    }

    Ok(response)
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C).
/// On Windows only Ctrl-C is available. A handler that fails to install is
/// logged and never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
