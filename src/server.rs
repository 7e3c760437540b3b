//! HTTP server for the [`RadixEngine`] and graceful shutdown.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//!
//! The server reacts by:
//! 1. Immediately stopping `listener.accept()`, so no new connections are made.
//! 2. Canceling the signal every in-flight [`Context`](crate::Context)
//!    inherits, so handlers waiting on `ctx.done()` can wrap up early.
//! 3. Letting every in-flight connection task run to completion.
//! 4. Returning from [`Server::serve`], which lets `main` exit cleanly.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::cancel::Signal;
use crate::engine::RadixEngine;
use crate::engine::radix::Native;
use crate::error::Error;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

// ── Configuration ─────────────────────────────────────────────────────────────

/// Server settings, loadable from any serde format the host application uses.
///
/// ```rust
/// let config: keel::ServerConfig = serde_json::from_str(
///     r#"{ "addr": "0.0.0.0:8080", "request_timeout_secs": 30 }"#,
/// ).unwrap();
/// let server = keel::Server::from_config(&config);
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// `host:port` to listen on.
    pub addr: String,
    /// Deadline attached to every request's cancellation signal.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

// ── Server ────────────────────────────────────────────────────────────────────

enum Listen {
    Addr(String),
    Listener(TcpListener),
}

/// The HTTP server.
pub struct Server {
    listen: Listen,
    request_timeout: Option<Duration>,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called. An invalid address is reported by `serve`.
    ///
    /// ```rust
    /// use keel::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: impl Into<String>) -> Self {
        Self { listen: Listen::Addr(addr.into()), request_timeout: None }
    }

    /// Serves on an already-bound listener (e.g. port `0` in tests).
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { listen: Listen::Listener(listener), request_timeout: None }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        let server = Self::bind(config.addr.clone());
        match config.request_timeout_secs {
            Some(secs) => server.request_timeout(Duration::from_secs(secs)),
            None => server,
        }
    }

    /// Gives every request a deadline `timeout` after it arrives.
    ///
    /// The core does not enforce it; handlers observe it through
    /// [`Cancellation`](crate::Cancellation) on their context.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Serves until SIGTERM or Ctrl-C, then drains in-flight requests.
    pub async fn serve(self, engine: RadixEngine) -> Result<(), Error> {
        self.serve_with_shutdown(engine, shutdown_signal()).await
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests.
    pub async fn serve_with_shutdown(
        self,
        engine: RadixEngine,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = match self.listen {
            Listen::Listener(listener) => listener,
            Listen::Addr(addr) => {
                let addr: SocketAddr = addr.parse().map_err(|_| Error::InvalidAddr(addr))?;
                TcpListener::bind(addr).await?
            }
        };

        // Shared by every connection task without copying the routing table.
        let engine = Arc::new(engine);
        let root = CancellationToken::new();
        let timeout = self.request_timeout;

        info!(addr = %listener.local_addr()?, "keel listening");

        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown first, so a SIGTERM stops accepting immediately
                // even if more connections are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    root.cancel();
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

                    let engine = Arc::clone(&engine);
                    let conn_token = root.child_token();
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let engine = Arc::clone(&engine);
                            let mut signal = Signal::from_token(conn_token.child_token());
                            if let Some(timeout) = timeout {
                                signal = signal.with_timeout(timeout);
                            }
                            async move { dispatch(&engine, req, signal, remote_addr).await }
                        });

                        // HTTP/1.1 or HTTP/2, whatever the client negotiates.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet stays bounded.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("keel stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Maps one hyper request onto the engine and back.
///
/// Infallible: unknown methods answer `405`, unreadable bodies `400`, and
/// everything else is up to the engine.
async fn dispatch(
    engine: &RadixEngine,
    req: hyper::Request<hyper::body::Incoming>,
    signal: Signal,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, std::convert::Infallible> {
    let (parts, body) = req.into_parts();

    let Ok(method) = Method::try_from(&parts.method) else {
        return Ok(Response::from_status(http::StatusCode::METHOD_NOT_ALLOWED, "method not allowed").into_http());
    };

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!(peer = %remote_addr, "failed to read request body: {e}");
            return Ok(Response::from_status(http::StatusCode::BAD_REQUEST, "unreadable body").into_http());
        }
    };

    let mut request = Request::new(method, parts.uri.path())
        .with_headers(parts.headers)
        .with_body(body);
    if let Some(query) = parts.uri.query() {
        request = request.with_query(query);
    }

    let native = Native { remote_addr, version: parts.version };
    Ok(engine.dispatch(request, signal, native).await.into_http())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C).
/// On Windows only Ctrl-C is available. If a handler cannot be installed the
/// corresponding arm never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
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
