//! HTTP server and graceful shutdown.
//!
//! The server is the transport around [`App`]: it accepts connections
//! (optionally over TLS), turns each hyper request into a [`Request`],
//! runs it through [`App::run`], and writes back the finished [`Response`].
//!
//! # Startup
//!
//! Everything that can be checked before listening is checked before
//! listening: the bind address is parsed and the TLS key material is loaded
//! and validated first. A failure there is returned from [`Server::serve`]
//! and no socket is ever opened.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **Ctrl-C** the server:
//! 1. Immediately stops `listener.accept()` — no new connections are made.
//! 2. Tells every open connection to shut down: idle keep-alive connections
//!    close at once, busy ones after their in-flight request is answered.
//! 3. Returns from [`Server::serve`] once every connection task has ended,
//!    which lets `main` exit cleanly.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::server::graceful::{GracefulShutdown, Watcher};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::error::Error;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::tls::TlsConfig;

/// The HTTP server.
pub struct Server {
    addr: String,
    tls: Option<TlsConfig>,
}

impl Server {
    /// Configures the server to bind to `addr` (`host:port`) when
    /// [`serve`](Server::serve) is called.
    ///
    /// ```rust,no_run
    /// use veslo::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: impl Into<String>) -> Self {
        Self { addr: addr.into(), tls: None }
    }

    /// Serves HTTPS with the PEM-encoded `key` and `cert` chain.
    ///
    /// The files are read when [`serve`](Server::serve) starts.
    pub fn tls(mut self, key: impl Into<PathBuf>, cert: impl Into<PathBuf>) -> Self {
        self.tls = Some(TlsConfig::from_pem_files(key, cert));
        self
    }

    /// Starts accepting connections and dispatching them through `app`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, app: App) -> Result<(), Error> {
        self.serve_with_shutdown(app, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), but stops when `signal` resolves.
    pub async fn serve_with_shutdown(
        self,
        app: App,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let addr: SocketAddr = self.addr.parse()
            .map_err(|_| Error::InvalidAddress(self.addr.clone()))?;
        let acceptor = self.tls.as_ref().map(TlsConfig::acceptor).transpose()?;

        let listener = TcpListener::bind(addr).await?;

        // Shared by every connection task; read-only from here on.
        let app = Arc::new(app);

        info!(%addr, tls = acceptor.is_some(), "veslo listening");

        let mut tasks = tokio::task::JoinSet::new();
        let graceful = GracefulShutdown::new();

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Check shutdown first so a signal stops accepting at once,
                // even if more connections are queued.
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

                    let app = Arc::clone(&app);
                    let acceptor = acceptor.clone();
                    let watcher = graceful.watcher();

                    tasks.spawn(async move {
                        match acceptor {
                            Some(acceptor) => match acceptor.accept(stream).await {
                                Ok(stream) => serve_connection(stream, app, remote_addr, watcher).await,
                                Err(e) => warn!(peer = %remote_addr, "tls handshake failed: {e}"),
                            },
                            None => serve_connection(stream, app, remote_addr, watcher).await,
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Stop accepting, ask every watched connection to close, then wait
        // for the connection tasks (including pending TLS handshakes).
        drop(listener);
        graceful.shutdown().await;
        while tasks.join_next().await.is_some() {}

        info!("veslo stopped");
        Ok(())
    }
}

async fn serve_connection<S>(stream: S, app: Arc<App>, remote_addr: SocketAddr, watcher: Watcher)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    // `service_fn` is called once per request on the connection.
    let svc = service_fn(move |req| {
        let app = Arc::clone(&app);
        async move { dispatch(app, req).await }
    });

    // `auto::Builder` serves HTTP/1.1 and HTTP/2, whichever the client speaks.
    let conn = ConnBuilder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(stream), svc)
        .into_owned();

    // The watcher switches the connection to graceful shutdown once the
    // server stops.
    if let Err(e) = watcher.watch(conn).await {
        error!(peer = %remote_addr, "connection error: {e}");
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Converts one hyper request, runs it through the app, converts back.
///
/// The error type is [`Infallible`]: every failure inside the app is already
/// a 404/500 response by the time `App::run` returns.
async fn dispatch(
    app: Arc<App>,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let Ok(method) = req.method().as_str().parse::<Method>() else {
        debug!(method = %req.method(), "unsupported method");
        return Ok(status_only(StatusCode::METHOD_NOT_ALLOWED));
    };

    let url = req.uri().path_and_query().map_or("/", |pq| pq.as_str()).to_owned();
    let mut headers: Vec<(String, String)> = req.headers().iter()
        .map(|(name, value)| (name.as_str().to_owned(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
        .collect();
    // HTTP/2 carries the host in the `:authority` pseudo-header.
    if !req.headers().contains_key(http::header::HOST) {
        if let Some(authority) = req.uri().authority() {
            headers.push(("host".to_owned(), authority.as_str().to_owned()));
        }
    }

    let raw = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(url = %url, "failed to read request body: {e}");
            return Ok(status_only(StatusCode::BAD_REQUEST));
        }
    };

    let request = Request::new(method, url).with_headers(headers).with_raw_body(raw);
    let response = app.run(request, Response::new()).await;
    Ok(response.into_http())
}

fn status_only(status: StatusCode) -> http::Response<Full<Bytes>> {
    let mut res = http::Response::new(Full::new(Bytes::new()));
    *res.status_mut() = status;
    res
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C).
/// On Windows only Ctrl-C is available. A handler that cannot be installed
/// is logged and never fires.
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

    // `pending()` never resolves: on non-Unix platforms the SIGTERM arm is
    // effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
