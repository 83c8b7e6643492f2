//! Native HTTP server
//!
//! hyper HTTP/1.1 on a multi-threaded tokio runtime:
//! - SO_REUSEPORT and TCP_NODELAY on the listening socket
//! - one task per connection
//! - handler chains run on the blocking pool, so handlers may block
//! - graceful shutdown with connection draining

use crate::app::App;
use crate::{Error, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use socket2::{Domain, Protocol, Socket, Type};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};

/// Drain deadline used by [`App::run`] after Ctrl-C
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a TCP socket with optimizations
pub fn create_optimized_socket(addr: &SocketAddr) -> std::io::Result<Socket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    // SO_REUSEADDR - allow binding to address in TIME_WAIT
    socket.set_reuse_address(true)?;

    // SO_REUSEPORT - enable kernel load balancing across threads
    #[cfg(unix)]
    socket.set_reuse_port(true)?;

    // TCP_NODELAY - disable Nagle's algorithm for lower latency
    socket.set_nodelay(true)?;

    socket.set_nonblocking(true)?;
    socket.bind(&(*addr).into())?;
    socket.listen(1024)?;

    Ok(socket)
}

/// Bind a tokio listener on an optimized socket
///
/// Must be called inside a tokio runtime.
pub fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let socket = create_optimized_socket(&addr)?;
    let listener = TcpListener::from_std(socket.into())?;
    Ok(listener)
}

// ============================================================================
// Connection Tracking for Graceful Shutdown
// ============================================================================

/// Tracks active connections for graceful shutdown
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    active: AtomicU64,
    shutting_down: AtomicBool,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    #[inline]
    pub fn decrement(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Current active connection count
    #[inline]
    pub fn count(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    /// Signal that shutdown is in progress
    pub fn start_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }
}

impl App {
    /// Bind the configured address and serve until Ctrl-C
    ///
    /// Builds a multi-threaded runtime with `Config::workers` threads and
    /// blocks the calling thread. Open connections get
    /// [`DEFAULT_SHUTDOWN_TIMEOUT`] to drain. The global log subscriber is
    /// installed first unless one is already set.
    pub fn run(self) -> Result<()> {
        crate::logging::init(self.config.debug);
        let addr = self.config.listen_addr()?;
        let runtime = build_runtime(self.config.workers)?;

        runtime.block_on(async move {
            let listener = bind(addr)?;
            let app = Arc::new(self);
            let server = Arc::clone(&app).serve(listener);
            app.serve_until_ctrl_c(server).await
        })
    }

    /// Serve HTTPS on the configured address until Ctrl-C
    ///
    /// `Config::cert_file` and `Config::key_file` must both be set.
    pub fn run_tls(self) -> Result<()> {
        crate::logging::init(self.config.debug);
        let (cert, key) = self.config.tls_files()?;
        self.run_tls_with(&cert, &key)
    }

    #[cfg(feature = "tls")]
    fn run_tls_with(self, cert: &Path, key: &Path) -> Result<()> {
        let acceptor = crate::tls::acceptor(cert, key)?;
        let addr = self.config.listen_addr()?;
        let runtime = build_runtime(self.config.workers)?;

        runtime.block_on(async move {
            let listener = bind(addr)?;
            let app = Arc::new(self);
            let server = Arc::clone(&app).serve_tls(listener, acceptor);
            app.serve_until_ctrl_c(server).await
        })
    }

    #[cfg(not(feature = "tls"))]
    fn run_tls_with(self, _cert: &Path, _key: &Path) -> Result<()> {
        Err(Error::Tls(
            "TLS support not enabled. Compile with 'tls' feature.".to_string(),
        ))
    }

    async fn serve_until_ctrl_c(&self, server: impl Future<Output = Result<()>>) -> Result<()> {
        tokio::select! {
            res = server => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT).await
            }
        }
    }

    /// Accept plain HTTP connections until [`shutdown`](Self::shutdown)
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        self.accept_loop(listener, |app, stream, remote| {
            app.serve_connection(TokioIo::new(stream), remote)
        })
        .await
    }

    /// Accept TLS connections until [`shutdown`](Self::shutdown)
    #[cfg(feature = "tls")]
    pub async fn serve_tls(
        self: Arc<Self>,
        listener: TcpListener,
        acceptor: tokio_rustls::TlsAcceptor,
    ) -> Result<()> {
        self.accept_loop(listener, move |app, stream, remote| {
            let acceptor = acceptor.clone();
            async move {
                match acceptor.accept(stream).await {
                    Ok(tls_stream) => app.serve_connection(TokioIo::new(tls_stream), remote).await,
                    Err(e) => tracing::debug!(%remote, error = %e, "TLS handshake failed"),
                }
            }
        })
        .await
    }

    /// Stop accepting, let open connections finish, and wait for them
    ///
    /// Returns [`Error::ShutdownTimeout`] if connections are still open
    /// when `timeout` elapses.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.tracker.start_shutdown();
        self.shutdown.send_replace(true);

        let start = Instant::now();
        loop {
            let active = self.tracker.count();
            if active == 0 {
                tracing::info!("server stopped");
                return Ok(());
            }

            if start.elapsed() >= timeout {
                tracing::warn!(remaining = active, "shutdown deadline reached");
                return Err(Error::ShutdownTimeout { remaining: active });
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Number of open connections
    pub fn active_connections(&self) -> u64 {
        self.tracker.count()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.tracker.is_shutting_down()
    }

    async fn accept_loop<F, Fut>(self: Arc<Self>, listener: TcpListener, connection: F) -> Result<()>
    where
        F: Fn(Arc<Self>, TcpStream, SocketAddr) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown_rx = self.shutdown.subscribe();
        if *shutdown_rx.borrow_and_update() {
            return Ok(());
        }

        tracing::info!(addr = %listener.local_addr()?, "listening");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, remote) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };

                    // Reject new connections during shutdown
                    if self.tracker.is_shutting_down() {
                        drop(stream);
                        continue;
                    }

                    let _ = stream.set_nodelay(true);
                    self.tracker.increment();

                    let app = Arc::clone(&self);
                    let conn = connection(Arc::clone(&self), stream, remote);
                    tokio::spawn(async move {
                        conn.await;
                        app.tracker.decrement();
                    });
                }
                _ = shutdown_rx.changed() => break,
            }
        }

        tracing::info!("listener closed");
        Ok(())
    }

    async fn serve_connection<I>(self: Arc<Self>, io: I, remote: SocketAddr)
    where
        I: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
    {
        let app = Arc::clone(&self);
        let service = service_fn(move |req| handle_request(Arc::clone(&app), req, remote));

        let conn = http1::Builder::new().serve_connection(io, service);
        tokio::pin!(conn);

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut draining = *shutdown_rx.borrow_and_update();
        if draining {
            conn.as_mut().graceful_shutdown();
        }

        loop {
            tokio::select! {
                res = conn.as_mut() => {
                    if let Err(e) = res {
                        // Only log if not a normal connection close
                        if !e.is_incomplete_message() {
                            tracing::warn!(%remote, error = %e, "connection error");
                        }
                    }
                    break;
                }
                _ = shutdown_rx.changed(), if !draining => {
                    draining = true;
                    conn.as_mut().graceful_shutdown();
                }
            }
        }
    }
}

fn build_runtime(workers: usize) -> Result<tokio::runtime::Runtime> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers.max(1))
        .enable_all()
        .build()?;
    Ok(runtime)
}

async fn handle_request(
    app: Arc<App>,
    req: hyper::Request<Incoming>,
    remote: SocketAddr,
) -> std::result::Result<hyper::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::warn!(%remote, error = %e, "failed to read request body");
            return Ok(plain_response(hyper::StatusCode::BAD_REQUEST, "Bad Request"));
        }
    };
    let req = hyper::Request::from_parts(parts, body);

    match tokio::task::spawn_blocking(move || app.dispatch(req, Some(remote))).await {
        Ok(res) => Ok(res),
        Err(e) => {
            let err = Error::Hyper(e.to_string());
            tracing::error!(%remote, error = %err, "handler chain failed");
            Ok(plain_response(
                hyper::StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
            ))
        }
    }
}

fn plain_response(status: hyper::StatusCode, body: &'static str) -> hyper::Response<Full<Bytes>> {
    let mut res = hyper::Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *res.status_mut() = status;
    res.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static(crate::response::mime::TEXT),
    );
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_tracker() {
        let tracker = ConnectionTracker::new();
        tracker.increment();
        tracker.increment();
        tracker.decrement();
        assert_eq!(tracker.count(), 1);

        assert!(!tracker.is_shutting_down());
        tracker.start_shutdown();
        assert!(tracker.is_shutting_down());
    }

    #[test]
    fn test_plain_response() {
        let res = plain_response(hyper::StatusCode::BAD_REQUEST, "Bad Request");
        assert_eq!(res.status(), 400);
        assert_eq!(res.headers().get("content-type").unwrap(), "text/plain");
    }

    #[tokio::test]
    async fn test_shutdown_without_connections() {
        let app = App::default();
        app.shutdown(Duration::from_millis(50)).await.unwrap();
        assert!(app.is_shutting_down());
    }

    #[tokio::test]
    async fn test_shutdown_timeout_reports_remaining() {
        let app = App::default();
        app.tracker.increment();

        let err = app.shutdown(Duration::from_millis(30)).await.unwrap_err();
        assert!(matches!(err, Error::ShutdownTimeout { remaining: 1 }));
    }

    #[tokio::test]
    async fn test_serve_after_shutdown_returns_immediately() {
        let app = Arc::new(App::default());
        app.shutdown(Duration::from_millis(10)).await.unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        app.serve(listener).await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let listener = bind("127.0.0.1:0".parse().unwrap()).unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }
}
