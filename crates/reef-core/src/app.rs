//! Application and dispatch entry point
//!
//! An [`App`] owns the configuration, the chain-wide handlers, the mounted
//! [`Router`] and the object pools. Each request acquires a context,
//! request wrapper and response buffer, runs the bound chain to
//! completion, flushes the response once and returns everything to the
//! pools, including when a handler panics.

use crate::config::Config;
use crate::context::{Context, Handler, HandlerChain};
use crate::pool::Pool;
use crate::request::Request;
use crate::response::{Response, ResponseWriter};
use crate::router::Router;
use crate::server::ConnectionTracker;
use bytes::Bytes;
use http_body_util::Full;
use std::net::SocketAddr;
use tokio::sync::watch;

/// Request dispatch engine
pub struct App {
    pub(crate) config: Config,
    handlers: HandlerChain,
    router: Option<Router>,
    contexts: Pool<Context>,
    requests: Pool<Request>,
    responses: Pool<Response>,
    pub(crate) tracker: ConnectionTracker,
    /// Flips to `true` once shutdown starts
    pub(crate) shutdown: watch::Sender<bool>,
}

impl App {
    pub fn new(config: Config) -> Self {
        let max_idle = config.max_idle_objects;
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            handlers: Vec::new(),
            router: None,
            contexts: Pool::new(max_idle),
            requests: Pool::new(max_idle),
            responses: Pool::new(max_idle),
            tracker: ConnectionTracker::new(),
            shutdown,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Add handlers that run first on every request, matched or not
    pub fn use_handlers(&mut self, handlers: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.handlers.extend(handlers);
        self
    }

    /// Mount the router, replacing any router mounted before
    pub fn routes(&mut self, router: Router) -> &mut Self {
        if self.config.debug {
            tracing::debug!(router = ?router, "router mounted");
        }
        self.router = Some(router);
        self
    }

    pub fn router(&self) -> Option<&Router> {
        self.router.as_ref()
    }

    pub fn context_pool(&self) -> &Pool<Context> {
        &self.contexts
    }

    pub fn request_pool(&self) -> &Pool<Request> {
        &self.requests
    }

    pub fn response_pool(&self) -> &Pool<Response> {
        &self.responses
    }

    /// Run one request through the chain and flush the result to `writer`
    ///
    /// The chain is the app handlers followed by the router middlewares
    /// and the matched route's handlers, or the not-found handler on a
    /// miss. With no router mounted only the app handlers run.
    pub fn dispatch_into<W: ResponseWriter>(
        &self,
        req: http::Request<Bytes>,
        remote_addr: Option<SocketAddr>,
        writer: &mut W,
    ) {
        let mut lease = Lease {
            app: self,
            ctx: self.contexts.acquire(),
        };
        let ctx = &mut lease.ctx;

        ctx.use_handlers(self.handlers.iter().cloned());
        let params = match &self.router {
            Some(router) => router.bind_chain(ctx, req.method().as_str(), req.uri().path()),
            None => Vec::new(),
        };

        if self.config.debug {
            tracing::debug!(
                method = %req.method(),
                uri = %req.uri(),
                params = ?params,
                "dispatching"
            );
        }

        let mut request = self.requests.acquire();
        request.bind(req, remote_addr);
        ctx.bind(request, self.responses.acquire(), params);

        ctx.next();
        ctx.response_mut().flush_into(writer);
    }

    /// Run one request and return the hyper response
    pub fn dispatch(
        &self,
        req: http::Request<Bytes>,
        remote_addr: Option<SocketAddr>,
    ) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(Bytes::new()));
        self.dispatch_into(req, remote_addr, &mut res);
        res
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("handlers", &self.handlers.len())
            .field("router", &self.router)
            .field("contexts", &self.contexts)
            .finish()
    }
}

/// Pooled objects checked out for one request
///
/// Dropping the lease returns the context, request and response to their
/// pools, so a panicking handler cannot leak them.
struct Lease<'a> {
    app: &'a App,
    ctx: Context,
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        let mut ctx = std::mem::take(&mut self.ctx);
        let (request, response) = ctx.unbind();
        self.app.requests.release(request);
        self.app.responses.release(response);
        self.app.contexts.release(ctx);
    }
}
