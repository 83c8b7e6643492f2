//! Route registration
//!
//! Wraps the reef-router segment trie with handler chains, router-level
//! middlewares and a not-found handler.
//!
//! Registration takes `&mut self`, so the borrow checker guarantees every
//! route is in place before the router is shared with request tasks.

use crate::context::{handler, Context, Handler, HandlerChain};
use crate::Method;
use percent_encoding::percent_decode_str;
use std::sync::Arc;

/// A resolved route: the registered chain plus captured path variables
pub type RouteMatch<'a> = reef_router::Match<'a, HandlerChain>;

/// Default handler for requests that match no route
///
/// Sends "Not Found" with status 404 and aborts the chain.
pub fn default_not_found(ctx: &mut Context) {
    let _ = ctx.string("Not Found", Some(404));
    ctx.abort();
}

/// Router configuration
#[derive(Clone, Default)]
pub struct RouterConfig {
    /// Handler for unmatched requests; [`default_not_found`] when `None`
    pub not_found: Option<Handler>,
}

/// HTTP router
///
/// One trie per method. A matched request runs the router middlewares
/// followed by the route's own handlers.
pub struct Router {
    tree: reef_router::Router<HandlerChain>,
    middlewares: HandlerChain,
    not_found: Handler,
}

impl Router {
    /// Create a router with the default not-found handler
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    /// Create a router from a config
    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            tree: reef_router::Router::new(),
            middlewares: Vec::new(),
            not_found: config.not_found.unwrap_or_else(|| handler(default_not_found)),
        }
    }

    /// Add middlewares that run before every matched route's handlers
    pub fn use_handlers(&mut self, handlers: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.middlewares.extend(handlers);
        self
    }

    /// Replace the not-found handler
    pub fn not_found(&mut self, handler: Handler) -> &mut Self {
        self.not_found = handler;
        self
    }

    /// Register handlers for a method and path
    ///
    /// Registering the same method and path again replaces the earlier
    /// chain. [`Method::Any`] registers every concrete method.
    pub fn handle(
        &mut self,
        method: Method,
        path: &str,
        handlers: impl IntoIterator<Item = Handler>,
    ) -> &mut Self {
        let chain: HandlerChain = handlers.into_iter().collect();

        for m in method.expand() {
            self.tree.insert(m.as_str(), path, chain.clone());
        }

        tracing::debug!(%method, path, handlers = chain.len(), "route registered");
        self
    }

    /// Add a GET route
    pub fn get(&mut self, path: &str, handlers: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.handle(Method::Get, path, handlers)
    }

    /// Add a POST route
    pub fn post(&mut self, path: &str, handlers: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.handle(Method::Post, path, handlers)
    }

    /// Add a PUT route
    pub fn put(&mut self, path: &str, handlers: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.handle(Method::Put, path, handlers)
    }

    /// Add a DELETE route
    pub fn delete(&mut self, path: &str, handlers: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.handle(Method::Delete, path, handlers)
    }

    /// Add a HEAD route
    pub fn head(&mut self, path: &str, handlers: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.handle(Method::Head, path, handlers)
    }

    /// Add an OPTIONS route
    pub fn options(&mut self, path: &str, handlers: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.handle(Method::Options, path, handlers)
    }

    /// Add a PATCH route
    pub fn patch(&mut self, path: &str, handlers: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.handle(Method::Patch, path, handlers)
    }

    /// Add a route for every method
    pub fn any(&mut self, path: &str, handlers: impl IntoIterator<Item = Handler>) -> &mut Self {
        self.handle(Method::Any, path, handlers)
    }

    /// Match a request method and raw request path
    ///
    /// Each segment is percent-decoded before matching, so literal routes
    /// may contain non-ASCII text and captured variables are decoded. `+`
    /// is left as is. An encoded `/` stays inside its segment.
    pub fn resolve(&self, method: &str, path: &str) -> Option<RouteMatch<'_>> {
        let segments = reef_router::segments(path)
            .into_iter()
            .map(|segment| percent_decode_str(segment).decode_utf8_lossy());
        self.tree.find_segments(method, segments)
    }

    /// Router-level middlewares
    pub fn middlewares(&self) -> &[Handler] {
        &self.middlewares
    }

    /// Handler used when nothing matches
    pub fn not_found_handler(&self) -> &Handler {
        &self.not_found
    }

    /// Append the handlers for `method` and `path` to the context's chain
    ///
    /// Returns the captured path variables. A miss appends only the
    /// not-found handler.
    pub(crate) fn bind_chain(
        &self,
        ctx: &mut Context,
        method: &str,
        path: &str,
    ) -> Vec<(String, String)> {
        match self.resolve(method, path) {
            Some(matched) => {
                ctx.use_handlers(self.middlewares.iter().cloned());
                ctx.use_handlers(matched.value.iter().cloned());
                matched.params
            }
            None => {
                ctx.use_handlers([Arc::clone(&self.not_found)]);
                Vec::new()
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("methods", &self.tree.methods())
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}
