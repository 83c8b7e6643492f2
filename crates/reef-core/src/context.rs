//! Per-request context and chain executor
//!
//! A [`Context`] owns the flat handler chain for one request and a single
//! cursor into it. [`Context::next`] advances that shared cursor, so a
//! handler can call `next()` to run the rest of the chain inline and then
//! continue after control returns:
//!
//! ```
//! use reef_core::{handler, Context};
//!
//! let timing = handler(|ctx: &mut Context| {
//!     ctx.set("before", true);
//!     ctx.next();
//!     // runs after every later handler has finished
//!     let status = ctx.status();
//!     ctx.set("status_seen", status);
//! });
//! # let _ = timing;
//! ```
//!
//! [`Context::abort`] stops handlers that have not been reached yet. It
//! does not unwind frames that are already running.

use crate::pool::Reusable;
use crate::request::{FormFile, Request};
use crate::response::{mime, Response};
use crate::{Cookie, Error, Result};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

/// A request handler or middleware
pub type Handler = Arc<dyn Fn(&mut Context) + Send + Sync>;

/// Ordered handlers bound to one route
pub type HandlerChain = Vec<Handler>;

/// Wrap a closure or function as a [`Handler`]
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    Arc::new(f)
}

type StateMap = HashMap<String, Box<dyn Any + Send + Sync>>;

/// Per-request state and chain cursor
pub struct Context {
    request: Request,
    response: Response,
    handlers: HandlerChain,
    /// Index of the handler currently running; -1 before the chain starts
    index: isize,
    aborted: bool,
    params: HashMap<String, String>,
    state: RwLock<StateMap>,
}

impl Context {
    /// Attach the request objects and path variables for one request
    pub(crate) fn bind(
        &mut self,
        request: Request,
        response: Response,
        params: impl IntoIterator<Item = (String, String)>,
    ) {
        self.request = request;
        self.response = response;
        self.params.extend(params);
    }

    /// Detach the request objects so they can go back to their pools
    pub(crate) fn unbind(&mut self) -> (Request, Response) {
        (
            std::mem::take(&mut self.request),
            std::mem::take(&mut self.response),
        )
    }

    // ------------------------------------------------------------------
    // Chain control
    // ------------------------------------------------------------------

    /// Append handlers to the pending chain
    pub fn use_handlers(&mut self, handlers: impl IntoIterator<Item = Handler>) {
        self.handlers.extend(handlers);
    }

    /// Run the remaining handlers
    ///
    /// Advances the shared cursor and invokes handlers until the chain ends
    /// or [`abort`](Self::abort) is called. Calling `next()` from inside a
    /// handler runs the rest of the chain before returning; the outer loop
    /// then finds the cursor at the end and stops.
    pub fn next(&mut self) {
        self.index += 1;

        while !self.aborted && self.index < self.handlers.len() as isize {
            let handler = self.handlers[self.index as usize].clone();
            handler(self);
            self.index += 1;
        }
    }

    /// Stop handlers that have not started yet
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    // ------------------------------------------------------------------
    // Request accessors
    // ------------------------------------------------------------------

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn method(&self) -> &str {
        self.request.method()
    }

    pub fn path(&self) -> &str {
        self.request.path()
    }

    pub fn raw_query(&self) -> &str {
        self.request.raw_query()
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.request.query(key)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    pub fn cookie(&self, name: &str) -> Option<&Cookie> {
        self.request.cookie(name)
    }

    pub fn post_form(&self, key: &str) -> Option<&str> {
        self.request.post_form(key)
    }

    /// First file uploaded under `name` in a multipart body
    pub fn file(&self, name: &str) -> Result<Option<&FormFile>> {
        self.request.file(name)
    }

    /// Request body as text
    pub fn post(&self) -> &str {
        self.request.body()
    }

    /// Request body decoded as JSON
    pub fn post_json<T: DeserializeOwned>(&self) -> Result<T> {
        self.request.json()
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.request.ip()
    }

    /// Path variable captured by the router
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    // ------------------------------------------------------------------
    // State shared between handlers
    // ------------------------------------------------------------------

    /// Store a value for later handlers
    ///
    /// Takes `&self` so sub-work spawned by a handler can write back
    /// through a shared reference.
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.state.write().insert(key.into(), Box::new(value));
    }

    /// Clone a stored value out if it exists and has type `T`
    pub fn get<T: Any + Clone>(&self, key: &str) -> Option<T> {
        self.state
            .read()
            .get(key)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    /// Borrow a stored value of type `T` for the duration of `f`
    pub fn with<T: Any, R>(&self, key: &str, f: impl FnOnce(&T) -> R) -> Option<R> {
        let state = self.state.read();
        state.get(key).and_then(|v| v.downcast_ref::<T>()).map(f)
    }

    /// Remove a stored value, returning whether it existed
    pub fn remove(&self, key: &str) -> bool {
        self.state.write().remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.read().contains_key(key)
    }

    // ------------------------------------------------------------------
    // Response accessors
    // ------------------------------------------------------------------

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    pub fn status(&self) -> u16 {
        self.response.status()
    }

    pub fn set_status(&mut self, code: i32) -> Result<()> {
        self.response.set_status(code)
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.response.set_header(name, value);
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.response.add_header(name, value);
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.response.set_content_type(content_type);
    }

    pub fn add_cookie(&mut self, cookie: Cookie) {
        self.response.add_cookies([cookie]);
    }

    /// Append bytes with a content type and optional status (default 200)
    ///
    /// An invalid status is rejected before anything else changes.
    pub fn send(&mut self, data: &[u8], content_type: &str, status: Option<i32>) -> Result<()> {
        self.response
            .set_status(status.unwrap_or(crate::response::DEFAULT_STATUS as i32))?;
        self.response.set_content_type(content_type);
        self.response.write_body(data);
        Ok(())
    }

    /// Send plain text
    pub fn string(&mut self, text: impl AsRef<str>, status: Option<i32>) -> Result<()> {
        self.send(text.as_ref().as_bytes(), mime::TEXT, status)
    }

    /// Send HTML
    pub fn html(&mut self, html: impl AsRef<str>, status: Option<i32>) -> Result<()> {
        self.send(html.as_ref().as_bytes(), mime::HTML, status)
    }

    /// Serialize `value` and send it as JSON
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T, status: Option<i32>) -> Result<()> {
        let data = serde_json::to_vec(value).map_err(Error::Encode)?;
        self.send(&data, mime::JSON, status)
    }

    /// Redirect to `location` (default status 302)
    pub fn redirect(&mut self, location: impl Into<String>, status: Option<i32>) -> Result<()> {
        self.response.set_status(status.unwrap_or(302))?;
        self.response.set_header(http::header::LOCATION.as_str(), location);
        Ok(())
    }
}

impl Default for Context {
    fn default() -> Self {
        Self {
            request: Request::default(),
            response: Response::default(),
            handlers: Vec::new(),
            index: -1,
            aborted: false,
            params: HashMap::new(),
            state: RwLock::new(HashMap::new()),
        }
    }
}

impl Reusable for Context {
    fn reset(&mut self) {
        self.request.reset();
        self.response.reset();
        self.handlers.clear();
        self.index = -1;
        self.aborted = false;
        self.params.clear();
        self.state.get_mut().clear();
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("request", &self.request)
            .field("response", &self.response)
            .field("handlers", &self.handlers.len())
            .field("index", &self.index)
            .field("aborted", &self.aborted)
            .field("params", &self.params)
            .field("state_keys", &self.state.read().keys().collect::<Vec<_>>())
            .finish()
    }
}
