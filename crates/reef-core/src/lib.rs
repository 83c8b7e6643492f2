//! reef-core: request dispatch engine
//!
//! Segment-trie routing, pooled per-request contexts, and handler chains
//! driven by a shared cursor, served over hyper.
//!
//! ```no_run
//! use reef_core::{handler, App, Config, Router};
//!
//! let mut router = Router::new();
//! router.get("/greet", [handler(|ctx| {
//!     let name = ctx.query("name").unwrap_or("world").to_string();
//!     let _ = ctx.string(format!("Hello {name}"), None);
//! })]);
//!
//! let mut app = App::new(Config::from_env().port(8080));
//! app.use_handlers([reef_core::middleware::logger()]);
//! app.routes(router);
//! app.run().unwrap();
//! ```
//!
//! ## Features
//! - `tls` - TLS support via rustls

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod app;
pub mod config;
pub mod context;
pub mod cookie;
pub mod error;
pub mod logging;
pub mod method;
pub mod middleware;
pub mod pool;
pub mod request;
pub mod response;
pub mod router;
pub mod server;

#[cfg(feature = "tls")]
pub mod tls;

// Re-exports
pub use app::App;
pub use config::Config;
pub use context::{handler, Context, Handler, HandlerChain};
pub use cookie::{Cookie, CookieJar, SameSite};
pub use error::{Error, Result};
pub use method::Method;
pub use pool::{Pool, Reusable};
pub use request::{FormFile, Request};
pub use response::{mime, Recorder, Response, ResponseWriter};
pub use router::{RouteMatch, Router, RouterConfig};
pub use server::{create_optimized_socket, ConnectionTracker};

#[cfg(feature = "tls")]
pub use tls::{load_certs, load_private_key};
