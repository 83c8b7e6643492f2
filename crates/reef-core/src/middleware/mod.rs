//! Built-in middlewares
//!
//! Middlewares are ordinary [`Handler`](crate::Handler)s that call
//! [`Context::next`](crate::Context::next) to wrap the rest of the chain.

pub mod logger;
pub mod recover;

pub use logger::logger;
pub use recover::{recover, recover_with, PanicError, RecoverConfig, RecoverHandler};
