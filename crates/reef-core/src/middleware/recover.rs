//! Panic recovery middleware
//!
//! Catches panics raised further down the chain so one failing handler
//! turns into an error response instead of tearing down the request task.
//! Requires unwinding panics.

use crate::context::{handler, Context, Handler};
use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// A panic caught by [`recover`]
#[derive(Debug)]
pub struct PanicError {
    /// Panic payload rendered as text
    pub message: String,
    /// Captured where the panic was caught
    pub backtrace: Backtrace,
}

impl PanicError {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };

        Self {
            message,
            backtrace: Backtrace::force_capture(),
        }
    }
}

impl std::fmt::Display for PanicError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handler panicked: {}", self.message)
    }
}

impl std::error::Error for PanicError {}

/// Called with the context and the caught panic
pub type RecoverHandler = Arc<dyn Fn(&mut Context, &PanicError) + Send + Sync>;

/// Recover configuration
#[derive(Clone, Default)]
pub struct RecoverConfig {
    /// Replaces the default 500 response when set
    pub handler: Option<RecoverHandler>,
}

impl RecoverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Context, &PanicError) + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(f));
        self
    }
}

/// Write 500 "Internal Server Error" and stop the chain
fn default_recover(ctx: &mut Context, _err: &PanicError) {
    let _ = ctx.string("Internal Server Error", Some(500));
    ctx.abort();
}

/// Recover with the default 500 response
pub fn recover() -> Handler {
    recover_with(RecoverConfig::default())
}

/// Recover with a custom handler
pub fn recover_with(config: RecoverConfig) -> Handler {
    let on_panic: RecoverHandler = config.handler.unwrap_or_else(|| Arc::new(default_recover));

    handler(move |ctx| {
        let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| ctx.next())) else {
            return;
        };

        let err = PanicError::from_payload(payload);
        tracing::error!(
            method = ctx.method(),
            path = ctx.path(),
            panic = %err.message,
            "recovered from panic\n{}",
            err.backtrace
        );
        on_panic(ctx, &err);
    })
}
