//! Request logging middleware

use crate::context::{handler, Handler};
use std::time::Instant;

/// Log one `info` event per request once the rest of the chain returns
///
/// Records method, path with query, client IP, final status and latency.
pub fn logger() -> Handler {
    handler(|ctx| {
        let start = Instant::now();
        ctx.next();
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        let path = match ctx.raw_query() {
            "" => ctx.path().to_string(),
            query => format!("{}?{}", ctx.path(), query),
        };

        tracing::info!(
            method = ctx.method(),
            path = %path,
            ip = ?ctx.ip(),
            status = ctx.status(),
            latency_ms,
            "request"
        );
    })
}
