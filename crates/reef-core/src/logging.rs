//! Log subscriber setup

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global fmt subscriber
///
/// `RUST_LOG` takes precedence; otherwise the level is `debug` when
/// `debug` is set and `info` when it is not. Calling this more than once
/// (or after another subscriber is installed) is a no-op.
pub fn init(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}
