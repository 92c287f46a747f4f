//! Tracing subscriber setup

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default directives when `RUST_LOG` is unset.
pub fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "warn,tgsender=debug"
    } else {
        "warn,tgsender=info"
    }
}

/// Initialize tracing with an `EnvFilter` and a fmt layer.
///
/// `RUST_LOG` wins over `verbose`. Calling this more than once, or after
/// the host installed its own subscriber, leaves the existing one in place.
pub fn init_telemetry(verbose: bool) {
    let result = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directives(verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    match result {
        Ok(()) => tracing::debug!(verbose = verbose, "Telemetry initialized"),
        Err(e) => tracing::debug!(error = %e, "Tracing subscriber already installed"),
    }
}
