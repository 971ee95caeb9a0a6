//! Structured logging setup.
//!
//! Console-only tracing subscriber. The filter comes from `RUST_LOG` and
//! falls back to `info`, so the poller's per-cycle diagnostics stay quiet
//! unless explicitly enabled.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Call once at process startup, before the broker is constructed. Calling
/// it twice panics in the subscriber registry, so binaries own this, not
/// library code.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
