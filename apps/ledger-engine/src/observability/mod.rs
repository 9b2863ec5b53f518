//! Logging initialization.
//!
//! Structured logging via `tracing` everywhere in the library; the
//! subscriber is installed once by the binary. `RUST_LOG` controls the
//! filter, defaulting to `info`.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Safe to call once per process; later calls are ignored so tests that
/// race initialization do not panic.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
