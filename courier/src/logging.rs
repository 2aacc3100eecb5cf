//! Structured logging for the courier.
//!
//! Every line goes to stderr. Run-level fields (the acting account) are
//! attached by the span opened in [`crate::looping::run_loop`].

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `courier=info` if unset.
///
/// # Example
/// ```bash
/// RUST_LOG=courier=debug courier run --config courier.toml
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("courier=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
