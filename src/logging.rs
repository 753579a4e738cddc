//! Tracing setup for embedding applications.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with the PATRONAGE_LOG environment variable.
///
/// Defaults to "info" level if PATRONAGE_LOG is not set. Host
/// applications with their own subscriber should skip this and let
/// their setup collect this crate's spans instead.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("PATRONAGE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
