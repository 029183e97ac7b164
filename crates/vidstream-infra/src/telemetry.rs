//! Tracing subscriber initialization.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing with an env-filtered fmt layer.
///
/// `RUST_LOG` takes precedence; without it the default filter keeps
/// workspace crates at debug and everything else at the global default.
pub fn init_telemetry() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "vidstream=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}
