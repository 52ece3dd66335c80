//! Observability (logging, tracing)
//!
//! Provides structured logging via `tracing-subscriber`, pretty in
//! development and JSON lines in production.

use crate::config::ObservabilitySettings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging stack
///
/// Sets up:
/// - Environment-based log level filtering (`RUST_LOG`)
/// - JSON formatting when `settings.json` is set, pretty formatting otherwise
///
/// # Example
///
/// ```rust,no_run
/// use giveaway_gate::{config::ObservabilitySettings, observability};
///
/// # fn main() -> anyhow::Result<()> {
/// observability::init(&ObservabilitySettings::default())?;
/// tracing::info!("Application started");
/// # Ok(())
/// # }
/// ```
pub fn init(settings: &ObservabilitySettings) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter());

    let registry = tracing_subscriber::registry().with(env_filter);

    if settings.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()?;
    }

    Ok(())
}

fn default_filter() -> EnvFilter {
    if cfg!(debug_assertions) {
        EnvFilter::new("info,giveaway_gate=debug,tower_http=debug")
    } else {
        EnvFilter::new("info")
    }
}
