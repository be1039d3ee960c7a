//! Log setup.
//!
//! Every line is emitted as JSON and carries the service identification fields
//! shared by the data store's services (`services`, `art-id`, `group`) through
//! the root span returned by [`service_span`].

use tracing::{info_span, Span};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Service name reported in every log line.
pub const SERVICE_NAME: &str = "dataone-indexer";

/// Group reported in every log line.
pub const SERVICE_GROUP: &str = "org.cyverse";

/// Install the global subscriber (prefer RUST_LOG, fallback to `log_level`).
pub fn init(log_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| log_level.into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Root span carrying the service identification fields.
pub fn service_span() -> Span {
    info_span!(
        "service",
        services = SERVICE_NAME,
        "art-id" = SERVICE_NAME,
        group = SERVICE_GROUP
    )
}
