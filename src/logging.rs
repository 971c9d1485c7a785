use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initializes the global tracing subscriber for host applications embedding
/// the connector. Honors `RUST_LOG`, falling back to the given directive.
///
/// Library components never install a subscriber themselves; they log through
/// whatever dispatcher the host configured.
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}
