//! Telemetry helpers for structured logging and tracing.

/// Initialize tracing for the hub. Embedders can install their own
/// subscriber first; otherwise an env-filtered fmt subscriber is installed
/// (`RUST_LOG=grid_hub=debug` shows every dispatch pass).
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .try_init();
}
