/// Initializes the tracing subscriber for the process.
///
/// Verbosity comes from `RUST_LOG`:
/// - `RUST_LOG=info` - lifecycle events and warnings
/// - `RUST_LOG=store_orchestrator=debug` - every command and poll attempt
///
/// ```ignore
/// setup_tracing();
/// tracing::info!("Orchestrator started");
/// ```
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
