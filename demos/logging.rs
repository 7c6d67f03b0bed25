use tracing_subscriber::EnvFilter;

/// Route the library's `log` records to stderr, `info` and above unless `RUST_LOG` says otherwise
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
