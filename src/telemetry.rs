use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber. `RUST_LOG` wins over `default_level`.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    // A second call (tests, embedding) keeps the first subscriber.
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
