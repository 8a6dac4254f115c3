//! Logging setup on top of `tracing-subscriber`.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` is used (see
/// `EngineConfig::log_filter`). Calling this twice is a no-op.
///
/// ```no_run
/// use degreeplan::{config::EngineConfig, logging};
/// let config = EngineConfig::from_env();
/// logging::init(&config.log_filter);
/// ```
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .try_init();
}

/// Subscriber for tests, routed through the test harness's captured output
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
