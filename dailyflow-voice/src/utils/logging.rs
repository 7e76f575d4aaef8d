use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Fallback filter when RUST_LOG is not set
pub const DEFAULT_FILTER: &str = "dailyflow_voice=debug,warn";

/// Initialize logging with tracing
///
/// This function sets up the tracing subscriber with the following configuration:
/// - Reads filter from RUST_LOG environment variable if available
/// - Falls back to "dailyflow_voice=debug,warn" if RUST_LOG is not set
/// - Uses a formatted output layer
///
/// Calling it again after a subscriber is installed does nothing.
///
/// # Example
///
/// ```no_run
/// use dailyflow_voice::utils::logging::init_logging;
///
/// init_logging();
/// ```
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = tracing_subscriber::registry()
        .with(fmt::layer().with_thread_names(true))
        .with(filter)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("DailyFlow voice logging initialized");
    }
}
