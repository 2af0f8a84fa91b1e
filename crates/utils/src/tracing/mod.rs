use taskmill_core::TASKMILL_LOG_VAR;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};

/// Initialize the tracing system
///
/// The filter comes from `TASKMILL_LOG`, then `RUST_LOG`, then defaults to
/// `info`. Output goes to stderr so stdout stays free for command results.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = EnvFilter::try_from_env(TASKMILL_LOG_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new("info"))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(is_tty())
        .compact()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Check if we're running in a TTY environment
fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

/// Create a span covering one scheduler batch
pub fn batch_span(total_units: usize, concurrency: usize) -> Span {
    span!(Level::INFO, "batch", total_units = %total_units, concurrency = %concurrency)
}

/// Create a span for a single unit of work
pub fn unit_span(index: usize, operation: &str) -> Span {
    span!(Level::INFO, "unit", index = %index, operation = %operation)
}

/// Emit a structured event for cache lookups
pub fn cache_event(operation: &str, key: &str, hit: bool) {
    if hit {
        debug!(operation = %operation, key = %key, "cache_hit");
    } else {
        info!(operation = %operation, key = %key, "cache_miss");
    }
}
