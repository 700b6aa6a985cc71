use tracing::Level;

/// Initialize the global tracing subscriber.
///
/// Unknown level names fall back to `info`. Uses `try_init` so tests and
/// embedding applications can call this more than once without panicking.
pub fn init(level: &str) {
    let level: Level = level.parse().unwrap_or(Level::INFO);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}
