//! Structured log setup for the command line.

/// Environment variable holding the `tracing` filter directives.
pub const LOG_FILTER_ENV: &str = "ABC_MIGRATE_LOG";
pub const DEFAULT_LOG_FILTER: &str = "abc_migrate=info";

/// Installs a JSON subscriber on stderr so stdout stays free for command
/// output. Calling it twice is harmless.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .json()
        .with_target(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .try_init();
}

fn log_filter() -> String {
    std::env::var(LOG_FILTER_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_does_not_panic() {
        init_logging();
        init_logging();
        tracing::info!(target: "abc_migrate", event = "logging_smoke");
    }
}
