use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Picks the log filter: an explicit `--log-level` first, then `RUST_LOG`,
/// then [`DEFAULT_LOG_FILTER`].
pub fn build_filter(log_level: Option<&str>) -> EnvFilter {
    if let Some(filter) = log_level.and_then(|level| EnvFilter::try_new(level).ok()) {
        return filter;
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Installs the global subscriber. Logs go to stderr so they never mix with
/// streamed assistant text on stdout.
pub fn init_logging(log_level: Option<&str>) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(log_level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize logging: {error}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_level_overrides_environment() {
        let filter = build_filter(Some("debug"));
        assert_eq!(filter.to_string(), "debug");
    }
}
