use anyhow::Context;
use tracing_subscriber::EnvFilter;

/// Environment variable consulted when no level is given on the command line.
pub const LOG_ENV: &str = "SKIFF_LOG";

const DEFAULT_LEVEL: &str = "warn";

/// Filter from an explicit level, else `SKIFF_LOG`, else `warn`.
pub fn filter_for(level: Option<&str>) -> anyhow::Result<EnvFilter> {
    match level {
        Some(level) => EnvFilter::try_new(level).with_context(|| format!("invalid log level '{}'", level)),
        None => Ok(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))),
    }
}

/// Install the global subscriber. Output goes to stderr; stdout carries task output.
pub fn init(level: Option<&str>) -> anyhow::Result<()> {
    let filter = filter_for(level)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_level() {
        let filter = filter_for(Some("debug")).unwrap();
        assert_eq!(filter.to_string(), "debug");

        let filter = filter_for(Some("skiff=info,reqwest=warn")).unwrap();
        assert!(filter.to_string().contains("skiff=info"));
    }
}
