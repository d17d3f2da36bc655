use anyhow::Context;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{Layer, Registry};

use crate::common::config::LoggingConfigLoader;
use crate::common::get_logger_timer_rfc3339;

fn parse_level(level: Option<String>) -> Result<LevelFilter, anyhow::Error> {
    match level {
        Some(s) => s
            .parse()
            .with_context(|| format!("invalid log level: {}", s)),
        None => Ok(LevelFilter::OFF),
    }
}

fn parse_env_filter(default_level: LevelFilter) -> Result<EnvFilter, anyhow::Error> {
    EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env()
        .with_context(|| "failed to create env filter")
}

/// Installs the global console logger. Output goes to stderr so generated schemas and
/// route tables on stdout stay clean.
pub fn init(config: impl LoggingConfigLoader) -> Result<(), anyhow::Error> {
    let console_config = config.get_console_logger_config();
    let console_level = parse_level(console_config.level)?;
    let console_filter = parse_env_filter(console_level)?;

    let console_layer = tracing_subscriber::fmt::layer()
        .with_timer(get_logger_timer_rfc3339())
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    Registry::default()
        .with(console_layer)
        .try_init()
        .with_context(|| "failed to install logger")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    #[case(None, LevelFilter::OFF)]
    #[case(Some("debug"), LevelFilter::DEBUG)]
    #[case(Some("WARN"), LevelFilter::WARN)]
    fn level_parsing(#[case] level: Option<&str>, #[case] expected: LevelFilter) {
        assert_eq!(parse_level(level.map(str::to_string)).unwrap(), expected);
    }

    #[test]
    fn bad_level_is_reported() {
        assert!(parse_level(Some("loud".to_string())).is_err());
    }
}
