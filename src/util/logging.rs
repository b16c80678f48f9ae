//! Structured logging setup for soos-ci
//!
//! Logs go to stderr through a `tracing` subscriber. The level comes from the
//! command line or `SOOS_LOG_LEVEL`; `SOOS_LOG_JSON=true` switches to JSON
//! lines for log collectors. `RUST_LOG`, when set, is honoured on top.
//!
//! # Example
//!
//! ```no_run
//! use soos_ci::util::logging;
//!
//! logging::init_from_env();
//!
//! use tracing::{info, warn};
//! info!(project = "shop", "Starting analysis run");
//! warn!(status = 422, "Manifest rejected");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const ENV_LOG_LEVEL: &str = "SOOS_LOG_LEVEL";
pub const ENV_LOG_JSON: &str = "SOOS_LOG_JSON";

/// HTTP stack crates that are pinned to `warn` unless `RUST_LOG` says otherwise
const NOISY_TARGETS: [&str; 4] = ["h2", "hyper", "hyper_util", "reqwest"];

/// Ensures logging is only initialized once
static INIT: Once = Once::new();

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum log level to display
    pub level: Level,

    /// Use JSON output format
    pub use_json: bool,

    /// Include the module target (e.g., soos_ci::saga) in logs
    pub include_target: bool,

    /// Include file and line number information
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: false,
            include_location: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Reads `SOOS_LOG_LEVEL` and `SOOS_LOG_JSON` through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let level = lookup(ENV_LOG_LEVEL)
            .map(|l| parse_level(&l))
            .unwrap_or(Level::INFO);
        let use_json = lookup(ENV_LOG_JSON)
            .and_then(|v| v.trim().parse::<bool>().ok())
            .unwrap_or(false);

        Self {
            level,
            use_json,
            include_target: level >= Level::DEBUG,
            include_location: level >= Level::TRACE,
        }
    }
}

/// Parses a log level from a string, case-insensitively.
/// Unknown values fall back to `INFO`.
///
/// ```
/// use soos_ci::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("debug"), Level::DEBUG);
/// assert_eq!(parse_level("WARNING"), Level::WARN);
/// assert_eq!(parse_level("invalid"), Level::INFO);
/// ```
pub fn parse_level(level_str: &str) -> Level {
    match level_str.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

fn build_filter(level: Level, rust_log_set: bool) -> EnvFilter {
    let mut filter = EnvFilter::builder()
        .with_default_directive(Directive::from(level))
        .from_env_lossy();

    if !rust_log_set {
        for target in NOISY_TARGETS {
            if let Ok(directive) = format!("{}=warn", target).parse::<Directive>() {
                filter = filter.add_directive(directive);
            }
        }
    }
    filter
}

/// Installs the global subscriber. Later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level, env::var("RUST_LOG").is_ok());

        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.include_target)
            .with_file(config.include_location)
            .with_line_number(config.include_location);

        let registry = tracing_subscriber::registry().with(filter);
        let result = if config.use_json {
            registry.with(layer.json()).try_init()
        } else {
            registry.with(layer).try_init()
        };

        if let Err(e) = result {
            eprintln!("Failed to install log subscriber: {}", e);
        }
    });
}

/// Initializes logging from `SOOS_LOG_LEVEL` and `SOOS_LOG_JSON`
pub fn init_from_env() {
    init_logging(LoggingConfig::from_lookup(|k| env::var(k).ok()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("info"), Level::INFO);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
    }

    #[test]
    fn test_parse_level_case_insensitive() {
        assert_eq!(parse_level("TRACE"), Level::TRACE);
        assert_eq!(parse_level(" Debug "), Level::DEBUG);
        assert_eq!(parse_level("Warning"), Level::WARN);
    }

    #[test]
    fn test_parse_level_invalid() {
        assert_eq!(parse_level("invalid"), Level::INFO);
        assert_eq!(parse_level(""), Level::INFO);
    }

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.use_json);
        assert!(!config.include_location);
    }

    #[test]
    fn test_config_from_env_values() {
        let config = LoggingConfig::from_lookup(lookup(&[
            (ENV_LOG_LEVEL, "debug"),
            (ENV_LOG_JSON, "true"),
        ]));
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.use_json);
        assert!(config.include_target);
        assert!(!config.include_location);
    }

    #[test]
    fn test_config_from_empty_env() {
        let config = LoggingConfig::from_lookup(lookup(&[(ENV_LOG_JSON, "yes please")]));
        assert_eq!(config.level, Level::INFO);
        assert!(!config.use_json);
        assert!(!config.include_target);
    }

    #[test]
    fn test_filter_pins_http_crates() {
        let filter = build_filter(Level::DEBUG, false).to_string();
        assert!(filter.contains("reqwest=warn"));
        assert!(filter.contains("hyper=warn"));

        let filter = build_filter(Level::DEBUG, true).to_string();
        assert!(!filter.contains("reqwest=warn"));
    }
}
