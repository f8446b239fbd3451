/// Engine configuration
///
/// Read from the environment (and a `.env` file if present):
///   MARKET_STATE_PATH        snapshot file (default: data/state.json)
///   MARKET_JOURNAL_CAPACITY  events kept in memory (default: 1000)
///   MARKET_LOG               tracing filter (default: info)

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_STATE_PATH: &str = "data/state.json";
pub const DEFAULT_JOURNAL_CAPACITY: usize = 1000;
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub state_path: PathBuf,
    pub journal_capacity: usize,
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            journal_capacity: DEFAULT_JOURNAL_CAPACITY,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let state_path = lookup("MARKET_STATE_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.state_path);

        let journal_capacity = match lookup("MARKET_JOURNAL_CAPACITY") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    tracing::warn!(value = %raw, "ignoring invalid MARKET_JOURNAL_CAPACITY");
                    defaults.journal_capacity
                }
            },
            None => defaults.journal_capacity,
        };

        let log_filter = lookup("MARKET_LOG")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.log_filter);

        Self { state_path, journal_capacity, log_filter }
    }

    /// Install a global fmt subscriber using `log_filter`. Safe to call more
    /// than once; later calls are no-ops.
    pub fn init_tracing(&self) {
        let filter = EnvFilter::try_new(&self.log_filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_unset() {
        let config = EngineConfig::from_lookup(|_| None);
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.state_path, PathBuf::from("data/state.json"));
        assert_eq!(config.journal_capacity, 1000);
    }

    #[test]
    fn test_values_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("MARKET_STATE_PATH", "/tmp/markets.json"),
            ("MARKET_JOURNAL_CAPACITY", "25"),
            ("MARKET_LOG", "binary_market_core=debug"),
        ]
        .into_iter()
        .collect();

        let config = EngineConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.state_path, PathBuf::from("/tmp/markets.json"));
        assert_eq!(config.journal_capacity, 25);
        assert_eq!(config.log_filter, "binary_market_core=debug");
    }

    #[test]
    fn test_bad_capacity_falls_back() {
        let config = EngineConfig::from_lookup(|k| match k {
            "MARKET_JOURNAL_CAPACITY" => Some("zero".to_string()),
            _ => None,
        });
        assert_eq!(config.journal_capacity, DEFAULT_JOURNAL_CAPACITY);
    }

    #[test]
    fn test_from_env_reads_process_environment() {
        std::env::set_var("MARKET_STATE_PATH", "/tmp/from_env_state.json");
        std::env::set_var("MARKET_JOURNAL_CAPACITY", "42");
        let config = EngineConfig::from_env();
        std::env::remove_var("MARKET_STATE_PATH");
        std::env::remove_var("MARKET_JOURNAL_CAPACITY");

        assert_eq!(config.state_path, PathBuf::from("/tmp/from_env_state.json"));
        assert_eq!(config.journal_capacity, 42);
    }

    #[test]
    fn test_init_tracing_twice() {
        let config = EngineConfig::from_lookup(|k| match k {
            "MARKET_LOG" => Some("not a [valid filter".to_string()),
            _ => None,
        });
        config.init_tracing();
        EngineConfig::default().init_tracing();
        tracing::info!("tracing initialised");
    }
}
