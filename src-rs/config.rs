use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Timing and outcome policy of the simulated pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Wait before a claimed `Pending` task moves to `Generating Code`.
    pub start_delay: Duration,
    pub generate_delay: Duration,
    pub test_delay: Duration,
    pub success_rate: f64,
    pub seed: Option<u64>,
}

impl PipelineConfig {
    pub fn total_delay(&self) -> Duration {
        self.start_delay + self.generate_delay + self.test_delay
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            start_delay: Duration::from_millis(1000),
            generate_delay: Duration::from_millis(2500),
            test_delay: Duration::from_millis(2000),
            success_rate: 0.85,
            seed: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NexusConfig {
    pub port: u16,
    /// Serve the fixed mock task instead of calling the model.
    pub testing: bool,
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
    pub min_prompt_chars: usize,
    pub history_limit: usize,
    pub log_json: bool,
    pub pipeline: PipelineConfig,
}

impl Default for NexusConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            testing: false,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.3,
            min_prompt_chars: 10,
            history_limit: 10,
            log_json: false,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl NexusConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; unset or blank keys keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut cfg = NexusConfig::default();

        if let Some(port) = parse_opt::<u16, _>(&get, "PORT")? {
            cfg.port = port;
        }
        if let Some(testing) = get("TESTING") {
            cfg.testing = testing.trim().eq_ignore_ascii_case("true");
        }
        if let Some(model) = get("GEMINI_MODEL") {
            cfg.model = model.trim().to_string();
        }
        if let Some(base_url) = get("GEMINI_BASE_URL") {
            cfg.base_url = base_url.trim().to_string();
        }
        if let Some(temperature) = parse_opt::<f64, _>(&get, "NEXUS_TEMPERATURE")? {
            cfg.temperature = temperature;
        }
        if let Some(min) = parse_opt::<usize, _>(&get, "NEXUS_MIN_PROMPT_CHARS")? {
            cfg.min_prompt_chars = min;
        }
        if let Some(limit) = parse_opt::<usize, _>(&get, "NEXUS_HISTORY_LIMIT")? {
            cfg.history_limit = limit;
        }
        if let Some(json) = parse_opt::<bool, _>(&get, "NEXUS_LOG_JSON")? {
            cfg.log_json = json;
        }
        if let Some(ms) = parse_opt::<u64, _>(&get, "NEXUS_START_DELAY_MS")? {
            cfg.pipeline.start_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_opt::<u64, _>(&get, "NEXUS_GENERATE_DELAY_MS")? {
            cfg.pipeline.generate_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_opt::<u64, _>(&get, "NEXUS_TEST_DELAY_MS")? {
            cfg.pipeline.test_delay = Duration::from_millis(ms);
        }
        if let Some(rate) = parse_opt::<f64, _>(&get, "NEXUS_SUCCESS_RATE")? {
            cfg.pipeline.success_rate = rate;
        }
        if let Some(seed) = parse_opt::<u64, _>(&get, "NEXUS_PIPELINE_SEED")? {
            cfg.pipeline.seed = Some(seed);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let rate = self.pipeline.success_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(ConfigError::SuccessRate(rate));
        }
        if self.history_limit == 0 {
            return Err(ConfigError::HistoryLimit);
        }
        Ok(())
    }
}

fn parse_opt<T, G>(get: &G, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let cfg = NexusConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, NexusConfig::default());
        assert_eq!(cfg.pipeline.total_delay(), Duration::from_millis(5500));
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = NexusConfig::from_lookup(lookup(&[
            ("PORT", "8088"),
            ("TESTING", "true"),
            ("NEXUS_HISTORY_LIMIT", "3"),
            ("NEXUS_START_DELAY_MS", "5"),
            ("NEXUS_SUCCESS_RATE", "0.5"),
            ("NEXUS_PIPELINE_SEED", "99"),
        ]))
        .unwrap();
        assert_eq!(cfg.port, 8088);
        assert!(cfg.testing);
        assert_eq!(cfg.history_limit, 3);
        assert_eq!(cfg.pipeline.start_delay, Duration::from_millis(5));
        assert_eq!(cfg.pipeline.success_rate, 0.5);
        assert_eq!(cfg.pipeline.seed, Some(99));
    }

    #[test]
    fn blank_values_are_ignored() {
        let cfg = NexusConfig::from_lookup(lookup(&[("PORT", "  ")])).unwrap();
        assert_eq!(cfg.port, 3001);
    }

    #[test]
    fn unparsable_value_is_an_error() {
        let err = NexusConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "PORT".to_string(),
                value: "eighty".to_string()
            }
        );
    }

    #[test]
    fn out_of_range_success_rate_is_rejected() {
        let err = NexusConfig::from_lookup(lookup(&[("NEXUS_SUCCESS_RATE", "1.5")])).unwrap_err();
        assert_eq!(err, ConfigError::SuccessRate(1.5));
    }

    #[test]
    fn zero_history_limit_is_rejected() {
        let err = NexusConfig::from_lookup(lookup(&[("NEXUS_HISTORY_LIMIT", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::HistoryLimit);
    }
}
