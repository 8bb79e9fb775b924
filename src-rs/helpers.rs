use std::env;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::NexusConfig;
use crate::error::ConfigError;
use crate::llm::{GeminiAdapter, GeminiConfig, LlmTaskGenerator, MockTaskGenerator, TaskGenerator};

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(60);

fn load_keys_from<F>(lookup: F, primary: &str, prefix: &str) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut keys = Vec::new();
    if let Some(raw) = lookup(primary) {
        for item in raw.split(',') {
            let trimmed = item.trim();
            if !trimmed.is_empty() {
                keys.push(trimmed.to_string());
            }
        }
    }
    for idx in 2..=10 {
        let key = format!("{}_{}", prefix, idx);
        if let Some(value) = lookup(&key) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                keys.push(trimmed.to_string());
            }
        }
    }
    keys
}

/// `GEMINI_API_KEY` (comma separated) plus `_2`..`_10`, falling back to the
/// plain `API_KEY`.
pub fn load_gemini_keys_from<F>(lookup: F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    let keys = load_keys_from(&lookup, "GEMINI_API_KEY", "GEMINI_API_KEY");
    if !keys.is_empty() {
        return keys;
    }
    load_keys_from(&lookup, "API_KEY", "API_KEY")
}

pub fn load_gemini_keys() -> Vec<String> {
    load_gemini_keys_from(|key| env::var(key).ok())
}

/// Mock generator in `TESTING` mode, Gemini otherwise. Builds a blocking HTTP
/// client, so call it outside the async runtime.
pub fn build_generator(cfg: &NexusConfig, keys: Vec<String>) -> Result<Arc<dyn TaskGenerator>, ConfigError> {
    if cfg.testing {
        info!("TESTING mode: serving the mock task generator");
        return Ok(Arc::new(MockTaskGenerator));
    }
    if keys.is_empty() {
        return Err(ConfigError::MissingApiKey);
    }
    info!(model = %cfg.model, keys = keys.len(), "using Gemini task generator");
    let adapter = GeminiAdapter::new(GeminiConfig {
        api_keys: keys,
        base_url: cfg.base_url.clone(),
        model: cfg.model.clone(),
        temperature: cfg.temperature,
        timeout: PROVIDER_TIMEOUT,
    })
    .map_err(|err| ConfigError::Provider(err.to_string()))?;
    Ok(Arc::new(LlmTaskGenerator::new(
        Arc::new(adapter),
        Some(cfg.model.clone()),
        cfg.temperature,
    )))
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
    fn gemini_keys_are_collected_in_order() {
        let keys = load_gemini_keys_from(lookup(&[
            ("GEMINI_API_KEY", "k1, k2 ,"),
            ("GEMINI_API_KEY_3", "k3"),
            ("API_KEY", "ignored"),
        ]));
        assert_eq!(keys, vec!["k1", "k2", "k3"]);
    }

    #[test]
    fn plain_api_key_is_the_fallback() {
        let keys = load_gemini_keys_from(lookup(&[("API_KEY", "legacy")]));
        assert_eq!(keys, vec!["legacy"]);
    }

    #[test]
    fn testing_mode_needs_no_key() {
        let cfg = NexusConfig {
            testing: true,
            ..NexusConfig::default()
        };
        let generator = build_generator(&cfg, Vec::new()).unwrap();
        let tasks = generator.generate("Build a blog").unwrap();
        assert_eq!(tasks[0].title, "Mock Task 1");
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let err = build_generator(&NexusConfig::default(), Vec::new()).err();
        assert_eq!(err, Some(ConfigError::MissingApiKey));
    }
}
