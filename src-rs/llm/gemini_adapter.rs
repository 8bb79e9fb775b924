use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::rotation::Rotator;
use super::types::{CompletionRequest, LLMResponse, Message, ProviderAdapter, ProviderError};
use crate::config::{DEFAULT_BASE_URL, DEFAULT_MODEL};

pub struct GeminiConfig {
    pub api_keys: Vec<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub timeout: Duration,
}

pub struct GeminiAdapter {
    cfg: GeminiConfig,
    rotator: Rotator,
    client: Client,
}

impl GeminiAdapter {
    pub fn new(mut cfg: GeminiConfig) -> Result<Self, ProviderError> {
        if cfg.base_url.is_empty() {
            cfg.base_url = DEFAULT_BASE_URL.to_string();
        }
        if cfg.model.is_empty() {
            cfg.model = DEFAULT_MODEL.to_string();
        }
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|err| ProviderError::new("client_error", &err.to_string(), false))?;
        Ok(Self {
            rotator: Rotator::new(cfg.api_keys.clone()),
            cfg,
            client,
        })
    }
}

impl ProviderAdapter for GeminiAdapter {
    fn complete(&self, request: CompletionRequest) -> Result<LLMResponse, ProviderError> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.cfg.model.clone());
        let temperature = request.temperature.unwrap_or(self.cfg.temperature);
        let payload = build_payload(&request, temperature);

        let tries = self.rotator.len();
        if tries == 0 {
            return Err(ProviderError::new("auth_error", "no Gemini API keys", false));
        }
        let mut last_err = None;
        for attempt in 0..tries {
            let key = match self.rotator.next() {
                Some(key) => key,
                None => break,
            };
            match send_request(&self.client, &self.cfg.base_url, &model, &key, &payload) {
                Ok(resp) => return Ok(resp),
                Err(err) if err.retryable => {
                    warn!(attempt, code = %err.code, "gemini request failed, rotating key");
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| ProviderError::new("api_error", "request failed", true)))
    }
}

fn build_payload(request: &CompletionRequest, temperature: f64) -> Value {
    let mut contents = Vec::new();
    let mut system_instruction = None;

    for msg in &request.messages {
        if msg.role == "system" {
            system_instruction = Some(msg.content.clone());
            continue;
        }
        contents.push(json!({
            "role": gemini_role(msg),
            "parts": [{"text": msg.content}]
        }));
    }

    let mut generation_config = json!({ "temperature": temperature });
    if let Some(mime) = &request.response_mime_type {
        generation_config["responseMimeType"] = json!(mime);
    }
    if let Some(schema) = &request.response_schema {
        generation_config["responseSchema"] = schema.clone();
    }

    let mut payload = json!({
        "contents": contents,
        "generationConfig": generation_config,
    });

    if let Some(system) = system_instruction {
        payload["systemInstruction"] = json!({
            "parts": [{"text": system}]
        });
    }

    payload
}

fn gemini_role(msg: &Message) -> &'static str {
    if msg.role == "user" {
        "user"
    } else {
        "model"
    }
}

fn send_request(
    client: &Client,
    base_url: &str,
    model: &str,
    api_key: &str,
    payload: &Value,
) -> Result<LLMResponse, ProviderError> {
    let endpoint = format!(
        "{}/v1beta/models/{}:generateContent",
        base_url.trim_end_matches('/'),
        model
    );
    debug!(%endpoint, "sending gemini request");
    let resp = client
        .post(endpoint)
        .header("Content-Type", "application/json")
        .header("x-goog-api-key", api_key)
        .json(payload)
        .send()
        .map_err(|err| ProviderError::new("network_error", &err.to_string(), true))?;

    let status = resp.status();
    let body = resp.text().unwrap_or_default();
    if status.is_client_error() || status.is_server_error() {
        return Err(classify_failure(status.as_u16(), &body));
    }

    let raw: Value = serde_json::from_str(&body)
        .map_err(|_| ProviderError::new("parse_error", "invalid json", false))?;
    Ok(LLMResponse {
        content: parse_response(&raw),
        raw: Some(raw),
    })
}

fn classify_failure(status: u16, body: &str) -> ProviderError {
    let lowered = body.to_lowercase();
    if status == 401 || status == 403 {
        return ProviderError::new("auth_error", body, true);
    }
    if status == 429 || lowered.contains("quota") || lowered.contains("resource_exhausted") {
        return ProviderError::new("rate_limit", body, true);
    }
    if status >= 500 {
        return ProviderError::new("server_error", body, true);
    }
    ProviderError::new("api_error", body, false)
}

/// Concatenated text parts of the first candidate.
fn parse_response(raw: &Value) -> String {
    let parts = raw
        .get("candidates")
        .and_then(|v| v.as_array())
        .and_then(|list| list.first())
        .and_then(|first| first.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(|v| v.as_array());

    let mut text = String::new();
    for part in parts.into_iter().flatten() {
        if let Some(chunk) = part.get("text").and_then(|v| v.as_str()) {
            text.push_str(chunk);
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_system_instruction_and_schema() {
        let request = CompletionRequest {
            messages: vec![Message::system("be terse"), Message::user("Build a blog")],
            temperature: None,
            model: None,
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(json!({"type": "ARRAY"})),
        };
        let payload = build_payload(&request, 0.3);
        assert_eq!(payload["systemInstruction"]["parts"][0]["text"], "be terse");
        assert_eq!(payload["contents"].as_array().map(Vec::len), Some(1));
        assert_eq!(payload["contents"][0]["role"], "user");
        assert_eq!(payload["contents"][0]["parts"][0]["text"], "Build a blog");
        assert_eq!(payload["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(payload["generationConfig"]["responseSchema"]["type"], "ARRAY");
        assert_eq!(payload["generationConfig"]["temperature"], 0.3);
    }

    #[test]
    fn response_text_is_concatenated() {
        let raw = json!({
            "candidates": [{
                "content": {"parts": [{"text": "[{\"title\":"}, {"text": "\"x\"}]"}]}
            }]
        });
        assert_eq!(parse_response(&raw), "[{\"title\":\"x\"}]");
    }

    #[test]
    fn missing_candidates_give_empty_text() {
        assert_eq!(parse_response(&json!({})), "");
        assert_eq!(parse_response(&json!({"candidates": []})), "");
    }

    #[test]
    fn failures_are_classified() {
        assert_eq!(classify_failure(401, "").code, "auth_error");
        assert_eq!(classify_failure(429, "").code, "rate_limit");
        assert_eq!(classify_failure(400, "RESOURCE_EXHAUSTED").code, "rate_limit");
        assert!(classify_failure(503, "").retryable);
        let bad = classify_failure(400, "bad request");
        assert_eq!(bad.code, "api_error");
        assert!(!bad.retryable);
    }

    #[test]
    fn no_keys_is_an_auth_error() {
        let adapter = GeminiAdapter::new(GeminiConfig {
            api_keys: Vec::new(),
            base_url: String::new(),
            model: String::new(),
            temperature: 0.3,
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        let err = adapter.complete(CompletionRequest::default()).unwrap_err();
        assert_eq!(err.code, "auth_error");
    }
}
