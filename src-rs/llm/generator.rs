use std::sync::Arc;

use serde_json::{json, Value};
use tracing::warn;

use super::types::{CompletionRequest, Message, ProviderAdapter};
use crate::error::GenerationError;
use crate::task::{ProtoTask, TaskCategory};

pub const SYSTEM_INSTRUCTION: &str = "You are an AI assistant for Project NEXUS, an autonomous development agent. \
Your role is to break down a high-level user request into a structured list of development tasks. \
Respond ONLY with a valid JSON array matching the provided schema. \
Each task should be a logical step in building the described application. \
Assign a confidence score from 0 to 100 based on how essential and well-defined the task is. \
Categorize each task appropriately. \
Do not include any explanatory text before or after the JSON array.";

/// Turns a prompt into raw proto-tasks. Implementations block; callers run
/// them off the async runtime.
pub trait TaskGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<Vec<ProtoTask>, GenerationError>;
}

impl<F> TaskGenerator for F
where
    F: Fn(&str) -> Result<Vec<ProtoTask>, GenerationError> + Send + Sync,
{
    fn generate(&self, prompt: &str) -> Result<Vec<ProtoTask>, GenerationError> {
        self(prompt)
    }
}

/// JSON schema the model must answer with.
pub fn response_schema() -> Value {
    let categories: Vec<&str> = TaskCategory::ALL.iter().map(|c| c.label()).collect();
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "title": {
                    "type": "STRING",
                    "description": "A concise, descriptive title for the development task."
                },
                "description": {
                    "type": "STRING",
                    "description": "A brief explanation of why this task is necessary, based on the user's prompt."
                },
                "confidence": {
                    "type": "NUMBER",
                    "description": "A score from 0 to 100 representing the AI's confidence that this task is essential."
                },
                "category": {
                    "type": "STRING",
                    "enum": categories,
                    "description": "The area of development this task falls under."
                }
            },
            "required": ["title", "description", "confidence", "category"]
        }
    })
}

pub struct LlmTaskGenerator {
    adapter: Arc<dyn ProviderAdapter>,
    model: Option<String>,
    temperature: f64,
}

impl LlmTaskGenerator {
    pub fn new(adapter: Arc<dyn ProviderAdapter>, model: Option<String>, temperature: f64) -> Self {
        Self {
            adapter,
            model,
            temperature,
        }
    }
}

impl TaskGenerator for LlmTaskGenerator {
    fn generate(&self, prompt: &str) -> Result<Vec<ProtoTask>, GenerationError> {
        let request = CompletionRequest {
            messages: vec![Message::system(SYSTEM_INSTRUCTION), Message::user(prompt)],
            temperature: Some(self.temperature),
            model: self.model.clone(),
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(response_schema()),
        };
        let response = self.adapter.complete(request).map_err(|err| {
            warn!(code = %err.code, retryable = err.retryable, "provider call failed");
            GenerationError::Collaborator(err.to_string())
        })?;
        parse_proto_tasks(&response.content)
    }
}

/// Parses the model's text into proto-tasks. Empty text, invalid JSON and
/// anything other than an array are failures.
pub fn parse_proto_tasks(text: &str) -> Result<Vec<ProtoTask>, GenerationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    let value: Value = serde_json::from_str(trimmed)
        .map_err(|err| GenerationError::Collaborator(format!("invalid json: {}", err)))?;
    if !value.is_array() {
        return Err(GenerationError::Collaborator(
            "Invalid response format. Expected an array.".to_string(),
        ));
    }
    serde_json::from_value(value)
        .map_err(|err| GenerationError::Collaborator(format!("malformed task: {}", err)))
}

/// Fixture used in `TESTING` mode: one high-confidence general task.
pub struct MockTaskGenerator;

impl TaskGenerator for MockTaskGenerator {
    fn generate(&self, _prompt: &str) -> Result<Vec<ProtoTask>, GenerationError> {
        Ok(vec![ProtoTask {
            title: "Mock Task 1".to_string(),
            description: "This is a mock task.".to_string(),
            confidence: 90.0,
            category: TaskCategory::General.label().to_string(),
        }])
    }
}
