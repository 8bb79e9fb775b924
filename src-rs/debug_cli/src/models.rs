use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug)]
pub struct CLIConfig {
    pub base_url: String,
    pub debug: bool,
}

#[derive(Debug, Serialize)]
pub struct GenerateRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct TaskInfo {
    pub id: String,
    pub title: String,
    pub description: String,
    pub confidence: f64,
    pub category: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub confidence_average: f64,
    pub by_status: BTreeMap<String, usize>,
}

#[derive(Debug, Deserialize)]
pub struct TaskList {
    pub tasks: Vec<TaskInfo>,
    pub metrics: Option<Metrics>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryInfo {
    pub id: String,
    pub prompt: String,
    pub created_at: String,
    pub status: String,
    #[serde(default)]
    pub tasks: Option<Vec<TaskInfo>>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
