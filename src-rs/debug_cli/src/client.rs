use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::models::{ErrorBody, GenerateRequest, HistoryInfo, StatusRequest, TaskInfo, TaskList};

pub struct HTTPClient {
    pub base_url: String,
    client: Client,
}

impl HTTPClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            // Generation can take a while on the model side.
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    pub fn generate(&self, prompt: &str) -> Result<Vec<TaskInfo>, String> {
        let req = GenerateRequest {
            prompt: prompt.to_string(),
        };
        self.send_json(self.client.post(self.url("/api/generate")).json(&req))
    }

    /// `query` holds already-split `key=value` pairs.
    pub fn list_tasks(&self, query: &[(String, String)]) -> Result<TaskList, String> {
        self.send_json(self.client.get(self.url("/api/tasks")).query(query))
    }

    pub fn accept(&self, id: &str) -> Result<TaskInfo, String> {
        self.send_json(self.client.post(self.url(&format!("/api/tasks/{}/accept", id))))
    }

    pub fn reject(&self, id: &str) -> Result<TaskInfo, String> {
        self.send_json(self.client.post(self.url(&format!("/api/tasks/{}/reject", id))))
    }

    pub fn set_status(&self, id: &str, status: &str) -> Result<TaskInfo, String> {
        let req = StatusRequest {
            status: status.to_string(),
        };
        self.send_json(
            self.client
                .put(self.url(&format!("/api/tasks/{}/status", id)))
                .json(&req),
        )
    }

    pub fn history(&self) -> Result<Vec<HistoryInfo>, String> {
        self.send_json(self.client.get(self.url("/api/history")))
    }

    pub fn restore(&self, id: &str) -> Result<Vec<TaskInfo>, String> {
        self.send_json(self.client.post(self.url(&format!("/api/history/{}/restore", id))))
    }

    pub fn clear_history(&self) -> Result<(), String> {
        let resp = self
            .client
            .delete(self.url("/api/history"))
            .send()
            .map_err(|err| err.to_string())?;
        check(resp).map(|_| ())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, String> {
        let resp = req.send().map_err(|err| err.to_string())?;
        check(resp)?.json::<T>().map_err(|err| err.to_string())
    }
}

fn check(resp: Response) -> Result<Response, String> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|parsed| parsed.error)
        .unwrap_or(body);
    Err(format!("http {}: {}", status.as_u16(), message))
}
