use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::normalize::next_id;
use super::types::Task;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    Pending,
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptHistoryItem {
    pub id: String,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
    pub status: HistoryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Newest-first log of prompt submissions, capped at `limit` entries.
///
/// Entries are addressed by the id handed out at submission, so requests that
/// resolve out of order still land on their own entry. An entry resolves at
/// most once; resolving an evicted or already resolved entry is a no-op.
#[derive(Clone, Debug)]
pub struct PromptHistory {
    limit: usize,
    items: VecDeque<PromptHistoryItem>,
}

impl PromptHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            items: VecDeque::new(),
        }
    }

    /// Prepends a pending entry and returns its id.
    pub fn record_pending(&mut self, prompt: &str) -> String {
        let item = PromptHistoryItem {
            id: next_id("prompt"),
            prompt: prompt.to_string(),
            created_at: Utc::now(),
            status: HistoryStatus::Pending,
            tasks: None,
            error_message: None,
        };
        let id = item.id.clone();
        self.items.push_front(item);
        self.items.truncate(self.limit);
        id
    }

    pub fn resolve_success(&mut self, id: &str, tasks: Vec<Task>) -> bool {
        match self.pending_mut(id) {
            Some(item) => {
                item.status = HistoryStatus::Success;
                item.tasks = Some(tasks);
                true
            }
            None => false,
        }
    }

    pub fn resolve_error(&mut self, id: &str, message: &str) -> bool {
        match self.pending_mut(id) {
            Some(item) => {
                item.status = HistoryStatus::Error;
                item.error_message = Some(message.to_string());
                true
            }
            None => false,
        }
    }

    fn pending_mut(&mut self, id: &str) -> Option<&mut PromptHistoryItem> {
        self.items
            .iter_mut()
            .find(|item| item.id == id && item.status == HistoryStatus::Pending)
    }

    pub fn get(&self, id: &str) -> Option<&PromptHistoryItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn list(&self) -> Vec<PromptHistoryItem> {
        self.items.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
