use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Confidence strictly above this value starts a task in `Pending`;
/// anything else waits for approval.
pub const AUTO_APPROVE_THRESHOLD: f64 = 60.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    #[serde(rename = "Awaiting Approval")]
    AwaitingApproval,
    #[serde(rename = "Generating Code")]
    GeneratingCode,
    Testing,
    Completed,
    Error,
    Rejected,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 7] = [
        TaskStatus::Pending,
        TaskStatus::AwaitingApproval,
        TaskStatus::GeneratingCode,
        TaskStatus::Testing,
        TaskStatus::Completed,
        TaskStatus::Error,
        TaskStatus::Rejected,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::AwaitingApproval => "Awaiting Approval",
            TaskStatus::GeneratingCode => "Generating Code",
            TaskStatus::Testing => "Testing",
            TaskStatus::Completed => "Completed",
            TaskStatus::Error => "Error",
            TaskStatus::Rejected => "Rejected",
        }
    }

    /// Statuses a task only holds while it owns the pipeline slot.
    pub fn is_in_pipeline(self) -> bool {
        matches!(self, TaskStatus::GeneratingCode | TaskStatus::Testing)
    }

    /// Initial status for a freshly generated task.
    pub fn initial_for(confidence: f64) -> Self {
        if confidence > AUTO_APPROVE_THRESHOLD {
            TaskStatus::Pending
        } else {
            TaskStatus::AwaitingApproval
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    /// Accepts the wire label ("Awaiting Approval") as well as compact forms
    /// ("awaiting_approval", "AwaitingApproval"), case-insensitively.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = compact(raw);
        TaskStatus::ALL
            .iter()
            .copied()
            .find(|status| compact(status.label()) == wanted)
            .ok_or_else(|| format!("unknown status: {}", raw.trim()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TaskCategory {
    Frontend,
    Backend,
    Database,
    Authentication,
    Deployment,
    Testing,
    General,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 7] = [
        TaskCategory::Frontend,
        TaskCategory::Backend,
        TaskCategory::Database,
        TaskCategory::Authentication,
        TaskCategory::Deployment,
        TaskCategory::Testing,
        TaskCategory::General,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TaskCategory::Frontend => "Frontend",
            TaskCategory::Backend => "Backend",
            TaskCategory::Database => "Database",
            TaskCategory::Authentication => "Authentication",
            TaskCategory::Deployment => "Deployment",
            TaskCategory::Testing => "Testing",
            TaskCategory::General => "General",
        }
    }

    /// Exact match against the closed set, `General` for anything else.
    pub fn coerce(raw: &str) -> Self {
        TaskCategory::ALL
            .iter()
            .copied()
            .find(|category| category.label() == raw)
            .unwrap_or(TaskCategory::General)
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TaskCategory {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = compact(raw);
        TaskCategory::ALL
            .iter()
            .copied()
            .find(|category| compact(category.label()) == wanted)
            .ok_or_else(|| format!("unknown category: {}", raw.trim()))
    }
}

fn compact(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub confidence: f64,
    pub category: TaskCategory,
    pub status: TaskStatus,
}

/// A task as the generator returns it, before normalization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProtoTask {
    pub title: String,
    pub description: String,
    pub confidence: f64,
    pub category: String,
}
