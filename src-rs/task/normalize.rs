use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;

use super::types::{ProtoTask, Task, TaskCategory, TaskStatus};
use crate::error::GenerationError;

static COUNTER: AtomicUsize = AtomicUsize::new(1);

/// Unique id with the given prefix, e.g. `task_1718000000000_7`.
pub fn next_id(prefix: &str) -> String {
    let count = COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}_{}_{}", prefix, Utc::now().timestamp_millis(), count)
}

/// Clamp into [0, 100]. NaN counts as no confidence at all.
pub fn clamp_confidence(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 100.0)
    }
}

pub fn normalize_task(proto: ProtoTask) -> Result<Task, GenerationError> {
    let title = proto.title.trim();
    let description = proto.description.trim();
    if title.is_empty() || description.is_empty() {
        return Err(GenerationError::Collaborator(
            "task with empty title or description".to_string(),
        ));
    }
    let confidence = clamp_confidence(proto.confidence);
    Ok(Task {
        id: next_id("task"),
        title: title.to_string(),
        description: description.to_string(),
        confidence,
        category: TaskCategory::coerce(proto.category.trim()),
        status: TaskStatus::initial_for(confidence),
    })
}

/// All-or-nothing: one malformed proto-task fails the whole batch.
pub fn normalize_tasks(protos: Vec<ProtoTask>) -> Result<Vec<Task>, GenerationError> {
    protos.into_iter().map(normalize_task).collect()
}
