use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Serialize;

use super::types::{Task, TaskCategory, TaskStatus};

/// `All`, or an exact match on one value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter<T> {
    All,
    Only(T),
}

impl<T> Default for Filter<T> {
    fn default() -> Self {
        Filter::All
    }
}

impl<T: PartialEq> Filter<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Filter::All => true,
            Filter::Only(wanted) => wanted == value,
        }
    }
}

impl<T: FromStr<Err = String>> Filter<T> {
    /// `None`, blank and `all` (any case) mean no constraint.
    pub fn parse(raw: Option<&str>) -> Result<Self, String> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Filter::All),
            Some(value) if value.eq_ignore_ascii_case("all") => Ok(Filter::All),
            Some(value) => value.parse::<T>().map(Filter::Only),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskFilter {
    pub status: Filter<TaskStatus>,
    pub category: Filter<TaskCategory>,
    pub search: String,
}

impl TaskFilter {
    pub fn parse(
        status: Option<&str>,
        category: Option<&str>,
        search: Option<&str>,
    ) -> Result<Self, String> {
        Ok(Self {
            status: Filter::parse(status)?,
            category: Filter::parse(category)?,
            search: search.unwrap_or_default().to_string(),
        })
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.status.matches(&task.status)
            && self.category.matches(&task.category)
            && matches_search(task, &self.search)
    }
}

fn matches_search(task: &Task, search: &str) -> bool {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    task.title.to_lowercase().contains(&needle) || task.description.to_lowercase().contains(&needle)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMetrics {
    pub confidence_average: f64,
    pub by_status: BTreeMap<TaskStatus, usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaskView {
    pub tasks: Vec<Task>,
    pub metrics: Option<TaskMetrics>,
    /// Size of the unfiltered collection.
    pub total: usize,
}

pub fn filter_tasks(tasks: &[Task], filter: &TaskFilter) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| filter.matches(task))
        .cloned()
        .collect()
}

/// `None` for an empty set, so there is never a division by zero.
pub fn compute_metrics(tasks: &[Task]) -> Option<TaskMetrics> {
    if tasks.is_empty() {
        return None;
    }
    let sum: f64 = tasks.iter().map(|task| task.confidence).sum();
    let mut by_status = BTreeMap::new();
    for task in tasks {
        *by_status.entry(task.status).or_insert(0) += 1;
    }
    Some(TaskMetrics {
        confidence_average: sum / tasks.len() as f64,
        by_status,
    })
}

/// Metrics describe the filtered set, not the whole collection.
pub fn build_view(tasks: &[Task], filter: &TaskFilter) -> TaskView {
    let filtered = filter_tasks(tasks, filter);
    let metrics = compute_metrics(&filtered);
    TaskView {
        tasks: filtered,
        metrics,
        total: tasks.len(),
    }
}
