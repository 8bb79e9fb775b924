use super::types::{Task, TaskStatus};

/// Ordered task collection. Order is generation order and decides which
/// pending task the pipeline picks next.
#[derive(Clone, Debug, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn replace(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn status_of(&self, id: &str) -> Option<TaskStatus> {
        self.get(id).map(|task| task.status)
    }

    /// Sets the status and returns the previous one.
    pub fn update(&mut self, id: &str, status: TaskStatus) -> Option<TaskStatus> {
        let task = self.tasks.iter_mut().find(|task| task.id == id)?;
        let previous = task.status;
        task.status = status;
        Some(previous)
    }

    /// First task in collection order holding `status`.
    pub fn first_with(&self, status: TaskStatus) -> Option<&Task> {
        self.tasks.iter().find(|task| task.status == status)
    }

    /// Ids of every task matching `predicate`, in collection order.
    pub fn ids_where<F>(&self, predicate: F) -> Vec<String>
    where
        F: Fn(&Task) -> bool,
    {
        self.tasks
            .iter()
            .filter(|task| predicate(task))
            .map(|task| task.id.clone())
            .collect()
    }

    pub fn list(&self) -> Vec<Task> {
        self.tasks.clone()
    }
}
