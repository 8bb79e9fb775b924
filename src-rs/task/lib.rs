pub mod engine;
pub mod history;
pub mod normalize;
pub mod outcome;
pub mod store;
pub mod types;
pub mod view;

pub use engine::LifecycleEngine;
pub use history::{HistoryStatus, PromptHistory, PromptHistoryItem};
pub use normalize::{clamp_confidence, normalize_task, normalize_tasks};
pub use outcome::{FixedOutcome, OutcomeSource, RandomOutcome};
pub use store::TaskStore;
pub use types::{ProtoTask, Task, TaskCategory, TaskStatus, AUTO_APPROVE_THRESHOLD};
pub use view::{build_view, compute_metrics, filter_tasks, Filter, TaskFilter, TaskMetrics, TaskView};
