use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::outcome::{OutcomeSource, RandomOutcome};
use super::store::TaskStore;
use super::types::{Task, TaskStatus};
use crate::config::PipelineConfig;
use crate::error::LifecycleError;

/// Where a pipeline run currently waits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    /// Claimed, still `Pending`, waiting to start generating.
    Queued,
    Generating,
    Testing,
}

impl Stage {
    fn entered_by(status: TaskStatus) -> Option<Stage> {
        match status {
            TaskStatus::GeneratingCode => Some(Stage::Generating),
            TaskStatus::Testing => Some(Stage::Testing),
            _ => None,
        }
    }

    fn delay(self, timing: &PipelineConfig) -> Duration {
        match self {
            Stage::Queued => timing.start_delay,
            Stage::Generating => timing.generate_delay,
            Stage::Testing => timing.test_delay,
        }
    }
}

struct ActiveRun {
    task_id: String,
    run: u64,
    cancel: CancellationToken,
}

struct EngineState {
    store: TaskStore,
    active: Option<ActiveRun>,
    next_run: u64,
}

impl EngineState {
    fn owns(&self, run: u64) -> bool {
        self.active.as_ref().map_or(false, |active| active.run == run)
    }

    fn active_id(&self) -> Option<String> {
        self.active.as_ref().map(|active| active.task_id.clone())
    }

    fn release(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            debug!(task_id = %active.task_id, run = active.run, "pipeline slot released");
        }
    }

    fn transition(&mut self, id: &str, to: TaskStatus) -> Option<TaskStatus> {
        let from = self.store.update(id, to)?;
        debug!(task_id = %id, from = %from, to = %to, "task status transition");
        Some(from)
    }
}

struct Inner {
    state: Mutex<EngineState>,
    timing: PipelineConfig,
    outcome: Arc<dyn OutcomeSource>,
    shutdown: CancellationToken,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Owns the active task collection and drives the simulated pipeline.
///
/// At most one task holds the pipeline slot. Claiming the slot and checking
/// that it is free happen under the same lock, and every stage re-checks
/// ownership before it mutates anything, so a run whose slot was taken away
/// (manual override, replacement, shutdown) goes quiet.
///
/// Methods that may start a run spawn onto the current tokio runtime.
#[derive(Clone)]
pub struct LifecycleEngine {
    inner: Arc<Inner>,
}

impl LifecycleEngine {
    pub fn new(timing: PipelineConfig, outcome: Arc<dyn OutcomeSource>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(EngineState {
                    store: TaskStore::new(),
                    active: None,
                    next_run: 1,
                }),
                timing,
                outcome,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn from_config(timing: &PipelineConfig) -> Self {
        let outcome = RandomOutcome::new(timing.success_rate, timing.seed);
        Self::new(timing.clone(), Arc::new(outcome))
    }

    /// Installs a new collection. The current run, if any, is abandoned and
    /// tasks arriving in a pipeline status restart from `Pending`.
    pub fn replace(&self, mut tasks: Vec<Task>) {
        for task in tasks.iter_mut().filter(|task| task.status.is_in_pipeline()) {
            task.status = TaskStatus::Pending;
        }
        let mut state = self.inner.lock();
        state.release();
        info!(count = tasks.len(), "task collection replaced");
        state.store.replace(tasks);
        schedule(&self.inner, &mut state);
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.inner.lock().store.list()
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.inner.lock().store.get(id).cloned()
    }

    /// Id of the task holding the pipeline slot.
    pub fn active_task(&self) -> Option<String> {
        self.inner.lock().active_id()
    }

    pub fn accept(&self, id: &str) -> Result<Task, LifecycleError> {
        self.resolve_approval(id, TaskStatus::Pending, "accept")
    }

    pub fn reject(&self, id: &str) -> Result<Task, LifecycleError> {
        self.resolve_approval(id, TaskStatus::Rejected, "reject")
    }

    fn resolve_approval(
        &self,
        id: &str,
        to: TaskStatus,
        action: &'static str,
    ) -> Result<Task, LifecycleError> {
        let mut state = self.inner.lock();
        let from = state
            .store
            .status_of(id)
            .ok_or_else(|| LifecycleError::TaskNotFound(id.to_string()))?;
        if from != TaskStatus::AwaitingApproval {
            return Err(LifecycleError::InvalidTransition {
                id: id.to_string(),
                from,
                action,
            });
        }
        state.transition(id, to);
        schedule(&self.inner, &mut state);
        current(&state, id)
    }

    /// Manual override to any status. Never refused because of the pipeline:
    /// moving a task into `Generating Code` or `Testing` hands it the slot,
    /// and a task displaced from mid-pipeline goes back to `Pending`.
    pub fn set_status(&self, id: &str, status: TaskStatus) -> Result<Task, LifecycleError> {
        let mut state = self.inner.lock();
        if state.store.get(id).is_none() {
            return Err(LifecycleError::TaskNotFound(id.to_string()));
        }
        let holder = state.active_id();

        match Stage::entered_by(status) {
            Some(stage) => {
                state.release();
                // Scan statuses rather than trusting the slot: after shutdown
                // nothing holds it but a task can still sit mid-pipeline.
                let displaced = state
                    .store
                    .ids_where(|task| task.id != id && task.status.is_in_pipeline());
                for other in displaced {
                    state.transition(&other, TaskStatus::Pending);
                }
                state.transition(id, status);
                if !self.inner.shutdown.is_cancelled() {
                    start_run(&self.inner, &mut state, id.to_string(), stage);
                }
            }
            None => {
                if holder.as_deref() == Some(id) {
                    state.release();
                }
                state.transition(id, status);
            }
        }

        schedule(&self.inner, &mut state);
        current(&state, id)
    }

    /// Stops every run. No autonomous transition happens after this returns.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let mut state = self.inner.lock();
        state.release();
        info!("lifecycle engine shut down");
    }
}

fn current(state: &EngineState, id: &str) -> Result<Task, LifecycleError> {
    state
        .store
        .get(id)
        .cloned()
        .ok_or_else(|| LifecycleError::TaskNotFound(id.to_string()))
}

/// Claims the slot for the first pending task if the slot is free.
fn schedule(inner: &Arc<Inner>, state: &mut EngineState) {
    if state.active.is_some() || inner.shutdown.is_cancelled() {
        return;
    }
    let next = match state.store.first_with(TaskStatus::Pending) {
        Some(task) => task.id.clone(),
        None => return,
    };
    start_run(inner, state, next, Stage::Queued);
}

fn start_run(inner: &Arc<Inner>, state: &mut EngineState, task_id: String, stage: Stage) {
    let run = state.next_run;
    state.next_run += 1;
    let cancel = inner.shutdown.child_token();
    state.active = Some(ActiveRun {
        task_id: task_id.clone(),
        run,
        cancel: cancel.clone(),
    });
    debug!(task_id = %task_id, run, stage = ?stage, "pipeline run started");
    tokio::spawn(drive(Arc::clone(inner), task_id, run, stage, cancel));
}

async fn drive(
    inner: Arc<Inner>,
    task_id: String,
    run: u64,
    mut stage: Stage,
    cancel: CancellationToken,
) {
    loop {
        let delay = stage.delay(&inner.timing);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        match advance(&inner, &task_id, run, stage) {
            Some(next) => stage = next,
            None => return,
        }
    }
}

/// Applies the transition at the end of `stage`. Returns the next stage, or
/// `None` when the run is over.
fn advance(inner: &Arc<Inner>, task_id: &str, run: u64, stage: Stage) -> Option<Stage> {
    let mut state = inner.lock();
    if !state.owns(run) || inner.shutdown.is_cancelled() {
        return None;
    }
    let moved = match stage {
        Stage::Queued => state
            .transition(task_id, TaskStatus::GeneratingCode)
            .map(|_| Stage::Generating),
        Stage::Generating => state
            .transition(task_id, TaskStatus::Testing)
            .map(|_| Stage::Testing),
        Stage::Testing => {
            let outcome = if inner.outcome.succeeds() {
                TaskStatus::Completed
            } else {
                TaskStatus::Error
            };
            state.transition(task_id, outcome);
            state.active = None;
            info!(task_id = %task_id, outcome = %outcome, "pipeline run finished");
            schedule(inner, &mut state);
            return None;
        }
    };
    if moved.is_none() {
        // task vanished while owning the slot
        state.release();
        schedule(inner, &mut state);
    }
    moved
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::task::outcome::FixedOutcome;
    use crate::task::TaskCategory;

    const START: u64 = 100;
    const GENERATE: u64 = 200;
    const TEST: u64 = 300;

    fn timing() -> PipelineConfig {
        PipelineConfig {
            start_delay: Duration::from_millis(START),
            generate_delay: Duration::from_millis(GENERATE),
            test_delay: Duration::from_millis(TEST),
            success_rate: 1.0,
            seed: Some(1),
        }
    }

    fn engine(success: bool) -> LifecycleEngine {
        LifecycleEngine::new(timing(), Arc::new(FixedOutcome(success)))
    }

    fn task(id: &str, status: TaskStatus) -> Task {
        Task {
            id: id.to_string(),
            title: format!("Task {}", id),
            description: "simulated".to_string(),
            confidence: 75.0,
            category: TaskCategory::Backend,
            status,
        }
    }

    async fn advance_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    fn status(engine: &LifecycleEngine, id: &str) -> TaskStatus {
        engine.get(id).map(|t| t.status).unwrap()
    }

    fn in_pipeline(engine: &LifecycleEngine) -> usize {
        engine
            .snapshot()
            .iter()
            .filter(|t| t.status.is_in_pipeline())
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn pending_task_walks_the_pipeline_to_completed() {
        let engine = engine(true);
        engine.replace(vec![task("a", TaskStatus::Pending)]);
        assert_eq!(engine.active_task().as_deref(), Some("a"));
        assert_eq!(status(&engine, "a"), TaskStatus::Pending);

        advance_ms(START + 10).await;
        assert_eq!(status(&engine, "a"), TaskStatus::GeneratingCode);

        advance_ms(GENERATE).await;
        assert_eq!(status(&engine, "a"), TaskStatus::Testing);

        advance_ms(TEST).await;
        assert_eq!(status(&engine, "a"), TaskStatus::Completed);
        assert_eq!(engine.active_task(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_draw_lands_in_error_and_stays() {
        let engine = engine(false);
        engine.replace(vec![task("a", TaskStatus::Pending)]);
        advance_ms(START + GENERATE + TEST + 10).await;
        assert_eq!(status(&engine, "a"), TaskStatus::Error);

        advance_ms(10_000).await;
        assert_eq!(status(&engine, "a"), TaskStatus::Error);
        assert_eq!(engine.active_task(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn second_pending_task_waits_for_the_first() {
        let engine = engine(true);
        engine.replace(vec![task("a", TaskStatus::Pending), task("b", TaskStatus::Pending)]);

        advance_ms(START + 10).await;
        assert_eq!(status(&engine, "a"), TaskStatus::GeneratingCode);
        assert_eq!(status(&engine, "b"), TaskStatus::Pending);

        advance_ms(GENERATE).await;
        assert_eq!(status(&engine, "a"), TaskStatus::Testing);
        assert_eq!(status(&engine, "b"), TaskStatus::Pending);

        advance_ms(TEST).await;
        assert_eq!(status(&engine, "a"), TaskStatus::Completed);
        assert_eq!(engine.active_task().as_deref(), Some("b"));
        assert_eq!(status(&engine, "b"), TaskStatus::Pending);

        advance_ms(START).await;
        assert_eq!(status(&engine, "b"), TaskStatus::GeneratingCode);

        advance_ms(GENERATE + TEST).await;
        assert_eq!(status(&engine, "b"), TaskStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn awaiting_tasks_are_not_processed_until_accepted() {
        let engine = engine(true);
        engine.replace(vec![task("a", TaskStatus::AwaitingApproval)]);
        assert_eq!(engine.active_task(), None);

        advance_ms(10_000).await;
        assert_eq!(status(&engine, "a"), TaskStatus::AwaitingApproval);

        let accepted = engine.accept("a").unwrap();
        assert_eq!(accepted.status, TaskStatus::Pending);
        assert_eq!(engine.active_task().as_deref(), Some("a"));

        advance_ms(START + GENERATE + TEST + 10).await;
        assert_eq!(status(&engine, "a"), TaskStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_task_never_enters_the_pipeline() {
        let engine = engine(true);
        engine.replace(vec![task("a", TaskStatus::AwaitingApproval)]);
        assert_eq!(engine.reject("a").unwrap().status, TaskStatus::Rejected);

        advance_ms(10_000).await;
        assert_eq!(status(&engine, "a"), TaskStatus::Rejected);
        assert_eq!(engine.active_task(), None);
    }

    #[tokio::test]
    async fn approval_actions_need_awaiting_approval() {
        let engine = engine(true);
        engine.replace(vec![task("a", TaskStatus::Completed)]);
        assert_eq!(
            engine.accept("a"),
            Err(LifecycleError::InvalidTransition {
                id: "a".to_string(),
                from: TaskStatus::Completed,
                action: "accept",
            })
        );
        assert_eq!(
            engine.reject("missing"),
            Err(LifecycleError::TaskNotFound("missing".to_string()))
        );
        assert_eq!(
            engine.set_status("missing", TaskStatus::Pending),
            Err(LifecycleError::TaskNotFound("missing".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn manual_completion_frees_the_slot() {
        let engine = engine(false);
        engine.replace(vec![task("a", TaskStatus::Pending), task("b", TaskStatus::Pending)]);
        advance_ms(START + 10).await;
        assert_eq!(status(&engine, "a"), TaskStatus::GeneratingCode);

        engine.set_status("a", TaskStatus::Completed).unwrap();
        assert_eq!(engine.active_task().as_deref(), Some("b"));

        // The abandoned run must not overwrite the manual choice.
        advance_ms(START + GENERATE + TEST + 10).await;
        assert_eq!(status(&engine, "a"), TaskStatus::Completed);
        assert_eq!(status(&engine, "b"), TaskStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_pipeline_status_preempts_the_active_task() {
        let engine = engine(true);
        engine.replace(vec![task("a", TaskStatus::Pending), task("b", TaskStatus::Completed)]);
        advance_ms(START + 10).await;
        assert_eq!(status(&engine, "a"), TaskStatus::GeneratingCode);

        engine.set_status("b", TaskStatus::Testing).unwrap();
        assert_eq!(status(&engine, "a"), TaskStatus::Pending);
        assert_eq!(engine.active_task().as_deref(), Some("b"));
        assert_eq!(in_pipeline(&engine), 1);

        advance_ms(TEST + 10).await;
        assert_eq!(status(&engine, "b"), TaskStatus::Completed);
        assert_eq!(engine.active_task().as_deref(), Some("a"));

        advance_ms(START + GENERATE + TEST + 10).await;
        assert_eq!(status(&engine, "a"), TaskStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_all_mutation() {
        let engine = engine(true);
        engine.replace(vec![task("a", TaskStatus::Pending), task("b", TaskStatus::Pending)]);
        advance_ms(START + 10).await;
        assert_eq!(status(&engine, "a"), TaskStatus::GeneratingCode);

        engine.shutdown();
        let before = engine.snapshot();
        advance_ms(60_000).await;
        assert_eq!(engine.snapshot(), before);
        assert_eq!(engine.active_task(), None);

        engine.set_status("a", TaskStatus::Pending).unwrap();
        assert_eq!(engine.active_task(), None);

        engine.set_status("a", TaskStatus::GeneratingCode).unwrap();
        engine.set_status("b", TaskStatus::Testing).unwrap();
        assert_eq!(status(&engine, "a"), TaskStatus::Pending);
        assert_eq!(status(&engine, "b"), TaskStatus::Testing);
        assert_eq!(in_pipeline(&engine), 1);
        assert_eq!(engine.active_task(), None);

        advance_ms(60_000).await;
        assert_eq!(status(&engine, "b"), TaskStatus::Testing);
    }

    #[tokio::test(start_paused = true)]
    async fn replace_abandons_the_previous_run() {
        let engine = engine(true);
        engine.replace(vec![task("a", TaskStatus::Pending)]);
        advance_ms(START + 10).await;

        engine.replace(vec![task("c", TaskStatus::Testing), task("d", TaskStatus::Pending)]);
        assert_eq!(status(&engine, "c"), TaskStatus::Pending);
        assert_eq!(engine.active_task().as_deref(), Some("c"));
        assert!(engine.get("a").is_none());

        advance_ms(START + GENERATE + TEST + 10).await;
        assert_eq!(status(&engine, "c"), TaskStatus::Completed);
        assert_eq!(status(&engine, "d"), TaskStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn at_most_one_task_in_pipeline_under_random_interleavings() {
        let mut rng = StdRng::seed_from_u64(2024);
        let engine = LifecycleEngine::new(timing(), Arc::new(RandomOutcome::new(0.5, Some(9))));
        let ids: Vec<String> = (0..6).map(|i| format!("t{}", i)).collect();
        engine.replace(
            ids.iter()
                .map(|id| task(id, TaskStatus::Pending))
                .collect(),
        );

        for _ in 0..400 {
            let id = &ids[rng.gen_range(0..ids.len())];
            match rng.gen_range(0..6) {
                0 => {
                    let to = TaskStatus::ALL[rng.gen_range(0..TaskStatus::ALL.len())];
                    engine.set_status(id, to).unwrap();
                }
                1 => {
                    let _ = engine.accept(id);
                }
                2 => {
                    let _ = engine.reject(id);
                }
                _ => advance_ms(rng.gen_range(1..250)).await,
            }
            assert!(in_pipeline(&engine) <= 1);
            if let Some(active) = engine.active_task() {
                let held = status(&engine, &active);
                assert!(held == TaskStatus::Pending || held.is_in_pipeline());
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_tasks_are_never_picked_up() {
        let engine = engine(true);
        engine.replace(vec![
            task("done", TaskStatus::Completed),
            task("bad", TaskStatus::Error),
            task("no", TaskStatus::Rejected),
        ]);
        assert_eq!(engine.active_task(), None);
        advance_ms(10_000).await;
        let statuses: Vec<TaskStatus> = engine.snapshot().iter().map(|t| t.status).collect();
        assert_eq!(
            statuses,
            vec![TaskStatus::Completed, TaskStatus::Error, TaskStatus::Rejected]
        );
    }
}
