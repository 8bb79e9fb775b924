use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::NexusConfig;
use crate::error::GenerationError;
use crate::llm::TaskGenerator;
use crate::task::{normalize_tasks, LifecycleEngine, PromptHistory, PromptHistoryItem, Task};

/// Owns the single outstanding generator call and the prompt history, and
/// hands successful results to the lifecycle engine.
pub struct GenerationOrchestrator {
    generator: Arc<dyn TaskGenerator>,
    engine: LifecycleEngine,
    history: Arc<Mutex<PromptHistory>>,
    in_flight: Arc<AtomicBool>,
    min_prompt_chars: usize,
    shutdown: CancellationToken,
}

impl GenerationOrchestrator {
    pub fn new(
        generator: Arc<dyn TaskGenerator>,
        engine: LifecycleEngine,
        history_limit: usize,
        min_prompt_chars: usize,
    ) -> Self {
        Self {
            generator,
            engine,
            history: Arc::new(Mutex::new(PromptHistory::new(history_limit))),
            in_flight: Arc::new(AtomicBool::new(false)),
            min_prompt_chars,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn from_config(cfg: &NexusConfig, generator: Arc<dyn TaskGenerator>) -> Self {
        Self::new(
            generator,
            LifecycleEngine::from_config(&cfg.pipeline),
            cfg.history_limit,
            cfg.min_prompt_chars,
        )
    }

    pub fn engine(&self) -> &LifecycleEngine {
        &self.engine
    }

    /// Trimmed prompt, or the message to show next to the input.
    pub fn validate_prompt(&self, raw: &str) -> Result<String, GenerationError> {
        let prompt = raw.trim();
        if prompt.is_empty() {
            return Err(GenerationError::Validation(
                "Please enter a development goal.".to_string(),
            ));
        }
        if prompt.chars().count() < self.min_prompt_chars {
            return Err(GenerationError::Validation(format!(
                "Please enter at least {} characters to describe your goal.",
                self.min_prompt_chars
            )));
        }
        Ok(prompt.to_string())
    }

    /// Validates, records a pending history entry, calls the generator once
    /// and installs the normalized tasks. On failure the current tasks stay.
    ///
    /// The call runs in a task the orchestrator owns, so dropping the returned
    /// future does not abandon the history entry or release the in-flight slot
    /// early.
    pub async fn submit(&self, raw: &str) -> Result<Vec<Task>, GenerationError> {
        let prompt = self.validate_prompt(raw)?;
        let guard = InFlight::acquire(&self.in_flight).ok_or(GenerationError::Busy)?;
        if self.shutdown.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }

        let entry_id = self.history().record_pending(&prompt);
        info!(history_id = %entry_id, prompt_chars = prompt.chars().count(), "generation dispatched");

        let dispatch = Dispatch {
            generator: Arc::clone(&self.generator),
            engine: self.engine.clone(),
            history: Arc::clone(&self.history),
            shutdown: self.shutdown.clone(),
        };
        tokio::spawn(dispatch.run(entry_id, prompt, guard))
            .await
            .unwrap_or_else(|err| {
                Err(GenerationError::Collaborator(format!("generation task failed: {}", err)))
            })
    }

    /// Re-dispatches the exact prompt of a history entry.
    pub async fn restore(&self, history_id: &str) -> Result<Vec<Task>, GenerationError> {
        let prompt = self
            .history()
            .get(history_id)
            .map(|item| item.prompt.clone())
            .ok_or_else(|| GenerationError::HistoryNotFound(history_id.to_string()))?;
        self.submit(&prompt).await
    }

    pub fn history_items(&self) -> Vec<PromptHistoryItem> {
        self.history().list()
    }

    pub fn clear_history(&self) {
        self.history().clear();
        info!("prompt history cleared");
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Drops any in-flight result and stops the engine.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.engine.shutdown();
    }

    fn history(&self) -> MutexGuard<'_, PromptHistory> {
        lock_history(&self.history)
    }
}

fn lock_history(history: &Mutex<PromptHistory>) -> MutexGuard<'_, PromptHistory> {
    history
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One generator call plus the bookkeeping that must follow it.
struct Dispatch {
    generator: Arc<dyn TaskGenerator>,
    engine: LifecycleEngine,
    history: Arc<Mutex<PromptHistory>>,
    shutdown: CancellationToken,
}

impl Dispatch {
    async fn run(
        self,
        entry_id: String,
        prompt: String,
        _guard: InFlight,
    ) -> Result<Vec<Task>, GenerationError> {
        let generator = Arc::clone(&self.generator);
        let call = tokio::task::spawn_blocking(move || generator.generate(&prompt));

        let outcome = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                warn!(history_id = %entry_id, "generation abandoned on shutdown");
                return Err(GenerationError::Cancelled);
            }
            joined = call => joined.unwrap_or_else(|err| {
                Err(GenerationError::Collaborator(format!("generation worker failed: {}", err)))
            }),
        };
        if self.shutdown.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }

        match outcome.and_then(normalize_tasks) {
            Ok(tasks) => {
                self.engine.replace(tasks.clone());
                lock_history(&self.history).resolve_success(&entry_id, tasks.clone());
                info!(history_id = %entry_id, count = tasks.len(), "generation succeeded");
                Ok(tasks)
            }
            Err(err) => {
                error!(history_id = %entry_id, error = %err, "generation failed");
                lock_history(&self.history).resolve_error(&entry_id, &err.user_message());
                Err(err)
            }
        }
    }
}

/// Marks a generation as in flight until dropped.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlight(Arc::clone(flag)))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
