pub mod config;
pub mod error;
pub mod helpers;
pub mod logging;
pub mod orchestrator;

#[path = "llm/lib.rs"]
pub mod llm;
#[path = "task/lib.rs"]
pub mod task;
#[path = "api/lib.rs"]
pub mod api;

pub use config::{NexusConfig, PipelineConfig};
pub use error::{ConfigError, GenerationError, LifecycleError};
pub use orchestrator::GenerationOrchestrator;
