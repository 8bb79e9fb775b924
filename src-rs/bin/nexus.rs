use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use nexus_rs::api::NexusServer;
use nexus_rs::config::NexusConfig;
use nexus_rs::helpers::{build_generator, load_gemini_keys};
use nexus_rs::logging::init_logging;
use nexus_rs::GenerationOrchestrator;

// The blocking HTTP client must be built and dropped outside the runtime, so
// the orchestrator is created before tokio starts and outlives it.
fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cfg = NexusConfig::from_env().context("invalid configuration")?;
    init_logging("info", cfg.log_json);

    let generator = build_generator(&cfg, load_gemini_keys()).context("cannot build task generator")?;
    info!(
        port = cfg.port,
        testing = cfg.testing,
        model = %cfg.model,
        success_rate = cfg.pipeline.success_rate,
        pipeline_ms = cfg.pipeline.total_delay().as_millis() as u64,
        "starting nexus"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("cannot start runtime")?;

    let orchestrator = Arc::new(GenerationOrchestrator::from_config(&cfg, generator));
    let server = NexusServer::new(cfg.port, Arc::clone(&orchestrator));
    let result = runtime.block_on(server.start(async {
        tokio::signal::ctrl_c().await.ok();
    }));
    drop(server);
    drop(runtime);
    drop(orchestrator);
    result
}
