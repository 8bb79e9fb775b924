use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tracing::info;

use crate::api::handlers::{
    handle_accept, handle_clear_history, handle_generate, handle_health, handle_history,
    handle_reject, handle_restore, handle_set_status, handle_tasks,
};
use crate::orchestrator::GenerationOrchestrator;

pub fn build_router(orchestrator: Arc<GenerationOrchestrator>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/generate", post(handle_generate))
        .route("/api/tasks", get(handle_tasks))
        .route("/api/tasks/:id/accept", post(handle_accept))
        .route("/api/tasks/:id/reject", post(handle_reject))
        .route("/api/tasks/:id/status", put(handle_set_status))
        .route("/api/history", get(handle_history).delete(handle_clear_history))
        .route("/api/history/:id/restore", post(handle_restore))
        .with_state(orchestrator)
}

pub struct NexusServer {
    pub port: u16,
    pub orchestrator: Arc<GenerationOrchestrator>,
}

impl NexusServer {
    pub fn new(port: u16, orchestrator: Arc<GenerationOrchestrator>) -> Self {
        Self { port, orchestrator }
    }

    /// Serves until `signal` resolves, then stops the pipeline and drops any
    /// in-flight generation.
    pub async fn start<F>(&self, signal: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = build_router(Arc::clone(&self.orchestrator));
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!(%addr, "nexus listening");

        let orchestrator = Arc::clone(&self.orchestrator);
        axum::Server::bind(&addr)
            .serve(app.into_make_service())
            .with_graceful_shutdown(async move {
                signal.await;
                info!("shutdown requested");
                orchestrator.shutdown();
            })
            .await?;
        Ok(())
    }
}
