//! Axum router configuration for all endpoints

use crate::data::DatasetStore;
use crate::insight::{GenerationError, InsightGenerator};
use crate::server::handlers;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tracing::debug;

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub dataset: Arc<DatasetStore>,
    pub generator: Arc<dyn InsightGenerator>,
    /// Token bound passed to every generation call.
    pub max_output_length: u32,
}

impl AppState {
    pub fn new(
        dataset: DatasetStore,
        generator: Arc<dyn InsightGenerator>,
        max_output_length: u32,
    ) -> Self {
        Self {
            dataset: Arc::new(dataset),
            generator,
            max_output_length,
        }
    }

    /// Run one generation call with the configured length bound.
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        debug!("Prompt: {}", prompt);
        self.generator
            .generate(prompt, self.max_output_length)
            .await
    }
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(handlers::status))
        .route("/api/rep_performance", get(handlers::rep_performance))
        .route("/api/team_performance", get(handlers::team_performance))
        .route("/api/performance_trends", get(handlers::performance_trends))
        .with_state(state)
}
