//! Request handlers for the insight endpoints.
//!
//! Every handler follows the same pipeline: aggregate, render a prompt,
//! generate one insight and shape the JSON response.

use crate::analysis::{aggregate_all, aggregate_by_employee, aggregate_by_period};
use crate::insight::prompt::{rep_prompt, team_prompt, trend_prompt};
use crate::models::Period;
use crate::server::{ApiError, AppState};
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct RepQuery {
    pub rep_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub time_period: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RepPerformanceResponse {
    pub rep_id: i64,
    pub insight: String,
}

#[derive(Debug, Serialize)]
pub struct TeamPerformanceResponse {
    pub team_performance: String,
}

#[derive(Debug, Serialize)]
pub struct TrendInsightsResponse {
    pub trend_insights: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model: String,
    pub records: usize,
    pub employees: usize,
}

/// GET /api/rep_performance?rep_id=N
pub async fn rep_performance(
    State(state): State<AppState>,
    Query(query): Query<RepQuery>,
) -> Result<Json<RepPerformanceResponse>, ApiError> {
    let summary = aggregate_by_employee(&state.dataset, query.rep_id)?;
    info!(
        "Rep {}: {} leads over {} records",
        query.rep_id, summary.total_leads, summary.record_count
    );

    let insight = state.generate(&rep_prompt(query.rep_id, &summary)).await?;

    Ok(Json(RepPerformanceResponse {
        rep_id: query.rep_id,
        insight,
    }))
}

/// GET /api/team_performance
pub async fn team_performance(
    State(state): State<AppState>,
) -> Result<Json<TeamPerformanceResponse>, ApiError> {
    let summary = aggregate_all(state.dataset.records());
    let insight = state.generate(&team_prompt(&summary)).await?;

    Ok(Json(TeamPerformanceResponse {
        team_performance: insight,
    }))
}

/// GET /api/performance_trends?time_period=monthly|quarterly
pub async fn performance_trends(
    State(state): State<AppState>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<TrendInsightsResponse>, ApiError> {
    let period: Period = query.time_period.as_deref().unwrap_or("monthly").parse()?;
    let report = aggregate_by_period(state.dataset.records(), period)?;
    info!("Trends: {} {} buckets", report.buckets.len(), period);

    let insight = state.generate(&trend_prompt(period, &report)).await?;

    Ok(Json(TrendInsightsResponse {
        trend_insights: insight,
    }))
}

/// GET /status - Health check endpoint
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model: state.generator.model_name().to_string(),
        records: state.dataset.len(),
        employees: state.dataset.employee_count(),
    })
}

#[cfg(test)]
mod tests {
    use crate::data::DatasetStore;
    use crate::insight::{GenerationError, InsightGenerator};
    use crate::models::SalesRecord;
    use crate::server::{create_router, AppState};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Generator that records every prompt and answers with fixed text.
    #[derive(Default)]
    struct RecordingGenerator {
        calls: Mutex<Vec<(String, u32)>>,
        fail: bool,
    }

    impl RecordingGenerator {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.calls.lock().iter().map(|(p, _)| p.clone()).collect()
        }
    }

    #[async_trait]
    impl InsightGenerator for RecordingGenerator {
        async fn generate(
            &self,
            prompt: &str,
            max_output_length: u32,
        ) -> Result<String, GenerationError> {
            self.calls.lock().push((prompt.to_string(), max_output_length));
            if self.fail {
                return Err(GenerationError::Connect("http://fake".to_string()));
            }
            Ok("Solid quarter, keep booking tours.".to_string())
        }

        fn model_name(&self) -> &str {
            "recording"
        }
    }

    fn record(employee_id: i64, created: &str, lead_taken: i64, revenue: f64) -> SalesRecord {
        SalesRecord {
            employee_id,
            created: created.to_string(),
            lead_taken: Some(lead_taken),
            tours_booked: Some(2),
            applications: Some(1),
            revenue_confirmed: Some(revenue),
            revenue_pending: Some(5.0),
        }
    }

    fn sample_records() -> Vec<SalesRecord> {
        vec![
            record(1, "2024-01-05 09:00:00", 5, 1000.0),
            record(1, "2024-02-10 14:00:00", 3, 500.0),
            record(2, "2024-01-20 10:30:00", 7, 250.5),
        ]
    }

    fn app(records: Vec<SalesRecord>, generator: Arc<RecordingGenerator>) -> Router {
        let state = AppState::new(DatasetStore::from_records(records), generator, 100);
        create_router(state)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Option<Value>) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).ok())
    }

    #[tokio::test]
    async fn test_rep_performance() {
        let generator = Arc::new(RecordingGenerator::default());
        let (status, body) = get(
            app(sample_records(), generator.clone()),
            "/api/rep_performance?rep_id=1",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            Some(json!({"rep_id": 1, "insight": "Solid quarter, keep booking tours."}))
        );

        let calls = generator.calls.lock().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, 100);
        assert!(calls[0].0.contains("with ID 1."));
        assert!(calls[0]
            .0
            .contains("They took 8 leads, booked 4 tours, and confirmed 1500 revenue."));
    }

    #[tokio::test]
    async fn test_rep_not_found_skips_generation() {
        let generator = Arc::new(RecordingGenerator::default());
        let (status, body) = get(
            app(sample_records(), generator.clone()),
            "/api/rep_performance?rep_id=99",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Some(json!({"error": "Sales representative not found"})));
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_rep_id_must_be_integer() {
        let generator = Arc::new(RecordingGenerator::default());

        let (status, _) = get(
            app(sample_records(), generator.clone()),
            "/api/rep_performance?rep_id=abc",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get(app(sample_records(), generator.clone()), "/api/rep_performance").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_team_performance() {
        let generator = Arc::new(RecordingGenerator::default());
        let router = app(sample_records(), generator.clone());

        let (status, body) = get(router.clone(), "/api/team_performance").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            Some(json!({"team_performance": "Solid quarter, keep booking tours."}))
        );

        // Same dataset, same sums on every call.
        get(router, "/api/team_performance").await;
        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], prompts[1]);
        assert!(prompts[0].contains("The team took 15 leads, booked 6 tours, and confirmed 1750.5 revenue."));
    }

    #[tokio::test]
    async fn test_team_performance_on_empty_dataset() {
        let generator = Arc::new(RecordingGenerator::default());
        let (status, _) = get(app(Vec::new(), generator.clone()), "/api/team_performance").await;

        assert_eq!(status, StatusCode::OK);
        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("The team took 0 leads, booked 0 tours, and confirmed 0 revenue."));
    }

    #[tokio::test]
    async fn test_trends_default_to_monthly() {
        let generator = Arc::new(RecordingGenerator::default());
        let (status, body) = get(
            app(sample_records(), generator.clone()),
            "/api/performance_trends",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            Some(json!({"trend_insights": "Solid quarter, keep booking tours."}))
        );

        let prompts = generator.prompts();
        assert!(prompts[0].contains("based on monthly data"));
        assert!(prompts[0].contains("2024-01: lead_taken(count=2, mean=6"));
        assert!(prompts[0].contains("2024-02: lead_taken(count=1, mean=3"));
    }

    #[tokio::test]
    async fn test_trends_quarterly() {
        let generator = Arc::new(RecordingGenerator::default());
        get(
            app(sample_records(), generator.clone()),
            "/api/performance_trends?time_period=quarterly",
        )
        .await;

        let prompts = generator.prompts();
        assert!(prompts[0].contains("based on quarterly data"));
        assert!(prompts[0].contains("2024-Q1: lead_taken(count=3, mean=5"));
    }

    #[tokio::test]
    async fn test_trends_invalid_period_skips_generation() {
        let generator = Arc::new(RecordingGenerator::default());
        let (status, body) = get(
            app(sample_records(), generator.clone()),
            "/api/performance_trends?time_period=weekly",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            Some(json!({"error": "Invalid time period. Choose 'monthly' or 'quarterly'."}))
        );
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_trends_malformed_timestamp_is_server_error() {
        let generator = Arc::new(RecordingGenerator::default());
        let records = vec![record(1, "2024-01-05", 1, 1.0), record(1, "soon", 1, 1.0)];
        let (status, body) = get(app(records, generator.clone()), "/api/performance_trends").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            Some(json!({"error": "Malformed timestamp in row 2: 'soon'"}))
        );
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_is_server_error() {
        let generator = Arc::new(RecordingGenerator::failing());
        let (status, body) = get(
            app(sample_records(), generator.clone()),
            "/api/team_performance",
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, Some(json!({"error": "Insight generation failed"})));
        assert_eq!(generator.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_status() {
        let generator = Arc::new(RecordingGenerator::default());
        let (status, body) = get(app(sample_records(), generator.clone()), "/status").await;

        assert_eq!(status, StatusCode::OK);
        let body = body.unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["model"], "recording");
        assert_eq!(body["records"], 3);
        assert_eq!(body["employees"], 2);
        assert!(generator.prompts().is_empty());
    }
}
