use crate::data::{ExamRecord, RawRoomRow, RunConfig, SolveStatus};
use crate::error::AssignError;
use crate::pipeline::Pipeline;
use axum::{Json, Router, routing::post};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub exams: Vec<ExamRecord>,
    pub rooms: Vec<RawRoomRow>,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub time_limit_seconds: Option<u64>,
    #[serde(default)]
    pub fallback_to_greedy: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignResponse {
    pub records: Vec<ExamRecord>,
    pub status: SolveStatus,
    pub objective_value: Option<f64>,
    pub solve_time_ms: u128,
    pub assigned_count: usize,
    pub unassigned_count: usize,
    pub rejected_rooms: Vec<String>,
}

/// Parses the optional request knobs into a [`RunConfig`]; unknown names
/// are configuration errors.
fn config_from(request: &AssignRequest) -> Result<RunConfig, AssignError> {
    let mut config = RunConfig::default();
    if let Some(strategy) = &request.strategy {
        config.strategy = strategy.parse()?;
    }
    if let Some(objective) = &request.objective {
        config.objective = objective.parse()?;
    }
    if let Some(secs) = request.time_limit_seconds {
        config.time_limit = std::time::Duration::from_secs(secs);
    }
    if let Some(fallback) = request.fallback_to_greedy {
        config.fallback_to_greedy = fallback;
    }
    Ok(config)
}

async fn assign_handler(
    Json(request): Json<AssignRequest>,
) -> Result<Json<AssignResponse>, (axum::http::StatusCode, String)> {
    let bad_request = |e: AssignError| (axum::http::StatusCode::BAD_REQUEST, e.to_string());

    let config = config_from(&request).map_err(bad_request)?;
    let pipeline = Pipeline::new(Some(request.rooms), None, config).map_err(bad_request)?;
    let report = pipeline.run(&request.exams).map_err(bad_request)?;

    Ok(Json(AssignResponse {
        status: report.outcome.status,
        objective_value: report.outcome.objective_value,
        solve_time_ms: report.outcome.solve_time.as_millis(),
        assigned_count: report.assigned_count(),
        unassigned_count: report.unassigned_count(),
        rejected_rooms: report.rejected_rooms.iter().map(|e| e.to_string()).collect(),
        records: report.records,
    }))
}

pub async fn run_server() {
    let app = Router::new().route("/v1/rooms/assign", post(assign_handler));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8080")
        .await
        .expect("failed to bind 127.0.0.1:8080");

    println!(
        "Server running at http://{}",
        listener.local_addr().expect("listener has no local addr")
    );

    axum::serve(listener, app).await.expect("server error");
}
