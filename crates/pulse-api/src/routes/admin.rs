//! 스케줄러 관리 endpoint.
//!
//! - `GET /api/admin/scheduler/status` - 잡 실행 현황
//! - `POST /api/admin/scheduler/run/{job_id}` - 잡 즉시 1회 실행
//!
//! 관리 경로는 별도의 엄격한 레이트 리밋 뒤에 둡니다 (라우터 조립 시 적용).

use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use pulse_scheduler::{JobStatus, SchedulerError};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/scheduler/status", get(scheduler_status))
        .route("/scheduler/run/{job_id}", post(run_job))
}

async fn scheduler_status(State(state): State<Arc<AppState>>) -> Json<Vec<JobStatus>> {
    Json(state.scheduler.status().await)
}

async fn run_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    match state.scheduler.run_job_now(&job_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"status": "ok", "job_id": job_id})),
        ),
        Err(SchedulerError::JobNotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({"status": "error", "message": format!("잡 없음: {}", job_id)})),
        ),
        Err(SchedulerError::JobFailed(message)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"status": "error", "message": message})),
        ),
    }
}
