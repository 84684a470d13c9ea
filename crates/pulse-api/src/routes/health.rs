//! 헬스 체크 endpoint.
//!
//! 로드밸런서/오케스트레이션용 liveness와 구성 요소 상태를 담은
//! readiness를 제공합니다. 스토어가 오프라인이어도 서비스는
//! fail-open으로 동작하므로 readiness는 200에 `degraded`로 표시합니다.

use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 헬스 체크 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// 전체 상태 ("healthy" | "degraded")
    pub status: String,
    /// API 버전
    pub version: String,
    /// 서버 업타임(초)
    pub uptime_secs: i64,
    /// 현재 시간 (ISO 8601)
    pub timestamp: String,
    /// 개별 컴포넌트 상태
    pub components: ComponentHealth,
}

/// 개별 컴포넌트 상태.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// 캐시 스토어 상태
    pub store: ComponentStatus,
    /// 예열 스케줄러 상태
    pub scheduler: ComponentStatus,
}

/// 컴포넌트 상태.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentStatus {
    /// 상태 ("up" | "down")
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(liveness))
        .route("/health/ready", get(readiness))
}

/// 단순 liveness 확인.
async fn liveness() -> &'static str {
    "OK"
}

/// 구성 요소 상태를 포함한 readiness 확인.
async fn readiness(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store_up = state.store.is_connected();
    let job_count = state.scheduler.status().await.len();

    let store = if store_up {
        ComponentStatus {
            status: "up".to_string(),
            message: None,
        }
    } else {
        ComponentStatus {
            status: "down".to_string(),
            message: Some("스토어 오프라인, fail-open 모드".to_string()),
        }
    };

    let scheduler = ComponentStatus {
        status: if job_count > 0 { "up" } else { "down" }.to_string(),
        message: Some(format!("{}개 잡 등록됨", job_count)),
    };

    Json(HealthResponse {
        status: if store_up { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        timestamp: Utc::now().to_rfc3339(),
        components: ComponentHealth { store, scheduler },
    })
}
