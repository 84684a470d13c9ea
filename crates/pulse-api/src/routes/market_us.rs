//! 미국 시장 endpoint.
//!
//! - `GET /api/us/heat` - 시장 히트 (주요 지수 등락 요약)
//! - `GET /api/us/leaders` - 주도 지수
//! - `GET /api/us/treasury` - 국채 수익률

use crate::routes::respond;
use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use pulse_core::envelope::ApiEnvelope;
use std::sync::Arc;

pub fn market_us_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/heat", get(get_heat))
        .route("/leaders", get(get_leaders))
        .route("/treasury", get(get_treasury))
}

async fn get_heat(State(state): State<Arc<AppState>>) -> Json<ApiEnvelope> {
    respond(&state.ops.us_heat).await
}

async fn get_leaders(State(state): State<Arc<AppState>>) -> Json<ApiEnvelope> {
    respond(&state.ops.us_leaders).await
}

async fn get_treasury(State(state): State<Arc<AppState>>) -> Json<ApiEnvelope> {
    respond(&state.ops.us_treasury).await
}
