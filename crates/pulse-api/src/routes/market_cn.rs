//! 중국 시장 endpoint.
//!
//! - `GET /api/cn/fear-greed` - 시장 분위기 (주요 지수 등락 요약)
//! - `GET /api/cn/leaders` - 주도 지수
//! - `GET /api/cn/bonds` - 국채 수익률 곡선

use crate::routes::respond;
use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use pulse_core::envelope::ApiEnvelope;
use std::sync::Arc;

pub fn market_cn_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/fear-greed", get(get_fear_greed))
        .route("/leaders", get(get_leaders))
        .route("/bonds", get(get_bonds))
}

async fn get_fear_greed(State(state): State<Arc<AppState>>) -> Json<ApiEnvelope> {
    respond(&state.ops.cn_fear_greed).await
}

async fn get_leaders(State(state): State<Arc<AppState>>) -> Json<ApiEnvelope> {
    respond(&state.ops.cn_leaders).await
}

async fn get_bonds(State(state): State<Arc<AppState>>) -> Json<ApiEnvelope> {
    respond(&state.ops.cn_bonds).await
}
