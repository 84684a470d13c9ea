//! 글로벌 지수 endpoint.
//!
//! - `GET /api/global/indices` - 주요국 시장 지수 현재가

use crate::routes::respond;
use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use pulse_core::envelope::ApiEnvelope;
use std::sync::Arc;

pub fn global_router() -> Router<Arc<AppState>> {
    Router::new().route("/indices", get(get_indices))
}

async fn get_indices(State(state): State<Arc<AppState>>) -> Json<ApiEnvelope> {
    respond(&state.ops.global_indices).await
}
