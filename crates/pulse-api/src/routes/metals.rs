//! 귀금속 endpoint.
//!
//! - `GET /api/metals/spot-prices` - SGE 현물 호가
//! - `GET /api/metals/gold-silver-ratio` - 금은비

use crate::routes::respond;
use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use pulse_core::envelope::ApiEnvelope;
use std::sync::Arc;

pub fn metals_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/spot-prices", get(get_spot_prices))
        .route("/gold-silver-ratio", get(get_gold_silver_ratio))
}

async fn get_spot_prices(State(state): State<Arc<AppState>>) -> Json<ApiEnvelope> {
    respond(&state.ops.metals_spot).await
}

async fn get_gold_silver_ratio(State(state): State<Arc<AppState>>) -> Json<ApiEnvelope> {
    respond(&state.ops.gold_silver_ratio).await
}
