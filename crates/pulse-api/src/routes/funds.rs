//! 펀드 endpoint.
//!
//! - `GET /api/funds/top` - 공모펀드 상승/하락 순위
//!
//! 전량 적재에 수 분이 걸릴 수 있어 cold miss를 동기 해소하지
//! 않습니다. 준비 전에는 `warming_up`을 반환합니다.

use crate::routes::respond_nonblocking;
use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use pulse_core::envelope::ApiEnvelope;
use std::sync::Arc;

pub fn funds_router() -> Router<Arc<AppState>> {
    Router::new().route("/top", get(get_top))
}

async fn get_top(State(state): State<Arc<AppState>>) -> Json<ApiEnvelope> {
    respond_nonblocking(&state.ops.funds_top).await
}
