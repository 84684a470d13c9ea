//! 애플리케이션 상태.

use crate::ops::OpsCatalog;
use chrono::{DateTime, Utc};
use pulse_core::config::Settings;
use pulse_data::KeyValueStore;
use pulse_scheduler::WarmupScheduler;
use std::sync::Arc;

/// 라우트 핸들러가 공유하는 상태.
///
/// 전역 싱글턴 없이 기동 시 한 번 조립해 `Arc`로 주입합니다.
pub struct AppState {
    pub settings: Settings,
    pub store: Arc<dyn KeyValueStore>,
    pub ops: OpsCatalog,
    pub scheduler: Arc<WarmupScheduler>,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        store: Arc<dyn KeyValueStore>,
        ops: OpsCatalog,
        scheduler: Arc<WarmupScheduler>,
    ) -> Self {
        Self {
            settings,
            store,
            ops,
            scheduler,
            started_at: Utc::now(),
        }
    }

    /// 서버 업타임 (초).
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
