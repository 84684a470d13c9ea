//! 예열 스케줄러.
//!
//! 시장별 반복 잡을 tokio 인터벌로 구동합니다. 전역 싱글턴이 아니라
//! 명시적으로 생성해 주입하며, 모든 잡은 `CancellationToken`으로
//! 함께 종료됩니다.
//!
//! 인터벌은 `MissedTickBehavior::Skip`으로 설정합니다. 잡 실행이
//! 주기를 넘겨도 밀린 틱이 몰아서 돌지 않고, 잡 하나당 동시 실행은
//! 루프 구조상 1건으로 제한됩니다.

use crate::calendar::TradeCalendar;
use crate::error::{Result, SchedulerError};
use chrono::{NaiveDate, NaiveTime, Timelike};
use futures::future::BoxFuture;
use pulse_core::calendar::{beijing_now, MarketPolicy};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 잡 본문. 실패는 로그용 메시지로 보고합니다.
pub type JobFn = Arc<dyn Fn() -> BoxFuture<'static, std::result::Result<(), String>> + Send + Sync>;

#[derive(Default)]
struct JobState {
    runs: u64,
    last_outcome: Option<String>,
    last_run_at: Option<i64>,
}

struct JobEntry {
    handle: JoinHandle<()>,
    state: Arc<StdMutex<JobState>>,
    runner: JobFn,
}

/// 잡 상태 스냅샷 (관리 API 노출용).
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub job_id: String,
    pub runs: u64,
    pub last_outcome: Option<String>,
    pub last_run_at: Option<i64>,
}

/// 캐시 예열 스케줄러.
pub struct WarmupScheduler {
    jobs: tokio::sync::Mutex<HashMap<String, JobEntry>>,
    shutdown: CancellationToken,
}

impl Default for WarmupScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl WarmupScheduler {
    pub fn new() -> Self {
        Self {
            jobs: tokio::sync::Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// 시장 주기 잡 등록.
    ///
    /// 틱 간격은 거래/비거래 주기 중 짧은 쪽(최소 1분)이며, 실제 실행
    /// 여부는 매 틱마다 현재 주기의 분 단위 modulo로 판정합니다.
    /// 거래 시간에 들어서면 다음 틱부터 즉시 짧은 주기가 적용됩니다.
    pub async fn register_market_job(&self, job_id: &str, policy: MarketPolicy, runner: JobFn) {
        let state = Arc::new(StdMutex::new(JobState::default()));
        let tick = Duration::from_secs(policy.min_cadence_minutes() * 60);

        let loop_state = Arc::clone(&state);
        let loop_runner = Arc::clone(&runner);
        let shutdown = self.shutdown.clone();
        let id = job_id.to_string();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!(job_id = %id, "잡 종료");
                        break;
                    }
                    _ = interval.tick() => {
                        let now = beijing_now();
                        if !policy.should_fire_at(now) {
                            continue;
                        }
                        run_once(&id, &loop_state, &loop_runner).await;
                    }
                }
            }
        });

        self.insert(job_id, JobEntry { handle, state, runner })
            .await;
        info!(job_id, tick_secs = tick.as_secs(), "시장 주기 잡 등록");
    }

    /// 고정 간격 잡 등록.
    pub async fn register_interval_job(&self, job_id: &str, minutes: u64, runner: JobFn) {
        let state = Arc::new(StdMutex::new(JobState::default()));

        let loop_state = Arc::clone(&state);
        let loop_runner = Arc::clone(&runner);
        let shutdown = self.shutdown.clone();
        let id = job_id.to_string();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(minutes.max(1) * 60));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        run_once(&id, &loop_state, &loop_runner).await;
                    }
                }
            }
        });

        self.insert(job_id, JobEntry { handle, state, runner })
            .await;
        info!(job_id, minutes, "고정 간격 잡 등록");
    }

    /// 개장 전 예열 잡 등록.
    ///
    /// 매일 `fire_at`(북경시간)에 한 번, 거래일에만 실행합니다.
    pub async fn register_premarket_job(
        &self,
        job_id: &str,
        fire_at: NaiveTime,
        calendar: Arc<TradeCalendar>,
        runner: JobFn,
    ) {
        let state = Arc::new(StdMutex::new(JobState::default()));

        let loop_state = Arc::clone(&state);
        let loop_runner = Arc::clone(&runner);
        let shutdown = self.shutdown.clone();
        let id = job_id.to_string();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last_fired: Option<NaiveDate> = None;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let now = beijing_now();
                        let today = now.date_naive();

                        if now.time().hour() != fire_at.hour()
                            || now.time().minute() != fire_at.minute()
                            || last_fired == Some(today)
                        {
                            continue;
                        }
                        if !calendar.is_trading_day(today).await {
                            debug!(job_id = %id, %today, "비거래일, 개장 전 예열 건너뜀");
                            last_fired = Some(today);
                            continue;
                        }

                        last_fired = Some(today);
                        run_once(&id, &loop_state, &loop_runner).await;
                    }
                }
            }
        });

        self.insert(job_id, JobEntry { handle, state, runner })
            .await;
        info!(job_id, %fire_at, "개장 전 예열 잡 등록");
    }

    /// 잡 즉시 1회 실행 (관리 API용).
    pub async fn run_job_now(&self, job_id: &str) -> Result<()> {
        let (state, runner) = {
            let jobs = self.jobs.lock().await;
            let entry = jobs
                .get(job_id)
                .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))?;
            (Arc::clone(&entry.state), Arc::clone(&entry.runner))
        };

        if run_once(job_id, &state, &runner).await {
            Ok(())
        } else {
            let message = state
                .lock()
                .map(|s| s.last_outcome.clone().unwrap_or_default())
                .unwrap_or_default();
            Err(SchedulerError::JobFailed(message))
        }
    }

    /// 모든 잡의 상태 스냅샷.
    pub async fn status(&self) -> Vec<JobStatus> {
        let jobs = self.jobs.lock().await;
        let mut statuses: Vec<JobStatus> = jobs
            .iter()
            .map(|(job_id, entry)| {
                let state = entry.state.lock().unwrap_or_else(|e| e.into_inner());
                JobStatus {
                    job_id: job_id.clone(),
                    runs: state.runs,
                    last_outcome: state.last_outcome.clone(),
                    last_run_at: state.last_run_at,
                }
            })
            .collect();
        statuses.sort_by(|a, b| a.job_id.cmp(&b.job_id));
        statuses
    }

    /// 모든 잡 종료.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let mut jobs = self.jobs.lock().await;
        for (job_id, entry) in jobs.drain() {
            entry.handle.abort();
            debug!(job_id = %job_id, "잡 중단");
        }
        info!("스케줄러 종료 완료");
    }

    /// 동일 ID 재등록 시 기존 잡을 중단하고 교체합니다.
    async fn insert(&self, job_id: &str, entry: JobEntry) {
        let mut jobs = self.jobs.lock().await;
        if let Some(old) = jobs.insert(job_id.to_string(), entry) {
            old.handle.abort();
            warn!(job_id, "기존 잡을 교체");
        }
    }
}

/// 잡 1회 실행 후 상태를 갱신합니다. 성공 여부를 반환합니다.
async fn run_once(job_id: &str, state: &Arc<StdMutex<JobState>>, runner: &JobFn) -> bool {
    debug!(job_id, "잡 실행");
    let result = runner().await;
    let now = chrono::Utc::now().timestamp();

    let ok = result.is_ok();
    if let Ok(mut s) = state.lock() {
        s.runs += 1;
        s.last_run_at = Some(now);
        s.last_outcome = Some(match &result {
            Ok(()) => "ok".to_string(),
            Err(e) => format!("error: {}", e),
        });
    }

    if let Err(e) = result {
        warn!(job_id, "잡 실행 실패: {}", e);
    }
    ok
}
