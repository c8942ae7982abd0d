//! 연속 실행기.
//!
//! ```text
//! Idle ──> Running ──> Sleeping ──> Running ──> ... ──[stop]──> Stopped
//! ```
//!
//! 다음 실행 시각은 `cycle_start + interval`로 계산하므로 실행 시간만큼
//! 주기가 밀리지 않습니다. 실행이 주기보다 오래 걸리면 다음 실행을 바로 시작합니다.
//!
//! 중단은 협조적입니다. 중단 신호는 실행 사이에서만 확인되며 진행 중인
//! 실행은 끝까지 완료됩니다.

use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::CollectorError;
use crate::stats::RunSummary;
use crate::Result;

/// 실행기 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerState {
    /// 시작 전
    Idle,
    /// 실행 중
    Running,
    /// 다음 실행 대기 중
    Sleeping,
    /// 종료됨
    Stopped,
}

impl RunnerState {
    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Sleeping => "sleeping",
            Self::Stopped => "stopped",
        }
    }
}

/// 실행기 종료 보고
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunnerReport {
    /// 완료된 실행 수 (실패 포함)
    pub cycles: u64,
    /// 에러로 끝난 실행 수
    pub failed_cycles: u64,
    /// 마지막으로 성공한 실행 결과
    pub last_summary: Option<RunSummary>,
}

/// 실행 중인 연속 실행기 핸들.
#[derive(Debug)]
pub struct RunnerHandle {
    token: CancellationToken,
    state: watch::Receiver<RunnerState>,
    task: JoinHandle<RunnerReport>,
}

impl RunnerHandle {
    /// 현재 상태.
    pub fn state(&self) -> RunnerState {
        *self.state.borrow()
    }

    /// 상태 변경 구독.
    pub fn subscribe(&self) -> watch::Receiver<RunnerState> {
        self.state.clone()
    }

    /// 중단을 요청합니다. 진행 중인 실행은 완료됩니다.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// 실행기 종료를 기다립니다.
    pub async fn join(self) -> Result<RunnerReport> {
        self.task
            .await
            .map_err(|e| CollectorError::Task(e.to_string()))
    }

    /// 중단을 요청하고 종료를 기다립니다.
    pub async fn shutdown(self) -> Result<RunnerReport> {
        self.stop();
        self.join().await
    }
}

/// 한 번에 대기하는 최대 시간 (약 30년). 이보다 긴 주기는 여기서 잘립니다.
const MAX_SLEEP: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// `cycle`을 `interval` 주기로 반복 실행하는 태스크를 시작합니다.
pub fn spawn_runner<F, Fut>(interval: Duration, mut cycle: F) -> RunnerHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<RunSummary>> + Send + 'static,
{
    let token = CancellationToken::new();
    let (state_tx, state_rx) = watch::channel(RunnerState::Idle);
    let cancel = token.clone();

    let task = tokio::spawn(async move {
        let mut report = RunnerReport::default();

        while !cancel.is_cancelled() {
            let cycle_start = Instant::now();
            state_tx.send_replace(RunnerState::Running);

            match cycle().await {
                Ok(summary) => {
                    summary.log_summary("연속 수집");
                    report.last_summary = Some(summary);
                }
                Err(e) => {
                    report.failed_cycles += 1;
                    error!(error = %e, "연속 수집 실행 실패");
                }
            }
            report.cycles += 1;

            if cancel.is_cancelled() {
                break;
            }

            let next_wake = cycle_start
                .checked_add(interval.min(MAX_SLEEP))
                .unwrap_or_else(|| Instant::now() + MAX_SLEEP);
            state_tx.send_replace(RunnerState::Sleeping);
            info!(
                cycle = report.cycles,
                next_in_secs = next_wake
                    .saturating_duration_since(Instant::now())
                    .as_secs_f64(),
                "다음 실행 대기"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = sleep_until(next_wake) => {}
            }
        }

        state_tx.send_replace(RunnerState::Stopped);
        info!(cycles = report.cycles, "연속 수집 종료");
        report
    });

    RunnerHandle {
        token,
        state: state_rx,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test(start_paused = true)]
    async fn test_drift_corrected_schedule() {
        let starts = Arc::new(Mutex::new(Vec::new()));
        let origin = Instant::now();

        let recorder = starts.clone();
        let handle = spawn_runner(Duration::from_secs(10), move || {
            let recorder = recorder.clone();
            async move {
                recorder.lock().unwrap().push(origin.elapsed());
                tokio::time::sleep(Duration::from_secs(3)).await;
                Ok(RunSummary::new())
            }
        });

        tokio::time::sleep(Duration::from_secs(25)).await;
        let report = handle.shutdown().await.unwrap();

        let starts = starts.lock().unwrap().clone();
        assert_eq!(
            starts,
            vec![
                Duration::ZERO,
                Duration::from_secs(10),
                Duration::from_secs(20)
            ]
        );
        assert_eq!(report.cycles, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_starts_next_cycle_immediately() {
        let starts = Arc::new(Mutex::new(Vec::new()));
        let origin = Instant::now();

        let recorder = starts.clone();
        let handle = spawn_runner(Duration::from_secs(5), move || {
            let recorder = recorder.clone();
            async move {
                recorder.lock().unwrap().push(origin.elapsed());
                tokio::time::sleep(Duration::from_secs(8)).await;
                Ok(RunSummary::new())
            }
        });

        tokio::time::sleep(Duration::from_secs(20)).await;
        handle.shutdown().await.unwrap();

        let starts = starts.lock().unwrap().clone();
        assert_eq!(starts[1], Duration::from_secs(8));
        assert_eq!(starts[2], Duration::from_secs(16));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_in_flight_cycle() {
        let finished = Arc::new(Mutex::new(0u32));

        let counter = finished.clone();
        let handle = spawn_runner(Duration::from_secs(60), move || {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                *counter.lock().unwrap() += 1;
                Ok(RunSummary::new())
            }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.state(), RunnerState::Running);

        let mut states = handle.subscribe();
        handle.stop();
        let report = handle.join().await.unwrap();

        assert_eq!(*finished.lock().unwrap(), 1);
        assert_eq!(report.cycles, 1);
        assert_eq!(*states.borrow_and_update(), RunnerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycle_keeps_running() {
        let calls = Arc::new(Mutex::new(0u32));

        let counter = calls.clone();
        let handle = spawn_runner(Duration::from_secs(1), move || {
            let counter = counter.clone();
            async move {
                let mut calls = counter.lock().unwrap();
                *calls += 1;
                if *calls == 1 {
                    Err(CollectorError::FatalStoreUnavailable("down".to_string()))
                } else {
                    Ok(RunSummary::new())
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let report = handle.shutdown().await.unwrap();

        assert_eq!(report.failed_cycles, 1);
        assert!(report.cycles >= 2);
        assert!(report.last_summary.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_interval_sleeps_until_stopped() {
        let handle = spawn_runner(Duration::MAX, || async { Ok(RunSummary::new()) });

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(handle.state(), RunnerState::Sleeping);

        let report = handle.shutdown().await.unwrap();
        assert_eq!(report.cycles, 1);
        assert_eq!(report.failed_cycles, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeping_state_between_cycles() {
        let handle = spawn_runner(Duration::from_secs(30), || async { Ok(RunSummary::new()) });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.state(), RunnerState::Sleeping);
        assert_eq!(handle.state().as_str(), "sleeping");

        let report = handle.shutdown().await.unwrap();
        assert_eq!(report.cycles, 1);
    }
}
