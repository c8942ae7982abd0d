//! 실행 결과 통계.

use ingest_core::{DatasetKind, DateRange, InstrumentId, Universe, WorkItem};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 작업 단위 실패 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// 재시도 횟수 소진
    Transient,
    /// 재시도 불가 에러 또는 서킷 오픈
    Permanent,
    /// upsert 또는 커서 갱신 실패
    Persist,
    /// 저장소 전체 사용 불가
    StoreUnavailable,
}

/// 실패한 작업 단위 기록
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemFailure {
    pub instrument_id: InstrumentId,
    pub ticker: String,
    pub dataset: DatasetKind,
    pub range: DateRange,
    pub class: FailureClass,
    pub message: String,
}

impl ItemFailure {
    /// 작업 단위와 에러 메시지로 실패 기록을 만듭니다.
    pub fn new(item: &WorkItem, class: FailureClass, message: impl Into<String>) -> Self {
        Self {
            instrument_id: item.instrument.id,
            ticker: item.instrument.ticker.clone(),
            dataset: item.dataset,
            range: item.range,
            class,
            message: message.into(),
        }
    }
}

/// 유니버스 동기화 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseSyncReport {
    pub universe: Universe,
    /// 원격에서 받은 항목 수 (중복 제거 후)
    pub fetched: usize,
    pub inserted: u64,
    pub updated: u64,
    pub deactivated: u64,
    /// 목록 조회 실패 사유 (실패하면 저장소는 건드리지 않음)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UniverseSyncReport {
    /// 아무것도 반영하지 않은 결과.
    pub fn unchanged(universe: Universe) -> Self {
        Self {
            universe,
            fetched: 0,
            inserted: 0,
            updated: 0,
            deactivated: 0,
            error: None,
        }
    }
}

/// `run_once` / `rebuild` 실행 결과
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// 계획된 작업 단위 수
    pub items_planned: usize,
    /// 저장까지 완료된 작업 단위 수
    pub items_succeeded: usize,
    /// 실패한 작업 단위 수
    pub items_failed: usize,
    /// 같은 레인의 앞선 실패로 건너뛴 작업 단위 수
    pub items_skipped: usize,
    /// 기록된 레코드 수
    pub records_written: usize,
    /// 실패 상세
    pub failures: Vec<ItemFailure>,
    /// 계획 전에 수행한 유니버스 동기화 결과
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub universes: Vec<UniverseSyncReport>,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunSummary {
    /// 빈 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 다른 실행 결과를 합칩니다.
    pub fn merge(&mut self, other: RunSummary) {
        self.items_planned += other.items_planned;
        self.items_succeeded += other.items_succeeded;
        self.items_failed += other.items_failed;
        self.items_skipped += other.items_skipped;
        self.records_written += other.records_written;
        self.failures.extend(other.failures);
        self.universes.extend(other.universes);
        self.elapsed += other.elapsed;
    }

    /// 실패 기록 추가
    pub fn record_failure(&mut self, failure: ItemFailure) {
        self.items_failed += 1;
        self.failures.push(failure);
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.items_planned == 0 {
            0.0
        } else {
            (self.items_succeeded as f64 / self.items_planned as f64) * 100.0
        }
    }

    /// 성공이 하나도 없고 모든 실패가 저장소 사용 불가인 경우.
    pub fn is_total_store_failure(&self) -> bool {
        self.items_succeeded == 0
            && !self.failures.is_empty()
            && self
                .failures
                .iter()
                .all(|f| f.class == FailureClass::StoreUnavailable)
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            planned = self.items_planned,
            succeeded = self.items_succeeded,
            failed = self.items_failed,
            skipped = self.items_skipped,
            records = self.records_written,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
        for report in &self.universes {
            tracing::info!(
                universe = %report.universe,
                fetched = report.fetched,
                inserted = report.inserted,
                updated = report.updated,
                deactivated = report.deactivated,
                error = report.error.as_deref().unwrap_or("-"),
                "유니버스 동기화"
            );
        }
        for failure in &self.failures {
            tracing::warn!(
                ticker = %failure.ticker,
                dataset = %failure.dataset,
                range = %failure.range,
                class = ?failure.class,
                error = %failure.message,
                "작업 실패"
            );
        }
    }
}
