//! 종목별 서킷 브레이커.
//!
//! 같은 종목에서 작업 단위 실패가 연속 `threshold`번 발생하면 이번 실행의
//! 나머지 작업 단위를 건너뜁니다. 영구 실패와 재시도 소진, 그리고 앞 구간
//! 실패 때문에 이번 실행에서 처리할 수 없게 된 같은 레인의 뒤 구간이 실패로
//! 집계됩니다. 상태는 실행 단위로 생성되어 다음 실행에서 초기화됩니다.

use ingest_core::InstrumentKey;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// 실행 범위 서킷 브레이커.
#[derive(Debug)]
pub struct CircuitBreaker {
    failures: Mutex<HashMap<InstrumentKey, u32>>,
    threshold: u32,
}

impl CircuitBreaker {
    /// `threshold`가 0이면 서킷이 열리지 않습니다.
    pub fn new(threshold: u32) -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            threshold,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<InstrumentKey, u32>> {
        self.failures.lock().unwrap_or_else(|poisoned| {
            warn!("서킷 브레이커 뮤텍스 poison 상태, 복구합니다");
            poisoned.into_inner()
        })
    }

    /// 종목의 서킷이 열렸는지 확인합니다.
    pub fn is_open(&self, key: &InstrumentKey) -> bool {
        self.threshold > 0
            && self
                .lock()
                .get(key)
                .is_some_and(|count| *count >= self.threshold)
    }

    /// 성공 시 연속 실패 횟수를 초기화합니다.
    pub fn record_success(&self, key: &InstrumentKey) {
        if self.lock().remove(key).is_some() {
            debug!(instrument = %key, "서킷 브레이커: 실패 횟수 초기화");
        }
    }

    /// 실패를 기록하고 서킷이 이번 실패로 열렸으면 `true`를 반환합니다.
    pub fn record_failure(&self, key: &InstrumentKey) -> bool {
        self.record_failures(key, 1)
    }

    /// 실패 `count`건을 한 번에 기록합니다. 서킷이 이번 기록으로 열렸으면 `true`.
    pub fn record_failures(&self, key: &InstrumentKey, count: u32) -> bool {
        if count == 0 {
            return false;
        }
        let mut failures = self.lock();
        let total = failures.entry(*key).or_insert(0);
        let before = *total;
        *total = total.saturating_add(count);

        let opened = self.threshold > 0 && before < self.threshold && *total >= self.threshold;
        if opened {
            warn!(
                instrument = %key,
                failures = *total,
                "서킷 브레이커 오픈, 이번 실행의 나머지 작업 건너뜀"
            );
        }
        opened
    }

    /// 열린 서킷 수.
    pub fn open_count(&self) -> usize {
        if self.threshold == 0 {
            return 0;
        }
        self.lock()
            .values()
            .filter(|count| **count >= self.threshold)
            .count()
    }
}
