//! 작업 단위 정의.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{DatasetKind, Instrument, InstrumentKey};

/// 양 끝을 포함하는 날짜 범위.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// 새 범위를 생성합니다. `start > end`이면 `None`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// 범위에 포함된 일 수.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// 날짜가 범위 안에 있는지 확인합니다.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// `start`부터 최대 `max_days`일까지의 첫 구간과 나머지 시작일을 반환합니다.
    pub fn split_first(&self, max_days: u32) -> (DateRange, Option<NaiveDate>) {
        let max_days = i64::from(max_days.max(1));
        // 날짜 범위를 넘어서면 나머지 전체가 한 구간
        match self.start.checked_add_signed(Duration::days(max_days - 1)) {
            Some(chunk_end) if chunk_end < self.end => (
                DateRange {
                    start: self.start,
                    end: chunk_end,
                },
                chunk_end.succ_opt(),
            ),
            _ => (*self, None),
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// 계획기가 만들고 디스패처가 소비하는 작업 단위.
///
/// 저장되지 않으며 언제든 커서 상태로부터 다시 계산할 수 있습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub instrument: Instrument,
    pub dataset: DatasetKind,
    pub range: DateRange,
}

impl WorkItem {
    /// 서킷 브레이커 등에 사용하는 종목 키.
    pub fn instrument_key(&self) -> InstrumentKey {
        InstrumentKey {
            universe: self.dataset.universe(),
            id: self.instrument.id,
        }
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} [{}]", self.dataset, self.instrument, self.range)
    }
}
