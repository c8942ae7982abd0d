//! 업데이트 계획 수립.
//!
//! 커서 상태와 목표일로부터 `WorkItem` 목록을 계산합니다. 순수 함수이며
//! 같은 입력이면 항상 같은 계획을 반환합니다.
//!
//! # 규칙
//!
//! - 시작일은 `커서 + 1일`, 커서가 없으면 상장일(없으면 기본 상장일)
//! - 시작일이 목표일 이후면 해당 종목은 계획하지 않음
//! - 구간은 최대 `max_chunk_days`일로 나뉘며 서로 겹치거나 빈틈이 없음
//! - 비활성 종목은 계획하지 않음

use chrono::NaiveDate;
use ingest_core::{DatasetKind, DateRange, Instrument, InstrumentId, WorkItem};
use std::collections::HashMap;

/// 계획 입력.
#[derive(Debug, Clone, Copy)]
pub struct PlanRequest<'a> {
    pub instruments: &'a [Instrument],
    pub cursors: &'a HashMap<InstrumentId, NaiveDate>,
    pub dataset: DatasetKind,
    pub target: NaiveDate,
    pub max_chunk_days: u32,
    pub default_listing_date: NaiveDate,
}

/// 계획을 지연 계산하는 iterator.
///
/// 종목 순서대로, 종목 안에서는 날짜 순서대로 작업 단위를 생성합니다.
#[derive(Debug)]
pub struct ChunkPlan<'a> {
    request: PlanRequest<'a>,
    next_instrument: usize,
    current: Option<(&'a Instrument, DateRange)>,
}

impl<'a> ChunkPlan<'a> {
    fn advance_instrument(&mut self) -> bool {
        while let Some(instrument) = self.request.instruments.get(self.next_instrument) {
            self.next_instrument += 1;
            if let Some(range) = pending_range(&self.request, instrument) {
                self.current = Some((instrument, range));
                return true;
            }
        }
        false
    }
}

impl<'a> Iterator for ChunkPlan<'a> {
    type Item = WorkItem;

    fn next(&mut self) -> Option<WorkItem> {
        if self.current.is_none() && !self.advance_instrument() {
            return None;
        }
        let (instrument, remaining) = self.current.take()?;

        let (chunk, rest_start) = remaining.split_first(self.request.max_chunk_days);
        if let Some(start) = rest_start {
            if let Some(rest) = DateRange::new(start, remaining.end) {
                self.current = Some((instrument, rest));
            }
        }

        Some(WorkItem {
            instrument: instrument.clone(),
            dataset: self.request.dataset,
            range: chunk,
        })
    }
}

/// 종목의 미수집 구간을 계산합니다.
fn pending_range(request: &PlanRequest<'_>, instrument: &Instrument) -> Option<DateRange> {
    if !instrument.is_active {
        return None;
    }

    let start = match request.cursors.get(&instrument.id) {
        Some(last_synced) => last_synced.succ_opt()?,
        None => instrument
            .listing_date
            .unwrap_or(request.default_listing_date),
    };

    DateRange::new(start, request.target)
}

/// 계획 iterator를 생성합니다.
pub fn plan(request: PlanRequest<'_>) -> ChunkPlan<'_> {
    ChunkPlan {
        request,
        next_instrument: 0,
        current: None,
    }
}
