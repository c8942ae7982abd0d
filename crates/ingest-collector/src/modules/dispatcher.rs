//! 작업 단위 디스패처.
//!
//! 작업 단위를 `(종목, 데이터셋)` 레인으로 묶고, 레인 단위로 최대 `concurrency`개를
//! 동시에 실행합니다. 레인 안에서는 날짜 순서대로 하나씩 처리하므로
//! N+1번째 구간은 N번째 구간의 커서 갱신이 끝난 뒤에만 저장됩니다.
//!
//! 작업 단위의 실패는 `RunSummary`에 기록될 뿐 다른 레인에 영향을 주지 않습니다.
//! 레인에서 실패가 발생하면 커서가 빈 구간을 건너뛰지 않도록 나머지 구간은
//! 건너뜁니다. 조회 실패로 건너뛴 구간은 종목의 서킷 브레이커에 실패로 집계되어
//! 같은 종목의 다른 데이터셋 레인도 멈출 수 있습니다.

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use ingest_core::{DatasetKind, InstrumentId, WorkItem};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, Instrument};

use super::persister::BatchPersister;
use super::retry::{RetryError, RetryingFetcher};
use crate::stats::{FailureClass, ItemFailure, RunSummary};

/// 디스패처.
pub struct Dispatcher {
    fetcher: Arc<RetryingFetcher>,
    persister: Arc<BatchPersister>,
    concurrency: usize,
    today: NaiveDate,
}

impl Dispatcher {
    pub fn new(
        fetcher: Arc<RetryingFetcher>,
        persister: Arc<BatchPersister>,
        concurrency: usize,
        today: NaiveDate,
    ) -> Self {
        Self {
            fetcher,
            persister,
            concurrency: concurrency.max(1),
            today,
        }
    }

    /// 모든 작업 단위를 실행하고 결과를 집계합니다.
    pub async fn run<I>(&self, items: I) -> RunSummary
    where
        I: IntoIterator<Item = WorkItem>,
    {
        let start = Instant::now();
        let lanes = group_lanes(items);
        let planned: usize = lanes.iter().map(Vec::len).sum();

        info!(
            items = planned,
            lanes = lanes.len(),
            concurrency = self.concurrency,
            "디스패치 시작"
        );

        let results: Vec<RunSummary> = stream::iter(lanes)
            .map(|lane| self.run_lane(lane))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut summary = RunSummary::new();
        for result in results {
            summary.merge(result);
        }
        summary.elapsed = start.elapsed();
        summary
    }

    async fn run_lane(&self, lane: Vec<WorkItem>) -> RunSummary {
        let mut summary = RunSummary {
            items_planned: lane.len(),
            ..Default::default()
        };
        let Some(first) = lane.first() else {
            return summary;
        };
        let span = ingest_core::ingest_span!("lane", first.dataset, first.instrument);

        async {
            for (idx, item) in lane.iter().enumerate() {
                let remaining = lane.len() - idx - 1;

                let failure = match self.fetcher.fetch(item).await {
                    Ok(records) => match self.persister.persist(item, records, self.today).await {
                        Ok(written) => {
                            summary.items_succeeded += 1;
                            summary.records_written += written;
                            continue;
                        }
                        Err(e) => {
                            let class = if e.is_store_unavailable() {
                                FailureClass::StoreUnavailable
                            } else {
                                FailureClass::Persist
                            };
                            ItemFailure::new(item, class, e.to_string())
                        }
                    },
                    Err(RetryError::CircuitOpen(_)) => {
                        debug!(item = %item, skipped = remaining + 1, "서킷 오픈, 레인 건너뜀");
                        summary.items_skipped += remaining + 1;
                        break;
                    }
                    Err(e @ RetryError::Exhausted { .. }) => {
                        self.fetcher.record_abandoned(item, remaining);
                        ItemFailure::new(item, FailureClass::Transient, e.to_string())
                    }
                    Err(e @ RetryError::Permanent(_)) => {
                        self.fetcher.record_abandoned(item, remaining);
                        ItemFailure::new(item, FailureClass::Permanent, e.to_string())
                    }
                };

                summary.record_failure(failure);
                summary.items_skipped += remaining;
                break;
            }
        }
        .instrument(span)
        .await;

        summary
    }
}

/// 작업 단위를 `(종목, 데이터셋)` 레인으로 묶습니다 (처음 등장한 순서 유지).
fn group_lanes<I>(items: I) -> Vec<Vec<WorkItem>>
where
    I: IntoIterator<Item = WorkItem>,
{
    let mut index: HashMap<(InstrumentId, DatasetKind), usize> = HashMap::new();
    let mut lanes: Vec<Vec<WorkItem>> = Vec::new();

    for item in items {
        let key = (item.instrument.id, item.dataset);
        match index.get(&key) {
            Some(&lane) => lanes[lane].push(item),
            None => {
                index.insert(key, lanes.len());
                lanes.push(vec![item]);
            }
        }
    }

    for lane in &mut lanes {
        lane.sort_by_key(|item| item.range.start);
    }
    lanes
}
