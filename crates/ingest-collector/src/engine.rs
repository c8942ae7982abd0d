//! 수집 엔진 진입점.
//!
//! `IngestEngine`은 저장소, 조회 클라이언트, 설정을 주입받아 다음 세 가지 호출을 제공합니다:
//!
//! - `run_once`: 계획 → 디스패치 → 저장을 한 번 실행
//! - `run_continuous`: `run_once`를 주기적으로 반복하는 취소 가능한 핸들
//! - `rebuild`: 확인 후 데이터셋을 비우고 처음부터 다시 수집
//! - `sync_universe`: 원격 종목 목록을 종목 테이블에 반영
//!
//! 결과는 구조화된 `RunSummary`로 반환되며 출력 형식은 호출자가 정합니다.

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use ingest_core::{DatasetKind, InstrumentId, Universe, WorkItem};
use ingest_data::{FetchClient, IngestStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

use crate::config::IngestConfig;
use crate::error::CollectorError;
use crate::modules::{
    plan, reset_dataset, spawn_runner, sync_universes, BatchPersister, CircuitBreaker, Dispatcher,
    PlanRequest, RateLimiter, RetryPolicy, RetryingFetcher, RunnerHandle,
};
use crate::stats::{RunSummary, UniverseSyncReport};
use crate::Result;

struct EngineInner {
    store: Arc<dyn IngestStore>,
    client: Arc<dyn FetchClient>,
    config: IngestConfig,
    timezone: Tz,
    /// 실행이 바뀌어도 유지되는 공유 토큰 버킷
    limiter: Arc<RateLimiter>,
}

/// 증분 수집 엔진.
#[derive(Clone)]
pub struct IngestEngine {
    inner: Arc<EngineInner>,
}

impl IngestEngine {
    /// 엔진을 생성합니다. 설정이 유효하지 않으면 실패합니다.
    pub fn new(
        store: Arc<dyn IngestStore>,
        client: Arc<dyn FetchClient>,
        config: IngestConfig,
    ) -> Result<Self> {
        config.validate()?;
        let timezone = config.timezone()?;
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit_per_second,
            config.rate_limit_burst,
        ));

        Ok(Self {
            inner: Arc::new(EngineInner {
                store,
                client,
                config,
                timezone,
                limiter,
            }),
        })
    }

    /// 엔진 설정.
    pub fn config(&self) -> &IngestConfig {
        &self.inner.config
    }

    /// 시장 시간대 기준 오늘 날짜.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.inner.timezone).date_naive()
    }

    /// 수집을 한 번 실행합니다.
    ///
    /// `datasets`가 비어 있으면 설정의 데이터셋을 사용하고, `target_date`가 없으면
    /// 오늘까지 수집합니다. 오늘 이후의 목표일은 오늘로 제한됩니다.
    /// `refresh_universe`가 켜져 있으면 계획 전에 데이터셋들의 유니버스를 동기화합니다.
    ///
    /// # Errors
    ///
    /// 저장소 전체를 사용할 수 없을 때만 `FatalStoreUnavailable`을 반환합니다.
    /// 작업 단위 실패는 `RunSummary`에 기록됩니다.
    #[instrument(skip(self))]
    pub async fn run_once(
        &self,
        datasets: &[DatasetKind],
        target_date: Option<NaiveDate>,
    ) -> Result<RunSummary> {
        let start = Instant::now();
        let inner = &self.inner;

        inner
            .store
            .health_check()
            .await
            .map_err(|e| CollectorError::FatalStoreUnavailable(e.to_string()))?;

        let datasets = if datasets.is_empty() {
            inner.config.datasets.as_slice()
        } else {
            datasets
        };
        let today = self.today();
        let target = match target_date {
            Some(date) if date > today => {
                warn!(target = %date, today = %today, "목표일이 오늘 이후여서 오늘로 제한");
                today
            }
            Some(date) => date,
            None => today,
        };

        let universes = if inner.config.refresh_universe {
            let mut universes: Vec<Universe> = datasets.iter().map(|d| d.universe()).collect();
            universes.sort();
            universes.dedup();
            sync_universes(inner.store.as_ref(), &self.fetcher(), &universes).await?
        } else {
            Vec::new()
        };

        let items = self.plan_items(datasets, target).await?;
        info!(
            datasets = ?datasets,
            target = %target,
            items = items.len(),
            "수집 계획 완료"
        );

        let dispatcher = self.dispatcher(today);
        let mut summary = dispatcher.run(items).await;
        summary.universes = universes;
        summary.elapsed = start.elapsed();

        if summary.is_total_store_failure() {
            return Err(CollectorError::FatalStoreUnavailable(format!(
                "all {} failed work items hit an unavailable store",
                summary.items_failed
            )));
        }
        Ok(summary)
    }

    /// `run_once`를 `interval` 주기로 반복하는 실행기를 시작합니다.
    pub fn run_continuous(&self, datasets: Vec<DatasetKind>, interval: Duration) -> RunnerHandle {
        info!(
            datasets = ?datasets,
            interval_secs = interval.as_secs(),
            "연속 수집 시작"
        );
        let engine = self.clone();
        spawn_runner(interval, move || {
            let engine = engine.clone();
            let datasets = datasets.clone();
            async move { engine.run_once(&datasets, None).await }
        })
    }

    /// 데이터셋을 비운 뒤 빈 커서 상태에서 전체를 다시 수집합니다.
    ///
    /// `confirmed`가 `false`이면 아무것도 하지 않고 `ConfirmationRequired`를 반환합니다.
    #[instrument(skip(self))]
    pub async fn rebuild(&self, dataset: DatasetKind, confirmed: bool) -> Result<RunSummary> {
        reset_dataset(self.inner.store.as_ref(), dataset, confirmed).await?;
        self.run_once(&[dataset], None).await
    }

    /// 원격 종목 목록을 저장소에 반영합니다. `universes`가 비어 있으면 전체 유니버스.
    ///
    /// # Errors
    ///
    /// 저장소 에러만 반환합니다. 목록 조회 실패는 유니버스별 보고서에 기록됩니다.
    #[instrument(skip(self))]
    pub async fn sync_universe(&self, universes: &[Universe]) -> Result<Vec<UniverseSyncReport>> {
        let inner = &self.inner;
        inner
            .store
            .health_check()
            .await
            .map_err(|e| CollectorError::FatalStoreUnavailable(e.to_string()))?;

        let all = Universe::ALL;
        let universes = if universes.is_empty() {
            &all[..]
        } else {
            universes
        };
        sync_universes(inner.store.as_ref(), &self.fetcher(), universes).await
    }

    /// 데이터셋의 커서 목록.
    pub async fn list_cursors(
        &self,
        dataset: DatasetKind,
    ) -> Result<HashMap<InstrumentId, NaiveDate>> {
        Ok(self.inner.store.list_cursors(dataset).await?)
    }

    async fn plan_items(&self, datasets: &[DatasetKind], target: NaiveDate) -> Result<Vec<WorkItem>> {
        let inner = &self.inner;
        let mut items = Vec::new();

        for &dataset in datasets {
            let instruments = inner.store.list_instruments(dataset).await?;
            let cursors = inner.store.list_cursors(dataset).await?;

            let before = items.len();
            items.extend(plan(PlanRequest {
                instruments: &instruments,
                cursors: &cursors,
                dataset,
                target,
                max_chunk_days: inner.config.max_chunk_days,
                default_listing_date: inner.config.default_listing_date,
            }));
            info!(
                dataset = %dataset,
                instruments = instruments.len(),
                items = items.len() - before,
                "데이터셋 계획 완료"
            );
        }
        Ok(items)
    }

    /// 실행마다 새 서킷 브레이커를 가진 조회 래퍼.
    fn fetcher(&self) -> RetryingFetcher {
        let inner = &self.inner;
        let config = &inner.config;

        let breaker = Arc::new(CircuitBreaker::new(config.circuit_breaker_threshold));
        RetryingFetcher::new(
            Arc::clone(&inner.client),
            Arc::clone(&inner.limiter),
            breaker,
            RetryPolicy::from_config(config),
            config.request_timeout(),
        )
    }

    fn dispatcher(&self, today: NaiveDate) -> Dispatcher {
        let inner = &self.inner;
        let config = &inner.config;

        let fetcher = Arc::new(self.fetcher());
        let persister = Arc::new(BatchPersister::new(
            Arc::clone(&inner.store),
            config.persist_batch_size,
        ));

        Dispatcher::new(fetcher, persister, config.concurrency, today)
    }
}
