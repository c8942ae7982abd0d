//! 유니버스 동기화.
//!
//! 원격 소스의 종목 목록을 저장소의 종목 테이블에 반영합니다. 새 종목은 등록하고
//! 목록에서 빠진 종목은 비활성화해서 이후 계획에서 제외합니다.
//!
//! 목록 조회가 실패하거나 빈 목록을 받은 유니버스는 기존 상태를 유지합니다.

use ingest_core::{Universe, UniverseEntry};
use ingest_data::IngestStore;
use std::collections::HashSet;
use tracing::{info, warn};

use super::retry::RetryingFetcher;
use crate::stats::UniverseSyncReport;
use crate::Result;

/// 유니버스들을 차례로 동기화합니다.
///
/// 조회 실패는 해당 유니버스의 `error`에 기록하고 다음 유니버스로 넘어갑니다.
/// 저장소 에러는 그대로 전파합니다.
pub async fn sync_universes(
    store: &dyn IngestStore,
    fetcher: &RetryingFetcher,
    universes: &[Universe],
) -> Result<Vec<UniverseSyncReport>> {
    let mut reports = Vec::with_capacity(universes.len());
    for &universe in universes {
        reports.push(sync_universe(store, fetcher, universe).await?);
    }
    Ok(reports)
}

async fn sync_universe(
    store: &dyn IngestStore,
    fetcher: &RetryingFetcher,
    universe: Universe,
) -> Result<UniverseSyncReport> {
    let mut report = UniverseSyncReport::unchanged(universe);

    let entries = match fetcher.list_universe(universe).await {
        Ok(entries) => normalize(entries),
        Err(e) => {
            warn!(universe = %universe, error = %e, "유니버스 목록 조회 실패, 기존 목록 유지");
            report.error = Some(e.to_string());
            return Ok(report);
        }
    };
    report.fetched = entries.len();

    if entries.is_empty() {
        warn!(universe = %universe, "빈 유니버스 목록, 동기화 건너뜀");
        return Ok(report);
    }

    let stats = store.sync_universe(universe, &entries).await?;
    report.inserted = stats.inserted;
    report.updated = stats.updated;
    report.deactivated = stats.deactivated;

    info!(
        universe = %universe,
        fetched = report.fetched,
        inserted = stats.inserted,
        deactivated = stats.deactivated,
        "유니버스 동기화 완료"
    );
    Ok(report)
}

/// 빈 식별자를 버리고 같은 `web_id`는 처음 항목만 남깁니다.
fn normalize(entries: Vec<UniverseEntry>) -> Vec<UniverseEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| !e.web_id.trim().is_empty())
        .filter(|e| seen.insert(e.web_id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::{CircuitBreaker, RateLimiter, RetryPolicy};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use ingest_core::{
        DatasetKind, DateRange, FetchError, FetchResult, Instrument, Record,
    };
    use ingest_data::{FetchClient, MemoryStore};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    /// 유니버스별로 고정된 목록을 돌려주는 클라이언트.
    struct Listing(HashMap<Universe, FetchResult<Vec<UniverseEntry>>>);

    #[async_trait]
    impl FetchClient for Listing {
        async fn fetch(
            &self,
            _instrument: &Instrument,
            _dataset: DatasetKind,
            _range: DateRange,
        ) -> FetchResult<Vec<Record>> {
            Ok(Vec::new())
        }

        async fn list_universe(&self, universe: Universe) -> FetchResult<Vec<UniverseEntry>> {
            self.0
                .get(&universe)
                .cloned()
                .unwrap_or_else(|| Err(FetchError::Permanent("unknown universe".to_string())))
        }
    }

    fn fetcher(listing: Listing) -> RetryingFetcher {
        RetryingFetcher::new(
            Arc::new(listing),
            Arc::new(RateLimiter::new(1000.0, 1000)),
            Arc::new(CircuitBreaker::new(3)),
            RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(10),
                jitter: false,
            },
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_normalize_drops_blank_and_duplicate_ids() {
        let entries = vec![
            UniverseEntry::new("FOLD", "IRO1FOLD0001"),
            UniverseEntry::new("BLANK", "  "),
            UniverseEntry::new("FOLD-DUP", "IRO1FOLD0001"),
            UniverseEntry::new("KHAZ", "IRO1KHAZ0001"),
        ];
        let tickers: Vec<_> = normalize(entries).into_iter().map(|e| e.ticker).collect();
        assert_eq!(tickers, vec!["FOLD", "KHAZ"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_registers_and_deactivates() {
        let store = MemoryStore::new();
        store.add_instrument(Universe::Stocks, Instrument::new(1, "FOLD", "IRO1FOLD0001"));
        store.add_instrument(Universe::Stocks, Instrument::new(2, "DELISTED", "IRO1DLST0001"));

        let listed = NaiveDate::from_ymd_opt(2015, 6, 1).unwrap();
        let listing = Listing(HashMap::from([(
            Universe::Stocks,
            Ok(vec![
                UniverseEntry::new("FOLD", "IRO1FOLD0001"),
                UniverseEntry::new("KHAZ", "IRO1KHAZ0001").with_listing_date(listed),
            ]),
        )]));

        let reports = sync_universes(&store, &fetcher(listing), &[Universe::Stocks])
            .await
            .unwrap();
        assert_eq!(
            reports,
            vec![UniverseSyncReport {
                universe: Universe::Stocks,
                fetched: 2,
                inserted: 1,
                updated: 1,
                deactivated: 1,
                error: None,
            }]
        );

        let stocks = store.instruments(Universe::Stocks);
        assert!(!stocks.iter().find(|i| i.id == 2).unwrap().is_active);
        let khaz = stocks.iter().find(|i| i.ticker == "KHAZ").unwrap();
        assert_eq!(khaz.listing_date, Some(listed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_or_empty_listing_keeps_instruments() {
        let store = MemoryStore::new();
        store.add_instrument(Universe::Stocks, Instrument::new(1, "FOLD", "IRO1FOLD0001"));
        store.add_instrument(Universe::Indices, Instrument::new(1, "TEDPIX", "32097828799138957"));

        let listing = Listing(HashMap::from([(Universe::Indices, Ok(Vec::new()))]));
        let reports = sync_universes(
            &store,
            &fetcher(listing),
            &[Universe::Stocks, Universe::Indices],
        )
        .await
        .unwrap();

        assert_eq!(reports.len(), 2);
        assert!(reports[0].error.is_some());
        assert_eq!(reports[1], UniverseSyncReport::unchanged(Universe::Indices));
        assert!(store.instruments(Universe::Stocks)[0].is_active);
        assert!(store.instruments(Universe::Indices)[0].is_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_store_is_propagated() {
        let store = MemoryStore::new();
        store.set_available(false);
        let listing = Listing(HashMap::from([(
            Universe::Sectors,
            Ok(vec![UniverseEntry::new("CHEM", "44")]),
        )]));

        let err = sync_universes(&store, &fetcher(listing), &[Universe::Sectors])
            .await
            .unwrap_err();
        assert!(matches!(err, crate::CollectorError::FatalStoreUnavailable(_)));
    }
}
