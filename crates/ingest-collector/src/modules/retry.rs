//! 속도 제한 + 재시도 + 서킷 브레이커를 적용한 조회 래퍼.
//!
//! 모든 시도(재시도 포함)는 요청 전에 공유 토큰 버킷을 통과합니다.
//! 일시적 에러만 재시도하며, 지연은 `base × 2^n`에 상한과 ±25% 지터를 적용합니다.
//! 서킷은 매 시도 전에 확인합니다. 유니버스 목록 조회에는 서킷을 적용하지 않습니다.

use ingest_core::{FetchError, FetchResult, InstrumentKey, Record, Universe, UniverseEntry, WorkItem};
use ingest_data::FetchClient;
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::circuit_breaker::CircuitBreaker;
use super::rate_limiter::RateLimiter;
use crate::config::IngestConfig;

/// 재시도 래퍼 에러.
#[derive(Debug, Clone, Error)]
pub enum RetryError {
    /// 서킷이 열려 요청하지 않음
    #[error("Circuit open for {0}")]
    CircuitOpen(InstrumentKey),

    /// 일시적 에러로 모든 시도 실패
    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: FetchError },

    /// 재시도 불가 에러
    #[error("{0}")]
    Permanent(FetchError),
}

/// 재시도 정책.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 최대 시도 횟수 (첫 시도 포함)
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            max_attempts: config.retry_max_attempts.max(1),
            base_delay: config.backoff_base_delay(),
            max_delay: config.backoff_max_delay(),
            jitter: config.backoff_jitter,
        }
    }

    /// `attempt`번째(0부터) 시도가 실패한 뒤의 대기 시간.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2f64.powi(attempt.min(30) as i32);
        let delay = (self.base_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        let delay = if self.jitter {
            delay * rand::thread_rng().gen_range(0.75..=1.25)
        } else {
            delay
        };
        Duration::from_secs_f64(delay.max(0.0))
    }
}

/// 조회 클라이언트 래퍼.
pub struct RetryingFetcher {
    client: Arc<dyn FetchClient>,
    limiter: Arc<RateLimiter>,
    breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
    timeout: Duration,
}

impl RetryingFetcher {
    pub fn new(
        client: Arc<dyn FetchClient>,
        limiter: Arc<RateLimiter>,
        breaker: Arc<CircuitBreaker>,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            limiter,
            breaker,
            policy,
            timeout,
        }
    }

    /// 작업 단위의 레코드를 조회합니다.
    pub async fn fetch(&self, item: &WorkItem) -> Result<Vec<Record>, RetryError> {
        self.call_with_retry(item, Some(item.instrument_key()), || {
            self.client.fetch(&item.instrument, item.dataset, item.range)
        })
        .await
    }

    /// 유니버스 목록을 조회합니다. 종목 단위 서킷은 적용하지 않습니다.
    pub async fn list_universe(&self, universe: Universe) -> Result<Vec<UniverseEntry>, RetryError> {
        self.call_with_retry(&universe, None, || self.client.list_universe(universe))
            .await
    }

    async fn call_with_retry<T, F, Fut>(
        &self,
        request: &(dyn fmt::Display + Sync),
        key: Option<InstrumentKey>,
        call: F,
    ) -> Result<T, RetryError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = FetchResult<T>>,
    {
        let mut attempt = 0;
        loop {
            // 재시도 대기 중 다른 레인이 서킷을 열 수 있음
            if let Some(key) = key.filter(|k| self.breaker.is_open(k)) {
                return Err(RetryError::CircuitOpen(key));
            }
            self.limiter.acquire().await;

            let result = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::timeout(self.timeout)),
            };

            let err = match result {
                Ok(value) => {
                    if let Some(key) = &key {
                        self.breaker.record_success(key);
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            attempt += 1;
            if !err.is_retryable() {
                warn!(request = %request, error = %err, "영구 조회 에러");
                if let Some(key) = &key {
                    self.breaker.record_failure(key);
                }
                return Err(RetryError::Permanent(err));
            }
            if attempt >= self.policy.max_attempts {
                warn!(request = %request, attempts = attempt, error = %err, "재시도 소진");
                if let Some(key) = &key {
                    self.breaker.record_failure(key);
                }
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.policy.delay_for(attempt - 1);
            debug!(
                request = %request,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "일시적 조회 에러, 재시도"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl RetryingFetcher {
    /// 앞 구간이 실패해 이번 실행에서 처리할 수 없게 된 같은 레인의 작업 단위
    /// `count`건을 종목 실패로 기록합니다.
    pub fn record_abandoned(&self, item: &WorkItem, count: usize) {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        self.breaker.record_failures(&item.instrument_key(), count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use ingest_core::{DatasetKind, DateRange, FetchResult, Instrument};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// 미리 정한 결과를 순서대로 돌려주는 클라이언트.
    struct Scripted {
        responses: Mutex<VecDeque<FetchResult<Vec<Record>>>>,
        calls: Mutex<u32>,
        hang: bool,
    }

    impl Scripted {
        fn new(responses: Vec<FetchResult<Vec<Record>>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(0),
                hang: false,
            })
        }

        fn hanging() -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(VecDeque::new()),
                calls: Mutex::new(0),
                hang: true,
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl FetchClient for Scripted {
        async fn fetch(
            &self,
            _instrument: &Instrument,
            _dataset: DatasetKind,
            _range: DateRange,
        ) -> FetchResult<Vec<Record>> {
            *self.calls.lock().unwrap() += 1;
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(Vec::new()))
        }
    }

    fn item() -> WorkItem {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        WorkItem {
            instrument: Instrument::new(1, "FOLD", "IRO1FOLD0001"),
            dataset: DatasetKind::Prices,
            range: DateRange::new(d, d).unwrap(),
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: false,
        }
    }

    fn fetcher(client: Arc<Scripted>, breaker: Arc<CircuitBreaker>, attempts: u32) -> RetryingFetcher {
        RetryingFetcher::new(
            client,
            Arc::new(RateLimiter::new(1000.0, 1000)),
            breaker,
            policy(attempts),
            Duration::from_secs(30),
        )
    }

    fn transient() -> FetchResult<Vec<Record>> {
        Err(FetchError::Transient("503".to_string()))
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy {
            max_delay: Duration::from_secs(5),
            ..policy(5)
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_within_bounds() {
        let policy = RetryPolicy {
            jitter: true,
            ..policy(3)
        };
        for _ in 0..100 {
            let delay = policy.delay_for(0).as_secs_f64();
            assert!((0.75..=1.25).contains(&delay));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_errors() {
        let client = Scripted::new(vec![transient(), transient(), Ok(Vec::new())]);
        let fetcher = fetcher(client.clone(), Arc::new(CircuitBreaker::new(3)), 3);

        let start = Instant::now();
        assert!(fetcher.fetch(&item()).await.is_ok());
        assert_eq!(client.calls(), 3);
        // 1s + 2s 백오프
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts() {
        let client = Scripted::new(vec![transient(), transient(), transient(), transient()]);
        let fetcher = fetcher(client.clone(), Arc::new(CircuitBreaker::new(3)), 3);

        let err = fetcher.fetch(&item()).await.unwrap_err();
        assert!(matches!(err, RetryError::Exhausted { attempts: 3, .. }));
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let client = Scripted::new(vec![Err(FetchError::Permanent("404".to_string()))]);
        let fetcher = fetcher(client.clone(), Arc::new(CircuitBreaker::new(3)), 5);

        let err = fetcher.fetch(&item()).await.unwrap_err();
        assert!(matches!(err, RetryError::Permanent(_)));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_retried_as_transient() {
        let client = Scripted::hanging();
        let fetcher = RetryingFetcher::new(
            client.clone(),
            Arc::new(RateLimiter::new(1000.0, 1000)),
            Arc::new(CircuitBreaker::new(3)),
            policy(2),
            Duration::from_secs(5),
        );

        let err = fetcher.fetch(&item()).await.unwrap_err();
        match err {
            RetryError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 2);
                assert!(last.is_retryable());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_items_count_towards_circuit() {
        let breaker = Arc::new(CircuitBreaker::new(3));
        let client = Scripted::new(vec![Err(FetchError::Permanent("bad id".to_string()))]);
        let fetcher = fetcher(client.clone(), breaker.clone(), 3);

        assert!(matches!(
            fetcher.fetch(&item()).await,
            Err(RetryError::Permanent(_))
        ));
        assert!(!breaker.is_open(&item().instrument_key()));

        // 같은 레인의 뒤 구간 두 개
        fetcher.record_abandoned(&item(), 2);
        assert!(matches!(
            fetcher.fetch(&item()).await,
            Err(RetryError::CircuitOpen(_))
        ));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_opened_during_backoff_stops_retries() {
        let breaker = Arc::new(CircuitBreaker::new(1));
        let client = Scripted::new(vec![transient(), transient(), transient()]);
        let fetcher = Arc::new(fetcher(client.clone(), breaker.clone(), 3));

        let task = {
            let fetcher = Arc::clone(&fetcher);
            tokio::spawn(async move { fetcher.fetch(&item()).await })
        };
        // 첫 시도 후 1초 백오프 중에 서킷을 엶
        tokio::time::sleep(Duration::from_millis(500)).await;
        breaker.record_failure(&item().instrument_key());

        let result = task.await.unwrap();
        assert!(matches!(result, Err(RetryError::CircuitOpen(_))));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_skips_fetch() {
        let breaker = Arc::new(CircuitBreaker::new(1));
        let client = Scripted::new(vec![Err(FetchError::Permanent("bad id".to_string()))]);
        let fetcher = fetcher(client.clone(), breaker.clone(), 3);

        assert!(matches!(
            fetcher.fetch(&item()).await,
            Err(RetryError::Permanent(_))
        ));
        assert!(matches!(
            fetcher.fetch(&item()).await,
            Err(RetryError::CircuitOpen(_))
        ));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_universe_listing_failure_leaves_circuit_closed() {
        let breaker = Arc::new(CircuitBreaker::new(1));
        let client = Scripted::new(vec![Ok(Vec::new())]);
        let fetcher = fetcher(client.clone(), breaker.clone(), 3);

        // Scripted는 기본 구현이라 목록 조회를 지원하지 않음
        let err = fetcher.list_universe(Universe::Stocks).await.unwrap_err();
        assert!(matches!(err, RetryError::Permanent(_)));
        assert!(!breaker.is_open(&item().instrument_key()));

        assert!(fetcher.fetch(&item()).await.is_ok());
        assert_eq!(client.calls(), 1);
    }
}
