//! 원격 요청 속도 제한 (토큰 버킷).
//!
//! 모든 워커가 하나의 버킷을 공유합니다. 토큰은 예약 방식으로 차감되어
//! 잔량이 음수가 될 수 있으며, 음수 잔량만큼 대기한 뒤 요청을 보냅니다.
//! 따라서 동시에 몇 개의 워커가 기다리든 요청은 `1 / rate` 간격으로 나갑니다.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{trace, warn};

use crate::config::MIN_RATE_PER_SECOND;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// 공유 토큰 버킷.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
    /// 초당 충전 토큰 수
    rate: f64,
    /// 최대 토큰 수
    capacity: f64,
}

impl RateLimiter {
    /// 새 버킷을 생성합니다. 처음에는 가득 찬 상태입니다.
    pub fn new(requests_per_second: f64, burst: u32) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            rate: if requests_per_second.is_finite() {
                requests_per_second.max(MIN_RATE_PER_SECOND)
            } else {
                MIN_RATE_PER_SECOND
            },
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Bucket> {
        self.bucket.lock().unwrap_or_else(|poisoned| {
            warn!("속도 제한기 뮤텍스 poison 상태, 복구합니다");
            poisoned.into_inner()
        })
    }

    /// 토큰 하나를 예약하고 사용 가능해질 때까지의 대기 시간을 반환합니다.
    fn reserve(&self) -> Duration {
        let mut bucket = self.lock();

        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.capacity);
        bucket.last_refill = now;

        bucket.tokens -= 1.0;
        if bucket.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(-bucket.tokens / self.rate).unwrap_or(Duration::MAX)
        }
    }

    /// 요청 하나를 보낼 수 있을 때까지 대기합니다.
    pub async fn acquire(&self) {
        let wait = self.reserve();
        if !wait.is_zero() {
            trace!(wait_ms = wait.as_millis() as u64, "속도 제한 대기");
            tokio::time::sleep(wait).await;
        }
    }

    /// 초당 요청 수.
    pub fn rate(&self) -> f64 {
        self.rate
    }
}
