//! 수집 파이프라인 모듈.

pub mod circuit_breaker;
pub mod dispatcher;
pub mod persister;
pub mod planner;
pub mod rate_limiter;
pub mod rebuild;
pub mod retry;
pub mod runner;
pub mod universe_sync;

pub use circuit_breaker::CircuitBreaker;
pub use dispatcher::Dispatcher;
pub use persister::BatchPersister;
pub use planner::{plan, ChunkPlan, PlanRequest};
pub use rate_limiter::RateLimiter;
pub use rebuild::reset_dataset;
pub use retry::{RetryError, RetryPolicy, RetryingFetcher};
pub use runner::{spawn_runner, RunnerHandle, RunnerReport, RunnerState};
pub use universe_sync::sync_universes;
