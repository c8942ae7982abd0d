//! 증분 시장 데이터 수집 엔진.
//!
//! 이 crate는 종목·데이터셋별 커서를 기준으로 빠진 구간만 수집하는 엔진과
//! 독립 실행 바이너리를 제공합니다:
//! - 업데이트 계획 (커서 → 작업 단위)
//! - 속도 제한, 재시도, 종목별 서킷 브레이커
//! - 멱등 배치 저장과 커밋 후 커서 전진
//! - 동시성 제한 디스패처, 연속 실행기, 데이터셋 재구축

pub mod config;
pub mod engine;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::{CollectorConfig, IngestConfig};
pub use engine::IngestEngine;
pub use error::{CollectorError, PersistError, Result};
pub use modules::{RunnerHandle, RunnerReport, RunnerState};
pub use stats::{FailureClass, ItemFailure, RunSummary, UniverseSyncReport};
