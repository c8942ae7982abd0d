//! # Ingest Core
//!
//! 시장 데이터 증분 수집 엔진의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 수집 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - 종목(Instrument) 및 데이터셋 종류 정의
//! - 데이터셋별 레코드 형태 (가격, 투자자별 매매동향, 지수)
//! - 작업 단위(WorkItem)와 날짜 범위
//! - 수집 에러 분류 (일시적/영구적)
//! - 로깅 인프라

pub mod domain;
pub mod error;
pub mod logging;

pub use domain::*;
pub use error::*;
pub use logging::*;
