//! 수집 엔진 도메인 모델.

pub mod dataset;
pub mod instrument;
pub mod record;
pub mod work_item;

pub use dataset::{DatasetKind, Universe};
pub use instrument::{Instrument, InstrumentId, InstrumentKey, UniverseEntry};
pub use record::{IndexLevel, InvestorFlow, PriceBar, Record};
pub use work_item::{DateRange, WorkItem};
