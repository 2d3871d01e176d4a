//! Data model shared by the extractor, the orchestrator and the storage layer.

pub mod metric;
pub mod record;
pub mod target;

pub use metric::{MAX_UPDATE_DELAY_MINUTES, MAX_WAIT_TIME_MINUTES, ParsedMetric};
pub use record::{HospitalMetricRecord, RecordMetadata};
pub use target::ScrapeTarget;
