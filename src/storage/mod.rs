//! Metric persistence
//!
//! The [`MetricStore`] trait is the only thing the job runner sees.
//! [`InMemoryStore`] keeps records in process; [`SqliteStore`] persists them
//! with sqlx.

pub mod errors;
pub mod memory;
pub mod sqlite;
pub mod traits;

pub use errors::{StorageError, StorageResult};
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{MetricQuery, MetricStore, QueryResult, StorageHealth};
