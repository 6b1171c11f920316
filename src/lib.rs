//! Keep a search cluster's indexes in sync with a backing datastore.
//!
//! Index definitions declare, per record type, which fields make up a
//! document, how they map, and which named connection they write through.
//! A process-wide [`SyncRegistry`] fans save/delete notifications out to
//! every definition registered for a record type, and the `ops` module
//! provides full and time-windowed reindexing on top of the same machinery.
//!
//! ```no_run
//! use searchsync::{Field, IndexDefinition, SyncRegistry, ConnectionConfig};
//! use std::collections::HashMap;
//!
//! # fn main() -> searchsync::Result<()> {
//! let mut settings = HashMap::new();
//! settings.insert("default".to_string(), ConnectionConfig {
//!     servers: vec!["http://localhost:9200".into()],
//!     index_name: "main".into(),
//!     timeout_secs: None,
//! });
//! let registry = SyncRegistry::new(settings);
//!
//! let cars = IndexDefinition::builder("car")
//!     .field("name", Field::string())
//!     .field("make", Field::string().attr("brand.name"))
//!     .build()?;
//! registry.register(cars)?;
//! # Ok(())
//! # }
//! ```
//!
//! Batching many writes goes through a suspension scope:
//!
//! ```no_run
//! # fn demo(registry: &searchsync::SyncRegistry, records: Vec<Box<dyn searchsync::Record>>) -> searchsync::Result<()> {
//! let guard = searchsync::suspended_updates();
//! for record in &records {
//!     registry.notify_saved(record.as_ref())?;
//! }
//! guard.flush()?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod connections;
pub mod error;
pub mod fields;
pub mod index;
pub mod ops;
pub mod record;
pub mod types;

pub use client::{HttpClient, SearchClient};
pub use connections::{Connection, ConnectionConfig, Connections};
pub use error::{Result, SyncError};
pub use fields::{Field, FieldType};
pub use index::analysis::AnalysisSettings;
pub use index::{
    suspended_updates, DynamicPolicy, IndexBuilder, IndexDefinition, SuspendGuard, SyncRegistry,
};
pub use ops::{clear_index, parse_time_token, rebuild_index, update_index, ReindexReport};
pub use record::{ColumnType, Node, Record, RecordObject, RecordSchema, RecordSource};
pub use types::{BulkItem, BulkResponse, OpType, WriteOperation};
