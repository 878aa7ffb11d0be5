//! userflow - live aggregation of user records scattered across an object store
//!
//! Users are described by small independent objects sharing a base name: a
//! CSV object carries the demographics, a PNG object carries the picture.
//! This crate builds one canonical record per user from a full bucket
//! listing, keeps it current from the bucket's change feed without
//! re-scanning, and serves filtered views and summary statistics while
//! updates keep flowing.
//!
//! # Architecture
//!
//! ```text
//! bucket listing → build_users → Arc<RwLock<Users>> (published aggregate)
//!                                      ↑            ↘
//! change feed → SyncEngine (staging buffer) → flush → snapshot export
//!                                      ↓
//! QueryHandle → UserFilter / average_age → filtered view, mean age
//! ```

pub mod builder;
pub mod config;
pub mod filter;
pub mod memory_store;
pub mod model;
pub mod parser;
pub mod snapshot;
pub mod store;
pub mod sync;

pub use builder::build_users;
pub use config::{Config, ConfigError};
pub use filter::{average_age, AverageAge, FilterError, UserFilter};
pub use memory_store::MemoryStore;
pub use model::{merge, ObjectName, UserRecord, Users};
pub use snapshot::{export_snapshot, read_snapshot, write_snapshot, SnapshotError, SNAPSHOT_HEADER};
pub use store::{EventKind, ObjectEvent, ObjectStore, StoreError};
pub use sync::{QueryHandle, SyncEngine, REFRESH_CHANNEL_CAPACITY};
