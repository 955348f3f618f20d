//! Storage Engine
//!
//! Ten in-memory keyspaces holding strings, lists and streams, with
//! passive and background expiry.

mod blocking;
mod databases;
mod keyspace;
mod list;
mod reaper;
mod stream;
mod value;

pub use blocking::POLL_INTERVAL;
pub use databases::{Storage, StorageConfig, DATABASES};
pub use keyspace::Keyspace;
pub use list::End;
pub use value::{StreamEntry, StreamId, Value, ValueKind};
