//! memstore - In-Memory Multi-Database Key-Value Store
//!
//! Ten independent databases holding strings, lists and append-only
//! streams, with per-key expiry, blocking list pops and a RESP server.

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;
pub mod storage;

pub use client::{Client, ClientError};
pub use error::{Result, StorageError};
pub use protocol::{Command, CommandError, Frame, RespCodec};
pub use server::{Config, Server};
pub use storage::{Storage, StorageConfig, DATABASES};
