//! Database Set
//!
//! Routes each operation to one of [`DATABASES`] independently locked
//! keyspaces, rejecting out-of-range indices before anything is touched.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use super::keyspace::Keyspace;
use super::value::{StreamEntry, Value, ValueKind};
use crate::error::{parse_arg, Result, StorageError};

/// Number of databases, numbered `0..DATABASES`
pub const DATABASES: usize = 10;

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// How often each keyspace's reaper sweeps expired keys
    pub reap_interval: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            reap_interval: Duration::from_secs(1),
        }
    }
}

impl StorageConfig {
    /// Set reaper interval
    pub fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }
}

/// The whole store: a fixed set of keyspaces shared between connections.
///
/// Cloning is cheap and every clone sees the same data. Reapers stop
/// when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct Storage {
    keyspaces: Arc<[Keyspace]>,
}

impl Storage {
    /// Create the store with default configuration
    pub fn new() -> io::Result<Self> {
        Self::with_config(StorageConfig::default())
    }

    /// Create all keyspaces and start their reapers
    pub fn with_config(config: StorageConfig) -> io::Result<Self> {
        let keyspaces = (0..DATABASES)
            .map(|index| Keyspace::new(index, config.reap_interval))
            .collect::<io::Result<Vec<_>>>()?;

        Ok(Self {
            keyspaces: keyspaces.into(),
        })
    }

    /// Keyspace for `db`, or `InvalidDatabase` when out of range
    pub fn keyspace(&self, db: usize) -> Result<&Keyspace> {
        self.keyspaces
            .get(db)
            .ok_or(StorageError::InvalidDatabase(db as i64))
    }

    /// Validate a signed index coming off the wire
    pub fn check_db(db: i64) -> Result<usize> {
        usize::try_from(db)
            .ok()
            .filter(|db| *db < DATABASES)
            .ok_or(StorageError::InvalidDatabase(db))
    }

    pub fn set(&self, key: &str, value: &str, ttl: Option<Duration>, db: usize) -> Result<()> {
        self.keyspace(db)?.set(key, value, ttl);
        Ok(())
    }

    pub fn get(&self, key: &str, db: usize) -> Result<Option<Value>> {
        Ok(self.keyspace(db)?.get(key))
    }

    /// String value under `key`; WrongType for any other kind
    pub fn get_string(&self, key: &str, db: usize) -> Result<Option<String>> {
        self.keyspace(db)?.get_string(key)
    }

    pub fn del(&self, key: &str, db: usize) -> Result<usize> {
        Ok(self.keyspace(db)?.del(key))
    }

    pub fn exists(&self, key: &str, db: usize) -> Result<bool> {
        Ok(self.keyspace(db)?.exists(key))
    }

    pub fn type_of(&self, key: &str, db: usize) -> Result<ValueKind> {
        self.keyspace(db)?.type_of(key)
    }

    /// Empty every database. Each keyspace is flushed under its own lock,
    /// so the others stay available meanwhile.
    pub fn flush(&self) {
        for keyspace in self.keyspaces.iter() {
            keyspace.flush();
        }
    }

    /// Empty a single database
    pub fn flush_db(&self, db: usize) -> Result<()> {
        self.keyspace(db)?.flush();
        Ok(())
    }

    pub fn dbsize(&self, db: usize) -> Result<usize> {
        Ok(self.keyspace(db)?.len())
    }

    pub fn rpush(&self, key: &str, items: Vec<String>, db: usize) -> Result<usize> {
        Ok(self.keyspace(db)?.rpush(key, items))
    }

    pub fn lpush(&self, key: &str, items: Vec<String>, db: usize) -> Result<usize> {
        Ok(self.keyspace(db)?.lpush(key, items))
    }

    pub fn rlen(&self, key: &str, db: usize) -> Result<usize> {
        Ok(self.keyspace(db)?.rlen(key))
    }

    /// Range with caller-supplied bounds, validated before the lookup
    pub fn lrange(&self, key: &str, from: &str, to: &str, db: usize) -> Result<String> {
        let keyspace = self.keyspace(db)?;
        let (from, to) = parse_range(from, to)?;
        Ok(keyspace.lrange(key, from, to))
    }

    pub fn rrange(&self, key: &str, from: &str, to: &str, db: usize) -> Result<String> {
        let keyspace = self.keyspace(db)?;
        let (from, to) = parse_range(from, to)?;
        Ok(keyspace.rrange(key, from, to))
    }

    pub fn lpop(&self, key: &str, count: i64, db: usize) -> Result<Vec<String>> {
        Ok(self.keyspace(db)?.lpop(key, count))
    }

    pub fn rpop(&self, key: &str, count: i64, db: usize) -> Result<Vec<String>> {
        Ok(self.keyspace(db)?.rpop(key, count))
    }

    pub async fn blpop(&self, key: &str, count: i64, timeout_secs: u64, db: usize) -> Result<Vec<String>> {
        Ok(self.keyspace(db)?.blpop(key, count, timeout_secs).await)
    }

    pub async fn brpop(&self, key: &str, count: i64, timeout_secs: u64, db: usize) -> Result<Vec<String>> {
        Ok(self.keyspace(db)?.brpop(key, count, timeout_secs).await)
    }

    pub fn xadd(&self, key: &str, id: &str, fields: Vec<(String, String)>, db: usize) -> Result<String> {
        self.keyspace(db)?.xadd(key, id, fields)
    }

    pub fn xrange(&self, key: &str, start: &str, end: &str, db: usize) -> Result<Vec<StreamEntry>> {
        self.keyspace(db)?.xrange(key, start, end)
    }
}

fn parse_range(from: &str, to: &str) -> Result<(i64, i64)> {
    Ok((parse_arg("range start", from)?, parse_arg("range end", to)?))
}
