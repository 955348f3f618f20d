//! Keyspace
//!
//! One numbered database: a `HashMap` of keys to values behind a
//! reader/writer lock, with passive expiry on read and a background
//! reaper for keys nobody reads again.

use hashbrown::HashMap;
use parking_lot::RwLock;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::reaper::Reaper;
use super::value::{Entry, Value, ValueKind};
use crate::error::{Result, StorageError};

pub(crate) type Entries = HashMap<String, Entry>;

/// Thread-safe keyspace for a single database index
#[derive(Debug)]
pub struct Keyspace {
    pub(super) index: usize,
    pub(super) entries: Arc<RwLock<Entries>>,
    _reaper: Reaper,
}

/// Entry under `key` unless it has expired
pub(super) fn live<'a>(entries: &'a Entries, key: &str) -> Option<&'a Entry> {
    entries.get(key).filter(|entry| !entry.is_expired())
}

/// Mutable entry under `key`; an expired entry is removed on the way
pub(super) fn live_mut<'a>(entries: &'a mut Entries, key: &str) -> Option<&'a mut Entry> {
    if entries.get(key).is_some_and(Entry::is_expired) {
        entries.remove(key);
        return None;
    }
    entries.get_mut(key)
}

impl Keyspace {
    /// Create an empty keyspace and start its reaper
    pub fn new(index: usize, reap_interval: Duration) -> io::Result<Self> {
        let entries = Arc::new(RwLock::new(Entries::new()));
        let reaper = Reaper::spawn(index, entries.clone(), reap_interval)?;
        Ok(Self {
            index,
            entries,
            _reaper: reaper,
        })
    }

    /// Database index this keyspace serves
    pub fn index(&self) -> usize {
        self.index
    }

    /// Store a string, replacing whatever the key held.
    /// A `None` or zero `ttl` means the key never expires.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>, ttl: Option<Duration>) {
        let entry = Entry::new(Value::String(value.into()), ttl);
        self.entries.write().insert(key.into(), entry);
    }

    /// Get the value under `key`, deleting it if it has expired
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read_live(key, Value::clone)
    }

    /// String under `key`, checking the kind before anything is cloned
    pub fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.read_live(key, |value| match value {
            Value::String(s) => Ok(s.clone()),
            _ => Err(StorageError::WrongType),
        })
        .transpose()
    }

    /// Apply `read` to the live value under `key`. An expired entry is
    /// deleted and `read` is not called.
    fn read_live<T>(&self, key: &str, read: impl Fn(&Value) -> T) -> Option<T> {
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired() => return Some(read(&entry.value)),
                Some(_) => {}
            }
        }

        // Re-check under the write lock: a writer may have replaced the key
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                debug!(db = self.index, key, "Expired key removed on read");
                None
            }
            Some(entry) => Some(read(&entry.value)),
            None => None,
        }
    }

    /// Delete key, returns 1 if it existed and 0 otherwise
    pub fn del(&self, key: &str) -> usize {
        usize::from(self.entries.write().remove(key).is_some())
    }

    /// Check if key exists and is not expired
    pub fn exists(&self, key: &str) -> bool {
        live(&self.entries.read(), key).is_some()
    }

    /// Kind of the value under `key`. Expiry is not consulted.
    pub fn type_of(&self, key: &str) -> Result<ValueKind> {
        self.entries
            .read()
            .get(key)
            .map(|entry| entry.value.kind())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    /// Drop every key at once
    pub fn flush(&self) {
        *self.entries.write() = Entries::new();
    }

    /// Number of stored keys, including expired ones not yet reaped
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove expired keys, returns count of removed keys
    pub fn cleanup_expired(&self) -> usize {
        sweep(&self.entries)
    }
}

pub(super) fn sweep(entries: &RwLock<Entries>) -> usize {
    let mut entries = entries.write();
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired());
    before - entries.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn keyspace() -> Keyspace {
        Keyspace::new(0, Duration::from_secs(60)).unwrap()
    }

    #[test]
    fn test_basic_operations() {
        let ks = keyspace();

        ks.set("key", "value", None);
        assert_eq!(ks.get("key"), Some(Value::String("value".into())));
        assert!(ks.exists("key"));
        assert_eq!(ks.type_of("key"), Ok(ValueKind::String));

        assert_eq!(ks.del("key"), 1);
        assert_eq!(ks.del("key"), 0);
        assert!(!ks.exists("key"));
        assert_eq!(ks.get("key"), None);
        assert_eq!(ks.type_of("key"), Err(StorageError::NotFound("key".into())));
    }

    #[test]
    fn test_get_string() {
        let ks = keyspace();

        ks.set("s", "v", None);
        ks.rpush("l", vec!["a".into()]);

        assert_eq!(ks.get_string("s"), Ok(Some("v".into())));
        assert_eq!(ks.get_string("l"), Err(StorageError::WrongType));
        assert_eq!(ks.get_string("missing"), Ok(None));

        ks.set("t", "v", Some(Duration::from_millis(10)));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(ks.get_string("t"), Ok(None));
        assert_eq!(ks.len(), 2);
    }

    #[test]
    fn test_passive_expiry() {
        let ks = keyspace();

        ks.set("hello", "world", Some(Duration::from_millis(50)));
        assert_eq!(ks.get("hello"), Some(Value::String("world".into())));

        thread::sleep(Duration::from_millis(80));
        assert_eq!(ks.len(), 1);
        assert_eq!(ks.get("hello"), None);
        assert_eq!(ks.len(), 0);
    }

    #[test]
    fn test_set_replaces_expiry() {
        let ks = keyspace();

        ks.set("k", "short", Some(Duration::from_millis(30)));
        ks.set("k", "forever", None);
        thread::sleep(Duration::from_millis(60));
        assert_eq!(ks.get("k"), Some(Value::String("forever".into())));
    }

    #[test]
    fn test_del_counts_expired_key() {
        let ks = keyspace();

        ks.set("k", "v", Some(Duration::from_millis(10)));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(ks.del("k"), 1);
    }

    #[test]
    fn test_type_of_ignores_expiry() {
        let ks = keyspace();

        ks.set("k", "v", Some(Duration::from_millis(10)));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(ks.type_of("k"), Ok(ValueKind::String));
        assert!(!ks.exists("k"));
    }

    #[test]
    fn test_flush() {
        let ks = keyspace();
        for i in 0..10 {
            ks.set(format!("key{}", i), "v", None);
        }

        ks.flush();
        assert!(ks.is_empty());
        assert_eq!(ks.get("key3"), None);
    }

    #[test]
    fn test_cleanup() {
        let ks = keyspace();
        for i in 0..10 {
            ks.set(format!("key{}", i), "v", Some(Duration::from_millis(1)));
        }
        ks.set("kept", "v", None);

        thread::sleep(Duration::from_millis(20));
        assert_eq!(ks.cleanup_expired(), 10);
        assert_eq!(ks.cleanup_expired(), 0);
        assert_eq!(ks.len(), 1);
    }

    #[test]
    fn test_concurrent_access() {
        let ks = Arc::new(keyspace());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ks = ks.clone();
                thread::spawn(move || {
                    for j in 0..100 {
                        let key = format!("key-{}-{}", i, j);
                        ks.set(key.clone(), "v", None);
                        assert!(ks.exists(&key));
                        ks.get("shared");
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(ks.len(), 800);
    }
}
