//! Stream Operations
//!
//! XADD appends entries with strictly increasing IDs; XRANGE reads them
//! back between two bounds.

use chrono::Utc;

use super::keyspace::{live, live_mut, Keyspace};
use super::value::{Entry, StreamEntry, StreamId, Value};
use crate::error::{parse_arg, Result, StorageError};

fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

impl Keyspace {
    /// Append an entry to the stream under `key`. An empty or `*` ID is
    /// generated from the current time. Returns the assigned ID.
    pub fn xadd(&self, key: &str, id: &str, fields: Vec<(String, String)>) -> Result<String> {
        let requested = match id {
            "" | "*" => None,
            explicit => Some(explicit.parse::<StreamId>()?),
        };

        let mut entries = self.entries.write();
        let stream = match live_mut(&mut entries, key) {
            Some(Entry {
                value: Value::Stream(stream),
                ..
            }) => Some(stream),
            Some(_) => return Err(StorageError::WrongType),
            None => None,
        };

        let last = stream.as_ref().and_then(|stream| stream.last()).map(|e| e.id);
        let id = match requested {
            Some(id) if last.is_some_and(|last| id <= last) => {
                return Err(StorageError::OutOfOrderId)
            }
            Some(id) => id,
            None => StreamId::next_after(last, now_ms()).ok_or(StorageError::OutOfOrderId)?,
        };

        let entry = StreamEntry { id, fields };
        match stream {
            Some(stream) => stream.push(entry),
            None => {
                entries.insert(key.to_string(), Entry::persistent(Value::Stream(vec![entry])));
            }
        }

        Ok(id.to_string())
    }

    /// Entries with IDs between `start` and `end`, inclusive.
    ///
    /// Bounds are `-`, `+`, a millisecond timestamp (matching every
    /// sequence number within it) or a full `ms-seq` ID.
    pub fn xrange(&self, key: &str, start: &str, end: &str) -> Result<Vec<StreamEntry>> {
        let start = parse_bound(start, 0)?;
        let end = parse_bound(end, u64::MAX)?;

        let entries = self.entries.read();
        match live(&entries, key) {
            Some(Entry {
                value: Value::Stream(stream),
                ..
            }) => Ok(stream
                .iter()
                .filter(|entry| entry.id >= start && entry.id <= end)
                .cloned()
                .collect()),
            Some(_) => Err(StorageError::WrongType),
            None => Err(StorageError::NotFound(key.to_string())),
        }
    }
}

fn parse_bound(raw: &str, default_seq: u64) -> Result<StreamId> {
    match raw {
        "-" => Ok(StreamId::MIN),
        "+" => Ok(StreamId::MAX),
        _ if raw.contains('-') => raw.parse().map_err(|_| StorageError::Parse {
            what: "stream range bound",
            value: raw.to_string(),
        }),
        _ => Ok(StreamId::new(parse_arg("stream range bound", raw)?, default_seq)),
    }
}
