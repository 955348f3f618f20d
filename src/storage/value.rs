//! Value Model
//!
//! Tagged values, their expiry metadata and stream identifiers.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::error::StorageError;

/// Value stored under a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    String(String),
    List(VecDeque<String>),
    Stream(Vec<StreamEntry>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::List(_) => ValueKind::List,
            Value::Stream(_) => ValueKind::Stream,
        }
    }
}

/// Kind of a stored value, as reported by TYPE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    List,
    Stream,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::List => "list",
            ValueKind::Stream => "stream",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry in a keyspace with value and expiration
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) value: Value,
    pub(crate) expires_at: Option<Instant>,
}

impl Entry {
    /// A zero TTL, or one too far out to represent, never expires
    pub(crate) fn new(value: Value, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl
                .filter(|d| !d.is_zero())
                .and_then(|d| Instant::now().checked_add(d)),
        }
    }

    pub(crate) fn persistent(value: Value) -> Self {
        Self::new(value, None)
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.expires_at.map(|t| Instant::now() >= t).unwrap_or(false)
    }
}

/// Stream entry identifier, ordered by milliseconds then sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamId {
    pub const MIN: StreamId = StreamId { ms: 0, seq: 0 };
    pub const MAX: StreamId = StreamId {
        ms: u64::MAX,
        seq: u64::MAX,
    };

    pub fn new(ms: u64, seq: u64) -> Self {
        Self { ms, seq }
    }

    /// Smallest ID at `now_ms` or later that sorts after `last`.
    /// `None` once `last` is [`StreamId::MAX`].
    pub fn next_after(last: Option<StreamId>, now_ms: u64) -> Option<Self> {
        match last {
            Some(last) if last.ms >= now_ms => match last.seq.checked_add(1) {
                Some(seq) => Some(StreamId::new(last.ms, seq)),
                None => last.ms.checked_add(1).map(|ms| StreamId::new(ms, 0)),
            },
            _ => Some(StreamId::new(now_ms, 0)),
        }
    }
}

impl FromStr for StreamId {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StorageError::InvalidId(s.to_string());
        let (ms, seq) = s.split_once('-').ok_or_else(invalid)?;
        let ms = ms.parse::<u64>().map_err(|_| invalid())?;
        let seq = seq.parse::<u64>().map_err(|_| invalid())?;
        Ok(StreamId { ms, seq })
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

/// One record of a stream. Fields keep insertion order and may repeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub id: StreamId,
    pub fields: Vec<(String, String)>,
}
