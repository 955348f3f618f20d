//! List Operations
//!
//! Push, pop, length and range over list values. Writes against a key
//! holding another kind replace it with a fresh list.

use std::collections::VecDeque;

use super::keyspace::{live, live_mut, Keyspace};
use super::value::{Entry, Value};

/// Which end of a list an operation works on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum End {
    Head,
    Tail,
}

impl Keyspace {
    /// Append `items` to the tail, returns the new length
    pub fn rpush(&self, key: &str, items: Vec<String>) -> usize {
        self.push(key, items, End::Tail)
    }

    /// Insert `items` before the head as one block, returns the new length
    pub fn lpush(&self, key: &str, items: Vec<String>) -> usize {
        self.push(key, items, End::Head)
    }

    fn push(&self, key: &str, items: Vec<String>, end: End) -> usize {
        let mut entries = self.entries.write();

        if let Some(Entry {
            value: Value::List(list),
            ..
        }) = live_mut(&mut entries, key)
        {
            extend(list, items, end);
            return list.len();
        }

        let mut list = VecDeque::with_capacity(items.len());
        extend(&mut list, items, end);
        let len = list.len();
        if len > 0 {
            entries.insert(key.to_string(), Entry::persistent(Value::List(list)));
        }
        len
    }

    /// Length of the list, 0 if absent or not a list
    pub fn rlen(&self, key: &str) -> usize {
        match live(&self.entries.read(), key) {
            Some(Entry {
                value: Value::List(list),
                ..
            }) => list.len(),
            _ => 0,
        }
    }

    /// Elements `from..=to` joined with commas. Negative indices count
    /// from the end.
    pub fn lrange(&self, key: &str, from: i64, to: i64) -> String {
        let entries = self.entries.read();
        let Some(Entry {
            value: Value::List(list),
            ..
        }) = live(&entries, key)
        else {
            return String::new();
        };

        match resolve_range(list.len(), from, to) {
            Some((from, to)) => list
                .range(from..=to)
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(","),
            None => String::new(),
        }
    }

    /// Same extraction as [`Keyspace::lrange`]
    pub fn rrange(&self, key: &str, from: i64, to: i64) -> String {
        self.lrange(key, from, to)
    }

    /// Remove up to `count` elements from the head. A non-positive
    /// `count` removes everything.
    pub fn lpop(&self, key: &str, count: i64) -> Vec<String> {
        self.pop(key, count, End::Head)
    }

    /// Remove up to `count` elements from the tail, returned in stored order
    pub fn rpop(&self, key: &str, count: i64) -> Vec<String> {
        self.pop(key, count, End::Tail)
    }

    fn pop(&self, key: &str, count: i64, end: End) -> Vec<String> {
        let mut entries = self.entries.write();
        let Some(Entry {
            value: Value::List(list),
            ..
        }) = live_mut(&mut entries, key)
        else {
            return Vec::new();
        };

        let len = list.len();
        let count = usize::try_from(count)
            .ok()
            .filter(|c| *c > 0 && *c <= len)
            .unwrap_or(len);

        let popped = drain(list, count, end);
        if list.is_empty() {
            entries.remove(key);
        }
        popped
    }

    /// Pop exactly `count` elements, or nothing if the list is shorter
    pub(crate) fn pop_exact(&self, key: &str, count: usize, end: End) -> Option<Vec<String>> {
        let mut entries = self.entries.write();
        let Some(Entry {
            value: Value::List(list),
            ..
        }) = live_mut(&mut entries, key)
        else {
            return None;
        };

        if list.len() < count {
            return None;
        }

        let popped = drain(list, count, end);
        if list.is_empty() {
            entries.remove(key);
        }
        Some(popped)
    }
}

fn extend(list: &mut VecDeque<String>, items: Vec<String>, end: End) {
    match end {
        End::Tail => list.extend(items),
        End::Head => {
            for item in items.into_iter().rev() {
                list.push_front(item);
            }
        }
    }
}

fn drain(list: &mut VecDeque<String>, count: usize, end: End) -> Vec<String> {
    match end {
        End::Head => list.drain(..count).collect(),
        End::Tail => {
            let start = list.len() - count;
            list.drain(start..).collect()
        }
    }
}

/// Resolve an inclusive, possibly negative range against `len`
fn resolve_range(len: usize, from: i64, to: i64) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len = len as i64;
    let from = if from < 0 { from + len } else { from }.max(0);
    let to = if to < 0 { to + len } else { to }.min(len - 1);
    if from > to {
        return None;
    }
    Some((from as usize, to as usize))
}
