//! Blocking Pops
//!
//! BLPOP/BRPOP wait for a list to hold enough elements by polling the
//! keyspace. No lock is held while sleeping between polls.

use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

use super::keyspace::Keyspace;
use super::list::End;

/// Pause between two checks of a watched list
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

impl Keyspace {
    /// Wait until the list holds at least `count` elements and pop them
    /// from the head. Returns an empty vec once `timeout_secs` elapses;
    /// 0 waits forever.
    pub async fn blpop(&self, key: &str, count: i64, timeout_secs: u64) -> Vec<String> {
        self.blocking_pop(key, count, timeout_secs, End::Head).await
    }

    /// Tail counterpart of [`Keyspace::blpop`]
    pub async fn brpop(&self, key: &str, count: i64, timeout_secs: u64) -> Vec<String> {
        self.blocking_pop(key, count, timeout_secs, End::Tail).await
    }

    async fn blocking_pop(&self, key: &str, count: i64, timeout_secs: u64, end: End) -> Vec<String> {
        let count = usize::try_from(count).ok().filter(|c| *c > 0).unwrap_or(1);
        // None waits forever, which also covers a timeout too large to represent
        let deadline = match timeout_secs {
            0 => None,
            secs => Instant::now().checked_add(Duration::from_secs(secs)),
        };

        loop {
            if let Some(items) = self.pop_exact(key, count, end) {
                return items;
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                debug!(db = self.index, key, ?end, "Blocking pop timed out");
                return Vec::new();
            }

            sleep(POLL_INTERVAL).await;
        }
    }
}
