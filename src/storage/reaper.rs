//! Expiry Reaper
//!
//! Background thread that periodically removes expired keys from one
//! keyspace. Stops when its owner drops it.

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

use super::keyspace::{sweep, Entries};

/// Handle to a running reaper thread
#[derive(Debug)]
pub(crate) struct Reaper {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Reaper {
    /// Spawn the reaper for keyspace `index`, sweeping every `interval`
    pub(crate) fn spawn(
        index: usize,
        entries: Arc<RwLock<Entries>>,
        interval: Duration,
    ) -> io::Result<Self> {
        let (stop, stopped) = channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name(format!("reaper-{}", index))
            .spawn(move || {
                debug!(db = index, ?interval, "Reaper started");
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let removed = sweep(&entries);
                            if removed > 0 {
                                debug!(db = index, removed, "Reaped expired keys");
                            }
                        }
                        // Explicit stop or the owner went away
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!(db = index, "Reaper stopped");
            })?;

        info!(db = index, "Expiry reaper running, interval: {:?}", interval);

        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for it to exit
    pub(crate) fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.stop();
    }
}
