//! Connection Handler
//!
//! Processes RESP requests and dispatches commands against the shared
//! storage, tracking the database this connection has selected.

use futures::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::debug;

use crate::error::StorageError;
use crate::protocol::{Command, CommandError, Frame, RespCodec};
use crate::storage::{Storage, StreamEntry};

/// Per-connection command executor
pub struct Handler {
    storage: Storage,
    db: usize,
}

impl Handler {
    /// Create a handler starting on database 0
    pub fn new(storage: Storage) -> Self {
        Self { storage, db: 0 }
    }

    /// Currently selected database
    pub fn db(&self) -> usize {
        self.db
    }

    /// Run the handler for a connection
    pub async fn run<T>(mut self, mut framed: Framed<T, RespCodec>) -> std::io::Result<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        // Requests pipelined behind a blocking pop
        let mut pending = VecDeque::new();

        loop {
            let frame = match pending.pop_front() {
                Some(frame) => frame,
                None => match framed.next().await {
                    Some(result) => result?,
                    None => break,
                },
            };
            let start = Instant::now();

            let cmd = match Command::from_frame(frame) {
                Ok(cmd) => cmd,
                Err(e) => {
                    framed.send(e.to_frame()).await?;
                    continue;
                }
            };
            let name = cmd.name();

            let result = if cmd.is_blocking() {
                let execution = self.execute(cmd);
                tokio::pin!(execution);

                // Keep reading so a closed connection abandons the wait
                // before anything is popped
                loop {
                    tokio::select! {
                        result = &mut execution => break result,
                        next = framed.next() => match next {
                            Some(Ok(frame)) => pending.push_back(frame),
                            Some(Err(e)) => return Err(e),
                            None => {
                                debug!(cmd = name, "Peer closed during blocking pop");
                                return Ok(());
                            }
                        },
                    }
                }
            } else {
                self.execute(cmd).await
            };

            framed.send(result.unwrap_or_else(|e| e.to_frame())).await?;
            debug!(cmd = name, db = self.db, latency = ?start.elapsed(), "Command executed");
        }

        Ok(())
    }

    /// Execute a command and return the reply frame
    pub async fn execute(&mut self, cmd: Command) -> Result<Frame, CommandError> {
        let storage = &self.storage;
        let db = self.db;

        let reply = match cmd {
            Command::Ping(None) => Frame::Simple("PONG".to_string()),
            Command::Ping(Some(msg)) | Command::Echo(msg) => Frame::bulk(msg),

            Command::Select(index) => {
                self.db = Storage::check_db(index)?;
                Frame::ok()
            }

            Command::Set { key, value, ttl } => {
                storage.set(&key, &value, ttl, db)?;
                Frame::ok()
            }

            Command::Get { key } => storage.get_string(&key, db)?.map_or(Frame::Null, Frame::bulk),

            Command::Del { keys } => {
                let mut removed = 0;
                for key in &keys {
                    removed += storage.del(key, db)?;
                }
                Frame::integer(removed)
            }

            Command::Exists { keys } => {
                let mut found = 0;
                for key in &keys {
                    found += usize::from(storage.exists(key, db)?);
                }
                Frame::integer(found)
            }

            Command::Type { key } => match storage.type_of(&key, db) {
                Ok(kind) => Frame::Simple(kind.as_str().to_string()),
                Err(StorageError::NotFound(_)) => Frame::Simple("none".to_string()),
                Err(e) => return Err(e.into()),
            },

            Command::RPush { key, items } => Frame::integer(storage.rpush(&key, items, db)?),
            Command::LPush { key, items } => Frame::integer(storage.lpush(&key, items, db)?),
            Command::RLen { key } => Frame::integer(storage.rlen(&key, db)?),

            Command::LRange { key, from, to } => Frame::bulk(storage.lrange(&key, &from, &to, db)?),
            Command::RRange { key, from, to } => Frame::bulk(storage.rrange(&key, &from, &to, db)?),

            Command::LPop { key, count } => {
                pop_reply(storage.lpop(&key, count.unwrap_or(1), db)?, count.is_none())
            }
            Command::RPop { key, count } => {
                pop_reply(storage.rpop(&key, count.unwrap_or(1), db)?, count.is_none())
            }

            Command::BLPop { key, timeout, count } => {
                pop_reply(storage.blpop(&key, count, timeout, db).await?, false)
            }
            Command::BRPop { key, timeout, count } => {
                pop_reply(storage.brpop(&key, count, timeout, db).await?, false)
            }

            Command::XAdd { key, id, fields } => Frame::bulk(storage.xadd(&key, &id, fields, db)?),
            Command::XRange { key, start, end } => {
                let entries = storage.xrange(&key, &start, &end, db)?;
                Frame::Array(entries.into_iter().map(entry_frame).collect())
            }

            Command::FlushDb => {
                storage.flush_db(db)?;
                Frame::ok()
            }
            Command::FlushAll => {
                storage.flush();
                Frame::ok()
            }
            Command::DbSize => Frame::integer(storage.dbsize(db)?),
        };

        Ok(reply)
    }
}

/// Popped elements as an array, or a single bulk when no count was given
fn pop_reply(items: Vec<String>, single: bool) -> Frame {
    if single {
        return items.into_iter().next().map_or(Frame::Null, Frame::bulk);
    }
    if items.is_empty() {
        Frame::NullArray
    } else {
        Frame::bulks(items)
    }
}

/// `[id, [field, value, ...]]`
fn entry_frame(entry: StreamEntry) -> Frame {
    let flat = entry
        .fields
        .into_iter()
        .flat_map(|(field, value)| [field, value]);
    Frame::Array(vec![Frame::bulk(entry.id.to_string()), Frame::bulks(flat)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn handler() -> Handler {
        Handler::new(Storage::new().unwrap())
    }

    async fn exec(handler: &mut Handler, words: &[&str]) -> Frame {
        let cmd = Command::from_frame(Frame::bulks(words.iter().copied())).unwrap();
        handler.execute(cmd).await.unwrap_or_else(|e| e.to_frame())
    }

    #[tokio::test]
    async fn test_strings() {
        let mut h = handler();

        assert_eq!(exec(&mut h, &["PING"]).await, Frame::Simple("PONG".into()));
        assert_eq!(exec(&mut h, &["SET", "k", "v"]).await, Frame::ok());
        assert_eq!(exec(&mut h, &["GET", "k"]).await, Frame::bulk("v"));
        assert_eq!(exec(&mut h, &["GET", "nope"]).await, Frame::Null);
        assert_eq!(exec(&mut h, &["EXISTS", "k", "nope", "k"]).await, Frame::Integer(2));
        assert_eq!(exec(&mut h, &["DEL", "k", "nope"]).await, Frame::Integer(1));
        assert_eq!(exec(&mut h, &["TYPE", "k"]).await, Frame::Simple("none".into()));
    }

    #[tokio::test]
    async fn test_get_wrong_type() {
        let mut h = handler();
        exec(&mut h, &["RPUSH", "l", "a"]).await;

        assert_eq!(
            exec(&mut h, &["GET", "l"]).await,
            Frame::Error("WRONGTYPE Operation against a key holding the wrong kind of value".into())
        );
        assert_eq!(exec(&mut h, &["TYPE", "l"]).await, Frame::Simple("list".into()));
    }

    #[tokio::test]
    async fn test_set_with_ttl_expires() {
        let mut h = handler();
        assert_eq!(exec(&mut h, &["SET", "k", "v", "PX", "50"]).await, Frame::ok());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(exec(&mut h, &["GET", "k"]).await, Frame::Null);
    }

    #[tokio::test]
    async fn test_set_with_unrepresentable_ttl_never_expires() {
        let mut h = handler();
        let huge = u64::MAX.to_string();

        assert_eq!(exec(&mut h, &["SET", "k", "v", &huge]).await, Frame::ok());
        assert_eq!(exec(&mut h, &["SET", "j", "v", "EX", &huge]).await, Frame::ok());
        assert_eq!(exec(&mut h, &["SET", "p", "v", "PX", &huge]).await, Frame::ok());
        assert_eq!(exec(&mut h, &["GET", "k"]).await, Frame::bulk("v"));
        assert_eq!(exec(&mut h, &["DBSIZE"]).await, Frame::Integer(3));
    }

    #[tokio::test]
    async fn test_select_isolates_databases() {
        let mut h = handler();
        exec(&mut h, &["SET", "k", "zero"]).await;

        assert_eq!(exec(&mut h, &["SELECT", "3"]).await, Frame::ok());
        assert_eq!(h.db(), 3);
        assert_eq!(exec(&mut h, &["GET", "k"]).await, Frame::Null);
        assert_eq!(exec(&mut h, &["DBSIZE"]).await, Frame::Integer(0));

        assert_eq!(
            exec(&mut h, &["SELECT", "10"]).await,
            Frame::Error("ERR invalid database 10".into())
        );
        assert_eq!(h.db(), 3);

        exec(&mut h, &["SELECT", "0"]).await;
        assert_eq!(exec(&mut h, &["GET", "k"]).await, Frame::bulk("zero"));
    }

    #[tokio::test]
    async fn test_lists() {
        let mut h = handler();

        assert_eq!(exec(&mut h, &["RPUSH", "l", "b", "c"]).await, Frame::Integer(2));
        assert_eq!(exec(&mut h, &["LPUSH", "l", "a"]).await, Frame::Integer(3));
        assert_eq!(exec(&mut h, &["LLEN", "l"]).await, Frame::Integer(3));
        assert_eq!(exec(&mut h, &["LRANGE", "l", "0", "-1"]).await, Frame::bulk("a,b,c"));
        assert!(matches!(exec(&mut h, &["LRANGE", "l", "0", "x"]).await, Frame::Error(_)));

        assert_eq!(exec(&mut h, &["LPOP", "l"]).await, Frame::bulk("a"));
        assert_eq!(exec(&mut h, &["RPOP", "l", "5"]).await, Frame::bulks(["b", "c"]));
        assert_eq!(exec(&mut h, &["LPOP", "l"]).await, Frame::Null);
        assert_eq!(exec(&mut h, &["LPOP", "l", "2"]).await, Frame::NullArray);
    }

    #[tokio::test]
    async fn test_blocking_pop_timeout_and_ready() {
        let mut h = handler();

        assert_eq!(exec(&mut h, &["BLPOP", "q", "1"]).await, Frame::NullArray);

        exec(&mut h, &["RPUSH", "q", "x", "y"]).await;
        assert_eq!(exec(&mut h, &["BRPOP", "q", "1", "2"]).await, Frame::bulks(["x", "y"]));
    }

    #[tokio::test]
    async fn test_streams() {
        let mut h = handler();

        assert_eq!(exec(&mut h, &["XADD", "s", "1-1", "f", "v"]).await, Frame::bulk("1-1"));
        assert_eq!(
            exec(&mut h, &["XADD", "s", "1-1", "f", "v"]).await,
            Frame::Error(
                "ERR the ID specified in XADD is equal or smaller than the target stream top item"
                    .into()
            )
        );
        assert_eq!(
            exec(&mut h, &["XRANGE", "s", "-", "+"]).await,
            Frame::Array(vec![Frame::Array(vec![
                Frame::bulk("1-1"),
                Frame::bulks(["f", "v"])
            ])])
        );
        assert_eq!(exec(&mut h, &["TYPE", "s"]).await, Frame::Simple("stream".into()));
    }

    #[tokio::test]
    async fn test_flush() {
        let mut h = handler();
        exec(&mut h, &["SET", "a", "1"]).await;
        exec(&mut h, &["SELECT", "1"]).await;
        exec(&mut h, &["SET", "b", "1"]).await;

        assert_eq!(exec(&mut h, &["FLUSHDB"]).await, Frame::ok());
        assert_eq!(exec(&mut h, &["DBSIZE"]).await, Frame::Integer(0));

        exec(&mut h, &["SELECT", "0"]).await;
        assert_eq!(exec(&mut h, &["DBSIZE"]).await, Frame::Integer(1));
        assert_eq!(exec(&mut h, &["FLUSHALL"]).await, Frame::ok());
        assert_eq!(exec(&mut h, &["DBSIZE"]).await, Frame::Integer(0));
    }
}
