//! RESP Command Parsing
//!
//! Turns a request array into a typed command and back.

use std::time::Duration;

use thiserror::Error;

use super::frame::Frame;
use crate::error::{parse_arg, StorageError};

/// Parsed client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Health check, optionally echoing a message
    Ping(Option<String>),

    Echo(String),

    /// Switch the connection's database
    Select(i64),

    /// Set a string with an optional TTL
    Set {
        key: String,
        value: String,
        ttl: Option<Duration>,
    },

    Get { key: String },

    Del { keys: Vec<String> },

    Exists { keys: Vec<String> },

    Type { key: String },

    RPush { key: String, items: Vec<String> },

    LPush { key: String, items: Vec<String> },

    RLen { key: String },

    /// Range bounds stay raw so the engine reports malformed ones
    LRange { key: String, from: String, to: String },

    RRange { key: String, from: String, to: String },

    /// `count: None` replies with a single element instead of an array
    LPop { key: String, count: Option<i64> },

    RPop { key: String, count: Option<i64> },

    BLPop { key: String, timeout: u64, count: i64 },

    BRPop { key: String, timeout: u64, count: i64 },

    XAdd {
        key: String,
        id: String,
        fields: Vec<(String, String)>,
    },

    XRange { key: String, start: String, end: String },

    FlushDb,

    FlushAll,

    DbSize,
}

/// Why a request could not be turned into a reply
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    Unknown(String),

    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(String),

    #[error("syntax error")]
    Syntax,

    #[error("protocol error: expected an array of bulk strings")]
    InvalidRequest,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CommandError {
    /// Error reply sent to the client
    pub fn to_frame(&self) -> Frame {
        match self {
            // Already carries its own prefix
            CommandError::Storage(StorageError::WrongType) => Frame::Error(self.to_string()),
            _ => Frame::Error(format!("ERR {}", self)),
        }
    }
}

const COMMANDS: &[&str] = &[
    "PING", "ECHO", "SELECT", "SET", "GET", "DEL", "EXISTS", "TYPE", "RPUSH", "LPUSH", "RLEN",
    "LLEN", "LRANGE", "RRANGE", "LPOP", "RPOP", "BLPOP", "BRPOP", "XADD", "XRANGE", "FLUSHDB",
    "FLUSHALL", "DBSIZE",
];

impl Command {
    /// Parse a request array. The command name is case-insensitive.
    pub fn from_frame(frame: Frame) -> Result<Self, CommandError> {
        let Frame::Array(parts) = frame else {
            return Err(CommandError::InvalidRequest);
        };

        let mut args = parts
            .into_iter()
            .map(|part| part.into_string().ok_or(CommandError::InvalidRequest))
            .collect::<Result<Vec<_>, _>>()?;
        if args.is_empty() {
            return Err(CommandError::InvalidRequest);
        }
        let name = args.remove(0).to_uppercase();

        let cmd = match (name.as_str(), args.as_slice()) {
            ("PING", []) => Command::Ping(None),
            ("PING", [msg]) => Command::Ping(Some(msg.clone())),
            ("ECHO", [msg]) => Command::Echo(msg.clone()),
            ("SELECT", [db]) => Command::Select(parse_arg("database index", db)?),

            ("SET", [key, value, ttl @ ..]) => Command::Set {
                key: key.clone(),
                value: value.clone(),
                ttl: parse_ttl(ttl)?,
            },
            ("GET", [key]) => Command::Get { key: key.clone() },
            ("DEL", keys @ [_, ..]) => Command::Del { keys: keys.to_vec() },
            ("EXISTS", keys @ [_, ..]) => Command::Exists { keys: keys.to_vec() },
            ("TYPE", [key]) => Command::Type { key: key.clone() },

            ("RPUSH", [key, items @ ..]) if !items.is_empty() => Command::RPush {
                key: key.clone(),
                items: items.to_vec(),
            },
            ("LPUSH", [key, items @ ..]) if !items.is_empty() => Command::LPush {
                key: key.clone(),
                items: items.to_vec(),
            },
            ("RLEN" | "LLEN", [key]) => Command::RLen { key: key.clone() },
            ("LRANGE", [key, from, to]) => Command::LRange {
                key: key.clone(),
                from: from.clone(),
                to: to.clone(),
            },
            ("RRANGE", [key, from, to]) => Command::RRange {
                key: key.clone(),
                from: from.clone(),
                to: to.clone(),
            },
            ("LPOP", [key]) => Command::LPop {
                key: key.clone(),
                count: None,
            },
            ("LPOP", [key, count]) => Command::LPop {
                key: key.clone(),
                count: Some(parse_arg("count", count)?),
            },
            ("RPOP", [key]) => Command::RPop {
                key: key.clone(),
                count: None,
            },
            ("RPOP", [key, count]) => Command::RPop {
                key: key.clone(),
                count: Some(parse_arg("count", count)?),
            },
            ("BLPOP", [key, timeout, count @ ..]) if count.len() <= 1 => Command::BLPop {
                key: key.clone(),
                timeout: parse_arg("timeout", timeout)?,
                count: parse_count(count)?,
            },
            ("BRPOP", [key, timeout, count @ ..]) if count.len() <= 1 => Command::BRPop {
                key: key.clone(),
                timeout: parse_arg("timeout", timeout)?,
                count: parse_count(count)?,
            },

            ("XADD", [key, id, pairs @ ..]) if !pairs.is_empty() && pairs.len() % 2 == 0 => {
                Command::XAdd {
                    key: key.clone(),
                    id: id.clone(),
                    fields: pairs
                        .chunks_exact(2)
                        .map(|pair| (pair[0].clone(), pair[1].clone()))
                        .collect(),
                }
            }
            ("XRANGE", [key, start, end]) => Command::XRange {
                key: key.clone(),
                start: start.clone(),
                end: end.clone(),
            },

            ("FLUSHDB", []) => Command::FlushDb,
            ("FLUSHALL", []) => Command::FlushAll,
            ("DBSIZE", []) => Command::DbSize,

            (known, _) if COMMANDS.contains(&known) => {
                return Err(CommandError::WrongArity(known.to_lowercase()))
            }
            (other, _) => return Err(CommandError::Unknown(other.to_lowercase())),
        };

        Ok(cmd)
    }

    /// Render as a request array
    pub fn to_frame(&self) -> Frame {
        let mut parts = vec![self.name().to_string()];

        match self {
            Command::Ping(msg) => parts.extend(msg.clone()),
            Command::Echo(msg) => parts.push(msg.clone()),
            Command::Select(db) => parts.push(db.to_string()),
            Command::Set { key, value, ttl } => {
                parts.push(key.clone());
                parts.push(value.clone());
                if let Some(ttl) = ttl {
                    parts.push("PX".to_string());
                    parts.push(ttl.as_millis().to_string());
                }
            }
            Command::Get { key } | Command::Type { key } | Command::RLen { key } => {
                parts.push(key.clone())
            }
            Command::Del { keys } | Command::Exists { keys } => parts.extend(keys.iter().cloned()),
            Command::RPush { key, items } | Command::LPush { key, items } => {
                parts.push(key.clone());
                parts.extend(items.iter().cloned());
            }
            Command::LRange { key, from, to } | Command::RRange { key, from, to } => {
                parts.extend([key.clone(), from.clone(), to.clone()])
            }
            Command::LPop { key, count } | Command::RPop { key, count } => {
                parts.push(key.clone());
                parts.extend(count.map(|c| c.to_string()));
            }
            Command::BLPop { key, timeout, count } | Command::BRPop { key, timeout, count } => {
                parts.extend([key.clone(), timeout.to_string(), count.to_string()])
            }
            Command::XAdd { key, id, fields } => {
                parts.push(key.clone());
                parts.push(id.clone());
                for (field, value) in fields {
                    parts.push(field.clone());
                    parts.push(value.clone());
                }
            }
            Command::XRange { key, start, end } => {
                parts.extend([key.clone(), start.clone(), end.clone()])
            }
            Command::FlushDb | Command::FlushAll | Command::DbSize => {}
        }

        Frame::bulks(parts)
    }

    /// Whether executing this command may wait for other clients
    pub fn is_blocking(&self) -> bool {
        matches!(self, Command::BLPop { .. } | Command::BRPop { .. })
    }

    /// Upper-case command name
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping(_) => "PING",
            Command::Echo(_) => "ECHO",
            Command::Select(_) => "SELECT",
            Command::Set { .. } => "SET",
            Command::Get { .. } => "GET",
            Command::Del { .. } => "DEL",
            Command::Exists { .. } => "EXISTS",
            Command::Type { .. } => "TYPE",
            Command::RPush { .. } => "RPUSH",
            Command::LPush { .. } => "LPUSH",
            Command::RLen { .. } => "RLEN",
            Command::LRange { .. } => "LRANGE",
            Command::RRange { .. } => "RRANGE",
            Command::LPop { .. } => "LPOP",
            Command::RPop { .. } => "RPOP",
            Command::BLPop { .. } => "BLPOP",
            Command::BRPop { .. } => "BRPOP",
            Command::XAdd { .. } => "XADD",
            Command::XRange { .. } => "XRANGE",
            Command::FlushDb => "FLUSHDB",
            Command::FlushAll => "FLUSHALL",
            Command::DbSize => "DBSIZE",
        }
    }
}

/// `[]`, `[secs]`, `[EX secs]` or `[PX millis]`. A zero TTL means none.
fn parse_ttl(args: &[String]) -> Result<Option<Duration>, CommandError> {
    let ttl = match args {
        [] => return Ok(None),
        [secs] => Duration::from_secs(parse_arg("ttl", secs)?),
        [unit, secs] if unit.eq_ignore_ascii_case("EX") => Duration::from_secs(parse_arg("ttl", secs)?),
        [unit, ms] if unit.eq_ignore_ascii_case("PX") => Duration::from_millis(parse_arg("ttl", ms)?),
        _ => return Err(CommandError::Syntax),
    };

    Ok(Some(ttl).filter(|ttl| !ttl.is_zero()))
}

fn parse_count(args: &[String]) -> Result<i64, CommandError> {
    match args {
        [count] => Ok(parse_arg("count", count)?),
        _ => Ok(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(words: &[&str]) -> Result<Command, CommandError> {
        Command::from_frame(Frame::bulks(words.iter().copied()))
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ping_command() {
        assert_eq!(request(&["PING"]), Ok(Command::Ping(None)));
        assert_eq!(request(&["ping", "hi"]), Ok(Command::Ping(Some("hi".into()))));
    }

    #[test]
    fn test_set_command() {
        let set = |extra: &[&str]| {
            let mut words = vec!["set", "k", "v"];
            words.extend_from_slice(extra);
            request(&words)
        };
        let expect = |ttl: Option<Duration>| {
            Ok(Command::Set {
                key: "k".into(),
                value: "v".into(),
                ttl,
            })
        };

        assert_eq!(set(&[]), expect(None));
        assert_eq!(set(&["10"]), expect(Some(Duration::from_secs(10))));
        assert_eq!(set(&["ex", "3"]), expect(Some(Duration::from_secs(3))));
        assert_eq!(set(&["PX", "250"]), expect(Some(Duration::from_millis(250))));
        assert_eq!(set(&["0"]), expect(None));
        assert_eq!(set(&["XX", "1"]), Err(CommandError::Syntax));
        assert!(matches!(
            set(&["-1"]),
            Err(CommandError::Storage(StorageError::Parse { what: "ttl", .. }))
        ));
    }

    #[test]
    fn test_list_commands() {
        assert_eq!(
            request(&["RPUSH", "l", "a", "b"]),
            Ok(Command::RPush {
                key: "l".into(),
                items: strings(&["a", "b"])
            })
        );
        assert_eq!(request(&["LLEN", "l"]), Ok(Command::RLen { key: "l".into() }));
        assert_eq!(
            request(&["LPOP", "l"]),
            Ok(Command::LPop {
                key: "l".into(),
                count: None
            })
        );
        assert_eq!(
            request(&["RPOP", "l", "2"]),
            Ok(Command::RPop {
                key: "l".into(),
                count: Some(2)
            })
        );
        assert_eq!(
            request(&["LRANGE", "l", "0", "x"]),
            Ok(Command::LRange {
                key: "l".into(),
                from: "0".into(),
                to: "x".into()
            })
        );
    }

    #[test]
    fn test_blocking_commands() {
        assert_eq!(
            request(&["BLPOP", "q", "5"]),
            Ok(Command::BLPop {
                key: "q".into(),
                timeout: 5,
                count: 1
            })
        );
        assert_eq!(
            request(&["brpop", "q", "0", "3"]),
            Ok(Command::BRPop {
                key: "q".into(),
                timeout: 0,
                count: 3
            })
        );
        assert!(matches!(
            request(&["BLPOP", "q", "soon"]),
            Err(CommandError::Storage(StorageError::Parse { what: "timeout", .. }))
        ));
    }

    #[test]
    fn test_stream_commands() {
        assert_eq!(
            request(&["XADD", "s", "*", "f1", "v1", "f2", "v2"]),
            Ok(Command::XAdd {
                key: "s".into(),
                id: "*".into(),
                fields: vec![("f1".into(), "v1".into()), ("f2".into(), "v2".into())],
            })
        );
        assert_eq!(
            request(&["XADD", "s", "*", "f1"]),
            Err(CommandError::WrongArity("xadd".into()))
        );
    }

    #[test]
    fn test_is_blocking() {
        assert!(request(&["BLPOP", "q", "0"]).unwrap().is_blocking());
        assert!(request(&["BRPOP", "q", "1", "2"]).unwrap().is_blocking());
        assert!(!request(&["LPOP", "q"]).unwrap().is_blocking());
    }

    #[test]
    fn test_arity_and_unknown() {
        assert_eq!(request(&["GET"]), Err(CommandError::WrongArity("get".into())));
        assert_eq!(request(&["DEL"]), Err(CommandError::WrongArity("del".into())));
        assert_eq!(request(&["FLUSHDB", "x"]), Err(CommandError::WrongArity("flushdb".into())));
        assert_eq!(request(&["HGET", "k"]), Err(CommandError::Unknown("hget".into())));
    }

    #[test]
    fn test_invalid_request() {
        assert_eq!(Command::from_frame(Frame::ok()), Err(CommandError::InvalidRequest));
        assert_eq!(Command::from_frame(Frame::Array(vec![])), Err(CommandError::InvalidRequest));
        assert_eq!(
            Command::from_frame(Frame::Array(vec![Frame::bulk("GET"), Frame::Integer(1)])),
            Err(CommandError::InvalidRequest)
        );
    }

    #[test]
    fn test_to_frame_parses_back() {
        let commands = vec![
            Command::Ping(None),
            Command::Select(3),
            Command::Set {
                key: "k".into(),
                value: "v".into(),
                ttl: Some(Duration::from_millis(1500)),
            },
            Command::Del {
                keys: strings(&["a", "b"]),
            },
            Command::LPop {
                key: "l".into(),
                count: None,
            },
            Command::BRPop {
                key: "q".into(),
                timeout: 2,
                count: 4,
            },
            Command::XAdd {
                key: "s".into(),
                id: "1-1".into(),
                fields: vec![("f".into(), "v".into())],
            },
            Command::FlushAll,
        ];

        for cmd in commands {
            assert_eq!(Command::from_frame(cmd.to_frame()), Ok(cmd.clone()), "{:?}", cmd);
        }
    }

    #[test]
    fn test_error_frames() {
        assert_eq!(
            CommandError::Unknown("hget".into()).to_frame(),
            Frame::Error("ERR unknown command 'hget'".into())
        );
        assert_eq!(
            CommandError::from(StorageError::WrongType).to_frame(),
            Frame::Error("WRONGTYPE Operation against a key holding the wrong kind of value".into())
        );
        assert_eq!(
            CommandError::from(StorageError::InvalidDatabase(12)).to_frame(),
            Frame::Error("ERR invalid database 12".into())
        );
    }
}
