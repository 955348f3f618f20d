//! RESP Frame Structure
//!
//! One value of the REdis Serialization Protocol. Every frame starts
//! with a type byte and each line ends in CRLF:
//!
//! ```text
//! +OK\r\n                    simple string
//! -ERR message\r\n           error
//! :42\r\n                    integer
//! $5\r\nhello\r\n            bulk string ($-1 is null)
//! *2\r\n$3\r\nGET\r\n$1\r\nk\r\n   array (*-1 is a null array)
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use std::io;

/// Largest bulk string accepted from a peer
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Deepest array nesting accepted from a peer
pub const MAX_DEPTH: usize = 32;

const CRLF: &[u8] = b"\r\n";

/// A single RESP value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Null,
    NullArray,
    Array(Vec<Frame>),
}

impl Frame {
    pub fn ok() -> Self {
        Frame::Simple("OK".to_string())
    }

    pub fn bulk(data: impl Into<String>) -> Self {
        Frame::Bulk(Bytes::from(data.into()))
    }

    pub fn integer(n: usize) -> Self {
        Frame::Integer(i64::try_from(n).unwrap_or(i64::MAX))
    }

    /// Array of bulk strings
    pub fn bulks<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Frame::Array(items.into_iter().map(Frame::bulk).collect())
    }

    /// Text content of a simple or bulk string
    pub fn into_string(self) -> Option<String> {
        match self {
            Frame::Simple(s) => Some(s),
            Frame::Bulk(data) => String::from_utf8(data.to_vec()).ok(),
            _ => None,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Frame::Simple(s) => put_line(buf, b'+', s.as_bytes()),
            Frame::Error(msg) => put_line(buf, b'-', msg.as_bytes()),
            Frame::Integer(n) => put_line(buf, b':', n.to_string().as_bytes()),
            Frame::Bulk(data) => {
                put_line(buf, b'$', data.len().to_string().as_bytes());
                buf.put_slice(data);
                buf.put_slice(CRLF);
            }
            Frame::Null => buf.put_slice(b"$-1\r\n"),
            Frame::NullArray => buf.put_slice(b"*-1\r\n"),
            Frame::Array(items) => {
                put_line(buf, b'*', items.len().to_string().as_bytes());
                for item in items {
                    item.encode(buf);
                }
            }
        }
    }

    /// Parse one complete frame from the front of `src`.
    ///
    /// Returns the frame and the number of bytes it occupied, `None` if
    /// more input is needed, or `InvalidData` for malformed input.
    pub fn parse(src: &[u8]) -> io::Result<Option<(Frame, usize)>> {
        parse_at(src, 0, 0)
    }
}

fn put_line(buf: &mut BytesMut, prefix: u8, body: &[u8]) {
    buf.reserve(body.len() + 3);
    buf.put_u8(prefix);
    buf.put_slice(body);
    buf.put_slice(CRLF);
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Line starting at `pos`, without its CRLF, and the offset after it
fn read_line(src: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    let rest = src.get(pos..)?;
    let end = rest.windows(2).position(|w| w == CRLF)?;
    Some((&rest[..end], pos + end + 2))
}

fn parse_int(line: &[u8]) -> io::Result<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| invalid(format!("invalid integer: {:?}", String::from_utf8_lossy(line))))
}

fn parse_text(line: &[u8]) -> io::Result<String> {
    String::from_utf8(line.to_vec()).map_err(|_| invalid("line is not valid UTF-8"))
}

fn parse_at(src: &[u8], pos: usize, depth: usize) -> io::Result<Option<(Frame, usize)>> {
    if depth > MAX_DEPTH {
        return Err(invalid("array nesting too deep"));
    }

    let Some(&prefix) = src.get(pos) else {
        return Ok(None);
    };
    let Some((line, next)) = read_line(src, pos + 1) else {
        return Ok(None);
    };

    match prefix {
        b'+' => Ok(Some((Frame::Simple(parse_text(line)?), next))),
        b'-' => Ok(Some((Frame::Error(parse_text(line)?), next))),
        b':' => Ok(Some((Frame::Integer(parse_int(line)?), next))),
        b'$' => {
            let len = parse_int(line)?;
            if len == -1 {
                return Ok(Some((Frame::Null, next)));
            }
            let len = usize::try_from(len)
                .ok()
                .filter(|len| *len <= MAX_BULK_LEN)
                .ok_or_else(|| invalid(format!("invalid bulk length {}", len)))?;

            let end = next + len;
            if src.len() < end + 2 {
                return Ok(None);
            }
            if &src[end..end + 2] != CRLF {
                return Err(invalid("bulk string not terminated by CRLF"));
            }
            let data = Bytes::copy_from_slice(&src[next..end]);
            Ok(Some((Frame::Bulk(data), end + 2)))
        }
        b'*' => {
            let count = parse_int(line)?;
            if count == -1 {
                return Ok(Some((Frame::NullArray, next)));
            }
            let count = usize::try_from(count)
                .map_err(|_| invalid(format!("invalid array length {}", count)))?;

            // Capacity is bounded by the bytes actually present
            let mut items = Vec::with_capacity(count.min(src.len() - next));
            let mut cursor = next;
            for _ in 0..count {
                match parse_at(src, cursor, depth + 1)? {
                    Some((item, after)) => {
                        items.push(item);
                        cursor = after;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((Frame::Array(items), cursor)))
        }
        other => Err(invalid(format!("unexpected frame prefix: {:?}", other as char))),
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

impl Frame {
    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "{}", s),
            Frame::Error(msg) => write!(f, "(error) {}", msg),
            Frame::Integer(n) => write!(f, "(integer) {}", n),
            Frame::Bulk(data) => write!(f, "\"{}\"", String::from_utf8_lossy(data)),
            Frame::Null | Frame::NullArray => write!(f, "(nil)"),
            Frame::Array(items) if items.is_empty() => write!(f, "(empty array)"),
            Frame::Array(items) => {
                let width = items.len().to_string().len();
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, "\n{:indent$}", "", indent = indent)?;
                    }
                    let label = format!("{:>width$}) ", i + 1, width = width);
                    write!(f, "{}", label)?;
                    item.fmt_indented(f, indent + label.len())?;
                }
                Ok(())
            }
        }
    }
}
