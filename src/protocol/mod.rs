//! RESP Protocol
//!
//! The REdis Serialization Protocol spoken by the server and client.
//! Requests are arrays of bulk strings; replies are any frame type.

mod codec;
mod command;
mod frame;

pub use codec::RespCodec;
pub use command::{Command, CommandError};
pub use frame::{Frame, MAX_BULK_LEN, MAX_DEPTH};
