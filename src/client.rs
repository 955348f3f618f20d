//! Async Client
//!
//! Sends commands to a memstore server over RESP and reads the replies.

use futures::{SinkExt, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;

use crate::protocol::{Command, Frame, RespCodec};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Protocol error: unexpected reply {0:?}")]
    Protocol(Frame),
    #[error("Server error: {0}")]
    Server(String),
    #[error("Connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, ClientError>;

pub struct Client {
    framed: Framed<TcpStream, RespCodec>,
}

impl Client {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            framed: Framed::new(stream, RespCodec::new()),
        })
    }

    /// Send one command and wait for its reply. Error replies are
    /// returned as frames, not as `Err`.
    pub async fn request(&mut self, cmd: &Command) -> Result<Frame> {
        self.send_frame(cmd.to_frame()).await
    }

    /// Send an already-built request array
    pub async fn send_frame(&mut self, frame: Frame) -> Result<Frame> {
        self.framed.send(frame).await?;
        match self.framed.next().await {
            Some(reply) => Ok(reply?),
            None => Err(ClientError::ConnectionClosed),
        }
    }

    pub async fn set(&mut self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let cmd = Command::Set {
            key: key.to_string(),
            value: value.to_string(),
            ttl,
        };
        match self.call(&cmd).await? {
            Frame::Simple(s) if s == "OK" => Ok(()),
            other => Err(ClientError::Protocol(other)),
        }
    }

    pub async fn get(&mut self, key: &str) -> Result<Option<String>> {
        match self.call(&Command::Get { key: key.to_string() }).await? {
            Frame::Null => Ok(None),
            other => other
                .clone()
                .into_string()
                .map(Some)
                .ok_or(ClientError::Protocol(other)),
        }
    }

    pub async fn del(&mut self, keys: &[&str]) -> Result<i64> {
        let keys = keys.iter().map(|k| k.to_string()).collect();
        match self.call(&Command::Del { keys }).await? {
            Frame::Integer(n) => Ok(n),
            other => Err(ClientError::Protocol(other)),
        }
    }

    /// Like [`Client::request`], turning error replies into `Err`
    async fn call(&mut self, cmd: &Command) -> Result<Frame> {
        match self.request(cmd).await? {
            Frame::Error(msg) => Err(ClientError::Server(msg)),
            reply => Ok(reply),
        }
    }
}
