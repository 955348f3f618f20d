//! Server Module
//!
//! TCP server for RESP connections. Every connection runs on its own
//! task with a handler sharing one storage.

mod config;
mod handler;

pub use config::Config;
pub use handler::Handler;

use crate::protocol::RespCodec;
use crate::storage::Storage;
use std::io;
use tokio::net::TcpListener;
use tokio_util::codec::Framed;
use tracing::{error, info};

/// memstore server
pub struct Server {
    config: Config,
    storage: Storage,
}

impl Server {
    /// Create a new server; the storage reapers start immediately
    pub fn new(config: Config) -> io::Result<Self> {
        let storage = Storage::with_config(config.storage_config())?;
        Ok(Self { config, storage })
    }

    /// Bind to the configured address and serve until an error
    pub async fn run(self) -> io::Result<()> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr).await?;

        info!("memstore server listening on {}", addr);
        self.serve(listener).await
    }

    /// Accept connections from an already bound listener
    pub async fn serve(self, listener: TcpListener) -> io::Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    info!("New connection from {}", peer_addr);

                    let storage = self.storage.clone();

                    tokio::spawn(async move {
                        let framed = Framed::new(socket, RespCodec::new());
                        let handler = Handler::new(storage);

                        if let Err(e) = handler.run(framed).await {
                            error!("Connection error from {}: {}", peer_addr, e);
                        }

                        info!("Connection closed: {}", peer_addr);
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }

    /// Get a reference to the storage (for testing)
    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}
