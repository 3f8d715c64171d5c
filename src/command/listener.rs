//! TCP accept loop for the command channel.
//!
//! Connections are served one at a time: authenticate, read one command,
//! hand it to the manager through the request queue, wait for the reply and
//! write it back. The listener never touches door state or hardware.
//! Each exchange runs under a deadline so a silent peer cannot hold the
//! channel.

use super::protocol::{read_frame, server_handshake, write_frame};
use crate::error::{GarageError, Result};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

/// Default deadline for one complete command exchange.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A command waiting to be processed by the manager.
#[derive(Debug)]
pub struct CommandRequest {
    pub command: String,
    pub reply: oneshot::Sender<String>,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> (Self, oneshot::Receiver<String>) {
        let (reply, rx) = oneshot::channel();
        (
            Self {
                command: command.into(),
                reply,
            },
            rx,
        )
    }
}

pub struct CommandListener {
    listener: TcpListener,
    auth_key: Vec<u8>,
    requests: mpsc::Sender<CommandRequest>,
    request_timeout: Duration,
}

impl CommandListener {
    pub async fn bind(
        addr: &str,
        auth_key: impl Into<Vec<u8>>,
        requests: mpsc::Sender<CommandRequest>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening for commands on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            auth_key: auth_key.into(),
            requests,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Limit how long a single connection may take from accept to reply.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve connections until the manager goes away.
    pub async fn run(self) -> Result<()> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Failed to accept command connection: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            debug!("Command connection from {}", peer);
            match timeout(self.request_timeout, self.serve(stream)).await {
                Ok(Ok(())) => {}
                Ok(Err(e @ GarageError::ChannelClosed(_))) => {
                    error!("Command processing stopped: {}", e);
                    return Err(e);
                }
                Ok(Err(e)) => warn!("Dropped command connection from {}: {}", peer, e),
                Err(_) => warn!(
                    "Command connection from {} timed out after {:?}",
                    peer, self.request_timeout
                ),
            }
        }
    }

    async fn serve(&self, mut stream: TcpStream) -> Result<()> {
        server_handshake(&mut stream, &self.auth_key).await?;

        let payload = read_frame(&mut stream).await?;
        let command = String::from_utf8(payload)
            .map_err(|_| GarageError::Protocol("command is not valid UTF-8".to_string()))?;

        let (request, reply) = CommandRequest::new(command);
        self.requests
            .send(request)
            .await
            .map_err(|_| GarageError::ChannelClosed("command queue"))?;
        let response = reply
            .await
            .map_err(|_| GarageError::ChannelClosed("command reply"))?;

        write_frame(&mut stream, response.as_bytes()).await
    }
}
