//! Client side of the command channel.

use super::protocol::{client_handshake, read_frame, write_frame};
use crate::error::{GarageError, Result};
use tokio::net::TcpStream;

/// Connect, authenticate, send one command and return the response.
pub async fn send_command(addr: &str, auth_key: &[u8], command: &str) -> Result<String> {
    let mut stream = TcpStream::connect(addr).await?;
    client_handshake(&mut stream, auth_key).await?;
    write_frame(&mut stream, command.as_bytes()).await?;
    let response = read_frame(&mut stream).await?;
    String::from_utf8(response)
        .map_err(|_| GarageError::Protocol("response is not valid UTF-8".to_string()))
}
