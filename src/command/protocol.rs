//! Wire format for the command channel.
//!
//! Messages are length-prefixed frames: a big-endian `u32` length followed
//! by the payload. Before the single request/response exchange both sides
//! prove knowledge of the shared key with an HMAC-SHA256 challenge:
//!
//! ```text
//! server                                   client
//!   #CHALLENGE#<32 random bytes>  ───────►
//!                                 ◄───────  HMAC(key, challenge)
//!   #WELCOME# | #FAILURE#         ───────►
//!                                 ◄───────  #CHALLENGE#<32 random bytes>
//!   HMAC(key, challenge)          ───────►
//!                                 ◄───────  #WELCOME# | #FAILURE#
//! ```

use crate::error::{GarageError, Result};
use hmac_sha256::HMAC;
use log::trace;
use rand::Rng;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MAX_FRAME_LEN: usize = 64 * 1024;
pub const NONCE_LEN: usize = 32;
pub const DIGEST_LEN: usize = 32;

const CHALLENGE: &[u8] = b"#CHALLENGE#";
const WELCOME: &[u8] = b"#WELCOME#";
const FAILURE: &[u8] = b"#FAILURE#";

pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_LEN {
        return Err(GarageError::FrameTooLarge(payload.len()));
    }
    trace!("[TX] {} bytes", payload.len());
    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await? as usize;
    if len > MAX_FRAME_LEN {
        return Err(GarageError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    trace!("[RX] {} bytes", len);
    Ok(payload)
}

fn new_challenge() -> Vec<u8> {
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill(&mut nonce);
    let mut message = CHALLENGE.to_vec();
    message.extend_from_slice(&nonce);
    message
}

/// Send a challenge and check the peer's answer.
async fn deliver_challenge<S>(stream: &mut S, key: &[u8]) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let challenge = new_challenge();
    write_frame(stream, &challenge).await?;

    let answer = read_frame(stream).await?;
    let valid = <[u8; DIGEST_LEN]>::try_from(answer.as_slice())
        .map(|digest| HMAC::verify(&challenge, key, &digest))
        .unwrap_or(false);

    if valid {
        write_frame(stream, WELCOME).await
    } else {
        write_frame(stream, FAILURE).await?;
        Err(GarageError::AuthFailed("digest received was wrong".to_string()))
    }
}

/// Answer the peer's challenge and wait for its verdict.
async fn answer_challenge<S>(stream: &mut S, key: &[u8]) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let challenge = read_frame(stream).await?;
    if !challenge.starts_with(CHALLENGE) {
        return Err(GarageError::Protocol(
            "expected authentication challenge".to_string(),
        ));
    }
    write_frame(stream, &HMAC::mac(&challenge, key)).await?;

    let verdict = read_frame(stream).await?;
    if verdict == WELCOME {
        Ok(())
    } else {
        Err(GarageError::AuthFailed("peer rejected our digest".to_string()))
    }
}

/// Server side of the mutual handshake.
pub async fn server_handshake<S>(stream: &mut S, key: &[u8]) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    deliver_challenge(stream, key).await?;
    answer_challenge(stream, key).await
}

/// Client side of the mutual handshake.
pub async fn client_handshake<S>(stream: &mut S, key: &[u8]) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    answer_challenge(stream, key).await?;
    deliver_challenge(stream, key).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_frame_round_trip() {
        let (mut a, mut b) = duplex(1024);
        write_frame(&mut a, b"status").await.unwrap();
        write_frame(&mut a, b"").await.unwrap();
        assert_eq!(read_frame(&mut b).await.unwrap(), b"status");
        assert!(read_frame(&mut b).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut a, mut b) = duplex(1024);
        a.write_u32((MAX_FRAME_LEN + 1) as u32).await.unwrap();
        assert!(matches!(
            read_frame(&mut b).await,
            Err(GarageError::FrameTooLarge(_))
        ));

        let big = vec![0u8; MAX_FRAME_LEN + 1];
        assert!(matches!(
            write_frame(&mut a, &big).await,
            Err(GarageError::FrameTooLarge(_))
        ));
    }

    #[tokio::test]
    async fn test_handshake_with_matching_keys() {
        let (mut server, mut client) = duplex(1024);
        let server_task =
            tokio::spawn(async move { server_handshake(&mut server, b"secret password").await });

        assert_ok!(client_handshake(&mut client, b"secret password").await);
        assert_ok!(server_task.await.unwrap());
    }

    #[tokio::test]
    async fn test_handshake_with_wrong_key_fails_both_sides() {
        let (mut server, mut client) = duplex(1024);
        let server_task = tokio::spawn(async move { server_handshake(&mut server, b"right").await });

        let client_result = client_handshake(&mut client, b"wrong").await;
        assert!(matches!(client_result, Err(GarageError::AuthFailed(_))));
        assert!(matches!(
            server_task.await.unwrap(),
            Err(GarageError::AuthFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_answer_requires_challenge_prefix() {
        let (mut server, mut client) = duplex(1024);
        write_frame(&mut server, b"hello").await.unwrap();
        assert_err!(client_handshake(&mut client, b"key").await);
    }
}
