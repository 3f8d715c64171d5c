//! Email transport that hands messages to the local `sendmail`.

use super::EmailTransport;
use crate::error::{GarageError, Result};
use async_trait::async_trait;
use chrono::Local;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub const DEFAULT_SENDMAIL_PATH: &str = "/usr/sbin/sendmail";

#[derive(Debug, Clone)]
pub struct SendmailTransport {
    sendmail: PathBuf,
    from: String,
}

impl SendmailTransport {
    pub fn new(sendmail: impl Into<PathBuf>, from: impl Into<String>) -> Self {
        Self {
            sendmail: sendmail.into(),
            from: from.into(),
        }
    }

    /// Render an RFC 5322 message suitable for `sendmail -t`.
    pub fn compose(&self, recipient: &str, subject: &str, body: &str) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nDate: {}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}\r\n",
            self.from,
            recipient,
            subject.replace(['\r', '\n'], " "),
            Local::now().to_rfc2822(),
            body
        )
    }
}

#[async_trait]
impl EmailTransport for SendmailTransport {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        let message = self.compose(recipient, subject, body);

        let mut child = Command::new(&self.sendmail)
            .arg("-t")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(message.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(GarageError::Notification(format!(
                "sendmail exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_headers() {
        let transport = SendmailTransport::new(DEFAULT_SENDMAIL_PATH, "garage@example.com");
        let message = transport.compose("me@example.com", "Garage is\nopen", "Body text");

        assert!(message.starts_with("From: garage@example.com\r\nTo: me@example.com\r\n"));
        assert!(message.contains("Subject: Garage is open\r\n"));
        assert!(message.ends_with("\r\n\r\nBody text\r\n"));
    }

    #[tokio::test]
    async fn test_missing_sendmail_is_an_error() {
        let transport = SendmailTransport::new("/nonexistent/sendmail", "garage@example.com");
        let result = transport.send("me@example.com", "subject", "body").await;
        assert!(result.is_err());
    }
}
