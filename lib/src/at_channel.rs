//! Byte-oriented request/response transport to the modem's AT control
//! device. Writes a command, then accumulates reads until the response is
//! terminated, without ever parsing response content.

use std::time::Duration;

use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{Instant, timeout};

const OK_TERMINATOR: &[u8] = b"OK\r\n";
const ERROR_TERMINATOR: &[u8] = b"ERROR\r\n";

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(2500);

#[derive(Error, Debug)]
pub enum AtChannelError {
    #[error("I/O error on AT channel: {0}")]
    Io(#[from] std::io::Error),
    #[error("AT channel closed while waiting for a response")]
    AbnormalEof,
    #[error("timed out waiting for a modem response")]
    Timeout,
    #[error("modem response never terminated with OK: {0:?}")]
    MalformedResponse(String),
}

/// One AT channel per modem control device. The tty is a single-consumer
/// resource; all exchanges for one modem must go through one instance.
pub struct AtChannel<T> {
    stream: T,
    read_timeout: Duration,
}

impl AtChannel<File> {
    /// Open the AT control device at `path` for read/write.
    pub async fn open(path: &str, read_timeout: Duration) -> Result<Self, AtChannelError> {
        let file = File::options().read(true).write(true).open(path).await?;
        Ok(AtChannel::new(file, read_timeout))
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AtChannel<T> {
    pub fn new(stream: T, read_timeout: Duration) -> Self {
        AtChannel {
            stream,
            read_timeout,
        }
    }

    /// Send `command` (terminator already included) and read until the
    /// accumulated response ends in `OK\r\n`. The total wait is bounded by
    /// the channel's read timeout; expiring with partial data means the
    /// response never terminated.
    pub async fn send_and_receive(&mut self, command: &str) -> Result<String, AtChannelError> {
        self.stream.write_all(command.as_bytes()).await?;
        self.stream.flush().await?;

        let deadline = Instant::now() + self.read_timeout;
        let mut response: Vec<u8> = Vec::with_capacity(256);
        let mut chunk = [0u8; 256];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let read = match timeout(remaining, self.stream.read(&mut chunk)).await {
                Ok(result) => result?,
                Err(_) => {
                    if response.is_empty() {
                        return Err(AtChannelError::Timeout);
                    }
                    return Err(AtChannelError::MalformedResponse(
                        String::from_utf8_lossy(&response).into_owned(),
                    ));
                }
            };
            if read == 0 {
                return Err(AtChannelError::AbnormalEof);
            }
            response.extend_from_slice(&chunk[..read]);
            // Only look at the tail once enough bytes have accumulated.
            if ends_with(&response, OK_TERMINATOR) {
                return Ok(String::from_utf8_lossy(&response).into_owned());
            }
            if ends_with(&response, ERROR_TERMINATOR) {
                return Err(AtChannelError::MalformedResponse(
                    String::from_utf8_lossy(&response).into_owned(),
                ));
            }
        }
    }

    /// Send a command that gets no reply (`AT+XLOG=4` and friends).
    pub async fn send_no_response(&mut self, command: &str) -> Result<(), AtChannelError> {
        self.stream.write_all(command.as_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

fn ends_with(buffer: &[u8], terminator: &[u8]) -> bool {
    buffer.len() >= terminator.len() && &buffer[buffer.len() - terminator.len()..] == terminator
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn terminator_split_across_reads() {
        let (local, mut remote) = duplex(64);
        let mut channel = AtChannel::new(local, DEFAULT_READ_TIMEOUT);
        let exchange = tokio::spawn(async move {
            let mut cmd = [0u8; 16];
            let n = remote.read(&mut cmd).await.unwrap();
            assert_eq!(&cmd[..n], b"AT+XSIO?\r\n");
            remote.write_all(b"+XSIO: 2, *4\r\n\r\nO").await.unwrap();
            remote.flush().await.unwrap();
            tokio::task::yield_now().await;
            remote.write_all(b"K\r\n").await.unwrap();
            remote
        });
        let response = channel.send_and_receive("AT+XSIO?\r\n").await.unwrap();
        assert!(response.contains("2, *4"));
        assert!(response.ends_with("OK\r\n"));
        exchange.await.unwrap();
    }

    #[tokio::test]
    async fn short_reads_never_panic() {
        // Fewer than 4 bytes accumulated must not index out of range.
        let (local, mut remote) = duplex(64);
        let mut channel = AtChannel::new(local, DEFAULT_READ_TIMEOUT);
        let exchange = tokio::spawn(async move {
            let mut cmd = [0u8; 16];
            remote.read(&mut cmd).await.unwrap();
            remote.write_all(b"O").await.unwrap();
            tokio::task::yield_now().await;
            remote.write_all(b"K\r\n").await.unwrap();
            remote
        });
        let response = channel.send_and_receive("AT\r\n").await.unwrap();
        assert_eq!(response, "OK\r\n");
        exchange.await.unwrap();
    }

    #[tokio::test]
    async fn error_response_is_malformed() {
        let (local, mut remote) = duplex(64);
        let mut channel = AtChannel::new(local, DEFAULT_READ_TIMEOUT);
        tokio::spawn(async move {
            let mut cmd = [0u8; 32];
            remote.read(&mut cmd).await.unwrap();
            remote.write_all(b"ERROR\r\n").await.unwrap();
            // Keep the remote end open so the failure is the terminator, not EOF.
            std::mem::forget(remote);
        });
        let err = channel.send_and_receive("AT+BOGUS\r\n").await.unwrap_err();
        assert!(matches!(err, AtChannelError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn eof_is_abnormal() {
        let (local, mut remote) = duplex(64);
        let mut channel = AtChannel::new(local, DEFAULT_READ_TIMEOUT);
        tokio::spawn(async move {
            let mut cmd = [0u8; 32];
            remote.read(&mut cmd).await.unwrap();
            drop(remote);
        });
        let err = channel.send_and_receive("AT\r\n").await.unwrap_err();
        assert!(matches!(err, AtChannelError::AbnormalEof));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_modem_times_out() {
        let (local, _remote) = duplex(64);
        let mut channel = AtChannel::new(local, Duration::from_millis(100));
        let err = channel.send_and_receive("AT\r\n").await.unwrap_err();
        assert!(matches!(err, AtChannelError::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn unterminated_response_is_malformed() {
        let (local, mut remote) = duplex(64);
        let mut channel = AtChannel::new(local, Duration::from_millis(100));
        tokio::spawn(async move {
            let mut cmd = [0u8; 32];
            remote.read(&mut cmd).await.unwrap();
            remote.write_all(b"+XSIO: 2, *4\r\n").await.unwrap();
            std::mem::forget(remote);
        });
        let err = channel.send_and_receive("AT+XSIO?\r\n").await.unwrap_err();
        match err {
            AtChannelError::MalformedResponse(partial) => assert!(partial.contains("2, *4")),
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }
}
