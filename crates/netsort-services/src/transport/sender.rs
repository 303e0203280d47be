//! Outbound frame delivery.
//!
//! One connection per frame. Connecting is retried a bounded number of
//! times with a fixed backoff; after that, or on any write failure, the
//! frame is abandoned. There is no delivery retry above this layer.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use zerocopy::AsBytes;

use netsort_core::config::ShuffleConfig;
use netsort_core::{Frame, NodeAddr, FRAME_ACK};

/// Result of one send attempt.
#[derive(Debug)]
pub enum SendOutcome {
    /// The receiver queued the frame and acknowledged it.
    Delivered,
    /// The frame was given up on. It will not be sent again.
    Abandoned(AbandonReason),
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AbandonReason {
    #[error("{addr} unreachable after {attempts} attempts: {source}")]
    Unreachable {
        addr: String,
        attempts: u32,
        source: std::io::Error,
    },
    #[error("write to {addr} failed: {source}")]
    WriteFailed {
        addr: String,
        source: std::io::Error,
    },
    #[error("{addr} did not confirm receipt: {source}")]
    Unconfirmed {
        addr: String,
        source: std::io::Error,
    },
}

/// Delivers frames to peers.
///
/// The shuffle driver is generic over this so tests can observe exactly
/// which frames would have gone over the network.
pub trait FrameSender: Send + Sync + 'static {
    fn send_frame(
        &self,
        dest: &NodeAddr,
        frame: Frame,
    ) -> impl Future<Output = SendOutcome> + Send;
}

/// TCP implementation of [`FrameSender`].
#[derive(Debug, Clone)]
pub struct TcpFrameSender {
    connect_retries: u32,
    retry_backoff: Duration,
}

impl TcpFrameSender {
    pub fn new(connect_retries: u32, retry_backoff: Duration) -> Self {
        Self {
            connect_retries: connect_retries.max(1),
            retry_backoff,
        }
    }

    pub fn from_config(config: &ShuffleConfig) -> Self {
        Self::new(config.connect_retries, config.retry_backoff())
    }

    async fn connect(&self, addr: &str) -> Result<TcpStream, AbandonReason> {
        let mut attempt = 1;
        loop {
            match TcpStream::connect(addr).await {
                Ok(stream) => return Ok(stream),
                Err(source) if attempt >= self.connect_retries => {
                    return Err(AbandonReason::Unreachable {
                        addr: addr.to_string(),
                        attempts: attempt,
                        source,
                    });
                }
                Err(e) => {
                    tracing::trace!(addr, attempt, error = %e, "connect failed, backing off");
                    attempt += 1;
                    tokio::time::sleep(self.retry_backoff).await;
                }
            }
        }
    }

    async fn deliver(&self, addr: String, frame: Frame) -> Result<(), AbandonReason> {
        let mut stream = self.connect(&addr).await?;

        let written = async {
            stream.write_all(frame.as_bytes()).await?;
            stream.shutdown().await
        }
        .await;
        if let Err(source) = written {
            return Err(AbandonReason::WriteFailed { addr, source });
        }

        // Receiver acks once the frame is on its handoff channel.
        let mut ack = [0u8; 1];
        let source = match stream.read(&mut ack).await {
            Ok(1) if ack[0] == FRAME_ACK => return Ok(()),
            Ok(0) => io::Error::new(io::ErrorKind::UnexpectedEof, "closed without ack"),
            Ok(_) => io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected ack byte 0x{:02x}", ack[0]),
            ),
            Err(e) => e,
        };
        Err(AbandonReason::Unconfirmed { addr, source })
    }
}

impl FrameSender for TcpFrameSender {
    async fn send_frame(&self, dest: &NodeAddr, frame: Frame) -> SendOutcome {
        match self.deliver(dest.address(), frame).await {
            Ok(()) => SendOutcome::Delivered,
            Err(reason) => SendOutcome::Abandoned(reason),
        }
    }
}
