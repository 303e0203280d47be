//! Inbound frame listener.
//!
//! Accepts connections for the life of the node and hands each one to its
//! own task. A handler only ever forwards whole frames.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;

use netsort_core::wire::WireError;
use netsort_core::{FrameAssembler, Message, FRAME_ACK, FRAME_LEN};

use crate::handoff::{Inbound, InboundTx};
use crate::termination::Completion;

pub struct FrameListener {
    listener: TcpListener,
}

impl FrameListener {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to listen on {addr}"))?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("failed to read listener address")
    }

    /// Accept loop. Only returns if the task is aborted.
    pub async fn run(self, tx: InboundTx) {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(%addr, "frame listener started");
        }
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            };
            let tx = tx.clone();
            tokio::spawn(async move {
                match handle_connection(stream, tx).await {
                    Ok(frames) => tracing::trace!(%peer, frames, "connection finished"),
                    Err(ConnectionError::HandoffClosed) => {
                        tracing::warn!(%peer, "frame arrived after shuffle closed, rejected");
                    }
                    Err(e) => tracing::warn!(%peer, error = %e, "connection dropped"),
                }
            });
        }
    }
}

/// Read frames until EOF, forwarding each whole frame to the aggregator.
///
/// Each frame is acknowledged with [`FRAME_ACK`] once it is on the channel.
/// A rejected frame gets no ack; the connection is simply dropped. Returns
/// the number of frames forwarded.
pub async fn handle_connection<S>(mut stream: S, tx: InboundTx) -> Result<usize, ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut assembler = FrameAssembler::new();
    let mut buf = [0u8; FRAME_LEN];
    let mut forwarded = 0;
    // Peers that write and leave without reading make acks fail; stop then.
    let mut acking = true;

    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            assembler.finish()?;
            return Ok(forwarded);
        }
        assembler.extend(&buf[..n]);

        while let Some(frame) = assembler.next_frame() {
            let inbound = match frame.classify()? {
                Message::Record(record) => {
                    tracing::trace!(key = hex::encode(record.key), "record frame");
                    Inbound::Record(record)
                }
                Message::Done => {
                    tracing::debug!("completion frame");
                    Inbound::Done(Completion::Peer)
                }
            };
            tx.send(inbound).map_err(|_| ConnectionError::HandoffClosed)?;
            forwarded += 1;

            if acking {
                if let Err(e) = stream.write_all(&[FRAME_ACK]).await {
                    tracing::trace!(error = %e, "ack not written, peer gone");
                    acking = false;
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("aggregator no longer accepting frames")]
    HandoffClosed,
}
