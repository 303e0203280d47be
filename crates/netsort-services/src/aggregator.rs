//! Aggregator & sorter.
//!
//! Drains the handoff channel until the termination detector closes, then
//! sorts the inbound buffer by key and hands back the concatenated output.

use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::AsBytes;

use netsort_core::{Record, RECORD_LEN};

use crate::handoff::{Inbound, InboundRx};
use crate::termination::{Completion, Phase, TerminationDetector};

pub struct Aggregator {
    rx: InboundRx,
    buffer: Vec<Record>,
    detector: TerminationDetector,
}

impl Aggregator {
    pub fn new(rx: InboundRx, detector: TerminationDetector) -> Self {
        Self {
            rx,
            buffer: Vec::new(),
            detector,
        }
    }

    /// Collect until every node has reported completion, then sort.
    ///
    /// There is no timeout: if a completion never arrives this waits forever.
    pub async fn run(mut self) -> Result<SortedOutput, AggregateError> {
        while !self.detector.is_closed() {
            let Some(msg) = self.rx.recv().await else {
                return Err(AggregateError::ChannelClosed {
                    peers_pending: self.detector.peers_pending(),
                    local_done: self.detector.local_done(),
                });
            };
            match msg {
                Inbound::Record(record) => self.buffer.push(record),
                Inbound::Done(from) => match self.detector.observe(from) {
                    Ok(Phase::Closed) => {
                        tracing::info!(?from, records = self.buffer.len(), "final completion received, shuffle closed");
                    }
                    Ok(Phase::Collecting) => {
                        tracing::debug!(
                            ?from,
                            peers_done = self.detector.peers_done(),
                            peers_pending = self.detector.peers_pending(),
                            local_done = self.detector.local_done(),
                            "completion received"
                        );
                    }
                    Err(e) => tracing::warn!(error = %e, "completion ignored"),
                },
            }
        }

        // Closed is terminal. Anything still queued arrived too late.
        self.rx.close();
        let mut rejected_late = 0;
        while let Ok(msg) = self.rx.try_recv() {
            rejected_late += 1;
            tracing::warn!(?msg, "message after shuffle closed, rejected");
        }

        sort_records(&mut self.buffer);
        Ok(SortedOutput {
            records: self.buffer,
            rejected_late,
        })
    }
}

/// Sort by the 10-byte key. Stable: equal keys keep arrival order, so
/// sorting an already sorted buffer leaves its bytes unchanged.
pub fn sort_records(records: &mut [Record]) {
    records.sort_by(Record::cmp_key);
}

/// The locally owned records, sorted.
#[derive(Debug, Clone)]
pub struct SortedOutput {
    records: Vec<Record>,
    rejected_late: usize,
}

impl SortedOutput {
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Messages dropped because they arrived after the shuffle closed.
    pub fn rejected_late(&self) -> usize {
        self.rejected_late
    }

    /// Records back to back, no header, no delimiters.
    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.records.len() * RECORD_LEN);
        for record in &self.records {
            out.put_slice(record.as_bytes());
        }
        out.freeze()
    }

    /// BLAKE3 of [`to_bytes`](Self::to_bytes), for comparing runs.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        for record in &self.records {
            hasher.update(record.as_bytes());
        }
        *hasher.finalize().as_bytes()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregateError {
    #[error("handoff channel closed with {peers_pending} peer completions outstanding (local done: {local_done})")]
    ChannelClosed { peers_pending: usize, local_done: bool },
}
