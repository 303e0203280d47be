//! The single ordered channel between the network layer and the aggregator.
//!
//! Connection handlers and the local shard scan are the producers; the
//! aggregator is the only consumer, and therefore the only task that ever
//! touches the inbound buffer or the completion set.

use tokio::sync::mpsc;

use netsort_core::Record;

use crate::termination::Completion;

/// One unit of work for the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A data record owned by this node.
    Record(Record),
    /// A node has finished sending.
    Done(Completion),
}

pub type InboundTx = mpsc::UnboundedSender<Inbound>;
pub type InboundRx = mpsc::UnboundedReceiver<Inbound>;

pub fn handoff_channel() -> (InboundTx, InboundRx) {
    mpsc::unbounded_channel()
}
