//! netsort-services: the shuffle-and-sort data plane.
//!
//! Transport (listener + sender), termination detection, the aggregator,
//! shard input, output sink, and the per-node driver that ties them together.

pub mod aggregator;
pub mod handoff;
pub mod node;
pub mod output;
pub mod shard;
pub mod termination;
pub mod transport;

pub use aggregator::{sort_records, AggregateError, Aggregator, SortedOutput};
pub use handoff::{handoff_channel, Inbound, InboundRx, InboundTx};
pub use node::{ShuffleNode, ShuffleReport};
pub use output::write_output;
pub use shard::ShardFile;
pub use termination::{Completion, Phase, TerminationDetector, TerminationError};
pub use transport::{
    AbandonReason, ConnectionError, FrameListener, FrameSender, SendOutcome, TcpFrameSender,
};
