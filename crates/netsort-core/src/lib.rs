//! netsort-core: shared types for the shuffle-and-sort data plane.
//! Records, the 101-byte wire frame, the partitioner, cluster topology and
//! runtime configuration. Every other netsort crate depends on this one.

pub mod config;
pub mod partition;
pub mod record;
pub mod topology;
pub mod wire;

pub use partition::{destination, Partitioner};
pub use record::{Record, KEY_LEN, PAYLOAD_LEN, RECORD_LEN};
pub use topology::{ClusterTopology, NodeAddr, NodeId};
pub use wire::{Control, Frame, FrameAssembler, Message, FRAME_ACK, FRAME_LEN};
