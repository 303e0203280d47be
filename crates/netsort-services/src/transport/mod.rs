//! Shuffle transport: the data plane between nodes.
//!
//! Every frame travels on its own TCP connection: connect, write 101 bytes,
//! half-close, read one ack byte. The receiver writes the ack only after
//! the frame is on the handoff channel, so a sender holding the ack knows
//! its frame is queued ahead of anything it sends next. A receiver that
//! rejects a frame closes without acking, and the sender abandons it.
//!
//! The ack flows receiver → sender only. Frames on the wire are unchanged,
//! and a peer that writes frames and never reads still interoperates.

pub mod listener;
pub mod sender;

pub use listener::{handle_connection, ConnectionError, FrameListener};
pub use sender::{AbandonReason, FrameSender, SendOutcome, TcpFrameSender};
