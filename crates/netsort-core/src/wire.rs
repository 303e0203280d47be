//! netsort wire format.
//!
//! Every message between nodes is one 101-byte frame: a control byte
//! followed by a 100-byte record body. There is no other framing, no
//! length prefix and no version byte, so nothing in this module may change
//! size without breaking every peer.
//!
//! Frames are #[repr(C)] over byte arrays and use zerocopy derives for
//! allocation-free serialization.

use bytes::{Buf, BytesMut};
use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::record::{Record, RECORD_LEN};

/// Wire size of one frame.
pub const FRAME_LEN: usize = 1 + RECORD_LEN;

/// Written back by a receiver once a frame is queued for its aggregator.
/// A connection closed without it means the frame was not accepted.
pub const FRAME_ACK: u8 = 0x06;

// ── Frame ─────────────────────────────────────────────────────────────────────

/// The atomic unit of transport.
///
/// A receiver must assemble all 101 bytes before interpreting the control
/// byte. A short read is never a short frame.
#[derive(Clone, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct Frame {
    /// 0x00 = data record, 0x01 = sender finished. See [`Control`].
    pub control: u8,

    /// Data frames: the record, verbatim.
    /// Completion frames: all zero when sent, ignored when received.
    pub body: Record,
}

// Compile-time size guard. If this fails, the wire format has silently changed.
assert_eq_size!(Frame, [u8; FRAME_LEN]);

impl Frame {
    /// Wrap a record for transmission.
    pub fn data(record: Record) -> Self {
        Self {
            control: Control::Data.into(),
            body: record,
        }
    }

    /// Completion signal. Carries no identity; receivers only count them.
    pub fn done() -> Self {
        Self {
            control: Control::Done.into(),
            body: Record::new_zeroed(),
        }
    }

    /// Interpret exactly `FRAME_LEN` bytes. Does not look at the control byte.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        Self::read_from(bytes).ok_or(WireError::BadLength(bytes.len()))
    }

    /// Classify by control byte.
    pub fn classify(self) -> Result<Message, WireError> {
        match Control::try_from(self.control)? {
            Control::Data => Ok(Message::Record(self.body)),
            Control::Done => Ok(Message::Done),
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("control", &self.control)
            .field("body", &self.body)
            .finish()
    }
}

/// A classified frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Record(Record),
    Done,
}

// ── Control ───────────────────────────────────────────────────────────────────

/// Frame control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Control {
    /// A data record follows.
    Data = 0x00,
    /// The sender has no more records for this receiver.
    Done = 0x01,
}

impl TryFrom<u8> for Control {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Control::Data),
            0x01 => Ok(Control::Done),
            other => Err(WireError::UnknownControl(other)),
        }
    }
}

impl From<Control> for u8 {
    fn from(c: Control) -> u8 {
        c as u8
    }
}

// ── Assembler ─────────────────────────────────────────────────────────────────

/// Accumulates stream bytes and yields whole frames only.
///
/// TCP may split a frame across any number of reads, or pack several frames
/// into one read. Bytes are buffered until a full frame is available.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buf: BytesMut,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(FRAME_LEN),
        }
    }

    /// Append bytes as received from the stream.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Pop the next complete frame, if one is buffered.
    pub fn next_frame(&mut self) -> Option<Frame> {
        if self.buf.len() < FRAME_LEN {
            return None;
        }
        let frame = Frame::read_from(&self.buf[..FRAME_LEN]);
        self.buf.advance(FRAME_LEN);
        frame
    }

    /// Bytes held that do not yet form a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Called at end of stream. Leftover bytes mean the peer closed
    /// mid-frame.
    pub fn finish(self) -> Result<(), WireError> {
        match self.buf.len() {
            0 => Ok(()),
            n => Err(WireError::TruncatedFrame(n)),
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("unknown control byte: 0x{0:02x}")]
    UnknownControl(u8),

    #[error("frame must be {} bytes, got {0}", FRAME_LEN)]
    BadLength(usize),

    #[error("stream ended with {0} bytes of an incomplete frame")]
    TruncatedFrame(usize),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
