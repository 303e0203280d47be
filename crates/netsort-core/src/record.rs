//! Fixed-width sort records.
//!
//! A record is exactly 100 bytes: a 10-byte key followed by a 90-byte
//! payload that is carried verbatim and never inspected.

use std::cmp::Ordering;
use std::fmt;

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// Total record size in bytes.
pub const RECORD_LEN: usize = 100;

/// Leading bytes of a record that form its sort key.
pub const KEY_LEN: usize = 10;

/// Opaque trailing bytes.
pub const PAYLOAD_LEN: usize = RECORD_LEN - KEY_LEN;

/// One record of the dataset being sorted.
#[derive(Clone, PartialEq, Eq, Hash, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct Record {
    /// Compared unsigned, most significant byte first.
    pub key: [u8; KEY_LEN],
    pub payload: [u8; PAYLOAD_LEN],
}

assert_eq_size!(Record, [u8; RECORD_LEN]);

impl Record {
    pub fn new(key: [u8; KEY_LEN], payload: [u8; PAYLOAD_LEN]) -> Self {
        Self { key, payload }
    }

    /// Interpret exactly `RECORD_LEN` bytes as a record.
    /// Returns None for any other length.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Self::read_from(bytes)
    }

    pub fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    /// Total order used by the sorter. Payload never participates, so two
    /// records with identical keys compare equal.
    pub fn cmp_key(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record {{ key: ")?;
        for b in self.key {
            write!(f, "{b:02x}")?;
        }
        write!(f, ", payload: {} bytes }}", PAYLOAD_LEN)
    }
}
