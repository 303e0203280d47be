//! Key-range partitioning.
//!
//! The owning node of a record is the top `bits - 1` bits of the first key
//! byte, where `bits` is the bit length of the cluster size. Every node
//! computes this independently; there is no negotiation, so the function
//! must stay bit-exact across releases.
//!
//! Only the first key byte participates, so at most 8 partition bits are
//! available. Cluster sizes whose width would exceed that (512 nodes or
//! more) have no partitioner at all, rather than a silently clamped one.

use crate::record::KEY_LEN;
use crate::topology::NodeId;

/// Widest partition supported: one key byte.
pub const MAX_PARTITION_BITS: u32 = 8;

/// Largest cluster whose partition width fits in one key byte.
pub const MAX_CLUSTER_SIZE: usize = (1 << (MAX_PARTITION_BITS + 1)) - 1;

/// Number of binary digits needed to represent `cluster_size`.
///
/// 1 → 1, 3 → 2, 4..=7 → 3, 8 → 4.
pub fn cluster_bits(cluster_size: usize) -> u32 {
    let mut bits = 0;
    let mut n = cluster_size;
    while n > 0 {
        n >>= 1;
        bits += 1;
    }
    bits
}

/// Owning node for `key` in a cluster of `cluster_size` nodes, or `None`
/// if no partitioner exists for that size.
pub fn destination(key: &[u8; KEY_LEN], cluster_size: usize) -> Option<NodeId> {
    Partitioner::for_cluster(cluster_size).map(|p| p.destination(key))
}

/// Partitioner with the width precomputed for a fixed cluster size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
    width: u32,
}

impl Partitioner {
    /// `None` for an empty cluster or one wider than [`MAX_CLUSTER_SIZE`].
    pub fn for_cluster(cluster_size: usize) -> Option<Self> {
        if cluster_size == 0 || cluster_size > MAX_CLUSTER_SIZE {
            return None;
        }
        Some(Self {
            width: cluster_bits(cluster_size) - 1,
        })
    }

    /// Number of key bits used for routing.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of distinct destinations, `2^width`.
    pub fn partition_count(&self) -> u32 {
        1 << self.width
    }

    pub fn destination(&self, key: &[u8; KEY_LEN]) -> NodeId {
        // u32 shift: a width of 0 shifts the byte out entirely
        NodeId::from(key[0]) >> (8 - self.width)
    }
}
