//! Local shard input.
//!
//! The shard file is memory-mapped and walked in 100-byte records. A
//! trailing fragment shorter than one record is not a record and is
//! skipped.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use memmap2::Mmap;

use netsort_core::{Record, RECORD_LEN};

pub struct ShardFile {
    path: PathBuf,
    // None for an empty file, which cannot be mapped.
    map: Option<Mmap>,
}

impl ShardFile {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = fs::File::open(&path)
            .with_context(|| format!("failed to open shard: {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("failed to stat shard: {}", path.display()))?
            .len();

        let map = if len == 0 {
            None
        } else {
            // Safety: opened read-only and never mutated through the map
            let mmap = unsafe {
                Mmap::map(&file)
                    .with_context(|| format!("failed to mmap shard: {}", path.display()))?
            };
            Some(mmap)
        };

        let shard = Self { path, map };
        if shard.trailing_bytes() > 0 {
            tracing::warn!(
                path = %shard.path.display(),
                trailing = shard.trailing_bytes(),
                "shard length is not a multiple of the record size, ignoring tail"
            );
        }
        Ok(shard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or_default()
    }

    pub fn record_count(&self) -> usize {
        self.bytes().len() / RECORD_LEN
    }

    pub fn trailing_bytes(&self) -> usize {
        self.bytes().len() % RECORD_LEN
    }

    /// Records in file order.
    pub fn records(&self) -> impl Iterator<Item = Record> + Send + '_ {
        self.bytes()
            .chunks_exact(RECORD_LEN)
            .filter_map(Record::from_bytes)
    }
}
