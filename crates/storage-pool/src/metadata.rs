use serde::{Deserialize, Serialize};

use crate::chunk::{ChunkState, Zone};
use crate::offsets::ChunkOffset;

/// Current on-disk metadata format, bumped whenever the layout below
/// changes in a way old readers can't tolerate.
pub const METADATA_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkMetaRecord {
    pub insertion_count: u64,
    pub is_fast: bool,
    pub state: u8,
    pub next: u32,
}

impl ChunkMetaRecord {
    pub fn zone(&self) -> Zone {
        if self.is_fast {
            Zone::Fast
        } else {
            Zone::Slow
        }
    }

    pub fn state(&self) -> ChunkState {
        match self.state {
            0 => ChunkState::Free,
            1 => ChunkState::Active,
            _ => ChunkState::Sealed,
        }
    }
}

/// One entry in the `main` root chain: the chunk holding the MPT root
/// written at `block_number` (§6 "a linked list of `(block_number,
/// chunk_offset)` indexed by `block_number mod history_length`").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RootEntry {
    pub block_number: u64,
    pub root_chunk_offset: u64,
    pub min_offset_fast: u64,
    pub min_offset_slow: u64,
}

impl RootEntry {
    pub const EMPTY: Self = Self {
        block_number: u64::MAX,
        root_chunk_offset: 0,
        min_offset_fast: 0,
        min_offset_slow: 0,
    };
}

/// The fixed-size header persisted at the start of the pool's metadata
/// file (§6 "Persisted state layout").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbMetadata {
    pub format_version: u32,
    pub min_history_length: u32,
    pub fast_free_head: u32,
    pub fast_free_tail: u32,
    pub slow_free_head: u32,
    pub slow_free_tail: u32,
    pub chunks: Vec<ChunkMetaRecord>,
    pub root_chain: Vec<RootEntry>,
}

impl DbMetadata {
    pub fn new(chunk_count: u32, history_length: u32) -> Self {
        let mut chunks = Vec::with_capacity(chunk_count as usize);
        for i in 0..chunk_count {
            chunks.push(ChunkMetaRecord {
                insertion_count: 0,
                is_fast: i % 2 == 0,
                state: 0,
                next: if i + 1 < chunk_count { i + 1 } else { u32::MAX },
            });
        }
        let (fast_head, slow_head) = if chunk_count == 0 {
            (u32::MAX, u32::MAX)
        } else {
            (0, 1.min(chunk_count - 1))
        };
        Self {
            format_version: METADATA_FORMAT_VERSION,
            min_history_length: history_length,
            fast_free_head: fast_head,
            fast_free_tail: u32::MAX,
            slow_free_head: slow_head,
            slow_free_tail: u32::MAX,
            chunks,
            root_chain: vec![RootEntry::EMPTY; history_length as usize],
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).expect("DbMetadata is always serializable")
    }

    pub fn decode(bytes: &[u8]) -> crate::error::Result<Self> {
        let meta: Self = bincode::deserialize(bytes)
            .map_err(|e| crate::error::StorageError::CorruptMetadata(e.to_string()))?;
        if meta.format_version != METADATA_FORMAT_VERSION {
            return Err(crate::error::StorageError::CorruptMetadata(format!(
                "unsupported format version {}",
                meta.format_version
            )));
        }
        Ok(meta)
    }

    /// The root chain slot for `block_number`, per §6's `mod
    /// history_length` indexing.
    pub fn root_slot(&self, block_number: u64) -> usize {
        (block_number % self.min_history_length as u64) as usize
    }

    pub fn record_root(&mut self, entry: RootEntry) {
        let slot = self.root_slot(entry.block_number);
        self.root_chain[slot] = entry;
    }

    pub fn latest_root(&self) -> Option<&RootEntry> {
        self.root_chain
            .iter()
            .filter(|r| r.block_number != u64::MAX)
            .max_by_key(|r| r.block_number)
    }

    /// True if `chunk` is referenced by any root in
    /// `[version - min_history_length, version]` and therefore must not be
    /// freed by compaction (§4.B invariant).
    pub fn pinned_by_history(&self, chunk: &ChunkOffset, version: u64) -> bool {
        let floor = version.saturating_sub(self.min_history_length as u64);
        self.root_chain.iter().any(|r| {
            r.block_number != u64::MAX
                && r.block_number >= floor
                && r.block_number <= version
                && ChunkOffset::from_raw(r.root_chunk_offset).count() == chunk.count()
        })
    }
}
