use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("both free lists exhausted for zone {zone:?}")]
    FreeListExhausted { zone: crate::chunk::Zone },
    #[error("virtual offset {offset:?} has no mapping into a chunk")]
    Unmapped { offset: crate::offsets::VirtualOffset },
    #[error("read of {len} bytes at {offset:?} runs past the chunk boundary")]
    OutOfBounds { offset: crate::offsets::ChunkOffset, len: usize },
    #[error("write of {len} bytes exceeds WRITE_SIZE ({write_size})")]
    WriteTooLarge { len: usize, write_size: usize },
    #[error("metadata header is corrupt: {0}")]
    CorruptMetadata(String),
    #[error("chunk {chunk} referenced by live root {version} cannot be freed")]
    ChunkPinnedByHistory { chunk: u32, version: u64 },
}

pub type Result<T> = std::result::Result<T, StorageError>;
