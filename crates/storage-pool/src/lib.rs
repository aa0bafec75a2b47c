//! Async file-backed chunk storage with two append streams (component B):
//! fast (hot, aggressively compacted) and slow (bulk history).

mod chunk;
mod compactor;
mod error;
mod freelist;
mod metadata;
mod offsets;
mod pool;
mod write_buffer;

pub use chunk::{ChunkMeta, ChunkState, Zone};
pub use compactor::{spawn as spawn_compactor, CompactorHandle, RETENTION_WINDOW};
pub use error::{Result, StorageError};
pub use metadata::{ChunkMetaRecord, DbMetadata, RootEntry, METADATA_FORMAT_VERSION};
pub use offsets::{ChunkOffset, VirtualOffset, CHUNK_SIZE, MAX_CHUNKS};
pub use pool::StoragePool;
pub use write_buffer::{WriteBuffer, WRITE_SIZE};
