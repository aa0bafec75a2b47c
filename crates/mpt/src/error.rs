use monad_storage_pool::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum MptError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("path exceeds max nibble length: {0}")]
    PathTooLong(usize),
    #[error("key not found for copy_node source: {0:?}")]
    SourceNotFound(Vec<u8>),
    #[error("corrupt node: unrecognized ref tag {tag}")]
    CorruptNode { tag: u8 },
}

pub type Result<T> = std::result::Result<T, MptError>;
