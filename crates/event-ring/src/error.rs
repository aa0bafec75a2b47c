use thiserror::Error;

#[derive(Debug, Error)]
pub enum RingError {
    #[error("I/O error mapping ring file: {0}")]
    Io(#[from] std::io::Error),
    #[error("ring file size mismatch: expected {expected}, found {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("ring file path is not representable as a C string")]
    InvalidPath,
    #[error("descriptor_count_log2/payload_buf_log2 must be >= 12")]
    CapacityTooSmall,
    #[error("header magic/content_type/schema_hash did not match")]
    HeaderMismatch,
    #[error("payload_size {size} exceeds the 4 GiB reserve limit")]
    PayloadTooLarge { size: usize },
    #[error("payload_size {size} exceeds the ring's payload buffer capacity {capacity}")]
    PayloadExceedsBuffer { size: usize, capacity: usize },
}

pub type Result<T> = std::result::Result<T, RingError>;
