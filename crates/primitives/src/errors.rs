use thiserror::Error;

/// Recoverable at block granularity: the offending transaction is dropped
/// from the block and surfaced as a `TXN_REJECT` event, per §7.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxnError {
    #[error("sender could not be recovered from signature")]
    MissingSender,
    #[error("sender account has code (EIP-3607)")]
    SenderNotEoa,
    #[error("nonce mismatch: account has {account}, transaction has {txn}")]
    BadNonce { account: u64, txn: u64 },
    #[error("sender balance insufficient to cover gas_limit * gas_price + value")]
    InsufficientBalance,
    #[error("intrinsic gas {intrinsic} exceeds gas_limit {limit}")]
    IntrinsicGasGreaterThanLimit { intrinsic: u64, limit: u64 },
    #[error("max_fee_per_gas below block base_fee_per_gas")]
    MaxFeeLessThanBase,
    #[error("max_priority_fee_per_gas exceeds max_fee_per_gas")]
    PriorityFeeGreaterThanMax,
    #[error("transaction type not supported at this revision")]
    TypeNotSupported,
    #[error("transaction chain_id does not match configured chain")]
    WrongChainId,
    #[error("init code length exceeds 2 * MAX_CODE_SIZE")]
    InitCodeLimitExceeded,
    #[error("nonce at or above 2^64 - 1")]
    NonceExceedsMax,
}

/// Fatal for the containing block: the whole block is rejected, per §7.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("gas_limit above the protocol maximum")]
    GasAboveLimit,
    #[error("gas_limit outside [5000, 2^63) or diverges too far from parent")]
    InvalidGasLimit,
    #[error("extra_data longer than 32 bytes")]
    ExtraDataTooLong,
    #[error("ommers_hash does not match keccak(rlp(ommers))")]
    WrongOmmersHash,
    #[error("parent_hash does not match the parent header")]
    WrongParentHash,
    #[error("field {0} present before its activating fork")]
    FieldBeforeFork(&'static str),
    #[error("required field {0} missing for this revision")]
    MissingField(&'static str),
    #[error("proof-of-work header fields present after the Merge")]
    PowBlockAfterMerge,
    #[error("nonce nonzero post-Merge")]
    InvalidNonce,
    #[error("more than 2 ommers")]
    TooManyOmmers,
    #[error("duplicate ommer headers")]
    DuplicateOmmers,
    #[error("an ommer header failed standalone validation")]
    InvalidOmmerHeader,
    #[error("DAO fork extra_data mismatch")]
    WrongDaoExtraData,
    #[error("logs_bloom does not match computed value")]
    WrongLogsBloom,
    #[error("gas_used does not match computed value")]
    InvalidGasUsed,
    #[error("merkle root mismatch: {0}")]
    WrongMerkleRoot(&'static str),
}

/// Surfaced to the caller of the RLP/ABI codec boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("input too short")]
    InputTooShort,
    #[error("input too long")]
    InputTooLong,
    #[error("leading zero byte in canonical integer encoding")]
    LeadingZero,
    #[error("declared length does not match actual payload length")]
    LengthMismatch,
    #[error("unknown RLP/ABI type tag")]
    UnknownType,
}
