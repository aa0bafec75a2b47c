//! Shared account, state-delta, revision, and error types used by the
//! storage pool, MPT engine, and execution pipeline crates.

mod account;
mod cache;
mod errors;
mod revision;

pub use account::{
    Account, AccountDelta, Code, Incarnation, StateDelta, StorageDelta, StorageValue,
    EMPTY_CODE_HASH,
};
pub use cache::ShardedLru;
pub use errors::{BlockError, DecodeError, TxnError};
pub use revision::Revision;
