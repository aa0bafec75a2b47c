//! Execution pipeline (component D): static/dynamic validation,
//! speculative per-transaction scheduling, post-block processing, event
//! emission, and the state-sync v1 frame codec.
//!
//! Grounded on `original_source/libs/execution/src/monad/execution/execute_transaction.cpp`
//! and `.../validate_block.cpp`, styled after `alpen-ee/sequencer`'s
//! handle/task/channel idiom.

mod evm;
mod events;
mod gas;
mod header;
mod host;
mod lifecycle;
mod postblock;
mod receipt;
mod schedule;
mod state;
mod statesync;
mod transaction;
mod validation;

pub use evm::{EvmCollaborator, EvmError, EvmOutput, Host, Message, MessageKind, StatusCode};
pub use events::{emit_block, EventType};
pub use gas::{block_award, calculate_txn_award, compute_gas_refund, gas_price, intrinsic_gas, BlockAward};
pub use header::{Block, BlockHeader, FieldPresence, Withdrawal};
pub use host::{add_balance, move_balance, subtract_balance, OverlayHost};
pub use lifecycle::{run_transaction, LifecycleConfig, TxnOutcome};
pub use postblock::{apply_block_award, apply_withdrawals, check_header_accounting, process_block};
pub use receipt::bloom_of;
pub use schedule::{execute_block, ScheduledOutcome};
pub use state::{AccessKey, BlockState, StateReader, TxOverlay};
pub use statesync::{decode_upsert, SyncRequest, Upsert, UpsertType};
pub use transaction::{AccessListEntry, AuthorizationEntry, Log, Receipt, Transaction, TxType};
pub use validation::{compute_ommers_hash, dynamic_validate_transaction, static_validate_block, static_validate_header, static_validate_transaction, NULL_LIST_HASH};
