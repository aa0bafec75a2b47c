//! Block and transaction validation (§4.D.1-3).

mod block;
mod dynamic;
mod transaction;

pub use block::{compute_ommers_hash, static_validate_block, static_validate_header, NULL_LIST_HASH};
pub use dynamic::dynamic_validate_transaction;
pub use transaction::static_validate_transaction;
