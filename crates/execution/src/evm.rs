//! The EVM call boundary. The interpreter itself is out of scope (Non-goals:
//! delegated to `revm`); this module defines the `Host`/`execute` interface
//! the pipeline calls across, grounded on `execute_transaction.cpp`'s
//! `EvmcHost`/`evmc::Result` shape but expressed as a Rust trait object
//! instead of a `evmc_host_interface` vtable.

use alloy_primitives::{Address, Bytes, B256, U256};
use monad_primitives::Revision;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Call,
    Create,
    Create2 { salt: B256 },
}

/// The call/create message passed to the collaborator, analogous to
/// `evmc_message` in `to_message<rev>` (execute_transaction.cpp).
#[derive(Debug, Clone)]
pub struct Message {
    pub kind: MessageKind,
    pub depth: u32,
    pub gas: u64,
    pub recipient: Address,
    pub sender: Address,
    pub input: Bytes,
    pub value: U256,
    pub code_address: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Success,
    Revert,
    OutOfGas,
    StackOverflow,
    InvalidInstruction,
    Failure,
}

/// The result of one EVM call (receipt-level outcome, not a `Result` error
/// per §7 "EVM exit codes ... are receipt-level outcomes, not errors").
#[derive(Debug, Clone)]
pub struct EvmOutput {
    pub status: StatusCode,
    pub gas_left: u64,
    pub gas_refund: u64,
    pub output_data: Bytes,
    pub created_address: Option<Address>,
}

impl EvmOutput {
    pub fn is_success(&self) -> bool {
        matches!(self.status, StatusCode::Success)
    }
}

/// State/environment surface the collaborator reads and mutates during a
/// call. The concrete implementation lives with the block-state overlay
/// (`crate::state`); this trait is the seam the EVM collaborator is
/// generic over.
pub trait Host {
    fn balance(&mut self, address: Address) -> U256;
    fn nonce(&mut self, address: Address) -> u64;
    fn code(&mut self, address: Address) -> Bytes;
    fn storage(&mut self, address: Address, key: B256) -> U256;
    fn set_storage(&mut self, address: Address, key: B256, value: U256);
    fn set_balance(&mut self, address: Address, value: U256);
    fn set_nonce(&mut self, address: Address, value: u64);
    fn access_account(&mut self, address: Address);
    fn access_storage(&mut self, address: Address, key: B256);
    fn emit_log(&mut self, address: Address, topics: Vec<B256>, data: Bytes);
    fn selfdestruct(&mut self, address: Address, beneficiary: Address);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EvmError {
    #[error("EVM collaborator returned a malformed result")]
    MalformedResult,
}

/// The collaborator boundary: `execute(rev, host, msg, code) -> Result`
/// (per Non-goals). A production build wires this to `revm`; tests and
/// replay tooling may supply a stub.
pub trait EvmCollaborator: Send + Sync {
    fn execute(&self, rev: Revision, host: &mut dyn Host, msg: &Message, code: &[u8]) -> Result<EvmOutput, EvmError>;
}
