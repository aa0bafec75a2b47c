//! Adapts a [`TxOverlay`] to the [`Host`] trait the EVM collaborator calls
//! back into.

use alloy_primitives::{Address, Bytes, B256, U256};

use crate::evm::Host;
use crate::state::{StateReader, TxOverlay};
use crate::transaction::Log;

pub struct OverlayHost<'a, S> {
    pub overlay: &'a mut TxOverlay<S>,
    pub logs: Vec<Log>,
    pub destructed: Vec<(Address, Address)>,
}

impl<'a, S: StateReader> OverlayHost<'a, S> {
    pub fn new(overlay: &'a mut TxOverlay<S>) -> Self {
        Self { overlay, logs: Vec::new(), destructed: Vec::new() }
    }
}

impl<'a, S: StateReader> Host for OverlayHost<'a, S> {
    fn balance(&mut self, address: Address) -> U256 {
        self.overlay.read_account(address).balance
    }

    fn nonce(&mut self, address: Address) -> u64 {
        self.overlay.read_account(address).nonce
    }

    fn code(&mut self, _address: Address) -> Bytes {
        // Code lookup goes through the caller's code store keyed by
        // `code_hash`, not modeled here; the collaborator resolves it.
        Bytes::new()
    }

    fn storage(&mut self, address: Address, key: B256) -> U256 {
        self.overlay.read_storage(address, key)
    }

    fn set_storage(&mut self, address: Address, key: B256, value: U256) {
        self.overlay.write_storage(address, key, value);
    }

    fn set_balance(&mut self, address: Address, value: U256) {
        let mut account = self.overlay.read_account(address);
        account.balance = value;
        self.overlay.write_account(address, account);
    }

    fn set_nonce(&mut self, address: Address, value: u64) {
        let mut account = self.overlay.read_account(address);
        account.nonce = value;
        self.overlay.write_account(address, account);
    }

    fn access_account(&mut self, address: Address) {
        let _ = self.overlay.read_account(address);
    }

    fn access_storage(&mut self, address: Address, key: B256) {
        let _ = self.overlay.read_storage(address, key);
    }

    fn emit_log(&mut self, address: Address, topics: Vec<B256>, data: Bytes) {
        self.logs.push(Log { address, topics, data });
    }

    fn selfdestruct(&mut self, address: Address, beneficiary: Address) {
        self.destructed.push((address, beneficiary));
    }
}

pub fn move_balance(overlay: &mut TxOverlay<impl StateReader>, from: Address, to: Address, amount: U256) {
    let mut from_account = overlay.read_account(from);
    from_account.balance -= amount;
    overlay.write_account(from, from_account);

    let mut to_account = overlay.read_account(to);
    to_account.balance += amount;
    overlay.write_account(to, to_account);
}

pub fn add_balance(overlay: &mut TxOverlay<impl StateReader>, address: Address, amount: U256) {
    let mut account = overlay.read_account(address);
    account.balance += amount;
    overlay.write_account(address, account);
}

pub fn subtract_balance(overlay: &mut TxOverlay<impl StateReader>, address: Address, amount: U256) {
    let mut account = overlay.read_account(address);
    account.balance -= amount;
    overlay.write_account(address, account);
}
