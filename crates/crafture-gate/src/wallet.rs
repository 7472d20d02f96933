//! Wallet/chain capability consumed by the payment gate.
//!
//! The gate never reaches for ambient wallet state: everything it needs is
//! injected through [`WalletProvider`]. [`crate::evm_wallet::EvmWallet`] is
//! the alloy-backed implementation; tests substitute in-memory doubles.

use crate::GateError;
use alloy::primitives::{Address, TxHash, U256};

/// Final outcome of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finality {
    Confirmed,
    Failed(String),
}

/// Wallet and chain operations the payment workflow depends on.
pub trait WalletProvider: Send + Sync {
    /// Address that signs and pays.
    fn address(&self) -> Address;

    /// Chain ID the wallet is currently connected to.
    fn current_network_id(&self) -> u64;

    /// Ask the wallet to move to `chain_id`.
    fn switch_network(
        &self,
        chain_id: u64,
    ) -> impl std::future::Future<Output = Result<(), GateError>> + Send;

    /// Broadcast a native value transfer. Returns the transaction hash once
    /// the wallet has accepted and submitted it.
    fn send_payment(
        &self,
        to: Address,
        value: U256,
    ) -> impl std::future::Future<Output = Result<TxHash, GateError>> + Send;

    /// Resolve once `tx` is final (mined successfully) or has failed.
    fn await_finality(
        &self,
        tx: TxHash,
    ) -> impl std::future::Future<Output = Result<Finality, GateError>> + Send;
}
