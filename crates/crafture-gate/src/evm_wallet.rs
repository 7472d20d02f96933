//! Alloy-backed [`WalletProvider`] for a locally held signing key.
//!
//! The wallet keeps one RPC endpoint per known chain. "Switching network"
//! connects to the endpoint registered for the target chain and verifies
//! that it really serves that chain before making it active.

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::TransportError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use url::Url;

use crate::wallet::{Finality, WalletProvider};
use crate::GateError;

/// Receipt polling interval while waiting for finality.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(4);

pub struct EvmWallet {
    wallet: EthereumWallet,
    address: Address,
    networks: HashMap<u64, Url>,
    active: RwLock<DynProvider>,
    chain_id: AtomicU64,
    poll_interval: Duration,
}

impl EvmWallet {
    /// Connect to `rpc_url` and record which chain it serves.
    pub async fn connect(signer: PrivateKeySigner, rpc_url: Url) -> Result<Self, GateError> {
        let address = signer.address();
        let wallet = EthereumWallet::from(signer);
        let provider = build_provider(&wallet, rpc_url.clone());

        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| GateError::Config(format!("failed to read chain id from {rpc_url}: {e}")))?;

        tracing::info!(%address, chain_id, "wallet connected");

        let mut networks = HashMap::new();
        networks.insert(chain_id, rpc_url);

        Ok(Self {
            wallet,
            address,
            networks,
            active: RwLock::new(provider),
            chain_id: AtomicU64::new(chain_id),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Register an RPC endpoint the wallet may switch to.
    pub fn with_network(mut self, chain_id: u64, rpc_url: Url) -> Self {
        self.networks.insert(chain_id, rpc_url);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn provider(&self) -> DynProvider {
        match self.active.read() {
            Ok(p) => p.clone(),
            Err(poisoned) => {
                tracing::error!("wallet provider lock poisoned, recovering");
                poisoned.into_inner().clone()
            }
        }
    }

    fn set_provider(&self, provider: DynProvider, chain_id: u64) {
        let mut active = match self.active.write() {
            Ok(p) => p,
            Err(poisoned) => {
                tracing::error!("wallet provider lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        *active = provider;
        self.chain_id.store(chain_id, Ordering::Release);
    }
}

fn build_provider(wallet: &EthereumWallet, rpc_url: Url) -> DynProvider {
    ProviderBuilder::new()
        .wallet(wallet.clone())
        .connect_http(rpc_url)
        .erased()
}

/// EIP-1193 "user rejected request".
const USER_REJECTED_CODE: i64 = 4001;

/// Only an explicit JSON-RPC refusal counts as a wallet rejection; local
/// signing and transport failures are transaction failures.
fn classify_send_error(err: TransportError) -> GateError {
    match err.as_error_resp() {
        Some(payload) if payload.code == USER_REJECTED_CODE => {
            GateError::WalletRejection(payload.message.to_string())
        }
        _ => GateError::TransactionFailure(err.to_string()),
    }
}

impl WalletProvider for EvmWallet {
    fn address(&self) -> Address {
        self.address
    }

    fn current_network_id(&self) -> u64 {
        self.chain_id.load(Ordering::Acquire)
    }

    async fn switch_network(&self, chain_id: u64) -> Result<(), GateError> {
        let rpc_url = self.networks.get(&chain_id).cloned().ok_or_else(|| {
            GateError::NetworkSwitch(format!("no RPC endpoint configured for chain {chain_id}"))
        })?;

        let provider = build_provider(&self.wallet, rpc_url);
        let served = provider
            .get_chain_id()
            .await
            .map_err(|e| GateError::NetworkSwitch(format!("endpoint unreachable: {e}")))?;
        if served != chain_id {
            return Err(GateError::NetworkSwitch(format!(
                "endpoint for chain {chain_id} serves chain {served}"
            )));
        }

        self.set_provider(provider, chain_id);
        tracing::info!(chain_id, "switched network");
        Ok(())
    }

    async fn send_payment(&self, to: Address, value: U256) -> Result<TxHash, GateError> {
        let tx = TransactionRequest::default()
            .with_from(self.address)
            .with_to(to)
            .with_value(value);

        let pending = self
            .provider()
            .send_transaction(tx)
            .await
            .map_err(classify_send_error)?;

        Ok(*pending.tx_hash())
    }

    /// Poll for the receipt until it shows up.
    ///
    /// A failed lookup says nothing about the transaction, so it is logged
    /// and polled again; the caller's timeout bounds the wait.
    async fn await_finality(&self, tx: TxHash) -> Result<Finality, GateError> {
        let provider = self.provider();
        let mut failed_lookups = 0u32;
        loop {
            match provider.get_transaction_receipt(tx).await {
                Ok(Some(r)) if r.status() => return Ok(Finality::Confirmed),
                Ok(Some(_)) => return Ok(Finality::Failed("transaction reverted".to_string())),
                Ok(None) => {}
                Err(e) => {
                    failed_lookups += 1;
                    tracing::warn!(%tx, failed_lookups, error = %e, "receipt lookup failed, retrying");
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
