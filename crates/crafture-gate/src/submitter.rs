use alloy::primitives::{Address, TxHash, U256};

use crate::amount::to_base_units;
use crate::resource::Price;
use crate::wallet::WalletProvider;
use crate::GateError;

/// Broadcasts the value transfer that pays for a resource.
///
/// One call is one outbound transfer. Failures are returned as-is; a new
/// payment needs a fresh `start()` on the gate.
#[derive(Debug, Clone)]
pub struct PaymentSubmitter {
    decimals: u32,
}

impl PaymentSubmitter {
    pub fn new(decimals: u32) -> Self {
        Self { decimals }
    }

    /// Convert a resource price into the chain's base unit.
    pub fn amount_for(&self, price: &Price) -> Result<U256, GateError> {
        to_base_units(price.as_str(), self.decimals)
    }

    pub async fn submit<W: WalletProvider>(
        &self,
        wallet: &W,
        to: Address,
        amount: U256,
    ) -> Result<TxHash, GateError> {
        tracing::info!(%to, %amount, "submitting payment");

        let tx = wallet.send_payment(to, amount).await.map_err(|e| match e {
            GateError::WalletRejection(_) | GateError::TransactionFailure(_) => e,
            other => GateError::TransactionFailure(other.to_string()),
        })?;

        tracing::info!(%tx, "payment accepted by wallet");
        Ok(tx)
    }
}
