use crate::wallet::WalletProvider;
use crate::GateError;

/// Outcome of [`ChainGuard::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkCheck {
    /// The wallet was already on the required network; nothing was requested.
    AlreadyActive,
    /// A switch was requested and the wallet now reports the required network.
    Switched,
}

/// Makes sure the wallet is on the network payments must be made on.
#[derive(Debug, Clone)]
pub struct ChainGuard {
    required_chain_id: u64,
    network_name: String,
}

impl ChainGuard {
    pub fn new(required_chain_id: u64, network_name: impl Into<String>) -> Self {
        Self {
            required_chain_id,
            network_name: network_name.into(),
        }
    }

    pub fn required_chain_id(&self) -> u64 {
        self.required_chain_id
    }

    pub fn is_satisfied<W: WalletProvider>(&self, wallet: &W) -> bool {
        wallet.current_network_id() == self.required_chain_id
    }

    /// Switch the wallet to the required network if it is not there already.
    /// Never retries.
    pub async fn ensure<W: WalletProvider>(&self, wallet: &W) -> Result<NetworkCheck, GateError> {
        let current = wallet.current_network_id();
        if current == self.required_chain_id {
            return Ok(NetworkCheck::AlreadyActive);
        }

        tracing::info!(
            from = current,
            to = self.required_chain_id,
            "requesting network switch"
        );

        wallet
            .switch_network(self.required_chain_id)
            .await
            .map_err(|e| {
                GateError::NetworkSwitch(format!(
                    "Please switch to {} network: {e}",
                    self.network_name
                ))
            })?;

        let now = wallet.current_network_id();
        if now != self.required_chain_id {
            return Err(GateError::NetworkSwitch(format!(
                "wallet reports chain {now} after switching to {}",
                self.required_chain_id
            )));
        }

        Ok(NetworkCheck::Switched)
    }
}
