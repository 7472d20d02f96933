use std::time::Duration;

use alloy::primitives::TxHash;

use crate::wallet::{Finality, WalletProvider};

/// Waits for a submitted transaction to become final, bounded by a timeout.
///
/// Produces exactly one [`Finality`] per call. Deduplication of repeated
/// notifications for the same hash is the gate's job (see
/// [`crate::ledger::FinalityLedger`]).
#[derive(Debug, Clone)]
pub struct ConfirmationWatcher {
    timeout: Duration,
}

impl ConfirmationWatcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn watch<W: WalletProvider>(&self, wallet: &W, tx: TxHash) -> Finality {
        tracing::debug!(%tx, timeout_secs = self.timeout.as_secs(), "waiting for finality");

        match tokio::time::timeout(self.timeout, wallet.await_finality(tx)).await {
            Ok(Ok(finality)) => finality,
            Ok(Err(e)) => Finality::Failed(e.to_string()),
            Err(_) => {
                tracing::warn!(%tx, "finality wait timed out");
                Finality::Failed(format!(
                    "transaction not final after {}s",
                    self.timeout.as_secs()
                ))
            }
        }
    }
}
