//! Exchange of a confirmed payment for the decrypted prompt.

use alloy::primitives::{Address, TxHash};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::http::{build_client, endpoint, error_message};
use crate::resource::{PaymentProof, UnlockedContent};
use crate::GateError;

/// Trades a [`PaymentProof`] for the prompt text.
///
/// The remote side validates the transaction on-chain and rejects replays;
/// callers must only hand over proofs whose transaction is final.
pub trait ContentUnlocker: Send + Sync {
    fn unlock(
        &self,
        proof: &PaymentProof,
    ) -> impl std::future::Future<Output = Result<UnlockedContent, GateError>> + Send;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnlockRequest<'a> {
    prompt_id: &'a str,
    wallet_address: Address,
    tx_hash: TxHash,
}

#[derive(Deserialize)]
struct UnlockResponse {
    prompt: String,
}

/// `POST /api/use-prompt` client.
pub struct HttpContentUnlocker {
    http: reqwest::Client,
    base_url: String,
}

impl HttpContentUnlocker {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GateError> {
        Ok(Self {
            http: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }

    /// Create an unlocker with a custom reqwest::Client.
    pub fn with_http_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

impl ContentUnlocker for HttpContentUnlocker {
    async fn unlock(&self, proof: &PaymentProof) -> Result<UnlockedContent, GateError> {
        let url = endpoint(&self.base_url, "/api/use-prompt");
        let body = UnlockRequest {
            prompt_id: &proof.prompt_id,
            wallet_address: proof.wallet_address,
            tx_hash: proof.tx_hash,
        };

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GateError::UnlockExchange(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let message = error_message(resp, "Failed to load prompt").await;
            tracing::warn!(
                prompt_id = %proof.prompt_id,
                tx = %proof.tx_hash,
                %status,
                "unlock rejected"
            );
            return Err(GateError::UnlockExchange(message));
        }

        let parsed: UnlockResponse = resp
            .json()
            .await
            .map_err(|e| GateError::UnlockExchange(format!("invalid unlock response: {e}")))?;

        tracing::info!(prompt_id = %proof.prompt_id, "prompt loaded");
        Ok(UnlockedContent::new(parsed.prompt))
    }
}
