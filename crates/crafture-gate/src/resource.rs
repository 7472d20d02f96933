//! Data model shared by the gate and its collaborators.

use alloy::primitives::{Address, TxHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::expand_exponent;
use crate::constants::CURRENCY_SYMBOL;

/// Decimal price as published by the prompt catalog.
///
/// The catalog sends prices as JSON numbers, older records as strings. Both
/// are kept as plain decimal text (numbers printed in exponent form are
/// expanded) so conversion to base units stays exact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PriceRepr", into = "String")]
pub struct Price(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum PriceRepr {
    Text(String),
    Number(serde_json::Number),
}

impl From<PriceRepr> for Price {
    fn from(repr: PriceRepr) -> Self {
        match repr {
            PriceRepr::Text(s) => Price(s.trim().to_string()),
            PriceRepr::Number(n) => Price(expand_exponent(&n.to_string())),
        }
    }
}

impl From<Price> for String {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl Price {
    pub fn new(decimal: impl Into<String>) -> Self {
        Price(decimal.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An owner-authored, price-gated prompt record. Read-only for the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub owner_address: Address,
    pub price_in_tfil: Price,
    #[serde(default)]
    pub before_image_url: Option<String>,
    #[serde(default)]
    pub after_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Resource {
    /// Caption for the pay button, e.g. `Pay 5 tFIL & Load Prompt`.
    pub fn pay_label(&self) -> String {
        format!("Pay {} {CURRENCY_SYMBOL} & Load Prompt", self.price_in_tfil)
    }

    /// Abbreviated owner address, e.g. `0x1234...abcd`.
    pub fn short_owner(&self) -> String {
        let full = self.owner_address.to_string();
        format!("{}...{}", &full[..6], &full[full.len() - 4..])
    }

    pub fn has_preview(&self) -> bool {
        self.before_image_url.is_some() || self.after_image_url.is_some()
    }
}

/// Evidence that payment for a resource was submitted.
///
/// Only valid for exchange once the transaction has reached finality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentProof {
    pub wallet_address: Address,
    pub tx_hash: TxHash,
    pub prompt_id: String,
}

/// Decrypted prompt text. Lives in session memory only.
///
/// `Debug` is redacted so the text cannot leak through logs.
#[derive(Clone, PartialEq, Eq)]
pub struct UnlockedContent(String);

impl UnlockedContent {
    pub fn new(text: impl Into<String>) -> Self {
        UnlockedContent(text.into())
    }

    pub fn text(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for UnlockedContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UnlockedContent(<{} bytes>)", self.0.len())
    }
}

/// An image asset offered by the gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub identifier: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub collection: String,
    pub image_url: String,
}

impl Asset {
    pub fn new(identifier: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: String::new(),
            description: String::new(),
            collection: String::new(),
            image_url: image_url.into(),
        }
    }
}

/// The user's current gallery selection, in selection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet(Vec<Asset>);

impl SelectionSet {
    pub fn new(assets: Vec<Asset>) -> Self {
        SelectionSet(assets)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn assets(&self) -> &[Asset] {
        &self.0
    }

    /// Source URLs in selection order.
    pub fn image_urls(&self) -> Vec<String> {
        self.0.iter().map(|a| a.image_url.clone()).collect()
    }
}

impl From<Vec<Asset>> for SelectionSet {
    fn from(assets: Vec<Asset>) -> Self {
        SelectionSet(assets)
    }
}

/// Wire body of `POST /api/generate-image`.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: String,
    pub image_urls: Vec<String>,
    pub wallet_address: Address,
    pub is_custom_prompt: bool,
}

impl GenerationRequest {
    pub fn new(content: &UnlockedContent, selection: &SelectionSet, requester: Address) -> Self {
        Self {
            prompt: content.text().to_string(),
            image_urls: selection.image_urls(),
            wallet_address: requester,
            is_custom_prompt: true,
        }
    }
}

/// Reference to a generated image (URL or data URI).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    pub image: String,
}
