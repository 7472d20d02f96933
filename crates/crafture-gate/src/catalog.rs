//! Resource-creation boundary: publishing a new priced prompt.
//!
//! The gate never calls this; it exists so an authoring front-end can share
//! the same validation and HTTP plumbing.

use alloy::primitives::Address;
use reqwest::multipart::{Form, Part};
use std::time::Duration;

use crate::amount::to_base_units;
use crate::constants::NATIVE_DECIMALS;
use crate::http::{build_client, endpoint, error_message};
use crate::GateError;

/// An image attached to a new prompt as a before/after preview.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Form input for a new prompt.
#[derive(Debug, Clone)]
pub struct NewPrompt {
    pub prompt: String,
    pub price_in_tfil: String,
    pub owner_address: Address,
    pub before_image: Option<ImageUpload>,
    pub after_image: Option<ImageUpload>,
}

impl NewPrompt {
    /// Check the form before anything is sent.
    pub fn validate(&self) -> Result<(), GateError> {
        if self.prompt.trim().is_empty() {
            return Err(GateError::Validation("Please enter a prompt".to_string()));
        }
        if to_base_units(&self.price_in_tfil, NATIVE_DECIMALS).is_err() {
            return Err(GateError::Validation(
                "Please enter a valid price (0 or greater)".to_string(),
            ));
        }
        Ok(())
    }

    fn into_form(self) -> Result<Form, GateError> {
        let mut form = Form::new()
            .text("prompt", self.prompt.trim().to_string())
            .text("priceInTfil", self.price_in_tfil.trim().to_string())
            .text("ownerAddress", self.owner_address.to_string());

        if let Some(image) = self.before_image {
            form = form.part("beforeImage", image_part(image)?);
        }
        if let Some(image) = self.after_image {
            form = form.part("afterImage", image_part(image)?);
        }
        Ok(form)
    }
}

fn image_part(image: ImageUpload) -> Result<Part, GateError> {
    Ok(Part::bytes(image.bytes)
        .file_name(image.file_name)
        .mime_str(&image.mime_type)?)
}

/// `POST /api/create-prompt` client.
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GateError> {
        Ok(Self {
            http: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }

    /// Validate and publish `prompt`. Returns the created record as sent back
    /// by the catalog.
    pub async fn create_prompt(&self, prompt: NewPrompt) -> Result<serde_json::Value, GateError> {
        prompt.validate()?;

        let owner = prompt.owner_address;
        let url = endpoint(&self.base_url, "/api/create-prompt");
        let resp = self
            .http
            .post(&url)
            .multipart(prompt.into_form()?)
            .send()
            .await?;

        if !resp.status().is_success() {
            let message = error_message(resp, "Failed to create prompt").await;
            return Err(GateError::Validation(message));
        }

        let created: serde_json::Value = resp.json().await?;
        tracing::info!(%owner, "prompt created");
        Ok(created)
    }
}
