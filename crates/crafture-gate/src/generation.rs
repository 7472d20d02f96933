//! Image generation from an unlocked prompt and a gallery selection.

use alloy::primitives::Address;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::http::{build_client, endpoint, error_message};
use crate::resource::{GeneratedArtifact, GenerationRequest, SelectionSet, UnlockedContent};
use crate::GateError;

/// Remote generation backend.
pub trait ArtifactGenerator: Send + Sync {
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl std::future::Future<Output = Result<GeneratedArtifact, GateError>> + Send;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerationResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    generated_image: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// `POST /api/generate-image` client.
pub struct HttpArtifactGenerator {
    http: reqwest::Client,
    base_url: String,
}

impl HttpArtifactGenerator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GateError> {
        Ok(Self {
            http: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }

    pub fn with_http_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

impl ArtifactGenerator for HttpArtifactGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedArtifact, GateError> {
        let url = endpoint(&self.base_url, "/api/generate-image");

        let resp = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| GateError::Generation(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            let message = error_message(resp, "Failed to generate image").await;
            return Err(GateError::Generation(message));
        }

        let parsed: GenerationResponse = resp
            .json()
            .await
            .map_err(|e| GateError::Generation(format!("invalid generation response: {e}")))?;

        if !parsed.success {
            return Err(GateError::Generation(
                parsed
                    .message
                    .unwrap_or_else(|| "Generation failed".to_string()),
            ));
        }

        let image = parsed.generated_image.ok_or_else(|| {
            GateError::Generation("generation succeeded without an image".to_string())
        })?;

        Ok(GeneratedArtifact { image })
    }
}

/// Runs generation requests once their preconditions hold.
///
/// At most one request is in flight per orchestrator; a concurrent call is
/// refused with [`GateError::GenerationInFlight`]. Results are never cached.
pub struct GenerationOrchestrator<G> {
    generator: G,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the request resolves or is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<G: ArtifactGenerator> GenerationOrchestrator<G> {
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Generate an artifact from `content` and `selection`.
    ///
    /// Refused without a remote call when the prompt is still locked or the
    /// selection is empty.
    pub async fn run(
        &self,
        content: Option<&UnlockedContent>,
        selection: &SelectionSet,
        requester: Address,
    ) -> Result<GeneratedArtifact, GateError> {
        let content = content.ok_or(GateError::ContentLocked)?;
        if selection.is_empty() {
            return Err(GateError::EmptySelection);
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(GateError::GenerationInFlight);
        }
        let _guard = InFlight(&self.in_flight);

        tracing::info!(
            %requester,
            images = selection.len(),
            "starting custom prompt image generation"
        );

        let request = GenerationRequest::new(content, selection, requester);
        let result = self.generator.generate(&request).await;

        match &result {
            Ok(artifact) => tracing::info!(image = %artifact.image, "generation completed"),
            Err(e) => tracing::warn!(error = %e, "generation failed"),
        }
        result
    }
}
