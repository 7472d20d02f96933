//! Shared plumbing for the remote prompt/generation API.

use serde::Deserialize;
use std::time::Duration;

use crate::GateError;

/// Build a client with an explicit timeout and redirects disabled.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, GateError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    Ok(client)
}

/// Join an API base URL and a path, tolerating a trailing slash on the base.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{path}", base_url.trim_end_matches('/'))
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Extract `{message}` from a non-2xx response, or fall back to `fallback`
/// when the body is missing, not JSON, or has no message.
pub async fn error_message(resp: reqwest::Response, fallback: &str) -> String {
    let status = resp.status();
    let message = resp
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty());

    tracing::debug!(%status, has_message = message.is_some(), "remote call failed");
    message.unwrap_or_else(|| fallback.to_string())
}
