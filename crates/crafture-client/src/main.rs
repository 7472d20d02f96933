use std::time::Duration;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use chrono::Utc;
use tracing_subscriber::prelude::*;
use url::Url;

use crafture_gate::{
    Asset, EvmWallet, GateConfig, GateState, HttpArtifactGenerator, HttpContentUnlocker,
    PaymentGate, Price, Resource,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn required(name: &str) -> Result<String, BoxError> {
    std::env::var(name).map_err(|_| format!("{name} must be set").into())
}

/// Resource to pay for, described by PROMPT_ID / PROMPT_OWNER / PROMPT_PRICE.
fn resource_from_env() -> Result<Resource, BoxError> {
    let owner: Address = required("PROMPT_OWNER")?
        .parse()
        .map_err(|e| format!("invalid PROMPT_OWNER: {e}"))?;

    Ok(Resource {
        id: required("PROMPT_ID")?,
        owner_address: owner,
        price_in_tfil: Price::new(required("PROMPT_PRICE")?),
        before_image_url: None,
        after_image_url: None,
        created_at: Utc::now(),
    })
}

/// Gallery selection from a comma-separated IMAGE_URLS list.
fn selection_from_env() -> Vec<Asset> {
    std::env::var("IMAGE_URLS")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .enumerate()
        .map(|(i, url)| Asset::new(format!("image-{i}"), url))
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GateConfig::from_env()?;
    let resource = resource_from_env()?;

    let signer: PrivateKeySigner = required("EVM_PRIVATE_KEY")?
        .parse()
        .map_err(|e| format!("invalid EVM_PRIVATE_KEY: {e}"))?;

    let required_rpc: Url = config.chain.rpc_url.parse()?;
    // The wallet may start on another network; the gate switches it over.
    let initial_rpc: Url = match std::env::var("WALLET_RPC_URL") {
        Ok(url) => url.parse()?,
        Err(_) => required_rpc.clone(),
    };

    let wallet = EvmWallet::connect(signer, initial_rpc)
        .await?
        .with_network(config.chain.chain_id, required_rpc);
    let unlocker = HttpContentUnlocker::new(&config.api_url, config.http_timeout)?;
    let generator = HttpArtifactGenerator::new(&config.api_url, config.generation_timeout)?;

    tracing::info!(
        prompt_id = %resource.id,
        price = %resource.pay_label(),
        owner = %resource.short_owner(),
        api = %config.api_url,
        "crafture client starting"
    );

    let gate = PaymentGate::new(resource, wallet, unlocker, generator, &config);
    gate.on_selection_change(selection_from_env());

    let mut status = gate.subscribe();
    if !gate.start() {
        return Err("payment could not be started".into());
    }

    // Finality is bounded by the watcher; the extra margin covers unlock.
    let deadline = config.confirmation_timeout + config.http_timeout + Duration::from_secs(30);
    let outcome = tokio::time::timeout(deadline, async {
        loop {
            let state = status.borrow_and_update().clone();
            if let Some(label) = state.label() {
                tracing::info!(%state, "{label}");
            }
            if let GateState::ConfirmingPayment { tx } = &state {
                tracing::info!(explorer = %config.chain.tx_url(tx), "payment submitted");
            }
            if state.is_ready() || state.is_error() {
                return Ok::<_, BoxError>(state);
            }
            status.changed().await?;
        }
    })
    .await??;

    if let Some(reason) = outcome.error_reason() {
        tracing::error!(%outcome, "payment gate stopped");
        gate.close();
        return Err(format!("{reason}: {outcome}").into());
    }

    tracing::info!("prompt unlocked");

    if gate.selection().is_empty() {
        tracing::info!("no IMAGE_URLS given, skipping generation");
    } else {
        let artifact = gate.generate().await?;
        println!("{}", artifact.image);
    }

    gate.close();
    Ok(())
}
