//! Payment-gated prompt unlock for Filecoin Calibration.
//!
//! A buyer pays a prompt's owner in tFIL, waits for the transfer to become
//! final, trades the transaction hash for the decrypted prompt, and then uses
//! that prompt with images picked from a gallery to request a generated image.
//!
//! # Components
//!
//! - [`ChainGuard`]: makes sure the wallet is on the required network
//! - [`PaymentSubmitter`]: broadcasts the value transfer to the owner
//! - [`ConfirmationWatcher`]: bounded wait for transaction finality
//! - [`ContentUnlocker`]: exchanges the confirmed payment for the prompt
//! - [`GenerationOrchestrator`]: runs generation once the prompt is unlocked
//! - [`PaymentGate`]: the state machine sequencing all of the above
//!
//! # Quick example
//!
//! ```no_run
//! use alloy::signers::local::PrivateKeySigner;
//! use crafture_gate::{
//!     EvmWallet, GateConfig, HttpArtifactGenerator, HttpContentUnlocker, PaymentGate, Resource,
//! };
//!
//! # async fn run(resource: Resource) -> Result<(), Box<dyn std::error::Error>> {
//! let config = GateConfig::from_env()?;
//! let signer: PrivateKeySigner = "0xYOUR_KEY".parse()?;
//! let wallet = EvmWallet::connect(signer, config.chain.rpc_url.parse()?).await?;
//! let unlocker = HttpContentUnlocker::new(&config.api_url, config.http_timeout)?;
//! let generator = HttpArtifactGenerator::new(&config.api_url, config.generation_timeout)?;
//!
//! let gate = PaymentGate::new(resource, wallet, unlocker, generator, &config);
//! gate.start();
//! let mut status = gate.subscribe();
//! status.wait_for(|s| s.is_ready() || s.is_error()).await?;
//! # Ok(())
//! # }
//! ```

pub mod amount;
pub mod catalog;
pub mod chain_guard;
pub mod config;
pub mod constants;
pub mod error;
pub mod evm_wallet;
pub mod gate;
pub mod generation;
pub mod http;
pub mod ledger;
pub mod resource;
pub mod submitter;
pub mod unlocker;
pub mod wallet;
pub mod watcher;

// Re-exports
pub use catalog::{CatalogClient, ImageUpload, NewPrompt};
pub use chain_guard::{ChainGuard, NetworkCheck};
pub use config::GateConfig;
pub use constants::*;
pub use error::GateError;
pub use evm_wallet::EvmWallet;
pub use gate::{transition, FailureStage, GateEvent, GateState, PaymentGate};
pub use generation::{ArtifactGenerator, GenerationOrchestrator, HttpArtifactGenerator};
pub use ledger::FinalityLedger;
pub use resource::*;
pub use submitter::PaymentSubmitter;
pub use unlocker::{ContentUnlocker, HttpContentUnlocker};
pub use wallet::{Finality, WalletProvider};
pub use watcher::ConfirmationWatcher;
