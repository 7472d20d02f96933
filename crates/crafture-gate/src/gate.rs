//! The payment gate: a single-flight, observable state machine that pays for
//! a resource, waits for finality, and unlocks the prompt.
//!
//! ```text
//! Idle ──start──▶ SwitchingNetwork ──▶ AwaitingSignature ──▶ ConfirmingPayment ──▶ Paid ──▶ Idle(ready)
//!   │                    │                     │                     │               │
//!   └─(network ok)───────┴──▶ AwaitingSignature└──────────────▶ Error(reason) ◀──────┘
//! ```
//!
//! State changes go through the pure [`transition`] function and are published
//! on a `watch` channel; presentation code subscribes instead of owning logic.

use alloy::primitives::{Address, TxHash};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::chain_guard::ChainGuard;
use crate::config::GateConfig;
use crate::generation::{ArtifactGenerator, GenerationOrchestrator};
use crate::ledger::FinalityLedger;
use crate::resource::{
    Asset, GeneratedArtifact, PaymentProof, Resource, SelectionSet, UnlockedContent,
};
use crate::submitter::PaymentSubmitter;
use crate::unlocker::ContentUnlocker;
use crate::wallet::{Finality, WalletProvider};
use crate::watcher::ConfirmationWatcher;
use crate::GateError;

/// Which step of the workflow an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    SwitchNetwork,
    Payment,
    Confirmation,
    Unlock,
}

impl FailureStage {
    pub fn reason(&self) -> &'static str {
        match self {
            FailureStage::SwitchNetwork => "switch network",
            FailureStage::Payment => "payment failed",
            FailureStage::Confirmation => "confirmation failed",
            FailureStage::Unlock => "unlock failed",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    /// Waiting for `start()`. `ready` means the prompt is unlocked: payment
    /// is closed for this session and generation is enabled.
    Idle { ready: bool },
    SwitchingNetwork,
    AwaitingSignature,
    ConfirmingPayment { tx: TxHash },
    Paid { tx: TxHash },
    Error { stage: FailureStage, detail: String },
}

impl GateState {
    pub fn is_ready(&self) -> bool {
        matches!(self, GateState::Idle { ready: true })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, GateState::Error { .. })
    }

    /// `Error(reason)` of the state table, if any.
    pub fn error_reason(&self) -> Option<&'static str> {
        match self {
            GateState::Error { stage, .. } => Some(stage.reason()),
            _ => None,
        }
    }

    /// Progress caption for in-flight states.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            GateState::SwitchingNetwork => Some("Switching Network..."),
            GateState::AwaitingSignature => Some("Waiting for Wallet..."),
            GateState::ConfirmingPayment { .. } => Some("Confirming Payment..."),
            GateState::Paid { .. } => Some("Loading Prompt..."),
            GateState::Idle { .. } | GateState::Error { .. } => None,
        }
    }
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateState::Idle { ready: false } => f.write_str("idle"),
            GateState::Idle { ready: true } => f.write_str("idle (ready)"),
            GateState::SwitchingNetwork => f.write_str("switching network"),
            GateState::AwaitingSignature => f.write_str("awaiting signature"),
            GateState::ConfirmingPayment { tx } => write!(f, "confirming {tx}"),
            GateState::Paid { tx } => write!(f, "paid {tx}"),
            GateState::Error { stage, detail } => write!(f, "error ({stage}): {detail}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    Start { on_required_network: bool },
    NetworkSwitched,
    NetworkSwitchFailed(String),
    PaymentSubmitted(TxHash),
    PaymentFailed(String),
    Finalized(TxHash),
    FinalityFailed { tx: TxHash, reason: String },
    Unlocked,
    UnlockFailed(String),
    Dismiss,
}

/// Pure transition function. `None` means the event does not apply in
/// `state` and must be ignored.
pub fn transition(state: &GateState, event: &GateEvent) -> Option<GateState> {
    use GateEvent as E;
    use GateState as S;

    let error = |stage, detail: &String| S::Error {
        stage,
        detail: detail.clone(),
    };

    match (state, event) {
        (S::Idle { ready: false }, E::Start { on_required_network }) => Some(
            if *on_required_network {
                S::AwaitingSignature
            } else {
                S::SwitchingNetwork
            },
        ),
        (S::SwitchingNetwork, E::NetworkSwitched) => Some(S::AwaitingSignature),
        (S::SwitchingNetwork, E::NetworkSwitchFailed(d)) => {
            Some(error(FailureStage::SwitchNetwork, d))
        }
        (S::AwaitingSignature, E::PaymentSubmitted(tx)) => {
            Some(S::ConfirmingPayment { tx: *tx })
        }
        (S::AwaitingSignature, E::PaymentFailed(d)) => Some(error(FailureStage::Payment, d)),
        (S::ConfirmingPayment { tx: pending }, E::Finalized(tx)) if pending == tx => {
            Some(S::Paid { tx: *tx })
        }
        (S::ConfirmingPayment { tx: pending }, E::FinalityFailed { tx, reason }) if pending == tx => {
            Some(error(FailureStage::Confirmation, reason))
        }
        (S::Paid { .. }, E::Unlocked) => Some(S::Idle { ready: true }),
        (S::Paid { .. }, E::UnlockFailed(d)) => Some(error(FailureStage::Unlock, d)),
        // Errors only happen before the prompt is unlocked.
        (S::Error { .. }, E::Dismiss) => Some(S::Idle { ready: false }),
        _ => None,
    }
}

struct Session {
    state: GateState,
    content: Option<UnlockedContent>,
    selection: SelectionSet,
    task: Option<JoinHandle<()>>,
    closed: bool,
}

struct Shared<W, U, G> {
    resource: Resource,
    wallet: W,
    unlocker: U,
    orchestrator: GenerationOrchestrator<G>,
    guard: ChainGuard,
    submitter: PaymentSubmitter,
    watcher: ConfirmationWatcher,
    ledger: FinalityLedger,
    session: Mutex<Session>,
    status: watch::Sender<GateState>,
}

/// Payment gate for one resource and one session.
///
/// Dropping the gate (or calling [`PaymentGate::close`]) aborts any payment
/// task still in flight; late events never touch a closed session.
pub struct PaymentGate<W, U, G> {
    shared: Arc<Shared<W, U, G>>,
}

impl<W, U, G> PaymentGate<W, U, G>
where
    W: WalletProvider + 'static,
    U: ContentUnlocker + 'static,
    G: ArtifactGenerator + 'static,
{
    pub fn new(resource: Resource, wallet: W, unlocker: U, generator: G, config: &GateConfig) -> Self {
        let initial = GateState::Idle { ready: false };
        let (status, _) = watch::channel(initial.clone());

        Self {
            shared: Arc::new(Shared {
                resource,
                wallet,
                unlocker,
                orchestrator: GenerationOrchestrator::new(generator),
                guard: ChainGuard::new(config.chain.chain_id, config.chain.network.clone()),
                submitter: PaymentSubmitter::new(config.chain.decimals),
                watcher: ConfirmationWatcher::new(config.confirmation_timeout),
                ledger: FinalityLedger::new(),
                session: Mutex::new(Session {
                    state: initial,
                    content: None,
                    selection: SelectionSet::default(),
                    task: None,
                    closed: false,
                }),
                status,
            }),
        }
    }

    /// Begin paying for the resource.
    ///
    /// No-op (returns `false`) unless the gate is idle and the prompt is not
    /// yet unlocked, so at most one payment is ever in flight. Must be called
    /// from within a Tokio runtime.
    pub fn start(&self) -> bool {
        let shared = &self.shared;
        let mut session = shared.lock();

        let on_required_network = shared.guard.is_satisfied(&shared.wallet);
        let event = GateEvent::Start {
            on_required_network,
        };
        if shared.apply_locked(&mut session, event).is_none() {
            tracing::debug!(state = %session.state, "start ignored");
            return false;
        }

        tracing::info!(
            prompt_id = %shared.resource.id,
            price = %shared.resource.price_in_tfil,
            on_required_network,
            "payment started"
        );

        let task = tokio::spawn(drive(Arc::clone(shared), !on_required_network));
        // A previous attempt may still be waiting on finality for its old hash.
        if let Some(previous) = session.task.replace(task) {
            previous.abort();
        }
        true
    }

    /// Clear an error and return to `Idle`. The selection is kept.
    pub fn dismiss(&self) -> bool {
        self.shared.apply(GateEvent::Dismiss).is_some()
    }

    /// Deliver a finality notification for `tx`.
    ///
    /// Safe to call any number of times for the same hash: only the first
    /// event for the transaction currently being confirmed has any effect,
    /// and the unlock call happens at most once.
    pub async fn deliver_finality(&self, tx: TxHash, finality: Finality) {
        self.shared.handle_finality(tx, finality).await;
    }

    /// Gallery change notification.
    pub fn on_selection_change(&self, assets: Vec<Asset>) {
        let mut session = self.shared.lock();
        session.selection = SelectionSet::new(assets);
        tracing::debug!(selected = session.selection.len(), "selection changed");
    }

    /// Generate an image from the unlocked prompt and the current selection.
    ///
    /// Failures are returned to the caller and leave the gate state alone.
    pub async fn generate(&self) -> Result<GeneratedArtifact, GateError> {
        let (content, selection) = {
            let session = self.shared.lock();
            (session.content.clone(), session.selection.clone())
        };
        self.shared
            .orchestrator
            .run(content.as_ref(), &selection, self.shared.wallet.address())
            .await
    }

    /// Generate with an explicit selection instead of the stored one.
    pub async fn generate_with(
        &self,
        selection: &SelectionSet,
    ) -> Result<GeneratedArtifact, GateError> {
        let content = self.shared.lock().content.clone();
        self.shared
            .orchestrator
            .run(content.as_ref(), selection, self.shared.wallet.address())
            .await
    }

    /// Abort outstanding work and freeze the session.
    pub fn close(&self) {
        let mut session = self.shared.lock();
        if session.closed {
            return;
        }
        session.closed = true;
        if let Some(task) = session.task.take() {
            task.abort();
        }
        tracing::debug!(prompt_id = %self.shared.resource.id, "payment gate closed");
    }

    pub fn state(&self) -> GateState {
        self.shared.lock().state.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GateState> {
        self.shared.status.subscribe()
    }

    pub fn resource(&self) -> &Resource {
        &self.shared.resource
    }

    pub fn wallet(&self) -> &W {
        &self.shared.wallet
    }

    pub fn unlocker(&self) -> &U {
        &self.shared.unlocker
    }

    pub fn generator(&self) -> &G {
        self.shared.orchestrator.generator()
    }

    pub fn requester(&self) -> Address {
        self.shared.wallet.address()
    }

    pub fn unlocked_content(&self) -> Option<UnlockedContent> {
        self.shared.lock().content.clone()
    }

    pub fn selection(&self) -> SelectionSet {
        self.shared.lock().selection.clone()
    }

    pub fn can_start(&self) -> bool {
        let session = self.shared.lock();
        !session.closed && session.state == GateState::Idle { ready: false }
    }

    pub fn can_generate(&self) -> bool {
        let session = self.shared.lock();
        session.content.is_some()
            && !session.selection.is_empty()
            && !self.shared.orchestrator.is_busy()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }
}

impl<W, U, G> Drop for PaymentGate<W, U, G> {
    fn drop(&mut self) {
        let mut session = self.shared.lock();
        session.closed = true;
        if let Some(task) = session.task.take() {
            task.abort();
        }
    }
}

impl<W, U, G> Shared<W, U, G> {
    fn lock(&self) -> MutexGuard<'_, Session> {
        match self.session.lock() {
            Ok(s) => s,
            Err(poisoned) => {
                tracing::error!("payment gate mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn apply(&self, event: GateEvent) -> Option<GateState> {
        let mut session = self.lock();
        self.apply_locked(&mut session, event)
    }

    fn apply_locked(&self, session: &mut Session, event: GateEvent) -> Option<GateState> {
        if session.closed {
            return None;
        }
        let Some(next) = transition(&session.state, &event) else {
            tracing::debug!(state = %session.state, ?event, "event ignored");
            return None;
        };
        tracing::debug!(from = %session.state, to = %next, "payment gate transition");
        session.state = next.clone();
        self.status.send_replace(next.clone());
        Some(next)
    }
}

impl<W, U, G> Shared<W, U, G>
where
    W: WalletProvider,
    U: ContentUnlocker,
{
    async fn handle_finality(&self, tx: TxHash, finality: Finality) {
        let proof = {
            let mut session = self.lock();
            if session.closed {
                return;
            }
            let confirming =
                matches!(session.state, GateState::ConfirmingPayment { tx: pending } if pending == tx);
            if !confirming {
                tracing::debug!(%tx, state = %session.state, "finality event for inactive transaction");
                return;
            }
            if !self.ledger.try_claim(tx) {
                tracing::debug!(%tx, "duplicate finality event");
                return;
            }

            match finality {
                Finality::Confirmed => {
                    self.apply_locked(&mut session, GateEvent::Finalized(tx));
                    PaymentProof {
                        wallet_address: self.wallet.address(),
                        tx_hash: tx,
                        prompt_id: self.resource.id.clone(),
                    }
                }
                Finality::Failed(reason) => {
                    tracing::warn!(%tx, %reason, "payment did not reach finality");
                    self.apply_locked(&mut session, GateEvent::FinalityFailed { tx, reason });
                    return;
                }
            }
        };

        tracing::info!(%tx, prompt_id = %proof.prompt_id, "payment confirmed, unlocking prompt");

        match self.unlocker.unlock(&proof).await {
            Ok(content) => {
                let mut session = self.lock();
                if session.closed {
                    return;
                }
                session.content = Some(content);
                self.apply_locked(&mut session, GateEvent::Unlocked);
            }
            Err(e) => {
                tracing::warn!(%tx, error = %e, "unlock failed");
                self.apply(GateEvent::UnlockFailed(e.to_string()));
            }
        }
    }
}

/// Payment task: network check, submission, finality, unlock.
async fn drive<W, U, G>(shared: Arc<Shared<W, U, G>>, switch_first: bool)
where
    W: WalletProvider,
    U: ContentUnlocker,
{
    if switch_first {
        match shared.guard.ensure(&shared.wallet).await {
            Ok(_) => {
                if shared.apply(GateEvent::NetworkSwitched).is_none() {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "network switch failed");
                shared.apply(GateEvent::NetworkSwitchFailed(e.to_string()));
                return;
            }
        }
    }

    let resource = &shared.resource;
    let submitted = match shared.submitter.amount_for(&resource.price_in_tfil) {
        Ok(amount) => {
            shared
                .submitter
                .submit(&shared.wallet, resource.owner_address, amount)
                .await
        }
        Err(e) => Err(e),
    };

    let tx = match submitted {
        Ok(tx) => tx,
        Err(e) => {
            tracing::warn!(error = %e, "payment failed");
            shared.apply(GateEvent::PaymentFailed(e.to_string()));
            return;
        }
    };

    if shared.apply(GateEvent::PaymentSubmitted(tx)).is_none() {
        return;
    }

    let finality = shared.watcher.watch(&shared.wallet, tx).await;
    shared.handle_finality(tx, finality).await;
}
