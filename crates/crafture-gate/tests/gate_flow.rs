//! Payment gate scenarios against in-memory wallet and service doubles.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{Address, TxHash, U256};
use chrono::Utc;
use tokio::sync::Semaphore;

use crafture_gate::{
    ArtifactGenerator, Asset, ContentUnlocker, Finality, GateConfig, GateError, GateState,
    GeneratedArtifact, GenerationRequest, PaymentGate, PaymentProof, Price, Resource,
    SelectionSet, UnlockedContent, WalletProvider,
};

const REQUIRED_CHAIN: u64 = 314159;
const OTHER_CHAIN: u64 = 1;

fn tx_abc() -> TxHash {
    TxHash::left_padding_from(&[0x0a, 0xbc])
}

fn owner() -> Address {
    Address::with_last_byte(0x42)
}

fn buyer() -> Address {
    Address::with_last_byte(0x07)
}

fn resource(price: &str) -> Resource {
    Resource {
        id: "prompt-1".to_string(),
        owner_address: owner(),
        price_in_tfil: Price::new(price),
        before_image_url: None,
        after_image_url: None,
        created_at: Utc::now(),
    }
}

fn config() -> GateConfig {
    GateConfig {
        confirmation_timeout: Duration::from_secs(30),
        ..GateConfig::default()
    }
}

fn assets(n: usize) -> Vec<Asset> {
    (0..n)
        .map(|i| Asset::new(format!("nft-{i}"), format!("https://img.test/{i}.png")))
        .collect()
}

// --- doubles ---

#[derive(Clone, Copy)]
enum SendOutcome {
    Accept,
    Reject,
}

#[derive(Clone)]
enum FinalityOutcome {
    Confirm,
    Fail,
    Never,
}

struct MockWallet {
    chain_id: AtomicU64,
    switch_ok: bool,
    send: SendOutcome,
    finality: FinalityOutcome,
    hold_switch: Option<Arc<Semaphore>>,
    hold_send: Option<Arc<Semaphore>>,
    switch_calls: AtomicUsize,
    send_calls: AtomicUsize,
    sent: Mutex<Vec<(Address, U256)>>,
}

impl MockWallet {
    fn on_chain(chain_id: u64) -> Self {
        Self {
            chain_id: AtomicU64::new(chain_id),
            switch_ok: true,
            send: SendOutcome::Accept,
            finality: FinalityOutcome::Confirm,
            hold_switch: None,
            hold_send: None,
            switch_calls: AtomicUsize::new(0),
            send_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl WalletProvider for MockWallet {
    fn address(&self) -> Address {
        buyer()
    }

    fn current_network_id(&self) -> u64 {
        self.chain_id.load(Ordering::SeqCst)
    }

    async fn switch_network(&self, chain_id: u64) -> Result<(), GateError> {
        self.switch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hold) = &self.hold_switch {
            let _permit = hold.acquire().await;
        }
        if !self.switch_ok {
            return Err(GateError::NetworkSwitch("user declined".to_string()));
        }
        self.chain_id.store(chain_id, Ordering::SeqCst);
        Ok(())
    }

    async fn send_payment(&self, to: Address, value: U256) -> Result<TxHash, GateError> {
        let attempt = self.send_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hold) = &self.hold_send {
            let _permit = hold.acquire().await;
        }
        self.sent.lock().unwrap().push((to, value));
        match self.send {
            SendOutcome::Accept if attempt == 0 => Ok(tx_abc()),
            SendOutcome::Accept => Ok(TxHash::with_last_byte(attempt as u8)),
            SendOutcome::Reject => Err(GateError::WalletRejection(
                "User rejected the request".to_string(),
            )),
        }
    }

    async fn await_finality(&self, _tx: TxHash) -> Result<Finality, GateError> {
        match self.finality {
            FinalityOutcome::Confirm => Ok(Finality::Confirmed),
            FinalityOutcome::Fail => Ok(Finality::Failed("transaction reverted".to_string())),
            FinalityOutcome::Never => std::future::pending().await,
        }
    }
}

struct MockUnlocker {
    calls: AtomicUsize,
    fail: bool,
    proofs: Mutex<Vec<PaymentProof>>,
}

impl MockUnlocker {
    fn ok() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
            proofs: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::ok()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ContentUnlocker for MockUnlocker {
    async fn unlock(&self, proof: &PaymentProof) -> Result<UnlockedContent, GateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.proofs.lock().unwrap().push(proof.clone());
        tokio::task::yield_now().await;
        if self.fail {
            return Err(GateError::UnlockExchange("Failed to load prompt".to_string()));
        }
        Ok(UnlockedContent::new("Paint in watercolor style"))
    }
}

#[derive(Default)]
struct MockGenerator {
    requests: Mutex<Vec<(String, Vec<String>, Address)>>,
}

impl MockGenerator {
    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl ArtifactGenerator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedArtifact, GateError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push((
            request.prompt.clone(),
            request.image_urls.clone(),
            request.wallet_address,
        ));
        Ok(GeneratedArtifact {
            image: format!("https://cdn.test/generated-{}.png", requests.len()),
        })
    }
}

type Gate = PaymentGate<MockWallet, MockUnlocker, MockGenerator>;

fn gate(wallet: MockWallet, unlocker: MockUnlocker) -> Gate {
    PaymentGate::new(resource("5"), wallet, unlocker, MockGenerator::default(), &config())
}

async fn wait_until(gate: &Gate, pred: impl FnMut(&GateState) -> bool) -> GateState {
    let mut rx = gate.subscribe();
    let seen = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("timed out waiting for gate state")
        .expect("status channel closed");
    GateState::clone(&seen)
}

async fn settled(gate: &Gate) -> GateState {
    wait_until(gate, |s| s.is_ready() || s.is_error()).await
}

// --- payment flow ---

#[tokio::test]
async fn test_wrong_network_switches_then_submits() {
    let switch = Arc::new(Semaphore::new(0));
    let send = Arc::new(Semaphore::new(0));
    let wallet = MockWallet {
        hold_switch: Some(Arc::clone(&switch)),
        hold_send: Some(Arc::clone(&send)),
        finality: FinalityOutcome::Never,
        ..MockWallet::on_chain(OTHER_CHAIN)
    };
    let gate = gate(wallet, MockUnlocker::ok());

    assert!(gate.start());
    assert_eq!(gate.state(), GateState::SwitchingNetwork);

    switch.add_permits(1);
    wait_until(&gate, |s| *s == GateState::AwaitingSignature).await;
    assert_eq!(gate.wallet().current_network_id(), REQUIRED_CHAIN);
    assert_eq!(gate.wallet().switch_calls.load(Ordering::SeqCst), 1);

    send.add_permits(1);
    let state = wait_until(&gate, |s| matches!(s, GateState::ConfirmingPayment { .. })).await;
    assert_eq!(state, GateState::ConfirmingPayment { tx: tx_abc() });

    let sent = gate.wallet().sent.lock().unwrap().clone();
    let five_fil = U256::from(5u64) * U256::from(10u64).pow(U256::from(18u64));
    assert_eq!(sent, vec![(owner(), five_fil)]);
    assert_eq!(gate.unlocker().calls(), 0);
}

#[tokio::test]
async fn test_rejected_signature_then_dismiss_keeps_selection() {
    let wallet = MockWallet {
        send: SendOutcome::Reject,
        ..MockWallet::on_chain(REQUIRED_CHAIN)
    };
    let gate = gate(wallet, MockUnlocker::ok());
    gate.on_selection_change(assets(2));
    let before = gate.selection();

    assert!(gate.start());
    let state = settled(&gate).await;
    assert_eq!(state.error_reason(), Some("payment failed"));
    assert!(!gate.can_start());

    assert!(gate.dismiss());
    assert_eq!(gate.state(), GateState::Idle { ready: false });
    assert_eq!(gate.selection(), before);
    assert!(gate.can_start());
    assert_eq!(gate.unlocker().calls(), 0);
}

#[tokio::test]
async fn test_unlock_failure_keeps_generation_disabled() {
    let gate = gate(MockWallet::on_chain(REQUIRED_CHAIN), MockUnlocker::failing());
    gate.on_selection_change(assets(1));

    assert!(gate.start());
    let state = settled(&gate).await;

    assert_eq!(state.error_reason(), Some("unlock failed"));
    assert!(gate.unlocked_content().is_none());
    assert!(!gate.can_generate());

    let err = gate.generate().await.unwrap_err();
    assert!(matches!(err, GateError::ContentLocked));
    assert_eq!(gate.generator().calls(), 0);
    assert_eq!(gate.unlocker().calls(), 1);
}

#[tokio::test]
async fn test_unlock_then_two_independent_generations() {
    let gate = gate(MockWallet::on_chain(REQUIRED_CHAIN), MockUnlocker::ok());
    let picked = assets(2);
    gate.on_selection_change(picked.clone());

    assert!(gate.start());
    let state = settled(&gate).await;
    assert_eq!(state, GateState::Idle { ready: true });
    assert_eq!(
        gate.unlocked_content().map(|c| c.text().to_string()),
        Some("Paint in watercolor style".to_string())
    );

    let proof = gate.unlocker().proofs.lock().unwrap()[0].clone();
    assert_eq!(proof.tx_hash, tx_abc());
    assert_eq!(proof.wallet_address, buyer());
    assert_eq!(proof.prompt_id, "prompt-1");

    assert!(gate.can_generate());
    let first = gate.generate().await.unwrap();

    gate.on_selection_change(vec![picked[0].clone()]);
    let second = gate.generate().await.unwrap();

    assert_ne!(first, second);
    assert_eq!(gate.unlocker().calls(), 1);

    let requests = gate.generator().requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].0, "Paint in watercolor style");
    assert_eq!(requests[0].1.len(), 2);
    assert_eq!(requests[1].1, vec!["https://img.test/0.png".to_string()]);
    assert_eq!(requests[1].2, buyer());

    // Payment stays closed for the rest of the session.
    assert!(!gate.start());
}

// --- invariants ---

#[tokio::test]
async fn test_correct_network_never_switches() {
    let gate = gate(MockWallet::on_chain(REQUIRED_CHAIN), MockUnlocker::ok());

    assert!(gate.start());
    assert_eq!(gate.state(), GateState::AwaitingSignature);
    settled(&gate).await;

    assert_eq!(gate.wallet().switch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_start_twice_submits_once() {
    let gate = gate(MockWallet::on_chain(REQUIRED_CHAIN), MockUnlocker::ok());

    assert!(gate.start());
    assert!(!gate.start());
    settled(&gate).await;
    assert!(!gate.start());

    assert_eq!(gate.wallet().send_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_duplicate_finality_unlocks_once() {
    let wallet = MockWallet {
        finality: FinalityOutcome::Never,
        ..MockWallet::on_chain(REQUIRED_CHAIN)
    };
    let gate = gate(wallet, MockUnlocker::ok());

    assert!(gate.start());
    wait_until(&gate, |s| matches!(s, GateState::ConfirmingPayment { .. })).await;

    tokio::join!(
        gate.deliver_finality(tx_abc(), Finality::Confirmed),
        gate.deliver_finality(tx_abc(), Finality::Confirmed),
    );
    gate.deliver_finality(tx_abc(), Finality::Confirmed).await;

    assert!(gate.state().is_ready());
    assert_eq!(gate.unlocker().calls(), 1);
}

#[tokio::test]
async fn test_finality_for_unknown_tx_is_ignored() {
    let wallet = MockWallet {
        finality: FinalityOutcome::Never,
        ..MockWallet::on_chain(REQUIRED_CHAIN)
    };
    let gate = gate(wallet, MockUnlocker::ok());

    assert!(gate.start());
    wait_until(&gate, |s| matches!(s, GateState::ConfirmingPayment { .. })).await;

    gate.deliver_finality(TxHash::with_last_byte(0xff), Finality::Confirmed)
        .await;

    assert_eq!(gate.state(), GateState::ConfirmingPayment { tx: tx_abc() });
    assert_eq!(gate.unlocker().calls(), 0);
}

#[tokio::test]
async fn test_generation_preconditions_skip_remote_call() {
    let gate = gate(MockWallet::on_chain(REQUIRED_CHAIN), MockUnlocker::ok());

    // No content yet, selection present.
    gate.on_selection_change(assets(1));
    assert!(matches!(
        gate.generate().await,
        Err(GateError::ContentLocked)
    ));

    // Content present, selection empty.
    gate.start();
    settled(&gate).await;
    gate.on_selection_change(Vec::new());
    assert!(!gate.can_generate());
    assert!(matches!(
        gate.generate().await,
        Err(GateError::EmptySelection)
    ));

    assert_eq!(gate.generator().calls(), 0);
}

#[tokio::test]
async fn test_independent_selections_do_not_reunlock() {
    let gate = gate(MockWallet::on_chain(REQUIRED_CHAIN), MockUnlocker::ok());
    gate.start();
    settled(&gate).await;

    let all = assets(3);
    let a = gate
        .generate_with(&SelectionSet::new(all[..2].to_vec()))
        .await
        .unwrap();
    let b = gate
        .generate_with(&SelectionSet::new(all[2..].to_vec()))
        .await
        .unwrap();

    assert_ne!(a, b);
    assert_eq!(gate.generator().calls(), 2);
    assert_eq!(gate.unlocker().calls(), 1);
}

// --- failure paths ---

#[tokio::test]
async fn test_switch_failure_surfaces_error() {
    let wallet = MockWallet {
        switch_ok: false,
        ..MockWallet::on_chain(OTHER_CHAIN)
    };
    let gate = gate(wallet, MockUnlocker::ok());

    gate.start();
    let state = settled(&gate).await;

    assert_eq!(state.error_reason(), Some("switch network"));
    assert_eq!(gate.wallet().send_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_reverted_transaction_is_confirmation_failure() {
    let wallet = MockWallet {
        finality: FinalityOutcome::Fail,
        ..MockWallet::on_chain(REQUIRED_CHAIN)
    };
    let gate = gate(wallet, MockUnlocker::ok());

    gate.start();
    let state = settled(&gate).await;

    assert_eq!(state.error_reason(), Some("confirmation failed"));
    assert_eq!(gate.unlocker().calls(), 0);
}

#[tokio::test]
async fn test_finality_wait_is_bounded() {
    let wallet = MockWallet {
        finality: FinalityOutcome::Never,
        ..MockWallet::on_chain(REQUIRED_CHAIN)
    };
    let config = GateConfig {
        confirmation_timeout: Duration::from_millis(50),
        ..GateConfig::default()
    };
    let gate = PaymentGate::new(
        resource("5"),
        wallet,
        MockUnlocker::ok(),
        MockGenerator::default(),
        &config,
    );

    gate.start();
    let state = settled(&gate).await;

    assert_eq!(state.error_reason(), Some("confirmation failed"));
    assert_eq!(gate.unlocker().calls(), 0);
}

#[tokio::test]
async fn test_malformed_price_fails_without_sending() {
    let gate = PaymentGate::new(
        resource("1e-7"),
        MockWallet::on_chain(REQUIRED_CHAIN),
        MockUnlocker::ok(),
        MockGenerator::default(),
        &config(),
    );

    gate.start();
    let state = settled(&gate).await;

    assert_eq!(state.error_reason(), Some("payment failed"));
    assert_eq!(gate.wallet().send_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_confirmation_after_failed_finality_is_ignored() {
    let wallet = MockWallet {
        finality: FinalityOutcome::Never,
        ..MockWallet::on_chain(REQUIRED_CHAIN)
    };
    let gate = gate(wallet, MockUnlocker::ok());

    assert!(gate.start());
    wait_until(&gate, |s| matches!(s, GateState::ConfirmingPayment { .. })).await;

    gate.deliver_finality(tx_abc(), Finality::Failed("transaction reverted".to_string()))
        .await;
    assert_eq!(gate.state().error_reason(), Some("confirmation failed"));

    gate.deliver_finality(tx_abc(), Finality::Confirmed).await;

    assert_eq!(gate.state().error_reason(), Some("confirmation failed"));
    assert!(gate.unlocked_content().is_none());
    assert_eq!(gate.unlocker().calls(), 0);

    // A fresh attempt gets a new hash; the old one still never unlocks.
    assert!(gate.dismiss());
    assert!(gate.start());
    wait_until(&gate, |s| matches!(s, GateState::ConfirmingPayment { .. })).await;
    gate.deliver_finality(tx_abc(), Finality::Confirmed).await;

    assert!(matches!(gate.state(), GateState::ConfirmingPayment { tx } if tx != tx_abc()));
    assert_eq!(gate.unlocker().calls(), 0);
}

#[tokio::test]
async fn test_retry_after_dismiss_submits_again() {
    let wallet = MockWallet {
        finality: FinalityOutcome::Fail,
        ..MockWallet::on_chain(REQUIRED_CHAIN)
    };
    let gate = gate(wallet, MockUnlocker::ok());

    gate.start();
    settled(&gate).await;
    assert!(gate.dismiss());
    assert!(gate.start());
    settled(&gate).await;

    assert_eq!(gate.wallet().send_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_close_stops_the_session() {
    let send = Arc::new(Semaphore::new(0));
    let wallet = MockWallet {
        hold_send: Some(Arc::clone(&send)),
        ..MockWallet::on_chain(REQUIRED_CHAIN)
    };
    let gate = gate(wallet, MockUnlocker::ok());

    assert!(gate.start());
    tokio::task::yield_now().await;
    gate.close();
    send.add_permits(1);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(gate.is_closed());
    assert_eq!(gate.state(), GateState::AwaitingSignature);
    assert!(!gate.can_start());
    assert_eq!(gate.unlocker().calls(), 0);

    gate.deliver_finality(tx_abc(), Finality::Confirmed).await;
    assert_eq!(gate.unlocker().calls(), 0);
}
