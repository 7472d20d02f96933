use thiserror::Error;

/// Errors returned by payment gate operations.
///
/// Every external-call failure is mapped to one of these at the component
/// that issued the call. None of them are fatal to the process.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("network switch failed: {0}")]
    NetworkSwitch(String),

    #[error("wallet rejected the request: {0}")]
    WalletRejection(String),

    #[error("transaction failed: {0}")]
    TransactionFailure(String),

    #[error("confirmation failed: {0}")]
    Confirmation(String),

    #[error("unlock failed: {0}")]
    UnlockExchange(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("prompt is not unlocked yet")]
    ContentLocked,

    #[error("select at least one image")]
    EmptySelection,

    #[error("a generation request is already in flight")]
    GenerationInFlight,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GateError {
    /// True for the generation preconditions that are checked before any
    /// remote call is made.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            GateError::ContentLocked | GateError::EmptySelection | GateError::GenerationInFlight
        )
    }
}
