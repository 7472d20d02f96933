use alloy::primitives::TxHash;

/// Filecoin Calibration testnet chain ID.
pub const CALIBRATION_CHAIN_ID: u64 = 314159;

/// Human-readable name of the Calibration network.
pub const CALIBRATION_NETWORK: &str = "Filecoin Calibration";

/// Native currency symbol on Calibration.
pub const CURRENCY_SYMBOL: &str = "tFIL";

/// tFIL has 18 decimal places (attoFIL base unit).
pub const NATIVE_DECIMALS: u32 = 18;

/// Default public RPC endpoint for Calibration.
pub const RPC_URL: &str = "https://api.calibration.node.glif.io/rpc/v1";

/// Block explorer base URL.
pub const EXPLORER_BASE: &str = "https://calibration.filfox.info/en";

/// Default base URL of the prompt/generation API.
pub const DEFAULT_API_URL: &str = "https://crafture-topi.onrender.com";

/// Runtime chain configuration for the network payments must be made on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub network: String,
    pub currency_symbol: String,
    pub decimals: u32,
    pub rpc_url: String,
    pub explorer_base: String,
}

impl ChainConfig {
    /// Explorer link for a submitted transaction.
    pub fn tx_url(&self, tx: &TxHash) -> String {
        format!("{}/message/{tx}", self.explorer_base.trim_end_matches('/'))
    }
}

impl Default for ChainConfig {
    /// Defaults to Filecoin Calibration.
    fn default() -> Self {
        Self {
            chain_id: CALIBRATION_CHAIN_ID,
            network: CALIBRATION_NETWORK.to_string(),
            currency_symbol: CURRENCY_SYMBOL.to_string(),
            decimals: NATIVE_DECIMALS,
            rpc_url: RPC_URL.to_string(),
            explorer_base: EXPLORER_BASE.to_string(),
        }
    }
}
