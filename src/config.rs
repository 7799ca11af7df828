use crate::error::{AppError, Result};

/// Chain poll cadence for the reconciler (seconds).
pub const POLL_INTERVAL_SECS: u64 = 5;

/// Horizontal drag distance that arms or commits a side (client px).
pub const SWIPE_THRESHOLD_PX: f64 = 80.0;

/// Upward drag distance that skips a card (client px).
pub const SWIPE_UP_THRESHOLD_PX: f64 = 150.0;

/// Two taps closer together than this count as a double tap (ms).
pub const DOUBLE_TAP_WINDOW_MS: u64 = 300;

/// The stake token uses the standard 18 decimals.
pub const TOKEN_DECIMALS: u32 = 18;

/// In-memory activity history cap; the oldest entries roll off past this.
pub const HISTORY_CAP: usize = 500;

/// Broadcast capacity for card-list updates fanned out to deck sessions.
pub const CARD_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Public base URL used to derive manifest asset links (PUBLIC_BASE_URL).
    pub public_base_url: String,
    /// JSON-RPC endpoint of the chain hosting the market contract (RPC_URL).
    pub rpc_url: String,
    /// Chain id for transaction signing (CHAIN_ID).
    pub chain_id: u64,
    /// Hex private key of the staking wallet (STAKER_PRIVATE_KEY).
    pub staker_private_key: String,
    /// Deployed prediction-market contract address (CONTRACT_ADDRESS).
    pub contract_address: String,
    /// Object storage REST endpoint, service key and bucket for question photos.
    pub storage_url: String,
    pub storage_key: String,
    pub storage_bucket: String,
    /// Bearer token authorizing moderation and the submission bypass (ADMIN_TOKEN).
    /// The client-supplied admin flag is only honored together with this token.
    pub admin_token: String,
    /// Bound on every transaction-confirmation wait (CONFIRM_TIMEOUT_SECS).
    pub confirm_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "predictions.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            rpc_url: std::env::var("RPC_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8545".to_string()),
            chain_id: std::env::var("CHAIN_ID")
                .unwrap_or_else(|_| "31337".to_string())
                .parse::<u64>()
                .map_err(|_| AppError::Config("CHAIN_ID must be a number".to_string()))?,
            staker_private_key: required("STAKER_PRIVATE_KEY")?,
            contract_address: required("CONTRACT_ADDRESS")?,
            storage_url: required("STORAGE_URL")?,
            storage_key: required("STORAGE_KEY")?,
            storage_bucket: std::env::var("STORAGE_BUCKET")
                .unwrap_or_else(|_| "question-photos".to_string()),
            admin_token: required("ADMIN_TOKEN")?,
            confirm_timeout_secs: std::env::var("CONFIRM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse::<u64>()
                .map_err(|_| AppError::Config("CONFIRM_TIMEOUT_SECS must be a number".to_string()))?,
        })
    }
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| AppError::Config(format!("{name} must be set")))
}
