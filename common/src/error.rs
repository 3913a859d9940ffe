// common/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Failures while assembling the runtime configuration
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("no canister id configured for {0}")]
    MissingCanisterId(&'static str),

    #[error("invalid canister id {id}: {reason}")]
    InvalidCanisterId {
        id: String,
        reason: String,
    },

    #[error("invalid url {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed canister_ids.json: {0}")]
    CanisterIds(#[from] serde_json::Error),
}
