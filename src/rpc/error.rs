use serde::Deserialize;
use thiserror::Error as ThisError;

/// Daemon still reading blocks; calls succeed once warmup finishes.
pub const RPC_IN_WARMUP: i32 = -28;
/// Returned for unknown transactions and missing spent-index entries.
pub const RPC_INVALID_ADDRESS_OR_KEY: i32 = -5;

#[derive(Deserialize, Debug)]
pub struct RpcErrorResponse {
    pub code: i32,
    pub message: String,
}

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("daemon RPC error (code {code}): {message}")]
    Rpc { code: i32, message: String },
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("transport failed: {0}")]
    Transport(String),
    #[error("JSON serialization/deserialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unexpected error: {0}")]
    Unexpected(String),
    #[error("Invalid header value error: {0}")]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
    #[error("hex decode failed: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("consensus decode failed: {0}")]
    Consensus(#[from] bitcoin::consensus::encode::Error),
    #[error("{0}")]
    Range(String),
    #[error("operation aborted, host is stopping")]
    Stopping,
}

impl Error {
    /// Numeric code of the daemon-side error, when there is one.
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Worth handing to the next backend: network-level failures and a
    /// daemon that is still warming up. Semantic RPC errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Rpc { code, .. } => *code == RPC_IN_WARMUP,
            Error::Http(_) | Error::Transport(_) => true,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Some(RPC_INVALID_ADDRESS_OR_KEY)
    }
}
