//! Client error type

use thiserror::Error;

use crate::infrastructure::runtime::BridgeError;

#[derive(Debug, Error)]
pub enum Error {
    /// Error object returned by the backend or an edge
    #[error("{message}")]
    Api { message: String, code: i64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("connection closed")]
    Disconnected,

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("invalid time series: {0}")]
    Shape(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Classify a JSON-RPC error object as `Api`, message prefixed with its code
    pub fn api(code: i64, message: impl AsRef<str>) -> Self {
        Error::Api {
            message: format!("{}: {}", code, message.as_ref()),
            code,
        }
    }

    /// Numeric code of an `Api` error
    pub fn code(&self) -> Option<i64> {
        match self {
            Error::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
