//! Error types for wechat-inbox.
//!
//! Malformed inbound payloads are deliberately NOT represented here: the
//! normalizer reports them as a [`Rejected`](crate::normalize::Rejected)
//! outcome that still gets acknowledged, because the inbound channel treats
//! error responses as a request to redeliver.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Store-related errors. Write failures must reach the caller — silently
/// dropping a message is worse than a visible failure the platform can retry.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read table {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write table {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Outbound push errors.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Token endpoint rejected credentials: errcode {errcode}: {errmsg}")]
    TokenDenied { errcode: i64, errmsg: String },

    #[error("Platform rejected message for {openid}: errcode {errcode}: {errmsg}")]
    SendDenied {
        openid: String,
        errcode: i64,
        errmsg: String,
    },
}
