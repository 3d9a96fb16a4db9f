//! Error taxonomy for DX run reporting.
//!
//! None of these escape the pipeline: every variant is produced by an
//! individually fault-tolerant step and downgraded to an empty value or a
//! default at the fallback boundary.

/// DX reporting errors.
#[derive(Debug, thiserror::Error)]
pub enum DxError {
    #[error("hostname unavailable: {0}")]
    HostnameUnavailable(String),

    #[error("environment unavailable: {0}")]
    Environment(String),

    #[error("user directory lookup failed for {user_id}: {reason}")]
    Directory { user_id: String, reason: String },

    #[error("mapping resource unavailable: {0}")]
    MappingResource(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for DX reporting operations.
pub type Result<T> = std::result::Result<T, DxError>;
