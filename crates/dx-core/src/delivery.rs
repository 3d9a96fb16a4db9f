//! Delivery port.
//!
//! The pipeline hands every reportable event to a [`DeliveryGateway`] and only
//! observes whether the send succeeded. Transport, timeouts and status-code
//! handling belong to the implementation.

use async_trait::async_trait;
use thiserror::Error;

use crate::run::RunReference;

/// Errors a gateway reports back to the pipeline.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// The request never completed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The receiver answered with a non-success status.
    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The gateway is missing something it needs, e.g. a base URL.
    #[error("gateway not configured: {0}")]
    NotConfigured(String),
}

/// Sends one serialized event.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Deliver `payload` (a JSON object) produced for `run`.
    async fn send(&self, payload: &str, run: &RunReference) -> Result<(), DeliveryError>;
}
