//! HTTP delivery to the DX pipeline-runs endpoint.

use std::time::Duration;

use async_trait::async_trait;
use dx_core::{DeliveryError, DeliveryGateway, RunReference};
use tracing::{debug, info};
use uuid::Uuid;

/// Path appended to the configured base URL.
pub const SYNC_PATH: &str = "/api/pipelineRuns.sync";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts each event once to `{base_url}/api/pipelineRuns.sync`. No retries.
pub struct HttpDeliveryGateway {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpDeliveryGateway {
    pub fn new(base_url: &str) -> Result<Self, DeliveryError> {
        let endpoint = sync_endpoint(base_url)?;
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("dx-report/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        Ok(HttpDeliveryGateway {
            endpoint,
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Join the base URL and the sync path, tolerating a trailing slash.
pub fn sync_endpoint(base_url: &str) -> Result<String, DeliveryError> {
    let base = base_url.trim().trim_end_matches('/');
    if base.is_empty() {
        return Err(DeliveryError::NotConfigured("DX base URL is empty".to_string()));
    }
    Ok(format!("{base}{SYNC_PATH}"))
}

#[async_trait]
impl DeliveryGateway for HttpDeliveryGateway {
    async fn send(&self, payload: &str, run: &RunReference) -> Result<(), DeliveryError> {
        let request_id = Uuid::new_v4();
        debug!(endpoint = %self.endpoint, %request_id, run = %run, "posting DX event");

        let response = self
            .http_client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("X-Request-Id", request_id.to_string())
            .body(payload.to_string())
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(%request_id, status = status.as_u16(), run = %run, "DX accepted event");
        Ok(())
    }
}
