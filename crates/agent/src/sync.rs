//! Outbound notifications to the storefront web app.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use qbeat_core::config::SyncConfig;
use qbeat_core::errors::ApplicationError;
use qbeat_core::ordering::{CartSnapshot, CompletionNotice, OrderSubmission};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

pub const SYNC_CART_PATH: &str = "/api/sync-voice-cart";
pub const SUBMIT_ORDER_PATH: &str = "/api/submit-voice-order";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("could not build order sync client: {0}")]
    Client(String),
    #[error("request to `{url}` failed: {message}")]
    Transport { url: String, message: String },
    #[error("request to `{url}` timed out")]
    Timeout { url: String },
    #[error("`{url}` answered with status {status}")]
    Status { url: String, status: u16 },
}

impl From<GatewayError> for ApplicationError {
    fn from(value: GatewayError) -> Self {
        Self::Integration(value.to_string())
    }
}

#[async_trait]
pub trait OrderSyncGateway: Send + Sync {
    async fn sync_cart(&self, snapshot: &CartSnapshot) -> Result<(), GatewayError>;
    async fn submit_order(&self, submission: &OrderSubmission) -> Result<(), GatewayError>;
    async fn notify_completion(&self, notice: &CompletionNotice) -> Result<(), GatewayError>;
}

/// Builds the HTTP gateway when sync is enabled, the logging no-op otherwise.
pub fn gateway_from_config(config: &SyncConfig) -> Result<Arc<dyn OrderSyncGateway>, GatewayError> {
    if !config.enabled {
        return Ok(Arc::new(NoopOrderSyncGateway));
    }
    let gateway = HttpOrderSyncGateway::new(
        &config.base_url,
        config.api_key.clone(),
        Duration::from_secs(config.timeout_secs),
    )?;
    Ok(Arc::new(gateway))
}

#[derive(Default)]
pub struct NoopOrderSyncGateway;

#[async_trait]
impl OrderSyncGateway for NoopOrderSyncGateway {
    async fn sync_cart(&self, snapshot: &CartSnapshot) -> Result<(), GatewayError> {
        info!(
            event_name = "sync.cart.skipped",
            lines = snapshot.cart.len(),
            total = %snapshot.total,
            "order sync disabled; cart sync skipped"
        );
        Ok(())
    }

    async fn submit_order(&self, submission: &OrderSubmission) -> Result<(), GatewayError> {
        info!(
            event_name = "sync.order.skipped",
            lines = submission.cart.len(),
            total = %submission.total,
            "order sync disabled; submission accepted locally"
        );
        Ok(())
    }

    async fn notify_completion(&self, notice: &CompletionNotice) -> Result<(), GatewayError> {
        info!(
            event_name = "sync.completion.skipped",
            total = %notice.total,
            "order sync disabled; completion notice skipped"
        );
        Ok(())
    }
}

pub struct HttpOrderSyncGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl HttpOrderSyncGateway {
    pub fn new(
        base_url: &str,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("qbeat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| GatewayError::Client(error.to_string()))?;

        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_owned(), api_key })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post_json<T>(&self, path: &str, body: &T) -> Result<u16, GatewayError>
    where
        T: Serialize + Sync,
    {
        let url = self.endpoint(path);
        let mut request = self.client.post(&url).json(body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.map_err(|error| {
            if error.is_timeout() {
                GatewayError::Timeout { url: url.clone() }
            } else {
                GatewayError::Transport { url: url.clone(), message: error.to_string() }
            }
        })?;

        let status = response.status();
        debug!(
            event_name = "sync.http.response",
            url = %url,
            status = status.as_u16(),
            "order sync response"
        );
        if !status.is_success() {
            return Err(GatewayError::Status { url, status: status.as_u16() });
        }
        Ok(status.as_u16())
    }
}

#[async_trait]
impl OrderSyncGateway for HttpOrderSyncGateway {
    async fn sync_cart(&self, snapshot: &CartSnapshot) -> Result<(), GatewayError> {
        self.post_json(SYNC_CART_PATH, snapshot).await?;
        info!(
            event_name = "sync.cart.sent",
            lines = snapshot.cart.len(),
            total = %snapshot.total,
            "cart sync successful"
        );
        Ok(())
    }

    async fn submit_order(&self, submission: &OrderSubmission) -> Result<(), GatewayError> {
        let status = self.post_json(SUBMIT_ORDER_PATH, submission).await?;
        info!(
            event_name = "sync.order.submitted",
            status,
            lines = submission.cart.len(),
            total = %submission.total,
            "order submitted"
        );
        Ok(())
    }

    async fn notify_completion(&self, notice: &CompletionNotice) -> Result<(), GatewayError> {
        self.post_json(SYNC_CART_PATH, notice).await?;
        info!(event_name = "sync.completion.sent", total = %notice.total, "completion notice sent");
        Ok(())
    }
}
