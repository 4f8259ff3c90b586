//! Reqwest-based HTTP transport for the Paycheck API.

use crate::client::transport::Transport;
use crate::config::PaycheckConfig;
use crate::errors::{map_status_to_error_code, PaycheckError, Result};
use crate::protocol::models::{
    parse_body, ActivateRequest, ActivationResult, DeactivateResult, ErrorBody, LicenseInfo,
    OnlineValidation, RedeemRequest, RefreshResponse, RequestCodeRequest, RequestCodeResult,
    ValidateRequest,
};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Paycheck HTTP client.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    user_agent: String,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a new transport from config.
    pub fn new(config: &PaycheckConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PaycheckError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_agent: build_user_agent(config),
            timeout: config.request_timeout,
        })
    }

    /// Get the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post<B: Serialize>(&self, path: &str, body: &B) -> RequestBuilder {
        self.client
            .post(self.url(path))
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .json(body)
    }

    fn post_with_auth(&self, path: &str, token: &str) -> RequestBuilder {
        self.client
            .post(self.url(path))
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", token))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        if !(200..300).contains(&status) {
            let error_body: ErrorBody = serde_json::from_slice(&body).unwrap_or_default();
            let message = error_body.message(status);
            let code = map_status_to_error_code(status, &message);
            tracing::debug!(status, %code, "licensing service returned an error");
            return Err(PaycheckError::with_status(code, message, status));
        }

        parse_body(&body)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn activate(&self, request: &ActivateRequest) -> Result<ActivationResult> {
        self.send(self.post("/redeem/key", request)).await
    }

    async fn redeem_code(&self, request: &RedeemRequest) -> Result<ActivationResult> {
        self.send(self.post("/redeem", request)).await
    }

    async fn refresh(&self, token: &str) -> Result<String> {
        let response: RefreshResponse = self.send(self.post_with_auth("/refresh", token)).await?;
        Ok(response.token)
    }

    async fn deactivate(&self, token: &str) -> Result<DeactivateResult> {
        self.send(self.post_with_auth("/devices/deactivate", token))
            .await
    }

    async fn validate(&self, request: &ValidateRequest) -> Result<OnlineValidation> {
        self.send(self.post("/validate", request)).await
    }

    async fn license_info(&self, public_key: &str, token: &str) -> Result<LicenseInfo> {
        let request = self
            .client
            .get(self.url("/license"))
            .query(&[("public_key", public_key)])
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", token));
        self.send(request).await
    }

    async fn request_activation_code(
        &self,
        request: &RequestCodeRequest,
    ) -> Result<RequestCodeResult> {
        self.send(self.post("/activation/request-code", request))
            .await
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn map_reqwest_error(e: reqwest::Error) -> PaycheckError {
    if e.is_timeout() {
        PaycheckError::timeout()
    } else {
        PaycheckError::network(format!("Request failed: {}", e))
    }
}

/// Build a User-Agent string from config.
///
/// Format: `<product> paycheck-sdk-rust/<version>`
pub fn build_user_agent(config: &PaycheckConfig) -> String {
    format!(
        "{} paycheck-sdk-rust/{}",
        config.user_agent_product,
        env!("CARGO_PKG_VERSION")
    )
}
