//! reqwest implementation of the marketplace resource API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use sellersync_core::marketplace::upstream_message;
use sellersync_core::{ApiMethod, ApiRequest, MarketplaceApi};
use sellersync_domain::{MarketplaceConfig, Result, SellerSyncError};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::errors::InfraError;
use crate::http::HttpClient;

/// Upper bound on how much of an unparseable error body ends up in messages.
const MAX_BODY_EXCERPT: usize = 512;

#[derive(Debug, Clone)]
pub struct MarketplaceClient {
    http: HttpClient,
    base_url: Url,
}

impl MarketplaceClient {
    pub fn new(base_url: &str, http: HttpClient) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/')).map_err(|e| {
            SellerSyncError::Config(format!("invalid marketplace api_base_url {base_url}: {e}"))
        })?;
        Ok(Self { http, base_url })
    }

    /// Each request is sent once. Failed fetches are retried by queue
    /// redelivery, and page loops abort on the first error.
    pub fn from_config(config: &MarketplaceConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .max_attempts(1)
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()?;
        Self::new(&config.api_base_url, http)
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{base}/{path}"))
            .map_err(|e| SellerSyncError::InvalidInput(format!("invalid API path {path}: {e}")))
    }
}

fn method_for(method: ApiMethod) -> Method {
    match method {
        ApiMethod::Get => Method::GET,
        ApiMethod::Post => Method::POST,
        ApiMethod::Put => Method::PUT,
        ApiMethod::Delete => Method::DELETE,
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .as_ref()
        .and_then(upstream_message)
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.chars().take(MAX_BODY_EXCERPT).collect())
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown status").to_string())
}

#[async_trait]
impl MarketplaceApi for MarketplaceClient {
    #[instrument(skip(self, access_token, request), fields(method = ?request.method, path = %request.path))]
    async fn send(&self, access_token: &str, request: &ApiRequest) -> Result<Value> {
        let url = self.url_for(&request.path)?;
        let mut builder = self
            .http
            .request(method_for(request.method), url)
            .bearer_auth(access_token)
            .query(&request.query);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = self.http.send(builder).await?;
        let status = response.status();
        let body = response.text().await.map_err(|e| SellerSyncError::from(InfraError::from(e)))?;

        if status == StatusCode::UNAUTHORIZED {
            debug!("marketplace rejected access token");
            return Err(SellerSyncError::Unauthorized(error_message(status, &body)));
        }
        if !status.is_success() {
            let message = error_message(status, &body);
            warn!(status = status.as_u16(), %message, "marketplace request failed");
            return Err(SellerSyncError::UpstreamError { status: status.as_u16(), message });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| SellerSyncError::UpstreamError {
            status: status.as_u16(),
            message: format!("response is not valid JSON: {e}"),
        })
    }
}
