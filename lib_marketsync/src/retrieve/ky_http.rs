//! # HTTP Retrieval Utilities
//!
//! An asynchronous API client wrapper around `reqwest` with exponential backoff
//! retries and standardized JSON response handling. It implements [`RemoteFetch`]
//! so the sync pipeline can read endpoints relative to one base URL.

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE},
    Method, Url,
};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::remote::RemoteFetch;
use crate::errors::TransportError;

/// Transient failures (5xx, timeouts, dropped connections) are retried this many times.
const MAX_TRANSPORT_RETRIES: u32 = 3;

/// A standardized container for API responses.
///
/// Wraps the deserialized data along with the status and headers of the exchange.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The successfully deserialized response body, if any.
    pub data: Option<T>,
    /// The raw error body returned by the server if the request failed.
    pub error_body: Option<String>,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Indicates if the status code was in the 2xx range.
    pub success: bool,
    /// The headers returned by the server.
    pub headers: HeaderMap,
}

/// A flexible asynchronous HTTP client.
///
/// Built on top of `reqwest_middleware`, it handles base URLs,
/// authentication tokens, timeouts and automatic retries.
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    /// The base URL to which all relative paths are joined.
    base_url: Url,
    /// An optional Bearer token used for authorization.
    auth_token: Option<String>,
}

impl ApiClient {
    /// Creates a new `ApiClient` with a retry policy and a per-request timeout.
    ///
    /// # Arguments
    /// * `base_url` - The absolute base URL for the API (e.g., "https://api.example.com/v1/").
    /// * `auth_token` - An optional string for the Authorization header.
    /// * `timeout` - Upper bound for a single attempt.
    ///
    /// # Errors
    /// `TransportError::InvalidUrl` if `base_url` is not absolute, and
    /// `TransportError::Client` if the underlying client cannot be built.
    pub fn new(
        base_url: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let url = Url::parse(base_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(MAX_TRANSPORT_RETRIES);

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            inner: client,
            base_url: url,
            auth_token,
        })
    }

    /// The base URL relative paths are joined onto.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Performs a generic HTTP request and handles the response.
    ///
    /// Manages URL joining, header injection, authentication and JSON
    /// serialization. Non-2xx replies are not errors here: they come back with
    /// `success == false` and the raw body in `error_body`.
    ///
    /// # Errors
    /// `InvalidUrl` when `path` cannot be joined, `Request` when no response
    /// arrives and `Decode` when a 2xx body does not deserialize into `T`.
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        headers: Option<HeaderMap>,
        body: Option<B>,
    ) -> Result<ApiResponse<T>, TransportError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let full_url = self
            .base_url
            .join(path)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", path, e)))?;
        let mut req = self.inner.request(method, full_url);

        if let Some(h) = headers {
            req = req.headers(h);
        }

        if let Some(token) = &self.auth_token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        if let Some(b) = body {
            let json_body = serde_json::to_string(&b).map_err(|e| TransportError::Request {
                endpoint: path.to_string(),
                reason: format!("cannot serialize request body: {}", e),
            })?;
            req = req.header(CONTENT_TYPE, "application/json").body(json_body);
        }

        let response = req.send().await.map_err(|e| TransportError::Request {
            endpoint: path.to_string(),
            reason: e.to_string(),
        })?;
        let status = response.status();
        let resp_headers = response.headers().clone();

        if status.is_success() {
            let text = response.text().await.map_err(|e| TransportError::Request {
                endpoint: path.to_string(),
                reason: e.to_string(),
            })?;
            let data = serde_json::from_str::<T>(&text).map_err(|e| TransportError::Decode {
                endpoint: path.to_string(),
                reason: e.to_string(),
            })?;
            Ok(ApiResponse {
                data: Some(data),
                error_body: None,
                status: status.as_u16(),
                success: true,
                headers: resp_headers,
            })
        } else {
            let error_text = response.text().await.ok();
            Ok(ApiResponse {
                data: None,
                error_body: error_text,
                status: status.as_u16(),
                success: false,
                headers: resp_headers,
            })
        }
    }
}

#[async_trait]
impl RemoteFetch for ApiClient {
    async fn fetch(&self, endpoint: &str) -> Result<Value, TransportError> {
        let response = self
            .request::<Value, ()>(Method::GET, endpoint, None, None)
            .await?;

        if !response.success {
            // Keep JSON error payloads structured so their `message` can surface.
            let body = response.error_body.filter(|b| !b.is_empty()).map(|text| {
                serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text))
            });
            return Err(TransportError::Status {
                endpoint: endpoint.to_string(),
                status: response.status,
                body,
            });
        }

        Ok(response.data.unwrap_or(Value::Null))
    }
}
