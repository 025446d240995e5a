//! Authenticated HTTP client for the EcoTrack delivery API
//!
//! Thin wrapper over reqwest: bearer auth, JSON accept headers and a bounded
//! request timeout. Endpoint-specific parsing lives in
//! [`crate::ecotrack::endpoints`].

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder, StatusCode};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::core::config;

/// Errors produced by the EcoTrack API layer.
#[derive(Debug, Error)]
pub enum EcoError {
    /// Non-2xx response; carries the upstream status and raw body.
    #[error("EcoTrack API error ({status}): {body}")]
    Api { status: StatusCode, body: String },
    /// 2xx response whose JSON does not match any known shape.
    #[error("unexpected EcoTrack response: {0}")]
    UnexpectedShape(String),
    /// A required result set came back empty (e.g. commune list).
    #[error("{0}")]
    Empty(String),
    /// Create-order rejected with a field→messages validation map.
    #[error("validation failed:\n{0}")]
    Rejected(String),
    /// Connection, timeout or body-decoding failure.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl EcoError {
    /// Short message suitable for relaying to the chat user.
    ///
    /// Prefers the upstream-provided `message` field when the body is JSON,
    /// mirroring what the API returns for auth and quota failures.
    pub fn user_message(&self) -> String {
        match self {
            EcoError::Api { body, status } => serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
                .unwrap_or_else(|| format!("HTTP {}", status)),
            other => other.to_string(),
        }
    }
}

/// Authenticated EcoTrack HTTP client.
#[derive(Debug, Clone)]
pub struct EcoClient {
    http: Client,
    base_url: Url,
}

impl EcoClient {
    /// Creates a client with bearer auth and the configured request timeout.
    pub fn new(base_url: Url, api_key: &str) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| anyhow::anyhow!("ECOTRACK_API_KEY contains invalid header characters: {}", e))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = ClientBuilder::new()
            .timeout(config::network::timeout())
            .default_headers(headers)
            .build()?;

        Ok(Self { http, base_url })
    }

    /// GET `path` with query params, returning the raw JSON body.
    pub async fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<Value, EcoError> {
        log::debug!("[API] GET {}", path);
        let url = self.endpoint_url(path)?;
        let resp = self.http.get(url).query(params).send().await?;
        Self::read_json(resp).await
    }

    /// POST `path` with query params (the EcoTrack API takes create/update
    /// parameters in the query string, not the body).
    pub async fn post_json(&self, path: &str, params: &[(&str, String)]) -> Result<Value, EcoError> {
        log::debug!("[API] POST {}", path);
        let url = self.endpoint_url(path)?;
        let resp = self.http.post(url).query(params).send().await?;
        Self::read_json(resp).await
    }

    fn endpoint_url(&self, path: &str) -> Result<Url, EcoError> {
        self.base_url
            .join(path)
            .map_err(|e| EcoError::UnexpectedShape(format!("bad endpoint path {}: {}", path, e)))
    }

    async fn read_json(resp: reqwest::Response) -> Result<Value, EcoError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            log::error!("[API] {} -> {}", status, body);
            return Err(EcoError::Api { status, body });
        }
        Ok(resp.json::<Value>().await?)
    }
}
