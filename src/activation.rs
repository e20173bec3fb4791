//! Verification call made once the burst passes.
//!
//! The endpoint is opaque: it answers a plain GET with JSON carrying a
//! navigation target. Any failure ends the attempt; there is no retry.

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use futures_util::StreamExt;
use reqwest::{Url, redirect};
use serde::Deserialize;
use tracing::debug;

use crate::config::schema::ActivationConfig;
use crate::error::ActivationError;

/// Largest verification response body accepted.
pub const MAX_RESPONSE_SIZE: usize = 64 * 1024;

/// Something that can perform the verification call.
///
/// The gate only sees this trait, so tests can substitute a canned answer
/// for the network.
#[async_trait]
pub trait Activator: Send + Sync {
    /// Performs the call and returns the absolute navigation target.
    ///
    /// # Errors
    ///
    /// Returns an [`ActivationError`] for every way the call can fail,
    /// including a body without a usable target.
    async fn activate(&self) -> Result<String, ActivationError>;
}

/// Body returned by the verification endpoint.
#[derive(Debug, Deserialize)]
struct ActivationResponse {
    #[serde(default)]
    path: Option<String>,
}

/// [`Activator`] backed by an HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpActivator {
    client: reqwest::Client,
    base: Url,
    endpoint: Url,
    timeout: Duration,
}

impl HttpActivator {
    /// Builds an activator for the configured endpoint.
    ///
    /// Redirects are not followed: the target is whatever the body says.
    ///
    /// # Errors
    ///
    /// Returns `ActivationError::InvalidBaseUrl` if the base URL is not an
    /// absolute http(s) URL, or `ActivationError::Network` if the HTTP
    /// client cannot be built.
    pub fn new(config: &ActivationConfig) -> Result<Self, ActivationError> {
        let base = parse_base_url(&config.base_url)?;
        let endpoint = base
            .join(&config.path)
            .map_err(|_| ActivationError::InvalidBaseUrl(config.base_url.clone()))?;

        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| ActivationError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base,
            endpoint,
            timeout: config.timeout,
        })
    }

    /// Full URL of the verification endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Activator for HttpActivator {
    async fn activate(&self) -> Result<String, ActivationError> {
        debug!(url = %self.endpoint, "requesting navigation target");

        let response = tokio::time::timeout(self.timeout, self.client.get(self.endpoint.clone()).send())
            .await
            .map_err(|_| ActivationError::Timeout)?
            .map_err(|e| ActivationError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ActivationError::HttpStatus(status.as_u16()));
        }

        let bytes = tokio::time::timeout(self.timeout, read_capped(response))
            .await
            .map_err(|_| ActivationError::Timeout)??;

        let body: ActivationResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ActivationError::InvalidResponse(e.to_string()))?;

        resolve_target(&self.base, body.path.as_deref())
    }
}

/// Reads the body, giving up as soon as it grows past
/// [`MAX_RESPONSE_SIZE`].
async fn read_capped(response: reqwest::Response) -> Result<BytesMut, ActivationError> {
    let mut buf = BytesMut::new();
    let mut body = std::pin::pin!(response.bytes_stream());

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| ActivationError::Network(e.to_string()))?;
        if buf.len() + chunk.len() > MAX_RESPONSE_SIZE {
            return Err(ActivationError::InvalidResponse(format!(
                "response body exceeds {MAX_RESPONSE_SIZE} byte limit"
            )));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// Parses an absolute http(s) base URL.
///
/// # Errors
///
/// Returns `ActivationError::InvalidBaseUrl` for anything else.
pub fn parse_base_url(raw: &str) -> Result<Url, ActivationError> {
    let url = Url::parse(raw).map_err(|_| ActivationError::InvalidBaseUrl(raw.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ActivationError::InvalidBaseUrl(raw.to_string())),
    }
}

/// Resolves the target from a response against the base URL.
///
/// Absolute targets are kept as they are; relative ones such as
/// `/admin-panel` are joined onto the base.
fn resolve_target(base: &Url, target: Option<&str>) -> Result<String, ActivationError> {
    let target = target
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ActivationError::MissingTarget)?;

    base.join(target)
        .map(String::from)
        .map_err(|e| ActivationError::InvalidResponse(format!("unusable target '{target}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://gate.local:12918").unwrap()
    }

    #[test]
    fn test_relative_target_joins_base() {
        assert_eq!(
            resolve_target(&base(), Some("/hidden-panel")).unwrap(),
            "http://gate.local:12918/hidden-panel"
        );
    }

    #[test]
    fn test_absolute_target_kept() {
        assert_eq!(
            resolve_target(&base(), Some("https://elsewhere.example/x")).unwrap(),
            "https://elsewhere.example/x"
        );
    }

    #[test]
    fn test_missing_or_blank_target() {
        assert_eq!(
            resolve_target(&base(), None),
            Err(ActivationError::MissingTarget)
        );
        assert_eq!(
            resolve_target(&base(), Some("  ")),
            Err(ActivationError::MissingTarget)
        );
    }

    #[test]
    fn test_response_without_path_field() {
        let body: ActivationResponse = serde_json::from_str(r#"{"other": 1}"#).unwrap();
        assert!(body.path.is_none());
    }

    #[test]
    fn test_base_url_must_be_http() {
        assert!(parse_base_url("ftp://gate.local").is_err());
        assert!(parse_base_url("/relative").is_err());
        assert!(parse_base_url("https://gate.local").is_ok());
    }

    #[test]
    fn test_endpoint_built_from_config() {
        let activator = HttpActivator::new(&ActivationConfig::default()).unwrap();
        assert_eq!(
            activator.endpoint().as_str(),
            "http://127.0.0.1:12918/_s_a_p_"
        );
    }
}
