//! Live content refresh.
//!
//! Independent of the challenge. The host page subscribes to a push stream
//! and, whenever the server signals an update, re-fetches a set of HTML
//! fragments and swaps them into their containers. Requests for fragments
//! carry the page's CSRF token in an `X-CSRFToken` header.

pub mod sse;

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Url, redirect};
use tokio_util::codec::Decoder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::schema::RefreshConfig;
use crate::error::RefreshError;
use crate::observability::metrics;

pub use sse::{SseDecoder, SseEvent};

/// Header carrying the CSRF token on fragment requests.
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Event data that triggers a fragment refresh.
pub const UPDATE_SIGNAL: &str = "update";

/// Receiver of refreshed fragments.
///
/// How the swap is presented (fading the old content out and the new
/// content in, for example) is up to the implementation.
pub trait FragmentSink: Send {
    /// Replaces the content of `container` with `html`.
    fn swap(&mut self, container: &str, html: String);
}

/// Push stream subscriber.
#[derive(Debug, Clone)]
pub struct LiveRefresh {
    client: reqwest::Client,
    base: Url,
    config: RefreshConfig,
}

impl LiveRefresh {
    /// Creates a subscriber for the host at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `RefreshError::InvalidBaseUrl` if `base_url` is not an
    /// absolute http(s) URL, or `RefreshError::Network` if the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str, config: RefreshConfig) -> Result<Self, RefreshError> {
        let base = Url::parse(base_url)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or_else(|| RefreshError::InvalidBaseUrl(base_url.to_string()))?;

        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base,
            config,
        })
    }

    /// Subscribes until `cancel` fires, reconnecting whenever the stream ends.
    ///
    /// # Errors
    ///
    /// Returns an error only if no CSRF token can be obtained up front.
    /// Stream and fragment failures are logged and retried.
    pub async fn run<K: FragmentSink>(
        &self,
        sink: &mut K,
        cancel: CancellationToken,
    ) -> Result<(), RefreshError> {
        let token = tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            token = self.csrf_token() => token?,
        };
        let mut retry = self.config.retry;

        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                result = self.stream_once(&token, sink, &mut retry) => match result {
                    Ok(()) => debug!("push stream closed"),
                    Err(e) => warn!(error = %e, "push stream failed"),
                },
            }

            debug!(retry_ms = retry.as_millis(), "reconnecting to push stream");
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                () = tokio::time::sleep(retry) => {}
            }
            metrics::record_refresh_reconnect();
        }
    }

    /// Returns the configured token, or reads it from the page metadata.
    ///
    /// # Errors
    ///
    /// Returns `RefreshError::MissingCsrfToken` if the page carries no
    /// token, or a network error if the page cannot be fetched.
    pub async fn csrf_token(&self) -> Result<String, RefreshError> {
        if let Some(token) = &self.config.csrf_token {
            return Ok(token.clone());
        }

        let url = self.url(&self.config.page_path)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RefreshError::HttpStatus(response.status().as_u16()));
        }
        let html = response
            .text()
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        csrf_from_html(&html).ok_or_else(|| RefreshError::MissingCsrfToken(url.to_string()))
    }

    /// Fetches every configured fragment and hands each to `sink`.
    ///
    /// Failed fragments are logged and skipped. Returns the number swapped.
    pub async fn refresh_fragments<K: FragmentSink>(&self, token: &str, sink: &mut K) -> usize {
        let mut swapped = 0;
        for fragment in &self.config.fragments {
            match self.fetch_fragment(&fragment.path, token).await {
                Ok(html) => {
                    sink.swap(&fragment.container, html);
                    metrics::record_fragment_swap(&fragment.container);
                    swapped += 1;
                }
                Err(e) => {
                    warn!(path = %fragment.path, error = %e, "fragment refresh failed");
                }
            }
        }
        swapped
    }

    async fn fetch_fragment(&self, path: &str, token: &str) -> Result<String, RefreshError> {
        let response = self
            .client
            .get(self.url(path)?)
            .header(CSRF_HEADER, token)
            .send()
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RefreshError::HttpStatus(response.status().as_u16()));
        }
        response
            .text()
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))
    }

    async fn stream_once<K: FragmentSink>(
        &self,
        token: &str,
        sink: &mut K,
        retry: &mut Duration,
    ) -> Result<(), RefreshError> {
        let response = self
            .client
            .get(self.url(&self.config.stream_path)?)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RefreshError::HttpStatus(response.status().as_u16()));
        }
        info!(path = %self.config.stream_path, "subscribed to push stream");

        let mut decoder = SseDecoder::new();
        let mut buf = bytes::BytesMut::new();
        let mut body = std::pin::pin!(response.bytes_stream());

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| RefreshError::Network(e.to_string()))?;
            buf.extend_from_slice(&chunk);

            while let Some(event) = decoder
                .decode(&mut buf)
                .map_err(|e| RefreshError::Network(e.to_string()))?
            {
                if event.data == UPDATE_SIGNAL {
                    let swapped = self.refresh_fragments(token, sink).await;
                    debug!(swapped, "update signal handled");
                }
            }
            if let Some(advertised) = decoder.retry() {
                *retry = advertised;
            }
        }
        Ok(())
    }

    fn url(&self, path: &str) -> Result<Url, RefreshError> {
        self.base
            .join(path)
            .map_err(|_| RefreshError::InvalidBaseUrl(format!("{}{path}", self.base)))
    }
}

/// Extracts the `content` of `<meta name="csrf-token">` from a page.
#[must_use]
pub fn csrf_from_html(html: &str) -> Option<String> {
    let mut rest = html;
    while let Some(start) = find_ignore_case(rest, "<meta") {
        let tag_start = &rest[start..];
        let end = tag_start.find('>').unwrap_or(tag_start.len());
        let tag = &tag_start[..end];
        if attribute(tag, "name").is_some_and(|n| n.eq_ignore_ascii_case("csrf-token")) {
            return attribute(tag, "content")
                .filter(|c| !c.is_empty())
                .map(str::to_string);
        }
        rest = &tag_start[end..];
    }
    None
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
}

/// Value of a quoted attribute inside a single tag.
fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let mut rest = tag;
    while let Some(pos) = find_ignore_case(rest, name) {
        let before = rest[..pos].chars().next_back();
        let after = rest[pos + name.len()..].trim_start();
        rest = &rest[pos + name.len()..];

        if !before.is_some_and(char::is_whitespace) {
            continue;
        }
        let Some(value) = after.strip_prefix('=') else {
            continue;
        };
        let value = value.trim_start();
        let quote = value.chars().next()?;
        if quote != '"' && quote != '\'' {
            continue;
        }
        let body = &value[1..];
        return body.find(quote).map(|close| &body[..close]);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csrf_from_meta_tag() {
        let html = r#"<html><head>
            <meta charset="utf-8">
            <meta name="csrf-token" content="abc123">
        </head></html>"#;
        assert_eq!(csrf_from_html(html).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_csrf_attribute_order_and_quotes() {
        let html = "<META content='tok' NAME='csrf-token'/>";
        assert_eq!(csrf_from_html(html).as_deref(), Some("tok"));
    }

    #[test]
    fn test_csrf_missing() {
        assert_eq!(csrf_from_html("<meta name=\"viewport\" content=\"x\">"), None);
        assert_eq!(csrf_from_html("<meta name=\"csrf-token\" content=\"\">"), None);
        assert_eq!(csrf_from_html(""), None);
    }

    #[test]
    fn test_attribute_ignores_suffix_matches() {
        assert_eq!(
            attribute(r#"<meta data-name="x" name="y">"#, "name"),
            Some("y")
        );
    }

    #[test]
    fn test_new_rejects_relative_base() {
        assert!(matches!(
            LiveRefresh::new("localhost:12918", RefreshConfig::default()),
            Err(RefreshError::InvalidBaseUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_configured_token_skips_page_fetch() {
        let config = RefreshConfig {
            csrf_token: Some("fixed".to_string()),
            ..RefreshConfig::default()
        };
        // nothing listens on this port; a fetch would fail
        let refresh = LiveRefresh::new("http://127.0.0.1:9", config).unwrap();
        assert_eq!(refresh.csrf_token().await.unwrap(), "fixed");
    }
}
