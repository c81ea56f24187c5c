//! HTTP utilities for Cloud Controller and hub calls

use super::error::ResolveError;
use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::Serialize;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Truncate a response body for logging and strip control characters
pub(crate) fn sanitize_for_log(body: &str) -> String {
    let char_count = body.chars().count();
    let truncated = if char_count > MAX_LOG_BODY_LENGTH {
        let head: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
        format!("{}... [truncated, {} bytes total]", head, body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| c.is_control(), "")
}

/// Thin wrapper around a shared reqwest client
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("boshdash/{}", crate::VERSION))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// The underlying reqwest client, shared with the token source
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// GET `url`, returning the body of a 2xx response.
    ///
    /// `path` is the API-relative path reported in errors. A 404 becomes
    /// [`ResolveError::NotFound`], any other non-2xx becomes
    /// [`ResolveError::Unavailable`]. No retries.
    pub async fn get(
        &self,
        url: &str,
        path: &str,
        token: Option<&str>,
    ) -> Result<String, ResolveError> {
        tracing::debug!("GET {}", url);

        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let transport = |source| ResolveError::Transport {
            path: path.to_string(),
            source,
        };

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;

        if status.is_success() {
            return Ok(body);
        }

        tracing::warn!("API error: {} {} - {}", status, path, sanitize_for_log(&body));

        let path = path.to_string();
        if status == StatusCode::NOT_FOUND {
            Err(ResolveError::NotFound { path, status, body })
        } else {
            Err(ResolveError::Unavailable { path, status, body })
        }
    }

    /// POST a JSON document, failing on anything but 200
    pub async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<()> {
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {url}"))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Request to {} failed: {} - {}",
                url,
                status,
                sanitize_for_log(&body)
            ));
        }

        Ok(())
    }
}
