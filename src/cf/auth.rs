//! Cloud Controller Authentication
//!
//! Obtains bearer tokens from a UAA-style token endpoint using the OAuth2
//! client-credentials grant, and caches them until shortly before expiry.

use super::error::ResolveError;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Token expiry buffer - refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL when the server does not report `expires_in`
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Client-credentials settings
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Token source with caching
#[derive(Clone)]
pub struct CfCredentials {
    http: Client,
    credentials: ClientCredentials,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

impl CfCredentials {
    pub fn new(http: Client, credentials: ClientCredentials) -> Self {
        Self {
            http,
            credentials,
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Get an access token, reusing the cached one while it is still valid
    pub async fn get_token(&self) -> Result<String, ResolveError> {
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        // Held across the request so concurrent callers wait for one refresh
        let mut cache = self.token_cache.write().await;
        if let Some(cached) = cache.as_ref().filter(|cached| cached.is_valid()) {
            return Ok(cached.token.clone());
        }

        let response = self.request_token().await?;

        let ttl = response
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_TTL);
        let expires_at = Instant::now() + ttl.saturating_sub(TOKEN_EXPIRY_BUFFER);

        *cache = Some(CachedToken {
            token: response.access_token.clone(),
            expires_at,
        });
        drop(cache);

        tracing::debug!(
            "New token cached, expires in ~{} seconds",
            ttl.saturating_sub(TOKEN_EXPIRY_BUFFER).as_secs()
        );

        Ok(response.access_token)
    }

    async fn request_token(&self) -> Result<TokenResponse, ResolveError> {
        let token_url = &self.credentials.token_url;
        let auth_error = |reason: String| ResolveError::Auth {
            token_url: token_url.clone(),
            reason,
        };

        tracing::debug!("POST {} (client_credentials)", token_url);

        let response = self
            .http
            .post(token_url)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| auth_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(auth_error(status.to_string()));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| auth_error(format!("malformed token response: {e}")))
    }
}
