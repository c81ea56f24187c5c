//! Cloud Controller Client
//!
//! Combines the HTTP client, optional bearer-token source and API base URL,
//! and builds every resource path the resolver visits.

use super::auth::{CfCredentials, ClientCredentials};
use super::error::ResolveError;
use super::http::HttpClient;
use anyhow::Result;
use serde::de::DeserializeOwned;

/// Version prefix of every Cloud Controller path
const API_PREFIX: &str = "/v2";

/// Resource client for the Cloud Controller v2 API
#[derive(Clone)]
pub struct CfClient {
    pub http: HttpClient,
    pub credentials: Option<CfCredentials>,
    api_url: String,
}

impl CfClient {
    /// Create a client for `api_url`, authenticating with client credentials when given
    pub fn new(api_url: &str, client_credentials: Option<ClientCredentials>) -> Result<Self> {
        let http = HttpClient::new()?;
        let credentials =
            client_credentials.map(|creds| CfCredentials::new(http.inner().clone(), creds));

        Ok(Self {
            http,
            credentials,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// GET `path` and decode the body into `T`
    pub async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T, ResolveError> {
        let token = match &self.credentials {
            Some(credentials) => Some(credentials.get_token().await?),
            None => None,
        };

        let url = format!("{}{}", self.api_url, path);
        let body = self.http.get(&url, path, token.as_deref()).await?;

        serde_json::from_str(&body).map_err(|source| ResolveError::Decode {
            path: path.to_string(),
            source,
        })
    }

    // =========================================================================
    // Path helpers
    // =========================================================================

    pub fn service_instance_path(&self, instance_guid: &str) -> String {
        format!(
            "{}/service_instances/{}",
            API_PREFIX,
            urlencoding::encode(instance_guid)
        )
    }

    pub fn service_bindings_path(&self, instance_guid: &str) -> String {
        format!("{}/service_bindings", self.service_instance_path(instance_guid))
    }

    pub fn app_path(&self, app_guid: &str) -> String {
        format!("{}/apps/{}", API_PREFIX, urlencoding::encode(app_guid))
    }

    pub fn space_path(&self, space_guid: &str) -> String {
        format!("{}/spaces/{}", API_PREFIX, urlencoding::encode(space_guid))
    }

    pub fn organization_path(&self, org_guid: &str) -> String {
        format!(
            "{}/organizations/{}",
            API_PREFIX,
            urlencoding::encode(org_guid)
        )
    }
}
