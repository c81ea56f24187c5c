//! Deployment Resolver
//!
//! Reconstructs who owns a service deployment: the apps bound to the service
//! instance, their space, and the space's organization. The Cloud Controller
//! has no "ancestors" endpoint, so this walks the graph one dependent GET at a
//! time.
//!
//! # URL discovery
//!
//! Follow-on URLs are always **templated from GUID fields** (`app_guid`,
//! `space_guid`, `organization_guid`) into fixed `/v2/...` paths. The `*_url`
//! link fields the API also returns are never followed.
//!
//! # Space resolution
//!
//! Where the space GUID comes from is selected by [`SpaceSource`]:
//!
//! - [`SpaceSource::BoundApps`]: taken from the last bound app. An instance
//!   with no bindings resolves to an empty [`DeploymentInfo`].
//! - [`SpaceSource::ServiceInstance`]: taken from the service instance itself,
//!   so space and organization resolve even with zero bindings.

use super::client::CfClient;
use super::error::ResolveError;
use super::matcher::{InstanceMatcher, DEFAULT_DEPLOYMENT_PREFIX};
use super::resources::{
    AppEntity, Collection, Envelope, OrganizationEntity, ServiceBindingEntity,
    ServiceInstanceEntity, SpaceEntity,
};
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Deserializer, Serialize};

/// Default number of app lookups in flight per resolution
pub const DEFAULT_APP_LOOKUP_CONCURRENCY: usize = 4;

/// Ownership chain of a service deployment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentInfo {
    /// Bound app names, in binding listing order
    #[serde(default, deserialize_with = "null_as_empty")]
    pub app_names: Vec<String>,
    #[serde(default)]
    pub space_name: String,
    #[serde(default)]
    pub org_name: String,
}

impl DeploymentInfo {
    pub fn is_empty(&self) -> bool {
        self.app_names.is_empty() && self.space_name.is_empty() && self.org_name.is_empty()
    }
}

// Older agents send `"AppNames": null` for instances without bindings
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Where the space GUID is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceSource {
    /// From the last bound app; no bindings means no space or organization
    #[default]
    BoundApps,
    /// From the service instance, independent of bindings
    ServiceInstance,
}

/// Resolver tuning
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub deployment_prefix: String,
    pub space_source: SpaceSource,
    pub app_lookup_concurrency: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            deployment_prefix: DEFAULT_DEPLOYMENT_PREFIX.to_string(),
            space_source: SpaceSource::default(),
            app_lookup_concurrency: DEFAULT_APP_LOOKUP_CONCURRENCY,
        }
    }
}

/// Resolves deployment names to [`DeploymentInfo`]
#[derive(Clone)]
pub struct DeploymentResolver {
    client: CfClient,
    matcher: InstanceMatcher,
    space_source: SpaceSource,
    app_lookup_concurrency: usize,
}

impl DeploymentResolver {
    pub fn new(client: CfClient, options: ResolverOptions) -> Result<Self> {
        let matcher = InstanceMatcher::new(&options.deployment_prefix).with_context(|| {
            format!("Invalid deployment prefix: {}", options.deployment_prefix)
        })?;

        Ok(Self {
            client,
            matcher,
            space_source: options.space_source,
            app_lookup_concurrency: options.app_lookup_concurrency.max(1),
        })
    }

    /// Resolve the ownership chain of `deployment_name`.
    ///
    /// A name that does not follow the `<prefix>_<instance-guid>` convention
    /// is not an error: it resolves to an empty [`DeploymentInfo`] without
    /// any request. Any failed lookup aborts the whole resolution.
    pub async fn resolve(&self, deployment_name: &str) -> Result<DeploymentInfo, ResolveError> {
        let Some(instance_guid) = self.matcher.extract_instance_id(deployment_name) else {
            tracing::debug!("Deployment {} is not a service instance", deployment_name);
            return Ok(DeploymentInfo::default());
        };

        let instance_space_guid = match self.space_source {
            SpaceSource::ServiceInstance => {
                let instance: Envelope<ServiceInstanceEntity> = self
                    .client
                    .fetch(&self.client.service_instance_path(instance_guid))
                    .await?;
                Some(instance.entity.space_guid)
            }
            SpaceSource::BoundApps => None,
        };

        let bindings: Collection<ServiceBindingEntity> = self
            .client
            .fetch(&self.client.service_bindings_path(instance_guid))
            .await?;

        let apps = self.fetch_bound_apps(bindings).await?;

        let space_guid = match self.space_source {
            // All bound apps are assumed to live in one space
            SpaceSource::BoundApps => apps.last().map(|app| app.space_guid.clone()),
            SpaceSource::ServiceInstance => instance_space_guid,
        };

        let mut info = DeploymentInfo {
            app_names: apps.into_iter().map(|app| app.name).collect(),
            ..Default::default()
        };

        let Some(space_guid) = space_guid.filter(|guid| !guid.is_empty()) else {
            return Ok(info);
        };

        let space: Envelope<SpaceEntity> =
            self.client.fetch(&self.client.space_path(&space_guid)).await?;
        info.space_name = space.entity.name;

        let org_guid = space.entity.organization_guid;
        if org_guid.is_empty() {
            return Ok(info);
        }

        let org: Envelope<OrganizationEntity> = self
            .client
            .fetch(&self.client.organization_path(&org_guid))
            .await?;
        info.org_name = org.entity.name;

        tracing::debug!(
            "Resolved {}: {} app(s), space {}, org {}",
            deployment_name,
            info.app_names.len(),
            info.space_name,
            info.org_name
        );

        Ok(info)
    }

    /// Look up every bound app, keeping binding order regardless of completion order
    async fn fetch_bound_apps(
        &self,
        bindings: Collection<ServiceBindingEntity>,
    ) -> Result<Vec<AppEntity>, ResolveError> {
        stream::iter(bindings.into_entities())
            .map(|binding| async move {
                let app: Envelope<AppEntity> = self
                    .client
                    .fetch(&self.client.app_path(&binding.app_guid))
                    .await?;
                Ok::<_, ResolveError>(app.entity)
            })
            .buffered(self.app_lookup_concurrency)
            .try_collect()
            .await
    }
}
