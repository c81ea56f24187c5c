//! Cloud Foundry v2 resource shapes
//!
//! Every resource comes wrapped in the same envelope, `{"entity": {...}}`,
//! and collections wrap a list of those under `resources`. Each kind gets its
//! own entity struct so a missing required field fails the decode instead of
//! surfacing later as an empty name.

use serde::Deserialize;

/// Single resource wrapper
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub entity: T,
}

/// Collection wrapper
#[derive(Debug, Clone, Deserialize)]
pub struct Collection<T> {
    pub resources: Vec<Envelope<T>>,
}

impl<T> Collection<T> {
    /// Entities in listing order
    pub fn into_entities(self) -> impl Iterator<Item = T> {
        self.resources.into_iter().map(|r| r.entity)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceInstanceEntity {
    pub space_guid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceBindingEntity {
    pub app_guid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppEntity {
    #[serde(default)]
    pub name: String,
    pub space_guid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpaceEntity {
    #[serde(default)]
    pub name: String,
    pub organization_guid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationEntity {
    #[serde(default)]
    pub name: String,
}
