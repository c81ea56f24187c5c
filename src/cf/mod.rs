//! Cloud Foundry metadata resolution
//!
//! This module turns a BOSH deployment name into the Cloud Foundry apps,
//! space and organization that own it, by walking the Cloud Controller v2 API.
//!
//! # Module Structure
//!
//! - [`auth`] - OAuth2 client-credentials tokens for the Cloud Controller
//! - [`client`] - Resource client and path builders
//! - [`error`] - Typed resolution failures
//! - [`http`] - HTTP utilities for REST calls
//! - [`matcher`] - Deployment name convention
//! - [`resources`] - Envelope and entity shapes
//! - [`resolver`] - The traversal itself
//!
//! # Example
//!
//! ```ignore
//! use boshdash::cf::{CfClient, DeploymentResolver, ResolverOptions};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = CfClient::new("https://api.sys.example.com", None)?;
//!     let resolver = DeploymentResolver::new(client, ResolverOptions::default())?;
//!     let info = resolver.resolve("service-instance_abc-123").await?;
//!     println!("{:?}", info.app_names);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod http;
pub mod matcher;
pub mod resources;
pub mod resolver;

pub use auth::ClientCredentials;
pub use client::CfClient;
pub use error::ResolveError;
pub use resolver::{DeploymentInfo, DeploymentResolver, ResolverOptions, SpaceSource};
