//! BOSH deployment health telemetry.
//!
//! Agents running on every VM sample local health, resolve which Cloud
//! Foundry apps, space and organization own their deployment, and submit
//! the result to a hub that keeps the latest state of every instance.

pub mod agent;
pub mod cf;
pub mod config;
pub mod hub;
pub mod info;
pub mod system;

/// Version injected at compile time via BOSHDASH_VERSION env var (set by CI/CD),
/// or the crate version for local builds.
pub const VERSION: &str = match option_env!("BOSHDASH_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};
