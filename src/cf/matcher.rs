//! Deployment name matching
//!
//! On-demand service brokers name BOSH deployments `<prefix>_<instance-guid>`.
//! Anything else is simply not a service deployment.

use regex::Regex;

/// Prefix used by the on-demand broker
pub const DEFAULT_DEPLOYMENT_PREFIX: &str = "service-instance";

/// Extracts service-instance ids from deployment names
#[derive(Debug, Clone)]
pub struct InstanceMatcher {
    pattern: Regex,
}

impl InstanceMatcher {
    /// Build a matcher for `<prefix>_<id>`; the prefix is matched literally
    pub fn new(prefix: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!("^{}_(.+)$", regex::escape(prefix)))?;
        Ok(Self { pattern })
    }

    /// The service-instance id encoded in `deployment_name`, if any
    pub fn extract_instance_id<'a>(&self, deployment_name: &'a str) -> Option<&'a str> {
        self.pattern
            .captures(deployment_name)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}
