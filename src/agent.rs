//! Agent
//!
//! Periodically samples the local VM, enriches the sample with Cloud Foundry
//! ownership when configured, and submits it to the hub. A failed resolution
//! never blocks submission: the hub still gets the system stats.

use crate::cf::http::HttpClient;
use crate::cf::{DeploymentInfo, DeploymentResolver};
use crate::config::Config;
use crate::info::Info;
use crate::system;
use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub struct Agent {
    config: Config,
    http: HttpClient,
    resolver: Option<DeploymentResolver>,
}

impl Agent {
    pub fn new(config: Config) -> Result<Self> {
        let resolver = config
            .cf
            .as_ref()
            .map(|cf| cf.build_resolver())
            .transpose()
            .context("Failed to set up Cloud Foundry resolver")?;

        Ok(Self {
            http: HttpClient::new()?,
            config,
            resolver,
        })
    }

    /// Build one telemetry payload
    pub async fn collect(&self) -> Result<Info> {
        let (stats, cf) = tokio::join!(
            system::sample(&self.config.persistent_disk_path),
            self.deployment_info()
        );
        let stats = stats.context("Error retrieving system level stats")?;

        Ok(Info {
            spec: self.config.spec.clone(),
            label: self.config.label.clone(),
            stats,
            cf,
        })
    }

    /// Collect and submit once
    pub async fn report_once(&self) -> Result<()> {
        let info = self.collect().await?;
        let url = self.config.hub_health_url();

        self.http
            .post_json(&url, &info)
            .await
            .with_context(|| format!("Error sending metrics to hub at: {}", self.config.hub_addr))
    }

    /// Report every `interval_secs` until `shutdown` resolves
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        let period = Duration::from_secs(self.config.interval_secs);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(
            "Reporting to {} every {}s",
            self.config.hub_addr,
            self.config.interval_secs
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.report_once().await {
                        tracing::error!("{:#}", e);
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("Shutting down now...");
                    return;
                }
            }
        }
    }

    async fn deployment_info(&self) -> Option<DeploymentInfo> {
        let resolver = self.resolver.as_ref()?;
        let deployment = &self.config.spec.deployment;

        match resolver.resolve(deployment).await {
            Ok(info) if info.is_empty() => None,
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(
                    "Error resolving Cloud Foundry metadata for {}, reporting without it: {}",
                    deployment,
                    e
                );
                None
            }
        }
    }
}
