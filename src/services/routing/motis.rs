//! HTTP client for the MOTIS one-to-many routing endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::RoutingOracle;
use crate::constants::{MAX_TRAVEL, SECOND};
use crate::types::Coordinates;

/// Maximum snapping distance from a coordinate to the road network, meters.
const MAX_MATCHING_DISTANCE: u32 = 250;

/// Oracle requests are chunked so a single call never exceeds this many
/// destinations.
const BATCH_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct MotisConfig {
    /// Base URL of the routing server (e.g. "http://localhost:8080")
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for MotisConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl MotisConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}

pub struct MotisClient {
    client: Client,
    config: MotisConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OneToManyRequest {
    one: String,
    many: Vec<String>,
    /// Cutoff in seconds.
    max: i64,
    max_matching_distance: u32,
    mode: &'static str,
    arrive_by: bool,
}

#[derive(Debug, Deserialize)]
struct OneToManyEntry {
    /// Seconds; absent when unreachable.
    duration: Option<i64>,
}

fn coordinate_str(c: &Coordinates) -> String {
    format!("{};{}", c.lat, c.lng)
}

impl MotisClient {
    pub fn new(config: MotisConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Check the server answers at all before committing to it.
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/v1/one-to-many", self.config.base_url);
        let request = OneToManyRequest {
            one: "0;0".to_string(),
            many: vec![],
            max: 1,
            max_matching_distance: MAX_MATCHING_DISTANCE,
            mode: "CAR",
            arrive_by: false,
        };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to reach routing engine")?;
        if response.status().is_success() || response.status().is_client_error() {
            // A 4xx still proves the server is listening.
            Ok(())
        } else {
            anyhow::bail!("Routing engine returned status {}", response.status())
        }
    }

    async fn one_to_many_batch(
        &self,
        one: Coordinates,
        many: &[Coordinates],
        arrive_by: bool,
    ) -> Result<Vec<Option<i64>>> {
        let url = format!("{}/api/v1/one-to-many", self.config.base_url);
        let request = OneToManyRequest {
            one: coordinate_str(&one),
            many: many.iter().map(coordinate_str).collect(),
            max: MAX_TRAVEL / SECOND,
            max_matching_distance: MAX_MATCHING_DISTANCE,
            mode: "CAR",
            arrive_by,
        };

        debug!(
            "Routing {} legs {} {}",
            many.len(),
            if arrive_by { "to" } else { "from" },
            request.one
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send one-to-many request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Routing engine returned error {}: {}", status, body);
        }

        let entries: Vec<OneToManyEntry> = response
            .json()
            .await
            .context("Failed to parse one-to-many response")?;
        if entries.len() != many.len() {
            anyhow::bail!(
                "Routing engine returned {} durations for {} destinations",
                entries.len(),
                many.len()
            );
        }

        Ok(entries
            .into_iter()
            .map(|e| {
                e.duration
                    .map(|s| s * SECOND)
                    .filter(|&ms| ms <= MAX_TRAVEL)
            })
            .collect())
    }
}

#[async_trait]
impl RoutingOracle for MotisClient {
    async fn one_to_many(
        &self,
        one: Coordinates,
        many: &[Coordinates],
        arrive_by: bool,
    ) -> Result<Vec<Option<i64>>> {
        let mut durations = Vec::with_capacity(many.len());
        for chunk in many.chunks(BATCH_SIZE) {
            durations.extend(self.one_to_many_batch(one, chunk, arrive_by).await?);
        }
        Ok(durations)
    }

    fn name(&self) -> &str {
        "Motis"
    }
}
