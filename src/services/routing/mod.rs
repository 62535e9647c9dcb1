//! Travel-duration oracle.
//!
//! The planner never computes routes itself; it asks an external routing
//! engine for one-to-many driving durations. Production uses the HTTP
//! engine, tests a haversine mock.

mod motis;

pub use motis::{MotisClient, MotisConfig};

use anyhow::Result;
use async_trait::async_trait;

use crate::constants::{MAX_TRAVEL, SECOND};
use crate::types::{haversine_distance, Coordinates};

/// One-to-many travel durations in milliseconds.
///
/// `None` entries mean the destination is unreachable within the engine's
/// cutoff; callers must drop the affected candidate rather than assume a
/// zero-duration leg.
#[async_trait]
pub trait RoutingOracle: Send + Sync {
    /// Durations between `one` and each entry of `many`. With
    /// `arrive_by == true` the legs run `many[i] -> one`, otherwise
    /// `one -> many[i]`.
    async fn one_to_many(
        &self,
        one: Coordinates,
        many: &[Coordinates],
        arrive_by: bool,
    ) -> Result<Vec<Option<i64>>>;

    /// Service name for logging
    fn name(&self) -> &str;
}

/// Duration of a single leg, `None` when unreachable.
pub async fn single_leg(
    oracle: &dyn RoutingOracle,
    from: Coordinates,
    to: Coordinates,
) -> Result<Option<i64>> {
    Ok(oracle
        .one_to_many(from, std::slice::from_ref(&to), false)
        .await?
        .into_iter()
        .next()
        .flatten())
}

/// Mock oracle for tests: haversine distance times a road coefficient at a
/// fixed average speed.
pub struct MockRoutingOracle {
    road_coefficient: f64,
    average_speed_kmh: f64,
}

impl Default for MockRoutingOracle {
    fn default() -> Self {
        Self {
            road_coefficient: 1.3,
            average_speed_kmh: 40.0,
        }
    }
}

impl MockRoutingOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(road_coefficient: f64, average_speed_kmh: f64) -> Self {
        Self {
            road_coefficient,
            average_speed_kmh,
        }
    }
}

#[async_trait]
impl RoutingOracle for MockRoutingOracle {
    async fn one_to_many(
        &self,
        one: Coordinates,
        many: &[Coordinates],
        _arrive_by: bool,
    ) -> Result<Vec<Option<i64>>> {
        Ok(many
            .iter()
            .map(|m| {
                let road_km = haversine_distance(&one, m) * self.road_coefficient;
                let duration_ms =
                    (road_km / self.average_speed_kmh * 3600.0 * SECOND as f64) as i64;
                if duration_ms > MAX_TRAVEL {
                    None
                } else {
                    Some(duration_ms)
                }
            })
            .collect())
    }

    fn name(&self) -> &str {
        "MockRouting"
    }
}

/// Create the oracle with automatic engine detection and mock fallback.
pub async fn create_routing_oracle_with_fallback(
    routing_url: Option<String>,
) -> Box<dyn RoutingOracle> {
    use tracing::{info, warn};

    if let Some(url) = routing_url {
        let client = MotisClient::new(MotisConfig::new(&url));
        match client.health_check().await {
            Ok(()) => {
                info!("Routing engine available at {}", url);
                return Box::new(client);
            }
            Err(e) => {
                warn!(
                    "Routing engine not available at {}: {}. Falling back to mock routing.",
                    url, e
                );
            }
        }
    }

    info!("Using mock routing oracle (engine not configured or unavailable)");
    Box::new(MockRoutingOracle::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dresden() -> Coordinates {
        Coordinates::new(51.0504, 13.7373)
    }

    fn pirna() -> Coordinates {
        Coordinates::new(50.9622, 13.9403)
    }

    fn leipzig() -> Coordinates {
        Coordinates::new(51.3397, 12.3731)
    }

    #[tokio::test]
    async fn test_mock_empty_many() {
        let oracle = MockRoutingOracle::new();
        let durations = oracle.one_to_many(dresden(), &[], false).await.unwrap();
        assert!(durations.is_empty());
    }

    #[tokio::test]
    async fn test_mock_nearby_leg_reasonable() {
        let oracle = MockRoutingOracle::new();
        let durations = oracle
            .one_to_many(dresden(), &[pirna()], false)
            .await
            .unwrap();
        // ~17 km straight line, ~22 km road at 40 km/h: about half an hour
        let d = durations[0].expect("reachable");
        assert!(
            d > 20 * 60 * 1000 && d < 50 * 60 * 1000,
            "unexpected duration {d}"
        );
    }

    #[tokio::test]
    async fn test_mock_far_leg_unreachable() {
        let oracle = MockRoutingOracle::with_params(1.3, 40.0);
        // Dresden–Leipzig at 40 km/h exceeds the travel cutoff
        let durations = oracle
            .one_to_many(dresden(), &[leipzig()], false)
            .await
            .unwrap();
        assert_eq!(durations[0], None);
    }

    #[tokio::test]
    async fn test_single_leg_helper() {
        let oracle = MockRoutingOracle::new();
        let d = single_leg(&oracle, dresden(), pirna()).await.unwrap();
        assert!(d.is_some());
    }

    #[tokio::test]
    async fn test_fallback_without_url_uses_mock() {
        let oracle = create_routing_oracle_with_fallback(None).await;
        assert_eq!(oracle.name(), "MockRouting");
    }
}
