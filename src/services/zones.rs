//! Zone containment queries.
//!
//! Geographic containment is delegated to the store's spatial index; the
//! planner only ever asks "which service zones contain this point". Tests
//! use a mock with rectangular zones.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::Coordinates;

#[async_trait]
pub trait ZoneIndex: Send + Sync {
    /// Ids of all non-community service zones containing the point.
    async fn zones_containing(&self, point: Coordinates) -> Result<Vec<Uuid>>;

    /// Whether the point lies inside the given zone.
    async fn zone_covers(&self, zone: Uuid, point: Coordinates) -> Result<bool>;
}

/// Spatial index backed by the store's PostGIS geometry.
pub struct PostgisZoneIndex {
    pool: PgPool,
}

impl PostgisZoneIndex {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ZoneIndex for PostgisZoneIndex {
    async fn zones_containing(&self, point: Coordinates) -> Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM zone
            WHERE is_community = FALSE
              AND ST_Covers(area, ST_SetSRID(ST_MakePoint($1, $2), 4326))
            "#,
        )
        .bind(point.lng)
        .bind(point.lat)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn zone_covers(&self, zone: Uuid, point: Coordinates) -> Result<bool> {
        let covered: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM zone
                WHERE id = $1
                  AND ST_Covers(area, ST_SetSRID(ST_MakePoint($2, $3), 4326))
            )
            "#,
        )
        .bind(zone)
        .bind(point.lng)
        .bind(point.lat)
        .fetch_one(&self.pool)
        .await?;

        Ok(covered)
    }
}

/// Mock index with axis-aligned rectangular zones, for tests.
#[derive(Default)]
pub struct MockZoneIndex {
    zones: Vec<(Uuid, [f64; 4])>,
}

impl MockZoneIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a zone spanning `[min_lat, min_lng, max_lat, max_lng]`.
    pub fn with_zone(mut self, id: Uuid, bounds: [f64; 4]) -> Self {
        self.zones.push((id, bounds));
        self
    }

    fn covers(bounds: &[f64; 4], point: &Coordinates) -> bool {
        point.lat >= bounds[0]
            && point.lng >= bounds[1]
            && point.lat <= bounds[2]
            && point.lng <= bounds[3]
    }
}

#[async_trait]
impl ZoneIndex for MockZoneIndex {
    async fn zones_containing(&self, point: Coordinates) -> Result<Vec<Uuid>> {
        Ok(self
            .zones
            .iter()
            .filter(|(_, bounds)| Self::covers(bounds, &point))
            .map(|(id, _)| *id)
            .collect())
    }

    async fn zone_covers(&self, zone: Uuid, point: Coordinates) -> Result<bool> {
        Ok(self
            .zones
            .iter()
            .any(|(id, bounds)| *id == zone && Self::covers(bounds, &point)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_zone_containment() {
        let zone = Uuid::new_v4();
        let index = MockZoneIndex::new().with_zone(zone, [50.0, 13.0, 52.0, 15.0]);

        let inside = Coordinates::new(51.0, 14.0);
        let outside = Coordinates::new(49.0, 14.0);

        assert_eq!(index.zones_containing(inside).await.unwrap(), vec![zone]);
        assert!(index.zones_containing(outside).await.unwrap().is_empty());
        assert!(index.zone_covers(zone, inside).await.unwrap());
        assert!(!index.zone_covers(zone, outside).await.unwrap());
    }
}
