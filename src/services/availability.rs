//! Vehicle availability maintenance.
//!
//! Availability edits rewrite the vehicle's whole interval set: added
//! ranges merge with what is stored, removed ranges punch holes. The write
//! happens under an explicit exclusive table lock, the legacy discipline
//! for this path.

use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::db::begin_serializable;
use crate::db::queries::availability as availability_queries;
use crate::db::retry::retry_serializable;
use crate::error::BookingError;
use crate::types::{AvailabilityUpdatePayload, Interval};

/// Pure merge step: existing intervals plus additions, minus removals.
pub fn merged_availabilities(
    existing: &[Interval],
    add: &[Interval],
    remove: &[Interval],
) -> Vec<Interval> {
    let mut intervals = existing.to_vec();
    intervals.extend_from_slice(add);
    let merged = Interval::merge_all(intervals);
    Interval::subtract_all(&merged, remove)
        .into_iter()
        .filter(|i| i.size() > 0)
        .collect()
}

/// Apply an availability update for one vehicle.
pub async fn update_availability(
    pool: &PgPool,
    payload: &AvailabilityUpdatePayload,
) -> Result<Vec<Interval>, BookingError> {
    let result = retry_serializable(|| async move {
        let mut tx = begin_serializable(pool).await?;
        let conn: &mut PgConnection = &mut tx;
        availability_queries::lock_availability_table(conn).await?;

        let rows = availability_queries::vehicle_availabilities(conn, payload.vehicle_id).await?;
        let existing: Vec<Interval> = rows.iter().map(|r| r.interval()).collect();
        let merged = merged_availabilities(&existing, &payload.add, &payload.remove);

        let row_ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        availability_queries::delete_availabilities(conn, &row_ids).await?;
        availability_queries::insert_availabilities(conn, payload.vehicle_id, &merged).await?;
        tx.commit().await?;
        Ok(merged)
    })
    .await?;

    info!(
        "availability of vehicle {} rewritten to {} intervals",
        payload.vehicle_id,
        result.len()
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::HOUR;

    #[test]
    fn test_additions_merge_with_existing() {
        let existing = vec![Interval::new(0, 2 * HOUR)];
        let add = vec![Interval::new(2 * HOUR, 4 * HOUR)];
        let merged = merged_availabilities(&existing, &add, &[]);
        assert_eq!(merged, vec![Interval::new(0, 4 * HOUR)]);
    }

    #[test]
    fn test_removal_splits_interval() {
        let existing = vec![Interval::new(0, 4 * HOUR)];
        let remove = vec![Interval::new(HOUR, 2 * HOUR)];
        let merged = merged_availabilities(&existing, &[], &remove);
        assert_eq!(
            merged,
            vec![Interval::new(0, HOUR), Interval::new(2 * HOUR, 4 * HOUR)]
        );
    }

    #[test]
    fn test_removal_of_everything_leaves_nothing() {
        let existing = vec![Interval::new(0, HOUR), Interval::new(2 * HOUR, 3 * HOUR)];
        let remove = vec![Interval::new(0, 4 * HOUR)];
        assert!(merged_availabilities(&existing, &[], &remove).is_empty());
    }

    #[test]
    fn test_disjoint_additions_stay_disjoint() {
        let merged = merged_availabilities(
            &[],
            &[Interval::new(0, HOUR), Interval::new(3 * HOUR, 4 * HOUR)],
            &[],
        );
        assert_eq!(
            merged,
            vec![Interval::new(0, HOUR), Interval::new(3 * HOUR, 4 * HOUR)]
        );
    }
}
