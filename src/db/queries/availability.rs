//! Availability row operations.

use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use crate::types::Interval;

/// Legacy discipline for availability edits: the merge below reads the
/// whole set and rewrites it, so concurrent editors are excluded with an
/// explicit table lock instead of relying on isolation-level conflicts.
pub async fn lock_availability_table(conn: &mut PgConnection) -> Result<(), sqlx::Error> {
    sqlx::query("LOCK TABLE availability IN ACCESS EXCLUSIVE MODE")
        .execute(conn)
        .await?;
    Ok(())
}

#[derive(Debug, Clone, FromRow)]
pub struct AvailabilityRow {
    pub id: Uuid,
    pub start_time: i64,
    pub end_time: i64,
}

impl AvailabilityRow {
    pub fn interval(&self) -> Interval {
        Interval::new(self.start_time, self.end_time)
    }
}

pub async fn vehicle_availabilities(
    conn: &mut PgConnection,
    vehicle: Uuid,
) -> Result<Vec<AvailabilityRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, start_time, end_time FROM availability WHERE vehicle = $1 ORDER BY start_time",
    )
    .bind(vehicle)
    .fetch_all(conn)
    .await
}

pub async fn delete_availabilities(
    conn: &mut PgConnection,
    ids: &[Uuid],
) -> Result<(), sqlx::Error> {
    if ids.is_empty() {
        return Ok(());
    }
    sqlx::query("DELETE FROM availability WHERE id = ANY($1)")
        .bind(ids)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn insert_availabilities(
    conn: &mut PgConnection,
    vehicle: Uuid,
    intervals: &[Interval],
) -> Result<(), sqlx::Error> {
    for interval in intervals {
        sqlx::query(
            "INSERT INTO availability (id, vehicle, start_time, end_time) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(vehicle)
        .bind(interval.start_time)
        .bind(interval.end_time)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
