//! Tour and request row operations for cancellation and reassignment.

use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::types::{Interval, UnixMs};

#[derive(Debug, Clone, FromRow)]
pub struct TourRow {
    pub id: Uuid,
    pub vehicle: Uuid,
    pub departure: i64,
    pub arrival: i64,
    pub cancelled: bool,
    pub fare: Option<i32>,
}

/// A tour by id; `None` when it never existed or was absorbed by a merge.
pub async fn get_tour(pool: &PgPool, id: Uuid) -> Result<Option<TourRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, vehicle, departure, arrival, cancelled, fare FROM tour WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

#[derive(Debug, Clone, FromRow)]
pub struct RequestRow {
    pub id: Uuid,
    pub tour: Uuid,
    pub customer: Uuid,
    pub cancelled: bool,
    pub pending: bool,
    /// Earliest communicated time of the request's events.
    pub first_communicated_time: i64,
}

pub async fn get_request(pool: &PgPool, id: Uuid) -> Result<Option<RequestRow>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT r.id, r.tour, r.customer, r.cancelled, r.pending,
               MIN(e.communicated_time) AS first_communicated_time
        FROM request r
        INNER JOIN event e ON e.request = r.id
        WHERE r.id = $1
        GROUP BY r.id
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Mark a request and its events cancelled. Returns whether the whole tour
/// is now cancelled (cascaded).
pub async fn cancel_request_rows(
    conn: &mut PgConnection,
    request: Uuid,
    tour: Uuid,
) -> Result<bool, sqlx::Error> {
    sqlx::query("UPDATE request SET cancelled = TRUE WHERE id = $1")
        .bind(request)
        .execute(&mut *conn)
        .await?;
    sqlx::query("UPDATE event SET cancelled = TRUE WHERE request = $1")
        .bind(request)
        .execute(&mut *conn)
        .await?;
    let all_cancelled: bool =
        sqlx::query_scalar("SELECT bool_and(cancelled) FROM request WHERE tour = $1")
            .bind(tour)
            .fetch_one(&mut *conn)
            .await?;
    if all_cancelled {
        sqlx::query("UPDATE tour SET cancelled = TRUE WHERE id = $1")
            .bind(tour)
            .execute(&mut *conn)
            .await?;
    }
    Ok(all_cancelled)
}

pub async fn set_tour_vehicle(
    conn: &mut PgConnection,
    tour: Uuid,
    vehicle: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tour SET vehicle = $2 WHERE id = $1")
        .bind(tour)
        .bind(vehicle)
        .execute(conn)
        .await?;
    Ok(())
}

/// Count non-cancelled tours of `vehicle` overlapping `span`, excluding
/// `exclude` itself.
pub async fn count_overlapping_tours(
    conn: &mut PgConnection,
    vehicle: Uuid,
    span: Interval,
    exclude: Uuid,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM tour
        WHERE vehicle = $1 AND cancelled = FALSE AND id != $2
          AND departure < $3 AND arrival > $4
        "#,
    )
    .bind(vehicle)
    .bind(exclude)
    .bind(span.end_time)
    .bind(span.start_time)
    .fetch_one(conn)
    .await
}

/// Boundary event of a neighboring tour, for direct-duration repair.
#[derive(Debug, Clone, FromRow)]
pub struct TourBoundary {
    pub tour: Uuid,
    pub lat: f64,
    pub lng: f64,
}

/// Last event of the latest non-cancelled tour departing at or before
/// `departure`, excluding `exclude`.
pub async fn prev_tour_last_event(
    pool: &PgPool,
    vehicle: Uuid,
    departure: UnixMs,
    exclude: Option<Uuid>,
) -> Result<Option<TourBoundary>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT t.id AS tour, g.lat, g.lng
        FROM tour t
        INNER JOIN request r ON r.tour = t.id
        INNER JOIN event e ON e.request = r.id
        INNER JOIN event_group g ON g.id = e.event_group_id
        WHERE t.vehicle = $1 AND t.cancelled = FALSE AND r.cancelled = FALSE
          AND t.departure <= $2
          AND ($3::uuid IS NULL OR t.id != $3)
        ORDER BY t.departure DESC, g.scheduled_time_end DESC
        LIMIT 1
        "#,
    )
    .bind(vehicle)
    .bind(departure)
    .bind(exclude)
    .fetch_optional(pool)
    .await
}

/// First event of the earliest non-cancelled tour departing after
/// `departure`, excluding `exclude`.
pub async fn next_tour_first_event(
    pool: &PgPool,
    vehicle: Uuid,
    departure: UnixMs,
    exclude: Option<Uuid>,
) -> Result<Option<TourBoundary>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT t.id AS tour, g.lat, g.lng
        FROM tour t
        INNER JOIN request r ON r.tour = t.id
        INNER JOIN event e ON e.request = r.id
        INNER JOIN event_group g ON g.id = e.event_group_id
        WHERE t.vehicle = $1 AND t.cancelled = FALSE AND r.cancelled = FALSE
          AND t.departure > $2
          AND ($3::uuid IS NULL OR t.id != $3)
        ORDER BY t.departure ASC, g.scheduled_time_start ASC
        LIMIT 1
        "#,
    )
    .bind(vehicle)
    .bind(departure)
    .bind(exclude)
    .fetch_optional(pool)
    .await
}

/// Apply a batch of precomputed direct-duration changes.
pub async fn apply_direct_duration_updates(
    conn: &mut PgConnection,
    updates: &[(Uuid, Option<i64>)],
) -> Result<(), sqlx::Error> {
    for (tour, duration) in updates {
        sqlx::query("UPDATE tour SET direct_duration = $2 WHERE id = $1")
            .bind(tour)
            .bind(duration)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
