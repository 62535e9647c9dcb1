//! Row operations of the booking commit.
//!
//! Each function is one typed step of the commit transaction; the service
//! layer sequences them so the whole booking is applied atomically or not
//! at all.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::services::leg_durations::LegDurationUpdates;
use crate::services::scheduled_times::ScheduledTimeUpdate;
use crate::types::{Capacities, Coordinates, UnixMs};

pub async fn insert_tour(
    conn: &mut PgConnection,
    vehicle: Uuid,
    departure: UnixMs,
    arrival: UnixMs,
    direct_duration: Option<i64>,
) -> Result<Uuid, sqlx::Error> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO tour (id, vehicle, departure, arrival, cancelled, direct_duration)
        VALUES ($1, $2, $3, $4, FALSE, $5)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(vehicle)
    .bind(departure)
    .bind(arrival)
    .bind(direct_duration)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

/// Absorb `absorbed` tours into `target`: requests move over, the target's
/// bounds grow to the union, the absorbed rows disappear.
pub async fn merge_tours(
    conn: &mut PgConnection,
    target: Uuid,
    absorbed: &[Uuid],
    departure: Option<UnixMs>,
    arrival: Option<UnixMs>,
) -> Result<(), sqlx::Error> {
    if !absorbed.is_empty() {
        sqlx::query("UPDATE request SET tour = $1 WHERE tour = ANY($2)")
            .bind(target)
            .bind(absorbed)
            .execute(&mut *conn)
            .await?;
    }
    sqlx::query(
        r#"
        UPDATE tour
        SET departure = LEAST(departure, COALESCE($2, departure)),
            arrival = GREATEST(arrival, COALESCE($3, arrival))
        WHERE id = $1
        "#,
    )
    .bind(target)
    .bind(departure)
    .bind(arrival)
    .execute(&mut *conn)
    .await?;
    if !absorbed.is_empty() {
        sqlx::query("DELETE FROM tour WHERE id = ANY($1)")
            .bind(absorbed)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn set_tour_direct_duration(
    conn: &mut PgConnection,
    tour: Uuid,
    duration: Option<i64>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tour SET direct_duration = $2 WHERE id = $1")
        .bind(tour)
        .bind(duration)
        .execute(conn)
        .await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_request(
    conn: &mut PgConnection,
    tour: Uuid,
    customer: Uuid,
    capacities: &Capacities,
    fare: i32,
    ticket_code: &str,
) -> Result<Uuid, sqlx::Error> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO request (
            id, tour, customer, passengers, wheelchairs, bikes, luggage,
            fare, ticket_code, cancelled, pending
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE, FALSE)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(tour)
    .bind(customer)
    .bind(capacities.passengers)
    .bind(capacities.wheelchairs)
    .bind(capacities.bikes)
    .bind(capacities.luggage)
    .bind(fare)
    .bind(ticket_code)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_event_group(
    conn: &mut PgConnection,
    id: Uuid,
    coordinates: Coordinates,
    address: &str,
    scheduled_time_start: UnixMs,
    scheduled_time_end: UnixMs,
    prev_leg_duration: i64,
    next_leg_duration: i64,
) -> Result<Uuid, sqlx::Error> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO event_group (
            id, lat, lng, address,
            scheduled_time_start, scheduled_time_end,
            prev_leg_duration, next_leg_duration
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(coordinates.lat)
    .bind(coordinates.lng)
    .bind(address)
    .bind(scheduled_time_start)
    .bind(scheduled_time_end)
    .bind(prev_leg_duration)
    .bind(next_leg_duration)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

/// Reuse an existing group for a coincident event: the window tightens to
/// the intersection of the old and new bounds.
pub async fn tighten_event_group(
    conn: &mut PgConnection,
    group: Uuid,
    scheduled_time_start: UnixMs,
    scheduled_time_end: UnixMs,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE event_group
        SET scheduled_time_start = GREATEST(scheduled_time_start, $2),
            scheduled_time_end = LEAST(scheduled_time_end, $3)
        WHERE id = $1
        "#,
    )
    .bind(group)
    .bind(scheduled_time_start)
    .bind(scheduled_time_end)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn insert_event(
    conn: &mut PgConnection,
    request: Uuid,
    group: Uuid,
    is_pickup: bool,
    communicated_time: UnixMs,
) -> Result<Uuid, sqlx::Error> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO event (id, request, event_group_id, is_pickup, communicated_time, cancelled)
        VALUES ($1, $2, $3, $4, $5, FALSE)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(request)
    .bind(group)
    .bind(is_pickup)
    .bind(communicated_time)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

/// Point an existing event at another group (tour merges join coincident
/// events of the absorbed tour into the surviving group).
pub async fn reassign_event_group(
    conn: &mut PgConnection,
    event: Uuid,
    group: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE event SET event_group_id = $2 WHERE id = $1")
        .bind(event)
        .bind(group)
        .execute(conn)
        .await?;
    Ok(())
}

/// Apply the batched window updates computed by the schedule adjuster.
pub async fn apply_scheduled_time_updates(
    conn: &mut PgConnection,
    updates: &[ScheduledTimeUpdate],
) -> Result<(), sqlx::Error> {
    for update in updates {
        let column = if update.start {
            "scheduled_time_start"
        } else {
            "scheduled_time_end"
        };
        sqlx::query(&format!(
            r#"
            UPDATE event_group g
            SET {column} = $2
            FROM event e
            WHERE e.id = $1 AND g.id = e.event_group_id
            "#
        ))
        .bind(update.event_id)
        .bind(update.time)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Apply the batched leg-duration updates in one pass.
pub async fn apply_leg_duration_updates(
    conn: &mut PgConnection,
    updates: &LegDurationUpdates,
) -> Result<(), sqlx::Error> {
    for update in &updates.prev_leg {
        sqlx::query(
            r#"
            UPDATE event_group g
            SET prev_leg_duration = $2
            FROM event e
            WHERE e.id = $1 AND g.id = e.event_group_id
            "#,
        )
        .bind(update.event_id)
        .bind(update.duration)
        .execute(&mut *conn)
        .await?;
    }
    for update in &updates.next_leg {
        sqlx::query(
            r#"
            UPDATE event_group g
            SET next_leg_duration = $2
            FROM event e
            WHERE e.id = $1 AND g.id = e.event_group_id
            "#,
        )
        .bind(update.event_id)
        .bind(update.duration)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
