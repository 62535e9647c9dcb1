//! Request and tour cancellation.
//!
//! Cancelling a request marks it and its events cancelled, cascades to the
//! tour when nothing else remains, and repairs the driving legs across the
//! seam the removed events leave behind. Seam routing runs before the
//! transaction opens; the transaction itself only writes.

use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::constants::PASSENGER_CHANGE_DURATION;
use crate::db::begin_serializable;
use crate::db::queries::{booking as booking_queries, snapshot, tour as tour_queries};
use crate::db::retry::retry_serializable;
use crate::error::BookingError;
use crate::services::leg_durations::{LegDurationUpdate, LegDurationUpdates};
use crate::services::notify::{notify_best_effort, Notifier, TourChange, TourNotification};
use crate::services::routing::{single_leg, RoutingOracle};
use crate::types::{EventEntry, UnixMs};

/// Outcome of a cancellation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Request cancelled; `tour_cancelled` when it was the tour's last one.
    Cancelled { tour_cancelled: bool },
    /// Politely refused, nothing was changed.
    Declined(&'static str),
}

/// Seam leg between two surviving events, trying the reverse direction
/// before giving up on the oracle.
async fn seam_duration(
    oracle: &dyn RoutingOracle,
    prev: &EventEntry,
    next: &EventEntry,
) -> Result<i64, BookingError> {
    let forward = single_leg(oracle, prev.coordinates, next.coordinates)
        .await
        .map_err(BookingError::Oracle)?;
    let driving = match forward {
        Some(d) => d,
        None => single_leg(oracle, next.coordinates, prev.coordinates)
            .await
            .map_err(BookingError::Oracle)?
            .ok_or(BookingError::RoutingUnavailable)?,
    };
    Ok(driving + PASSENGER_CHANGE_DURATION)
}

/// Leg repairs across the gap(s) the cancelled request leaves in its tour.
///
/// `events` are the tour's events with the cancelled request still
/// included; a request bracketing the rest repairs two seams, an
/// interior-adjacent pair just one.
async fn seam_repairs(
    oracle: &dyn RoutingOracle,
    events: &[EventEntry],
    cancelled_request: Uuid,
) -> Result<LegDurationUpdates, BookingError> {
    let idx1 = events
        .iter()
        .position(|e| e.request_id == cancelled_request);
    let idx2 = events
        .iter()
        .rposition(|e| e.request_id == cancelled_request);
    let (Some(idx1), Some(idx2)) = (idx1, idx2) else {
        return Err(BookingError::InvariantViolation(
            "cancelled request has no events in its tour".into(),
        ));
    };
    if idx1 >= idx2 {
        return Err(BookingError::InvariantViolation(
            "cancelled request is missing its pickup or dropoff".into(),
        ));
    }

    let mut updates = LegDurationUpdates::default();
    let mut repair = |prev: Option<&EventEntry>, next: Option<&EventEntry>, duration: i64| {
        if let (Some(prev), Some(next)) = (prev, next) {
            updates.next_leg.push(LegDurationUpdate {
                event_id: prev.id,
                duration,
            });
            updates.prev_leg.push(LegDurationUpdate {
                event_id: next.id,
                duration,
            });
        }
    };

    let seams: Vec<(Option<&EventEntry>, Option<&EventEntry>)> = if idx2 == idx1 + 1 {
        vec![(
            idx1.checked_sub(1).and_then(|i| events.get(i)),
            events.get(idx2 + 1),
        )]
    } else {
        vec![
            (idx1.checked_sub(1).and_then(|i| events.get(i)), events.get(idx1 + 1)),
            (idx2.checked_sub(1).and_then(|i| events.get(i)), events.get(idx2 + 1)),
        ]
    };
    for (prev, next) in seams {
        if let (Some(p), Some(n)) = (prev, next) {
            if p.event_group == n.event_group {
                continue;
            }
            let duration = seam_duration(oracle, p, n).await?;
            repair(Some(p), Some(n), duration);
        }
    }
    Ok(updates)
}

/// Direct-duration repair for the tour chain once a whole tour drops out.
async fn tour_chain_repair(
    pool: &PgPool,
    oracle: &dyn RoutingOracle,
    vehicle: Uuid,
    departure: UnixMs,
    removed_tour: Uuid,
) -> Result<Vec<(Uuid, Option<i64>)>, BookingError> {
    let next =
        tour_queries::next_tour_first_event(pool, vehicle, departure, Some(removed_tour)).await?;
    let Some(next) = next else {
        return Ok(vec![]);
    };
    let prev =
        tour_queries::prev_tour_last_event(pool, vehicle, departure, Some(removed_tour)).await?;
    let duration = match prev {
        Some(prev) => single_leg(
            oracle,
            crate::types::Coordinates::new(prev.lat, prev.lng),
            crate::types::Coordinates::new(next.lat, next.lng),
        )
        .await
        .map_err(BookingError::Oracle)?,
        None => None,
    };
    Ok(vec![(next.tour, duration)])
}

/// Cancel one request on behalf of its customer.
pub async fn cancel_request(
    pool: &PgPool,
    oracle: &dyn RoutingOracle,
    notifier: &dyn Notifier,
    request_id: Uuid,
    customer: Uuid,
    now: UnixMs,
) -> Result<CancelOutcome, BookingError> {
    let outcome = retry_serializable(|| async move {
        let Some(request) = tour_queries::get_request(pool, request_id).await? else {
            return Err(BookingError::AuthorizationDenied);
        };
        if request.customer != customer {
            return Err(BookingError::AuthorizationDenied);
        }
        if request.cancelled {
            return Ok(CancelOutcome::Cancelled {
                tour_cancelled: false,
            });
        }
        if request.first_communicated_time <= now {
            return Ok(CancelOutcome::Declined(
                "the ride has already started and can no longer be cancelled",
            ));
        }
        let tour = tour_queries::get_tour(pool, request.tour)
            .await?
            .ok_or(BookingError::ConcurrencyConflict)?;

        let events = snapshot::load_tour_events(pool, request.tour)
            .await?
            .unwrap_or_default();
        let leg_updates = seam_repairs(oracle, &events, request_id).await?;

        // Predict the cascade so the tour-chain repair can be routed before
        // the transaction; the write itself re-derives it authoritatively.
        let others: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM request WHERE tour = $1 AND cancelled = FALSE AND id != $2",
        )
        .bind(request.tour)
        .bind(request_id)
        .fetch_one(pool)
        .await?;
        let chain_updates = if others == 0 {
            tour_chain_repair(pool, oracle, tour.vehicle, tour.departure, tour.id).await?
        } else {
            vec![]
        };

        let mut tx = begin_serializable(pool).await?;
        let conn: &mut PgConnection = &mut tx;
        let tour_cancelled =
            tour_queries::cancel_request_rows(conn, request_id, request.tour).await?;
        if tour_cancelled != (others == 0) {
            // Another booking or cancellation slipped in between the read
            // and the write.
            return Err(BookingError::ConcurrencyConflict);
        }
        if !tour_cancelled {
            booking_queries::apply_leg_duration_updates(conn, &leg_updates).await?;
        }
        tour_queries::apply_direct_duration_updates(conn, &chain_updates).await?;
        tx.commit().await?;

        Ok(CancelOutcome::Cancelled { tour_cancelled })
    })
    .await?;

    if let CancelOutcome::Cancelled { tour_cancelled } = &outcome {
        info!(
            "cancelled request {} (tour cascade: {})",
            request_id, tour_cancelled
        );
        if *tour_cancelled {
            if let Some(request) = tour_queries::get_request(pool, request_id).await? {
                if let Some(tour) = tour_queries::get_tour(pool, request.tour).await? {
                    notify_best_effort(
                        notifier,
                        TourNotification {
                            change: TourChange::Cancelled,
                            tour: tour.id,
                            vehicle: tour.vehicle,
                            pickup_time: request.first_communicated_time,
                        },
                    )
                    .await;
                }
            }
        }
    }
    Ok(outcome)
}

/// Cancel a whole tour on behalf of its operating company.
pub async fn cancel_tour(
    pool: &PgPool,
    oracle: &dyn RoutingOracle,
    notifier: &dyn Notifier,
    tour_id: Uuid,
    company: Uuid,
) -> Result<CancelOutcome, BookingError> {
    let outcome = retry_serializable(|| async move {
        let Some(tour) = tour_queries::get_tour(pool, tour_id).await? else {
            return Ok(CancelOutcome::Declined("tour not found"));
        };
        let owner: Option<Uuid> =
            sqlx::query_scalar("SELECT company FROM vehicle WHERE id = $1")
                .bind(tour.vehicle)
                .fetch_optional(pool)
                .await?;
        if owner != Some(company) {
            return Err(BookingError::AuthorizationDenied);
        }
        if tour.cancelled {
            return Ok(CancelOutcome::Cancelled {
                tour_cancelled: false,
            });
        }
        if tour.fare.is_some() {
            return Ok(CancelOutcome::Declined(
                "the fare was already registered, the tour can no longer be cancelled",
            ));
        }

        let chain_updates =
            tour_chain_repair(pool, oracle, tour.vehicle, tour.departure, tour.id).await?;

        let mut tx = begin_serializable(pool).await?;
        let conn: &mut PgConnection = &mut tx;
        sqlx::query(
            "UPDATE event SET cancelled = TRUE WHERE request IN (SELECT id FROM request WHERE tour = $1)",
        )
        .bind(tour_id)
        .execute(&mut *conn)
        .await?;
        sqlx::query("UPDATE request SET cancelled = TRUE WHERE tour = $1")
            .bind(tour_id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("UPDATE tour SET cancelled = TRUE WHERE id = $1")
            .bind(tour_id)
            .execute(&mut *conn)
            .await?;
        tour_queries::apply_direct_duration_updates(conn, &chain_updates).await?;
        tx.commit().await?;

        Ok(CancelOutcome::Cancelled {
            tour_cancelled: true,
        })
    })
    .await?;

    if matches!(
        outcome,
        CancelOutcome::Cancelled {
            tour_cancelled: true
        }
    ) {
        if let Some(tour) = tour_queries::get_tour(pool, tour_id).await? {
            notify_best_effort(
                notifier,
                TourNotification {
                    change: TourChange::Cancelled,
                    tour: tour.id,
                    vehicle: tour.vehicle,
                    pickup_time: tour.departure,
                },
            )
            .await;
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MINUTE;
    use crate::services::routing::MockRoutingOracle;
    use crate::types::{Capacities, Coordinates, Interval};

    fn event(request_id: Uuid, at: Coordinates, start: i64) -> EventEntry {
        EventEntry {
            id: Uuid::new_v4(),
            request_id,
            tour_id: Uuid::new_v4(),
            event_group: Uuid::new_v4(),
            is_pickup: true,
            coordinates: at,
            scheduled_time_start: start,
            scheduled_time_end: start + 5 * MINUTE,
            communicated_time: start,
            prev_leg_duration: 5 * MINUTE,
            next_leg_duration: 5 * MINUTE,
            capacities: Capacities::default(),
            tour_departure: 0,
            tour_arrival: 4 * 60 * MINUTE,
            direct_duration: None,
        }
    }

    #[tokio::test]
    async fn test_adjacent_pair_repairs_one_seam() {
        let oracle = MockRoutingOracle::new();
        let keep = Uuid::new_v4();
        let gone = Uuid::new_v4();
        // keep-pickup, gone-pickup, gone-dropoff, keep-dropoff
        let events = vec![
            event(keep, Coordinates::new(51.01, 13.70), 0),
            event(gone, Coordinates::new(51.02, 13.71), 10 * MINUTE),
            event(gone, Coordinates::new(51.03, 13.72), 20 * MINUTE),
            event(keep, Coordinates::new(51.04, 13.73), 30 * MINUTE),
        ];
        let updates = seam_repairs(&oracle, &events, gone).await.unwrap();
        assert_eq!(updates.next_leg.len(), 1);
        assert_eq!(updates.prev_leg.len(), 1);
        assert_eq!(updates.next_leg[0].event_id, events[0].id);
        assert_eq!(updates.prev_leg[0].event_id, events[3].id);
        assert!(updates.prev_leg[0].duration > PASSENGER_CHANGE_DURATION);
    }

    #[tokio::test]
    async fn test_bracketing_request_repairs_two_seams() {
        let oracle = MockRoutingOracle::new();
        let keep = Uuid::new_v4();
        let gone = Uuid::new_v4();
        // gone-pickup, keep-pickup, keep-dropoff, gone-dropoff
        let events = vec![
            event(gone, Coordinates::new(51.01, 13.70), 0),
            event(keep, Coordinates::new(51.02, 13.71), 10 * MINUTE),
            event(keep, Coordinates::new(51.03, 13.72), 20 * MINUTE),
            event(gone, Coordinates::new(51.04, 13.73), 30 * MINUTE),
        ];
        let updates = seam_repairs(&oracle, &events, gone).await.unwrap();
        // Both seams touch the edge of the sequence, so each repairs only
        // where a neighbor pair survives: none before the first pickup,
        // none after the last dropoff.
        assert!(updates.next_leg.is_empty());
        assert!(updates.prev_leg.is_empty());
    }

    #[tokio::test]
    async fn test_interior_bracketing_repairs_both_sides() {
        let oracle = MockRoutingOracle::new();
        let keep = Uuid::new_v4();
        let gone = Uuid::new_v4();
        let other = Uuid::new_v4();
        // other-pickup, gone-pickup, keep-pickup, keep-dropoff,
        // gone-dropoff, other-dropoff
        let events = vec![
            event(other, Coordinates::new(51.00, 13.69), 0),
            event(gone, Coordinates::new(51.01, 13.70), 10 * MINUTE),
            event(keep, Coordinates::new(51.02, 13.71), 20 * MINUTE),
            event(keep, Coordinates::new(51.03, 13.72), 30 * MINUTE),
            event(gone, Coordinates::new(51.04, 13.73), 40 * MINUTE),
            event(other, Coordinates::new(51.05, 13.74), 50 * MINUTE),
        ];
        let updates = seam_repairs(&oracle, &events, gone).await.unwrap();
        assert_eq!(updates.next_leg.len(), 2);
        assert_eq!(updates.prev_leg.len(), 2);
        assert_eq!(updates.next_leg[0].event_id, events[0].id);
        assert_eq!(updates.prev_leg[0].event_id, events[2].id);
        assert_eq!(updates.next_leg[1].event_id, events[3].id);
        assert_eq!(updates.prev_leg[1].event_id, events[5].id);
    }

    #[tokio::test]
    async fn test_lone_event_is_invariant_violation() {
        let oracle = MockRoutingOracle::new();
        let gone = Uuid::new_v4();
        let events = vec![event(gone, Coordinates::new(51.01, 13.70), 0)];
        let result = seam_repairs(&oracle, &events, gone).await;
        assert!(matches!(
            result,
            Err(BookingError::InvariantViolation(_))
        ));
    }
}
