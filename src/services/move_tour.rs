//! Tour reassignment between vehicles of one company.

use sqlx::{FromRow, PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::db::begin_serializable;
use crate::db::queries::{snapshot, tour as tour_queries};
use crate::db::retry::retry_serializable;
use crate::error::BookingError;
use crate::services::capacity::{possible_insertion_ranges, InsertionRange};
use crate::services::notify::{notify_best_effort, Notifier, TourChange, TourNotification};
use crate::services::routing::{single_leg, RoutingOracle};
use crate::types::{Capacities, Coordinates, Interval, MoveTourPayload, UnixMs};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    Declined(&'static str),
}

#[derive(Debug, FromRow)]
struct VehicleCapacityRow {
    company: Uuid,
    passengers: i32,
    wheelchairs: i32,
    bikes: i32,
    luggage: i32,
}

async fn vehicle_capacities(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<VehicleCapacityRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT company, passengers, wheelchairs, bikes, luggage FROM vehicle WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Direct-duration repairs for both vehicles after the move: the old
/// chain closes over the gap, the new chain links the moved tour in.
async fn chain_repairs(
    oracle: &dyn RoutingOracle,
    pool: &PgPool,
    tour: &tour_queries::TourRow,
    new_vehicle: Uuid,
    first_event: Coordinates,
    last_event: Coordinates,
) -> Result<Vec<(Uuid, Option<i64>)>, BookingError> {
    let mut updates = Vec::new();

    // Old vehicle: the tour after the moved one now follows whatever came
    // before it.
    if let Some(next) =
        tour_queries::next_tour_first_event(pool, tour.vehicle, tour.departure, Some(tour.id))
            .await?
    {
        let prev =
            tour_queries::prev_tour_last_event(pool, tour.vehicle, tour.departure, Some(tour.id))
                .await?;
        let duration = match prev {
            Some(prev) => single_leg(
                oracle,
                Coordinates::new(prev.lat, prev.lng),
                Coordinates::new(next.lat, next.lng),
            )
            .await
            .map_err(BookingError::Oracle)?,
            None => None,
        };
        updates.push((next.tour, duration));
    }

    // New vehicle: the moved tour links to its new predecessor, and the
    // tour after it links to the moved tour.
    let new_prev =
        tour_queries::prev_tour_last_event(pool, new_vehicle, tour.departure, Some(tour.id))
            .await?;
    let moved_direct = match &new_prev {
        Some(prev) => single_leg(
            oracle,
            Coordinates::new(prev.lat, prev.lng),
            first_event,
        )
        .await
        .map_err(BookingError::Oracle)?,
        None => None,
    };
    updates.push((tour.id, moved_direct));

    if let Some(next) =
        tour_queries::next_tour_first_event(pool, new_vehicle, tour.departure, Some(tour.id))
            .await?
    {
        let duration = single_leg(
            oracle,
            last_event,
            Coordinates::new(next.lat, next.lng),
        )
        .await
        .map_err(BookingError::Oracle)?;
        updates.push((next.tour, duration));
    }

    Ok(updates)
}

/// Move a tour onto another vehicle of the same company.
pub async fn move_tour(
    pool: &PgPool,
    oracle: &dyn RoutingOracle,
    notifier: &dyn Notifier,
    payload: &MoveTourPayload,
    now: UnixMs,
) -> Result<MoveOutcome, BookingError> {
    let outcome = retry_serializable(|| async move {
        let Some(tour) = tour_queries::get_tour(pool, payload.tour_id).await? else {
            return Ok(MoveOutcome::Declined("tour not found"));
        };
        if tour.cancelled {
            return Ok(MoveOutcome::Declined("the tour is cancelled"));
        }
        let Some(current_vehicle) = vehicle_capacities(pool, tour.vehicle).await? else {
            return Ok(MoveOutcome::Declined("tour vehicle not found"));
        };
        if current_vehicle.company != payload.company_id {
            return Err(BookingError::AuthorizationDenied);
        }
        if payload.vehicle_id == tour.vehicle {
            return Ok(MoveOutcome::Declined(
                "the target vehicle already serves this tour",
            ));
        }
        let Some(target) = vehicle_capacities(pool, payload.vehicle_id).await? else {
            return Ok(MoveOutcome::Declined("target vehicle not found"));
        };
        if target.company != payload.company_id {
            return Err(BookingError::AuthorizationDenied);
        }

        let events = snapshot::load_tour_events(pool, tour.id)
            .await?
            .unwrap_or_default();
        if events.is_empty() {
            return Ok(MoveOutcome::Declined("the tour has no active events"));
        }

        // The whole tour must fit the target as one piece: a single range
        // spanning every position.
        let target_capacities = Capacities {
            passengers: target.passengers,
            wheelchairs: target.wheelchairs,
            bikes: target.bikes,
            luggage: target.luggage,
        };
        let ranges =
            possible_insertion_ranges(&target_capacities, &Capacities::default(), &events);
        let whole = InsertionRange {
            earliest_pickup: 0,
            latest_dropoff: events.len(),
        };
        if ranges != vec![whole] {
            return Ok(MoveOutcome::Declined(
                "the target vehicle lacks capacity on at least one leg of the tour",
            ));
        }

        let first_event_time = events
            .iter()
            .map(|e| e.scheduled_time_end)
            .min()
            .unwrap_or(tour.departure);
        if first_event_time < now {
            return Ok(MoveOutcome::Declined(
                "tours whose first customer is already picked up cannot be moved",
            ));
        }

        let first_coords = events[0].coordinates;
        let last_coords = events[events.len() - 1].coordinates;
        let chain_updates = chain_repairs(
            oracle,
            pool,
            &tour,
            payload.vehicle_id,
            first_coords,
            last_coords,
        )
        .await?;

        let mut tx = begin_serializable(pool).await?;
        let conn: &mut PgConnection = &mut tx;

        // The tour must not have moved or been cancelled since the reads
        // above.
        let still_there: Option<(Uuid, bool)> =
            sqlx::query_as("SELECT vehicle, cancelled FROM tour WHERE id = $1")
                .bind(tour.id)
                .fetch_optional(&mut *conn)
                .await?;
        if still_there != Some((tour.vehicle, false)) {
            return Err(BookingError::ConcurrencyConflict);
        }
        let collisions = tour_queries::count_overlapping_tours(
            conn,
            payload.vehicle_id,
            Interval::new(tour.departure, tour.arrival),
            tour.id,
        )
        .await?;
        if collisions != 0 {
            return Ok(MoveOutcome::Declined(
                "the target vehicle has an overlapping tour",
            ));
        }

        tour_queries::set_tour_vehicle(conn, tour.id, payload.vehicle_id).await?;
        tour_queries::apply_direct_duration_updates(conn, &chain_updates).await?;
        tx.commit().await?;

        Ok(MoveOutcome::Moved)
    })
    .await?;

    if outcome == MoveOutcome::Moved {
        info!(
            "moved tour {} to vehicle {}",
            payload.tour_id, payload.vehicle_id
        );
        if let Some(tour) = tour_queries::get_tour(pool, payload.tour_id).await? {
            notify_best_effort(
                notifier,
                TourNotification {
                    change: TourChange::Moved,
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
