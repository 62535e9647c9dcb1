//! Booking preparation and the transactional commit.
//!
//! A booking runs in two phases. Preparation re-evaluates the trip against
//! a fresh snapshot with the promised times pinned, resolves event groups,
//! tour merges and all batched updates, and makes every routing-oracle
//! call. The commit opens one serializable transaction, re-reads the
//! vehicle's event sequence to verify nothing moved, and applies the
//! prepared steps; it performs no network I/O. The whole unit retries on
//! serialization conflicts, so a racing booking's loser re-prepares
//! against the winner's committed state and then reports infeasibility.

use rand::distributions::Alphanumeric;
use rand::Rng;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::constants::{FIXED_PRICE, MAX_TRAVEL};
use crate::db::queries::{booking as booking_queries, snapshot};
use crate::db::retry::retry_serializable;
use crate::db::begin_serializable;
use crate::error::BookingError;
use crate::services::feasibility::{find_company, load_planning_snapshot, user_chosen_side};
use crate::services::insertion::evaluate_request;
use crate::services::insertion::topology::{comes_from_company, returns_to_company};
use crate::services::leg_durations::{leg_duration_updates, LegDurationUpdate, LegDurationUpdates};
use crate::services::notify::{notify_best_effort, Notifier, TourChange, TourNotification};
use crate::services::routing::{single_leg, RoutingOracle};
use crate::services::scheduled_times::{scheduled_time_updates, AdjacentEvents, ScheduledTimeUpdate};
use crate::services::zones::ZoneIndex;
use crate::types::{
    BookingCommitRequest, Coordinates, EventEntry, InsertHow, Insertion, Interval, PromisedTimes,
    StopCandidate, TripQuery, UnixMs, VehicleSnapshot,
};

/// An event group to attach a new event to: an existing one (coincident
/// stop) or a new row with a pre-generated id.
#[derive(Debug, Clone, Copy)]
pub struct GroupResolution {
    pub id: Uuid,
    pub reuse: bool,
}

/// Everything the commit transaction needs, computed up front.
#[derive(Debug)]
pub struct PreparedBooking {
    pub best: Insertion,
    pub tour_departure: Option<UnixMs>,
    pub tour_arrival: Option<UnixMs>,
    /// Tours absorbed into the target on a bridging insertion.
    pub merge_list: Vec<Uuid>,
    pub pickup_group: GroupResolution,
    pub dropoff_group: GroupResolution,
    /// Events of an absorbed tour that join the new event's group.
    pub group_reassignments: Vec<(Uuid, Uuid)>,
    pub scheduled_updates: Vec<ScheduledTimeUpdate>,
    pub leg_updates: LegDurationUpdates,
    /// Direct duration of the resolved tour toward its predecessor.
    pub this_tour_direct: Option<Option<i64>>,
    /// Direct duration update for the following tour.
    pub next_tour_direct: Option<(Uuid, Option<i64>)>,
    /// The vehicle's event sequence the evaluation was based on.
    pub expected_event_ids: Vec<Uuid>,
    pub validation_window: Interval,
    pub fare: i32,
    pub ticket_code: String,
}

fn ticket_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Resolve the event group for one new event at a gap.
fn resolve_event_group(
    events: &[EventEntry],
    coordinates: Coordinates,
    prev_idx: Option<usize>,
    next_idx: Option<usize>,
    how: InsertHow,
) -> (GroupResolution, Vec<(Uuid, Uuid)>) {
    let resolution = if how == InsertHow::NewTour {
        GroupResolution {
            id: Uuid::new_v4(),
            reuse: false,
        }
    } else {
        let comparison = if how == InsertHow::Prepend {
            next_idx.and_then(|i| events.get(i))
        } else {
            prev_idx.and_then(|i| events.get(i))
        };
        match comparison {
            Some(event) if event.coordinates.is_same_place(&coordinates) => GroupResolution {
                id: event.event_group,
                reuse: true,
            },
            _ => GroupResolution {
                id: Uuid::new_v4(),
                reuse: false,
            },
        }
    };

    // A bridge pulls coincident leading events of the joined tour into the
    // new group.
    let mut reassignments = Vec::new();
    if how == InsertHow::Connect {
        if let Some(next_idx) = next_idx {
            if let Some(next_tour) = events.get(next_idx).map(|e| e.tour_id) {
                for event in &events[next_idx..] {
                    if event.tour_id != next_tour
                        || !event.coordinates.is_same_place(&coordinates)
                    {
                        break;
                    }
                    if !(resolution.reuse && event.event_group == resolution.id) {
                        reassignments.push((event.id, resolution.id));
                    }
                }
            }
        }
    }
    (resolution, reassignments)
}

/// Tours the insertion welds together (empty when it stays inside one).
fn merge_tour_list(
    events: &[EventEntry],
    pickup_how: InsertHow,
    dropoff_how: InsertHow,
    pickup_idx: Option<usize>,
    dropoff_idx: Option<usize>,
) -> Vec<Uuid> {
    let (Some(from), Some(to)) = (pickup_idx, dropoff_idx) else {
        return vec![];
    };
    if events.is_empty() {
        return vec![];
    }
    let mut tours: Vec<Uuid> = Vec::new();
    let mut push = |id: Uuid| {
        if !tours.contains(&id) {
            tours.push(id);
        }
    };
    if pickup_how == InsertHow::Connect && from > 0 {
        push(events[from - 1].tour_id);
    }
    if dropoff_how == InsertHow::Connect {
        if let Some(event) = events.get(to) {
            push(event.tour_id);
        }
    }
    for event in events.iter().take(to).skip(from) {
        push(event.tour_id);
    }
    if tours.len() <= 1 {
        vec![]
    } else {
        tours
    }
}

/// Seam pairs of the merged tours, index-aligned earlier/later, plus the
/// union bounds.
struct MergedSeams {
    departure: Option<UnixMs>,
    arrival: Option<UnixMs>,
    last_events: Vec<EventEntry>,
    first_events: Vec<EventEntry>,
}

fn merged_tour_seams(events: &[EventEntry], merge_list: &[Uuid], best: &Insertion) -> MergedSeams {
    if merge_list.is_empty() || best.pickup_how == InsertHow::NewTour {
        return MergedSeams {
            departure: None,
            arrival: None,
            last_events: vec![],
            first_events: vec![],
        };
    }
    let merged: Vec<&EventEntry> = events
        .iter()
        .filter(|e| merge_list.contains(&e.tour_id))
        .collect();
    let departure = merged.iter().map(|e| e.tour_departure).min();
    let arrival = merged.iter().map(|e| e.tour_arrival).max();

    let mut first_events = Vec::new();
    let mut last_events = Vec::new();
    for tour in merge_list {
        let mut tour_events: Vec<&EventEntry> =
            merged.iter().copied().filter(|e| e.tour_id == *tour).collect();
        tour_events.sort_by_key(|e| (e.scheduled_time_start, e.scheduled_time_end));
        let (Some(first), Some(last)) = (tour_events.first(), tour_events.last()) else {
            continue;
        };
        if Some(first.tour_departure) != departure
            && Some(first.id) != best.next_pickup_id
            && Some(first.id) != best.next_dropoff_id
        {
            first_events.push((*first).clone());
        }
        if Some(last.tour_arrival) != arrival
            && Some(last.id) != best.prev_pickup_id
            && Some(last.id) != best.prev_dropoff_id
        {
            last_events.push((*last).clone());
        }
    }
    first_events.sort_by_key(|e| e.scheduled_time_start);
    last_events.sort_by_key(|e| e.scheduled_time_end);
    MergedSeams {
        departure,
        arrival,
        last_events,
        first_events,
    }
}

/// Leg updates for the persisted neighbors of the new events. Their stored
/// durations are already known from the evaluation; no oracle calls here.
fn neighbor_leg_updates(
    best: &Insertion,
    events: &[EventEntry],
    pickup_group: &GroupResolution,
    dropoff_group: &GroupResolution,
) -> LegDurationUpdates {
    let mut updates = LegDurationUpdates::default();
    let split = best.pickup_idx != best.dropoff_idx;

    if !comes_from_company(best.pickup_how) {
        if let Some(prev) = best.pickup_idx.and_then(|i| i.checked_sub(1)).and_then(|i| events.get(i)) {
            if !(pickup_group.reuse && prev.event_group == pickup_group.id) {
                updates.next_leg.push(LegDurationUpdate {
                    event_id: prev.id,
                    duration: best.pickup_prev_leg_duration,
                });
            }
        }
    }
    if !returns_to_company(best.dropoff_how) {
        if let Some(next) = best.dropoff_idx.and_then(|i| events.get(i)) {
            if !(dropoff_group.reuse && next.event_group == dropoff_group.id) {
                updates.prev_leg.push(LegDurationUpdate {
                    event_id: next.id,
                    duration: best.dropoff_next_leg_duration,
                });
            }
        }
    }
    if split {
        if let Some(next_pickup) = best.pickup_idx.and_then(|i| events.get(i)) {
            updates.prev_leg.push(LegDurationUpdate {
                event_id: next_pickup.id,
                duration: best.pickup_next_leg_duration,
            });
        }
        if let Some(prev_dropoff) = best
            .dropoff_idx
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| events.get(i))
        {
            updates.next_leg.push(LegDurationUpdate {
                event_id: prev_dropoff.id,
                duration: best.dropoff_prev_leg_duration,
            });
        }
    }
    updates
}

/// Direct-duration links toward the neighboring tours, when the insertion
/// opens or closes a tour.
async fn direct_durations(
    oracle: &dyn RoutingOracle,
    best: &Insertion,
    vehicle: &VehicleSnapshot,
    pickup_coordinates: Coordinates,
    dropoff_coordinates: Coordinates,
) -> Result<(Option<Option<i64>>, Option<(Uuid, Option<i64>)>), BookingError> {
    let events = &vehicle.events;

    let mut this_tour = None;
    if comes_from_company(best.pickup_how) {
        let prev_other = match best.pickup_how {
            InsertHow::NewTour => events
                .iter()
                .filter(|e| e.communicated_time <= best.pickup_time)
                .last()
                .or(vehicle.last_event_before.as_ref()),
            _ => best
                .pickup_idx
                .and_then(|i| i.checked_sub(1))
                .and_then(|i| events.get(i))
                .or(vehicle.last_event_before.as_ref()),
        };
        if let Some(prev) = prev_other {
            let duration = single_leg(oracle, prev.coordinates, pickup_coordinates)
                .await
                .map_err(BookingError::Oracle)?;
            this_tour = Some(duration);
        }
    }

    let mut next_tour = None;
    if returns_to_company(best.dropoff_how) {
        let next_other = match best.dropoff_how {
            InsertHow::NewTour => events
                .iter()
                .find(|e| e.communicated_time >= best.dropoff_time)
                .or(vehicle.first_event_after.as_ref()),
            _ => best
                .dropoff_idx
                .and_then(|i| events.get(i))
                .or(vehicle.first_event_after.as_ref()),
        };
        if let Some(next) = next_other {
            let duration = single_leg(oracle, dropoff_coordinates, next.coordinates)
                .await
                .map_err(BookingError::Oracle)?;
            next_tour = Some((next.tour_id, duration));
        }
    }
    Ok((this_tour, next_tour))
}

/// Re-evaluate the trip with pinned promises and assemble the commit plan.
pub async fn prepare_booking(
    pool: &PgPool,
    oracle: &dyn RoutingOracle,
    zones: &dyn ZoneIndex,
    request: &BookingCommitRequest,
    now: UnixMs,
) -> Result<PreparedBooking, BookingError> {
    let connection = &request.connection;
    let stop_side = if request.start_fixed {
        connection.start
    } else {
        connection.target
    };
    let stop_time = if request.start_fixed {
        connection.start_time
    } else {
        connection.target_time
    };
    let query = TripQuery {
        start: connection.start,
        target: connection.target,
        stops: vec![StopCandidate {
            lat: stop_side.lat,
            lng: stop_side.lng,
            times: vec![stop_time],
        }],
        start_fixed: request.start_fixed,
        capacities: request.capacities,
        earliest: connection.start_time,
        latest: connection.target_time,
    };
    let promised = PromisedTimes {
        pickup: request.insertion.pickup_time,
        dropoff: request.insertion.dropoff_time,
    };

    // One snapshot feeds both the evaluation and the commit plan, so the
    // chosen indices refer to exactly the sequence validated in the
    // transaction.
    let (companies, covered) = load_planning_snapshot(pool, zones, &query).await?;
    if companies.is_empty() || covered.iter().all(|c| !c) {
        return Err(BookingError::Infeasible);
    }
    let candidates = evaluate_request(
        oracle,
        &companies,
        &query.capacities,
        query.start_fixed,
        user_chosen_side(&query),
        &query.stops,
        Interval::new(query.earliest, query.latest),
        now,
        Some(&promised),
    )
    .await?;
    let best = candidates
        .into_iter()
        .flatten()
        .flatten()
        .next()
        .ok_or(BookingError::Infeasible)?;

    let company = find_company(&companies, best.company).ok_or(BookingError::Infeasible)?;
    let vehicle = company
        .vehicles
        .iter()
        .find(|v| v.id == best.vehicle)
        .ok_or(BookingError::Infeasible)?;
    let events = &vehicle.events;

    let pickup_prev_idx = best.pickup_idx.and_then(|i| i.checked_sub(1));
    let dropoff_prev_idx = best.dropoff_idx.and_then(|i| i.checked_sub(1));
    let (pickup_group, pickup_reassignments) = resolve_event_group(
        events,
        connection.start,
        pickup_prev_idx,
        best.pickup_idx,
        best.pickup_how,
    );
    let (dropoff_group, dropoff_reassignments) = resolve_event_group(
        events,
        connection.target,
        dropoff_prev_idx,
        best.dropoff_idx,
        best.dropoff_how,
    );
    let mut group_reassignments = pickup_reassignments;
    group_reassignments.extend(dropoff_reassignments);

    let merge_list = merge_tour_list(
        events,
        best.pickup_how,
        best.dropoff_how,
        best.pickup_idx,
        best.dropoff_idx,
    );
    let seams = merged_tour_seams(events, &merge_list, &best);

    let split = best.pickup_idx != best.dropoff_idx;
    let neighbors = AdjacentEvents {
        prev_pickup: (!comes_from_company(best.pickup_how))
            .then(|| pickup_prev_idx.and_then(|i| events.get(i)))
            .flatten(),
        next_pickup: split
            .then(|| best.pickup_idx.and_then(|i| events.get(i)))
            .flatten(),
        prev_dropoff: split
            .then(|| dropoff_prev_idx.and_then(|i| events.get(i)))
            .flatten(),
        next_dropoff: (!returns_to_company(best.dropoff_how))
            .then(|| best.dropoff_idx.and_then(|i| events.get(i)))
            .flatten(),
    };
    let scheduled_updates = scheduled_time_updates(
        best.scheduled_pickup_time_start,
        best.scheduled_pickup_time_end,
        best.scheduled_dropoff_time_start,
        best.scheduled_dropoff_time_end,
        &neighbors,
        best.pickup_prev_leg_duration,
        best.pickup_next_leg_duration,
        best.dropoff_prev_leg_duration,
        best.dropoff_next_leg_duration,
        &seams.last_events,
        &seams.first_events,
    )?;

    let mut leg_updates =
        leg_duration_updates(oracle, &seams.last_events, &seams.first_events).await?;
    let neighbor_updates = neighbor_leg_updates(&best, events, &pickup_group, &dropoff_group);
    leg_updates.prev_leg.extend(neighbor_updates.prev_leg);
    leg_updates.next_leg.extend(neighbor_updates.next_leg);

    let (this_tour_direct, next_tour_direct) = direct_durations(
        oracle,
        &best,
        vehicle,
        connection.start,
        connection.target,
    )
    .await?;

    let search = Interval::new(query.earliest, query.latest);
    let tour_departure = match (best.departure, seams.departure) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    let tour_arrival = match (best.arrival, seams.arrival) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };

    Ok(PreparedBooking {
        merge_list: merge_list
            .into_iter()
            .filter(|t| Some(*t) != best.tour)
            .collect(),
        expected_event_ids: events.iter().map(|e| e.id).collect(),
        validation_window: search.expand(3 * MAX_TRAVEL, 3 * MAX_TRAVEL),
        fare: request.capacities.passengers * FIXED_PRICE,
        ticket_code: ticket_code(),
        best,
        tour_departure,
        tour_arrival,
        pickup_group,
        dropoff_group,
        group_reassignments,
        scheduled_updates,
        leg_updates,
        this_tour_direct,
        next_tour_direct,
    })
}

/// Verify the vehicle's event sequence is still the one the plan was
/// computed against.
async fn validate_sequence(
    conn: &mut PgConnection,
    prepared: &PreparedBooking,
) -> Result<(), BookingError> {
    let current =
        snapshot::load_vehicle_events(conn, prepared.best.vehicle, prepared.validation_window)
            .await?;
    let current_ids: Vec<Uuid> = current.iter().map(|e| e.id).collect();
    if current_ids != prepared.expected_event_ids {
        debug!(
            "vehicle {} sequence changed under a prepared booking",
            prepared.best.vehicle
        );
        return Err(BookingError::ConcurrencyConflict);
    }
    Ok(())
}

/// Apply a prepared booking in one serializable transaction.
async fn commit_prepared(
    pool: &PgPool,
    request: &BookingCommitRequest,
    prepared: &PreparedBooking,
) -> Result<(Uuid, Uuid), BookingError> {
    let best = &prepared.best;
    let mut tx = begin_serializable(pool).await?;
    let conn: &mut PgConnection = &mut tx;

    validate_sequence(conn, prepared).await?;

    if let Some((tour, duration)) = prepared.next_tour_direct {
        booking_queries::set_tour_direct_duration(conn, tour, duration).await?;
    }
    booking_queries::apply_leg_duration_updates(conn, &prepared.leg_updates).await?;

    let tour = match best.tour {
        None => {
            let departure = prepared.tour_departure.ok_or_else(|| {
                BookingError::InvariantViolation("fresh tour without departure".into())
            })?;
            let arrival = prepared.tour_arrival.ok_or_else(|| {
                BookingError::InvariantViolation("fresh tour without arrival".into())
            })?;
            booking_queries::insert_tour(
                conn,
                best.vehicle,
                departure,
                arrival,
                prepared.this_tour_direct.flatten(),
            )
            .await?
        }
        Some(tour) => {
            booking_queries::merge_tours(
                conn,
                tour,
                &prepared.merge_list,
                prepared.tour_departure,
                prepared.tour_arrival,
            )
            .await?;
            if let Some(duration) = prepared.this_tour_direct {
                booking_queries::set_tour_direct_duration(conn, tour, duration).await?;
            }
            tour
        }
    };

    let request_id = booking_queries::insert_request(
        conn,
        tour,
        request.customer,
        &request.capacities,
        prepared.fare,
        &prepared.ticket_code,
    )
    .await?;

    for (group, is_pickup) in [(prepared.pickup_group, true), (prepared.dropoff_group, false)] {
        let (coordinates, address, start, end, prev_leg, next_leg, communicated) = if is_pickup {
            (
                request.connection.start,
                request.connection.start_address.as_str(),
                best.scheduled_pickup_time_start,
                best.scheduled_pickup_time_end,
                best.pickup_prev_leg_duration,
                best.pickup_next_leg_duration,
                best.pickup_time,
            )
        } else {
            (
                request.connection.target,
                request.connection.target_address.as_str(),
                best.scheduled_dropoff_time_start,
                best.scheduled_dropoff_time_end,
                best.dropoff_prev_leg_duration,
                best.dropoff_next_leg_duration,
                best.dropoff_time,
            )
        };
        if group.reuse {
            booking_queries::tighten_event_group(conn, group.id, start, end).await?;
        } else {
            booking_queries::insert_event_group(
                conn,
                group.id,
                coordinates,
                address,
                start,
                end,
                prev_leg,
                next_leg,
            )
            .await?;
        }
        booking_queries::insert_event(conn, request_id, group.id, is_pickup, communicated)
            .await?;
    }

    for (event, group) in &prepared.group_reassignments {
        booking_queries::reassign_event_group(conn, *event, *group).await?;
    }
    booking_queries::apply_scheduled_time_updates(conn, &prepared.scheduled_updates).await?;

    tx.commit().await?;
    Ok((request_id, tour))
}

/// Book a trip: prepare, commit under retry, then notify.
pub async fn book_ride(
    pool: &PgPool,
    oracle: &dyn RoutingOracle,
    zones: &dyn ZoneIndex,
    notifier: &dyn Notifier,
    request: &BookingCommitRequest,
    now: UnixMs,
) -> Result<Uuid, BookingError> {
    let (request_id, tour, vehicle, pickup_time) = retry_serializable(|| async move {
        let prepared = prepare_booking(pool, oracle, zones, request, now).await?;
        let (request_id, tour) = commit_prepared(pool, request, &prepared).await?;
        Ok((
            request_id,
            tour,
            prepared.best.vehicle,
            prepared.best.scheduled_pickup_time_end,
        ))
    })
    .await?;

    info!("booked request {} into tour {}", request_id, tour);
    notify_best_effort(
        notifier,
        TourNotification {
            change: TourChange::Booked,
            tour,
            vehicle,
            pickup_time,
        },
    )
    .await;
    Ok(request_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MINUTE;
    use crate::types::Capacities;

    fn entry(tour_id: Uuid, group: Uuid, at: Coordinates, start: i64) -> EventEntry {
        EventEntry {
            id: Uuid::new_v4(),
            request_id: Uuid::new_v4(),
            tour_id,
            event_group: group,
            is_pickup: true,
            coordinates: at,
            scheduled_time_start: start,
            scheduled_time_end: start + 5 * MINUTE,
            communicated_time: start,
            prev_leg_duration: 5 * MINUTE,
            next_leg_duration: 5 * MINUTE,
            capacities: Capacities::default(),
            tour_departure: start - 30 * MINUTE,
            tour_arrival: start + 30 * MINUTE,
            direct_duration: None,
        }
    }

    #[test]
    fn test_ticket_code_length_and_charset() {
        let code = ticket_code();
        assert_eq!(code.len(), 32);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_resolve_group_reuses_coincident_neighbor() {
        let tour = Uuid::new_v4();
        let place = Coordinates::new(51.05, 13.74);
        let events = vec![entry(tour, Uuid::new_v4(), place, 0)];
        let (resolution, reassignments) =
            resolve_event_group(&events, place, Some(0), None, InsertHow::Append);
        assert!(resolution.reuse);
        assert_eq!(resolution.id, events[0].event_group);
        assert!(reassignments.is_empty());
    }

    #[test]
    fn test_resolve_group_new_for_distinct_place() {
        let tour = Uuid::new_v4();
        let events = vec![entry(tour, Uuid::new_v4(), Coordinates::new(51.05, 13.74), 0)];
        let (resolution, _) = resolve_event_group(
            &events,
            Coordinates::new(51.2, 13.9),
            Some(0),
            None,
            InsertHow::Append,
        );
        assert!(!resolution.reuse);
        assert_ne!(resolution.id, events[0].event_group);
    }

    #[test]
    fn test_resolve_group_bridge_pulls_coincident_run() {
        let tour_a = Uuid::new_v4();
        let tour_b = Uuid::new_v4();
        let place = Coordinates::new(51.05, 13.74);
        let events = vec![
            entry(tour_a, Uuid::new_v4(), Coordinates::new(51.0, 13.7), 0),
            entry(tour_b, Uuid::new_v4(), place, 60 * MINUTE),
            entry(tour_b, Uuid::new_v4(), place, 65 * MINUTE),
            entry(tour_b, Uuid::new_v4(), Coordinates::new(51.1, 13.8), 90 * MINUTE),
        ];
        let (resolution, reassignments) =
            resolve_event_group(&events, place, Some(0), Some(1), InsertHow::Connect);
        assert!(!resolution.reuse);
        assert_eq!(
            reassignments,
            vec![(events[1].id, resolution.id), (events[2].id, resolution.id)]
        );
    }

    #[test]
    fn test_merge_list_empty_within_one_tour() {
        let tour = Uuid::new_v4();
        let place = Coordinates::new(51.05, 13.74);
        let events = vec![entry(tour, Uuid::new_v4(), place, 0), entry(tour, Uuid::new_v4(), place, 10)];
        let merged = merge_tour_list(
            &events,
            InsertHow::Insert,
            InsertHow::Insert,
            Some(1),
            Some(1),
        );
        assert!(merged.is_empty());
    }

    #[test]
    fn test_merge_list_connect_collects_both_tours() {
        let tour_a = Uuid::new_v4();
        let tour_b = Uuid::new_v4();
        let place = Coordinates::new(51.05, 13.74);
        let events = vec![
            entry(tour_a, Uuid::new_v4(), place, 0),
            entry(tour_b, Uuid::new_v4(), place, 60 * MINUTE),
        ];
        let merged = merge_tour_list(
            &events,
            InsertHow::Connect,
            InsertHow::Connect,
            Some(1),
            Some(1),
        );
        assert_eq!(merged.len(), 2);
        assert!(merged.contains(&tour_a));
        assert!(merged.contains(&tour_b));
    }
}
