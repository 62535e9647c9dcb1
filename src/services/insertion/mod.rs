//! Insertion planning pipeline.
//!
//! Finds the cheapest way to place a new trip's pickup and dropoff into a
//! fleet of running tours. The pipeline is a sequence of pure steps over an
//! immutable fleet snapshot: capacity ranges, slot enumeration, bulk oracle
//! calls, per-gap evaluation, pairing, best-per-candidate selection. All
//! network traffic happens up front; nothing here touches the store.

pub mod evaluate;
pub mod topology;

use std::collections::HashMap;

use chrono::{Datelike, TimeZone, Timelike, Utc, Weekday};
use uuid::Uuid;

use crate::constants::{
    DAY, EARLIEST_SHIFT_START, LATEST_SHIFT_END, MAX_PASSENGER_WAITING_TIME_DROPOFF,
    MAX_PASSENGER_WAITING_TIME_PICKUP, MAX_TRAVEL, MIN_PREP,
};
use crate::error::BookingError;
use crate::services::capacity::{possible_insertion_ranges, InsertionRange};
use crate::services::routing::RoutingOracle;
use crate::types::{
    Capacities, CompanySnapshot, Coordinates, EventEntry, InsertDirection, InsertHow, InsertWhat,
    Insertion, Interval, PromisedTimes, StopCandidate, UnixMs, VehicleSnapshot,
};
use evaluate::{combine_pair, evaluate_both, evaluate_single, BothEvaluation, SingleEvaluation};
use topology::{
    allowed_operation_times, can_case_be_valid, comes_from_company, gap_kind, is_case_valid,
    next_leg_duration, prev_leg_duration,
};

/// One candidate gap in one vehicle's event sequence.
#[derive(Debug, Clone, Copy)]
pub struct InsertionSlot {
    pub company_idx: usize,
    pub vehicle_idx: usize,
    pub idx_in_events: usize,
    pub range: InsertionRange,
    pub slot_idx: usize,
    /// Index of the predecessor event's coordinate in the backward list.
    pub prev_coord_idx: Option<usize>,
    /// Index of the successor event's coordinate in the forward list.
    pub next_coord_idx: Option<usize>,
}

/// Coordinates the oracle is queried against. Company bases come first in
/// both lists, then per-slot event coordinates.
#[derive(Debug, Default)]
pub struct RoutingCoordinates {
    pub backward: Vec<Coordinates>,
    pub forward: Vec<Coordinates>,
}

/// Oracle durations toward and away from one location.
#[derive(Debug, Clone)]
pub struct DirectedGrid {
    /// `to_location[i]`: backward coordinate `i` -> location.
    pub to_location: Vec<Option<i64>>,
    /// `from_location[i]`: location -> forward coordinate `i`.
    pub from_location: Vec<Option<i64>>,
}

/// All oracle results a request evaluation needs.
#[derive(Debug)]
pub struct RoutingData {
    pub user_chosen: DirectedGrid,
    pub stops: Vec<DirectedGrid>,
}

fn slot_prev<'a>(vehicle: &'a VehicleSnapshot, idx: usize) -> Option<&'a EventEntry> {
    if idx == 0 {
        vehicle.last_event_before.as_ref()
    } else {
        vehicle.events.get(idx - 1)
    }
}

fn slot_next<'a>(vehicle: &'a VehicleSnapshot, idx: usize) -> Option<&'a EventEntry> {
    if idx == vehicle.events.len() {
        vehicle.first_event_after.as_ref()
    } else {
        vehicle.events.get(idx)
    }
}

/// Capacity ranges for every vehicle in the snapshot.
pub fn capacity_ranges(
    companies: &[CompanySnapshot],
    required: &Capacities,
) -> HashMap<Uuid, Vec<InsertionRange>> {
    let mut ranges = HashMap::new();
    for company in companies {
        for vehicle in &company.vehicles {
            ranges.insert(
                vehicle.id,
                possible_insertion_ranges(&vehicle.capacities, required, &vehicle.events),
            );
        }
    }
    ranges
}

/// Enumerate every insertion slot and collect the coordinates the oracle
/// must be queried against.
///
/// Vehicles without events are covered by the fresh-tour path, so their
/// whole-sequence range produces no gap slots here.
pub fn gather_slots(
    companies: &[CompanySnapshot],
    ranges: &HashMap<Uuid, Vec<InsertionRange>>,
) -> (Vec<InsertionSlot>, RoutingCoordinates) {
    let mut coordinates = RoutingCoordinates {
        backward: companies.iter().map(|c| c.coordinates).collect(),
        forward: companies.iter().map(|c| c.coordinates).collect(),
    };
    let mut slots = Vec::new();

    for (company_idx, company) in companies.iter().enumerate() {
        for (vehicle_idx, vehicle) in company.vehicles.iter().enumerate() {
            if vehicle.events.is_empty() {
                continue;
            }
            let Some(vehicle_ranges) = ranges.get(&vehicle.id) else {
                continue;
            };
            for range in vehicle_ranges {
                for idx in range.earliest_pickup..=range.latest_dropoff {
                    let prev_coord_idx = slot_prev(vehicle, idx).map(|e| {
                        coordinates.backward.push(e.coordinates);
                        coordinates.backward.len() - 1
                    });
                    let next_coord_idx = slot_next(vehicle, idx).map(|e| {
                        coordinates.forward.push(e.coordinates);
                        coordinates.forward.len() - 1
                    });
                    slots.push(InsertionSlot {
                        company_idx,
                        vehicle_idx,
                        idx_in_events: idx,
                        range: *range,
                        slot_idx: slots.len(),
                        prev_coord_idx,
                        next_coord_idx,
                    });
                }
            }
        }
    }
    (slots, coordinates)
}

fn zero_matching_places(one: Coordinates, many: &[Coordinates], durations: &mut [Option<i64>]) {
    for (i, m) in many.iter().enumerate() {
        if one.is_same_place(m) {
            durations[i] = Some(0);
        }
    }
}

/// Bulk-query the oracle for every location of the request.
pub async fn route_grids(
    oracle: &dyn RoutingOracle,
    user_chosen: Coordinates,
    stops: &[StopCandidate],
    coordinates: &RoutingCoordinates,
) -> Result<RoutingData, BookingError> {
    let mut grids = Vec::with_capacity(stops.len() + 1);
    let mut locations = vec![user_chosen];
    locations.extend(stops.iter().map(|s| s.coordinates()));

    for location in locations {
        let mut to_location = oracle
            .one_to_many(location, &coordinates.backward, true)
            .await
            .map_err(BookingError::Oracle)?;
        let mut from_location = oracle
            .one_to_many(location, &coordinates.forward, false)
            .await
            .map_err(BookingError::Oracle)?;
        zero_matching_places(location, &coordinates.backward, &mut to_location);
        zero_matching_places(location, &coordinates.forward, &mut from_location);
        grids.push(DirectedGrid {
            to_location,
            from_location,
        });
    }

    let user_grid = grids.remove(0);
    Ok(RoutingData {
        user_chosen: user_grid,
        stops: grids,
    })
}

/// Earliest admissible time for the first new event. On weekends the fleet
/// dispatchers are off, so bookings jump to Monday morning.
pub fn prep_time(now: UnixMs) -> UnixMs {
    let Some(t) = Utc.timestamp_millis_opt(now).single() else {
        return now + MIN_PREP;
    };
    let is_weekend = matches!(t.weekday(), Weekday::Sat | Weekday::Sun)
        || (t.weekday() == Weekday::Fri && t.hour() >= 18);
    if !is_weekend {
        return now + MIN_PREP;
    }
    let days_until_monday = (7 - t.weekday().num_days_from_monday()) % 7;
    let monday = t.date_naive() + chrono::Duration::days(days_until_monday as i64);
    match monday.and_hms_opt(10, 0, 0) {
        Some(naive) => Utc.from_utc_datetime(&naive).timestamp_millis(),
        None => now + MIN_PREP,
    }
}

/// Daily operating-hours corridor over the fleet's horizon.
pub fn allowed_times(earliest: UnixMs, latest: UnixMs) -> Vec<Interval> {
    if earliest >= latest {
        return vec![];
    }
    let first_day = earliest.div_euclid(DAY);
    let last_day = latest.div_euclid(DAY);
    (first_day..=last_day)
        .map(|day| {
            Interval::new(
                day * DAY + EARLIEST_SHIFT_START,
                day * DAY + LATEST_SHIFT_END,
            )
        })
        .collect()
}

/// Smallest interval containing all availabilities and tours of the fleet.
fn fleet_horizon(companies: &[CompanySnapshot]) -> Option<Interval> {
    let mut earliest = i64::MAX;
    let mut latest = i64::MIN;
    for company in companies {
        for vehicle in &company.vehicles {
            for a in &vehicle.availabilities {
                earliest = earliest.min(a.start_time);
                latest = latest.max(a.end_time);
            }
            for t in &vehicle.tours {
                earliest = earliest.min(t.departure);
                latest = latest.max(t.arrival);
            }
        }
    }
    (earliest < latest).then(|| Interval::new(earliest, latest))
}

fn stop_time_windows(stops: &[StopCandidate], start_fixed: bool) -> Vec<Vec<Interval>> {
    stops
        .iter()
        .map(|stop| {
            stop.times
                .iter()
                .map(|&t| {
                    if start_fixed {
                        Interval::new(t, t + MAX_PASSENGER_WAITING_TIME_DROPOFF)
                    } else {
                        Interval::new(t - MAX_PASSENGER_WAITING_TIME_PICKUP, t)
                    }
                })
                .collect()
        })
        .collect()
}

/// Pickup-side and dropoff-side grids for a stop candidate.
fn side_grids<'a>(
    routing: &'a RoutingData,
    stop_idx: usize,
    start_fixed: bool,
) -> (&'a DirectedGrid, &'a DirectedGrid) {
    if start_fixed {
        (&routing.stops[stop_idx], &routing.user_chosen)
    } else {
        (&routing.user_chosen, &routing.stops[stop_idx])
    }
}

fn grid_to(grid: &DirectedGrid, company_idx: usize, slot_prev_idx: Option<usize>, from_company: bool) -> Option<i64> {
    let raw = if from_company {
        grid.to_location.get(company_idx).copied().flatten()
    } else {
        slot_prev_idx.and_then(|i| grid.to_location.get(i).copied().flatten())
    };
    prev_leg_duration(raw)
}

fn grid_from(grid: &DirectedGrid, company_idx: usize, slot_next_idx: Option<usize>, to_company: bool) -> Option<i64> {
    let raw = if to_company {
        grid.from_location.get(company_idx).copied().flatten()
    } else {
        slot_next_idx.and_then(|i| grid.from_location.get(i).copied().flatten())
    };
    next_leg_duration(raw)
}

fn take_better(a: Option<Insertion>, b: Option<Insertion>) -> Option<Insertion> {
    match (a, b) {
        (Some(x), Some(y)) => Some(if x.cost <= y.cost { x } else { y }),
        (x, None) => x,
        (None, y) => y,
    }
}

fn empty_grid(stops: &[StopCandidate]) -> Vec<Vec<Option<Insertion>>> {
    stops
        .iter()
        .map(|s| s.times.iter().map(|_| None).collect())
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn insertion_from_both(
    eval: &BothEvaluation,
    company: &CompanySnapshot,
    vehicle: &VehicleSnapshot,
    tour: Option<Uuid>,
    idx_in_events: Option<usize>,
    prev: Option<&EventEntry>,
    next: Option<&EventEntry>,
) -> Insertion {
    Insertion {
        company: company.id,
        vehicle: vehicle.id,
        tour,
        pickup_how: eval.how,
        dropoff_how: eval.how,
        pickup_time: eval.timestamps.pickup_time,
        dropoff_time: eval.timestamps.dropoff_time,
        scheduled_pickup_time_start: eval.timestamps.scheduled_pickup_time_start,
        scheduled_pickup_time_end: eval.timestamps.scheduled_pickup_time_end,
        scheduled_dropoff_time_start: eval.timestamps.scheduled_dropoff_time_start,
        scheduled_dropoff_time_end: eval.timestamps.scheduled_dropoff_time_end,
        pickup_prev_leg_duration: eval.prev_leg,
        pickup_next_leg_duration: eval.pax_leg,
        dropoff_prev_leg_duration: eval.pax_leg,
        dropoff_next_leg_duration: eval.next_leg,
        departure: eval.departure,
        arrival: eval.arrival,
        prev_pickup_id: prev.map(|e| e.id),
        next_pickup_id: next.map(|e| e.id),
        prev_dropoff_id: prev.map(|e| e.id),
        next_dropoff_id: next.map(|e| e.id),
        pickup_idx: idx_in_events,
        dropoff_idx: idx_in_events,
        driving_duration_delta: eval.driving_delta,
        taxi_waiting_time: eval.waiting_time,
        passenger_duration: eval.passenger_duration,
        cost: eval.cost,
    }
}

/// Evaluate a trip request against the fleet snapshot.
///
/// Returns the cheapest feasible insertion per (stop, time) candidate, or
/// `None` entries where nothing fits.
#[allow(clippy::too_many_arguments)]
pub async fn evaluate_request(
    oracle: &dyn RoutingOracle,
    companies: &[CompanySnapshot],
    required: &Capacities,
    start_fixed: bool,
    user_chosen: Coordinates,
    stops: &[StopCandidate],
    search_interval: Interval,
    now: UnixMs,
    promised: Option<&PromisedTimes>,
) -> Result<Vec<Vec<Option<Insertion>>>, BookingError> {
    let mut best = empty_grid(stops);
    if companies.is_empty() || stops.is_empty() {
        return Ok(best);
    }
    let Some(horizon) = fleet_horizon(companies) else {
        return Ok(best);
    };

    let direction = if start_fixed {
        InsertDirection::StopPickup
    } else {
        InsertDirection::StopDropoff
    };
    let expanded_search = search_interval.expand(6 * MAX_TRAVEL, 6 * MAX_TRAVEL);
    let allowed = allowed_times(horizon.start_time, horizon.end_time);
    let prep = prep_time(now);
    let stop_windows = stop_time_windows(stops, start_fixed);

    // Passenger legs between the user-chosen location and each stop.
    let stop_coordinates: Vec<Coordinates> = stops.iter().map(|s| s.coordinates()).collect();
    let mut pax_raw = oracle
        .one_to_many(user_chosen, &stop_coordinates, start_fixed)
        .await
        .map_err(BookingError::Oracle)?;
    zero_matching_places(user_chosen, &stop_coordinates, &mut pax_raw);
    let pax_durations: Vec<Option<i64>> =
        pax_raw.into_iter().map(next_leg_duration).collect();

    let ranges = capacity_ranges(companies, required);
    let (slots, coordinates) = gather_slots(companies, &ranges);
    let routing = route_grids(oracle, user_chosen, stops, &coordinates).await?;

    // Fresh tours in free availability windows.
    for (company_idx, company) in companies.iter().enumerate() {
        for vehicle in &company.vehicles {
            if !vehicle.capacities.fits(required) {
                continue;
            }
            let windows = allowed_operation_times(
                InsertHow::NewTour,
                None,
                None,
                expanded_search,
                prep,
                vehicle,
            );
            if windows.is_empty() {
                continue;
            }
            for (stop_idx, stop) in stops.iter().enumerate() {
                let (pickup_grid, dropoff_grid) = side_grids(&routing, stop_idx, start_fixed);
                let prev_leg = grid_to(pickup_grid, company_idx, None, true);
                let next_leg = grid_from(dropoff_grid, company_idx, None, true);
                for time_idx in 0..stop.times.len() {
                    let eval = evaluate_both(
                        InsertHow::NewTour,
                        direction,
                        &windows,
                        pax_durations[stop_idx],
                        stop_windows[stop_idx][time_idx],
                        prev_leg,
                        next_leg,
                        None,
                        None,
                        false,
                        false,
                        &allowed,
                        required.passengers,
                        promised,
                    );
                    if let Some(eval) = eval {
                        let candidate = insertion_from_both(
                            &eval, company, vehicle, None, None, None, None,
                        );
                        best[stop_idx][time_idx] =
                            take_better(best[stop_idx][time_idx].take(), Some(candidate));
                    }
                }
            }
        }
    }

    // Single-side evaluations per slot, kept for pairing below.
    let mut user_evals: Vec<Option<SingleEvaluation>> = vec![None; slots.len()];
    let mut stop_evals: Vec<Vec<Vec<Option<SingleEvaluation>>>> = stops
        .iter()
        .map(|s| vec![vec![None; slots.len()]; s.times.len()])
        .collect();

    for slot in &slots {
        let company = &companies[slot.company_idx];
        let vehicle = &company.vehicles[slot.vehicle_idx];
        let prev = slot_prev(vehicle, slot.idx_in_events);
        let next = slot_next(vehicle, slot.idx_in_events);
        let where_ = gap_kind(&vehicle.events, slot.idx_in_events);

        for how in [
            InsertHow::Connect,
            InsertHow::Append,
            InsertHow::Prepend,
            InsertHow::Insert,
        ] {
            if !can_case_be_valid(where_, how) {
                continue;
            }
            let windows = allowed_operation_times(
                how,
                prev,
                next,
                expanded_search,
                prep,
                vehicle,
            );
            if windows.is_empty() {
                continue;
            }
            let from_company = comes_from_company(how);
            let to_company = topology::returns_to_company(how);

            for (stop_idx, stop) in stops.iter().enumerate() {
                let (pickup_grid, dropoff_grid) = side_grids(&routing, stop_idx, start_fixed);
                let stop_coord = stop.coordinates();
                let pickup_coord = if start_fixed { stop_coord } else { user_chosen };
                let dropoff_coord = if start_fixed { user_chosen } else { stop_coord };

                let both_prev_leg =
                    grid_to(pickup_grid, slot.company_idx, slot.prev_coord_idx, from_company);
                let both_next_leg =
                    grid_from(dropoff_grid, slot.company_idx, slot.next_coord_idx, to_company);
                let pickup_same_group =
                    prev.is_some_and(|p| p.coordinates.is_same_place(&pickup_coord));
                let dropoff_same_group =
                    next.is_some_and(|n| n.coordinates.is_same_place(&dropoff_coord));

                let stop_grid = if start_fixed { pickup_grid } else { dropoff_grid };
                let stop_prev_leg =
                    grid_to(stop_grid, slot.company_idx, slot.prev_coord_idx, from_company);
                let stop_next_leg =
                    grid_from(stop_grid, slot.company_idx, slot.next_coord_idx, to_company);

                for time_idx in 0..stop.times.len() {
                    let eval = evaluate_both(
                        how,
                        direction,
                        &windows,
                        pax_durations[stop_idx],
                        stop_windows[stop_idx][time_idx],
                        both_prev_leg,
                        both_next_leg,
                        prev,
                        next,
                        pickup_same_group,
                        dropoff_same_group,
                        &allowed,
                        required.passengers,
                        promised,
                    );
                    if let Some(eval) = eval {
                        let tour = if how == InsertHow::Append {
                            prev.map(|p| p.tour_id)
                        } else {
                            next.map(|n| n.tour_id)
                        };
                        let candidate = insertion_from_both(
                            &eval,
                            company,
                            vehicle,
                            tour,
                            Some(slot.idx_in_events),
                            prev,
                            next,
                        );
                        best[stop_idx][time_idx] =
                            take_better(best[stop_idx][time_idx].take(), Some(candidate));
                    }

                    if is_case_valid(InsertWhat::Stop, direction, how) {
                        let eval = evaluate_single(
                            InsertWhat::Stop,
                            how,
                            direction,
                            &windows,
                            Some(stop_windows[stop_idx][time_idx]),
                            stop_prev_leg,
                            stop_next_leg,
                            prev,
                            next,
                            &allowed,
                            slot.idx_in_events,
                            promised,
                        );
                        if let Some(eval) = eval {
                            let cell = &mut stop_evals[stop_idx][time_idx][slot.slot_idx];
                            if cell.as_ref().is_none_or(|c| eval.cost < c.cost) {
                                *cell = Some(eval);
                            }
                        }
                    }
                }
            }

            if is_case_valid(InsertWhat::UserChosen, direction, how) {
                let user_grid = &routing.user_chosen;
                let user_prev_leg =
                    grid_to(user_grid, slot.company_idx, slot.prev_coord_idx, from_company);
                let user_next_leg =
                    grid_from(user_grid, slot.company_idx, slot.next_coord_idx, to_company);
                let eval = evaluate_single(
                    InsertWhat::UserChosen,
                    how,
                    direction,
                    &windows,
                    None,
                    user_prev_leg,
                    user_next_leg,
                    prev,
                    next,
                    &allowed,
                    slot.idx_in_events,
                    promised,
                );
                if let Some(eval) = eval {
                    let cell = &mut user_evals[slot.slot_idx];
                    if cell.as_ref().is_none_or(|c| eval.cost < c.cost) {
                        *cell = Some(eval);
                    }
                }
            }
        }
    }

    // Split pairs: pickup and dropoff at different gaps of one range.
    for slot in &slots {
        let company = &companies[slot.company_idx];
        let vehicle = &company.vehicles[slot.vehicle_idx];
        let pickup_idx = slot.idx_in_events;
        for dropoff_idx in (pickup_idx + 1)..=slot.range.latest_dropoff {
            let dropoff_slot_idx = slot.slot_idx + (dropoff_idx - pickup_idx);
            for (stop_idx, stop) in stops.iter().enumerate() {
                for time_idx in 0..stop.times.len() {
                    let (pickup_eval, dropoff_eval) = if start_fixed {
                        (
                            stop_evals[stop_idx][time_idx][slot.slot_idx].as_ref(),
                            user_evals[dropoff_slot_idx].as_ref(),
                        )
                    } else {
                        (
                            user_evals[slot.slot_idx].as_ref(),
                            stop_evals[stop_idx][time_idx][dropoff_slot_idx].as_ref(),
                        )
                    };
                    let (Some(pickup), Some(dropoff)) = (pickup_eval, dropoff_eval) else {
                        continue;
                    };
                    let Some(pair) = combine_pair(pickup, dropoff, required.passengers) else {
                        continue;
                    };
                    let candidate = Insertion {
                        company: company.id,
                        vehicle: vehicle.id,
                        tour: Some(vehicle.events[pickup_idx].tour_id),
                        pickup_how: pickup.how,
                        dropoff_how: dropoff.how,
                        pickup_time: pair.timestamps.pickup_time,
                        dropoff_time: pair.timestamps.dropoff_time,
                        scheduled_pickup_time_start: pair.timestamps.scheduled_pickup_time_start,
                        scheduled_pickup_time_end: pair.timestamps.scheduled_pickup_time_end,
                        scheduled_dropoff_time_start: pair
                            .timestamps
                            .scheduled_dropoff_time_start,
                        scheduled_dropoff_time_end: pair.timestamps.scheduled_dropoff_time_end,
                        pickup_prev_leg_duration: pickup.prev_leg,
                        pickup_next_leg_duration: pickup.next_leg,
                        dropoff_prev_leg_duration: dropoff.prev_leg,
                        dropoff_next_leg_duration: dropoff.next_leg,
                        departure: pair.departure,
                        arrival: pair.arrival,
                        prev_pickup_id: pickup.prev_id,
                        next_pickup_id: pickup.next_id,
                        prev_dropoff_id: dropoff.prev_id,
                        next_dropoff_id: dropoff.next_id,
                        pickup_idx: Some(pickup_idx),
                        dropoff_idx: Some(dropoff_idx),
                        driving_duration_delta: pair.driving_delta,
                        taxi_waiting_time: pair.waiting_time,
                        passenger_duration: pair.passenger_duration,
                        cost: pair.cost,
                    };
                    best[stop_idx][time_idx] =
                        take_better(best[stop_idx][time_idx].take(), Some(candidate));
                }
            }
        }
    }

    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{HOUR, MINUTE};
    use crate::services::routing::MockRoutingOracle;
    use crate::types::TourSpan;

    fn cap(passengers: i32) -> Capacities {
        Capacities {
            passengers,
            ..Default::default()
        }
    }

    fn company_with_vehicle(vehicle: VehicleSnapshot) -> CompanySnapshot {
        CompanySnapshot {
            id: Uuid::new_v4(),
            zone_id: Uuid::new_v4(),
            coordinates: Coordinates::new(51.05, 13.74),
            vehicles: vec![vehicle],
        }
    }

    fn idle_vehicle(availability: Interval) -> VehicleSnapshot {
        VehicleSnapshot {
            id: Uuid::new_v4(),
            capacities: cap(4),
            availabilities: vec![availability],
            tours: vec![],
            events: vec![],
            last_event_before: None,
            first_event_after: None,
        }
    }

    fn event(
        tour_id: Uuid,
        is_pickup: bool,
        at: Coordinates,
        window: Interval,
        tour: Interval,
    ) -> EventEntry {
        EventEntry {
            id: Uuid::new_v4(),
            request_id: Uuid::new_v4(),
            tour_id,
            event_group: Uuid::new_v4(),
            is_pickup,
            coordinates: at,
            scheduled_time_start: window.start_time,
            scheduled_time_end: window.end_time,
            communicated_time: if is_pickup {
                window.start_time
            } else {
                window.end_time
            },
            prev_leg_duration: 10 * MINUTE,
            next_leg_duration: 10 * MINUTE,
            capacities: cap(1),
            tour_departure: tour.start_time,
            tour_arrival: tour.end_time,
            direct_duration: None,
        }
    }

    fn day_at(hours: i64) -> UnixMs {
        // 2025-09-09 00:00 UTC, a Tuesday, far from the weekend prep rule.
        let base = 1_757_376_000_000;
        base + hours * HOUR
    }

    #[tokio::test]
    async fn test_fresh_tour_found_for_idle_vehicle() {
        let now = day_at(8);
        let vehicle = idle_vehicle(Interval::new(now, now + 12 * HOUR));
        let companies = vec![company_with_vehicle(vehicle)];
        let oracle = MockRoutingOracle::new();

        let stop_time = now + 4 * HOUR;
        let stops = vec![StopCandidate {
            lat: 51.06,
            lng: 13.75,
            times: vec![stop_time],
        }];
        let best = evaluate_request(
            &oracle,
            &companies,
            &cap(2),
            true,
            Coordinates::new(51.03, 13.72),
            &stops,
            Interval::new(stop_time - HOUR, stop_time + HOUR),
            now,
            None,
        )
        .await
        .unwrap();

        let insertion = best[0][0].as_ref().expect("a fresh tour should fit");
        assert_eq!(insertion.pickup_how, InsertHow::NewTour);
        assert!(insertion.tour.is_none());
        assert!(insertion.cost >= 0.0);
        assert!(insertion.departure.is_some());
        assert!(insertion.arrival.is_some());
        assert!(insertion.pickup_time <= insertion.dropoff_time);
    }

    #[tokio::test]
    async fn test_no_capacity_no_candidates() {
        let now = day_at(8);
        let mut vehicle = idle_vehicle(Interval::new(now, now + 12 * HOUR));
        vehicle.capacities = cap(1);
        let companies = vec![company_with_vehicle(vehicle)];
        let oracle = MockRoutingOracle::new();

        let stop_time = now + 4 * HOUR;
        let stops = vec![StopCandidate {
            lat: 51.06,
            lng: 13.75,
            times: vec![stop_time],
        }];
        let best = evaluate_request(
            &oracle,
            &companies,
            &cap(3),
            true,
            Coordinates::new(51.03, 13.72),
            &stops,
            Interval::new(stop_time - HOUR, stop_time + HOUR),
            now,
            None,
        )
        .await
        .unwrap();
        assert!(best[0][0].is_none());
    }

    #[tokio::test]
    async fn test_no_availability_no_candidates() {
        let now = day_at(8);
        // Availability ends before the requested time.
        let vehicle = idle_vehicle(Interval::new(now - 12 * HOUR, now - 10 * HOUR));
        let companies = vec![company_with_vehicle(vehicle)];
        let oracle = MockRoutingOracle::new();

        let stop_time = now + 4 * HOUR;
        let stops = vec![StopCandidate {
            lat: 51.06,
            lng: 13.75,
            times: vec![stop_time],
        }];
        let best = evaluate_request(
            &oracle,
            &companies,
            &cap(1),
            true,
            Coordinates::new(51.03, 13.72),
            &stops,
            Interval::new(stop_time - HOUR, stop_time + HOUR),
            now,
            None,
        )
        .await
        .unwrap();
        assert!(best[0][0].is_none());
    }

    #[tokio::test]
    async fn test_append_to_existing_tour_beats_nothing() {
        let now = day_at(8);
        let tour_id = Uuid::new_v4();
        let tour_span = Interval::new(now + 2 * HOUR, now + 3 * HOUR);
        let stop_coord = Coordinates::new(51.06, 13.75);
        let user_coord = Coordinates::new(51.03, 13.72);

        let mut vehicle = idle_vehicle(Interval::new(now, now + 14 * HOUR));
        vehicle.tours = vec![TourSpan {
            id: tour_id,
            departure: tour_span.start_time,
            arrival: tour_span.end_time,
        }];
        vehicle.events = vec![
            event(
                tour_id,
                true,
                Coordinates::new(51.04, 13.73),
                Interval::new(now + 2 * HOUR + 10 * MINUTE, now + 2 * HOUR + 20 * MINUTE),
                tour_span,
            ),
            event(
                tour_id,
                false,
                Coordinates::new(51.05, 13.76),
                Interval::new(now + 2 * HOUR + 40 * MINUTE, now + 2 * HOUR + 50 * MINUTE),
                tour_span,
            ),
        ];
        let companies = vec![company_with_vehicle(vehicle)];
        let oracle = MockRoutingOracle::new();

        let stop_time = now + 4 * HOUR;
        let stops = vec![StopCandidate {
            lat: stop_coord.lat,
            lng: stop_coord.lng,
            times: vec![stop_time],
        }];
        let best = evaluate_request(
            &oracle,
            &companies,
            &cap(1),
            true,
            user_coord,
            &stops,
            Interval::new(stop_time - HOUR, stop_time + HOUR),
            now,
            None,
        )
        .await
        .unwrap();

        let insertion = best[0][0].as_ref().expect("candidate expected");
        assert!(insertion.cost >= 0.0);
        // Whatever shape wins, the promise ordering must hold.
        assert!(insertion.pickup_time <= insertion.dropoff_time);
    }

    #[test]
    fn test_allowed_times_cover_each_day() {
        let times = allowed_times(0, 2 * DAY);
        assert_eq!(times.len(), 3);
        assert_eq!(
            times[0],
            Interval::new(EARLIEST_SHIFT_START, LATEST_SHIFT_END)
        );
        assert_eq!(
            times[2],
            Interval::new(2 * DAY + EARLIEST_SHIFT_START, 2 * DAY + LATEST_SHIFT_END)
        );
    }

    #[test]
    fn test_prep_time_weekday() {
        // 2025-09-09 was a Tuesday.
        let tuesday_noon = 1_757_419_200_000;
        assert_eq!(prep_time(tuesday_noon), tuesday_noon + MIN_PREP);
    }

    #[test]
    fn test_prep_time_weekend_jumps_to_monday() {
        // 2025-09-13 was a Saturday.
        let saturday_noon = 1_757_764_800_000;
        let prep = prep_time(saturday_noon);
        let prep_date = Utc.timestamp_millis_opt(prep).unwrap();
        assert_eq!(prep_date.weekday(), Weekday::Mon);
        assert_eq!(prep_date.hour(), 10);
    }

    #[test]
    fn test_gather_slots_skips_empty_vehicles() {
        let vehicle = idle_vehicle(Interval::new(0, HOUR));
        let companies = vec![company_with_vehicle(vehicle)];
        let ranges = capacity_ranges(&companies, &cap(1));
        let (slots, coordinates) = gather_slots(&companies, &ranges);
        assert!(slots.is_empty());
        // Company coordinates are still present for fresh-tour legs.
        assert_eq!(coordinates.backward.len(), 1);
        assert_eq!(coordinates.forward.len(), 1);
    }
}
