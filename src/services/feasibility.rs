//! Two-phase feasibility gate.
//!
//! The blacklist phase answers "could this ever work" from stored
//! intervals alone, without touching the routing oracle. The whitelist
//! phase runs the full insertion evaluation with real durations and
//! returns committable candidates.

use sqlx::PgPool;
use uuid::Uuid;

use crate::constants::MAX_TRAVEL;
use crate::db::queries::snapshot::load_snapshot;
use crate::error::BookingError;
use crate::services::insertion::{self, evaluate_request};
use crate::services::routing::RoutingOracle;
use crate::services::zones::ZoneIndex;
use crate::types::{
    BlacklistResponse, CompanySnapshot, Coordinates, Insertion, Interval, PromisedTimes,
    StopCandidate, TripQuery, UnixMs, WhitelistResponse,
};

/// The freely chosen side of the trip (the other side is the stop grid).
pub fn user_chosen_side(query: &TripQuery) -> Coordinates {
    if query.start_fixed {
        query.target
    } else {
        query.start
    }
}

/// Zones serving the user-chosen side, the fleet snapshot of their
/// companies, and per-stop zone coverage.
pub async fn load_planning_snapshot(
    pool: &PgPool,
    zones: &dyn ZoneIndex,
    query: &TripQuery,
) -> Result<(Vec<CompanySnapshot>, Vec<bool>), BookingError> {
    let user_chosen = user_chosen_side(query);
    let zone_ids = zones
        .zones_containing(user_chosen)
        .await
        .map_err(BookingError::Oracle)?;
    if zone_ids.is_empty() {
        return Ok((vec![], vec![false; query.stops.len()]));
    }

    let search = Interval::new(query.earliest, query.latest);
    let expanded = search.expand(3 * MAX_TRAVEL, 3 * MAX_TRAVEL);
    let twice_expanded = search.expand(6 * MAX_TRAVEL, 6 * MAX_TRAVEL);
    let companies = load_snapshot(pool, &zone_ids, &query.capacities, expanded, twice_expanded)
        .await?;

    // A stop is usable only when it shares a zone with the user-chosen
    // location.
    let mut covered = Vec::with_capacity(query.stops.len());
    for stop in &query.stops {
        let mut in_zone = false;
        for zone in &zone_ids {
            if zones
                .zone_covers(*zone, stop.coordinates())
                .await
                .map_err(BookingError::Oracle)?
            {
                in_zone = true;
                break;
            }
        }
        covered.push(in_zone);
    }
    Ok((companies, covered))
}

/// Cheap boolean pre-filter: for each (stop, time) candidate, does any
/// capable vehicle have stored availability or tour time anywhere near it?
/// No routing-oracle calls are made.
pub async fn blacklist(
    pool: &PgPool,
    zones: &dyn ZoneIndex,
    query: &TripQuery,
    now: UnixMs,
) -> Result<BlacklistResponse, BookingError> {
    let (companies, covered) = load_planning_snapshot(pool, zones, query).await?;
    let prep = insertion::prep_time(now);

    let mut feasible: Vec<Vec<bool>> = query
        .stops
        .iter()
        .map(|s| vec![false; s.times.len()])
        .collect();
    if companies.is_empty() {
        return Ok(BlacklistResponse { feasible });
    }

    // Candidate windows widened by the longest admissible approach; a
    // vehicle that cannot even overlap that cannot serve the stop.
    let stop_windows: Vec<Vec<Interval>> = query
        .stops
        .iter()
        .map(|stop| {
            stop.times
                .iter()
                .map(|&t| Interval::new(t - MAX_TRAVEL, t + MAX_TRAVEL))
                .collect()
        })
        .collect();

    let vehicle_intervals: Vec<Vec<Interval>> = companies
        .iter()
        .flat_map(|c| c.vehicles.iter())
        .map(|v| {
            let mut intervals = v.availabilities.clone();
            intervals.extend(
                v.tours
                    .iter()
                    .map(|t| Interval::new(t.departure, t.arrival)),
            );
            Interval::merge_all(intervals)
        })
        .collect();

    for (stop_idx, stop) in query.stops.iter().enumerate() {
        if !covered[stop_idx] {
            continue;
        }
        for time_idx in 0..stop.times.len() {
            let window = stop_windows[stop_idx][time_idx];
            if window.end_time < prep {
                continue;
            }
            let allowed = insertion::allowed_times(window.start_time, window.end_time);
            feasible[stop_idx][time_idx] = vehicle_intervals.iter().any(|intervals| {
                intervals.iter().any(|i| {
                    i.intersect(&window)
                        .map(|w| allowed.iter().any(|a| a.overlaps(&w)))
                        .unwrap_or(false)
                })
            });
        }
    }
    Ok(BlacklistResponse { feasible })
}

/// Exact best-insertion computation with real travel durations.
pub async fn whitelist(
    pool: &PgPool,
    oracle: &dyn RoutingOracle,
    zones: &dyn ZoneIndex,
    query: &TripQuery,
    now: UnixMs,
) -> Result<WhitelistResponse, BookingError> {
    let candidates =
        whitelist_candidates(pool, oracle, zones, query, now, None).await?;
    Ok(WhitelistResponse { candidates })
}

/// Evaluation over the zone-covered stops only; `promised` pins times a
/// customer already holds.
pub async fn whitelist_candidates(
    pool: &PgPool,
    oracle: &dyn RoutingOracle,
    zones: &dyn ZoneIndex,
    query: &TripQuery,
    now: UnixMs,
    promised: Option<&PromisedTimes>,
) -> Result<Vec<Vec<Option<Insertion>>>, BookingError> {
    let (companies, covered) = load_planning_snapshot(pool, zones, query).await?;

    let mut grid: Vec<Vec<Option<Insertion>>> = query
        .stops
        .iter()
        .map(|s| s.times.iter().map(|_| None).collect())
        .collect();
    if companies.is_empty() {
        return Ok(grid);
    }

    let usable: Vec<&StopCandidate> = query
        .stops
        .iter()
        .zip(&covered)
        .filter_map(|(s, &c)| c.then_some(s))
        .collect();
    if usable.is_empty() {
        return Ok(grid);
    }
    let usable_owned: Vec<StopCandidate> = usable.into_iter().cloned().collect();

    let evaluated = evaluate_request(
        oracle,
        &companies,
        &query.capacities,
        query.start_fixed,
        user_chosen_side(query),
        &usable_owned,
        Interval::new(query.earliest, query.latest),
        now,
        promised,
    )
    .await?;

    let mut evaluated_iter = evaluated.into_iter();
    for (stop_idx, row) in grid.iter_mut().enumerate() {
        if covered[stop_idx] {
            if let Some(results) = evaluated_iter.next() {
                *row = results;
            }
        }
    }
    Ok(grid)
}

/// Companies indexed by id, for resolving an insertion back to its zone.
pub fn find_company<'a>(
    companies: &'a [CompanySnapshot],
    id: Uuid,
) -> Option<&'a CompanySnapshot> {
    companies.iter().find(|c| c.id == id)
}
