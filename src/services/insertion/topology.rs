//! Topology rules: which attachment kinds are admissible at which gap, and
//! the time windows they leave open.

use crate::constants::{BUFFER_TIME, MAX_TRAVEL, PASSENGER_CHANGE_DURATION};
use crate::types::{
    EventEntry, InsertDirection, InsertHow, InsertWhat, InsertWhere, Interval, UnixMs,
    VehicleSnapshot,
};

/// Tours that end at the company's base: the vehicle drives home afterwards.
pub fn returns_to_company(how: InsertHow) -> bool {
    matches!(how, InsertHow::Append | InsertHow::NewTour)
}

/// Tours that start at the company's base: the vehicle approaches from home.
pub fn comes_from_company(how: InsertHow) -> bool {
    matches!(how, InsertHow::Prepend | InsertHow::NewTour)
}

/// Whether `how` can apply at a gap of kind `where_`, regardless of timing.
pub fn can_case_be_valid(where_: InsertWhere, how: InsertHow) -> bool {
    match where_ {
        InsertWhere::BeforeFirstEvent => how == InsertHow::Prepend,
        InsertWhere::AfterLastEvent => how == InsertHow::Append,
        InsertWhere::BetweenTours => how != InsertHow::Insert,
        InsertWhere::BetweenEvents => how == InsertHow::Insert,
    }
}

/// Whether a single-side insertion of `what` is allowed for `how`.
///
/// The fixed-time side may not sit at the tour edge pointing away from it:
/// with a fixed start, the freely chosen dropoff cannot be prepended before
/// the pickup, and symmetrically for a fixed target.
pub fn is_case_valid(what: InsertWhat, direction: InsertDirection, how: InsertHow) -> bool {
    match what {
        InsertWhat::UserChosen => {
            how != match direction {
                InsertDirection::StopDropoff => InsertHow::Append,
                InsertDirection::StopPickup => InsertHow::Prepend,
            }
        }
        InsertWhat::Stop => {
            how != match direction {
                InsertDirection::StopDropoff => InsertHow::Prepend,
                InsertDirection::StopPickup => InsertHow::Append,
            }
        }
        InsertWhat::Both => true,
    }
}

/// Kind of gap at position `idx` in a vehicle's event sequence.
pub fn gap_kind(events: &[EventEntry], idx: usize) -> InsertWhere {
    if idx == 0 {
        InsertWhere::BeforeFirstEvent
    } else if idx == events.len() {
        InsertWhere::AfterLastEvent
    } else if events[idx - 1].tour_id != events[idx].tour_id {
        InsertWhere::BetweenTours
    } else {
        InsertWhere::BetweenEvents
    }
}

/// Driving time the vehicle already spends at this gap, which a new
/// insertion replaces. For `Insert` the bridged prev→next leg is recorded
/// on both neighbors, so it is subtracted once.
pub fn old_driving_time(
    how: InsertHow,
    prev: Option<&EventEntry>,
    next: Option<&EventEntry>,
) -> i64 {
    match how {
        InsertHow::NewTour => 0,
        InsertHow::Connect => {
            next.map_or(0, |n| n.prev_leg_duration) + prev.map_or(0, |p| p.next_leg_duration)
        }
        InsertHow::Prepend => next.map_or(0, |n| n.prev_leg_duration),
        InsertHow::Append | InsertHow::Insert => prev.map_or(0, |p| p.next_leg_duration),
    }
}

/// Driving leg into the inserted location, `None` when unreachable.
pub fn prev_leg_duration(raw: Option<i64>) -> Option<i64> {
    match raw {
        Some(d) if d <= MAX_TRAVEL => Some(d + BUFFER_TIME),
        _ => None,
    }
}

/// Driving leg out of the inserted location, including the passenger
/// change stop.
pub fn next_leg_duration(raw: Option<i64>) -> Option<i64> {
    match raw {
        Some(d) if d <= MAX_TRAVEL => Some(d + PASSENGER_CHANGE_DURATION + BUFFER_TIME),
        _ => None,
    }
}

/// The operation windows a vehicle has for an insertion of kind `how` at
/// the gap between `prev` and `next`.
///
/// Tours pin the window to their neighbors' schedules; availability only
/// constrains insertions that extend a tour toward the base or open a new
/// one.
pub fn allowed_operation_times(
    how: InsertHow,
    prev: Option<&EventEntry>,
    next: Option<&EventEntry>,
    search_interval: Interval,
    prep_time: UnixMs,
    vehicle: &VehicleSnapshot,
) -> Vec<Interval> {
    let window_end = match next {
        None => search_interval.end_time,
        Some(n) => {
            if returns_to_company(how) {
                n.tour_departure
            } else {
                n.scheduled_time_end
            }
        }
    };
    if window_end < prep_time {
        return vec![];
    }

    let mut window_start = match prev {
        None => search_interval.start_time,
        Some(p) => {
            if comes_from_company(how) {
                p.tour_arrival
            } else {
                p.scheduled_time_start
            }
        }
    };
    window_start = window_start.max(prep_time);
    if window_start >= window_end {
        return vec![];
    }
    let window = Interval::new(window_start, window_end);

    if how == InsertHow::Insert {
        return vec![window];
    }

    let relevant: Vec<Interval> = match how {
        InsertHow::Append => vehicle
            .availabilities
            .iter()
            .filter(|a| a.covers(window_start))
            .copied()
            .collect(),
        InsertHow::Prepend => vehicle
            .availabilities
            .iter()
            .filter(|a| a.covers(window_end))
            .copied()
            .collect(),
        InsertHow::Connect => vehicle
            .availabilities
            .iter()
            .filter(|a| a.contains(&window))
            .copied()
            .collect(),
        InsertHow::NewTour => {
            let tour_spans: Vec<Interval> = vehicle
                .tours
                .iter()
                .map(|t| Interval::new(t.departure, t.arrival))
                .collect();
            Interval::subtract_all(&vehicle.availabilities, &tour_spans)
        }
        InsertHow::Insert => unreachable!(),
    };

    relevant
        .iter()
        .filter_map(|a| a.intersect(&window))
        .collect()
}

/// The window in which the inserted location can be served, or `None` when
/// no candidate time survives.
///
/// `pax_duration` shifts the window onto the anchored side: with a fixed
/// pickup the dropoff happens `pax_duration` later, and vice versa.
pub fn arrival_window(
    direction: InsertDirection,
    windows: &[Interval],
    pax_duration: i64,
    stop_window: Option<Interval>,
    prev_leg: i64,
    next_leg: i64,
    allowed_times: &[Interval],
) -> Option<Interval> {
    let shrunk: Vec<Interval> = windows
        .iter()
        .filter_map(|w| w.shrink(prev_leg, next_leg))
        .collect();
    let direct_windows = Interval::intersect_all(allowed_times, &shrunk);

    let mut arrival_windows: Vec<Interval> = direct_windows
        .iter()
        .filter_map(|w| match direction {
            InsertDirection::StopDropoff => w.shrink(pax_duration, 0),
            InsertDirection::StopPickup => w.shrink(0, pax_duration),
        })
        .collect();

    if let Some(stop_window) = stop_window {
        arrival_windows = arrival_windows
            .iter()
            .filter_map(|w| stop_window.intersect(w))
            .collect();
    }

    match direction {
        InsertDirection::StopPickup => arrival_windows.into_iter().min_by_key(|w| w.end_time),
        InsertDirection::StopDropoff => arrival_windows.into_iter().max_by_key(|w| w.end_time),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Capacities;
    use uuid::Uuid;

    fn vehicle_with_availability(availabilities: Vec<Interval>) -> VehicleSnapshot {
        VehicleSnapshot {
            id: Uuid::new_v4(),
            capacities: Capacities {
                passengers: 4,
                ..Default::default()
            },
            availabilities,
            tours: vec![],
            events: vec![],
            last_event_before: None,
            first_event_after: None,
        }
    }

    #[test]
    fn test_gap_rules() {
        assert!(can_case_be_valid(
            InsertWhere::BeforeFirstEvent,
            InsertHow::Prepend
        ));
        assert!(!can_case_be_valid(
            InsertWhere::BeforeFirstEvent,
            InsertHow::Append
        ));
        assert!(can_case_be_valid(
            InsertWhere::AfterLastEvent,
            InsertHow::Append
        ));
        assert!(can_case_be_valid(
            InsertWhere::BetweenTours,
            InsertHow::Connect
        ));
        assert!(!can_case_be_valid(
            InsertWhere::BetweenTours,
            InsertHow::Insert
        ));
        assert!(can_case_be_valid(
            InsertWhere::BetweenEvents,
            InsertHow::Insert
        ));
        assert!(!can_case_be_valid(
            InsertWhere::BetweenEvents,
            InsertHow::Connect
        ));
    }

    #[test]
    fn test_fixed_start_forbids_prepend_of_chosen_side() {
        // Fixed start: the stop is the pickup, the chosen side the dropoff.
        assert!(!is_case_valid(
            InsertWhat::UserChosen,
            InsertDirection::StopPickup,
            InsertHow::Prepend
        ));
        assert!(is_case_valid(
            InsertWhat::UserChosen,
            InsertDirection::StopPickup,
            InsertHow::Append
        ));
        assert!(!is_case_valid(
            InsertWhat::Stop,
            InsertDirection::StopPickup,
            InsertHow::Append
        ));
        assert!(is_case_valid(
            InsertWhat::Stop,
            InsertDirection::StopPickup,
            InsertHow::Prepend
        ));
    }

    #[test]
    fn test_leg_durations_reject_unreachable() {
        assert_eq!(prev_leg_duration(None), None);
        assert_eq!(prev_leg_duration(Some(MAX_TRAVEL + 1)), None);
        assert_eq!(prev_leg_duration(Some(60_000)), Some(60_000 + BUFFER_TIME));
        assert_eq!(
            next_leg_duration(Some(60_000)),
            Some(60_000 + PASSENGER_CHANGE_DURATION + BUFFER_TIME)
        );
    }

    #[test]
    fn test_new_tour_windows_subtract_existing_tours() {
        let mut vehicle = vehicle_with_availability(vec![Interval::new(0, 1_000_000)]);
        vehicle.tours = vec![crate::types::TourSpan {
            id: Uuid::new_v4(),
            departure: 400_000,
            arrival: 600_000,
        }];
        let windows = allowed_operation_times(
            InsertHow::NewTour,
            None,
            None,
            Interval::new(0, 1_000_000),
            0,
            &vehicle,
        );
        assert_eq!(
            windows,
            vec![Interval::new(0, 400_000), Interval::new(600_000, 1_000_000)]
        );
    }

    #[test]
    fn test_prep_time_cuts_window() {
        let vehicle = vehicle_with_availability(vec![Interval::new(0, 100_000)]);
        let windows = allowed_operation_times(
            InsertHow::NewTour,
            None,
            None,
            Interval::new(0, 100_000),
            200_000,
            &vehicle,
        );
        assert!(windows.is_empty());
    }

    #[test]
    fn test_arrival_window_shrinks_by_legs() {
        let windows = vec![Interval::new(0, 100_000)];
        let allowed = vec![Interval::new(0, 100_000)];
        let w = arrival_window(
            InsertDirection::StopPickup,
            &windows,
            0,
            None,
            10_000,
            20_000,
            &allowed,
        )
        .unwrap();
        assert_eq!(w, Interval::new(10_000, 80_000));
    }

    #[test]
    fn test_arrival_window_empty_when_legs_exceed() {
        let windows = vec![Interval::new(0, 20_000)];
        let allowed = vec![Interval::new(0, 100_000)];
        assert_eq!(
            arrival_window(
                InsertDirection::StopPickup,
                &windows,
                0,
                None,
                15_000,
                15_000,
                &allowed,
            ),
            None
        );
    }

    #[test]
    fn test_arrival_window_respects_stop_window() {
        let windows = vec![Interval::new(0, 100_000)];
        let allowed = vec![Interval::new(0, 100_000)];
        let w = arrival_window(
            InsertDirection::StopPickup,
            &windows,
            0,
            Some(Interval::new(40_000, 50_000)),
            10_000,
            10_000,
            &allowed,
        )
        .unwrap();
        assert_eq!(w, Interval::new(40_000, 50_000));
    }
}
