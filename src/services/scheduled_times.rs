//! Scheduled-time propagation after an insertion is chosen.
//!
//! Neighbors of the new events give up slack so the promised legs fit; a
//! final pass walks the seams between newly joined tours and pushes
//! accumulated drift as far as leeway permits. A negative leeway can only
//! come from a defect upstream in the evaluation, so it is a hard error
//! here, never clamped.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::PASSENGER_CHANGE_DURATION;
use crate::error::BookingError;
use crate::types::{EventEntry, UnixMs};

/// One pending change to an event group's scheduled window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTimeUpdate {
    pub event_id: Uuid,
    /// New bound value.
    pub time: UnixMs,
    /// Whether `time` replaces the window start (else the end).
    pub start: bool,
}

/// Inputs describing the already-chosen pickup/dropoff windows and their
/// surviving neighbors.
#[derive(Debug, Default)]
pub struct AdjacentEvents<'a> {
    pub prev_pickup: Option<&'a EventEntry>,
    pub next_pickup: Option<&'a EventEntry>,
    pub prev_dropoff: Option<&'a EventEntry>,
    pub next_dropoff: Option<&'a EventEntry>,
}

fn tighten_end(
    neighbor: &EventEntry,
    leeway: i64,
    context: &str,
    updates: &mut Vec<ScheduledTimeUpdate>,
) -> Result<(), BookingError> {
    if leeway < 0 {
        return Err(BookingError::InvariantViolation(format!(
            "{context}: neighbor {} would be pushed {}ms past its promise window",
            neighbor.id, -leeway
        )));
    }
    if leeway < neighbor.time().size() {
        updates.push(ScheduledTimeUpdate {
            event_id: neighbor.id,
            start: false,
            time: neighbor.scheduled_time_start + leeway,
        });
    }
    Ok(())
}

fn tighten_start(
    neighbor: &EventEntry,
    leeway: i64,
    context: &str,
    updates: &mut Vec<ScheduledTimeUpdate>,
) -> Result<(), BookingError> {
    if leeway < 0 {
        return Err(BookingError::InvariantViolation(format!(
            "{context}: neighbor {} would be pushed {}ms past its promise window",
            neighbor.id, -leeway
        )));
    }
    if leeway < neighbor.time().size() {
        updates.push(ScheduledTimeUpdate {
            event_id: neighbor.id,
            start: true,
            time: neighbor.scheduled_time_end - leeway,
        });
    }
    Ok(())
}

/// Compute the batched window updates a booking commit must apply.
///
/// `last_events`/`first_events` are the seam pairs of tours joined by the
/// insertion, index-aligned earlier/later; the drift pass walks them in
/// order and stops at the first seam with enough slack.
#[allow(clippy::too_many_arguments)]
pub fn scheduled_time_updates(
    pickup_time_start: UnixMs,
    pickup_time_end: UnixMs,
    dropoff_time_start: UnixMs,
    dropoff_time_end: UnixMs,
    neighbors: &AdjacentEvents<'_>,
    pickup_prev_leg: i64,
    pickup_next_leg: i64,
    dropoff_prev_leg: i64,
    dropoff_next_leg: i64,
    last_events: &[EventEntry],
    first_events: &[EventEntry],
) -> Result<Vec<ScheduledTimeUpdate>, BookingError> {
    let mut updates = Vec::new();

    if let Some(prev) = neighbors.prev_pickup {
        let leeway = pickup_time_start - prev.scheduled_time_start - pickup_prev_leg;
        tighten_end(prev, leeway, "pickup predecessor", &mut updates)?;
    }
    if let Some(next) = neighbors.next_pickup {
        let leeway = next.scheduled_time_end - pickup_time_end - pickup_next_leg;
        tighten_start(next, leeway, "pickup successor", &mut updates)?;
    }
    if let Some(next) = neighbors.next_dropoff {
        let leeway = next.scheduled_time_end - dropoff_time_end - dropoff_next_leg;
        tighten_start(next, leeway, "dropoff successor", &mut updates)?;
    }
    if let Some(prev) = neighbors.prev_dropoff {
        let leeway = dropoff_time_start - prev.scheduled_time_start - dropoff_prev_leg;
        tighten_end(prev, leeway, "dropoff predecessor", &mut updates)?;
    }

    // Drift pass across the seams of joined tours. The earlier event
    // absorbs leeway first; only the excess shifts the later one.
    for (earlier, later) in last_events.iter().zip(first_events.iter()) {
        let distance = if later.tour_id == earlier.tour_id {
            Some(later.prev_leg_duration)
        } else {
            later.direct_duration
        };
        let start1 = updates
            .iter()
            .find(|u| u.event_id == earlier.id)
            .map(|u| u.time)
            .unwrap_or(earlier.scheduled_time_start);
        let end1 = earlier.scheduled_time_end;
        let start2 = later.scheduled_time_start;
        let Some(distance) = distance else {
            break;
        };
        if distance + PASSENGER_CHANGE_DURATION < start2 - end1 {
            // Enough slack at this seam; everything downstream keeps its
            // schedule.
            break;
        }
        let gap = distance - (start2 - end1);
        if end1 - start1 < gap {
            updates.push(ScheduledTimeUpdate {
                event_id: earlier.id,
                start: false,
                time: start1,
            });
            updates.push(ScheduledTimeUpdate {
                event_id: later.id,
                start: true,
                time: start2 + gap - (end1 - start1),
            });
        } else {
            updates.push(ScheduledTimeUpdate {
                event_id: earlier.id,
                start: false,
                time: end1 - gap,
            });
        }
    }

    Ok(updates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MINUTE;
    use crate::types::{Capacities, Coordinates, Interval};

    fn event(window: Interval, is_pickup: bool) -> EventEntry {
        EventEntry {
            id: Uuid::new_v4(),
            request_id: Uuid::new_v4(),
            tour_id: Uuid::new_v4(),
            event_group: Uuid::new_v4(),
            is_pickup,
            coordinates: Coordinates::new(51.0, 13.7),
            scheduled_time_start: window.start_time,
            scheduled_time_end: window.end_time,
            communicated_time: window.start_time,
            prev_leg_duration: 5 * MINUTE,
            next_leg_duration: 5 * MINUTE,
            capacities: Capacities::default(),
            tour_departure: window.start_time - 30 * MINUTE,
            tour_arrival: window.end_time + 30 * MINUTE,
            direct_duration: None,
        }
    }

    #[test]
    fn test_no_neighbors_no_updates() {
        let updates = scheduled_time_updates(
            0,
            10 * MINUTE,
            60 * MINUTE,
            70 * MINUTE,
            &AdjacentEvents::default(),
            5 * MINUTE,
            5 * MINUTE,
            5 * MINUTE,
            5 * MINUTE,
            &[],
            &[],
        )
        .unwrap();
        assert!(updates.is_empty());
    }

    #[test]
    fn test_prev_pickup_window_tightens() {
        // Neighbor window [0, 10min], pickup starts at 12min with a 5min
        // leg: leeway is 7min, smaller than the 10min window.
        let prev = event(Interval::new(0, 10 * MINUTE), true);
        let neighbors = AdjacentEvents {
            prev_pickup: Some(&prev),
            ..Default::default()
        };
        let updates = scheduled_time_updates(
            12 * MINUTE,
            14 * MINUTE,
            60 * MINUTE,
            70 * MINUTE,
            &neighbors,
            5 * MINUTE,
            5 * MINUTE,
            5 * MINUTE,
            5 * MINUTE,
            &[],
            &[],
        )
        .unwrap();
        assert_eq!(
            updates,
            vec![ScheduledTimeUpdate {
                event_id: prev.id,
                start: false,
                time: 7 * MINUTE,
            }]
        );
    }

    #[test]
    fn test_wide_neighbor_leeway_left_untouched() {
        let prev = event(Interval::new(0, 2 * MINUTE), true);
        let neighbors = AdjacentEvents {
            prev_pickup: Some(&prev),
            ..Default::default()
        };
        // leeway = 30 - 0 - 5 = 25min > window size 2min
        let updates = scheduled_time_updates(
            30 * MINUTE,
            32 * MINUTE,
            60 * MINUTE,
            70 * MINUTE,
            &neighbors,
            5 * MINUTE,
            5 * MINUTE,
            5 * MINUTE,
            5 * MINUTE,
            &[],
            &[],
        )
        .unwrap();
        assert!(updates.is_empty());
    }

    #[test]
    fn test_negative_leeway_is_invariant_violation() {
        let prev = event(Interval::new(10 * MINUTE, 20 * MINUTE), true);
        let neighbors = AdjacentEvents {
            prev_pickup: Some(&prev),
            ..Default::default()
        };
        // pickup at 12min with a 5min leg cannot follow a neighbor whose
        // window starts at 10min
        let result = scheduled_time_updates(
            12 * MINUTE,
            14 * MINUTE,
            60 * MINUTE,
            70 * MINUTE,
            &neighbors,
            5 * MINUTE,
            5 * MINUTE,
            5 * MINUTE,
            5 * MINUTE,
            &[],
            &[],
        );
        assert!(matches!(
            result,
            Err(BookingError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_seam_with_slack_stops_drift_pass() {
        let earlier = event(Interval::new(0, 10 * MINUTE), false);
        // Different tours with a known 20min bridge: 20+1 < 50 gap.
        let mut later = event(Interval::new(60 * MINUTE, 70 * MINUTE), true);
        later.direct_duration = Some(20 * MINUTE);
        let updates = scheduled_time_updates(
            0,
            0,
            0,
            0,
            &AdjacentEvents::default(),
            0,
            0,
            0,
            0,
            std::slice::from_ref(&earlier),
            std::slice::from_ref(&later),
        )
        .unwrap();
        assert!(updates.is_empty());
    }

    #[test]
    fn test_seam_drift_earlier_absorbs_first() {
        // Earlier window [0, 10min], later starts at 12min, bridge 20min:
        // gap = 20 - (12 - 10) = 18min > earlier's 10min window, so the
        // earlier event compresses fully and the later start shifts by the
        // remaining 8min.
        let earlier = event(Interval::new(0, 10 * MINUTE), false);
        let mut later = event(Interval::new(12 * MINUTE, 30 * MINUTE), true);
        later.direct_duration = Some(20 * MINUTE);
        let updates = scheduled_time_updates(
            0,
            0,
            0,
            0,
            &AdjacentEvents::default(),
            0,
            0,
            0,
            0,
            std::slice::from_ref(&earlier),
            std::slice::from_ref(&later),
        )
        .unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].event_id, earlier.id);
        assert!(!updates[0].start);
        assert_eq!(updates[0].time, 0);
        assert_eq!(updates[1].event_id, later.id);
        assert!(updates[1].start);
        assert_eq!(updates[1].time, 20 * MINUTE);
    }

    #[test]
    fn test_seam_drift_within_earlier_leeway() {
        // gap = 8 - (12 - 10) = 6min fits inside the earlier 10min window.
        let earlier = event(Interval::new(0, 10 * MINUTE), false);
        let mut later = event(Interval::new(12 * MINUTE, 30 * MINUTE), true);
        later.direct_duration = Some(8 * MINUTE);
        let updates = scheduled_time_updates(
            0,
            0,
            0,
            0,
            &AdjacentEvents::default(),
            0,
            0,
            0,
            0,
            std::slice::from_ref(&earlier),
            std::slice::from_ref(&later),
        )
        .unwrap();
        assert_eq!(
            updates,
            vec![ScheduledTimeUpdate {
                event_id: earlier.id,
                start: false,
                time: 4 * MINUTE,
            }]
        );
    }
}
