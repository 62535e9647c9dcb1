//! Per-gap candidate evaluation and the cost model.

use uuid::Uuid;

use super::topology::{
    arrival_window, comes_from_company, old_driving_time, returns_to_company,
};
use crate::constants::{
    DRIVING_TIME_COST_FACTOR, MAX_PASSENGER_WAITING_TIME_DROPOFF,
    MAX_PASSENGER_WAITING_TIME_PICKUP, MAX_TAXI_WAITING_TIME, PASSENGER_TIME_COST_FACTOR,
    TAXI_WAITING_TIME_COST_FACTOR,
};
use crate::types::{
    EventEntry, InsertDirection, InsertHow, InsertWhat, Interval, PromisedTimes, UnixMs,
};

/// Weighted comparison value; lower wins.
pub fn compute_cost(driving_delta: i64, waiting_time: i64, passenger_duration: i64) -> f64 {
    DRIVING_TIME_COST_FACTOR * driving_delta as f64
        + TAXI_WAITING_TIME_COST_FACTOR * waiting_time as f64
        + PASSENGER_TIME_COST_FACTOR * passenger_duration as f64
}

/// Idle time the vehicle would accrue at this gap. Only interior
/// attachments can make the vehicle wait; at tour edges it simply departs
/// later or returns earlier.
fn taxi_waiting_time(
    how: InsertHow,
    prev: Option<&EventEntry>,
    next: Option<&EventEntry>,
    new_driving: i64,
) -> i64 {
    let (Some(p), Some(n)) = (prev, next) else {
        return 0;
    };
    match how {
        InsertHow::Insert => (n.scheduled_time_start - p.scheduled_time_end - new_driving).max(0),
        InsertHow::Connect => (n.tour_departure - p.tour_arrival - new_driving).max(0),
        _ => 0,
    }
}

/// How far the scheduled times may drift from the window edge, per side.
fn leeways(how: InsertHow, window_size: i64) -> (i64, i64) {
    let pickup = match how {
        InsertHow::Prepend => window_size.min(MAX_PASSENGER_WAITING_TIME_PICKUP),
        InsertHow::NewTour => (window_size / 2).min(MAX_PASSENGER_WAITING_TIME_PICKUP),
        _ => 0,
    };
    let dropoff = match how {
        InsertHow::Append => window_size.min(MAX_PASSENGER_WAITING_TIME_DROPOFF),
        InsertHow::NewTour => (window_size / 2).min(MAX_PASSENGER_WAITING_TIME_DROPOFF),
        _ => 0,
    };
    (pickup, dropoff)
}

/// Whether the candidate windows still cover times already promised.
pub fn keeps_promises(
    what: InsertWhat,
    direction: InsertDirection,
    window: Interval,
    pax_duration: i64,
    promised: &PromisedTimes,
) -> bool {
    let shift = if what == InsertWhat::Both {
        pax_duration
    } else {
        0
    };
    let (pickup_window, dropoff_window) = match direction {
        InsertDirection::StopPickup => (window, window.shift(shift)),
        InsertDirection::StopDropoff => (window.shift(-shift), window),
    };
    // The scheduled pickup may trail the promise, the scheduled dropoff may
    // precede it, so each window stretches by the waiting allowance.
    let pickup_window = pickup_window
        .expand(MAX_PASSENGER_WAITING_TIME_PICKUP, 0)
        .expand_to_full_minutes();
    let dropoff_window = dropoff_window
        .expand(0, MAX_PASSENGER_WAITING_TIME_DROPOFF)
        .expand_to_full_minutes();

    let (check_pickup, check_dropoff) = match what {
        InsertWhat::Both => (true, true),
        InsertWhat::Stop => (
            direction == InsertDirection::StopPickup,
            direction == InsertDirection::StopDropoff,
        ),
        InsertWhat::UserChosen => (
            direction == InsertDirection::StopDropoff,
            direction == InsertDirection::StopPickup,
        ),
    };
    if check_pickup && !pickup_window.covers(promised.pickup) {
        return false;
    }
    if check_dropoff && !dropoff_window.covers(promised.dropoff) {
        return false;
    }
    true
}

/// Communicated and scheduled times of a pickup/dropoff pair.
#[derive(Debug, Clone, Copy)]
pub struct Timestamps {
    pub pickup_time: UnixMs,
    pub dropoff_time: UnixMs,
    pub scheduled_pickup_time_start: UnixMs,
    pub scheduled_pickup_time_end: UnixMs,
    pub scheduled_dropoff_time_start: UnixMs,
    pub scheduled_dropoff_time_end: UnixMs,
}

#[allow(clippy::too_many_arguments)]
fn timestamps(
    direction: InsertDirection,
    pickup_window: Interval,
    dropoff_window: Interval,
    promised: Option<&PromisedTimes>,
    prev_same_group: Option<&EventEntry>,
    next_same_group: Option<&EventEntry>,
    pax_duration: i64,
    pickup_leeway: i64,
    dropoff_leeway: i64,
) -> Timestamps {
    let (
        scheduled_pickup_time_start,
        scheduled_pickup_time_end,
        scheduled_dropoff_time_start,
        scheduled_dropoff_time_end,
    ) = if let Some(prev) = prev_same_group {
        // Pickup joins the neighbor's group: clamp into its window.
        let start = prev
            .scheduled_time_start
            .max(promised.map_or(i64::MIN, |p| p.pickup))
            .max(pickup_window.start_time);
        let end = start + pickup_leeway;
        (start, end, end + pax_duration, end + pax_duration + dropoff_leeway)
    } else if let Some(next) = next_same_group {
        let end = next
            .scheduled_time_start
            .min(promised.map_or(i64::MAX, |p| p.dropoff))
            .min(dropoff_window.end_time);
        let start = end - dropoff_leeway;
        (
            start - pax_duration - pickup_leeway,
            start - pax_duration,
            start,
            end,
        )
    } else if direction == InsertDirection::StopPickup {
        let start = match promised {
            Some(p) if pickup_window.covers(p.pickup) => p.pickup,
            _ => pickup_window.start_time,
        };
        let end = start + pickup_leeway;
        (start, end, end + pax_duration, end + pax_duration + dropoff_leeway)
    } else {
        let end = match promised {
            Some(p) if dropoff_window.covers(p.dropoff) => p.dropoff,
            _ => dropoff_window.end_time,
        };
        let start = end - dropoff_leeway;
        (
            start - pax_duration - pickup_leeway,
            start - pax_duration,
            start,
            end,
        )
    };

    let (pickup_time, dropoff_time) = match direction {
        InsertDirection::StopPickup => (
            promised.map_or(scheduled_pickup_time_start, |p| p.pickup),
            promised.map_or(
                scheduled_dropoff_time_start + MAX_PASSENGER_WAITING_TIME_DROPOFF,
                |p| p.dropoff,
            ),
        ),
        InsertDirection::StopDropoff => (
            promised.map_or(
                scheduled_pickup_time_end - MAX_PASSENGER_WAITING_TIME_PICKUP,
                |p| p.pickup,
            ),
            promised.map_or(scheduled_dropoff_time_end, |p| p.dropoff),
        ),
    };

    Timestamps {
        pickup_time,
        dropoff_time,
        scheduled_pickup_time_start,
        scheduled_pickup_time_end,
        scheduled_dropoff_time_start,
        scheduled_dropoff_time_end,
    }
}

/// A pickup and dropoff placed together at one gap.
#[derive(Debug, Clone)]
pub struct BothEvaluation {
    pub how: InsertHow,
    pub prev_leg: i64,
    pub pax_leg: i64,
    pub next_leg: i64,
    pub driving_delta: i64,
    pub waiting_time: i64,
    pub passenger_duration: i64,
    pub cost: f64,
    pub timestamps: Timestamps,
    pub departure: Option<UnixMs>,
    pub arrival: Option<UnixMs>,
}

/// Evaluate inserting both events at the gap between `prev` and `next`.
#[allow(clippy::too_many_arguments)]
pub fn evaluate_both(
    how: InsertHow,
    direction: InsertDirection,
    windows: &[Interval],
    pax_duration: Option<i64>,
    stop_window: Interval,
    prev_leg: Option<i64>,
    next_leg: Option<i64>,
    prev: Option<&EventEntry>,
    next: Option<&EventEntry>,
    pickup_same_group_as_prev: bool,
    dropoff_same_group_as_next: bool,
    allowed_times: &[Interval],
    passengers: i32,
    promised: Option<&PromisedTimes>,
) -> Option<BothEvaluation> {
    let prev_leg = prev_leg?;
    let next_leg = next_leg?;
    let pax_leg = pax_duration?;

    let window = arrival_window(
        direction,
        windows,
        pax_leg,
        Some(stop_window),
        prev_leg,
        next_leg,
        allowed_times,
    )?;
    if let Some(p) = promised {
        if !keeps_promises(InsertWhat::Both, direction, window, pax_leg, p) {
            return None;
        }
    }

    let new_driving = prev_leg + pax_leg + next_leg;
    let driving_delta = new_driving - old_driving_time(how, prev, next);
    let waiting_time = taxi_waiting_time(how, prev, next, new_driving);
    if waiting_time > MAX_TAXI_WAITING_TIME {
        return None;
    }

    let (pickup_window, dropoff_window) = match direction {
        InsertDirection::StopPickup => (window, window.shift(pax_leg)),
        InsertDirection::StopDropoff => (window.shift(-pax_leg), window),
    };
    let (pickup_leeway, dropoff_leeway) = leeways(how, window.size());
    let ts = timestamps(
        direction,
        pickup_window,
        dropoff_window,
        promised,
        prev.filter(|p| pickup_same_group_as_prev && p.time().overlaps(&pickup_window)),
        next.filter(|n| dropoff_same_group_as_next && n.time().overlaps(&dropoff_window)),
        pax_leg,
        pickup_leeway,
        dropoff_leeway,
    );

    let passenger_duration =
        passengers as i64 * (ts.scheduled_dropoff_time_start - ts.scheduled_pickup_time_end);
    let cost = compute_cost(driving_delta, waiting_time, passenger_duration);

    Some(BothEvaluation {
        how,
        prev_leg,
        pax_leg,
        next_leg,
        driving_delta,
        waiting_time,
        passenger_duration,
        cost,
        timestamps: ts,
        departure: comes_from_company(how).then(|| ts.scheduled_pickup_time_end - prev_leg),
        arrival: returns_to_company(how).then(|| ts.scheduled_dropoff_time_start + next_leg),
    })
}

/// One side of a split insertion, to be paired later.
#[derive(Debug, Clone)]
pub struct SingleEvaluation {
    pub window: Interval,
    pub how: InsertHow,
    pub prev_leg: i64,
    pub next_leg: i64,
    pub driving_delta: i64,
    pub waiting_time: i64,
    pub passenger_duration: i64,
    pub cost: f64,
    pub prev_id: Option<Uuid>,
    pub next_id: Option<Uuid>,
    pub idx_in_events: usize,
}

/// Evaluate inserting only one side of the trip at a gap.
#[allow(clippy::too_many_arguments)]
pub fn evaluate_single(
    what: InsertWhat,
    how: InsertHow,
    direction: InsertDirection,
    windows: &[Interval],
    stop_window: Option<Interval>,
    prev_leg: Option<i64>,
    next_leg: Option<i64>,
    prev: Option<&EventEntry>,
    next: Option<&EventEntry>,
    allowed_times: &[Interval],
    idx_in_events: usize,
    promised: Option<&PromisedTimes>,
) -> Option<SingleEvaluation> {
    debug_assert!(what != InsertWhat::Both);
    let prev_leg = prev_leg?;
    let next_leg = next_leg?;

    let window = arrival_window(
        direction,
        windows,
        0,
        stop_window,
        prev_leg,
        next_leg,
        allowed_times,
    )?;
    if let Some(p) = promised {
        if !keeps_promises(what, direction, window, 0, p) {
            return None;
        }
    }

    let new_driving = prev_leg + next_leg;
    let driving_delta = new_driving - old_driving_time(how, prev, next);
    let waiting_time = taxi_waiting_time(how, prev, next, new_driving);
    if waiting_time > MAX_TAXI_WAITING_TIME {
        return None;
    }

    let is_pickup = (what == InsertWhat::Stop) == (direction == InsertDirection::StopPickup);
    // A lone pickup makes the passenger ride the leg toward the next event,
    // a lone dropoff the leg from the previous one.
    let passenger_duration = if is_pickup { next_leg } else { prev_leg };
    let cost = compute_cost(driving_delta, waiting_time, passenger_duration);

    Some(SingleEvaluation {
        window,
        how,
        prev_leg,
        next_leg,
        driving_delta,
        waiting_time,
        passenger_duration,
        cost,
        prev_id: prev.map(|p| p.id),
        next_id: next.map(|n| n.id),
        idx_in_events,
    })
}

/// A pickup and dropoff at different gaps of the same capacity range.
#[derive(Debug, Clone)]
pub struct PairEvaluation {
    pub driving_delta: i64,
    pub waiting_time: i64,
    pub passenger_duration: i64,
    pub cost: f64,
    pub timestamps: Timestamps,
    pub departure: Option<UnixMs>,
    pub arrival: Option<UnixMs>,
}

/// Combine a pickup-side and a dropoff-side evaluation into one candidate,
/// or `None` when their windows cannot be ordered.
pub fn combine_pair(
    pickup: &SingleEvaluation,
    dropoff: &SingleEvaluation,
    passengers: i32,
) -> Option<PairEvaluation> {
    let pickup_time = (pickup.window.end_time - MAX_PASSENGER_WAITING_TIME_PICKUP)
        .max(pickup.window.start_time);
    let dropoff_time = (dropoff.window.start_time + MAX_PASSENGER_WAITING_TIME_DROPOFF)
        .min(dropoff.window.end_time);

    let leeway = dropoff_time - pickup_time - pickup.next_leg - dropoff.prev_leg;
    if leeway < 0 {
        return None;
    }

    let pickup_shift = pickup
        .window
        .size()
        .min(MAX_PASSENGER_WAITING_TIME_PICKUP)
        .min(leeway);
    let scheduled_pickup = pickup_time
        + if pickup.how == InsertHow::Append {
            0
        } else {
            pickup_shift
        };
    let scheduled_dropoff = dropoff_time
        - if dropoff.how == InsertHow::Prepend {
            0
        } else {
            dropoff
                .window
                .size()
                .min(MAX_PASSENGER_WAITING_TIME_DROPOFF)
                .min(leeway - pickup_shift)
        };

    let driving_delta = pickup.driving_delta + dropoff.driving_delta;
    let waiting_time = pickup.waiting_time + dropoff.waiting_time;
    if waiting_time > MAX_TAXI_WAITING_TIME {
        return None;
    }
    let passenger_duration = passengers as i64 * (scheduled_dropoff - scheduled_pickup);
    let cost = compute_cost(driving_delta, waiting_time, passenger_duration);

    Some(PairEvaluation {
        driving_delta,
        waiting_time,
        passenger_duration,
        cost,
        timestamps: Timestamps {
            pickup_time,
            dropoff_time,
            scheduled_pickup_time_start: pickup_time,
            scheduled_pickup_time_end: scheduled_pickup,
            scheduled_dropoff_time_start: scheduled_dropoff,
            scheduled_dropoff_time_end: dropoff_time,
        },
        departure: comes_from_company(pickup.how).then(|| scheduled_pickup - pickup.prev_leg),
        arrival: returns_to_company(dropoff.how).then(|| scheduled_dropoff + dropoff.next_leg),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{HOUR, MINUTE};

    #[test]
    fn test_cost_is_nonnegative_for_feasible_terms() {
        assert!(compute_cost(0, 0, 0) >= 0.0);
        assert!(compute_cost(10 * MINUTE, 5 * MINUTE, 20 * MINUTE) >= 0.0);
    }

    #[test]
    fn test_cost_prefers_less_driving() {
        let cheap = compute_cost(5 * MINUTE, 0, 0);
        let expensive = compute_cost(15 * MINUTE, 0, 0);
        assert!(cheap < expensive);
    }

    #[test]
    fn test_waiting_weighs_half() {
        assert_eq!(
            compute_cost(0, 10 * MINUTE, 0),
            compute_cost(5 * MINUTE, 0, 0)
        );
    }

    #[test]
    fn test_new_tour_evaluation_basic() {
        // One availability window, no neighbors, 10-minute legs.
        let windows = vec![Interval::new(0, 4 * HOUR)];
        let allowed = vec![Interval::new(0, 4 * HOUR)];
        let stop_window = Interval::new(HOUR, HOUR + 10 * MINUTE);
        let eval = evaluate_both(
            InsertHow::NewTour,
            InsertDirection::StopPickup,
            &windows,
            Some(15 * MINUTE),
            stop_window,
            Some(10 * MINUTE),
            Some(10 * MINUTE),
            None,
            None,
            false,
            false,
            &allowed,
            2,
            None,
        )
        .expect("feasible");
        assert_eq!(eval.driving_delta, 35 * MINUTE);
        assert_eq!(eval.waiting_time, 0);
        assert!(eval.cost >= 0.0);
        assert!(eval.departure.is_some());
        assert!(eval.arrival.is_some());
        // Dropoff happens exactly the passenger leg after the pickup.
        assert_eq!(
            eval.timestamps.scheduled_dropoff_time_start
                - eval.timestamps.scheduled_pickup_time_end,
            15 * MINUTE
        );
    }

    #[test]
    fn test_evaluation_fails_without_reachable_leg() {
        let windows = vec![Interval::new(0, 4 * HOUR)];
        let allowed = vec![Interval::new(0, 4 * HOUR)];
        let eval = evaluate_both(
            InsertHow::NewTour,
            InsertDirection::StopPickup,
            &windows,
            Some(15 * MINUTE),
            Interval::new(HOUR, HOUR + 10 * MINUTE),
            None,
            Some(10 * MINUTE),
            None,
            None,
            false,
            false,
            &allowed,
            1,
            None,
        );
        assert!(eval.is_none());
    }

    #[test]
    fn test_promise_rejected_outside_window() {
        let windows = vec![Interval::new(0, 4 * HOUR)];
        let allowed = vec![Interval::new(0, 4 * HOUR)];
        let promised = PromisedTimes {
            pickup: 3 * HOUR,
            dropoff: 3 * HOUR + 30 * MINUTE,
        };
        let eval = evaluate_both(
            InsertHow::NewTour,
            InsertDirection::StopPickup,
            &windows,
            Some(15 * MINUTE),
            Interval::new(HOUR, HOUR + 10 * MINUTE),
            Some(10 * MINUTE),
            Some(10 * MINUTE),
            None,
            None,
            false,
            false,
            &allowed,
            1,
            Some(&promised),
        );
        assert!(eval.is_none());
    }

    #[test]
    fn test_combine_pair_orders_pickup_before_dropoff() {
        let pickup = SingleEvaluation {
            window: Interval::new(HOUR, HOUR + 20 * MINUTE),
            how: InsertHow::Insert,
            prev_leg: 5 * MINUTE,
            next_leg: 5 * MINUTE,
            driving_delta: 8 * MINUTE,
            waiting_time: 0,
            passenger_duration: 5 * MINUTE,
            cost: 0.0,
            prev_id: None,
            next_id: None,
            idx_in_events: 1,
        };
        let dropoff = SingleEvaluation {
            window: Interval::new(2 * HOUR, 2 * HOUR + 20 * MINUTE),
            idx_in_events: 3,
            ..pickup.clone()
        };
        let pair = combine_pair(&pickup, &dropoff, 1).expect("feasible pair");
        assert!(
            pair.timestamps.scheduled_pickup_time_end
                <= pair.timestamps.scheduled_dropoff_time_start
        );
        assert_eq!(pair.driving_delta, 16 * MINUTE);
    }

    #[test]
    fn test_combine_pair_rejects_reversed_windows() {
        let pickup = SingleEvaluation {
            window: Interval::new(2 * HOUR, 2 * HOUR + 10 * MINUTE),
            how: InsertHow::Insert,
            prev_leg: 5 * MINUTE,
            next_leg: 5 * MINUTE,
            driving_delta: 0,
            waiting_time: 0,
            passenger_duration: 0,
            cost: 0.0,
            prev_id: None,
            next_id: None,
            idx_in_events: 1,
        };
        let dropoff = SingleEvaluation {
            window: Interval::new(HOUR, HOUR + 10 * MINUTE),
            idx_in_events: 3,
            ..pickup.clone()
        };
        assert!(combine_pair(&pickup, &dropoff, 1).is_none());
    }
}
