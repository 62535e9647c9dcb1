//! In-memory snapshot of the fleet state used by the insertion planner.
//!
//! Loaded once per request from the store (companies with their vehicles,
//! the vehicles' tours, availabilities and events overlapping the search
//! window), then treated as immutable by the evaluation pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::capacities::Capacities;
use super::coordinates::Coordinates;
use super::interval::{Interval, UnixMs};

/// One pickup or dropoff event of a persisted request, joined with its
/// request's capacities and its tour's bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEntry {
    pub id: Uuid,
    pub request_id: Uuid,
    pub tour_id: Uuid,
    pub event_group: Uuid,
    pub is_pickup: bool,
    pub coordinates: Coordinates,
    pub scheduled_time_start: UnixMs,
    pub scheduled_time_end: UnixMs,
    pub communicated_time: UnixMs,
    pub prev_leg_duration: i64,
    pub next_leg_duration: i64,
    pub capacities: Capacities,
    pub tour_departure: UnixMs,
    pub tour_arrival: UnixMs,
    /// Driving time from the previous tour of the same vehicle, if known.
    pub direct_duration: Option<i64>,
}

impl EventEntry {
    pub fn time(&self) -> Interval {
        Interval::new(self.scheduled_time_start, self.scheduled_time_end)
    }
}

/// Departure/arrival bounds of one tour.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourSpan {
    pub id: Uuid,
    pub departure: UnixMs,
    pub arrival: UnixMs,
}

/// A vehicle with everything the planner needs to know about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSnapshot {
    pub id: Uuid,
    pub capacities: Capacities,
    /// Merged, disjoint availability intervals.
    pub availabilities: Vec<Interval>,
    /// Tours overlapping the search window, ordered by departure.
    pub tours: Vec<TourSpan>,
    /// Events of those tours, ordered by scheduled window start.
    pub events: Vec<EventEntry>,
    /// Latest event of any earlier tour outside the window.
    pub last_event_before: Option<EventEntry>,
    /// Earliest event of any later tour outside the window.
    pub first_event_after: Option<EventEntry>,
}

/// A company with its eligible vehicles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanySnapshot {
    pub id: Uuid,
    pub zone_id: Uuid,
    pub coordinates: Coordinates,
    pub vehicles: Vec<VehicleSnapshot>,
}
