//! Insertion candidates.
//!
//! An [`Insertion`] is ephemeral: produced by the whitelist evaluation,
//! echoed back by the client on booking, consumed by the committer and then
//! discarded. It is never persisted.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::interval::UnixMs;

/// How a new event pair attaches to the existing tour structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsertHow {
    /// A fresh tour in a free availability window.
    NewTour,
    /// Bridges the last event of one tour and the first event of the next;
    /// the two tours are merged on commit.
    Connect,
    /// After the last event of a tour.
    Append,
    /// Before the first event of a tour.
    Prepend,
    /// Strictly between two events of the same tour.
    Insert,
}

/// Where in a vehicle's event sequence a candidate gap sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertWhere {
    BeforeFirstEvent,
    AfterLastEvent,
    BetweenEvents,
    BetweenTours,
}

/// Which side of the trip is being placed at a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertWhat {
    /// Pickup and dropoff together at one gap.
    Both,
    /// Only the fixed-time stop side.
    Stop,
    /// Only the freely chosen side.
    UserChosen,
}

/// Which role the fixed-time stop plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertDirection {
    StopPickup,
    StopDropoff,
}

/// Times already promised to a customer, which a re-evaluation must keep.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromisedTimes {
    pub pickup: UnixMs,
    pub dropoff: UnixMs,
}

/// A fully evaluated, committable insertion candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insertion {
    pub company: Uuid,
    pub vehicle: Uuid,
    /// `None` means a new tour is created on commit.
    pub tour: Option<Uuid>,
    pub pickup_how: InsertHow,
    pub dropoff_how: InsertHow,

    /// Times promised to the customer.
    pub pickup_time: UnixMs,
    pub dropoff_time: UnixMs,
    pub scheduled_pickup_time_start: UnixMs,
    pub scheduled_pickup_time_end: UnixMs,
    pub scheduled_dropoff_time_start: UnixMs,
    pub scheduled_dropoff_time_end: UnixMs,

    pub pickup_prev_leg_duration: i64,
    pub pickup_next_leg_duration: i64,
    pub dropoff_prev_leg_duration: i64,
    pub dropoff_next_leg_duration: i64,

    /// Tour bounds when the insertion opens or closes a tour.
    pub departure: Option<UnixMs>,
    pub arrival: Option<UnixMs>,

    /// Neighboring persisted events, where such a neighbor exists.
    pub prev_pickup_id: Option<Uuid>,
    pub next_pickup_id: Option<Uuid>,
    pub prev_dropoff_id: Option<Uuid>,
    pub next_dropoff_id: Option<Uuid>,

    /// Positions in the vehicle's event sequence at evaluation time.
    pub pickup_idx: Option<usize>,
    pub dropoff_idx: Option<usize>,

    pub driving_duration_delta: i64,
    pub taxi_waiting_time: i64,
    pub passenger_duration: i64,
    pub cost: f64,
}
