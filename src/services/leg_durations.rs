//! Batched leg-duration recomputation.
//!
//! Whenever an event's temporal neighbor changes, the stored driving
//! durations on both sides of the new seam are refreshed from the oracle.
//! All updates of one booking or cancellation are collected into one batch
//! so a single store round trip applies them together with the main write.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::PASSENGER_CHANGE_DURATION;
use crate::error::BookingError;
use crate::services::routing::{single_leg, RoutingOracle};
use crate::types::EventEntry;

/// New stored duration for one event's leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegDurationUpdate {
    pub event_id: Uuid,
    pub duration: i64,
}

/// Batched seam updates: `prev_leg` entries patch the later event's
/// inbound leg, `next_leg` entries the earlier event's outbound leg.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegDurationUpdates {
    pub prev_leg: Vec<LegDurationUpdate>,
    pub next_leg: Vec<LegDurationUpdate>,
}

/// Recompute the legs across each `(last_events[i], first_events[i])` seam.
///
/// Events sharing a group are coincident; their connecting leg stays zero
/// and produces no update. An unreachable seam fails the whole batch.
pub async fn leg_duration_updates(
    oracle: &dyn RoutingOracle,
    last_events: &[EventEntry],
    first_events: &[EventEntry],
) -> Result<LegDurationUpdates, BookingError> {
    let mut updates = LegDurationUpdates::default();
    for (last, first) in last_events.iter().zip(first_events.iter()) {
        if last.event_group == first.event_group {
            continue;
        }
        let driving = single_leg(oracle, last.coordinates, first.coordinates)
            .await
            .map_err(BookingError::Oracle)?
            .ok_or(BookingError::RoutingUnavailable)?;
        let duration = driving + PASSENGER_CHANGE_DURATION;
        updates.prev_leg.push(LegDurationUpdate {
            event_id: first.id,
            duration,
        });
        updates.next_leg.push(LegDurationUpdate {
            event_id: last.id,
            duration,
        });
    }
    Ok(updates)
}
