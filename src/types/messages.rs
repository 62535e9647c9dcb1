//! NATS message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::capacities::Capacities;
use super::coordinates::Coordinates;
use super::insertion::Insertion;
use super::interval::{Interval, UnixMs};

/// Generic request wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: T,
}

impl<T> Request<T> {
    pub fn new(payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Generic success response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(request_id: Uuid, payload: T) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(request_id: Uuid, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

/// A candidate transit stop with its fixed connection times.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopCandidate {
    pub lat: f64,
    pub lng: f64,
    pub times: Vec<UnixMs>,
}

impl StopCandidate {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }
}

/// Shared input of the blacklist and whitelist endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripQuery {
    pub start: Coordinates,
    pub target: Coordinates,
    /// Candidate stops with their fixed times; whether they act as pickup
    /// or dropoff follows from `start_fixed`.
    pub stops: Vec<StopCandidate>,
    /// When true the start side has the fixed times (stop is the pickup).
    pub start_fixed: bool,
    pub capacities: Capacities,
    pub earliest: UnixMs,
    pub latest: UnixMs,
}

/// Boolean feasibility grid, `feasible[stop][time]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistResponse {
    pub feasible: Vec<Vec<bool>>,
}

/// Per-candidate best insertions, `candidates[stop][time]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhitelistResponse {
    pub candidates: Vec<Vec<Option<Insertion>>>,
}

/// The trip a customer actually books.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub start: Coordinates,
    pub target: Coordinates,
    pub start_address: String,
    pub target_address: String,
    /// Promised pickup time.
    pub start_time: UnixMs,
    /// Promised dropoff time.
    pub target_time: UnixMs,
}

/// Booking commit input: the whitelisted insertion plus the trip it was
/// computed for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingCommitRequest {
    pub insertion: Insertion,
    pub connection: Connection,
    pub start_fixed: bool,
    pub capacities: Capacities,
    pub customer: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingCommitResponse {
    pub request_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequestPayload {
    pub request_id: Uuid,
    pub customer: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveTourPayload {
    pub tour_id: Uuid,
    pub vehicle_id: Uuid,
    pub company_id: Uuid,
}

/// Outcome of cancel/move style operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: 200,
            message: None,
        }
    }

    pub fn declined(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
        }
    }
}

/// Availability maintenance for one vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityUpdatePayload {
    pub vehicle_id: Uuid,
    #[serde(default)]
    pub add: Vec<Interval>,
    #[serde(default)]
    pub remove: Vec<Interval>,
}
