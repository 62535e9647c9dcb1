//! Fixed scheduling constants.
//!
//! All durations are in milliseconds; cost weights are dimensionless.

pub const SECOND: i64 = 1000;
pub const MINUTE: i64 = 60 * SECOND;
pub const HOUR: i64 = 60 * MINUTE;
pub const DAY: i64 = 24 * HOUR;

/// Minimum lead time between booking and the first event of the ride.
pub const MIN_PREP: i64 = HOUR;

/// Longest acceptable single driving leg. Oracle results above this are
/// treated as unreachable.
pub const MAX_TRAVEL: i64 = HOUR;

/// How far the scheduled pickup may drift behind the communicated pickup.
pub const MAX_PASSENGER_WAITING_TIME_PICKUP: i64 = 10 * MINUTE;

/// How far the scheduled dropoff may drift ahead of the communicated dropoff.
pub const MAX_PASSENGER_WAITING_TIME_DROPOFF: i64 = 10 * MINUTE;

/// Candidates that would leave the vehicle idling longer than this between
/// events are discarded outright.
pub const MAX_TAXI_WAITING_TIME: i64 = HOUR;

/// Fixed handling time whenever a leg crosses between different requests.
pub const PASSENGER_CHANGE_DURATION: i64 = MINUTE;

/// Extra slack added onto every driving leg.
pub const BUFFER_TIME: i64 = 0;

/// Daily operating corridor (offset from local midnight).
pub const EARLIEST_SHIFT_START: i64 = 6 * HOUR;
pub const LATEST_SHIFT_END: i64 = 21 * HOUR;

/// Coordinates closer than this are the same stop.
pub const COORDINATE_ROUNDING_ERROR_THRESHOLD: f64 = 0.00001;

// Cost weights for comparing insertion candidates.
pub const DRIVING_TIME_COST_FACTOR: f64 = 1.0;
pub const TAXI_WAITING_TIME_COST_FACTOR: f64 = 0.5;
pub const PASSENGER_TIME_COST_FACTOR: f64 = 0.0;

/// Fare per full-paying passenger, in cents.
pub const FIXED_PRICE: i32 = 300;

/// Attempt budget for serializable transactions.
pub const MAX_TRANSACTION_RETRIES: u32 = 5;

/// Base delay of the retry backoff; grows by 1.5x per attempt.
pub const TRANSACTION_RETRY_BASE_DELAY_MS: u64 = 50;
