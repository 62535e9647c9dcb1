//! Database queries

pub mod availability;
pub mod booking;
pub mod snapshot;
pub mod tour;
