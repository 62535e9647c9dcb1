//! Type definitions

pub mod capacities;
pub mod coordinates;
pub mod entities;
pub mod insertion;
pub mod interval;
pub mod messages;

pub use capacities::*;
pub use coordinates::*;
pub use entities::*;
pub use insertion::*;
pub use interval::*;
pub use messages::*;
