//! # Endpoint Selection
//!
//! Two policies for two traffic shapes:
//!
//! - [`WeightedSelector`]: weighted random choice among the endpoints that
//!   serve a model. Stateless per call apart from the cached weight tables.
//! - [`RoundRobinPool`]: strict rotation over the healthy members of a
//!   homogeneous auxiliary pool, falling back to every member when none
//!   passes its probe.

pub mod round_robin;
pub mod weighted;

pub use round_robin::{PoolSelection, RoundRobinPool};
pub use weighted::{WeightTable, WeightedSelector};
