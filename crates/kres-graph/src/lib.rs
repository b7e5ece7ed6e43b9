//! kres Resolution Graph
//!
//! Arena graph recording how an observation is resolved, plus the
//! session-wide cache of contributors that can be reused.
//!
//! # Overview
//!
//! - **ResolutionGraph**: coverage-labelled "resolved by" edges between
//!   resolvables, with the coverage achieved for its target
//! - **AvailableCache**: concurrent catalog of successful contributors per
//!   (observable, scale)

#![warn(missing_docs)]

pub mod cache;
pub mod graph;

// Re-exports
pub use cache::{Available, AvailableCache, AvailableKey};
pub use graph::{Edge, GraphFragment, NodeId, ResolutionGraph};
