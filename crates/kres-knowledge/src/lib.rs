//! kres Knowledge Model
//!
//! The vocabulary the resolution engine works with:
//! - **Observable** / **Observation**: what is to be observed, and the
//!   request to observe it
//! - **Scale** / **Coverage**: where and when, and how much of it a
//!   resolvable satisfies
//! - **Model** / **ObservationStrategy**: the recipes that can satisfy an
//!   observable
//! - **Resolvable**: the closed union of the above, as stored in graphs
//!
//! # Example
//!
//! ```rust
//! use kres_knowledge::{Coverage, Envelope, LogicalConnector, Scale};
//!
//! let scale = Scale::spatial(Envelope::new(0.0, 0.0, 10.0, 10.0).unwrap());
//! let a = Coverage::new(&scale, 0.6).unwrap();
//! let b = Coverage::new(&scale, 0.5).unwrap();
//!
//! let merged = a.merge(&b, LogicalConnector::Union).unwrap();
//! assert!(merged.is_complete());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod coverage;
pub mod error;
pub mod model;
pub mod observable;
pub mod observation;
pub mod resolvable;
pub mod resources;
pub mod scale;
pub mod strategy;

// Re-exports for convenience
pub use coverage::{
    Coverage, CoveragePolicy, CoverageStatus, LogicalConnector, DEFAULT_COMPLETENESS_EPSILON,
    DEFAULT_MIN_RELEVANT_GAIN,
};
pub use error::KnowledgeError;
pub use model::{Contextualizable, ContextualizableKind, Model};
pub use observable::{Observable, SemanticType};
pub use observation::{Observation, ObservationId};
pub use resolvable::{Resolvable, ResolvableKey};
pub use resources::{ResourceKind, ResourceRef, ResourceSet};
pub use scale::{Envelope, Interval, Scale, ScaleSignature};
pub use strategy::{ObservationStrategy, Operation, OperationKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
