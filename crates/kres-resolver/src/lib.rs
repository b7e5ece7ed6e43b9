//! kres Resolver
//!
//! Resolves a request to observe something over a scale into a
//! [`Dataflow`](kres_dataflow::Dataflow):
//!
//! 1. The reasoner proposes observation strategies, ranked by the
//!    [`Prioritizer`]
//! 2. Strategies are tried in order; their operations recurse into
//!    sub-observations, models from the resource catalog and runtime
//!    validation
//! 3. Contributions accumulate coverage until the scale is covered
//! 4. The resulting graph is compiled into a dataflow
//!
//! Collaborators are reached through the async [`Reasoner`],
//! [`ResourceCatalog`] and [`RuntimeService`] traits.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod compiler;
pub mod config;
pub mod error;
pub mod prioritizer;
pub mod scope;
pub mod service;
pub mod services;

// Re-exports for convenience
pub use compiler::ResolutionCompiler;
pub use config::{ResolverConfig, DEFAULT_RANKING_STRATEGY};
pub use error::ResolverError;
pub use prioritizer::{Criterion, Prioritizer, Rankable, RankingCriteria, RankingStrategy};
pub use scope::{ContextScope, ResolutionConstraint};
pub use service::ResolverService;
pub use services::{Reasoner, ResourceCatalog, RuntimeService};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
