//! Collaborator interfaces
//!
//! The resolver consults three remote services. Calls may be slow or fail;
//! the resolver bounds each with the configured timeout and treats a
//! failure as an empty answer from that source.

use crate::error::ResolverError;
use crate::scope::ContextScope;
use kres_knowledge::{Contextualizable, Model, Observable, Observation, ObservationStrategy, ResourceSet};

/// Supplies observation strategies for an observation
#[async_trait::async_trait]
pub trait Reasoner: Send + Sync {
    /// Strategies able to observe `observation`, in no particular order
    async fn compute_observation_strategies(
        &self,
        observation: &Observation,
        scope: &ContextScope,
    ) -> Result<Vec<ObservationStrategy>, ResolverError>;
}

/// Supplies candidate models for an observable
#[async_trait::async_trait]
pub trait ResourceCatalog: Send + Sync {
    /// Models producing `observable` under the scope's constraints
    async fn query_models(
        &self,
        observable: &Observable,
        scope: &ContextScope,
    ) -> Result<Vec<Model>, ResolverError>;
}

/// Validates computations against what the runtime can execute
#[async_trait::async_trait]
pub trait RuntimeService: Send + Sync {
    /// Check that `steps` can run, returning the resources they need
    ///
    /// An unsupported result ([`ResourceSet::is_empty`]) means at least one
    /// step cannot be executed.
    async fn resolve_contextualizables(
        &self,
        steps: &[Contextualizable],
        scope: &ContextScope,
    ) -> Result<ResourceSet, ResolverError>;
}
