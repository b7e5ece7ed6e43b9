//! Resolver entry point

use crate::compiler::ResolutionCompiler;
use crate::config::ResolverConfig;
use crate::error::ResolverError;
use crate::prioritizer::RankingStrategy;
use crate::scope::ContextScope;
use kres_dataflow::{Dataflow, DataflowCompiler, DataflowEncoder};
use kres_graph::ResolutionGraph;
use kres_knowledge::Observation;
use std::sync::Arc;

/// Turns observation requests into dataflows
///
/// Each call to [`resolve`](Self::resolve) is an independent session with
/// its own graph, reuse cache and ranking cache.
#[derive(Debug, Clone)]
pub struct ResolverService {
    config: Arc<ResolverConfig>,
    ranking: RankingStrategy,
}

impl ResolverService {
    /// Create service
    ///
    /// # Errors
    /// Returns [`ResolverError::Config`] if the configuration is invalid.
    pub fn new(config: ResolverConfig) -> Result<Self, ResolverError> {
        config.validate()?;
        let ranking = RankingStrategy::parse(&config.ranking_strategy)?;
        tracing::info!("Resolver ready, ranking by {:?}", ranking.criteria());
        Ok(Self {
            config: Arc::new(config),
            ranking,
        })
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `observation` in `scope` and compile the result
    ///
    /// Observations that are already resolved need no dataflow. A
    /// substantial, non-collective observation that nothing resolves gets a
    /// trivial dataflow that only instantiates it.
    ///
    /// # Errors
    /// - [`ResolverError::MissingContext`] if the scope reported a fatal error
    /// - [`ResolverError::CannotResolve`] if a dependent or collective
    ///   observation cannot be resolved
    /// - [`ResolverError::IncompatibleScale`] on inconsistent coverages
    #[tracing::instrument(skip_all, fields(observable = %observation.observable(), context = %scope.id()))]
    pub async fn resolve(
        &self,
        observation: Arc<Observation>,
        scope: &ContextScope,
    ) -> Result<Dataflow, ResolverError> {
        let observable = observation.observable().clone();
        if observation.is_resolved() {
            tracing::info!("{} is already resolved", observable);
            return Ok(Dataflow::empty());
        }

        tracing::info!("Resolving {}", observable);
        let compiler = ResolutionCompiler::new(Arc::clone(&self.config), self.ranking.clone());
        let outcome = compiler.resolve(Arc::clone(&observation), scope).await;

        if scope.is_fatal() {
            return Err(ResolverError::MissingContext {
                urn: observable.urn().to_owned(),
                context: scope.id().to_owned(),
                reason: scope.errors().join("; "),
            });
        }

        let graph = match outcome {
            Ok(graph) => graph,
            Err(ResolverError::NoStrategy(urn)) => {
                tracing::debug!("No strategy for {}", urn);
                ResolutionGraph::empty()
            }
            Err(e) => return Err(e),
        };

        if !graph.is_empty() {
            let dataflow = DataflowCompiler::new(&graph).compile();
            tracing::info!(
                "Resolved {} with coverage {:.3} ({} nodes)",
                observable,
                dataflow.coverage(),
                graph.node_count()
            );
            return Ok(dataflow);
        }

        if observable.is_substantial() && !observable.is_collective() {
            tracing::info!("Nothing resolves {}, instantiating it without computations", observable);
            return Ok(Dataflow::trivial(&observation));
        }

        tracing::info!("Cannot resolve {}", observable);
        Err(ResolverError::CannotResolve {
            urn: observable.urn().to_owned(),
            context: scope.id().to_owned(),
        })
    }

    /// Text form of `dataflow`
    #[must_use]
    pub fn encode(&self, dataflow: &Dataflow) -> String {
        DataflowEncoder::new(dataflow).encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{Reasoner, ResourceCatalog, RuntimeService};
    use kres_dataflow::ActuatorKind;
    use kres_knowledge::{
        Contextualizable, Model, Observable, ObservationStrategy, ResourceSet, SemanticType,
    };
    use mockall::mock;

    mock! {
        Reasoning {}
        #[async_trait::async_trait]
        impl Reasoner for Reasoning {
            async fn compute_observation_strategies(
                &self,
                observation: &Observation,
                scope: &ContextScope,
            ) -> Result<Vec<ObservationStrategy>, ResolverError>;
        }
    }

    mock! {
        Catalog {}
        #[async_trait::async_trait]
        impl ResourceCatalog for Catalog {
            async fn query_models(
                &self,
                observable: &Observable,
                scope: &ContextScope,
            ) -> Result<Vec<Model>, ResolverError>;
        }
    }

    mock! {
        Runtime {}
        #[async_trait::async_trait]
        impl RuntimeService for Runtime {
            async fn resolve_contextualizables(
                &self,
                steps: &[Contextualizable],
                scope: &ContextScope,
            ) -> Result<ResourceSet, ResolverError>;
        }
    }

    fn without_strategies() -> ContextScope {
        let mut reasoner = MockReasoning::new();
        reasoner
            .expect_compute_observation_strategies()
            .returning(|_, _| Ok(Vec::new()));
        ContextScope::new(Arc::new(reasoner), Arc::new(MockCatalog::new()), Arc::new(MockRuntime::new()))
    }

    fn service() -> ResolverService {
        ResolverService::new(ResolverConfig::default()).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(ResolverService::new(ResolverConfig::new().with_model_parallelism(0)).is_err());
        assert!(ResolverService::new(ResolverConfig::new().with_ranking_strategy("priority")).is_err());
    }

    #[tokio::test]
    async fn unresolved_substantial_gets_trivial_dataflow() {
        let region = Observation::new(Observable::new("earth:Region", SemanticType::Subject), None);
        let dataflow = service().resolve(Arc::new(region), &without_strategies()).await.unwrap();

        assert_eq!(dataflow.actuators().len(), 1);
        assert_eq!(dataflow.actuators()[0].kind(), ActuatorKind::Resolve);
        assert_eq!(service().encode(&dataflow), "resolve earth:Region;");
    }

    #[tokio::test]
    async fn unresolved_collective_is_an_error() {
        let towns = Observation::new(Observable::new("earth:Town", SemanticType::Subject).collective(), None);
        let err = service().resolve(Arc::new(towns), &without_strategies()).await.unwrap_err();
        assert!(matches!(err, ResolverError::CannotResolve { ref urn, .. } if urn == "earth:Town"));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn resolved_observation_needs_nothing() {
        let scope = ContextScope::new(
            Arc::new(MockReasoning::new()),
            Arc::new(MockCatalog::new()),
            Arc::new(MockRuntime::new()),
        );
        let region = Observation::new(Observable::new("earth:Region", SemanticType::Subject), None).resolved();
        assert!(service().resolve(Arc::new(region), &scope).await.unwrap().is_empty());
    }
}
