//! Resolution compiler
//!
//! Builds the [`ResolutionGraph`] for one observation by recursive search:
//!
//! ```text
//! observation ──▶ strategies (reasoner order, ranked) ──▶ operations
//!                                                   ├─ RESOLVE  ─▶ observation (recurse)
//!                                                   ├─ OBSERVE  ─▶ models (catalog, ranked)
//!                                                   │                └─ dependencies ─▶ observation (recurse)
//!                                                   └─ APPLY    ─▶ runtime validation
//! ```
//!
//! Every step works on a fresh child graph. A child that contributes enough
//! coverage is merged into its parent; anything else is dropped, which is
//! how failure propagates. Only a missing context observation is fatal: it
//! is reported to the scope and every pending branch stops.

use crate::config::ResolverConfig;
use crate::error::ResolverError;
use crate::prioritizer::{Prioritizer, RankingStrategy};
use crate::scope::{ContextScope, ResolutionConstraint};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use kres_graph::ResolutionGraph;
use kres_knowledge::{
    Coverage, CoverageStatus, LogicalConnector, Model, Observable, Observation,
    ObservationStrategy, OperationKind, Resolvable, ResolvableKey, ResourceSet, Scale,
};
use std::future::Future;
use std::sync::Arc;

type Resolution<'a> = BoxFuture<'a, Result<ResolutionGraph, ResolverError>>;

/// Resolves observations into resolution graphs
///
/// One compiler serves one resolution session: its ranking cache is not
/// meant to outlive the session.
#[derive(Debug)]
pub struct ResolutionCompiler {
    config: Arc<ResolverConfig>,
    prioritizer: Prioritizer,
}

impl ResolutionCompiler {
    #[must_use]
    pub fn new(config: Arc<ResolverConfig>, ranking: RankingStrategy) -> Self {
        Self {
            config,
            prioritizer: Prioritizer::new(ranking),
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `observation` in `scope`
    ///
    /// Returns an empty graph if nothing covers the observation well
    /// enough, or if the scope reported a fatal error.
    ///
    /// # Errors
    /// - [`ResolverError::NoStrategy`] if the reasoner has nothing for the
    ///   observation
    /// - [`ResolverError::IncompatibleScale`] if coverages over different
    ///   scales meet
    pub async fn resolve(
        &self,
        observation: Arc<Observation>,
        scope: &ContextScope,
    ) -> Result<ResolutionGraph, ResolverError> {
        if scope.is_fatal() {
            return Ok(ResolutionGraph::empty());
        }

        let observable = observation.observable();
        if needs_context(observable) && scope.context_observation().is_none() {
            scope.error(format!(
                "{} is dependent and needs a context observation to be resolved",
                observable.urn()
            ));
            return Ok(ResolutionGraph::empty());
        }

        let Some(scale) = observation_scale(&observation, scope) else {
            tracing::debug!("Empty scale for {}, nothing to resolve", observable.urn());
            return Ok(ResolutionGraph::empty());
        };

        let root = ResolutionGraph::new(self.config.coverage_policy());
        self.resolve_observation(&root, observation, scale, scope).await
    }

    fn resolve_observation<'a>(
        &'a self,
        parent: &'a ResolutionGraph,
        observation: Arc<Observation>,
        scale: Scale,
        scope: &'a ContextScope,
    ) -> Resolution<'a> {
        async move {
            if scope.is_fatal() {
                return Ok(ResolutionGraph::empty());
            }

            let resolvable = Resolvable::Observation(Arc::clone(&observation));
            if parent.is_resolving(&resolvable.key()) {
                tracing::debug!("{} is already being resolved on this path", resolvable);
                return Ok(ResolutionGraph::empty());
            }
            if parent.depth() >= self.config.max_resolution_depth {
                tracing::warn!(
                    "Maximum resolution depth {} reached at {}",
                    self.config.max_resolution_depth,
                    resolvable
                );
                return Ok(ResolutionGraph::empty());
            }

            let observable = observation.observable();
            let mut graph = parent.create_child(resolvable, &scale);

            for (available, coverage) in graph.get_resolving(observable, &scale) {
                if !coverage.is_relevant_to(graph.coverage())? {
                    continue;
                }
                tracing::trace!(
                    "Reusing {} for {} ({:.3})",
                    available.resolvable(),
                    observable,
                    coverage.fraction()
                );
                if graph.link(&available, &coverage)? {
                    return Ok(graph);
                }
            }

            let scope = scope.with_resolution_constraints([ResolutionConstraint::Provenance(
                observable.urn().to_owned(),
            )]);
            let mut strategies = self
                .guarded(
                    "reasoner",
                    Vec::new(),
                    scope.reasoner().compute_observation_strategies(&observation, &scope),
                )
                .await;

            if strategies.is_empty() && parent.depth() == 0 && graph.is_empty() {
                return Err(ResolverError::NoStrategy(observable.urn().to_owned()));
            }
            self.prioritizer.sort_stable(&mut strategies, observable, &scope, &scale);

            // instances of countables are the context of their own dependents
            let inner = if observable.semantic_type().is_countable() && !observable.is_collective() {
                scope.within(Arc::clone(&observation))
            } else {
                scope.clone()
            };

            let mut accumulated = graph.coverage().clone();
            let mut kept = Vec::new();
            {
                let current = &graph;
                let inner = &inner;
                let mut results = futures::stream::iter(strategies)
                    .map(|strategy| self.resolve_strategy(current, Arc::new(strategy), scale, inner))
                    .buffered(self.config.strategy_parallelism.max(1));

                while let Some(child) = results.next().await {
                    let child = child?;
                    if scope.is_fatal() {
                        return Ok(ResolutionGraph::empty());
                    }
                    let status = classify(&accumulated, &child)?;
                    if !status.is_relevant() {
                        tracing::debug!("Strategy {} is not relevant to {}", describe(&child), observable);
                        continue;
                    }
                    if child.is_complete() {
                        tracing::debug!("Strategy {} resolves {} completely", describe(&child), observable);
                        kept.clear();
                        accumulated = child.coverage().clone();
                        kept.push(child);
                        break;
                    }
                    accumulated = accumulated.merge(child.coverage(), LogicalConnector::Union)?;
                    kept.push(child);
                    if accumulated.is_complete() {
                        break;
                    }
                }
            }

            if !graph.is_complete() && !accumulated.is_complete() {
                tracing::debug!(
                    "{} resolved only to {:.3}, giving up",
                    observable,
                    accumulated.fraction()
                );
                return Ok(ResolutionGraph::empty());
            }

            for child in kept {
                graph.merge(child, None)?;
            }
            graph.accept(observable, &graph, graph.coverage().fraction());
            Ok(graph)
        }
        .boxed()
    }

    fn resolve_strategy<'a>(
        &'a self,
        parent: &'a ResolutionGraph,
        strategy: Arc<ObservationStrategy>,
        scale: Scale,
        scope: &'a ContextScope,
    ) -> Resolution<'a> {
        async move {
            let resolvable = Resolvable::Strategy(Arc::clone(&strategy));
            if scope.is_fatal() || parent.is_resolving(&resolvable.key()) {
                return Ok(ResolutionGraph::empty());
            }

            tracing::debug!("Trying strategy {}", strategy.urn());
            let mut graph = parent.create_child(resolvable, &scale);

            for operation in strategy.operations() {
                match operation.kind() {
                    OperationKind::Resolve => {
                        let Some(target) = operation.observable() else {
                            continue;
                        };
                        let child = self
                            .resolve_observable(&graph, target, scale, scope)
                            .await?
                            .rebase(&scale);
                        if !graph.check_coverage(&child)?.is_relevant() {
                            tracing::debug!("Strategy {} cannot resolve {}", strategy.urn(), target);
                            return Ok(ResolutionGraph::empty());
                        }
                        graph.merge(child, target.stated_name())?;
                    }
                    OperationKind::Observe => {
                        let Some(target) = operation.observable() else {
                            continue;
                        };
                        let models = self.observe(&graph, target, scale, scope).await?;
                        if models.is_empty() {
                            tracing::debug!("Strategy {} found no model for {}", strategy.urn(), target);
                            return Ok(ResolutionGraph::empty());
                        }
                        graph.merge_alternatives(models)?;
                    }
                    OperationKind::Apply => {
                        let resources = self
                            .guarded(
                                "runtime",
                                ResourceSet::unsupported(),
                                scope
                                    .runtime()
                                    .resolve_contextualizables(operation.contextualizables(), scope),
                            )
                            .await;
                        if resources.is_empty() {
                            tracing::debug!("Strategy {} has unsupported computations", strategy.urn());
                            return Ok(ResolutionGraph::empty());
                        }
                        graph.add_resources(&resources);
                    }
                }
            }

            Ok(graph)
        }
        .boxed()
    }

    /// Try the models for `observable` best first, keeping every relevant one
    /// until their coverage is complete
    ///
    /// Returned graphs are rebased onto `scale`.
    async fn observe(
        &self,
        parent: &ResolutionGraph,
        observable: &Observable,
        scale: Scale,
        scope: &ContextScope,
    ) -> Result<Vec<ResolutionGraph>, ResolverError> {
        let Some((scale_in_context, scope)) = self.contextualize(observable, scale, scope) else {
            return Ok(Vec::new());
        };

        let mut models = self
            .guarded("resource catalog", Vec::new(), scope.catalog().query_models(observable, &scope))
            .await;
        // models linked from the cache already count toward the coverage
        models.retain(|model| {
            let linked = parent.is_linked(observable, &ResolvableKey::Model(model.urn().to_owned()));
            if linked {
                tracing::trace!("Model {} is already linked for {}", model.urn(), observable);
            }
            !linked
        });
        self.prioritizer.sort(&mut models, observable, &scope, &scale_in_context);
        tracing::debug!("{} candidate models for {}", models.len(), observable);

        let mut accumulated = Coverage::empty(&scale_in_context).with_policy(parent.policy());
        let mut kept = Vec::new();
        let scope = &scope;
        let mut results = futures::stream::iter(models)
            .map(|model| self.resolve_model(parent, Arc::new(model), scale_in_context, scope))
            .buffered(self.config.model_parallelism.max(1));

        while let Some(child) = results.next().await {
            let child = child?;
            if scope.is_fatal() {
                return Ok(Vec::new());
            }
            if !classify(&accumulated, &child)?.is_relevant() {
                tracing::debug!("Model {} is not relevant to {}", describe(&child), observable);
                continue;
            }
            accumulated = accumulated.merge(child.coverage(), LogicalConnector::Union)?;
            tracing::debug!(
                "Accepted model {} for {} ({:.3})",
                describe(&child),
                observable,
                accumulated.fraction()
            );
            parent.accept(observable, &child, child.coverage().fraction());
            kept.push(child);
            if accumulated.is_complete() {
                break;
            }
        }

        Ok(kept.into_iter().map(|child| child.rebase(&scale)).collect())
    }

    fn resolve_model<'a>(
        &'a self,
        parent: &'a ResolutionGraph,
        model: Arc<Model>,
        scale: Scale,
        scope: &'a ContextScope,
    ) -> Resolution<'a> {
        async move {
            let resolvable = Resolvable::Model(Arc::clone(&model));
            if scope.is_fatal() || parent.is_resolving(&resolvable.key()) {
                return Ok(ResolutionGraph::empty());
            }

            let mut graph = parent.create_child(resolvable, &scale);
            if graph.coverage().is_empty() {
                tracing::debug!("Model {} does not cover the scale", model.urn());
                return Ok(ResolutionGraph::empty());
            }

            let mut constraints = Vec::new();
            if !model.namespace().is_empty() {
                constraints.push(ResolutionConstraint::ResolutionNamespace(model.namespace().to_owned()));
            }
            if !model.project().is_empty() {
                constraints.push(ResolutionConstraint::ResolutionProject(model.project().to_owned()));
            }
            let scope = scope.with_resolution_constraints(constraints);

            let resources = self
                .guarded(
                    "runtime",
                    ResourceSet::unsupported(),
                    scope.runtime().resolve_contextualizables(model.computation(), &scope),
                )
                .await;
            if resources.is_empty() {
                tracing::debug!("Model {} has unsupported computations", model.urn());
                return Ok(ResolutionGraph::empty());
            }
            graph.add_resources(&resources);

            let mut resolved = Vec::new();
            {
                let current = &graph;
                let scope = &scope;
                let mut results = futures::stream::iter(model.dependencies().to_vec())
                    .map(move |dependency| async move {
                        let child = self.resolve_observable(current, &dependency, scale, scope).await;
                        (dependency, child)
                    })
                    .buffered(self.config.model_parallelism.max(1));

                while let Some((dependency, child)) = results.next().await {
                    let child = child?.rebase(&scale);
                    if current.check_coverage(&child)?.is_relevant() {
                        resolved.push((dependency, child));
                    } else if dependency.is_optional() {
                        tracing::debug!("Skipping optional dependency {} of {}", dependency, model.urn());
                    } else {
                        tracing::debug!("Model {} cannot resolve dependency {}", model.urn(), dependency);
                        return Ok(ResolutionGraph::empty());
                    }
                }
            }

            for (dependency, child) in resolved {
                graph.merge(child, dependency.stated_name())?;
            }
            Ok(graph)
        }
        .boxed()
    }

    fn resolve_observable<'a>(
        &'a self,
        parent: &'a ResolutionGraph,
        observable: &'a Observable,
        scale: Scale,
        scope: &'a ContextScope,
    ) -> Resolution<'a> {
        async move {
            let Some((scale, scope)) = self.contextualize(observable, scale, scope) else {
                return Ok(ResolutionGraph::empty());
            };

            if let Some(known) = scope.observation_of(observable) {
                tracing::trace!("Referencing existing observation of {}", observable);
                return Ok(parent.create_reference(known, &scale));
            }

            let observation = Arc::new(Observation::new(observable.clone(), Some(scale)));
            self.resolve_observation(parent, observation, scale, &scope).await
        }
        .boxed()
    }

    /// Scale and scope for resolving `observable` inside `scope`
    ///
    /// Returns `None`, after reporting a fatal error to the scope, if a
    /// dependent observable has no context observation to inhere in.
    fn contextualize(
        &self,
        observable: &Observable,
        scale: Scale,
        scope: &ContextScope,
    ) -> Option<(Scale, ContextScope)> {
        let mut scale = scale;
        if observable.is_collective() {
            if let Some(view) = scope.observer().and_then(|o| o.geometry()) {
                if !view.is_scalar() && !view.is_empty() {
                    scale = *view;
                }
            }
        } else if needs_context(observable) && scope.context_observation().is_none() {
            scope.error(format!(
                "{} is dependent and needs a context observation to be resolved",
                observable.urn()
            ));
            return None;
        }
        Some((
            scale,
            scope.with_resolution_constraints([ResolutionConstraint::Geometry(scale)]),
        ))
    }

    /// Await a collaborator call, degrading to `fallback` on error or timeout
    async fn guarded<T, F>(&self, service: &'static str, fallback: T, call: F) -> T
    where
        F: Future<Output = Result<T, ResolverError>>,
    {
        let timeout = self.config.collaborator_timeout();
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                tracing::warn!("{} failed: {}", service, e);
                fallback
            }
            Err(_) => {
                tracing::warn!("{} timed out after {:?}", service, timeout);
                fallback
            }
        }
    }
}

fn needs_context(observable: &Observable) -> bool {
    observable.is_dependent() && !observable.is_collective()
}

/// Scale an observation is resolved over
///
/// Dependents without a geometry take their context's; collectives are
/// extended to the observer's view. `None` if the result is empty.
fn observation_scale(observation: &Observation, scope: &ContextScope) -> Option<Scale> {
    let observable = observation.observable();
    let mut scale = observation.geometry().copied();
    if scale.is_none() && observable.is_dependent() {
        scale = scope.context_observation().and_then(|c| c.geometry()).copied();
    }
    if observable.is_collective() {
        if let Some(view) = scope.observer().and_then(|o| o.geometry()) {
            scale = Some(scale.map_or(*view, |s| s.union(view)));
        }
    }
    let scale = scale.unwrap_or_else(Scale::scalar);
    (!scale.is_empty()).then_some(scale)
}

fn classify(accumulated: &Coverage, child: &ResolutionGraph) -> Result<CoverageStatus, ResolverError> {
    if child.is_empty() {
        return Ok(CoverageStatus::Empty);
    }
    Ok(accumulated.classify(child.coverage(), LogicalConnector::Union)?)
}

fn describe(graph: &ResolutionGraph) -> &str {
    graph.target().map_or("<none>", Resolvable::urn)
}
