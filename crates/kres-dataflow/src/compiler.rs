//! Compile a resolution graph into a dataflow
//!
//! The walk starts from the root observations and follows, for every
//! strategy, the order of its operations:
//! - OBSERVE yields one OBSERVE actuator per model that was merged for it,
//!   carrying the model's calls and the actuators of its dependencies
//! - RESOLVE wraps the sub-observation's actuators in a RESOLVE actuator
//! - APPLY yields an APPLY actuator with the operation's calls
//!
//! An observable is compiled once; later occurrences, and observations
//! that were already resolved before, become REFERENCE actuators.

use crate::actuator::{
    Actuator, ActuatorKind, Dataflow, ServiceCall, CONSTANT_RESOLVER, EXPRESSION_RESOLVER,
    LUT_RESOLVER, URN_RESOLVER,
};
use kres_graph::{NodeId, ResolutionGraph};
use kres_knowledge::{
    Contextualizable, ContextualizableKind, Model, Observable, Observation, ObservationStrategy,
    OperationKind, Resolvable,
};
use serde_json::Value;
use std::collections::HashSet;

/// Turns one finished resolution graph into a [`Dataflow`]
#[derive(Debug)]
pub struct DataflowCompiler<'g> {
    graph: &'g ResolutionGraph,
    compiled: HashSet<String>,
}

impl<'g> DataflowCompiler<'g> {
    /// Create compiler for `graph`
    #[must_use]
    pub fn new(graph: &'g ResolutionGraph) -> Self {
        Self {
            graph,
            compiled: HashSet::new(),
        }
    }

    /// Compile the graph
    ///
    /// An empty graph compiles to an empty dataflow.
    #[must_use]
    pub fn compile(mut self) -> Dataflow {
        if self.graph.is_empty() {
            return Dataflow::empty();
        }

        let graph = self.graph;
        let mut actuators = Vec::new();
        for root in graph.root_nodes() {
            if let Some(Resolvable::Observation(observation)) = graph.node(root) {
                actuators.extend(self.compile_observation(root, observation));
            } else {
                tracing::warn!("Skipping resolution root {} that is not an observation", root);
            }
        }

        tracing::debug!(
            "Compiled dataflow with {} top-level actuators, coverage {:.3}",
            actuators.len(),
            self.graph.coverage().fraction()
        );

        Dataflow::new(
            actuators,
            self.graph.coverage().fraction(),
            self.graph.resources().clone(),
        )
    }

    fn compile_observation(&mut self, id: NodeId, observation: &Observation) -> Vec<Actuator> {
        let urn = observation.observable().urn();
        if observation.is_resolved() || !self.compiled.insert(urn.to_owned()) {
            return vec![Actuator::new(ActuatorKind::Reference, urn)];
        }

        let graph = self.graph;
        let mut actuators = Vec::new();
        for edge in graph.outgoing(id) {
            match graph.node(edge.target) {
                Some(Resolvable::Strategy(strategy)) => {
                    actuators.extend(self.compile_strategy(edge.target, strategy, observation.observable()));
                }
                Some(Resolvable::Model(model)) => {
                    actuators.push(self.compile_model(edge.target, model, observation.observable(), None));
                }
                Some(Resolvable::Observation(other)) => {
                    actuators.extend(self.compile_observation(edge.target, other));
                }
                None => {}
            }
        }
        actuators
    }

    fn compile_strategy(
        &mut self,
        id: NodeId,
        strategy: &ObservationStrategy,
        observable: &Observable,
    ) -> Vec<Actuator> {
        let mut actuators = Vec::new();
        for operation in strategy.operations() {
            match operation.kind() {
                OperationKind::Observe => {
                    let Some(target) = operation.observable() else {
                        continue;
                    };
                    for (child, model) in self.models_of(id, target) {
                        actuators.push(self.compile_model(child, model, target, Some(strategy.urn())));
                    }
                }
                OperationKind::Resolve => {
                    let Some(target) = operation.observable() else {
                        continue;
                    };
                    let Some((child, observation)) = self.observation_of(id, target) else {
                        continue;
                    };
                    let mut inner = self.compile_observation(child, observation);
                    if inner.len() == 1 && inner[0].kind() == ActuatorKind::Reference {
                        actuators.append(&mut inner);
                    } else {
                        let mut actuator = Actuator::new(ActuatorKind::Resolve, target.urn()).using(strategy.urn());
                        actuator.children_mut().append(&mut inner);
                        actuators.push(actuator);
                    }
                }
                OperationKind::Apply => {
                    let mut actuator = Actuator::new(ActuatorKind::Apply, observable.urn()).using(strategy.urn());
                    actuator
                        .computation_mut()
                        .extend(operation.contextualizables().iter().map(adapt_contextualizable));
                    actuators.push(actuator);
                }
            }
        }
        actuators
    }

    fn compile_model(
        &mut self,
        id: NodeId,
        model: &Model,
        observable: &Observable,
        strategy_urn: Option<&str>,
    ) -> Actuator {
        let mut actuator = Actuator::new(ActuatorKind::Observe, observable.urn());
        if let Some(urn) = strategy_urn {
            actuator = actuator.using(urn);
        }

        let graph = self.graph;
        for edge in graph.outgoing(id) {
            if let Some(Resolvable::Observation(dependency)) = graph.node(edge.target) {
                let compiled = self.compile_observation(edge.target, dependency);
                actuator.children_mut().extend(compiled);
            }
        }

        actuator
            .computation_mut()
            .extend(model.computation().iter().map(adapt_contextualizable));
        actuator
    }

    fn models_of(&self, strategy: NodeId, observable: &Observable) -> Vec<(NodeId, &'g Model)> {
        let graph = self.graph;
        graph
            .outgoing(strategy)
            .filter_map(|edge| match graph.node(edge.target) {
                Some(Resolvable::Model(m)) if m.produces(observable) => Some((edge.target, m.as_ref())),
                _ => None,
            })
            .collect()
    }

    fn observation_of(&self, strategy: NodeId, observable: &Observable) -> Option<(NodeId, &'g Observation)> {
        let graph = self.graph;
        graph
            .outgoing(strategy)
            .find_map(|edge| match graph.node(edge.target) {
                Some(Resolvable::Observation(o)) if o.observable().urn() == observable.urn() => {
                    Some((edge.target, o.as_ref()))
                }
                _ => None,
            })
    }
}

/// Turn a computation step into the runtime call that performs it
#[must_use]
pub fn adapt_contextualizable(step: &Contextualizable) -> ServiceCall {
    let call = match step.kind() {
        ContextualizableKind::ServiceCall { name, parameters } => {
            ServiceCall::new(name.clone()).with_parameters(parameters.clone())
        }
        ContextualizableKind::ResourceUrns(urns) => ServiceCall::new(URN_RESOLVER).with_parameter(
            "urns",
            Value::Array(urns.iter().cloned().map(Value::String).collect()),
        ),
        ContextualizableKind::AccordingTo(t) => {
            ServiceCall::new(LUT_RESOLVER).with_parameter("accordingTo", Value::String(t.clone()))
        }
        ContextualizableKind::Classification(c) => {
            ServiceCall::new(LUT_RESOLVER).with_parameter("classification", Value::String(c.clone()))
        }
        ContextualizableKind::LookupTable(t) => {
            ServiceCall::new(LUT_RESOLVER).with_parameter("lookupTable", Value::String(t.clone()))
        }
        ContextualizableKind::Expression(code) => {
            ServiceCall::new(EXPRESSION_RESOLVER).with_parameter("expression", Value::String(code.clone()))
        }
        ContextualizableKind::Literal(value) => {
            ServiceCall::new(CONSTANT_RESOLVER).with_parameter("value", value.clone())
        }
    };
    match step.target() {
        Some(target) => call.with_parameter("_target", Value::String(target.to_owned())),
        None => call,
    }
}
