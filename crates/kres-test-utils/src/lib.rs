//! Testing utilities for kres workspace
//!
//! In-memory collaborators that record how they were called, fixtures for
//! the common scale and observables, and tracing set-up for tests.

#![allow(missing_docs)]

use anyhow::Context;
use kres_knowledge::{
    Contextualizable, ContextualizableKind, Envelope, Model, Observable, Observation,
    ObservationStrategy, Operation, ResourceKind, ResourceRef, ResourceSet, Scale, SemanticType,
};
use kres_resolver::{
    ContextScope, Reasoner, ResolverConfig, ResolverError, ResolverService, ResourceCatalog,
    RuntimeService,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Install a test-friendly subscriber; `RUST_LOG` selects what is shown
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// 10 x 10 spatial scale
pub fn scale() -> Scale {
    Scale::spatial(Envelope::new(0.0, 0.0, 10.0, 10.0).unwrap())
}

/// Vertical band of [`scale`] between `min_x` and `max_x`
pub fn band(min_x: f64, max_x: f64) -> Scale {
    Scale::spatial(Envelope::new(min_x, 0.0, max_x, 10.0).unwrap())
}

pub fn region() -> Observable {
    Observable::new("earth:Region", SemanticType::Subject)
}

pub fn quality(urn: &str) -> Observable {
    Observable::new(urn, SemanticType::Quality)
}

/// Resolved region over [`scale`], usable as context observation
pub fn region_observation() -> Observation {
    Observation::new(region(), Some(scale())).resolved()
}

/// Model reading `data` for `observable`, with a call named after the model
pub fn data_model(urn: &str, observable: Observable, data: &str) -> Model {
    Model::new(urn, observable)
        .with_computation(Contextualizable::resource_urns([data]))
        .with_computation(Contextualizable::call(urn))
}

pub fn load_config(path: &Path) -> anyhow::Result<ResolverConfig> {
    ResolverConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

/// Reasoner with fixed strategies per observable
///
/// Observables without registered strategies get a single OBSERVE strategy
/// named `default:<urn>`.
#[derive(Debug, Default)]
pub struct InMemoryReasoner {
    strategies: Mutex<HashMap<String, Vec<ObservationStrategy>>>,
    calls: Mutex<Vec<String>>,
}

impl InMemoryReasoner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategies(self, observable: &str, strategies: Vec<ObservationStrategy>) -> Self {
        self.strategies.lock().insert(observable.to_owned(), strategies);
        self
    }

    /// Observable urns strategies were asked for, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait::async_trait]
impl Reasoner for InMemoryReasoner {
    async fn compute_observation_strategies(
        &self,
        observation: &Observation,
        _scope: &ContextScope,
    ) -> Result<Vec<ObservationStrategy>, ResolverError> {
        let observable = observation.observable();
        self.calls.lock().push(observable.urn().to_owned());
        let registered = self.strategies.lock().get(observable.urn()).cloned();
        Ok(registered.unwrap_or_else(|| {
            vec![ObservationStrategy::new(
                format!("default:{}", observable.urn()),
                vec![Operation::observe(observable.clone())],
            )]
        }))
    }
}

/// Catalog returning every registered model that produces the observable
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    models: Mutex<Vec<Model>>,
    delays: Mutex<HashMap<String, Duration>>,
    queries: Mutex<Vec<String>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(self, model: Model) -> Self {
        self.models.lock().push(model);
        self
    }

    /// Answer queries for `observable` only after `delay`
    pub fn with_delay(self, observable: &str, delay: Duration) -> Self {
        self.delays.lock().insert(observable.to_owned(), delay);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait::async_trait]
impl ResourceCatalog for InMemoryCatalog {
    async fn query_models(
        &self,
        observable: &Observable,
        _scope: &ContextScope,
    ) -> Result<Vec<Model>, ResolverError> {
        self.queries.lock().push(observable.urn().to_owned());
        let delay = self.delays.lock().get(observable.urn()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .models
            .lock()
            .iter()
            .filter(|m| m.produces(observable))
            .cloned()
            .collect())
    }
}

/// Runtime supporting every call except the ones marked unsupported
///
/// Resource urns in a batch are reported back as resources.
#[derive(Debug, Default)]
pub struct InMemoryRuntime {
    unsupported: Mutex<HashSet<String>>,
    batches: Mutex<Vec<Vec<String>>>,
}

impl InMemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unsupporting(self, call: &str) -> Self {
        self.unsupported.lock().insert(call.to_owned());
        self
    }

    /// Call names of each validated batch, in call order
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().clone()
    }

    /// Service calls validated so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.batches().into_iter().flatten().collect()
    }
}

#[async_trait::async_trait]
impl RuntimeService for InMemoryRuntime {
    async fn resolve_contextualizables(
        &self,
        steps: &[Contextualizable],
        _scope: &ContextScope,
    ) -> Result<ResourceSet, ResolverError> {
        let mut calls = Vec::new();
        let mut resources = Vec::new();
        for step in steps {
            match step.kind() {
                ContextualizableKind::ServiceCall { name, .. } => calls.push(name.clone()),
                ContextualizableKind::ResourceUrns(urns) => resources.extend(
                    urns.iter()
                        .map(|urn| ResourceRef::new(ResourceKind::Resource, urn.clone())),
                ),
                _ => {}
            }
        }

        let supported = {
            let unsupported = self.unsupported.lock();
            calls.iter().all(|c| !unsupported.contains(c))
        };
        self.batches.lock().push(calls);

        Ok(if supported {
            ResourceSet::with_resources(resources)
        } else {
            ResourceSet::unsupported()
        })
    }
}

/// In-memory collaborators wired into scopes and a service
#[derive(Debug, Clone)]
pub struct TestBed {
    pub reasoner: Arc<InMemoryReasoner>,
    pub catalog: Arc<InMemoryCatalog>,
    pub runtime: Arc<InMemoryRuntime>,
}

impl TestBed {
    pub fn new(reasoner: InMemoryReasoner, catalog: InMemoryCatalog, runtime: InMemoryRuntime) -> Self {
        Self {
            reasoner: Arc::new(reasoner),
            catalog: Arc::new(catalog),
            runtime: Arc::new(runtime),
        }
    }

    /// Default reasoner and runtime over the given models
    pub fn with_models(models: impl IntoIterator<Item = Model>) -> Self {
        let catalog = models
            .into_iter()
            .fold(InMemoryCatalog::new(), InMemoryCatalog::with_model);
        Self::new(InMemoryReasoner::new(), catalog, InMemoryRuntime::new())
    }

    /// Scope inside [`region_observation`]
    pub fn scope(&self) -> ContextScope {
        self.scope_without_context()
            .with_context_observation(region_observation())
    }

    pub fn scope_without_context(&self) -> ContextScope {
        ContextScope::new(self.reasoner.clone(), self.catalog.clone(), self.runtime.clone())
    }
}

pub fn setup_test_service() -> ResolverService {
    ResolverService::new(ResolverConfig::new()).unwrap()
}

pub fn setup_test_service_with(config: ResolverConfig) -> ResolverService {
    ResolverService::new(config).unwrap()
}
