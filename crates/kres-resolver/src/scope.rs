//! Context scope: where a resolution happens and what it may use
//!
//! A scope is cheap to clone. Narrowing it (constraints, context
//! observation) produces a new scope; the collaborators and the error
//! report are shared by every scope derived from the same root.

use crate::services::{Reasoner, ResourceCatalog, RuntimeService};
use dashmap::DashMap;
use kres_knowledge::{Observable, Observation, Scale};
use parking_lot::Mutex;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use ulid::Ulid;

/// Narrowing of what a resolution may consider
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionConstraint {
    /// Urn of the observable whose resolution asked for this step
    Provenance(String),
    /// Extent to resolve over
    Geometry(Scale),
    /// Namespace preferred for candidates
    ResolutionNamespace(String),
    /// Project preferred for candidates
    ResolutionProject(String),
    /// Scenario namespaces, preferred over everything else
    Scenarios(Vec<String>),
}

#[derive(Debug, Default)]
struct ScopeReport {
    fatal: AtomicBool,
    errors: Mutex<Vec<String>>,
}

/// Context of one resolution session
#[derive(Clone)]
pub struct ContextScope {
    id: String,
    name: Option<String>,
    reasoner: Arc<dyn Reasoner>,
    catalog: Arc<dyn ResourceCatalog>,
    runtime: Arc<dyn RuntimeService>,
    context_observation: Option<Arc<Observation>>,
    observer: Option<Arc<Observation>>,
    known: Arc<DashMap<String, Arc<Observation>>>,
    constraints: Vec<ResolutionConstraint>,
    report: Arc<ScopeReport>,
}

impl ContextScope {
    /// Create root scope over the given collaborators
    pub fn new(
        reasoner: Arc<dyn Reasoner>,
        catalog: Arc<dyn ResourceCatalog>,
        runtime: Arc<dyn RuntimeService>,
    ) -> Self {
        Self {
            id: Ulid::new().to_string(),
            name: None,
            reasoner,
            catalog,
            runtime,
            context_observation: None,
            observer: None,
            known: Arc::new(DashMap::new()),
            constraints: Vec::new(),
            report: Arc::new(ScopeReport::default()),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the observation dependents are resolved in
    #[must_use]
    pub fn with_context_observation(mut self, observation: impl Into<Arc<Observation>>) -> Self {
        self.context_observation = Some(observation.into());
        self
    }

    /// Set the observation whose view collectives are resolved in
    #[must_use]
    pub fn with_observer(mut self, observer: impl Into<Arc<Observation>>) -> Self {
        self.observer = Some(observer.into());
        self
    }

    /// Register an observation that exists in this context
    ///
    /// Resolved observations are reused instead of being resolved again.
    #[must_use]
    pub fn with_observation(self, observation: impl Into<Arc<Observation>>) -> Self {
        let observation = observation.into();
        self.known
            .insert(observation.observable().urn().to_owned(), observation);
        self
    }

    /// Scope narrowed by `constraints`
    ///
    /// A constraint replaces any existing constraint of the same kind.
    #[must_use]
    pub fn with_resolution_constraints(
        &self,
        constraints: impl IntoIterator<Item = ResolutionConstraint>,
    ) -> Self {
        let mut scope = self.clone();
        for constraint in constraints {
            scope
                .constraints
                .retain(|c| mem::discriminant(c) != mem::discriminant(&constraint));
            scope.constraints.push(constraint);
        }
        scope
    }

    /// Scope for resolving inside `observation`
    #[must_use]
    pub fn within(&self, observation: Arc<Observation>) -> Self {
        let mut scope = self.clone();
        scope.context_observation = Some(observation);
        scope
    }

    /// Report a fatal error; every scope of this session stops resolving
    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("Resolution error in context {}: {}", self.id, message);
        self.report.fatal.store(true, Ordering::SeqCst);
        self.report.errors.lock().push(message);
    }

    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.report.fatal.load(Ordering::SeqCst)
    }

    /// Errors reported so far
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.report.errors.lock().clone()
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn context_observation(&self) -> Option<&Arc<Observation>> {
        self.context_observation.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn observer(&self) -> Option<&Arc<Observation>> {
        self.observer.as_ref()
    }

    /// Resolved observation of `observable` known to this context
    #[must_use]
    pub fn observation_of(&self, observable: &Observable) -> Option<Arc<Observation>> {
        self.known
            .get(observable.urn())
            .filter(|o| o.is_resolved())
            .map(|o| Arc::clone(o.value()))
    }

    #[inline]
    #[must_use]
    pub fn constraints(&self) -> &[ResolutionConstraint] {
        &self.constraints
    }

    #[must_use]
    pub fn provenance(&self) -> Option<&str> {
        self.constraints.iter().find_map(|c| match c {
            ResolutionConstraint::Provenance(urn) => Some(urn.as_str()),
            _ => None,
        })
    }

    #[must_use]
    pub fn geometry(&self) -> Option<&Scale> {
        self.constraints.iter().find_map(|c| match c {
            ResolutionConstraint::Geometry(scale) => Some(scale),
            _ => None,
        })
    }

    #[must_use]
    pub fn resolution_namespace(&self) -> Option<&str> {
        self.constraints.iter().find_map(|c| match c {
            ResolutionConstraint::ResolutionNamespace(ns) => Some(ns.as_str()),
            _ => None,
        })
    }

    #[must_use]
    pub fn resolution_project(&self) -> Option<&str> {
        self.constraints.iter().find_map(|c| match c {
            ResolutionConstraint::ResolutionProject(p) => Some(p.as_str()),
            _ => None,
        })
    }

    #[must_use]
    pub fn scenarios(&self) -> &[String] {
        self.constraints
            .iter()
            .find_map(|c| match c {
                ResolutionConstraint::Scenarios(s) => Some(s.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }

    #[inline]
    #[must_use]
    pub fn reasoner(&self) -> &dyn Reasoner {
        self.reasoner.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &dyn ResourceCatalog {
        self.catalog.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn runtime(&self) -> &dyn RuntimeService {
        self.runtime.as_ref()
    }
}

impl fmt::Debug for ContextScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextScope")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("context_observation", &self.context_observation.as_ref().map(|o| o.observable().urn().to_owned()))
            .field("constraints", &self.constraints)
            .field("fatal", &self.is_fatal())
            .finish_non_exhaustive()
    }
}
