//! Models and the computations they declare

use crate::observable::Observable;
use crate::scale::Scale;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// What a single computation step does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextualizableKind {
    /// Explicit call to a runtime function
    ServiceCall {
        name: String,
        #[serde(default)]
        parameters: IndexMap<String, serde_json::Value>,
    },
    /// Data from one or more resource urns
    ResourceUrns(Vec<String>),
    /// Expression evaluated over the context
    Expression(String),
    /// Constant value
    Literal(serde_json::Value),
    /// Lookup table id
    LookupTable(String),
    /// Classification id
    Classification(String),
    /// Classification according to a trait
    AccordingTo(String),
}

/// A computation step a model or strategy needs from the runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contextualizable {
    kind: ContextualizableKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<String>,
}

impl Contextualizable {
    #[must_use]
    pub fn new(kind: ContextualizableKind) -> Self {
        Self { kind, target: None }
    }

    /// Call to a named runtime function without parameters
    #[must_use]
    pub fn call(name: impl Into<String>) -> Self {
        Self::new(ContextualizableKind::ServiceCall {
            name: name.into(),
            parameters: IndexMap::new(),
        })
    }

    /// Add a parameter; ignored unless this is a service call
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        if let ContextualizableKind::ServiceCall { parameters, .. } = &mut self.kind {
            parameters.insert(key.into(), value);
        }
        self
    }

    #[must_use]
    pub fn resource_urns<I, S>(urns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ContextualizableKind::ResourceUrns(
            urns.into_iter().map(Into::into).collect(),
        ))
    }

    #[must_use]
    pub fn expression(code: impl Into<String>) -> Self {
        Self::new(ContextualizableKind::Expression(code.into()))
    }

    #[must_use]
    pub fn literal(value: serde_json::Value) -> Self {
        Self::new(ContextualizableKind::Literal(value))
    }

    /// Name the output this step writes to
    #[inline]
    #[must_use]
    pub fn targeting(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> &ContextualizableKind {
        &self.kind
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }
}

/// A declarative recipe able to produce one or more observables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    urn: String,
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    project: String,
    #[serde(default)]
    rank: i32,
    observables: Vec<Observable>,
    #[serde(default)]
    dependencies: Vec<Observable>,
    #[serde(default)]
    computation: Vec<Contextualizable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    coverage: Option<Scale>,
}

impl Model {
    /// Create a model producing `observable`, with no dependencies and
    /// universal coverage
    #[must_use]
    pub fn new(urn: impl Into<String>, observable: Observable) -> Self {
        Self {
            urn: urn.into(),
            namespace: String::new(),
            project: String::new(),
            rank: 0,
            observables: vec![observable],
            dependencies: Vec::new(),
            computation: Vec::new(),
            coverage: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn in_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    /// Declared priority; higher ranks first
    #[inline]
    #[must_use]
    pub fn with_rank(mut self, rank: i32) -> Self {
        self.rank = rank;
        self
    }

    /// Declare a further output, after the primary one
    #[must_use]
    pub fn with_observable(mut self, observable: Observable) -> Self {
        self.observables.push(observable);
        self
    }

    #[must_use]
    pub fn with_dependency(mut self, dependency: Observable) -> Self {
        self.dependencies.push(dependency);
        self
    }

    #[must_use]
    pub fn with_computation(mut self, step: Contextualizable) -> Self {
        self.computation.push(step);
        self
    }

    /// Restrict the extent the model is valid for
    #[inline]
    #[must_use]
    pub fn with_coverage(mut self, coverage: Scale) -> Self {
        self.coverage = Some(coverage);
        self
    }

    #[inline]
    #[must_use]
    pub fn urn(&self) -> &str {
        &self.urn
    }

    #[inline]
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[inline]
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    #[inline]
    #[must_use]
    pub const fn rank(&self) -> i32 {
        self.rank
    }

    #[inline]
    #[must_use]
    pub fn observables(&self) -> &[Observable] {
        &self.observables
    }

    #[inline]
    #[must_use]
    pub fn dependencies(&self) -> &[Observable] {
        &self.dependencies
    }

    #[inline]
    #[must_use]
    pub fn computation(&self) -> &[Contextualizable] {
        &self.computation
    }

    /// Native coverage; `None` means valid everywhere
    #[inline]
    #[must_use]
    pub const fn coverage(&self) -> Option<&Scale> {
        self.coverage.as_ref()
    }

    /// True if the model declares `observable` among its outputs
    #[must_use]
    pub fn produces(&self, observable: &Observable) -> bool {
        self.observables.iter().any(|o| o.urn() == observable.urn())
    }

    /// Dependencies that must resolve for the model to be usable
    pub fn required_dependencies(&self) -> impl Iterator<Item = &Observable> {
        self.dependencies.iter().filter(|d| !d.is_optional())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::SemanticType;
    use serde_json::json;

    #[test]
    fn builder_and_queries() {
        let slope = Observable::new("geo:Slope", SemanticType::Quality);
        let elevation = Observable::new("geo:Elevation", SemanticType::Quality);
        let aspect = Observable::new("geo:Aspect", SemanticType::Quality).optional();

        let model = Model::new("im.geo.slope", slope.clone())
            .in_namespace("im.geo")
            .with_dependency(elevation)
            .with_dependency(aspect)
            .with_computation(Contextualizable::call("gis.slope").with_parameter("units", json!("deg")));

        assert!(model.produces(&slope));
        assert_eq!(model.dependencies().len(), 2);
        assert_eq!(model.required_dependencies().count(), 1);
        assert!(model.coverage().is_none());
        match model.computation()[0].kind() {
            ContextualizableKind::ServiceCall { name, parameters } => {
                assert_eq!(name, "gis.slope");
                assert_eq!(parameters["units"], json!("deg"));
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn parameters_ignored_on_non_calls() {
        let step = Contextualizable::expression("x * 2").with_parameter("k", json!(1));
        assert_eq!(step.kind(), &ContextualizableKind::Expression("x * 2".into()));
    }
}
