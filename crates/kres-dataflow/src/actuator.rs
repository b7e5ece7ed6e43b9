//! Dataflow structure: actuators and the calls they run

use indexmap::IndexMap;
use kres_knowledge::{Observation, ResourceSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// Runtime function resolving resource urns into data
pub const URN_RESOLVER: &str = "core.urn.resolver";

/// Runtime function resolving lookup tables and classifications
pub const LUT_RESOLVER: &str = "core.lut.resolver";

/// Runtime function evaluating expressions
pub const EXPRESSION_RESOLVER: &str = "core.expression.resolver";

/// Runtime function producing constant values
pub const CONSTANT_RESOLVER: &str = "core.constant.resolver";

/// What an actuator does when the dataflow runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorKind {
    /// Instantiate an observation and run its children
    Resolve,
    /// Compute an observation with a model
    Observe,
    /// Run computations over what has been observed
    Apply,
    /// Point to an observation computed elsewhere
    Reference,
}

impl ActuatorKind {
    /// Keyword used in the text encoding
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Observe => "observe",
            Self::Apply => "apply",
            Self::Reference => "reference",
        }
    }
}

impl Display for ActuatorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Call to a runtime function with named parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCall {
    name: String,
    #[serde(default)]
    parameters: IndexMap<String, Value>,
}

impl ServiceCall {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_parameters(mut self, parameters: IndexMap<String, Value>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub const fn parameters(&self) -> &IndexMap<String, Value> {
        &self.parameters
    }

    /// Source form: `name(key = value, ...)`
    ///
    /// Parameters whose key starts with `__` are internal and not encoded.
    #[must_use]
    pub fn encode(&self) -> String {
        let arguments: Vec<String> = self
            .parameters
            .iter()
            .filter(|(key, _)| !key.starts_with("__"))
            .map(|(key, value)| format!("{key} = {}", encode_value(value)))
            .collect();
        format!("{}({})", self.name, arguments.join(", "))
    }
}

impl Display for ServiceCall {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn encode_value(value: &Value) -> String {
    match value {
        Value::Null => "unknown".to_owned(),
        Value::String(s) => format!("\"{}\"", escape(s)),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(encode_value).collect();
            format!("({})", items.join(" "))
        }
        Value::Object(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{k} {}", encode_value(v)))
                .collect();
            format!("{{{}}}", entries.join(" "))
        }
        Value::Bool(_) | Value::Number(_) => value.to_string(),
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

/// One node of the executable plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actuator {
    kind: ActuatorKind,
    target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    strategy_urn: Option<String>,
    #[serde(default)]
    children: Vec<Actuator>,
    #[serde(default)]
    computation: Vec<ServiceCall>,
}

impl Actuator {
    /// Create an actuator for the observable with urn `target`
    #[must_use]
    pub fn new(kind: ActuatorKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            strategy_urn: None,
            children: Vec::new(),
            computation: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn using(mut self, strategy_urn: impl Into<String>) -> Self {
        self.strategy_urn = Some(strategy_urn.into());
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn with_call(mut self, call: ServiceCall) -> Self {
        self.computation.push(call);
        self
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<Self> {
        &mut self.children
    }

    pub(crate) fn computation_mut(&mut self) -> &mut Vec<ServiceCall> {
        &mut self.computation
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ActuatorKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[inline]
    #[must_use]
    pub fn strategy_urn(&self) -> Option<&str> {
        self.strategy_urn.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn computation(&self) -> &[ServiceCall] {
        &self.computation
    }

    /// Depth-first iterator over this actuator and all descendants
    pub fn walk(&self) -> Box<dyn Iterator<Item = &Self> + '_> {
        Box::new(std::iter::once(self).chain(self.children.iter().flat_map(Self::walk)))
    }
}

/// Executable plan for one resolved observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataflow {
    actuators: Vec<Actuator>,
    coverage: f64,
    #[serde(default)]
    resources: ResourceSet,
}

impl Dataflow {
    #[must_use]
    pub fn new(actuators: Vec<Actuator>, coverage: f64, resources: ResourceSet) -> Self {
        Self {
            actuators,
            coverage,
            resources,
        }
    }

    /// Nothing to do
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0.0, ResourceSet::native())
    }

    /// Only instantiate `observation`, with nothing to compute
    #[must_use]
    pub fn trivial(observation: &Observation) -> Self {
        Self::new(
            vec![Actuator::new(ActuatorKind::Resolve, observation.observable().urn())],
            1.0,
            ResourceSet::native(),
        )
    }

    #[inline]
    #[must_use]
    pub fn actuators(&self) -> &[Actuator] {
        &self.actuators
    }

    /// Fraction of the requested scale the plan covers
    #[inline]
    #[must_use]
    pub const fn coverage(&self) -> f64 {
        self.coverage
    }

    #[inline]
    #[must_use]
    pub const fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actuators.is_empty()
    }
}
