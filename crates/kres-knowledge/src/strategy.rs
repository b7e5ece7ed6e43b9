//! Observation strategies supplied by the reasoner

use crate::model::Contextualizable;
use crate::observable::Observable;
use serde::{Deserialize, Serialize};

/// What an operation asks the resolver to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Defer to a full resolution of another observable
    Resolve,
    /// Find models that observe the target directly
    Observe,
    /// Run computations over what has been resolved so far
    Apply,
}

impl OperationKind {
    /// Lowercase keyword
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Observe => "observe",
            Self::Apply => "apply",
        }
    }
}

/// One step of an observation strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    kind: OperationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    observable: Option<Observable>,
    #[serde(default)]
    contextualizables: Vec<Contextualizable>,
    #[serde(default)]
    deferrals: Vec<Vec<Operation>>,
}

impl Operation {
    #[must_use]
    pub fn resolve(observable: Observable) -> Self {
        Self {
            kind: OperationKind::Resolve,
            observable: Some(observable),
            contextualizables: Vec::new(),
            deferrals: Vec::new(),
        }
    }

    #[must_use]
    pub fn observe(observable: Observable) -> Self {
        Self {
            kind: OperationKind::Observe,
            observable: Some(observable),
            contextualizables: Vec::new(),
            deferrals: Vec::new(),
        }
    }

    #[must_use]
    pub fn apply(contextualizables: Vec<Contextualizable>) -> Self {
        Self {
            kind: OperationKind::Apply,
            observable: None,
            contextualizables,
            deferrals: Vec::new(),
        }
    }

    /// Attach a strategy to run later, in the context of each instance
    #[must_use]
    pub fn with_deferral(mut self, operations: Vec<Operation>) -> Self {
        self.deferrals.push(operations);
        self
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub const fn observable(&self) -> Option<&Observable> {
        self.observable.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn contextualizables(&self) -> &[Contextualizable] {
        &self.contextualizables
    }

    #[inline]
    #[must_use]
    pub fn deferrals(&self) -> &[Vec<Operation>] {
        &self.deferrals
    }
}

/// A ranked plan of operations to satisfy an observable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationStrategy {
    urn: String,
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    rank: i32,
    operations: Vec<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    documentation: Option<String>,
}

impl ObservationStrategy {
    #[must_use]
    pub fn new(urn: impl Into<String>, operations: Vec<Operation>) -> Self {
        Self {
            urn: urn.into(),
            namespace: String::new(),
            rank: 0,
            operations,
            documentation: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_rank(mut self, rank: i32) -> Self {
        self.rank = rank;
        self
    }

    #[inline]
    #[must_use]
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn documented(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = Some(documentation.into());
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
    pub const fn rank(&self) -> i32 {
        self.rank
    }

    #[inline]
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    #[inline]
    #[must_use]
    pub fn documentation(&self) -> Option<&str> {
        self.documentation.as_deref()
    }
}
