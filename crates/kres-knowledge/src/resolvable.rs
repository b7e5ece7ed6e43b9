//! The closed set of things a resolution graph can contain

use crate::coverage::{Coverage, LogicalConnector};
use crate::model::Model;
use crate::observable::Observable;
use crate::observation::Observation;
use crate::scale::Scale;
use crate::strategy::ObservationStrategy;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Identity of a resolvable on a resolution path
///
/// Observations are identified by their observable, so that two
/// observations of the same observable count as the same step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResolvableKey {
    Observable(String),
    Model(String),
    Strategy(String),
}

impl ResolvableKey {
    /// The urn behind the key
    #[must_use]
    pub fn urn(&self) -> &str {
        match self {
            Self::Observable(urn) | Self::Model(urn) | Self::Strategy(urn) => urn,
        }
    }
}

impl Display for ResolvableKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Observable(urn) => write!(f, "observable:{urn}"),
            Self::Model(urn) => write!(f, "model:{urn}"),
            Self::Strategy(urn) => write!(f, "strategy:{urn}"),
        }
    }
}

/// A node payload in a resolution graph
#[derive(Debug, Clone, PartialEq)]
pub enum Resolvable {
    Observation(Arc<Observation>),
    Model(Arc<Model>),
    Strategy(Arc<ObservationStrategy>),
}

impl Resolvable {
    /// Identity used for de-duplication and cycle detection
    #[must_use]
    pub fn key(&self) -> ResolvableKey {
        match self {
            Self::Observation(o) => ResolvableKey::Observable(o.observable().urn().to_owned()),
            Self::Model(m) => ResolvableKey::Model(m.urn().to_owned()),
            Self::Strategy(s) => ResolvableKey::Strategy(s.urn().to_owned()),
        }
    }

    /// Urn of the model or strategy, or of the observation's observable
    #[must_use]
    pub fn urn(&self) -> &str {
        match self {
            Self::Observation(o) => o.observable().urn(),
            Self::Model(m) => m.urn(),
            Self::Strategy(s) => s.urn(),
        }
    }

    /// How contributions to this resolvable accumulate
    ///
    /// Observations take alternatives; models and strategies need all of
    /// their parts.
    #[must_use]
    pub const fn connector(&self) -> LogicalConnector {
        match self {
            Self::Observation(_) => LogicalConnector::Union,
            Self::Model(_) | Self::Strategy(_) => LogicalConnector::Intersection,
        }
    }

    /// Coverage of `scale` before anything has been merged in
    #[must_use]
    pub fn initial_coverage(&self, scale: &Scale) -> Coverage {
        match self {
            Self::Observation(_) => Coverage::empty(scale),
            Self::Model(m) => Coverage::of(scale, m.coverage()),
            Self::Strategy(_) => Coverage::full(scale),
        }
    }

    #[must_use]
    pub fn as_observation(&self) -> Option<&Arc<Observation>> {
        match self {
            Self::Observation(o) => Some(o),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_model(&self) -> Option<&Arc<Model>> {
        match self {
            Self::Model(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_strategy(&self) -> Option<&Arc<ObservationStrategy>> {
        match self {
            Self::Strategy(s) => Some(s),
            _ => None,
        }
    }

    /// Observable this resolvable makes available, if any
    ///
    /// Models yield their first declared observable.
    #[must_use]
    pub fn observable(&self) -> Option<&Observable> {
        match self {
            Self::Observation(o) => Some(o.observable()),
            Self::Model(m) => m.observables().first(),
            Self::Strategy(_) => None,
        }
    }
}

impl From<Observation> for Resolvable {
    fn from(value: Observation) -> Self {
        Self::Observation(Arc::new(value))
    }
}

impl From<Model> for Resolvable {
    fn from(value: Model) -> Self {
        Self::Model(Arc::new(value))
    }
}

impl From<ObservationStrategy> for Resolvable {
    fn from(value: ObservationStrategy) -> Self {
        Self::Strategy(Arc::new(value))
    }
}

impl Display for Resolvable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.key(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::SemanticType;
    use crate::scale::Envelope;

    #[test]
    fn observation_keys_by_observable() {
        let obs = Observable::new("geo:Elevation", SemanticType::Quality);
        let a: Resolvable = Observation::new(obs.clone(), None).into();
        let b: Resolvable = Observation::new(obs, None).into();
        assert_eq!(a.key(), b.key());
        assert_eq!(a.connector(), LogicalConnector::Union);
    }

    #[test]
    fn initial_coverage_by_kind() {
        let scale = Scale::spatial(Envelope::new(0.0, 0.0, 10.0, 10.0).unwrap());
        let half = Scale::spatial(Envelope::new(0.0, 0.0, 5.0, 10.0).unwrap());
        let obs = Observable::new("geo:Elevation", SemanticType::Quality);

        let model: Resolvable = Model::new("m", obs.clone()).with_coverage(half).into();
        let strategy: Resolvable = ObservationStrategy::new("s", vec![]).into();
        let observation: Resolvable = Observation::new(obs, Some(scale)).into();

        assert!((model.initial_coverage(&scale).fraction() - 0.5).abs() < 1e-12);
        assert!(strategy.initial_coverage(&scale).is_complete());
        assert!(observation.initial_coverage(&scale).is_empty());
    }
}
