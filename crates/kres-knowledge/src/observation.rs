//! Observations: observables bound to a geometry

use crate::observable::Observable;
use crate::scale::Scale;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique observation identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObservationId(pub Ulid);

impl ObservationId {
    /// Generate new observation ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ObservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ObservationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An observation of an observable, resolved or still to be resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    id: ObservationId,
    observable: Observable,
    geometry: Option<Scale>,
    resolved: bool,
}

impl Observation {
    /// Create an unresolved observation
    #[must_use]
    pub fn new(observable: Observable, geometry: Option<Scale>) -> Self {
        Self {
            id: ObservationId::new(),
            observable,
            geometry,
            resolved: false,
        }
    }

    /// Mark as already resolved
    #[inline]
    #[must_use]
    pub fn resolved(mut self) -> Self {
        self.resolved = true;
        self
    }

    #[inline]
    #[must_use]
    pub const fn id(&self) -> ObservationId {
        self.id
    }

    #[inline]
    #[must_use]
    pub const fn observable(&self) -> &Observable {
        &self.observable
    }

    #[inline]
    #[must_use]
    pub const fn geometry(&self) -> Option<&Scale> {
        self.geometry.as_ref()
    }

    #[inline]
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.resolved
    }
}
