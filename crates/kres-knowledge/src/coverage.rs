//! Coverage: how much of a scale a resolvable satisfies
//!
//! A [`Coverage`] is a fraction in [0, 1] bound to one [`Scale`]. Coverages
//! are combined with [`Coverage::merge`]: a union accumulates satisfied
//! extent (capped at 1.0), an intersection keeps the smaller fraction. The
//! [`gain`](Coverage::gain) of a merge result tells how much the merge added,
//! which is what relevance decisions are based on.

use crate::error::KnowledgeError;
use crate::scale::{Scale, ScaleSignature};
use serde::{Deserialize, Serialize};

/// Default minimum gain for a contribution to be worth merging
pub const DEFAULT_MIN_RELEVANT_GAIN: f64 = 0.15;

/// Default tolerance under 1.0 at which a coverage counts as complete
pub const DEFAULT_COMPLETENESS_EPSILON: f64 = 1e-6;

/// How two coverages are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalConnector {
    /// Alternatives: satisfied extent accumulates
    Union,
    /// Requirements: only the jointly satisfied extent remains
    Intersection,
}

/// Thresholds carried by every coverage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoveragePolicy {
    /// Contributions adding less than this are irrelevant
    pub min_relevant_gain: f64,
    /// A coverage is complete at `1.0 - completeness_epsilon`
    pub completeness_epsilon: f64,
}

impl Default for CoveragePolicy {
    fn default() -> Self {
        Self {
            min_relevant_gain: DEFAULT_MIN_RELEVANT_GAIN,
            completeness_epsilon: DEFAULT_COMPLETENESS_EPSILON,
        }
    }
}

/// Classification of a contribution relative to an existing coverage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoverageStatus {
    /// Nothing was contributed
    Empty,
    /// Contributed less than the relevance threshold
    Irrelevant,
    /// Worth merging, coverage still incomplete
    Relevant,
    /// Merging it completes the coverage
    Complete,
}

impl CoverageStatus {
    /// Relevant or complete
    #[inline]
    #[must_use]
    pub const fn is_relevant(self) -> bool {
        matches!(self, Self::Relevant | Self::Complete)
    }

    /// Complete
    #[inline]
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Fraction of a scale satisfied by some resolvable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    scale: Scale,
    signature: ScaleSignature,
    fraction: f64,
    gain: f64,
    policy: CoveragePolicy,
}

impl Coverage {
    /// Create a coverage of `scale` at `fraction`
    ///
    /// # Errors
    /// Returns [`KnowledgeError::InvalidFraction`] unless `fraction` is a
    /// finite value in [0, 1].
    pub fn new(scale: &Scale, fraction: f64) -> Result<Self, KnowledgeError> {
        if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
            return Err(KnowledgeError::InvalidFraction(fraction));
        }
        Ok(Self::unchecked(scale, fraction))
    }

    fn unchecked(scale: &Scale, fraction: f64) -> Self {
        Self {
            scale: *scale,
            signature: scale.signature(),
            fraction,
            gain: 0.0,
            policy: CoveragePolicy::default(),
        }
    }

    /// Nothing of `scale` is covered
    #[inline]
    #[must_use]
    pub fn empty(scale: &Scale) -> Self {
        Self::unchecked(scale, 0.0)
    }

    /// All of `scale` is covered
    #[inline]
    #[must_use]
    pub fn full(scale: &Scale) -> Self {
        Self::unchecked(scale, 1.0)
    }

    /// Coverage of `scale` by a resolvable whose native coverage is `native`
    ///
    /// See [`Scale::covered_fraction`].
    #[inline]
    #[must_use]
    pub fn of(scale: &Scale, native: Option<&Scale>) -> Self {
        Self::unchecked(scale, scale.covered_fraction(native))
    }

    /// Replace the thresholds
    #[inline]
    #[must_use]
    pub fn with_policy(mut self, policy: CoveragePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The scale this coverage is bound to
    #[inline]
    #[must_use]
    pub const fn scale(&self) -> &Scale {
        &self.scale
    }

    /// Signature of the bound scale
    #[inline]
    #[must_use]
    pub const fn signature(&self) -> ScaleSignature {
        self.signature
    }

    /// Covered fraction in [0, 1]
    #[inline]
    #[must_use]
    pub const fn fraction(&self) -> f64 {
        self.fraction
    }

    /// Fraction gained by the merge that produced this coverage (0 if not
    /// produced by a merge, negative if the merge lost coverage)
    #[inline]
    #[must_use]
    pub const fn gain(&self) -> f64 {
        self.gain
    }

    /// Thresholds in effect
    #[inline]
    #[must_use]
    pub const fn policy(&self) -> CoveragePolicy {
        self.policy
    }

    /// Nothing covered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fraction <= 0.0
    }

    /// Covered up to the completeness tolerance
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.fraction >= 1.0 - self.policy.completeness_epsilon
    }

    /// True if the merge that produced this coverage gained enough
    #[inline]
    #[must_use]
    pub fn is_relevant(&self) -> bool {
        self.gain >= self.policy.min_relevant_gain
    }

    /// Combine with another coverage of the same scale
    ///
    /// The receiver's policy is kept. The result records the gain over the
    /// receiver.
    ///
    /// # Errors
    /// Returns [`KnowledgeError::IncompatibleScale`] if `other` is bound to a
    /// different scale.
    pub fn merge(&self, other: &Self, how: LogicalConnector) -> Result<Self, KnowledgeError> {
        if self.signature != other.signature {
            return Err(KnowledgeError::IncompatibleScale {
                left: self.signature,
                right: other.signature,
            });
        }
        let fraction = match how {
            LogicalConnector::Union => (self.fraction + other.fraction).min(1.0),
            LogicalConnector::Intersection => self.fraction.min(other.fraction),
        };
        Ok(Self {
            scale: self.scale,
            signature: self.signature,
            fraction,
            gain: fraction - self.fraction,
            policy: self.policy,
        })
    }

    /// Marginal fraction this coverage adds over `current` in a union
    ///
    /// # Errors
    /// Returns [`KnowledgeError::IncompatibleScale`] on mismatched scales.
    pub fn gain_over(&self, current: &Self) -> Result<f64, KnowledgeError> {
        Ok(current.merge(self, LogicalConnector::Union)?.gain)
    }

    /// True if this coverage adds at least the relevance threshold over
    /// `current`
    ///
    /// # Errors
    /// Returns [`KnowledgeError::IncompatibleScale`] on mismatched scales.
    pub fn is_relevant_to(&self, current: &Self) -> Result<bool, KnowledgeError> {
        Ok(self.gain_over(current)? >= current.policy.min_relevant_gain)
    }

    /// Classify `contribution` as if it were merged into `self` with `how`
    ///
    /// For unions the decision is based on the gain; for intersections
    /// (requirements) on the contribution's own fraction, since an
    /// intersection can never gain.
    ///
    /// # Errors
    /// Returns [`KnowledgeError::IncompatibleScale`] on mismatched scales.
    pub fn classify(
        &self,
        contribution: &Self,
        how: LogicalConnector,
    ) -> Result<CoverageStatus, KnowledgeError> {
        if contribution.is_empty() {
            return Ok(CoverageStatus::Empty);
        }
        let merged = self.merge(contribution, how)?;
        let relevant = match how {
            LogicalConnector::Union => merged.is_relevant(),
            LogicalConnector::Intersection => {
                contribution.fraction >= self.policy.min_relevant_gain
            }
        };
        Ok(if !relevant {
            CoverageStatus::Irrelevant
        } else if merged.is_complete() {
            CoverageStatus::Complete
        } else {
            CoverageStatus::Relevant
        })
    }
}
