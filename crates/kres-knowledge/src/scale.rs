//! Spatio-temporal scales
//!
//! A [`Scale`] holds at most one extent per dimension: a spatial
//! [`Envelope`] and a temporal [`Interval`]. Its [`measure`](Scale::measure)
//! is the product of the extent measures (area times duration), which is
//! what coverage fractions are computed against.

use crate::error::KnowledgeError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Axis-aligned spatial extent in projected coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    /// Create an envelope
    ///
    /// # Errors
    /// Returns [`KnowledgeError::InvalidExtent`] if a bound is not finite or
    /// a minimum exceeds its maximum.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self, KnowledgeError> {
        let finite = [min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite());
        if !finite || min_x > max_x || min_y > max_y {
            return Err(KnowledgeError::InvalidExtent(format!(
                "envelope [{min_x}, {min_y}, {max_x}, {max_y}]"
            )));
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    /// Area of the envelope
    #[inline]
    #[must_use]
    pub fn area(&self) -> f64 {
        (self.max_x - self.min_x) * (self.max_y - self.min_y)
    }

    /// Overlapping part of two envelopes, if they overlap
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let min_x = self.min_x.max(other.min_x);
        let min_y = self.min_y.max(other.min_y);
        let max_x = self.max_x.min(other.max_x);
        let max_y = self.max_y.min(other.max_y);
        (min_x <= max_x && min_y <= max_y).then_some(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    /// Bounding envelope of both
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

/// Temporal extent, half-open `[start, end)` in epoch milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: i64,
    pub end: i64,
}

impl Interval {
    /// Create an interval
    ///
    /// # Errors
    /// Returns [`KnowledgeError::InvalidExtent`] if `end < start`.
    pub fn new(start: i64, end: i64) -> Result<Self, KnowledgeError> {
        if end < start {
            return Err(KnowledgeError::InvalidExtent(format!(
                "interval [{start}, {end})"
            )));
        }
        Ok(Self { start, end })
    }

    /// Duration in milliseconds
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> f64 {
        (self.end - self.start) as f64
    }

    /// Overlapping part of two intervals, if they overlap
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(Self { start, end })
    }

    /// Smallest interval spanning both
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Stable identity of a scale, used to bind coverages and key caches
///
/// Blake3 hash over the canonical bytes of the extents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScaleSignature([u8; 32]);

impl ScaleSignature {
    /// Underlying hash bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for ScaleSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

/// Spatio-temporal extent over which observations are sought
///
/// A scale without extents is *scalar*: it measures 1 and is covered
/// entirely by anything.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Scale {
    space: Option<Envelope>,
    time: Option<Interval>,
}

impl Scale {
    /// Scalar scale (no extents)
    #[inline]
    #[must_use]
    pub const fn scalar() -> Self {
        Self {
            space: None,
            time: None,
        }
    }

    /// Purely spatial scale
    #[inline]
    #[must_use]
    pub const fn spatial(envelope: Envelope) -> Self {
        Self {
            space: Some(envelope),
            time: None,
        }
    }

    /// Purely temporal scale
    #[inline]
    #[must_use]
    pub const fn temporal(interval: Interval) -> Self {
        Self {
            space: None,
            time: Some(interval),
        }
    }

    /// Add or replace the temporal extent
    #[inline]
    #[must_use]
    pub const fn with_time(mut self, interval: Interval) -> Self {
        self.time = Some(interval);
        self
    }

    /// Add or replace the spatial extent
    #[inline]
    #[must_use]
    pub const fn with_space(mut self, envelope: Envelope) -> Self {
        self.space = Some(envelope);
        self
    }

    /// Spatial extent, if any
    #[inline]
    #[must_use]
    pub const fn space(&self) -> Option<&Envelope> {
        self.space.as_ref()
    }

    /// Temporal extent, if any
    #[inline]
    #[must_use]
    pub const fn time(&self) -> Option<&Interval> {
        self.time.as_ref()
    }

    /// True if the scale has no extents
    #[inline]
    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        self.space.is_none() && self.time.is_none()
    }

    /// True if any extent has zero measure
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.space.is_some_and(|s| s.area() <= 0.0) || self.time.is_some_and(|t| t.duration() <= 0.0)
    }

    /// Product of the extent measures; 1.0 for scalar scales
    #[must_use]
    pub fn measure(&self) -> f64 {
        let area = self.space.map_or(1.0, |s| s.area());
        let duration = self.time.map_or(1.0, |t| t.duration());
        area * duration
    }

    /// Intersection with another scale
    ///
    /// Dimensions present on one side only are kept unchanged (the other
    /// side does not constrain them). Returns `None` if the scales are
    /// disjoint in any shared dimension.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let space = match (self.space, other.space) {
            (Some(a), Some(b)) => Some(a.intersection(&b)?),
            (a, b) => a.or(b),
        };
        let time = match (self.time, other.time) {
            (Some(a), Some(b)) => Some(a.intersection(&b)?),
            (a, b) => a.or(b),
        };
        Some(Self { space, time })
    }

    /// Union (bounding extents) with another scale
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let space = match (self.space, other.space) {
            (Some(a), Some(b)) => Some(a.union(&b)),
            (a, b) => a.or(b),
        };
        let time = match (self.time, other.time) {
            (Some(a), Some(b)) => Some(a.union(&b)),
            (a, b) => a.or(b),
        };
        Self { space, time }
    }

    /// Fraction of this scale covered by `native`
    ///
    /// `measure(self ∩ native) / measure(self)`, clamped to [0, 1]. Scalar
    /// scales and a missing `native` coverage (universal) yield 1.0; an
    /// empty scale or disjoint coverage yields 0.0.
    #[must_use]
    pub fn covered_fraction(&self, native: Option<&Self>) -> f64 {
        let Some(native) = native else {
            return 1.0;
        };
        if self.is_scalar() {
            return 1.0;
        }
        let total = self.measure();
        if total <= 0.0 {
            return 0.0;
        }
        // only the dimensions this scale has count towards its coverage
        let constraint = Self {
            space: self.space.and(native.space),
            time: self.time.and(native.time),
        };
        match self.intersection(&constraint) {
            Some(common) => (common.measure() / total).clamp(0.0, 1.0),
            None => 0.0,
        }
    }

    /// Canonical signature of this scale
    #[must_use]
    pub fn signature(&self) -> ScaleSignature {
        let mut hasher = blake3::Hasher::new();
        match self.space {
            Some(s) => {
                hasher.update(b"S");
                for v in [s.min_x, s.min_y, s.max_x, s.max_y] {
                    hasher.update(&v.to_bits().to_le_bytes());
                }
            }
            None => {
                hasher.update(b"s");
            }
        }
        match self.time {
            Some(t) => {
                hasher.update(b"T");
                hasher.update(&t.start.to_le_bytes());
                hasher.update(&t.end.to_le_bytes());
            }
            None => {
                hasher.update(b"t");
            }
        }
        ScaleSignature(*hasher.finalize().as_bytes())
    }
}

impl Display for Scale {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_scalar() {
            return f.write_str("scalar");
        }
        let mut first = true;
        if let Some(s) = &self.space {
            write!(f, "S[{}, {}, {}, {}]", s.min_x, s.min_y, s.max_x, s.max_y)?;
            first = false;
        }
        if let Some(t) = &self.time {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "T[{}, {})", t.start, t.end)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(min: f64, max: f64) -> Envelope {
        Envelope::new(min, min, max, max).unwrap()
    }

    #[test]
    fn envelope_rejects_inverted_bounds() {
        assert!(Envelope::new(1.0, 0.0, 0.0, 1.0).is_err());
        assert!(Envelope::new(0.0, 0.0, f64::NAN, 1.0).is_err());
    }

    #[test]
    fn measure_is_area_times_duration() {
        let scale = Scale::spatial(square(0.0, 2.0)).with_time(Interval::new(0, 10).unwrap());
        assert!((scale.measure() - 40.0).abs() < f64::EPSILON);
        assert!((Scale::scalar().measure() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn covered_fraction_uses_intersection() {
        let scale = Scale::spatial(Envelope::new(0.0, 0.0, 10.0, 1.0).unwrap());
        let native = Scale::spatial(Envelope::new(0.0, 0.0, 6.0, 1.0).unwrap());
        assert!((scale.covered_fraction(Some(&native)) - 0.6).abs() < 1e-12);
        assert!((scale.covered_fraction(None) - 1.0).abs() < f64::EPSILON);

        let disjoint = Scale::spatial(Envelope::new(20.0, 0.0, 30.0, 1.0).unwrap());
        assert!(scale.covered_fraction(Some(&disjoint)).abs() < f64::EPSILON);
    }

    #[test]
    fn covered_fraction_ignores_dimensions_the_scale_lacks() {
        let scale = Scale::spatial(square(0.0, 1.0));
        let native = Scale::spatial(square(0.0, 1.0)).with_time(Interval::new(0, 5).unwrap());
        assert!((scale.covered_fraction(Some(&native)) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn signature_is_stable_and_discriminating() {
        let a = Scale::spatial(square(0.0, 1.0));
        let b = Scale::spatial(square(0.0, 1.0));
        let c = Scale::spatial(square(0.0, 2.0));
        assert_eq!(a.signature(), b.signature());
        assert_ne!(a.signature(), c.signature());
        assert_ne!(Scale::scalar().signature(), a.signature());
    }

    #[test]
    fn union_spans_both() {
        let a = Scale::spatial(square(0.0, 1.0));
        let b = Scale::spatial(square(2.0, 3.0));
        let u = a.union(&b);
        assert_eq!(u.space(), Some(&square(0.0, 3.0)));
    }

    #[test]
    fn disjoint_intersection_is_none() {
        let a = Scale::temporal(Interval::new(0, 10).unwrap());
        let b = Scale::temporal(Interval::new(20, 30).unwrap());
        assert!(a.intersection(&b).is_none());
    }
}
