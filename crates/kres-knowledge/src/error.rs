//! Error types for the knowledge model

use crate::scale::ScaleSignature;

/// Errors raised by knowledge-model operations
///
/// These are programming or data errors. Ordinary resolution failures are
/// never expressed through this type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KnowledgeError {
    /// Two coverages bound to different scales were merged
    #[error("incompatible scales in coverage merge: {left} vs {right}")]
    IncompatibleScale {
        /// Signature of the receiving coverage
        left: ScaleSignature,
        /// Signature of the merged coverage
        right: ScaleSignature,
    },

    /// Coverage fraction outside [0, 1] or not finite
    #[error("invalid coverage fraction: {0}")]
    InvalidFraction(f64),

    /// Malformed spatial or temporal extent
    #[error("invalid extent: {0}")]
    InvalidExtent(String),
}
