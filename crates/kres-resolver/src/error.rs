//! Error types for the resolver
//!
//! Resolution failures that only mean "no answer here" are expressed as
//! empty graphs. What reaches this type either ends the session or is
//! reported back to the caller of [`ResolverService`](crate::ResolverService).

use kres_knowledge::KnowledgeError;

/// Main resolver error type
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    /// The reasoner produced no strategy for the top-level observable
    #[error("no observation strategy for {0}")]
    NoStrategy(String),

    /// Nothing resolves the observable in this context
    #[error("cannot resolve {urn} in context {context}")]
    CannotResolve {
        /// Observable urn
        urn: String,
        /// Context scope id
        context: String,
    },

    /// A dependent observable was requested without a context observation
    #[error("cannot resolve {urn} in context {context}: {reason}")]
    MissingContext {
        /// Observable urn
        urn: String,
        /// Context scope id
        context: String,
        /// What the scope reported
        reason: String,
    },

    /// Coverages over different scales were combined
    #[error("incompatible scale: {0}")]
    IncompatibleScale(#[from] KnowledgeError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// A collaborator call failed
    #[error("{service} failed: {message}")]
    Collaborator {
        /// Which collaborator
        service: &'static str,
        /// Reported failure
        message: String,
    },
}

impl ResolverError {
    /// Create collaborator error
    #[inline]
    pub fn collaborator(service: &'static str, message: impl Into<String>) -> Self {
        Self::Collaborator {
            service,
            message: message.into(),
        }
    }

    /// Check if the error ends the session
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingContext { .. } | Self::IncompatibleScale(_) | Self::Config(_)
        )
    }

    /// Check if the caller may retry or fall back
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !self.is_fatal()
    }
}
