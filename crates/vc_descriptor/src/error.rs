use thiserror::Error;

// -----------------------------------------------------------------------------
// MetaError

/// Errors reported by the metadata pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MetaError {
    /// A caller passed an argument the operation cannot accept.
    #[error("invalid argument `{argument}`: {reason}")]
    InvalidArgument {
        argument: &'static str,
        reason: &'static str,
    },

    /// A provider or descriptor answered `None` where a value is required.
    ///
    /// This points at a broken collaborator and is never papered over
    /// with an empty result.
    #[error("`{provider}` returned no value from `{method}`")]
    MissingResult {
        provider: String,
        method: &'static str,
    },

    /// The (primary, secondary) pair is already associated.
    #[error("the association already exists")]
    DuplicateAssociation,

    /// A reflected attribute source failed to produce its attributes.
    #[error("attribute source of `{owner}` failed: {message}")]
    AttributeSource { owner: String, message: String },

    /// The operation was cancelled by a collaborator.
    #[error("operation cancelled")]
    Cancelled,
}

impl MetaError {
    #[inline]
    pub(crate) const fn invalid(argument: &'static str, reason: &'static str) -> Self {
        Self::InvalidArgument { argument, reason }
    }

    #[inline]
    pub(crate) fn missing(provider: impl Into<String>, method: &'static str) -> Self {
        Self::MissingResult {
            provider: provider.into(),
            method,
        }
    }
}
