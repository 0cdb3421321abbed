//! Outcomes and errors of authentication validation.
//!
//! Two very different kinds of "no":
//!
//! - [`ValidationResult::Invalid`]: the policy was evaluated and the
//!   signature set does not satisfy it. Returned as data.
//! - [`ValidationError`]: the policy could not be evaluated at all because
//!   a document it depends on could not be resolved.

use thiserror::Error;

use super::requirements::Provenance;
use crate::identity::ResolverError;

/// Why a signature set does not authorize a document change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidReason {
    #[error("no signatures provided")]
    NoSignatures,

    #[error("document declares verification methods but no authentication")]
    NoAuthentication,

    #[error("authentication contains duplicate key reference: {0}")]
    DuplicateAuthentication(String),

    #[error("signatures contain duplicate key reference: {0}")]
    DuplicateSignature(String),

    #[error("authentication references unknown verification method: {0}")]
    DanglingAuthentication(String),

    /// A required key did not sign. `provenance` says which requirement
    /// was left unmet (e.g. the incoming material of a rotated key).
    #[error("missing signature for {key_id} (required by {provenance})")]
    MissingSignature {
        key_id: String,
        provenance: Provenance,
    },

    /// A key signed that was not required, or signed more often than
    /// required.
    #[error("excess signature for {0}")]
    ExcessSignature(String),
}

impl InvalidReason {
    /// The key id that caused the failure, when there is one.
    pub fn offending_key_id(&self) -> Option<&str> {
        match self {
            Self::NoSignatures | Self::NoAuthentication => None,
            Self::DuplicateAuthentication(id)
            | Self::DuplicateSignature(id)
            | Self::DanglingAuthentication(id)
            | Self::ExcessSignature(id) => Some(id),
            Self::MissingSignature { key_id, .. } => Some(key_id),
        }
    }

    /// Structural problems are detectable from the inputs alone.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            Self::MissingSignature { .. } | Self::ExcessSignature(_)
        )
    }
}

/// Result of evaluating a signature set against a document's policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(InvalidReason),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn reason(&self) -> Option<&InvalidReason> {
        match self {
            Self::Valid => None,
            Self::Invalid(reason) => Some(reason),
        }
    }

    /// Convert into a `Result` for callers that want `?`.
    pub fn into_result(self) -> Result<(), InvalidReason> {
        match self {
            Self::Valid => Ok(()),
            Self::Invalid(reason) => Err(reason),
        }
    }
}

impl From<Option<InvalidReason>> for ValidationResult {
    fn from(reason: Option<InvalidReason>) -> Self {
        match reason {
            None => Self::Valid,
            Some(reason) => Self::Invalid(reason),
        }
    }
}

/// The policy could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("controller document not found: {controller}: {source}")]
    ControllerDocumentNotFound {
        controller: String,
        #[source]
        source: ResolverError,
    },

    #[error("previous document not found for {id}: {source}")]
    PreviousDocumentNotFound {
        id: String,
        #[source]
        source: ResolverError,
    },
}
