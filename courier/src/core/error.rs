//! Failure taxonomy for one scan cycle.
//!
//! Every failure that reaches the run loop is one of these variants; transient
//! network errors are absorbed by the HTTP retry wrapper before this point.

use thiserror::Error;

/// Retry budget carried by a contract failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retryable: bool,
    /// Consecutive failures tolerated before stopping; `None` is unbounded.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub const NEVER: Self = Self {
        retryable: false,
        max_attempts: None,
    };

    pub const UNBOUNDED: Self = Self {
        retryable: true,
        max_attempts: None,
    };

    pub fn bounded(max_attempts: u32) -> Self {
        Self {
            retryable: true,
            max_attempts: Some(max_attempts),
        }
    }
}

/// What the node said went wrong with a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractFailureKind {
    /// The transaction is malformed; resubmitting cannot succeed.
    Rejected,
    /// Expired, stale reference block, or duplicate.
    Transient,
    /// CPU, NET, or RAM exhausted, or the node's deadline hit.
    ResourceExhausted,
    /// Contract assertion, transport failure, or an unrecognized error.
    Contract,
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("contract call failed ({kind:?}): {message}")]
    Contract {
        message: String,
        kind: ContractFailureKind,
        policy: RetryPolicy,
    },
    /// Credentials or permissions are no longer accepted; needs an operator.
    #[error("session invalid: {0}")]
    SessionInvalid(String),
    #[error("unrecoverable state: {0}")]
    Unrecoverable(String),
    #[error(transparent)]
    Unclassified(#[from] anyhow::Error),
}
