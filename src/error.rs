// Closed error taxonomy exposed to callers. Raw storage, registry, and
// token-provider errors are logged where they occur and never cross this
// boundary, so upstream callers can always tell "nothing happened" from
// "partially happened, system flagged".
use thiserror::Error;

use crate::saga::{SagaTermination, SwapStep};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum IdentityError {
    /// Registry unreachable or the tenant is unknown. Retryable.
    #[error("tenant resolution failed for '{tenant}': {reason}")]
    TenantResolutionFailed { tenant: String, reason: String },

    /// The registry reports the tenant disabled. Terminal for the request;
    /// callers must not open a data connection.
    #[error("tenant '{0}' is disabled")]
    TenantDisabled(String),

    #[error("{0}")]
    NotFound(String),

    /// Expired, wrong purpose, wrong principal, replayed, or unverifiable.
    #[error("the token was invalid for the transfer")]
    InvalidToken,

    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    /// Caller-correctable conflict, e.g. a duplicate email address.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("failed to generate the transfer token: {0}")]
    TokenIssuanceFailed(String),

    /// A read that must see exactly one committed role membership saw zero
    /// or several. Never worked around by picking one.
    #[error("data integrity violation: {0}")]
    IntegrityViolation(String),

    /// Opaque storage failure outside the role swap. Retryable.
    #[error("storage failure: {0}")]
    Store(String),

    /// A swap sub-step failed and every completed sub-step was rolled back;
    /// role assignments are exactly as they were before the transfer.
    #[error("role swap failed at {step:?}: {reason}; completed steps were rolled back")]
    RoleSwapFailed { step: SwapStep, reason: String },

    /// A swap sub-step failed and the rollback failed too. Always surfaced
    /// and logged at the highest severity; requires operator remediation.
    #[error("role swap failed at {failed_step:?} and rollback of {stuck_step:?} failed for tenant '{tenant}': {reason}; manual repair required")]
    SagaCompensationFailed {
        tenant: String,
        failed_step: SwapStep,
        stuck_step: SwapStep,
        reason: String,
    },
}

impl IdentityError {
    /// Terminal saga state this error corresponds to. Errors raised before
    /// any sub-step ran map to `AbortedNoChange`.
    pub fn termination(&self) -> SagaTermination {
        match self {
            IdentityError::RoleSwapFailed { .. } => SagaTermination::AbortedCompensated,
            IdentityError::SagaCompensationFailed { .. } => SagaTermination::AbortedInconsistent,
            _ => SagaTermination::AbortedNoChange,
        }
    }

    /// Whether a caller may safely retry the same command.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IdentityError::TenantResolutionFailed { .. } | IdentityError::Store(_)
        )
    }
}

impl From<StoreError> for IdentityError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail(email) => {
                IdentityError::ConstraintViolation(format!("the email address '{email}' is already taken"))
            }
            StoreError::RowNotFound => IdentityError::NotFound("record not found".to_string()),
            other => {
                // Log the real error, surface the closed kind.
                tracing::error!("tenant store failure: {other}");
                IdentityError::Store("the tenant store failed to complete the operation".to_string())
            }
        }
    }
}
