// Primary ownership transfer saga: token-gated 4-step role swap with an
// explicit compensation ladder and per-tenant mutual exclusion.

pub mod locks;
pub mod transfer;

pub use locks::TenantLocks;
pub use transfer::{OwnershipTransferSaga, TransferReceipt};

/// The four role mutations of a transfer, in execution order. Each is an
/// independent commit at the store; there is no atomic "set role".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapStep {
    /// 5a: add the commanding user to the elevated non-apex role.
    GrantOwnerToCommanding,
    /// 5b: remove the commanding user from the apex role.
    RevokeApexFromCommanding,
    /// 5c: add the transfer target to the apex role.
    GrantApexToTarget,
    /// 5d: remove the transfer target from their prior role.
    RevokeTargetPriorRole,
}

impl SwapStep {
    pub const IN_ORDER: [SwapStep; 4] = [
        SwapStep::GrantOwnerToCommanding,
        SwapStep::RevokeApexFromCommanding,
        SwapStep::GrantApexToTarget,
        SwapStep::RevokeTargetPriorRole,
    ];
}

/// Terminal states of a transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaTermination {
    /// All four sub-steps committed and the completion event published.
    Completed,
    /// Failure before any sub-step ran; no role state was touched.
    AbortedNoChange,
    /// Failure mid-sequence; every completed sub-step was undone.
    AbortedCompensated,
    /// Failure mid-sequence and the rollback itself failed. The tenant may
    /// have zero or two apex holders; operator remediation is required.
    AbortedInconsistent,
}
