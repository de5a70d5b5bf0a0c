use std::sync::Arc;

use tokio::task;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::IdentityError;
use crate::events::{EventPublisher, IdentityEvent};
use crate::roles::Role;
use crate::saga::locks::TenantLocks;
use crate::saga::SwapStep;
use crate::store::{current_role, StoreError, User, UserStore, UserStoreFactory};
use crate::tenant::TenantResolver;
use crate::token::{fingerprint, TransferTokens, TRANSFER_PURPOSE};

/// Outcome of a completed transfer.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub tenant_id: String,
    pub previous_owner_id: Uuid,
    pub new_owner_id: Uuid,
}

/// Orchestrates the primary ownership transfer: token issuance in Phase A,
/// the token-gated 4-step role swap in Phase B. The swap has no multi-row
/// transaction underneath it, so partial failure is handled by an explicit
/// reverse-order compensation ladder.
pub struct OwnershipTransferSaga {
    resolver: Arc<TenantResolver>,
    stores: Arc<dyn UserStoreFactory>,
    tokens: Arc<dyn TransferTokens>,
    publisher: Arc<dyn EventPublisher>,
    locks: TenantLocks,
}

impl OwnershipTransferSaga {
    pub fn new(
        resolver: Arc<TenantResolver>,
        stores: Arc<dyn UserStoreFactory>,
        tokens: Arc<dyn TransferTokens>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            resolver,
            stores,
            tokens,
            publisher,
            locks: TenantLocks::new(),
        }
    }

    /// Phase A: issue a transfer token bound to the tenant's current
    /// primary owner. No role state changes here; the token travels to the
    /// intended recipient over an out-of-band channel.
    pub async fn generate_transfer_token(
        &self,
        tenant_id: &str,
        owner_email: &str,
    ) -> Result<String, IdentityError> {
        info!(tenant_id, owner = %owner_email, "generating primary ownership transfer token");

        let ctx = self.resolver.resolve_by_id(tenant_id).await?;
        let store = self.stores.open(&ctx).await?;

        let owner = store
            .find_by_email(owner_email)
            .await
            .map_err(IdentityError::from)?
            .ok_or_else(|| {
                IdentityError::NotFound(format!("failed to find primary owner '{owner_email}'"))
            })?;
        let owner_role = current_role(&*store, &owner).await?;
        if owner_role != Role::PrimaryOwner {
            return Err(IdentityError::AuthorizationDenied(
                "transfer tokens are bound to the current primary owner".to_string(),
            ));
        }

        let token = self
            .tokens
            .issue(&ctx.tenant_id, owner.user_id, TRANSFER_PURPOSE)
            .await
            .map_err(|e| IdentityError::TokenIssuanceFailed(e.to_string()))?;
        info!(tenant_id, token = %fingerprint(&token), "transfer token issued");

        self.publisher
            .publish(IdentityEvent::TransferTokenGenerated {
                tenant_id: ctx.tenant_id,
                owner_id: owner.user_id,
                token: token.clone(),
            })
            .await;
        Ok(token)
    }

    /// Phase B: execute the transfer. Failures before the first sub-step
    /// leave role state untouched; failures mid-swap roll back through the
    /// compensation ladder before surfacing.
    pub async fn execute_transfer(
        &self,
        tenant_id: &str,
        commanding_email: &str,
        target_email: &str,
        token: &str,
    ) -> Result<TransferReceipt, IdentityError> {
        info!(
            tenant_id,
            from = %commanding_email,
            to = %target_email,
            token = %fingerprint(token),
            "executing primary ownership transfer"
        );

        // 1. Resolution failure aborts before anything is touched.
        let ctx = self.resolver.resolve_by_id(tenant_id).await?;

        // One transfer at a time per tenant, held across the whole swap.
        let lock = self.locks.for_tenant(&ctx.tenant_id).await;
        let guard = lock.lock_owned().await;

        let store = self.stores.open(&ctx).await?;

        // 2. Both parties must exist.
        let commanding = store
            .find_by_email(commanding_email)
            .await
            .map_err(IdentityError::from)?
            .ok_or_else(|| {
                IdentityError::NotFound("the user requesting the transfer was not found".to_string())
            })?;
        let target = store
            .find_by_email(target_email)
            .await
            .map_err(IdentityError::from)?
            .ok_or_else(|| {
                IdentityError::NotFound(
                    "the recipient of the transfer request was not found".to_string(),
                )
            })?;

        // 3. The token is verified against the principal it was issued for:
        //    the current primary owner, i.e. the commanding user.
        //    Verification consumes the token.
        if !self
            .tokens
            .verify(&ctx.tenant_id, commanding.user_id, TRANSFER_PURPOSE, token)
            .await
        {
            return Err(IdentityError::InvalidToken);
        }

        // 4. Only the current primary owner may execute a transfer.
        let commanding_role = current_role(&*store, &commanding).await?;
        if commanding_role != Role::PrimaryOwner {
            return Err(IdentityError::AuthorizationDenied(
                "the user executing the transfer is not the primary owner".to_string(),
            ));
        }
        let target_prior = current_role(&*store, &target).await?;

        // 5-6. The swap runs on its own task: a caller that drops this
        // future cannot abandon a sub-step mid-flight. The tenant lock guard
        // moves into the task and is released when the swap reaches a
        // terminal state.
        let swap = SwapRun {
            store,
            publisher: Arc::clone(&self.publisher),
            tenant_id: ctx.tenant_id.clone(),
            commanding,
            target,
            target_prior,
        };
        let handle = task::spawn(async move {
            let outcome = swap.run().await;
            drop(guard);
            outcome
        });
        handle
            .await
            .map_err(|e| IdentityError::Store(format!("transfer task failed: {e}")))?
    }
}

/// One Phase B swap in flight, with everything it needs to finish or roll
/// back without its caller.
struct SwapRun {
    store: Arc<dyn UserStore>,
    publisher: Arc<dyn EventPublisher>,
    tenant_id: String,
    commanding: User,
    target: User,
    target_prior: Role,
}

impl SwapRun {
    async fn run(self) -> Result<TransferReceipt, IdentityError> {
        let mut completed: Vec<SwapStep> = Vec::with_capacity(SwapStep::IN_ORDER.len());
        for step in SwapStep::IN_ORDER {
            if let Err(step_err) = self.apply(step).await {
                warn!(
                    tenant_id = %self.tenant_id,
                    ?step,
                    completed = completed.len(),
                    "role swap step failed, compensating: {step_err}"
                );
                return Err(self.compensate(step, &step_err, &completed).await);
            }
            completed.push(step);
        }

        info!(
            tenant_id = %self.tenant_id,
            previous = %self.commanding.email,
            new = %self.target.email,
            "primary ownership transferred"
        );
        self.publisher
            .publish(IdentityEvent::PrimaryOwnershipTransferred {
                tenant_id: self.tenant_id.clone(),
                previous_owner_id: self.commanding.user_id,
                new_owner_id: self.target.user_id,
            })
            .await;

        Ok(TransferReceipt {
            tenant_id: self.tenant_id,
            previous_owner_id: self.commanding.user_id,
            new_owner_id: self.target.user_id,
        })
    }

    async fn apply(&self, step: SwapStep) -> Result<(), StoreError> {
        match step {
            SwapStep::GrantOwnerToCommanding => {
                self.store.add_role(self.commanding.user_id, Role::Owner).await
            }
            SwapStep::RevokeApexFromCommanding => {
                self.store
                    .remove_role(self.commanding.user_id, Role::PrimaryOwner)
                    .await
            }
            SwapStep::GrantApexToTarget => {
                self.store.add_role(self.target.user_id, Role::PrimaryOwner).await
            }
            SwapStep::RevokeTargetPriorRole => {
                self.store.remove_role(self.target.user_id, self.target_prior).await
            }
        }
    }

    /// The compensation ladder: undo every completed sub-step in reverse
    /// order, restoring the pre-transfer role assignments exactly. Returns
    /// the error the saga surfaces, a compensated abort when the ladder
    /// completes and the critical inconsistency when it does not.
    async fn compensate(
        &self,
        failed_step: SwapStep,
        cause: &StoreError,
        completed: &[SwapStep],
    ) -> IdentityError {
        for step in completed.iter().rev() {
            if let Err(undo_err) = self.undo(*step).await {
                error!(
                    tenant_id = %self.tenant_id,
                    ?failed_step,
                    stuck_step = ?step,
                    "INTEGRITY: transfer compensation failed; the tenant may have zero or two \
                     primary owners and requires manual repair: {undo_err}"
                );
                return IdentityError::SagaCompensationFailed {
                    tenant: self.tenant_id.clone(),
                    failed_step,
                    stuck_step: *step,
                    reason: undo_err.to_string(),
                };
            }
        }
        info!(
            tenant_id = %self.tenant_id,
            ?failed_step,
            "role swap rolled back to the pre-transfer state"
        );
        IdentityError::RoleSwapFailed {
            step: failed_step,
            reason: cause.to_string(),
        }
    }

    async fn undo(&self, step: SwapStep) -> Result<(), StoreError> {
        match step {
            SwapStep::GrantOwnerToCommanding => {
                self.store.remove_role(self.commanding.user_id, Role::Owner).await
            }
            SwapStep::RevokeApexFromCommanding => {
                self.store
                    .add_role(self.commanding.user_id, Role::PrimaryOwner)
                    .await
            }
            SwapStep::GrantApexToTarget => {
                self.store
                    .remove_role(self.target.user_id, Role::PrimaryOwner)
                    .await
            }
            SwapStep::RevokeTargetPriorRole => {
                self.store.add_role(self.target.user_id, self.target_prior).await
            }
        }
    }
}
