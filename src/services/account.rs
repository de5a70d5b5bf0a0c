use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::IdentityError;
use crate::events::{EventPublisher, IdentityEvent};
use crate::roles::{can_act, Role};
use crate::store::{current_role, NewUser, User, UserStore, UserStoreFactory};
use crate::tenant::{TenantContext, TenantResolver};

/// Role-gated account mutations. Every mutation resolves the tenant, reads
/// both users' single committed roles, and passes the hierarchy gate before
/// touching the store; a denied gate means the store saw nothing.
pub struct AccountService {
    resolver: Arc<TenantResolver>,
    stores: Arc<dyn UserStoreFactory>,
    publisher: Arc<dyn EventPublisher>,
}

impl AccountService {
    pub fn new(
        resolver: Arc<TenantResolver>,
        stores: Arc<dyn UserStoreFactory>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            resolver,
            stores,
            publisher,
        }
    }

    async fn open(
        &self,
        tenant_id: &str,
    ) -> Result<(TenantContext, Arc<dyn UserStore>), IdentityError> {
        let ctx = self.resolver.resolve_by_id(tenant_id).await?;
        let store = self.stores.open(&ctx).await?;
        Ok((ctx, store))
    }

    async fn require_user(store: &dyn UserStore, email: &str) -> Result<User, IdentityError> {
        store
            .find_by_email(email)
            .await?
            .ok_or_else(|| IdentityError::NotFound(format!("no user was found for '{email}'")))
    }

    /// Shared gate: both roles read under the single-role invariant, then
    /// the pure hierarchy check.
    async fn authorize(
        store: &dyn UserStore,
        commanding: &User,
        recipient: &User,
    ) -> Result<(Role, Role), IdentityError> {
        let commanding_role = current_role(store, commanding).await?;
        let recipient_role = current_role(store, recipient).await?;
        if !can_act(commanding_role, recipient_role) {
            warn!(
                commanding = %commanding.email,
                recipient = %recipient.email,
                "hierarchy check refused the operation"
            );
            return Err(IdentityError::AuthorizationDenied(
                "you are forbidden from acting on this user".to_string(),
            ));
        }
        Ok((commanding_role, recipient_role))
    }

    /// Creates a user with an initial role. The apex role is never granted
    /// here; it only moves through an ownership transfer.
    pub async fn create_user(
        &self,
        tenant_id: &str,
        commanding_email: &str,
        new_user: NewUser,
        role: Role,
    ) -> Result<User, IdentityError> {
        info!(tenant_id, email = %new_user.email, "creating user");

        if role.is_apex() {
            return Err(IdentityError::AuthorizationDenied(
                "the primary owner role is only assigned through an ownership transfer".to_string(),
            ));
        }

        let (ctx, store) = self.open(tenant_id).await?;
        let commanding = Self::require_user(&*store, commanding_email).await?;
        let commanding_role = current_role(&*store, &commanding).await?;
        if !can_act(commanding_role, role) {
            return Err(IdentityError::AuthorizationDenied(
                "you are forbidden from granting this role".to_string(),
            ));
        }

        let user = User {
            user_id: Uuid::new_v4(),
            email: new_user.email,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            tenant_id: ctx.tenant_id.clone(),
            authorized_projects: new_user.authorized_projects,
            email_confirmed: false,
        };
        store.create(&user).await.map_err(IdentityError::from)?;
        store
            .add_role(user.user_id, role)
            .await
            .map_err(IdentityError::from)?;

        self.publisher
            .publish(IdentityEvent::UserCreated {
                tenant_id: ctx.tenant_id,
                user_id: user.user_id,
                email: user.email.clone(),
                role,
            })
            .await;
        Ok(user)
    }

    /// Deletes another user's account, gated by the hierarchy check.
    pub async fn delete_user(
        &self,
        tenant_id: &str,
        commanding_email: &str,
        target_email: &str,
    ) -> Result<(), IdentityError> {
        info!(tenant_id, email = %target_email, "deleting user");

        let (ctx, store) = self.open(tenant_id).await?;
        let target = Self::require_user(&*store, target_email).await?;
        let commanding = Self::require_user(&*store, commanding_email).await?;
        Self::authorize(&*store, &commanding, &target).await?;

        store.delete(target.user_id).await.map_err(IdentityError::from)?;

        self.publisher
            .publish(IdentityEvent::UserDeleted {
                tenant_id: ctx.tenant_id,
                user_id: target.user_id,
                email: target.email.clone(),
                commanding_email: commanding.email.clone(),
            })
            .await;
        Ok(())
    }

    /// Self-service account deletion: the commanding user and the recipient
    /// are the same account, under the same gate. A primary owner must
    /// transfer ownership first; the apex-vs-apex refusal holds here too.
    pub async fn delete_account(&self, tenant_id: &str, email: &str) -> Result<(), IdentityError> {
        info!(tenant_id, email = %email, "deleting account");

        let (ctx, store) = self.open(tenant_id).await?;
        let user = Self::require_user(&*store, email).await?;
        Self::authorize(&*store, &user, &user).await?;

        store.delete(user.user_id).await.map_err(IdentityError::from)?;

        self.publisher
            .publish(IdentityEvent::AccountDeleted {
                tenant_id: ctx.tenant_id,
                user_id: user.user_id,
                email: user.email.clone(),
            })
            .await;
        Ok(())
    }

    /// Moves a user to a new role. Grant-then-revoke, with the grant rolled
    /// back if the revoke fails, so the single-role invariant holds on every
    /// exit path. Apex is never granted or revoked here.
    pub async fn update_role(
        &self,
        tenant_id: &str,
        commanding_email: &str,
        target_email: &str,
        new_role: Role,
    ) -> Result<(), IdentityError> {
        info!(tenant_id, email = %target_email, role = %new_role, "updating user role");

        if new_role.is_apex() {
            return Err(IdentityError::AuthorizationDenied(
                "the primary owner role is only assigned through an ownership transfer".to_string(),
            ));
        }

        let (ctx, store) = self.open(tenant_id).await?;
        let commanding = Self::require_user(&*store, commanding_email).await?;
        let target = Self::require_user(&*store, target_email).await?;
        let (_, target_role) = Self::authorize(&*store, &commanding, &target).await?;

        if target_role == new_role {
            info!(email = %target.email, "role unchanged");
            return Ok(());
        }

        store
            .add_role(target.user_id, new_role)
            .await
            .map_err(IdentityError::from)?;
        if let Err(revoke_err) = store.remove_role(target.user_id, target_role).await {
            warn!(
                email = %target.email,
                "failed to remove previous role, rolling back the granted role: {revoke_err}"
            );
            match store.remove_role(target.user_id, new_role).await {
                Ok(()) => info!(email = %target.email, "granted role rolled back"),
                Err(undo_err) => {
                    error!(
                        email = %target.email,
                        "failed to roll back granted role: {undo_err}; user may hold a redundant role"
                    );
                    return Err(IdentityError::IntegrityViolation(format!(
                        "user '{}' may hold a redundant role",
                        target.email
                    )));
                }
            }
            return Err(IdentityError::from(revoke_err));
        }

        self.publisher
            .publish(IdentityEvent::UserRoleUpdated {
                tenant_id: ctx.tenant_id,
                user_id: target.user_id,
                email: target.email.clone(),
                role: new_role,
            })
            .await;
        Ok(())
    }

    /// Replaces a user's authorized project set, gated by the hierarchy
    /// check.
    pub async fn update_permissions(
        &self,
        tenant_id: &str,
        commanding_email: &str,
        target_email: &str,
        authorized_projects: Vec<Uuid>,
    ) -> Result<(), IdentityError> {
        info!(tenant_id, email = %target_email, "updating user permissions");

        let (ctx, store) = self.open(tenant_id).await?;
        let commanding = Self::require_user(&*store, commanding_email).await?;
        let mut target = Self::require_user(&*store, target_email).await?;
        Self::authorize(&*store, &commanding, &target).await?;

        target.authorized_projects = authorized_projects.clone();
        store.update(&target).await.map_err(IdentityError::from)?;

        self.publisher
            .publish(IdentityEvent::UserPermissionsUpdated {
                tenant_id: ctx.tenant_id,
                user_id: target.user_id,
                authorized_projects,
            })
            .await;
        Ok(())
    }
}
