// Per-tenant user and role-membership storage. Services hold a factory by
// value and open one store handle per operation.

pub mod models;
pub mod postgres;

pub use models::{NewUser, User};
pub use postgres::{PgStoreFactory, PgUserStore};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::error::IdentityError;
use crate::roles::Role;
use crate::tenant::TenantContext;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a user with email '{0}' already exists")]
    DuplicateEmail(String),

    #[error("row not found")]
    RowNotFound,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// User records and role memberships for one tenant.
///
/// `add_role` and `remove_role` are independent commits; the store offers no
/// transaction spanning them. Multi-step role mutations own their ordering
/// and their compensation.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError>;
    async fn create(&self, user: &User) -> Result<(), StoreError>;
    async fn update(&self, user: &User) -> Result<(), StoreError>;
    async fn delete(&self, user_id: Uuid) -> Result<(), StoreError>;
    async fn add_role(&self, user_id: Uuid, role: Role) -> Result<(), StoreError>;
    async fn remove_role(&self, user_id: Uuid, role: Role) -> Result<(), StoreError>;
    async fn list_roles(&self, user_id: Uuid) -> Result<Vec<Role>, StoreError>;
}

/// Opens a store handle scoped to exactly one tenant context. Handles are
/// per operation; they are never shared across tenants or kept past the
/// operation that opened them.
#[async_trait]
pub trait UserStoreFactory: Send + Sync {
    async fn open(&self, ctx: &TenantContext) -> Result<Arc<dyn UserStore>, StoreError>;
}

/// Reads a user's single committed role. Zero or several memberships is a
/// data-integrity fault, never a value to guess from.
pub async fn current_role(store: &dyn UserStore, user: &User) -> Result<Role, IdentityError> {
    let roles = store.list_roles(user.user_id).await.map_err(IdentityError::from)?;
    match roles.as_slice() {
        [role] => Ok(*role),
        [] => Err(IdentityError::IntegrityViolation(format!(
            "user '{}' holds no role",
            user.email
        ))),
        _ => Err(IdentityError::IntegrityViolation(format!(
            "user '{}' is assigned to {} roles",
            user.email,
            roles.len()
        ))),
    }
}
