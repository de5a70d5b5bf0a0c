use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A tenant-scoped user account. The user's role lives in the store's
/// membership set, not on this row; `current_role` is the sanctioned read.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: Uuid,
    /// Unique within the tenant; matched case-insensitively.
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub tenant_id: String,
    /// Project grants; only meaningful below the Owner rank.
    pub authorized_projects: Vec<Uuid>,
    pub email_confirmed: bool,
}

/// Caller-supplied fields for a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub authorized_projects: Vec<Uuid>,
}
