// Tenant context resolution: registry client, credential cache, and the
// resolved per-tenant connection identity.

pub mod registry;
pub mod resolver;

pub use registry::{HttpTenantRegistry, RegistryError, RegistryTenant, TenantRegistry};
pub use resolver::TenantResolver;

use std::fmt;

/// Resolved credential bundle scoping one operation to exactly one tenant's
/// isolated data. Never persisted; lifetime is bounded by the request that
/// asked for it or the resolver's cache entry.
#[derive(Clone)]
pub struct TenantContext {
    pub tenant_id: String,
    /// Database login, reconstructed deterministically from the tenant id.
    pub database_username: String,
    database_password: String,
    /// Display only.
    pub organization_name: String,
    pub enabled: bool,
}

impl TenantContext {
    pub fn new(
        tenant_id: impl Into<String>,
        database_password: impl Into<String>,
        organization_name: impl Into<String>,
        enabled: bool,
    ) -> Self {
        let tenant_id = tenant_id.into();
        Self {
            database_username: tenant_id.clone(),
            tenant_id,
            database_password: database_password.into(),
            organization_name: organization_name.into(),
            enabled,
        }
    }

    pub fn database_password(&self) -> &str {
        &self.database_password
    }
}

// Credentials stay out of logs and debug dumps.
impl fmt::Debug for TenantContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantContext")
            .field("tenant_id", &self.tenant_id)
            .field("database_username", &self.database_username)
            .field("database_password", &"<redacted>")
            .field("organization_name", &self.organization_name)
            .field("enabled", &self.enabled)
            .finish()
    }
}
