use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

/// Per-tenant mutual exclusion for the transfer saga. Two transfers against
/// one tenant serialize; transfers against different tenants never contend.
/// Overlapping swaps could otherwise leave a tenant with zero or two
/// primary owners.
#[derive(Default)]
pub struct TenantLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TenantLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for a tenant, creating it on first use. Callers
    /// hold the guard for the full mutation sequence.
    pub async fn for_tenant(&self, tenant_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
