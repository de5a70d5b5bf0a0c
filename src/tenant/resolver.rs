use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::IdentityError;
use crate::tenant::registry::{RegistryError, RegistryTenant, TenantRegistry};
use crate::tenant::TenantContext;

struct CachedCredential {
    password: String,
    organization_name: String,
    cached_at: Instant,
}

enum Lookup<'a> {
    Id(&'a str),
    Domain(&'a str),
}

impl Lookup<'_> {
    fn key(&self) -> &str {
        match self {
            Lookup::Id(id) => id,
            Lookup::Domain(domain) => domain,
        }
    }
}

/// Wraps the tenant registry with a TTL'd credential cache. Both lookup
/// paths return byte-identical credentials for the same tenant; the username
/// is always reconstructed from the tenant id, so only the password (and the
/// display name riding alongside it) is worth caching.
///
/// A tenant that rotates its database password keeps serving cached callers
/// the stale password until the TTL expires or `invalidate` is called from
/// the rotation flow; within the TTL that window is accepted, not hidden.
pub struct TenantResolver {
    registry: Arc<dyn TenantRegistry>,
    credentials: RwLock<HashMap<String, CachedCredential>>,
    /// Stable domain -> tenant id aliases learned from domain lookups.
    domains: RwLock<HashMap<String, String>>,
    /// Per-key locks collapsing concurrent misses to one registry call.
    flights: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    ttl: Duration,
}

impl TenantResolver {
    pub fn new(registry: Arc<dyn TenantRegistry>, ttl: Duration) -> Self {
        Self {
            registry,
            credentials: RwLock::new(HashMap::new()),
            domains: RwLock::new(HashMap::new()),
            flights: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn resolve_by_id(&self, tenant_id: &str) -> Result<TenantContext, IdentityError> {
        if let Some(ctx) = self.cached(tenant_id).await {
            return Ok(ctx);
        }
        self.resolve_uncached(Lookup::Id(tenant_id)).await
    }

    pub async fn resolve_by_domain(&self, domain: &str) -> Result<TenantContext, IdentityError> {
        if let Some(tenant_id) = self.domains.read().await.get(domain).cloned() {
            if let Some(ctx) = self.cached(&tenant_id).await {
                return Ok(ctx);
            }
        }
        self.resolve_uncached(Lookup::Domain(domain)).await
    }

    /// Eviction hook for credential-rotation events. The next resolution
    /// goes back to the registry.
    pub async fn invalidate(&self, tenant_id: &str) {
        if self.credentials.write().await.remove(tenant_id).is_some() {
            info!(tenant_id, "evicted cached tenant credential");
        }
    }

    async fn cached(&self, tenant_id: &str) -> Option<TenantContext> {
        let credentials = self.credentials.read().await;
        let entry = credentials.get(tenant_id)?;
        if entry.cached_at.elapsed() >= self.ttl {
            return None;
        }
        Some(TenantContext::new(
            tenant_id,
            entry.password.clone(),
            entry.organization_name.clone(),
            true,
        ))
    }

    async fn resolve_uncached(&self, lookup: Lookup<'_>) -> Result<TenantContext, IdentityError> {
        let flight = self.flight(lookup.key()).await;
        let _guard = flight.lock().await;

        // Another caller may have populated the cache while we waited.
        match &lookup {
            Lookup::Id(id) => {
                if let Some(ctx) = self.cached(id).await {
                    return Ok(ctx);
                }
            }
            Lookup::Domain(domain) => {
                if let Some(tenant_id) = self.domains.read().await.get(*domain).cloned() {
                    if let Some(ctx) = self.cached(&tenant_id).await {
                        return Ok(ctx);
                    }
                }
            }
        }

        let fetched = match &lookup {
            Lookup::Id(id) => self.registry.lookup_by_id(id).await,
            Lookup::Domain(domain) => self.registry.lookup_by_domain(domain).await,
        };
        let tenant = fetched.map_err(|err| resolution_failure(lookup.key(), err))?;

        self.admit(&lookup, tenant).await
    }

    async fn admit(
        &self,
        lookup: &Lookup<'_>,
        tenant: RegistryTenant,
    ) -> Result<TenantContext, IdentityError> {
        if !tenant.enabled {
            // Never hand out credentials for a disabled tenant, and drop any
            // cached copy from before it was disabled.
            self.credentials.write().await.remove(&tenant.tenant_id);
            warn!(tenant_id = %tenant.tenant_id, "refusing resolution for disabled tenant");
            return Err(IdentityError::TenantDisabled(tenant.tenant_id));
        }

        if let Lookup::Domain(domain) = lookup {
            self.domains
                .write()
                .await
                .insert(domain.to_string(), tenant.tenant_id.clone());
        }

        self.credentials.write().await.insert(
            tenant.tenant_id.clone(),
            CachedCredential {
                password: tenant.database_password.clone(),
                organization_name: tenant.organization_name.clone(),
                cached_at: Instant::now(),
            },
        );
        debug!(tenant_id = %tenant.tenant_id, "tenant credential cached");

        Ok(TenantContext::new(
            tenant.tenant_id,
            tenant.database_password,
            tenant.organization_name,
            true,
        ))
    }

    async fn flight(&self, key: &str) -> Arc<Mutex<()>> {
        let mut flights = self.flights.lock().await;
        flights
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn resolution_failure(key: &str, err: RegistryError) -> IdentityError {
    IdentityError::TenantResolutionFailed {
        tenant: key.to_string(),
        reason: err.to_string(),
    }
}
