use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Record returned by the tenants service for one organization.
#[derive(Clone, Deserialize)]
pub struct RegistryTenant {
    pub tenant_id: String,
    pub database_password: String,
    pub organization_name: String,
    pub enabled: bool,
}

impl RegistryTenant {
    pub fn new(
        tenant_id: impl Into<String>,
        database_password: impl Into<String>,
        organization_name: impl Into<String>,
        enabled: bool,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            database_password: database_password.into(),
            organization_name: organization_name.into(),
            enabled,
        }
    }
}

impl fmt::Debug for RegistryTenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryTenant")
            .field("tenant_id", &self.tenant_id)
            .field("database_password", &"<redacted>")
            .field("organization_name", &self.organization_name)
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tenant '{0}' is not registered")]
    UnknownTenant(String),

    #[error("tenant registry unavailable: {0}")]
    Unavailable(String),
}

/// Authoritative source of tenant credentials and state. Fallible and
/// network-bound; callers go through the resolver's cache.
#[async_trait]
pub trait TenantRegistry: Send + Sync {
    async fn lookup_by_id(&self, tenant_id: &str) -> Result<RegistryTenant, RegistryError>;
    async fn lookup_by_domain(&self, domain: &str) -> Result<RegistryTenant, RegistryError>;
}

/// HTTP client for the tenants service.
pub struct HttpTenantRegistry {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTenantRegistry {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Unavailable(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    async fn fetch(&self, path: &str, key: &str) -> Result<RegistryTenant, RegistryError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(%url, "querying tenant registry");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RegistryError::Unavailable(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RegistryError::UnknownTenant(key.to_string()));
        }
        if !response.status().is_success() {
            return Err(RegistryError::Unavailable(format!(
                "registry returned {}",
                response.status()
            )));
        }

        response
            .json::<RegistryTenant>()
            .await
            .map_err(|e| RegistryError::Unavailable(format!("malformed registry response: {e}")))
    }
}

#[async_trait]
impl TenantRegistry for HttpTenantRegistry {
    async fn lookup_by_id(&self, tenant_id: &str) -> Result<RegistryTenant, RegistryError> {
        self.fetch(&format!("tenants/{tenant_id}"), tenant_id).await
    }

    async fn lookup_by_domain(&self, domain: &str) -> Result<RegistryTenant, RegistryError> {
        self.fetch(&format!("tenants/domain/{domain}"), domain).await
    }
}
