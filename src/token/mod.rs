use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Purpose every ownership-transfer token is bound to.
pub const TRANSFER_PURPOSE: &str = "primary-owner-transfer";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("token secret is empty")]
    EmptySecret,

    #[error("token lifetime is out of range")]
    InvalidLifetime,
}

/// Opaque, single-purpose, time-bounded credentials bound to one principal
/// in one tenant. Verification consumes: a token that verifies once never
/// verifies again.
#[async_trait]
pub trait TransferTokens: Send + Sync {
    async fn issue(&self, tenant_id: &str, principal: Uuid, purpose: &str)
        -> Result<String, TokenError>;
    async fn verify(&self, tenant_id: &str, principal: Uuid, purpose: &str, token: &str) -> bool;
}

#[derive(Debug, Serialize, Deserialize)]
struct TransferClaims {
    sub: Uuid,
    tid: String,
    purpose: String,
    jti: Uuid,
    iat: i64,
    exp: i64,
}

/// HMAC claims-token provider. Replay protection retires each redeemed
/// token id until its expiry passes; expired ids are pruned on redemption,
/// so the retired set stays bounded by the issue rate within one lifetime.
pub struct JwtTransferTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    /// Redeemed token id -> expiry timestamp.
    redeemed: RwLock<HashMap<Uuid, i64>>,
}

impl JwtTransferTokens {
    pub fn new(secret: &str, ttl: Duration) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        if ttl.as_secs() == 0 {
            return Err(TokenError::InvalidLifetime);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            redeemed: RwLock::new(HashMap::new()),
        })
    }
}

#[async_trait]
impl TransferTokens for JwtTransferTokens {
    async fn issue(
        &self,
        tenant_id: &str,
        principal: Uuid,
        purpose: &str,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = TransferClaims {
            sub: principal,
            tid: tenant_id.to_string(),
            purpose: purpose.to_string(),
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: now.timestamp() + self.ttl.as_secs() as i64,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        debug!(tenant_id, token = %fingerprint(&token), "transfer token issued");
        Ok(token)
    }

    async fn verify(&self, tenant_id: &str, principal: Uuid, purpose: &str, token: &str) -> bool {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = match decode::<TransferClaims>(token, &self.decoding, &validation) {
            Ok(data) => data,
            Err(err) => {
                debug!(token = %fingerprint(token), "transfer token rejected: {err}");
                return false;
            }
        };

        let claims = data.claims;
        if claims.sub != principal || claims.tid != tenant_id || claims.purpose != purpose {
            debug!(token = %fingerprint(token), "transfer token bound to a different principal");
            return false;
        }

        // Retire under the write lock so concurrent redeems cannot both pass.
        let now = Utc::now().timestamp();
        let mut redeemed = self.redeemed.write().await;
        redeemed.retain(|_, expiry| *expiry > now);
        if redeemed.insert(claims.jti, claims.exp).is_some() {
            debug!(token = %fingerprint(token), "transfer token replayed");
            return false;
        }
        true
    }
}

/// Log-safe reference to a token; raw tokens never reach the logs.
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let hex = format!("{digest:x}");
    hex[..12].to_string()
}
