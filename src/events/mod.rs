use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::roles::Role;

/// Announcements published after an operation fully commits. Nothing here
/// is published for a partial or compensated outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IdentityEvent {
    TransferTokenGenerated {
        tenant_id: String,
        owner_id: Uuid,
        /// Raw token, for delivery over an out-of-band channel.
        token: String,
    },
    PrimaryOwnershipTransferred {
        tenant_id: String,
        previous_owner_id: Uuid,
        new_owner_id: Uuid,
    },
    UserCreated {
        tenant_id: String,
        user_id: Uuid,
        email: String,
        role: Role,
    },
    UserDeleted {
        tenant_id: String,
        user_id: Uuid,
        email: String,
        commanding_email: String,
    },
    AccountDeleted {
        tenant_id: String,
        user_id: Uuid,
        email: String,
    },
    UserRoleUpdated {
        tenant_id: String,
        user_id: Uuid,
        email: String,
        role: Role,
    },
    UserPermissionsUpdated {
        tenant_id: String,
        user_id: Uuid,
        authorized_projects: Vec<Uuid>,
    },
}

/// Fire-and-forget announcement sink. At most once from the caller's
/// perspective; delivery guarantees are the bus's concern.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: IdentityEvent);
}

/// Emits events as structured log lines, for deployments without a bus
/// attached.
pub struct TracingPublisher;

#[async_trait]
impl EventPublisher for TracingPublisher {
    async fn publish(&self, event: IdentityEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => info!(target: "warden_identity::events", %payload, "event published"),
            Err(err) => warn!("failed to serialize event: {err}"),
        }
    }
}
