#![allow(dead_code)]

pub mod fakes;

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use warden_identity::roles::Role;
use warden_identity::saga::OwnershipTransferSaga;
use warden_identity::services::AccountService;
use warden_identity::tenant::TenantResolver;
use warden_identity::token::JwtTransferTokens;

use fakes::{FakeRegistry, InMemoryStore, RecordingPublisher, SharedStoreFactory};

pub const TENANT: &str = "acme";
pub const DOMAIN: &str = "acme.example.io";
pub const PASSWORD: &str = "pg-acme-s3cret";

/// Everything wired together against the in-memory fakes.
pub struct Harness {
    pub registry: Arc<FakeRegistry>,
    pub store: Arc<InMemoryStore>,
    pub publisher: Arc<RecordingPublisher>,
    pub resolver: Arc<TenantResolver>,
    pub tokens: Arc<JwtTransferTokens>,
    pub saga: Arc<OwnershipTransferSaga>,
    pub accounts: AccountService,
}

pub async fn harness() -> Harness {
    harness_with_ttl(Duration::from_secs(3600)).await
}

pub async fn harness_with_ttl(credential_ttl: Duration) -> Harness {
    let registry = FakeRegistry::new();
    registry
        .add_tenant(TENANT, DOMAIN, PASSWORD, "Acme Corp", true)
        .await;

    let store = InMemoryStore::new();
    let publisher = RecordingPublisher::new();
    let resolver = Arc::new(TenantResolver::new(registry.clone(), credential_ttl));
    let tokens = Arc::new(
        JwtTransferTokens::new("integration-test-secret", Duration::from_secs(3600))
            .expect("token provider"),
    );
    let factory = SharedStoreFactory::new(store.clone());
    let saga = Arc::new(OwnershipTransferSaga::new(
        resolver.clone(),
        factory.clone(),
        tokens.clone(),
        publisher.clone(),
    ));
    let accounts = AccountService::new(resolver.clone(), factory, publisher.clone());

    Harness {
        registry,
        store,
        publisher,
        resolver,
        tokens,
        saga,
        accounts,
    }
}

/// Standard cast for the acme tenant.
pub struct AcmeUsers {
    /// Primary owner.
    pub alice: Uuid,
    /// Plain user, usual transfer target.
    pub bob: Uuid,
    /// Owner.
    pub carol: Uuid,
    /// Admin.
    pub erin: Uuid,
    /// Plain user.
    pub dave: Uuid,
}

pub async fn seed_acme(store: &InMemoryStore) -> AcmeUsers {
    AcmeUsers {
        alice: store.seed_user(TENANT, "alice@acme.io", Role::PrimaryOwner).await,
        bob: store.seed_user(TENANT, "bob@acme.io", Role::User).await,
        carol: store.seed_user(TENANT, "carol@acme.io", Role::Owner).await,
        erin: store.seed_user(TENANT, "erin@acme.io", Role::Admin).await,
        dave: store.seed_user(TENANT, "dave@acme.io", Role::User).await,
    }
}
