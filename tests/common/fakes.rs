#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use warden_identity::events::{EventPublisher, IdentityEvent};
use warden_identity::roles::Role;
use warden_identity::store::{StoreError, User, UserStore, UserStoreFactory};
use warden_identity::tenant::{RegistryError, RegistryTenant, TenantContext, TenantRegistry};

/// Scriptable tenant registry that counts upstream calls.
pub struct FakeRegistry {
    tenants: Mutex<HashMap<String, RegistryTenant>>,
    domains: Mutex<HashMap<String, String>>,
    calls: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

impl FakeRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tenants: Mutex::new(HashMap::new()),
            domains: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            delay: Mutex::new(None),
        })
    }

    pub async fn add_tenant(
        &self,
        tenant_id: &str,
        domain: &str,
        password: &str,
        organization: &str,
        enabled: bool,
    ) {
        self.tenants.lock().await.insert(
            tenant_id.to_string(),
            RegistryTenant::new(tenant_id, password, organization, enabled),
        );
        self.domains
            .lock()
            .await
            .insert(domain.to_string(), tenant_id.to_string());
    }

    /// Simulates a credential rotation on the registry side.
    pub async fn set_password(&self, tenant_id: &str, password: &str) {
        if let Some(tenant) = self.tenants.lock().await.get_mut(tenant_id) {
            tenant.database_password = password.to_string();
        }
    }

    /// Adds upstream latency, for single-flight tests.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.lock().await = Some(delay);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        if let Some(delay) = *self.delay.lock().await {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl TenantRegistry for FakeRegistry {
    async fn lookup_by_id(&self, tenant_id: &str) -> Result<RegistryTenant, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.tenants
            .lock()
            .await
            .get(tenant_id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownTenant(tenant_id.to_string()))
    }

    async fn lookup_by_domain(&self, domain: &str) -> Result<RegistryTenant, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        let tenant_id = self
            .domains
            .lock()
            .await
            .get(domain)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownTenant(domain.to_string()))?;
        self.tenants
            .lock()
            .await
            .get(&tenant_id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownTenant(domain.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Create,
    Update,
    Delete,
    AddRole,
    RemoveRole,
}

struct FailRule {
    op: StoreOp,
    user_id: Uuid,
    role: Option<Role>,
    remaining: usize,
}

#[derive(Default)]
struct StoreState {
    users: HashMap<Uuid, User>,
    roles: HashMap<Uuid, Vec<Role>>,
    fail_rules: Vec<FailRule>,
}

impl StoreState {
    fn should_fail(&mut self, op: StoreOp, user_id: Uuid, role: Option<Role>) -> bool {
        for rule in self.fail_rules.iter_mut() {
            if rule.op == op
                && rule.user_id == user_id
                && (rule.role.is_none() || rule.role == role)
                && rule.remaining > 0
            {
                rule.remaining -= 1;
                return true;
            }
        }
        false
    }
}

/// In-memory user store with failure injection and mutation counting.
/// Role membership mutations are independent commits, like the real store.
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    mutations: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(StoreState::default()),
            mutations: AtomicUsize::new(0),
        })
    }

    pub async fn seed_user(&self, tenant_id: &str, email: &str, role: Role) -> Uuid {
        let local = email.split('@').next().unwrap_or("user");
        let user = User {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            first_name: local.to_string(),
            last_name: "Tester".to_string(),
            tenant_id: tenant_id.to_string(),
            authorized_projects: Vec::new(),
            email_confirmed: true,
        };
        let user_id = user.user_id;
        let mut state = self.state.lock().await;
        state.users.insert(user_id, user);
        state.roles.insert(user_id, vec![role]);
        user_id
    }

    /// Corrupts a user with an extra membership, for integrity tests.
    pub async fn seed_extra_role(&self, user_id: Uuid, role: Role) {
        self.state
            .lock()
            .await
            .roles
            .entry(user_id)
            .or_default()
            .push(role);
    }

    /// Fails the next matching operation once, then lets it pass.
    pub async fn fail_once(&self, op: StoreOp, user_id: Uuid, role: Role) {
        self.state.lock().await.fail_rules.push(FailRule {
            op,
            user_id,
            role: Some(role),
            remaining: 1,
        });
    }

    pub async fn roles_of(&self, user_id: Uuid) -> Vec<Role> {
        self.state
            .lock()
            .await
            .roles
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn find_user(&self, user_id: Uuid) -> Option<User> {
        self.state.lock().await.users.get(&user_id).cloned()
    }

    pub async fn user_exists(&self, email: &str) -> bool {
        self.state
            .lock()
            .await
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(email))
    }

    pub async fn apex_count(&self) -> usize {
        self.state
            .lock()
            .await
            .roles
            .values()
            .filter(|roles| roles.contains(&Role::PrimaryOwner))
            .count()
    }

    /// Attempted mutation calls, successful or not.
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn create(&self, user: &User) -> Result<(), StoreError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        if state.should_fail(StoreOp::Create, user.user_id, None) {
            return Err(StoreError::Unavailable("injected create failure".to_string()));
        }
        if state
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::DuplicateEmail(user.email.clone()));
        }
        state.users.insert(user.user_id, user.clone());
        state.roles.entry(user.user_id).or_default();
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        if state.should_fail(StoreOp::Update, user.user_id, None) {
            return Err(StoreError::Unavailable("injected update failure".to_string()));
        }
        if !state.users.contains_key(&user.user_id) {
            return Err(StoreError::RowNotFound);
        }
        state.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn delete(&self, user_id: Uuid) -> Result<(), StoreError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        if state.should_fail(StoreOp::Delete, user_id, None) {
            return Err(StoreError::Unavailable("injected delete failure".to_string()));
        }
        if state.users.remove(&user_id).is_none() {
            return Err(StoreError::RowNotFound);
        }
        state.roles.remove(&user_id);
        Ok(())
    }

    async fn add_role(&self, user_id: Uuid, role: Role) -> Result<(), StoreError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        if state.should_fail(StoreOp::AddRole, user_id, Some(role)) {
            return Err(StoreError::Unavailable("injected add_role failure".to_string()));
        }
        state.roles.entry(user_id).or_default().push(role);
        Ok(())
    }

    async fn remove_role(&self, user_id: Uuid, role: Role) -> Result<(), StoreError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        if state.should_fail(StoreOp::RemoveRole, user_id, Some(role)) {
            return Err(StoreError::Unavailable(
                "injected remove_role failure".to_string(),
            ));
        }
        let roles = state.roles.entry(user_id).or_default();
        match roles.iter().position(|r| *r == role) {
            Some(index) => {
                roles.remove(index);
                Ok(())
            }
            None => Err(StoreError::RowNotFound),
        }
    }

    async fn list_roles(&self, user_id: Uuid) -> Result<Vec<Role>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .roles
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Factory handing every tenant the same shared in-memory store.
pub struct SharedStoreFactory {
    store: Arc<InMemoryStore>,
}

impl SharedStoreFactory {
    pub fn new(store: Arc<InMemoryStore>) -> Arc<Self> {
        Arc::new(Self { store })
    }
}

#[async_trait]
impl UserStoreFactory for SharedStoreFactory {
    async fn open(&self, _ctx: &TenantContext) -> Result<Arc<dyn UserStore>, StoreError> {
        Ok(self.store.clone())
    }
}

/// Captures published events for assertions.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<IdentityEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn events(&self) -> Vec<IdentityEvent> {
        self.events.lock().await.clone()
    }

    pub async fn transfer_completions(&self) -> usize {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| matches!(e, IdentityEvent::PrimaryOwnershipTransferred { .. }))
            .count()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: IdentityEvent) {
        self.events.lock().await.push(event);
    }
}
