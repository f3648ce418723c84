//! Scripted stand-ins for external subsystems and the provisioner trait.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use secrecy::SecretString;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::provisioner::{
        FailurePolicy, ProvisionContext, ResourceKind, ResourceProvisioner,
    },
    application::use_cases::{
        email::{EmailRepo, MailSystem},
        virtual_host::{NewVirtualHost, VhostSpec, VirtualHostRepo, WebServerConfig},
    },
    domain::entities::{
        email::{EmailAccount, EmailDomain},
        virtual_host::VirtualHost,
    },
};

/// What a `MockProvisioner` does when invoked.
pub enum MockBehavior {
    Succeed,
    Fail(String),
    /// Signal `started`, then wait for permits on `release` before
    /// succeeding. Lets tests synchronize with a step in flight.
    Gate {
        started: Arc<tokio::sync::Notify>,
        release: Arc<tokio::sync::Semaphore>,
    },
    /// Never completes within any reasonable test timeout.
    Hang,
}

pub struct MockProvisioner {
    kind: ResourceKind,
    policy: FailurePolicy,
    behavior: MockBehavior,
    provision_calls: AtomicUsize,
    deprovision_calls: AtomicUsize,
}

impl MockProvisioner {
    pub fn new(kind: ResourceKind, policy: FailurePolicy, behavior: MockBehavior) -> Self {
        Self {
            kind,
            policy,
            behavior,
            provision_calls: AtomicUsize::new(0),
            deprovision_calls: AtomicUsize::new(0),
        }
    }

    pub fn provision_calls(&self) -> usize {
        self.provision_calls.load(Ordering::SeqCst)
    }

    pub fn deprovision_calls(&self) -> usize {
        self.deprovision_calls.load(Ordering::SeqCst)
    }

    async fn act(&self) -> AppResult<String> {
        match &self.behavior {
            MockBehavior::Succeed => Ok(format!("{} ok", self.kind)),
            MockBehavior::Fail(message) => Err(AppError::ExternalTool(message.clone())),
            MockBehavior::Gate { started, release } => {
                started.notify_one();
                release
                    .acquire()
                    .await
                    .map_err(|_| AppError::Internal("gate closed".into()))?
                    .forget();
                Ok(format!("{} ok", self.kind))
            }
            MockBehavior::Hang => {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                Ok(format!("{} ok", self.kind))
            }
        }
    }
}

#[async_trait]
impl ResourceProvisioner for MockProvisioner {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn policy(&self) -> FailurePolicy {
        self.policy
    }

    async fn provision(&self, _ctx: &ProvisionContext) -> AppResult<String> {
        self.provision_calls.fetch_add(1, Ordering::SeqCst);
        self.act().await
    }

    async fn deprovision(&self, _ctx: &ProvisionContext) -> AppResult<String> {
        self.deprovision_calls.fetch_add(1, Ordering::SeqCst);
        self.act().await
    }
}

/// In-memory implementation of VirtualHostRepo for testing.
#[derive(Default)]
pub struct InMemoryVirtualHostRepo {
    hosts: Mutex<HashMap<Uuid, VirtualHost>>,
}

impl InMemoryVirtualHostRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.hosts.lock().unwrap().len()
    }
}

#[async_trait]
impl VirtualHostRepo for InMemoryVirtualHostRepo {
    async fn create(&self, new: NewVirtualHost) -> AppResult<VirtualHost> {
        let mut hosts = self.hosts.lock().unwrap();
        if hosts.values().any(|v| v.domain == new.domain) {
            return Err(AppError::Conflict(
                "A record with this value already exists".into(),
            ));
        }
        let now = chrono::Utc::now().naive_utc();
        let vhost = VirtualHost {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            domain: new.domain,
            doc_root: new.doc_root,
            doc_root_slot: new.doc_root_slot,
            system_user: new.system_user,
            created_at: Some(now),
            updated_at: Some(now),
        };
        hosts.insert(vhost.id, vhost.clone());
        Ok(vhost)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<VirtualHost>> {
        Ok(self.hosts.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_domain(&self, domain: &str) -> AppResult<Option<VirtualHost>> {
        Ok(self
            .hosts
            .lock()
            .unwrap()
            .values()
            .find(|v| v.domain == domain)
            .cloned())
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<VirtualHost>> {
        Ok(self
            .hosts
            .lock()
            .unwrap()
            .values()
            .filter(|v| v.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.hosts
            .lock()
            .unwrap()
            .remove(&id)
            .ok_or(AppError::NotFound)?;
        Ok(())
    }
}

/// Records webserver config operations; failures can be injected per call.
#[derive(Default)]
pub struct RecordingWebServer {
    configs: Mutex<HashSet<(String, i32)>>,
    writes: AtomicUsize,
    removes: AtomicUsize,
    fail_write: Mutex<Option<String>>,
    fail_remove: Mutex<Option<String>>,
}

impl RecordingWebServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_config(&self, domain: &str, slot: i32) -> bool {
        self.configs
            .lock()
            .unwrap()
            .contains(&(domain.to_string(), slot))
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }

    pub fn fail_next_write(&self, message: &str) {
        *self.fail_write.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_next_remove(&self, message: &str) {
        *self.fail_remove.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl WebServerConfig for RecordingWebServer {
    async fn write_vhost(&self, spec: &VhostSpec) -> AppResult<String> {
        if let Some(message) = self.fail_write.lock().unwrap().take() {
            return Err(AppError::ExternalTool(message));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.configs
            .lock()
            .unwrap()
            .insert((spec.domain.clone(), spec.doc_root_slot));
        Ok(format!("vhost config for {} written", spec.domain))
    }

    async fn remove_vhost(&self, domain: &str, doc_root_slot: i32) -> AppResult<String> {
        if let Some(message) = self.fail_remove.lock().unwrap().take() {
            return Err(AppError::ExternalTool(message));
        }
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.configs
            .lock()
            .unwrap()
            .remove(&(domain.to_string(), doc_root_slot));
        Ok(format!("vhost config for {domain} removed"))
    }
}

/// In-memory implementation of EmailRepo for testing.
#[derive(Default)]
pub struct InMemoryEmailRepo {
    domains: Mutex<HashMap<Uuid, EmailDomain>>,
    accounts: Mutex<HashMap<Uuid, EmailAccount>>,
}

impl InMemoryEmailRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn domain_count(&self) -> usize {
        self.domains.lock().unwrap().len()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.lock().unwrap().len()
    }
}

#[async_trait]
impl EmailRepo for InMemoryEmailRepo {
    async fn create_domain(&self, virtual_host_id: Uuid, domain: &str) -> AppResult<EmailDomain> {
        let mut domains = self.domains.lock().unwrap();
        if domains.values().any(|d| d.domain == domain) {
            return Err(AppError::Conflict(
                "A record with this value already exists".into(),
            ));
        }
        let now = chrono::Utc::now().naive_utc();
        let record = EmailDomain {
            id: Uuid::new_v4(),
            virtual_host_id,
            domain: domain.to_string(),
            created_at: Some(now),
            updated_at: Some(now),
        };
        domains.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_domain_by_name(&self, domain: &str) -> AppResult<Option<EmailDomain>> {
        Ok(self
            .domains
            .lock()
            .unwrap()
            .values()
            .find(|d| d.domain == domain)
            .cloned())
    }

    async fn create_account(
        &self,
        email_domain_id: Uuid,
        username: &str,
        quota_mb: i64,
    ) -> AppResult<EmailAccount> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts
            .values()
            .any(|a| a.email_domain_id == email_domain_id && a.username == username)
        {
            return Err(AppError::Conflict(
                "A record with this value already exists".into(),
            ));
        }
        let now = chrono::Utc::now().naive_utc();
        let record = EmailAccount {
            id: Uuid::new_v4(),
            email_domain_id,
            username: username.to_string(),
            quota_mb,
            created_at: Some(now),
            updated_at: Some(now),
        };
        accounts.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_accounts(&self, email_domain_id: Uuid) -> AppResult<Vec<EmailAccount>> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.email_domain_id == email_domain_id)
            .cloned()
            .collect())
    }

    async fn delete_domain(&self, id: Uuid) -> AppResult<()> {
        self.domains
            .lock()
            .unwrap()
            .remove(&id)
            .ok_or(AppError::NotFound)?;
        // FK cascade.
        self.accounts
            .lock()
            .unwrap()
            .retain(|_, a| a.email_domain_id != id);
        Ok(())
    }
}

/// Records mail-system operations in call order; failures can be injected.
#[derive(Default)]
pub struct RecordingMailSystem {
    operations: Mutex<Vec<String>>,
    accounts: Mutex<HashSet<(String, String)>>,
    fail_next: Mutex<Option<String>>,
}

impl RecordingMailSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operations(&self) -> Vec<String> {
        self.operations.lock().unwrap().clone()
    }

    pub fn has_account(&self, domain: &str, username: &str) -> bool {
        self.accounts
            .lock()
            .unwrap()
            .contains(&(domain.to_string(), username.to_string()))
    }

    pub fn fail_next(&self, message: &str) {
        *self.fail_next.lock().unwrap() = Some(message.to_string());
    }

    fn check_failure(&self) -> AppResult<()> {
        if let Some(message) = self.fail_next.lock().unwrap().take() {
            return Err(AppError::ExternalTool(message));
        }
        Ok(())
    }
}

#[async_trait]
impl MailSystem for RecordingMailSystem {
    async fn create_domain(&self, domain: &str) -> AppResult<()> {
        self.check_failure()?;
        self.operations
            .lock()
            .unwrap()
            .push(format!("create_domain {domain}"));
        Ok(())
    }

    async fn create_account(
        &self,
        domain: &str,
        username: &str,
        _password: &SecretString,
        _quota_mb: i64,
    ) -> AppResult<()> {
        self.check_failure()?;
        self.operations
            .lock()
            .unwrap()
            .push(format!("create_account {username}@{domain}"));
        self.accounts
            .lock()
            .unwrap()
            .insert((domain.to_string(), username.to_string()));
        Ok(())
    }

    async fn delete_account(&self, domain: &str, username: &str) -> AppResult<()> {
        self.check_failure()?;
        self.operations
            .lock()
            .unwrap()
            .push(format!("delete_account {username}@{domain}"));
        self.accounts
            .lock()
            .unwrap()
            .remove(&(domain.to_string(), username.to_string()));
        Ok(())
    }

    async fn delete_domain(&self, domain: &str) -> AppResult<()> {
        self.check_failure()?;
        self.operations
            .lock()
            .unwrap()
            .push(format!("delete_domain {domain}"));
        Ok(())
    }
}
