use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use secrecy::SecretString;
use tracing::instrument;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::ports::provisioner::{
    FailurePolicy, ProvisionContext, ResourceKind, ResourceProvisioner, StepAction, StepStatus,
};
use crate::application::use_cases::signup::{SignupProfile, SignupRepo};
use crate::application::validators::system_username_for_domain;
use crate::domain::entities::notification::{Notification, NotificationKind};
use crate::domain::entities::signup_request::{ProvisionOutcome, SignupStatus};
use crate::domain::entities::ssl_certificate::{
    CertAction, CertOutcome, SslCertificate, SslCertificateLogEntry,
};
use crate::infra::crypto::SecretVault;
use crate::infra::notify::NotificationHub;

#[derive(Debug, Clone)]
pub struct ProvisionLogEntry {
    pub id: Uuid,
    pub request_id: Uuid,
    pub step: ResourceKind,
    pub action: StepAction,
    pub status: StepStatus,
    pub message: String,
    pub created_at: Option<NaiveDateTime>,
}

/// Append-only audit trail of provisioning steps; the source of truth for
/// what exists after a partial run. Entries are never updated or deleted.
#[async_trait]
pub trait ProvisionLogRepo: Send + Sync {
    async fn append(
        &self,
        request_id: Uuid,
        step: ResourceKind,
        action: StepAction,
        status: StepStatus,
        message: &str,
    ) -> AppResult<()>;
    async fn list_for_request(&self, request_id: Uuid) -> AppResult<Vec<ProvisionLogEntry>>;
}

/// Certificate state plus its append-only issuance log.
#[async_trait]
pub trait SslCertificateRepo: Send + Sync {
    /// Returns the existing certificate for the domain or creates a pending
    /// one; one certificate per domain.
    async fn ensure_pending(&self, domain: &str) -> AppResult<SslCertificate>;
    async fn get_by_domain(&self, domain: &str) -> AppResult<Option<SslCertificate>>;
    async fn mark_active(
        &self,
        id: Uuid,
        issued_at: NaiveDateTime,
        expires_at: NaiveDateTime,
    ) -> AppResult<SslCertificate>;
    async fn mark_revoked(&self, id: Uuid) -> AppResult<()>;
    async fn append_log(
        &self,
        certificate_id: Uuid,
        action: CertAction,
        outcome: CertOutcome,
        message: &str,
    ) -> AppResult<()>;
    async fn list_log(&self, certificate_id: Uuid) -> AppResult<Vec<SslCertificateLogEntry>>;
}

/// Fixed, dependency-respecting step order for a request. Empty when no
/// feature was selected: nothing to create, nothing to attempt.
pub fn step_plan(signup: &SignupProfile) -> Vec<ResourceKind> {
    if signup.features.is_empty() {
        return Vec::new();
    }
    // The Linux account must exist before the webserver, mail and database
    // steps; quota runs last against the created account.
    let mut plan = vec![ResourceKind::LinuxAccount, ResourceKind::WebServer];
    if signup.wants_dns() {
        plan.push(ResourceKind::DnsZone);
    }
    if signup.wants_ssl() {
        plan.push(ResourceKind::Ssl);
    }
    if signup.email_request().is_some() {
        plan.push(ResourceKind::Mail);
    }
    if signup.database_request().is_some() {
        plan.push(ResourceKind::Database);
    }
    plan.push(ResourceKind::Quota);
    plan
}

pub struct ProvisioningUseCases {
    signups: Arc<dyn SignupRepo>,
    log: Arc<dyn ProvisionLogRepo>,
    vault: Arc<SecretVault>,
    provisioners: Vec<Arc<dyn ResourceProvisioner>>,
    hub: Arc<NotificationHub>,
    step_timeout: Duration,
    /// At-most-one concurrent orchestration per request id.
    active: Mutex<HashSet<Uuid>>,
    cancel_requested: Mutex<HashSet<Uuid>>,
}

/// Releases the per-request exclusion token when the run ends, however it
/// ends.
struct RunGuard<'a> {
    orchestrator: &'a ProvisioningUseCases,
    request_id: Uuid,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator
            .active
            .lock()
            .unwrap()
            .remove(&self.request_id);
        self.orchestrator
            .cancel_requested
            .lock()
            .unwrap()
            .remove(&self.request_id);
    }
}

impl ProvisioningUseCases {
    pub fn new(
        signups: Arc<dyn SignupRepo>,
        log: Arc<dyn ProvisionLogRepo>,
        vault: Arc<SecretVault>,
        provisioners: Vec<Arc<dyn ResourceProvisioner>>,
        hub: Arc<NotificationHub>,
        step_timeout: Duration,
    ) -> Self {
        Self {
            signups,
            log,
            vault,
            provisioners,
            hub,
            step_timeout,
            active: Mutex::new(HashSet::new()),
            cancel_requested: Mutex::new(HashSet::new()),
        }
    }

    fn begin(&self, request_id: Uuid) -> AppResult<RunGuard<'_>> {
        let mut active = self.active.lock().unwrap();
        if !active.insert(request_id) {
            return Err(AppError::Conflict(
                "Provisioning is already running for this request".into(),
            ));
        }
        // A stale cancel flag from an earlier run must not cancel this one.
        self.cancel_requested.lock().unwrap().remove(&request_id);
        Ok(RunGuard {
            orchestrator: self,
            request_id,
        })
    }

    /// Request cancellation of a running orchestration. The step currently
    /// in flight is not preempted; only subsequent steps are prevented.
    pub fn cancel(&self, request_id: Uuid) -> AppResult<()> {
        if !self.active.lock().unwrap().contains(&request_id) {
            return Err(AppError::Conflict(
                "No provisioning in progress for this request".into(),
            ));
        }
        self.cancel_requested.lock().unwrap().insert(request_id);
        Ok(())
    }

    fn is_cancelled(&self, request_id: Uuid) -> bool {
        self.cancel_requested.lock().unwrap().contains(&request_id)
    }

    pub async fn audit_log(&self, request_id: Uuid) -> AppResult<Vec<ProvisionLogEntry>> {
        self.log.list_for_request(request_id).await
    }

    /// Drive one provisioning attempt for an approved request. Safe to call
    /// again for the same id after a partial run: every provisioner treats
    /// an already-existing resource as success. The orchestrator itself
    /// never retries.
    #[instrument(skip(self))]
    pub async fn run(&self, request_id: Uuid) -> AppResult<ProvisionOutcome> {
        let _guard = self.begin(request_id)?;

        let signup = self
            .signups
            .get_by_id(request_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if signup.status != SignupStatus::Approved {
            return Err(AppError::Conflict(
                "Only approved requests can be provisioned".into(),
            ));
        }

        let plan = step_plan(&signup);
        if plan.is_empty() {
            self.signups
                .set_outcome(request_id, ProvisionOutcome::FullyProvisioned)
                .await?;
            self.notify(&signup, ProvisionOutcome::FullyProvisioned, &[], &[]);
            return Ok(ProvisionOutcome::FullyProvisioned);
        }

        // Decrypt stored credentials. The server password backs the first
        // (fatal) step, so an undecryptable token ends the run as partial —
        // recorded, never skipped.
        let server_password = match self.vault.decrypt(&signup.server_password_encrypted) {
            Ok(p) => SecretString::new(p.into()),
            Err(AppError::Crypto) => {
                self.log
                    .append(
                        request_id,
                        ResourceKind::LinuxAccount,
                        StepAction::Create,
                        StepStatus::Failed,
                        "stored server credential cannot be decrypted",
                    )
                    .await?;
                self.signups
                    .set_outcome(request_id, ProvisionOutcome::PartiallyProvisioned)
                    .await?;
                self.notify(&signup, ProvisionOutcome::PartiallyProvisioned, &[], &plan);
                return Ok(ProvisionOutcome::PartiallyProvisioned);
            }
            Err(e) => return Err(e),
        };

        let email_secret = signup
            .email_request()
            .map(|r| self.vault.decrypt(&r.password_encrypted));
        let database_secret = signup
            .database_request()
            .map(|r| self.vault.decrypt(&r.password_encrypted));
        let email_secret_failed = matches!(email_secret, Some(Err(_)));
        let database_secret_failed = matches!(database_secret, Some(Err(_)));

        let ctx = ProvisionContext {
            request_id,
            user_id: signup.user_id,
            domain: signup.domain.clone(),
            system_user: system_username_for_domain(&signup.domain),
            doc_root_slot: 0,
            server_password,
            storage_quota_mb: signup.storage_quota_mb,
            features: signup.features.clone(),
            email_password: email_secret
                .and_then(|r| r.ok())
                .map(|p| SecretString::new(p.into())),
            database_password: database_secret
                .and_then(|r| r.ok())
                .map(|p| SecretString::new(p.into())),
        };

        let mut granted: Vec<ResourceKind> = Vec::new();
        let mut not_granted: Vec<ResourceKind> = Vec::new();
        let mut fatal_failure = false;
        let mut cancelled = false;

        for (idx, kind) in plan.iter().copied().enumerate() {
            if self.is_cancelled(request_id) {
                cancelled = true;
                not_granted.extend(&plan[idx..]);
                break;
            }

            let Some(provisioner) = self.provisioners.iter().find(|p| p.kind() == kind) else {
                return Err(AppError::Internal(format!(
                    "no provisioner registered for {kind}"
                )));
            };

            // A feature whose credential failed to decrypt fails here,
            // before its provisioner runs — reported, not skipped.
            let secret_failed = (kind == ResourceKind::Mail && email_secret_failed)
                || (kind == ResourceKind::Database && database_secret_failed);

            let step_result: Result<String, String> = if secret_failed {
                Err("stored credential cannot be decrypted".into())
            } else {
                match tokio::time::timeout(self.step_timeout, provisioner.provision(&ctx)).await {
                    Ok(Ok(message)) => Ok(message),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!(
                        "step timed out after {}s",
                        self.step_timeout.as_secs()
                    )),
                }
            };

            match step_result {
                Ok(message) => {
                    self.log
                        .append(request_id, kind, StepAction::Create, StepStatus::Success, &message)
                        .await?;
                    granted.push(kind);
                }
                Err(message) => {
                    tracing::warn!(
                        request_id = %request_id,
                        step = %kind,
                        error = %message,
                        "Provisioning step failed"
                    );
                    self.log
                        .append(request_id, kind, StepAction::Create, StepStatus::Failed, &message)
                        .await?;
                    not_granted.push(kind);
                    if provisioner.policy() == FailurePolicy::Fatal {
                        fatal_failure = true;
                        not_granted.extend(&plan[idx + 1..]);
                        break;
                    }
                }
            }
        }

        let outcome = if cancelled {
            ProvisionOutcome::Cancelled
        } else if fatal_failure {
            ProvisionOutcome::PartiallyProvisioned
        } else {
            // Best-effort failures alone do not demote the aggregate; every
            // fatal-class step succeeded.
            ProvisionOutcome::FullyProvisioned
        };

        self.signups.set_outcome(request_id, outcome).await?;
        self.notify(&signup, outcome, &granted, &not_granted);
        Ok(outcome)
    }

    /// Outcome notification for the requester. Capability names only —
    /// no tool output, no secrets.
    fn notify(
        &self,
        signup: &SignupProfile,
        outcome: ProvisionOutcome,
        granted: &[ResourceKind],
        not_granted: &[ResourceKind],
    ) {
        let (kind, title) = match outcome {
            ProvisionOutcome::FullyProvisioned => (
                NotificationKind::ProvisioningComplete,
                "Hosting account provisioned",
            ),
            ProvisionOutcome::PartiallyProvisioned => (
                NotificationKind::ProvisioningPartial,
                "Hosting account partially provisioned",
            ),
            ProvisionOutcome::Cancelled => (
                NotificationKind::ProvisioningCancelled,
                "Provisioning cancelled",
            ),
        };

        let names = |kinds: &[ResourceKind]| {
            kinds
                .iter()
                .map(|k| k.as_ref().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut body = format!("Domain {}.", signup.domain);
        if !granted.is_empty() {
            body.push_str(&format!(" Provisioned: {}.", names(granted)));
        }
        if !not_granted.is_empty() {
            body.push_str(&format!(" Not provisioned: {}.", names(not_granted)));
        }

        self.hub
            .publish(&Notification::to_user(signup.user_id, kind, title, &body));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        InMemoryProvisionLog, InMemorySignupRepo, MockBehavior, MockProvisioner, test_signup,
        test_vault,
    };

    struct Harness {
        orchestrator: ProvisioningUseCases,
        signups: Arc<InMemorySignupRepo>,
        log: Arc<InMemoryProvisionLog>,
        hub: Arc<NotificationHub>,
        vault: Arc<SecretVault>,
        mocks: Vec<Arc<MockProvisioner>>,
    }

    fn harness(mocks: Vec<Arc<MockProvisioner>>) -> Harness {
        let signups = Arc::new(InMemorySignupRepo::new());
        let log = Arc::new(InMemoryProvisionLog::new());
        let hub = Arc::new(NotificationHub::new());
        let vault = Arc::new(test_vault());
        let provisioners: Vec<Arc<dyn ResourceProvisioner>> = mocks
            .iter()
            .map(|m| m.clone() as Arc<dyn ResourceProvisioner>)
            .collect();
        let orchestrator = ProvisioningUseCases::new(
            signups.clone(),
            log.clone(),
            vault.clone(),
            provisioners,
            hub.clone(),
            Duration::from_secs(5),
        );
        Harness {
            orchestrator,
            signups,
            log,
            hub,
            vault,
            mocks,
        }
    }

    fn ok_mock(kind: ResourceKind, policy: FailurePolicy) -> Arc<MockProvisioner> {
        Arc::new(MockProvisioner::new(kind, policy, MockBehavior::Succeed))
    }

    fn full_ok_set() -> Vec<Arc<MockProvisioner>> {
        vec![
            ok_mock(ResourceKind::LinuxAccount, FailurePolicy::Fatal),
            ok_mock(ResourceKind::WebServer, FailurePolicy::Fatal),
            ok_mock(ResourceKind::DnsZone, FailurePolicy::Fatal),
            ok_mock(ResourceKind::Ssl, FailurePolicy::Fatal),
            ok_mock(ResourceKind::Mail, FailurePolicy::Fatal),
            ok_mock(ResourceKind::Database, FailurePolicy::Fatal),
            ok_mock(ResourceKind::Quota, FailurePolicy::BestEffort),
        ]
    }

    #[tokio::test]
    async fn no_features_means_zero_steps_and_full_outcome() {
        let h = harness(full_ok_set());
        let signup = h
            .signups
            .seed(test_signup(&h.vault, |s| s.features.clear()))
            .await;
        let queue = h.hub.acquire(signup.user_id);

        let outcome = h.orchestrator.run(signup.id).await.unwrap();

        assert_eq!(outcome, ProvisionOutcome::FullyProvisioned);
        assert!(h.log.entries_for(signup.id).is_empty());
        for mock in &h.mocks {
            assert_eq!(mock.provision_calls(), 0);
        }
        let n = queue.try_recv().unwrap();
        assert_eq!(n.kind, NotificationKind::ProvisioningComplete);
    }

    #[tokio::test]
    async fn ssl_tool_failure_is_fatal_and_yields_partial_outcome() {
        // The end-to-end scenario: linux ok, vhost ok, ssl fails (tool
        // unavailable), quota never attempted.
        let mocks = vec![
            ok_mock(ResourceKind::LinuxAccount, FailurePolicy::Fatal),
            ok_mock(ResourceKind::WebServer, FailurePolicy::Fatal),
            Arc::new(MockProvisioner::new(
                ResourceKind::Ssl,
                FailurePolicy::Fatal,
                MockBehavior::Fail("certificate tool unavailable".into()),
            )),
            ok_mock(ResourceKind::Quota, FailurePolicy::BestEffort),
        ];
        let h = harness(mocks);
        let signup = h.signups.seed(test_signup(&h.vault, |_| {})).await;
        let queue = h.hub.acquire(signup.user_id);

        let outcome = h.orchestrator.run(signup.id).await.unwrap();
        assert_eq!(outcome, ProvisionOutcome::PartiallyProvisioned);

        let entries = h.log.entries_for(signup.id);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].step, ResourceKind::LinuxAccount);
        assert_eq!(entries[0].status, StepStatus::Success);
        assert_eq!(entries[1].step, ResourceKind::WebServer);
        assert_eq!(entries[1].status, StepStatus::Success);
        assert_eq!(entries[2].step, ResourceKind::Ssl);
        assert_eq!(entries[2].status, StepStatus::Failed);

        // Quota was after the fatal failure and never ran.
        assert_eq!(h.mocks[3].provision_calls(), 0);

        let n = queue.try_recv().unwrap();
        assert_eq!(n.kind, NotificationKind::ProvisioningPartial);
        assert!(n.body.contains("ssl"));
        assert!(!n.body.contains("certificate tool unavailable"));

        let stored = h.signups.get_by_id(signup.id).await.unwrap().unwrap();
        assert_eq!(stored.outcome, Some(ProvisionOutcome::PartiallyProvisioned));
        assert_eq!(stored.status, SignupStatus::Approved, "status never reopens");
    }

    #[tokio::test]
    async fn best_effort_quota_failure_keeps_full_outcome() {
        let mocks = vec![
            ok_mock(ResourceKind::LinuxAccount, FailurePolicy::Fatal),
            ok_mock(ResourceKind::WebServer, FailurePolicy::Fatal),
            ok_mock(ResourceKind::DnsZone, FailurePolicy::Fatal),
            Arc::new(MockProvisioner::new(
                ResourceKind::Quota,
                FailurePolicy::BestEffort,
                MockBehavior::Fail("quota tooling unavailable".into()),
            )),
        ];
        let h = harness(mocks);
        let signup = h
            .signups
            .seed(test_signup(&h.vault, |s| {
                s.features = vec![crate::domain::entities::signup_request::FeatureRequest::Dns];
            }))
            .await;

        let outcome = h.orchestrator.run(signup.id).await.unwrap();
        assert_eq!(outcome, ProvisionOutcome::FullyProvisioned);

        let entries = h.log.entries_for(signup.id);
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[3].step, ResourceKind::Quota);
        assert_eq!(entries[3].status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn undecryptable_server_credential_is_reported_not_skipped() {
        let h = harness(full_ok_set());
        let signup = h
            .signups
            .seed(test_signup(&h.vault, |s| {
                s.server_password_encrypted = "not-a-vault-token".into();
            }))
            .await;
        let queue = h.hub.acquire(signup.user_id);

        let outcome = h.orchestrator.run(signup.id).await.unwrap();
        assert_eq!(outcome, ProvisionOutcome::PartiallyProvisioned);

        let entries = h.log.entries_for(signup.id);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, StepStatus::Failed);
        assert!(entries[0].message.contains("cannot be decrypted"));

        for mock in &h.mocks {
            assert_eq!(mock.provision_calls(), 0);
        }
        assert_eq!(
            queue.try_recv().unwrap().kind,
            NotificationKind::ProvisioningPartial
        );
    }

    #[tokio::test]
    async fn undecryptable_mailbox_credential_fails_the_mail_step() {
        let h = harness(full_ok_set());
        let signup = h
            .signups
            .seed(test_signup(&h.vault, |s| {
                use crate::domain::entities::signup_request::*;
                s.features = vec![FeatureRequest::Email(EmailAccountRequest {
                    username: "info".into(),
                    quota_mb: 512,
                    password_encrypted: "garbage".into(),
                })];
            }))
            .await;

        let outcome = h.orchestrator.run(signup.id).await.unwrap();
        assert_eq!(outcome, ProvisionOutcome::PartiallyProvisioned);

        let entries = h.log.entries_for(signup.id);
        // linux + web succeed, mail fails on the credential, quota not run.
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].step, ResourceKind::Mail);
        assert_eq!(entries[2].status, StepStatus::Failed);
        assert!(entries[2].message.contains("cannot be decrypted"));

        // The mail provisioner itself never ran.
        let mail_mock = h
            .mocks
            .iter()
            .find(|m| m.kind() == ResourceKind::Mail)
            .unwrap();
        assert_eq!(mail_mock.provision_calls(), 0);
    }

    #[tokio::test]
    async fn rerun_after_partial_is_allowed_and_idempotent() {
        let h = harness(full_ok_set());
        let signup = h.signups.seed(test_signup(&h.vault, |_| {})).await;

        let first = h.orchestrator.run(signup.id).await.unwrap();
        let second = h.orchestrator.run(signup.id).await.unwrap();
        assert_eq!(first, ProvisionOutcome::FullyProvisioned);
        assert_eq!(second, ProvisionOutcome::FullyProvisioned);

        // Each step ran once per attempt; idempotency lives in the
        // provisioners, the orchestrator never skips or doubles steps.
        let linux = h
            .mocks
            .iter()
            .find(|m| m.kind() == ResourceKind::LinuxAccount)
            .unwrap();
        assert_eq!(linux.provision_calls(), 2);
    }

    #[tokio::test]
    async fn pending_requests_cannot_be_provisioned() {
        let h = harness(full_ok_set());
        let signup = h
            .signups
            .seed(test_signup(&h.vault, |s| {
                s.status = SignupStatus::Pending;
                s.approved_by = None;
                s.approved_at = None;
            }))
            .await;
        assert!(matches!(
            h.orchestrator.run(signup.id).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_runs_of_the_same_request_conflict() {
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let started = Arc::new(tokio::sync::Notify::new());
        let mut mocks = full_ok_set();
        mocks[0] = Arc::new(MockProvisioner::new(
            ResourceKind::LinuxAccount,
            FailurePolicy::Fatal,
            MockBehavior::Gate {
                started: started.clone(),
                release: gate.clone(),
            },
        ));
        let h = Arc::new(harness(mocks));
        let signup = h.signups.seed(test_signup(&h.vault, |_| {})).await;

        let h2 = h.clone();
        let id = signup.id;
        let task = tokio::spawn(async move { h2.orchestrator.run(id).await });

        // Wait until the first run is inside its first step.
        started.notified().await;
        assert!(matches!(
            h.orchestrator.run(signup.id).await,
            Err(AppError::Conflict(_))
        ));

        gate.add_permits(100);
        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, ProvisionOutcome::FullyProvisioned);

        // Guard released: a later explicit retry is fine again.
        assert!(h.orchestrator.run(signup.id).await.is_ok());
    }

    #[tokio::test]
    async fn cancellation_stops_before_the_next_step() {
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let started = Arc::new(tokio::sync::Notify::new());
        let mut mocks = full_ok_set();
        mocks[1] = Arc::new(MockProvisioner::new(
            ResourceKind::WebServer,
            FailurePolicy::Fatal,
            MockBehavior::Gate {
                started: started.clone(),
                release: gate.clone(),
            },
        ));
        let h = Arc::new(harness(mocks));
        let signup = h.signups.seed(test_signup(&h.vault, |_| {})).await;
        let queue = h.hub.acquire(signup.user_id);

        let h2 = h.clone();
        let id = signup.id;
        let task = tokio::spawn(async move { h2.orchestrator.run(id).await });

        // Cancel while the web step is in flight; that step completes, the
        // rest never start.
        started.notified().await;
        h.orchestrator.cancel(signup.id).unwrap();
        gate.add_permits(100);

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, ProvisionOutcome::Cancelled);

        let entries = h.log.entries_for(signup.id);
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.status == StepStatus::Success));

        let ssl_mock = h
            .mocks
            .iter()
            .find(|m| m.kind() == ResourceKind::Ssl)
            .unwrap();
        assert_eq!(ssl_mock.provision_calls(), 0);

        assert_eq!(
            queue.try_recv().unwrap().kind,
            NotificationKind::ProvisioningCancelled
        );
    }

    #[tokio::test]
    async fn cancel_without_active_run_conflicts() {
        let h = harness(full_ok_set());
        assert!(matches!(
            h.orchestrator.cancel(Uuid::new_v4()),
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn slow_step_times_out_as_failed() {
        let mocks = vec![
            Arc::new(MockProvisioner::new(
                ResourceKind::LinuxAccount,
                FailurePolicy::Fatal,
                MockBehavior::Hang,
            )),
            ok_mock(ResourceKind::WebServer, FailurePolicy::Fatal),
            ok_mock(ResourceKind::Ssl, FailurePolicy::Fatal),
            ok_mock(ResourceKind::Quota, FailurePolicy::BestEffort),
        ];
        let signups = Arc::new(InMemorySignupRepo::new());
        let log = Arc::new(InMemoryProvisionLog::new());
        let hub = Arc::new(NotificationHub::new());
        let vault = Arc::new(test_vault());
        let orchestrator = ProvisioningUseCases::new(
            signups.clone(),
            log.clone(),
            vault.clone(),
            mocks
                .iter()
                .map(|m| m.clone() as Arc<dyn ResourceProvisioner>)
                .collect(),
            hub,
            Duration::from_millis(50),
        );
        let signup = signups.seed(test_signup(&vault, |_| {})).await;

        let outcome = orchestrator.run(signup.id).await.unwrap();
        assert_eq!(outcome, ProvisionOutcome::PartiallyProvisioned);

        let entries = log.entries_for(signup.id);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, StepStatus::Failed);
        assert!(entries[0].message.contains("timed out"));
    }

    #[test]
    fn plan_respects_dependency_order() {
        let vault = test_vault();
        let signup = test_signup(&vault, |s| {
            use crate::domain::entities::signup_request::*;
            s.features = vec![
                FeatureRequest::Database(DatabaseAccountRequest {
                    name: "shop".into(),
                    username: "shop".into(),
                    password_encrypted: vault.encrypt("pw").unwrap(),
                }),
                FeatureRequest::Ssl,
                FeatureRequest::Dns,
            ];
        });
        assert_eq!(
            step_plan(&signup),
            vec![
                ResourceKind::LinuxAccount,
                ResourceKind::WebServer,
                ResourceKind::DnsZone,
                ResourceKind::Ssl,
                ResourceKind::Database,
                ResourceKind::Quota,
            ]
        );
    }
}
