//! In-memory mock implementations for the signup, audit-log and
//! certificate repository traits.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::provisioner::{ResourceKind, StepAction, StepStatus},
    application::use_cases::{
        provisioning::{ProvisionLogEntry, ProvisionLogRepo, SslCertificateRepo},
        signup::{NewSignup, SignupProfile, SignupRepo},
    },
    domain::entities::{
        signup_request::{ProvisionOutcome, SignupStatus},
        ssl_certificate::{CertAction, CertOutcome, SslCertificate, SslCertificateLogEntry, SslStatus},
    },
};

/// In-memory implementation of SignupRepo for testing.
#[derive(Default)]
pub struct InMemorySignupRepo {
    signups: Mutex<HashMap<Uuid, SignupProfile>>,
}

impl InMemorySignupRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the repo with a prepared request (e.g. an already-approved one).
    pub async fn seed(&self, signup: SignupProfile) -> SignupProfile {
        self.signups
            .lock()
            .unwrap()
            .insert(signup.id, signup.clone());
        signup
    }
}

#[async_trait]
impl SignupRepo for InMemorySignupRepo {
    async fn create(&self, new: NewSignup) -> AppResult<SignupProfile> {
        let mut signups = self.signups.lock().unwrap();
        if signups.values().any(|s| s.domain == new.domain) {
            return Err(AppError::Conflict(
                "A record with this value already exists".into(),
            ));
        }

        let now = chrono::Utc::now().naive_utc();
        let profile = SignupProfile {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            domain: new.domain,
            server_password_encrypted: new.server_password_encrypted,
            features: new.features,
            storage_quota_mb: new.storage_quota_mb,
            status: SignupStatus::Pending,
            outcome: None,
            admin_comment: None,
            approved_by: None,
            approved_at: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        signups.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SignupProfile>> {
        Ok(self.signups.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_domain(&self, domain: &str) -> AppResult<Option<SignupProfile>> {
        Ok(self
            .signups
            .lock()
            .unwrap()
            .values()
            .find(|s| s.domain == domain)
            .cloned())
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<SignupProfile>> {
        Ok(self
            .signups
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> AppResult<Vec<SignupProfile>> {
        Ok(self.signups.lock().unwrap().values().cloned().collect())
    }

    async fn approve(
        &self,
        id: Uuid,
        admin_id: Uuid,
        comment: Option<&str>,
    ) -> AppResult<SignupProfile> {
        self.transition(id, SignupStatus::Approved, admin_id, comment)
    }

    async fn reject(
        &self,
        id: Uuid,
        admin_id: Uuid,
        comment: Option<&str>,
    ) -> AppResult<SignupProfile> {
        self.transition(id, SignupStatus::Rejected, admin_id, comment)
    }

    async fn set_outcome(&self, id: Uuid, outcome: ProvisionOutcome) -> AppResult<()> {
        let mut signups = self.signups.lock().unwrap();
        let signup = signups.get_mut(&id).ok_or(AppError::NotFound)?;
        signup.outcome = Some(outcome);
        signup.updated_at = Some(chrono::Utc::now().naive_utc());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.signups
            .lock()
            .unwrap()
            .remove(&id)
            .ok_or(AppError::NotFound)?;
        Ok(())
    }
}

impl InMemorySignupRepo {
    fn transition(
        &self,
        id: Uuid,
        to: SignupStatus,
        admin_id: Uuid,
        comment: Option<&str>,
    ) -> AppResult<SignupProfile> {
        let mut signups = self.signups.lock().unwrap();
        let signup = signups.get_mut(&id).ok_or(AppError::NotFound)?;
        if signup.status != SignupStatus::Pending {
            return Err(AppError::Conflict("Request is no longer pending".into()));
        }
        let now = chrono::Utc::now().naive_utc();
        signup.status = to;
        signup.approved_by = Some(admin_id);
        signup.approved_at = Some(now);
        signup.admin_comment = comment.map(str::to_string);
        signup.updated_at = Some(now);
        Ok(signup.clone())
    }
}

/// In-memory append-only provisioning log.
#[derive(Default)]
pub struct InMemoryProvisionLog {
    entries: Mutex<Vec<ProvisionLogEntry>>,
}

impl InMemoryProvisionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries for a request, in append order (for test assertions).
    pub fn entries_for(&self, request_id: Uuid) -> Vec<ProvisionLogEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.request_id == request_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ProvisionLogRepo for InMemoryProvisionLog {
    async fn append(
        &self,
        request_id: Uuid,
        step: ResourceKind,
        action: StepAction,
        status: StepStatus,
        message: &str,
    ) -> AppResult<()> {
        self.entries.lock().unwrap().push(ProvisionLogEntry {
            id: Uuid::new_v4(),
            request_id,
            step,
            action,
            status,
            message: message.to_string(),
            created_at: Some(chrono::Utc::now().naive_utc()),
        });
        Ok(())
    }

    async fn list_for_request(&self, request_id: Uuid) -> AppResult<Vec<ProvisionLogEntry>> {
        Ok(self.entries_for(request_id))
    }
}

/// In-memory certificate store with its append-only log.
#[derive(Default)]
pub struct InMemorySslCertificateRepo {
    certs: Mutex<HashMap<Uuid, SslCertificate>>,
    log: Mutex<Vec<SslCertificateLogEntry>>,
}

impl InMemorySslCertificateRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SslCertificateRepo for InMemorySslCertificateRepo {
    async fn ensure_pending(&self, domain: &str) -> AppResult<SslCertificate> {
        let mut certs = self.certs.lock().unwrap();
        if let Some(existing) = certs.values().find(|c| c.domain == domain) {
            return Ok(existing.clone());
        }
        let now = chrono::Utc::now().naive_utc();
        let cert = SslCertificate {
            id: Uuid::new_v4(),
            domain: domain.to_string(),
            status: SslStatus::Pending,
            issued_at: None,
            expires_at: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        certs.insert(cert.id, cert.clone());
        Ok(cert)
    }

    async fn get_by_domain(&self, domain: &str) -> AppResult<Option<SslCertificate>> {
        Ok(self
            .certs
            .lock()
            .unwrap()
            .values()
            .find(|c| c.domain == domain)
            .cloned())
    }

    async fn mark_active(
        &self,
        id: Uuid,
        issued_at: NaiveDateTime,
        expires_at: NaiveDateTime,
    ) -> AppResult<SslCertificate> {
        let mut certs = self.certs.lock().unwrap();
        let cert = certs.get_mut(&id).ok_or(AppError::NotFound)?;
        cert.status = SslStatus::Active;
        cert.issued_at = Some(issued_at);
        cert.expires_at = Some(expires_at);
        cert.updated_at = Some(chrono::Utc::now().naive_utc());
        Ok(cert.clone())
    }

    async fn mark_revoked(&self, id: Uuid) -> AppResult<()> {
        let mut certs = self.certs.lock().unwrap();
        let cert = certs.get_mut(&id).ok_or(AppError::NotFound)?;
        cert.status = SslStatus::Revoked;
        cert.updated_at = Some(chrono::Utc::now().naive_utc());
        Ok(())
    }

    async fn append_log(
        &self,
        certificate_id: Uuid,
        action: CertAction,
        outcome: CertOutcome,
        message: &str,
    ) -> AppResult<()> {
        self.log.lock().unwrap().push(SslCertificateLogEntry {
            id: Uuid::new_v4(),
            certificate_id,
            action,
            outcome,
            message: message.to_string(),
            created_at: Some(chrono::Utc::now().naive_utc()),
        });
        Ok(())
    }

    async fn list_log(&self, certificate_id: Uuid) -> AppResult<Vec<SslCertificateLogEntry>> {
        Ok(self
            .log
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.certificate_id == certificate_id)
            .cloned()
            .collect())
    }
}
