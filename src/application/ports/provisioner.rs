use async_trait::async_trait;
use secrecy::SecretString;
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::app_error::AppResult;
use crate::domain::entities::signup_request::{
    DatabaseAccountRequest, EmailAccountRequest, FeatureRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ResourceKind {
    LinuxAccount,
    WebServer,
    DnsZone,
    Ssl,
    Mail,
    Database,
    Quota,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Failure aborts the remaining steps of the run.
    Fatal,
    /// Failure is recorded and the run continues.
    BestEffort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum StepAction {
    Create,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed,
}

/// Everything a provisioner may need about the request being fulfilled.
/// Secrets arrive decrypted; implementations must never log them. A secret
/// that failed to decrypt is `None` while its feature is present — the
/// orchestrator records that as a failed step before the provisioner runs.
#[derive(Clone)]
pub struct ProvisionContext {
    pub request_id: Uuid,
    pub user_id: Uuid,
    pub domain: String,
    pub system_user: String,
    pub doc_root_slot: i32,
    pub server_password: SecretString,
    pub storage_quota_mb: i64,
    pub features: Vec<FeatureRequest>,
    pub email_password: Option<SecretString>,
    pub database_password: Option<SecretString>,
}

impl ProvisionContext {
    pub fn wants(&self, kind: ResourceKind) -> bool {
        self.features.iter().any(|f| match f {
            FeatureRequest::Ssl => kind == ResourceKind::Ssl,
            FeatureRequest::Dns => kind == ResourceKind::DnsZone,
            FeatureRequest::Email(_) => kind == ResourceKind::Mail,
            FeatureRequest::Database(_) => kind == ResourceKind::Database,
        })
    }

    pub fn email_request(&self) -> Option<&EmailAccountRequest> {
        self.features.iter().find_map(|f| match f {
            FeatureRequest::Email(r) => Some(r),
            _ => None,
        })
    }

    pub fn database_request(&self) -> Option<&DatabaseAccountRequest> {
        self.features.iter().find_map(|f| match f {
            FeatureRequest::Database(r) => Some(r),
            _ => None,
        })
    }
}

/// One concrete resource kind in one external subsystem. Implementations
/// are fully independent; the orchestrator knows only the outcome and a
/// human-readable message.
#[async_trait]
pub trait ResourceProvisioner: Send + Sync {
    fn kind(&self) -> ResourceKind;

    fn policy(&self) -> FailurePolicy;

    /// Idempotent: provisioning an already-existing resource reports
    /// success, never a duplicate.
    async fn provision(&self, ctx: &ProvisionContext) -> AppResult<String>;

    /// Idempotent: deprovisioning an absent resource reports success.
    async fn deprovision(&self, ctx: &ProvisionContext) -> AppResult<String>;
}
