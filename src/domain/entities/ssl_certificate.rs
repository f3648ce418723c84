use chrono::NaiveDateTime;
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslStatus {
    Pending,
    Active,
    Expired,
    Revoked,
}

impl SslStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SslStatus::Pending => "pending",
            SslStatus::Active => "active",
            SslStatus::Expired => "expired",
            SslStatus::Revoked => "revoked",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "active" => SslStatus::Active,
            "expired" => SslStatus::Expired,
            "revoked" => SslStatus::Revoked,
            _ => SslStatus::Pending,
        }
    }
}

/// One certificate per domain.
#[derive(Debug, Clone)]
pub struct SslCertificate {
    pub id: Uuid,
    pub domain: String,
    pub status: SslStatus,
    pub issued_at: Option<NaiveDateTime>,
    pub expires_at: Option<NaiveDateTime>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum CertAction {
    Request,
    Issue,
    Renew,
    Revoke,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum CertOutcome {
    Success,
    Failed,
}

/// Append-only audit entry for a certificate operation. Entries are never
/// updated or deleted, only appended.
#[derive(Debug, Clone)]
pub struct SslCertificateLogEntry {
    pub id: Uuid,
    pub certificate_id: Uuid,
    pub action: CertAction,
    pub outcome: CertOutcome,
    pub message: String,
    pub created_at: Option<NaiveDateTime>,
}
