use chrono::NaiveDateTime;
use uuid::Uuid;

/// Mail domain owned by a virtual host (FK, not ownership duplication).
#[derive(Debug, Clone)]
pub struct EmailDomain {
    pub id: Uuid,
    pub virtual_host_id: Uuid,
    pub domain: String,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct EmailAccount {
    pub id: Uuid,
    pub email_domain_id: Uuid,
    pub username: String,
    pub quota_mb: i64,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}
