use chrono::NaiveDateTime;
use uuid::Uuid;

/// One web-server vhost bound to a domain. `doc_root_slot` lets a domain
/// carry several independent document roots (slot 0 is the default site).
#[derive(Debug, Clone)]
pub struct VirtualHost {
    pub id: Uuid,
    pub user_id: Uuid,
    pub domain: String,
    pub doc_root: String,
    pub doc_root_slot: i32,
    pub system_user: String,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}
