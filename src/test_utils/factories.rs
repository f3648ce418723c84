//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible
//! defaults. Use the closure parameter to override specific fields as needed.

use uuid::Uuid;

use crate::{
    application::use_cases::signup::SignupProfile,
    domain::entities::{
        signup_request::{FeatureRequest, SignupStatus},
        virtual_host::VirtualHost,
    },
    infra::crypto::SecretVault,
};

/// Create an approved signup request with sensible defaults. Passwords are
/// encrypted with the supplied vault so the orchestrator can decrypt them.
pub fn test_signup(
    vault: &SecretVault,
    overrides: impl FnOnce(&mut SignupProfile),
) -> SignupProfile {
    let now = chrono::Utc::now().naive_utc();
    let mut signup = SignupProfile {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        domain: "example.com".to_string(),
        server_password_encrypted: vault.encrypt("hunter2").unwrap(),
        features: vec![FeatureRequest::Ssl],
        storage_quota_mb: 500,
        status: SignupStatus::Approved,
        outcome: None,
        admin_comment: None,
        approved_by: Some(Uuid::new_v4()),
        approved_at: Some(now),
        created_at: Some(now),
        updated_at: Some(now),
    };
    overrides(&mut signup);
    signup
}

/// Create a virtual host with sensible defaults.
pub fn test_vhost(overrides: impl FnOnce(&mut VirtualHost)) -> VirtualHost {
    let now = chrono::Utc::now().naive_utc();
    let mut vhost = VirtualHost {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        domain: "example.com".to_string(),
        doc_root: "/var/www/example/example.com".to_string(),
        doc_root_slot: 0,
        system_user: "example".to_string(),
        created_at: Some(now),
        updated_at: Some(now),
    };
    overrides(&mut vhost);
    vhost
}
