//! Test app state builder for HTTP-level integration testing.
//!
//! Creates an `AppState` backed entirely by in-memory mocks so route tests
//! run without Postgres or any external subsystem.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use secrecy::SecretString;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    application::jwt,
    application::ports::provisioner::{FailurePolicy, ResourceKind, ResourceProvisioner},
    application::use_cases::{
        provisioning::ProvisioningUseCases, signup::SignupUseCases,
        virtual_host::VirtualHostUseCases,
    },
    infra::{config::AppConfig, crypto::SecretVault, notify::NotificationHub},
    test_utils::{
        InMemoryProvisionLog, InMemorySignupRepo, InMemoryVirtualHostRepo, MockBehavior,
        MockProvisioner, RecordingWebServer, test_vault,
    },
};

const TEST_JWT_SECRET: &str = "test-jwt-secret";

fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: SecretString::new(TEST_JWT_SECRET.into()),
        cors_origin: HeaderValue::from_static("http://localhost:3000"),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://localhost/hostpanel_test".into(),
        admin_database_url: "postgres://localhost/hostpanel_test".into(),
        vault_key_file: PathBuf::from("/tmp/hostpanel-test/vault.key"),
        vhost_conf_dir: PathBuf::from("/tmp/hostpanel-test/conf.d"),
        webserver_reload_cmd: String::new(),
        web_root: PathBuf::from("/var/www"),
        home_root: PathBuf::from("/home"),
        dns_api_url: "http://127.0.0.1:8081".parse().unwrap(),
        dns_api_key: SecretString::new(String::new().into()),
        dns_server: None,
        primary_nameserver: "ns1.panel.local".into(),
        secondary_nameserver: "ns2.panel.local".into(),
        server_ipv4: "127.0.0.1".into(),
        mail_api_url: "http://127.0.0.1:8088".parse().unwrap(),
        mail_api_key: SecretString::new(String::new().into()),
        ssl_issue_cmd: "true".into(),
        quota_tool: "setquota".into(),
        step_timeout_secs: 5,
    }
}

/// Cookie header value carrying a valid access token for the test config.
pub fn auth_cookie_for(user_id: Uuid, admin: bool) -> String {
    let token = jwt::issue(
        user_id,
        admin,
        &SecretString::new(TEST_JWT_SECRET.into()),
        time::Duration::hours(1),
    )
    .unwrap();
    format!("access_token={token}")
}

pub struct TestAppStateBuilder {
    pub signups: Arc<InMemorySignupRepo>,
    pub log: Arc<InMemoryProvisionLog>,
    pub vhosts: Arc<InMemoryVirtualHostRepo>,
    pub web: Arc<RecordingWebServer>,
    pub hub: Arc<NotificationHub>,
    pub vault: Arc<SecretVault>,
    provisioners: Vec<Arc<dyn ResourceProvisioner>>,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        let all_ok: Vec<Arc<dyn ResourceProvisioner>> = [
            ResourceKind::LinuxAccount,
            ResourceKind::WebServer,
            ResourceKind::DnsZone,
            ResourceKind::Ssl,
            ResourceKind::Mail,
            ResourceKind::Database,
            ResourceKind::Quota,
        ]
        .into_iter()
        .map(|kind| {
            let policy = if kind == ResourceKind::Quota {
                FailurePolicy::BestEffort
            } else {
                FailurePolicy::Fatal
            };
            Arc::new(MockProvisioner::new(kind, policy, MockBehavior::Succeed))
                as Arc<dyn ResourceProvisioner>
        })
        .collect();

        Self {
            signups: Arc::new(InMemorySignupRepo::new()),
            log: Arc::new(InMemoryProvisionLog::new()),
            vhosts: Arc::new(InMemoryVirtualHostRepo::new()),
            web: Arc::new(RecordingWebServer::new()),
            hub: Arc::new(NotificationHub::new()),
            vault: Arc::new(test_vault()),
            provisioners: all_ok,
        }
    }

    pub fn with_provisioners(mut self, provisioners: Vec<Arc<dyn ResourceProvisioner>>) -> Self {
        self.provisioners = provisioners;
        self
    }

    pub fn build(&self) -> AppState {
        let vhost_use_cases = Arc::new(VirtualHostUseCases::new(
            self.vhosts.clone(),
            self.web.clone(),
            PathBuf::from("/var/www"),
        ));
        AppState {
            config: Arc::new(test_config()),
            signup_use_cases: Arc::new(SignupUseCases::new(
                self.signups.clone(),
                self.vault.clone(),
            )),
            provisioning_use_cases: Arc::new(ProvisioningUseCases::new(
                self.signups.clone(),
                self.log.clone(),
                self.vault.clone(),
                self.provisioners.clone(),
                self.hub.clone(),
                Duration::from_secs(5),
            )),
            vhost_use_cases,
            notification_hub: self.hub.clone(),
        }
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
