use std::fs::File;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::{
        dns::HickoryZoneChecker,
        http::app_state::AppState,
        system::{
            database::DatabaseProvisioner,
            dns_zone::DnsZoneProvisioner,
            linux_account::LinuxAccountProvisioner,
            mail::{MailApiClient, MailProvisioner},
            quota::{QuotaController, QuotaProvisioner},
            ssl::SslProvisioner,
            web_server::{ApacheConfigAdapter, WebServerProvisioner},
        },
    },
    application::ports::provisioner::ResourceProvisioner,
    infra::{
        config::AppConfig, crypto::SecretVault, db::init_db, notify::NotificationHub,
        postgres_persistence,
    },
    use_cases::{
        email::{EmailRepo, EmailUseCases},
        provisioning::{ProvisionLogRepo, ProvisioningUseCases, SslCertificateRepo},
        signup::{SignupRepo, SignupUseCases},
        virtual_host::{VirtualHostRepo, VirtualHostUseCases},
    },
};

const HTTP_TIMEOUT_SECS: u64 = 15;
const QUOTA_TIMEOUT_SECS: u64 = 30;

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let vault = Arc::new(SecretVault::from_env_or_file(&config.vault_key_file)?);
    let postgres = Arc::new(postgres_persistence(&config.database_url).await?);
    let admin_pool = init_db(&config.admin_database_url).await?;
    let hub = Arc::new(NotificationHub::new());

    let signup_repo = postgres.clone() as Arc<dyn SignupRepo>;
    let vhost_repo = postgres.clone() as Arc<dyn VirtualHostRepo>;
    let email_repo = postgres.clone() as Arc<dyn EmailRepo>;
    let cert_repo = postgres.clone() as Arc<dyn SslCertificateRepo>;
    let log_repo = postgres.clone() as Arc<dyn ProvisionLogRepo>;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .expect("failed to build reqwest client");

    let web_config = Arc::new(ApacheConfigAdapter::new(
        config.vhost_conf_dir.clone(),
        config.webserver_reload_cmd.clone(),
    ));
    let vhost_use_cases = Arc::new(VirtualHostUseCases::new(
        vhost_repo.clone(),
        web_config,
        config.web_root.clone(),
    ));

    let mail_client = Arc::new(MailApiClient::new(
        http.clone(),
        config.mail_api_url.clone(),
        config.mail_api_key.clone(),
    ));
    let email_use_cases = Arc::new(EmailUseCases::new(email_repo, mail_client));

    let zone_checker = Some(Arc::new(match config.dns_server {
        Some(addr) => HickoryZoneChecker::with_nameserver(addr),
        None => HickoryZoneChecker::new(),
    }));

    let quota_controller = Arc::new(QuotaController::new(
        config.quota_tool.clone(),
        config.home_root.clone(),
        Duration::from_secs(QUOTA_TIMEOUT_SECS),
    ));

    // Fixed capability set, one provisioner per resource kind.
    let provisioners: Vec<Arc<dyn ResourceProvisioner>> = vec![
        Arc::new(LinuxAccountProvisioner::new(config.home_root.clone())),
        Arc::new(WebServerProvisioner::new(vhost_use_cases.clone())),
        Arc::new(DnsZoneProvisioner::new(
            http.clone(),
            config.dns_api_url.clone(),
            config.dns_api_key.clone(),
            config.primary_nameserver.clone(),
            config.secondary_nameserver.clone(),
            config.server_ipv4.clone(),
            zone_checker,
        )),
        Arc::new(SslProvisioner::new(
            cert_repo,
            vhost_repo.clone(),
            config.ssl_issue_cmd.clone(),
        )),
        Arc::new(MailProvisioner::new(email_use_cases, vhost_repo)),
        Arc::new(DatabaseProvisioner::new(admin_pool)),
        Arc::new(QuotaProvisioner::new(quota_controller)),
    ];

    let signup_use_cases = Arc::new(SignupUseCases::new(signup_repo.clone(), vault.clone()));
    let provisioning_use_cases = Arc::new(ProvisioningUseCases::new(
        signup_repo,
        log_repo,
        vault,
        provisioners,
        hub.clone(),
        Duration::from_secs(config.step_timeout_secs),
    ));

    Ok(AppState {
        config: Arc::new(config),
        signup_use_cases,
        provisioning_use_cases,
        vhost_use_cases,
        notification_hub: hub,
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hostpanel=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false) // don’t show target (module path)
        .with_level(true) // show log level
        .pretty(); // human-friendly, with colors

    // File (structured JSON logs)
    let file = File::create("app.log").expect("cannot create log file");
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
