use std::net::SocketAddr;
use std::path::PathBuf;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use url::Url;

pub struct AppConfig {
    pub jwt_secret: SecretString,
    pub cors_origin: HeaderValue,
    pub bind_addr: SocketAddr,
    pub database_url: String,
    /// Separate superuser DSN for CREATE DATABASE / CREATE ROLE during
    /// provisioning. Falls back to `database_url`.
    pub admin_database_url: String,
    /// Key file used when no VAULT_KEY is present in the environment;
    /// created with a fresh key on first use.
    pub vault_key_file: PathBuf,
    /// Directory the webserver includes vhost config from.
    pub vhost_conf_dir: PathBuf,
    /// Command executed after writing/removing vhost config (e.g.
    /// "apachectl graceful").
    pub webserver_reload_cmd: String,
    /// Root under which per-account document roots are created.
    pub web_root: PathBuf,
    pub home_root: PathBuf,
    /// PowerDNS-style API endpoint for zone management.
    pub dns_api_url: Url,
    pub dns_api_key: SecretString,
    /// Optional DNS server address for post-provisioning lookups (e.g.
    /// "127.0.0.1:5353" for a local resolver).
    pub dns_server: Option<SocketAddr>,
    pub primary_nameserver: String,
    pub secondary_nameserver: String,
    /// Address new zones point their apex A record at.
    pub server_ipv4: String,
    /// Mail server admin API endpoint.
    pub mail_api_url: Url,
    pub mail_api_key: SecretString,
    /// Certificate issuance command (certbot-compatible CLI).
    pub ssl_issue_cmd: String,
    pub quota_tool: String,
    /// Upper bound for any single provisioning step.
    pub step_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let jwt_secret: SecretString = SecretString::new(get_env::<String>("JWT_SECRET").into());

        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .expect("CORS_ORIGIN must be a valid header value");

        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", "127.0.0.1:3001".parse().unwrap());
        let database_url: String = get_env("DATABASE_URL");
        let admin_database_url: String =
            get_env_default("ADMIN_DATABASE_URL", database_url.clone());

        let vault_key_file: PathBuf = get_env_default(
            "VAULT_KEY_FILE",
            PathBuf::from("/var/lib/hostpanel/vault.key"),
        );

        let vhost_conf_dir: PathBuf =
            get_env_default("VHOST_CONF_DIR", PathBuf::from("/etc/httpd/conf.d"));
        let webserver_reload_cmd: String =
            get_env_default("WEBSERVER_RELOAD_CMD", "apachectl graceful".to_string());
        let web_root: PathBuf = get_env_default("WEB_ROOT", PathBuf::from("/var/www"));
        let home_root: PathBuf = get_env_default("HOME_ROOT", PathBuf::from("/home"));

        let dns_api_url: Url = get_env_default(
            "DNS_API_URL",
            "http://127.0.0.1:8081".parse().expect("valid default URL"),
        );
        let dns_api_key: SecretString =
            SecretString::new(get_env_default("DNS_API_KEY", String::new()).into());
        let dns_server: Option<SocketAddr> = std::env::var("DNS_SERVER")
            .ok()
            .and_then(|s| s.parse().ok());
        let primary_nameserver: String =
            get_env_default("PRIMARY_NS", "ns1.panel.local".to_string());
        let secondary_nameserver: String =
            get_env_default("SECONDARY_NS", "ns2.panel.local".to_string());
        let server_ipv4: String = get_env_default("SERVER_IPV4", "127.0.0.1".to_string());

        let mail_api_url: Url = get_env_default(
            "MAIL_API_URL",
            "http://127.0.0.1:8088".parse().expect("valid default URL"),
        );
        let mail_api_key: SecretString =
            SecretString::new(get_env_default("MAIL_API_KEY", String::new()).into());

        let ssl_issue_cmd: String = get_env_default("SSL_ISSUE_CMD", "certbot".to_string());
        let quota_tool: String = get_env_default("QUOTA_TOOL", "setquota".to_string());
        let step_timeout_secs: u64 = get_env_default("STEP_TIMEOUT_SECS", 120);

        Self {
            jwt_secret,
            cors_origin,
            bind_addr,
            database_url,
            admin_database_url,
            vault_key_file,
            vhost_conf_dir,
            webserver_reload_cmd,
            web_root,
            home_root,
            dns_api_url,
            dns_api_key,
            dns_server,
            primary_nameserver,
            secondary_nameserver,
            server_ipv4,
            mail_api_url,
            mail_api_key,
            ssl_issue_cmd,
            quota_tool,
            step_timeout_secs,
        }
    }
}
