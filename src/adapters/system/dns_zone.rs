use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::adapters::dns::HickoryZoneChecker;
use crate::app_error::{AppError, AppResult};
use crate::application::ports::provisioner::{
    FailurePolicy, ProvisionContext, ResourceKind, ResourceProvisioner,
};

/// Manages authoritative zones through a PowerDNS-compatible HTTP API.
pub struct DnsZoneProvisioner {
    http: reqwest::Client,
    api_url: Url,
    api_key: SecretString,
    primary_ns: String,
    secondary_ns: String,
    server_ipv4: String,
    checker: Option<Arc<HickoryZoneChecker>>,
}

impl DnsZoneProvisioner {
    pub fn new(
        http: reqwest::Client,
        api_url: Url,
        api_key: SecretString,
        primary_ns: String,
        secondary_ns: String,
        server_ipv4: String,
        checker: Option<Arc<HickoryZoneChecker>>,
    ) -> Self {
        Self {
            http,
            api_url,
            api_key,
            primary_ns,
            secondary_ns,
            server_ipv4,
            checker,
        }
    }

    fn zones_url(&self) -> AppResult<Url> {
        self.api_url
            .join("api/v1/servers/localhost/zones")
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    fn zone_url(&self, domain: &str) -> AppResult<Url> {
        self.api_url
            .join(&format!("api/v1/servers/localhost/zones/{domain}."))
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    fn fqdn(name: &str) -> String {
        format!("{name}.")
    }

    fn creation_body(&self, domain: &str) -> serde_json::Value {
        let apex = Self::fqdn(domain);
        serde_json::json!({
            "name": apex,
            "kind": "Native",
            "nameservers": [Self::fqdn(&self.primary_ns), Self::fqdn(&self.secondary_ns)],
            "rrsets": [
                {
                    "name": apex,
                    "type": "A",
                    "ttl": 3600,
                    "records": [{ "content": self.server_ipv4, "disabled": false }]
                },
                {
                    "name": format!("www.{apex}"),
                    "type": "A",
                    "ttl": 3600,
                    "records": [{ "content": self.server_ipv4, "disabled": false }]
                }
            ]
        })
    }
}

#[async_trait]
impl ResourceProvisioner for DnsZoneProvisioner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::DnsZone
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Fatal
    }

    async fn provision(&self, ctx: &ProvisionContext) -> AppResult<String> {
        let response = self
            .http
            .post(self.zones_url()?)
            .header("X-API-Key", self.api_key.expose_secret())
            .json(&self.creation_body(&ctx.domain))
            .send()
            .await
            .map_err(|e| AppError::ExternalTool(format!("DNS API unreachable: {e}")))?;

        let created = match response.status() {
            StatusCode::CREATED | StatusCode::OK => true,
            StatusCode::CONFLICT => false,
            status => {
                let body = response.text().await.unwrap_or_default();
                let detail: String = body.chars().take(200).collect();
                return Err(AppError::ExternalTool(format!(
                    "DNS API returned {status}: {detail}"
                )));
            }
        };

        // Resolution check is informational; a zone that does not resolve
        // yet (caching, transfer lag) is still a created zone.
        let mut message = if created {
            format!("zone {} created", ctx.domain)
        } else {
            format!("zone {} already exists", ctx.domain)
        };
        if let Some(checker) = &self.checker {
            if !checker.zone_has_soa(&ctx.domain).await {
                message.push_str(" (resolution pending)");
            }
        }
        Ok(message)
    }

    async fn deprovision(&self, ctx: &ProvisionContext) -> AppResult<String> {
        let response = self
            .http
            .delete(self.zone_url(&ctx.domain)?)
            .header("X-API-Key", self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| AppError::ExternalTool(format!("DNS API unreachable: {e}")))?;

        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::OK => Ok(format!("zone {} removed", ctx.domain)),
            StatusCode::NOT_FOUND => Ok(format!("zone {} already absent", ctx.domain)),
            status => Err(AppError::ExternalTool(format!(
                "DNS API returned {status} on zone removal"
            ))),
        }
    }
}
