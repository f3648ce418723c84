use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::adapters::system::{run_tool, trim_tool_output};
use crate::app_error::{AppError, AppResult};
use crate::application::ports::provisioner::{
    FailurePolicy, ProvisionContext, ResourceKind, ResourceProvisioner,
};
use crate::domain::entities::ssl_certificate::{CertAction, CertOutcome, SslStatus};
use crate::use_cases::provisioning::SslCertificateRepo;
use crate::use_cases::virtual_host::VirtualHostRepo;

const CERT_VALIDITY_DAYS: i64 = 90;
const RENEWAL_WINDOW_DAYS: i64 = 30;

/// Drives a certbot-compatible issuance command and keeps the certificate
/// record plus its append-only log in step with the attempts.
pub struct SslProvisioner {
    certs: Arc<dyn SslCertificateRepo>,
    vhosts: Arc<dyn VirtualHostRepo>,
    issue_cmd: String,
}

impl SslProvisioner {
    pub fn new(
        certs: Arc<dyn SslCertificateRepo>,
        vhosts: Arc<dyn VirtualHostRepo>,
        issue_cmd: String,
    ) -> Self {
        Self {
            certs,
            vhosts,
            issue_cmd,
        }
    }

    async fn run_issue_cmd(&self, args: &[&str]) -> Option<String> {
        let mut parts = self.issue_cmd.split_whitespace();
        let Some(program) = parts.next() else {
            return Some("no issuance command configured".into());
        };
        let mut full_args: Vec<&str> = parts.collect();
        full_args.extend_from_slice(args);

        match run_tool(program, &full_args, None).await {
            Ok(output) if output.status.success() => None,
            Ok(output) => Some(trim_tool_output(&output.stderr)),
            Err(AppError::ExternalTool(message)) => Some(message),
            Err(e) => Some(e.to_string()),
        }
    }
}

#[async_trait]
impl ResourceProvisioner for SslProvisioner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Ssl
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Fatal
    }

    async fn provision(&self, ctx: &ProvisionContext) -> AppResult<String> {
        let cert = self.certs.ensure_pending(&ctx.domain).await?;

        // Re-provisioning with a healthy certificate is success, not a
        // second issuance.
        if cert.status == SslStatus::Active {
            let renewal_due = cert.expires_at.is_none_or(|expires| {
                expires < (Utc::now() + Duration::days(RENEWAL_WINDOW_DAYS)).naive_utc()
            });
            if !renewal_due {
                return Ok(format!("certificate for {} already active", ctx.domain));
            }
        }

        let webroot = self
            .vhosts
            .get_by_domain(&ctx.domain)
            .await?
            .map(|v| v.doc_root)
            .ok_or_else(|| {
                AppError::Conflict("virtual host for the certificate webroot is missing".into())
            })?;

        self.certs
            .append_log(cert.id, CertAction::Request, CertOutcome::Success, "issuance requested")
            .await?;

        let www = format!("www.{}", ctx.domain);
        let failure = self
            .run_issue_cmd(&[
                "certonly",
                "--non-interactive",
                "--agree-tos",
                "--webroot",
                "-w",
                &webroot,
                "-d",
                &ctx.domain,
                "-d",
                &www,
            ])
            .await;

        if let Some(message) = failure {
            self.certs
                .append_log(cert.id, CertAction::Issue, CertOutcome::Failed, &message)
                .await?;
            return Err(AppError::ExternalTool(format!(
                "certificate issuance failed: {message}"
            )));
        }

        let now = Utc::now().naive_utc();
        self.certs
            .mark_active(cert.id, now, now + Duration::days(CERT_VALIDITY_DAYS))
            .await?;
        self.certs
            .append_log(cert.id, CertAction::Issue, CertOutcome::Success, "certificate issued")
            .await?;

        Ok(format!("certificate issued for {}", ctx.domain))
    }

    async fn deprovision(&self, ctx: &ProvisionContext) -> AppResult<String> {
        let Some(cert) = self.certs.get_by_domain(&ctx.domain).await? else {
            return Ok(format!("no certificate on record for {}", ctx.domain));
        };
        if cert.status == SslStatus::Revoked {
            return Ok(format!("certificate for {} already revoked", ctx.domain));
        }

        let failure = self
            .run_issue_cmd(&["revoke", "--non-interactive", "--cert-name", &ctx.domain])
            .await;

        if let Some(message) = failure {
            self.certs
                .append_log(cert.id, CertAction::Revoke, CertOutcome::Failed, &message)
                .await?;
            return Err(AppError::ExternalTool(format!(
                "certificate revocation failed: {message}"
            )));
        }

        self.certs.mark_revoked(cert.id).await?;
        self.certs
            .append_log(cert.id, CertAction::Revoke, CertOutcome::Success, "certificate revoked")
            .await?;
        Ok(format!("certificate for {} revoked", ctx.domain))
    }
}
