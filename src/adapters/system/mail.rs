use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::app_error::{AppError, AppResult};
use crate::application::ports::provisioner::{
    FailurePolicy, ProvisionContext, ResourceKind, ResourceProvisioner,
};
use crate::use_cases::email::{EmailUseCases, MailSystem};
use crate::use_cases::virtual_host::VirtualHostRepo;

/// Client for the mail server's admin HTTP interface. Create calls treat
/// 409 as already-present, delete calls treat 404 as already-absent, so
/// retries converge.
pub struct MailApiClient {
    http: reqwest::Client,
    api_url: Url,
    api_key: SecretString,
}

impl MailApiClient {
    pub fn new(http: reqwest::Client, api_url: Url, api_key: SecretString) -> Self {
        Self {
            http,
            api_url,
            api_key,
        }
    }

    fn endpoint(&self, path: &str) -> AppResult<Url> {
        self.api_url
            .join(path)
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    async fn expect_ok(
        response: reqwest::Response,
        tolerated: StatusCode,
        what: &str,
    ) -> AppResult<()> {
        let status = response.status();
        if status.is_success() || status == tolerated {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        let detail: String = body.chars().take(200).collect();
        Err(AppError::ExternalTool(format!(
            "mail API returned {status} for {what}: {detail}"
        )))
    }
}

#[async_trait]
impl MailSystem for MailApiClient {
    async fn create_domain(&self, domain: &str) -> AppResult<()> {
        let response = self
            .http
            .post(self.endpoint("admin/domains")?)
            .header("Authorization", format!("Bearer {}", self.api_key.expose_secret()))
            .json(&serde_json::json!({ "name": domain }))
            .send()
            .await
            .map_err(|e| AppError::ExternalTool(format!("mail API unreachable: {e}")))?;
        Self::expect_ok(response, StatusCode::CONFLICT, "domain creation").await
    }

    async fn create_account(
        &self,
        domain: &str,
        username: &str,
        password: &SecretString,
        quota_mb: i64,
    ) -> AppResult<()> {
        let response = self
            .http
            .post(self.endpoint(&format!("admin/domains/{domain}/accounts"))?)
            .header("Authorization", format!("Bearer {}", self.api_key.expose_secret()))
            .json(&serde_json::json!({
                "username": username,
                "password": password.expose_secret(),
                "quota_mb": quota_mb,
            }))
            .send()
            .await
            .map_err(|e| AppError::ExternalTool(format!("mail API unreachable: {e}")))?;
        Self::expect_ok(response, StatusCode::CONFLICT, "account creation").await
    }

    async fn delete_account(&self, domain: &str, username: &str) -> AppResult<()> {
        let response = self
            .http
            .delete(self.endpoint(&format!("admin/domains/{domain}/accounts/{username}"))?)
            .header("Authorization", format!("Bearer {}", self.api_key.expose_secret()))
            .send()
            .await
            .map_err(|e| AppError::ExternalTool(format!("mail API unreachable: {e}")))?;
        Self::expect_ok(response, StatusCode::NOT_FOUND, "account removal").await
    }

    async fn delete_domain(&self, domain: &str) -> AppResult<()> {
        let response = self
            .http
            .delete(self.endpoint(&format!("admin/domains/{domain}"))?)
            .header("Authorization", format!("Bearer {}", self.api_key.expose_secret()))
            .send()
            .await
            .map_err(|e| AppError::ExternalTool(format!("mail API unreachable: {e}")))?;
        Self::expect_ok(response, StatusCode::NOT_FOUND, "domain removal").await
    }
}

/// Provisioner face of the mail workflow: creates the mail domain under the
/// request's virtual host and the requested mailbox, recording both.
pub struct MailProvisioner {
    email: Arc<EmailUseCases>,
    vhosts: Arc<dyn VirtualHostRepo>,
}

impl MailProvisioner {
    pub fn new(email: Arc<EmailUseCases>, vhosts: Arc<dyn VirtualHostRepo>) -> Self {
        Self { email, vhosts }
    }
}

#[async_trait]
impl ResourceProvisioner for MailProvisioner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Mail
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Fatal
    }

    async fn provision(&self, ctx: &ProvisionContext) -> AppResult<String> {
        let Some(request) = ctx.email_request() else {
            return Ok("no mailbox requested".into());
        };
        let password = ctx.email_password.as_ref().ok_or(AppError::Crypto)?;

        let vhost = self
            .vhosts
            .get_by_domain(&ctx.domain)
            .await?
            .ok_or_else(|| {
                AppError::Conflict("virtual host for the mail domain is missing".into())
            })?;

        let domain = self.email.ensure_domain(vhost.id, &ctx.domain).await?;
        self.email
            .ensure_account(&domain, &request.username, password, request.quota_mb)
            .await?;

        Ok(format!(
            "mail domain {} with mailbox {}@{}",
            ctx.domain, request.username, ctx.domain
        ))
    }

    async fn deprovision(&self, ctx: &ProvisionContext) -> AppResult<String> {
        let removed = self.email.delete_domain_cascade(&ctx.domain).await?;
        Ok(if removed {
            format!("mail domain {} removed", ctx.domain)
        } else {
            format!("mail domain {} already absent", ctx.domain)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{InMemoryEmailRepo, InMemoryVirtualHostRepo, RecordingMailSystem};
    use crate::use_cases::virtual_host::NewVirtualHost;
    use uuid::Uuid;

    fn context(user_id: Uuid) -> ProvisionContext {
        use crate::domain::entities::signup_request::*;
        ProvisionContext {
            request_id: Uuid::new_v4(),
            user_id,
            domain: "example.com".into(),
            system_user: "example".into(),
            doc_root_slot: 0,
            server_password: SecretString::new("pw".into()),
            storage_quota_mb: 500,
            features: vec![FeatureRequest::Email(EmailAccountRequest {
                username: "info".into(),
                quota_mb: 512,
                password_encrypted: "token".into(),
            })],
            email_password: Some(SecretString::new("mail-pw".into())),
            database_password: None,
        }
    }

    #[tokio::test]
    async fn provision_records_domain_and_mailbox_idempotently() {
        let user_id = Uuid::new_v4();
        let vhosts = Arc::new(InMemoryVirtualHostRepo::new());
        vhosts
            .create(NewVirtualHost {
                user_id,
                domain: "example.com".into(),
                doc_root: "/var/www/example/example.com".into(),
                doc_root_slot: 0,
                system_user: "example".into(),
            })
            .await
            .unwrap();

        let email_repo = Arc::new(InMemoryEmailRepo::new());
        let mail = Arc::new(RecordingMailSystem::new());
        let email = Arc::new(EmailUseCases::new(email_repo.clone(), mail.clone()));
        let provisioner = MailProvisioner::new(email, vhosts);

        let ctx = context(user_id);
        provisioner.provision(&ctx).await.unwrap();
        let again = provisioner.provision(&ctx).await.unwrap();
        assert!(again.contains("info@example.com"));

        assert_eq!(email_repo.domain_count(), 1);
        assert_eq!(email_repo.account_count(), 1);
        assert!(mail.has_account("example.com", "info"));
    }

    #[tokio::test]
    async fn provision_without_vhost_conflicts() {
        let vhosts = Arc::new(InMemoryVirtualHostRepo::new());
        let email = Arc::new(EmailUseCases::new(
            Arc::new(InMemoryEmailRepo::new()),
            Arc::new(RecordingMailSystem::new()),
        ));
        let provisioner = MailProvisioner::new(email, vhosts);

        let err = provisioner.provision(&context(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn missing_decrypted_password_is_a_crypto_error() {
        let user_id = Uuid::new_v4();
        let vhosts = Arc::new(InMemoryVirtualHostRepo::new());
        let email = Arc::new(EmailUseCases::new(
            Arc::new(InMemoryEmailRepo::new()),
            Arc::new(RecordingMailSystem::new()),
        ));
        let provisioner = MailProvisioner::new(email, vhosts);

        let mut ctx = context(user_id);
        ctx.email_password = None;
        assert!(matches!(
            provisioner.provision(&ctx).await,
            Err(AppError::Crypto)
        ));
    }
}
