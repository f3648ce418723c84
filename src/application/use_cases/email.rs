use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::instrument;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::domain::entities::email::{EmailAccount, EmailDomain};

#[async_trait]
pub trait EmailRepo: Send + Sync {
    /// Fails with `Conflict` when the domain already exists.
    async fn create_domain(&self, virtual_host_id: Uuid, domain: &str) -> AppResult<EmailDomain>;
    async fn get_domain_by_name(&self, domain: &str) -> AppResult<Option<EmailDomain>>;
    /// Fails with `Conflict` when the mailbox already exists on the domain.
    async fn create_account(
        &self,
        email_domain_id: Uuid,
        username: &str,
        quota_mb: i64,
    ) -> AppResult<EmailAccount>;
    async fn list_accounts(&self, email_domain_id: Uuid) -> AppResult<Vec<EmailAccount>>;
    /// Removes the domain row; account rows cascade with it.
    async fn delete_domain(&self, id: Uuid) -> AppResult<()>;
}

/// Admin interface of the external mail system. Implementations treat
/// already-existing resources on create, and absent ones on delete, as
/// success.
#[async_trait]
pub trait MailSystem: Send + Sync {
    async fn create_domain(&self, domain: &str) -> AppResult<()>;
    async fn create_account(
        &self,
        domain: &str,
        username: &str,
        password: &SecretString,
        quota_mb: i64,
    ) -> AppResult<()>;
    async fn delete_account(&self, domain: &str, username: &str) -> AppResult<()>;
    async fn delete_domain(&self, domain: &str) -> AppResult<()>;
}

#[derive(Clone)]
pub struct EmailUseCases {
    repo: Arc<dyn EmailRepo>,
    mail: Arc<dyn MailSystem>,
}

impl EmailUseCases {
    pub fn new(repo: Arc<dyn EmailRepo>, mail: Arc<dyn MailSystem>) -> Self {
        Self { repo, mail }
    }

    /// Create the mail domain at the mail system and record it; an existing
    /// record under the same vhost is success.
    #[instrument(skip(self))]
    pub async fn ensure_domain(
        &self,
        virtual_host_id: Uuid,
        domain: &str,
    ) -> AppResult<EmailDomain> {
        self.mail.create_domain(domain).await?;
        if let Some(existing) = self.repo.get_domain_by_name(domain).await? {
            if existing.virtual_host_id != virtual_host_id {
                return Err(AppError::Conflict(
                    "Mail domain belongs to another virtual host".into(),
                ));
            }
            return Ok(existing);
        }
        self.repo.create_domain(virtual_host_id, domain).await
    }

    /// Create the mailbox at the mail system and record it; an existing
    /// record is success.
    #[instrument(skip(self, password))]
    pub async fn ensure_account(
        &self,
        email_domain: &EmailDomain,
        username: &str,
        password: &SecretString,
        quota_mb: i64,
    ) -> AppResult<EmailAccount> {
        self.mail
            .create_account(&email_domain.domain, username, password, quota_mb)
            .await?;
        let existing = self
            .repo
            .list_accounts(email_domain.id)
            .await?
            .into_iter()
            .find(|a| a.username == username);
        match existing {
            Some(account) => Ok(account),
            None => {
                self.repo
                    .create_account(email_domain.id, username, quota_mb)
                    .await
            }
        }
    }

    /// Deleting a mail domain carries the intent to the external mail
    /// system: every account is removed there first, then the domain, and
    /// only then the rows. An external failure aborts before any row is
    /// touched.
    #[instrument(skip(self))]
    pub async fn delete_domain_cascade(&self, domain: &str) -> AppResult<bool> {
        let Some(email_domain) = self.repo.get_domain_by_name(domain).await? else {
            // No record; still ask the mail system to forget the domain so
            // repeated deprovisioning converges.
            self.mail.delete_domain(domain).await?;
            return Ok(false);
        };

        for account in self.repo.list_accounts(email_domain.id).await? {
            self.mail
                .delete_account(&email_domain.domain, &account.username)
                .await?;
        }
        self.mail.delete_domain(&email_domain.domain).await?;
        self.repo.delete_domain(email_domain.id).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{InMemoryEmailRepo, RecordingMailSystem};

    fn use_cases() -> (EmailUseCases, Arc<InMemoryEmailRepo>, Arc<RecordingMailSystem>) {
        let repo = Arc::new(InMemoryEmailRepo::new());
        let mail = Arc::new(RecordingMailSystem::new());
        (EmailUseCases::new(repo.clone(), mail.clone()), repo, mail)
    }

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.into())
    }

    #[tokio::test]
    async fn ensure_domain_and_account_are_idempotent() {
        let (uc, repo, mail) = use_cases();
        let vhost_id = Uuid::new_v4();

        let d1 = uc.ensure_domain(vhost_id, "example.com").await.unwrap();
        let d2 = uc.ensure_domain(vhost_id, "example.com").await.unwrap();
        assert_eq!(d1.id, d2.id);
        assert_eq!(repo.domain_count(), 1);

        let a1 = uc
            .ensure_account(&d1, "info", &secret("pw"), 512)
            .await
            .unwrap();
        let a2 = uc
            .ensure_account(&d1, "info", &secret("pw"), 512)
            .await
            .unwrap();
        assert_eq!(a1.id, a2.id);
        assert_eq!(repo.account_count(), 1);
        assert!(mail.has_account("example.com", "info"));
    }

    #[tokio::test]
    async fn domain_owned_by_another_vhost_conflicts() {
        let (uc, _, _) = use_cases();
        uc.ensure_domain(Uuid::new_v4(), "example.com").await.unwrap();
        assert!(matches!(
            uc.ensure_domain(Uuid::new_v4(), "example.com").await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn cascade_removes_accounts_at_the_mail_system_first() {
        let (uc, repo, mail) = use_cases();
        let vhost_id = Uuid::new_v4();
        let domain = uc.ensure_domain(vhost_id, "example.com").await.unwrap();
        uc.ensure_account(&domain, "info", &secret("pw"), 512)
            .await
            .unwrap();
        uc.ensure_account(&domain, "sales", &secret("pw"), 512)
            .await
            .unwrap();

        let removed = uc.delete_domain_cascade("example.com").await.unwrap();
        assert!(removed);
        assert_eq!(repo.domain_count(), 0);
        assert_eq!(repo.account_count(), 0);

        // Accounts deleted before the domain, all at the external system.
        let ops = mail.operations();
        let del_ops: Vec<&str> = ops
            .iter()
            .filter(|op| op.starts_with("delete"))
            .map(String::as_str)
            .collect();
        assert_eq!(del_ops.last().copied(), Some("delete_domain example.com"));
        assert!(del_ops.contains(&"delete_account info@example.com"));
        assert!(del_ops.contains(&"delete_account sales@example.com"));
    }

    #[tokio::test]
    async fn external_failure_keeps_the_rows() {
        let (uc, repo, mail) = use_cases();
        let domain = uc
            .ensure_domain(Uuid::new_v4(), "example.com")
            .await
            .unwrap();
        uc.ensure_account(&domain, "info", &secret("pw"), 512)
            .await
            .unwrap();

        mail.fail_next("mail admin API unreachable");
        assert!(uc.delete_domain_cascade("example.com").await.is_err());

        // Rows intact: the removal intent did not reach the mail system.
        assert_eq!(repo.domain_count(), 1);
        assert_eq!(repo.account_count(), 1);
    }

    #[tokio::test]
    async fn cascade_of_unknown_domain_converges() {
        let (uc, _, mail) = use_cases();
        let removed = uc.delete_domain_cascade("ghost.example").await.unwrap();
        assert!(!removed);
        assert!(
            mail.operations()
                .contains(&"delete_domain ghost.example".to_string())
        );
    }
}
