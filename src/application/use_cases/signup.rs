use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::validators::{
    is_valid_database_name, is_valid_domain, is_valid_email, is_valid_system_username,
};
use crate::domain::entities::signup_request::{
    DatabaseAccountRequest, EmailAccountRequest, FeatureRequest, ProvisionOutcome, SignupStatus,
};
use crate::infra::crypto::SecretVault;

#[async_trait]
pub trait SignupRepo: Send + Sync {
    /// Fails with `Conflict` when the domain is already requested.
    async fn create(&self, new: NewSignup) -> AppResult<SignupProfile>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SignupProfile>>;
    async fn get_by_domain(&self, domain: &str) -> AppResult<Option<SignupProfile>>;
    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<SignupProfile>>;
    async fn list_all(&self) -> AppResult<Vec<SignupProfile>>;
    /// Transition pending -> approved, setting approved_by/approved_at
    /// atomically with the status change. `Conflict` when not pending.
    async fn approve(
        &self,
        id: Uuid,
        admin_id: Uuid,
        comment: Option<&str>,
    ) -> AppResult<SignupProfile>;
    /// Transition pending -> rejected. `Conflict` when not pending.
    async fn reject(
        &self,
        id: Uuid,
        admin_id: Uuid,
        comment: Option<&str>,
    ) -> AppResult<SignupProfile>;
    /// Written only by the orchestrator; never reopens `status`.
    async fn set_outcome(&self, id: Uuid, outcome: ProvisionOutcome) -> AppResult<()>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

/// The authenticated caller, as seen by the use-case layer.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub admin: bool,
}

#[derive(Debug, Clone)]
pub struct SignupProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub domain: String,
    pub server_password_encrypted: String,
    pub features: Vec<FeatureRequest>,
    pub storage_quota_mb: i64,
    pub status: SignupStatus,
    pub outcome: Option<ProvisionOutcome>,
    pub admin_comment: Option<String>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<NaiveDateTime>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl SignupProfile {
    pub fn wants_ssl(&self) -> bool {
        self.features.contains(&FeatureRequest::Ssl)
    }

    pub fn wants_dns(&self) -> bool {
        self.features.contains(&FeatureRequest::Dns)
    }

    pub fn email_request(&self) -> Option<&EmailAccountRequest> {
        self.features.iter().find_map(|f| match f {
            FeatureRequest::Email(r) => Some(r),
            _ => None,
        })
    }

    pub fn database_request(&self) -> Option<&DatabaseAccountRequest> {
        self.features.iter().find_map(|f| match f {
            FeatureRequest::Database(r) => Some(r),
            _ => None,
        })
    }
}

pub struct NewSignup {
    pub user_id: Uuid,
    pub domain: String,
    pub server_password_encrypted: String,
    pub features: Vec<FeatureRequest>,
    pub storage_quota_mb: i64,
}

pub struct EmailAccountInput {
    pub username: String,
    pub quota_mb: i64,
    pub password: String,
}

pub struct DatabaseAccountInput {
    pub name: String,
    pub username: String,
    pub password: String,
}

pub struct SubmitSignup {
    pub domain: String,
    pub server_password: String,
    pub storage_quota_mb: i64,
    pub want_ssl: bool,
    pub want_dns: bool,
    pub email: Option<EmailAccountInput>,
    pub database: Option<DatabaseAccountInput>,
}

#[derive(Clone)]
pub struct SignupUseCases {
    repo: Arc<dyn SignupRepo>,
    vault: Arc<SecretVault>,
}

impl SignupUseCases {
    pub fn new(repo: Arc<dyn SignupRepo>, vault: Arc<SecretVault>) -> Self {
        Self { repo, vault }
    }

    #[instrument(skip(self, input), fields(domain = %input.domain))]
    pub async fn submit(&self, user_id: Uuid, input: SubmitSignup) -> AppResult<SignupProfile> {
        let domain = input.domain.trim().to_lowercase();
        if !is_valid_domain(&domain) {
            return Err(AppError::InvalidInput(
                "Please enter a valid domain name (e.g. example.com)".into(),
            ));
        }
        if input.server_password.is_empty() {
            return Err(AppError::InvalidInput("Server password is required".into()));
        }
        if input.storage_quota_mb <= 0 {
            return Err(AppError::InvalidInput(
                "Storage quota must be a positive number of megabytes".into(),
            ));
        }

        let mut features = Vec::new();
        if input.want_ssl {
            features.push(FeatureRequest::Ssl);
        }
        if input.want_dns {
            features.push(FeatureRequest::Dns);
        }
        if let Some(email) = &input.email {
            if !is_valid_system_username(&email.username)
                || !is_valid_email(&format!("{}@{}", email.username, domain))
            {
                return Err(AppError::InvalidInput("Invalid mailbox name".into()));
            }
            if email.quota_mb <= 0 {
                return Err(AppError::InvalidInput("Invalid mailbox quota".into()));
            }
            if email.password.is_empty() {
                return Err(AppError::InvalidInput("Mailbox password is required".into()));
            }
            features.push(FeatureRequest::Email(EmailAccountRequest {
                username: email.username.clone(),
                quota_mb: email.quota_mb,
                password_encrypted: self.vault.encrypt(&email.password)?,
            }));
        }
        if let Some(db) = &input.database {
            if !is_valid_database_name(&db.name) || !is_valid_database_name(&db.username) {
                return Err(AppError::InvalidInput(
                    "Database and database user names must be lowercase identifiers".into(),
                ));
            }
            if db.password.is_empty() {
                return Err(AppError::InvalidInput(
                    "Database password is required".into(),
                ));
            }
            features.push(FeatureRequest::Database(DatabaseAccountRequest {
                name: db.name.clone(),
                username: db.username.clone(),
                password_encrypted: self.vault.encrypt(&db.password)?,
            }));
        }

        // Surface a duplicate before doing any work; the unique constraint
        // remains the backstop for races.
        if self.repo.get_by_domain(&domain).await?.is_some() {
            return Err(AppError::Conflict(
                "A hosting request for this domain already exists".into(),
            ));
        }

        self.repo
            .create(NewSignup {
                user_id,
                domain,
                server_password_encrypted: self.vault.encrypt(&input.server_password)?,
                features,
                storage_quota_mb: input.storage_quota_mb,
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, actor: Actor, id: Uuid) -> AppResult<SignupProfile> {
        let signup = self.repo.get_by_id(id).await?.ok_or(AppError::NotFound)?;
        if signup.user_id != actor.id && !actor.admin {
            return Err(AppError::NotFound);
        }
        Ok(signup)
    }

    #[instrument(skip(self))]
    pub async fn list(&self, actor: Actor, all: bool) -> AppResult<Vec<SignupProfile>> {
        if all && actor.admin {
            self.repo.list_all().await
        } else {
            self.repo.list_by_user(actor.id).await
        }
    }

    #[instrument(skip(self, comment))]
    pub async fn approve(
        &self,
        actor: Actor,
        id: Uuid,
        comment: Option<&str>,
    ) -> AppResult<SignupProfile> {
        if !actor.admin {
            return Err(AppError::Forbidden);
        }
        self.repo.approve(id, actor.id, comment).await
    }

    #[instrument(skip(self, comment))]
    pub async fn reject(
        &self,
        actor: Actor,
        id: Uuid,
        comment: Option<&str>,
    ) -> AppResult<SignupProfile> {
        if !actor.admin {
            return Err(AppError::Forbidden);
        }
        self.repo.reject(id, actor.id, comment).await
    }

    /// Physical deletion; administrative purge only.
    #[instrument(skip(self))]
    pub async fn purge(&self, actor: Actor, id: Uuid) -> AppResult<()> {
        if !actor.admin {
            return Err(AppError::Forbidden);
        }
        self.repo.delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{InMemorySignupRepo, test_vault};

    fn use_cases() -> (SignupUseCases, Arc<InMemorySignupRepo>, Arc<SecretVault>) {
        let repo = Arc::new(InMemorySignupRepo::new());
        let vault = Arc::new(test_vault());
        (
            SignupUseCases::new(repo.clone(), vault.clone()),
            repo,
            vault,
        )
    }

    fn submit_input(domain: &str) -> SubmitSignup {
        SubmitSignup {
            domain: domain.to_string(),
            server_password: "hunter2".into(),
            storage_quota_mb: 500,
            want_ssl: true,
            want_dns: false,
            email: None,
            database: None,
        }
    }

    #[tokio::test]
    async fn submit_stores_encrypted_password() {
        let (uc, _, vault) = use_cases();
        let signup = uc
            .submit(Uuid::new_v4(), submit_input("example.com"))
            .await
            .unwrap();

        assert_eq!(signup.status, SignupStatus::Pending);
        assert_ne!(signup.server_password_encrypted, "hunter2");
        assert_eq!(
            vault.decrypt(&signup.server_password_encrypted).unwrap(),
            "hunter2"
        );
    }

    #[tokio::test]
    async fn submit_encrypts_feature_passwords() {
        let (uc, _, vault) = use_cases();
        let mut input = submit_input("example.com");
        input.email = Some(EmailAccountInput {
            username: "info".into(),
            quota_mb: 1024,
            password: "mail-secret".into(),
        });
        input.database = Some(DatabaseAccountInput {
            name: "shopdb".into(),
            username: "shop".into(),
            password: "db-secret".into(),
        });

        let signup = uc.submit(Uuid::new_v4(), input).await.unwrap();
        let email = signup.email_request().unwrap();
        assert_ne!(email.password_encrypted, "mail-secret");
        assert_eq!(vault.decrypt(&email.password_encrypted).unwrap(), "mail-secret");
        let db = signup.database_request().unwrap();
        assert_eq!(vault.decrypt(&db.password_encrypted).unwrap(), "db-secret");
    }

    #[tokio::test]
    async fn duplicate_domain_conflicts() {
        let (uc, _, _) = use_cases();
        uc.submit(Uuid::new_v4(), submit_input("example.com"))
            .await
            .unwrap();
        let err = uc
            .submit(Uuid::new_v4(), submit_input("example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn rejects_invalid_domains() {
        let (uc, _, _) = use_cases();
        for bad in ["", "nodots", "UPPER.com", "-x.com"] {
            let err = uc
                .submit(Uuid::new_v4(), submit_input(bad))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidInput(_)), "domain {bad:?}");
        }
    }

    #[tokio::test]
    async fn approval_requires_admin() {
        let (uc, repo, _) = use_cases();
        let user_id = Uuid::new_v4();
        let signup = uc.submit(user_id, submit_input("example.com")).await.unwrap();

        let actor = Actor {
            id: user_id,
            admin: false,
        };
        assert!(matches!(
            uc.approve(actor, signup.id, None).await,
            Err(AppError::Forbidden)
        ));

        // State unchanged.
        let unchanged = repo.get_by_id(signup.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, SignupStatus::Pending);
        assert!(unchanged.approved_by.is_none());
    }

    #[tokio::test]
    async fn approval_sets_admin_and_timestamp_together() {
        let (uc, _, _) = use_cases();
        let signup = uc
            .submit(Uuid::new_v4(), submit_input("example.com"))
            .await
            .unwrap();

        let admin = Actor {
            id: Uuid::new_v4(),
            admin: true,
        };
        let approved = uc.approve(admin, signup.id, Some("looks good")).await.unwrap();
        assert_eq!(approved.status, SignupStatus::Approved);
        assert_eq!(approved.approved_by, Some(admin.id));
        assert!(approved.approved_at.is_some());
        assert_eq!(approved.admin_comment.as_deref(), Some("looks good"));
    }

    #[tokio::test]
    async fn terminal_states_cannot_transition_again() {
        let (uc, _, _) = use_cases();
        let admin = Actor {
            id: Uuid::new_v4(),
            admin: true,
        };

        let a = uc
            .submit(Uuid::new_v4(), submit_input("one.com"))
            .await
            .unwrap();
        uc.approve(admin, a.id, None).await.unwrap();
        assert!(matches!(
            uc.approve(admin, a.id, None).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            uc.reject(admin, a.id, None).await,
            Err(AppError::Conflict(_))
        ));

        let b = uc
            .submit(Uuid::new_v4(), submit_input("two.com"))
            .await
            .unwrap();
        uc.reject(admin, b.id, Some("no")).await.unwrap();
        assert!(matches!(
            uc.approve(admin, b.id, None).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn non_owner_cannot_read_someone_elses_request() {
        let (uc, _, _) = use_cases();
        let owner = Uuid::new_v4();
        let signup = uc.submit(owner, submit_input("example.com")).await.unwrap();

        let stranger = Actor {
            id: Uuid::new_v4(),
            admin: false,
        };
        assert!(matches!(
            uc.get(stranger, signup.id).await,
            Err(AppError::NotFound)
        ));

        let admin = Actor {
            id: Uuid::new_v4(),
            admin: true,
        };
        assert!(uc.get(admin, signup.id).await.is_ok());
    }
}
