use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::signup::Actor;
use crate::application::validators::{is_valid_domain, is_valid_system_username};
use crate::domain::entities::virtual_host::VirtualHost;

#[async_trait]
pub trait VirtualHostRepo: Send + Sync {
    /// Fails with `Conflict` when the domain already has a vhost.
    async fn create(&self, new: NewVirtualHost) -> AppResult<VirtualHost>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<VirtualHost>>;
    async fn get_by_domain(&self, domain: &str) -> AppResult<Option<VirtualHost>>;
    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<VirtualHost>>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

pub struct NewVirtualHost {
    pub user_id: Uuid,
    pub domain: String,
    pub doc_root: String,
    pub doc_root_slot: i32,
    pub system_user: String,
}

#[derive(Debug, Clone)]
pub struct VhostSpec {
    pub domain: String,
    pub doc_root: String,
    pub doc_root_slot: i32,
    pub system_user: String,
}

/// Webserver-configuration side of a vhost; implemented by the conf-dir
/// adapter.
#[async_trait]
pub trait WebServerConfig: Send + Sync {
    /// Idempotent: rewriting an identical config reports success.
    async fn write_vhost(&self, spec: &VhostSpec) -> AppResult<String>;
    /// Idempotent: removing absent config reports success.
    async fn remove_vhost(&self, domain: &str, doc_root_slot: i32) -> AppResult<String>;
}

#[derive(Clone)]
pub struct VirtualHostUseCases {
    repo: Arc<dyn VirtualHostRepo>,
    web: Arc<dyn WebServerConfig>,
    web_root: PathBuf,
}

impl VirtualHostUseCases {
    pub fn new(
        repo: Arc<dyn VirtualHostRepo>,
        web: Arc<dyn WebServerConfig>,
        web_root: PathBuf,
    ) -> Self {
        Self {
            repo,
            web,
            web_root,
        }
    }

    pub fn doc_root_for(&self, system_user: &str, domain: &str, slot: i32) -> String {
        let mut path = self.web_root.join(system_user).join(domain);
        if slot > 0 {
            path = path.join(format!("site{slot}"));
        }
        path.to_string_lossy().into_owned()
    }

    /// The external side effect comes first; the record is only persisted
    /// once the webserver accepted the configuration. If persistence then
    /// fails, the configuration is removed again before the error
    /// surfaces — no orphaned external config.
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        user_id: Uuid,
        domain: &str,
        doc_root_slot: i32,
        system_user: &str,
    ) -> AppResult<VirtualHost> {
        let domain = domain.trim().to_lowercase();
        if !is_valid_domain(&domain) {
            return Err(AppError::InvalidInput(
                "Please enter a valid domain name (e.g. example.com)".into(),
            ));
        }
        if doc_root_slot < 0 {
            return Err(AppError::InvalidInput(
                "Document-root slot must not be negative".into(),
            ));
        }
        if !is_valid_system_username(system_user) {
            return Err(AppError::InvalidInput("Invalid system username".into()));
        }

        let spec = VhostSpec {
            domain: domain.clone(),
            doc_root: self.doc_root_for(system_user, &domain, doc_root_slot),
            doc_root_slot,
            system_user: system_user.to_string(),
        };
        self.web.write_vhost(&spec).await?;

        match self
            .repo
            .create(NewVirtualHost {
                user_id,
                domain: domain.clone(),
                doc_root: spec.doc_root.clone(),
                doc_root_slot,
                system_user: system_user.to_string(),
            })
            .await
        {
            Ok(vhost) => Ok(vhost),
            Err(e) => {
                // Compensating removal. If this also fails the config is
                // orphaned and needs operator cleanup; the original error
                // is still the one that surfaces.
                if let Err(cleanup) = self.web.remove_vhost(&domain, doc_root_slot).await {
                    tracing::error!(
                        domain = %domain,
                        error = %cleanup,
                        "Orphaned webserver config: compensating removal failed"
                    );
                }
                Err(e)
            }
        }
    }

    /// Idempotent variant for provisioning runs: an existing vhost owned by
    /// the same user is success, and its config is rewritten to heal drift
    /// between the webserver and the record.
    #[instrument(skip(self))]
    pub async fn ensure(
        &self,
        user_id: Uuid,
        domain: &str,
        doc_root_slot: i32,
        system_user: &str,
    ) -> AppResult<(VirtualHost, bool)> {
        if let Some(existing) = self.repo.get_by_domain(domain).await? {
            if existing.user_id != user_id {
                return Err(AppError::Conflict(
                    "Domain is already provisioned for another account".into(),
                ));
            }
            let spec = VhostSpec {
                domain: existing.domain.clone(),
                doc_root: existing.doc_root.clone(),
                doc_root_slot: existing.doc_root_slot,
                system_user: existing.system_user.clone(),
            };
            self.web.write_vhost(&spec).await?;
            return Ok((existing, false));
        }
        self.create(user_id, domain, doc_root_slot, system_user)
            .await
            .map(|v| (v, true))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, actor: Actor, id: Uuid) -> AppResult<VirtualHost> {
        let vhost = self.repo.get_by_id(id).await?.ok_or(AppError::NotFound)?;
        if vhost.user_id != actor.id && !actor.admin {
            return Err(AppError::NotFound);
        }
        Ok(vhost)
    }

    #[instrument(skip(self))]
    pub async fn list(&self, actor: Actor) -> AppResult<Vec<VirtualHost>> {
        self.repo.list_by_user(actor.id).await
    }

    /// Mirror of create: external removal first. The row is only deleted
    /// for configuration that is actually gone; a removal failure keeps
    /// the record and surfaces.
    #[instrument(skip(self))]
    pub async fn delete(&self, actor: Actor, id: Uuid) -> AppResult<()> {
        let vhost = self.get(actor, id).await?;
        self.web
            .remove_vhost(&vhost.domain, vhost.doc_root_slot)
            .await?;
        self.repo.delete(vhost.id).await
    }

    /// Deprovisioning path, keyed by domain; an absent vhost is success.
    #[instrument(skip(self))]
    pub async fn remove_by_domain(&self, domain: &str) -> AppResult<bool> {
        let Some(vhost) = self.repo.get_by_domain(domain).await? else {
            return Ok(false);
        };
        self.web
            .remove_vhost(&vhost.domain, vhost.doc_root_slot)
            .await?;
        self.repo.delete(vhost.id).await?;
        Ok(true)
    }
}
