use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::adapters::system::{run_tool, trim_tool_output};
use crate::app_error::{AppError, AppResult};
use crate::application::ports::provisioner::{
    FailurePolicy, ProvisionContext, ResourceKind, ResourceProvisioner,
};
use crate::use_cases::virtual_host::{VhostSpec, VirtualHostUseCases, WebServerConfig};

/// Writes vhost config files into the directory the webserver includes and
/// triggers a graceful reload. The reload command may be empty (no reload;
/// used in development).
pub struct ApacheConfigAdapter {
    conf_dir: PathBuf,
    reload_cmd: String,
}

impl ApacheConfigAdapter {
    pub fn new(conf_dir: PathBuf, reload_cmd: String) -> Self {
        Self {
            conf_dir,
            reload_cmd,
        }
    }

    fn conf_path(&self, domain: &str, slot: i32) -> PathBuf {
        let file = if slot == 0 {
            format!("{domain}.conf")
        } else {
            format!("{domain}-site{slot}.conf")
        };
        self.conf_dir.join(file)
    }

    fn render(spec: &VhostSpec) -> String {
        let server_name = if spec.doc_root_slot == 0 {
            spec.domain.clone()
        } else {
            format!("site{}.{}", spec.doc_root_slot, spec.domain)
        };
        format!(
            r#"<VirtualHost *:80>
    ServerName {server_name}
    ServerAlias www.{server_name}
    DocumentRoot {doc_root}
    SuexecUserGroup {user} {user}
    ErrorLog ${{APACHE_LOG_DIR}}/{server_name}-error.log
    CustomLog ${{APACHE_LOG_DIR}}/{server_name}-access.log combined
    <Directory {doc_root}>
        Options -Indexes +FollowSymLinks
        AllowOverride All
        Require all granted
    </Directory>
</VirtualHost>
"#,
            doc_root = spec.doc_root,
            user = spec.system_user,
        )
    }

    async fn reload(&self) -> AppResult<()> {
        if self.reload_cmd.trim().is_empty() {
            return Ok(());
        }
        let mut parts = self.reload_cmd.split_whitespace();
        let program = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();
        let output = run_tool(program, &args, None).await?;
        if !output.status.success() {
            return Err(AppError::ExternalTool(format!(
                "webserver reload failed: {}",
                trim_tool_output(&output.stderr)
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl WebServerConfig for ApacheConfigAdapter {
    async fn write_vhost(&self, spec: &VhostSpec) -> AppResult<String> {
        let path = self.conf_path(&spec.domain, spec.doc_root_slot);
        let content = Self::render(spec);

        if let Ok(existing) = tokio::fs::read_to_string(&path).await {
            if existing == content {
                return Ok(format!("vhost config for {} already present", spec.domain));
            }
        }

        tokio::fs::create_dir_all(&self.conf_dir)
            .await
            .map_err(|e| AppError::ExternalTool(format!("config directory: {e}")))?;
        tokio::fs::write(&path, &content)
            .await
            .map_err(|e| AppError::ExternalTool(format!("writing vhost config: {e}")))?;

        if let Err(e) = self.reload().await {
            // A config the webserver refused to load must not be left in
            // the include directory.
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }

        Ok(format!("vhost config for {} written", spec.domain))
    }

    async fn remove_vhost(&self, domain: &str, doc_root_slot: i32) -> AppResult<String> {
        let path = self.conf_path(domain, doc_root_slot);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                self.reload().await?;
                Ok(format!("vhost config for {domain} removed"))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(format!("vhost config for {domain} already absent"))
            }
            Err(e) => Err(AppError::ExternalTool(format!(
                "removing vhost config: {e}"
            ))),
        }
    }
}

/// Provisioner face of the vhost workflow: delegates to the use case so a
/// provisioning run and a direct API call share one transaction discipline.
pub struct WebServerProvisioner {
    vhosts: Arc<VirtualHostUseCases>,
}

impl WebServerProvisioner {
    pub fn new(vhosts: Arc<VirtualHostUseCases>) -> Self {
        Self { vhosts }
    }
}

#[async_trait]
impl ResourceProvisioner for WebServerProvisioner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::WebServer
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Fatal
    }

    async fn provision(&self, ctx: &ProvisionContext) -> AppResult<String> {
        let (vhost, created) = self
            .vhosts
            .ensure(ctx.user_id, &ctx.domain, ctx.doc_root_slot, &ctx.system_user)
            .await?;
        Ok(if created {
            format!("virtual host {} created", vhost.domain)
        } else {
            format!("virtual host {} already exists", vhost.domain)
        })
    }

    async fn deprovision(&self, ctx: &ProvisionContext) -> AppResult<String> {
        let removed = self.vhosts.remove_by_domain(&ctx.domain).await?;
        Ok(if removed {
            format!("virtual host {} removed", ctx.domain)
        } else {
            format!("virtual host {} already absent", ctx.domain)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn adapter() -> (ApacheConfigAdapter, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        // Empty reload command: no webserver in the test environment.
        let adapter = ApacheConfigAdapter::new(dir.path().join("conf.d"), String::new());
        (adapter, dir)
    }

    fn spec(slot: i32) -> VhostSpec {
        VhostSpec {
            domain: "example.com".into(),
            doc_root: "/var/www/example/example.com".into(),
            doc_root_slot: slot,
            system_user: "example".into(),
        }
    }

    #[tokio::test]
    async fn writes_and_removes_config_files() {
        let (adapter, _dir) = adapter();
        adapter.write_vhost(&spec(0)).await.unwrap();

        let path = adapter.conf_path("example.com", 0);
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(content.contains("ServerName example.com"));
        assert!(content.contains("DocumentRoot /var/www/example/example.com"));
        assert!(content.contains("SuexecUserGroup example example"));

        adapter.remove_vhost("example.com", 0).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn rewriting_identical_config_is_success() {
        let (adapter, _dir) = adapter();
        adapter.write_vhost(&spec(0)).await.unwrap();
        let message = adapter.write_vhost(&spec(0)).await.unwrap();
        assert!(message.contains("already present"));
    }

    #[tokio::test]
    async fn removing_absent_config_is_success() {
        let (adapter, _dir) = adapter();
        let message = adapter.remove_vhost("example.com", 0).await.unwrap();
        assert!(message.contains("already absent"));
    }

    #[tokio::test]
    async fn slots_use_separate_files_and_server_names() {
        let (adapter, _dir) = adapter();
        adapter.write_vhost(&spec(0)).await.unwrap();
        adapter.write_vhost(&spec(2)).await.unwrap();

        assert!(adapter.conf_path("example.com", 0).exists());
        let slot_path = adapter.conf_path("example.com", 2);
        assert!(slot_path.exists());
        let content = tokio::fs::read_to_string(&slot_path).await.unwrap();
        assert!(content.contains("ServerName site2.example.com"));
    }

    #[tokio::test]
    async fn failed_reload_leaves_no_config_behind() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = ApacheConfigAdapter::new(
            dir.path().join("conf.d"),
            "/nonexistent/reload-tool".into(),
        );
        let err = adapter.write_vhost(&spec(0)).await.unwrap_err();
        assert!(matches!(err, AppError::ExternalTool(_)));
        assert!(!adapter.conf_path("example.com", 0).exists());
    }

    #[tokio::test]
    async fn provisioner_reports_existing_vhost_as_success() {
        use crate::test_utils::{InMemoryVirtualHostRepo, RecordingWebServer};
        use secrecy::SecretString;

        let repo = Arc::new(InMemoryVirtualHostRepo::new());
        let web = Arc::new(RecordingWebServer::new());
        let use_cases = Arc::new(VirtualHostUseCases::new(
            repo,
            web,
            PathBuf::from("/var/www"),
        ));
        let provisioner = WebServerProvisioner::new(use_cases);

        let ctx = ProvisionContext {
            request_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            domain: "example.com".into(),
            system_user: "example".into(),
            doc_root_slot: 0,
            server_password: SecretString::new("pw".into()),
            storage_quota_mb: 500,
            features: vec![],
            email_password: None,
            database_password: None,
        };

        let first = provisioner.provision(&ctx).await.unwrap();
        assert!(first.contains("created"));
        let second = provisioner.provision(&ctx).await.unwrap();
        assert!(second.contains("already exists"));

        let removed = provisioner.deprovision(&ctx).await.unwrap();
        assert!(removed.contains("removed"));
        let again = provisioner.deprovision(&ctx).await.unwrap();
        assert!(again.contains("already absent"));
    }
}
