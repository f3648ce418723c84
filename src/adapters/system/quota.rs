use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::adapters::system::run_tool;
use crate::app_error::{AppError, AppResult};
use crate::application::ports::provisioner::{
    FailurePolicy, ProvisionContext, ResourceKind, ResourceProvisioner,
};

/// Best-effort filesystem quota control. Argument violations are caller
/// bugs and raise `InvalidInput`; every environmental failure mode —
/// non-Linux host, missing tooling, unresolvable backing device, tool
/// timeout — degrades to `Ok(false)` and never raises.
pub struct QuotaController {
    tool: String,
    home_root: PathBuf,
    timeout: Duration,
}

impl QuotaController {
    pub fn new(tool: String, home_root: PathBuf, timeout: Duration) -> Self {
        Self {
            tool,
            home_root,
            timeout,
        }
    }

    /// Backing device of a mount point, from a `df -P` report: column 1 of
    /// the first data row. An empty or malformed report is unresolved.
    fn parse_backing_device(report: &str) -> Option<String> {
        let mut lines = report.lines();
        lines.next()?; // header
        let device = lines.next()?.split_whitespace().next()?;
        if device.is_empty() {
            None
        } else {
            Some(device.to_string())
        }
    }

    /// Apply `quota_mb` as both soft and hard block limit (1K blocks, no
    /// inode limits). Returns whether the quota was actually applied.
    pub async fn set_user_quota(&self, username: &str, quota_mb: Option<u64>) -> AppResult<bool> {
        let Some(quota_mb) = quota_mb else {
            return Err(AppError::InvalidInput("quota_mb is required".into()));
        };
        if username.trim().is_empty() {
            return Err(AppError::InvalidInput("username must not be empty".into()));
        }

        if !cfg!(target_os = "linux") {
            debug!("quota tooling requires Linux; skipping");
            return Ok(false);
        }

        match tokio::time::timeout(self.timeout, self.apply(username, quota_mb)).await {
            Ok(applied) => Ok(applied),
            Err(_) => {
                warn!(username = %username, "quota tooling timed out");
                Ok(false)
            }
        }
    }

    async fn apply(&self, username: &str, quota_mb: u64) -> bool {
        let home = self.home_root.join(username);
        let home = home.to_string_lossy();

        let report = match run_tool("df", &["-P", &home], None).await {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).into_owned()
            }
            Ok(output) => {
                debug!(home = %home, code = ?output.status.code(), "df reported failure");
                return false;
            }
            Err(e) => {
                debug!(error = %e, "df unavailable");
                return false;
            }
        };

        let Some(device) = Self::parse_backing_device(&report) else {
            debug!(home = %home, "backing device unresolved");
            return false;
        };

        // Soft and hard limits are always identical; no grace-period
        // distinction.
        let blocks = (quota_mb * 1024).to_string();
        match run_tool(
            &self.tool,
            &["-u", username, &blocks, &blocks, "0", "0", &device],
            None,
        )
        .await
        {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                warn!(
                    username = %username,
                    device = %device,
                    code = ?output.status.code(),
                    "quota tool reported failure"
                );
                false
            }
            Err(e) => {
                debug!(error = %e, "quota tool unavailable");
                false
            }
        }
    }
}

/// Provisioner face: an unapplied quota is a recorded, best-effort step
/// failure rather than a silent success, so partial environments stay
/// visible in the audit trail.
pub struct QuotaProvisioner {
    controller: Arc<QuotaController>,
}

impl QuotaProvisioner {
    pub fn new(controller: Arc<QuotaController>) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl ResourceProvisioner for QuotaProvisioner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Quota
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::BestEffort
    }

    async fn provision(&self, ctx: &ProvisionContext) -> AppResult<String> {
        let applied = self
            .controller
            .set_user_quota(&ctx.system_user, Some(ctx.storage_quota_mb as u64))
            .await?;
        if applied {
            Ok(format!(
                "disk quota of {} MB applied to {}",
                ctx.storage_quota_mb, ctx.system_user
            ))
        } else {
            Err(AppError::ExternalTool(
                "quota tooling unavailable on this host".into(),
            ))
        }
    }

    async fn deprovision(&self, ctx: &ProvisionContext) -> AppResult<String> {
        // Zero limits clear the quota; an absent tool leaves nothing to undo.
        let applied = self
            .controller
            .set_user_quota(&ctx.system_user, Some(0))
            .await?;
        Ok(if applied {
            format!("disk quota removed from {}", ctx.system_user)
        } else {
            "quota tooling unavailable; nothing to remove".into()
        })
    }
}
