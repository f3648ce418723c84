use std::path::PathBuf;

use async_trait::async_trait;
use secrecy::ExposeSecret;

use crate::adapters::system::{run_tool, trim_tool_output};
use crate::app_error::{AppError, AppResult};
use crate::application::ports::provisioner::{
    FailurePolicy, ProvisionContext, ResourceKind, ResourceProvisioner,
};

// useradd(8) / userdel(8) exit codes.
const USERADD_ALREADY_EXISTS: i32 = 9;
const USERDEL_NO_SUCH_USER: i32 = 6;

pub struct LinuxAccountProvisioner {
    home_root: PathBuf,
}

impl LinuxAccountProvisioner {
    pub fn new(home_root: PathBuf) -> Self {
        Self { home_root }
    }

    async fn set_password(&self, ctx: &ProvisionContext) -> AppResult<()> {
        // chpasswd reads "user:password" from stdin, so the secret never
        // appears on a command line.
        let input = format!(
            "{}:{}\n",
            ctx.system_user,
            ctx.server_password.expose_secret()
        );
        let output = run_tool("chpasswd", &[], Some(&input)).await?;
        if !output.status.success() {
            return Err(AppError::ExternalTool(format!(
                "chpasswd failed: {}",
                trim_tool_output(&output.stderr)
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceProvisioner for LinuxAccountProvisioner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::LinuxAccount
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Fatal
    }

    async fn provision(&self, ctx: &ProvisionContext) -> AppResult<String> {
        let home = self.home_root.join(&ctx.system_user);
        let home = home.to_string_lossy();
        let output = run_tool(
            "useradd",
            &["-m", "-d", &home, "-s", "/bin/bash", &ctx.system_user],
            None,
        )
        .await?;

        let already_existed = match output.status.code() {
            Some(0) => false,
            Some(USERADD_ALREADY_EXISTS) => true,
            _ => {
                return Err(AppError::ExternalTool(format!(
                    "useradd failed: {}",
                    trim_tool_output(&output.stderr)
                )));
            }
        };

        // Re-applying the password keeps retries convergent.
        self.set_password(ctx).await?;

        Ok(if already_existed {
            format!("account {} already exists", ctx.system_user)
        } else {
            format!("account {} created", ctx.system_user)
        })
    }

    async fn deprovision(&self, ctx: &ProvisionContext) -> AppResult<String> {
        let output = run_tool("userdel", &["-r", &ctx.system_user], None).await?;
        match output.status.code() {
            Some(0) => Ok(format!("account {} removed", ctx.system_user)),
            Some(USERDEL_NO_SUCH_USER) => {
                Ok(format!("account {} already absent", ctx.system_user))
            }
            _ => Err(AppError::ExternalTool(format!(
                "userdel failed: {}",
                trim_tool_output(&output.stderr)
            ))),
        }
    }
}
