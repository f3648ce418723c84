use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::app_error::{AppError, AppResult};

pub mod database;
pub mod dns_zone;
pub mod linux_account;
pub mod mail;
pub mod quota;
pub mod ssl;
pub mod web_server;

const MAX_TOOL_OUTPUT: usize = 300;

/// Run an external tool, optionally feeding it stdin. A tool that cannot be
/// spawned (absent binary) is an `ExternalTool` error like any other
/// failure; callers with a never-raise contract handle that themselves.
pub(crate) async fn run_tool(
    program: &str,
    args: &[&str],
    stdin: Option<&str>,
) -> AppResult<std::process::Output> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|e| AppError::ExternalTool(format!("{program}: {e}")))?;

    if let Some(input) = stdin {
        let mut handle = child
            .stdin
            .take()
            .ok_or_else(|| AppError::ExternalTool(format!("{program}: stdin unavailable")))?;
        handle
            .write_all(input.as_bytes())
            .await
            .map_err(|e| AppError::ExternalTool(format!("{program}: {e}")))?;
        drop(handle);
    }

    child
        .wait_with_output()
        .await
        .map_err(|e| AppError::ExternalTool(format!("{program}: {e}")))
}

/// Trim tool output for audit-log messages: first line, capped length.
pub(crate) fn trim_tool_output(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let mut out = line.trim().to_string();
    if out.len() > MAX_TOOL_OUTPUT {
        out.truncate(MAX_TOOL_OUTPUT);
        out.push_str("...");
    }
    out
}
