use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::ports::provisioner::{ResourceKind, StepAction, StepStatus},
    use_cases::provisioning::{ProvisionLogEntry, ProvisionLogRepo},
};

fn row_to_entry(row: sqlx::postgres::PgRow) -> ProvisionLogEntry {
    let step: String = row.get("step");
    let action: String = row.get("action");
    let status: String = row.get("status");
    ProvisionLogEntry {
        id: row.get("id"),
        request_id: row.get("request_id"),
        step: step.parse().unwrap_or(ResourceKind::LinuxAccount),
        action: action.parse().unwrap_or(StepAction::Create),
        status: status.parse().unwrap_or(StepStatus::Failed),
        message: row.get("message"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl ProvisionLogRepo for PostgresPersistence {
    async fn append(
        &self,
        request_id: Uuid,
        step: ResourceKind,
        action: StepAction,
        status: StepStatus,
        message: &str,
    ) -> AppResult<()> {
        // Append-only by construction: nothing in this adapter updates or
        // deletes provisioning_log rows.
        sqlx::query(
            r#"
                INSERT INTO provisioning_log (id, request_id, step, action, status, message)
                VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request_id)
        .bind(step.as_ref())
        .bind(action.as_ref())
        .bind(status.as_ref())
        .bind(message)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn list_for_request(&self, request_id: Uuid) -> AppResult<Vec<ProvisionLogEntry>> {
        let rows = sqlx::query(
            "SELECT id, request_id, step, action, status, message, created_at FROM provisioning_log WHERE request_id = $1 ORDER BY seq",
        )
        .bind(request_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_entry).collect())
    }
}
