use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_json_with_fallback},
    app_error::{AppError, AppResult},
    domain::entities::signup_request::{ProvisionOutcome, SignupStatus},
    use_cases::signup::{NewSignup, SignupProfile, SignupRepo},
};

const COLUMNS: &str = "id, user_id, domain, server_password_encrypted, features, \
     storage_quota_mb, status, outcome, admin_comment, approved_by, approved_at, \
     created_at, updated_at";

fn row_to_profile(row: sqlx::postgres::PgRow) -> SignupProfile {
    let id: Uuid = row.get("id");
    let features_json: serde_json::Value = row.get("features");
    let outcome: Option<String> = row.get("outcome");
    SignupProfile {
        id,
        user_id: row.get("user_id"),
        domain: row.get("domain"),
        server_password_encrypted: row.get("server_password_encrypted"),
        features: parse_json_with_fallback(
            &features_json,
            "features",
            "signup_request",
            &id.to_string(),
        ),
        storage_quota_mb: row.get("storage_quota_mb"),
        status: SignupStatus::from_str(row.get("status")),
        outcome: outcome.as_deref().and_then(ProvisionOutcome::from_str),
        admin_comment: row.get("admin_comment"),
        approved_by: row.get("approved_by"),
        approved_at: row.get("approved_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl SignupRepo for PostgresPersistence {
    async fn create(&self, new: NewSignup) -> AppResult<SignupProfile> {
        let id = Uuid::new_v4();
        let features = serde_json::to_value(&new.features)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let row = sqlx::query(&format!(
            r#"
                INSERT INTO signup_requests
                    (id, user_id, domain, server_password_encrypted, features, storage_quota_mb, status)
                VALUES ($1, $2, $3, $4, $5, $6, 'pending')
                RETURNING {COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(new.user_id)
        .bind(&new.domain)
        .bind(&new.server_password_encrypted)
        .bind(features)
        .bind(new.storage_quota_mb)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row_to_profile(row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SignupProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM signup_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_profile))
    }

    async fn get_by_domain(&self, domain: &str) -> AppResult<Option<SignupProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM signup_requests WHERE domain = $1"
        ))
        .bind(domain)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_profile))
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<SignupProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM signup_requests WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_profile).collect())
    }

    async fn list_all(&self) -> AppResult<Vec<SignupProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM signup_requests ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_profile).collect())
    }

    async fn approve(
        &self,
        id: Uuid,
        admin_id: Uuid,
        comment: Option<&str>,
    ) -> AppResult<SignupProfile> {
        // Conditional transition: approved_by/approved_at are written in the
        // same statement as the status change, or not at all.
        let row = sqlx::query(&format!(
            r#"
                UPDATE signup_requests
                SET status = 'approved',
                    approved_by = $2,
                    approved_at = CURRENT_TIMESTAMP,
                    admin_comment = $3,
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = $1 AND status = 'pending'
                RETURNING {COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(admin_id)
        .bind(comment)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        match row {
            Some(row) => Ok(row_to_profile(row)),
            None => self.transition_miss(id).await,
        }
    }

    async fn reject(
        &self,
        id: Uuid,
        admin_id: Uuid,
        comment: Option<&str>,
    ) -> AppResult<SignupProfile> {
        let row = sqlx::query(&format!(
            r#"
                UPDATE signup_requests
                SET status = 'rejected',
                    approved_by = $2,
                    approved_at = CURRENT_TIMESTAMP,
                    admin_comment = $3,
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = $1 AND status = 'pending'
                RETURNING {COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(admin_id)
        .bind(comment)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        match row {
            Some(row) => Ok(row_to_profile(row)),
            None => self.transition_miss(id).await,
        }
    }

    async fn set_outcome(&self, id: Uuid, outcome: ProvisionOutcome) -> AppResult<()> {
        sqlx::query(
            "UPDATE signup_requests SET outcome = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1",
        )
        .bind(id)
        .bind(outcome.as_str())
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM signup_requests WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}

impl PostgresPersistence {
    /// A conditional transition matched no row: either the request is gone
    /// or it already left `pending`.
    async fn transition_miss(&self, id: Uuid) -> AppResult<SignupProfile> {
        match SignupRepo::get_by_id(self, id).await? {
            Some(_) => Err(AppError::Conflict(
                "Request is no longer pending".into(),
            )),
            None => Err(AppError::NotFound),
        }
    }
}
