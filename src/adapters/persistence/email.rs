use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    domain::entities::email::{EmailAccount, EmailDomain},
    use_cases::email::EmailRepo,
};

fn row_to_domain(row: sqlx::postgres::PgRow) -> EmailDomain {
    EmailDomain {
        id: row.get("id"),
        virtual_host_id: row.get("virtual_host_id"),
        domain: row.get("domain"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_account(row: sqlx::postgres::PgRow) -> EmailAccount {
    EmailAccount {
        id: row.get("id"),
        email_domain_id: row.get("email_domain_id"),
        username: row.get("username"),
        quota_mb: row.get("quota_mb"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl EmailRepo for PostgresPersistence {
    async fn create_domain(&self, virtual_host_id: Uuid, domain: &str) -> AppResult<EmailDomain> {
        let id = Uuid::new_v4();
        let row = sqlx::query(
            r#"
                INSERT INTO email_domains (id, virtual_host_id, domain)
                VALUES ($1, $2, $3)
                RETURNING id, virtual_host_id, domain, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(virtual_host_id)
        .bind(domain)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row_to_domain(row))
    }

    async fn get_domain_by_name(&self, domain: &str) -> AppResult<Option<EmailDomain>> {
        let row = sqlx::query(
            "SELECT id, virtual_host_id, domain, created_at, updated_at FROM email_domains WHERE domain = $1",
        )
        .bind(domain)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_domain))
    }

    async fn create_account(
        &self,
        email_domain_id: Uuid,
        username: &str,
        quota_mb: i64,
    ) -> AppResult<EmailAccount> {
        let id = Uuid::new_v4();
        let row = sqlx::query(
            r#"
                INSERT INTO email_accounts (id, email_domain_id, username, quota_mb)
                VALUES ($1, $2, $3, $4)
                RETURNING id, email_domain_id, username, quota_mb, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(email_domain_id)
        .bind(username)
        .bind(quota_mb)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row_to_account(row))
    }

    async fn list_accounts(&self, email_domain_id: Uuid) -> AppResult<Vec<EmailAccount>> {
        let rows = sqlx::query(
            "SELECT id, email_domain_id, username, quota_mb, created_at, updated_at FROM email_accounts WHERE email_domain_id = $1 ORDER BY username",
        )
        .bind(email_domain_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_account).collect())
    }

    async fn delete_domain(&self, id: Uuid) -> AppResult<()> {
        // Account rows cascade via FK.
        sqlx::query("DELETE FROM email_domains WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}
