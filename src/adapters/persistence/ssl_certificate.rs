use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    domain::entities::ssl_certificate::{
        CertAction, CertOutcome, SslCertificate, SslCertificateLogEntry, SslStatus,
    },
    use_cases::provisioning::SslCertificateRepo,
};

fn row_to_certificate(row: sqlx::postgres::PgRow) -> SslCertificate {
    SslCertificate {
        id: row.get("id"),
        domain: row.get("domain"),
        status: SslStatus::from_str(row.get("status")),
        issued_at: row.get("issued_at"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_log_entry(row: sqlx::postgres::PgRow) -> SslCertificateLogEntry {
    let action: String = row.get("action");
    let outcome: String = row.get("outcome");
    SslCertificateLogEntry {
        id: row.get("id"),
        certificate_id: row.get("certificate_id"),
        action: action.parse().unwrap_or(CertAction::Request),
        outcome: outcome.parse().unwrap_or(CertOutcome::Failed),
        message: row.get("message"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl SslCertificateRepo for PostgresPersistence {
    async fn ensure_pending(&self, domain: &str) -> AppResult<SslCertificate> {
        // One certificate per domain; a concurrent insert loses quietly and
        // the existing row is returned.
        sqlx::query(
            r#"
                INSERT INTO ssl_certificates (id, domain, status)
                VALUES ($1, $2, 'pending')
                ON CONFLICT (domain) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(domain)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        let row = sqlx::query(
            "SELECT id, domain, status, issued_at, expires_at, created_at, updated_at FROM ssl_certificates WHERE domain = $1",
        )
        .bind(domain)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row_to_certificate(row))
    }

    async fn get_by_domain(&self, domain: &str) -> AppResult<Option<SslCertificate>> {
        let row = sqlx::query(
            "SELECT id, domain, status, issued_at, expires_at, created_at, updated_at FROM ssl_certificates WHERE domain = $1",
        )
        .bind(domain)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_certificate))
    }

    async fn mark_active(
        &self,
        id: Uuid,
        issued_at: NaiveDateTime,
        expires_at: NaiveDateTime,
    ) -> AppResult<SslCertificate> {
        let row = sqlx::query(
            r#"
                UPDATE ssl_certificates
                SET status = 'active', issued_at = $2, expires_at = $3, updated_at = CURRENT_TIMESTAMP
                WHERE id = $1
                RETURNING id, domain, status, issued_at, expires_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(issued_at)
        .bind(expires_at)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row_to_certificate(row))
    }

    async fn mark_revoked(&self, id: Uuid) -> AppResult<()> {
        sqlx::query(
            "UPDATE ssl_certificates SET status = 'revoked', updated_at = CURRENT_TIMESTAMP WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn append_log(
        &self,
        certificate_id: Uuid,
        action: CertAction,
        outcome: CertOutcome,
        message: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
                INSERT INTO ssl_certificate_log (id, certificate_id, action, outcome, message)
                VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(certificate_id)
        .bind(action.as_ref())
        .bind(outcome.as_ref())
        .bind(message)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn list_log(&self, certificate_id: Uuid) -> AppResult<Vec<SslCertificateLogEntry>> {
        let rows = sqlx::query(
            "SELECT id, certificate_id, action, outcome, message, created_at FROM ssl_certificate_log WHERE certificate_id = $1 ORDER BY seq",
        )
        .bind(certificate_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_log_entry).collect())
    }
}
