use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    domain::entities::virtual_host::VirtualHost,
    use_cases::virtual_host::{NewVirtualHost, VirtualHostRepo},
};

fn row_to_vhost(row: sqlx::postgres::PgRow) -> VirtualHost {
    VirtualHost {
        id: row.get("id"),
        user_id: row.get("user_id"),
        domain: row.get("domain"),
        doc_root: row.get("doc_root"),
        doc_root_slot: row.get("doc_root_slot"),
        system_user: row.get("system_user"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl VirtualHostRepo for PostgresPersistence {
    async fn create(&self, new: NewVirtualHost) -> AppResult<VirtualHost> {
        let id = Uuid::new_v4();
        let row = sqlx::query(
            r#"
                INSERT INTO virtual_hosts (id, user_id, domain, doc_root, doc_root_slot, system_user)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, user_id, domain, doc_root, doc_root_slot, system_user, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(new.user_id)
        .bind(&new.domain)
        .bind(&new.doc_root)
        .bind(new.doc_root_slot)
        .bind(&new.system_user)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row_to_vhost(row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<VirtualHost>> {
        let row = sqlx::query(
            "SELECT id, user_id, domain, doc_root, doc_root_slot, system_user, created_at, updated_at FROM virtual_hosts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_vhost))
    }

    async fn get_by_domain(&self, domain: &str) -> AppResult<Option<VirtualHost>> {
        let row = sqlx::query(
            "SELECT id, user_id, domain, doc_root, doc_root_slot, system_user, created_at, updated_at FROM virtual_hosts WHERE domain = $1",
        )
        .bind(domain)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_vhost))
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<VirtualHost>> {
        let rows = sqlx::query(
            "SELECT id, user_id, domain, doc_root, doc_root_slot, system_user, created_at, updated_at FROM virtual_hosts WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_vhost).collect())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM virtual_hosts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}
