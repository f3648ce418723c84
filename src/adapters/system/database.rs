use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;

use crate::app_error::{AppError, AppResult};
use crate::application::ports::provisioner::{
    FailurePolicy, ProvisionContext, ResourceKind, ResourceProvisioner,
};
use crate::application::validators::is_valid_database_name;

// PostgreSQL SQLSTATE codes.
const DUPLICATE_DATABASE: &str = "42P04";
const DUPLICATE_OBJECT: &str = "42710";

/// Creates the customer database and role on the database server through a
/// superuser connection.
pub struct DatabaseProvisioner {
    admin_pool: PgPool,
}

impl DatabaseProvisioner {
    pub fn new(admin_pool: PgPool) -> Self {
        Self { admin_pool }
    }

    fn has_sqlstate(err: &sqlx::Error, code: &str) -> bool {
        matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(code))
    }

    /// Identifiers cannot be bound as parameters; they are validated against
    /// a strict identifier alphabet before interpolation.
    fn checked_identifier(name: &str) -> AppResult<&str> {
        if !is_valid_database_name(name) {
            return Err(AppError::InvalidInput(format!(
                "invalid database identifier: {name}"
            )));
        }
        Ok(name)
    }

    fn quoted_literal(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }
}

#[async_trait]
impl ResourceProvisioner for DatabaseProvisioner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Database
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Fatal
    }

    async fn provision(&self, ctx: &ProvisionContext) -> AppResult<String> {
        let Some(request) = ctx.database_request() else {
            return Ok("no database requested".into());
        };
        let password = ctx.database_password.as_ref().ok_or(AppError::Crypto)?;

        let db_name = Self::checked_identifier(&request.name)?;
        let role = Self::checked_identifier(&request.username)?;
        let password_literal = Self::quoted_literal(password.expose_secret());

        let create_role = format!("CREATE ROLE {role} LOGIN PASSWORD {password_literal}");
        match sqlx::query(&create_role).execute(&self.admin_pool).await {
            Ok(_) => {}
            Err(e) if Self::has_sqlstate(&e, DUPLICATE_OBJECT) => {
                // Converge the password on retries.
                let alter = format!("ALTER ROLE {role} WITH LOGIN PASSWORD {password_literal}");
                sqlx::query(&alter)
                    .execute(&self.admin_pool)
                    .await
                    .map_err(|e| AppError::ExternalTool(format!("altering role failed: {e}")))?;
            }
            Err(e) => {
                return Err(AppError::ExternalTool(format!("creating role failed: {e}")));
            }
        }

        let mut existed = false;
        let create_db = format!("CREATE DATABASE {db_name} OWNER {role}");
        match sqlx::query(&create_db).execute(&self.admin_pool).await {
            Ok(_) => {}
            Err(e) if Self::has_sqlstate(&e, DUPLICATE_DATABASE) => existed = true,
            Err(e) => {
                return Err(AppError::ExternalTool(format!(
                    "creating database failed: {e}"
                )));
            }
        }

        let grant = format!("GRANT ALL PRIVILEGES ON DATABASE {db_name} TO {role}");
        sqlx::query(&grant)
            .execute(&self.admin_pool)
            .await
            .map_err(|e| AppError::ExternalTool(format!("granting privileges failed: {e}")))?;

        Ok(if existed {
            format!("database {db_name} already exists for role {role}")
        } else {
            format!("database {db_name} created for role {role}")
        })
    }

    async fn deprovision(&self, ctx: &ProvisionContext) -> AppResult<String> {
        let Some(request) = ctx.database_request() else {
            return Ok("no database requested".into());
        };
        let db_name = Self::checked_identifier(&request.name)?;
        let role = Self::checked_identifier(&request.username)?;

        sqlx::query(&format!("DROP DATABASE IF EXISTS {db_name}"))
            .execute(&self.admin_pool)
            .await
            .map_err(|e| AppError::ExternalTool(format!("dropping database failed: {e}")))?;
        sqlx::query(&format!("DROP ROLE IF EXISTS {role}"))
            .execute(&self.admin_pool)
            .await
            .map_err(|e| AppError::ExternalTool(format!("dropping role failed: {e}")))?;

        Ok(format!("database {db_name} and role {role} removed"))
    }
}
