//! SQLite identity repository implementation.

use parley_core::repository::identity::IdentityRepository;
use parley_types::error::RepositoryError;
use parley_types::identity::{Identity, IdentityId};
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

/// SQLite-backed implementation of `IdentityRepository`.
#[derive(Clone)]
pub struct SqliteIdentityRepository {
    pool: DatabasePool,
}

impl SqliteIdentityRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct IdentityRow {
    id: String,
    username: String,
    password_hash: String,
    created_at: String,
}

impl IdentityRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_identity(self) -> Result<Identity, RepositoryError> {
        let id: IdentityId = self
            .id
            .parse()
            .map_err(|e| RepositoryError::Query(format!("invalid identity id: {e}")))?;

        Ok(Identity {
            id,
            username: self.username,
            password_hash: self.password_hash,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

impl IdentityRepository for SqliteIdentityRepository {
    async fn create(&self, identity: &Identity) -> Result<Identity, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO identities (id, username, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(identity.id.to_string())
        .bind(&identity.username)
        .bind(&identity.password_hash)
        .bind(format_datetime(&identity.created_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(identity.clone()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => Err(
                RepositoryError::Conflict(format!("username '{}' already exists", identity.username)),
            ),
            Err(e) => Err(query_error(e)),
        }
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM identities WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => {
                let identity_row = IdentityRow::from_row(&row).map_err(query_error)?;
                Ok(Some(identity_row.into_identity()?))
            }
            None => Ok(None),
        }
    }
}
