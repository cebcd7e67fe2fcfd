use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::domain::{UserId, UserRecord};
use user_sync::{UpsertOutcome, UserStore};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool_options = if is_memory_url(database_url) {
            // Each connection to an in-memory url opens a separate database.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open sqlite database '{database_url}'"))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run user store migrations")?;
        debug!(%database_url, "storage: database ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn upsert_user(&self, record: &UserRecord) -> Result<UpsertOutcome> {
        let revision: i64 = sqlx::query_scalar(
            "INSERT INTO users (id, email, name, image) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                name = excluded.name,
                image = excluded.image,
                revision = users.revision + 1,
                updated_at = CURRENT_TIMESTAMP
             RETURNING revision",
        )
        .bind(record.id.as_str())
        .bind(&record.email)
        .bind(&record.display_name)
        .bind(&record.avatar_url)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to upsert user '{}'", record.id))?;

        Ok(if revision == 0 {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Replaced
        })
    }

    pub async fn get_user(&self, id: &UserId) -> Result<Option<UserRecord>> {
        let row = sqlx::query("SELECT id, email, name, image FROM users WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(user_from_row).transpose()
    }

    pub async fn list_users(&self) -> Result<Vec<UserRecord>> {
        let rows = sqlx::query("SELECT id, email, name, image FROM users ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(user_from_row).collect()
    }

    pub async fn count_users(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn delete_user(&self, id: &UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete user '{id}'"))?;
        Ok(result.rows_affected() > 0)
    }
}

fn user_from_row(row: SqliteRow) -> Result<UserRecord> {
    let id: String = row.try_get("id")?;
    let read = |column: &str| -> Result<String> {
        row.try_get::<String, _>(column)
            .with_context(|| format!("unreadable column '{column}' for user '{id}'"))
    };
    Ok(UserRecord {
        email: read("email")?,
        display_name: read("name")?,
        avatar_url: read("image")?,
        id: UserId(id.clone()),
    })
}

#[async_trait]
impl UserStore for Storage {
    async fn upsert_user(&self, record: &UserRecord) -> Result<UpsertOutcome> {
        Storage::upsert_user(self, record).await
    }

    async fn delete_user(&self, id: &UserId) -> Result<bool> {
        Storage::delete_user(self, id).await
    }
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
