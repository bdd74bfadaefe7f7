use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::database::{get_database_pool, run_migrations};
use crate::error::{AppError, Result};
use crate::models::{File, Folder, Group, NewFile, NewPolicy, Policy, PolicyId, PolicyType, User};
use super::store::MetadataStore;

const FILE_COLUMNS: &str = "id, name, source_name, size, folder_id, owner_id, policy_id, created_at";
const FOLDER_COLUMNS: &str = "id, name, parent_id, owner_id";
const POLICY_COLUMNS: &str = "p.id AS policy_id, p.name AS policy_name, p.type AS policy_type, p.base_path, p.server, p.access_key, p.max_size, p.allowed_extensions";

#[derive(Clone)]
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the pool described by `config`, migrating first when configured to.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = get_database_pool(config).await?;

        if config.migrate_on_start {
            run_migrations(pool.clone()).await?;
        }

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn create_group(&self, name: &str, speed_limit: u64) -> Result<Group> {
        let id = sqlx::query("INSERT INTO groups (name, speed_limit) VALUES (?1, ?2)")
            .bind(name)
            .bind(speed_limit as i64)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        Ok(Group {
            id,
            name: name.to_string(),
            speed_limit,
        })
    }

    pub async fn create_policy(&self, policy: &NewPolicy) -> Result<Policy> {
        let extensions = serde_json::to_string(&policy.allowed_extensions)
            .map_err(|e| AppError::Database(format!("Invalid allowed extensions: {}", e)))?;

        let id = sqlx::query(
            r#"
            INSERT INTO policies (name, type, base_path, server, access_key, max_size, allowed_extensions)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&policy.name)
        .bind(policy.policy_type.as_str())
        .bind(&policy.base_path)
        .bind(&policy.server)
        .bind(&policy.access_key)
        .bind(policy.max_size as i64)
        .bind(extensions)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        info!(policy_id = id, policy_type = %policy.policy_type, "Created storage policy {}", policy.name);

        Ok(policy.clone().into_policy(id))
    }

    /// Insert the user together with its root folder.
    pub async fn create_user(&self, username: &str, group_id: i64, policy_id: PolicyId) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let user_id = sqlx::query(
            "INSERT INTO users (username, group_id, policy_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(username)
        .bind(group_id)
        .bind(policy_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query("INSERT INTO folders (name, parent_id, owner_id) VALUES ('/', NULL, ?1)")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let sql = format!(
            r#"
            SELECT u.id, u.username, g.id AS group_id, g.name AS group_name, g.speed_limit, {}
            FROM users u
            JOIN groups g ON g.id = u.group_id
            JOIN policies p ON p.id = u.policy_id
            WHERE u.id = ?1
            "#,
            POLICY_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(User {
                id: row.get("id"),
                username: row.get("username"),
                group: Group {
                    id: row.get("group_id"),
                    name: row.get("group_name"),
                    speed_limit: row.get::<i64, _>("speed_limit").max(0) as u64,
                },
                policy: policy_from_row(&row)?,
            })),
            None => Ok(None),
        }
    }

    async fn get_policy(&self, id: PolicyId) -> Result<Option<Policy>> {
        let sql = format!("SELECT {} FROM policies p WHERE p.id = ?1", POLICY_COLUMNS);

        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(policy_from_row).transpose()
    }

    async fn get_root_folder(&self, owner_id: i64) -> Result<Option<Folder>> {
        let sql = format!(
            "SELECT {} FROM folders WHERE owner_id = ?1 AND parent_id IS NULL ORDER BY id LIMIT 1",
            FOLDER_COLUMNS
        );

        let row = sqlx::query(&sql)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(folder_from_row))
    }

    async fn get_child_folder(&self, parent_id: i64, name: &str) -> Result<Option<Folder>> {
        let sql = format!("SELECT {} FROM folders WHERE parent_id = ?1 AND name = ?2", FOLDER_COLUMNS);

        let row = sqlx::query(&sql)
            .bind(parent_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(folder_from_row))
    }

    async fn get_file_in_folder(&self, folder_id: i64, name: &str) -> Result<Option<File>> {
        let sql = format!("SELECT {} FROM files WHERE folder_id = ?1 AND name = ?2", FILE_COLUMNS);

        let row = sqlx::query(&sql)
            .bind(folder_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(file_from_row).transpose()
    }

    async fn get_files_by_ids(&self, ids: &[i64]) -> Result<Vec<File>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT {} FROM files WHERE id IN ({})", FILE_COLUMNS, placeholders);

        let mut query_builder = sqlx::query(&sql);
        for id in ids {
            query_builder = query_builder.bind(*id);
        }

        let rows = query_builder.fetch_all(&self.pool).await?;

        let mut by_id = HashMap::with_capacity(rows.len());
        for row in &rows {
            let file = file_from_row(row)?;
            by_id.insert(file.id, file);
        }

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn create_folder(&self, owner_id: i64, parent_id: i64, name: &str) -> Result<Folder> {
        let id = sqlx::query("INSERT INTO folders (name, parent_id, owner_id) VALUES (?1, ?2, ?3)")
            .bind(name)
            .bind(parent_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        Ok(Folder {
            id,
            name: name.to_string(),
            parent_id: Some(parent_id),
            owner_id,
        })
    }

    async fn create_file(&self, file: &NewFile) -> Result<File> {
        let created_at = Utc::now();
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query(
            r#"
            INSERT INTO files (name, source_name, size, folder_id, owner_id, policy_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&file.name)
        .bind(&file.source_name)
        .bind(file.size as i64)
        .bind(file.folder_id)
        .bind(file.owner_id)
        .bind(file.policy_id)
        .bind(created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;

        debug!(file_id = id, folder_id = file.folder_id, "Inserted file record {}", file.name);

        Ok(File {
            id,
            name: file.name.clone(),
            source_name: file.source_name.clone(),
            size: file.size,
            folder_id: file.folder_id,
            owner_id: file.owner_id,
            policy_id: file.policy_id,
            created_at,
        })
    }

    async fn delete_files(&self, ids: &[i64]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut deleted = 0;

        for id in ids {
            deleted += sqlx::query("DELETE FROM files WHERE id = ?1")
                .bind(*id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        tx.commit().await?;
        Ok(deleted)
    }
}

fn policy_from_row(row: &SqliteRow) -> Result<Policy> {
    let extensions: String = row.get("allowed_extensions");
    let allowed_extensions = serde_json::from_str(&extensions)
        .map_err(|e| AppError::Database(format!("Invalid allowed extensions: {}", e)))?;

    Ok(Policy {
        id: row.get("policy_id"),
        name: row.get("policy_name"),
        policy_type: PolicyType::from(row.get::<String, _>("policy_type")),
        base_path: row.get("base_path"),
        server: row.get("server"),
        access_key: row.get("access_key"),
        max_size: row.get::<i64, _>("max_size").max(0) as u64,
        allowed_extensions,
    })
}

fn folder_from_row(row: &SqliteRow) -> Folder {
    Folder {
        id: row.get("id"),
        name: row.get("name"),
        parent_id: row.get("parent_id"),
        owner_id: row.get("owner_id"),
    }
}

fn file_from_row(row: &SqliteRow) -> Result<File> {
    Ok(File {
        id: row.get("id"),
        name: row.get("name"),
        source_name: row.get("source_name"),
        size: row.get::<i64, _>("size").max(0) as u64,
        folder_id: row.get("folder_id"),
        owner_id: row.get("owner_id"),
        policy_id: row.get("policy_id"),
        created_at: DateTime::parse_from_rfc3339(&row.get::<String, _>("created_at"))
            .map_err(|e| AppError::Database(format!("Invalid datetime: {}", e)))?
            .with_timezone(&Utc),
    })
}
