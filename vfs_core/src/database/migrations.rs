use sqlx::{SqlitePool, Row};
use tracing::{info, error};
use crate::error::{AppError, Result};

pub struct MigrationManager {
    pool: SqlitePool,
}

impl MigrationManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Starting database migrations");

        self.create_migrations_table().await?;

        let current_version = self.get_current_version().await?;
        info!("Current migration version: {}", current_version);

        let mut applied_count = 0;

        for migration in migrations() {
            if migration.version > current_version {
                info!("Applying migration {}: {}", migration.version, migration.name);
                self.apply_migration(&migration).await?;
                applied_count += 1;
            }
        }

        if applied_count > 0 {
            info!("Applied {} migrations successfully", applied_count);
        } else {
            info!("No new migrations to apply");
        }

        Ok(())
    }

    pub async fn current_version(&self) -> Result<i64> {
        self.create_migrations_table().await?;
        self.get_current_version().await
    }

    async fn create_migrations_table(&self) -> Result<()> {
        sqlx::query(r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
        "#)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(())
    }

    async fn get_current_version(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COALESCE(MAX(version), 0) as version FROM _migrations")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)?;

        Ok(row.try_get("version").unwrap_or(0))
    }

    async fn apply_migration(&self, migration: &Migration) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        for statement in migration.sql_statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    error!("Failed to execute migration {} statement: {}", migration.version, e);
                    AppError::from(e)
                })?;
        }

        sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;

        tx.commit().await.map_err(AppError::from)?;
        Ok(())
    }
}

struct Migration {
    version: i64,
    name: &'static str,
    sql_statements: &'static [&'static str],
}

fn migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            name: "create_groups_and_policies",
            sql_statements: &[
                r#"
                CREATE TABLE groups (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    speed_limit INTEGER NOT NULL DEFAULT 0
                )
                "#,
                r#"
                CREATE TABLE policies (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    type TEXT NOT NULL,
                    base_path TEXT NOT NULL DEFAULT '',
                    server TEXT,
                    access_key TEXT,
                    max_size INTEGER NOT NULL DEFAULT 0,
                    allowed_extensions TEXT NOT NULL DEFAULT '[]'
                )
                "#,
            ],
        },
        Migration {
            version: 2,
            name: "create_users",
            sql_statements: &[
                r#"
                CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL UNIQUE,
                    group_id INTEGER NOT NULL,
                    policy_id INTEGER NOT NULL,
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (group_id) REFERENCES groups(id),
                    FOREIGN KEY (policy_id) REFERENCES policies(id)
                )
                "#,
            ],
        },
        Migration {
            version: 3,
            name: "create_folders_and_files",
            sql_statements: &[
                r#"
                CREATE TABLE folders (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    parent_id INTEGER,
                    owner_id INTEGER NOT NULL,
                    FOREIGN KEY (parent_id) REFERENCES folders(id) ON DELETE CASCADE,
                    FOREIGN KEY (owner_id) REFERENCES users(id),
                    UNIQUE (parent_id, name)
                )
                "#,
                r#"
                CREATE INDEX idx_folders_owner ON folders(owner_id)
                "#,
                r#"
                CREATE TABLE files (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    source_name TEXT NOT NULL,
                    size INTEGER NOT NULL,
                    folder_id INTEGER NOT NULL,
                    owner_id INTEGER NOT NULL,
                    policy_id INTEGER NOT NULL,
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (folder_id) REFERENCES folders(id) ON DELETE CASCADE,
                    FOREIGN KEY (owner_id) REFERENCES users(id),
                    FOREIGN KEY (policy_id) REFERENCES policies(id),
                    UNIQUE (folder_id, name)
                )
                "#,
                r#"
                CREATE INDEX idx_files_policy ON files(policy_id)
                "#,
            ],
        },
    ]
}

pub async fn run_migrations(pool: SqlitePool) -> Result<()> {
    let migration_manager = MigrationManager::new(pool);
    migration_manager.run_migrations().await
}
