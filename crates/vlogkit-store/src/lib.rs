//! SQLite-backed asset repository.
//!
//! Pure data access for users, projects and tracked video assets. The one
//! cross-cutting guarantee lives here: every write that changes a project's
//! child rows advances the project's `updated_at` in the same transaction.

pub mod error;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use tracing::info;

use vlogkit_models::{Project, User, VideoAsset};

pub use error::{StoreError, StoreResult};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS projects (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        timeline_data TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS project_videos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        filename TEXT NOT NULL,
        file_path TEXT NOT NULL,
        duration REAL NOT NULL DEFAULT 0,
        file_size INTEGER NOT NULL DEFAULT 0,
        video_info TEXT,
        added_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_projects_user ON projects(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_videos_project ON project_videos(project_id)",
];

/// Aggregate counters for the diagnostics endpoint.
#[derive(Debug, Clone, Copy)]
pub struct SystemStats {
    pub users_count: i64,
    pub projects_count: i64,
    pub videos_count: i64,
    pub total_bytes: i64,
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            username: r.username,
            email: r.email,
            password_hash: r.password_hash,
            created_at: r.created_at,
        }
    }
}

#[derive(FromRow)]
struct ProjectRow {
    id: i64,
    user_id: i64,
    title: String,
    description: String,
    timeline_data: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(r: ProjectRow) -> Self {
        Project {
            id: r.id,
            user_id: r.user_id,
            title: r.title,
            description: r.description,
            timeline_data: parse_blob(r.timeline_data),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(FromRow)]
struct AssetRow {
    id: i64,
    project_id: i64,
    filename: String,
    file_path: String,
    duration: f64,
    file_size: i64,
    video_info: Option<String>,
    added_at: DateTime<Utc>,
}

impl From<AssetRow> for VideoAsset {
    fn from(r: AssetRow) -> Self {
        VideoAsset {
            id: r.id,
            project_id: r.project_id,
            filename: r.filename,
            file_path: r.file_path,
            duration: r.duration,
            file_size: r.file_size,
            metadata: parse_blob(r.video_info),
            added_at: r.added_at,
        }
    }
}

fn parse_blob(text: Option<String>) -> serde_json::Value {
    text.as_deref()
        .and_then(|t| serde_json::from_str(t).ok())
        .unwrap_or_else(|| serde_json::json!({}))
}

/// Repository handle. Opened once at process start, shared by reference.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database and ensure the schema exists.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(sqlx::Error::from)?
            .create_if_missing(true)
            .foreign_keys(true);

        // In-memory databases are per-connection; a single connection keeps
        // one coherent schema for tests and ephemeral runs.
        let max_connections = if url.contains(":memory:") { 1 } else { 10 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&pool).await?;
        }
        info!("database schema ready");

        Ok(Self { pool })
    }

    // ---- users ----------------------------------------------------------

    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> StoreResult<User> {
        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_write)?;

        let user = self
            .get_user(result.last_insert_rowid())
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        Ok(user)
    }

    pub async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    pub async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    // ---- projects -------------------------------------------------------

    pub async fn create_project(
        &self,
        user_id: i64,
        title: &str,
        description: &str,
    ) -> StoreResult<Project> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO projects (user_id, title, description, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(title)
        .bind(description)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let project = self
            .get_project(result.last_insert_rowid())
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        Ok(project)
    }

    pub async fn get_project(&self, id: i64) -> StoreResult<Option<Project>> {
        let row = sqlx::query_as::<_, ProjectRow>("SELECT * FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    /// Projects for one user, most recently touched first.
    pub async fn list_user_projects(&self, user_id: i64) -> StoreResult<Vec<Project>> {
        let rows = sqlx::query_as::<_, ProjectRow>(
            "SELECT * FROM projects WHERE user_id = ? ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Advance a project's `updated_at`.
    pub async fn touch_project(&self, id: i64) -> StoreResult<()> {
        sqlx::query("UPDATE projects SET updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---- assets ---------------------------------------------------------

    /// Register an asset and advance the parent project's `updated_at` in the
    /// same transaction.
    pub async fn add_asset(
        &self,
        project_id: i64,
        filename: &str,
        file_path: &str,
        duration: f64,
        file_size: i64,
        metadata: &serde_json::Value,
    ) -> StoreResult<VideoAsset> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO project_videos
             (project_id, filename, file_path, duration, file_size, video_info, added_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(project_id)
        .bind(filename)
        .bind(file_path)
        .bind(duration)
        .bind(file_size)
        .bind(metadata.to_string())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE projects SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(project_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let row = sqlx::query_as::<_, AssetRow>("SELECT * FROM project_videos WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    /// Assets for one project, most recently added first.
    pub async fn list_assets(&self, project_id: i64) -> StoreResult<Vec<VideoAsset>> {
        let rows = sqlx::query_as::<_, AssetRow>(
            "SELECT * FROM project_videos WHERE project_id = ? ORDER BY added_at DESC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    // ---- diagnostics ----------------------------------------------------

    pub async fn system_stats(&self) -> StoreResult<SystemStats> {
        let users_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let projects_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects")
            .fetch_one(&self.pool)
            .await?;
        let videos_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM project_videos")
            .fetch_one(&self.pool)
            .await?;
        let total_bytes: Option<i64> =
            sqlx::query_scalar("SELECT SUM(file_size) FROM project_videos")
                .fetch_one(&self.pool)
                .await?;

        Ok(SystemStats {
            users_count,
            projects_count,
            videos_count,
            total_bytes: total_bytes.unwrap_or(0),
        })
    }
}
