//! SQLite persistence gateway.
//!
//! Single connection behind a mutex; every query runs inside
//! `spawn_blocking`. Store operations receive `&mut Connection` so they can
//! open real transactions - the XP dual-write and the completion cascades
//! must commit or roll back as a unit.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use finquest_common::achievements::CATALOG;
use finquest_common::FinquestError;

#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    /// Open or create the database file, apply pragmas and schema.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }

        info!("Opening database at {}", path.display());

        let path = path.to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = Connection::open(&path).context("Failed to open SQLite database")?;

            conn.pragma_update(None, "journal_mode", "WAL")
                .context("Failed to enable WAL mode")?;
            conn.pragma_update(None, "synchronous", "NORMAL")
                .context("Failed to set synchronous mode")?;
            conn.pragma_update(None, "foreign_keys", "ON")
                .context("Failed to enable foreign keys")?;

            init_schema(&conn).context("Failed to initialize schema")?;
            Ok(conn)
        })
        .await??;

        debug!("Database schema ready");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    pub async fn call<F, R>(&self, f: F) -> std::result::Result<R, FinquestError>
    where
        F: FnOnce(&mut Connection) -> std::result::Result<R, FinquestError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            f(&mut conn)
        })
        .await
        .map_err(|e| FinquestError::Internal(e.to_string()))?
    }
}

/// Create tables, indexes, and the static achievement catalog.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_profiles (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE REFERENCES users(id),
            daily_goal_minutes INTEGER NOT NULL DEFAULT 10,
            focus_area TEXT,
            total_xp INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS paths (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            order_index INTEGER NOT NULL DEFAULT 0,
            icon_name TEXT NOT NULL DEFAULT 'book'
        );

        CREATE TABLE IF NOT EXISTS skills (
            id TEXT PRIMARY KEY,
            path_id TEXT NOT NULL REFERENCES paths(id),
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            order_index INTEGER NOT NULL DEFAULT 0,
            icon_name TEXT NOT NULL DEFAULT 'star'
        );

        CREATE TABLE IF NOT EXISTS lessons (
            id TEXT PRIMARY KEY,
            skill_id TEXT NOT NULL REFERENCES skills(id),
            title TEXT NOT NULL,
            order_index INTEGER NOT NULL DEFAULT 0,
            content_json TEXT NOT NULL DEFAULT '[]',
            is_published INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS exercises (
            id TEXT PRIMARY KEY,
            lesson_id TEXT NOT NULL REFERENCES lessons(id),
            type TEXT NOT NULL,
            prompt TEXT NOT NULL,
            options_json TEXT,
            answer_json TEXT NOT NULL,
            explanation TEXT NOT NULL,
            hint TEXT,
            tags_json TEXT NOT NULL DEFAULT '[]',
            order_index INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS attempts (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            exercise_id TEXT NOT NULL REFERENCES exercises(id),
            answer_json TEXT NOT NULL,
            is_correct INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_attempts_user_missed
            ON attempts(user_id, is_correct, created_at DESC);

        CREATE TABLE IF NOT EXISTS progress (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            skill_id TEXT NOT NULL REFERENCES skills(id),
            lesson_id TEXT NOT NULL REFERENCES lessons(id),
            status TEXT NOT NULL DEFAULT 'not_started',
            mastery_score REAL NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL,
            UNIQUE(user_id, lesson_id)
        );

        CREATE TABLE IF NOT EXISTS streaks (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE REFERENCES users(id),
            current INTEGER NOT NULL DEFAULT 0,
            longest INTEGER NOT NULL DEFAULT 0,
            last_active_date TEXT,
            freeze_count INTEGER NOT NULL DEFAULT 1,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS xp_events (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            type TEXT NOT NULL,
            amount INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_xp_events_user_time
            ON xp_events(user_id, created_at);

        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            skill_id TEXT NOT NULL REFERENCES skills(id),
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            schema_json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS project_submissions (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id),
            user_id TEXT NOT NULL REFERENCES users(id),
            data_json TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS achievements (
            id TEXT PRIMARY KEY,
            key TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            icon_name TEXT NOT NULL DEFAULT 'award'
        );

        CREATE TABLE IF NOT EXISTS user_achievements (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            achievement_id TEXT NOT NULL REFERENCES achievements(id),
            unlocked_at TEXT NOT NULL,
            UNIQUE(user_id, achievement_id)
        );",
    )?;

    // The achievement catalog is static; key uniqueness makes re-seeding a no-op.
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO achievements (id, key, title, description, icon_name)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for def in CATALOG {
        stmt.execute(rusqlite::params![
            Uuid::new_v4().to_string(),
            def.key,
            def.title,
            def.description,
            def.icon_name,
        ])?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_creates_schema_and_catalog() {
        let temp = tempdir().unwrap();
        let db = Db::open(&temp.path().join("test.db")).await.unwrap();

        let (tables, catalog): (i64, i64) = db
            .call(|conn| {
                let tables = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table'",
                    [],
                    |row| row.get(0),
                )?;
                let catalog =
                    conn.query_row("SELECT COUNT(*) FROM achievements", [], |row| row.get(0))?;
                Ok((tables, catalog))
            })
            .await
            .unwrap();

        assert!(tables >= 14);
        assert_eq!(catalog, CATALOG.len() as i64);
    }

    #[tokio::test]
    async fn test_reopen_does_not_duplicate_catalog() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("test.db");
        drop(Db::open(&path).await.unwrap());
        let db = Db::open(&path).await.unwrap();

        let catalog: i64 = db
            .call(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM achievements", [], |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(catalog, CATALOG.len() as i64);
    }
}
