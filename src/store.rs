// ABOUTME: SQLite-backed persistent store for tokens, teams, channels, and users.
// ABOUTME: Implements the ChatStore shape contract with additive in-place migrations.

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use huddle_core::types::{CurrentUser, User};
use huddle_core::ChatStore;

const INSTALLATION_ID_KEY: &str = "installation_id";

#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir).context("failed to create store directory")?;

        let db_path = data_dir.join("huddle.db");
        let conn = Connection::open(&db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        let store = Self {
            db: Arc::new(Mutex::new(conn)),
        };
        store.create_schema()?;
        Ok(store)
    }

    /// In-memory store for tests and ephemeral hosts.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory store")?;
        let store = Self {
            db: Arc::new(Mutex::new(conn)),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| anyhow!("store mutex poisoned"))
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS providers (
                provider TEXT PRIMARY KEY,
                token TEXT,
                current_team TEXT,
                last_channel_id TEXT,
                current_user TEXT,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS user_directory (
                provider TEXT NOT NULL,
                user_id TEXT NOT NULL,
                payload TEXT NOT NULL,
                PRIMARY KEY (provider, user_id)
            )",
            [],
        )?;
        Ok(())
    }

    fn setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    fn provider_field(&self, provider: &str, field: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                // field names are internal constants, never user input
                &format!("SELECT {} FROM providers WHERE provider = ?1", field),
                params![provider],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(value)
    }

    fn set_provider_field(&self, provider: &str, field: &str, value: Option<&str>) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO providers (provider, {f}, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(provider) DO UPDATE SET {f} = ?2, updated_at = ?3",
                f = field
            ),
            params![provider, value, now],
        )?;
        Ok(())
    }
}

impl ChatStore for SqliteStore {
    fn run_state_migrations(&self) -> Result<()> {
        self.create_schema()?;
        let conn = self.conn()?;
        // Additive migrations for databases created by earlier versions.
        // Failure means the column already exists.
        let _ = conn.execute("ALTER TABLE providers ADD COLUMN current_user TEXT", []);
        let _ = conn.execute(
            "ALTER TABLE providers ADD COLUMN updated_at TEXT NOT NULL DEFAULT ''",
            [],
        );
        Ok(())
    }

    fn installation_id(&self) -> Result<Option<String>> {
        self.setting(INSTALLATION_ID_KEY)
    }

    fn set_installation_id(&self, id: &str) -> Result<()> {
        self.set_setting(INSTALLATION_ID_KEY, id)
    }

    fn token(&self, provider: &str) -> Result<Option<String>> {
        self.provider_field(provider, "token")
    }

    fn set_token(&self, provider: &str, token: &str) -> Result<()> {
        self.set_provider_field(provider, "token", Some(token))
    }

    fn clear_token(&self, provider: &str) -> Result<()> {
        self.set_provider_field(provider, "token", None)
    }

    fn current_team(&self, provider: &str) -> Result<Option<String>> {
        self.provider_field(provider, "current_team")
    }

    fn set_current_team(&self, provider: &str, team_id: &str) -> Result<()> {
        self.set_provider_field(provider, "current_team", Some(team_id))
    }

    fn last_channel_id(&self, provider: &str) -> Result<Option<String>> {
        self.provider_field(provider, "last_channel_id")
    }

    fn set_last_channel_id(&self, provider: &str, channel_id: &str) -> Result<()> {
        self.set_provider_field(provider, "last_channel_id", Some(channel_id))
    }

    fn current_user(&self, provider: &str) -> Result<Option<CurrentUser>> {
        match self.provider_field(provider, "current_user")? {
            Some(json) => Ok(serde_json::from_str(&json).ok()),
            None => Ok(None),
        }
    }

    fn set_current_user(&self, provider: &str, user: &CurrentUser) -> Result<()> {
        let json = serde_json::to_string(user)?;
        self.set_provider_field(provider, "current_user", Some(&json))
    }

    fn user_directory(&self, provider: &str) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT payload FROM user_directory WHERE provider = ?1 ORDER BY user_id",
        )?;
        let rows = stmt.query_map(params![provider], |row| row.get::<_, String>(0))?;
        let mut users = Vec::new();
        for payload in rows {
            if let Ok(user) = serde_json::from_str(&payload?) {
                users.push(user);
            }
        }
        Ok(users)
    }

    fn set_user_directory(&self, provider: &str, users: &[User]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM user_directory WHERE provider = ?1",
            params![provider],
        )?;
        for user in users {
            let payload = serde_json::to_string(user)?;
            tx.execute(
                "INSERT INTO user_directory (provider, user_id, payload) VALUES (?1, ?2, ?3)",
                params![provider, user.id, payload],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn clear_all(&self, keep: &[&str]) -> Result<()> {
        let conn = self.conn()?;
        if keep.is_empty() {
            conn.execute("DELETE FROM providers", [])?;
            conn.execute("DELETE FROM user_directory", [])?;
        } else {
            let placeholders: Vec<String> =
                (1..=keep.len()).map(|i| format!("?{}", i)).collect();
            let clause = placeholders.join(", ");
            let keep_params: Vec<&dyn rusqlite::ToSql> =
                keep.iter().map(|k| k as &dyn rusqlite::ToSql).collect();
            conn.execute(
                &format!("DELETE FROM providers WHERE provider NOT IN ({})", clause),
                keep_params.as_slice(),
            )?;
            conn.execute(
                &format!(
                    "DELETE FROM user_directory WHERE provider NOT IN ({})",
                    clause
                ),
                keep_params.as_slice(),
            )?;
        }
        tracing::info!(kept = keep.len(), "persisted state cleared");
        Ok(())
    }
}
