use crate::app_dirs::AppDirs;
use crate::error::Result;
use crate::item::GameKind;
use crate::session::Snapshot;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS snapshots (
        kind TEXT PRIMARY KEY,
        payload TEXT NOT NULL,
        saved_at TEXT NOT NULL
    )
"#;

/// Session snapshots keyed by game kind, one JSON payload per kind.
#[derive(Debug)]
pub struct SnapshotDb {
    conn: Connection,
}

impl SnapshotDb {
    /// Open the database at the default state location.
    pub fn new() -> Result<Self> {
        let db_path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("rekall_state.db"));
        Self::open(db_path)
    }

    /// Open (creating parent directories and the table if needed) a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute(SCHEMA, [])?;
        log::debug!("opened state db at {}", path.display());

        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute(SCHEMA, [])?;
        Ok(Self { conn })
    }

    /// Replace the stored snapshot for `kind`.
    pub fn save(&self, kind: GameKind, snapshot: &Snapshot) -> Result<()> {
        let payload = serde_json::to_string(snapshot)?;
        self.conn.execute(
            r#"
            INSERT INTO snapshots (kind, payload, saved_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(kind) DO UPDATE SET payload = excluded.payload, saved_at = excluded.saved_at
            "#,
            params![kind.to_string(), payload, Utc::now().to_rfc3339()],
        )?;

        Ok(())
    }

    /// The stored snapshot for `kind`, or `None` if nothing was saved yet.
    pub fn load(&self, kind: GameKind) -> Result<Option<Snapshot>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM snapshots WHERE kind = ?1",
                params![kind.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn saved_at(&self, kind: GameKind) -> Result<Option<DateTime<Utc>>> {
        let saved_at: Option<String> = self
            .conn
            .query_row(
                "SELECT saved_at FROM snapshots WHERE kind = ?1",
                params![kind.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(saved_at
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }

    /// Remove the stored snapshot for `kind`. Returns whether one existed.
    pub fn clear(&self, kind: GameKind) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM snapshots WHERE kind = ?1",
            params![kind.to_string()],
        )?;
        Ok(removed > 0)
    }
}
