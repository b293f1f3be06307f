use rusqlite::OpenFlags;

use super::*;

pub fn open_store(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        crate::util::ensure_directory(parent)?;
    }

    let connection =
        Connection::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;
    Ok(connection)
}

pub fn open_store_read_only(path: &Path) -> Result<Connection> {
    let connection = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("failed to open {} read-only", path.display()))?;
    ensure_schema_version(&connection)?;
    Ok(connection)
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign_keys")?;
    Ok(())
}

pub(super) fn ensure_schema(connection: &Connection) -> Result<()> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
          session_id TEXT PRIMARY KEY,
          created_at TEXT NOT NULL,
          dataset_path TEXT NOT NULL,
          dataset_sha256 TEXT NOT NULL,
          text_column TEXT NOT NULL,
          label_column TEXT NOT NULL,
          extra_columns_json TEXT NOT NULL,
          method TEXT NOT NULL,
          seed INTEGER NOT NULL,
          current_index INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS session_labels (
          session_id TEXT NOT NULL,
          label_order INTEGER NOT NULL,
          label TEXT NOT NULL,
          PRIMARY KEY (session_id, label),
          FOREIGN KEY (session_id) REFERENCES sessions(session_id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS sample_records (
          session_id TEXT NOT NULL,
          position INTEGER NOT NULL,
          source_row INTEGER NOT NULL,
          text TEXT NOT NULL,
          predicted_label TEXT NOT NULL,
          manual_label TEXT,
          reviewed_seq INTEGER,
          reviewed_at TEXT,
          extras_json TEXT NOT NULL,
          PRIMARY KEY (session_id, position),
          FOREIGN KEY (session_id) REFERENCES sessions(session_id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_sample_records_reviewed
          ON sample_records(session_id, reviewed_seq);
        ",
    )?;

    let now = now_utc_string();
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now],
    )?;

    Ok(())
}

fn ensure_schema_version(connection: &Connection) -> Result<()> {
    let version = read_metadata(connection, "db_schema_version")?;
    match version.as_deref() {
        Some(DB_SCHEMA_VERSION) => Ok(()),
        Some(other) => bail!(
            "session store schema {other} does not match expected {DB_SCHEMA_VERSION}"
        ),
        None => bail!("session store has no schema version"),
    }
}

pub(super) fn read_metadata(connection: &Connection, key: &str) -> Result<Option<String>> {
    let value = connection
        .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
            row.get::<_, String>(0)
        })
        .optional()
        .with_context(|| format!("failed to read metadata key {key}"))?;
    Ok(value)
}

pub(super) fn write_metadata(connection: &Connection, key: &str, value: &str) -> Result<()> {
    connection
        .execute(
            "INSERT INTO metadata(key, value) VALUES(?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            params![key, value],
        )
        .with_context(|| format!("failed to write metadata key {key}"))?;
    Ok(())
}
