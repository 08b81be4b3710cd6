use rusqlite::Connection;

pub(crate) const SCHEMA_VERSION: &str = "1";

/// Idempotent; runs on every open.
pub(crate) fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys=ON;

        CREATE TABLE IF NOT EXISTS meta (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS devices (
          device_no INTEGER PRIMARY KEY,
          address TEXT NOT NULL,
          heartbeat_point_name TEXT NOT NULL DEFAULT '',
          heartbeat_point_id TEXT NOT NULL DEFAULT '',
          link_status TEXT NOT NULL DEFAULT 'disconnected'
            CHECK (link_status IN ('connected', 'disconnected')),
          liveness_status TEXT NOT NULL DEFAULT 'disconnected'
            CHECK (liveness_status IN ('connected', 'disconnected')),
          point_count INTEGER NOT NULL DEFAULT 0 CHECK (point_count >= 0),
          last_checked_at TEXT
        );

        CREATE TABLE IF NOT EXISTS points (
          device_no INTEGER NOT NULL REFERENCES devices(device_no),
          name TEXT NOT NULL,
          identifier TEXT NOT NULL,
          UNIQUE (device_no, name)
        );

        CREATE INDEX IF NOT EXISTS idx_devices_heartbeat
          ON devices(heartbeat_point_id) WHERE heartbeat_point_id <> '';
        "#,
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION],
    )?;
    Ok(())
}
