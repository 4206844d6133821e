use rusqlite::Connection;

use pathtree_core::TreeConfig;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection, config: &TreeConfig) -> Result<(), StorageError> {
    config.validate()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA cache_size = -32000;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(&schema_sql(config))?;
    Ok(())
}

/// DDL for the configured node table. Parent `0` marks a root; the path stays
/// `''` between insert and path fill.
fn schema_sql(config: &TreeConfig) -> String {
    let t = &config.table;
    let c = &config.columns;
    format!(
        r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES ({SCHEMA_VERSION}, unixepoch());

CREATE TABLE IF NOT EXISTS "{t}" (
    "{id}" INTEGER PRIMARY KEY AUTOINCREMENT,
    "{parent}" INTEGER NOT NULL DEFAULT 0 CHECK ("{parent}" >= 0),
    "{path}" TEXT NOT NULL DEFAULT '',
    "{title}" TEXT NOT NULL DEFAULT '',
    "{attrs}" BLOB,
    "{deleted}" INTEGER
);
CREATE INDEX IF NOT EXISTS "idx_{t}_path" ON "{t}" ("{path}") WHERE "{deleted}" IS NULL;
CREATE INDEX IF NOT EXISTS "idx_{t}_parent" ON "{t}" ("{parent}") WHERE "{deleted}" IS NULL;
"#,
        id = c.id,
        parent = c.parent_id,
        path = c.path,
        title = c.title,
        attrs = c.attributes,
        deleted = c.deleted_at,
    )
}
