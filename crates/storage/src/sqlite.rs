use std::path::Path;

use rusqlite::{Connection, TransactionBehavior};
use tracing::debug;

use pathtree_core::{
    NodeId, PathCodec, TreeConfig,
    field_value::{decode_attributes, encode_attributes},
};

use crate::error::StorageError;
use crate::traits::{NewNode, NodeChanges, NodeRecord, NodeStore, Store};

/// Upper bound on bound parameters per `IN (...)` lookup.
const ID_CHUNK: usize = 500;

type RawNode = (i64, i64, String, String, Option<Vec<u8>>);

/// SQL text rendered once from the table configuration.
#[derive(Debug)]
struct NodeSql {
    select: String,
    by_id: String,
    by_prefix: String,
    longest_within: String,
    insert: String,
    update_parent: String,
    update_path: String,
    update_path_prefix: String,
    update_fields: String,
    soft_delete: String,
    scan_live: String,
    id_column: String,
    live: String,
}

impl NodeSql {
    fn new(config: &TreeConfig) -> Self {
        let t = &config.table;
        let c = &config.columns;
        let (id, parent, path, title, attrs, deleted) = (
            &c.id,
            &c.parent_id,
            &c.path,
            &c.title,
            &c.attributes,
            &c.deleted_at,
        );
        let select =
            format!(r#"SELECT "{id}", "{parent}", "{path}", "{title}", "{attrs}" FROM "{t}""#);
        let live = format!(r#""{deleted}" IS NULL"#);
        // ?1 = prefix, ?2 = prefix + delimiter
        let within = format!(r#"("{path}" = ?1 OR substr("{path}", 1, length(?2)) = ?2)"#);
        Self {
            by_id: format!(r#"{select} WHERE "{id}" = ?1 AND {live}"#),
            by_prefix: format!("{select} WHERE {live} AND {within}"),
            longest_within: format!(
                r#"SELECT COALESCE(MAX(length("{path}")), 0) FROM "{t}" WHERE {live} AND {within}"#
            ),
            insert: format!(
                r#"INSERT INTO "{t}" ("{parent}", "{title}", "{attrs}") VALUES (?1, ?2, ?3)"#
            ),
            update_parent: format!(r#"UPDATE "{t}" SET "{parent}" = ?2 WHERE "{id}" = ?1 AND {live}"#),
            update_path: format!(r#"UPDATE "{t}" SET "{path}" = ?2 WHERE "{id}" = ?1 AND {live}"#),
            update_path_prefix: format!(
                r#"UPDATE "{t}" SET "{path}" = ?3 || substr("{path}", length(?1) + 1) WHERE {live} AND {within}"#
            ),
            update_fields: format!(
                r#"UPDATE "{t}" SET "{title}" = COALESCE(?2, "{title}"), "{attrs}" = COALESCE(?3, "{attrs}") WHERE "{id}" = ?1 AND {live}"#
            ),
            soft_delete: format!(
                r#"UPDATE "{t}" SET "{deleted}" = CAST(unixepoch('now', 'subsec') * 1000 AS INTEGER) WHERE "{id}" = ?1 AND {live}"#
            ),
            scan_live: format!(r#"{select} WHERE {live} ORDER BY "{path}""#),
            id_column: id.clone(),
            select,
            live,
        }
    }

    fn by_ids(&self, count: usize) -> String {
        let placeholders = vec!["?"; count].join(", ");
        format!(
            r#"{} WHERE "{}" IN ({placeholders}) AND {}"#,
            self.select, self.id_column, self.live
        )
    }
}

pub struct SqliteStorage {
    conn: Connection,
    config: TreeConfig,
    codec: PathCodec,
    sql: NodeSql,
}

impl SqliteStorage {
    pub fn open(path: impl AsRef<Path>, config: TreeConfig) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, config)
    }

    pub fn open_in_memory(config: TreeConfig) -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, config)
    }

    fn with_connection(conn: Connection, config: TreeConfig) -> Result<Self, StorageError> {
        crate::schema::init_schema(&conn, &config)?;
        Ok(Self {
            conn,
            codec: config.codec(),
            sql: NodeSql::new(&config),
            config,
        })
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Raw connection, for statements that bypass the coordinated operations.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Every live row, ordered by path.
    pub fn scan_live(&self) -> Result<Vec<NodeRecord>, StorageError> {
        let mut stmt = self.conn.prepare(&self.sql.scan_live)?;
        let rows = stmt
            .query_map([], read_raw)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(into_record).collect()
    }

    fn scope(&self) -> SqliteScope<'_> {
        SqliteScope {
            conn: &self.conn,
            codec: self.codec,
            sql: &self.sql,
        }
    }
}

fn read_raw(row: &rusqlite::Row) -> rusqlite::Result<RawNode> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn into_record((id, parent, path, title, attrs): RawNode) -> Result<NodeRecord, StorageError> {
    let id = NodeId::new(id)
        .ok_or_else(|| StorageError::Serialization(format!("invalid node id {id}")))?;
    let attributes = decode_attributes(attrs.as_deref().unwrap_or_default())?;
    Ok(NodeRecord {
        id,
        parent_id: NodeId::from_parent_column(parent),
        path,
        title,
        attributes,
    })
}

/// [`NodeStore`] over a borrowed connection: either the storage's own
/// connection in autocommit mode, or an open transaction.
struct SqliteScope<'a> {
    conn: &'a Connection,
    codec: PathCodec,
    sql: &'a NodeSql,
}

impl SqliteScope<'_> {
    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<NodeRecord>, StorageError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt
            .query_map(params, read_raw)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(into_record).collect()
    }

    fn expect_one(&self, id: NodeId, changed: usize) -> Result<(), StorageError> {
        if changed == 0 {
            return Err(StorageError::NotFound(id));
        }
        Ok(())
    }
}

impl NodeStore for SqliteScope<'_> {
    fn get_by_id(&self, id: NodeId) -> Result<NodeRecord, StorageError> {
        self.query(&self.sql.by_id, rusqlite::params![id.get()])?
            .into_iter()
            .next()
            .ok_or(StorageError::NotFound(id))
    }

    fn get_by_ids(&self, ids: &[NodeId]) -> Result<Vec<NodeRecord>, StorageError> {
        let mut ids: Vec<i64> = ids.iter().map(NodeId::get).collect();
        ids.sort_unstable();
        ids.dedup();
        let mut result = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(ID_CHUNK) {
            let sql = self.sql.by_ids(chunk.len());
            result.extend(self.query(&sql, rusqlite::params_from_iter(chunk.iter()))?);
        }
        Ok(result)
    }

    fn get_by_path_prefix(&self, prefix: &str) -> Result<Vec<NodeRecord>, StorageError> {
        let prefix = self.codec.normalize_prefix(prefix);
        let bounded = format!("{prefix}{}", self.codec.delimiter());
        self.query(&self.sql.by_prefix, rusqlite::params![prefix, bounded])
    }

    fn longest_path_within(&self, prefix: &str) -> Result<usize, StorageError> {
        let prefix = self.codec.normalize_prefix(prefix);
        let bounded = format!("{prefix}{}", self.codec.delimiter());
        let mut stmt = self.conn.prepare_cached(&self.sql.longest_within)?;
        let longest: i64 = stmt.query_row(rusqlite::params![prefix, bounded], |row| row.get(0))?;
        Ok(usize::try_from(longest).unwrap_or_default())
    }

    fn insert(&self, node: &NewNode) -> Result<NodeId, StorageError> {
        let attrs = encode_attributes(&node.attributes)?;
        self.conn.execute(
            &self.sql.insert,
            rusqlite::params![NodeId::to_parent_column(node.parent_id), node.title, attrs],
        )?;
        let raw = self.conn.last_insert_rowid();
        NodeId::new(raw).ok_or_else(|| StorageError::Serialization(format!("invalid rowid {raw}")))
    }

    fn update_parent(&self, id: NodeId, parent_id: Option<NodeId>) -> Result<(), StorageError> {
        let changed = self.conn.execute(
            &self.sql.update_parent,
            rusqlite::params![id.get(), NodeId::to_parent_column(parent_id)],
        )?;
        self.expect_one(id, changed)
    }

    fn update_path(&self, id: NodeId, path: &str) -> Result<(), StorageError> {
        let changed = self
            .conn
            .execute(&self.sql.update_path, rusqlite::params![id.get(), path])?;
        self.expect_one(id, changed)
    }

    fn update_path_prefix(
        &self,
        old_prefix: &str,
        new_prefix: &str,
    ) -> Result<usize, StorageError> {
        let old_prefix = self.codec.normalize_prefix(old_prefix);
        if old_prefix.is_empty() {
            return Err(StorageError::InvalidArgument(
                "prefix cascade needs a non-empty old prefix".into(),
            ));
        }
        let bounded = format!("{old_prefix}{}", self.codec.delimiter());
        let changed = self.conn.execute(
            &self.sql.update_path_prefix,
            rusqlite::params![old_prefix, bounded, new_prefix],
        )?;
        debug!(old_prefix, new_prefix, rows = changed, "rewrote path prefix");
        Ok(changed)
    }

    fn update_fields(&self, id: NodeId, changes: &NodeChanges) -> Result<(), StorageError> {
        if changes.is_empty() {
            return Err(StorageError::InvalidArgument(format!("no column changes for {id}")));
        }
        let attrs = changes
            .attributes
            .as_ref()
            .map(encode_attributes)
            .transpose()?;
        let changed = self.conn.execute(
            &self.sql.update_fields,
            rusqlite::params![id.get(), changes.title, attrs],
        )?;
        self.expect_one(id, changed)
    }

    fn soft_delete(&self, id: NodeId) -> Result<(), StorageError> {
        let changed = self
            .conn
            .execute(&self.sql.soft_delete, rusqlite::params![id.get()])?;
        self.expect_one(id, changed)
    }
}

impl NodeStore for SqliteStorage {
    fn get_by_id(&self, id: NodeId) -> Result<NodeRecord, StorageError> {
        self.scope().get_by_id(id)
    }

    fn get_by_ids(&self, ids: &[NodeId]) -> Result<Vec<NodeRecord>, StorageError> {
        self.scope().get_by_ids(ids)
    }

    fn get_by_path_prefix(&self, prefix: &str) -> Result<Vec<NodeRecord>, StorageError> {
        self.scope().get_by_path_prefix(prefix)
    }

    fn longest_path_within(&self, prefix: &str) -> Result<usize, StorageError> {
        self.scope().longest_path_within(prefix)
    }

    fn insert(&self, node: &NewNode) -> Result<NodeId, StorageError> {
        self.scope().insert(node)
    }

    fn update_parent(&self, id: NodeId, parent_id: Option<NodeId>) -> Result<(), StorageError> {
        self.scope().update_parent(id, parent_id)
    }

    fn update_path(&self, id: NodeId, path: &str) -> Result<(), StorageError> {
        self.scope().update_path(id, path)
    }

    fn update_path_prefix(
        &self,
        old_prefix: &str,
        new_prefix: &str,
    ) -> Result<usize, StorageError> {
        self.scope().update_path_prefix(old_prefix, new_prefix)
    }

    fn update_fields(&self, id: NodeId, changes: &NodeChanges) -> Result<(), StorageError> {
        self.scope().update_fields(id, changes)
    }

    fn soft_delete(&self, id: NodeId) -> Result<(), StorageError> {
        self.scope().soft_delete(id)
    }
}

impl Store for SqliteStorage {
    fn codec(&self) -> PathCodec {
        self.codec
    }

    fn with_transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn NodeStore) -> Result<T, E>,
        E: From<StorageError>,
    {
        // IMMEDIATE takes the write lock up front, so the reads inside `f`
        // cannot be invalidated by another writer before commit.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StorageError::from)?;
        let scope = SqliteScope {
            conn: &tx,
            codec: self.codec,
            sql: &self.sql,
        };
        let out = f(&scope)?;
        tx.commit().map_err(StorageError::from)?;
        Ok(out)
    }
}
