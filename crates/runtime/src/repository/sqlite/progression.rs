//! SQLite-backed ProgressionRepository implementation.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use leveling_core::{EntityId, ProgressionRecord};
use rusqlite::{Connection, OptionalExtension, params};

use crate::repository::traits::check_all_metadata;
use crate::repository::{MetaEntries, ProgressionRepository, RepositoryError, Result, XpRemap};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS progression (
    entity_id VARCHAR(36) PRIMARY KEY,
    xp BIGINT NOT NULL
);

CREATE TABLE IF NOT EXISTS progression_meta (
    meta_key VARCHAR(64) PRIMARY KEY,
    meta_value VARCHAR(255) NOT NULL
);
"#;

/// SQLite implementation of ProgressionRepository.
///
/// One connection guarded by a mutex; the connection is dropped on
/// [`close`](ProgressionRepository::close). XP rewrites run inside a single
/// transaction, paging through the table by primary key.
pub struct SqliteProgressionRepository {
    conn: Mutex<Option<Connection>>,
    location: PathBuf,
}

impl SqliteProgressionRepository {
    /// Open or create the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn, path.to_path_buf())
    }

    /// Private database that disappears with the repository.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, PathBuf::from(":memory:"))
    }

    fn with_connection(conn: Connection, location: PathBuf) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        tracing::debug!("Opened SQLite progression store at {}", location.display());
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            location,
        })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.conn.lock().map_err(|_| RepositoryError::LockPoisoned)?;
        let conn = guard.as_mut().ok_or(RepositoryError::Closed)?;
        f(conn)
    }
}

fn parse_entity(text: &str) -> Result<EntityId> {
    text.parse()
        .map_err(|e| RepositoryError::CorruptedData(format!("entity_id '{text}': {e}")))
}

/// Upserts `entries` on `conn`; callers wrap it in a transaction.
fn upsert_meta(conn: &Connection, entries: &MetaEntries<'_>) -> Result<()> {
    let mut upsert = conn.prepare_cached(
        "INSERT INTO progression_meta (meta_key, meta_value) VALUES (?1, ?2)
         ON CONFLICT(meta_key) DO UPDATE SET meta_value = excluded.meta_value",
    )?;
    for &(key, value) in entries {
        upsert.execute(params![key, value])?;
    }
    Ok(())
}

impl ProgressionRepository for SqliteProgressionRepository {
    fn save(&self, record: &ProgressionRecord) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO progression (entity_id, xp) VALUES (?1, ?2)
                 ON CONFLICT(entity_id) DO UPDATE SET xp = excluded.xp",
                params![record.entity_id().to_string(), record.xp()],
            )?;
            tracing::debug!(entity = %record.entity_id(), xp = record.xp(), "Saved progression record");
            Ok(())
        })
    }

    fn load(&self, id: EntityId) -> Result<Option<ProgressionRecord>> {
        self.with_conn(|conn| {
            let xp: Option<i64> = conn
                .query_row(
                    "SELECT xp FROM progression WHERE entity_id = ?1",
                    params![id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(xp.map(|xp| ProgressionRecord::with_xp(id, xp)))
        })
    }

    fn exists(&self, id: EntityId) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM progression WHERE entity_id = ?1",
                    params![id.to_string()],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    fn close(&self) -> Result<()> {
        let mut guard = self.conn.lock().map_err(|_| RepositoryError::LockPoisoned)?;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| RepositoryError::Sqlite(e))?;
            tracing::debug!("Closed SQLite progression store at {}", self.location.display());
        }
        Ok(())
    }

    fn meta_get(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let value = conn
                .query_row(
                    "SELECT meta_value FROM progression_meta WHERE meta_key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    fn meta_put_all(&self, entries: &MetaEntries<'_>) -> Result<()> {
        check_all_metadata(entries)?;
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            upsert_meta(&tx, entries)?;
            tx.commit()?;
            Ok(())
        })
    }

    fn rewrite_xp(
        &self,
        batch_size: usize,
        remap: &mut XpRemap<'_>,
        meta: &MetaEntries<'_>,
    ) -> Result<u64> {
        check_all_metadata(meta)?;
        let batch_size = batch_size.max(1);
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut visited = 0u64;
            let mut cursor = String::new();

            loop {
                let batch: Vec<(String, i64)> = {
                    let mut select = tx.prepare_cached(
                        "SELECT entity_id, xp FROM progression
                         WHERE entity_id > ?1 ORDER BY entity_id LIMIT ?2",
                    )?;
                    let rows = select.query_map(params![cursor, batch_size as i64], |row| {
                        Ok((row.get(0)?, row.get(1)?))
                    })?;
                    rows.collect::<rusqlite::Result<_>>()?
                };
                let Some((last, _)) = batch.last() else {
                    break;
                };
                cursor = last.clone();

                let mut update =
                    tx.prepare_cached("UPDATE progression SET xp = ?1 WHERE entity_id = ?2")?;
                for (text, xp) in &batch {
                    let record = ProgressionRecord::with_xp(parse_entity(text)?, *xp);
                    let rewritten = remap(&record)?.max(0);
                    update.execute(params![rewritten, text])?;
                }
                visited += batch.len() as u64;
                tracing::debug!(batch = batch.len(), visited, "Rewrote progression batch");
            }

            upsert_meta(&tx, meta)?;

            // Dropping `tx` without commit rolls everything back.
            tx.commit()?;
            Ok(visited)
        })
    }

    fn list_ids(&self) -> Result<Vec<EntityId>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT entity_id FROM progression")?;
            let texts = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let mut ids = texts
                .iter()
                .map(|text| parse_entity(text))
                .collect::<Result<Vec<_>>>()?;
            ids.sort_unstable();
            Ok(ids)
        })
    }

    fn count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM progression", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }
}
