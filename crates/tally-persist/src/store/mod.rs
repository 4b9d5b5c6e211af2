mod schema;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection};
use tracing::Span;

use crate::error::{PersistError, Result};
use crate::models::{UsageRecord, UsageRow, UsageStats};

const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Uninitialized,
    Ready,
}

/// SQLite-backed store of usage records
///
/// Inserts are strict (every fault is returned). Reads are best-effort: a
/// failing query is logged and reported as an empty result.
pub struct UsageStore {
    path: PathBuf,
    conn: Option<Connection>,
    span: Span,
}

impl UsageStore {
    /// Bind a store to `path` without touching the filesystem
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let span = tracing::info_span!("usage_store", path = %path.display());
        Self {
            path,
            conn: None,
            span,
        }
    }

    /// Bind and provision in one step
    pub fn open_at(path: impl Into<PathBuf>) -> Result<Self> {
        let mut store = Self::new(path);
        store.open()?;
        Ok(store)
    }

    /// Log inside the caller's span instead of the default one
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> StoreState {
        if self.conn.is_some() {
            StoreState::Ready
        } else {
            StoreState::Uninitialized
        }
    }

    /// Create the table and indexes if missing. Safe to call repeatedly.
    ///
    /// The store only becomes `Ready` once the schema is in place.
    pub fn open(&mut self) -> Result<()> {
        let span = self.span.clone();
        let _enter = span.enter();

        match self.conn.as_ref() {
            Some(conn) => init_schema(conn)?,
            None => {
                let conn = open_connection(&self.path)?;
                init_schema(&conn)?;
                self.conn = Some(conn);
            }
        }

        tracing::info!("Table api_usages and indexes ready");
        Ok(())
    }

    /// Insert one record inside a transaction
    pub fn insert(&mut self, record: &UsageRecord) -> Result<()> {
        let span = self.span.clone();
        let _enter = span.enter();

        let row = record.to_row()?;
        let counts = [
            to_sql_integer("prompt_tokens", row.prompt_tokens)?,
            to_sql_integer("completion_tokens", row.completion_tokens)?,
            to_sql_integer("total_tokens", row.total_tokens)?,
            to_sql_integer("cached_tokens", row.cached_tokens)?,
            to_sql_integer("cache_hit_tokens", row.cache_hit_tokens)?,
            to_sql_integer("cache_miss_tokens", row.cache_miss_tokens)?,
        ];
        let conn = self.ready_mut()?;

        let tx = conn.transaction()?;
        let inserted = tx.execute(
            schema::INSERT_USAGE,
            params![
                row.usage_id,
                row.created_at,
                row.model,
                row.system_fingerprint,
                row.prompt,
                row.completion,
                counts[0],
                counts[1],
                counts[2],
                counts[3],
                counts[4],
                counts[5],
                row.finish_reason,
                row.logprobs,
            ],
        );

        // Dropping `tx` without commit rolls it back
        match inserted {
            Ok(_) => {}
            Err(e) if is_primary_key_violation(&e) => {
                tracing::warn!(usage_id = %row.usage_id, "Usage record already stored");
                return Err(PersistError::DuplicateKey(row.usage_id));
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to insert usage record");
                return Err(PersistError::Storage(e));
            }
        }
        tx.commit()?;

        tracing::info!(usage_id = %row.usage_id, model = %row.model, "Usage record stored");
        Ok(())
    }

    /// Stored rows in insertion order, optionally capped
    pub fn fetch_all(&self, limit: Option<usize>) -> Result<Vec<UsageRow>> {
        let _enter = self.span.enter();
        let conn = self.ready()?;

        match query_rows(conn, limit) {
            Ok(rows) => Ok(rows),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read usage records");
                Ok(Vec::new())
            }
        }
    }

    /// Aggregate request, token and per-model counts
    pub fn stats(&self) -> Result<UsageStats> {
        let _enter = self.span.enter();
        let conn = self.ready()?;

        match query_stats(conn) {
            Ok(stats) => Ok(stats),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to compute usage stats");
                Ok(UsageStats::default())
            }
        }
    }

    fn ready(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| PersistError::NotInitialized(self.path.display().to_string()))
    }

    fn ready_mut(&mut self) -> Result<&mut Connection> {
        let path = &self.path;
        self.conn
            .as_mut()
            .ok_or_else(|| PersistError::NotInitialized(path.display().to_string()))
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    if path != Path::new(IN_MEMORY) {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(path)?;
    let _ = conn.busy_timeout(Duration::from_secs(5));
    let _ = conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;");
    Ok(conn)
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(schema::CREATE_SCHEMA).map_err(|e| {
        tracing::error!(error = %e, "Failed to create or verify api_usages table");
        PersistError::Storage(e)
    })
}

fn query_rows(conn: &Connection, limit: Option<usize>) -> rusqlite::Result<Vec<UsageRow>> {
    let limit = limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX)).unwrap_or(-1);

    let mut stmt = conn.prepare(schema::SELECT_USAGES)?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok(UsageRow {
            usage_id: row.get(0)?,
            created_at: row.get(1)?,
            model: row.get(2)?,
            system_fingerprint: row.get(3)?,
            prompt: row.get(4)?,
            completion: row.get(5)?,
            prompt_tokens: i64_to_u64(row.get(6)?),
            completion_tokens: i64_to_u64(row.get(7)?),
            total_tokens: i64_to_u64(row.get(8)?),
            cached_tokens: i64_to_u64(row.get::<_, Option<i64>>(9)?.unwrap_or(0)),
            cache_hit_tokens: i64_to_u64(row.get::<_, Option<i64>>(10)?.unwrap_or(0)),
            cache_miss_tokens: i64_to_u64(row.get::<_, Option<i64>>(11)?.unwrap_or(0)),
            finish_reason: row.get(12)?,
            logprobs: row.get(13)?,
        })
    })?;

    rows.collect()
}

fn query_stats(conn: &Connection) -> rusqlite::Result<UsageStats> {
    let total_requests: i64 = conn.query_row(schema::COUNT_REQUESTS, [], |row| row.get(0))?;
    let total_tokens: i64 = conn.query_row(schema::SUM_TOKENS, [], |row| row.get(0))?;

    let mut stmt = conn.prepare(schema::COUNT_BY_MODEL)?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut models_usage = BTreeMap::new();
    for row in rows {
        let (model, count) = row?;
        models_usage.insert(model, i64_to_u64(count));
    }

    Ok(UsageStats {
        total_requests: i64_to_u64(total_requests),
        total_tokens: i64_to_u64(total_tokens),
        models_usage,
    })
}

fn is_primary_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn to_sql_integer(field: &'static str, value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| PersistError::ValueOutOfRange { field, value })
}

fn i64_to_u64(value: i64) -> u64 {
    if value <= 0 { 0 } else { value as u64 }
}
