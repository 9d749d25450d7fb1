//! Chunk store — durable per-job state for the extraction pipeline.
//!
//! One table per job, named by the job's `process_name`. Rows are created
//! once at initialization (only the range populated) and updated in place
//! across retry passes; the table is dropped and recreated when the job is
//! re-initialized. No chunk state lives only in memory between passes, so
//! an interrupted run resumes from whatever the store last saw.

use chrono::Utc;
use rusqlite::{params, Connection};

use super::types::{Chunk, ChunkKey};
use crate::db::DatabaseError;

/// A typed point update to one chunk field.
#[derive(Debug, Clone)]
pub enum ChunkUpdate {
    Context(String),
    Prompt(String),
    Payload(String),
    Validated(bool),
    Evaluated(bool),
}

impl ChunkUpdate {
    fn column(&self) -> &'static str {
        match self {
            Self::Context(_) => "context",
            Self::Prompt(_) => "prompt",
            Self::Payload(_) => "xml_payload",
            Self::Validated(_) => "validated",
            Self::Evaluated(_) => "evaluated",
        }
    }
}

/// Text columns readable back in bulk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Context,
    Prompt,
    Payload,
}

impl TextField {
    fn column(&self) -> &'static str {
        match self {
            Self::Context => "context",
            Self::Prompt => "prompt",
            Self::Payload => "xml_payload",
        }
    }
}

/// Persistent chunk state, keyed by `(start, end)` within a job.
pub trait ChunkStore: Send + Sync {
    /// Create (or recreate) the job's table and insert one row per chunk,
    /// partitioning `[1, total_characters]` into contiguous ranges of
    /// `chunk_width` (last chunk may be shorter). All other fields empty.
    fn initialize(
        &self,
        conn: &Connection,
        process_name: &str,
        total_characters: u32,
        chunk_width: u32,
    ) -> Result<(), DatabaseError>;

    /// Chunks still failing either gate or missing a payload, ascending by
    /// start. This is the retry orchestrator's pass snapshot.
    fn list_incomplete(
        &self,
        conn: &Connection,
        process_name: &str,
    ) -> Result<Vec<Chunk>, DatabaseError>;

    /// Point update of one field. Never creates rows; an unknown key is an
    /// error.
    fn update(
        &self,
        conn: &Connection,
        process_name: &str,
        key: ChunkKey,
        update: &ChunkUpdate,
    ) -> Result<(), DatabaseError>;

    /// Values of one text field for a chunk subset, in input order.
    fn read_field(
        &self,
        conn: &Connection,
        process_name: &str,
        keys: &[ChunkKey],
        field: TextField,
    ) -> Result<Vec<String>, DatabaseError>;

    /// All non-empty payloads ascending by start, regardless of gate state.
    fn list_payloads(
        &self,
        conn: &Connection,
        process_name: &str,
    ) -> Result<Vec<(ChunkKey, String)>, DatabaseError>;

    /// Every chunk row ascending by start.
    fn list_all(&self, conn: &Connection, process_name: &str) -> Result<Vec<Chunk>, DatabaseError>;
}

/// SQLite-backed chunk store.
pub struct SqliteChunkStore;

impl SqliteChunkStore {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SqliteChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a process name as a plain SQL identifier.
///
/// Names are interpolated into DDL/DML, so anything outside
/// `[A-Za-z_][A-Za-z0-9_]*` is rejected. Deriving a safe slug from a
/// filename is the caller's concern.
fn table_name(process_name: &str) -> Result<String, DatabaseError> {
    let mut chars = process_name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if head_ok && tail_ok {
        Ok(format!("\"{process_name}\""))
    } else {
        Err(DatabaseError::InvalidTableName(process_name.to_string()))
    }
}

fn now_stamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn chunk_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chunk> {
    Ok(Chunk {
        start: row.get(0)?,
        end: row.get(1)?,
        context: row.get(2)?,
        prompt: row.get(3)?,
        xml_payload: row.get(4)?,
        validated: row.get(5)?,
        evaluated: row.get(6)?,
    })
}

const CHUNK_COLUMNS: &str = "start, \"end\", context, prompt, xml_payload, validated, evaluated";

impl ChunkStore for SqliteChunkStore {
    fn initialize(
        &self,
        conn: &Connection,
        process_name: &str,
        total_characters: u32,
        chunk_width: u32,
    ) -> Result<(), DatabaseError> {
        if total_characters == 0 || chunk_width == 0 {
            return Err(DatabaseError::InvalidTableName(format!(
                "cannot initialize {process_name}: empty character range"
            )));
        }
        let table = table_name(process_name)?;

        let tx = conn.unchecked_transaction()?;

        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table};
             CREATE TABLE {table} (
                 start       INTEGER NOT NULL,
                 \"end\"     INTEGER NOT NULL,
                 context     TEXT NOT NULL DEFAULT '',
                 prompt      TEXT NOT NULL DEFAULT '',
                 xml_payload TEXT NOT NULL DEFAULT '',
                 validated   INTEGER NOT NULL DEFAULT 0,
                 evaluated   INTEGER NOT NULL DEFAULT 0,
                 updated_at  TEXT,
                 PRIMARY KEY (start, \"end\")
             );"
        ))?;

        let mut insert = tx.prepare(&format!(
            "INSERT INTO {table} (start, \"end\") VALUES (?1, ?2)"
        ))?;

        let mut start = 1u32;
        while start <= total_characters {
            let end = (start + chunk_width - 1).min(total_characters);
            insert.execute(params![start, end])?;
            start = end + 1;
        }
        drop(insert);

        tx.commit()?;
        Ok(())
    }

    fn list_incomplete(
        &self,
        conn: &Connection,
        process_name: &str,
    ) -> Result<Vec<Chunk>, DatabaseError> {
        let table = table_name(process_name)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHUNK_COLUMNS} FROM {table}
             WHERE validated = 0 OR evaluated = 0 OR xml_payload = ''
             ORDER BY start ASC"
        ))?;

        let rows = stmt.query_map([], chunk_from_row)?;
        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(row?);
        }
        Ok(chunks)
    }

    fn update(
        &self,
        conn: &Connection,
        process_name: &str,
        key: ChunkKey,
        update: &ChunkUpdate,
    ) -> Result<(), DatabaseError> {
        let table = table_name(process_name)?;
        let sql = format!(
            "UPDATE {table} SET {col} = ?1, updated_at = ?2 WHERE start = ?3 AND \"end\" = ?4",
            col = update.column()
        );

        let affected = match update {
            ChunkUpdate::Context(v) | ChunkUpdate::Prompt(v) | ChunkUpdate::Payload(v) => {
                conn.execute(&sql, params![v, now_stamp(), key.start, key.end])?
            }
            ChunkUpdate::Validated(v) | ChunkUpdate::Evaluated(v) => {
                conn.execute(&sql, params![v, now_stamp(), key.start, key.end])?
            }
        };

        if affected == 0 {
            return Err(DatabaseError::NotFound {
                table: process_name.to_string(),
                start: key.start,
                end: key.end,
            });
        }
        Ok(())
    }

    fn read_field(
        &self,
        conn: &Connection,
        process_name: &str,
        keys: &[ChunkKey],
        field: TextField,
    ) -> Result<Vec<String>, DatabaseError> {
        let table = table_name(process_name)?;
        let sql = format!(
            "SELECT {col} FROM {table} WHERE start = ?1 AND \"end\" = ?2",
            col = field.column()
        );
        let mut stmt = conn.prepare(&sql)?;

        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let value = stmt
                .query_row(params![key.start, key.end], |row| row.get::<_, String>(0))
                .map_err(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => DatabaseError::NotFound {
                        table: process_name.to_string(),
                        start: key.start,
                        end: key.end,
                    },
                    _ => DatabaseError::Sqlite(e),
                })?;
            values.push(value);
        }
        Ok(values)
    }

    fn list_payloads(
        &self,
        conn: &Connection,
        process_name: &str,
    ) -> Result<Vec<(ChunkKey, String)>, DatabaseError> {
        let table = table_name(process_name)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT start, \"end\", xml_payload FROM {table}
             WHERE xml_payload != ''
             ORDER BY start ASC"
        ))?;

        let rows = stmt.query_map([], |row| {
            Ok((
                ChunkKey::new(row.get(0)?, row.get(1)?),
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut payloads = Vec::new();
        for row in rows {
            payloads.push(row?);
        }
        Ok(payloads)
    }

    fn list_all(&self, conn: &Connection, process_name: &str) -> Result<Vec<Chunk>, DatabaseError> {
        let table = table_name(process_name)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHUNK_COLUMNS} FROM {table} ORDER BY start ASC"
        ))?;

        let rows = stmt.query_map([], chunk_from_row)?;
        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(row?);
        }
        Ok(chunks)
    }
}
