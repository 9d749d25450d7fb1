pub mod sqlite;

pub use sqlite::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Chunk not found: {table} range {start}-{end}")]
    NotFound { table: String, start: u32, end: u32 },

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),
}
