//! Job-level error taxonomy.
//!
//! Per-chunk failures never surface here — they are absorbed into the
//! chunk's gate state and retried. Only setup and store faults are fatal
//! to a job.

use thiserror::Error;

use crate::db::DatabaseError;
use crate::document::DocumentError;
use crate::model::ModelError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Malformed fragment: {0}")]
    Format(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
