//! Batch Character/State Extraction Pipeline
//!
//! Turns the character list of a phylogenetic paper into validated
//! CHARSTATELABELS, one persistent chunk at a time:
//! ```text
//! Store → Context → Prompt → Dispatch → Repair → Validate → Grade → Labels
//! ```
//!
//! Chunk state is durable: every intermediate lands in SQLite before the
//! next step runs, so retry passes (and restarts) only ever touch what is
//! still incomplete.

pub mod context;
pub mod dispatch;
pub mod labels;
pub mod orchestrator;
pub mod prompt;
pub mod repair;
pub mod store;
pub mod types;
pub mod validate;

pub use context::{context_window, WindowProfile};
pub use dispatch::{Clock, Dispatcher, RateGate, SystemClock};
pub use labels::{collect_labels, format_labels};
pub use orchestrator::{run_job, RetryOrchestrator};
pub use prompt::generation_prompt;
pub use repair::repair_fragment;
pub use store::{ChunkStore, ChunkUpdate, SqliteChunkStore, TextField};
pub use types::*;
pub use validate::validate_payload;
