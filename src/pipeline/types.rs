//! Core types for the extraction pipeline.
//!
//! These model the full lifecycle:
//! Chunk → Context/Prompt → Dispatch → Repair → Validate → Grade → Labels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ═══════════════════════════════════════════
// Chunks
// ═══════════════════════════════════════════

/// Unique key of a chunk within a job: its inclusive character-number range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkKey {
    pub start: u32,
    pub end: u32,
}

impl ChunkKey {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Number of characters this chunk is expected to cover.
    pub fn width(&self) -> u32 {
        self.end - self.start + 1
    }
}

impl std::fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// One unit of extraction work, as persisted in the chunk store.
///
/// `context`, `prompt` and `xml_payload` start empty; the two gates start
/// false. Rows are created once per job and only ever updated in place.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub start: u32,
    pub end: u32,
    pub context: String,
    pub prompt: String,
    pub xml_payload: String,
    pub validated: bool,
    pub evaluated: bool,
}

impl Chunk {
    pub fn key(&self) -> ChunkKey {
        ChunkKey::new(self.start, self.end)
    }

    /// A chunk is complete only when both gates are set and a payload exists.
    pub fn is_complete(&self) -> bool {
        self.validated && self.evaluated && !self.xml_payload.is_empty()
    }
}

// ═══════════════════════════════════════════
// Job identity
// ═══════════════════════════════════════════

/// One run over one document.
#[derive(Debug, Clone)]
pub struct JobSpec {
    /// Identifier-safe slug naming this job's table in the store.
    pub process_name: String,
    /// Highest character number expected in the document.
    pub total_characters: u32,
}

/// Generate a unique id for one orchestrator run (for log correlation).
pub fn new_run_id() -> String {
    Uuid::new_v4().to_string()
}

// ═══════════════════════════════════════════
// Labels
// ═══════════════════════════════════════════

/// One state of a character: symbol and its description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateLabel {
    pub value: String,
    pub description: String,
}

/// One extracted character with its ordered states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterLabel {
    pub index: u32,
    pub name: String,
    pub states: Vec<StateLabel>,
}

// ═══════════════════════════════════════════
// Pass results
// ═══════════════════════════════════════════

/// Why a chunk failed to advance during a pass. Carried in the pass report
/// for operator visibility; the store's gates drive the retry itself.
#[derive(Debug, Clone)]
pub struct SlotFailure {
    pub key: ChunkKey,
    pub reason: String,
}

/// Explicit result of one retry pass over the incomplete set.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub dispatched: usize,
    pub validated: usize,
    pub graded: usize,
    pub failures: Vec<SlotFailure>,
}

// ═══════════════════════════════════════════
// Job outcome & events
// ═══════════════════════════════════════════

/// Terminal state of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    /// Every chunk passed both gates.
    Complete { passes: u32 },
    /// Attempts exhausted; these ranges remain unresolved. Work already
    /// validated is still kept and emitted.
    Partial { passes: u32, remaining: Vec<ChunkKey> },
}

impl JobOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

/// Progress event emitted during a job run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JobEvent {
    Started { chunk_count: u32 },
    PassStarted { attempt: u32, pending: u32 },
    PassFinished { attempt: u32, remaining: u32 },
    LabelsAggregated { label_count: u32 },
    Finished { complete: bool },
}

/// Result of a full document-to-NEXUS run.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub run_id: String,
    pub outcome: JobOutcome,
    pub label_count: usize,
    /// False when the target document had no insertion anchor; `text` is
    /// then the unmodified input.
    pub inserted: bool,
    pub text: String,
    pub duration_ms: u64,
}
