//! Retry orchestration — drives the extraction pipeline over the incomplete
//! chunk set, pass by pass, until every gate is up or attempts run out.
//!
//! Passes are strictly sequential; only the model fan-out inside a pass is
//! concurrent. Each pass takes a fresh snapshot of the incomplete set from
//! the store, so a crash between passes resumes exactly where it stopped.

use std::time::Instant;

use rusqlite::Connection;

use super::context::context_window;
use super::dispatch::Dispatcher;
use super::labels::{collect_labels, format_labels};
use super::prompt::{build_completion_requests, build_grading_requests, generation_prompt};
use super::repair::repair_fragment;
use super::store::{ChunkStore, ChunkUpdate, TextField};
use super::types::{
    new_run_id, Chunk, ChunkKey, JobEvent, JobOutcome, JobReport, JobSpec, PassReport, SlotFailure,
};
use super::validate::validate_payload;
use crate::config::PipelineConfig;
use crate::document::DocumentSource;
use crate::error::PipelineError;
use crate::nexus::splice_labels;

/// Runs bounded retry passes over a job's incomplete chunks.
pub struct RetryOrchestrator {
    dispatcher: Dispatcher,
    config: PipelineConfig,
}

impl RetryOrchestrator {
    pub fn new(dispatcher: Dispatcher, config: PipelineConfig) -> Self {
        Self { dispatcher, config }
    }

    /// Drive passes until the incomplete set is empty or attempts run out.
    ///
    /// A pass-level error is logged and the remaining chunks retried, but
    /// the attempt is still consumed so a persistent fault cannot loop
    /// forever. Exhaustion is not a failure: the outcome reports the
    /// unresolved ranges and everything already validated stays stored.
    pub async fn run(
        &self,
        conn: &Connection,
        store: &dyn ChunkStore,
        job: &JobSpec,
        raw_text: &str,
        progress: Option<&dyn Fn(JobEvent)>,
    ) -> Result<JobOutcome, PipelineError> {
        let mut attempt = 0u32;

        while attempt < self.config.max_attempts {
            let incomplete = store.list_incomplete(conn, &job.process_name)?;
            if incomplete.is_empty() {
                return Ok(JobOutcome::Complete { passes: attempt });
            }

            emit(
                progress,
                JobEvent::PassStarted {
                    attempt: attempt + 1,
                    pending: incomplete.len() as u32,
                },
            );

            match self.run_pass(conn, store, job, raw_text, &incomplete).await {
                Ok(report) => {
                    tracing::info!(
                        job = %job.process_name,
                        attempt = attempt + 1,
                        dispatched = report.dispatched,
                        validated = report.validated,
                        graded = report.graded,
                        failures = report.failures.len(),
                        "Pass finished"
                    );
                    for failure in &report.failures {
                        tracing::debug!(chunk = %failure.key, reason = %failure.reason, "Chunk did not advance");
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        job = %job.process_name,
                        attempt = attempt + 1,
                        error = %e,
                        "Pass failed; remaining chunks will be retried"
                    );
                }
            }

            attempt += 1;

            let remaining = store.list_incomplete(conn, &job.process_name)?.len() as u32;
            emit(progress, JobEvent::PassFinished { attempt, remaining });
        }

        let remaining: Vec<ChunkKey> = store
            .list_incomplete(conn, &job.process_name)?
            .iter()
            .map(Chunk::key)
            .collect();

        if remaining.is_empty() {
            Ok(JobOutcome::Complete { passes: attempt })
        } else {
            tracing::warn!(
                job = %job.process_name,
                attempts = attempt,
                remaining = remaining.len(),
                "Attempts exhausted with unresolved chunks"
            );
            Ok(JobOutcome::Partial {
                passes: attempt,
                remaining,
            })
        }
    }

    /// One pass over a snapshot of the incomplete set:
    /// context/prompt fill → dispatch → repair → validate → grade, with
    /// every intermediate persisted so a crash loses at most one pass.
    async fn run_pass(
        &self,
        conn: &Connection,
        store: &dyn ChunkStore,
        job: &JobSpec,
        raw_text: &str,
        chunks: &[Chunk],
    ) -> Result<PassReport, PipelineError> {
        let name = &job.process_name;
        let keys: Vec<ChunkKey> = chunks.iter().map(Chunk::key).collect();
        let mut failures: Vec<SlotFailure> = Vec::new();

        // Context and prompt are computed once per chunk, ever.
        for chunk in chunks {
            if chunk.context.is_empty() {
                let window =
                    context_window(raw_text, chunk.start, chunk.end, self.config.window_profile);
                store.update(conn, name, chunk.key(), &ChunkUpdate::Context(window.to_string()))?;
            }
            if chunk.prompt.is_empty() {
                let prompt = generation_prompt(chunk.start, chunk.end);
                store.update(conn, name, chunk.key(), &ChunkUpdate::Prompt(prompt))?;
            }
        }

        let contexts = store.read_field(conn, name, &keys, TextField::Context)?;
        let prompts = store.read_field(conn, name, &keys, TextField::Prompt)?;

        let requests = build_completion_requests(&contexts, &prompts);
        let responses = self.dispatcher.dispatch_completions(requests).await;

        let mut payloads = Vec::with_capacity(keys.len());
        for (key, response) in keys.iter().zip(responses) {
            let payload = match response.map_err(PipelineError::from).and_then(|text| repair_fragment(&text)) {
                Ok(fragment) => fragment,
                Err(e) => {
                    failures.push(SlotFailure {
                        key: *key,
                        reason: e.to_string(),
                    });
                    String::new()
                }
            };
            store.update(conn, name, *key, &ChunkUpdate::Payload(payload.clone()))?;
            payloads.push(payload);
        }

        let mut validated = 0usize;
        for (key, payload) in keys.iter().zip(&payloads) {
            let ok = !payload.is_empty() && validate_payload(payload, key.start, key.end);
            if ok {
                validated += 1;
            }
            store.update(conn, name, *key, &ChunkUpdate::Validated(ok))?;
        }

        // Every chunk in the pass gets graded, valid or not; the gates may
        // disagree and both must be up for completion.
        let gradings = build_grading_requests(&prompts, &payloads, &contexts);
        let scores = self.dispatcher.dispatch_gradings(gradings).await;

        let mut graded = 0usize;
        for (key, score) in keys.iter().zip(scores) {
            let accepted = match score {
                Ok(s) => s > 0.0,
                Err(e) => {
                    failures.push(SlotFailure {
                        key: *key,
                        reason: e.to_string(),
                    });
                    false
                }
            };
            if accepted {
                graded += 1;
            }
            store.update(conn, name, *key, &ChunkUpdate::Evaluated(accepted))?;
        }

        Ok(PassReport {
            dispatched: keys.len(),
            validated,
            graded,
            failures,
        })
    }
}

fn emit(progress: Option<&dyn Fn(JobEvent)>, event: JobEvent) {
    if let Some(callback) = progress {
        callback(event);
    }
}

/// Run a full job: extract document text, initialize chunk state, drive the
/// retry passes, aggregate labels, and splice them into the NEXUS document.
///
/// This is the top-level entry point a frontend calls. Even a `Partial`
/// outcome produces its best-effort NEXUS output; the unresolved ranges ride
/// along in the outcome for the caller to surface.
#[allow(clippy::too_many_arguments)]
pub async fn run_job(
    conn: &Connection,
    store: &dyn ChunkStore,
    orchestrator: &RetryOrchestrator,
    source: &dyn DocumentSource,
    page_range: &str,
    job: &JobSpec,
    nexus_document: &str,
    config: &PipelineConfig,
    progress: Option<&dyn Fn(JobEvent)>,
) -> Result<JobReport, PipelineError> {
    let started = Instant::now();
    let run_id = new_run_id();
    tracing::info!(run_id, job = %job.process_name, total = job.total_characters, "Starting extraction job");

    let pages = crate::document::parse_page_range(page_range)?;
    let raw_text = source.extract_text(&pages)?;

    store.initialize(conn, &job.process_name, job.total_characters, config.chunk_width)?;
    emit(
        progress,
        JobEvent::Started {
            chunk_count: job.total_characters.div_ceil(config.chunk_width),
        },
    );

    let outcome = orchestrator.run(conn, store, job, &raw_text, progress).await?;

    let payloads = store.list_payloads(conn, &job.process_name)?;
    let labels = collect_labels(&payloads);
    emit(
        progress,
        JobEvent::LabelsAggregated {
            label_count: labels.len() as u32,
        },
    );

    let lines = format_labels(&labels);
    let splice = splice_labels(nexus_document, &lines);
    if !splice.inserted {
        tracing::warn!(run_id, "Target document has no MATRIX anchor; returned unchanged");
    }

    emit(
        progress,
        JobEvent::Finished {
            complete: outcome.is_complete(),
        },
    );

    Ok(JobReport {
        run_id,
        outcome,
        label_count: labels.len(),
        inserted: splice.inserted,
        text: splice.text,
        duration_ms: started.elapsed().as_millis() as u64,
    })
}
