pub mod config;
pub mod db;
pub mod document; // Page-range grammar + document text seam
pub mod error;
pub mod model; // Generative model client + grading routine
pub mod nexus; // CHARSTATELABELS splice into the target file
pub mod pipeline; // Chunked extraction, retry passes, aggregation

pub use config::PipelineConfig;
pub use error::PipelineError;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for binaries and integration harnesses.
///
/// Respects RUST_LOG; falls back to the crate default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Nexlab v{}", config::APP_VERSION);
}
