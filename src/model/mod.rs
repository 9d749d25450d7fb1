pub mod client;

pub use client::{
    CompletionRequest, GradingRequest, MockModelClient, ModelClient, OllamaModelClient,
    ScriptedModelClient,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Cannot connect to model endpoint at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Model endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },

    #[error("Failed to parse model response: {0}")]
    ResponseParsing(String),

    #[error("Dispatch worker failed: {0}")]
    Worker(String),
}
