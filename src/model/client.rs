//! Generative model client — one HTTP implementation plus test doubles.
//!
//! `complete` turns a context+instruction pair into free text expected to
//! contain an XML fragment. `grade` is the model-as-judge routine: it scores
//! a prediction against its reference context and returns a numeric score,
//! where anything above zero counts as accepted.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::ModelError;

/// A generation request: document context plus the rendered instruction.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub context: String,
    pub prompt: String,
}

impl CompletionRequest {
    /// Render as a single prompt body: context first, then the instruction.
    pub fn rendered(&self) -> String {
        format!("{}\n\n{}", self.context, self.prompt)
    }
}

/// A grading request: the original instruction, the model's prediction,
/// and the reference text the prediction must be grounded in.
#[derive(Debug, Clone)]
pub struct GradingRequest {
    pub input: String,
    pub prediction: String,
    pub reference: String,
}

/// Client for the generative model and its grading routine.
pub trait ModelClient: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError>;

    /// Score a prediction against its reference. Positive means accepted.
    fn grade(&self, request: &GradingRequest) -> Result<f64, ModelError>;
}

const GRADING_SYSTEM: &str =
    "You are a strict grader of data extraction output. Respond with JSON only.";

fn grading_prompt(request: &GradingRequest) -> String {
    format!(
        "Given the task below, decide whether the prediction is a correct and \
         complete extraction from the reference text.\n\n\
         TASK:\n{input}\n\n\
         PREDICTION:\n{prediction}\n\n\
         REFERENCE:\n{reference}\n\n\
         Respond with exactly {{\"score\": 1}} if correct, {{\"score\": 0}} if not.",
        input = request.input,
        prediction = request.prediction,
        reference = request.reference,
    )
}

/// Extract a numeric score from a judge response.
///
/// Prefers a JSON object with a `score` field anywhere in the text; falls
/// back to the first bare digit. Judges frequently wrap the JSON in prose.
fn parse_score(response: &str) -> Result<f64, ModelError> {
    if let Some(start) = response.find('{') {
        if let Some(end) = response[start..].find('}') {
            let candidate = &response[start..start + end + 1];
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(candidate) {
                if let Some(score) = value.get("score").and_then(score_from_value) {
                    return Ok(score);
                }
            }
        }
    }

    response
        .chars()
        .find(char::is_ascii_digit)
        .and_then(|c| c.to_digit(10))
        .map(f64::from)
        .ok_or_else(|| ModelError::ResponseParsing(format!("No score in judge response: {response:?}")))
}

fn score_from_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Ollama HTTP client for local model inference.
pub struct OllamaModelClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaModelClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        }
    }

    fn generate(&self, prompt: &str, system: &str) -> Result<String, ModelError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            system,
            stream: false,
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                ModelError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                ModelError::Timeout(self.timeout_secs)
            } else {
                ModelError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ModelError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| ModelError::ResponseParsing(e.to_string()))?;

        Ok(parsed.response)
    }
}

/// Request body for /api/generate
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

/// Response body from /api/generate
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl ModelClient for OllamaModelClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        self.generate(&request.rendered(), "")
    }

    fn grade(&self, request: &GradingRequest) -> Result<f64, ModelError> {
        let response = self.generate(&grading_prompt(request), GRADING_SYSTEM)?;
        parse_score(&response)
    }
}

/// Mock client for testing — fixed completion text and grade.
pub struct MockModelClient {
    response: String,
    score: f64,
}

impl MockModelClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            score: 1.0,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }
}

impl ModelClient for MockModelClient {
    fn complete(&self, _request: &CompletionRequest) -> Result<String, ModelError> {
        Ok(self.response.clone())
    }

    fn grade(&self, _request: &GradingRequest) -> Result<f64, ModelError> {
        Ok(self.score)
    }
}

/// Scripted client for multi-pass tests: each `complete` call consumes the
/// next queued response, then sticks on the last one. Grades always accept.
pub struct ScriptedModelClient {
    responses: Mutex<VecDeque<String>>,
    last: Mutex<String>,
}

impl ScriptedModelClient {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queue: VecDeque<String> = responses.into_iter().map(Into::into).collect();
        let last = queue.back().cloned().unwrap_or_default();
        Self {
            responses: Mutex::new(queue),
            last: Mutex::new(last),
        }
    }
}

impl ModelClient for ScriptedModelClient {
    fn complete(&self, _request: &CompletionRequest) -> Result<String, ModelError> {
        let mut queue = self.responses.lock().expect("scripted client lock");
        match queue.pop_front() {
            Some(next) => {
                *self.last.lock().expect("scripted client lock") = next.clone();
                Ok(next)
            }
            None => Ok(self.last.lock().expect("scripted client lock").clone()),
        }
    }

    fn grade(&self, _request: &GradingRequest) -> Result<f64, ModelError> {
        Ok(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_request_renders_context_first() {
        let request = CompletionRequest {
            context: "1. head round".to_string(),
            prompt: "Extract characters 1 to 1".to_string(),
        };
        let rendered = request.rendered();
        assert!(rendered.starts_with("1. head round"));
        assert!(rendered.ends_with("Extract characters 1 to 1"));
    }

    #[test]
    fn parse_score_from_json() {
        assert_eq!(parse_score(r#"{"score": 1}"#).unwrap(), 1.0);
        assert_eq!(parse_score(r#"{"score": 0}"#).unwrap(), 0.0);
    }

    #[test]
    fn parse_score_from_wrapped_json() {
        let response = "Sure! Here is my verdict: {\"score\": 1} — the extraction is correct.";
        assert_eq!(parse_score(response).unwrap(), 1.0);
    }

    #[test]
    fn parse_score_from_string_field() {
        assert_eq!(parse_score(r#"{"score": "1"}"#).unwrap(), 1.0);
    }

    #[test]
    fn parse_score_bare_digit_fallback() {
        assert_eq!(parse_score("Score: 1 out of 1").unwrap(), 1.0);
    }

    #[test]
    fn parse_score_rejects_scoreless_text() {
        assert!(parse_score("no verdict here").is_err());
    }

    #[test]
    fn mock_client_returns_configured_response() {
        let client = MockModelClient::new("canned");
        let request = CompletionRequest {
            context: String::new(),
            prompt: String::new(),
        };
        assert_eq!(client.complete(&request).unwrap(), "canned");
    }

    #[test]
    fn mock_client_configurable_score() {
        let client = MockModelClient::new("").with_score(0.0);
        let request = GradingRequest {
            input: String::new(),
            prediction: String::new(),
            reference: String::new(),
        };
        assert_eq!(client.grade(&request).unwrap(), 0.0);
    }

    #[test]
    fn scripted_client_consumes_then_sticks() {
        let client = ScriptedModelClient::new(["first", "second"]);
        let request = CompletionRequest {
            context: String::new(),
            prompt: String::new(),
        };
        assert_eq!(client.complete(&request).unwrap(), "first");
        assert_eq!(client.complete(&request).unwrap(), "second");
        assert_eq!(client.complete(&request).unwrap(), "second");
    }

    #[test]
    fn ollama_client_trims_trailing_slash() {
        let client = OllamaModelClient::new("http://localhost:11434/", "gemma2:27b", 60);
        assert_eq!(client.base_url, "http://localhost:11434");
        assert_eq!(client.timeout_secs, 60);
    }
}
