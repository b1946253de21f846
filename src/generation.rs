//! Structured-generation client.
//!
//! [`GeminiClient`] posts the prompt, the fixed system instruction and the
//! campaign schema to Gemini's `generateContent` endpoint and parses the returned
//! JSON into a [`CampaignDraft`]. It never retries and never touches usage state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::draft::CampaignDraft;
use crate::schema::{campaign_schema, SYSTEM_INSTRUCTION};

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Transport(String),
    #[error("generation endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("generation returned an empty response")]
    EmptyResponse,
    #[error("generation returned a malformed campaign: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("generation timed out after {0:?}")]
    TimedOut(Duration),
}

impl From<reqwest::Error> for GenerationError {
    fn from(error: reqwest::Error) -> Self {
        GenerationError::Transport(error.to_string())
    }
}

#[async_trait]
pub trait CampaignGenerator: Send + Sync {
    /// The caller guarantees `prompt` is non-empty.
    async fn generate(&self, prompt: &str) -> Result<CampaignDraft, GenerationError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    system_instruction: SystemInstruction<'a>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    schema: Value,
}

impl GeminiClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("adcraft/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            schema: campaign_schema(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl CampaignGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<CampaignDraft, GenerationError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: SYSTEM_INSTRUCTION,
                }],
            },
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: self.schema.clone(),
            },
        };

        tracing::debug!(model = %self.model, prompt_chars = prompt.chars().count(), "requesting campaign generation");
        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.trim())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }
        if body.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        let response: GenerateContentResponse = serde_json::from_str(&body)?;
        let text = response
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .find(|text| !text.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)?;

        parse_draft(&text)
    }
}

/// Parses the generated document, tolerating a Markdown code fence around it.
/// Keyword terms come back bare even if the model decorated them.
pub fn parse_draft(text: &str) -> Result<CampaignDraft, GenerationError> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    if unfenced.trim().is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    let mut draft: CampaignDraft = serde_json::from_str(unfenced)?;
    draft.normalize_keywords();
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_draft;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    /// Serves `reply` for every generateContent call and returns the base URL.
    async fn fake_endpoint(status: StatusCode, reply: Value) -> String {
        let app = Router::new().route(
            "/v1beta/models/:call",
            post(move |Json(request): Json<Value>| async move {
                assert_eq!(
                    request["generationConfig"]["responseMimeType"],
                    "application/json"
                );
                assert!(request["systemInstruction"]["parts"][0]["text"].is_string());
                (status, Json(reply))
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn candidate_reply(text: String) -> Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
    }

    #[tokio::test]
    async fn parses_a_conforming_response() {
        let draft_json = serde_json::to_string(&sample_draft()).unwrap();
        let url = fake_endpoint(StatusCode::OK, candidate_reply(draft_json)).await;
        let client = GeminiClient::new(url, "test-key", "test-model").unwrap();

        let draft = client.generate("Emergency plumber in Leeds").await.unwrap();
        assert_eq!(draft, sample_draft());
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let url = fake_endpoint(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "error": { "message": "overloaded" } }),
        )
        .await;
        let client = GeminiClient::new(url, "test-key", "test-model").unwrap();

        let err = client.generate("prompt").await.unwrap_err();
        assert!(matches!(err, GenerationError::Status { status: 503, .. }), "{err}");
    }

    #[tokio::test]
    async fn missing_candidates_is_an_empty_response() {
        let url = fake_endpoint(StatusCode::OK, json!({ "candidates": [] })).await;
        let client = GeminiClient::new(url, "test-key", "test-model").unwrap();

        let err = client.generate("prompt").await.unwrap_err();
        assert!(matches!(err, GenerationError::EmptyResponse), "{err}");
    }

    #[tokio::test]
    async fn non_conforming_document_is_malformed() {
        let url = fake_endpoint(
            StatusCode::OK,
            candidate_reply(json!({ "finalUrl": "https://x.example" }).to_string()),
        )
        .await;
        let client = GeminiClient::new(url, "test-key", "test-model").unwrap();

        let err = client.generate("prompt").await.unwrap_err();
        assert!(matches!(err, GenerationError::Malformed(_)), "{err}");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = GeminiClient::new(format!("http://{addr}"), "k", "m").unwrap();

        let err = client.generate("prompt").await.unwrap_err();
        assert!(matches!(err, GenerationError::Transport(_)), "{err}");
    }

    #[test]
    fn parse_draft_accepts_fenced_json() {
        let fenced = format!(
            "```json\n{}\n```",
            serde_json::to_string_pretty(&sample_draft()).unwrap()
        );
        assert_eq!(parse_draft(&fenced).unwrap(), sample_draft());
        assert!(matches!(parse_draft("  "), Err(GenerationError::EmptyResponse)));
        assert!(matches!(parse_draft("not json"), Err(GenerationError::Malformed(_))));
    }

    #[tokio::test]
    async fn decorated_keywords_are_stored_bare() {
        let mut decorated = sample_draft();
        decorated.keywords.phrase = vec!["\"emergency plumber\"".into(), " \"plumber near me\" ".into()];
        decorated.keywords.exact = vec!["[emergency plumber]".into(), "[ plumber near me ]".into()];
        let url = fake_endpoint(
            StatusCode::OK,
            candidate_reply(serde_json::to_string(&decorated).unwrap()),
        )
        .await;
        let client = GeminiClient::new(url, "test-key", "test-model").unwrap();

        let draft = client.generate("Emergency plumber in Leeds").await.unwrap();
        assert_eq!(draft.keywords, sample_draft().keywords);

        let text = crate::export::to_text(&draft);
        assert!(text.contains("  1. \"emergency plumber\"\n"));
        assert!(text.contains("  1. [emergency plumber]\n"));
        assert!(!text.contains("[[") && !text.contains("\"\""));
    }
}
