//! File selection through a Gemini `generateContent` endpoint.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use seon_service::types::{CompletionRequest, SelectionResult};
use seon_service::upstream::{Completion, UpstreamError};

use crate::{endpoint, ensure_success, map_send_error};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: Url,
    pub model: String,
    pub api_key: String,
}

/// Completion client asking the model to pick relevant Markdown files.
pub struct GeminiCompletion {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiCompletion {
    pub fn new(client: reqwest::Client, config: GeminiConfig) -> Self {
        Self { client, config }
    }

    fn url(&self) -> String {
        endpoint(
            &self.config.base_url,
            &format!("v1beta/models/{}:generateContent", self.config.model),
        )
    }
}

#[async_trait::async_trait]
impl Completion for GeminiCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<SelectionResult, UpstreamError> {
        if request.file_names.is_empty() {
            return Ok(SelectionResult::default());
        }

        let resp = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request_body(&request))
            .send()
            .await
            .map_err(map_send_error)?;
        let resp = ensure_success(resp).await?;

        let body: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;
        let text = body
            .first_text()
            .ok_or_else(|| UpstreamError::InvalidResponse("no candidate text".to_string()))?;
        let selection: SelectionResult = serde_json::from_str(text.trim())
            .map_err(|e| UpstreamError::InvalidResponse(format!("selection is not JSON: {e}")))?;

        let offered: HashSet<&str> = request.file_names.iter().map(String::as_str).collect();
        let total = selection.selected_files.len();
        let selected_files: Vec<String> = selection
            .selected_files
            .into_iter()
            .filter(|name| offered.contains(name.as_str()))
            .collect();
        if selected_files.len() < total {
            tracing::debug!(
                dropped = total - selected_files.len(),
                "model selected files outside the candidate set"
            );
        }

        Ok(SelectionResult { selected_files })
    }
}

fn prompt(request: &CompletionRequest) -> String {
    let files = request.file_names.join(", ");
    format!(
        "You are an expert documentation curator. Given a list of Markdown file names and a \
         user query, select the most relevant files for a navigation menu.\n\n\
         File Names: {files}\n\
         User Query: {query}\n\n\
         Select only the files that are highly relevant to the user query. Return the selected \
         file names in a JSON array.\n\n\
         Given the file names, return only the most relevant file names related to: {query}. \
         Here are the available files: {files}\n\n\
         Ensure that the output is a JSON array of strings.",
        query = request.user_query,
    )
}

fn request_body(request: &CompletionRequest) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": prompt(request) }],
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "selectedFiles": {
                        "type": "ARRAY",
                        "items": { "type": "STRING" },
                    },
                },
                "required": ["selectedFiles"],
            },
        },
        "safetySettings": [
            { "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_ONLY_HIGH" },
            { "category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_MEDIUM_AND_ABOVE" },
            { "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_LOW_AND_ABOVE" },
        ],
    })
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .find_map(|p| p.text.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> GeminiCompletion {
        GeminiCompletion::new(
            crate::http_client(Duration::from_secs(5)).unwrap(),
            GeminiConfig {
                base_url: Url::parse(&server.uri()).unwrap(),
                model: "test-model".to_string(),
                api_key: "secret-key".to_string(),
            },
        )
    }

    fn request(files: &[&str]) -> CompletionRequest {
        CompletionRequest {
            file_names: files.iter().map(|s| (*s).to_string()).collect(),
            user_query: "how do I install".to_string(),
        }
    }

    fn model_reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        }))
    }

    #[tokio::test]
    async fn parses_selection_and_drops_unknown_names() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/test-model:generateContent"))
            .and(header("x-goog-api-key", "secret-key"))
            .and(body_partial_json(json!({
                "generationConfig": { "responseMimeType": "application/json" }
            })))
            .respond_with(model_reply(r#"{"selectedFiles":["install.md","invented.md"]}"#))
            .expect(1)
            .mount(&server)
            .await;

        let gemini = client_for(&server);
        let out = gemini
            .complete(request(&["install.md", "usage.md"]))
            .await
            .unwrap();
        assert_eq!(out.selected_files, vec!["install.md".to_string()]);
    }

    #[tokio::test]
    async fn empty_candidates_skip_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(model_reply(r#"{"selectedFiles":[]}"#))
            .expect(0)
            .mount(&server)
            .await;

        let gemini = client_for(&server);
        let out = gemini.complete(request(&[])).await.unwrap();
        assert!(out.selected_files.is_empty());
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
            .mount(&server)
            .await;

        let gemini = client_for(&server);
        let err = gemini.complete(request(&["a.md"])).await.unwrap_err();
        match err {
            UpstreamError::Status { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "quota exhausted");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparseable_model_text_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(model_reply("install.md and usage.md"))
            .mount(&server)
            .await;

        let gemini = client_for(&server);
        let err = gemini.complete(request(&["a.md"])).await.unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn missing_candidates_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let gemini = client_for(&server);
        let err = gemini.complete(request(&["a.md"])).await.unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidResponse(_)));
    }

    #[test]
    fn prompt_lists_files_and_query() {
        let p = prompt(&request(&["install.md", "usage.md"]));
        assert!(p.contains("File Names: install.md, usage.md"));
        assert!(p.contains("User Query: how do I install"));
    }
}
