//! Gemini backend.
//!
//! The cloud multimodal backend. Tag generation uploads the raw audio bytes
//! to the Files API and then asks `generateContent` for a JSON object with
//! the six target fields; query expansion is a text-only `generateContent`
//! call. Both request `application/json` replies.

use super::{extract_json_array, tag_prompt, AiBackend, EXPAND_SYSTEM_PROMPT};
use crate::config::AiSettings;
use crate::error::{LydtagError, Result};
use crate::tags::{GeneratedTags, TagMap};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const AUDIO_MIME_TYPE: &str = "audio/mpeg";

/// Gemini API backend over reqwest.
pub struct GeminiBackend {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiBackend {
    /// Create a backend from the AI settings.
    pub fn from_settings(settings: &AiSettings) -> Self {
        Self::with_config(
            settings.gemini_api_key.clone(),
            &settings.gemini_model,
            DEFAULT_BASE_URL,
            Duration::from_secs(settings.request_timeout_seconds),
        )
    }

    /// Create a backend with explicit configuration.
    pub fn with_config(
        api_key: Option<String>,
        model: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            api_key,
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| LydtagError::Config("Gemini API key is not configured".to_string()))
    }

    /// Upload raw audio bytes to the Files API, returning the file URI to
    /// reference from a `generateContent` call.
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn upload_audio(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let url = format!(
            "{}/upload/v1beta/files?uploadType=media&key={}",
            self.base_url,
            self.api_key()?
        );

        debug!("Uploading {} bytes to Gemini", bytes.len());

        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, AUDIO_MIME_TYPE)
            .body(bytes)
            .send()
            .await?;
        let body: Value = check_status(response).await?.json().await?;

        body.pointer("/file/uri")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                LydtagError::AiResponse(format!("file upload reply had no file.uri: {}", body))
            })
    }

    /// Call `generateContent` and concatenate the text parts of the first
    /// candidate.
    async fn generate_content(&self, parts: Value) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url,
            self.model,
            self.api_key()?
        );

        let body = json!({
            "contents": [{ "parts": parts }],
            "generationConfig": { "responseMimeType": "application/json" }
        });

        let response = self.http.post(&url).json(&body).send().await?;
        let reply: Value = check_status(response).await?.json().await?;

        let parts = reply
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                LydtagError::AiResponse(format!("reply had no candidate parts: {}", reply))
            })?;

        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect();

        if text.is_empty() {
            return Err(LydtagError::AiResponse(
                "candidate contained no text parts".to_string(),
            ));
        }

        Ok(text)
    }
}

/// Map non-success HTTP statuses to classified errors so the retry layer can
/// tell rate limits (429) and server errors apart from bad requests.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message: String = body.chars().take(500).collect();

    Err(LydtagError::AiStatus {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl AiBackend for GeminiBackend {
    #[instrument(skip(self, existing), fields(filename = %filename))]
    async fn generate_tags(
        &self,
        filename: &str,
        path: &Path,
        existing: &TagMap,
    ) -> Result<GeneratedTags> {
        let file_uri = self.upload_audio(path).await?;

        let parts = json!([
            { "text": tag_prompt(filename, existing) },
            { "fileData": { "mimeType": AUDIO_MIME_TYPE, "fileUri": file_uri } }
        ]);

        let text = self.generate_content(parts).await?;
        GeneratedTags::from_model_json(&text)
    }

    #[instrument(skip(self))]
    async fn expand_query(&self, query: &str) -> Result<Vec<String>> {
        let prompt = format!("{}\n\nQuery: \"{}\"", EXPAND_SYSTEM_PROMPT, query);
        let text = self.generate_content(json!([{ "text": prompt }])).await?;
        extract_json_array(&text)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
