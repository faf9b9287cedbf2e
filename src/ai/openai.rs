//! OpenAI-compatible local backend (e.g. LM Studio).
//!
//! Text-only: it handles query expansion but cannot analyze audio, so tag
//! generation is rejected up front.

use super::{extract_json_array, AiBackend, EXPAND_SYSTEM_PROMPT};
use crate::error::{LydtagError, Result};
use crate::tags::{GeneratedTags, TagMap};
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

/// Chat-completion backend against a custom OpenAI-compatible base URL.
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiBackend {
    /// Create a backend pointed at `api_base`.
    pub fn new(api_base: &str, api_key: &str, model: &str, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        let config = OpenAIConfig::new()
            .with_api_base(api_base.trim_end_matches('/'))
            .with_api_key(api_key);

        Self {
            client: Client::with_config(config).with_http_client(http_client),
            model: model.to_string(),
        }
    }
}

/// Keep network-level failures retryable; everything else from the local
/// backend is treated as permanent.
fn map_openai_error(err: OpenAIError) -> LydtagError {
    match err {
        OpenAIError::Reqwest(inner) => LydtagError::Http(inner),
        other => LydtagError::OpenAI(other.to_string()),
    }
}

#[async_trait]
impl AiBackend for OpenAiBackend {
    async fn generate_tags(
        &self,
        _filename: &str,
        _path: &Path,
        _existing: &TagMap,
    ) -> Result<GeneratedTags> {
        Err(LydtagError::Ai(
            "the OpenAI-compatible backend is text-only and cannot analyze audio".to_string(),
        ))
    }

    #[instrument(skip(self))]
    async fn expand_query(&self, query: &str) -> Result<Vec<String>> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(EXPAND_SYSTEM_PROMPT.to_string())
                .build()
                .map_err(map_openai_error)?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!("Query: \"{}\"", query))
                .build()
                .map_err(map_openai_error)?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.7)
            .build()
            .map_err(map_openai_error)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| LydtagError::AiResponse("empty chat completion".to_string()))?;

        extract_json_array(content)
    }

    fn name(&self) -> &'static str {
        "openai-compatible"
    }
}
