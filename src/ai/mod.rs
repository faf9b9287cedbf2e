//! AI client abstraction.
//!
//! Two interchangeable backends behind one capability interface: the Gemini
//! cloud backend (multimodal, always the tagger) and an optional local
//! OpenAI-compatible backend (text-only, preferred for query expansion when
//! configured). Backend selection happens once at construction; call sites
//! never branch on configuration.

mod gemini;
mod openai;
pub mod retry;

pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;
pub use retry::RetryPolicy;

use crate::config::Settings;
use crate::error::{LydtagError, Result};
use crate::tags::{GeneratedTags, TagMap};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Fixed instruction for query expansion.
pub(crate) const EXPAND_SYSTEM_PROMPT: &str = "\
You are a search assistant for a sound effect catalog. \
Extract 5-10 relevant search keywords or short phrases that would match \
potential filenames, categories, moods, or descriptions. \
Return the result as a JSON list of strings. \
Example: [\"keyword1\", \"keyword2\"]";

/// Fixed instruction for tag generation, describing the six target fields.
pub(crate) fn tag_prompt(filename: &str, existing: &TagMap) -> String {
    let existing_json = serde_json::to_string(existing).unwrap_or_else(|_| "{}".to_string());

    format!(
        "Analyze the following audio file (sound effect) and generate metadata tags.\n\
         \n\
         Filename: {filename}\n\
         Existing tags (from file): {existing_json}\n\
         \n\
         Provide the following information in JSON format:\n\
         - title: a descriptive name for the sound (e.g., \"Heavy Rain\", \"Door Creak\")\n\
         - artist: the category of the sound (e.g., \"Nature\", \"UI\", \"Impact\", \"Vehicle\")\n\
         - album: the sub-category or library name if inferable\n\
         - genre: the mood or type (e.g., \"Dark\", \"Bright\", \"Retro\", \"Realistic\")\n\
         - year: (YYYY) leave as null or the current year\n\
         - comment: a detailed description of the sound and its potential usage\n\
         \n\
         Return ONLY valid JSON."
    )
}

/// A generative backend capable of tagging audio and expanding queries.
#[async_trait]
pub trait AiBackend: Send + Sync {
    /// Produce descriptive metadata for one audio file.
    async fn generate_tags(
        &self,
        filename: &str,
        path: &Path,
        existing: &TagMap,
    ) -> Result<GeneratedTags>;

    /// Turn a free-text query into a keyword set.
    async fn expand_query(&self, query: &str) -> Result<Vec<String>>;

    /// Short backend name for logging.
    fn name(&self) -> &'static str;
}

/// Extract the outermost `[...]` span from a model reply and parse it as a
/// list of strings. Models wrap JSON lists in prose often enough that this
/// is the normal path, not a repair.
pub(crate) fn extract_json_array(text: &str) -> Result<Vec<String>> {
    let span = match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text.trim(),
    };

    let values: Vec<Value> = serde_json::from_str(span)
        .map_err(|e| LydtagError::AiResponse(format!("expected JSON list of strings: {}", e)))?;

    Ok(values
        .into_iter()
        .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
        .collect())
}

/// The AI client used by both the ingest pipeline and the search path.
///
/// Owns the retry policy and the degraded fallbacks; backends only perform
/// single calls.
pub struct AiClient {
    tagger: Arc<dyn AiBackend>,
    expander: Arc<dyn AiBackend>,
    tag_retry: RetryPolicy,
    expand_retry: RetryPolicy,
}

impl AiClient {
    /// Construct backends from configuration.
    ///
    /// The tagger is always Gemini (the only multimodal backend). The
    /// expander is the local OpenAI-compatible backend when a base URL is
    /// configured, otherwise Gemini as well. A missing Gemini key is a
    /// warning: calls made through it fail at call time.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        if settings.ai.gemini_api_key.is_none() {
            warn!("Gemini API key is not set; AI tag generation will fail until it is configured");
        }

        let gemini: Arc<dyn AiBackend> = Arc::new(GeminiBackend::from_settings(&settings.ai));

        let expander: Arc<dyn AiBackend> = match &settings.ai.llm_api_base {
            Some(base) => {
                info!("Using OpenAI-compatible backend at {} for query expansion", base);
                Arc::new(OpenAiBackend::new(
                    base,
                    &settings.ai.llm_api_key,
                    &settings.ai.llm_model,
                    Duration::from_secs(settings.ai.request_timeout_seconds),
                ))
            }
            None => gemini.clone(),
        };

        Ok(Self::new(gemini, expander))
    }

    /// Construct a client from explicit backends (tests inject fakes here).
    pub fn new(tagger: Arc<dyn AiBackend>, expander: Arc<dyn AiBackend>) -> Self {
        Self {
            tagger,
            expander,
            tag_retry: RetryPolicy::new(5, Duration::from_secs(2), Duration::from_secs(10)),
            expand_retry: RetryPolicy::new(3, Duration::from_secs(2), Duration::from_secs(10)),
        }
    }

    /// Override the retry policies (tests use immediate policies).
    pub fn with_retry_policies(mut self, tag: RetryPolicy, expand: RetryPolicy) -> Self {
        self.tag_retry = tag;
        self.expand_retry = expand;
        self
    }

    /// Generate metadata tags for one audio file, retrying transient
    /// failures. Callers degrade to an empty tag set on error.
    #[instrument(skip(self, existing), fields(filename = %filename))]
    pub async fn generate_tags(
        &self,
        filename: &str,
        path: &Path,
        existing: &TagMap,
    ) -> Result<GeneratedTags> {
        retry::with_backoff("tag generation", &self.tag_retry, || {
            self.tagger.generate_tags(filename, path, existing)
        })
        .await
    }

    /// Expand a free-text query into keywords. Never fails: after the
    /// expander (and, when distinct, the Gemini tagger) is exhausted, the
    /// raw query is whitespace-split instead.
    #[instrument(skip(self))]
    pub async fn expand_query(&self, query: &str) -> Vec<String> {
        match self.try_expand(&self.expander, query).await {
            Some(keywords) => keywords,
            None => {
                // The expander may itself be the Gemini backend; only try
                // the tagger when it is a different instance.
                if !Arc::ptr_eq(&self.expander, &self.tagger) {
                    if let Some(keywords) = self.try_expand(&self.tagger, query).await {
                        return keywords;
                    }
                }

                warn!("Query expansion failed on all backends, splitting raw query");
                query.split_whitespace().map(str::to_string).collect()
            }
        }
    }

    async fn try_expand(&self, backend: &Arc<dyn AiBackend>, query: &str) -> Option<Vec<String>> {
        let result = retry::with_backoff("query expansion", &self.expand_retry, || {
            backend.expand_query(query)
        })
        .await;

        match result {
            Ok(keywords) if !keywords.is_empty() => Some(keywords),
            Ok(_) => {
                warn!(backend = backend.name(), "Expansion returned no keywords");
                None
            }
            Err(e) => {
                warn!(backend = backend.name(), "Expansion failed: {}", e);
                None
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{client, CannedBackend, FailingBackend};
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_extract_json_array_plain() {
        let keywords = extract_json_array(r#"["rain", "storm"]"#).unwrap();
        assert_eq!(keywords, vec!["rain", "storm"]);
    }

    #[test]
    fn test_extract_json_array_wrapped_in_prose() {
        let text = "Sure! Here are the keywords:\n[\"rain\", \"thunder\"]\nHope that helps.";
        let keywords = extract_json_array(text).unwrap();
        assert_eq!(keywords, vec!["rain", "thunder"]);
    }

    #[test]
    fn test_extract_json_array_drops_non_strings_and_blanks() {
        let keywords = extract_json_array(r#"["rain", 3, null, "  ", "storm"]"#).unwrap();
        assert_eq!(keywords, vec!["rain", "storm"]);
    }

    #[test]
    fn test_extract_json_array_rejects_garbage() {
        assert!(extract_json_array("no list here").is_err());
        assert!(extract_json_array("{\"not\": \"a list\"}").is_err());
    }

    #[tokio::test]
    async fn test_expand_uses_expander_keywords() {
        let backend = Arc::new(CannedBackend::new(
            GeneratedTags::default(),
            vec!["rain", "storm"],
        ));
        let ai = client(backend.clone(), backend.clone());

        let keywords = ai.expand_query("rainy weather").await;
        assert_eq!(keywords, vec!["rain", "storm"]);
    }

    #[tokio::test]
    async fn test_expand_falls_back_to_whitespace_split() {
        let backend = Arc::new(FailingBackend::new(false));
        let ai = client(backend.clone(), backend.clone());

        let keywords = ai.expand_query("heavy rain sounds").await;
        assert_eq!(keywords, vec!["heavy", "rain", "sounds"]);
    }

    #[tokio::test]
    async fn test_expand_falls_through_to_tagger_backend() {
        let expander = Arc::new(FailingBackend::new(false));
        let tagger = Arc::new(CannedBackend::new(GeneratedTags::default(), vec!["creak"]));
        let ai = client(tagger.clone(), expander.clone());

        let keywords = ai.expand_query("door sounds").await;
        assert_eq!(keywords, vec!["creak"]);
        assert_eq!(expander.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_generate_tags_does_not_retry_permanent_failure() {
        let backend = Arc::new(FailingBackend::new(false));
        let ai = client(backend.clone(), backend.clone());

        let result = ai
            .generate_tags("a.mp3", Path::new("/tmp/a.mp3"), &TagMap::new())
            .await;

        assert!(result.is_err());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_generate_tags_retries_transient_to_ceiling() {
        let backend = Arc::new(FailingBackend::new(true));
        let ai = client(backend.clone(), backend.clone());

        let result = ai
            .generate_tags("a.mp3", Path::new("/tmp/a.mp3"), &TagMap::new())
            .await;

        assert!(result.is_err());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 5);
    }
}
