//! Configuration settings for lydtag.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub library: LibrarySettings,
    pub catalog: CatalogSettings,
    pub ai: AiSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.lydtag".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Watched music library settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// Directory to watch for audio files.
    pub music_dir: String,
    /// Recognized audio file extension (without the dot).
    pub extension: String,
    /// Delay between files during the startup scan, in seconds.
    /// Paces calls against remote AI rate limits.
    pub scan_delay_seconds: u64,
    /// Interval between directory polls while watching, in seconds.
    pub poll_interval_seconds: u64,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            music_dir: "~/Music".to_string(),
            extension: "mp3".to_string(),
            scan_delay_seconds: 10,
            poll_interval_seconds: 2,
        }
    }
}

/// Catalog store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// Path to the SQLite catalog database.
    pub sqlite_path: String,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.lydtag/catalog.db".to_string(),
        }
    }
}

/// AI backend settings.
///
/// Every field can be overridden from the environment at load time; see
/// [`Settings::load_from`]. Both backends are optional: a missing Gemini key
/// only produces a warning, and calls made without it fail at call time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    /// Gemini API key (`GEMINI_API_KEY` / `GOOGLE_API_KEY`).
    pub gemini_api_key: Option<String>,
    /// Gemini model name (`GEMINI_MODEL`).
    pub gemini_model: String,
    /// Base URL of an OpenAI-compatible local backend, e.g. LM Studio
    /// (`LLM_API_BASE`). When set, query expansion prefers this backend.
    pub llm_api_base: Option<String>,
    /// API key for the local backend (`LLM_API_KEY`).
    pub llm_api_key: String,
    /// Model name for the local backend (`LLM_MODEL`).
    pub llm_model: String,
    /// Request timeout for AI calls, in seconds.
    pub request_timeout_seconds: u64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: "gemini-2.0-flash".to_string(),
            llm_api_base: None,
            llm_api_key: "lm-studio".to_string(),
            llm_model: "local-model".to_string(),
            request_timeout_seconds: 120,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or the default location if None.
    ///
    /// Environment variables override the `[ai]` section of the file.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Settings>(&content)?
        } else {
            Settings::default()
        };

        settings.apply_env_overrides();
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(key) = non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY"))
        {
            self.ai.gemini_api_key = Some(key);
        }
        if let Some(model) = non_empty_env("GEMINI_MODEL") {
            self.ai.gemini_model = model;
        }
        if let Some(base) = non_empty_env("LLM_API_BASE") {
            self.ai.llm_api_base = Some(base);
        }
        if let Some(key) = non_empty_env("LLM_API_KEY") {
            self.ai.llm_api_key = key;
        }
        if let Some(model) = non_empty_env("LLM_MODEL") {
            self.ai.llm_model = model;
        }
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lydtag")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded music directory path.
    pub fn music_dir(&self) -> PathBuf {
        Self::expand_path(&self.library.music_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.catalog.sqlite_path)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.library.extension, "mp3");
        assert_eq!(settings.library.scan_delay_seconds, 10);
        assert_eq!(settings.ai.gemini_model, "gemini-2.0-flash");
        assert!(settings.ai.gemini_api_key.is_none());
        assert!(settings.ai.llm_api_base.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [library]
            music_dir = "/music"

            [ai]
            gemini_model = "gemini-2.5-pro"
            "#,
        )
        .unwrap();

        assert_eq!(settings.library.music_dir, "/music");
        assert_eq!(settings.library.extension, "mp3");
        assert_eq!(settings.ai.gemini_model, "gemini-2.5-pro");
        assert_eq!(settings.ai.llm_model, "local-model");
    }
}
