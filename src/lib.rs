//! Lydtag - AI-assisted audio catalog
//!
//! A tool that watches a directory for audio files, asks a generative model
//! for descriptive metadata, and answers natural-language searches over the
//! resulting catalog.
//!
//! The name "lydtag" combines the Norwegian word for "sound" with what the
//! tool does to it.
//!
//! # Overview
//!
//! Lydtag allows you to:
//! - Watch a directory and catalog every audio file that appears in it
//! - Enrich files with AI-generated metadata (title, category, mood, ...)
//! - Search the catalog with free-text queries expanded into keywords
//! - Serve the catalog and the audio files over HTTP for playback
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `ai` - AI backends (Gemini, OpenAI-compatible) and retry policy
//! - `tags` - Embedded tag reading and merge rules
//! - `catalog` - Persistent catalog store
//! - `ingest` - File-to-catalog pipeline and directory watcher
//! - `search` - Query expansion and substring matching
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lydtag::ai::AiClient;
//! use lydtag::catalog::SqliteCatalog;
//! use lydtag::config::Settings;
//! use lydtag::search::SearchEngine;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let store = Arc::new(SqliteCatalog::new(&settings.sqlite_path())?);
//!     let ai = Arc::new(AiClient::from_settings(&settings)?);
//!
//!     let engine = SearchEngine::new(store, ai);
//!     let results = engine.search("heavy rain on a tin roof").await?;
//!     println!("{} matches", results.len());
//!
//!     Ok(())
//! }
//! ```

pub mod ai;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod search;
pub mod tags;

pub use error::{LydtagError, Result};
