//! Configuration module for lydtag.
//!
//! Handles loading and managing application settings.

mod settings;

pub use settings::{AiSettings, CatalogSettings, GeneralSettings, LibrarySettings, Settings};
