//! Embedded tag reading and merge rules.
//!
//! Embedded tags come out of the audio file itself (ID3 and friends, via
//! lofty). Generated tags come back from the AI backend. The merge prefers
//! the generated value for every field, with the embedded value filling the
//! gaps, except the free-text comment which only the AI supplies.

use crate::catalog::TagFields;
use crate::error::{LydtagError, Result};
use lofty::file::TaggedFileExt;
use lofty::tag::ItemKey;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Embedded tag keys mapped to single string values.
pub type TagMap = BTreeMap<String, String>;

/// Tags returned by the AI backend for one audio file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<String>,
    pub comment: Option<String>,
}

impl GeneratedTags {
    /// Parse the model's JSON reply.
    ///
    /// Models routinely return the year as a bare number, so every field is
    /// stringified rather than deserialized strictly. A reply that is not a
    /// JSON object is a permanent failure (retrying will not fix it).
    pub fn from_model_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| LydtagError::AiResponse(format!("invalid JSON: {}", e)))?;

        let obj = value
            .as_object()
            .ok_or_else(|| LydtagError::AiResponse(format!("expected JSON object, got: {}", value)))?;

        let field = |key: &str| -> Option<String> {
            match obj.get(key) {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            }
        };

        Ok(Self {
            title: field("title"),
            artist: field("artist"),
            album: field("album"),
            genre: field("genre"),
            year: field("year"),
            comment: field("comment"),
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Read embedded tags from an audio file.
///
/// Absence or corruption is logged and yields an empty map; ingestion must
/// proceed regardless.
pub fn read_embedded_tags(path: &Path) -> TagMap {
    let mut tags = TagMap::new();

    let tagged = match lofty::read_from_path(path) {
        Ok(t) => t,
        Err(e) => {
            warn!("Could not read embedded tags from {:?}: {}", path, e);
            return tags;
        }
    };

    if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
        let mut put = |key: &str, item: &ItemKey| {
            if let Some(v) = tag.get_string(item) {
                let v = v.trim();
                if !v.is_empty() {
                    tags.insert(key.to_string(), v.to_string());
                }
            }
        };

        put("title", &ItemKey::TrackTitle);
        put("artist", &ItemKey::TrackArtist);
        put("album", &ItemKey::AlbumTitle);
        put("genre", &ItemKey::Genre);
        put("year", &ItemKey::Year);
        put("date", &ItemKey::RecordingDate);
        put("comment", &ItemKey::Comment);
    }

    tags
}

/// Merge AI-generated tags with embedded tags into the stored fields.
///
/// AI wins per field; embedded fills gaps. The year falls back to either the
/// `year` or the `date` embedded key (ID3 writers disagree on which one).
/// The comment is a generated description with no embedded counterpart.
pub fn merge_tags(generated: &GeneratedTags, embedded: &TagMap) -> TagFields {
    let fallback = |key: &str| embedded.get(key).cloned();

    TagFields {
        title: generated.title.clone().or_else(|| fallback("title")),
        artist: generated.artist.clone().or_else(|| fallback("artist")),
        album: generated.album.clone().or_else(|| fallback("album")),
        genre: generated.genre.clone().or_else(|| fallback("genre")),
        year: generated
            .year
            .clone()
            .or_else(|| fallback("year"))
            .or_else(|| fallback("date")),
        comment: generated.comment.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn embedded(pairs: &[(&str, &str)]) -> TagMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_generated_value_wins() {
        let generated = GeneratedTags {
            artist: Some("Y".to_string()),
            ..GeneratedTags::default()
        };
        let merged = merge_tags(&generated, &embedded(&[("artist", "X")]));
        assert_eq!(merged.artist.as_deref(), Some("Y"));
    }

    #[test]
    fn test_embedded_fills_gaps() {
        let generated = GeneratedTags {
            title: Some("Heavy Rain".to_string()),
            ..GeneratedTags::default()
        };
        let merged = merge_tags(
            &generated,
            &embedded(&[("artist", "Nature"), ("date", "2019")]),
        );
        assert_eq!(merged.title.as_deref(), Some("Heavy Rain"));
        assert_eq!(merged.artist.as_deref(), Some("Nature"));
        assert_eq!(merged.year.as_deref(), Some("2019"));
    }

    #[test]
    fn test_year_prefers_year_key_over_date() {
        let merged = merge_tags(
            &GeneratedTags::default(),
            &embedded(&[("year", "2020"), ("date", "2019")]),
        );
        assert_eq!(merged.year.as_deref(), Some("2020"));
    }

    #[test]
    fn test_comment_is_generated_only() {
        let merged = merge_tags(&GeneratedTags::default(), &embedded(&[("comment", "old")]));
        assert!(merged.comment.is_none());

        let generated = GeneratedTags {
            comment: Some("a long description".to_string()),
            ..GeneratedTags::default()
        };
        let merged = merge_tags(&generated, &embedded(&[("comment", "old")]));
        assert_eq!(merged.comment.as_deref(), Some("a long description"));
    }

    #[test]
    fn test_from_model_json_stringifies_numeric_year() {
        let tags = GeneratedTags::from_model_json(
            r#"{"title": "Door Creak", "year": 2024, "genre": null}"#,
        )
        .unwrap();
        assert_eq!(tags.title.as_deref(), Some("Door Creak"));
        assert_eq!(tags.year.as_deref(), Some("2024"));
        assert!(tags.genre.is_none());
    }

    #[test]
    fn test_from_model_json_rejects_non_object() {
        assert!(GeneratedTags::from_model_json("[1, 2]").is_err());
        assert!(GeneratedTags::from_model_json("not json at all").is_err());
    }

    #[test]
    fn test_unreadable_file_yields_empty_tags() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.mp3");
        fs::write(&path, b"this is not an mp3").unwrap();

        assert!(read_embedded_tags(&path).is_empty());
        assert!(read_embedded_tags(&dir.path().join("missing.mp3")).is_empty());
    }
}
