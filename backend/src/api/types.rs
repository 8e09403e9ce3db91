//! Wire types for the HTTP endpoints.
//!
//! Failure responses reuse the success shapes with placeholder fields, so a
//! caller can parse any status code the same way.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Status;
use crate::pipeline::Snapshot;

// =============================================================================
// POST /sample-identify
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentifyRequest {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySongPayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub youtube_url: Option<String>,
    #[serde(default)]
    pub youtube_title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MainSamplePayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub youtube_url: Option<String>,
    #[serde(default)]
    pub youtube_title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentifyResponse {
    #[serde(default)]
    pub query_song: QuerySongPayload,
    #[serde(default)]
    pub main_sample: MainSamplePayload,
    #[serde(default)]
    pub status: Status,
    /// Present only on input errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IdentifyResponse {
    /// Placeholder payload for failures; the reason travels in the sample note.
    pub fn failure(note: impl Into<String>) -> Self {
        Self {
            main_sample: MainSamplePayload {
                note: Some(note.into()),
                ..MainSamplePayload::default()
            },
            ..Self::default()
        }
    }

    /// Placeholder payload for rejected input.
    pub fn invalid_input(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

// =============================================================================
// POST /video-search
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoSearchRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSearchResponse {
    #[serde(default)]
    pub youtube_url: Option<String>,
    #[serde(default)]
    pub youtube_title: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default = "unknown_strategy")]
    pub search_strategy_used: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn unknown_strategy() -> String {
    "unknown".to_string()
}

impl VideoSearchResponse {
    pub fn failure(strategy: impl Into<String>) -> Self {
        Self {
            youtube_url: None,
            youtube_title: None,
            confidence: 0.0,
            search_strategy_used: strategy.into(),
            error: None,
        }
    }

    pub fn invalid_input(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::failure("error")
        }
    }

    /// Fill defaults for fields the model left empty.
    pub fn validated(self) -> Self {
        Self {
            youtube_url: self.youtube_url.filter(|u| !u.trim().is_empty()),
            youtube_title: self.youtube_title.filter(|t| !t.trim().is_empty()),
            confidence: if self.confidence.is_finite() {
                self.confidence.clamp(0.0, 1.0)
            } else {
                0.0
            },
            search_strategy_used: if self.search_strategy_used.trim().is_empty() {
                unknown_strategy()
            } else {
                self.search_strategy_used
            },
            error: self.error,
        }
    }
}

// =============================================================================
// GET /catalog-search
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogSearchParams {
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogImage {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogAlbum {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<CatalogImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogTrack {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    pub album: CatalogAlbum,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogArtist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<CatalogImage>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub wikipedia_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSearch {
    #[serde(default)]
    pub track: Option<CatalogTrack>,
    #[serde(default)]
    pub artist: Option<CatalogArtist>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CatalogSearch {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn cover_url(&self) -> Option<&str> {
        self.track
            .as_ref()
            .and_then(|t| t.album.images.first())
            .map(|i| i.url.as_str())
    }

    pub fn artist_image_url(&self) -> Option<&str> {
        self.artist
            .as_ref()
            .and_then(|a| a.images.first())
            .map(|i| i.url.as_str())
    }
}

// =============================================================================
// GET /home-now, /home-discover
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HomeParams {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub samples_only: Option<bool>,
}

// =============================================================================
// POST /api/search
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Option<String>,
}

/// Settled pipeline run. `snapshot` is `None` only on input errors.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub id: Uuid,
    pub snapshot: Option<Snapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identify_failure_keeps_success_shape() {
        let json = serde_json::to_value(IdentifyResponse::failure("Error: boom")).unwrap();
        assert_eq!(json["status"], "unknown");
        assert_eq!(json["query_song"]["title"], "");
        assert_eq!(json["main_sample"]["confidence"], 0.0);
        assert_eq!(json["main_sample"]["note"], "Error: boom");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_identify_parses_partial_payload() {
        let payload: IdentifyResponse = serde_json::from_value(json!({
            "query_song": { "title": "Juicy", "artist": "The Notorious B.I.G." },
            "status": "ok"
        }))
        .unwrap();
        assert_eq!(payload.status, Status::Ok);
        assert!(payload.main_sample.title.is_none());
    }

    #[test]
    fn test_video_validated_fills_defaults() {
        let raw: VideoSearchResponse = serde_json::from_value(json!({
            "youtube_url": "",
            "confidence": 3.0,
            "search_strategy_used": ""
        }))
        .unwrap();
        let validated = raw.validated();
        assert!(validated.youtube_url.is_none());
        assert_eq!(validated.confidence, 1.0);
        assert_eq!(validated.search_strategy_used, "unknown");
    }

    #[test]
    fn test_catalog_artist_uses_camel_case() {
        let artist = CatalogArtist {
            id: "1".into(),
            name: "Joe Cocker".into(),
            images: vec![],
            genres: vec!["soul".into()],
            followers: 10,
            url: None,
            bio: None,
            wikipedia_url: Some("https://en.wikipedia.org/wiki/Joe_Cocker".into()),
        };
        let json = serde_json::to_value(&artist).unwrap();
        assert!(json.get("wikipediaUrl").is_some());
    }
}
