//! Domain models for the enrichment pipeline.
//!
//! - [`Query`] - Trimmed, non-empty free-text search
//! - [`TrackKey`] - Normalized composite key for a title/artist pair
//! - [`Identification`] - Stage-1 output ([`ResolvedSong`] + optional [`SampleRelation`])
//! - [`VideoMatch`] - Stage-2 output
//! - [`MetadataRecord`] - Stage-3 output
//! - [`ResultEntry`] - One row of the published result list
//! - [`GenrePool`] - Deduplicated, capped genre list

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::InputError;

// =============================================================================
// Query
// =============================================================================

/// A trimmed, non-empty search query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Query(String);

impl Query {
    /// Trim and validate raw user input.
    pub fn parse(raw: &str) -> Result<Self, InputError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InputError::EmptyQuery);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Track Key
// =============================================================================

/// Composite key addressing metadata and in-flight lookups.
///
/// Both halves are trimmed, whitespace-collapsed and lowercased, and kept
/// as separate fields so no delimiter can collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackKey {
    title: String,
    artist: String,
}

impl TrackKey {
    pub fn new(title: &str, artist: &str) -> Self {
        Self {
            title: normalize(title),
            artist: normalize(artist),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} by {:?}", self.title, self.artist)
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Trim and return `None` for empty strings.
pub(crate) fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

// =============================================================================
// Stage 1: Sample Identification
// =============================================================================

/// Upstream verdict on a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    #[default]
    Unknown,
}

/// The canonical song a query resolved to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSong {
    pub title: String,
    pub artist: Option<String>,
    pub video_url: Option<String>,
    pub video_title: Option<String>,
}

/// The primary sample source of a song.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleRelation {
    pub title: String,
    pub artist: Option<String>,
    pub confidence: f64,
    pub note: Option<String>,
    pub year: Option<String>,
    pub video_url: Option<String>,
    pub video_title: Option<String>,
    pub video_confidence: Option<f64>,
    #[serde(default)]
    pub needs_video_lookup: bool,
}

impl SampleRelation {
    /// Key for stage 2/3 lookups; `None` when the artist is unknown.
    pub fn key(&self) -> Option<TrackKey> {
        self.artist.as_deref().map(|artist| TrackKey::new(&self.title, artist))
    }
}

/// Stage-1 result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Identification {
    pub song: ResolvedSong,
    pub sample: Option<SampleRelation>,
    /// Explanation kept when no sample was accepted.
    pub note: Option<String>,
    pub status: Status,
}

impl Identification {
    /// Empty-defaults shape used for every failure.
    pub fn unknown(note: Option<String>) -> Self {
        Self {
            note,
            ..Self::default()
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.status == Status::Unknown
    }
}

// =============================================================================
// Stage 2: Video Link
// =============================================================================

/// Best official video found for a track.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMatch {
    pub url: Option<String>,
    pub display_title: Option<String>,
    pub confidence: f64,
}

impl VideoMatch {
    /// Empty-defaults shape used for every failure.
    pub fn none() -> Self {
        Self::default()
    }

    /// Accept only a present URL with confidence strictly above `threshold`.
    pub fn accepted(&self, threshold: f64) -> Option<&str> {
        self.url
            .as_deref()
            .filter(|url| !url.is_empty() && self.confidence > threshold)
    }
}

// =============================================================================
// Stage 3: Metadata
// =============================================================================

/// Average RGB of a cover image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Catalog metadata for one title/artist pair.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    pub resolved_title: String,
    pub artists: Vec<String>,
    pub year: Option<String>,
    pub cover_url: Option<String>,
    pub genres: Vec<String>,
    pub popularity: Option<u64>,
    pub artist_image_url: Option<String>,
    pub bio: Option<String>,
    pub wikipedia_url: Option<String>,
    pub catalog_url: Option<String>,
    pub dominant_color: Option<Rgb>,
}

impl MetadataRecord {
    /// Whether the catalog returned anything worth keeping.
    pub fn is_empty(&self) -> bool {
        self.resolved_title.is_empty()
            && self.artists.is_empty()
            && self.year.is_none()
            && self.cover_url.is_none()
            && self.genres.is_empty()
    }
}

// =============================================================================
// Result List
// =============================================================================

/// One row of the published result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    pub title: String,
    pub artist: String,
    pub year: Option<String>,
    pub video_url: Option<String>,
    pub video_title: Option<String>,
    pub video_confidence: Option<f64>,
    pub sample: Option<SampleRelation>,
    pub source_confidence: f64,
    pub needs_video_lookup: bool,
    pub note: Option<String>,
}

impl ResultEntry {
    pub fn key(&self) -> TrackKey {
        TrackKey::new(&self.title, &self.artist)
    }

    /// Build the result list from a stage-1 answer.
    ///
    /// `unknown` yields nothing. Entries whose title or artist is empty after
    /// trimming are dropped and reported through the returned count.
    pub fn from_identification(ident: &Identification) -> (Vec<ResultEntry>, usize) {
        if ident.is_unknown() {
            return (Vec::new(), 0);
        }

        let (Some(title), Some(artist)) = (
            non_empty(Some(&ident.song.title)),
            non_empty(ident.song.artist.as_deref()),
        ) else {
            return (Vec::new(), 1);
        };

        let sample = ident.sample.clone().map(|mut sample| {
            sample.needs_video_lookup = sample.artist.is_some();
            sample.video_url = None;
            sample.video_title = None;
            sample.video_confidence = None;
            sample
        });

        let entry = ResultEntry {
            title,
            artist,
            year: None,
            video_url: None,
            video_title: None,
            video_confidence: None,
            source_confidence: ident.sample.as_ref().map_or(0.0, |s| s.confidence),
            sample,
            needs_video_lookup: true,
            note: ident.note.clone(),
        };
        (vec![entry], 0)
    }
}

// =============================================================================
// Genre Pool
// =============================================================================

/// Deduplicated genre list in first-seen order, capped for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenrePool {
    genres: Vec<String>,
    cap: usize,
}

impl GenrePool {
    pub fn new(cap: usize) -> Self {
        Self {
            genres: Vec::new(),
            cap,
        }
    }

    /// Add genres, keeping insertion order; extras beyond the cap are dropped.
    /// Returns whether anything was added.
    pub fn extend<'a, I>(&mut self, incoming: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        let before = self.genres.len();
        for genre in incoming {
            if self.genres.len() >= self.cap {
                break;
            }
            let genre = genre.trim();
            if !genre.is_empty() && !self.genres.iter().any(|g| g == genre) {
                self.genres.push(genre.to_string());
            }
        }
        self.genres.len() != before
    }

    pub fn as_slice(&self) -> &[String] {
        &self.genres
    }

    pub fn len(&self) -> usize {
        self.genres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genres.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_identification() -> Identification {
        Identification {
            song: ResolvedSong {
                title: " California Love ".into(),
                artist: Some("2Pac".into()),
                video_url: Some("https://youtube.com/watch?v=guess".into()),
                video_title: None,
            },
            sample: Some(SampleRelation {
                title: "Woman to Woman".into(),
                artist: Some("Joe Cocker".into()),
                confidence: 1.0,
                note: Some("Piano riff".into()),
                year: None,
                video_url: Some("https://youtube.com/watch?v=guess2".into()),
                video_title: None,
                video_confidence: None,
                needs_video_lookup: false,
            }),
            note: None,
            status: Status::Ok,
        }
    }

    #[test]
    fn test_query_is_trimmed_and_rejects_blank() {
        assert_eq!(Query::parse("  Juicy  ").unwrap().as_str(), "Juicy");
        assert_eq!(Query::parse(" \t\n").unwrap_err(), InputError::EmptyQuery);
    }

    #[test]
    fn test_track_key_normalizes_case_and_whitespace() {
        let a = TrackKey::new("California  Love", " 2Pac");
        let b = TrackKey::new("california love", "2PAC ");
        assert_eq!(a, b);
        assert_eq!(a.title(), "california love");
    }

    #[test]
    fn test_track_key_has_no_delimiter_collision() {
        let a = TrackKey::new("a|b", "c");
        let b = TrackKey::new("a", "b|c");
        assert_ne!(a, b);
    }

    #[test]
    fn test_video_acceptance_is_strict() {
        let at = VideoMatch {
            url: Some("https://youtu.be/x".into()),
            display_title: None,
            confidence: 0.5,
        };
        assert!(at.accepted(0.5).is_none());

        let above = VideoMatch { confidence: 0.51, ..at.clone() };
        assert_eq!(above.accepted(0.5), Some("https://youtu.be/x"));

        let missing = VideoMatch { url: None, confidence: 0.9, ..at };
        assert!(missing.accepted(0.5).is_none());
    }

    #[test]
    fn test_entries_from_ok_identification() {
        let (entries, dropped) = ResultEntry::from_identification(&ok_identification());
        assert_eq!(dropped, 0);
        assert_eq!(entries.len(), 1);

        let entry = &entries[0];
        assert_eq!(entry.title, "California Love");
        assert!(entry.needs_video_lookup);
        assert!(entry.video_url.is_none());
        assert_eq!(entry.source_confidence, 1.0);

        let sample = entry.sample.as_ref().unwrap();
        assert!(sample.needs_video_lookup);
        assert!(sample.video_url.is_none());
    }

    #[test]
    fn test_unknown_identification_yields_nothing() {
        let ident = Identification::unknown(Some("not sure".into()));
        let (entries, dropped) = ResultEntry::from_identification(&ident);
        assert!(entries.is_empty());
        assert_eq!(dropped, 0);
    }

    #[test]
    fn test_missing_artist_is_dropped_not_coerced() {
        let mut ident = ok_identification();
        ident.song.artist = Some("   ".into());
        let (entries, dropped) = ResultEntry::from_identification(&ident);
        assert!(entries.is_empty());
        assert_eq!(dropped, 1);
    }

    #[test]
    fn test_sample_without_artist_skips_video_lookup() {
        let mut ident = ok_identification();
        ident.sample.as_mut().unwrap().artist = None;
        let (entries, _) = ResultEntry::from_identification(&ident);
        let sample = entries[0].sample.as_ref().unwrap();
        assert!(!sample.needs_video_lookup);
        assert!(sample.key().is_none());
    }

    #[test]
    fn test_genre_pool_dedupes_and_caps() {
        let mut pool = GenrePool::new(3);
        let first = vec!["hip hop".to_string(), "g funk".to_string(), "hip hop".to_string()];
        assert!(pool.extend(&first));
        assert_eq!(pool.as_slice(), &["hip hop", "g funk"]);

        let second = vec!["west coast rap".to_string(), "soul".to_string()];
        assert!(pool.extend(&second));
        assert_eq!(pool.as_slice(), &["hip hop", "g funk", "west coast rap"]);

        assert!(!pool.extend(&second));
    }
}
