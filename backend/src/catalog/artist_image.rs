//! Fallback ladder for artist images.
//!
//! When the primary track search returns no artist image, the client retries
//! with looser queries and accepts the first artist whose name overlaps the
//! resolved one. The ladder is driven through a search closure so it can be
//! exercised without a network.

use std::future::Future;

use crate::api::types::{CatalogArtist, CatalogSearch};

/// One query variant of the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStrategy {
    TitleAndArtist,
    ArtistAndGenre,
    ArtistOnly,
}

impl FallbackStrategy {
    /// Order in which variants are tried.
    pub const LADDER: [FallbackStrategy; 3] = [
        FallbackStrategy::TitleAndArtist,
        FallbackStrategy::ArtistAndGenre,
        FallbackStrategy::ArtistOnly,
    ];

    /// Query text for this variant, or `None` when it cannot be built.
    pub fn query(self, title: &str, artist: &str, genre: Option<&str>) -> Option<String> {
        let (title, artist) = (title.trim(), artist.trim());
        if artist.is_empty() {
            return None;
        }
        match self {
            FallbackStrategy::TitleAndArtist if !title.is_empty() => {
                Some(format!("{} {}", title, artist))
            }
            FallbackStrategy::TitleAndArtist => None,
            FallbackStrategy::ArtistAndGenre => genre
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(|g| format!("{} {}", artist, g)),
            FallbackStrategy::ArtistOnly => Some(artist.to_string()),
        }
    }
}

/// Case-insensitive substring overlap in either direction, with an image.
pub fn accepts(resolved_artist: &str, candidate: &CatalogArtist) -> bool {
    let wanted = resolved_artist.trim().to_lowercase();
    let found = candidate.name.trim().to_lowercase();
    if wanted.is_empty() || found.is_empty() || candidate.images.is_empty() {
        return false;
    }
    wanted.contains(&found) || found.contains(&wanted)
}

/// Walk the ladder and return the first accepted image URL.
///
/// Queries equal to `already_tried` (the primary search) are skipped.
pub async fn find_artist_image<F, Fut>(
    title: &str,
    artist: &str,
    genre: Option<&str>,
    already_tried: &str,
    mut search: F,
) -> Option<(FallbackStrategy, String)>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Option<CatalogSearch>>,
{
    let mut tried = vec![already_tried.trim().to_string()];

    for strategy in FallbackStrategy::LADDER {
        let Some(query) = strategy.query(title, artist, genre) else {
            continue;
        };
        if tried.iter().any(|q| q.eq_ignore_ascii_case(&query)) {
            continue;
        }
        tried.push(query.clone());

        let Some(result) = search(query).await else {
            continue;
        };
        if let Some(candidate) = result.artist.as_ref().filter(|a| accepts(artist, a)) {
            if let Some(image) = candidate.images.first() {
                return Some((strategy, image.url.clone()));
            }
        }
    }
    None
}
