//! Short artist biographies from the Wikipedia REST summary endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{ArtistBio, BioSource};
use crate::error::{CatalogError, CatalogResult};

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    extract: String,
    #[serde(default)]
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    desktop: Option<PageUrl>,
}

#[derive(Debug, Deserialize)]
struct PageUrl {
    page: Option<String>,
}

/// Encyclopedia client. The timeout is enforced on the request itself, so a
/// slow answer is dropped at the transport level.
pub struct WikipediaBio {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl WikipediaBio {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: crate::config::http_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn summary_url(&self, artist: &str) -> CatalogResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&format!("{}/page/summary", self.base_url))
            .map_err(|e| CatalogError::RequestFailed(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| CatalogError::RequestFailed(format!("cannot-be-a-base URL: {}", self.base_url)))?
            .push(&artist.trim().replace(' ', "_"));
        Ok(url)
    }
}

#[async_trait]
impl BioSource for WikipediaBio {
    async fn summary(&self, artist: &str) -> CatalogResult<Option<ArtistBio>> {
        let response = self
            .http
            .get(self.summary_url(artist)?)
            .timeout(self.timeout)
            .header("Accept", "application/json")
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(CatalogError::Status(response.status().as_u16()));
        }

        let summary: SummaryResponse = response.json().await?;
        if summary.kind == "disambiguation" || summary.extract.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(ArtistBio {
            extract: summary.extract,
            page_url: summary.content_urls.and_then(|c| c.desktop).and_then(|d| d.page),
        }))
    }
}

/// Cut a biography to its first sentence.
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace or the end of
/// text. Without a boundary inside `max_chars`, longer text is cut to
/// `max_chars - 3` characters plus `"..."`.
pub fn truncate_bio(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    let chars: Vec<char> = text.chars().collect();

    for i in 0..chars.len().min(max_chars) {
        let at_boundary = chars.get(i + 1).map_or(true, |next| next.is_whitespace());
        if matches!(chars[i], '.' | '!' | '?') && at_boundary {
            return chars[..=i].iter().collect();
        }
    }

    if chars.len() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = chars[..max_chars.saturating_sub(3)].iter().collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_long_text_without_boundary() {
        let bio = "a".repeat(500);
        let cut = truncate_bio(&bio, 280);
        assert_eq!(cut.chars().count(), 280);
        assert!(cut.ends_with("..."));
        assert_eq!(&cut[..277], &bio[..277]);
    }

    #[test]
    fn test_truncate_keeps_first_sentence() {
        let bio = "Joe Cocker was an English singer. He was known for his gritty voice.";
        assert_eq!(truncate_bio(bio, 280), "Joe Cocker was an English singer.");
    }

    #[test]
    fn test_truncate_ignores_inner_punctuation() {
        let bio = "Known as Tha Dogg Pound's producer (v1.2) in 1995! Later solo.";
        assert_eq!(
            truncate_bio(bio, 280),
            "Known as Tha Dogg Pound's producer (v1.2) in 1995!"
        );
    }

    #[test]
    fn test_truncate_short_text_unchanged() {
        assert_eq!(truncate_bio("  Rapper from Compton  ", 280), "Rapper from Compton");
    }

    #[test]
    fn test_boundary_after_limit_is_ignored() {
        let bio = format!("{}. Second.", "b".repeat(300));
        let cut = truncate_bio(&bio, 280);
        assert_eq!(cut.chars().count(), 280);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_summary_url_encodes_artist() {
        let bio = WikipediaBio::new("https://en.wikipedia.org/api/rest_v1/", Duration::from_secs(1));
        let url = bio.summary_url("The Notorious B.I.G./x").unwrap();
        assert_eq!(
            url.as_str(),
            "https://en.wikipedia.org/api/rest_v1/page/summary/The_Notorious_B.I.G.%2Fx"
        );
    }
}
