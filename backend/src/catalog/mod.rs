//! Catalog Metadata Client.
//!
//! Resolves a title/artist pair to cover art, year, genres and a short artist
//! bio. The primary catalog search and the encyclopedia bio run concurrently.
//! The bio is kept only if it is ready by the time the search answers; a
//! slower bio finishes in the background (bounded by its own timeout) and
//! only warms the bio cache. The cover download for the dominant colour is
//! bounded as well, so a stalled image host cannot hold a lookup open.
//!
//! ## Caching
//!
//! - catalog responses are cached by the literal query text
//! - finished records are cached by [`TrackKey`]
//! - concurrent lookups of the same key share one in-flight future
//!
//! All caches expire after the configured TTL and live on the client, so two
//! clients never share state.

pub mod artist_image;
pub mod bio;
pub mod color;
pub mod spotify;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::api::logs::log_warning_indent;
use crate::api::types::CatalogSearch;
use crate::cache::{Coalescer, TtlCache};
use crate::config::{
    http_client, Config, DEFAULT_BIO_MAX_CHARS, DEFAULT_BIO_TIMEOUT, DEFAULT_CATALOG_CACHE_TTL, DEFAULT_COVER_TIMEOUT,
};
use crate::error::{CatalogError, CatalogResult, ConfigResult};
use crate::models::{non_empty, MetadataRecord, Rgb, TrackKey};

pub use artist_image::FallbackStrategy;
pub use bio::{truncate_bio, WikipediaBio};
pub use color::{dominant_color, HttpImageFetcher};
pub use spotify::SpotifyCatalog;

/// Encyclopedia summary of an artist.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtistBio {
    pub extract: String,
    pub page_url: Option<String>,
}

/// Track search against a music catalog. `NotFound` means no match.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn search(&self, query: &str) -> CatalogResult<CatalogSearch>;
}

/// Short artist biography lookup.
#[async_trait]
pub trait BioSource: Send + Sync {
    async fn summary(&self, artist: &str) -> CatalogResult<Option<ArtistBio>>;
}

/// Raw image download for colour extraction.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> CatalogResult<Vec<u8>>;
}

/// The stage-3 contract used by the pipeline: never fails.
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    async fn lookup(&self, title: &str, artist: &str) -> Option<MetadataRecord>;
}

/// Caching, coalescing catalog client.
#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<Inner>,
}

struct Inner {
    source: Arc<dyn CatalogSource>,
    bios: Option<Arc<dyn BioSource>>,
    images: Option<Arc<dyn ImageFetcher>>,
    searches: TtlCache<String, Option<CatalogSearch>>,
    bio_cache: TtlCache<String, Option<ArtistBio>>,
    records: TtlCache<TrackKey, Option<MetadataRecord>>,
    lookups: Coalescer<TrackKey, Option<MetadataRecord>>,
    bio_timeout: Duration,
    bio_max_chars: usize,
    cover_timeout: Duration,
}

pub struct CatalogClientBuilder {
    source: Arc<dyn CatalogSource>,
    bios: Option<Arc<dyn BioSource>>,
    images: Option<Arc<dyn ImageFetcher>>,
    cache_ttl: Duration,
    bio_timeout: Duration,
    bio_max_chars: usize,
    cover_timeout: Duration,
}

impl CatalogClientBuilder {
    pub fn bio_source(mut self, bios: Arc<dyn BioSource>) -> Self {
        self.bios = Some(bios);
        self
    }

    pub fn image_fetcher(mut self, images: Arc<dyn ImageFetcher>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn bio_timeout(mut self, timeout: Duration) -> Self {
        self.bio_timeout = timeout;
        self
    }

    pub fn bio_max_chars(mut self, max_chars: usize) -> Self {
        self.bio_max_chars = max_chars;
        self
    }

    /// Budget for downloading a cover before the colour is skipped.
    pub fn cover_timeout(mut self, timeout: Duration) -> Self {
        self.cover_timeout = timeout;
        self
    }

    pub fn build(self) -> CatalogClient {
        CatalogClient {
            inner: Arc::new(Inner {
                source: self.source,
                bios: self.bios,
                images: self.images,
                searches: TtlCache::new(self.cache_ttl),
                bio_cache: TtlCache::new(self.cache_ttl),
                records: TtlCache::new(self.cache_ttl),
                lookups: Coalescer::new(),
                bio_timeout: self.bio_timeout,
                bio_max_chars: self.bio_max_chars,
                cover_timeout: self.cover_timeout,
            }),
        }
    }
}

impl CatalogClient {
    pub fn builder(source: Arc<dyn CatalogSource>) -> CatalogClientBuilder {
        CatalogClientBuilder {
            source,
            bios: None,
            images: None,
            cache_ttl: DEFAULT_CATALOG_CACHE_TTL,
            bio_timeout: DEFAULT_BIO_TIMEOUT,
            bio_max_chars: DEFAULT_BIO_MAX_CHARS,
            cover_timeout: DEFAULT_COVER_TIMEOUT,
        }
    }

    /// Spotify catalog, Wikipedia bios and HTTP cover downloads.
    pub fn from_config(config: &Config) -> ConfigResult<Self> {
        let spotify =
            SpotifyCatalog::from_config(&config.spotify)?.with_http_client(http_client(config.http_timeout));
        Ok(Self::builder(Arc::new(spotify))
            .bio_source(Arc::new(WikipediaBio::new(&config.wikipedia_url, config.bio_timeout)))
            .image_fetcher(Arc::new(HttpImageFetcher::with_timeout(config.cover_timeout)))
            .cache_ttl(config.catalog_cache_ttl)
            .bio_timeout(config.bio_timeout)
            .bio_max_chars(config.bio_max_chars)
            .cover_timeout(config.cover_timeout)
            .build())
    }

    /// Catalog search for the `/catalog-search` endpoint.
    ///
    /// The artist bio is filled in from the bio cache only. On a miss the
    /// fetch starts in the background and the answer goes out without it, so
    /// the bio never delays the catalog result.
    pub async fn search_with_bio(&self, query: &str) -> CatalogResult<CatalogSearch> {
        let mut result = self
            .inner
            .try_search(query)
            .await?
            .ok_or(CatalogError::NotFound)?;

        if let Some(artist) = result.artist.as_mut() {
            if artist.bio.is_none() {
                match self.inner.bio_cache.get(&bio_key(&artist.name)) {
                    Some(Some(bio)) => {
                        artist.bio = Some(truncate_bio(&bio.extract, self.inner.bio_max_chars));
                        artist.wikipedia_url = bio.page_url;
                    }
                    Some(None) => {}
                    None if self.inner.bios.is_some() => {
                        tokio::spawn(Inner::owned_bio(self.inner.clone(), artist.name.clone()));
                    }
                    None => {}
                }
            }
        }
        Ok(result)
    }

    /// Drop expired cache entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.inner.searches.purge_expired()
            + self.inner.bio_cache.purge_expired()
            + self.inner.records.purge_expired()
    }
}

#[async_trait]
impl MetadataLookup for CatalogClient {
    async fn lookup(&self, title: &str, artist: &str) -> Option<MetadataRecord> {
        let (title, artist) = (non_empty(Some(title))?, non_empty(Some(artist))?);
        let key = TrackKey::new(&title, &artist);

        if let Some(hit) = self.inner.records.get(&key) {
            tracing::debug!(%key, "metadata cache hit");
            return hit;
        }

        let inner = self.inner.clone();
        let slot = key.clone();
        self.inner
            .lookups
            .run(key, move || async move {
                if let Some(hit) = inner.records.get(&slot) {
                    return hit;
                }
                match Inner::try_record(&inner, &title, &artist).await {
                    Ok(record) => {
                        inner.records.insert(slot, record.clone());
                        record
                    }
                    Err(e) => {
                        log_warning_indent(
                            format!("Metadata lookup failed for {} - {}: {}", artist, title, e),
                            1,
                        );
                        None
                    }
                }
            })
            .await
    }
}

impl Inner {
    /// Cached catalog search; `Ok(None)` when the catalog has no match.
    async fn try_search(&self, query: &str) -> CatalogResult<Option<CatalogSearch>> {
        let query = query.trim().to_string();
        if let Some(hit) = self.searches.get(&query) {
            return Ok(hit);
        }

        let result = match self.source.search(&query).await {
            Ok(found) if found.track.is_some() || found.artist.is_some() => Some(found),
            Ok(_) | Err(CatalogError::NotFound) => None,
            Err(e) => return Err(e),
        };
        self.searches.insert(query, result.clone());
        Ok(result)
    }

    /// Bio within the timeout, or nothing.
    async fn bio_for(&self, artist: &str) -> Option<ArtistBio> {
        let bios = self.bios.as_ref()?;
        let key = bio_key(artist);
        if let Some(hit) = self.bio_cache.get(&key) {
            return hit;
        }

        match tokio::time::timeout(self.bio_timeout, bios.summary(artist)).await {
            Ok(Ok(bio)) => {
                self.bio_cache.insert(key, bio.clone());
                bio
            }
            Ok(Err(e)) => {
                tracing::debug!(artist, error = %e, "bio lookup failed");
                None
            }
            Err(_) => {
                tracing::debug!(artist, "bio lookup timed out");
                None
            }
        }
    }

    async fn owned_bio(inner: Arc<Inner>, artist: String) -> Option<ArtistBio> {
        inner.bio_for(&artist).await
    }

    /// Run the catalog search with the bio alongside. The bio is returned only
    /// if it resolved no later than the search; otherwise it is left running
    /// in the background to fill the bio cache.
    async fn search_racing_bio(
        inner: &Arc<Inner>,
        query: &str,
        artist: &str,
    ) -> (CatalogResult<Option<CatalogSearch>>, Option<ArtistBio>) {
        let mut bio_fut = Box::pin(Inner::owned_bio(inner.clone(), artist.to_string()));
        let search_fut = inner.try_search(query);
        tokio::pin!(search_fut);

        let mut bio = None;
        let mut bio_done = false;
        let search = loop {
            tokio::select! {
                biased;
                found = &mut bio_fut, if !bio_done => {
                    bio_done = true;
                    bio = found;
                }
                search = &mut search_fut => break search,
            }
        };

        if !bio_done {
            tracing::debug!(artist, "bio still pending after catalog search");
            tokio::spawn(bio_fut);
        }
        (search, bio)
    }

    async fn try_record(inner: &Arc<Inner>, title: &str, artist: &str) -> CatalogResult<Option<MetadataRecord>> {
        let query = format!("{} {}", title, artist);
        let (search, bio) = Inner::search_racing_bio(inner, &query, artist).await;

        let Some(search) = search? else {
            return Ok(None);
        };
        let mut record = record_from_search(&search);
        if record.is_empty() {
            return Ok(None);
        }

        let embedded = search.artist.as_ref().and_then(|a| {
            a.bio.clone().map(|extract| ArtistBio {
                extract,
                page_url: a.wikipedia_url.clone(),
            })
        });
        if let Some(bio) = embedded.or(bio) {
            record.bio = Some(truncate_bio(&bio.extract, inner.bio_max_chars));
            record.wikipedia_url = bio.page_url;
        }

        if record.artist_image_url.is_none() {
            let genre = record.genres.first().cloned();
            let found = artist_image::find_artist_image(title, artist, genre.as_deref(), &query, |q| async move {
                inner.try_search(&q).await.ok().flatten()
            })
            .await;
            if let Some((strategy, url)) = found {
                tracing::debug!(artist, ?strategy, "artist image from fallback");
                record.artist_image_url = Some(url);
            }
        }

        if let Some(cover) = record.cover_url.clone() {
            record.dominant_color = inner.cover_color(&cover).await;
        }
        Ok(Some(record))
    }

    async fn cover_color(&self, url: &str) -> Option<Rgb> {
        let images = self.images.as_ref()?;
        let bytes = match tokio::time::timeout(self.cover_timeout, images.fetch(url)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                tracing::debug!(url, error = %e, "cover download failed");
                return None;
            }
            Err(_) => {
                tracing::debug!(url, "cover download timed out");
                return None;
            }
        };
        dominant_color(&bytes)
            .map_err(|e| tracing::debug!(url, error = %e, "cover decode failed"))
            .ok()
            .flatten()
    }
}

fn bio_key(artist: &str) -> String {
    artist.trim().to_lowercase()
}

fn record_from_search(search: &CatalogSearch) -> MetadataRecord {
    let track = search.track.as_ref();
    let artist = search.artist.as_ref();
    MetadataRecord {
        resolved_title: track.map(|t| t.name.clone()).unwrap_or_default(),
        artists: track
            .map(|t| t.artists.iter().map(|a| a.name.clone()).collect())
            .unwrap_or_default(),
        year: track.and_then(|t| t.year.clone()),
        cover_url: search.cover_url().map(str::to_string),
        genres: artist.map(|a| a.genres.clone()).unwrap_or_default(),
        popularity: artist.map(|a| a.followers),
        artist_image_url: search.artist_image_url().map(str::to_string),
        bio: None,
        wikipedia_url: None,
        catalog_url: track.and_then(|t| t.url.clone()),
        dominant_color: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{ArtistRef, CatalogAlbum, CatalogArtist, CatalogImage, CatalogTrack};
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn image(url: &str) -> CatalogImage {
        CatalogImage {
            url: url.to_string(),
            width: None,
            height: None,
        }
    }

    fn search_result(title: &str, artist: &str, artist_image: Option<&str>) -> CatalogSearch {
        CatalogSearch {
            track: Some(CatalogTrack {
                id: "t".into(),
                name: title.into(),
                artists: vec![ArtistRef {
                    id: "a".into(),
                    name: artist.into(),
                }],
                album: CatalogAlbum {
                    id: "al".into(),
                    name: "Album".into(),
                    images: vec![image("https://img/cover")],
                },
                year: Some("1996".into()),
                url: Some("https://open.spotify.com/track/t".into()),
            }),
            artist: Some(CatalogArtist {
                id: "a".into(),
                name: artist.into(),
                images: artist_image.map(image).into_iter().collect(),
                genres: vec!["west coast hip hop".into(), "g funk".into()],
                followers: 42,
                url: None,
                bio: None,
                wikipedia_url: None,
            }),
            error: None,
        }
    }

    #[derive(Default)]
    struct FakeCatalog {
        answers: HashMap<String, CatalogSearch>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl FakeCatalog {
        fn with(mut self, query: &str, answer: CatalogSearch) -> Self {
            self.answers.insert(query.to_string(), answer);
            self
        }
    }

    #[async_trait]
    impl CatalogSource for FakeCatalog {
        async fn search(&self, query: &str) -> CatalogResult<CatalogSearch> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.answers.get(query).cloned().ok_or(CatalogError::NotFound)
        }
    }

    struct FakeBio {
        text: String,
        delay: Duration,
    }

    #[async_trait]
    impl BioSource for FakeBio {
        async fn summary(&self, _artist: &str) -> CatalogResult<Option<ArtistBio>> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(Some(ArtistBio {
                extract: self.text.clone(),
                page_url: Some("https://en.wikipedia.org/wiki/2Pac".into()),
            }))
        }
    }

    struct FakeImages;

    #[async_trait]
    impl ImageFetcher for FakeImages {
        async fn fetch(&self, _url: &str) -> CatalogResult<Vec<u8>> {
            let mut buf = Vec::new();
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(24, 24, Rgba([10, 20, 30, 255])))
                .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .map_err(|e| CatalogError::Image(e.to_string()))?;
            Ok(buf)
        }
    }

    struct HangingImages;

    #[async_trait]
    impl ImageFetcher for HangingImages {
        async fn fetch(&self, _url: &str) -> CatalogResult<Vec<u8>> {
            std::future::pending().await
        }
    }

    fn california_love() -> FakeCatalog {
        FakeCatalog::default().with(
            "California Love 2Pac",
            search_result("California Love", "2Pac", Some("https://img/pac")),
        )
    }

    #[tokio::test]
    async fn test_lookup_builds_record() {
        let client = CatalogClient::builder(Arc::new(california_love()))
            .image_fetcher(Arc::new(FakeImages))
            .build();

        let record = client.lookup("California Love", "2Pac").await.unwrap();
        assert_eq!(record.resolved_title, "California Love");
        assert_eq!(record.artists, vec!["2Pac".to_string()]);
        assert_eq!(record.year.as_deref(), Some("1996"));
        assert_eq!(record.cover_url.as_deref(), Some("https://img/cover"));
        assert_eq!(record.artist_image_url.as_deref(), Some("https://img/pac"));
        assert_eq!(record.popularity, Some(42));
        assert_eq!(record.dominant_color, Some(Rgb { r: 10, g: 20, b: 30 }));
    }

    #[tokio::test]
    async fn test_second_lookup_within_ttl_is_cached() {
        let source = Arc::new(california_love());
        let client = CatalogClient::builder(source.clone()).build();

        client.lookup("California Love", "2Pac").await;
        client.lookup("  california love ", "2PAC").await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_refetches_after_ttl() {
        let source = Arc::new(california_love());
        let client = CatalogClient::builder(source.clone())
            .cache_ttl(Duration::from_secs(300))
            .build();

        client.lookup("California Love", "2Pac").await;
        tokio::time::advance(Duration::from_secs(301)).await;
        client.lookup("California Love", "2Pac").await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_lookups_are_coalesced() {
        let source = Arc::new(FakeCatalog {
            delay: Duration::from_millis(200),
            ..california_love()
        });
        let client = CatalogClient::builder(source.clone()).build();

        let (a, b) = tokio::join!(
            client.lookup("California Love", "2Pac"),
            client.lookup("California Love", "2Pac")
        );
        assert_eq!(a, b);
        assert!(a.is_some());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_none_and_cached() {
        let source = Arc::new(FakeCatalog::default());
        let client = CatalogClient::builder(source.clone()).build();

        assert!(client.lookup("asdkjasdkj", "nobody").await.is_none());
        assert!(client.lookup("asdkjasdkj", "nobody").await.is_none());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blank_input_skips_catalog() {
        let source = Arc::new(california_love());
        let client = CatalogClient::builder(source.clone()).build();
        assert!(client.lookup("", "2Pac").await.is_none());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_bio_is_dropped() {
        let client = CatalogClient::builder(Arc::new(california_love()))
            .bio_source(Arc::new(FakeBio {
                text: "Tupac Shakur was an American rapper. More text.".into(),
                delay: Duration::from_secs(5),
            }))
            .bio_timeout(Duration::from_millis(1000))
            .build();

        let record = client.lookup("California Love", "2Pac").await.unwrap();
        assert!(record.bio.is_none());
        assert_eq!(record.resolved_title, "California Love");
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_bio_does_not_delay_record() {
        let client = CatalogClient::builder(Arc::new(california_love()))
            .bio_source(Arc::new(FakeBio {
                text: "Tupac Shakur was an American rapper. More text.".into(),
                delay: Duration::from_millis(900),
            }))
            .bio_timeout(Duration::from_millis(1000))
            .build();

        let started = tokio::time::Instant::now();
        let record = client.lookup("California Love", "2Pac").await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));
        assert!(record.bio.is_none());

        // the bio kept running and now answers from cache
        tokio::time::sleep(Duration::from_secs(1)).await;
        let result = client.search_with_bio("California Love 2Pac").await.unwrap();
        assert_eq!(
            result.artist.unwrap().bio.as_deref(),
            Some("Tupac Shakur was an American rapper.")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_cover_download_is_bounded() {
        let client = CatalogClient::builder(Arc::new(california_love()))
            .image_fetcher(Arc::new(HangingImages))
            .cover_timeout(Duration::from_secs(2))
            .build();

        let record = tokio::time::timeout(Duration::from_secs(10), client.lookup("California Love", "2Pac"))
            .await
            .expect("lookup should not hang")
            .unwrap();
        assert_eq!(record.cover_url.as_deref(), Some("https://img/cover"));
        assert!(record.dominant_color.is_none());
    }

    #[tokio::test]
    async fn test_bio_is_truncated_to_first_sentence() {
        let client = CatalogClient::builder(Arc::new(california_love()))
            .bio_source(Arc::new(FakeBio {
                text: "Tupac Shakur was an American rapper. More text.".into(),
                delay: Duration::ZERO,
            }))
            .build();

        let record = client.lookup("California Love", "2Pac").await.unwrap();
        assert_eq!(record.bio.as_deref(), Some("Tupac Shakur was an American rapper."));
        assert_eq!(
            record.wikipedia_url.as_deref(),
            Some("https://en.wikipedia.org/wiki/2Pac")
        );
    }

    #[tokio::test]
    async fn test_missing_artist_image_uses_fallback_ladder() {
        let source = Arc::new(
            FakeCatalog::default()
                .with("Woman to Woman Joe Cocker", search_result("Woman to Woman", "Joe Cocker", None))
                .with(
                    "Joe Cocker west coast hip hop",
                    search_result("Unchain My Heart", "Joe Cocker", Some("https://img/joe")),
                ),
        );
        let client = CatalogClient::builder(source).build();

        let record = client.lookup("Woman to Woman", "Joe Cocker").await.unwrap();
        assert_eq!(record.artist_image_url.as_deref(), Some("https://img/joe"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_with_bio_fills_artist() {
        let client = CatalogClient::builder(Arc::new(california_love()))
            .bio_source(Arc::new(FakeBio {
                text: "x".repeat(500),
                delay: Duration::from_millis(300),
            }))
            .build();

        let started = tokio::time::Instant::now();
        let first = client.search_with_bio("California Love 2Pac").await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));
        assert!(first.artist.unwrap().bio.is_none());

        tokio::time::sleep(Duration::from_millis(500)).await;
        let result = client.search_with_bio("California Love 2Pac").await.unwrap();
        let artist = result.artist.unwrap();
        assert_eq!(artist.bio.as_deref().map(|b| b.chars().count()), Some(280));
        assert!(artist.wikipedia_url.is_some());

        let err = client.search_with_bio("nothing").await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound));
    }
}
