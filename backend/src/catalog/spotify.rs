//! Spotify Web API catalog source.
//!
//! Uses the client-credentials flow. The app token is cached on the instance
//! and refreshed shortly before it expires.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::CatalogSource;
use crate::api::types::{ArtistRef, CatalogAlbum, CatalogArtist, CatalogImage, CatalogSearch, CatalogTrack};
use crate::config::SpotifyConfig;
use crate::error::{CatalogError, CatalogResult};

/// Refresh the token this long before the upstream expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    #[serde(default)]
    items: Vec<SpotifyTrack>,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtistRef {
    #[serde(default)]
    id: Option<String>,
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyAlbum {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    images: Vec<CatalogImage>,
    #[serde(default)]
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    id: String,
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtistRef>,
    album: SpotifyAlbum,
    #[serde(default)]
    external_urls: ExternalUrls,
}

#[derive(Debug, Default, Deserialize)]
struct Followers {
    #[serde(default)]
    total: u64,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    id: String,
    name: String,
    #[serde(default)]
    images: Vec<CatalogImage>,
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    followers: Followers,
    #[serde(default)]
    external_urls: ExternalUrls,
}

pub struct SpotifyCatalog {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    accounts_url: String,
    api_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyCatalog {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            http: crate::config::http_client(crate::config::DEFAULT_HTTP_TIMEOUT),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            accounts_url: crate::config::DEFAULT_SPOTIFY_ACCOUNTS_URL.to_string(),
            api_url: crate::config::DEFAULT_SPOTIFY_API_URL.to_string(),
            token: Mutex::new(None),
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn from_config(config: &SpotifyConfig) -> CatalogResult<Self> {
        let client_id = config
            .client_id
            .clone()
            .ok_or(CatalogError::MissingCredentials("SPOTIFY_CLIENT_ID"))?;
        let client_secret = config
            .client_secret
            .clone()
            .ok_or(CatalogError::MissingCredentials("SPOTIFY_CLIENT_SECRET"))?;
        Ok(Self::new(client_id, client_secret).with_urls(&config.accounts_url, &config.api_url))
    }

    pub fn with_urls(mut self, accounts_url: &str, api_url: &str) -> Self {
        self.accounts_url = accounts_url.trim_end_matches('/').to_string();
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    async fn token(&self) -> CatalogResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_REFRESH_MARGIN < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        tracing::debug!("requesting catalog app token");
        let response = self
            .http
            .post(format!("{}/token", self.accounts_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Token(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )));
        }

        let token: TokenResponse = response.json().await?;
        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(access_token)
    }

    async fn fetch_artist(&self, token: &str, id: &str) -> CatalogResult<SpotifyArtist> {
        let response = self
            .http
            .get(format!("{}/artists/{}", self.api_url, id))
            .bearer_auth(token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CatalogError::Status(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl CatalogSource for SpotifyCatalog {
    async fn search(&self, query: &str) -> CatalogResult<CatalogSearch> {
        let token = self.token().await?;

        let response = self
            .http
            .get(format!("{}/search", self.api_url))
            .bearer_auth(&token)
            .query(&[("q", query), ("type", "track"), ("limit", "1")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CatalogError::Status(response.status().as_u16()));
        }

        let search: SearchResponse = response.json().await?;
        let track = search
            .tracks
            .and_then(|t| t.items.into_iter().next())
            .ok_or(CatalogError::NotFound)?;

        // Artist details are best-effort; the track alone is still a result.
        let artist = match track.artists.first().and_then(|a| a.id.as_deref()) {
            Some(id) => match self.fetch_artist(&token, id).await {
                Ok(artist) => Some(artist),
                Err(e) => {
                    tracing::debug!(artist_id = id, error = %e, "artist lookup failed");
                    None
                }
            },
            None => None,
        };

        Ok(to_catalog_search(track, artist))
    }
}

fn to_catalog_search(track: SpotifyTrack, artist: Option<SpotifyArtist>) -> CatalogSearch {
    let year = track
        .album
        .release_date
        .as_deref()
        .map(|date| date.chars().take(4).collect::<String>())
        .filter(|year| !year.is_empty());

    CatalogSearch {
        track: Some(CatalogTrack {
            id: track.id,
            name: track.name,
            artists: track
                .artists
                .into_iter()
                .map(|a| ArtistRef {
                    id: a.id.unwrap_or_default(),
                    name: a.name,
                })
                .collect(),
            album: CatalogAlbum {
                id: track.album.id,
                name: track.album.name,
                images: track.album.images,
            },
            year,
            url: track.external_urls.spotify,
        }),
        artist: artist.map(|a| CatalogArtist {
            id: a.id,
            name: a.name,
            images: a.images,
            genres: a.genres,
            followers: a.followers.total,
            url: a.external_urls.spotify,
            bio: None,
            wikipedia_url: None,
        }),
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn track_json() -> Value {
        json!({
            "id": "t1",
            "name": "California Love - Original Version",
            "artists": [{ "id": "a1", "name": "2Pac" }, { "name": "Dr. Dre" }],
            "album": {
                "id": "al1",
                "name": "All Eyez On Me",
                "images": [{ "url": "https://i.scdn.co/image/cover", "width": 640, "height": 640 }],
                "release_date": "1996-02-13"
            },
            "external_urls": { "spotify": "https://open.spotify.com/track/t1" }
        })
    }

    #[test]
    fn test_maps_track_and_artist() {
        let track: SpotifyTrack = serde_json::from_value(track_json()).unwrap();
        let artist: SpotifyArtist = serde_json::from_value(json!({
            "id": "a1",
            "name": "2Pac",
            "images": [{ "url": "https://i.scdn.co/image/pac" }],
            "genres": ["g funk", "west coast hip hop"],
            "followers": { "total": 17000000 }
        }))
        .unwrap();

        let result = to_catalog_search(track, Some(artist));
        let track = result.track.as_ref().unwrap();
        assert_eq!(track.year.as_deref(), Some("1996"));
        assert_eq!(track.artists[1].id, "");
        assert_eq!(result.cover_url(), Some("https://i.scdn.co/image/cover"));
        assert_eq!(result.artist_image_url(), Some("https://i.scdn.co/image/pac"));
        assert_eq!(result.artist.as_ref().unwrap().followers, 17_000_000);
    }

    #[test]
    fn test_missing_release_date_has_no_year() {
        let mut raw = track_json();
        raw["album"]["release_date"] = json!("");
        let track: SpotifyTrack = serde_json::from_value(raw).unwrap();
        assert_eq!(to_catalog_search(track, None).track.unwrap().year, None);
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let config = SpotifyConfig {
            client_id: Some("id".into()),
            client_secret: None,
            accounts_url: "http://localhost".into(),
            api_url: "http://localhost".into(),
        };
        let err = SpotifyCatalog::from_config(&config).err().unwrap();
        assert!(matches!(err, CatalogError::MissingCredentials("SPOTIFY_CLIENT_SECRET")));
    }

    #[derive(Clone)]
    struct FakeSpotify {
        token_calls: Arc<AtomicUsize>,
        empty: bool,
    }

    async fn token(State(fake): State<FakeSpotify>) -> Json<Value> {
        fake.token_calls.fetch_add(1, Ordering::SeqCst);
        Json(json!({ "access_token": "tok", "token_type": "Bearer", "expires_in": 3600 }))
    }

    async fn search(State(fake): State<FakeSpotify>) -> Json<Value> {
        let items = if fake.empty { json!([]) } else { json!([track_json()]) };
        Json(json!({ "tracks": { "items": items } }))
    }

    async fn spawn_fake(empty: bool) -> (String, Arc<AtomicUsize>) {
        let token_calls = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/api/token", post(token))
            .route("/v1/search", get(search))
            .with_state(FakeSpotify {
                token_calls: token_calls.clone(),
                empty,
            });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), token_calls)
    }

    #[tokio::test]
    async fn test_token_is_reused_between_searches() {
        let (base, token_calls) = spawn_fake(false).await;
        let catalog = SpotifyCatalog::new("id", "secret")
            .with_urls(&format!("{}/api", base), &format!("{}/v1", base));

        let first = catalog.search("California Love 2Pac").await.unwrap();
        let second = catalog.search("California Love 2Pac").await.unwrap();

        assert_eq!(token_calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.track.as_ref().unwrap().name, "California Love - Original Version");
        // The artist endpoint is missing on the fake, so details are dropped.
        assert!(second.artist.is_none());
    }

    #[tokio::test]
    async fn test_empty_search_is_not_found() {
        let (base, _) = spawn_fake(true).await;
        let catalog = SpotifyCatalog::new("id", "secret")
            .with_urls(&format!("{}/api", base), &format!("{}/v1", base));
        let err = catalog.search("asdkjasdkj").await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound));
    }
}
