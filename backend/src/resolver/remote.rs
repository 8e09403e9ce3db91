//! Client for a deployed Samplefindr server.
//!
//! Speaks the public endpoint contracts, so the pipeline can run in-process
//! against the upstream APIs or against a remote deployment. Failure
//! responses share the success shape, so a 500 body is still parsed.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::{SampleIdentifier, VideoSearcher};
use crate::api::types::{CatalogSearch, IdentifyRequest, IdentifyResponse, VideoSearchRequest, VideoSearchResponse};
use crate::catalog::CatalogSource;
use crate::error::{AiError, AiResult, CatalogError, CatalogResult};
use crate::models::Query;

#[derive(Clone)]
pub struct RemoteEndpoints {
    http: reqwest::Client,
    base_url: String,
}

impl RemoteEndpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, crate::config::DEFAULT_HTTP_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: std::time::Duration) -> Self {
        Self {
            http: crate::config::http_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> AiResult<T>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if status.is_client_error() {
            return Err(AiError::ApiError {
                status: status.as_u16(),
                message: text.chars().take(200).collect(),
            });
        }
        serde_json::from_str(&text).map_err(|e| AiError::InvalidJson(e.to_string()))
    }
}

#[async_trait]
impl SampleIdentifier for RemoteEndpoints {
    async fn identify(&self, query: &Query) -> AiResult<IdentifyResponse> {
        let request = IdentifyRequest {
            query: Some(query.as_str().to_string()),
        };
        self.post_json("/sample-identify", &request).await
    }
}

#[async_trait]
impl VideoSearcher for RemoteEndpoints {
    async fn search(&self, title: &str, artist: &str) -> AiResult<VideoSearchResponse> {
        let request = VideoSearchRequest {
            title: Some(title.to_string()),
            artist: Some(artist.to_string()),
        };
        self.post_json("/video-search", &request).await
    }
}

#[async_trait]
impl CatalogSource for RemoteEndpoints {
    async fn search(&self, query: &str) -> CatalogResult<CatalogSearch> {
        let response = self
            .http
            .get(format!("{}/catalog-search", self.base_url))
            .query(&[("q", query)])
            .send()
            .await?;

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Err(CatalogError::NotFound),
            status if status.is_success() => Ok(response.json().await?),
            status => Err(CatalogError::Status(status.as_u16())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Status;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn spawn(app: Router) -> RemoteEndpoints {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        RemoteEndpoints::new(format!("http://{}/", addr))
    }

    #[tokio::test]
    async fn test_identify_parses_failure_body() {
        let app = Router::new().route(
            "/sample-identify",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "query_song": { "title": "", "artist": null, "youtube_url": null, "youtube_title": null },
                        "main_sample": { "title": null, "artist": null, "confidence": 0, "note": "Error: upstream", "youtube_url": null, "youtube_title": null },
                        "status": "unknown"
                    })),
                )
            }),
        );
        let remote = spawn(app).await;

        let payload = remote.identify(&Query::parse("Stan").unwrap()).await.unwrap();
        assert_eq!(payload.status, Status::Unknown);
        assert_eq!(payload.main_sample.note.as_deref(), Some("Error: upstream"));
    }

    #[tokio::test]
    async fn test_video_search_posts_title_and_artist() {
        let app = Router::new().route(
            "/video-search",
            post(|Json(body): Json<Value>| async move {
                Json(json!({
                    "youtube_url": format!("https://youtu.be/{}", body["title"].as_str().unwrap_or_default()),
                    "youtube_title": body["artist"],
                    "confidence": 0.9,
                    "search_strategy_used": "echo"
                }))
            }),
        );
        let remote = spawn(app).await;

        let found = VideoSearcher::search(&remote, "Stan", "Eminem").await.unwrap();
        assert_eq!(found.youtube_url.as_deref(), Some("https://youtu.be/Stan"));
        assert_eq!(found.youtube_title.as_deref(), Some("Eminem"));
    }

    #[tokio::test]
    async fn test_bad_request_is_an_error() {
        let app = Router::new().route(
            "/video-search",
            post(|| async { (StatusCode::BAD_REQUEST, Json(json!({ "error": "Missing title or artist parameter" }))) }),
        );
        let remote = spawn(app).await;
        let err = VideoSearcher::search(&remote, "", "").await.unwrap_err();
        assert!(matches!(err, AiError::ApiError { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_catalog_not_found() {
        let app = Router::new().route(
            "/catalog-search",
            get(|| async { (StatusCode::NOT_FOUND, Json(json!({ "error": "No track found" }))) }),
        );
        let remote = spawn(app).await;
        let err = CatalogSource::search(&remote, "asdkjasdkj").await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound));
    }
}
