//! HTTP server for the Samplefindr API.
//!
//! Serves the three upstream contracts consumed by the pipeline, the curated
//! home lists, and a whole-pipeline search for clients that cannot run it
//! themselves. Failures use the success shapes with placeholder fields.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                               |
//! |--------|-------------------|-------------------------------------------|
//! | GET    | `/health`         | Health check                              |
//! | POST   | `/sample-identify`| Resolve a query and its primary sample    |
//! | POST   | `/video-search`   | Official video for a title/artist         |
//! | GET    | `/catalog-search` | Catalog track, artist and bio for `q`     |
//! | GET    | `/home-now`       | Curated trending tracks                   |
//! | GET    | `/home-discover`  | Curated classics                          |
//! | POST   | `/api/search`     | Run the full pipeline until settled       |
//! | GET    | `/api/logs`       | SSE stream of pipeline diagnostics        |

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query as QueryParams, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde::Serialize;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{
    CatalogSearch, CatalogSearchParams, HomeParams, IdentifyRequest, IdentifyResponse, SearchRequest,
    SearchResponse, VideoSearchRequest, VideoSearchResponse,
};
use crate::ai::ChatClient;
use crate::catalog::CatalogClient;
use crate::config::{http_client, Config, PipelineConfig};
use crate::curated::{home_tracks, HomeList};
use crate::error::{CatalogError, ConfigError, InputError, ServerResult};
use crate::models::{non_empty, Query};
use crate::pipeline::{Pipeline, VideoMemo};
use crate::resolver::{
    AiSampleIdentifier, AiVideoSearcher, RemoteEndpoints, SampleIdentifier, SampleResolver, VideoResolver, VideoSearcher,
};

const IDENTIFY_CACHE_CONTROL: &str = "s-maxage=3600, stale-while-revalidate=1800";
const VIDEO_CACHE_CONTROL: &str = "s-maxage=7200, stale-while-revalidate=3600";
const HOME_CACHE_CONTROL: &str = "s-maxage=1800, stale-while-revalidate=900";

/// Upstreams shared by every request.
#[derive(Clone)]
pub struct AppState {
    identifier: Arc<dyn SampleIdentifier>,
    videos: Arc<dyn VideoSearcher>,
    catalog: CatalogClient,
    /// Video answers shared by every `/api/search` request.
    video_memo: Arc<VideoMemo>,
    config: PipelineConfig,
}

impl AppState {
    pub fn new(
        identifier: Arc<dyn SampleIdentifier>,
        videos: Arc<dyn VideoSearcher>,
        catalog: CatalogClient,
        config: PipelineConfig,
    ) -> Self {
        Self {
            identifier,
            videos,
            catalog,
            video_memo: Arc::new(VideoMemo::new()),
            config,
        }
    }

    /// OpenAI for identification, Perplexity for videos, Spotify for metadata.
    pub fn from_config(config: &Config) -> ServerResult<Self> {
        let openai = ChatClient::from_provider(&config.openai, "OPENAI_API_KEY")
            .map_err(ConfigError::from)?
            .with_retries(config.ai_max_retries, config.ai_retry_delay)
            .with_http_client(http_client(config.http_timeout));
        let perplexity = ChatClient::from_provider(&config.perplexity, "PERPLEXITY_API_KEY")
            .map_err(ConfigError::from)?
            .with_retries(config.ai_max_retries, config.ai_retry_delay)
            .with_http_client(http_client(config.http_timeout));

        Ok(Self::new(
            Arc::new(AiSampleIdentifier::new(openai)),
            Arc::new(AiVideoSearcher::new(perplexity)),
            CatalogClient::from_config(config)?,
            config.pipeline,
        ))
    }

    /// Every upstream served by another Samplefindr deployment.
    pub fn remote(base_url: &str, config: &Config) -> Self {
        let remote = Arc::new(RemoteEndpoints::with_timeout(base_url, config.http_timeout));
        let catalog = CatalogClient::builder(remote.clone())
            .cache_ttl(config.catalog_cache_ttl)
            .bio_max_chars(config.bio_max_chars)
            .build();
        Self::new(remote.clone(), remote, catalog, config.pipeline)
    }

    pub fn catalog(&self) -> &CatalogClient {
        &self.catalog
    }

    pub fn sample_resolver(&self) -> SampleResolver {
        SampleResolver::new(self.identifier.clone(), self.config.sample_threshold)
    }

    pub fn video_resolver(&self) -> VideoResolver {
        VideoResolver::new(self.videos.clone())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// A fresh pipeline over the shared upstreams, catalog caches and video
    /// memo. Each request gets its own result store.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            self.sample_resolver(),
            self.video_resolver(),
            Arc::new(self.catalog.clone()),
            self.config,
        )
        .with_video_memo(self.video_memo.clone())
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/sample-identify", post(sample_identify).options(preflight))
        .route("/video-search", post(video_search).options(preflight))
        .route("/catalog-search", get(catalog_search).options(preflight))
        .route("/home-now", get(home_now).options(preflight))
        .route("/home-discover", get(home_discover).options(preflight))
        .route("/api/search", post(search).options(preflight))
        .route("/api/logs", get(sse_logs))
        .with_state(state)
        .layer(cors)
}

/// Start the HTTP server
pub async fn start_server(state: AppState, port: u16, cache_ttl: Duration) -> ServerResult<()> {
    let catalog = state.catalog.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cache_ttl.max(Duration::from_secs(1)));
        loop {
            interval.tick().await;
            let purged = catalog.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "expired catalog cache entries");
            }
        }
    });

    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log_info(format!("Samplefindr server running on http://localhost:{}", port));
    log_info("   POST /sample-identify, /video-search, /api/search");
    log_info("   GET  /catalog-search, /home-now, /home-discover, /api/logs");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn respond<T: Serialize>(status: StatusCode, cache_control: Option<&'static str>, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    if let Some(value) = cache_control.filter(|_| status.is_success()) {
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static(value));
    }
    response
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "samplefindr",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "identify": "POST /sample-identify",
            "video": "POST /video-search",
            "catalog": "GET /catalog-search?q=",
            "search": "POST /api/search",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// SSE endpoint for pipeline diagnostics
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn sample_identify(
    State(state): State<AppState>,
    body: Result<Json<IdentifyRequest>, JsonRejection>,
) -> Response {
    let raw = body.ok().and_then(|Json(req)| req.query).unwrap_or_default();
    let query = match Query::parse(&raw) {
        Ok(query) => query,
        Err(e) => {
            return respond(StatusCode::BAD_REQUEST, None, IdentifyResponse::invalid_input(e.to_string()));
        }
    };

    match state.identifier.identify(&query).await {
        Ok(payload) => respond(StatusCode::OK, Some(IDENTIFY_CACHE_CONTROL), payload),
        Err(e) => {
            log_error(format!("/sample-identify failed for {:?}: {}", query.as_str(), e));
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                None,
                IdentifyResponse::failure(format!("Error: {}", e)),
            )
        }
    }
}

async fn video_search(
    State(state): State<AppState>,
    body: Result<Json<VideoSearchRequest>, JsonRejection>,
) -> Response {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let (Some(title), Some(artist)) = (non_empty(req.title.as_deref()), non_empty(req.artist.as_deref())) else {
        return respond(
            StatusCode::BAD_REQUEST,
            None,
            VideoSearchResponse::invalid_input(InputError::MissingTitleOrArtist.to_string()),
        );
    };

    match state.videos.search(&title, &artist).await {
        Ok(found) => respond(StatusCode::OK, Some(VIDEO_CACHE_CONTROL), found.validated()),
        Err(e) => {
            log_error(format!("/video-search failed for {} - {}: {}", artist, title, e));
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                None,
                VideoSearchResponse::failure("error"),
            )
        }
    }
}

async fn catalog_search(
    State(state): State<AppState>,
    params: Result<QueryParams<CatalogSearchParams>, QueryRejection>,
) -> Response {
    let q = params.ok().and_then(|QueryParams(p)| non_empty(p.q.as_deref()));
    let Some(q) = q else {
        return respond(StatusCode::BAD_REQUEST, None, CatalogSearch::failure("Missing q"));
    };

    match state.catalog.search_with_bio(&q).await {
        Ok(result) => respond(StatusCode::OK, None, result),
        Err(CatalogError::NotFound) => respond(StatusCode::NOT_FOUND, None, CatalogSearch::failure("No track found")),
        Err(e) => {
            log_error(format!("/catalog-search failed for {:?}: {}", q, e));
            respond(StatusCode::INTERNAL_SERVER_ERROR, None, CatalogSearch::failure(e.to_string()))
        }
    }
}

fn home(list: HomeList, state: &AppState, params: Result<QueryParams<HomeParams>, QueryRejection>) -> Response {
    let params = params.map(|QueryParams(p)| p).unwrap_or_default();
    let tracks = home_tracks(
        list,
        params.limit,
        params.samples_only.unwrap_or(false),
        state.config.discovery_threshold,
    );
    respond(StatusCode::OK, Some(HOME_CACHE_CONTROL), tracks)
}

async fn home_now(
    State(state): State<AppState>,
    params: Result<QueryParams<HomeParams>, QueryRejection>,
) -> Response {
    home(HomeList::Now, &state, params)
}

async fn home_discover(
    State(state): State<AppState>,
    params: Result<QueryParams<HomeParams>, QueryRejection>,
) -> Response {
    home(HomeList::Discover, &state, params)
}

async fn search(State(state): State<AppState>, body: Result<Json<SearchRequest>, JsonRejection>) -> Response {
    let id = Uuid::new_v4();
    let raw = body.ok().and_then(|Json(req)| req.query).unwrap_or_default();

    let pipeline = state.pipeline();
    match pipeline.run(&raw).await {
        Ok(snapshot) => respond(
            StatusCode::OK,
            None,
            SearchResponse {
                id,
                snapshot,
                error: None,
            },
        ),
        Err(e) => respond(
            StatusCode::BAD_REQUEST,
            None,
            SearchResponse {
                id,
                snapshot: None,
                error: Some(e.to_string()),
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{ArtistRef, CatalogAlbum, CatalogTrack, MainSamplePayload, QuerySongPayload};
    use crate::catalog::CatalogSource;
    use crate::error::{AiError, AiResult, CatalogResult};
    use crate::models::Status;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    struct FakeIdentifier;

    #[async_trait]
    impl SampleIdentifier for FakeIdentifier {
        async fn identify(&self, query: &Query) -> AiResult<IdentifyResponse> {
            match query.as_str() {
                "California Love 2Pac" => Ok(IdentifyResponse {
                    query_song: QuerySongPayload {
                        title: "California Love".into(),
                        artist: Some("2Pac".into()),
                        youtube_url: None,
                        youtube_title: None,
                    },
                    main_sample: MainSamplePayload {
                        title: Some("Woman to Woman".into()),
                        artist: Some("Joe Cocker".into()),
                        confidence: 1.0,
                        note: Some("Piano riff".into()),
                        youtube_url: None,
                        youtube_title: None,
                    },
                    status: Status::Ok,
                    error: None,
                }),
                "boom" => Err(AiError::ApiError {
                    status: 502,
                    message: "bad gateway".into(),
                }),
                _ => Ok(IdentifyResponse::default()),
            }
        }
    }

    #[derive(Default)]
    struct FakeVideos {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl VideoSearcher for FakeVideos {
        async fn search(&self, title: &str, _artist: &str) -> AiResult<VideoSearchResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if title == "boom" {
                return Err(AiError::Timeout);
            }
            Ok(VideoSearchResponse {
                youtube_url: Some(format!("https://youtu.be/{}", title.replace(' ', "-"))),
                youtube_title: Some(title.to_string()),
                confidence: 0.9,
                search_strategy_used: String::new(),
                error: None,
            })
        }
    }

    struct FakeCatalog;

    #[async_trait]
    impl CatalogSource for FakeCatalog {
        async fn search(&self, query: &str) -> CatalogResult<CatalogSearch> {
            if query == "boom" {
                return Err(CatalogError::Status(502));
            }
            if !query.contains("California Love") {
                return Err(CatalogError::NotFound);
            }
            Ok(CatalogSearch {
                track: Some(CatalogTrack {
                    id: "t1".into(),
                    name: "California Love".into(),
                    artists: vec![ArtistRef {
                        id: "a1".into(),
                        name: "2Pac".into(),
                    }],
                    album: CatalogAlbum {
                        id: "al1".into(),
                        name: "All Eyez On Me".into(),
                        images: vec![],
                    },
                    year: Some("1996".into()),
                    url: None,
                }),
                artist: None,
                error: None,
            })
        }
    }

    fn state(videos: Arc<FakeVideos>) -> AppState {
        AppState::new(
            Arc::new(FakeIdentifier),
            videos,
            CatalogClient::builder(Arc::new(FakeCatalog)).build(),
            PipelineConfig::default(),
        )
    }

    async fn call(request: Request<Body>) -> (StatusCode, Option<String>, Value) {
        call_with(router(state(Arc::default())), request).await
    }

    async fn call_with(app: Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let cache = response
            .headers()
            .get(header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, cache, json)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_uri(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_identify_ok_with_cache_header() {
        let (status, cache, json) = call(post_json("/sample-identify", json!({ "query": "California Love 2Pac" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache.as_deref(), Some(IDENTIFY_CACHE_CONTROL));
        assert_eq!(json["query_song"]["title"], "California Love");
        assert_eq!(json["main_sample"]["artist"], "Joe Cocker");
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_identify_rejects_blank_query() {
        let (status, _, json) = call(post_json("/sample-identify", json!({ "query": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Missing or invalid query parameter");
        assert_eq!(json["status"], "unknown");
    }

    #[tokio::test]
    async fn test_identify_upstream_failure_keeps_shape() {
        let (status, cache, json) = call(post_json("/sample-identify", json!({ "query": "boom" }))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(cache.is_none());
        assert_eq!(json["query_song"]["title"], "");
        assert_eq!(json["main_sample"]["confidence"], 0.0);
        assert!(json["main_sample"]["note"].as_str().unwrap().starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_video_search_validates_and_fills_strategy() {
        let (status, cache, json) = call(post_json("/video-search", json!({ "title": "Stan", "artist": "Eminem" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache.as_deref(), Some(VIDEO_CACHE_CONTROL));
        assert_eq!(json["youtube_url"], "https://youtu.be/Stan");
        assert_eq!(json["search_strategy_used"], "unknown");
    }

    #[tokio::test]
    async fn test_video_search_missing_artist() {
        let (status, _, json) = call(post_json("/video-search", json!({ "title": "Stan" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Missing title or artist parameter");
        assert_eq!(json["youtube_url"], Value::Null);
    }

    #[tokio::test]
    async fn test_video_search_failure_keeps_shape() {
        let (status, _, json) = call(post_json("/video-search", json!({ "title": "boom", "artist": "x" }))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["confidence"], 0.0);
        assert_eq!(json["search_strategy_used"], "error");
    }

    #[tokio::test]
    async fn test_catalog_search_statuses() {
        let (status, _, json) = call(get_uri("/catalog-search?q=California%20Love%202Pac")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["track"]["year"], "1996");

        let (status, _, json) = call(get_uri("/catalog-search?q=nothing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["track"], Value::Null);

        let (status, _, _) = call(get_uri("/catalog-search")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, json) = call(get_uri("/catalog-search?q=boom")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn test_options_returns_empty_ok() {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/sample-identify")
            .body(Body::empty())
            .unwrap();
        let (status, _, json) = call(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, Value::Null);
    }

    #[tokio::test]
    async fn test_home_lists() {
        let (status, cache, json) = call(get_uri("/home-now?limit=3&samples_only=true")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache.as_deref(), Some(HOME_CACHE_CONTROL));
        assert_eq!(json["total"], 3);
        assert_eq!(json["samples_only"], true);

        let (_, _, json) = call(get_uri("/home-discover?limit=abc")).await;
        assert_eq!(json["total"], 6);
    }

    #[tokio::test]
    async fn test_full_search_settles() {
        let (status, _, json) = call(post_json("/api/search", json!({ "query": "California Love 2Pac" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["id"].is_string());

        let snapshot = &json["snapshot"];
        assert_eq!(snapshot["phase"], "settled");
        assert_eq!(snapshot["entries"][0]["title"], "California Love");
        assert_eq!(snapshot["entries"][0]["videoUrl"], "https://youtu.be/California-Love");
        assert_eq!(snapshot["entries"][0]["year"], "1996");
        assert_eq!(snapshot["entries"][0]["sample"]["title"], "Woman to Woman");
        assert!(snapshot["discovery"].as_array().is_some_and(|d| !d.is_empty()));
    }

    #[tokio::test]
    async fn test_searches_share_video_answers() {
        let videos = Arc::new(FakeVideos::default());
        let state = state(videos.clone());

        for _ in 0..2 {
            let request = post_json("/api/search", json!({ "query": "California Love 2Pac" }));
            let (status, _, json) = call_with(router(state.clone()), request).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(json["snapshot"]["entries"][0]["videoUrl"], "https://youtu.be/California-Love");
        }
        // main track and sample, searched once across both requests
        assert_eq!(videos.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_full_search_rejects_blank_query() {
        let (status, _, json) = call(post_json("/api/search", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["snapshot"], Value::Null);
        assert_eq!(json["error"], "Missing or invalid query parameter");
    }
}
