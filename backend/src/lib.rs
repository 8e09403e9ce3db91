//! # Samplefindr - find the sample behind any song
//!
//! Samplefindr turns a free-text song query into a result list that fills in
//! progressively: the song and its primary sample first, then official video
//! links, then catalog metadata (year, cover, genres, artist bio).
//!
//! ## Architecture
//!
//! ```text
//!                    ┌──────────────┐  stage 2  ┌──────────────┐
//!                ┌──▶│ VideoResolver│──────────▶│              │
//! ┌──────────┐   │   └──────────────┘           │              │
//! │  Query   │───┤ stage 1                      │ ResultStore  │──▶ Snapshot
//! │ (text)   │   │   ┌──────────────┐  stage 3  │ (generation) │   (watch)
//! └──────────┘   └──▶│ CatalogClient│──────────▶│              │
//!                    └──────────────┘           └──────────────┘
//!          SampleResolver publishes the list before 2 and 3 start.
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use samplefindr::{AppState, Config};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().unwrap();
//!     let state = AppState::from_config(&config).unwrap();
//!     let snapshot = state.pipeline().run("California Love 2Pac").await.unwrap();
//!     println!("{:#?}", snapshot);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per boundary
//! - [`config`] - Environment configuration and thresholds
//! - [`models`] - Domain models (Query, ResultEntry, MetadataRecord)
//! - [`cache`] - TTL cache and request coalescing
//! - [`ai`] - Chat-completion client with JSON schema output
//! - [`resolver`] - Sample identification and video search
//! - [`catalog`] - Catalog metadata, bios, artist images, cover colours
//! - [`curated`] - Curated home lists, sampled-track search and discovery
//! - [`pipeline`] - Staged enrichment and the result store
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Caching
pub mod cache;

// Upstreams
pub mod ai;
pub mod catalog;
pub mod resolver;

// Pipeline
pub mod curated;
pub mod pipeline;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{AiError, CatalogError, ConfigError, InputError, ServerError};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{Config, PipelineConfig};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    GenrePool,
    Identification,
    MetadataRecord,
    Query,
    ResultEntry,
    Rgb,
    SampleRelation,
    TrackKey,
    VideoMatch,
};

// =============================================================================
// Re-exports - Upstreams
// =============================================================================

pub use ai::ChatClient;
pub use catalog::{CatalogClient, MetadataLookup};
pub use resolver::{RemoteEndpoints, SampleIdentifier, SampleResolver, VideoResolver, VideoSearcher};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use curated::{home_tracks, HomeList, SampledTrack};
pub use pipeline::{Generation, Phase, Pipeline, ResultStore, Snapshot, VideoMemo};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::{router, start_server, AppState};
