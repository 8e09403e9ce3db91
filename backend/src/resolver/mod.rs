//! Stage-1 and stage-2 resolvers.
//!
//! Each collaborator has two layers:
//!
//! - a raw upstream trait ([`SampleIdentifier`], [`VideoSearcher`]) returning
//!   the wire payload or an error, implemented by the AI clients and by the
//!   remote HTTP client;
//! - a containment wrapper ([`SampleResolver`], [`VideoResolver`]) exposing
//!   the pipeline contract, which never fails and collapses every error into
//!   the empty-defaults shape.

pub mod remote;
pub mod sample;
pub mod video;

use async_trait::async_trait;

use crate::api::types::{IdentifyResponse, VideoSearchResponse};
use crate::error::AiResult;
use crate::models::Query;

pub use remote::RemoteEndpoints;
pub use sample::{AiSampleIdentifier, SampleResolver};
pub use video::{AiVideoSearcher, VideoResolver};

/// Upstream that disambiguates a query and names its primary sample.
#[async_trait]
pub trait SampleIdentifier: Send + Sync {
    async fn identify(&self, query: &Query) -> AiResult<IdentifyResponse>;
}

/// Upstream that finds the official video for a title/artist pair.
#[async_trait]
pub trait VideoSearcher: Send + Sync {
    async fn search(&self, title: &str, artist: &str) -> AiResult<VideoSearchResponse>;
}
