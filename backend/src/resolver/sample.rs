//! Sample Identification Resolver.
//!
//! Turns a free-text query into a canonical song and its primary sample.
//! The upstream is trusted to report uncertainty instead of guessing; this
//! module only normalizes its answer and never invents names.

use async_trait::async_trait;
use std::sync::Arc;

use super::SampleIdentifier;
use crate::ai::{prompt, ChatClient, ChatRequest};
use crate::api::logs::log_warning;
use crate::api::types::IdentifyResponse;
use crate::error::{AiError, AiResult};
use crate::models::{non_empty, Identification, Query, ResolvedSong, SampleRelation, Status};

/// Seed pinned for reproducible answers.
const SAMPLE_SEED: u64 = 7;

/// Sample identification backed by a chat-completion model.
pub struct AiSampleIdentifier {
    client: ChatClient,
}

impl AiSampleIdentifier {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SampleIdentifier for AiSampleIdentifier {
    async fn identify(&self, query: &Query) -> AiResult<IdentifyResponse> {
        let request = ChatRequest {
            system: prompt::SAMPLE_SYSTEM_PROMPT,
            user: prompt::sample_user_prompt(query.as_str()),
            schema_name: "sample_identification",
            schema: prompt::sample_schema(),
            temperature: None,
            max_tokens: None,
            seed: Some(SAMPLE_SEED),
            search_mode: None,
        };
        let payload: IdentifyResponse = self.client.complete_json(&request).await?;

        if payload.status == Status::Ok && payload.query_song.title.trim().is_empty() {
            return Err(AiError::InvalidJson(
                "status ok without a query_song title".to_string(),
            ));
        }
        Ok(payload)
    }
}

/// The stage-1 contract: never fails, never fabricates.
#[derive(Clone)]
pub struct SampleResolver {
    upstream: Arc<dyn SampleIdentifier>,
    sample_threshold: f64,
}

impl SampleResolver {
    pub fn new(upstream: Arc<dyn SampleIdentifier>, sample_threshold: f64) -> Self {
        Self {
            upstream,
            sample_threshold,
        }
    }

    pub async fn resolve(&self, query: &Query) -> Identification {
        match self.upstream.identify(query).await {
            Ok(payload) => normalize(payload, self.sample_threshold),
            Err(e) => {
                log_warning(format!("Sample identification failed for {:?}: {}", query.as_str(), e));
                Identification::unknown(None)
            }
        }
    }
}

/// Map a wire payload onto the domain shape.
///
/// A sample is kept only with a usable title (not `"none"`) and confidence
/// strictly above `sample_threshold`; otherwise its note alone survives.
pub fn normalize(payload: IdentifyResponse, sample_threshold: f64) -> Identification {
    let IdentifyResponse {
        query_song,
        main_sample,
        status,
        ..
    } = payload;

    let title = non_empty(Some(&query_song.title));
    let (Status::Ok, Some(title)) = (status, title) else {
        return Identification::unknown(non_empty(main_sample.note.as_deref()));
    };

    let song = ResolvedSong {
        title,
        artist: non_empty(query_song.artist.as_deref()),
        video_url: non_empty(query_song.youtube_url.as_deref()),
        video_title: non_empty(query_song.youtube_title.as_deref()),
    };

    let note = non_empty(main_sample.note.as_deref());
    let sample_title = non_empty(main_sample.title.as_deref())
        .filter(|t| !t.eq_ignore_ascii_case("none"));
    let confidence = if main_sample.confidence.is_finite() {
        main_sample.confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };

    match sample_title {
        Some(title) if confidence > sample_threshold => Identification {
            song,
            sample: Some(SampleRelation {
                title,
                artist: non_empty(main_sample.artist.as_deref()),
                confidence,
                note,
                year: None,
                video_url: non_empty(main_sample.youtube_url.as_deref()),
                video_title: non_empty(main_sample.youtube_title.as_deref()),
                video_confidence: None,
                needs_video_lookup: false,
            }),
            note: None,
            status: Status::Ok,
        },
        _ => Identification {
            song,
            sample: None,
            note,
            status: Status::Ok,
        },
    }
}
