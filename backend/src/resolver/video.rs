//! Video Link Resolver.

use async_trait::async_trait;
use std::sync::Arc;

use super::VideoSearcher;
use crate::ai::{prompt, ChatClient, ChatRequest};
use crate::api::logs::log_warning_indent;
use crate::api::types::VideoSearchResponse;
use crate::error::AiResult;
use crate::models::{non_empty, VideoMatch};

const VIDEO_TEMPERATURE: f32 = 0.1;
const VIDEO_MAX_TOKENS: u32 = 1000;

/// Video search backed by a web-searching chat model.
pub struct AiVideoSearcher {
    client: ChatClient,
}

impl AiVideoSearcher {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VideoSearcher for AiVideoSearcher {
    async fn search(&self, title: &str, artist: &str) -> AiResult<VideoSearchResponse> {
        let request = ChatRequest {
            system: prompt::VIDEO_SYSTEM_PROMPT,
            user: prompt::video_user_prompt(title, artist),
            schema_name: "youtube_search_result",
            schema: prompt::video_schema(),
            temperature: Some(VIDEO_TEMPERATURE),
            max_tokens: Some(VIDEO_MAX_TOKENS),
            seed: None,
            search_mode: Some("web"),
        };
        let raw: VideoSearchResponse = self.client.complete_json(&request).await?;
        Ok(raw.validated())
    }
}

/// The stage-2 contract: never fails.
///
/// Confidence gating happens in the pipeline, so the raw match (including a
/// low-confidence URL) is returned as-is.
#[derive(Clone)]
pub struct VideoResolver {
    upstream: Arc<dyn VideoSearcher>,
}

impl VideoResolver {
    pub fn new(upstream: Arc<dyn VideoSearcher>) -> Self {
        Self { upstream }
    }

    pub async fn find_video(&self, title: &str, artist: &str) -> VideoMatch {
        let (Some(title), Some(artist)) = (non_empty(Some(title)), non_empty(Some(artist))) else {
            return VideoMatch::none();
        };

        match self.upstream.search(&title, &artist).await {
            Ok(found) => {
                let found = found.validated();
                VideoMatch {
                    url: found.youtube_url,
                    display_title: found.youtube_title,
                    confidence: found.confidence,
                }
            }
            Err(e) => {
                log_warning_indent(format!("Video search failed for {} - {}: {}", artist, title, e), 1);
                VideoMatch::none()
            }
        }
    }
}
