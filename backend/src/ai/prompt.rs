//! Prompts and response schemas for the chat-completion upstreams.
//!
//! Both upstreams are asked for strict JSON matching a schema; the schema
//! doubles as the wire shape served by the matching HTTP endpoint.

use serde_json::{json, Value};

/// System prompt for sample identification.
pub const SAMPLE_SYSTEM_PROMPT: &str = r#"You are a cautious music-data assistant; rely ONLY on internal knowledge.

First, normalize and disambiguate query into a canonical {title, artist}:
• Fix common typos; strip quotes/emojis/noise.
• If multiple songs share the title, pick the most famous: prioritize cultural prominence (chart success, streaming ubiquity, critical acclaim, meme/film/TV usage). If still tied, choose the earliest widely known release.

If you are not ≥70% confident about either the resolved song or its main sample, respond with status: "unknown" and use null for uncertain fields.

Give your best-guess official YouTube URL for each track only if you know it; otherwise null.

Never invent song or artist names.

Return JSON only, no prose."#;

/// System prompt for video search.
pub const VIDEO_SYSTEM_PROMPT: &str = r#"You are a YouTube search specialist. Your job is to find the OFFICIAL, ORIGINAL version of a song on YouTube.

SEARCH PRIORITIES (in order):
1. Official music video from the artist's verified channel
2. Official audio from the artist's verified channel
3. Official uploads from the record label's verified channel
4. High-quality uploads with millions of views (but verify artist/title match exactly)

AVOID:
- Karaoke versions
- Cover versions
- Remix versions (unless specifically requested)
- Lyric videos (unless no official video exists)
- Low-quality uploads
- Fan uploads when official versions exist
- Live performances (unless specifically requested)

VERIFICATION STEPS:
1. Check that the YouTube video title contains the exact song title
2. Verify the artist name matches (account for variations like "Jay-Z" vs "JAY-Z")
3. Look for verified channel indicators
4. Prefer videos with higher view counts when quality is equal

Return the best YouTube URL you find, the exact title of the video and your confidence level.

If you cannot find a reliable official version, return null values and explain why in search_strategy_used.

Return JSON only, no prose."#;

/// User message for sample identification.
pub fn sample_user_prompt(query: &str) -> String {
    format!(
        "Given query: \"{}\". Resolve to a specific song (title + artist) and return the main/primary sample in the JSON schema.",
        query
    )
}

/// User message for video search.
pub fn video_user_prompt(title: &str, artist: &str) -> String {
    format!(
        "Find the official YouTube video for: \"{}\" by {}. Search for the original, official version - avoid karaoke, covers, or remixes.",
        title, artist
    )
}

fn nullable_string() -> Value {
    json!({ "type": ["string", "null"] })
}

/// Schema of the sample identification answer.
pub fn sample_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query_song": {
                "type": "object",
                "properties": {
                    "title": { "type": "string" },
                    "artist": nullable_string(),
                    "youtube_url": nullable_string(),
                    "youtube_title": nullable_string()
                },
                "required": ["title", "artist", "youtube_url", "youtube_title"],
                "additionalProperties": false
            },
            "main_sample": {
                "type": "object",
                "properties": {
                    "title": nullable_string(),
                    "artist": nullable_string(),
                    "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
                    "note": nullable_string(),
                    "youtube_url": nullable_string(),
                    "youtube_title": nullable_string()
                },
                "required": ["title", "artist", "confidence", "note", "youtube_url", "youtube_title"],
                "additionalProperties": false
            },
            "status": { "type": "string", "enum": ["ok", "unknown"] }
        },
        "required": ["query_song", "main_sample", "status"],
        "additionalProperties": false
    })
}

/// Schema of the video search answer.
pub fn video_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "youtube_url": nullable_string(),
            "youtube_title": nullable_string(),
            "confidence": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
            "search_strategy_used": { "type": "string" }
        },
        "required": ["youtube_url", "youtube_title", "confidence", "search_strategy_used"],
        "additionalProperties": false
    })
}
