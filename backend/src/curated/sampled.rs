//! Hand-picked tracks with a well-documented primary sample, grouped by genre.
//!
//! The table backs two things: stage 1 answers from it before asking the
//! model, and the discovery list suggests tracks from the genres the current
//! results belong to.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::models::{MetadataRecord, ResultEntry, SampleRelation, TrackKey};

/// Most tracks a discovery list holds.
pub const DISCOVERY_LIMIT: usize = 12;

/// Below this many genre matches the list is topped up from [`FALLBACK`].
pub const DISCOVERY_MIN: usize = 6;

/// Priority given to a model answer that names a sample.
pub const MODEL_PRIORITY_WITH_SAMPLE: u8 = 5;
pub const MODEL_PRIORITY: u8 = 1;

/// Genres used when none of the current results has any.
const DEFAULT_GENRES: [&str; 2] = ["hip hop", "rap"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampledTrack {
    pub title: &'static str,
    pub artist: &'static str,
    pub genre: &'static str,
    /// Recognition score, 10 is best.
    pub priority: u8,
    /// `"Artist - Title"` of the sampled record.
    pub sample_source: &'static str,
}

impl SampledTrack {
    pub fn key(&self) -> TrackKey {
        TrackKey::new(self.title, self.artist)
    }

    /// `(title, artist)` of the sampled record.
    pub fn sample(&self) -> (&'static str, Option<&'static str>) {
        match self.sample_source.split_once(" - ") {
            Some((artist, title)) => (title, Some(artist)),
            None => (self.sample_source, None),
        }
    }

    /// Result row for this track, with both halves waiting on a video.
    pub fn to_entry(&self) -> ResultEntry {
        let (title, artist) = self.sample();
        ResultEntry {
            title: self.title.to_string(),
            artist: self.artist.to_string(),
            year: None,
            video_url: None,
            video_title: None,
            video_confidence: None,
            sample: Some(SampleRelation {
                title: title.to_string(),
                artist: artist.map(str::to_string),
                confidence: 1.0,
                note: None,
                year: None,
                video_url: None,
                video_title: None,
                video_confidence: None,
                needs_video_lookup: artist.is_some(),
            }),
            source_confidence: 1.0,
            needs_video_lookup: true,
            note: None,
        }
    }
}

/// Tracks whose title or artist contains `query`, case-insensitively.
///
/// Ordered by priority, highest first; within a priority an exact title
/// match comes first, otherwise table order is kept.
pub fn search(query: &str) -> Vec<&'static SampledTrack> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut found: Vec<&'static SampledTrack> = SAMPLED
        .iter()
        .filter(|t| t.title.to_lowercase().contains(&needle) || t.artist.to_lowercase().contains(&needle))
        .collect();
    found.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| (b.title.to_lowercase() == needle).cmp(&(a.title.to_lowercase() == needle)))
    });
    found
}

/// Curated entries first, then model entries that are not already listed.
///
/// The merged list is stably reordered so entries with a sample come first,
/// then by priority. Model entries rank [`MODEL_PRIORITY_WITH_SAMPLE`] or
/// [`MODEL_PRIORITY`].
pub fn merge(curated: &[&SampledTrack], model: Vec<ResultEntry>) -> Vec<ResultEntry> {
    let mut ranked: Vec<(u8, ResultEntry)> = curated.iter().map(|t| (t.priority, t.to_entry())).collect();
    let listed: HashSet<TrackKey> = curated.iter().map(|t| t.key()).collect();

    for entry in model {
        if listed.contains(&entry.key()) {
            continue;
        }
        let priority = if entry.sample.is_some() {
            MODEL_PRIORITY_WITH_SAMPLE
        } else {
            MODEL_PRIORITY
        };
        ranked.push((priority, entry));
    }

    ranked.sort_by(|(pa, a), (pb, b)| b.sample.is_some().cmp(&a.sample.is_some()).then_with(|| pb.cmp(pa)));
    ranked.into_iter().map(|(_, entry)| entry).collect()
}

/// Suggestions drawn from the genres of the current results.
///
/// A curated genre matches when a result genre contains it as whole words,
/// so `"west coast hip hop"` selects `"hip hop"`. Tracks already on screen
/// and artists already used are skipped, one track per artist. With fewer
/// than [`DISCOVERY_MIN`] matches the list is topped up from [`FALLBACK`].
pub fn discovery(entries: &[ResultEntry], metadata: &HashMap<TrackKey, MetadataRecord>) -> Vec<SampledTrack> {
    if entries.is_empty() {
        return Vec::new();
    }

    let mut genres: BTreeSet<String> = entries
        .iter()
        .filter_map(|e| metadata.get(&e.key()))
        .flat_map(|r| r.genres.iter())
        .map(|g| g.trim().to_lowercase())
        .filter(|g| !g.is_empty())
        .collect();
    if genres.is_empty() {
        genres.extend(DEFAULT_GENRES.iter().map(|g| g.to_string()));
    }

    let mut used_tracks: HashSet<TrackKey> = entries.iter().map(ResultEntry::key).collect();
    let mut used_artists: HashSet<String> = entries.iter().map(|e| e.artist.trim().to_lowercase()).collect();
    let mut take = |track: &SampledTrack| {
        let artist = track.artist.to_lowercase();
        if used_tracks.contains(&track.key()) || used_artists.contains(&artist) {
            return false;
        }
        used_tracks.insert(track.key());
        used_artists.insert(artist);
        true
    };

    let mut picked: Vec<SampledTrack> = SAMPLED
        .iter()
        .filter(|t| genres.iter().any(|g| genre_matches(g, t.genre)))
        .filter(|t| take(*t))
        .copied()
        .collect();
    picked.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.artist.cmp(b.artist)));
    picked.truncate(DISCOVERY_LIMIT);

    if picked.len() < DISCOVERY_MIN {
        let mut fallback: Vec<&SampledTrack> = FALLBACK
            .iter()
            .filter_map(|title| SAMPLED.iter().find(|t| t.title == *title))
            .collect();
        fallback.sort_by(|a, b| b.priority.cmp(&a.priority));
        for track in fallback {
            if picked.len() >= DISCOVERY_LIMIT {
                break;
            }
            if take(track) {
                picked.push(*track);
            }
        }
    }
    picked
}

fn genre_matches(result_genre: &str, curated: &str) -> bool {
    format!(" {} ", result_genre).contains(&format!(" {} ", curated))
}

macro_rules! sampled {
    ($genre:literal, $title:literal, $artist:literal, $priority:literal, $source:literal) => {
        SampledTrack {
            title: $title,
            artist: $artist,
            genre: $genre,
            priority: $priority,
            sample_source: $source,
        }
    };
}

pub static SAMPLED: &[SampledTrack] = &[
    sampled!("hip hop", "Juicy", "The Notorious B.I.G.", 10, "Mtume - Juicy Fruit"),
    sampled!("hip hop", "C.R.E.A.M.", "Wu-Tang Clan", 9, "The Charmels - As Long As I've Got You"),
    sampled!("hip hop", "Rapper's Delight", "Sugarhill Gang", 10, "Chic - Good Times"),
    sampled!("hip hop", "It Was a Good Day", "Ice Cube", 9, "The Isley Brothers - Footsteps in the Dark"),
    sampled!("hip hop", "Nuthin' but a 'G' Thang", "Dr. Dre", 9, "Leon Haywood - I Want'a Do Something Freaky to You"),
    sampled!("hip hop", "Fight the Power", "Public Enemy", 8, "The Isley Brothers - Fight the Power"),
    sampled!("rap", "Stan", "Eminem", 10, "Dido - Thank You"),
    sampled!("rap", "California Love", "2Pac", 10, "Joe Cocker - Woman to Woman"),
    sampled!("rap", "Through the Wire", "Kanye West", 9, "Chaka Khan - Through the Fire"),
    sampled!("rap", "Gold Digger", "Kanye West", 9, "Ray Charles - I Got a Woman"),
    sampled!("rap", "Jesus Walks", "Kanye West", 8, "ARC Choir - Walk with Me"),
    sampled!("rap", "Lose Yourself", "Eminem", 10, "Jeff Bass - Lose Yourself (Instrumental)"),
    sampled!("r&b", "Crazy in Love", "Beyoncé", 10, "The Chi-Lites - Are You My Woman"),
    sampled!("r&b", "Ignition (Remix)", "R. Kelly", 8, "Edge - I Don't Want to Be a Player"),
    sampled!("r&b", "Family Affair", "Mary J. Blige", 9, "Chic - Upside Down"),
    sampled!("pop", "Stronger", "Kanye West", 9, "Daft Punk - Harder Better Faster Stronger"),
    sampled!("pop", "Hung Up", "Madonna", 10, "ABBA - Gimme! Gimme! Gimme!"),
    sampled!("pop", "SOS", "Rihanna", 9, "Soft Cell - Tainted Love"),
    sampled!("pop", "Bitter Sweet Symphony", "The Verve", 8, "The Rolling Stones - The Last Time"),
    sampled!("electronic", "One More Time", "Daft Punk", 10, "Eddie Johns - More Spell on You"),
    sampled!("electronic", "Harder Better Faster Stronger", "Daft Punk", 9, "Edwin Birdsong - Cola Bottle Baby"),
    sampled!("electronic", "Marijuana", "Chrome Sparks", 8, "Idris Muhammad - Could Heaven Ever Be Like This"),
    sampled!("soul", "I Got You (I Feel Good)", "James Brown", 8, "Yvonne Fair - I Found You"),
];

/// Titles offered when the genre matches run short.
static FALLBACK: &[&str] = &[
    "Juicy",
    "Stan",
    "California Love",
    "Crazy in Love",
    "Hung Up",
    "One More Time",
    "SOS",
    "C.R.E.A.M.",
    "Gold Digger",
    "Family Affair",
    "Marijuana",
    "Bitter Sweet Symphony",
];
