//! Curated home-page lists of tracks with well-known samples.

pub mod sampled;

use serde::Serialize;

pub use sampled::SampledTrack;

/// Default number of items returned by a list endpoint.
pub const DEFAULT_LIMIT: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomeList {
    /// Popular tracks people search for right now.
    Now,
    /// Classics and deep cuts.
    Discover,
}

impl HomeList {
    pub fn tracks(self) -> &'static [CuratedTrack] {
        match self {
            HomeList::Now => NOW,
            HomeList::Discover => DISCOVER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CuratedTrack {
    pub id: &'static str,
    pub title: &'static str,
    pub artist: &'static str,
    pub year: u16,
    pub album: &'static str,
    pub sample_source: &'static str,
    pub has_sample: bool,
    pub verified_sample: bool,
    pub confidence: f64,
    pub sample_note: &'static str,
}

impl CuratedTrack {
    /// Whether the sample is documented well enough for a samples-only list.
    pub fn is_verified(&self, threshold: f64) -> bool {
        !self.sample_source.trim().is_empty()
            && (self.has_sample || self.verified_sample)
            && self.confidence >= threshold
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HomeTracks {
    pub tracks: Vec<CuratedTrack>,
    pub total: usize,
    pub samples_only: bool,
}

/// First `limit` items of `list`, optionally restricted to verified samples.
pub fn home_tracks(list: HomeList, limit: Option<usize>, samples_only: bool, threshold: f64) -> HomeTracks {
    let limit = limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT);
    let tracks: Vec<CuratedTrack> = list
        .tracks()
        .iter()
        .filter(|t| !samples_only || t.is_verified(threshold))
        .take(limit)
        .copied()
        .collect();

    HomeTracks {
        total: tracks.len(),
        tracks,
        samples_only,
    }
}

macro_rules! track {
    ($id:literal, $title:literal, $artist:literal, $year:literal, $album:literal, $source:literal, $confidence:literal, $note:literal) => {
        CuratedTrack {
            id: $id,
            title: $title,
            artist: $artist,
            year: $year,
            album: $album,
            sample_source: $source,
            has_sample: true,
            verified_sample: true,
            confidence: $confidence,
            sample_note: $note,
        }
    };
}

static NOW: &[CuratedTrack] = &[
    track!("first-class-harlow", "First Class", "Jack Harlow", 2022, "Come Home the Kids Miss You",
        "Fergie - Glamorous", 0.95, "Interpolates the main hook and melody from Fergie's \"Glamorous\""),
    track!("stronger-kanye", "Stronger", "Kanye West", 2007, "Graduation",
        "Daft Punk - Harder, Better, Faster, Stronger", 1.0, "Heavily samples the main vocal hook and electronic elements"),
    track!("juicy-biggie", "Juicy", "The Notorious B.I.G.", 1994, "Ready to Die",
        "Mtume - Juicy Fruit", 1.0, "Samples the main bassline and instrumental from Mtume's \"Juicy Fruit\""),
    track!("through-the-wire-kanye", "Through the Wire", "Kanye West", 2003, "The College Dropout",
        "Chaka Khan - Through the Fire", 1.0, "Samples Chaka Khan's vocal melody and chord progression"),
    track!("good-times-chic", "Rapper's Delight", "Sugarhill Gang", 1979, "Sugarhill Gang",
        "Chic - Good Times", 1.0, "One of the first hip-hop tracks to sample, uses Chic's bassline"),
    track!("mo-money-problems-biggie", "Mo Money Mo Problems", "The Notorious B.I.G.", 1997, "Life After Death",
        "Diana Ross - I'm Coming Out", 1.0, "Samples the main hook and disco elements from Diana Ross"),
    track!("stan-eminem", "Stan", "Eminem", 2000, "The Marshall Mathers LP",
        "Dido - Thank You", 1.0, "Uses Dido's chorus as the main hook throughout the song"),
    track!("good-4-u-olivia", "good 4 u", "Olivia Rodrigo", 2021, "SOUR",
        "Paramore - Misery Business", 0.95, "Interpolates the chord progression and melody from Paramore's \"Misery Business\""),
    track!("hotline-bling-drake", "Hotline Bling", "Drake", 2015, "Views",
        "Timmy Thomas - Why Can't We Live Together", 1.0, "Heavily samples the main melody and rhythm from Timmy Thomas' classic"),
    track!("as-it-was-harry", "As It Was", "Harry Styles", 2022, "Harry's House",
        "The Temptations - My Girl", 0.85, "Contains interpolated elements from The Temptations' classic"),
    track!("cant-tell-me-nothing-kanye", "Can't Tell Me Nothing", "Kanye West", 2007, "Graduation",
        "Connie Mitchell - Can't Tell Me Nothing", 0.9, "Built around a vocal sample and additional production elements"),
];

static DISCOVER: &[CuratedTrack] = &[
    track!("one-more-time-daft-punk", "One More Time", "Daft Punk", 2000, "Discovery",
        "Eddie Johns - More Spell on You", 0.95, "Samples the vocal melody and transforms it with vocoder effects"),
    track!("around-the-world-daft-punk", "Around the World", "Daft Punk", 1997, "Homework",
        "Barry White - I'm Gonna Love You Just a Little More Baby", 0.9, "Uses elements from Barry White's orchestral arrangement"),
    track!("california-love-tupac", "California Love", "2Pac", 1995, "All Eyez on Me",
        "Joe Cocker - Woman to Woman", 1.0, "Samples the main piano riff and vocal elements"),
    track!("nuthin-but-g-thang-dre", "Nuthin' but a 'G' Thang", "Dr. Dre", 1992, "The Chronic",
        "Leon Haywood - I Want'a Do Something Freaky to You", 1.0, "Built around Leon Haywood's funk bassline and rhythm"),
    track!("passin-me-by-pharcyde", "Passin' Me By", "The Pharcyde", 1992, "Bizarre Ride II The Pharcyde",
        "Quincy Jones - Summer in the City", 0.95, "Samples the jazz-funk instrumental and vocal snippets"),
    track!("they-reminisce-pete-rock", "They Reminisce Over You (T.R.O.Y.)", "Pete Rock & CL Smooth", 1992, "Mecca and the Soul Brother",
        "Tom Scott & The L.A. Express - Today", 1.0, "Classic jazz-hip hop fusion using Tom Scott's saxophone melody"),
    track!("93-til-infinity-souls", "93 'til Infinity", "Souls of Mischief", 1993, "93 'til Infinity",
        "Billy Cobham - Heather", 0.95, "Uses Billy Cobham's jazz-fusion drums and melody"),
    track!("mass-appeal-gang-starr", "Mass Appeal", "Gang Starr", 1994, "Hard to Earn",
        "Vic Juris - Horizon Drive", 0.9, "Samples the guitar melody and jazz elements"),
    track!("award-tour-tribe", "Award Tour", "A Tribe Called Quest", 1993, "Midnight Marauders",
        "Weldon Irvine - We Gettin' Down", 0.95, "Built around Weldon Irvine's funk groove and bass"),
];
