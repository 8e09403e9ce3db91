//! Result store shared by the pipeline and its subscribers.
//!
//! The current [`Snapshot`] lives in a `watch` channel. Every change is a
//! pure function from the latest snapshot to the next one, tagged with the
//! generation it belongs to; a patch for any other generation is dropped.
//! Entry lists and the metadata map sit behind `Arc` and are replaced
//! wholesale, so a snapshot a subscriber already holds never changes.

use serde::{Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::api::logs::{log_success, log_warning};
use crate::curated::sampled::{self, SampledTrack};
use crate::models::{GenrePool, MetadataRecord, Query, ResultEntry, TrackKey, VideoMatch};

/// Per-query token; late callbacks carrying an older one are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Resolving,
    Published,
    Enriching,
    Settled,
}

/// Which half of an entry a video lookup fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Main,
    Sample,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EntityKey {
    pub index: usize,
    pub role: Role,
}

impl EntityKey {
    pub fn main(index: usize) -> Self {
        Self {
            index,
            role: Role::Main,
        }
    }

    pub fn sample(index: usize) -> Self {
        Self {
            index,
            role: Role::Sample,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub generation: Generation,
    pub phase: Phase,
    pub query: Option<String>,
    pub entries: Arc<Vec<ResultEntry>>,
    pub video_loading: BTreeSet<EntityKey>,
    pub metadata_loading: BTreeSet<TrackKey>,
    /// Session-wide; survives new queries.
    #[serde(serialize_with = "serialize_metadata")]
    pub metadata: Arc<HashMap<TrackKey, MetadataRecord>>,
    /// Session-wide; survives new queries.
    pub genres: GenrePool,
    /// Curated suggestions from the genres of the current entries.
    pub discovery: Arc<Vec<SampledTrack>>,
    pub note: Option<String>,
}

impl Snapshot {
    fn empty(genre_cap: usize) -> Self {
        Self {
            generation: Generation::default(),
            phase: Phase::Idle,
            query: None,
            entries: Arc::new(Vec::new()),
            video_loading: BTreeSet::new(),
            metadata_loading: BTreeSet::new(),
            metadata: Arc::new(HashMap::new()),
            genres: GenrePool::new(genre_cap),
            discovery: Arc::new(Vec::new()),
            note: None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.phase == Phase::Settled
    }

    pub fn metadata_for(&self, title: &str, artist: &str) -> Option<&MetadataRecord> {
        self.metadata.get(&TrackKey::new(title, artist))
    }

    /// Move to `Settled` once nothing is loading.
    fn settle(&mut self) {
        if self.phase == Phase::Enriching && self.video_loading.is_empty() && self.metadata_loading.is_empty() {
            self.phase = Phase::Settled;
        }
    }
}

#[derive(Serialize)]
struct MetadataItem<'a> {
    key: &'a TrackKey,
    record: &'a MetadataRecord,
}

fn serialize_metadata<S>(map: &Arc<HashMap<TrackKey, MetadataRecord>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut items: Vec<MetadataItem<'_>> = map.iter().map(|(key, record)| MetadataItem { key, record }).collect();
    items.sort_by(|a, b| a.key.cmp(b.key));
    serializer.collect_seq(items)
}

/// Copy known years from the metadata map into entries that lack one.
fn fill_years(entries: &mut [ResultEntry], metadata: &HashMap<TrackKey, MetadataRecord>) {
    for entry in entries.iter_mut() {
        if entry.year.is_none() {
            entry.year = metadata.get(&entry.key()).and_then(|r| r.year.clone());
        }
        if let Some(sample) = entry.sample.as_mut() {
            if sample.year.is_none() {
                sample.year = sample
                    .key()
                    .and_then(|key| metadata.get(&key))
                    .and_then(|r| r.year.clone());
            }
        }
    }
}

pub struct ResultStore {
    tx: watch::Sender<Snapshot>,
    next_generation: AtomicU64,
}

impl ResultStore {
    pub fn new(genre_cap: usize) -> Self {
        let (tx, _) = watch::channel(Snapshot::empty(genre_cap));
        Self {
            tx,
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.tx.borrow().clone()
    }

    pub fn generation(&self) -> Generation {
        self.tx.borrow().generation
    }

    /// Start a new query. The previous entries stay visible until publish;
    /// its pending lookups are forgotten.
    pub fn begin(&self, query: &Query) -> Generation {
        let generation = Generation(self.next_generation.fetch_add(1, Ordering::SeqCst));
        self.tx.send_modify(|snap| {
            snap.generation = generation;
            snap.phase = Phase::Resolving;
            snap.query = Some(query.as_str().to_string());
            snap.video_loading = BTreeSet::new();
            snap.metadata_loading = BTreeSet::new();
        });
        generation
    }

    /// Apply `patch` if `generation` is still current. Returns whether the
    /// snapshot changed.
    pub fn apply<F>(&self, generation: Generation, patch: F) -> bool
    where
        F: FnOnce(&Snapshot) -> Option<Snapshot>,
    {
        let mut current = None;
        let changed = self.tx.send_if_modified(|snap| {
            if snap.generation != generation {
                current = Some(snap.generation);
                return false;
            }
            match patch(snap) {
                Some(mut next) => {
                    next.settle();
                    *snap = next;
                    true
                }
                None => false,
            }
        });

        if let Some(current) = current {
            log_warning(format!(
                "Discarded stale update from generation {} (current {})",
                generation, current
            ));
        } else if changed && self.tx.borrow().is_settled() {
            log_success(format!("Generation {} settled", generation));
        }
        changed
    }

    /// Replace the result list with stage-1 output.
    pub fn publish(&self, generation: Generation, entries: Vec<ResultEntry>, note: Option<String>) -> bool {
        self.apply(generation, move |snap| {
            let mut entries = entries;
            fill_years(&mut entries, &snap.metadata);
            let discovery = sampled::discovery(&entries, &snap.metadata);
            Some(Snapshot {
                phase: Phase::Published,
                entries: Arc::new(entries),
                discovery: Arc::new(discovery),
                video_loading: BTreeSet::new(),
                metadata_loading: BTreeSet::new(),
                note,
                ..snap.clone()
            })
        })
    }

    /// Record the lookups about to start.
    pub fn begin_enrichment(
        &self,
        generation: Generation,
        video: BTreeSet<EntityKey>,
        metadata: BTreeSet<TrackKey>,
    ) -> bool {
        self.apply(generation, move |snap| {
            (snap.phase == Phase::Published).then(|| Snapshot {
                phase: Phase::Enriching,
                video_loading: video,
                metadata_loading: metadata,
                ..snap.clone()
            })
        })
    }

    /// Stage-2 completion for one entity. The URL is copied only when the
    /// match clears `threshold`; the loading flag is cleared either way.
    pub fn apply_video(&self, generation: Generation, key: EntityKey, found: &VideoMatch, threshold: f64) -> bool {
        self.apply(generation, |snap| {
            if !snap.video_loading.contains(&key) {
                return None;
            }
            let mut entries = (*snap.entries).clone();
            let entry = entries.get_mut(key.index)?;
            let accepted = found.accepted(threshold).map(str::to_string);

            match key.role {
                Role::Main => {
                    entry.needs_video_lookup = false;
                    if accepted.is_some() {
                        entry.video_url = accepted;
                        entry.video_title = found.display_title.clone();
                        entry.video_confidence = Some(found.confidence);
                    }
                }
                Role::Sample => {
                    let sample = entry.sample.as_mut()?;
                    sample.needs_video_lookup = false;
                    if accepted.is_some() {
                        sample.video_url = accepted;
                        sample.video_title = found.display_title.clone();
                        sample.video_confidence = Some(found.confidence);
                    }
                }
            }

            let mut video_loading = snap.video_loading.clone();
            video_loading.remove(&key);
            Some(Snapshot {
                entries: Arc::new(entries),
                video_loading,
                ..snap.clone()
            })
        })
    }

    /// Stage-3 completion for one key. A missing record only clears the
    /// loading flag.
    pub fn apply_metadata(&self, generation: Generation, key: &TrackKey, record: Option<MetadataRecord>) -> bool {
        self.apply(generation, |snap| {
            if !snap.metadata_loading.contains(key) {
                return None;
            }
            let mut next = snap.clone();
            next.metadata_loading.remove(key);

            if let Some(record) = record {
                next.genres.extend(&record.genres);
                let mut metadata = (*snap.metadata).clone();
                metadata.insert(key.clone(), record);

                let mut entries = (*snap.entries).clone();
                fill_years(&mut entries, &metadata);
                next.discovery = Arc::new(sampled::discovery(&entries, &metadata));
                next.entries = Arc::new(entries);
                next.metadata = Arc::new(metadata);
            }
            Some(next)
        })
    }
}
