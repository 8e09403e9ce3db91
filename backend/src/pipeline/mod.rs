//! Enrichment pipeline.
//!
//! One query runs through three stages:
//!
//! 1. curated matches plus sample identification (awaited), merged, then the
//!    result list is published once
//! 2. one video lookup per entity (main track and its sample), spawned
//! 3. one metadata lookup per distinct [`TrackKey`] not already known, spawned
//!
//! Stages 2 and 3 patch the [`ResultStore`] as they complete, in any order.
//! Starting another query bumps the generation, which turns every late patch
//! from the previous query into a no-op.

pub mod store;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use crate::api::logs::{log_info, log_info_indent, log_warning};
use crate::cache::Coalescer;
use crate::catalog::MetadataLookup;
use crate::config::PipelineConfig;
use crate::curated::sampled;
use crate::error::InputError;
use crate::models::{Query, ResultEntry, TrackKey, VideoMatch};
use crate::resolver::{SampleResolver, VideoResolver};

pub use store::{EntityKey, Generation, Phase, ResultStore, Role, Snapshot};

/// Memo of video answers; each pair is searched at most once per memo.
///
/// A pipeline owns one by default. Pipelines built with
/// [`Pipeline::with_video_memo`] share it, so the server keeps one across
/// requests.
#[derive(Default)]
pub struct VideoMemo {
    done: Mutex<HashMap<TrackKey, VideoMatch>>,
    in_flight: Coalescer<TrackKey, VideoMatch>,
}

impl VideoMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    async fn find(&self, resolver: &VideoResolver, title: String, artist: String) -> VideoMatch {
        let key = TrackKey::new(&title, &artist);
        let hit = self.lock().get(&key).cloned();
        if let Some(hit) = hit {
            return hit;
        }

        let resolver = resolver.clone();
        let found = self
            .in_flight
            .run(key.clone(), move || async move { resolver.find_video(&title, &artist).await })
            .await;
        self.lock().insert(key, found.clone());
        found
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<TrackKey, VideoMatch>> {
        self.done.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Clone)]
pub struct Pipeline {
    samples: SampleResolver,
    videos: VideoResolver,
    metadata: Arc<dyn MetadataLookup>,
    store: Arc<ResultStore>,
    video_memo: Arc<VideoMemo>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        samples: SampleResolver,
        videos: VideoResolver,
        metadata: Arc<dyn MetadataLookup>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            samples,
            videos,
            metadata,
            store: Arc::new(ResultStore::new(config.genre_cap)),
            video_memo: Arc::new(VideoMemo::default()),
            config,
        }
    }

    /// Share `memo` with other pipelines instead of keeping a private one.
    pub fn with_video_memo(mut self, memo: Arc<VideoMemo>) -> Self {
        self.video_memo = memo;
        self
    }

    pub fn store(&self) -> &Arc<ResultStore> {
        &self.store
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<Snapshot> {
        self.store.subscribe()
    }

    /// Run stage 1 for `raw` and start stages 2 and 3 in the background.
    ///
    /// Only input errors are returned; upstream failures surface as an empty
    /// or partial result list.
    pub async fn search(&self, raw: &str) -> Result<Generation, InputError> {
        let query = Query::parse(raw)?;
        let generation = self.store.begin(&query);
        log_info(format!("Searching {:?} (generation {})", query.as_str(), generation));

        let curated = sampled::search(query.as_str());
        if !curated.is_empty() {
            log_info_indent(format!("{} curated match(es)", curated.len()), 1);
        }

        let ident = self.samples.resolve(&query).await;
        let (identified, dropped) = ResultEntry::from_identification(&ident);
        if dropped > 0 {
            log_warning(format!("Dropped {} result(s) without a title and artist", dropped));
        }
        let entries = if curated.is_empty() {
            identified
        } else {
            sampled::merge(&curated, identified)
        };
        if entries.is_empty() {
            log_info(format!("No results for {:?}", query.as_str()));
        }

        let note = ident.note.clone();
        if !self.store.publish(generation, entries.clone(), note) {
            return Ok(generation);
        }
        self.enrich(generation, &entries);
        Ok(generation)
    }

    /// Wait until `generation` settles. `None` if a newer query replaced it.
    pub async fn wait_settled(&self, generation: Generation) -> Option<Snapshot> {
        let mut rx = self.store.subscribe();
        let snapshot = rx
            .wait_for(|snap| snap.generation != generation || snap.is_settled())
            .await
            .ok()?
            .clone();
        (snapshot.generation == generation).then_some(snapshot)
    }

    /// `search` followed by `wait_settled`.
    pub async fn run(&self, raw: &str) -> Result<Option<Snapshot>, InputError> {
        let generation = self.search(raw).await?;
        Ok(self.wait_settled(generation).await)
    }

    fn enrich(&self, generation: Generation, entries: &[ResultEntry]) {
        let known = self.store.snapshot().metadata;

        let mut video_jobs = Vec::new();
        let mut metadata_jobs: BTreeMap<TrackKey, (String, String)> = BTreeMap::new();

        for (index, entry) in entries.iter().enumerate() {
            video_jobs.push((EntityKey::main(index), entry.title.clone(), entry.artist.clone()));
            metadata_jobs
                .entry(entry.key())
                .or_insert_with(|| (entry.title.clone(), entry.artist.clone()));

            if let Some(sample) = &entry.sample {
                if let Some(artist) = sample.artist.as_ref() {
                    if sample.needs_video_lookup {
                        video_jobs.push((EntityKey::sample(index), sample.title.clone(), artist.clone()));
                    }
                    metadata_jobs
                        .entry(TrackKey::new(&sample.title, artist))
                        .or_insert_with(|| (sample.title.clone(), artist.clone()));
                }
            }
        }
        metadata_jobs.retain(|key, _| !known.contains_key(key));

        let video_keys: BTreeSet<EntityKey> = video_jobs.iter().map(|(key, _, _)| *key).collect();
        let metadata_keys: BTreeSet<TrackKey> = metadata_jobs.keys().cloned().collect();
        log_info_indent(
            format!(
                "Enriching {} video and {} metadata lookup(s)",
                video_keys.len(),
                metadata_keys.len()
            ),
            1,
        );
        if !self.store.begin_enrichment(generation, video_keys, metadata_keys) {
            return;
        }

        for (key, title, artist) in video_jobs {
            let store = self.store.clone();
            let memo = self.video_memo.clone();
            let videos = self.videos.clone();
            let threshold = self.config.video_threshold;
            tokio::spawn(async move {
                let found = memo.find(&videos, title, artist).await;
                store.apply_video(generation, key, &found, threshold);
            });
        }

        for (key, (title, artist)) in metadata_jobs {
            let store = self.store.clone();
            let metadata = self.metadata.clone();
            tokio::spawn(async move {
                let record = metadata.lookup(&title, &artist).await;
                store.apply_metadata(generation, &key, record);
            });
        }
    }
}
