//! The ingestion run: fetch every configured feed, fold new items into the
//! archive, write the snapshot.
//!
//! Per-feed failures are contained here: a dead feed contributes zero
//! items and the loop moves on. The only fatal path is the final snapshot
//! write, which is also the run's single commit point.

use std::collections::HashSet;

use chrono::Utc;
use thiserror::Error;

use crate::config::Config;
use crate::feed::{fetch_url, parse_feed, FetchError, FetchOptions, Item};
use crate::storage::{self, RunMetadata, StorageError, ITEMS_FILE};

/// Errors that abort an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The final snapshot write failed; nothing was committed.
    #[error("Failed to persist snapshot: {0}")]
    Persist(#[from] StorageError),
}

/// The running item collection plus its identity index.
///
/// Threaded through the feed loop as an owned value, the only mutable
/// state of a run. Insertion is first-writer-wins on `id`: an item seen
/// again later in the run (or loaded from the prior snapshot) is never
/// replaced, even if its upstream content changed.
#[derive(Debug, Default)]
pub struct Archive {
    items: Vec<Item>,
    known: HashSet<String>,
}

impl Archive {
    /// Builds the accumulator from a previously persisted collection.
    pub fn from_items(items: Vec<Item>) -> Self {
        let known = items.iter().map(|item| item.id.clone()).collect();
        Self { items, known }
    }

    /// Appends the item unless its id is already known.
    /// Returns whether the item was added.
    pub fn insert(&mut self, item: Item) -> bool {
        if self.known.contains(&item.id) {
            return false;
        }
        self.known.insert(item.id.clone());
        self.items.push(item);
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }
}

/// What happened to one configured feed during a run.
#[derive(Debug)]
pub struct FeedOutcome {
    pub url: String,
    /// Entries parsed from the feed, or why the fetch failed.
    pub result: Result<usize, FetchError>,
}

/// The completed run: final metadata plus per-feed diagnostics.
#[derive(Debug)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub outcomes: Vec<FeedOutcome>,
}

/// Runs one ingestion pass.
///
/// Loads the feed list and prior archive (both lenient, see
/// [`crate::storage`]), processes feeds sequentially in configured order,
/// and persists the merged collection and fresh [`RunMetadata`] as the last
/// step.
///
/// # Errors
///
/// Only [`IngestError::Persist`]: per-feed fetch failures are recorded in
/// the report's outcomes, never propagated.
pub async fn run_ingestion(
    config: &Config,
    client: &reqwest::Client,
) -> Result<RunReport, IngestError> {
    let feeds = storage::load_feed_list(&config.feeds_path);
    let prior = storage::load_archive(&config.data_dir.join(ITEMS_FILE));
    let prior_total = prior.len();

    let mut archive = Archive::from_items(prior);
    let options = FetchOptions::from_config(config);

    let mut outcomes = Vec::with_capacity(feeds.len());
    for url in &feeds {
        tracing::info!(feed = %url, "Fetching");
        let result = match fetch_url(client, url, &options).await {
            Ok(body) => {
                let parsed = parse_feed(&body, url);
                let count = parsed.len();
                let mut added = 0;
                for item in parsed {
                    if archive.insert(item) {
                        added += 1;
                    }
                }
                tracing::info!(feed = %url, parsed = count, added = added, "Feed merged");
                Ok(count)
            }
            Err(e) => {
                tracing::warn!(feed = %url, error = %e, "Fetch failed, skipping feed");
                Err(e)
            }
        };
        outcomes.push(FeedOutcome {
            url: url.clone(),
            result,
        });
    }

    let metadata = RunMetadata {
        last_updated: Utc::now(),
        total_items: archive.len(),
        new_items: archive.len() - prior_total,
        feed_count: feeds.len(),
    };
    storage::write_snapshot(&config.data_dir, archive.items(), &metadata)?;

    Ok(RunReport { metadata, outcomes })
}
