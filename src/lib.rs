//! Incremental RSS/Atom feed aggregation.
//!
//! `feedfold` fetches a configured list of syndication feeds, normalizes
//! their entries into a single item model, and folds anything new into a
//! persisted JSON archive. Runs are incremental: items already present in
//! the archive (by derived identity) are left untouched, so repeated runs
//! accumulate history without duplicating it.
//!
//! The pipeline, leaves first:
//!
//! - [`feed`] - fetching (redirects, timeout, size cap) and dialect-tolerant
//!   RSS/Atom parsing
//! - [`ingest`] - the orchestration loop and the archive accumulator
//! - [`storage`] - feed list, item archive, and run metadata on disk
//! - [`config`] - optional TOML configuration
//! - [`util`] - text sanitization and URL validation helpers

pub mod config;
pub mod feed;
pub mod ingest;
pub mod storage;
pub mod util;
