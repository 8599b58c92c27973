use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::feed::Item;
use crate::util::validate_feed_url;

/// Archive file name inside the data directory.
pub const ITEMS_FILE: &str = "items.json";
/// Run metadata file name inside the data directory.
pub const METADATA_FILE: &str = "metadata.json";

/// Errors from the snapshot write path.
///
/// Loading is deliberately lenient (missing or unreadable state degrades to
/// empty, see [`load_feed_list`] and [`load_archive`]); only writing can
/// fail the run.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Summary of one ingestion run, fully regenerated every time.
///
/// Serialized camelCase to match the archive layout consumed downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub last_updated: DateTime<Utc>,
    pub total_items: usize,
    pub new_items: usize,
    pub feed_count: usize,
}

/// Loads the configured feed URLs.
///
/// A missing list is the zero-feeds case, not an error: an empty one is
/// created so the file exists for whoever manages it. Unreadable or
/// malformed content likewise degrades to zero feeds with a warning.
/// Entries that fail URL validation are skipped.
pub fn load_feed_list(path: &Path) -> Vec<String> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "No feed list found, creating an empty one");
            if let Err(e) = std::fs::write(path, "[]\n") {
                tracing::warn!(path = %path.display(), error = %e, "Could not create default feed list");
            }
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not read feed list, assuming zero feeds");
            return Vec::new();
        }
    };

    let urls: Vec<String> = match serde_json::from_str(&raw) {
        Ok(urls) => urls,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Feed list is not a JSON array of URL strings, assuming zero feeds"
            );
            return Vec::new();
        }
    };

    urls.into_iter()
        .filter(|url| match validate_feed_url(url) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Skipping invalid feed URL");
                false
            }
        })
        .collect()
}

/// Loads the prior item archive.
///
/// Absent on a first run, so a missing file is simply the empty collection.
/// An unreadable or unparseable archive is also treated as empty (with a
/// warning): it has no recoverable contents, and the run will rewrite it.
pub fn load_archive(path: &Path) -> Vec<Item> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No existing archive, starting empty");
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not read archive, starting empty");
            return Vec::new();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Archive is unreadable, starting empty");
            Vec::new()
        }
    }
}

/// Persists the merged collection and run metadata.
///
/// The single commit point of a run: everything upstream is in-memory, so a
/// failure here means nothing was committed. Each artifact is written
/// atomically (temp file, sync, rename) so readers never observe a partial
/// file; the data directory is created first if needed.
pub fn write_snapshot(
    data_dir: &Path,
    items: &[Item],
    metadata: &RunMetadata,
) -> Result<(), StorageError> {
    std::fs::create_dir_all(data_dir).map_err(|e| StorageError::Write {
        path: data_dir.to_path_buf(),
        source: e,
    })?;

    write_atomic(&data_dir.join(ITEMS_FILE), &serde_json::to_vec_pretty(items)?)?;
    write_atomic(
        &data_dir.join(METADATA_FILE),
        &serde_json::to_vec_pretty(metadata)?,
    )?;

    tracing::info!(
        dir = %data_dir.display(),
        items = items.len(),
        "Snapshot written"
    );
    Ok(())
}

/// Write-to-temp-then-rename. The randomized temp name keeps concurrent
/// stray files from colliding, and `create_new` fails instead of following
/// a pre-planted symlink.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    use std::time::{SystemTime, UNIX_EPOCH};

    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .map_err(|e| StorageError::Write {
            path: temp_path.clone(),
            source: e,
        })?;

    let cleanup = |e: std::io::Error| {
        let _ = std::fs::remove_file(&temp_path);
        StorageError::Write {
            path: path.to_path_buf(),
            source: e,
        }
    };

    file.write_all(bytes).map_err(&cleanup)?;
    // Sync before rename so the rename never publishes an unflushed file
    file.sync_all().map_err(&cleanup)?;
    drop(file);

    std::fs::rename(&temp_path, path).map_err(&cleanup)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("feedfold_storage_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_item(id: &str) -> Item {
        Item {
            id: id.to_string(),
            title: "Title".to_string(),
            link: format!("https://example.com/{id}"),
            description: "desc".to_string(),
            pub_date: Utc.with_ymd_and_hms(2025, 6, 10, 9, 41, 0).unwrap(),
            feed_url: "https://example.com/feed.xml".to_string(),
        }
    }

    #[test]
    fn test_missing_feed_list_created_empty() {
        let dir = test_dir("feeds_missing");
        let path = dir.join("feeds.json");

        let feeds = load_feed_list(&path);
        assert!(feeds.is_empty());
        // The default file now exists and parses as an empty list
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "[]");
        assert!(load_feed_list(&path).is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_feed_list_loaded_in_order() {
        let dir = test_dir("feeds_order");
        let path = dir.join("feeds.json");
        std::fs::write(
            &path,
            r#"["https://a.example.com/rss", "https://b.example.com/atom"]"#,
        )
        .unwrap();

        let feeds = load_feed_list(&path);
        assert_eq!(
            feeds,
            vec![
                "https://a.example.com/rss".to_string(),
                "https://b.example.com/atom".to_string()
            ]
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_feed_list_skips_invalid_urls() {
        let dir = test_dir("feeds_invalid");
        let path = dir.join("feeds.json");
        std::fs::write(
            &path,
            r#"["https://ok.example.com/rss", "file:///etc/passwd", "not a url"]"#,
        )
        .unwrap();

        let feeds = load_feed_list(&path);
        assert_eq!(feeds, vec!["https://ok.example.com/rss".to_string()]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_malformed_feed_list_is_zero_feeds() {
        let dir = test_dir("feeds_malformed");
        let path = dir.join("feeds.json");
        std::fs::write(&path, "{ not json ]").unwrap();

        assert!(load_feed_list(&path).is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_archive_is_empty() {
        let dir = test_dir("archive_missing");
        assert!(load_archive(&dir.join(ITEMS_FILE)).is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_archive_is_empty() {
        let dir = test_dir("archive_corrupt");
        let path = dir.join(ITEMS_FILE);
        std::fs::write(&path, "[{ truncated").unwrap();

        assert!(load_archive(&path).is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = test_dir("round_trip");
        let data_dir = dir.join("data");
        let items = vec![sample_item("a"), sample_item("b")];
        let metadata = RunMetadata {
            last_updated: Utc.with_ymd_and_hms(2025, 6, 10, 10, 0, 0).unwrap(),
            total_items: 2,
            new_items: 2,
            feed_count: 1,
        };

        write_snapshot(&data_dir, &items, &metadata).unwrap();

        let loaded = load_archive(&data_dir.join(ITEMS_FILE));
        assert_eq!(loaded, items);

        let raw = std::fs::read_to_string(data_dir.join(METADATA_FILE)).unwrap();
        let loaded_meta: RunMetadata = serde_json::from_str(&raw).unwrap();
        assert_eq!(loaded_meta, metadata);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_snapshot_creates_data_dir() {
        let dir = test_dir("creates_dir");
        let data_dir = dir.join("nested").join("data");
        let metadata = RunMetadata {
            last_updated: Utc::now(),
            total_items: 0,
            new_items: 0,
            feed_count: 0,
        };

        write_snapshot(&data_dir, &[], &metadata).unwrap();
        assert!(data_dir.join(ITEMS_FILE).exists());
        assert!(data_dir.join(METADATA_FILE).exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_snapshot_overwrites_previous() {
        let dir = test_dir("overwrites");
        let data_dir = dir.join("data");
        let metadata = RunMetadata {
            last_updated: Utc::now(),
            total_items: 1,
            new_items: 1,
            feed_count: 1,
        };

        write_snapshot(&data_dir, &[sample_item("a")], &metadata).unwrap();
        write_snapshot(&data_dir, &[sample_item("a"), sample_item("b")], &metadata).unwrap();

        assert_eq!(load_archive(&data_dir.join(ITEMS_FILE)).len(), 2);
        // No temp files left behind
        let leftovers: Vec<_> = std::fs::read_dir(&data_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("tmp"))
            .collect();
        assert!(leftovers.is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_metadata_serializes_camel_case() {
        let metadata = RunMetadata {
            last_updated: Utc.with_ymd_and_hms(2025, 6, 10, 10, 0, 0).unwrap(),
            total_items: 3,
            new_items: 1,
            feed_count: 2,
        };

        let value = serde_json::to_value(&metadata).unwrap();
        for key in ["lastUpdated", "totalItems", "newItems", "feedCount"] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
    }
}
