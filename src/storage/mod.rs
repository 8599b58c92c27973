//! Persisted state: the configured feed list, the item archive, and the
//! per-run metadata record.

mod snapshot;

pub use snapshot::{
    load_archive, load_feed_list, write_snapshot, RunMetadata, StorageError, ITEMS_FILE,
    METADATA_FILE,
};
