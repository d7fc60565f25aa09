//! In-memory media catalog: the list of playable entries a `player`
//! walks through, and the `list`/`filter`/`append`/`remove`/`setinfo`
//! operations the JSON-RPC surface exposes over it.

mod error;

pub use error::MediaError;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaEntry {
    pub id: String,
    pub uri: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: Option<u64>,
    pub extra: HashMap<String, String>,
}

impl MediaEntry {
    pub fn new(id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
            title: None,
            artist: None,
            album: None,
            duration_ms: None,
            extra: HashMap::new(),
        }
    }
}

/// Partial update applied by the `setinfo` RPC method: only fields that
/// are `Some` are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaEntryPatch {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: Option<u64>,
    pub extra: Option<HashMap<String, String>>,
}

/// Contract the player holds the catalog behind, so alternate backings
/// (a persistent queue, a remote playlist service) can stand in without
/// touching player/rpc code.
pub trait MediaCatalog: Send + Sync {
    fn append(&self, entry: MediaEntry) -> Result<(), MediaError>;
    fn remove(&self, id: &str) -> Result<MediaEntry, MediaError>;
    fn get(&self, id: &str) -> Option<MediaEntry>;
    fn set_info(&self, id: &str, patch: MediaEntryPatch) -> Result<MediaEntry, MediaError>;
    fn list(&self) -> Vec<MediaEntry>;
    fn filter(&self, predicate: &dyn Fn(&MediaEntry) -> bool) -> Vec<MediaEntry>;
    fn next_after(&self, id: &str) -> Option<MediaEntry>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Core {
    entries: VecDeque<Arc<MediaEntry>>,
    max_size: Option<usize>,
}

impl Core {
    fn evict_if_needed(&mut self) {
        if let Some(max) = self.max_size {
            while self.entries.len() > max {
                self.entries.pop_front();
            }
        }
    }
}

/// Simple FIFO catalog backed by a `VecDeque`, with an optional capacity
/// that evicts the oldest entry once exceeded.
pub struct MemoryCatalog {
    core: RwLock<Core>,
}

impl MemoryCatalog {
    pub fn new(max_size: Option<usize>) -> Self {
        Self {
            core: RwLock::new(Core {
                entries: VecDeque::new(),
                max_size,
            }),
        }
    }

    pub fn set_capacity(&self, max_size: Option<usize>) {
        let mut core = self.core.write().unwrap();
        core.max_size = max_size;
        core.evict_if_needed();
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MediaCatalog for MemoryCatalog {
    fn append(&self, entry: MediaEntry) -> Result<(), MediaError> {
        let mut core = self.core.write().unwrap();
        if core.entries.iter().any(|e| e.id == entry.id) {
            return Err(MediaError::AlreadyExists(entry.id));
        }
        core.entries.push_back(Arc::new(entry));
        core.evict_if_needed();
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<MediaEntry, MediaError> {
        let mut core = self.core.write().unwrap();
        let idx = core
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| MediaError::NotFound(id.to_string()))?;
        let removed = core.entries.remove(idx).unwrap();
        Ok((*removed).clone())
    }

    fn get(&self, id: &str) -> Option<MediaEntry> {
        let core = self.core.read().unwrap();
        core.entries.iter().find(|e| e.id == id).map(|e| (**e).clone())
    }

    fn set_info(&self, id: &str, patch: MediaEntryPatch) -> Result<MediaEntry, MediaError> {
        let mut core = self.core.write().unwrap();
        let idx = core
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| MediaError::NotFound(id.to_string()))?;
        let mut updated = (*core.entries[idx]).clone();
        if let Some(title) = patch.title {
            updated.title = Some(title);
        }
        if let Some(artist) = patch.artist {
            updated.artist = Some(artist);
        }
        if let Some(album) = patch.album {
            updated.album = Some(album);
        }
        if let Some(duration_ms) = patch.duration_ms {
            updated.duration_ms = Some(duration_ms);
        }
        if let Some(extra) = patch.extra {
            updated.extra.extend(extra);
        }
        core.entries[idx] = Arc::new(updated.clone());
        Ok(updated)
    }

    fn list(&self) -> Vec<MediaEntry> {
        let core = self.core.read().unwrap();
        core.entries.iter().map(|e| (**e).clone()).collect()
    }

    fn filter(&self, predicate: &dyn Fn(&MediaEntry) -> bool) -> Vec<MediaEntry> {
        let core = self.core.read().unwrap();
        core.entries
            .iter()
            .filter(|e| predicate(e))
            .map(|e| (**e).clone())
            .collect()
    }

    fn next_after(&self, id: &str) -> Option<MediaEntry> {
        let core = self.core.read().unwrap();
        let idx = core.entries.iter().position(|e| e.id == id)?;
        core.entries.get(idx + 1).map(|e| (**e).clone())
    }

    fn len(&self) -> usize {
        self.core.read().unwrap().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> MediaEntry {
        MediaEntry::new(id, format!("file:///{id}.flac"))
    }

    #[test]
    fn append_then_list_preserves_order() {
        let cat = MemoryCatalog::default();
        cat.append(entry("a")).unwrap();
        cat.append(entry("b")).unwrap();
        let ids: Vec<_> = cat.list().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn duplicate_append_is_rejected() {
        let cat = MemoryCatalog::default();
        cat.append(entry("a")).unwrap();
        assert!(matches!(cat.append(entry("a")), Err(MediaError::AlreadyExists(_))));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let cat = MemoryCatalog::new(Some(2));
        cat.append(entry("a")).unwrap();
        cat.append(entry("b")).unwrap();
        cat.append(entry("c")).unwrap();
        let ids: Vec<_> = cat.list().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn set_info_patches_only_given_fields() {
        let cat = MemoryCatalog::default();
        cat.append(entry("a")).unwrap();
        let updated = cat
            .set_info(
                "a",
                MediaEntryPatch {
                    title: Some("Title".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.title.as_deref(), Some("Title"));
        assert_eq!(updated.uri, "file:///a.flac");
    }

    #[test]
    fn next_after_walks_the_queue() {
        let cat = MemoryCatalog::default();
        cat.append(entry("a")).unwrap();
        cat.append(entry("b")).unwrap();
        assert_eq!(cat.next_after("a").unwrap().id, "b");
        assert!(cat.next_after("b").is_none());
    }

    #[test]
    fn remove_missing_entry_errors() {
        let cat = MemoryCatalog::default();
        assert!(matches!(cat.remove("missing"), Err(MediaError::NotFound(_))));
    }
}
