//! The content-addressed asset cache.
//!
//! A JSON index (`asset_cache.json`) maps source identifiers (URL hashes
//! for images, diagram-source hashes for diagrams) to materialized files
//! under `images/` and `diagrams/` subtrees. Entries are never mutated in
//! place, only replaced or dropped; an entry whose file vanished is stale
//! and regenerated on next access. Index writes go through a temp file and
//! an atomic rename, so concurrent writers can never interleave a partial
//! index, and in-process readers share the index behind a mutex.

use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::assets::external::{ImageStore, StoreError};
use crate::assets::{content_key, with_retry};
use crate::errors::Result;

/// One cached asset: where its file lives, what it is, and when it was made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub path: PathBuf,
    /// Image category or diagram type tag.
    pub category: Option<String>,
    pub hash: String,
    pub timestamp: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheIndex {
    images: IndexMap<String, CacheEntry>,
    diagrams: IndexMap<String, CacheEntry>,
    last_updated: u64,
}

/// Process-wide cache of downloaded images and rendered diagrams.
pub struct AssetCache {
    images_dir: PathBuf,
    diagrams_dir: PathBuf,
    index_path: PathBuf,
    index: Mutex<CacheIndex>,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl AssetCache {
    /// Opens (or creates) the cache rooted at `root`. A missing or corrupt
    /// index starts empty rather than failing the run.
    pub fn open(root: &Path) -> Result<Self> {
        let images_dir = root.join("images");
        let diagrams_dir = root.join("diagrams");
        std::fs::create_dir_all(&images_dir)?;
        std::fs::create_dir_all(&diagrams_dir)?;

        let index_path = root.join("asset_cache.json");
        let index = if index_path.exists() {
            match std::fs::read_to_string(&index_path)
                .map_err(|e| e.to_string())
                .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
            {
                Ok(index) => index,
                Err(e) => {
                    warn!("Error loading cache index: {}. Starting a new cache.", e);
                    CacheIndex::default()
                }
            }
        } else {
            info!("Cache index not found at {:?}. Creating new cache.", index_path);
            CacheIndex::default()
        };

        Ok(AssetCache {
            images_dir,
            diagrams_dir,
            index_path,
            index: Mutex::new(index),
        })
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn diagrams_dir(&self) -> &Path {
        &self.diagrams_dir
    }

    /// Looks up a rendered diagram by content hash. Stale entries (file
    /// gone) are dropped so the caller regenerates.
    pub fn lookup_diagram(&self, hash: &str) -> Option<PathBuf> {
        self.lookup(hash, false)
    }

    /// Looks up a downloaded image by URL.
    pub fn lookup_image(&self, url: &str) -> Option<PathBuf> {
        self.lookup(url, true)
    }

    fn lookup(&self, key: &str, images: bool) -> Option<PathBuf> {
        let mut index = self.index.lock().ok()?;
        let group = if images {
            &mut index.images
        } else {
            &mut index.diagrams
        };
        match group.get(key) {
            Some(entry) if entry.path.exists() => Some(entry.path.clone()),
            Some(_) => {
                debug!("Cache entry for {:?} is stale, dropping it", key);
                group.shift_remove(key);
                None
            }
            None => None,
        }
    }

    /// Records a freshly rendered diagram and persists the index.
    pub fn insert_diagram(&self, hash: &str, path: &Path, diagram_type: Option<&str>) -> Result<()> {
        self.insert(hash, path, diagram_type, false)
    }

    /// Records a downloaded image and persists the index.
    pub fn insert_image(&self, url: &str, path: &Path, category: Option<&str>) -> Result<()> {
        self.insert(url, path, category, true)
    }

    fn insert(&self, key: &str, path: &Path, tag: Option<&str>, images: bool) -> Result<()> {
        let entry = CacheEntry {
            path: path.to_path_buf(),
            category: tag.map(str::to_string),
            hash: content_key(key),
            timestamp: now_secs(),
        };
        {
            let mut index = self.index.lock().expect("cache index poisoned");
            let group = if images {
                &mut index.images
            } else {
                &mut index.diagrams
            };
            group.insert(key.to_string(), entry);
        }
        self.save()
    }

    /// Fetches a remote image through the store, materializes it under
    /// `images/`, and records the cache entry. Repeated calls for the same
    /// URL are served from the cache without touching the network.
    pub fn get_image(
        &self,
        url: &str,
        store: &dyn ImageStore,
        backoff_base: Duration,
    ) -> std::result::Result<PathBuf, StoreError> {
        if let Some(path) = self.lookup_image(url) {
            info!("Using cached image for {}", url);
            return Ok(path);
        }

        let bytes = with_retry("image fetch", backoff_base, |_| store.fetch(url))?;

        let ext = Path::new(url)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_else(|| ".jpg".to_string());
        let filename = format!("img_{}{}", content_key(url), ext);
        let path = self.images_dir.join(filename);
        std::fs::write(&path, &bytes)?;

        if let Err(e) = self.insert_image(url, &path, None) {
            warn!("Error saving cache index: {}", e);
        }
        Ok(path)
    }

    /// Drops entries older than `max_age` (or all of them when
    /// `remove_unused` is set), deleting their files. Returns the number of
    /// images and diagrams removed.
    pub fn clean(&self, max_age: Duration, remove_unused: bool) -> (usize, usize) {
        let threshold = now_secs().saturating_sub(max_age.as_secs());
        let expired = |entry: &CacheEntry| remove_unused || entry.timestamp < threshold;

        let (mut images_removed, mut diagrams_removed) = (0, 0);
        {
            let mut index = self.index.lock().expect("cache index poisoned");
            index.images.retain(|key, entry| {
                if expired(entry) {
                    remove_asset_file(&entry.path, key);
                    images_removed += 1;
                    false
                } else {
                    true
                }
            });
            index.diagrams.retain(|key, entry| {
                if expired(entry) {
                    remove_asset_file(&entry.path, key);
                    // Diagrams may carry an SVG sibling.
                    let svg = entry.path.with_extension("svg");
                    if svg.exists() {
                        remove_asset_file(&svg, key);
                    }
                    diagrams_removed += 1;
                    false
                } else {
                    true
                }
            });
        }
        if let Err(e) = self.save() {
            warn!("Error saving cache index after clean: {}", e);
        }
        (images_removed, diagrams_removed)
    }

    /// A point-in-time copy of both index groups, for listing tools.
    pub fn snapshot(&self) -> (IndexMap<String, CacheEntry>, IndexMap<String, CacheEntry>) {
        let index = self.index.lock().expect("cache index poisoned");
        (index.images.clone(), index.diagrams.clone())
    }

    fn save(&self) -> Result<()> {
        let json = {
            let mut index = self.index.lock().expect("cache index poisoned");
            index.last_updated = now_secs();
            serde_json::to_string_pretty(&*index)?
        };
        let dir = self
            .index_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::fs::write(tmp.path(), json)?;
        tmp.persist(&self.index_path).map_err(|e| e.error)?;
        debug!("Saved cache index to {:?}", self.index_path);
        Ok(())
    }
}

fn remove_asset_file(path: &Path, key: &str) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Error removing cached asset for {:?}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedStore {
        bytes: Vec<u8>,
        fetches: std::cell::Cell<u32>,
    }

    impl ImageStore for CannedStore {
        fn fetch(&self, _url: &str) -> std::result::Result<Vec<u8>, StoreError> {
            self.fetches.set(self.fetches.get() + 1);
            Ok(self.bytes.clone())
        }

        fn store(&self, _bytes: &[u8]) -> std::result::Result<String, StoreError> {
            Ok("http://example.test/stored.png".to_string())
        }
    }

    #[test]
    fn insert_then_lookup_round_trips_through_a_fresh_handle() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::open(dir.path()).unwrap();

        let asset = cache.diagrams_dir().join("diagram_abc.png");
        std::fs::write(&asset, b"png bytes").unwrap();
        cache.insert_diagram("abc", &asset, Some("flowchart")).unwrap();
        assert_eq!(cache.lookup_diagram("abc"), Some(asset.clone()));

        // Reopen from disk: the persisted index must agree.
        let reopened = AssetCache::open(dir.path()).unwrap();
        assert_eq!(reopened.lookup_diagram("abc"), Some(asset));
    }

    #[test]
    fn stale_entry_is_dropped_when_its_file_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::open(dir.path()).unwrap();

        let asset = cache.diagrams_dir().join("diagram_gone.png");
        std::fs::write(&asset, b"png").unwrap();
        cache.insert_diagram("gone", &asset, None).unwrap();
        std::fs::remove_file(&asset).unwrap();

        assert_eq!(cache.lookup_diagram("gone"), None);
    }

    #[test]
    fn get_image_fetches_once_then_serves_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::open(dir.path()).unwrap();
        let store = CannedStore {
            bytes: b"jpeg bytes".to_vec(),
            fetches: std::cell::Cell::new(0),
        };

        let url = "http://example.test/photo.jpg";
        let first = cache.get_image(url, &store, Duration::ZERO).unwrap();
        let second = cache.get_image(url, &store, Duration::ZERO).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.fetches.get(), 1);
        assert_eq!(std::fs::read(&first).unwrap(), b"jpeg bytes");
    }

    #[test]
    fn corrupt_index_starts_a_fresh_cache() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("asset_cache.json"), "{ not json").unwrap();
        let cache = AssetCache::open(dir.path()).unwrap();
        assert_eq!(cache.lookup_image("anything"), None);
    }

    #[test]
    fn clean_removes_entries_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::open(dir.path()).unwrap();

        let asset = cache.images_dir().join("img_x.jpg");
        std::fs::write(&asset, b"jpg").unwrap();
        cache.insert_image("http://x/y.jpg", &asset, None).unwrap();

        let (images, diagrams) = cache.clean(Duration::ZERO, true);
        assert_eq!((images, diagrams), (1, 0));
        assert!(!asset.exists());
        assert_eq!(cache.lookup_image("http://x/y.jpg"), None);
    }
}
