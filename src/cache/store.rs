use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::parser::ParsedModule;

/// The record shape is the version: bump the suffix whenever
/// `ParsedModule` changes and stale stores fall away on their own.
const STORE_FILE: &str = "entries-v3.json";

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entries untouched for this long are dropped at load time.
    pub max_age: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(7 * 24 * 60 * 60),
            max_entries: 10000,
        }
    }
}

/// One cached extraction, keyed by content hash. The record is the full
/// per-file analysis input, so a hit skips parsing entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub content_hash: u64,
    pub modified_time: u64,
    /// When this entry was written, for age pruning.
    pub stored_at: u64,
    pub module: ParsedModule,
}

impl CacheEntry {
    pub fn new(content_hash: u64, modified_time: u64, module: ParsedModule) -> Self {
        Self {
            content_hash,
            modified_time,
            stored_at: now_secs(),
            module,
        }
    }
}

#[derive(Debug)]
pub struct Cache {
    store_file: PathBuf,
    config: CacheConfig,
    entries: HashMap<String, CacheEntry>,
    dirty: bool,
}

impl Cache {
    /// Open the store under `cache_dir`, dropping entries past their age
    /// limit. A store written by an incompatible build lives under a
    /// different file name and is simply never read.
    pub fn new(cache_dir: PathBuf, config: CacheConfig) -> Result<Self> {
        fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache directory: {}", cache_dir.display()))?;

        let store_file = cache_dir.join(STORE_FILE);
        let mut entries: HashMap<String, CacheEntry> = fs::read_to_string(&store_file)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();

        let loaded = entries.len();
        let cutoff = now_secs().saturating_sub(config.max_age.as_secs());
        entries.retain(|_, entry| entry.stored_at >= cutoff);
        let dirty = entries.len() != loaded;

        Ok(Self {
            store_file,
            config,
            entries,
            dirty,
        })
    }

    pub fn get(&self, path: &Path) -> Option<&CacheEntry> {
        self.entries.get(path.to_string_lossy().as_ref())
    }

    pub fn insert(&mut self, path: PathBuf, entry: CacheEntry) {
        self.entries
            .insert(path.to_string_lossy().into_owned(), entry);
        self.dirty = true;

        if self.entries.len() > self.config.max_entries {
            self.shed_oldest();
        }
    }

    pub fn save(&self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let content = serde_json::to_string(&self.entries)?;
        fs::write(&self.store_file, content)
            .with_context(|| format!("Failed to write cache store: {}", self.store_file.display()))?;

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Over the limit: shed the oldest quarter in one sweep, so a store
    /// hovering at capacity does not re-sort on every insert.
    fn shed_oldest(&mut self) {
        let keep = self.config.max_entries - self.config.max_entries / 4;
        let mut stamps: Vec<u64> = self.entries.values().map(|e| e.stored_at).collect();
        stamps.sort_unstable();
        let cutoff = stamps[stamps.len() - keep];
        self.entries.retain(|_, entry| entry.stored_at >= cutoff);
    }
}

/// FNV-1a over the file bytes. Stable across runs and platforms, unlike
/// the stdlib hasher, which makes the stored hashes portable.
pub fn compute_content_hash(content: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in content.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

pub fn get_modified_time(path: &Path) -> u64 {
    let mtime = fs::metadata(path).and_then(|m| m.modified());
    match mtime {
        Ok(time) => time
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
        Err(_) => 0,
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(hash: u64) -> CacheEntry {
        CacheEntry::new(hash, hash, ParsedModule::default())
    }

    #[test]
    fn test_insert_and_get() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut cache = Cache::new(temp.path().join("cache"), CacheConfig::default()).unwrap();

        let path = PathBuf::from("/p/a.ts");
        cache.insert(path.clone(), entry(42));

        assert_eq!(cache.get(&path).unwrap().content_hash, 42);
        assert!(cache.get(Path::new("/p/b.ts")).is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("cache");

        {
            let mut cache = Cache::new(dir.clone(), CacheConfig::default()).unwrap();
            cache.insert(PathBuf::from("/p/a.ts"), entry(7));
            cache.save().unwrap();
        }

        let cache = Cache::new(dir, CacheConfig::default()).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(Path::new("/p/a.ts")).unwrap().content_hash, 7);
    }

    #[test]
    fn test_unreadable_store_starts_empty() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("cache");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(STORE_FILE), "{ not json").unwrap();

        let cache = Cache::new(dir, CacheConfig::default()).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entries_pruned_at_load() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("cache");

        {
            let mut cache = Cache::new(dir.clone(), CacheConfig::default()).unwrap();
            let mut old = entry(1);
            old.stored_at = 0;
            cache.insert(PathBuf::from("/p/old.ts"), old);
            cache.insert(PathBuf::from("/p/new.ts"), entry(2));
            cache.save().unwrap();
        }

        let cache = Cache::new(dir, CacheConfig::default()).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.get(Path::new("/p/old.ts")).is_none());
        assert!(cache.get(Path::new("/p/new.ts")).is_some());
    }

    #[test]
    fn test_overflow_sheds_oldest_batch() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = CacheConfig {
            max_entries: 8,
            ..Default::default()
        };
        let mut cache = Cache::new(temp.path().join("cache"), config).unwrap();

        for i in 0..9u64 {
            let mut e = entry(i);
            e.stored_at = i;
            cache.insert(PathBuf::from(format!("/p/{}.ts", i)), e);
        }

        assert!(cache.len() <= 8);
        assert!(cache.get(Path::new("/p/8.ts")).is_some());
        assert!(cache.get(Path::new("/p/0.ts")).is_none());
    }

    #[test]
    fn test_fnv_known_vectors() {
        assert_eq!(compute_content_hash(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(compute_content_hash("a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(compute_content_hash("abc"), compute_content_hash("abc"));
        assert_ne!(compute_content_hash("abc"), compute_content_hash("abd"));
    }
}
