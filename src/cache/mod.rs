mod store;

pub use store::{compute_content_hash, get_modified_time, Cache, CacheConfig, CacheEntry};

use std::path::{Path, PathBuf};

use anyhow::Result;

pub const DEFAULT_CACHE_DIR: &str = ".cull-cache";

pub fn default_cache_dir(project_root: &Path) -> PathBuf {
    project_root.join(DEFAULT_CACHE_DIR)
}

pub fn create_cache(project_root: &Path, enabled: bool) -> Result<Option<Cache>> {
    if !enabled {
        return Ok(None);
    }

    let cache = Cache::new(default_cache_dir(project_root), CacheConfig::default())?;
    Ok(Some(cache))
}

pub fn create_cache_with_dir(cache_dir: PathBuf, enabled: bool) -> Result<Option<Cache>> {
    if !enabled {
        return Ok(None);
    }

    let cache = Cache::new(cache_dir, CacheConfig::default())?;
    Ok(Some(cache))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_cache_dir() {
        let root = Path::new("/project");
        assert_eq!(default_cache_dir(root), PathBuf::from("/project/.cull-cache"));
    }

    #[test]
    fn test_create_cache_disabled() {
        let temp = TempDir::new().unwrap();
        assert!(create_cache(temp.path(), false).unwrap().is_none());
    }

    #[test]
    fn test_create_cache_enabled() {
        let temp = TempDir::new().unwrap();
        assert!(create_cache(temp.path(), true).unwrap().is_some());
    }
}
