use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;

use anyhow::Result;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};

/// Watch mode re-runs the whole batch analysis; there is no incremental
/// invalidation in the engine itself.
pub struct WatchConfig {
    pub debounce_ms: u64,
    pub extensions: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 250,
            extensions: [
                "ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts", "json", "vue", "svelte",
                "astro", "mdx",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

pub fn watch<F>(root: &Path, config: WatchConfig, mut callback: F) -> Result<()>
where
    F: FnMut(&[PathBuf]) -> Result<()>,
{
    let (tx, rx) = channel();

    let mut debouncer = new_debouncer(
        Duration::from_millis(config.debounce_ms),
        move |res: Result<Vec<notify_debouncer_mini::DebouncedEvent>, _>| {
            if let Ok(events) = res {
                let paths: Vec<PathBuf> = events
                    .into_iter()
                    .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                    .map(|e| e.path)
                    .collect();

                if !paths.is_empty() {
                    let _ = tx.send(paths);
                }
            }
        },
    )?;

    debouncer.watcher().watch(root, RecursiveMode::Recursive)?;

    callback(&[])?;

    while let Ok(paths) = rx.recv() {
        let relevant: Vec<PathBuf> = paths
            .into_iter()
            .filter(|p| is_relevant_file(p, &config.extensions))
            .collect();

        if !relevant.is_empty() {
            callback(&relevant)?;
        }
    }

    Ok(())
}

fn is_relevant_file(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension() else {
        // Manifests and rc files without extensions still matter.
        return path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with('.'));
    };
    let ext = ext.to_string_lossy().to_lowercase();
    extensions.iter().any(|e| e == &ext)
}
