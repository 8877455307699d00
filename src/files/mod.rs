use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::{Glob, GlobMatcher};
use ignore::WalkBuilder;

use crate::config::ResolvedConfig;
use crate::error::CullError;
use crate::plugins::WorkspacePluginOutput;
use crate::scripts::extract_commands;
use crate::workspace::WorkspaceTree;

const DEFAULT_PROJECT: &[&str] = &[
    "**/*.ts", "**/*.tsx", "**/*.js", "**/*.jsx", "**/*.mjs", "**/*.cjs", "**/*.mts",
    "**/*.cts", "**/*.vue", "**/*.svelte", "**/*.astro", "**/*.mdx",
];

const WALK_EXCLUDES: &[&str] = &[
    "**/node_modules/**",
    "**/.git/**",
    "**/dist/**",
    "**/build/**",
    "**/coverage/**",
    "**/out/**",
];

const PRODUCTION_EXCLUDES: &[&str] = &[
    "**/*.test.{ts,tsx,js,jsx}",
    "**/*.spec.{ts,tsx,js,jsx}",
    "**/__tests__/**",
    "**/__mocks__/**",
    "**/*.stories.{ts,tsx,js,jsx}",
];

/// An ordered pattern list with `!`-negation. Later patterns override
/// earlier ones; a path matches when its last matching pattern is not
/// negated.
#[derive(Debug, Default)]
pub struct PatternMatcher {
    matchers: Vec<(GlobMatcher, bool)>,
}

impl PatternMatcher {
    pub fn build<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut matchers = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let (glob, negated) = match pattern.strip_prefix('!') {
                Some(rest) => (rest, true),
                None => (pattern, false),
            };
            let glob = glob.strip_prefix("./").unwrap_or(glob);
            let compiled = Glob::new(glob)
                .map_err(|e| CullError::Config(format!("invalid glob {pattern:?}: {e}")))?
                .compile_matcher();
            matchers.push((compiled, negated));
        }
        Ok(Self { matchers })
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn is_match(&self, relative: &str) -> bool {
        let mut matched = false;
        for (glob, negated) in &self.matchers {
            if glob.is_match(relative) {
                matched = !negated;
            }
        }
        matched
    }
}

/// The concrete file sets of one workspace after pattern expansion.
#[derive(Debug)]
pub struct WorkspaceFiles {
    pub project: BTreeSet<PathBuf>,
    pub entries: BTreeSet<PathBuf>,
    /// Reporting filter; ignored files stay in the project universe and
    /// may be reachable, they are just never reported.
    pub ignore: PatternMatcher,
}

impl WorkspaceFiles {
    pub fn is_ignored(&self, ws_dir: &Path, path: &Path) -> bool {
        if self.ignore.is_empty() {
            return false;
        }
        let relative = path.strip_prefix(ws_dir).unwrap_or(path);
        self.ignore.is_match(&relative.to_string_lossy().replace('\\', "/"))
    }
}

/// Per-workspace file sets, indexed by workspace id.
#[derive(Debug)]
pub struct FileSets {
    pub by_workspace: Vec<WorkspaceFiles>,
}

impl FileSets {
    pub fn project_universe(&self) -> BTreeSet<PathBuf> {
        self.by_workspace
            .iter()
            .flat_map(|w| w.project.iter().cloned())
            .collect()
    }

    pub fn all_entries(&self) -> BTreeSet<PathBuf> {
        self.by_workspace
            .iter()
            .flat_map(|w| w.entries.iter().cloned())
            .collect()
    }
}

pub fn collect_file_sets(
    tree: &WorkspaceTree,
    resolved: &ResolvedConfig,
    plugin_outputs: &[WorkspacePluginOutput],
    production: bool,
) -> Result<FileSets> {
    let mut walked = walk_repository(&tree.root, production)?;
    attribute_owners(tree, &mut walked);

    let mut by_workspace = Vec::with_capacity(tree.workspaces.len());

    for id in 0..tree.workspaces.len() {
        let ws = tree.get(id);
        let label = tree.relative_label(id);
        let overrides = resolved.workspace_overrides(&label);
        let plugins = &plugin_outputs[id];

        let mut project_patterns: Vec<String> = resolved.config.project.clone();
        if let Some(o) = overrides {
            project_patterns.extend(o.project.iter().cloned());
        }
        project_patterns.extend(plugins.project_patterns.iter().cloned());
        if project_patterns.iter().all(|p| p.starts_with('!')) {
            let mut defaults: Vec<String> =
                DEFAULT_PROJECT.iter().map(|s| s.to_string()).collect();
            defaults.extend(project_patterns);
            project_patterns = defaults;
        }

        let mut entry_patterns: Vec<String> = resolved.config.entry.clone();
        if let Some(o) = overrides {
            entry_patterns.extend(o.entry.iter().cloned());
        }
        entry_patterns.extend(plugins.entries.iter().cloned());

        let mut ignore_patterns: Vec<String> = resolved.config.ignore.clone();
        if let Some(o) = overrides {
            ignore_patterns.extend(o.ignore.iter().cloned());
        }
        ignore_patterns.extend(plugins.ignore_patterns.iter().cloned());

        let project_matcher = PatternMatcher::build(&project_patterns)?;
        let entry_matcher = PatternMatcher::build(&entry_patterns)?;
        let ignore = PatternMatcher::build(&ignore_patterns)?;

        let mut project = BTreeSet::new();
        let mut entries = BTreeSet::new();

        for (path, owner) in &walked {
            if *owner != id {
                continue;
            }
            let relative = path
                .strip_prefix(&ws.dir)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");

            if project_matcher.is_match(&relative) {
                project.insert(path.clone());
            }
            if entry_matcher.is_match(&relative) {
                entries.insert(path.clone());
            }
        }

        // Manifest fields and script-referenced files are exact paths, not
        // globs; they seed entries even when the walk skipped them.
        for field in ws.manifest.entry_fields() {
            let candidate = ws.dir.join(field.trim_start_matches("./"));
            if candidate.is_file() {
                entries.insert(candidate);
            }
        }
        for line in ws.manifest.scripts.values() {
            for command in extract_commands(line) {
                for file in command.referenced_files() {
                    let candidate = ws.dir.join(file.trim_start_matches("./"));
                    if candidate.is_file() {
                        entries.insert(candidate);
                    }
                }
            }
        }

        // Entry ⊆ project.
        for entry in &entries {
            project.insert(entry.clone());
        }

        by_workspace.push(WorkspaceFiles {
            project,
            entries,
            ignore,
        });
    }

    Ok(FileSets { by_workspace })
}

/// One repository walk; every file is attributed to its nearest enclosing
/// workspace.
fn walk_repository(root: &Path, production: bool) -> Result<Vec<(PathBuf, usize)>> {
    let mut excludes = PatternMatcher::build(WALK_EXCLUDES)?;
    if production {
        let mut patterns: Vec<&str> = WALK_EXCLUDES.to_vec();
        patterns.extend(PRODUCTION_EXCLUDES);
        excludes = PatternMatcher::build(&patterns)?;
    }

    let mut files = Vec::new();
    let walker = WalkBuilder::new(root).hidden(false).git_ignore(true).build();

    for entry in walker {
        let entry = entry.map_err(|source| CullError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        if excludes.is_match(&relative) {
            continue;
        }

        files.push((path.to_path_buf(), 0));
    }

    files.sort();
    Ok(files)
}

/// Attribute walked files to workspaces. Separate from the walk so the
/// caller can reuse one walk across all workspaces.
pub fn attribute_owners(tree: &WorkspaceTree, files: &mut [(PathBuf, usize)]) {
    for (path, owner) in files.iter_mut() {
        *owner = tree.owner_of(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::fs;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn sets_for(temp: &TempDir, config: Config) -> (WorkspaceTree, FileSets) {
        let tree = WorkspaceTree::load(temp.path()).unwrap();
        let resolved = ResolvedConfig {
            root: temp.path().canonicalize().unwrap(),
            config,
        };
        let outputs: Vec<WorkspacePluginOutput> = tree
            .workspaces
            .iter()
            .map(|_| WorkspacePluginOutput::default())
            .collect();
        let sets = collect_file_sets(&tree, &resolved, &outputs, false).unwrap();
        (tree, sets)
    }

    #[test]
    fn test_pattern_matcher_negation_last_wins() {
        let m = PatternMatcher::build(&["src/**/*.ts", "!src/**/*.test.ts"]).unwrap();
        assert!(m.is_match("src/a.ts"));
        assert!(!m.is_match("src/a.test.ts"));

        let m = PatternMatcher::build(&["!src/**", "src/keep.ts"]).unwrap();
        assert!(m.is_match("src/keep.ts"));
        assert!(!m.is_match("src/other.ts"));
    }

    #[test]
    fn test_default_project_patterns() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("package.json"), r#"{"name": "p"}"#);
        write(&temp.path().join("src/a.ts"), "export {};");
        write(&temp.path().join("readme.md"), "# hi");

        let (tree, sets) = sets_for(&temp, Config::default());
        let ws = &sets.by_workspace[0];
        let root = &tree.root;

        assert!(ws.project.contains(&root.join("src/a.ts")));
        assert!(!ws.project.iter().any(|p| p.ends_with("readme.md")));
    }

    #[test]
    fn test_entry_outside_project_is_added() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("package.json"), r#"{"name": "p"}"#);
        write(&temp.path().join("scripts/gen.ts"), "export {};");

        let config = Config {
            project: vec!["src/**/*.ts".to_string()],
            entry: vec!["scripts/gen.ts".to_string()],
            ..Default::default()
        };
        let (tree, sets) = sets_for(&temp, config);
        let ws = &sets.by_workspace[0];

        assert!(ws.entries.contains(&tree.root.join("scripts/gen.ts")));
        assert!(ws.project.contains(&tree.root.join("scripts/gen.ts")));
    }

    #[test]
    fn test_manifest_main_seeds_entries() {
        let temp = TempDir::new().unwrap();
        write(
            &temp.path().join("package.json"),
            r#"{"name": "p", "main": "./src/index.ts"}"#,
        );
        write(&temp.path().join("src/index.ts"), "export {};");

        let (tree, sets) = sets_for(&temp, Config::default());
        assert!(sets.by_workspace[0]
            .entries
            .contains(&tree.root.join("src/index.ts")));
    }

    #[test]
    fn test_script_referenced_file_is_entry() {
        let temp = TempDir::new().unwrap();
        write(
            &temp.path().join("package.json"),
            r#"{"name": "p", "scripts": {"build": "node scripts/build.mjs"}}"#,
        );
        write(&temp.path().join("scripts/build.mjs"), "export {};");

        let (tree, sets) = sets_for(&temp, Config::default());
        assert!(sets.by_workspace[0]
            .entries
            .contains(&tree.root.join("scripts/build.mjs")));
    }

    #[test]
    fn test_files_attributed_to_nearest_workspace() {
        let temp = TempDir::new().unwrap();
        write(
            &temp.path().join("package.json"),
            r#"{"name": "root", "workspaces": ["packages/*"]}"#,
        );
        write(
            &temp.path().join("packages/a/package.json"),
            r#"{"name": "a"}"#,
        );
        write(&temp.path().join("packages/a/src/x.ts"), "export {};");
        write(&temp.path().join("top.ts"), "export {};");

        let (tree, sets) = sets_for(&temp, Config::default());
        let a = tree.by_name("a").unwrap();

        assert!(sets.by_workspace[a]
            .project
            .contains(&tree.root.join("packages/a/src/x.ts")));
        assert!(!sets.by_workspace[0]
            .project
            .iter()
            .any(|p| p.ends_with("x.ts")));
        assert!(sets.by_workspace[0].project.contains(&tree.root.join("top.ts")));
    }

    #[test]
    fn test_ignore_filter() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("package.json"), r#"{"name": "p"}"#);
        write(&temp.path().join("src/gen/api.ts"), "export {};");

        let config = Config {
            ignore: vec!["src/gen/**".to_string()],
            ..Default::default()
        };
        let (tree, sets) = sets_for(&temp, config);
        let ws = &sets.by_workspace[0];

        let path = tree.root.join("src/gen/api.ts");
        assert!(ws.project.contains(&path));
        assert!(ws.is_ignored(&tree.root, &path));
    }
}
