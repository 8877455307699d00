use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::Glob;

use crate::config::{find_and_load_tsconfig, load_manifest, PackageJson, TsConfig};
use crate::error::CullError;

/// Which manifest table a dependency was declared in. Every declared dep
/// lives in exactly one bucket per workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DepBucket {
    Production,
    Development,
    Peer,
    Optional,
}

/// A directory with a package manifest, part of the (possibly nested)
/// workspace tree.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub name: String,
    pub dir: PathBuf,
    pub manifest_path: PathBuf,
    pub manifest: PackageJson,
    pub tsconfig: Option<TsConfig>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub depth: usize,
    /// Binary names under this workspace's own `node_modules/.bin`, plus
    /// the manifest's own `bin` entries.
    pub installed_bins: BTreeSet<String>,
}

impl Workspace {
    pub fn declares(&self, package: &str) -> bool {
        self.bucket_of(package).is_some()
    }

    pub fn bucket_of(&self, package: &str) -> Option<DepBucket> {
        if self.manifest.dependencies.contains_key(package) {
            Some(DepBucket::Production)
        } else if self.manifest.dev_dependencies.contains_key(package) {
            Some(DepBucket::Development)
        } else if self.manifest.peer_dependencies.contains_key(package) {
            Some(DepBucket::Peer)
        } else if self.manifest.optional_dependencies.contains_key(package) {
            Some(DepBucket::Optional)
        } else {
            None
        }
    }
}

/// The loaded workspace tree. Index 0 is always the root workspace.
#[derive(Debug, Default)]
pub struct WorkspaceTree {
    pub root: PathBuf,
    pub workspaces: Vec<Workspace>,
}

impl WorkspaceTree {
    pub fn load(root: &Path) -> Result<Self> {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

        let root_manifest_path = root.join("package.json");
        let root_manifest = if root_manifest_path.exists() {
            load_manifest(&root_manifest_path)?
        } else {
            PackageJson::default()
        };

        let mut patterns: Vec<String> = root_manifest
            .workspaces
            .patterns()
            .iter()
            .map(|s| s.to_string())
            .collect();
        if patterns.is_empty() {
            if let Some(pnpm) = load_pnpm_patterns(&root)? {
                patterns = pnpm;
            }
        }

        let mut member_dirs = discover_member_dirs(&root, &patterns)?;
        member_dirs.sort();
        member_dirs.dedup();

        let mut tree = Self {
            root: root.clone(),
            workspaces: Vec::new(),
        };
        tree.push_workspace(&root, root_manifest_path, root_manifest)?;

        for dir in member_dirs {
            let manifest_path = dir.join("package.json");
            if !manifest_path.exists() {
                continue;
            }
            let manifest = load_manifest(&manifest_path)?;
            tree.push_workspace(&dir, manifest_path, manifest)?;
        }

        tree.link_parents()?;
        Ok(tree)
    }

    fn push_workspace(
        &mut self,
        dir: &Path,
        manifest_path: PathBuf,
        manifest: PackageJson,
    ) -> Result<()> {
        let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        if self.workspaces.iter().any(|w| w.dir == canonical) {
            // The same directory reached through two workspace patterns or
            // a symlink loop.
            return Err(CullError::CyclicWorkspaces(canonical).into());
        }

        let name = manifest.name.clone().unwrap_or_else(|| {
            canonical
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("root")
                .to_string()
        });

        let tsconfig = find_and_load_tsconfig(&canonical)?;
        let installed_bins = collect_installed_bins(&canonical, &manifest);

        self.workspaces.push(Workspace {
            name,
            dir: canonical,
            manifest_path,
            manifest,
            tsconfig,
            parent: None,
            children: Vec::new(),
            depth: 0,
            installed_bins,
        });
        Ok(())
    }

    /// Assign each workspace its nearest enclosing workspace as parent and
    /// compute depths. The tree is rooted at index 0.
    fn link_parents(&mut self) -> Result<()> {
        for i in 1..self.workspaces.len() {
            let dir = self.workspaces[i].dir.clone();
            let mut best: Option<usize> = None;
            for (j, other) in self.workspaces.iter().enumerate() {
                if i == j || !dir.starts_with(&other.dir) || other.dir == dir {
                    continue;
                }
                match best {
                    Some(b) if self.workspaces[b].dir.components().count()
                        >= other.dir.components().count() => {}
                    _ => best = Some(j),
                }
            }
            let parent = best.unwrap_or(0);
            self.workspaces[i].parent = Some(parent);
            self.workspaces[parent].children.push(i);
        }

        for i in 0..self.workspaces.len() {
            let mut depth = 0;
            let mut cursor = self.workspaces[i].parent;
            while let Some(p) = cursor {
                depth += 1;
                if depth > self.workspaces.len() {
                    return Err(
                        CullError::CyclicWorkspaces(self.workspaces[i].dir.clone()).into(),
                    );
                }
                cursor = self.workspaces[p].parent;
            }
            self.workspaces[i].depth = depth;
        }
        Ok(())
    }

    pub fn is_monorepo(&self) -> bool {
        self.workspaces.len() > 1
    }

    pub fn get(&self, id: usize) -> &Workspace {
        &self.workspaces[id]
    }

    pub fn by_name(&self, name: &str) -> Option<usize> {
        self.workspaces.iter().position(|w| w.name == name)
    }

    pub fn by_dir(&self, dir: &Path) -> Option<usize> {
        let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        self.workspaces.iter().position(|w| w.dir == canonical)
    }

    /// The nearest workspace whose directory encloses `path`. Falls back
    /// to the root workspace.
    pub fn owner_of(&self, path: &Path) -> usize {
        let mut best = 0;
        let mut best_len = 0;
        for (i, ws) in self.workspaces.iter().enumerate() {
            if path.starts_with(&ws.dir) {
                let len = ws.dir.components().count();
                if len > best_len {
                    best = i;
                    best_len = len;
                }
            }
        }
        best
    }

    /// Workspace ids ordered deepest-first, ties broken by path. This is
    /// the iteration order for per-workspace reporting.
    pub fn deepest_first(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = (0..self.workspaces.len()).collect();
        ids.sort_by(|&a, &b| {
            self.workspaces[b]
                .depth
                .cmp(&self.workspaces[a].depth)
                .then_with(|| self.workspaces[a].dir.cmp(&self.workspaces[b].dir))
        });
        ids
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut cursor = self.workspaces[id].parent;
        while let Some(p) = cursor {
            out.push(p);
            cursor = self.workspaces[p].parent;
        }
        out
    }

    /// Every descendant of `id`, in no particular order.
    pub fn descendants(&self, id: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = self.workspaces[id].children.clone();
        while let Some(c) = stack.pop() {
            stack.extend(self.workspaces[c].children.iter().copied());
            out.push(c);
        }
        out
    }

    /// Dependencies visible to `id`: its own declarations plus every
    /// ancestor's. A dep listed in an ancestor counts as available.
    pub fn effective_deps(&self, id: usize) -> HashSet<String> {
        let mut deps = HashSet::new();
        let mut cursor = Some(id);
        while let Some(i) = cursor {
            let m = &self.workspaces[i].manifest;
            deps.extend(m.dependencies.keys().cloned());
            deps.extend(m.dev_dependencies.keys().cloned());
            deps.extend(m.peer_dependencies.keys().cloned());
            deps.extend(m.optional_dependencies.keys().cloned());
            cursor = self.workspaces[i].parent;
        }
        deps
    }

    /// Binaries runnable from `id`: its own `.bin` plus every ancestor's
    /// (the package manager hoists most of them to the root).
    pub fn effective_bins(&self, id: usize) -> BTreeSet<String> {
        let mut bins = BTreeSet::new();
        let mut cursor = Some(id);
        while let Some(i) = cursor {
            bins.extend(self.workspaces[i].installed_bins.iter().cloned());
            cursor = self.workspaces[i].parent;
        }
        bins
    }

    /// Map from workspace package name to its directory, used for
    /// monorepo-sibling resolution.
    pub fn sibling_dirs(&self) -> Vec<(String, PathBuf)> {
        self.workspaces
            .iter()
            .map(|w| (w.name.clone(), w.dir.clone()))
            .collect()
    }

    /// The workspace dir relative to the root, `.` for the root itself.
    pub fn relative_label(&self, id: usize) -> String {
        let ws = &self.workspaces[id];
        match ws.dir.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
            Err(_) => ws.dir.to_string_lossy().to_string(),
        }
    }
}

fn collect_installed_bins(dir: &Path, manifest: &PackageJson) -> BTreeSet<String> {
    let mut bins: BTreeSet<String> = manifest.bin_names().into_iter().collect();

    let bin_dir = dir.join("node_modules").join(".bin");
    if let Ok(entries) = fs::read_dir(&bin_dir) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            // Windows shims produce name.cmd / name.ps1 next to the script.
            let name = name
                .trim_end_matches(".cmd")
                .trim_end_matches(".ps1")
                .to_string();
            bins.insert(name);
        }
    }

    bins
}

fn load_pnpm_patterns(root: &Path) -> Result<Option<Vec<String>>> {
    let path = root.join("pnpm-workspace.yaml");
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let patterns = parse_pnpm_workspace_yaml(&content);
    Ok((!patterns.is_empty()).then_some(patterns))
}

/// Pull the `packages:` list out of a pnpm workspace manifest. Only that
/// one key matters here, so a full YAML parser would be overkill: skip to
/// the key, then take `- item` lines until the next top-level key.
/// Exclusion patterns (`!...`) only shrink the member set and are handled
/// by the manifest-presence check later, so they are dropped.
fn parse_pnpm_workspace_yaml(content: &str) -> Vec<String> {
    let mut lines = content.lines().map(str::trim);
    if !lines.any(|line| line == "packages:") {
        return Vec::new();
    }

    lines
        .take_while(|line| {
            line.is_empty() || line.starts_with('#') || line.starts_with('-')
        })
        .filter_map(|line| line.strip_prefix('-'))
        .map(|item| item.trim().trim_matches(|c| c == '"' || c == '\''))
        .filter(|pattern| !pattern.is_empty() && !pattern.starts_with('!'))
        .map(str::to_string)
        .collect()
}

fn discover_member_dirs(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();

    for pattern in patterns {
        let pattern = pattern.trim_end_matches('/');

        if pattern.contains('*') {
            let glob = Glob::new(pattern)
                .map_err(|e| CullError::Config(format!("workspace pattern {pattern:?}: {e}")))?
                .compile_matcher();

            for entry in walkdir::WalkDir::new(root)
                .max_depth(4)
                .into_iter()
                .filter_entry(|e| e.file_name() != "node_modules")
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if !path.is_dir() || path == root {
                    continue;
                }

                let relative = path.strip_prefix(root).unwrap_or(path);
                if glob.is_match(relative) && path.join("package.json").exists() {
                    dirs.push(path.to_path_buf());
                }
            }
        } else {
            let dir = root.join(pattern);
            if dir.is_dir() {
                dirs.push(dir);
            }
        }
    }

    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_single_package_tree() {
        let temp = TempDir::new().unwrap();
        write(
            &temp.path().join("package.json"),
            r#"{"name": "solo", "dependencies": {"react": "18.0.0"}}"#,
        );

        let tree = WorkspaceTree::load(temp.path()).unwrap();
        assert!(!tree.is_monorepo());
        assert_eq!(tree.workspaces.len(), 1);
        assert_eq!(tree.get(0).name, "solo");
        assert_eq!(tree.get(0).bucket_of("react"), Some(DepBucket::Production));
    }

    #[test]
    fn test_monorepo_tree_links() {
        let temp = TempDir::new().unwrap();
        write(
            &temp.path().join("package.json"),
            r#"{"name": "root", "workspaces": ["packages/*"], "devDependencies": {"eslint": "9.0.0"}}"#,
        );
        write(
            &temp.path().join("packages/a/package.json"),
            r#"{"name": "@test/a"}"#,
        );
        write(
            &temp.path().join("packages/b/package.json"),
            r#"{"name": "@test/b", "dependencies": {"lodash": "4.0.0"}}"#,
        );

        let tree = WorkspaceTree::load(temp.path()).unwrap();
        assert!(tree.is_monorepo());
        assert_eq!(tree.workspaces.len(), 3);

        let a = tree.by_name("@test/a").unwrap();
        assert_eq!(tree.get(a).parent, Some(0));
        assert_eq!(tree.get(a).depth, 1);

        let effective = tree.effective_deps(a);
        assert!(effective.contains("eslint"));
        assert!(!effective.contains("lodash"));
    }

    #[test]
    fn test_owner_of_nearest_workspace() {
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

        let tree = WorkspaceTree::load(temp.path()).unwrap();
        let a = tree.by_name("a").unwrap();

        let root = temp.path().canonicalize().unwrap();
        assert_eq!(tree.owner_of(&root.join("packages/a/src/x.ts")), a);
        assert_eq!(tree.owner_of(&root.join("top.ts")), 0);
    }

    #[test]
    fn test_deepest_first_ordering() {
        let temp = TempDir::new().unwrap();
        write(
            &temp.path().join("package.json"),
            r#"{"name": "root", "workspaces": ["packages/*"]}"#,
        );
        write(
            &temp.path().join("packages/a/package.json"),
            r#"{"name": "a"}"#,
        );

        let tree = WorkspaceTree::load(temp.path()).unwrap();
        let order = tree.deepest_first();
        assert_eq!(*order.last().unwrap(), 0);
    }

    #[test]
    fn test_pnpm_workspace_yaml() {
        let patterns = parse_pnpm_workspace_yaml(
            "packages:\n  - 'packages/*'\n  - \"apps/**\"\n  - '!**/test/**'\n",
        );
        assert_eq!(patterns, vec!["packages/*", "apps/**"]);
    }

    #[test]
    fn test_pnpm_workspace_yaml_stops_at_next_key() {
        let patterns = parse_pnpm_workspace_yaml(
            "catalog:\n  react: 18\npackages:\n  # members\n  - libs/core\n\n  - tools/*\ncatalogMode: strict\n  - not/a/member\n",
        );
        assert_eq!(patterns, vec!["libs/core", "tools/*"]);
    }

    #[test]
    fn test_manifest_bins_are_collected() {
        let temp = TempDir::new().unwrap();
        write(
            &temp.path().join("package.json"),
            r#"{"name": "tool", "bin": {"tool": "cli.js"}}"#,
        );

        let tree = WorkspaceTree::load(temp.path()).unwrap();
        assert!(tree.effective_bins(0).contains("tool"));
    }
}
