use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{is_builtin_module, parse_package_specifier, Resolution};

const EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", ".mts", ".cts", ".d.ts"];
const INDEX_FILES: &[&str] = &[
    "index.ts",
    "index.tsx",
    "index.js",
    "index.jsx",
    "index.mjs",
    "index.cjs",
    "index.d.ts",
];

/// tsconfig path aliases of one workspace, applied to files under `dir`.
#[derive(Debug, Clone)]
pub struct WorkspaceAliases {
    pub dir: PathBuf,
    pub base_url: Option<PathBuf>,
    pub paths: Vec<(String, Vec<String>)>,
}

/// Resolves specifiers to files, external packages or builtins. All
/// lookups go through a write-once cache keyed by specifier and referring
/// directory; concurrent resolution during parallel extraction is safe.
#[derive(Debug)]
pub struct ModuleResolver {
    root: PathBuf,
    /// Deepest-dir-first so the nearest workspace's aliases win.
    aliases: Vec<WorkspaceAliases>,
    /// Workspace package name → directory, for monorepo siblings.
    siblings: Vec<(String, PathBuf)>,
    /// Declared dependency names per workspace dir, for the bare-specifier
    /// fallback when nothing is installed.
    declared: Vec<(PathBuf, BTreeSet<String>)>,
    cache: Mutex<HashMap<(String, PathBuf, bool), Resolution>>,
}

impl ModuleResolver {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            aliases: Vec::new(),
            siblings: Vec::new(),
            declared: Vec::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_aliases(mut self, mut aliases: Vec<WorkspaceAliases>) -> Self {
        aliases.sort_by(|a, b| {
            b.dir
                .components()
                .count()
                .cmp(&a.dir.components().count())
                .then_with(|| a.dir.cmp(&b.dir))
        });
        for ws in &mut aliases {
            ws.paths.sort_by(|a, b| a.0.cmp(&b.0));
        }
        self.aliases = aliases;
        self
    }

    pub fn with_siblings(mut self, siblings: Vec<(String, PathBuf)>) -> Self {
        self.siblings = siblings;
        self
    }

    pub fn with_declared(mut self, declared: Vec<(PathBuf, BTreeSet<String>)>) -> Self {
        self.declared = declared;
        self
    }

    pub fn resolve(&self, specifier: &str, from: &Path, type_only: bool) -> Resolution {
        let from_dir = from.parent().unwrap_or(Path::new("/")).to_path_buf();
        let key = (specifier.to_string(), from_dir, type_only);

        if let Ok(cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&key) {
                return hit.clone();
            }
        }

        let result = self.resolve_uncached(specifier, from, type_only);

        if let Ok(mut cache) = self.cache.lock() {
            cache.entry(key).or_insert_with(|| result.clone());
        }
        result
    }

    fn resolve_uncached(&self, specifier: &str, from: &Path, type_only: bool) -> Resolution {
        if specifier.starts_with("./") || specifier.starts_with("../") {
            let base = match from.parent() {
                Some(dir) => dir,
                None => return Resolution::Unresolved,
            };
            return match self.try_resolve_file(&base.join(specifier)) {
                Some(path) => Resolution::Internal(path),
                None => Resolution::Unresolved,
            };
        }

        if specifier.starts_with('/') {
            return match self.try_resolve_file(&PathBuf::from(specifier)) {
                Some(path) => Resolution::Internal(path),
                None => Resolution::Unresolved,
            };
        }

        if let Some(path) = self.resolve_alias(specifier, from) {
            return Resolution::Internal(path);
        }

        if let Some((package, path)) = self.resolve_sibling(specifier, type_only) {
            return Resolution::Workspace { package, path };
        }

        if let Some(resolution) = self.resolve_node_modules(specifier, from, type_only) {
            return resolution;
        }

        if is_builtin_module(specifier) {
            return Resolution::Builtin;
        }

        if let Some(package) = self.match_declared(specifier, from) {
            let subpath = specifier
                .strip_prefix(&package)
                .map(|s| s.trim_start_matches('/'))
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            return Resolution::External { package, subpath };
        }

        Resolution::Unresolved
    }

    /// tsconfig `paths` of the nearest workspace enclosing `from`.
    fn resolve_alias(&self, specifier: &str, from: &Path) -> Option<PathBuf> {
        let ws = self.aliases.iter().find(|a| from.starts_with(&a.dir))?;

        for (pattern, replacements) in &ws.paths {
            let Some(matched) = match_path_pattern(pattern, specifier) else {
                continue;
            };
            for replacement in replacements {
                let resolved = replacement.replace('*', matched);
                let base = ws.base_url.as_deref().unwrap_or(&ws.dir);
                if let Some(path) = self.try_resolve_file(&base.join(&resolved)) {
                    return Some(path);
                }
            }
        }
        None
    }

    /// Monorepo sibling packages resolve by name before `node_modules`,
    /// honoring the sibling's own entry fields.
    fn resolve_sibling(&self, specifier: &str, type_only: bool) -> Option<(String, PathBuf)> {
        let (package, subpath) = parse_package_specifier(specifier);
        let (name, dir) = self.siblings.iter().find(|(name, _)| name == package)?;
        let path = self.resolve_package_dir(dir, subpath, type_only)?;
        Some((name.clone(), path))
    }

    fn resolve_node_modules(
        &self,
        specifier: &str,
        from: &Path,
        type_only: bool,
    ) -> Option<Resolution> {
        let (package, subpath) = parse_package_specifier(specifier);
        let mut current = from.parent()?;

        loop {
            let package_dir = current.join("node_modules").join(package);
            if package_dir.is_dir() {
                // Installed: the reference is external either way; a
                // resolvable entry file is not needed for attribution.
                let _ = self.resolve_package_dir(&package_dir, subpath, type_only);
                return Some(Resolution::External {
                    package: package.to_string(),
                    subpath: subpath.map(str::to_string),
                });
            }

            if current == self.root {
                return None;
            }
            current = current.parent()?;
        }
    }

    /// Resolve an entry file inside a package directory: `exports` map
    /// first, then `main`/`module`/`types`, then `index.*`.
    fn resolve_package_dir(
        &self,
        package_dir: &Path,
        subpath: Option<&str>,
        type_only: bool,
    ) -> Option<PathBuf> {
        let manifest_path = package_dir.join("package.json");
        if manifest_path.is_file() {
            if let Ok(content) = std::fs::read_to_string(&manifest_path) {
                if let Ok(manifest) = serde_json::from_str::<serde_json::Value>(&content) {
                    if let Some(exports) = manifest.get("exports") {
                        if let Some(target) =
                            resolve_exports_map(exports, subpath, type_only)
                        {
                            let target = target.trim_start_matches("./");
                            if let Some(path) = self.try_resolve_file(&package_dir.join(target)) {
                                return Some(path);
                            }
                        }
                    }

                    if subpath.is_none() {
                        let fields: &[&str] = if type_only {
                            &["types", "module", "main"]
                        } else {
                            &["module", "main", "types"]
                        };
                        for field in fields {
                            if let Some(entry) = manifest.get(*field).and_then(|v| v.as_str()) {
                                if let Some(path) =
                                    self.try_resolve_file(&package_dir.join(entry))
                                {
                                    return Some(path);
                                }
                            }
                        }
                    }
                }
            }
        }

        if let Some(subpath) = subpath {
            return self.try_resolve_file(&package_dir.join(subpath));
        }

        for index in INDEX_FILES {
            let candidate = package_dir.join(index);
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        None
    }

    /// Bare specifier with nothing installed: fall back to declared deps
    /// of the workspaces enclosing `from`. Longest declared name wins.
    fn match_declared(&self, specifier: &str, from: &Path) -> Option<String> {
        let mut best: Option<&str> = None;
        for (dir, names) in &self.declared {
            if !from.starts_with(dir) {
                continue;
            }
            for name in names {
                let matches = specifier == name
                    || specifier
                        .strip_prefix(name.as_str())
                        .is_some_and(|rest| rest.starts_with('/'));
                if matches && best.map_or(true, |b| name.len() > b.len()) {
                    best = Some(name);
                }
            }
        }
        best.map(str::to_string)
    }

    fn try_resolve_file(&self, path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(path.to_path_buf());
        }

        let path_str = path.to_string_lossy();
        for ext in EXTENSIONS {
            let with_ext = PathBuf::from(format!("{}{}", path_str, ext));
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }

        // `./a.js` written for ESM output resolves to `a.ts` in source.
        if let Some(stem) = path_str
            .strip_suffix(".js")
            .or_else(|| path_str.strip_suffix(".mjs"))
            .or_else(|| path_str.strip_suffix(".cjs"))
        {
            for ext in [".ts", ".tsx", ".mts", ".cts"] {
                let with_ext = PathBuf::from(format!("{}{}", stem, ext));
                if with_ext.is_file() {
                    return Some(with_ext);
                }
            }
        }

        if path.is_dir() {
            for index in INDEX_FILES {
                let candidate = path.join(index);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }

        None
    }
}

fn match_path_pattern<'a>(pattern: &str, specifier: &'a str) -> Option<&'a str> {
    if pattern.contains('*') {
        let prefix = pattern.split('*').next()?;
        if specifier.starts_with(prefix) {
            return Some(&specifier[prefix.len()..]);
        }
        None
    } else if pattern == specifier {
        Some("")
    } else {
        None
    }
}

/// Resolve an `exports` map against a subpath and condition set. Condition
/// order prefers `types` for type-only imports.
fn resolve_exports_map(
    exports: &serde_json::Value,
    subpath: Option<&str>,
    type_only: bool,
) -> Option<String> {
    let key = match subpath {
        Some(s) => format!("./{}", s),
        None => ".".to_string(),
    };

    match exports {
        serde_json::Value::String(target) => {
            if subpath.is_none() {
                Some(target.clone())
            } else {
                None
            }
        }
        serde_json::Value::Object(map) => {
            let is_subpath_map = map.keys().any(|k| k == "." || k.starts_with("./"));
            if is_subpath_map {
                if let Some(entry) = map.get(&key) {
                    return resolve_export_conditions(entry, type_only);
                }
                // `./*` star subpaths.
                for (pattern, entry) in map {
                    let Some(prefix) = pattern.strip_suffix('*') else {
                        continue;
                    };
                    let Some(rest) = key.strip_prefix(prefix) else {
                        continue;
                    };
                    let target = resolve_export_conditions(entry, type_only)?;
                    return Some(target.replace('*', rest));
                }
                None
            } else {
                resolve_export_conditions(exports, type_only)
            }
        }
        _ => None,
    }
}

fn resolve_export_conditions(entry: &serde_json::Value, type_only: bool) -> Option<String> {
    match entry {
        serde_json::Value::String(target) => Some(target.clone()),
        serde_json::Value::Object(map) => {
            let conditions: &[&str] = if type_only {
                &["types", "import", "require", "default"]
            } else {
                &["import", "require", "default", "types"]
            };
            for condition in conditions {
                if let Some(nested) = map.get(*condition) {
                    if let Some(target) = resolve_export_conditions(nested, type_only) {
                        return Some(target);
                    }
                }
            }
            None
        }
        serde_json::Value::Array(items) => items
            .iter()
            .find_map(|item| resolve_export_conditions(item, type_only)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn resolver_at(temp: &TempDir) -> ModuleResolver {
        ModuleResolver::new(temp.path().to_path_buf())
    }

    #[test]
    fn test_relative_with_extension_probing() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("src/util.ts"), "export {};");
        write(&temp.path().join("src/main.ts"), "import './util';");

        let resolver = resolver_at(&temp);
        let from = temp.path().join("src/main.ts");
        assert_eq!(
            resolver.resolve("./util", &from, false),
            Resolution::Internal(temp.path().join("src/util.ts"))
        );
    }

    #[test]
    fn test_relative_js_written_for_ts_source() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("src/util.ts"), "export {};");

        let resolver = resolver_at(&temp);
        let from = temp.path().join("src/main.ts");
        assert_eq!(
            resolver.resolve("./util.js", &from, false),
            Resolution::Internal(temp.path().join("src/util.ts"))
        );
    }

    #[test]
    fn test_index_fallback() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("src/lib/index.ts"), "export {};");

        let resolver = resolver_at(&temp);
        let from = temp.path().join("src/main.ts");
        assert_eq!(
            resolver.resolve("./lib", &from, false),
            Resolution::Internal(temp.path().join("src/lib/index.ts"))
        );
    }

    #[test]
    fn test_missing_relative_is_unresolved() {
        let temp = TempDir::new().unwrap();
        let resolver = resolver_at(&temp);
        let from = temp.path().join("src/main.ts");
        assert_eq!(
            resolver.resolve("./missing", &from, false),
            Resolution::Unresolved
        );
    }

    #[test]
    fn test_tsconfig_alias() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("src/components/Button.tsx"), "export {};");

        let resolver = resolver_at(&temp).with_aliases(vec![WorkspaceAliases {
            dir: temp.path().to_path_buf(),
            base_url: None,
            paths: vec![("@/*".to_string(), vec!["src/*".to_string()])],
        }]);

        let from = temp.path().join("src/main.ts");
        assert_eq!(
            resolver.resolve("@/components/Button", &from, false),
            Resolution::Internal(temp.path().join("src/components/Button.tsx"))
        );
    }

    #[test]
    fn test_workspace_sibling() {
        let temp = TempDir::new().unwrap();
        write(
            &temp.path().join("packages/ui/package.json"),
            r#"{"name": "@acme/ui", "main": "./src/index.ts"}"#,
        );
        write(&temp.path().join("packages/ui/src/index.ts"), "export {};");

        let resolver = resolver_at(&temp).with_siblings(vec![(
            "@acme/ui".to_string(),
            temp.path().join("packages/ui"),
        )]);

        let from = temp.path().join("packages/app/src/main.ts");
        assert_eq!(
            resolver.resolve("@acme/ui", &from, false),
            Resolution::Workspace {
                package: "@acme/ui".to_string(),
                path: temp.path().join("packages/ui/src/index.ts"),
            }
        );
    }

    #[test]
    fn test_node_modules_is_external() {
        let temp = TempDir::new().unwrap();
        write(
            &temp.path().join("node_modules/lodash/package.json"),
            r#"{"name": "lodash", "main": "index.js"}"#,
        );
        write(&temp.path().join("node_modules/lodash/index.js"), "");

        let resolver = resolver_at(&temp);
        let from = temp.path().join("src/main.ts");
        assert_eq!(
            resolver.resolve("lodash/merge", &from, false),
            Resolution::External {
                package: "lodash".to_string(),
                subpath: Some("merge".to_string()),
            }
        );
    }

    #[test]
    fn test_builtin() {
        let temp = TempDir::new().unwrap();
        let resolver = resolver_at(&temp);
        let from = temp.path().join("src/main.ts");
        assert_eq!(resolver.resolve("node:fs", &from, false), Resolution::Builtin);
        assert_eq!(resolver.resolve("path", &from, false), Resolution::Builtin);
    }

    #[test]
    fn test_declared_fallback_prefers_longest() {
        let temp = TempDir::new().unwrap();
        let mut names = BTreeSet::new();
        names.insert("foo".to_string());
        names.insert("foo-bar".to_string());

        let resolver = resolver_at(&temp)
            .with_declared(vec![(temp.path().to_path_buf(), names)]);

        let from = temp.path().join("src/main.ts");
        assert_eq!(
            resolver.resolve("foo-bar/lib", &from, false),
            Resolution::External {
                package: "foo-bar".to_string(),
                subpath: Some("lib".to_string()),
            }
        );
    }

    #[test]
    fn test_undeclared_bare_is_unresolved() {
        let temp = TempDir::new().unwrap();
        let resolver = resolver_at(&temp);
        let from = temp.path().join("src/main.ts");
        assert_eq!(
            resolver.resolve("ghost-package", &from, false),
            Resolution::Unresolved
        );
    }

    #[test]
    fn test_exports_map_conditions() {
        let exports: serde_json::Value = serde_json::from_str(
            r#"{".": {"types": "./index.d.ts", "import": "./index.mjs", "default": "./index.js"}}"#,
        )
        .unwrap();

        assert_eq!(
            resolve_exports_map(&exports, None, true),
            Some("./index.d.ts".to_string())
        );
        assert_eq!(
            resolve_exports_map(&exports, None, false),
            Some("./index.mjs".to_string())
        );
    }

    #[test]
    fn test_exports_map_star_subpath() {
        let exports: serde_json::Value =
            serde_json::from_str(r#"{"./*": "./lib/*.js"}"#).unwrap();

        assert_eq!(
            resolve_exports_map(&exports, Some("merge"), false),
            Some("./lib/merge.js".to_string())
        );
    }
}
