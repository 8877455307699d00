use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::scripts::extract_commands;

/// A per-tool adapter. Detection is cheap (file presence, declared dep,
/// script marker); `resolve` runs at most once per workspace and must be
/// pure.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn config_patterns(&self) -> &[&str];

    fn entry_patterns(&self) -> &[&str];

    /// Markers in manifest `scripts` values that imply the tool is in use
    /// (the binary name, typically).
    fn script_markers(&self) -> &[&str] {
        &[]
    }

    fn is_enabled(&self, dir: &Path, ctx: &PluginContext) -> bool {
        find_config_file(dir, self.config_patterns()).is_some()
            || self
                .script_markers()
                .iter()
                .any(|marker| ctx.has_script_invoking(marker))
    }

    fn resolve(&self, dir: &Path, ctx: &PluginContext) -> Result<PluginOutput>;

    fn production_entry_patterns(&self) -> &[&str] {
        self.entry_patterns()
    }
}

/// What a plugin sees of a workspace: the declared dependency names, the
/// manifest `scripts`, and the manifest `main` field.
#[derive(Debug, Clone, Default)]
pub struct PluginContext {
    pub dependencies: HashSet<String>,
    pub dev_dependencies: HashSet<String>,
    pub scripts: BTreeMap<String, String>,
    pub main: Option<String>,
    pub production: bool,
}

impl PluginContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dependencies(mut self, deps: HashSet<String>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn with_dev_dependencies(mut self, deps: HashSet<String>) -> Self {
        self.dev_dependencies = deps;
        self
    }

    pub fn with_scripts(mut self, scripts: BTreeMap<String, String>) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn with_main(mut self, main: Option<String>) -> Self {
        self.main = main;
        self
    }

    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    pub fn has_dependency(&self, name: &str) -> bool {
        self.dependencies.contains(name) || self.dev_dependencies.contains(name)
    }

    pub fn has_any_dependency(&self, names: &[&str]) -> bool {
        names.iter().any(|name| self.has_dependency(name))
    }

    /// True when any script line invokes `binary` as a command.
    pub fn has_script_invoking(&self, binary: &str) -> bool {
        self.scripts.values().any(|line| {
            extract_commands(line)
                .iter()
                .any(|cmd| cmd.binary == binary)
        })
    }
}

/// A dependency a plugin vouches for regardless of source-level imports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributedDep {
    pub name: String,
    pub production: bool,
}

impl AttributedDep {
    pub fn dev(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            production: false,
        }
    }

    pub fn production(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            production: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PluginOutput {
    pub entries: Vec<String>,
    pub project_patterns: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub dependencies: Vec<AttributedDep>,
}

impl PluginOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
    }

    pub fn add_ignore(&mut self, pattern: impl Into<String>) {
        self.ignore_patterns.push(pattern.into());
    }

    pub fn attribute(&mut self, dep: AttributedDep) {
        self.dependencies.push(dep);
    }
}

pub fn find_config_file(dir: &Path, patterns: &[&str]) -> Option<PathBuf> {
    for pattern in patterns {
        let path = dir.join(pattern);
        if path.exists() {
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_context_default() {
        let ctx = PluginContext::default();
        assert!(ctx.dependencies.is_empty());
        assert!(!ctx.production);
    }

    #[test]
    fn test_has_script_invoking() {
        let mut scripts = BTreeMap::new();
        scripts.insert("test".to_string(), "cross-env CI=1 jest --ci".to_string());
        let ctx = PluginContext::new().with_scripts(scripts);

        assert!(ctx.has_script_invoking("jest"));
        assert!(!ctx.has_script_invoking("vitest"));
        assert!(!ctx.has_script_invoking("cross-env"));
    }

    #[test]
    fn test_attributed_dep_constructors() {
        assert!(AttributedDep::production("expo-router").production);
        assert!(!AttributedDep::dev("jest").production);
    }
}
