use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use crate::config::{ResolvedConfig, RuleLevel};
use crate::files::FileSets;
use crate::graph::{FileId, ModuleGraph};
use crate::parser::ExportKind;
use crate::plugins::WorkspacePluginOutput;
use crate::resolver::parse_package_specifier;
use crate::scripts::{extract_commands, OS_BINARIES};
use crate::workspace::{DepBucket, WorkspaceTree};
use crate::{
    Issues, Severity, UnlistedBinary, UnlistedDependency, UnresolvedImport, UnusedDependency,
    UnusedExport, UnusedFile, UnusedMember,
};

/// Always treated as used when declared: packages whose whole job is to
/// exist at build or runtime without ever being imported, plus the types
/// for Node builtins.
const IMPLICIT_DEPENDENCIES: &[&str] =
    &["tslib", "core-js", "regenerator-runtime", "@types/node"];

pub struct AnalyzerInput<'a> {
    pub tree: &'a WorkspaceTree,
    pub resolved: &'a ResolvedConfig,
    pub file_sets: &'a FileSets,
    pub plugin_outputs: &'a [WorkspacePluginOutput],
    pub graph: &'a ModuleGraph,
    pub production: bool,
    /// Only value-channel references count toward "used dependency".
    pub strict: bool,
}

/// Derived reports over the reference graph. Pure queries; the graph is
/// immutable from here on.
pub fn classify(input: &AnalyzerInput) -> Issues {
    let mut issues = Issues::default();

    if input.kind_enabled("files") {
        issues.files = find_unused_files(input);
    }
    let deps_enabled = input.kind_enabled("dependencies");
    let dev_deps_enabled = input.kind_enabled("devDependencies");
    if deps_enabled || dev_deps_enabled {
        let (deps, dev_deps) = find_unused_dependencies(input);
        if deps_enabled {
            issues.dependencies = deps;
        }
        if dev_deps_enabled {
            issues.dev_dependencies = dev_deps;
        }
    }
    if input.kind_enabled("unlisted") {
        issues.unlisted = find_unlisted_dependencies(input);
    }
    if input.kind_enabled("binaries") {
        issues.binaries = find_unlisted_binaries(input);
    }
    let exports_enabled = input.kind_enabled("exports");
    let types_enabled = input.kind_enabled("types");
    let enum_members_enabled =
        input.kind_enabled("enumMembers") && input.resolved.config.rules.enum_members.is_enabled();
    let class_members_enabled = input.kind_enabled("classMembers")
        && input.resolved.config.rules.class_members.is_enabled();
    if exports_enabled || types_enabled || enum_members_enabled || class_members_enabled {
        let exports = find_unused_exports(input, enum_members_enabled, class_members_enabled);
        if exports_enabled {
            issues.exports = exports.exports;
        }
        if types_enabled {
            issues.types = exports.types;
        }
        issues.enum_members = exports.enum_members;
        issues.class_members = exports.class_members;
    }
    if input.kind_enabled("unresolved") {
        issues.unresolved = find_unresolved_imports(input);
    }

    issues
}

impl AnalyzerInput<'_> {
    fn kind_enabled(&self, kind: &str) -> bool {
        let config = &self.resolved.config;
        if !config.include.is_empty() && !config.include.iter().any(|k| k == kind) {
            return false;
        }
        if config.exclude.iter().any(|k| k == kind) {
            return false;
        }
        let rules = &config.rules;
        let level = match kind {
            "files" => rules.files,
            "dependencies" => rules.dependencies,
            "devDependencies" => rules.dev_dependencies,
            "exports" => rules.exports,
            "types" => rules.types,
            "unlisted" => rules.unlisted,
            "binaries" => rules.binaries,
            "unresolved" => rules.unresolved,
            "enumMembers" => rules.enum_members,
            "classMembers" => rules.class_members,
            _ => RuleLevel::Error,
        };
        level.is_enabled()
    }

    fn severity_of(&self, kind: &str) -> Severity {
        let rules = &self.resolved.config.rules;
        let level = match kind {
            "files" => rules.files,
            "dependencies" => rules.dependencies,
            "devDependencies" => rules.dev_dependencies,
            "exports" => rules.exports,
            "types" => rules.types,
            "unlisted" => rules.unlisted,
            "binaries" => rules.binaries,
            "unresolved" => rules.unresolved,
            "enumMembers" => rules.enum_members,
            "classMembers" => rules.class_members,
            _ => RuleLevel::Error,
        };
        match level {
            RuleLevel::Warn => Severity::Warn,
            _ => Severity::Error,
        }
    }

    fn dep_ignored(&self, workspace: usize, name: &str) -> bool {
        let label = self.tree.relative_label(workspace);
        let mut patterns: Vec<&str> = self
            .resolved
            .config
            .ignore_dependencies
            .iter()
            .map(|s| s.as_str())
            .collect();
        if let Some(overrides) = self.resolved.workspace_overrides(&label) {
            patterns.extend(overrides.ignore_dependencies.iter().map(|s| s.as_str()));
        }
        patterns.iter().any(|p| name_matches(p, name))
    }

    fn binary_ignored(&self, workspace: usize, name: &str) -> bool {
        let label = self.tree.relative_label(workspace);
        let mut patterns: Vec<&str> = self
            .resolved
            .config
            .ignore_binaries
            .iter()
            .map(|s| s.as_str())
            .collect();
        if let Some(overrides) = self.resolved.workspace_overrides(&label) {
            patterns.extend(overrides.ignore_binaries.iter().map(|s| s.as_str()));
        }
        patterns.iter().any(|p| name_matches(p, name))
    }

    /// Did source-level references or a plugin attribution mark this
    /// package used in this workspace?
    fn dep_used_in(&self, workspace: usize, name: &str) -> bool {
        if let Some(usage) = self
            .graph
            .external_refs
            .get(&(workspace, name.to_string()))
        {
            if !usage.value_files.is_empty() {
                return true;
            }
            if !self.strict && !usage.type_files.is_empty() {
                return true;
            }
        }
        self.plugin_outputs[workspace]
            .dependencies
            .iter()
            .any(|dep| dep.name == name && (!self.production || dep.production))
    }
}

fn name_matches(pattern: &str, name: &str) -> bool {
    if pattern == name {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return name.starts_with(prefix);
    }
    false
}

fn find_unused_files(input: &AnalyzerInput) -> Vec<UnusedFile> {
    let reachable = input.graph.reachable_files(input.production);
    let mut unused = Vec::new();

    for (ws, files) in input.file_sets.by_workspace.iter().enumerate() {
        let ws_dir = &input.tree.get(ws).dir;
        let label = input.tree.relative_label(ws);

        for path in &files.project {
            let id = input.graph.interner.get(path);
            if id.is_some_and(|id| reachable.contains(&id)) {
                continue;
            }
            if files.is_ignored(ws_dir, path) {
                continue;
            }
            unused.push(UnusedFile {
                path: path.clone(),
                workspace: label.clone(),
                severity: input.severity_of("files"),
            });
        }
    }

    unused.sort_by(|a, b| a.path.cmp(&b.path));
    unused
}

fn find_unused_dependencies(
    input: &AnalyzerInput,
) -> (Vec<UnusedDependency>, Vec<UnusedDependency>) {
    let mut unused = Vec::new();
    let mut unused_dev = Vec::new();

    for ws in input.tree.deepest_first() {
        let workspace = input.tree.get(ws);
        let label = input.tree.relative_label(ws);
        let descendants = input.tree.descendants(ws);

        let mut declared: Vec<(&String, DepBucket)> = workspace
            .manifest
            .dependencies
            .keys()
            .map(|name| (name, DepBucket::Production))
            .chain(
                workspace
                    .manifest
                    .dev_dependencies
                    .keys()
                    .map(|name| (name, DepBucket::Development)),
            )
            .collect();
        declared.sort();

        for (name, bucket) in declared {
            if bucket == DepBucket::Development && input.production {
                continue;
            }
            if input.dep_ignored(ws, name) {
                continue;
            }
            if IMPLICIT_DEPENDENCIES.contains(&name.as_str()) {
                continue;
            }
            if input.dep_used_in(ws, name) {
                continue;
            }

            // `@types/foo` lives and dies with `foo`.
            if let Some(base) = typed_package_base(name) {
                if input.dep_used_in(ws, &base) {
                    continue;
                }
            }

            // A dep declared here on behalf of a descendant that uses it
            // without declaring it is not unused.
            let used_by_descendant = descendants.iter().any(|&d| {
                !input.tree.get(d).declares(name) && input.dep_used_in(d, name)
            });
            if used_by_descendant {
                continue;
            }

            let issue = UnusedDependency {
                name: name.clone(),
                workspace: label.clone(),
                manifest_path: workspace.manifest_path.clone(),
                is_dev: bucket == DepBucket::Development,
                severity: input.severity_of(if bucket == DepBucket::Development {
                    "devDependencies"
                } else {
                    "dependencies"
                }),
            };
            if bucket == DepBucket::Development {
                unused_dev.push(issue);
            } else {
                unused.push(issue);
            }
        }
    }

    unused.sort_by(|a, b| (&a.workspace, &a.name).cmp(&(&b.workspace, &b.name)));
    unused_dev.sort_by(|a, b| (&a.workspace, &a.name).cmp(&(&b.workspace, &b.name)));
    (unused, unused_dev)
}

/// `@types/node` → `node`, `@types/babel__core` → `@babel/core`.
fn typed_package_base(name: &str) -> Option<String> {
    let base = name.strip_prefix("@types/")?;
    Some(match base.split_once("__") {
        Some((scope, rest)) => format!("@{}/{}", scope, rest),
        None => base.to_string(),
    })
}

fn find_unlisted_dependencies(input: &AnalyzerInput) -> Vec<UnlistedDependency> {
    // (workspace, package) → referring files.
    let mut candidates: BTreeMap<(usize, String), BTreeSet<FileId>> = BTreeMap::new();

    for ((ws, package), usage) in &input.graph.external_refs {
        candidates
            .entry((*ws, package.clone()))
            .or_default()
            .extend(usage.all_files());
    }
    for unresolved in &input.graph.unresolved {
        if !unresolved.is_bare {
            continue;
        }
        let (package, _) = parse_package_specifier(&unresolved.specifier);
        candidates
            .entry((unresolved.workspace, package.to_string()))
            .or_default()
            .insert(unresolved.file);
    }

    let mut effective: Vec<HashSet<String>> = Vec::with_capacity(input.tree.workspaces.len());
    for ws in 0..input.tree.workspaces.len() {
        effective.push(input.tree.effective_deps(ws));
    }

    let mut unlisted = Vec::new();
    for ((ws, package), files) in candidates {
        if effective[ws].contains(&package) {
            continue;
        }
        if package.starts_with("@types/") {
            continue;
        }
        // A workspace importing itself through its own `exports` map.
        if input.tree.get(ws).name == package {
            continue;
        }
        if input.dep_ignored(ws, &package) {
            continue;
        }

        unlisted.push(UnlistedDependency {
            name: package,
            workspace: input.tree.relative_label(ws),
            used_in: files
                .iter()
                .map(|id| input.graph.interner.path(*id).to_path_buf())
                .collect(),
            severity: input.severity_of("unlisted"),
        });
    }

    unlisted.sort_by(|a, b| (&a.workspace, &a.name).cmp(&(&b.workspace, &b.name)));
    unlisted
}

fn find_unlisted_binaries(input: &AnalyzerInput) -> Vec<UnlistedBinary> {
    let mut unlisted: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();

    for ws in 0..input.tree.workspaces.len() {
        let workspace = input.tree.get(ws);
        let label = input.tree.relative_label(ws);
        let installed = input.tree.effective_bins(ws);

        let mut scripts: Vec<(&String, &String)> = workspace.manifest.scripts.iter().collect();
        scripts.sort();

        for (script_name, line) in scripts {
            for command in extract_commands(line) {
                let binary = &command.binary;
                if OS_BINARIES.contains(binary.as_str()) {
                    continue;
                }
                if installed.contains(binary) {
                    continue;
                }
                if input.binary_ignored(ws, binary) {
                    continue;
                }
                unlisted
                    .entry((label.clone(), binary.clone()))
                    .or_default()
                    .insert(script_name.clone());
            }
        }
    }

    unlisted
        .into_iter()
        .map(|((workspace, name), scripts)| UnlistedBinary {
            name,
            workspace,
            scripts: scripts.into_iter().collect(),
            severity: input.severity_of("binaries"),
        })
        .collect()
}

#[derive(Default)]
struct ExportIssues {
    exports: Vec<UnusedExport>,
    types: Vec<UnusedExport>,
    enum_members: Vec<UnusedMember>,
    class_members: Vec<UnusedMember>,
}

fn find_unused_exports(
    input: &AnalyzerInput,
    enum_members_enabled: bool,
    class_members_enabled: bool,
) -> ExportIssues {
    let used_exports = input.graph.used_exports();
    let member_refs = input.graph.referenced_member_names();
    let escaped = input.graph.escaped_idents();
    let include_entry_exports = input.resolved.config.include_entry_exports;
    let suppress_tags = suppressing_tags(input);

    let mut issues = ExportIssues::default();

    for (id, node) in &input.graph.modules {
        if !input
            .graph
            .reach
            .get(id)
            .copied()
            .unwrap_or_default()
            .any()
        {
            continue;
        }

        let path = input.graph.interner.path(*id);
        let ws = node.workspace;
        let ws_dir = &input.tree.get(ws).dir;
        let files = &input.file_sets.by_workspace[ws];
        if !files.project.contains(path) || files.is_ignored(ws_dir, path) {
            continue;
        }

        let is_entry = input.graph.is_entry(*id);
        let used = used_exports.get(id);
        let label = input.tree.relative_label(ws);

        for export in &node.parsed.exports {
            let is_used = used.is_some_and(|u| u.contains(&export.name, export.is_default));

            // Member-level checks run for referenced container exports.
            if is_used || is_entry {
                if export.kind == ExportKind::Enum && enum_members_enabled {
                    issues.enum_members.extend(unused_members(
                        input, path, &label, export, &member_refs, &escaped, used, id,
                        "enumMembers",
                    ));
                }
                if export.kind == ExportKind::Class && class_members_enabled {
                    issues.class_members.extend(unused_members(
                        input, path, &label, export, &member_refs, &escaped, used, id,
                        "classMembers",
                    ));
                }
            }

            if is_used {
                continue;
            }
            if is_entry && !include_entry_exports {
                continue;
            }
            if export.tags.iter().any(|t| suppress_tags.contains(t)) {
                continue;
            }
            if input.resolved.config.ignore_exports_used_in_file
                && node.parsed.refs.idents.contains(&export.name)
            {
                continue;
            }

            let issue = UnusedExport {
                path: path.to_path_buf(),
                workspace: label.clone(),
                name: export.name.clone(),
                kind: export.kind,
                is_type: export.is_type,
                line: export.line,
                col: export.col,
                severity: input.severity_of(if export.is_type { "types" } else { "exports" }),
            };
            if export.is_type {
                issues.types.push(issue);
            } else {
                issues.exports.push(issue);
            }
        }
    }

    let sort = |v: &mut Vec<UnusedExport>| {
        v.sort_by(|a, b| (&a.path, a.line, &a.name).cmp(&(&b.path, b.line, &b.name)));
    };
    sort(&mut issues.exports);
    sort(&mut issues.types);
    issues
        .enum_members
        .sort_by(|a, b| (&a.path, a.line, &a.name).cmp(&(&b.path, b.line, &b.name)));
    issues
        .class_members
        .sort_by(|a, b| (&a.path, a.line, &a.name).cmp(&(&b.path, b.line, &b.name)));

    issues
}

fn suppressing_tags(input: &AnalyzerInput) -> BTreeSet<String> {
    let mut tags: BTreeSet<String> = ["public", "alias"]
        .into_iter()
        .map(str::to_string)
        .collect();
    if input.production {
        tags.insert("internal".to_string());
    }
    for tag in &input.resolved.config.tags {
        tags.insert(tag.trim_start_matches('@').to_string());
    }
    tags
}

#[allow(clippy::too_many_arguments)]
fn unused_members(
    input: &AnalyzerInput,
    path: &Path,
    workspace: &str,
    export: &crate::parser::Export,
    member_refs: &BTreeSet<String>,
    escaped: &BTreeSet<String>,
    used: Option<&crate::graph::UsedExports>,
    id: &FileId,
    kind: &str,
) -> Vec<UnusedMember> {
    // The container object escaping whole keeps every member alive.
    if escaped.contains(&export.name) || used.is_some_and(|u| u.all) {
        return Vec::new();
    }
    // Same when the declaring file itself lets the object loose.
    if let Some(node) = input.graph.modules.get(id) {
        if node.parsed.refs.escaped.contains(&export.name) {
            return Vec::new();
        }
    }

    export
        .members
        .iter()
        .filter(|member| !member_refs.contains(&member.name))
        .map(|member| UnusedMember {
            path: path.to_path_buf(),
            workspace: workspace.to_string(),
            parent: export.name.clone(),
            name: member.name.clone(),
            kind: member.kind,
            line: member.line,
            col: member.col,
            severity: input.severity_of(kind),
        })
        .collect()
}

fn find_unresolved_imports(input: &AnalyzerInput) -> Vec<UnresolvedImport> {
    let mut unresolved = Vec::new();

    for r in &input.graph.unresolved {
        if r.is_bare {
            continue;
        }
        let path = input.graph.interner.path(r.file);
        let ws_dir = &input.tree.get(r.workspace).dir;
        if input.file_sets.by_workspace[r.workspace].is_ignored(ws_dir, path) {
            continue;
        }
        unresolved.push(UnresolvedImport {
            path: path.to_path_buf(),
            workspace: input.tree.relative_label(r.workspace),
            specifier: r.specifier.clone(),
            line: r.line,
            col: r.col,
            severity: input.severity_of("unresolved"),
        });
    }

    unresolved.sort_by(|a, b| (&a.path, a.line, &a.specifier).cmp(&(&b.path, b.line, &b.specifier)));
    unresolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_package_base() {
        assert_eq!(typed_package_base("@types/node"), Some("node".to_string()));
        assert_eq!(
            typed_package_base("@types/babel__core"),
            Some("@babel/core".to_string())
        );
        assert_eq!(typed_package_base("lodash"), None);
    }

    #[test]
    fn test_name_matches_glob() {
        assert!(name_matches("eslint", "eslint"));
        assert!(name_matches("@storybook/*", "@storybook/react"));
        assert!(!name_matches("@storybook/*", "storybook"));
    }
}
