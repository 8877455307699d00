use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;
use rayon::prelude::*;

use crate::cache::{compute_content_hash, get_modified_time, Cache, CacheEntry};
use crate::config::ResolvedConfig;
use crate::files::FileSets;
use crate::parser::{parse_source, Import, ParsedModule, ReExport};
use crate::resolver::{is_relative_specifier, ModuleResolver, Resolution, WorkspaceAliases};
use crate::workspace::WorkspaceTree;
use crate::Diagnostic;

use super::{
    Channel, Edge, EdgeTarget, FileId, FileInterner, ModuleGraph, ModuleNode, UnresolvedRef,
};

#[derive(Debug, Default)]
pub struct BuildOptions {
    pub cache: Option<Cache>,
    pub production: bool,
}

/// Build the reference graph: parse and extract every project file in
/// parallel, then run the deterministic worklist over the immutable
/// per-file records under a single writer.
pub fn build_graph(
    tree: &WorkspaceTree,
    resolved: &ResolvedConfig,
    file_sets: &FileSets,
    options: BuildOptions,
) -> Result<ModuleGraph> {
    let resolver = create_resolver(tree, resolved);

    let project_files: Vec<PathBuf> = file_sets.project_universe().into_iter().collect();
    let (parsed, mut diagnostics) = parse_all(&project_files, options.cache);

    let mut graph = ModuleGraph::default();
    graph.diagnostics.append(&mut diagnostics);

    // Intern in sorted order so ids are stable across runs.
    for (path, _) in &parsed {
        graph.interner.intern(path);
    }

    for (path, module) in parsed {
        let id = graph.interner.intern(&path);
        let node = make_node(&mut graph.interner, tree, &resolver, id, &path, module);
        graph.modules.insert(id, node);
    }

    // Entries ordered by workspace depth (ancestors first), then path.
    let mut entries: Vec<(usize, PathBuf)> = Vec::new();
    for (ws, files) in file_sets.by_workspace.iter().enumerate() {
        for entry in &files.entries {
            entries.push((tree.get(ws).depth, entry.clone()));
        }
    }
    entries.sort();
    entries.dedup();
    graph.entries = entries
        .iter()
        .filter_map(|(_, path)| graph.interner.get(path))
        .collect();

    run_worklist(&mut graph, tree, &resolver);

    Ok(graph)
}

fn create_resolver(tree: &WorkspaceTree, resolved: &ResolvedConfig) -> ModuleResolver {
    let mut aliases = Vec::new();
    for ws in &tree.workspaces {
        let mut paths: Vec<(String, Vec<String>)> = Vec::new();
        let mut base_url = None;
        if let Some(tsconfig) = &ws.tsconfig {
            for (pattern, targets) in &tsconfig.compiler_options.paths {
                paths.push((pattern.clone(), targets.clone()));
            }
            base_url = tsconfig
                .compiler_options
                .base_url
                .as_ref()
                .map(|b| ws.dir.join(b));
        }
        if ws.dir == tree.root {
            for (pattern, targets) in &resolved.config.paths {
                paths.push((pattern.clone(), targets.clone()));
            }
        }
        if !paths.is_empty() || base_url.is_some() {
            aliases.push(WorkspaceAliases {
                dir: ws.dir.clone(),
                base_url,
                paths,
            });
        }
    }

    let declared = tree
        .workspaces
        .iter()
        .map(|ws| {
            let mut names: BTreeSet<String> = BTreeSet::new();
            names.extend(ws.manifest.dependencies.keys().cloned());
            names.extend(ws.manifest.dev_dependencies.keys().cloned());
            names.extend(ws.manifest.peer_dependencies.keys().cloned());
            names.extend(ws.manifest.optional_dependencies.keys().cloned());
            (ws.dir.clone(), names)
        })
        .collect();

    ModuleResolver::new(tree.root.clone())
        .with_aliases(aliases)
        .with_siblings(tree.sibling_dirs())
        .with_declared(declared)
}

/// Parse and extract in parallel. Parse failures admit the file with an
/// empty record and a diagnostic, so one broken file cannot cascade.
fn parse_all(
    files: &[PathBuf],
    cache: Option<Cache>,
) -> (Vec<(PathBuf, ParsedModule)>, Vec<Diagnostic>) {
    let cache = cache.map(Mutex::new);

    let mut results: Vec<(PathBuf, ParsedModule, Option<Diagnostic>)> = files
        .par_iter()
        .map(|path| {
            let content = match std::fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    let diagnostic = Diagnostic {
                        path: Some(path.clone()),
                        message: format!("failed to read file: {}", e),
                    };
                    return (path.clone(), ParsedModule::default(), Some(diagnostic));
                }
            };

            if let Some(cache_mutex) = &cache {
                let content_hash = compute_content_hash(&content);
                if let Ok(guard) = cache_mutex.lock() {
                    if let Some(entry) = guard.get(path) {
                        if entry.content_hash == content_hash {
                            return (path.clone(), entry.module.clone(), None);
                        }
                    }
                }

                let (module, diagnostic) = parse_lenient(&content, path);
                if diagnostic.is_none() {
                    let entry =
                        CacheEntry::new(content_hash, get_modified_time(path), module.clone());
                    if let Ok(mut guard) = cache_mutex.lock() {
                        guard.insert(path.clone(), entry);
                    }
                }
                return (path.clone(), module, diagnostic);
            }

            let (module, diagnostic) = parse_lenient(&content, path);
            (path.clone(), module, diagnostic)
        })
        .collect();

    if let Some(cache_mutex) = cache {
        if let Ok(cache) = cache_mutex.into_inner() {
            let _ = cache.save();
        }
    }

    results.sort_by(|a, b| a.0.cmp(&b.0));

    let mut diagnostics = Vec::new();
    let parsed = results
        .into_iter()
        .map(|(path, module, diagnostic)| {
            if let Some(d) = diagnostic {
                diagnostics.push(d);
            }
            (path, module)
        })
        .collect();

    (parsed, diagnostics)
}

fn parse_lenient(content: &str, path: &Path) -> (ParsedModule, Option<Diagnostic>) {
    match parse_source(content, path) {
        Ok(module) => (module, None),
        Err(e) => (
            ParsedModule::default(),
            Some(Diagnostic {
                path: Some(path.to_path_buf()),
                message: format!("parse error: {}", e),
            }),
        ),
    }
}

fn make_node(
    interner: &mut FileInterner,
    tree: &WorkspaceTree,
    resolver: &ModuleResolver,
    id: FileId,
    path: &Path,
    parsed: ParsedModule,
) -> ModuleNode {
    let workspace = tree.owner_of(path);
    let mut edges = Vec::new();

    for import in &parsed.imports {
        edges.push(import_edge(interner, resolver, path, import));
    }
    for re_export in &parsed.re_exports {
        edges.push(re_export_edge(interner, resolver, path, re_export));
    }

    ModuleNode {
        file: id,
        workspace,
        parsed,
        edges,
    }
}

fn import_edge(
    interner: &mut FileInterner,
    resolver: &ModuleResolver,
    from: &Path,
    import: &Import,
) -> Edge {
    let target = resolve_target(interner, resolver, &import.specifier, from, import.is_type_only);
    Edge {
        specifier: import.specifier.clone(),
        names: import.imported_names.clone(),
        is_type_only: import.is_type_only,
        is_side_effect: import.is_side_effect,
        is_re_export: false,
        line: import.line,
        col: import.col,
        target,
    }
}

fn re_export_edge(
    interner: &mut FileInterner,
    resolver: &ModuleResolver,
    from: &Path,
    re_export: &ReExport,
) -> Edge {
    let target = resolve_target(
        interner,
        resolver,
        &re_export.specifier,
        from,
        re_export.is_type_only,
    );
    let names = re_export
        .exported_names
        .iter()
        .map(|n| crate::parser::ImportedName {
            name: n.name.clone(),
            alias: n.alias.clone(),
            is_type: n.is_type,
        })
        .collect();
    Edge {
        specifier: re_export.specifier.clone(),
        names,
        is_type_only: re_export.is_type_only,
        is_side_effect: false,
        is_re_export: true,
        line: re_export.line,
        col: re_export.col,
        target,
    }
}

fn resolve_target(
    interner: &mut FileInterner,
    resolver: &ModuleResolver,
    specifier: &str,
    from: &Path,
    type_only: bool,
) -> EdgeTarget {
    match resolver.resolve(specifier, from, type_only) {
        Resolution::Internal(path) => EdgeTarget::Internal(interner.intern(&path)),
        Resolution::Workspace { package, path } => EdgeTarget::Workspace {
            package,
            file: interner.intern(&path),
        },
        Resolution::External { package, subpath } => EdgeTarget::External { package, subpath },
        Resolution::Builtin => EdgeTarget::Builtin,
        Resolution::Unresolved => EdgeTarget::Unresolved,
    }
}

/// FIFO fixpoint over (file, channel) pairs. Monotonic over a finite
/// universe, so it terminates; the seed order makes the output
/// reproducible byte for byte.
fn run_worklist(graph: &mut ModuleGraph, tree: &WorkspaceTree, resolver: &ModuleResolver) {
    let mut queue: VecDeque<(FileId, Channel)> = graph
        .entries
        .iter()
        .map(|id| (*id, Channel::Value))
        .collect();

    while let Some((id, channel)) = queue.pop_front() {
        let reach = graph.reach.entry(id).or_default();
        if reach.has(channel) {
            continue;
        }
        let first_visit = !reach.any();
        reach.mark(channel);

        if !graph.modules.contains_key(&id) {
            // Reached a repository file outside the pre-parsed project
            // set; admit it lazily.
            let path = graph.interner.path(id).to_path_buf();
            let (module, diagnostic) = match std::fs::read_to_string(&path) {
                Ok(content) => parse_lenient(&content, &path),
                Err(e) => (
                    ParsedModule::default(),
                    Some(Diagnostic {
                        path: Some(path.clone()),
                        message: format!("failed to read file: {}", e),
                    }),
                ),
            };
            if let Some(d) = diagnostic {
                graph.diagnostics.push(d);
            }
            let node = make_node(&mut graph.interner, tree, resolver, id, &path, module);
            graph.modules.insert(id, node);
        }

        let node = &graph.modules[&id];
        let workspace = node.workspace;
        let mut internal: Vec<(FileId, Channel)> = Vec::new();
        let mut external: Vec<(String, bool)> = Vec::new();
        let mut unresolved: Vec<UnresolvedRef> = Vec::new();

        for edge in &node.edges {
            let edge_channel = if channel == Channel::Type || edge.is_type_only {
                Channel::Type
            } else {
                Channel::Value
            };

            match &edge.target {
                EdgeTarget::Internal(target) => internal.push((*target, edge_channel)),
                EdgeTarget::Workspace { package, file } => {
                    internal.push((*file, edge_channel));
                    external.push((package.clone(), edge_channel == Channel::Type));
                }
                EdgeTarget::External { package, .. } => {
                    external.push((package.clone(), edge_channel == Channel::Type));
                }
                EdgeTarget::Builtin => {}
                EdgeTarget::Unresolved => unresolved.push(UnresolvedRef {
                    file: id,
                    workspace,
                    specifier: edge.specifier.clone(),
                    line: edge.line,
                    col: edge.col,
                    is_bare: !is_relative_specifier(&edge.specifier),
                }),
            }
        }

        if first_visit {
            for (line, col) in node
                .parsed
                .dynamic_imports
                .iter()
                .map(|d| (d.line, d.col))
                .collect::<Vec<_>>()
            {
                graph.dynamic_sites.push((id, line, col));
            }
        }

        for (target, edge_channel) in internal {
            let target_reach = graph.reach.entry(target).or_default();
            if !target_reach.has(edge_channel) {
                queue.push_back((target, edge_channel));
            }
        }
        for (package, type_only) in external {
            let entry = graph
                .external_refs
                .entry((workspace, package))
                .or_default();
            if type_only {
                entry.type_files.insert(id);
            } else {
                entry.value_files.insert(id);
            }
        }
        if first_visit {
            graph.unresolved.extend(unresolved);
        }
    }

    graph.unresolved.sort_by(|a, b| {
        (a.file, a.line, a.col, &a.specifier).cmp(&(b.file, b.line, b.col, &b.specifier))
    });
    graph.dynamic_sites.sort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::collect_file_sets;
    use crate::plugins::WorkspacePluginOutput;
    use std::fs;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn build(temp: &TempDir, config: crate::config::Config) -> (WorkspaceTree, ModuleGraph) {
        let tree = WorkspaceTree::load(temp.path()).unwrap();
        let resolved = ResolvedConfig {
            root: tree.root.clone(),
            config,
        };
        let outputs: Vec<WorkspacePluginOutput> = tree
            .workspaces
            .iter()
            .map(|_| WorkspacePluginOutput::default())
            .collect();
        let sets = collect_file_sets(&tree, &resolved, &outputs, false).unwrap();
        let graph = build_graph(&tree, &resolved, &sets, BuildOptions::default()).unwrap();
        (tree, graph)
    }

    fn entry_config(entry: &str) -> crate::config::Config {
        crate::config::Config {
            entry: vec![entry.to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_reachability_closure() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("package.json"), r#"{"name": "p"}"#);
        write(&temp.path().join("src/index.ts"), "import './a';");
        write(&temp.path().join("src/a.ts"), "import './b';");
        write(&temp.path().join("src/b.ts"), "export const b = 1;");
        write(&temp.path().join("src/orphan.ts"), "export const o = 1;");

        let (tree, graph) = build(&temp, entry_config("src/index.ts"));
        let reachable = graph.reachable_files(false);

        let id_of = |p: &str| graph.interner.get(&tree.root.join(p)).unwrap();
        assert!(reachable.contains(&id_of("src/index.ts")));
        assert!(reachable.contains(&id_of("src/a.ts")));
        assert!(reachable.contains(&id_of("src/b.ts")));
        assert!(!reachable.contains(&id_of("src/orphan.ts")));
    }

    #[test]
    fn test_cycle_terminates() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("package.json"), r#"{"name": "p"}"#);
        write(&temp.path().join("src/index.ts"), "import './a';");
        write(&temp.path().join("src/a.ts"), "import './b';");
        write(&temp.path().join("src/b.ts"), "import './a'; import './index';");

        let (_, graph) = build(&temp, entry_config("src/index.ts"));
        assert_eq!(graph.reachable_files(false).len(), 3);
    }

    #[test]
    fn test_type_only_channel() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("package.json"), r#"{"name": "p"}"#);
        write(
            &temp.path().join("src/index.ts"),
            "import type { T } from './types';",
        );
        write(&temp.path().join("src/types.ts"), "export type T = number;");

        let (tree, graph) = build(&temp, entry_config("src/index.ts"));
        let types_id = graph.interner.get(&tree.root.join("src/types.ts")).unwrap();

        let reach = graph.reach[&types_id];
        assert!(reach.types);
        assert!(!reach.value);
        assert!(graph.reachable_files(false).contains(&types_id));
        assert!(!graph.reachable_files(true).contains(&types_id));
    }

    #[test]
    fn test_type_channel_propagates() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("package.json"), r#"{"name": "p"}"#);
        write(
            &temp.path().join("src/index.ts"),
            "import type { T } from './types';",
        );
        write(
            &temp.path().join("src/types.ts"),
            "import { helper } from './helper'; export type T = typeof helper;",
        );
        write(&temp.path().join("src/helper.ts"), "export const helper = 1;");

        let (tree, graph) = build(&temp, entry_config("src/index.ts"));
        let helper_id = graph.interner.get(&tree.root.join("src/helper.ts")).unwrap();

        // Reached only through a type-only file, so the value import
        // inside it stays in the type channel.
        let reach = graph.reach[&helper_id];
        assert!(reach.types);
        assert!(!reach.value);
    }

    #[test]
    fn test_external_attribution() {
        let temp = TempDir::new().unwrap();
        write(
            &temp.path().join("package.json"),
            r#"{"name": "p", "dependencies": {"lodash": "4.0.0"}}"#,
        );
        write(
            &temp.path().join("src/index.ts"),
            "import _ from 'lodash'; import type { L } from 'lodash';",
        );

        let (_, graph) = build(&temp, entry_config("src/index.ts"));
        let usage = &graph.external_refs[&(0usize, "lodash".to_string())];
        assert_eq!(usage.value_files.len(), 1);
        assert_eq!(usage.type_files.len(), 1);
    }

    #[test]
    fn test_unresolved_classification() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("package.json"), r#"{"name": "p"}"#);
        write(
            &temp.path().join("src/index.ts"),
            "import './missing'; import 'ghost-pkg';",
        );

        let (_, graph) = build(&temp, entry_config("src/index.ts"));
        assert_eq!(graph.unresolved.len(), 2);

        let relative = graph
            .unresolved
            .iter()
            .find(|u| u.specifier == "./missing")
            .unwrap();
        assert!(!relative.is_bare);

        let bare = graph
            .unresolved
            .iter()
            .find(|u| u.specifier == "ghost-pkg")
            .unwrap();
        assert!(bare.is_bare);
    }

    #[test]
    fn test_broken_file_admitted_empty() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("package.json"), r#"{"name": "p"}"#);
        write(&temp.path().join("src/index.ts"), "import './broken';");
        write(&temp.path().join("src/broken.ts"), "import { from ???");

        let (tree, graph) = build(&temp, entry_config("src/index.ts"));
        let broken_id = graph.interner.get(&tree.root.join("src/broken.ts")).unwrap();

        assert!(graph.reachable_files(false).contains(&broken_id));
        assert!(graph
            .diagnostics
            .iter()
            .any(|d| d.message.contains("parse error")));
    }

    #[test]
    fn test_deterministic_entry_order() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("package.json"), r#"{"name": "p"}"#);
        write(&temp.path().join("src/a.ts"), "export {};");
        write(&temp.path().join("src/b.ts"), "export {};");

        let config = crate::config::Config {
            entry: vec!["src/b.ts".to_string(), "src/a.ts".to_string()],
            ..Default::default()
        };
        let (tree, graph) = build(&temp, config);

        let paths: Vec<PathBuf> = graph
            .entries
            .iter()
            .map(|id| graph.interner.path(*id).to_path_buf())
            .collect();
        assert_eq!(
            paths,
            vec![tree.root.join("src/a.ts"), tree.root.join("src/b.ts")]
        );
    }
}
