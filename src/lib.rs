pub mod analyzer;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod files;
pub mod graph;
pub mod parser;
pub mod plugins;
pub mod resolver;
pub mod scripts;
pub mod watch;
pub mod workspace;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;

use crate::analyzer::AnalyzerInput;
use crate::cache::{create_cache, create_cache_with_dir};
use crate::error::CullError;
use crate::graph::BuildOptions;
use crate::parser::{ExportKind, MemberKind};
use crate::plugins::{resolve_workspace_plugins, PluginContext, WorkspacePluginOutput};
use crate::workspace::WorkspaceTree;

#[derive(Debug, Default)]
pub struct AnalyzeOptions {
    pub cache: bool,
    pub cache_dir: Option<PathBuf>,
    /// Restrict entries to production surfaces and file reachability to
    /// the value channel.
    pub production: bool,
    /// Type-only references stop counting toward "used dependency".
    pub strict: bool,
    /// Issue-kind filters merged over the config file's own.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

pub fn analyze(path: &Path) -> Result<Report> {
    analyze_with_options(path, None, AnalyzeOptions::default())
}

pub fn analyze_with_config(path: &Path, config_path: Option<&Path>) -> Result<Report> {
    analyze_with_options(path, config_path, AnalyzeOptions::default())
}

pub fn analyze_with_options(
    path: &Path,
    config_path: Option<&Path>,
    options: AnalyzeOptions,
) -> Result<Report> {
    let start = Instant::now();

    let mut resolved = config::load_config(path, config_path)?;
    if !options.include.is_empty() {
        resolved.config.include = options.include.clone();
    }
    resolved.config.exclude.extend(options.exclude.iter().cloned());
    let tree = WorkspaceTree::load(&resolved.root)?;

    let plugin_outputs: Vec<WorkspacePluginOutput> = tree
        .workspaces
        .iter()
        .map(|ws| {
            let ctx = PluginContext::new()
                .with_dependencies(
                    ws.manifest
                        .dependencies
                        .keys()
                        .chain(ws.manifest.peer_dependencies.keys())
                        .chain(ws.manifest.optional_dependencies.keys())
                        .cloned()
                        .collect::<HashSet<_>>(),
                )
                .with_dev_dependencies(ws.manifest.dev_dependencies.keys().cloned().collect())
                .with_scripts(
                    ws.manifest
                        .scripts
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect::<BTreeMap<_, _>>(),
                )
                .with_main(ws.manifest.main.clone())
                .with_production(options.production);
            resolve_workspace_plugins(&ws.dir, &ctx, &resolved.config.plugins)
        })
        .collect();

    let file_sets =
        files::collect_file_sets(&tree, &resolved, &plugin_outputs, options.production)?;

    // An unreadable explicitly-named entry is fatal; everything else
    // demotes to a diagnostic.
    for ws_files in &file_sets.by_workspace {
        for entry in &ws_files.entries {
            if let Err(source) = std::fs::metadata(entry) {
                return Err(CullError::EntryRead {
                    path: entry.clone(),
                    source,
                }
                .into());
            }
        }
    }

    let cache = if let Some(dir) = &options.cache_dir {
        create_cache_with_dir(dir.clone(), options.cache)?
    } else {
        create_cache(&resolved.root, options.cache)?
    };

    let parse_start = Instant::now();
    let graph = graph::build_graph(
        &tree,
        &resolved,
        &file_sets,
        BuildOptions {
            cache,
            production: options.production,
        },
    )?;
    let parse_time = parse_start.elapsed().as_millis() as u64;

    let analysis_start = Instant::now();
    let input = AnalyzerInput {
        tree: &tree,
        resolved: &resolved,
        file_sets: &file_sets,
        plugin_outputs: &plugin_outputs,
        graph: &graph,
        production: options.production,
        strict: options.strict,
    };
    let issues = analyzer::classify(&input);
    let analysis_time = analysis_start.elapsed().as_millis() as u64;

    let counters = Counters::from_issues(&issues);
    let stats = Stats {
        files_analyzed: graph.modules.len(),
        workspaces: tree.workspaces.len(),
        duration_ms: start.elapsed().as_millis() as u64,
        parse_time_ms: parse_time,
        analysis_time_ms: analysis_time,
    };

    Ok(Report {
        issues,
        counters,
        diagnostics: graph.diagnostics,
        stats,
    })
}

/// The analysis result handed to reporters.
#[derive(Debug, Default)]
pub struct Report {
    pub issues: Issues,
    pub counters: Counters,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: Stats,
}

#[derive(Debug, Default)]
pub struct Issues {
    pub files: Vec<UnusedFile>,
    pub dependencies: Vec<UnusedDependency>,
    pub dev_dependencies: Vec<UnusedDependency>,
    pub unlisted: Vec<UnlistedDependency>,
    pub binaries: Vec<UnlistedBinary>,
    pub exports: Vec<UnusedExport>,
    pub types: Vec<UnusedExport>,
    pub enum_members: Vec<UnusedMember>,
    pub class_members: Vec<UnusedMember>,
    pub unresolved: Vec<UnresolvedImport>,
}

#[derive(Debug, Default)]
pub struct Counters {
    pub files: usize,
    pub dependencies: usize,
    pub dev_dependencies: usize,
    pub unlisted: usize,
    pub binaries: usize,
    pub exports: usize,
    pub types: usize,
    pub enum_members: usize,
    pub class_members: usize,
    pub unresolved: usize,
}

impl Counters {
    pub fn from_issues(issues: &Issues) -> Self {
        Self {
            files: issues.files.len(),
            dependencies: issues.dependencies.len(),
            dev_dependencies: issues.dev_dependencies.len(),
            unlisted: issues.unlisted.len(),
            binaries: issues.binaries.len(),
            exports: issues.exports.len(),
            types: issues.types.len(),
            enum_members: issues.enum_members.len(),
            class_members: issues.class_members.len(),
            unresolved: issues.unresolved.len(),
        }
    }

    pub fn total(&self) -> usize {
        self.files
            + self.dependencies
            + self.dev_dependencies
            + self.unlisted
            + self.binaries
            + self.exports
            + self.types
            + self.enum_members
            + self.class_members
            + self.unresolved
    }
}

#[derive(Debug, Default)]
pub struct Stats {
    pub files_analyzed: usize,
    pub workspaces: usize,
    pub duration_ms: u64,
    pub parse_time_ms: u64,
    pub analysis_time_ms: u64,
}

/// A demoted error attached to the report instead of aborting analysis.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub path: Option<PathBuf>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warn,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warn => "warn",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnusedFile {
    pub path: PathBuf,
    pub workspace: String,
    pub severity: Severity,
}

#[derive(Debug, Clone)]
pub struct UnusedDependency {
    pub name: String,
    pub workspace: String,
    pub manifest_path: PathBuf,
    pub is_dev: bool,
    pub severity: Severity,
}

#[derive(Debug, Clone)]
pub struct UnlistedDependency {
    pub name: String,
    pub workspace: String,
    pub used_in: Vec<PathBuf>,
    pub severity: Severity,
}

#[derive(Debug, Clone)]
pub struct UnlistedBinary {
    pub name: String,
    pub workspace: String,
    pub scripts: Vec<String>,
    pub severity: Severity,
}

#[derive(Debug, Clone)]
pub struct UnusedExport {
    pub path: PathBuf,
    pub workspace: String,
    pub name: String,
    pub kind: ExportKind,
    pub is_type: bool,
    pub line: u32,
    pub col: u32,
    pub severity: Severity,
}

#[derive(Debug, Clone)]
pub struct UnusedMember {
    pub path: PathBuf,
    pub workspace: String,
    /// The enum or class the member belongs to.
    pub parent: String,
    pub name: String,
    pub kind: MemberKind,
    pub line: u32,
    pub col: u32,
    pub severity: Severity,
}

#[derive(Debug, Clone)]
pub struct UnresolvedImport {
    pub path: PathBuf,
    pub workspace: String,
    pub specifier: String,
    pub line: u32,
    pub col: u32,
    pub severity: Severity,
}
