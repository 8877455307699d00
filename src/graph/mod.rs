mod builder;

pub use builder::{build_graph, BuildOptions};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::parser::{ImportedName, ParsedModule};
use crate::Diagnostic;

/// Interned file handle. Files are created lazily on first reference and
/// compare by id, which keeps cyclic import graphs cheap to traverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub u32);

#[derive(Debug, Default)]
pub struct FileInterner {
    paths: Vec<PathBuf>,
    ids: HashMap<PathBuf, FileId>,
}

impl FileInterner {
    pub fn intern(&mut self, path: &Path) -> FileId {
        if let Some(id) = self.ids.get(path) {
            return *id;
        }
        let id = FileId(self.paths.len() as u32);
        self.paths.push(path.to_path_buf());
        self.ids.insert(path.to_path_buf(), id);
        id
    }

    pub fn get(&self, path: &Path) -> Option<FileId> {
        self.ids.get(path).copied()
    }

    pub fn path(&self, id: FileId) -> &Path {
        &self.paths[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Reachability channels. A type-only import pulls a file in for type
/// information without making its runtime code live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reach {
    pub value: bool,
    pub types: bool,
}

impl Reach {
    pub fn any(&self) -> bool {
        self.value || self.types
    }

    pub fn has(&self, channel: Channel) -> bool {
        match channel {
            Channel::Value => self.value,
            Channel::Type => self.types,
        }
    }

    pub fn mark(&mut self, channel: Channel) {
        match channel {
            Channel::Value => self.value = true,
            Channel::Type => self.types = true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Value,
    Type,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeTarget {
    Internal(FileId),
    /// Monorepo sibling: reachable like an internal file, attributed like
    /// an external package.
    Workspace { package: String, file: FileId },
    External {
        package: String,
        subpath: Option<String>,
    },
    Builtin,
    Unresolved,
}

impl EdgeTarget {
    /// The internal file this edge leads to, when it leads to one.
    pub fn internal_file(&self) -> Option<FileId> {
        match self {
            EdgeTarget::Internal(id) => Some(*id),
            EdgeTarget::Workspace { file, .. } => Some(*file),
            _ => None,
        }
    }
}

/// One resolved reference out of a file: a static import, a dynamic
/// import with a literal argument, a `require`, a re-export, or a
/// `new URL` sibling reference.
#[derive(Debug, Clone)]
pub struct Edge {
    pub specifier: String,
    pub names: Vec<ImportedName>,
    pub is_type_only: bool,
    pub is_side_effect: bool,
    pub is_re_export: bool,
    pub line: u32,
    pub col: u32,
    pub target: EdgeTarget,
}

#[derive(Debug)]
pub struct ModuleNode {
    pub file: FileId,
    pub workspace: usize,
    pub parsed: ParsedModule,
    pub edges: Vec<Edge>,
}

/// External package references per (workspace, package), split by channel
/// so "does type-only use count" stays a reporting decision.
#[derive(Debug, Default, Clone)]
pub struct ExternalUse {
    pub value_files: BTreeSet<FileId>,
    pub type_files: BTreeSet<FileId>,
}

impl ExternalUse {
    pub fn all_files(&self) -> BTreeSet<FileId> {
        self.value_files.union(&self.type_files).copied().collect()
    }
}

#[derive(Debug, Clone)]
pub struct UnresolvedRef {
    pub file: FileId,
    pub workspace: usize,
    pub specifier: String,
    pub line: u32,
    pub col: u32,
    /// Bare specifiers become unlisted-dependency candidates; relative
    /// ones are unresolved imports.
    pub is_bare: bool,
}

/// Which exports of a file are referenced from elsewhere.
#[derive(Debug, Default, Clone)]
pub struct UsedExports {
    /// A whole-namespace escape or star re-export referenced everything.
    pub all: bool,
    pub names: BTreeSet<String>,
}

impl UsedExports {
    pub fn contains(&self, name: &str, is_default: bool) -> bool {
        self.all || self.names.contains(name) || (is_default && self.names.contains("default"))
    }
}

#[derive(Debug, Default)]
pub struct ModuleGraph {
    pub interner: FileInterner,
    pub modules: BTreeMap<FileId, ModuleNode>,
    pub entries: Vec<FileId>,
    pub reach: BTreeMap<FileId, Reach>,
    pub external_refs: BTreeMap<(usize, String), ExternalUse>,
    pub unresolved: Vec<UnresolvedRef>,
    pub dynamic_sites: Vec<(FileId, u32, u32)>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ModuleGraph {
    /// Files reachable from the entry set. Production mode restricts the
    /// closure to the value channel.
    pub fn reachable_files(&self, value_only: bool) -> BTreeSet<FileId> {
        self.reach
            .iter()
            .filter(|(_, r)| if value_only { r.value } else { r.any() })
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn is_entry(&self, id: FileId) -> bool {
        self.entries.contains(&id)
    }

    /// For every internally-resolved edge of every reachable module, fold
    /// the imported names and the referring file's namespace signals into
    /// per-target used-export sets.
    pub fn used_exports(&self) -> BTreeMap<FileId, UsedExports> {
        let mut used: BTreeMap<FileId, UsedExports> = BTreeMap::new();

        for (id, node) in &self.modules {
            if !self.reach.get(id).copied().unwrap_or_default().any() {
                continue;
            }

            for edge in &node.edges {
                let Some(target) = edge.target.internal_file() else {
                    continue;
                };
                let entry = used.entry(target).or_default();

                if edge.is_re_export {
                    for name in &edge.names {
                        if name.name == "*" {
                            // What a star re-export forwards is decided by
                            // downstream importers; count everything.
                            entry.all = true;
                        } else {
                            entry.names.insert(name.name.clone());
                        }
                    }
                    continue;
                }

                if edge.is_side_effect {
                    continue;
                }

                for name in &edge.names {
                    if name.name != "*" {
                        entry.names.insert(name.name.clone());
                        continue;
                    }

                    match &name.alias {
                        None => {
                            // `import('./x')` without a binding hands the
                            // whole module object out.
                            entry.all = true;
                        }
                        Some(alias) => {
                            if name.is_type || edge.is_type_only {
                                // Type-position member uses are invisible
                                // to the syntactic walk.
                                entry.all = true;
                                continue;
                            }
                            let refs = &node.parsed.refs;
                            if refs.escaped.contains(alias) {
                                entry.all = true;
                            }
                            if let Some(members) = refs.qualified.get(alias) {
                                entry.names.extend(members.iter().cloned());
                            }
                            if let Some(names) = refs.destructured.get(alias) {
                                entry.names.extend(names.iter().cloned());
                            }
                        }
                    }
                }
            }
        }

        used
    }

    /// Property names referenced anywhere in reachable code; drives enum
    /// and class member classification.
    pub fn referenced_member_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for (id, node) in &self.modules {
            if self.reach.get(id).copied().unwrap_or_default().any() {
                names.extend(node.parsed.refs.property_names.iter().cloned());
            }
        }
        names
    }

    /// Identifiers that escape whole in any reachable file; an enum or
    /// class object handed around keeps all its members alive.
    pub fn escaped_idents(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for (id, node) in &self.modules {
            if self.reach.get(id).copied().unwrap_or_default().any() {
                names.extend(node.parsed.refs.escaped.iter().cloned());
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interner_roundtrip() {
        let mut interner = FileInterner::default();
        let a = interner.intern(Path::new("/p/a.ts"));
        let b = interner.intern(Path::new("/p/b.ts"));
        let a2 = interner.intern(Path::new("/p/a.ts"));

        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(interner.path(a), Path::new("/p/a.ts"));
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn test_reach_channels() {
        let mut reach = Reach::default();
        assert!(!reach.any());

        reach.mark(Channel::Type);
        assert!(reach.any());
        assert!(!reach.has(Channel::Value));

        reach.mark(Channel::Value);
        assert!(reach.has(Channel::Value));
    }

    #[test]
    fn test_used_exports_contains_default() {
        let mut used = UsedExports::default();
        used.names.insert("default".to_string());
        assert!(used.contains("whatever", true));
        assert!(!used.contains("whatever", false));

        used.all = true;
        assert!(used.contains("anything", false));
    }

    #[test]
    fn test_empty_graph() {
        let graph = ModuleGraph::default();
        assert!(graph.reachable_files(false).is_empty());
        assert!(graph.used_exports().is_empty());
    }
}
