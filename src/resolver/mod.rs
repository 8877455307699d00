mod node;

pub use node::{ModuleResolver, WorkspaceAliases};

use std::collections::HashSet;

use once_cell::sync::Lazy;

/// Outcome of resolving one specifier against a referring file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A concrete file inside the repository.
    Internal(std::path::PathBuf),
    /// A monorepo sibling: internal file, but the specifier still names a
    /// package the referring workspace must declare.
    Workspace {
        package: String,
        path: std::path::PathBuf,
    },
    /// An npm package reference, split into name and subpath.
    External {
        package: String,
        subpath: Option<String>,
    },
    /// A Node builtin (`fs`, `node:path`, ...).
    Builtin,
    /// Nothing matched. The caller decides between unlisted-dependency
    /// (bare shape) and unresolved-import (relative shape).
    Unresolved,
}

pub static BUILTIN_MODULES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "constants",
        "crypto", "dgram", "diagnostics_channel", "dns", "domain", "events", "fs", "http",
        "http2", "https", "inspector", "module", "net", "os", "path", "perf_hooks", "process",
        "punycode", "querystring", "readline", "repl", "stream", "string_decoder", "sys",
        "timers", "tls", "trace_events", "tty", "url", "util", "v8", "vm", "wasi",
        "worker_threads", "zlib",
    ]
    .into_iter()
    .collect()
});

pub fn is_builtin_module(name: &str) -> bool {
    name.starts_with("node:") || BUILTIN_MODULES.contains(name)
}

/// Split a bare specifier into package name and subpath. Scoped packages
/// keep their first two segments.
pub fn parse_package_specifier(specifier: &str) -> (&str, Option<&str>) {
    if specifier.starts_with('@') {
        let parts: Vec<&str> = specifier.splitn(3, '/').collect();
        if parts.len() >= 2 {
            let package_name = if parts.len() == 2 {
                specifier
            } else {
                let idx = parts[0].len() + 1 + parts[1].len();
                &specifier[..idx]
            };
            let subpath = if parts.len() > 2 { Some(parts[2]) } else { None };
            return (package_name, subpath);
        }
    }

    if let Some(slash_idx) = specifier.find('/') {
        let package_name = &specifier[..slash_idx];
        let subpath = &specifier[slash_idx + 1..];
        return (package_name, Some(subpath));
    }

    (specifier, None)
}

pub fn is_relative_specifier(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_package_specifier_simple() {
        assert_eq!(parse_package_specifier("lodash"), ("lodash", None));
        assert_eq!(parse_package_specifier("lodash/map"), ("lodash", Some("map")));
    }

    #[test]
    fn test_parse_package_specifier_scoped() {
        assert_eq!(parse_package_specifier("@types/node"), ("@types/node", None));
        assert_eq!(
            parse_package_specifier("@babel/core/lib/parse"),
            ("@babel/core", Some("lib/parse"))
        );
    }

    #[test]
    fn test_is_builtin_module() {
        assert!(is_builtin_module("fs"));
        assert!(is_builtin_module("node:path"));
        assert!(!is_builtin_module("lodash"));
    }

    #[test]
    fn test_is_relative_specifier() {
        assert!(is_relative_specifier("./a"));
        assert!(is_relative_specifier("../a/b"));
        assert!(is_relative_specifier("/abs"));
        assert!(!is_relative_specifier("react"));
        assert!(!is_relative_specifier("#alias"));
    }
}
