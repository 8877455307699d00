use std::path::PathBuf;

use thiserror::Error;

/// Fatal error classes. Everything that is not one of these is demoted to
/// a diagnostic on the report and analysis continues.
#[derive(Debug, Error)]
pub enum CullError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse manifest {path}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("workspace cycle detected through {0}")]
    CyclicWorkspaces(PathBuf),

    #[error("failed to walk project files under {path}")]
    Walk {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },

    #[error("failed to read entry file {path}")]
    EntryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_parse_message_names_path() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = CullError::ManifestParse {
            path: PathBuf::from("/repo/package.json"),
            source,
        };
        assert!(err.to_string().contains("/repo/package.json"));
    }

    #[test]
    fn test_cyclic_workspaces_message() {
        let err = CullError::CyclicWorkspaces(PathBuf::from("/repo/packages/a"));
        assert!(err.to_string().contains("cycle"));
    }
}
