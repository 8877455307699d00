use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CullError;

use super::schema::{Config, PackageJson, ResolvedConfig, TsConfig};

const CONFIG_FILES: &[&str] = &["cull.json", "cull.jsonc", ".cullrc", ".cullrc.json"];

pub fn load_config(root: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

    let config = if let Some(path) = config_path {
        load_config_file(path)?
    } else {
        find_and_load_config(&root)?
    };

    Ok(ResolvedConfig { root, config })
}

fn find_and_load_config(root: &Path) -> Result<Config> {
    for filename in CONFIG_FILES {
        let path = root.join(filename);
        if path.exists() {
            return load_config_file(&path);
        }
    }

    Ok(Config::default())
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let content = strip_json_comments(&content);

    serde_json::from_str(&content)
        .map_err(|e| CullError::Config(format!("{}: {}", path.display(), e)).into())
}

/// Read and parse a `package.json`. Invalid JSON in a manifest is fatal.
pub fn load_manifest(path: &Path) -> Result<PackageJson> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read package.json: {}", path.display()))?;

    serde_json::from_str(&content).map_err(|source| {
        CullError::ManifestParse {
            path: path.to_path_buf(),
            source,
        }
        .into()
    })
}

/// Locate and load the tsconfig (or jsconfig) governing `dir`, following
/// `extends` chains. Returns `None` when the directory has neither.
pub fn find_and_load_tsconfig(dir: &Path) -> Result<Option<TsConfig>> {
    let candidates = ["tsconfig.json", "jsconfig.json"];

    for name in candidates {
        let path = dir.join(name);
        if path.exists() {
            return Ok(Some(load_tsconfig(&path)?));
        }
    }

    Ok(None)
}

fn load_tsconfig(path: &Path) -> Result<TsConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read tsconfig: {}", path.display()))?;

    let content = strip_json_comments(&content);

    let mut config: TsConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse tsconfig: {}", path.display()))?;

    if let Some(extends) = config.extends.clone() {
        if let Some(parent_path) = resolve_tsconfig_extends(path, &extends) {
            if parent_path.exists() {
                let parent = load_tsconfig(&parent_path)?;
                merge_tsconfig(&mut config, parent);
            }
        }
    }

    Ok(config)
}

fn resolve_tsconfig_extends(child: &Path, extends: &str) -> Option<PathBuf> {
    // Only filesystem-relative extends are followed. A bare package name
    // ("@tsconfig/node20") lives in node_modules and carries no paths that
    // matter for resolution.
    if !extends.starts_with('.') {
        return None;
    }

    let base = child.parent()?;
    let mut target = base.join(extends);
    if target.extension().is_none() {
        target.set_extension("json");
    }
    Some(target)
}

fn merge_tsconfig(child: &mut TsConfig, parent: TsConfig) {
    let opts = &mut child.compiler_options;
    let parent_opts = parent.compiler_options;

    if opts.base_url.is_none() {
        opts.base_url = parent_opts.base_url;
    }
    for (key, value) in parent_opts.paths {
        opts.paths.entry(key).or_insert(value);
    }
    if opts.root_dir.is_none() {
        opts.root_dir = parent_opts.root_dir;
    }
    if opts.out_dir.is_none() {
        opts.out_dir = parent_opts.out_dir;
    }
}

/// Strip `//` and `/* */` comments so jsonc configs parse. String literals
/// are respected.
fn strip_json_comments(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' => match chars.peek() {
                Some('/') => {
                    for next in chars.by_ref() {
                        if next == '\n' {
                            out.push('\n');
                            break;
                        }
                    }
                }
                Some('*') => {
                    chars.next();
                    let mut prev = '\0';
                    for next in chars.by_ref() {
                        if prev == '*' && next == '/' {
                            break;
                        }
                        prev = next;
                    }
                }
                _ => out.push(c),
            },
            _ => out.push(c),
        }
    }

    out
}

pub fn generate_default_config() -> Config {
    Config {
        schema: Some("https://culljs.dev/schema.json".to_string()),
        entry: vec!["src/index.ts".to_string()],
        project: vec!["src/**/*.ts".to_string()],
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_missing_file_defaults() {
        let temp = TempDir::new().unwrap();
        let resolved = load_config(temp.path(), None).unwrap();
        assert!(resolved.config.entry.is_empty());
    }

    #[test]
    fn test_load_config_jsonc() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("cull.jsonc"),
            r#"{
                // seed files
                "entry": ["src/main.ts"], /* inline */
                "ignoreDependencies": ["left-pad"]
            }"#,
        )
        .unwrap();

        let resolved = load_config(temp.path(), None).unwrap();
        assert_eq!(resolved.config.entry, vec!["src/main.ts"]);
        assert_eq!(resolved.config.ignore_dependencies, vec!["left-pad"]);
    }

    #[test]
    fn test_bad_config_is_config_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("cull.json"), r#"{"entry": 42}"#).unwrap();

        let err = load_config(temp.path(), None).unwrap_err();
        assert!(err.downcast_ref::<CullError>().is_some());
    }

    #[test]
    fn test_load_manifest_invalid_json_is_fatal() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("package.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load_manifest(&path).unwrap_err();
        match err.downcast_ref::<CullError>() {
            Some(CullError::ManifestParse { path: p, .. }) => assert_eq!(p, &path),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_tsconfig_extends_chain() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("tsconfig.base.json"),
            r#"{"compilerOptions": {"baseUrl": ".", "paths": {"@lib/*": ["lib/*"]}}}"#,
        )
        .unwrap();
        fs::write(
            temp.path().join("tsconfig.json"),
            r#"{"extends": "./tsconfig.base.json", "compilerOptions": {"paths": {"@app/*": ["app/*"]}}}"#,
        )
        .unwrap();

        let config = find_and_load_tsconfig(temp.path()).unwrap().unwrap();
        assert_eq!(config.compiler_options.base_url.as_deref(), Some("."));
        assert!(config.compiler_options.paths.contains_key("@lib/*"));
        assert!(config.compiler_options.paths.contains_key("@app/*"));
    }

    #[test]
    fn test_strip_json_comments_respects_strings() {
        let stripped = strip_json_comments(r#"{"url": "https://x.test/a"}"#);
        assert_eq!(stripped, r#"{"url": "https://x.test/a"}"#);
    }
}
