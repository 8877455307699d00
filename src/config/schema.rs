use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// User-facing configuration, read from `cull.json` or one of its
/// fallbacks. Field names are camelCase on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default)]
    pub entry: Vec<String>,

    #[serde(default)]
    pub project: Vec<String>,

    #[serde(default)]
    pub paths: HashMap<String, Vec<String>>,

    #[serde(default)]
    pub rules: RulesConfig,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_dependencies: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_binaries: Vec<String>,

    #[serde(default)]
    pub ignore_exports_used_in_file: bool,

    #[serde(default)]
    pub include_entry_exports: bool,

    /// JSDoc tags that suppress unused-export reports, in addition to
    /// `@public`. Written with or without the leading `@`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub workspaces: HashMap<String, WorkspaceConfig>,

    #[serde(default)]
    pub plugins: PluginsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesConfig {
    #[serde(default = "default_error")]
    pub files: RuleLevel,

    #[serde(default = "default_error")]
    pub dependencies: RuleLevel,

    #[serde(default = "default_error")]
    pub dev_dependencies: RuleLevel,

    #[serde(default = "default_warn")]
    pub exports: RuleLevel,

    #[serde(default = "default_warn")]
    pub types: RuleLevel,

    #[serde(default = "default_error")]
    pub unlisted: RuleLevel,

    #[serde(default = "default_warn")]
    pub binaries: RuleLevel,

    #[serde(default = "default_error")]
    pub unresolved: RuleLevel,

    #[serde(default = "default_off")]
    pub enum_members: RuleLevel,

    #[serde(default = "default_off")]
    pub class_members: RuleLevel,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            files: default_error(),
            dependencies: default_error(),
            dev_dependencies: default_error(),
            exports: default_warn(),
            types: default_warn(),
            unlisted: default_error(),
            binaries: default_warn(),
            unresolved: default_error(),
            enum_members: default_off(),
            class_members: default_off(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleLevel {
    Error,
    Warn,
    Off,
}

fn default_error() -> RuleLevel {
    RuleLevel::Error
}

fn default_warn() -> RuleLevel {
    RuleLevel::Warn
}

fn default_off() -> RuleLevel {
    RuleLevel::Off
}

impl RuleLevel {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, RuleLevel::Off)
    }
}

/// Per-workspace overrides, keyed in the top-level `workspaces` map by the
/// workspace dir relative to the root (`.` for the root workspace).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub entry: Vec<String>,

    #[serde(default)]
    pub project: Vec<String>,

    #[serde(default)]
    pub ignore: Vec<String>,

    #[serde(default)]
    pub ignore_dependencies: Vec<String>,

    #[serde(default)]
    pub ignore_binaries: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PluginsConfig {
    #[serde(default)]
    pub typescript: PluginSetting,

    #[serde(default)]
    pub next: PluginSetting,

    #[serde(default)]
    pub vite: PluginSetting,

    #[serde(default)]
    pub vitest: PluginSetting,

    #[serde(default)]
    pub jest: PluginSetting,

    #[serde(default)]
    pub eslint: PluginSetting,

    #[serde(default)]
    pub storybook: PluginSetting,

    #[serde(default)]
    pub tailwind: PluginSetting,

    #[serde(default)]
    pub expo: PluginSetting,
}

impl PluginsConfig {
    pub fn is_enabled(&self, name: &str) -> bool {
        match name {
            "typescript" => self.typescript.is_enabled(),
            "next" => self.next.is_enabled(),
            "vite" => self.vite.is_enabled(),
            "vitest" => self.vitest.is_enabled(),
            "jest" => self.jest.is_enabled(),
            "eslint" => self.eslint.is_enabled(),
            "storybook" => self.storybook.is_enabled(),
            "tailwind" => self.tailwind.is_enabled(),
            "expo" => self.expo.is_enabled(),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PluginSetting {
    Enabled(bool),
    Config(PluginConfig),
}

impl Default for PluginSetting {
    fn default() -> Self {
        PluginSetting::Enabled(true)
    }
}

impl PluginSetting {
    pub fn is_enabled(&self) -> bool {
        match self {
            PluginSetting::Enabled(v) => *v,
            PluginSetting::Config(_) => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PluginConfig {
    pub config: Option<String>,
}

/// Root directory plus the loaded user config. Per-workspace manifests and
/// tsconfigs are loaded by the workspace model, not here.
#[derive(Debug, Clone, Default)]
pub struct ResolvedConfig {
    pub root: PathBuf,
    pub config: Config,
}

impl ResolvedConfig {
    pub fn workspace_overrides(&self, relative: &str) -> Option<&WorkspaceConfig> {
        self.config.workspaces.get(relative)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TsConfig {
    #[serde(default)]
    pub compiler_options: TsCompilerOptions,

    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub files: Vec<String>,

    pub extends: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TsCompilerOptions {
    pub base_url: Option<String>,

    #[serde(default)]
    pub paths: HashMap<String, Vec<String>>,

    pub root_dir: Option<String>,

    pub out_dir: Option<String>,

    #[serde(default)]
    pub module: Option<String>,

    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    pub name: Option<String>,

    pub version: Option<String>,

    pub main: Option<String>,

    pub module: Option<String>,

    pub types: Option<String>,

    #[serde(default)]
    pub exports: serde_json::Value,

    #[serde(default)]
    pub dependencies: HashMap<String, String>,

    #[serde(default)]
    pub dev_dependencies: HashMap<String, String>,

    #[serde(default)]
    pub peer_dependencies: HashMap<String, String>,

    #[serde(default)]
    pub optional_dependencies: HashMap<String, String>,

    #[serde(default)]
    pub workspaces: WorkspacesField,

    #[serde(default)]
    pub scripts: HashMap<String, String>,

    pub bin: Option<serde_json::Value>,
}

impl PackageJson {
    /// Binary names this manifest contributes. `bin` is either a string
    /// (binary named after the package) or a name → path map.
    pub fn bin_names(&self) -> Vec<String> {
        match &self.bin {
            Some(serde_json::Value::String(_)) => self
                .name
                .as_deref()
                .map(unscoped_name)
                .map(str::to_string)
                .into_iter()
                .collect(),
            Some(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Targets from `main`/`module`/`types`/`bin`/`exports` that can seed
    /// the entry set.
    pub fn entry_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        for field in [&self.main, &self.module, &self.types] {
            if let Some(value) = field {
                fields.push(value.clone());
            }
        }
        match &self.bin {
            Some(serde_json::Value::String(path)) => fields.push(path.clone()),
            Some(serde_json::Value::Object(map)) => {
                for value in map.values() {
                    if let Some(path) = value.as_str() {
                        fields.push(path.to_string());
                    }
                }
            }
            _ => {}
        }
        collect_export_targets(&self.exports, &mut fields);
        fields
    }
}

fn unscoped_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Collect every string leaf of an `exports` map. Conditions and subpaths
/// are irrelevant here; any file the map can point at is an entry.
fn collect_export_targets(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => out.push(s.clone()),
        serde_json::Value::Object(map) => {
            for nested in map.values() {
                collect_export_targets(nested, out);
            }
        }
        serde_json::Value::Array(items) => {
            for nested in items {
                collect_export_targets(nested, out);
            }
        }
        _ => {}
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum WorkspacesField {
    #[default]
    None,
    List(Vec<String>),
    Object {
        packages: Vec<String>,
        #[serde(default)]
        nohoist: Vec<String>,
    },
}

impl WorkspacesField {
    pub fn patterns(&self) -> Vec<&str> {
        match self {
            WorkspacesField::None => vec![],
            WorkspacesField::List(list) => list.iter().map(|s| s.as_str()).collect(),
            WorkspacesField::Object { packages, .. } => {
                packages.iter().map(|s| s.as_str()).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert!(config.entry.is_empty());
        assert!(!config.include_entry_exports);
        assert!(!config.ignore_exports_used_in_file);
        assert_eq!(config.rules.files, RuleLevel::Error);
        assert_eq!(config.rules.class_members, RuleLevel::Off);
    }

    #[test]
    fn test_plugin_setting_untagged() {
        let config: Config = serde_json::from_str(
            r#"{"plugins": {"next": false, "jest": {"config": "jest.config.js"}}}"#,
        )
        .unwrap();
        assert!(!config.plugins.is_enabled("next"));
        assert!(config.plugins.is_enabled("jest"));
        assert!(config.plugins.is_enabled("vite"));
    }

    #[test]
    fn test_bin_names_string_form() {
        let pkg: PackageJson =
            serde_json::from_str(r#"{"name": "@scope/tool", "bin": "cli.js"}"#).unwrap();
        assert_eq!(pkg.bin_names(), vec!["tool".to_string()]);
    }

    #[test]
    fn test_bin_names_map_form() {
        let pkg: PackageJson =
            serde_json::from_str(r#"{"bin": {"a": "a.js", "b": "b.js"}}"#).unwrap();
        let mut names = pkg.bin_names();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_entry_fields_from_exports_map() {
        let pkg: PackageJson = serde_json::from_str(
            r#"{"exports": {".": {"import": "./dist/index.mjs", "types": "./src/index.ts"}, "./sub": "./src/sub.ts"}}"#,
        )
        .unwrap();
        let fields = pkg.entry_fields();
        assert!(fields.contains(&"./src/index.ts".to_string()));
        assert!(fields.contains(&"./src/sub.ts".to_string()));
    }

    #[test]
    fn test_workspaces_field_forms() {
        let list: PackageJson = serde_json::from_str(r#"{"workspaces": ["packages/*"]}"#).unwrap();
        assert_eq!(list.workspaces.patterns(), vec!["packages/*"]);

        let object: PackageJson =
            serde_json::from_str(r#"{"workspaces": {"packages": ["apps/*"]}}"#).unwrap();
        assert_eq!(object.workspaces.patterns(), vec!["apps/*"]);
    }
}
