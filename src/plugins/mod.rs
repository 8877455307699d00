mod traits;

mod eslint;
mod expo;
mod jest;
mod next;
mod storybook;
mod tailwind;
mod typescript;
mod vite;
mod vitest;

pub use traits::{find_config_file, AttributedDep, Plugin, PluginContext, PluginOutput};

use std::path::Path;
use std::sync::Arc;

use crate::config::{PluginSetting, PluginsConfig};

pub fn builtin_plugins() -> Vec<Arc<dyn Plugin>> {
    vec![
        Arc::new(typescript::TypeScriptPlugin),
        Arc::new(next::NextPlugin),
        Arc::new(vite::VitePlugin),
        Arc::new(vitest::VitestPlugin),
        Arc::new(jest::JestPlugin),
        Arc::new(eslint::EslintPlugin),
        Arc::new(storybook::StorybookPlugin),
        Arc::new(tailwind::TailwindPlugin),
        Arc::new(expo::ExpoPlugin),
    ]
}

/// Plugins that fire for one workspace. Detection runs once per plugin per
/// workspace; `false` force-disables, a config object force-enables.
pub fn detect_plugins(
    dir: &Path,
    ctx: &PluginContext,
    toggles: &PluginsConfig,
) -> Vec<Arc<dyn Plugin>> {
    builtin_plugins()
        .into_iter()
        .filter(|p| toggles.is_enabled(p.name()))
        .filter(|p| is_forced(toggles, p.name()) || p.is_enabled(dir, ctx))
        .collect()
}

fn is_forced(toggles: &PluginsConfig, name: &str) -> bool {
    let setting = match name {
        "typescript" => &toggles.typescript,
        "next" => &toggles.next,
        "vite" => &toggles.vite,
        "vitest" => &toggles.vitest,
        "jest" => &toggles.jest,
        "eslint" => &toggles.eslint,
        "storybook" => &toggles.storybook,
        "tailwind" => &toggles.tailwind,
        "expo" => &toggles.expo,
        _ => return false,
    };
    matches!(setting, PluginSetting::Config(_))
}

/// The union of every fired plugin's output for one workspace.
#[derive(Debug, Default)]
pub struct WorkspacePluginOutput {
    pub entries: Vec<String>,
    pub project_patterns: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub dependencies: Vec<AttributedDep>,
    pub fired: Vec<&'static str>,
}

pub fn resolve_workspace_plugins(
    dir: &Path,
    ctx: &PluginContext,
    toggles: &PluginsConfig,
) -> WorkspacePluginOutput {
    let mut output = WorkspacePluginOutput::default();

    for plugin in detect_plugins(dir, ctx, toggles) {
        let Ok(result) = plugin.resolve(dir, ctx) else {
            continue;
        };
        output.entries.extend(result.entries);
        output.project_patterns.extend(result.project_patterns);
        output.ignore_patterns.extend(result.ignore_patterns);
        output.dependencies.extend(result.dependencies);
        output.fired.push(plugin.name());
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_plugin_names() {
        let plugins = builtin_plugins();
        let names: Vec<&str> = plugins.iter().map(|p| p.name()).collect();

        assert!(names.contains(&"typescript"));
        assert!(names.contains(&"next"));
        assert!(names.contains(&"expo"));
        assert!(names.contains(&"eslint"));
    }

    #[test]
    fn test_toggle_disables_plugin() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("next.config.js"), "module.exports = {}").unwrap();

        let toggles: PluginsConfig =
            serde_json::from_str(r#"{"next": false}"#).unwrap();
        let detected = detect_plugins(temp.path(), &PluginContext::default(), &toggles);
        assert!(detected.iter().all(|p| p.name() != "next"));
    }

    #[test]
    fn test_detection_by_dependency() {
        let temp = TempDir::new().unwrap();
        let mut deps = HashSet::new();
        deps.insert("next".to_string());
        let ctx = PluginContext::new().with_dependencies(deps);

        let detected = detect_plugins(temp.path(), &ctx, &PluginsConfig::default());
        assert!(detected.iter().any(|p| p.name() == "next"));
    }

    #[test]
    fn test_config_object_forces_detection() {
        let temp = TempDir::new().unwrap();

        let toggles: PluginsConfig =
            serde_json::from_str(r#"{"tailwind": {"config": "tw.config.js"}}"#).unwrap();
        let detected = detect_plugins(temp.path(), &PluginContext::default(), &toggles);
        assert!(detected.iter().any(|p| p.name() == "tailwind"));
    }

    #[test]
    fn test_outputs_union() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("next.config.js"), "module.exports = {}").unwrap();
        std::fs::write(temp.path().join("vite.config.ts"), "export default {}").unwrap();

        let output = resolve_workspace_plugins(
            temp.path(),
            &PluginContext::default(),
            &PluginsConfig::default(),
        );
        assert!(output.fired.contains(&"next"));
        assert!(output.fired.contains(&"vite"));
        assert!(output.entries.iter().any(|e| e == "next.config.js"));
        assert!(output.entries.iter().any(|e| e == "vite.config.ts"));
    }
}
