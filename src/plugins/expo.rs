use std::path::Path;

use anyhow::Result;

use super::traits::{find_config_file, AttributedDep, Plugin, PluginContext, PluginOutput};

pub struct ExpoPlugin;

impl Plugin for ExpoPlugin {
    fn name(&self) -> &'static str {
        "expo"
    }

    fn is_enabled(&self, dir: &Path, ctx: &PluginContext) -> bool {
        find_config_file(dir, self.config_patterns()).is_some() || ctx.has_dependency("expo")
    }

    fn config_patterns(&self) -> &[&str] {
        &["app.config.ts", "app.config.js", "app.json"]
    }

    fn entry_patterns(&self) -> &[&str] {
        &[
            "App.{ts,tsx,js,jsx}",
            "app/**/*.{ts,tsx,js,jsx}",
            "index.{ts,tsx,js,jsx}",
        ]
    }

    fn resolve(&self, dir: &Path, ctx: &PluginContext) -> Result<PluginOutput> {
        let mut result = PluginOutput::new();

        for pattern in self.entry_patterns() {
            result.add_entry(*pattern);
        }

        if let Some(config) = find_config_file(dir, self.config_patterns()) {
            if let Some(name) = config.file_name().and_then(|f| f.to_str()) {
                if name != "app.json" {
                    result.add_entry(name);
                }
            }
        }

        result.add_ignore(".expo/**");
        result.attribute(AttributedDep::production("expo"));

        // `main: "expo-router/entry"` boots the router package directly;
        // no source file ever imports it.
        if let Some(main) = &ctx.main {
            if let Some(package) = bare_package_name(main) {
                if ctx.has_dependency(package) || package == "expo-router" {
                    result.attribute(AttributedDep::production(package));
                }
            }
        }

        Ok(result)
    }
}

/// The package part of a bare specifier used as a manifest `main`, or
/// `None` when `main` points at a local file.
fn bare_package_name(main: &str) -> Option<&str> {
    if main.starts_with('.') || main.starts_with('/') || main.ends_with(".js") {
        return None;
    }
    let mut parts = main.splitn(3, '/');
    let first = parts.next()?;
    if first.starts_with('@') {
        let second = parts.next()?;
        Some(&main[..first.len() + 1 + second.len()])
    } else {
        Some(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn test_router_entry_attribution() {
        let temp = TempDir::new().unwrap();
        let mut deps = HashSet::new();
        deps.insert("expo".to_string());

        let ctx = PluginContext::new()
            .with_dependencies(deps)
            .with_main(Some("expo-router/entry".to_string()));

        let plugin = ExpoPlugin;
        assert!(plugin.is_enabled(temp.path(), &ctx));

        let result = plugin.resolve(temp.path(), &ctx).unwrap();
        assert!(result
            .dependencies
            .contains(&AttributedDep::production("expo-router")));
    }

    #[test]
    fn test_local_main_is_not_attributed() {
        assert_eq!(bare_package_name("./index.js"), None);
        assert_eq!(bare_package_name("dist/main.js"), None);
        assert_eq!(bare_package_name("expo-router/entry"), Some("expo-router"));
        assert_eq!(
            bare_package_name("@scope/pkg/entry"),
            Some("@scope/pkg")
        );
    }
}
