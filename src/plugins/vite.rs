use std::path::Path;

use anyhow::Result;

use super::traits::{find_config_file, AttributedDep, Plugin, PluginContext, PluginOutput};

pub struct VitePlugin;

impl Plugin for VitePlugin {
    fn name(&self) -> &'static str {
        "vite"
    }

    fn is_enabled(&self, dir: &Path, ctx: &PluginContext) -> bool {
        find_config_file(dir, self.config_patterns()).is_some()
            || ctx.has_dependency("vite")
            || ctx.has_script_invoking("vite")
    }

    fn config_patterns(&self) -> &[&str] {
        &[
            "vite.config.ts",
            "vite.config.js",
            "vite.config.mts",
            "vite.config.mjs",
        ]
    }

    fn entry_patterns(&self) -> &[&str] {
        &["index.html", "src/main.{ts,tsx,js,jsx}"]
    }

    fn script_markers(&self) -> &[&str] {
        &["vite"]
    }

    fn resolve(&self, dir: &Path, _ctx: &PluginContext) -> Result<PluginOutput> {
        let mut result = PluginOutput::new();

        for pattern in self.entry_patterns() {
            result.add_entry(*pattern);
        }

        if let Some(config) = find_config_file(dir, self.config_patterns()) {
            if let Some(name) = config.file_name().and_then(|f| f.to_str()) {
                result.add_entry(name);
            }
        }

        result.add_ignore("dist/**");
        result.attribute(AttributedDep::dev("vite"));

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_file_becomes_entry() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("vite.config.ts"), "export default {}").unwrap();

        let plugin = VitePlugin;
        let result = plugin.resolve(temp.path(), &PluginContext::default()).unwrap();
        assert!(result.entries.iter().any(|e| e == "vite.config.ts"));
        assert!(result.dependencies.contains(&AttributedDep::dev("vite")));
    }
}
