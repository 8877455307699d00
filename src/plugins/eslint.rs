use std::path::Path;

use anyhow::Result;

use super::traits::{find_config_file, AttributedDep, Plugin, PluginContext, PluginOutput};

pub struct EslintPlugin;

impl Plugin for EslintPlugin {
    fn name(&self) -> &'static str {
        "eslint"
    }

    fn is_enabled(&self, dir: &Path, ctx: &PluginContext) -> bool {
        find_config_file(dir, self.config_patterns()).is_some()
            || ctx.has_any_dependency(&["eslint", "@eslint/js"])
            || ctx.has_script_invoking("eslint")
    }

    fn config_patterns(&self) -> &[&str] {
        &[
            "eslint.config.js",
            "eslint.config.mjs",
            "eslint.config.cjs",
            "eslint.config.ts",
            ".eslintrc.js",
            ".eslintrc.cjs",
            ".eslintrc.json",
            ".eslintrc.yaml",
            ".eslintrc.yml",
            ".eslintrc",
        ]
    }

    fn entry_patterns(&self) -> &[&str] {
        &[]
    }

    fn script_markers(&self) -> &[&str] {
        &["eslint"]
    }

    fn resolve(&self, dir: &Path, _ctx: &PluginContext) -> Result<PluginOutput> {
        let mut result = PluginOutput::new();

        if let Some(config) = find_config_file(dir, self.config_patterns()) {
            if let Some(name) = config.file_name().and_then(|f| f.to_str()) {
                result.add_entry(name);
            }
        }

        result.add_ignore(".eslintcache");
        result.attribute(AttributedDep::dev("eslint"));

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_legacy_rc_detection() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".eslintrc.json"), "{}").unwrap();

        let plugin = EslintPlugin;
        assert!(plugin.is_enabled(temp.path(), &PluginContext::default()));

        let result = plugin
            .resolve(temp.path(), &PluginContext::default())
            .unwrap();
        assert!(result.entries.iter().any(|e| e == ".eslintrc.json"));
        assert!(result.dependencies.contains(&AttributedDep::dev("eslint")));
    }
}
