use std::path::Path;

use anyhow::Result;

use super::traits::{find_config_file, AttributedDep, Plugin, PluginContext, PluginOutput};

pub struct JestPlugin;

impl Plugin for JestPlugin {
    fn name(&self) -> &'static str {
        "jest"
    }

    fn is_enabled(&self, dir: &Path, ctx: &PluginContext) -> bool {
        find_config_file(dir, self.config_patterns()).is_some()
            || ctx.has_any_dependency(&["jest", "ts-jest"])
            || ctx.has_script_invoking("jest")
    }

    fn config_patterns(&self) -> &[&str] {
        &[
            "jest.config.ts",
            "jest.config.js",
            "jest.config.mjs",
            "jest.config.cjs",
            "jest.config.json",
            "jest.setup.ts",
            "jest.setup.js",
        ]
    }

    fn entry_patterns(&self) -> &[&str] {
        &[
            "**/*.test.{ts,tsx,js,jsx}",
            "**/*.spec.{ts,tsx,js,jsx}",
            "**/__tests__/**/*.{ts,tsx,js,jsx}",
            "**/__mocks__/**/*.{ts,tsx,js,jsx}",
        ]
    }

    fn script_markers(&self) -> &[&str] {
        &["jest"]
    }

    fn resolve(&self, dir: &Path, ctx: &PluginContext) -> Result<PluginOutput> {
        let mut result = PluginOutput::new();

        if !ctx.production {
            for pattern in self.entry_patterns() {
                result.add_entry(*pattern);
            }
        }

        for pattern in self.config_patterns() {
            if dir.join(pattern).exists() {
                result.add_entry(*pattern);
            }
        }

        result.attribute(AttributedDep::dev("jest"));
        if ctx.has_dependency("ts-jest") {
            result.attribute(AttributedDep::dev("ts-jest"));
        }

        Ok(result)
    }

    fn production_entry_patterns(&self) -> &[&str] {
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn test_enabled_with_ts_jest() {
        let temp = TempDir::new().unwrap();
        let mut deps = HashSet::new();
        deps.insert("ts-jest".to_string());
        let ctx = PluginContext::new().with_dev_dependencies(deps);

        let plugin = JestPlugin;
        assert!(plugin.is_enabled(temp.path(), &ctx));

        let result = plugin.resolve(temp.path(), &ctx).unwrap();
        assert!(result.dependencies.contains(&AttributedDep::dev("ts-jest")));
    }

    #[test]
    fn test_setup_file_is_entry() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("jest.setup.ts"), "export {};").unwrap();

        let plugin = JestPlugin;
        let result = plugin
            .resolve(temp.path(), &PluginContext::default())
            .unwrap();
        assert!(result.entries.iter().any(|e| e == "jest.setup.ts"));
    }
}
