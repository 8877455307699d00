use std::path::Path;

use anyhow::Result;

use super::traits::{find_config_file, AttributedDep, Plugin, PluginContext, PluginOutput};

pub struct VitestPlugin;

impl Plugin for VitestPlugin {
    fn name(&self) -> &'static str {
        "vitest"
    }

    fn is_enabled(&self, dir: &Path, ctx: &PluginContext) -> bool {
        find_config_file(dir, self.config_patterns()).is_some()
            || ctx.has_dependency("vitest")
            || ctx.has_script_invoking("vitest")
    }

    fn config_patterns(&self) -> &[&str] {
        &[
            "vitest.config.ts",
            "vitest.config.js",
            "vitest.config.mts",
            "vitest.workspace.ts",
        ]
    }

    fn entry_patterns(&self) -> &[&str] {
        &[
            "**/*.test.{ts,tsx,js,jsx}",
            "**/*.spec.{ts,tsx,js,jsx}",
            "**/__tests__/**/*.{ts,tsx,js,jsx}",
            "**/*.bench.{ts,tsx}",
            "vitest.setup.{ts,js}",
        ]
    }

    fn script_markers(&self) -> &[&str] {
        &["vitest"]
    }

    fn resolve(&self, dir: &Path, ctx: &PluginContext) -> Result<PluginOutput> {
        let mut result = PluginOutput::new();

        // Test files are dev-only entries; production analysis drops them.
        if !ctx.production {
            for pattern in self.entry_patterns() {
                result.add_entry(*pattern);
            }
        }

        if let Some(config) = find_config_file(dir, self.config_patterns()) {
            if let Some(name) = config.file_name().and_then(|f| f.to_str()) {
                result.add_entry(name);
            }
        }

        result.attribute(AttributedDep::dev("vitest"));

        Ok(result)
    }

    fn production_entry_patterns(&self) -> &[&str] {
        &[]
    }
}
