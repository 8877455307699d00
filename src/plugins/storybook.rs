use std::path::Path;

use anyhow::Result;

use super::traits::{find_config_file, AttributedDep, Plugin, PluginContext, PluginOutput};

pub struct StorybookPlugin;

impl Plugin for StorybookPlugin {
    fn name(&self) -> &'static str {
        "storybook"
    }

    fn is_enabled(&self, dir: &Path, ctx: &PluginContext) -> bool {
        find_config_file(dir, self.config_patterns()).is_some()
            || ctx.has_dependency("storybook")
            || ctx.has_script_invoking("storybook")
    }

    fn config_patterns(&self) -> &[&str] {
        &[
            ".storybook/main.ts",
            ".storybook/main.js",
            ".storybook/main.mjs",
        ]
    }

    fn entry_patterns(&self) -> &[&str] {
        &[
            "**/*.stories.{ts,tsx,js,jsx,mdx}",
            ".storybook/preview.{ts,tsx,js,jsx}",
            ".storybook/manager.{ts,js}",
        ]
    }

    fn script_markers(&self) -> &[&str] {
        &["storybook"]
    }

    fn resolve(&self, dir: &Path, ctx: &PluginContext) -> Result<PluginOutput> {
        let mut result = PluginOutput::new();

        if !ctx.production {
            for pattern in self.entry_patterns() {
                result.add_entry(*pattern);
            }
            for pattern in self.config_patterns() {
                if dir.join(pattern).exists() {
                    result.add_entry(*pattern);
                }
            }
        }

        result.add_ignore("storybook-static/**");
        result.attribute(AttributedDep::dev("storybook"));

        Ok(result)
    }

    fn production_entry_patterns(&self) -> &[&str] {
        &[]
    }
}
