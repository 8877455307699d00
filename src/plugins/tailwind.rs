use std::path::Path;

use anyhow::Result;

use super::traits::{find_config_file, AttributedDep, Plugin, PluginContext, PluginOutput};

pub struct TailwindPlugin;

impl Plugin for TailwindPlugin {
    fn name(&self) -> &'static str {
        "tailwind"
    }

    fn is_enabled(&self, dir: &Path, ctx: &PluginContext) -> bool {
        find_config_file(dir, self.config_patterns()).is_some()
            || ctx.has_dependency("tailwindcss")
    }

    fn config_patterns(&self) -> &[&str] {
        &[
            "tailwind.config.ts",
            "tailwind.config.js",
            "tailwind.config.cjs",
            "tailwind.config.mjs",
        ]
    }

    fn entry_patterns(&self) -> &[&str] {
        &[]
    }

    fn resolve(&self, dir: &Path, _ctx: &PluginContext) -> Result<PluginOutput> {
        let mut result = PluginOutput::new();

        if let Some(config) = find_config_file(dir, self.config_patterns()) {
            if let Some(name) = config.file_name().and_then(|f| f.to_str()) {
                result.add_entry(name);
            }
        }

        result.attribute(AttributedDep::dev("tailwindcss"));

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_detection() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("tailwind.config.js"), "module.exports = {}").unwrap();

        let plugin = TailwindPlugin;
        assert!(plugin.is_enabled(temp.path(), &PluginContext::default()));

        let result = plugin
            .resolve(temp.path(), &PluginContext::default())
            .unwrap();
        assert!(result
            .dependencies
            .contains(&AttributedDep::dev("tailwindcss")));
    }
}
