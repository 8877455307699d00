use std::path::Path;

use anyhow::Result;

use super::traits::{find_config_file, AttributedDep, Plugin, PluginContext, PluginOutput};

pub struct TypeScriptPlugin;

impl Plugin for TypeScriptPlugin {
    fn name(&self) -> &'static str {
        "typescript"
    }

    fn is_enabled(&self, dir: &Path, ctx: &PluginContext) -> bool {
        find_config_file(dir, self.config_patterns()).is_some()
            || ctx.has_dependency("typescript")
            || ctx.has_script_invoking("tsc")
    }

    fn config_patterns(&self) -> &[&str] {
        &["tsconfig.json", "jsconfig.json"]
    }

    fn entry_patterns(&self) -> &[&str] {
        &[]
    }

    fn script_markers(&self) -> &[&str] {
        &["tsc"]
    }

    fn resolve(&self, dir: &Path, _ctx: &PluginContext) -> Result<PluginOutput> {
        let mut result = PluginOutput::new();

        if find_config_file(dir, self.config_patterns()).is_some() {
            result.attribute(AttributedDep::dev("typescript"));
        }

        result.add_ignore("**/*.tsbuildinfo");

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_enabled_with_tsconfig() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("tsconfig.json"), "{}").unwrap();

        let plugin = TypeScriptPlugin;
        assert!(plugin.is_enabled(temp.path(), &PluginContext::default()));
    }

    #[test]
    fn test_attributes_typescript() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("tsconfig.json"), "{}").unwrap();

        let plugin = TypeScriptPlugin;
        let result = plugin.resolve(temp.path(), &PluginContext::default()).unwrap();
        assert!(result
            .dependencies
            .contains(&AttributedDep::dev("typescript")));
    }
}
