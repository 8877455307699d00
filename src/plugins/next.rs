use std::path::Path;

use anyhow::Result;

use super::traits::{find_config_file, AttributedDep, Plugin, PluginContext, PluginOutput};

pub struct NextPlugin;

impl Plugin for NextPlugin {
    fn name(&self) -> &'static str {
        "next"
    }

    fn is_enabled(&self, dir: &Path, ctx: &PluginContext) -> bool {
        find_config_file(dir, self.config_patterns()).is_some() || ctx.has_dependency("next")
    }

    fn config_patterns(&self) -> &[&str] {
        &["next.config.js", "next.config.mjs", "next.config.ts"]
    }

    fn entry_patterns(&self) -> &[&str] {
        &[
            "app/**/page.{ts,tsx,js,jsx}",
            "app/**/layout.{ts,tsx,js,jsx}",
            "app/**/loading.{ts,tsx}",
            "app/**/error.{ts,tsx}",
            "app/**/not-found.{ts,tsx}",
            "app/**/route.{ts,tsx}",
            "app/global-error.{ts,tsx}",
            "pages/**/*.{ts,tsx,js,jsx}",
            "src/app/**/page.{ts,tsx}",
            "src/app/**/layout.{ts,tsx}",
            "src/app/**/route.{ts,tsx}",
            "src/pages/**/*.{ts,tsx}",
            "middleware.{ts,js}",
            "src/middleware.{ts,js}",
            "instrumentation.{ts,js}",
            "src/instrumentation.{ts,js}",
        ]
    }

    fn resolve(&self, dir: &Path, _ctx: &PluginContext) -> Result<PluginOutput> {
        let mut result = PluginOutput::new();

        for pattern in self.entry_patterns() {
            result.add_entry(*pattern);
        }

        result.add_ignore(".next/**");
        result.add_ignore("out/**");

        if let Some(config) = find_config_file(dir, self.config_patterns()) {
            if let Some(name) = config.file_name().and_then(|f| f.to_str()) {
                result.add_entry(name);
            }
        }

        result.attribute(AttributedDep::production("next"));
        result.attribute(AttributedDep::production("react"));
        result.attribute(AttributedDep::production("react-dom"));

        Ok(result)
    }

    fn production_entry_patterns(&self) -> &[&str] {
        &[
            "app/**/page.{ts,tsx}",
            "app/**/layout.{ts,tsx}",
            "app/**/route.{ts,tsx}",
            "pages/**/*.{ts,tsx}",
            "src/app/**/page.{ts,tsx}",
            "src/app/**/layout.{ts,tsx}",
            "src/pages/**/*.{ts,tsx}",
            "middleware.{ts,js}",
            "src/middleware.{ts,js}",
        ]
    }
}
