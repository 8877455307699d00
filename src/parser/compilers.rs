use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script[^>]*>(.*?)</script>").unwrap()
});

static ASTRO_FRONTMATTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A---\s*\n(.*?)\n---").unwrap());

static MDX_IMPORT_EXPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(?:import|export)\b[^\n]*(?:\n[ \t]+[^\n]*)*").unwrap());

/// Reduce a non-standard file to the plain JS/TS it embeds. Returns `None`
/// for standard extensions, which parse as-is.
pub fn extract_embedded_source(source: &str, path: &Path) -> Option<String> {
    let ext = path.extension().and_then(|e| e.to_str())?;

    match ext {
        "vue" | "svelte" => {
            let blocks: Vec<&str> = SCRIPT_BLOCK_RE
                .captures_iter(source)
                .filter_map(|c| c.get(1).map(|m| m.as_str()))
                .collect();
            Some(blocks.join("\n"))
        }
        "astro" => Some(
            ASTRO_FRONTMATTER_RE
                .captures(source)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        ),
        "mdx" => {
            let statements: Vec<&str> = MDX_IMPORT_EXPORT_RE
                .find_iter(source)
                .map(|m| m.as_str())
                .collect();
            Some(statements.join("\n"))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_standard_extension_passes_through() {
        assert!(extract_embedded_source("const x = 1;", &PathBuf::from("a.ts")).is_none());
    }

    #[test]
    fn test_vue_script_block() {
        let source = r#"
<template><div>{{ msg }}</div></template>
<script setup lang="ts">
import { ref } from 'vue';
const msg = ref('hi');
</script>
"#;
        let plain = extract_embedded_source(source, &PathBuf::from("App.vue")).unwrap();
        assert!(plain.contains("import { ref } from 'vue';"));
        assert!(!plain.contains("<template>"));
    }

    #[test]
    fn test_svelte_multiple_scripts() {
        let source = r#"
<script context="module">import { a } from './a';</script>
<script>import { b } from './b';</script>
<p>text</p>
"#;
        let plain = extract_embedded_source(source, &PathBuf::from("X.svelte")).unwrap();
        assert!(plain.contains("./a"));
        assert!(plain.contains("./b"));
    }

    #[test]
    fn test_astro_frontmatter() {
        let source = "---\nimport Layout from './Layout.astro';\n---\n<Layout />\n";
        let plain = extract_embedded_source(source, &PathBuf::from("index.astro")).unwrap();
        assert!(plain.contains("./Layout.astro"));
        assert!(!plain.contains("<Layout"));
    }

    #[test]
    fn test_mdx_top_level_statements() {
        let source = "# Title\n\nimport { Chart } from './chart';\n\nSome text\n\nexport const meta = { a: 1 };\n";
        let plain = extract_embedded_source(source, &PathBuf::from("doc.mdx")).unwrap();
        assert!(plain.contains("./chart"));
        assert!(plain.contains("export const meta"));
        assert!(!plain.contains("# Title"));
    }
}
