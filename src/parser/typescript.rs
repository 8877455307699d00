use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use swc_common::{
    comments::SingleThreadedComments,
    errors::{ColorConfig, Handler},
    input::StringInput,
    sync::Lrc,
    FileName, SourceMap, Span,
};
use swc_ecma_ast::Module;
use swc_ecma_parser::{lexer::Lexer, EsSyntax, Parser, Syntax, TsSyntax};

use super::compilers::extract_embedded_source;
use super::exports::{extract_exports, Export, ReExport};
use super::imports::{extract_imports, Import};
use super::references::{collect_references, DynamicImport, FileRefs};

/// Everything the analysis needs from one file, as plain data. Spans are
/// reduced to line/col so the record is cacheable.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ParsedModule {
    pub imports: Vec<Import>,
    pub exports: Vec<Export>,
    pub re_exports: Vec<ReExport>,
    pub refs: FileRefs,
    pub dynamic_imports: Vec<DynamicImport>,
}

pub fn parse_file(path: &Path) -> Result<ParsedModule> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    parse_source(&source, path)
}

pub fn parse_source(source: &str, path: &Path) -> Result<ParsedModule> {
    // Non-standard extensions carry their scripts embedded; reduce them to
    // plain source first.
    let source = match extract_embedded_source(source, path) {
        Some(plain) => plain,
        None => source.to_string(),
    };

    let cm: Lrc<SourceMap> = Default::default();
    let handler = Handler::with_tty_emitter(ColorConfig::Auto, true, false, Some(cm.clone()));
    let comments = SingleThreadedComments::default();

    let fm = cm.new_source_file(Lrc::new(FileName::Real(path.to_path_buf())), source);

    let syntax = get_syntax_for_file(path);

    let lexer = Lexer::new(
        syntax,
        swc_ecma_ast::EsVersion::EsNext,
        StringInput::from(&*fm),
        Some(&comments),
    );

    let mut parser = Parser::new_from(lexer);

    for e in parser.take_errors() {
        e.into_diagnostic(&handler).emit();
    }

    let module = parser.parse_module().map_err(|e| {
        e.into_diagnostic(&handler).emit();
        anyhow::anyhow!("Failed to parse module: {}", path.display())
    })?;

    Ok(extract_module_info(&module, &cm, &comments))
}

fn get_syntax_for_file(path: &Path) -> Syntax {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match ext {
        "ts" | "mts" | "cts" => Syntax::Typescript(TsSyntax {
            tsx: false,
            decorators: true,
            dts: name.ends_with(".d.ts"),
            no_early_errors: true,
            ..Default::default()
        }),
        "tsx" => Syntax::Typescript(TsSyntax {
            tsx: true,
            decorators: true,
            dts: false,
            no_early_errors: true,
            ..Default::default()
        }),
        // Embedded scripts out of .vue/.svelte/.astro are TypeScript more
        // often than not; the TS parser accepts plain JS either way.
        "vue" | "svelte" | "astro" => Syntax::Typescript(TsSyntax {
            tsx: false,
            decorators: true,
            no_early_errors: true,
            ..Default::default()
        }),
        _ => Syntax::Es(EsSyntax {
            jsx: true,
            decorators: true,
            ..Default::default()
        }),
    }
}

fn extract_module_info(
    module: &Module,
    cm: &SourceMap,
    comments: &SingleThreadedComments,
) -> ParsedModule {
    let mut imports = extract_imports(module, cm);
    let (exports, re_exports) = extract_exports(module, cm, comments);
    let (refs, mut dynamic_edges, dynamic_imports) = collect_references(module, cm);

    imports.append(&mut dynamic_edges);

    ParsedModule {
        imports,
        exports,
        re_exports,
        refs,
        dynamic_imports,
    }
}

pub fn get_line_col(cm: &SourceMap, span: Span) -> (u32, u32) {
    let loc = cm.lookup_char_pos(span.lo);
    (loc.line as u32, loc.col_display as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_simple_import() {
        let source = r#"import { foo } from './foo';"#;
        let result = parse_source(source, &PathBuf::from("test.ts")).unwrap();
        assert_eq!(result.imports.len(), 1);
        assert_eq!(result.imports[0].specifier, "./foo");
    }

    #[test]
    fn test_parse_simple_export() {
        let source = r#"export function foo() {}"#;
        let result = parse_source(source, &PathBuf::from("test.ts")).unwrap();
        assert_eq!(result.exports.len(), 1);
        assert_eq!(result.exports[0].name, "foo");
    }

    #[test]
    fn test_parse_tsx() {
        let source = r#"
            import React from 'react';
            export const App = () => <div>Hello</div>;
        "#;
        let result = parse_source(source, &PathBuf::from("test.tsx")).unwrap();
        assert_eq!(result.imports.len(), 1);
        assert_eq!(result.exports.len(), 1);
    }

    #[test]
    fn test_parse_type_import() {
        let source = r#"import type { Foo } from './types';"#;
        let result = parse_source(source, &PathBuf::from("test.ts")).unwrap();
        assert_eq!(result.imports.len(), 1);
        assert!(result.imports[0].is_type_only);
    }

    #[test]
    fn test_parse_error_is_err() {
        let source = "import { from ???";
        assert!(parse_source(source, &PathBuf::from("broken.ts")).is_err());
    }

    #[test]
    fn test_dynamic_import_literal_becomes_edge() {
        let source = r#"const mod = await import('./lazy');"#;
        let result = parse_source(source, &PathBuf::from("test.ts")).unwrap();
        assert_eq!(result.imports.len(), 1);
        assert_eq!(result.imports[0].specifier, "./lazy");
        assert!(result.imports[0].is_dynamic);
    }

    #[test]
    fn test_dynamic_import_template_is_marker_only() {
        let source = r#"const p = await import('./entry-' + name + '.ts');"#;
        let result = parse_source(source, &PathBuf::from("test.ts")).unwrap();
        assert!(result.imports.is_empty());
        assert_eq!(result.dynamic_imports.len(), 1);
    }
}
