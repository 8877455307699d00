use serde::{Deserialize, Serialize};
use swc_common::SourceMap;
use swc_ecma_ast::{ImportDecl, ImportSpecifier, Module, ModuleDecl, ModuleItem};

use super::typescript::get_line_col;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    pub specifier: String,
    pub imported_names: Vec<ImportedName>,
    pub is_type_only: bool,
    pub is_side_effect: bool,
    /// `import()` / `require()` call rather than a static declaration.
    pub is_dynamic: bool,
    pub line: u32,
    pub col: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedName {
    /// The exported name on the source module; `default` or `*` for
    /// default and namespace bindings.
    pub name: String,
    /// The local binding, when it differs from `name`.
    pub alias: Option<String>,
    pub is_type: bool,
}

impl Import {
    /// The local binding of a namespace import, if this import has one.
    pub fn namespace_alias(&self) -> Option<&str> {
        self.imported_names
            .iter()
            .find(|n| n.name == "*")
            .and_then(|n| n.alias.as_deref())
    }
}

pub(super) fn atom_to_string(atom: &swc_atoms::Atom) -> String {
    format!("{}", atom)
}

pub(super) fn wtf8_to_string(wtf8: &swc_atoms::Wtf8Atom) -> String {
    wtf8.as_str().unwrap_or_default().to_string()
}

/// Static `import` declarations. Dynamic forms (`import()`, `require`,
/// `new URL`) are collected by the reference walker.
pub fn extract_imports(module: &Module, cm: &SourceMap) -> Vec<Import> {
    let mut imports = Vec::new();

    for item in &module.body {
        if let ModuleItem::ModuleDecl(ModuleDecl::Import(import_decl)) = item {
            imports.push(extract_import_decl(import_decl, cm));
        }
    }

    imports
}

fn extract_import_decl(decl: &ImportDecl, cm: &SourceMap) -> Import {
    let (line, col) = get_line_col(cm, decl.span);
    let specifier = wtf8_to_string(&decl.src.value);
    let is_type_only = decl.type_only;

    let mut imported_names = Vec::new();
    let mut is_side_effect = true;

    for spec in &decl.specifiers {
        is_side_effect = false;
        match spec {
            ImportSpecifier::Named(named) => {
                let name = named
                    .imported
                    .as_ref()
                    .map(|i| match i {
                        swc_ecma_ast::ModuleExportName::Ident(id) => atom_to_string(&id.sym),
                        swc_ecma_ast::ModuleExportName::Str(s) => wtf8_to_string(&s.value),
                    })
                    .unwrap_or_else(|| atom_to_string(&named.local.sym));

                let alias = Some(atom_to_string(&named.local.sym));

                imported_names.push(ImportedName {
                    name,
                    alias,
                    is_type: named.is_type_only || is_type_only,
                });
            }
            ImportSpecifier::Default(default) => {
                imported_names.push(ImportedName {
                    name: "default".to_string(),
                    alias: Some(atom_to_string(&default.local.sym)),
                    is_type: is_type_only,
                });
            }
            ImportSpecifier::Namespace(ns) => {
                imported_names.push(ImportedName {
                    name: "*".to_string(),
                    alias: Some(atom_to_string(&ns.local.sym)),
                    is_type: is_type_only,
                });
            }
        }
    }

    Import {
        specifier,
        imported_names,
        is_type_only,
        is_side_effect,
        is_dynamic: false,
        line,
        col,
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::parse_source;
    use std::path::PathBuf;

    #[test]
    fn test_named_import_with_alias() {
        let source = r#"import { foo, bar as baz } from './module';"#;
        let result = parse_source(source, &PathBuf::from("test.ts")).unwrap();

        assert_eq!(result.imports.len(), 1);
        let names = &result.imports[0].imported_names;
        assert_eq!(names.len(), 2);
        assert_eq!(names[0].name, "foo");
        assert_eq!(names[1].name, "bar");
        assert_eq!(names[1].alias.as_deref(), Some("baz"));
    }

    #[test]
    fn test_default_import() {
        let source = r#"import React from 'react';"#;
        let result = parse_source(source, &PathBuf::from("test.ts")).unwrap();
        assert_eq!(result.imports[0].imported_names[0].name, "default");
        assert_eq!(
            result.imports[0].imported_names[0].alias.as_deref(),
            Some("React")
        );
    }

    #[test]
    fn test_namespace_import() {
        let source = r#"import * as utils from './utils';"#;
        let result = parse_source(source, &PathBuf::from("test.ts")).unwrap();
        assert_eq!(result.imports[0].namespace_alias(), Some("utils"));
    }

    #[test]
    fn test_side_effect_import() {
        let source = r#"import './polyfill';"#;
        let result = parse_source(source, &PathBuf::from("test.ts")).unwrap();
        assert!(result.imports[0].is_side_effect);
        assert!(result.imports[0].imported_names.is_empty());
    }

    #[test]
    fn test_inline_type_specifier() {
        let source = r#"import { type Props, render } from './view';"#;
        let result = parse_source(source, &PathBuf::from("test.ts")).unwrap();
        let names = &result.imports[0].imported_names;
        assert!(names[0].is_type);
        assert!(!names[1].is_type);
    }
}
