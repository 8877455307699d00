use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use swc_common::comments::Comments;
use swc_common::{comments::SingleThreadedComments, SourceMap, Span};
use swc_ecma_ast::{
    Class, ClassDecl, Decl, DefaultDecl, ExportDecl, ExportDefaultDecl, ExportDefaultExpr,
    ExportNamedSpecifier, ExportSpecifier, FnDecl, MethodKind, Module, ModuleDecl,
    ModuleExportName, ModuleItem, NamedExport, Pat, PropName, TsEnumDecl, TsEnumMemberId,
    VarDeclarator,
};

use super::imports::{atom_to_string, wtf8_to_string};
use super::typescript::get_line_col;

static JSDOC_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@([A-Za-z][\w-]*)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportKind {
    Function,
    Class,
    Variable,
    Const,
    Let,
    Type,
    Interface,
    Enum,
    Namespace,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberKind {
    EnumMember,
    Method,
    Property,
    Getter,
    Setter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Export {
    pub name: String,
    pub kind: ExportKind,
    pub is_type: bool,
    pub is_default: bool,
    pub line: u32,
    pub col: u32,
    /// JSDoc tags on the export declaration (`public`, `internal`, ...).
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    /// Enum and class members, for member-level reporting.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<ExportMember>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMember {
    pub name: String,
    pub kind: MemberKind,
    pub line: u32,
    pub col: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReExport {
    pub specifier: String,
    pub exported_names: Vec<ReExportedName>,
    pub is_type_only: bool,
    pub line: u32,
    pub col: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReExportedName {
    /// `*` for namespace re-exports.
    pub name: String,
    pub alias: Option<String>,
    pub is_type: bool,
}

pub fn extract_exports(
    module: &Module,
    cm: &SourceMap,
    comments: &SingleThreadedComments,
) -> (Vec<Export>, Vec<ReExport>) {
    let mut exports = Vec::new();
    let mut re_exports = Vec::new();

    for item in &module.body {
        let ModuleItem::ModuleDecl(decl) = item else {
            continue;
        };
        match decl {
            ModuleDecl::ExportDecl(export_decl) => {
                let tags = jsdoc_tags(comments, export_decl.span);
                for mut export in extract_export_decl(export_decl, cm) {
                    export.tags = tags.clone();
                    exports.push(export);
                }
            }
            ModuleDecl::ExportDefaultDecl(default_decl) => {
                let mut export = extract_default_decl(default_decl, cm);
                export.tags = jsdoc_tags(comments, default_decl.span);
                exports.push(export);
            }
            ModuleDecl::ExportDefaultExpr(default_expr) => {
                let mut export = extract_default_expr(default_expr, cm);
                export.tags = jsdoc_tags(comments, default_expr.span);
                exports.push(export);
            }
            ModuleDecl::ExportNamed(named) => {
                if named.src.is_some() {
                    re_exports.push(extract_named_re_export(named, cm));
                } else {
                    let tags = jsdoc_tags(comments, named.span);
                    for mut export in extract_named_export(named, cm) {
                        export.tags = tags.clone();
                        exports.push(export);
                    }
                }
            }
            ModuleDecl::ExportAll(all) => {
                let (line, col) = get_line_col(cm, all.span);
                re_exports.push(ReExport {
                    specifier: wtf8_to_string(&all.src.value),
                    exported_names: vec![ReExportedName {
                        name: "*".to_string(),
                        alias: None,
                        is_type: all.type_only,
                    }],
                    is_type_only: all.type_only,
                    line,
                    col,
                });
            }
            ModuleDecl::TsExportAssignment(assign) => {
                let (line, col) = get_line_col(cm, assign.span);
                exports.push(Export {
                    name: "default".to_string(),
                    kind: ExportKind::Default,
                    is_type: false,
                    is_default: true,
                    line,
                    col,
                    tags: BTreeSet::new(),
                    members: Vec::new(),
                });
            }
            _ => {}
        }
    }

    (exports, re_exports)
}

fn jsdoc_tags(comments: &SingleThreadedComments, span: Span) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    if let Some(leading) = comments.get_leading(span.lo) {
        for comment in leading {
            let text = format!("{}", comment.text);
            for capture in JSDOC_TAG_RE.captures_iter(&text) {
                tags.insert(capture[1].to_string());
            }
        }
    }
    tags
}

fn plain_export(name: String, kind: ExportKind, is_type: bool, line: u32, col: u32) -> Export {
    Export {
        name,
        kind,
        is_type,
        is_default: false,
        line,
        col,
        tags: BTreeSet::new(),
        members: Vec::new(),
    }
}

fn extract_export_decl(export_decl: &ExportDecl, cm: &SourceMap) -> Vec<Export> {
    let mut exports = Vec::new();
    let (line, col) = get_line_col(cm, export_decl.span);

    match &export_decl.decl {
        Decl::Fn(FnDecl { ident, .. }) => {
            exports.push(plain_export(
                atom_to_string(&ident.sym),
                ExportKind::Function,
                false,
                line,
                col,
            ));
        }
        Decl::Class(ClassDecl { ident, class, .. }) => {
            let mut export = plain_export(
                atom_to_string(&ident.sym),
                ExportKind::Class,
                false,
                line,
                col,
            );
            export.members = class_members(class, cm);
            exports.push(export);
        }
        Decl::Var(var_decl) => {
            let kind = match var_decl.kind {
                swc_ecma_ast::VarDeclKind::Const => ExportKind::Const,
                swc_ecma_ast::VarDeclKind::Let => ExportKind::Let,
                swc_ecma_ast::VarDeclKind::Var => ExportKind::Variable,
            };
            for decl in &var_decl.decls {
                exports.extend(extract_var_declarator(decl, kind, line, col));
            }
        }
        Decl::TsInterface(interface_decl) => {
            exports.push(plain_export(
                atom_to_string(&interface_decl.id.sym),
                ExportKind::Interface,
                true,
                line,
                col,
            ));
        }
        Decl::TsTypeAlias(type_alias) => {
            exports.push(plain_export(
                atom_to_string(&type_alias.id.sym),
                ExportKind::Type,
                true,
                line,
                col,
            ));
        }
        Decl::TsEnum(enum_decl) => {
            let mut export = plain_export(
                atom_to_string(&enum_decl.id.sym),
                ExportKind::Enum,
                false,
                line,
                col,
            );
            export.members = enum_members(enum_decl, cm);
            exports.push(export);
        }
        Decl::TsModule(module_decl) => {
            let name = match &module_decl.id {
                swc_ecma_ast::TsModuleName::Ident(ident) => atom_to_string(&ident.sym),
                swc_ecma_ast::TsModuleName::Str(s) => wtf8_to_string(&s.value),
            };
            exports.push(plain_export(name, ExportKind::Namespace, true, line, col));
        }
        _ => {}
    }

    exports
}

fn enum_members(enum_decl: &TsEnumDecl, cm: &SourceMap) -> Vec<ExportMember> {
    enum_decl
        .members
        .iter()
        .map(|member| {
            let (line, col) = get_line_col(cm, member.span);
            let name = match &member.id {
                TsEnumMemberId::Ident(ident) => atom_to_string(&ident.sym),
                TsEnumMemberId::Str(s) => wtf8_to_string(&s.value),
            };
            ExportMember {
                name,
                kind: MemberKind::EnumMember,
                line,
                col,
            }
        })
        .collect()
}

fn class_members(class: &Class, cm: &SourceMap) -> Vec<ExportMember> {
    use swc_ecma_ast::ClassMember;

    let mut members = Vec::new();

    for member in &class.body {
        match member {
            ClassMember::Method(method) => {
                let Some(name) = prop_name(&method.key) else {
                    continue;
                };
                let (line, col) = get_line_col(cm, method.span);
                members.push(ExportMember {
                    name,
                    kind: method_kind(method.kind),
                    line,
                    col,
                });
            }
            ClassMember::ClassProp(prop) => {
                let Some(name) = prop_name(&prop.key) else {
                    continue;
                };
                let (line, col) = get_line_col(cm, prop.span);
                members.push(ExportMember {
                    name,
                    kind: MemberKind::Property,
                    line,
                    col,
                });
            }
            ClassMember::PrivateMethod(method) => {
                let (line, col) = get_line_col(cm, method.span);
                members.push(ExportMember {
                    name: format!("#{}", atom_to_string(&method.key.name)),
                    kind: method_kind(method.kind),
                    line,
                    col,
                });
            }
            ClassMember::PrivateProp(prop) => {
                let (line, col) = get_line_col(cm, prop.span);
                members.push(ExportMember {
                    name: format!("#{}", atom_to_string(&prop.key.name)),
                    kind: MemberKind::Property,
                    line,
                    col,
                });
            }
            _ => {}
        }
    }

    members
}

fn method_kind(kind: MethodKind) -> MemberKind {
    match kind {
        MethodKind::Method => MemberKind::Method,
        MethodKind::Getter => MemberKind::Getter,
        MethodKind::Setter => MemberKind::Setter,
    }
}

fn prop_name(key: &PropName) -> Option<String> {
    match key {
        PropName::Ident(ident) => Some(atom_to_string(&ident.sym)),
        PropName::Str(s) => Some(wtf8_to_string(&s.value)),
        _ => None,
    }
}

fn extract_var_declarator(
    decl: &VarDeclarator,
    kind: ExportKind,
    line: u32,
    col: u32,
) -> Vec<Export> {
    let mut exports = Vec::new();

    match &decl.name {
        Pat::Ident(ident) => {
            exports.push(plain_export(
                atom_to_string(&ident.sym),
                kind,
                false,
                line,
                col,
            ));
        }
        Pat::Object(obj) => {
            for prop in &obj.props {
                if let swc_ecma_ast::ObjectPatProp::KeyValue(kv) = prop {
                    if let PropName::Ident(key) = &kv.key {
                        exports.push(plain_export(
                            atom_to_string(&key.sym),
                            kind,
                            false,
                            line,
                            col,
                        ));
                    }
                } else if let swc_ecma_ast::ObjectPatProp::Assign(assign) = prop {
                    exports.push(plain_export(
                        atom_to_string(&assign.key.sym),
                        kind,
                        false,
                        line,
                        col,
                    ));
                }
            }
        }
        Pat::Array(arr) => {
            for elem in arr.elems.iter().flatten() {
                if let Pat::Ident(ident) = elem {
                    exports.push(plain_export(
                        atom_to_string(&ident.sym),
                        kind,
                        false,
                        line,
                        col,
                    ));
                }
            }
        }
        _ => {}
    }

    exports
}

fn extract_default_decl(default_decl: &ExportDefaultDecl, cm: &SourceMap) -> Export {
    let (line, col) = get_line_col(cm, default_decl.span);

    let (name, kind, members) = match &default_decl.decl {
        DefaultDecl::Fn(fn_expr) => {
            let name = fn_expr
                .ident
                .as_ref()
                .map(|i| atom_to_string(&i.sym))
                .unwrap_or_else(|| "default".to_string());
            (name, ExportKind::Function, Vec::new())
        }
        DefaultDecl::Class(class_expr) => {
            let name = class_expr
                .ident
                .as_ref()
                .map(|i| atom_to_string(&i.sym))
                .unwrap_or_else(|| "default".to_string());
            (name, ExportKind::Class, class_members(&class_expr.class, cm))
        }
        DefaultDecl::TsInterfaceDecl(interface) => (
            atom_to_string(&interface.id.sym),
            ExportKind::Interface,
            Vec::new(),
        ),
    };

    Export {
        name,
        kind,
        is_type: matches!(default_decl.decl, DefaultDecl::TsInterfaceDecl(_)),
        is_default: true,
        line,
        col,
        tags: BTreeSet::new(),
        members,
    }
}

fn extract_default_expr(default_expr: &ExportDefaultExpr, cm: &SourceMap) -> Export {
    let (line, col) = get_line_col(cm, default_expr.span);

    Export {
        name: "default".to_string(),
        kind: ExportKind::Default,
        is_type: false,
        is_default: true,
        line,
        col,
        tags: BTreeSet::new(),
        members: Vec::new(),
    }
}

fn extract_named_export(named: &NamedExport, cm: &SourceMap) -> Vec<Export> {
    let mut exports = Vec::new();
    let (line, col) = get_line_col(cm, named.span);

    for spec in &named.specifiers {
        if let ExportSpecifier::Named(ExportNamedSpecifier {
            orig,
            exported,
            is_type_only,
            ..
        }) = spec
        {
            let name = match orig {
                ModuleExportName::Ident(ident) => atom_to_string(&ident.sym),
                ModuleExportName::Str(s) => wtf8_to_string(&s.value),
            };

            let exported_name = exported.as_ref().map(|e| match e {
                ModuleExportName::Ident(ident) => atom_to_string(&ident.sym),
                ModuleExportName::Str(s) => wtf8_to_string(&s.value),
            });

            let final_name = exported_name.unwrap_or(name);
            let is_default = final_name == "default";
            exports.push(Export {
                name: final_name,
                kind: if is_default {
                    ExportKind::Default
                } else {
                    ExportKind::Variable
                },
                is_type: *is_type_only || named.type_only,
                is_default,
                line,
                col,
                tags: BTreeSet::new(),
                members: Vec::new(),
            });
        }
    }

    exports
}

fn extract_named_re_export(named: &NamedExport, cm: &SourceMap) -> ReExport {
    let (line, col) = get_line_col(cm, named.span);
    let specifier = named
        .src
        .as_ref()
        .map(|s| wtf8_to_string(&s.value))
        .unwrap_or_default();

    let mut exported_names = Vec::new();
    for spec in &named.specifiers {
        match spec {
            ExportSpecifier::Named(ExportNamedSpecifier {
                orig,
                exported,
                is_type_only,
                ..
            }) => {
                let name = match orig {
                    ModuleExportName::Ident(ident) => atom_to_string(&ident.sym),
                    ModuleExportName::Str(s) => wtf8_to_string(&s.value),
                };
                let alias = exported.as_ref().map(|e| match e {
                    ModuleExportName::Ident(ident) => atom_to_string(&ident.sym),
                    ModuleExportName::Str(s) => wtf8_to_string(&s.value),
                });
                exported_names.push(ReExportedName {
                    name,
                    alias,
                    is_type: *is_type_only || named.type_only,
                });
            }
            ExportSpecifier::Namespace(ns) => {
                let alias = match &ns.name {
                    ModuleExportName::Ident(ident) => atom_to_string(&ident.sym),
                    ModuleExportName::Str(s) => wtf8_to_string(&s.value),
                };
                exported_names.push(ReExportedName {
                    name: "*".to_string(),
                    alias: Some(alias),
                    is_type: named.type_only,
                });
            }
            ExportSpecifier::Default(_) => {
                exported_names.push(ReExportedName {
                    name: "default".to_string(),
                    alias: None,
                    is_type: false,
                });
            }
        }
    }

    ReExport {
        specifier,
        exported_names,
        is_type_only: named.type_only,
        line,
        col,
    }
}
