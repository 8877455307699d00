use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use swc_common::{SourceMap, Span};
use swc_ecma_ast::{
    BlockStmtOrExpr, Callee, Class, ClassMember, Decl, Expr, ForHead, Function, Lit, MemberProp,
    Module, ModuleDecl, ModuleItem, ObjectPatProp, Pat, Prop, PropName, PropOrSpread, Stmt,
    VarDeclarator,
};

use super::imports::{atom_to_string, wtf8_to_string, Import, ImportedName};
use super::typescript::get_line_col;

/// Syntactic usage signals from one file. The graph combines these with
/// the import table to decide which exports are referenced.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct FileRefs {
    /// Every property name accessed anywhere (`a.b`, `this.b`, `x().b`).
    pub property_names: BTreeSet<String>,
    /// Every identifier read in expression position.
    pub idents: BTreeSet<String>,
    /// Identifier → property names accessed on it (`ns.foo`).
    pub qualified: BTreeMap<String, BTreeSet<String>>,
    /// Identifiers whose value escapes whole: spread, call argument,
    /// `Object.values`, `for…in/of`, aliasing assignment, computed access.
    pub escaped: BTreeSet<String>,
    /// Identifier → names pulled out by destructuring.
    pub destructured: BTreeMap<String, BTreeSet<String>>,
}

/// A non-literal `import()` site. Contributes no edge, but is reported in
/// diagnostics-aware queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicImport {
    pub line: u32,
    pub col: u32,
}

pub fn collect_references(
    module: &Module,
    cm: &SourceMap,
) -> (FileRefs, Vec<Import>, Vec<DynamicImport>) {
    let mut collector = Collector {
        cm,
        refs: FileRefs::default(),
        edges: Vec::new(),
        dynamic: Vec::new(),
    };

    for item in &module.body {
        match item {
            ModuleItem::Stmt(stmt) => collector.walk_stmt(stmt),
            ModuleItem::ModuleDecl(decl) => match decl {
                ModuleDecl::ExportDecl(export_decl) => collector.walk_decl(&export_decl.decl),
                ModuleDecl::ExportDefaultDecl(default_decl) => match &default_decl.decl {
                    swc_ecma_ast::DefaultDecl::Fn(f) => collector.walk_function(&f.function),
                    swc_ecma_ast::DefaultDecl::Class(c) => collector.walk_class(&c.class),
                    swc_ecma_ast::DefaultDecl::TsInterfaceDecl(_) => {}
                },
                ModuleDecl::ExportDefaultExpr(default_expr) => {
                    collector.walk_expr(&default_expr.expr)
                }
                _ => {}
            },
        }
    }

    (collector.refs, collector.edges, collector.dynamic)
}

/// What a string-literal module call looked like at the call site.
enum ModuleCall {
    Specifier(String, Span),
    DynamicArgument(Span),
}

struct Collector<'a> {
    cm: &'a SourceMap,
    refs: FileRefs,
    edges: Vec<Import>,
    dynamic: Vec<DynamicImport>,
}

impl<'a> Collector<'a> {
    fn walk_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => {
                for stmt in &block.stmts {
                    self.walk_stmt(stmt);
                }
            }
            Stmt::Expr(expr_stmt) => self.walk_expr(&expr_stmt.expr),
            Stmt::Decl(decl) => self.walk_decl(decl),
            Stmt::If(if_stmt) => {
                self.walk_expr(&if_stmt.test);
                self.walk_stmt(&if_stmt.cons);
                if let Some(alt) = &if_stmt.alt {
                    self.walk_stmt(alt);
                }
            }
            Stmt::Return(ret) => {
                if let Some(arg) = &ret.arg {
                    self.walk_expr(arg);
                }
            }
            Stmt::Throw(throw) => self.walk_expr(&throw.arg),
            Stmt::While(w) => {
                self.walk_expr(&w.test);
                self.walk_stmt(&w.body);
            }
            Stmt::DoWhile(d) => {
                self.walk_stmt(&d.body);
                self.walk_expr(&d.test);
            }
            Stmt::For(f) => {
                if let Some(init) = &f.init {
                    match init {
                        swc_ecma_ast::VarDeclOrExpr::VarDecl(var) => {
                            for decl in &var.decls {
                                self.walk_var_declarator(decl);
                            }
                        }
                        swc_ecma_ast::VarDeclOrExpr::Expr(e) => self.walk_expr(e),
                    }
                }
                if let Some(test) = &f.test {
                    self.walk_expr(test);
                }
                if let Some(update) = &f.update {
                    self.walk_expr(update);
                }
                self.walk_stmt(&f.body);
            }
            Stmt::ForIn(f) => {
                self.walk_for_head(&f.left);
                self.escape_expr(&f.right);
                self.walk_stmt(&f.body);
            }
            Stmt::ForOf(f) => {
                self.walk_for_head(&f.left);
                self.escape_expr(&f.right);
                self.walk_stmt(&f.body);
            }
            Stmt::Switch(s) => {
                self.walk_expr(&s.discriminant);
                for case in &s.cases {
                    if let Some(test) = &case.test {
                        self.walk_expr(test);
                    }
                    for stmt in &case.cons {
                        self.walk_stmt(stmt);
                    }
                }
            }
            Stmt::Try(t) => {
                for stmt in &t.block.stmts {
                    self.walk_stmt(stmt);
                }
                if let Some(handler) = &t.handler {
                    for stmt in &handler.body.stmts {
                        self.walk_stmt(stmt);
                    }
                }
                if let Some(finalizer) = &t.finalizer {
                    for stmt in &finalizer.stmts {
                        self.walk_stmt(stmt);
                    }
                }
            }
            Stmt::Labeled(l) => self.walk_stmt(&l.body),
            _ => {}
        }
    }

    fn walk_for_head(&mut self, head: &ForHead) {
        match head {
            ForHead::VarDecl(var) => {
                for decl in &var.decls {
                    self.walk_pat(&decl.name);
                }
            }
            ForHead::Pat(pat) => self.walk_pat(pat),
            _ => {}
        }
    }

    fn walk_decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Var(var_decl) => {
                for declarator in &var_decl.decls {
                    self.walk_var_declarator(declarator);
                }
            }
            Decl::Fn(fn_decl) => self.walk_function(&fn_decl.function),
            Decl::Class(class_decl) => self.walk_class(&class_decl.class),
            Decl::TsEnum(enum_decl) => {
                for member in &enum_decl.members {
                    if let Some(init) = &member.init {
                        self.walk_expr(init);
                    }
                }
            }
            Decl::TsModule(module_decl) => {
                if let Some(swc_ecma_ast::TsNamespaceBody::TsModuleBlock(block)) =
                    &module_decl.body
                {
                    for item in &block.body {
                        if let ModuleItem::Stmt(stmt) = item {
                            self.walk_stmt(stmt);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// `const x = ...` shapes carry the interesting namespace signals:
    /// destructuring a module object, aliasing it, or requiring one.
    fn walk_var_declarator(&mut self, decl: &VarDeclarator) {
        let Some(init) = &decl.init else {
            self.walk_pat(&decl.name);
            return;
        };

        match self.as_module_call(init) {
            Some(ModuleCall::Specifier(specifier, span)) => {
                let (line, col) = get_line_col(self.cm, span);
                let imported_names = names_from_pattern(&decl.name);
                self.edges.push(Import {
                    specifier,
                    imported_names,
                    is_type_only: false,
                    is_side_effect: false,
                    is_dynamic: true,
                    line,
                    col,
                });
                return;
            }
            Some(ModuleCall::DynamicArgument(span)) => {
                let (line, col) = get_line_col(self.cm, span);
                self.dynamic.push(DynamicImport { line, col });
                return;
            }
            None => {}
        }

        match (&decl.name, init.as_ref()) {
            // `const { a, b } = ns` pulls out only those names.
            (Pat::Object(obj), Expr::Ident(ident)) => {
                let source = atom_to_string(&ident.sym);
                self.refs.idents.insert(source.clone());

                let mut names = BTreeSet::new();
                let mut has_rest = false;
                for prop in &obj.props {
                    match prop {
                        ObjectPatProp::KeyValue(kv) => {
                            if let PropName::Ident(key) = &kv.key {
                                names.insert(atom_to_string(&key.sym));
                            }
                        }
                        ObjectPatProp::Assign(assign) => {
                            names.insert(atom_to_string(&assign.key.sym));
                        }
                        // Rest captures everything that is left.
                        ObjectPatProp::Rest(_) => has_rest = true,
                    }
                }
                if has_rest {
                    self.refs.escaped.insert(source);
                } else {
                    self.refs
                        .destructured
                        .entry(source)
                        .or_default()
                        .extend(names);
                }
            }
            // `const alias = ns` lets every member escape through `alias`.
            (Pat::Ident(_), Expr::Ident(ident)) => {
                self.escape_ident(ident);
            }
            _ => {
                self.walk_pat(&decl.name);
                self.walk_expr(init);
            }
        }
    }

    fn walk_pat(&mut self, pat: &Pat) {
        match pat {
            Pat::Object(obj) => {
                for prop in &obj.props {
                    match prop {
                        ObjectPatProp::KeyValue(kv) => self.walk_pat(&kv.value),
                        ObjectPatProp::Assign(assign) => {
                            if let Some(value) = &assign.value {
                                self.walk_expr(value);
                            }
                        }
                        ObjectPatProp::Rest(rest) => self.walk_pat(&rest.arg),
                    }
                }
            }
            Pat::Array(arr) => {
                for elem in arr.elems.iter().flatten() {
                    self.walk_pat(elem);
                }
            }
            Pat::Assign(assign) => {
                self.walk_pat(&assign.left);
                self.walk_expr(&assign.right);
            }
            Pat::Rest(rest) => self.walk_pat(&rest.arg),
            _ => {}
        }
    }

    fn walk_function(&mut self, function: &Function) {
        for param in &function.params {
            self.walk_pat(&param.pat);
        }
        if let Some(body) = &function.body {
            for stmt in &body.stmts {
                self.walk_stmt(stmt);
            }
        }
    }

    fn walk_class(&mut self, class: &Class) {
        if let Some(super_class) = &class.super_class {
            self.walk_expr(super_class);
        }
        for member in &class.body {
            match member {
                ClassMember::Method(method) => {
                    if let PropName::Computed(computed) = &method.key {
                        self.walk_expr(&computed.expr);
                    }
                    self.walk_function(&method.function);
                }
                ClassMember::PrivateMethod(method) => self.walk_function(&method.function),
                ClassMember::ClassProp(prop) => {
                    if let PropName::Computed(computed) = &prop.key {
                        self.walk_expr(&computed.expr);
                    }
                    if let Some(value) = &prop.value {
                        self.walk_expr(value);
                    }
                }
                ClassMember::PrivateProp(prop) => {
                    if let Some(value) = &prop.value {
                        self.walk_expr(value);
                    }
                }
                ClassMember::Constructor(ctor) => {
                    for param in &ctor.params {
                        if let swc_ecma_ast::ParamOrTsParamProp::Param(param) = param {
                            self.walk_pat(&param.pat);
                        }
                    }
                    if let Some(body) = &ctor.body {
                        for stmt in &body.stmts {
                            self.walk_stmt(stmt);
                        }
                    }
                }
                ClassMember::StaticBlock(block) => {
                    for stmt in &block.body.stmts {
                        self.walk_stmt(stmt);
                    }
                }
                _ => {}
            }
        }
    }

    fn walk_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(ident) => {
                self.refs.idents.insert(atom_to_string(&ident.sym));
            }
            Expr::Member(member) => {
                let prop = match &member.prop {
                    MemberProp::Ident(ident) => Some(atom_to_string(&ident.sym)),
                    MemberProp::PrivateName(name) => {
                        Some(format!("#{}", atom_to_string(&name.name)))
                    }
                    MemberProp::Computed(computed) => {
                        self.walk_expr(&computed.expr);
                        None
                    }
                };

                match (&*member.obj, prop) {
                    (Expr::Ident(obj), Some(prop)) => {
                        let obj_name = atom_to_string(&obj.sym);
                        self.refs.idents.insert(obj_name.clone());
                        self.refs.property_names.insert(prop.clone());
                        self.refs.qualified.entry(obj_name).or_default().insert(prop);
                    }
                    (Expr::Ident(obj), None) => {
                        // Computed access reads an unknown member.
                        self.escape_ident(obj);
                    }
                    (obj, Some(prop)) => {
                        self.refs.property_names.insert(prop);
                        if !matches!(obj, Expr::This(_)) {
                            self.walk_expr(obj);
                        }
                    }
                    (obj, None) => {
                        if !matches!(obj, Expr::This(_)) {
                            self.walk_expr(obj);
                        }
                    }
                }
            }
            Expr::Call(call) => {
                match self.as_module_call(expr) {
                    Some(ModuleCall::Specifier(specifier, span)) => {
                        let (line, col) = get_line_col(self.cm, span);
                        self.edges.push(Import {
                            specifier,
                            imported_names: vec![ImportedName {
                                name: "*".to_string(),
                                alias: None,
                                is_type: false,
                            }],
                            is_type_only: false,
                            is_side_effect: false,
                            is_dynamic: true,
                            line,
                            col,
                        });
                        return;
                    }
                    Some(ModuleCall::DynamicArgument(span)) => {
                        let (line, col) = get_line_col(self.cm, span);
                        self.dynamic.push(DynamicImport { line, col });
                        return;
                    }
                    None => {}
                }

                if is_object_iteration(call) {
                    for arg in &call.args {
                        self.escape_expr(&arg.expr);
                    }
                    return;
                }

                if let Callee::Expr(callee) = &call.callee {
                    // A bare callee is a plain use, not an escape.
                    match &**callee {
                        Expr::Ident(ident) => {
                            self.refs.idents.insert(atom_to_string(&ident.sym));
                        }
                        other => self.walk_expr(other),
                    }
                }
                // An argument's value is handed to code we do not analyze;
                // identifiers escape.
                for arg in &call.args {
                    self.escape_expr(&arg.expr);
                }
            }
            Expr::New(new_expr) => {
                if let Some(edge) = self.as_url_reference(new_expr) {
                    self.edges.push(edge);
                    return;
                }
                match &*new_expr.callee {
                    Expr::Ident(ident) => {
                        self.refs.idents.insert(atom_to_string(&ident.sym));
                    }
                    other => self.walk_expr(other),
                }
                if let Some(args) = &new_expr.args {
                    for arg in args {
                        self.escape_expr(&arg.expr);
                    }
                }
            }
            Expr::Assign(assign) => {
                if let swc_ecma_ast::AssignTarget::Simple(
                    swc_ecma_ast::SimpleAssignTarget::Member(member),
                ) = &assign.left
                {
                    self.walk_expr(&Expr::Member(member.clone()));
                }
                self.escape_expr(&assign.right);
            }
            Expr::Bin(bin) => {
                self.walk_expr(&bin.left);
                self.walk_expr(&bin.right);
            }
            Expr::Unary(unary) => self.walk_expr(&unary.arg),
            Expr::Update(update) => self.walk_expr(&update.arg),
            Expr::Cond(cond) => {
                self.walk_expr(&cond.test);
                self.walk_expr(&cond.cons);
                self.walk_expr(&cond.alt);
            }
            Expr::Paren(paren) => self.walk_expr(&paren.expr),
            Expr::Await(await_expr) => self.walk_expr(&await_expr.arg),
            Expr::Yield(yield_expr) => {
                if let Some(arg) = &yield_expr.arg {
                    self.walk_expr(arg);
                }
            }
            Expr::Seq(seq) => {
                for expr in &seq.exprs {
                    self.walk_expr(expr);
                }
            }
            Expr::Array(array) => {
                for elem in array.elems.iter().flatten() {
                    self.escape_expr(&elem.expr);
                }
            }
            Expr::Object(object) => {
                for prop in &object.props {
                    match prop {
                        PropOrSpread::Spread(spread) => self.escape_expr(&spread.expr),
                        PropOrSpread::Prop(prop) => match &**prop {
                            Prop::Shorthand(ident) => {
                                self.escape_ident(ident);
                            }
                            Prop::KeyValue(kv) => {
                                if let PropName::Computed(computed) = &kv.key {
                                    self.walk_expr(&computed.expr);
                                }
                                self.escape_expr(&kv.value);
                            }
                            Prop::Method(method) => self.walk_function(&method.function),
                            Prop::Getter(getter) => {
                                if let Some(body) = &getter.body {
                                    for stmt in &body.stmts {
                                        self.walk_stmt(stmt);
                                    }
                                }
                            }
                            Prop::Setter(setter) => {
                                if let Some(body) = &setter.body {
                                    for stmt in &body.stmts {
                                        self.walk_stmt(stmt);
                                    }
                                }
                            }
                            _ => {}
                        },
                    }
                }
            }
            Expr::Arrow(arrow) => {
                for pat in &arrow.params {
                    self.walk_pat(pat);
                }
                match &*arrow.body {
                    BlockStmtOrExpr::BlockStmt(block) => {
                        for stmt in &block.stmts {
                            self.walk_stmt(stmt);
                        }
                    }
                    BlockStmtOrExpr::Expr(expr) => self.walk_expr(expr),
                }
            }
            Expr::Fn(fn_expr) => self.walk_function(&fn_expr.function),
            Expr::Class(class_expr) => self.walk_class(&class_expr.class),
            Expr::Tpl(tpl) => {
                for expr in &tpl.exprs {
                    self.walk_expr(expr);
                }
            }
            Expr::TaggedTpl(tagged) => {
                self.walk_expr(&tagged.tag);
                for expr in &tagged.tpl.exprs {
                    self.walk_expr(expr);
                }
            }
            Expr::OptChain(opt) => match &*opt.base {
                swc_ecma_ast::OptChainBase::Member(member) => {
                    self.walk_expr(&Expr::Member(member.clone()))
                }
                swc_ecma_ast::OptChainBase::Call(call) => {
                    self.walk_expr(&call.callee);
                    for arg in &call.args {
                        self.escape_expr(&arg.expr);
                    }
                }
            },
            Expr::TsAs(as_expr) => self.walk_expr(&as_expr.expr),
            Expr::TsNonNull(non_null) => self.walk_expr(&non_null.expr),
            Expr::TsSatisfies(satisfies) => self.walk_expr(&satisfies.expr),
            Expr::TsConstAssertion(assertion) => self.walk_expr(&assertion.expr),
            Expr::TsTypeAssertion(assertion) => self.walk_expr(&assertion.expr),
            Expr::JSXElement(element) => self.walk_jsx_element(element),
            Expr::JSXFragment(fragment) => {
                for child in &fragment.children {
                    self.walk_jsx_child(child);
                }
            }
            _ => {}
        }
    }

    fn walk_jsx_element(&mut self, element: &swc_ecma_ast::JSXElement) {
        use swc_ecma_ast::{JSXAttrOrSpread, JSXAttrValue, JSXElementName};

        match &element.opening.name {
            JSXElementName::Ident(ident) => {
                let name = atom_to_string(&ident.sym);
                // Lowercase names are intrinsic elements, not components.
                if name.chars().next().is_some_and(|c| c.is_uppercase()) {
                    self.refs.idents.insert(name);
                }
            }
            JSXElementName::JSXMemberExpr(member) => {
                let mut object = &member.obj;
                let prop = atom_to_string(&member.prop.sym);
                self.refs.property_names.insert(prop.clone());
                loop {
                    match object {
                        swc_ecma_ast::JSXObject::Ident(ident) => {
                            let obj_name = atom_to_string(&ident.sym);
                            self.refs.idents.insert(obj_name.clone());
                            self.refs
                                .qualified
                                .entry(obj_name)
                                .or_default()
                                .insert(prop);
                            break;
                        }
                        swc_ecma_ast::JSXObject::JSXMemberExpr(inner) => {
                            object = &inner.obj;
                        }
                    }
                }
            }
            _ => {}
        }

        for attr in &element.opening.attrs {
            match attr {
                JSXAttrOrSpread::SpreadElement(spread) => self.escape_expr(&spread.expr),
                JSXAttrOrSpread::JSXAttr(attr) => {
                    if let Some(JSXAttrValue::JSXExprContainer(container)) = &attr.value {
                        if let swc_ecma_ast::JSXExpr::Expr(expr) = &container.expr {
                            self.walk_expr(expr);
                        }
                    }
                }
            }
        }

        for child in &element.children {
            self.walk_jsx_child(child);
        }
    }

    fn walk_jsx_child(&mut self, child: &swc_ecma_ast::JSXElementChild) {
        use swc_ecma_ast::JSXElementChild;
        match child {
            JSXElementChild::JSXElement(element) => self.walk_jsx_element(element),
            JSXElementChild::JSXFragment(fragment) => {
                for child in &fragment.children {
                    self.walk_jsx_child(child);
                }
            }
            JSXElementChild::JSXExprContainer(container) => {
                if let swc_ecma_ast::JSXExpr::Expr(expr) = &container.expr {
                    self.walk_expr(expr);
                }
            }
            _ => {}
        }
    }

    /// Walk an expression in a position where a bare identifier's value
    /// leaves our sight.
    fn escape_expr(&mut self, expr: &Expr) {
        if let Expr::Ident(ident) = expr {
            self.escape_ident(ident);
        } else {
            self.walk_expr(expr);
        }
    }

    fn escape_ident(&mut self, ident: &swc_ecma_ast::Ident) {
        let name = atom_to_string(&ident.sym);
        self.refs.idents.insert(name.clone());
        self.refs.escaped.insert(name);
    }

    /// Match `import('lit')` / `require('lit')`, unwrapping awaits and
    /// parens. A non-literal `import()` argument is a dynamic marker.
    fn as_module_call(&mut self, expr: &Expr) -> Option<ModuleCall> {
        match expr {
            Expr::Await(await_expr) => self.as_module_call(&await_expr.arg),
            Expr::Paren(paren) => self.as_module_call(&paren.expr),
            Expr::Call(call) => {
                let is_import = matches!(call.callee, Callee::Import(_));
                let is_require = matches!(
                    &call.callee,
                    Callee::Expr(callee)
                        if matches!(&**callee, Expr::Ident(i) if atom_to_string(&i.sym) == "require")
                );
                if !is_import && !is_require {
                    return None;
                }

                match call.args.first().map(|arg| &*arg.expr) {
                    Some(Expr::Lit(Lit::Str(s))) => {
                        Some(ModuleCall::Specifier(wtf8_to_string(&s.value), call.span))
                    }
                    Some(_) if is_import => Some(ModuleCall::DynamicArgument(call.span)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// `new URL('./asset', import.meta.url)` references a sibling file.
    fn as_url_reference(&mut self, new_expr: &swc_ecma_ast::NewExpr) -> Option<Import> {
        let Expr::Ident(callee) = &*new_expr.callee else {
            return None;
        };
        if atom_to_string(&callee.sym) != "URL" {
            return None;
        }
        let args = new_expr.args.as_ref()?;
        let Expr::Lit(Lit::Str(specifier)) = &*args.first()?.expr else {
            return None;
        };
        let second = args.get(1)?;
        let Expr::Member(member) = &*second.expr else {
            return None;
        };
        let is_import_meta = matches!(&*member.obj, Expr::MetaProp(_));
        if !is_import_meta {
            return None;
        }

        let (line, col) = get_line_col(self.cm, new_expr.span);
        Some(Import {
            specifier: wtf8_to_string(&specifier.value),
            imported_names: Vec::new(),
            is_type_only: false,
            is_side_effect: true,
            is_dynamic: true,
            line,
            col,
        })
    }
}

/// `Object.values(x)` / `Object.keys(x)` / `Object.entries(x)` iterate the
/// whole module object.
fn is_object_iteration(call: &swc_ecma_ast::CallExpr) -> bool {
    let Callee::Expr(callee) = &call.callee else {
        return false;
    };
    let Expr::Member(member) = &**callee else {
        return false;
    };
    let Expr::Ident(obj) = &*member.obj else {
        return false;
    };
    if atom_to_string(&obj.sym) != "Object" {
        return false;
    }
    let MemberProp::Ident(prop) = &member.prop else {
        return false;
    };
    matches!(
        atom_to_string(&prop.sym).as_str(),
        "values" | "keys" | "entries" | "assign" | "freeze"
    )
}

fn names_from_pattern(pat: &Pat) -> Vec<ImportedName> {
    match pat {
        Pat::Ident(ident) => vec![ImportedName {
            name: "*".to_string(),
            alias: Some(atom_to_string(&ident.sym)),
            is_type: false,
        }],
        Pat::Object(obj) => {
            let mut names = Vec::new();
            for prop in &obj.props {
                match prop {
                    ObjectPatProp::KeyValue(kv) => {
                        if let PropName::Ident(key) = &kv.key {
                            names.push(ImportedName {
                                name: atom_to_string(&key.sym),
                                alias: None,
                                is_type: false,
                            });
                        }
                    }
                    ObjectPatProp::Assign(assign) => {
                        names.push(ImportedName {
                            name: atom_to_string(&assign.key.sym),
                            alias: None,
                            is_type: false,
                        });
                    }
                    ObjectPatProp::Rest(_) => {
                        return vec![ImportedName {
                            name: "*".to_string(),
                            alias: None,
                            is_type: false,
                        }];
                    }
                }
            }
            names
        }
        _ => vec![ImportedName {
            name: "*".to_string(),
            alias: None,
            is_type: false,
        }],
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::parse_source;
    use std::path::PathBuf;

    fn parse(source: &str) -> crate::parser::ParsedModule {
        parse_source(source, &PathBuf::from("test.ts")).unwrap()
    }

    #[test]
    fn test_qualified_member_use() {
        let module = parse(
            r#"
            import * as fruits from './fruits';
            console.log(fruits.apple);
        "#,
        );
        assert!(module.refs.qualified["fruits"].contains("apple"));
        assert!(!module.refs.escaped.contains("fruits"));
    }

    #[test]
    fn test_object_values_escapes() {
        let module = parse(
            r#"
            import * as fruits from './fruits';
            Object.values(fruits);
        "#,
        );
        assert!(module.refs.escaped.contains("fruits"));
    }

    #[test]
    fn test_call_argument_escapes() {
        let module = parse(
            r#"
            import * as handlers from './handlers';
            register(handlers);
        "#,
        );
        assert!(module.refs.escaped.contains("handlers"));
    }

    #[test]
    fn test_for_in_escapes() {
        let module = parse(
            r#"
            import * as table from './table';
            for (const key in table) { console.log(key); }
        "#,
        );
        assert!(module.refs.escaped.contains("table"));
    }

    #[test]
    fn test_spread_escapes() {
        let module = parse(
            r#"
            import * as defaults from './defaults';
            const merged = { ...defaults };
        "#,
        );
        assert!(module.refs.escaped.contains("defaults"));
    }

    #[test]
    fn test_destructuring_narrows() {
        let module = parse(
            r#"
            import * as api from './api';
            const { list, remove } = api;
        "#,
        );
        let names = &module.refs.destructured["api"];
        assert!(names.contains("list"));
        assert!(names.contains("remove"));
        assert!(!module.refs.escaped.contains("api"));
    }

    #[test]
    fn test_callee_does_not_escape() {
        let module = parse(
            r#"
            import { run } from './run';
            run();
        "#,
        );
        assert!(module.refs.idents.contains("run"));
        assert!(!module.refs.escaped.contains("run"));
    }

    #[test]
    fn test_require_with_pattern() {
        let module = parse(r#"const { readFile } = require('fs-extra');"#);
        assert_eq!(module.imports.len(), 1);
        assert_eq!(module.imports[0].specifier, "fs-extra");
        assert_eq!(module.imports[0].imported_names[0].name, "readFile");
    }

    #[test]
    fn test_new_url_reference() {
        let module = parse(r#"const worker = new URL('./worker.ts', import.meta.url);"#);
        assert_eq!(module.imports.len(), 1);
        assert_eq!(module.imports[0].specifier, "./worker.ts");
        assert!(module.imports[0].is_side_effect);
    }

    #[test]
    fn test_this_member_counts_as_property() {
        let module = parse(
            r#"
            export class C {
                used() { return 1; }
                caller() { return this.used(); }
            }
        "#,
        );
        assert!(module.refs.property_names.contains("used"));
    }

    #[test]
    fn test_enum_qualified_access() {
        let module = parse(
            r#"
            import { Status } from './status';
            const s = Status.Active;
        "#,
        );
        assert!(module.refs.qualified["Status"].contains("Active"));
        assert!(module.refs.property_names.contains("Active"));
    }

    #[test]
    fn test_jsx_component_use() {
        let module = parse_source(
            r#"
            import { Button } from './button';
            import * as Icons from './icons';
            export const App = () => <div><Button /><Icons.Star /></div>;
        "#,
            &PathBuf::from("test.tsx"),
        )
        .unwrap();
        assert!(module.refs.idents.contains("Button"));
        assert!(module.refs.qualified["Icons"].contains("Star"));
    }

    #[test]
    fn test_computed_access_escapes() {
        let module = parse(
            r#"
            import * as registry from './registry';
            const entry = registry[name];
        "#,
        );
        assert!(module.refs.escaped.contains("registry"));
    }
}
