use super::{CheckResult, CheckSess, Context, DeclInfo, DeclKind, Delayed};
use crate::{
    ast::{Decl, Expr, ExprKind, FieldList, File, FuncDecl, GenDecl, Ident, Item, NodeId, Spec, StmtKind, ValueKind, ValueSpec},
    constant::ConstValue,
    error::ErrorKind,
    info::{DeclSite, NewCode},
    workspace::{
        object::{FuncInfo, ObjectFlags, ObjectId, ObjectKind},
        scope::{RedeclareMode, ScopeId},
        NewObject, Redeclared,
    },
};
use indexmap::IndexSet;
use ustr::Ustr;

/// The base type name of a method receiver: `T` for `T`, `*T` and `(*T)`.
pub(super) fn receiver_base_name(recv: &FieldList) -> Option<Ustr> {
    let field = recv.fields.first()?;
    let mut ty = field.ty.unparen();
    if let ExprKind::Star(inner) = &ty.kind {
        ty = inner.unparen();
    }
    ty.as_ident().map(|ident| ident.name)
}

impl<'s> CheckSess<'s> {
    /// Creates and declares the objects of every top-level declaration of the
    /// batch. Their types are resolved later.
    pub fn collect_objects(&mut self, files: &[File]) -> CheckResult {
        let _span = tracing::debug_span!("collect_objects").entered();
        let pkg_scope = self.pkg_scope();

        for file in files {
            self.record_def(file.package_name.id, None);
            self.package_clause(file);

            // Incremental batches see the imports of earlier batches.
            let parent = match self.chk.file_scopes.last() {
                Some(prev) if !self.conf.full_package => *prev,
                _ => pkg_scope,
            };
            let file_scope = self.ws.new_scope(Some(parent), file.span, &format!("file {:?}", file.path));
            self.record_scope(file.id, file_scope);
            self.chk.file_scopes.push(file_scope);

            for item in &file.items {
                match item {
                    Item::Decl(Decl::Gen(gen)) => self.collect_gen_decl(file, file_scope, gen),
                    Item::Decl(Decl::Func(func)) => self.collect_func_decl(file_scope, func),
                    Item::Stmt(stmt) => {
                        if self.conf.full_package {
                            self.invalid_op(stmt.span, "non-declaration statement outside function body");
                        } else {
                            let is_expr = matches!(stmt.kind, StmtKind::Expr(_));
                            self.log_new_code(None, file_scope, stmt.id, is_expr, false, None);
                            self.stmts.push(Delayed::Stmt {
                                stmt: stmt.clone(),
                                file_scope,
                            });
                        }
                    }
                }
                self.checkpoint()?;
            }
        }

        self.check_import_conflicts();

        tracing::debug!(objects = self.batch.len(), stmts = self.stmts.len(), "objects collected");
        self.checkpoint()
    }

    fn package_clause(&mut self, file: &File) {
        let name = file.package_name.name;
        if name == "_" {
            self.invalid_op(file.package_name.span, "invalid package name _");
            return;
        }

        let first = self.chk.file_scopes.is_empty();
        let pkg = self.ws.package_mut(self.pkg);
        if pkg.name == name {
            return;
        }

        if first {
            pkg.name = name;
        } else {
            let expected = pkg.name;
            self.invalid_op(
                file.package_name.span,
                format!("package {}; expected {}", name, expected),
            );
        }
    }

    fn collect_gen_decl(&mut self, file: &File, file_scope: ScopeId, gen: &GenDecl) {
        // The last constant spec with an expression list, for implicit repetition.
        let mut last: Option<&ValueSpec> = None;
        let mut iota = 0;

        for spec in &gen.specs {
            match spec {
                Spec::Import(import) => self.collect_import(file, file_scope, import),
                Spec::Value(vs) if vs.kind == ValueKind::Const => {
                    if vs.ty.is_some() || !vs.values.is_empty() {
                        last = Some(vs);
                    }
                    let (ty, values) = match last {
                        Some(src) => (src.ty.as_ref(), &src.values[..]),
                        None => (None, &[][..]),
                    };

                    for (i, name) in vs.names.iter().enumerate() {
                        let obj = self.ws.new_object(NewObject::new(
                            ObjectKind::Const(ConstValue::unknown()),
                            name.name,
                            name.span,
                            Some(self.pkg),
                        ));
                        self.declare_pkg_obj(name, obj, vs.id);
                        self.add_decl(
                            obj,
                            file_scope,
                            vs.id,
                            DeclKind::Const {
                                ty: ty.cloned(),
                                init: values.get(i).cloned(),
                                iota,
                            },
                        );
                    }

                    self.arity_match(vs, values.len(), ty.is_some());
                    iota += 1;
                }
                Spec::Value(vs) => {
                    let objs: Vec<ObjectId> = vs
                        .names
                        .iter()
                        .map(|name| {
                            self.ws.new_object(
                                NewObject::new(ObjectKind::Var, name.name, name.span, Some(self.pkg))
                                    .with_flags(ObjectFlags::PKG_LEVEL),
                            )
                        })
                        .collect();

                    let n_to_1 = vs.values.len() == 1 && vs.names.len() > 1;

                    for (i, (name, obj)) in vs.names.iter().zip(&objs).enumerate() {
                        let (lhs, init) = if n_to_1 {
                            (objs.clone(), vs.values.first().cloned())
                        } else {
                            (vec![*obj], vs.values.get(i).cloned())
                        };
                        self.declare_pkg_obj(name, *obj, vs.id);
                        self.add_decl(
                            *obj,
                            file_scope,
                            vs.id,
                            DeclKind::Var {
                                lhs,
                                ty: vs.ty.clone(),
                                init,
                            },
                        );
                    }

                    if !n_to_1 {
                        self.arity_match(vs, vs.values.len(), vs.ty.is_some());
                    }
                }
                Spec::Type(ts) => {
                    let obj = self.ws.new_object(NewObject::new(
                        ObjectKind::TypeName,
                        ts.name.name,
                        ts.name.span,
                        Some(self.pkg),
                    ));
                    self.declare_pkg_obj(&ts.name, obj, ts.id);
                    self.add_decl(obj, file_scope, ts.id, DeclKind::Type(ts.clone()));
                }
            }
        }
    }

    /// Reports mismatches between the names and values of a value spec.
    fn arity_match(&mut self, vs: &ValueSpec, values: usize, has_type: bool) {
        let names = vs.names.len();

        if values == 0 && !has_type {
            let msg = match vs.kind {
                ValueKind::Const => "missing init expr for const declaration",
                ValueKind::Var => "missing type or init expr",
            };
            self.invalid_op(vs.span, msg);
        } else if values > 0 && names < values {
            let span = vs.values.get(names).map_or(vs.span, |v| v.span);
            self.invalid_op(span, "extra init expr");
        } else if values > 0 && names > values {
            let name = vs.names[values].name;
            self.invalid_op(vs.names[values].span, format!("missing init expr for {}", name));
        }
    }

    fn collect_func_decl(&mut self, file_scope: ScopeId, func: &FuncDecl) {
        let name = func.name.name;
        let obj = self.ws.new_object(NewObject::new(
            ObjectKind::Func(FuncInfo { decl: Some(func.id) }),
            name,
            func.name.span,
            Some(self.pkg),
        ));

        match &func.recv {
            None if name == "init" => {
                // init functions are never bound, so they cannot be referred to.
                self.record_def(func.name.id, Some(obj));
                if !func.ty.params.fields.is_empty() || func.ty.results.is_some() {
                    self.invalid_op(func.name.span, "func init must have no arguments and no return values");
                }
                if func.body.is_none() {
                    self.invalid_op(func.name.span, "missing function body");
                }
                self.log_new_code(Some(obj), self.pkg_scope(), func.id, false, true, None);
            }
            None => {
                if name == "main" && self.ws.package(self.pkg).name == "main" {
                    if !func.ty.params.fields.is_empty() || func.ty.results.is_some() {
                        self.invalid_op(func.name.span, "func main must have no arguments and no return values");
                    }
                }
                self.declare_pkg_obj(&func.name, obj, func.id);
            }
            Some(recv) => {
                self.record_def(func.name.id, Some(obj));
                if let Some(base) = receiver_base_name(recv) {
                    if !func.name.is_blank() {
                        self.chk.methods.entry(base).or_default().push(obj);
                    }
                }
                self.log_new_code(Some(obj), self.pkg_scope(), func.id, false, false, None);
            }
        }

        self.add_decl(obj, file_scope, func.id, DeclKind::Func(func.clone()));
    }

    fn add_decl(&mut self, obj: ObjectId, file_scope: ScopeId, node: NodeId, kind: DeclKind) {
        self.chk.obj_map.insert(
            obj,
            DeclInfo {
                file_scope,
                node,
                kind,
                deps: IndexSet::new(),
            },
        );
        self.batch.push(obj);
    }

    /// Binds a package-level object, replacing an earlier binding of the same
    /// name when redeclaration is allowed.
    pub fn declare_pkg_obj(&mut self, ident: &Ident, obj: ObjectId, node: NodeId) {
        self.record_def(ident.id, Some(obj));

        let scope = self.pkg_scope();
        if ident.is_blank() {
            self.ws.declare(scope, obj, RedeclareMode::Forbid).ok();
            self.log_new_code(Some(obj), scope, node, false, true, None);
            return;
        }

        let mode = if self.conf.allow_redeclaration {
            RedeclareMode::Allow
        } else {
            RedeclareMode::Forbid
        };

        let replaced = match self.ws.declare(scope, obj, mode) {
            Ok(replaced) => replaced,
            Err(Redeclared { prev }) => {
                self.report_redeclared(ident.name, ident.span, prev);
                return;
            }
        };

        if let Some(prev) = replaced {
            tracing::debug!(name = %ident.name, "package-level name redeclared");
            self.replaced.push(prev);
        }

        let site = DeclSite { node, scope, obj };
        self.chk.decl_sites.insert(ident.name, site);
        if let Some(name2node) = self.chk.info.name2node.as_mut() {
            name2node.insert(ident.name, site);
        }

        self.log_new_code(Some(obj), scope, node, false, true, replaced);
    }

    pub fn report_redeclared(&mut self, name: Ustr, span: crate::span::Span, prev: ObjectId) {
        self.error(
            ErrorKind::Redeclaration,
            span,
            format!("{} redeclared in this block", name),
        );
        let prev_span = self.ws.object(prev).span;
        if !prev_span.is_unknown() {
            self.error(
                ErrorKind::Redeclaration,
                prev_span,
                format!("\tother declaration of {}", name),
            );
        }
    }

    /// Appends an entry to the edit log, which only incremental checks keep.
    pub fn log_new_code(
        &mut self,
        obj: Option<ObjectId>,
        scope: ScopeId,
        node: NodeId,
        is_expr: bool,
        is_pkg_scope: bool,
        replaced: Option<ObjectId>,
    ) {
        if self.conf.full_package {
            return;
        }
        if let Some(log) = self.chk.info.new_code.as_mut() {
            log.push(NewCode {
                obj,
                scope,
                node,
                is_expr,
                is_pkg_scope,
                replaced,
            });
        }
    }

    /// A package-level name must not also be bound by an import.
    fn check_import_conflicts(&mut self) {
        let pkg_scope = self.pkg_scope();
        let file_scopes = self.chk.file_scopes.clone();

        for obj in self.batch.clone() {
            let object = self.ws.object(obj);
            if object.parent != Some(pkg_scope) || object.is_blank() {
                continue;
            }
            let name = object.name;
            for scope in &file_scopes {
                if let Some(import) = self.ws.lookup(*scope, name) {
                    let import_span = self.ws.object(import).span;
                    let span = self.ws.object(obj).span;
                    self.error(
                        ErrorKind::Redeclaration,
                        span,
                        format!("{} already declared through import of package", name),
                    );
                    self.error(
                        ErrorKind::Redeclaration,
                        import_span,
                        format!("\tother declaration of {}", name),
                    );
                    break;
                }
            }
        }

        for import in self.batch_imports.clone() {
            let object = self.ws.object(import);
            let (name, span) = (object.name, object.span);
            if let Some(obj) = self.ws.lookup(pkg_scope, name) {
                if self.batch.contains(&obj) {
                    // Reported above.
                    continue;
                }
                self.error(
                    ErrorKind::Redeclaration,
                    span,
                    format!("{} already declared in this package", name),
                );
            }
        }
    }

    /// Resolves every package-level object of the batch. Type definitions go
    /// first so that aliases find them complete.
    pub fn package_objects(&mut self) -> CheckResult {
        let _span = tracing::debug_span!("package_objects").entered();
        let objs = self.batch.clone();

        let (types, others): (Vec<ObjectId>, Vec<ObjectId>) = objs.into_iter().partition(|obj| {
            matches!(
                self.chk.obj_map.get(obj).map(|d| &d.kind),
                Some(DeclKind::Type(spec)) if !spec.is_alias
            )
        });

        for obj in types.into_iter().chain(others) {
            self.obj_decl(obj);
            self.checkpoint()?;
        }

        Ok(())
    }

    /// Checks the standalone statements of the batch, in arrival order.
    pub fn process_stmts(&mut self) -> CheckResult {
        let stmts = std::mem::take(&mut self.stmts);

        for delayed in &stmts {
            if let Delayed::Stmt { stmt, file_scope } = delayed {
                let ctx = Context {
                    scope: *file_scope,
                    top_level: true,
                    ..Default::default()
                };
                self.with_context(ctx, |sess| sess.top_level_stmt(stmt));
                self.checkpoint()?;
            }
        }

        Ok(())
    }

    /// Checks the function bodies of the batch. Function literals inside
    /// other bodies are checked where they occur.
    pub fn process_bodies(&mut self) -> CheckResult {
        let _span = tracing::debug_span!("process_bodies").entered();

        // Literals of package-level initializers may queue more bodies.
        while !self.bodies.is_empty() {
            let bodies = std::mem::take(&mut self.bodies);
            for delayed in &bodies {
                if let Delayed::Body {
                    name,
                    decl,
                    sig,
                    body,
                    file_scope,
                } = delayed
                {
                    let ctx = Context {
                        scope: *file_scope,
                        ..Default::default()
                    };
                    self.with_context(ctx, |sess| sess.func_body(*name, *decl, *sig, body));
                    self.checkpoint()?;
                }
            }
        }

        Ok(())
    }

    /// The expression initializing `obj`, if it has one.
    pub fn init_expr(&self, obj: ObjectId) -> Option<&Expr> {
        match &self.chk.obj_map.get(&obj)?.kind {
            DeclKind::Var { init, .. } => init.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::AstBuilder;

    #[test]
    fn receiver_base_names() {
        let mut b = AstBuilder::new();

        let t = b.ident("T");
        let field = b.field(&["t"], t);
        let list = b.field_list(vec![field]);
        assert_eq!(receiver_base_name(&list).as_deref(), Some("T"));

        let t = b.ident("T");
        let ptr = b.star(t);
        let paren = b.paren(ptr);
        let field = b.field(&[], paren);
        let list = b.field_list(vec![field]);
        assert_eq!(receiver_base_name(&list).as_deref(), Some("T"));

        let t = b.ident("T");
        let slice = b.slice_type(t);
        let field = b.field(&[], slice);
        let list = b.field_list(vec![field]);
        assert_eq!(receiver_base_name(&list), None);
    }
}
