use super::{
    operand::Operand, resolver::receiver_base_name, CheckSess, Context, DeclKind, Delayed,
};
use crate::{
    ast::{Expr, FuncDecl, GenDecl, Spec, TypeSpec, ValueKind},
    constant::ConstValue,
    error::ErrorKind,
    info::OperandMode,
    types::{NamedType, Type, TypeId},
    workspace::{
        object::{Color, ObjectFlags, ObjectId, ObjectKind},
        scope::RedeclareMode,
        NewObject, Redeclared,
    },
};
use std::collections::HashSet;

impl<'s> CheckSess<'s> {
    /// Resolves the type of a package-level object, checking its declaration
    /// first if that has not happened yet.
    pub fn obj_decl(&mut self, obj: ObjectId) {
        let (color, typed) = {
            let object = self.ws.object(obj);
            (object.color, object.ty.is_some())
        };

        match color {
            Color::Black => return,
            // Variables of an n:1 declaration are typed by the first one checked.
            Color::White if typed => {
                self.ws.object_mut(obj).color = Color::Black;
                return;
            }
            Color::Grey => {
                self.cycle(obj);
                return;
            }
            Color::White => (),
        }

        let decl = match self.chk.obj_map.get(&obj) {
            Some(decl) => decl.clone(),
            None => return,
        };

        tracing::trace!(name = %self.ws.object(obj).name, "resolving");

        self.ws.object_mut(obj).color = Color::Grey;
        self.obj_path.push(obj);

        let ctx = Context {
            scope: decl.file_scope,
            decl: Some(obj),
            ..Default::default()
        };

        self.with_context(ctx, |sess| match &decl.kind {
            DeclKind::Const { ty, init, iota } => sess.const_decl(obj, ty.as_ref(), init.as_ref(), *iota),
            DeclKind::Var { lhs, ty, init } => sess.var_decl(obj, lhs, ty.as_ref(), init.as_ref()),
            DeclKind::Type(spec) => sess.type_decl(obj, spec),
            DeclKind::Func(func) => sess.func_decl(obj, func),
        });

        self.obj_path.pop();

        let invalid = self.ws.types.invalid();
        let object = self.ws.object_mut(obj);
        object.color = Color::Black;
        object.ty.get_or_insert(invalid);
    }

    /// Handles a declaration that refers back to itself while being resolved.
    /// Cycles through type definitions only are fine; all others are errors.
    fn cycle(&mut self, obj: ObjectId) {
        let start = match self.obj_path.iter().position(|o| *o == obj) {
            Some(start) => start,
            None => return,
        };
        let cycle = self.obj_path[start..].to_vec();

        let mut values = 0;
        let mut defs = 0;
        for o in &cycle {
            match &self.ws.object(*o).kind {
                ObjectKind::Const(_) | ObjectKind::Var => values += 1,
                ObjectKind::TypeName => {
                    let is_def = matches!(
                        self.chk.obj_map.get(o).map(|d| &d.kind),
                        Some(DeclKind::Type(spec)) if !spec.is_alias
                    );
                    if is_def {
                        defs += 1;
                    }
                }
                _ => (),
            }
        }

        if values == 0 && defs > 0 {
            return;
        }

        self.cycle_error(&cycle, "illegal cycle in declaration of");

        let invalid = self.ws.types.invalid();
        self.ws.object_mut(obj).ty.get_or_insert(invalid);
    }

    /// Reports a cycle starting at the member declared first.
    pub fn cycle_error(&mut self, cycle: &[ObjectId], what: &str) {
        let first = match (0..cycle.len()).min_by_key(|i| self.ws.object(cycle[*i]).order) {
            Some(first) => first,
            None => return,
        };

        let head = self.ws.object(cycle[first]).clone();
        self.error(
            ErrorKind::CyclicDeclaration,
            head.span,
            format!("{} {}", what, head.name),
        );

        for i in 0..cycle.len() {
            let o = self.ws.object(cycle[(first + i) % cycle.len()]).clone();
            self.error(ErrorKind::CyclicDeclaration, o.span, format!("\t{} refers to", o.name));
        }

        self.error(ErrorKind::CyclicDeclaration, head.span, format!("\t{}", head.name));
    }

    fn const_decl(&mut self, obj: ObjectId, ty: Option<&Expr>, init: Option<&Expr>, iota: i128) {
        self.ctx.iota = Some(ConstValue::int(iota));

        let mut target = None;
        if let Some(te) = ty {
            let t = self.typ(te);
            if !self.ws.is_invalid(t) && !self.ws.is_const_type(t) {
                let msg = format!("invalid constant type {}", self.type_str(t));
                self.invalid_op(te.span, msg);
                let invalid = self.ws.types.invalid();
                self.ws.set_obj_type(obj, invalid);
                return;
            }
            target = Some(t);
        }

        let mut x = match init {
            Some(e) => self.expr(e),
            None => Operand {
                mode: OperandMode::Invalid,
                ty: self.ws.types.invalid(),
                val: None,
                builtin: None,
                expr: None,
            },
        };

        self.init_const(obj, &mut x, target);
    }

    fn init_const(&mut self, obj: ObjectId, x: &mut Operand, target: Option<TypeId>) {
        let invalid = self.ws.types.invalid();

        if x.is_invalid() || self.ws.is_invalid(x.ty) {
            self.ws.set_obj_type(obj, invalid);
            return;
        }

        if !x.is_constant() {
            let msg = format!("{} is not constant", self.describe(x));
            self.invalid_op(x.span(), msg);
            self.ws.set_obj_type(obj, invalid);
            return;
        }

        if let Some(t) = target {
            self.assignment(x, Some(t), "constant declaration");
            if x.is_invalid() {
                self.ws.set_obj_type(obj, invalid);
                return;
            }
        }

        let object = self.ws.object_mut(obj);
        object.kind = ObjectKind::Const(x.value());
        object.ty.get_or_insert(x.ty);
    }

    fn var_decl(&mut self, obj: ObjectId, lhs: &[ObjectId], ty: Option<&Expr>, init: Option<&Expr>) {
        if let Some(te) = ty {
            let t = self.typ(te);
            for v in lhs {
                self.ws.set_obj_type(*v, t);
            }
        }

        let init = match init {
            Some(init) => init,
            None => {
                if ty.is_none() {
                    let invalid = self.ws.types.invalid();
                    self.ws.set_obj_type(obj, invalid);
                }
                return;
            }
        };

        if lhs.len() <= 1 {
            let hint = self.ws.object(obj).ty;
            let mut x = self.expr_with_hint(init, hint);
            self.init_var(obj, &mut x, "variable declaration");
            return;
        }

        self.init_vars(lhs, std::slice::from_ref(init), None);
    }

    fn type_decl(&mut self, obj: ObjectId, spec: &TypeSpec) {
        if spec.is_alias {
            let t = self.typ(&spec.ty);
            self.ws.object_mut(obj).ty = Some(t);
            return;
        }

        let named = self.ws.types.insert(Type::Named(NamedType {
            obj,
            underlying: None,
            methods: vec![],
        }));
        self.ws.object_mut(obj).ty = Some(named);

        let rhs = self.typ(&spec.ty);

        let underlying = if self.is_unresolved_named(rhs) {
            let msg = format!("invalid recursive type {}", spec.name.name);
            self.error(ErrorKind::InvalidRecursiveType, spec.name.span, msg);
            self.ws.types.invalid()
        } else {
            self.ws.underlying(rhs)
        };

        if let Type::Named(n) = self.ws.types.get_mut(named) {
            n.underlying = Some(underlying);
        }

        if self.ws.object(obj).parent == Some(self.pkg_scope()) {
            if let Some(pending) = self.chk.methods.remove(&spec.name.name) {
                for method in pending {
                    self.associate_method(named, method);
                }
            }
        }

        self.valid_type(named, spec);
    }

    /// A named type whose underlying type is still being resolved.
    fn is_unresolved_named(&self, ty: TypeId) -> bool {
        let mut current = ty;
        let mut seen = HashSet::new();
        while let Type::Named(n) = self.ws.types.get(current) {
            if !seen.insert(current) {
                return true;
            }
            match n.underlying {
                Some(u) => current = u,
                None => return true,
            }
        }
        false
    }

    /// Reports a named type that contains itself without indirection.
    fn valid_type(&mut self, named: TypeId, spec: &TypeSpec) {
        let underlying = self.ws.underlying(named);
        if !self.contains_type(underlying, named, &mut HashSet::new()) {
            return;
        }

        let msg = format!("invalid recursive type {}", spec.name.name);
        self.error(ErrorKind::InvalidRecursiveType, spec.name.span, msg);

        let invalid = self.ws.types.invalid();
        if let Type::Named(n) = self.ws.types.get_mut(named) {
            n.underlying = Some(invalid);
        }
    }

    fn contains_type(&self, ty: TypeId, target: TypeId, seen: &mut HashSet<TypeId>) -> bool {
        if ty == target {
            return true;
        }
        if !seen.insert(ty) {
            return false;
        }

        match self.ws.types.get(ty) {
            Type::Named(n) => n
                .underlying
                .map_or(false, |u| self.contains_type(u, target, seen)),
            Type::Array(a) => self.contains_type(a.elem, target, seen),
            Type::Struct(s) => s
                .fields
                .iter()
                .any(|f| self.contains_type(self.ws.obj_type(*f), target, seen)),
            _ => false,
        }
    }

    /// Adds `method` to the method list of `named`. A method of the same name
    /// is replaced when redeclaration is allowed.
    fn associate_method(&mut self, named: TypeId, method: ObjectId) {
        let name = self.ws.object(method).name;

        let existing = match self.ws.types.get(named) {
            Type::Named(n) => {
                if n.methods.contains(&method) {
                    return;
                }
                n.methods.iter().position(|m| self.ws.object(*m).name == name)
            }
            _ => return,
        };

        // A field of the same name makes the method unreachable.
        if let Type::Struct(s) = self.ws.types.get(self.ws.underlying(named)) {
            if s.fields.iter().any(|f| self.ws.object(*f).name == name) {
                let span = self.ws.object(method).span;
                self.error(
                    ErrorKind::Redeclaration,
                    span,
                    format!("field and method with the same name {}", name),
                );
                return;
            }
        }

        match existing {
            Some(pos) if self.conf.allow_redeclaration => {
                if let Type::Named(n) = self.ws.types.get_mut(named) {
                    n.methods[pos] = method;
                }
            }
            Some(_) => {
                let span = self.ws.object(method).span;
                let msg = format!("method {}.{} already declared", self.type_str(named), name);
                self.error(ErrorKind::Redeclaration, span, msg);
            }
            None => {
                if let Type::Named(n) = self.ws.types.get_mut(named) {
                    n.methods.push(method);
                }
            }
        }
    }

    fn func_decl(&mut self, obj: ObjectId, func: &FuncDecl) {
        let sig = self.func_type(func.recv.as_ref(), &func.ty);
        self.ws.object_mut(obj).ty = Some(sig);

        if let Some(recv) = &func.recv {
            self.method_receiver(obj, func, recv.span);
        }

        if let Some(body) = &func.body {
            if !self.conf.ignore_func_bodies {
                self.bodies.push(Delayed::Body {
                    name: func.name.name,
                    decl: Some(obj),
                    sig,
                    body: body.clone(),
                    file_scope: self.ctx.scope,
                });
            }
        }
    }

    /// Checks the receiver of a method and attaches the method to its base type.
    fn method_receiver(&mut self, obj: ObjectId, func: &FuncDecl, span: crate::span::Span) {
        let recv = match self.ws.types.get(self.ws.obj_type(obj)) {
            Type::Signature(sig) => sig.recv,
            _ => None,
        };
        let recv = match recv {
            Some(recv) => recv,
            None => return,
        };

        let (base, _) = self.ws.deref(self.ws.obj_type(recv));
        if self.ws.is_invalid(base) {
            return;
        }

        let named = match self.ws.types.get(base) {
            Type::Named(n) => Some(n.obj),
            _ => None,
        };

        let local = named.map_or(false, |o| self.ws.object(o).pkg == Some(self.pkg));
        if !local {
            let msg = format!("cannot define new methods on non-local type {}", self.type_str(base));
            self.invalid_op(span, msg);
            return;
        }

        let under = self.ws.underlying(base);
        if matches!(self.ws.types.get(under), Type::Pointer(_) | Type::Interface(_)) {
            let msg = format!("invalid receiver {} (pointer or interface type)", self.type_str(base));
            self.invalid_op(span, msg);
            return;
        }

        if !func.name.is_blank() {
            self.associate_method(base, obj);
            // The receiver's base type name is known, so nothing is pending anymore.
            if let Some(recv_list) = &func.recv {
                if let Some(name) = receiver_base_name(recv_list) {
                    if let Some(pending) = self.chk.methods.get_mut(&name) {
                        pending.retain(|m| *m != obj);
                    }
                }
            }
        }
    }

    /// Declares the constants, variables and types of a declaration statement
    /// inside a function body.
    pub fn local_decl(&mut self, gen: &GenDecl) {
        let mut last: Option<(Option<&Expr>, &[Expr])> = None;
        let mut iota = 0;

        for spec in &gen.specs {
            match spec {
                Spec::Import(import) => {
                    self.invalid_op(import.span, "imports must appear before other declarations");
                }
                Spec::Value(vs) if vs.kind == ValueKind::Const => {
                    if vs.ty.is_some() || !vs.values.is_empty() {
                        last = Some((vs.ty.as_ref(), &vs.values[..]));
                    }
                    let (ty, values) = last.unwrap_or((None, &[]));

                    let mut objs = vec![];
                    for (i, name) in vs.names.iter().enumerate() {
                        let obj = self.ws.new_object(NewObject::new(
                            ObjectKind::Const(ConstValue::unknown()),
                            name.name,
                            name.span,
                            Some(self.pkg),
                        ));
                        let ctx = Context {
                            iota: Some(ConstValue::int(iota)),
                            ..self.ctx.clone()
                        };
                        self.with_context(ctx, |sess| {
                            let mut target = None;
                            if let Some(te) = ty {
                                target = Some(sess.typ(te));
                            }
                            match values.get(i) {
                                Some(e) => {
                                    let mut x = sess.expr(e);
                                    sess.init_const(obj, &mut x, target);
                                }
                                None => {
                                    let invalid = sess.ws.types.invalid();
                                    sess.ws.set_obj_type(obj, invalid);
                                    if values.is_empty() && ty.is_none() {
                                        sess.invalid_op(name.span, "missing init expr for const declaration");
                                    } else {
                                        sess.invalid_op(name.span, format!("missing init expr for {}", name.name));
                                    }
                                }
                            }
                        });
                        self.ws.mark_used(obj);
                        self.ws.object_mut(obj).color = Color::Black;
                        self.record_def(name.id, Some(obj));
                        objs.push(obj);
                    }

                    if values.len() > vs.names.len() {
                        let span = values[vs.names.len()].span;
                        self.invalid_op(span, "extra init expr");
                    }

                    for obj in objs {
                        self.declare_local(obj);
                    }
                    iota += 1;
                }
                Spec::Value(vs) => {
                    let objs: Vec<ObjectId> = vs
                        .names
                        .iter()
                        .map(|name| {
                            let obj = self.ws.new_object(NewObject::new(
                                ObjectKind::Var,
                                name.name,
                                name.span,
                                Some(self.pkg),
                            ));
                            self.record_def(name.id, Some(obj));
                            obj
                        })
                        .collect();

                    let t = vs.ty.as_ref().map(|te| self.typ(te));
                    if let Some(t) = t {
                        for obj in &objs {
                            self.ws.set_obj_type(*obj, t);
                        }
                    }

                    if vs.values.is_empty() {
                        if t.is_none() {
                            self.invalid_op(vs.span, "missing type or init expr");
                            let invalid = self.ws.types.invalid();
                            for obj in &objs {
                                self.ws.set_obj_type(*obj, invalid);
                            }
                        }
                    } else {
                        self.init_vars(&objs, &vs.values, None);
                    }

                    // Variables are in scope only after their declaration.
                    for obj in objs {
                        self.ws.object_mut(obj).color = Color::Black;
                        self.declare_local(obj);
                    }
                }
                Spec::Type(ts) => {
                    let obj = self.ws.new_object(NewObject::new(
                        ObjectKind::TypeName,
                        ts.name.name,
                        ts.name.span,
                        Some(self.pkg),
                    ));
                    self.record_def(ts.name.id, Some(obj));
                    // The type is in scope within its own declaration.
                    self.declare_local(obj);
                    self.obj_path.push(obj);
                    self.type_decl(obj, ts);
                    self.obj_path.pop();
                    self.ws.object_mut(obj).color = Color::Black;
                }
            }
        }
    }

    /// Binds a local object in the current block.
    pub fn declare_local(&mut self, obj: ObjectId) {
        let scope = self.ctx.scope;
        if let Err(Redeclared { prev }) = self.ws.declare(scope, obj, RedeclareMode::Forbid) {
            let object = self.ws.object(obj);
            let (name, span) = (object.name, object.span);
            self.report_redeclared(name, span, prev);
        }
    }

    /// Declares a variable of a top-level `:=` into the package scope.
    pub fn declare_top_level_var(&mut self, obj: ObjectId, node: crate::ast::NodeId) {
        let scope = self.pkg_scope();
        self.ws.object_mut(obj).flags.insert(ObjectFlags::PKG_LEVEL);

        let mode = if self.conf.allow_redeclaration {
            RedeclareMode::Allow
        } else {
            RedeclareMode::Forbid
        };

        match self.ws.declare(scope, obj, mode) {
            Ok(replaced) => {
                let name = self.ws.object(obj).name;
                if let Some(prev) = replaced {
                    self.replaced.push(prev);
                }
                self.log_new_code(Some(obj), scope, node, false, true, replaced);
                if name != "_" {
                    let site = crate::info::DeclSite { node, scope, obj };
                    self.chk.decl_sites.insert(name, site);
                    if let Some(name2node) = self.chk.info.name2node.as_mut() {
                        name2node.insert(name, site);
                    }
                }
            }
            Err(Redeclared { prev }) => {
                let object = self.ws.object(obj);
                let (name, span) = (object.name, object.span);
                self.report_redeclared(name, span, prev);
            }
        }
    }
}
