use super::{operand::Operand, CheckSess};
use crate::{
    ast::{Expr, ExprKind, Ident},
    constant::ConstValue,
    error::ErrorKind,
    info::{OperandMode, Selection, SelectionKind},
    types::{lookup::LookupResult, Signature, Type, TypeId},
    workspace::{
        object::{ObjectFlags, ObjectKind},
        package::PackageId,
    },
};
use ustr::ustr;

impl<'s> CheckSess<'s> {
    /// Evaluates `x.sel`: a qualified identifier, a field or method, or a
    /// method expression.
    pub fn selector<'e>(&mut self, e: &'e Expr, xe: &'e Expr, sel: &Ident) -> Operand<'e> {
        let invalid = self.ws.types.invalid();

        if let ExprKind::Ident(name) = &xe.kind {
            if let Some((_, obj)) = self.ws.lookup_parent(self.ctx.scope, *name) {
                if let ObjectKind::PkgName(imported) = self.ws.object(obj).kind {
                    self.record_use(xe.id, obj);
                    self.ws.mark_used(obj);
                    return self.qualified_ident(e, imported, sel);
                }
            }
        }

        let x = self.expr_or_type(xe);
        if x.is_invalid() {
            return Operand::invalid(invalid, e);
        }

        let addressable = x.mode == OperandMode::Variable;
        let mut found = self.ws.lookup_field_or_method(x.ty, addressable, sel.name);

        // A method of this package may not have its signature yet.
        if let Some(obj) = found.obj() {
            if self.chk.obj_map.contains_key(&obj) && self.ws.object(obj).ty.is_none() {
                self.obj_decl(obj);
                found = self.ws.lookup_field_or_method(x.ty, addressable, sel.name);
            }
        }

        let (obj, index, indirect) = match found {
            LookupResult::Found { obj, index, indirect } => (obj, index, indirect),
            LookupResult::PointerRequired { obj } => {
                let msg = format!(
                    "cannot call pointer method {} on {}",
                    self.ws.object(obj).name,
                    self.type_str(x.ty)
                );
                self.invalid_op(e.span, msg);
                return Operand::invalid(invalid, e);
            }
            LookupResult::Ambiguous => {
                self.invalid_op(sel.span, format!("ambiguous selector {}.{}", x.text(), sel.name));
                return Operand::invalid(invalid, e);
            }
            LookupResult::NotFound => {
                let what = if x.mode == OperandMode::TypeExpr {
                    "method"
                } else {
                    "field or method"
                };
                let msg = format!(
                    "{}.{} undefined (type {} has no {} {})",
                    x.text(),
                    sel.name,
                    self.type_str(x.ty),
                    what,
                    sel.name
                );
                self.error(ErrorKind::UndefinedIdentifier, sel.span, msg);
                return Operand::invalid(invalid, e);
            }
        };

        self.record_use(sel.id, obj);
        if self.ws.object(obj).pkg == Some(self.pkg) {
            self.ws.mark_used(obj);
        }

        let obj_ty = self.ws.obj_type(obj);
        let is_method = matches!(self.ws.object(obj).kind, ObjectKind::Func(_));

        if x.mode == OperandMode::TypeExpr {
            if !is_method {
                let msg = format!(
                    "{}.{} undefined (type {} has no method {})",
                    x.text(),
                    sel.name,
                    self.type_str(x.ty),
                    sel.name
                );
                self.error(ErrorKind::UndefinedIdentifier, sel.span, msg);
                return Operand::invalid(invalid, e);
            }

            let ty = self.method_expr_type(x.ty, obj_ty, sel);
            self.record_selection(
                e.id,
                Selection {
                    kind: SelectionKind::MethodExpr,
                    recv: x.ty,
                    obj,
                    index,
                    indirect,
                },
            );
            return Operand::new(OperandMode::Value, ty, e);
        }

        if is_method {
            let ty = self.without_receiver(obj_ty);
            self.record_selection(
                e.id,
                Selection {
                    kind: SelectionKind::MethodVal,
                    recv: x.ty,
                    obj,
                    index,
                    indirect,
                },
            );
            return Operand::new(OperandMode::Value, ty, e);
        }

        self.record_selection(
            e.id,
            Selection {
                kind: SelectionKind::FieldVal,
                recv: x.ty,
                obj,
                index,
                indirect,
            },
        );

        let mode = if x.mode == OperandMode::Variable || indirect {
            OperandMode::Variable
        } else {
            OperandMode::Value
        };
        Operand::new(mode, obj_ty, e)
    }

    fn qualified_ident<'e>(&mut self, e: &'e Expr, imported: PackageId, sel: &Ident) -> Operand<'e> {
        let invalid = self.ws.types.invalid();
        let package = self.ws.package(imported);

        // Stand-ins for failed imports accept any selector.
        if package.fake || self.fake_pkgs.contains(&imported) {
            return Operand::invalid(invalid, e);
        }

        let path = package.path;
        let obj = match self.ws.pkg_lookup(imported, &sel.name) {
            Some(obj) => obj,
            None => {
                self.error(
                    ErrorKind::UndefinedIdentifier,
                    sel.span,
                    format!("{} not declared by package {}", sel.name, path),
                );
                return Operand::invalid(invalid, e);
            }
        };

        if !self.ws.object(obj).is_exported() {
            self.error(
                ErrorKind::UndefinedIdentifier,
                sel.span,
                format!("{} not exported by package {}", sel.name, path),
            );
            return Operand::invalid(invalid, e);
        }

        self.record_use(sel.id, obj);

        let object = self.ws.object(obj).clone();
        let ty = object.ty.unwrap_or(invalid);

        match object.kind {
            ObjectKind::Const(val) => Operand::constant(ty, val, e),
            ObjectKind::TypeName => Operand::new(OperandMode::TypeExpr, ty, e),
            ObjectKind::Var => Operand::new(OperandMode::Variable, ty, e),
            ObjectKind::Func(_) => Operand::new(OperandMode::Value, ty, e),
            ObjectKind::Builtin(id) => Operand {
                builtin: Some(id),
                ..Operand::new(OperandMode::Builtin, invalid, e)
            },
            ObjectKind::PkgName(_) | ObjectKind::Label | ObjectKind::Nil => Operand::invalid(invalid, e),
        }
    }

    /// `T.m` is a function taking the receiver as its first parameter.
    fn method_expr_type(&mut self, recv_ty: TypeId, method_ty: TypeId, sel: &Ident) -> TypeId {
        let sig = match self.ws.types.get(method_ty) {
            Type::Signature(sig) => sig.clone(),
            _ => return self.ws.types.invalid(),
        };

        let recv = self
            .ws
            .new_var(ustr("_"), sel.span, Some(self.pkg), recv_ty, ObjectFlags::IS_PARAM);
        let mut params = vec![recv];
        params.extend_from_slice(self.ws.tuple_vars(sig.params));
        let params = self.ws.types.tuple(params);

        self.ws.types.insert(Type::Signature(Signature {
            scope: sig.scope,
            recv: None,
            params,
            results: sig.results,
            variadic: sig.variadic,
        }))
    }

    fn without_receiver(&mut self, method_ty: TypeId) -> TypeId {
        match self.ws.types.get(method_ty) {
            Type::Signature(sig) if sig.recv.is_some() => {
                let sig = Signature {
                    recv: None,
                    ..sig.clone()
                };
                self.ws.types.insert(Type::Signature(sig))
            }
            _ => method_ty,
        }
    }

    /// Evaluates a call, a conversion or a builtin application.
    pub fn call<'e>(&mut self, e: &'e Expr, fun: &'e Expr, args: &'e [Expr], has_ellipsis: bool) -> Operand<'e> {
        let invalid = self.ws.types.invalid();
        let x = self.raw_expr(fun, None);

        match x.mode {
            OperandMode::Invalid => {
                self.use_exprs(args);
                Operand::invalid(invalid, e)
            }
            OperandMode::TypeExpr => {
                let t = x.ty;
                if has_ellipsis {
                    self.invalid_op(e.span, format!("invalid use of ... in conversion to {}", self.type_str(t)));
                }
                match args {
                    [arg] => {
                        let arg = self.expr_with_hint(arg, Some(t));
                        self.conversion(e, arg, t)
                    }
                    [] => {
                        self.invalid_op(e.span, format!("missing argument in conversion to {}", self.type_str(t)));
                        Operand::invalid(invalid, e)
                    }
                    _ => {
                        self.use_exprs(args);
                        self.invalid_op(args[1].span, format!("too many arguments in conversion to {}", self.type_str(t)));
                        Operand::invalid(invalid, e)
                    }
                }
            }
            OperandMode::Builtin => match x.builtin {
                Some(id) => self.builtin(e, id, args, has_ellipsis),
                None => Operand::invalid(invalid, e),
            },
            _ => {
                let mut x = x;
                self.exclude_non_values_in_call(&mut x);
                if x.is_invalid() {
                    self.use_exprs(args);
                    return Operand::invalid(invalid, e);
                }

                let sig = match self.ws.types.get(self.ws.underlying(x.ty)) {
                    Type::Signature(sig) => sig.clone(),
                    _ => {
                        let msg = format!("cannot call non-function {}", self.describe(&x));
                        self.invalid_op(x.span(), msg);
                        self.use_exprs(args);
                        return Operand::invalid(invalid, e);
                    }
                };

                let operands = self.call_args(args);
                self.arguments(e, fun, &sig, operands, has_ellipsis);

                let results = self.ws.tuple_vars(sig.results).to_vec();
                match results.as_slice() {
                    [] => Operand::new(OperandMode::NoValue, sig.results, e),
                    [single] => Operand::new(OperandMode::Value, self.ws.obj_type(*single), e),
                    _ => Operand::new(OperandMode::Value, sig.results, e),
                }
            }
        }
    }

    fn exclude_non_values_in_call(&mut self, x: &mut Operand) {
        if x.mode == OperandMode::NoValue {
            let msg = format!("{} used as value", x.text());
            self.invalid_op(x.span(), msg);
            x.mode = OperandMode::Invalid;
            return;
        }
        self.single_value(x);
    }

    /// A single call argument may spread into several values, as in `f(g())`.
    fn call_args<'e>(&mut self, args: &'e [Expr]) -> Vec<Operand<'e>> {
        match args {
            [arg] => self.multi_expr(arg),
            _ => args.iter().map(|arg| self.expr(arg)).collect(),
        }
    }

    fn arguments(&mut self, call: &Expr, fun: &Expr, sig: &Signature, mut args: Vec<Operand>, has_ellipsis: bool) {
        if args.iter().any(|a| a.is_invalid()) {
            return;
        }

        let params = self.ws.tuple_vars(sig.params).to_vec();
        let name = crate::ast::display::expr_string(fun);

        if has_ellipsis {
            if !sig.variadic {
                let msg = format!("cannot use ... in call to non-variadic {}", name);
                self.invalid_op(call.span, msg);
                return;
            }
            if args.len() == 1 && params.len() > 1 {
                let msg = format!("cannot use ... with {}-valued {}", params.len(), args[0].text());
                self.invalid_op(call.span, msg);
                return;
            }
        }

        // The parameter type for each argument, expanding a trailing `...T`.
        let mut targets: Vec<TypeId> = params.iter().map(|p| self.ws.obj_type(*p)).collect();
        if sig.variadic && !has_ellipsis {
            if let Some(last) = targets.pop() {
                let elem = match self.ws.types.get(last) {
                    Type::Slice(elem) => *elem,
                    _ => self.ws.types.invalid(),
                };
                while targets.len() < args.len() {
                    targets.push(elem);
                }
            }
        }

        if args.len() != targets.len() {
            let msg = if args.len() < targets.len() {
                format!("not enough arguments in call to {}", name)
            } else {
                format!("too many arguments in call to {}", name)
            };
            let span = args.get(targets.len()).map_or(call.span, |a| a.span());
            self.error(ErrorKind::TypeMismatch, span, msg);
            return;
        }

        for (x, t) in args.iter_mut().zip(targets) {
            self.assignment(x, Some(t), "argument");
        }
    }

    /// Evaluates the conversion `T(x)`.
    pub fn conversion<'e>(&mut self, e: &'e Expr, mut x: Operand<'e>, t: TypeId) -> Operand<'e> {
        let invalid = self.ws.types.invalid();
        if x.is_invalid() || self.ws.is_invalid(t) {
            return Operand::invalid(invalid, e);
        }

        let const_arg = x.is_constant();
        let const_target = self.ws.is_const_type(t);

        if const_arg && const_target {
            let val = x.value();
            let converted = if self.ws.is_integer(x.ty) && self.ws.is_string(t) {
                // string(65) is "A"; invalid code points become U+FFFD.
                let c = val
                    .int_val()
                    .and_then(|n| u32::try_from(n).ok())
                    .and_then(char::from_u32)
                    .unwrap_or('\u{FFFD}');
                Some(ConstValue::Str(ustr(&c.to_string())))
            } else {
                self.representable(&val, t).ok()
            };

            return match converted {
                Some(val) => {
                    if let Some(arg) = x.expr {
                        let final_ty = if self.ws.is_untyped(x.ty) { t } else { x.ty };
                        self.update_expr_type(arg, final_ty);
                    }
                    Operand::constant(t, val, e)
                }
                None => {
                    let msg = format!("cannot convert {} to {}", self.describe(&x), self.type_str(t));
                    self.error(ErrorKind::TypeMismatch, x.span(), msg);
                    Operand::invalid(invalid, e)
                }
            };
        }

        if !self.ws.convertible_to(x.ty, t) {
            let msg = format!("cannot convert {} to {}", self.describe(&x), self.type_str(t));
            self.error(ErrorKind::TypeMismatch, x.span(), msg);
            return Operand::invalid(invalid, e);
        }

        if self.ws.is_untyped(x.ty) {
            let final_ty = if self.ws.is_interface(t) || (const_arg && !const_target) {
                self.ws.default_type(x.ty)
            } else {
                t
            };
            if !self.ws.is_untyped_nil(x.ty) {
                x.ty = final_ty;
                if let Some(arg) = x.expr {
                    self.update_expr_type(arg, final_ty);
                }
            }
        }

        Operand::new(OperandMode::Value, t, e)
    }

    /// Evaluates expressions only for their recorded types, after an error.
    pub fn use_exprs(&mut self, args: &[Expr]) {
        for arg in args {
            self.use_expr(arg);
        }
    }
}
