use super::{operand::Operand, CheckSess};
use crate::{
    ast::{display::expr_string, Expr, ExprKind, FieldList, FuncType},
    error::ErrorKind,
    info::OperandMode,
    types::{ArrayType, ChanType, InterfaceType, MapType, Signature, StructType, Type, TypeId},
    workspace::{
        object::{FuncInfo, ObjectFlags, ObjectId, ObjectKind},
        scope::{RedeclareMode, ScopeId},
        NewObject, Redeclared,
    },
};
use std::collections::HashMap;
use ustr::{ustr, Ustr};

impl<'s> CheckSess<'s> {
    /// Evaluates a type expression and records it.
    pub fn typ(&mut self, e: &Expr) -> TypeId {
        let ty = self.typ_internal(e);
        self.record_type_and_value(e.id, OperandMode::TypeExpr, ty, None);
        ty
    }

    pub fn typ_internal(&mut self, e: &Expr) -> TypeId {
        let invalid = self.ws.types.invalid();

        match &e.kind {
            ExprKind::Bad => invalid,
            ExprKind::Ident(name) => {
                let x = self.ident(e, *name);
                self.type_operand(&x)
            }
            ExprKind::Selector { x, sel } => {
                let x = self.selector(e, x, sel);
                self.type_operand(&x)
            }
            ExprKind::Paren(inner) => self.typ(inner),
            ExprKind::ArrayType { len: Some(len), elem } => {
                if matches!(len.kind, ExprKind::Ellipsis(None)) {
                    self.invalid_op(len.span, "invalid use of [...] array (outside a composite literal)");
                    self.typ(elem);
                    return invalid;
                }
                let n = self.array_length(len);
                let elem = self.typ(elem);
                match n {
                    Some(len) => self.ws.types.insert(Type::Array(ArrayType { elem, len })),
                    None => invalid,
                }
            }
            ExprKind::ArrayType { len: None, elem } => {
                let elem = self.typ(elem);
                self.ws.types.slice(elem)
            }
            ExprKind::Ellipsis(_) => {
                self.invalid_op(e.span, "invalid use of '...'");
                invalid
            }
            ExprKind::StructType(fields) => self.struct_type(fields),
            ExprKind::Star(inner) => {
                let elem = self.typ(inner);
                self.ws.types.pointer(elem)
            }
            ExprKind::FuncType(ft) => self.func_type(None, ft),
            ExprKind::InterfaceType(methods) => self.interface_type(methods),
            ExprKind::MapType { key, value } => {
                let key_ty = self.typ(key);
                let elem = self.typ(value);
                // Keys of types still being declared are checked for comparability
                // when the declaration completes.
                let key_under = self.ws.underlying(key_ty);
                if !self.ws.is_invalid(key_under) && !self.ws.comparable(key_ty) {
                    let msg = format!("invalid map key type {}", self.type_str(key_ty));
                    self.invalid_op(key.span, msg);
                }
                self.ws.types.insert(Type::Map(MapType { key: key_ty, elem }))
            }
            ExprKind::ChanType { dir, value } => {
                let elem = self.typ(value);
                self.ws.types.insert(Type::Chan(ChanType { dir: *dir, elem }))
            }
            _ => {
                self.invalid_op(e.span, format!("{} is not a type", expr_string(e)));
                invalid
            }
        }
    }

    fn type_operand(&mut self, x: &Operand) -> TypeId {
        match x.mode {
            OperandMode::TypeExpr => x.ty,
            OperandMode::Invalid => self.ws.types.invalid(),
            _ => {
                self.invalid_op(x.span(), format!("{} is not a type", x.text()));
                self.ws.types.invalid()
            }
        }
    }

    fn array_length(&mut self, e: &Expr) -> Option<i64> {
        let x = self.expr(e);
        if x.is_invalid() {
            return None;
        }

        if !x.is_constant() {
            self.invalid_op(e.span, format!("array length {} must be constant", x.text()));
            return None;
        }

        if self.ws.is_untyped(x.ty) || self.ws.is_integer(x.ty) {
            if let Some(n) = x.value().int_val() {
                if n >= 0 {
                    return Some(n);
                }
            }
        }

        self.invalid_op(e.span, format!("invalid array length {}", x.text()));
        None
    }

    /// Builds a signature. Its scope holds the receiver, the parameters and
    /// the named results, and encloses the function body.
    pub fn func_type(&mut self, recv: Option<&FieldList>, ft: &FuncType) -> TypeId {
        let scope = self.ws.new_scope(Some(self.ctx.scope), ft.span, "function");
        self.ws.scope_mut(scope).is_func = true;
        self.record_scope(ft.id, scope);

        let recv_var = match recv {
            Some(list) => {
                let (vars, _) = self.collect_params(scope, list, false);
                match vars.len() {
                    0 => {
                        self.invalid_op(list.span, "method is missing receiver");
                        None
                    }
                    1 => vars.first().copied(),
                    _ => {
                        self.invalid_op(list.span, "method must have exactly one receiver");
                        vars.first().copied()
                    }
                }
            }
            None => None,
        };

        let (params, variadic) = self.collect_params(scope, &ft.params, true);
        let results = match &ft.results {
            Some(list) => self.collect_params(scope, list, false).0,
            None => vec![],
        };

        let params = self.ws.types.tuple(params);
        let results = self.ws.types.tuple(results);

        self.ws.types.insert(Type::Signature(Signature {
            scope: Some(scope),
            recv: recv_var,
            params,
            results,
            variadic,
        }))
    }

    fn collect_params(&mut self, scope: ScopeId, list: &FieldList, variadic_ok: bool) -> (Vec<ObjectId>, bool) {
        let mut vars = vec![];
        let mut variadic = false;
        let last = list.fields.len().saturating_sub(1);

        for (i, field) in list.fields.iter().enumerate() {
            let ty = match &field.ty.kind {
                ExprKind::Ellipsis(Some(elem)) => {
                    let elem = self.typ(elem);
                    if variadic_ok && i == last && field.names.len() <= 1 {
                        variadic = true;
                    } else {
                        self.invalid_op(field.ty.span, "can only use ... with final parameter in list");
                    }
                    let slice = self.ws.types.slice(elem);
                    self.record_type_and_value(field.ty.id, OperandMode::TypeExpr, slice, None);
                    slice
                }
                _ => self.typ(&field.ty),
            };

            if field.names.is_empty() {
                let var = self.ws.new_var(
                    ustr(""),
                    field.span,
                    Some(self.pkg),
                    ty,
                    ObjectFlags::IS_PARAM | ObjectFlags::IMPLICIT,
                );
                self.record_implicit(field.id, var);
                vars.push(var);
                continue;
            }

            for name in &field.names {
                let var = self
                    .ws
                    .new_var(name.name, name.span, Some(self.pkg), ty, ObjectFlags::IS_PARAM);
                self.record_def(name.id, Some(var));
                if let Err(Redeclared { prev }) = self.ws.declare(scope, var, RedeclareMode::Forbid) {
                    self.report_redeclared(name.name, name.span, prev);
                }
                vars.push(var);
            }
        }

        (vars, variadic)
    }

    fn struct_type(&mut self, list: &FieldList) -> TypeId {
        let mut fields = vec![];
        let mut tags = vec![];
        let mut seen: HashMap<Ustr, ObjectId> = HashMap::new();

        for field in &list.fields {
            let ty = self.typ(&field.ty);

            if field.names.is_empty() {
                let base = match &field.ty.unparen().kind {
                    ExprKind::Star(inner) => inner.unparen(),
                    _ => field.ty.unparen(),
                };
                let name = match &base.kind {
                    ExprKind::Ident(name) => *name,
                    ExprKind::Selector { sel, .. } => sel.name,
                    _ => {
                        self.invalid_op(field.ty.span, format!("invalid embedded field type {}", expr_string(&field.ty)));
                        continue;
                    }
                };

                let (elem, is_ptr) = self.ws.deref(ty);
                if !self.ws.is_invalid(elem) {
                    let under = self.ws.underlying(elem);
                    if matches!(self.ws.types.get(under), Type::Pointer(_)) {
                        self.invalid_op(field.ty.span, "embedded field type cannot be a pointer");
                    } else if is_ptr && self.ws.is_interface(elem) {
                        self.invalid_op(field.ty.span, "embedded field type cannot be a pointer to an interface");
                    }
                }

                let var = self.ws.new_var(
                    name,
                    field.span,
                    Some(self.pkg),
                    ty,
                    ObjectFlags::IS_FIELD | ObjectFlags::EMBEDDED,
                );
                self.record_implicit(field.id, var);
                self.add_field(&mut seen, name, field.span, var);
                fields.push(var);
                tags.push(field.tag);
                continue;
            }

            for name in &field.names {
                let var = self
                    .ws
                    .new_var(name.name, name.span, Some(self.pkg), ty, ObjectFlags::IS_FIELD);
                self.record_def(name.id, Some(var));
                self.add_field(&mut seen, name.name, name.span, var);
                fields.push(var);
                tags.push(field.tag);
            }
        }

        self.ws.types.insert(Type::Struct(StructType { fields, tags }))
    }

    fn add_field(&mut self, seen: &mut HashMap<Ustr, ObjectId>, name: Ustr, span: crate::span::Span, var: ObjectId) {
        if name == "_" {
            return;
        }
        if let Some(prev) = seen.insert(name, var) {
            self.report_redeclared(name, span, prev);
        }
    }

    fn interface_type(&mut self, list: &FieldList) -> TypeId {
        // Methods need the interface as receiver type before it is complete.
        let iface = self.ws.types.insert(Type::Interface(InterfaceType {
            methods: vec![],
            embeddeds: vec![],
        }));

        let mut methods = vec![];
        let mut embeddeds = vec![];
        let mut seen: HashMap<Ustr, ObjectId> = HashMap::new();

        for field in &list.fields {
            if field.names.is_empty() {
                let t = self.typ(&field.ty);
                if self.ws.is_invalid(t) {
                    continue;
                }
                if let Type::Named(n) = self.ws.types.get(t) {
                    if n.underlying.is_none() {
                        let name = self.ws.object(n.obj).name;
                        self.error(
                            ErrorKind::InvalidRecursiveType,
                            field.ty.span,
                            format!("invalid recursive type {}", name),
                        );
                        continue;
                    }
                }
                if !self.ws.is_interface(t) {
                    let msg = format!("{} is not an interface", self.type_str(t));
                    self.invalid_op(field.ty.span, msg);
                    continue;
                }
                embeddeds.push(t);
                continue;
            }

            let ft = match &field.ty.kind {
                ExprKind::FuncType(ft) => ft,
                _ => {
                    self.invalid_op(field.ty.span, "interface method must have a function type");
                    continue;
                }
            };

            for name in &field.names {
                let sig = self.func_type(None, ft);
                let recv = self.ws.new_var(ustr(""), name.span, Some(self.pkg), iface, ObjectFlags::IMPLICIT);
                if let Type::Signature(s) = self.ws.types.get_mut(sig) {
                    s.recv = Some(recv);
                }
                self.record_type_and_value(field.ty.id, OperandMode::TypeExpr, sig, None);

                let method = self.ws.new_object(
                    NewObject::new(ObjectKind::Func(FuncInfo::default()), name.name, name.span, Some(self.pkg))
                        .with_type(sig),
                );
                self.record_def(name.id, Some(method));

                if name.is_blank() {
                    self.invalid_op(name.span, "invalid method name _");
                    continue;
                }
                if seen.insert(name.name, method).is_some() {
                    self.error(
                        ErrorKind::Redeclaration,
                        name.span,
                        format!("duplicate method {}", name.name),
                    );
                    continue;
                }
                methods.push(method);
            }
        }

        if let Type::Interface(i) = self.ws.types.get_mut(iface) {
            i.methods = methods;
            i.embeddeds = embeddeds;
        }

        iface
    }
}
