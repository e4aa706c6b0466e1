use super::{operand::Operand, CheckSess};
use crate::{
    ast::{Expr, ExprKind, Stmt},
    error::ErrorKind,
    info::OperandMode,
    span::Span,
    types::{BasicKind, TypeId},
    workspace::{
        object::{ObjectFlags, ObjectId, ObjectKind},
        NewObject,
    },
};
use std::collections::HashSet;
use ustr::ustr;

/// What the left hand side of an assignment denotes.
enum Lhs {
    Blank,
    Invalid,
    Var(TypeId),
}

impl<'s> CheckSess<'s> {
    /// Initializes `obj` with `x`. An untyped variable takes the default type
    /// of `x`.
    pub fn init_var(&mut self, obj: ObjectId, x: &mut Operand, context: &str) {
        let invalid = self.ws.types.invalid();

        if x.is_invalid() || self.ws.is_invalid(x.ty) {
            self.ws.set_obj_type(obj, invalid);
            return;
        }

        if self.ws.object(obj).ty.is_none() {
            let mut ty = x.ty;
            if self.ws.is_untyped(ty) {
                if self.ws.is_untyped_nil(ty) {
                    self.invalid_op(x.span(), format!("use of untyped nil in {}", context));
                    self.ws.set_obj_type(obj, invalid);
                    return;
                }
                ty = self.ws.default_type(ty);
            }
            self.ws.set_obj_type(obj, ty);
        }

        let target = self.ws.obj_type(obj);
        if self.ws.is_invalid(target) {
            return;
        }
        self.assignment(x, Some(target), context);
    }

    /// Initializes the variables `lhs` with the values of `rhs`. With a
    /// `return_span` the variables are result parameters.
    pub fn init_vars(&mut self, lhs: &[ObjectId], rhs: &[Expr], return_span: Option<Span>) {
        let context = if return_span.is_some() {
            "return statement"
        } else {
            "assignment"
        };

        if lhs.len() == rhs.len() {
            for (obj, e) in lhs.iter().zip(rhs) {
                let hint = self.ws.object(*obj).ty;
                let mut x = self.expr_with_hint(e, hint);
                self.init_var(*obj, &mut x, context);
            }
            return;
        }

        if rhs.len() != 1 {
            self.assign_mismatch(lhs.len(), rhs, return_span);
            self.invalidate_untyped(lhs);
            self.use_exprs(rhs);
            return;
        }

        let e = &rhs[0];
        let x = self.raw_expr(e, None);

        if lhs.len() == 2 {
            if let Some((mut value, mut ok)) = self.comma_ok(&x, e) {
                self.init_var(lhs[0], &mut value, context);
                self.init_var(lhs[1], &mut ok, context);
                return;
            }
        }

        let mut values = self.unpack(x, e);
        if values.len() == 1 && values[0].is_invalid() {
            self.invalidate_untyped(lhs);
            return;
        }

        if values.len() != lhs.len() {
            self.value_count_mismatch(lhs.len(), values.len(), e.span, return_span);
            self.invalidate_untyped(lhs);
            return;
        }

        for (obj, x) in lhs.iter().zip(values.iter_mut()) {
            self.init_var(*obj, x, context);
        }
    }

    /// Splits `v, ok` from a map index, type assertion or receive and records
    /// the pair as the expression's type.
    fn comma_ok<'e>(&mut self, x: &Operand<'e>, e: &'e Expr) -> Option<(Operand<'e>, Operand<'e>)> {
        if !matches!(x.mode, OperandMode::MapIndex | OperandMode::CommaOk) {
            return None;
        }

        let untyped_bool = self.ws.types.basic(BasicKind::UntypedBool);
        let bool_ty = self.ws.types.basic(BasicKind::Bool);

        let first = self.ws.new_var(ustr(""), e.span, Some(self.pkg), x.ty, ObjectFlags::empty());
        let second = self.ws.new_var(ustr(""), e.span, Some(self.pkg), bool_ty, ObjectFlags::empty());
        let pair = self.ws.types.tuple(vec![first, second]);
        self.record_type_and_value(e.id, OperandMode::CommaOk, pair, None);

        let value = Operand::new(OperandMode::Value, x.ty, e);
        let ok = Operand::new(OperandMode::Value, untyped_bool, e);
        Some((value, ok))
    }

    fn invalidate_untyped(&mut self, lhs: &[ObjectId]) {
        let invalid = self.ws.types.invalid();
        for obj in lhs {
            self.ws.set_obj_type(*obj, invalid);
        }
    }

    fn assign_mismatch(&mut self, l: usize, rhs: &[Expr], return_span: Option<Span>) {
        let span = rhs.first().map_or_else(|| return_span.unwrap_or_else(Span::unknown), |e| e.span);
        self.value_count_mismatch(l, rhs.len(), span, return_span);
    }

    fn value_count_mismatch(&mut self, l: usize, r: usize, span: Span, return_span: Option<Span>) {
        let msg = match return_span {
            Some(_) if r < l => "not enough return values".to_string(),
            Some(_) => "too many return values".to_string(),
            None => format!(
                "assignment mismatch: {} variable{} but {} value{}",
                l,
                if l == 1 { "" } else { "s" },
                r,
                if r == 1 { "" } else { "s" }
            ),
        };
        let span = return_span.filter(|_| r == 0).unwrap_or(span);
        self.error(ErrorKind::TypeMismatch, span, msg);
    }

    /// Checks `lhs = x`.
    pub fn assign_var(&mut self, lhs: &Expr, x: &mut Operand) {
        match self.lhs_var(lhs) {
            Lhs::Invalid => x.mode = OperandMode::Invalid,
            Lhs::Blank => self.assignment(x, None, "assignment"),
            Lhs::Var(t) => self.assignment(x, Some(t), "assignment"),
        }
    }

    fn lhs_var(&mut self, lhs: &Expr) -> Lhs {
        if let ExprKind::Ident(name) = &lhs.kind {
            if *name == "_" {
                self.record_def(lhs.id, None);
                return Lhs::Blank;
            }
        }

        // Assigning to a local variable does not count as using it.
        let local = match &lhs.kind {
            ExprKind::Ident(name) => self
                .ws
                .lookup_parent(self.ctx.scope, *name)
                .map(|(_, obj)| obj)
                .filter(|obj| {
                    let o = self.ws.object(*obj);
                    o.kind == ObjectKind::Var && o.pkg == Some(self.pkg) && !o.is_pkg_level()
                }),
            _ => None,
        };
        let was_used = local.map(|obj| self.ws.object(obj).is_used());

        let z = self.expr(lhs);

        if let (Some(obj), Some(false)) = (local, was_used) {
            self.ws.object_mut(obj).flags.remove(ObjectFlags::USED);
        }

        if z.is_invalid() {
            return Lhs::Invalid;
        }

        match z.mode {
            OperandMode::Variable | OperandMode::MapIndex => Lhs::Var(z.ty),
            _ => {
                let msg = match &lhs.unparen().kind {
                    ExprKind::Selector { x, .. } if matches!(self.mode_of(x), Some(OperandMode::MapIndex)) => {
                        format!("cannot assign to struct field {} in map", z.text())
                    }
                    _ => format!(
                        "cannot assign to {} (neither addressable nor a map index expression)",
                        self.describe(&z)
                    ),
                };
                self.invalid_op(z.span(), msg);
                Lhs::Invalid
            }
        }
    }

    fn mode_of(&self, e: &Expr) -> Option<OperandMode> {
        let types = self.chk.info.types.as_ref()?;
        types.get(&e.id).map(|tv| tv.mode)
    }

    /// Checks `lhs... = rhs...`.
    pub fn assign_vars(&mut self, lhs: &[Expr], rhs: &[Expr]) {
        if lhs.len() == rhs.len() {
            for (l, r) in lhs.iter().zip(rhs) {
                let mut x = self.expr(r);
                self.assign_var(l, &mut x);
            }
            return;
        }

        if rhs.len() != 1 {
            self.assign_mismatch(lhs.len(), rhs, None);
            for l in lhs {
                self.lhs_var(l);
            }
            self.use_exprs(rhs);
            return;
        }

        let e = &rhs[0];
        let x = self.raw_expr(e, None);

        if lhs.len() == 2 {
            if let Some((mut value, mut ok)) = self.comma_ok(&x, e) {
                self.assign_var(&lhs[0], &mut value);
                self.assign_var(&lhs[1], &mut ok);
                return;
            }
        }

        let mut values = self.unpack(x, e);
        if values.len() == 1 && values[0].is_invalid() {
            for l in lhs {
                self.lhs_var(l);
            }
            return;
        }

        if values.len() != lhs.len() {
            self.value_count_mismatch(lhs.len(), values.len(), e.span, None);
            for l in lhs {
                self.lhs_var(l);
            }
            return;
        }

        for (l, x) in lhs.iter().zip(values.iter_mut()) {
            self.assign_var(l, x);
        }
    }

    /// Checks `lhs... := rhs...`. At the top level of an incremental batch the
    /// new variables go into the package scope.
    pub fn short_var_decl(&mut self, stmt: &Stmt, lhs: &[Expr], rhs: &[Expr]) {
        let top_level = self.ctx.top_level && self.ctx.sig.is_none();
        let scope = if top_level { self.pkg_scope() } else { self.ctx.scope };

        let mut vars = vec![];
        let mut new_vars = vec![];
        let mut seen = HashSet::new();
        let mut has_err = false;

        for e in lhs {
            let ident = match e.as_ident() {
                Some(ident) => ident,
                None => {
                    self.use_expr(e);
                    let msg = format!("non-name {} on left side of :=", crate::ast::display::expr_string(e));
                    self.invalid_op(e.span, msg);
                    has_err = true;
                    let dummy = self.ws.new_object(NewObject::new(ObjectKind::Var, ustr("_"), e.span, Some(self.pkg)));
                    vars.push(dummy);
                    continue;
                }
            };

            if !ident.is_blank() && !seen.insert(ident.name) {
                self.invalid_op(ident.span, format!("{} repeated on left side of :=", ident.name));
                has_err = true;
                let dummy = self.ws.new_object(NewObject::new(ObjectKind::Var, ustr("_"), e.span, Some(self.pkg)));
                vars.push(dummy);
                continue;
            }

            // An existing variable of the same block is assigned instead.
            let redeclare_top = top_level && self.conf.allow_redeclaration;
            if let Some(existing) = self.ws.lookup(scope, ident.name).filter(|_| !redeclare_top) {
                self.record_use(ident.id, existing);
                if self.ws.object(existing).kind == ObjectKind::Var {
                    vars.push(existing);
                } else {
                    self.invalid_op(ident.span, format!("cannot assign to {}", ident.name));
                    has_err = true;
                    let dummy =
                        self.ws
                            .new_object(NewObject::new(ObjectKind::Var, ustr("_"), e.span, Some(self.pkg)));
                    vars.push(dummy);
                }
                continue;
            }

            let obj = self
                .ws
                .new_object(NewObject::new(ObjectKind::Var, ident.name, ident.span, Some(self.pkg)));
            self.record_def(ident.id, Some(obj));
            if !ident.is_blank() {
                new_vars.push(obj);
            }
            vars.push(obj);
        }

        self.init_vars(&vars, rhs, None);

        // Variables are in scope only after the statement.
        if new_vars.is_empty() && !has_err {
            self.invalid_op(stmt.span, "no new variables on left side of :=");
            return;
        }

        for obj in new_vars {
            self.ws.object_mut(obj).color = crate::workspace::object::Color::Black;
            if top_level {
                self.declare_top_level_var(obj, stmt.id);
            } else {
                self.declare_local(obj);
            }
        }
    }
}

impl<'s> CheckSess<'s> {
    /// Checks `x++` and `x--`.
    pub fn inc_dec(&mut self, x: &Expr, inc: bool) {
        match self.lhs_var(x) {
            Lhs::Var(t) if !self.ws.is_invalid(t) && !self.ws.is_numeric(t) => {
                let msg = format!(
                    "invalid operation: {}{} (non-numeric type {})",
                    crate::ast::display::expr_string(x),
                    if inc { "++" } else { "--" },
                    self.type_str(t)
                );
                self.invalid_op(x.span, msg);
            }
            Lhs::Blank => self.invalid_op(x.span, "cannot use _ as value"),
            _ => (),
        }
    }

    /// Checks `lhs op= rhs`.
    pub fn op_assign(&mut self, stmt: &Stmt, lhs: &[Expr], op: crate::ast::BinaryOp, rhs: &[Expr]) {
        let (l, r) = match (lhs, rhs) {
            ([l], [r]) => (l, r),
            _ => {
                let msg = format!("assignment operation {}= requires single-valued expressions", op);
                self.invalid_op(stmt.span, msg);
                self.use_exprs(lhs);
                self.use_exprs(rhs);
                return;
            }
        };

        let mut x = self.binary(l, op, l, r);
        if x.is_invalid() {
            return;
        }
        self.assign_var(l, &mut x);
    }
}
