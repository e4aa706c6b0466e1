use super::{operand::Operand, CheckSess, Delayed};
use crate::{
    ast::{BinaryOp, ChanDir, Expr, ExprKind, LitKind, UnaryOp},
    constant::{ConstValue, FoldError},
    error::ErrorKind,
    info::OperandMode,
    types::{ArrayType, BasicInfo, BasicKind, Type, TypeId},
    workspace::{
        object::{ObjectId, ObjectKind},
        package::PackageId,
        scope::ScopeId,
    },
};
use std::collections::HashSet;
use ustr::{ustr, Ustr};

impl<'s> CheckSess<'s> {
    /// Evaluates `e` and records its type and value.
    pub fn raw_expr<'e>(&mut self, e: &'e Expr, hint: Option<TypeId>) -> Operand<'e> {
        let x = self.expr_internal(e, hint);
        self.record_operand(&x);
        x
    }

    /// Evaluates an expression that must have exactly one value.
    pub fn expr<'e>(&mut self, e: &'e Expr) -> Operand<'e> {
        self.expr_with_hint(e, None)
    }

    /// Like `expr`; `hint` is the type of composite literals with elided types.
    pub fn expr_with_hint<'e>(&mut self, e: &'e Expr, hint: Option<TypeId>) -> Operand<'e> {
        let mut x = self.raw_expr(e, hint);
        self.exclude_non_values(&mut x);
        self.single_value(&mut x);
        x
    }

    /// Evaluates an expression that may also denote a type.
    pub fn expr_or_type<'e>(&mut self, e: &'e Expr) -> Operand<'e> {
        let mut x = self.raw_expr(e, None);
        match x.mode {
            OperandMode::NoValue => {
                let msg = format!("{} used as value or type", x.text());
                self.invalid_op(x.span(), msg);
                x.mode = OperandMode::Invalid;
            }
            OperandMode::Builtin => {
                let msg = format!("{} must be called", x.text());
                self.invalid_op(x.span(), msg);
                x.mode = OperandMode::Invalid;
            }
            _ => self.single_value(&mut x),
        }
        x
    }

    /// Evaluates an expression that may have several values, such as the
    /// right hand side of `a, b := f()`.
    pub fn multi_expr<'e>(&mut self, e: &'e Expr) -> Vec<Operand<'e>> {
        let x = self.raw_expr(e, None);
        self.unpack(x, e)
    }

    /// Splits an already evaluated multi-valued operand into its values.
    pub fn unpack<'e>(&mut self, mut x: Operand<'e>, e: &'e Expr) -> Vec<Operand<'e>> {
        self.exclude_non_values(&mut x);

        if x.mode == OperandMode::Value {
            if let Type::Tuple(vars) = self.ws.types.get(x.ty) {
                return vars
                    .iter()
                    .map(|v| Operand::new(OperandMode::Value, self.ws.obj_type(*v), e))
                    .collect();
            }
        }

        vec![x]
    }

    fn exclude_non_values(&mut self, x: &mut Operand) {
        let msg = match x.mode {
            OperandMode::NoValue => format!("{} used as value", x.text()),
            OperandMode::Builtin => format!("{} must be called", x.text()),
            OperandMode::TypeExpr => format!("{} is not an expression", x.text()),
            _ => return,
        };
        self.invalid_op(x.span(), msg);
        x.mode = OperandMode::Invalid;
    }

    fn expr_internal<'e>(&mut self, e: &'e Expr, hint: Option<TypeId>) -> Operand<'e> {
        let invalid = self.ws.types.invalid();

        match &e.kind {
            ExprKind::Bad => Operand::invalid(invalid, e),
            ExprKind::Ident(name) => self.ident(e, *name),
            ExprKind::BasicLit(lit) => {
                let kind = match lit.kind {
                    LitKind::Int => BasicKind::UntypedInt,
                    LitKind::Float => BasicKind::UntypedFloat,
                    LitKind::Char => BasicKind::UntypedRune,
                    LitKind::String => BasicKind::UntypedString,
                };
                match ConstValue::from_literal(lit.kind, &lit.value) {
                    Ok(val) => Operand::constant(self.ws.types.basic(kind), val, e),
                    Err(err) => {
                        self.fold_error(e, err);
                        Operand::invalid(invalid, e)
                    }
                }
            }
            ExprKind::CompositeLit { ty, elts } => self.composite_lit(e, ty.as_deref(), elts, hint),
            ExprKind::FuncLit { ty, body } => {
                let sig = self.func_type(None, ty);
                if !self.conf.ignore_func_bodies {
                    let decl = self.ctx.decl;
                    if self.ctx.sig.is_none() && decl.is_some() {
                        // In a package-level initializer the body may refer to
                        // the variable being declared.
                        self.bodies.push(Delayed::Body {
                            name: ustr("func literal"),
                            decl,
                            sig,
                            body: body.clone(),
                            file_scope: self.ctx.scope,
                        });
                    } else {
                        self.func_body(ustr("func literal"), decl, sig, body);
                    }
                }
                Operand::new(OperandMode::Value, sig, e)
            }
            ExprKind::Paren(inner) => {
                let x = self.raw_expr(inner, hint);
                Operand { expr: Some(e), ..x }
            }
            ExprKind::Selector { x, sel } => self.selector(e, x, sel),
            ExprKind::Index { x, index } => self.index_expr(e, x, index),
            ExprKind::Slice {
                x,
                low,
                high,
                max,
                slice3,
            } => self.slice_expr(e, x, [low.as_deref(), high.as_deref(), max.as_deref()], *slice3),
            ExprKind::TypeAssert { x, ty } => {
                let x = self.expr(x);
                let ty = match ty {
                    Some(ty) => ty,
                    None => {
                        self.invalid_op(e.span, "use of .(type) outside type switch");
                        return Operand::invalid(invalid, e);
                    }
                };
                if x.is_invalid() {
                    self.typ(ty);
                    return Operand::invalid(invalid, e);
                }
                if !self.ws.is_interface(x.ty) {
                    let msg = format!("{} is not an interface", self.describe(&x));
                    self.invalid_op(x.span(), msg);
                    self.typ(ty);
                    return Operand::invalid(invalid, e);
                }
                let t = self.typ(ty);
                self.type_assertion(&x, t, ty);
                Operand::new(OperandMode::CommaOk, t, e)
            }
            ExprKind::Call {
                fun,
                args,
                has_ellipsis,
            } => self.call(e, fun, args, *has_ellipsis),
            ExprKind::Star(inner) => {
                let x = self.expr_or_type(inner);
                match x.mode {
                    OperandMode::Invalid => Operand::invalid(invalid, e),
                    OperandMode::TypeExpr => {
                        let ptr = self.ws.types.pointer(x.ty);
                        Operand::new(OperandMode::TypeExpr, ptr, e)
                    }
                    _ => match self.ws.deref_ptr_underlying(x.ty) {
                        Some(elem) => Operand::new(OperandMode::Variable, elem, e),
                        None => {
                            let msg = format!("invalid indirect of {}", self.describe(&x));
                            self.invalid_op(x.span(), msg);
                            Operand::invalid(invalid, e)
                        }
                    },
                }
            }
            ExprKind::Unary { op, x } => self.unary(e, *op, x),
            ExprKind::Binary { op, x, y } => self.binary(e, *op, x, y),
            ExprKind::KeyValue { .. } => {
                self.invalid_op(e.span, "no key:value expected");
                Operand::invalid(invalid, e)
            }
            ExprKind::Ellipsis(_)
            | ExprKind::ArrayType { .. }
            | ExprKind::StructType(_)
            | ExprKind::FuncType(_)
            | ExprKind::InterfaceType(_)
            | ExprKind::MapType { .. }
            | ExprKind::ChanType { .. } => {
                let ty = self.typ_internal(e);
                Operand::new(OperandMode::TypeExpr, ty, e)
            }
        }
    }

    pub fn fold_error(&mut self, e: &Expr, err: FoldError) {
        match err {
            FoldError::Overflow => self.error(ErrorKind::ConstantOverflow, e.span, "constant overflow"),
            FoldError::DivByZero => self.invalid_op(e.span, "division by zero"),
            FoldError::Invalid => {
                let msg = format!("invalid constant expression {}", crate::ast::display::expr_string(e));
                self.invalid_op(e.span, msg)
            }
        }
    }

    /// Resolves an identifier, checking the declaration it refers to first if
    /// that has not happened yet.
    pub fn ident<'e>(&mut self, e: &'e Expr, name: Ustr) -> Operand<'e> {
        let invalid = self.ws.types.invalid();

        if name == "_" {
            self.invalid_op(e.span, "cannot use _ as value");
            return Operand::invalid(invalid, e);
        }

        let (scope, obj) = match self.ws.lookup_parent(self.ctx.scope, name) {
            Some(found) => found,
            None => {
                self.error(
                    ErrorKind::UndefinedIdentifier,
                    e.span,
                    format!("undeclared name: {}", name),
                );
                return Operand::invalid(invalid, e);
            }
        };

        self.record_use(e.id, obj);

        if self.chk.obj_map.contains_key(&obj) {
            self.obj_decl(obj);
            self.add_dep(obj);
        }

        let object = self.ws.object(obj).clone();

        if object.pkg.is_some() && object.pkg != Some(self.pkg) {
            self.mark_dot_import(scope, object.pkg);
        }

        let ty = object.ty.unwrap_or(invalid);

        match object.kind {
            ObjectKind::PkgName(_) => {
                self.invalid_op(e.span, format!("use of package {} without selector", name));
                Operand::invalid(invalid, e)
            }
            ObjectKind::Const(val) => {
                self.ws.mark_used(obj);
                if obj == self.ws.universe.iota {
                    return match self.ctx.iota.clone() {
                        Some(iota) => Operand::constant(ty, iota, e),
                        None => {
                            self.invalid_op(e.span, "cannot use iota outside constant declaration");
                            Operand::invalid(invalid, e)
                        }
                    };
                }
                if self.ws.is_invalid(ty) {
                    return Operand::invalid(invalid, e);
                }
                Operand::constant(ty, val, e)
            }
            ObjectKind::TypeName => Operand::new(OperandMode::TypeExpr, ty, e),
            ObjectKind::Var => {
                if object.pkg == Some(self.pkg) {
                    self.ws.mark_used(obj);
                }
                if self.ws.is_invalid(ty) {
                    return Operand::invalid(invalid, e);
                }
                Operand::new(OperandMode::Variable, ty, e)
            }
            ObjectKind::Func(_) => {
                self.ws.mark_used(obj);
                if self.ws.is_invalid(ty) {
                    return Operand::invalid(invalid, e);
                }
                Operand::new(OperandMode::Value, ty, e)
            }
            ObjectKind::Builtin(id) => Operand {
                builtin: Some(id),
                ..Operand::new(OperandMode::Builtin, invalid, e)
            },
            ObjectKind::Nil => Operand::new(OperandMode::Value, ty, e),
            ObjectKind::Label => Operand::invalid(invalid, e),
        }
    }

    fn mark_dot_import(&mut self, scope: ScopeId, pkg: Option<PackageId>) {
        for dot in self.dot_imports.iter_mut() {
            if dot.file_scope == scope && Some(dot.pkg) == pkg {
                dot.used = true;
            }
        }
    }

    /// The width and signedness of a typed unsigned integer, which `^` needs.
    fn unsigned_bits(&self, ty: TypeId) -> Option<u32> {
        if self.ws.is_untyped(ty) || !self.ws.is_unsigned(ty) {
            return None;
        }
        let word = self.conf.with_sizes(|s| s.word_size()) as u32 * 8;
        match self.ws.basic_kind(ty)? {
            BasicKind::Uint8 => Some(8),
            BasicKind::Uint16 => Some(16),
            BasicKind::Uint32 => Some(32),
            BasicKind::Uint64 => Some(64),
            _ => Some(word),
        }
    }

    fn unary<'e>(&mut self, e: &'e Expr, op: UnaryOp, xe: &'e Expr) -> Operand<'e> {
        let invalid = self.ws.types.invalid();

        match op {
            UnaryOp::Ref => {
                let x = self.expr(xe);
                if x.is_invalid() {
                    return Operand::invalid(invalid, e);
                }
                let literal = matches!(xe.unparen().kind, ExprKind::CompositeLit { .. });
                if x.mode != OperandMode::Variable && !literal {
                    let msg = format!("cannot take address of {}", self.describe(&x));
                    self.invalid_op(x.span(), msg);
                    return Operand::invalid(invalid, e);
                }
                let ptr = self.ws.types.pointer(x.ty);
                return Operand::new(OperandMode::Value, ptr, e);
            }
            UnaryOp::Recv => {
                let x = self.expr(xe);
                if x.is_invalid() {
                    return Operand::invalid(invalid, e);
                }
                return match self.ws.types.get(self.ws.underlying(x.ty)) {
                    Type::Chan(ch) if ch.dir != ChanDir::Send => {
                        Operand::new(OperandMode::CommaOk, ch.elem, e)
                    }
                    Type::Chan(_) => {
                        let msg = format!("cannot receive from send-only channel {}", self.describe(&x));
                        self.invalid_op(x.span(), msg);
                        Operand::invalid(invalid, e)
                    }
                    _ => {
                        let msg = format!("cannot receive from non-channel {}", self.describe(&x));
                        self.invalid_op(x.span(), msg);
                        Operand::invalid(invalid, e)
                    }
                };
            }
            _ => (),
        }

        let mut x = self.expr(xe);
        if x.is_invalid() {
            return Operand::invalid(invalid, e);
        }

        let ok = match op {
            UnaryOp::Plus | UnaryOp::Neg => self.ws.is_numeric(x.ty),
            UnaryOp::Not => self.ws.is_boolean(x.ty),
            UnaryOp::BitNot => self.ws.is_integer(x.ty),
            UnaryOp::Ref | UnaryOp::Recv => true,
        };
        if !ok {
            let msg = format!("operator {} not defined on {}", op, self.describe(&x));
            self.invalid_op(x.span(), msg);
            return Operand::invalid(invalid, e);
        }

        x.expr = Some(e);

        if x.is_constant() {
            match ConstValue::unary(op, &x.value(), self.unsigned_bits(x.ty)) {
                Ok(val) => x.val = Some(val),
                Err(err) => {
                    self.fold_error(e, err);
                    return Operand::invalid(invalid, e);
                }
            }
            if self.ws.is_typed(x.ty) {
                let ty = x.ty;
                self.represent(&mut x, ty);
            }
            return x;
        }

        x.mode = OperandMode::Value;
        x.val = None;
        x
    }

    /// Gives two operands a common type when one of them is untyped.
    pub fn match_types(&mut self, x: &mut Operand, y: &mut Operand) {
        self.convert_untyped(x, y.ty);
        if x.is_invalid() {
            return;
        }
        self.convert_untyped(y, x.ty);
    }

    pub fn binary<'e>(&mut self, e: &'e Expr, op: BinaryOp, xe: &'e Expr, ye: &'e Expr) -> Operand<'e> {
        let invalid = self.ws.types.invalid();
        let mut x = self.expr(xe);
        let mut y = self.expr(ye);

        if x.is_invalid() || y.is_invalid() {
            return Operand::invalid(invalid, e);
        }

        if op.is_shift() {
            return self.shift(e, op, x, y);
        }

        self.match_types(&mut x, &mut y);
        if x.is_invalid() || y.is_invalid() {
            return Operand::invalid(invalid, e);
        }

        if op.is_comparison() {
            return self.comparison(e, op, &x, &y);
        }

        if !self.ws.identical(x.ty, y.ty) {
            if !self.ws.is_invalid(x.ty) && !self.ws.is_invalid(y.ty) {
                let msg = format!(
                    "invalid operation: {} (mismatched types {} and {})",
                    crate::ast::display::expr_string(e),
                    self.type_str(x.ty),
                    self.type_str(y.ty)
                );
                self.error(ErrorKind::TypeMismatch, e.span, msg);
            }
            return Operand::invalid(invalid, e);
        }

        let ok = match op {
            BinaryOp::Add => self.ws.is_numeric(x.ty) || self.ws.is_string(x.ty),
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => self.ws.is_numeric(x.ty),
            BinaryOp::Rem | BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::AndNot => {
                self.ws.is_integer(x.ty)
            }
            BinaryOp::And | BinaryOp::Or => self.ws.is_boolean(x.ty),
            _ => false,
        };
        if !ok {
            let msg = format!("operator {} not defined on {}", op, self.describe(&x));
            self.invalid_op(x.span(), msg);
            return Operand::invalid(invalid, e);
        }

        if matches!(op, BinaryOp::Div | BinaryOp::Rem)
            && (x.is_constant() || self.ws.is_integer(x.ty))
            && y.is_constant()
            && y.value().is_zero()
        {
            self.invalid_op(y.span(), "division by zero");
            return Operand::invalid(invalid, e);
        }

        if x.is_constant() && y.is_constant() {
            let int_div = self.ws.is_integer(x.ty);
            return match ConstValue::binary(&x.value(), op, &y.value(), int_div) {
                Ok(val) => {
                    let mut z = Operand::constant(x.ty, val, e);
                    if self.ws.is_typed(z.ty) {
                        let ty = z.ty;
                        self.represent(&mut z, ty);
                    }
                    z
                }
                Err(err) => {
                    self.fold_error(e, err);
                    Operand::invalid(invalid, e)
                }
            };
        }

        Operand::new(OperandMode::Value, x.ty, e)
    }

    fn shift<'e>(&mut self, e: &'e Expr, op: BinaryOp, mut x: Operand<'e>, mut y: Operand<'e>) -> Operand<'e> {
        let invalid = self.ws.types.invalid();

        // The shifted operand must be an integer, or an untyped constant
        // representable as one.
        if x.is_constant() && self.ws.is_untyped(x.ty) {
            match x.value().to_int() {
                Some(v) => {
                    x.val = Some(v);
                    x.ty = self.ws.types.basic(BasicKind::UntypedInt);
                }
                None => {
                    let msg = format!("shifted operand {} must be integer", self.describe(&x));
                    self.invalid_op(x.span(), msg);
                    return Operand::invalid(invalid, e);
                }
            }
        } else if !self.ws.is_integer(x.ty) {
            let msg = format!("shifted operand {} must be integer", self.describe(&x));
            self.invalid_op(x.span(), msg);
            return Operand::invalid(invalid, e);
        }

        let count = if y.is_constant() {
            let v = y.value();
            if v.to_int().is_none() {
                let msg = format!("shift count {} must be integer", self.describe(&y));
                self.invalid_op(y.span(), msg);
                return Operand::invalid(invalid, e);
            }
            if v.is_negative() {
                let msg = format!("invalid shift count {}", self.describe(&y));
                self.invalid_op(y.span(), msg);
                return Operand::invalid(invalid, e);
            }
            if self.ws.is_untyped(y.ty) {
                let uint = self.ws.types.basic(BasicKind::Uint);
                self.convert_untyped(&mut y, uint);
            }
            Some(v.int_val().unwrap_or(i64::MAX))
        } else {
            if !self.ws.is_integer(y.ty) {
                let msg = format!("shift count {} must be integer", self.describe(&y));
                self.invalid_op(y.span(), msg);
                return Operand::invalid(invalid, e);
            }
            None
        };

        if x.is_constant() {
            if let Some(s) = count {
                if s > 10_000 {
                    let msg = format!("invalid shift count {}", self.describe(&y));
                    self.invalid_op(y.span(), msg);
                    return Operand::invalid(invalid, e);
                }
                return match ConstValue::shift(&x.value(), op, s as u32) {
                    Ok(val) => {
                        let mut z = Operand::constant(x.ty, val, e);
                        if self.ws.is_typed(z.ty) {
                            let ty = z.ty;
                            self.represent(&mut z, ty);
                        }
                        z
                    }
                    Err(err) => {
                        self.fold_error(e, err);
                        Operand::invalid(invalid, e)
                    }
                };
            }
        }

        Operand::new(OperandMode::Value, x.ty, e)
    }

    pub fn comparison<'e>(&mut self, e: &'e Expr, op: BinaryOp, x: &Operand, y: &Operand) -> Operand<'e> {
        let invalid = self.ws.types.invalid();
        let untyped_bool = self.ws.types.basic(BasicKind::UntypedBool);

        let assignable = self.ws.assignable_to(x.ty, y.ty) || self.ws.assignable_to(y.ty, x.ty);
        let problem = if !assignable {
            Some((
                ErrorKind::TypeMismatch,
                format!(
                    "invalid operation: {} (mismatched types {} and {})",
                    crate::ast::display::expr_string(e),
                    self.type_str(x.ty),
                    self.type_str(y.ty)
                ),
            ))
        } else if matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
            let ok = (self.ws.comparable(x.ty) && self.ws.comparable(y.ty))
                || (self.ws.is_untyped_nil(x.ty) && self.ws.has_nil(y.ty))
                || (self.ws.is_untyped_nil(y.ty) && self.ws.has_nil(x.ty));
            (!ok).then(|| {
                let culprit = if self.ws.comparable(x.ty) || self.ws.is_untyped_nil(x.ty) {
                    y
                } else {
                    x
                };
                (
                    ErrorKind::InvalidOperation,
                    format!("operator {} not defined on {}", op, self.describe(culprit)),
                )
            })
        } else {
            (!self.ws.is_ordered(x.ty)).then(|| {
                (
                    ErrorKind::InvalidOperation,
                    format!("operator {} not defined on {}", op, self.describe(x)),
                )
            })
        };

        if let Some((kind, msg)) = problem {
            if !self.ws.is_invalid(x.ty) && !self.ws.is_invalid(y.ty) {
                self.error(kind, e.span, msg);
            }
            return Operand::invalid(invalid, e);
        }

        if x.is_constant() && y.is_constant() {
            return match ConstValue::compare(&x.value(), op, &y.value()) {
                Ok(v) => Operand::constant(untyped_bool, ConstValue::Bool(v), e),
                Err(err) => {
                    self.fold_error(e, err);
                    Operand::invalid(invalid, e)
                }
            };
        }

        // The operands are materialized with their default types.
        for operand in [x, y] {
            if let Some(oe) = operand.expr {
                let ty = self.ws.default_type(operand.ty);
                self.update_expr_type(oe, ty);
            }
        }

        Operand::new(OperandMode::Value, untyped_bool, e)
    }

    /// Checks an index expression and returns its value when constant.
    pub fn index(&mut self, ie: &Expr, max: Option<i64>) -> Option<i64> {
        let mut x = self.expr(ie);
        if x.is_invalid() {
            return None;
        }

        let int = self.ws.types.basic(BasicKind::Int);
        self.convert_untyped(&mut x, int);
        if x.is_invalid() {
            return None;
        }

        if !self.ws.is_integer(x.ty) {
            let msg = format!("index {} must be integer", self.describe(&x));
            self.invalid_op(x.span(), msg);
            return None;
        }

        if !x.is_constant() {
            return None;
        }

        let val = x.value();
        if val.big_int().is_none() {
            return None;
        }
        let v = val.int_val().unwrap_or(if val.is_negative() { i64::MIN } else { i64::MAX });
        if v < 0 {
            let msg = format!("index {} must not be negative", self.describe(&x));
            self.invalid_op(x.span(), msg);
            return None;
        }
        if let Some(max) = max {
            if v >= max {
                let msg = format!("index {} is out of bounds (>= {})", x.text(), max);
                self.invalid_op(x.span(), msg);
                return None;
            }
        }
        Some(v)
    }

    fn const_string_len(&self, x: &Operand) -> Option<i64> {
        match &x.val {
            Some(ConstValue::Str(s)) if x.is_constant() => Some(s.len() as i64),
            _ => None,
        }
    }

    fn index_expr<'e>(&mut self, e: &'e Expr, xe: &'e Expr, ie: &'e Expr) -> Operand<'e> {
        let invalid = self.ws.types.invalid();
        let x = self.expr(xe);
        if x.is_invalid() {
            self.expr(ie);
            return Operand::invalid(invalid, e);
        }

        let (mode, elem, length) = match self.ws.types.get(self.ws.underlying(x.ty)).clone() {
            Type::Basic(b) if b.info.contains(BasicInfo::STRING) => {
                (OperandMode::Value, self.ws.types.byte(), self.const_string_len(&x))
            }
            Type::Array(a) => {
                let mode = if x.mode == OperandMode::Variable {
                    OperandMode::Variable
                } else {
                    OperandMode::Value
                };
                (mode, a.elem, Some(a.len))
            }
            Type::Pointer(p) => match self.ws.types.get(self.ws.underlying(p)).clone() {
                Type::Array(a) => (OperandMode::Variable, a.elem, Some(a.len)),
                _ => return self.cannot_index(e, &x, ie),
            },
            Type::Slice(elem) => (OperandMode::Variable, elem, None),
            Type::Map(m) => {
                let mut k = self.expr_with_hint(ie, Some(m.key));
                self.assignment(&mut k, Some(m.key), "map index");
                return Operand::new(OperandMode::MapIndex, m.elem, e);
            }
            _ => return self.cannot_index(e, &x, ie),
        };

        self.index(ie, length);
        Operand::new(mode, elem, e)
    }

    fn cannot_index<'e>(&mut self, e: &'e Expr, x: &Operand, ie: &'e Expr) -> Operand<'e> {
        let msg = format!("cannot index {}", self.describe(x));
        self.invalid_op(x.span(), msg);
        self.expr(ie);
        Operand::invalid(self.ws.types.invalid(), e)
    }

    fn slice_expr<'e>(
        &mut self,
        e: &'e Expr,
        xe: &'e Expr,
        indices: [Option<&'e Expr>; 3],
        slice3: bool,
    ) -> Operand<'e> {
        let invalid = self.ws.types.invalid();
        let x = self.expr(xe);
        if x.is_invalid() {
            for ie in indices.iter().flatten() {
                self.expr(ie);
            }
            return Operand::invalid(invalid, e);
        }

        let (ty, length) = match self.ws.types.get(self.ws.underlying(x.ty)).clone() {
            Type::Basic(b) if b.info.contains(BasicInfo::STRING) => {
                if slice3 {
                    self.invalid_op(e.span, "3-index slice of string");
                    return Operand::invalid(invalid, e);
                }
                let ty = if self.ws.is_untyped(x.ty) {
                    self.ws.types.basic(BasicKind::String)
                } else {
                    x.ty
                };
                (ty, self.const_string_len(&x))
            }
            Type::Array(a) => {
                if x.mode != OperandMode::Variable {
                    let msg = format!("cannot slice {} (value not addressable)", self.describe(&x));
                    self.invalid_op(x.span(), msg);
                    return Operand::invalid(invalid, e);
                }
                (self.ws.types.slice(a.elem), Some(a.len))
            }
            Type::Pointer(p) => match self.ws.types.get(self.ws.underlying(p)).clone() {
                Type::Array(a) => (self.ws.types.slice(a.elem), Some(a.len)),
                _ => {
                    let msg = format!("cannot slice {}", self.describe(&x));
                    self.invalid_op(x.span(), msg);
                    return Operand::invalid(invalid, e);
                }
            },
            Type::Slice(_) => (x.ty, None),
            _ => {
                let msg = format!("cannot slice {}", self.describe(&x));
                self.invalid_op(x.span(), msg);
                return Operand::invalid(invalid, e);
            }
        };

        if slice3 && (indices[1].is_none() || indices[2].is_none()) {
            self.invalid_op(e.span, "2nd and 3rd index required in 3-index slice");
            return Operand::invalid(invalid, e);
        }

        // Indices may be equal to the length.
        let max = length.map(|n| n + 1);
        let mut known = vec![];
        for ie in indices.iter().flatten() {
            if let Some(v) = self.index(ie, max) {
                known.push((v, ie.span));
            }
        }
        for pair in known.windows(2) {
            if pair[0].0 > pair[1].0 {
                self.invalid_op(pair[1].1, format!("invalid slice indices: {} > {}", pair[0].0, pair[1].0));
            }
        }

        Operand::new(OperandMode::Value, ty, e)
    }

    pub fn type_assertion(&mut self, x: &Operand, t: TypeId, te: &Expr) {
        if self.ws.is_invalid(t) || self.ws.is_interface(t) {
            return;
        }
        if let Some(missing) = self.ws.missing_method(t, x.ty, false) {
            let name = self.ws.object(missing.method).name;
            let why = if missing.wrong_type {
                format!("wrong type for method {}", name)
            } else {
                format!("missing method {}", name)
            };
            let msg = format!(
                "impossible type assertion: {} does not implement {} ({})",
                self.type_str(t),
                self.type_str(x.ty),
                why
            );
            self.invalid_op(te.span, msg);
        }
    }

    fn composite_lit<'e>(
        &mut self,
        e: &'e Expr,
        ty: Option<&'e Expr>,
        elts: &'e [Expr],
        hint: Option<TypeId>,
    ) -> Operand<'e> {
        let invalid = self.ws.types.invalid();

        let (result, base) = match ty {
            Some(te) => match &te.kind {
                // [...]T: the length is the number of elements
                ExprKind::ArrayType {
                    len: Some(len),
                    elem,
                } if matches!(len.kind, ExprKind::Ellipsis(None)) => {
                    let elem = self.typ(elem);
                    let n = self.indexed_elts(elts, elem, None);
                    let arr = self.ws.types.insert(Type::Array(ArrayType { elem, len: n }));
                    self.record_type_and_value(te.id, OperandMode::TypeExpr, arr, None);
                    return Operand::new(OperandMode::Value, arr, e);
                }
                _ => {
                    let t = self.typ(te);
                    (t, t)
                }
            },
            None => match hint {
                Some(h) => match self.ws.deref_ptr_underlying(h) {
                    Some(elem) => (h, elem),
                    None => (h, h),
                },
                None => {
                    self.invalid_op(e.span, "invalid composite literal type: missing type");
                    for elt in elts {
                        self.use_expr(elt);
                    }
                    return Operand::invalid(invalid, e);
                }
            },
        };

        match self.ws.types.get(self.ws.underlying(base)).clone() {
            Type::Struct(s) => self.struct_elts(&s.fields, elts, e),
            Type::Array(a) => {
                self.indexed_elts(elts, a.elem, Some(a.len));
            }
            Type::Slice(elem) => {
                self.indexed_elts(elts, elem, None);
            }
            Type::Map(m) => {
                let mut seen = HashSet::new();
                for elt in elts {
                    match &elt.kind {
                        ExprKind::KeyValue { key, value } => {
                            let mut k = self.expr_with_hint(key, Some(m.key));
                            self.assignment(&mut k, Some(m.key), "map literal");
                            if k.is_constant() {
                                let dup = k.val.as_ref().map(|v| format!("{:?}", v));
                                if let Some(dup) = dup {
                                    if !seen.insert(dup) {
                                        let msg = format!("duplicate key {} in map literal", k.text());
                                        self.invalid_op(k.span(), msg);
                                    }
                                }
                            }
                            let mut v = self.expr_with_hint(value, Some(m.elem));
                            self.assignment(&mut v, Some(m.elem), "map literal");
                        }
                        _ => {
                            self.invalid_op(elt.span, "missing key in map literal");
                            self.use_expr(elt);
                        }
                    }
                }
            }
            _ => {
                if !self.ws.is_invalid(base) {
                    let msg = format!("invalid composite literal type {}", self.type_str(base));
                    self.invalid_op(e.span, msg);
                }
                for elt in elts {
                    self.use_expr(elt);
                }
                return Operand::invalid(invalid, e);
            }
        }

        Operand::new(OperandMode::Value, result, e)
    }

    fn struct_elts(&mut self, fields: &[ObjectId], elts: &[Expr], e: &Expr) {
        if elts.is_empty() {
            return;
        }

        let keyed = matches!(elts[0].kind, ExprKind::KeyValue { .. });

        if keyed {
            let mut seen = HashSet::new();
            for elt in elts {
                let (key, value) = match &elt.kind {
                    ExprKind::KeyValue { key, value } => (key, value),
                    _ => {
                        self.invalid_op(elt.span, "mixture of field:value and value elements in struct literal");
                        self.use_expr(elt);
                        continue;
                    }
                };
                let name = match key.as_ident() {
                    Some(ident) => ident.name,
                    None => {
                        self.invalid_op(key.span, "invalid field name in struct literal");
                        self.use_expr(value);
                        continue;
                    }
                };
                let field = fields.iter().position(|f| self.ws.object(*f).name == name);
                let i = match field {
                    Some(i) => i,
                    None => {
                        self.error(
                            ErrorKind::UndefinedIdentifier,
                            key.span,
                            format!("unknown field {} in struct literal", name),
                        );
                        self.use_expr(value);
                        continue;
                    }
                };
                self.record_use(key.id, fields[i]);
                if !seen.insert(i) {
                    self.invalid_op(key.span, format!("duplicate field name {} in struct literal", name));
                }
                let fty = self.ws.obj_type(fields[i]);
                let mut x = self.expr_with_hint(value, Some(fty));
                self.assignment(&mut x, Some(fty), "struct literal");
            }
            return;
        }

        for (i, elt) in elts.iter().enumerate() {
            if matches!(elt.kind, ExprKind::KeyValue { .. }) {
                self.invalid_op(elt.span, "mixture of field:value and value elements in struct literal");
                continue;
            }
            match fields.get(i) {
                Some(f) => {
                    let field = self.ws.object(*f).clone();
                    if !field.is_exported() && field.pkg != Some(self.pkg) {
                        let msg = format!("implicit assignment to unexported field {} in struct literal", field.name);
                        self.invalid_op(elt.span, msg);
                    }
                    let fty = self.ws.obj_type(*f);
                    let mut x = self.expr_with_hint(elt, Some(fty));
                    self.assignment(&mut x, Some(fty), "struct literal");
                }
                None => {
                    self.invalid_op(elt.span, "too many values in struct literal");
                    self.use_expr(elt);
                }
            }
        }

        if elts.len() < fields.len() {
            self.invalid_op(e.span, "too few values in struct literal");
        }
    }

    /// Checks array or slice literal elements and returns the literal's length.
    fn indexed_elts(&mut self, elts: &[Expr], elem: TypeId, length: Option<i64>) -> i64 {
        let mut index = 0i64;
        let mut max = 0i64;
        let mut seen = HashSet::new();

        for elt in elts {
            let value = match &elt.kind {
                ExprKind::KeyValue { key, value } => {
                    if let Some(i) = self.index(key, length) {
                        index = i;
                    }
                    value
                }
                _ => {
                    if let Some(n) = length {
                        if index >= n {
                            let msg = format!("index {} is out of bounds (>= {})", index, n);
                            self.invalid_op(elt.span, msg);
                        }
                    }
                    elt
                }
            };

            if !seen.insert(index) {
                self.invalid_op(elt.span, format!("duplicate index {} in array or slice literal", index));
            }

            let mut x = self.expr_with_hint(value, Some(elem));
            self.assignment(&mut x, Some(elem), "array or slice literal");

            index += 1;
            max = max.max(index);
        }

        max
    }

    /// Evaluates an expression whose value is not needed, so that the
    /// identifiers in it are resolved and recorded.
    pub fn use_expr(&mut self, e: &Expr) {
        self.raw_expr(e, None);
    }
}
