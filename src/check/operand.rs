use super::CheckSess;
use crate::{
    ast::{display::expr_string, Expr, ExprKind},
    constant::ConstValue,
    error::ErrorKind,
    info::OperandMode,
    span::Span,
    types::{BasicInfo, BasicKind, Type, TypeId},
    workspace::object::BuiltinId,
};

/// The result of evaluating an expression.
#[derive(Debug, Clone)]
pub(crate) struct Operand<'e> {
    pub mode: OperandMode,
    pub ty: TypeId,
    /// Set in `OperandMode::Constant`.
    pub val: Option<ConstValue>,
    /// Set in `OperandMode::Builtin`.
    pub builtin: Option<BuiltinId>,
    pub expr: Option<&'e Expr>,
}

impl<'e> Operand<'e> {
    pub fn new(mode: OperandMode, ty: TypeId, expr: &'e Expr) -> Self {
        Self {
            mode,
            ty,
            val: None,
            builtin: None,
            expr: Some(expr),
        }
    }

    pub fn invalid(ty: TypeId, expr: &'e Expr) -> Self {
        Self::new(OperandMode::Invalid, ty, expr)
    }

    pub fn constant(ty: TypeId, val: ConstValue, expr: &'e Expr) -> Self {
        Self {
            val: Some(val),
            ..Self::new(OperandMode::Constant, ty, expr)
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.mode == OperandMode::Invalid
    }

    pub fn is_constant(&self) -> bool {
        self.mode == OperandMode::Constant
    }

    pub fn span(&self) -> Span {
        self.expr.map_or_else(Span::unknown, |e| e.span)
    }

    pub fn text(&self) -> String {
        self.expr.map_or_else(String::new, expr_string)
    }

    pub fn value(&self) -> ConstValue {
        self.val.clone().unwrap_or_else(ConstValue::unknown)
    }
}

/// Why a constant does not fit a type.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) enum NotRepresentable {
    Overflow,
    Truncated,
    Mismatch,
}

impl<'s> CheckSess<'s> {
    /// Formats an operand for diagnostics, e.g. `x (variable of type int)`.
    pub fn describe(&self, x: &Operand) -> String {
        let text = x.text();

        if x.mode == OperandMode::Value && self.ws.is_untyped_nil(x.ty) {
            return text;
        }

        let what = match x.mode {
            OperandMode::Invalid => "invalid operand".to_string(),
            OperandMode::NoValue => "no value".to_string(),
            OperandMode::Builtin => "built-in".to_string(),
            OperandMode::TypeExpr => "type".to_string(),
            OperandMode::Constant => {
                let val = x.value().to_string();
                let shown = if val == text { String::new() } else { format!(" {}", val) };
                if self.ws.is_untyped(x.ty) {
                    format!("{} constant{}", self.type_str(x.ty), shown)
                } else {
                    format!("constant{} of type {}", shown, self.type_str(x.ty))
                }
            }
            OperandMode::Variable => format!("variable of type {}", self.type_str(x.ty)),
            OperandMode::MapIndex => format!("map index expression of type {}", self.type_str(x.ty)),
            OperandMode::Value => format!("value of type {}", self.type_str(x.ty)),
            OperandMode::CommaOk => format!("comma, ok expression of type {}", self.type_str(x.ty)),
        };

        format!("{} ({})", text, what)
    }

    fn int_bits(&self, kind: BasicKind) -> Option<(u32, bool)> {
        let word = self.conf.with_sizes(|s| s.word_size()) as u32 * 8;
        Some(match kind {
            BasicKind::Int => (word, true),
            BasicKind::Int8 => (8, true),
            BasicKind::Int16 => (16, true),
            BasicKind::Int32 => (32, true),
            BasicKind::Int64 => (64, true),
            BasicKind::Uint | BasicKind::Uintptr => (word, false),
            BasicKind::Uint8 => (8, false),
            BasicKind::Uint16 => (16, false),
            BasicKind::Uint32 => (32, false),
            BasicKind::Uint64 => (64, false),
            _ => return None,
        })
    }

    /// Converts `val` to the representation of basic type `ty`, if it fits.
    pub fn representable(&self, val: &ConstValue, ty: TypeId) -> Result<ConstValue, NotRepresentable> {
        if val.is_unknown() {
            return Ok(val.clone());
        }

        let kind = match self.ws.basic_kind(ty) {
            Some(kind) => kind,
            None => return Err(NotRepresentable::Mismatch),
        };
        let info = kind.info();

        if kind == BasicKind::Invalid {
            return Ok(val.clone());
        }

        if info.contains(BasicInfo::BOOLEAN) {
            return match val {
                ConstValue::Bool(_) => Ok(val.clone()),
                _ => Err(NotRepresentable::Mismatch),
            };
        }

        if info.contains(BasicInfo::STRING) {
            return match val {
                ConstValue::Str(_) => Ok(val.clone()),
                _ => Err(NotRepresentable::Mismatch),
            };
        }

        if info.contains(BasicInfo::INTEGER) {
            let int = match val {
                ConstValue::Int(_) => val.clone(),
                ConstValue::Float(_) => val.to_int().ok_or(NotRepresentable::Truncated)?,
                _ => return Err(NotRepresentable::Mismatch),
            };
            return match self.int_bits(kind) {
                Some((bits, signed)) if !int.fits_int(bits, signed) => Err(NotRepresentable::Overflow),
                _ => Ok(int),
            };
        }

        if info.contains(BasicInfo::FLOAT) {
            if !matches!(val, ConstValue::Int(_) | ConstValue::Float(_)) {
                return Err(NotRepresentable::Mismatch);
            }
            // Untyped floats stay exact; typed ones take the precision of their type.
            return match kind {
                BasicKind::UntypedFloat => val.to_float().ok_or(NotRepresentable::Mismatch),
                BasicKind::Float32 => val.round_float(true).ok_or(NotRepresentable::Overflow),
                _ => val.round_float(false).ok_or(NotRepresentable::Overflow),
            };
        }

        Err(NotRepresentable::Mismatch)
    }

    /// Checks that constant `x` fits its type `ty`, reporting an error and
    /// invalidating `x` if it does not.
    pub fn represent(&mut self, x: &mut Operand, ty: TypeId) {
        match self.representable(&x.value(), ty) {
            Ok(val) => x.val = Some(val),
            Err(reason) => {
                let (kind, msg) = match reason {
                    NotRepresentable::Overflow => (
                        ErrorKind::ConstantOverflow,
                        format!("constant {} overflows {}", x.value(), self.type_str(ty)),
                    ),
                    NotRepresentable::Truncated => (
                        ErrorKind::TypeMismatch,
                        format!("constant {} truncated to {}", x.value(), self.type_str(ty)),
                    ),
                    NotRepresentable::Mismatch => (
                        ErrorKind::TypeMismatch,
                        format!("cannot convert {} to {}", self.describe(x), self.type_str(ty)),
                    ),
                };
                self.error(kind, x.span(), msg);
                x.mode = OperandMode::Invalid;
            }
        }
    }

    /// Gives an untyped operand the type `target`, or reports why it cannot
    /// have it.
    pub fn convert_untyped(&mut self, x: &mut Operand, target: TypeId) {
        if x.is_invalid() || self.ws.is_typed(x.ty) || self.ws.is_invalid(target) {
            return;
        }

        if self.ws.is_untyped(target) {
            // Both untyped: numeric kinds widen, others must agree.
            let (xk, tk) = match (self.ws.basic_kind(x.ty), self.ws.basic_kind(target)) {
                (Some(a), Some(b)) => (a, b),
                _ => return,
            };
            let numeric = |k: BasicKind| k.info().intersects(BasicInfo::NUMERIC);
            if numeric(xk) && numeric(tk) {
                if xk < tk {
                    x.ty = target;
                    if let Some(e) = x.expr {
                        self.update_expr_type(e, target);
                    }
                }
            } else if xk != tk {
                self.cannot_convert(x, target);
            }
            return;
        }

        let mut target = target;

        match self.ws.types.get(self.ws.underlying(target)).clone() {
            Type::Basic(b) => {
                if x.is_constant() {
                    self.represent(x, target);
                    if x.is_invalid() {
                        return;
                    }
                } else {
                    let xi = self.ws.basic_info(x.ty);
                    let ok = if self.ws.is_untyped_nil(x.ty) {
                        b.kind == BasicKind::UnsafePointer
                    } else if xi.contains(BasicInfo::BOOLEAN) {
                        b.info.contains(BasicInfo::BOOLEAN)
                    } else if xi.intersects(BasicInfo::NUMERIC) {
                        b.info.intersects(BasicInfo::NUMERIC)
                    } else {
                        xi.contains(BasicInfo::STRING) && b.info.contains(BasicInfo::STRING)
                    };
                    if !ok {
                        self.cannot_convert(x, target);
                        return;
                    }
                }
            }
            Type::Interface(_) => {
                if self.ws.is_untyped_nil(x.ty) {
                    target = x.ty;
                } else {
                    if !self.ws.is_empty_interface(target) {
                        self.cannot_convert(x, target);
                        return;
                    }
                    target = self.ws.default_type(x.ty);
                }
            }
            Type::Pointer(_) | Type::Signature(_) | Type::Slice(_) | Type::Map(_) | Type::Chan(_) => {
                if !self.ws.is_untyped_nil(x.ty) {
                    self.cannot_convert(x, target);
                    return;
                }
                target = x.ty;
            }
            _ => {
                self.cannot_convert(x, target);
                return;
            }
        }

        x.ty = target;
        if let Some(e) = x.expr {
            self.update_expr_type(e, target);
        }
    }

    fn cannot_convert(&mut self, x: &mut Operand, target: TypeId) {
        let msg = format!("cannot convert {} to {}", self.describe(x), self.type_str(target));
        self.error(ErrorKind::TypeMismatch, x.span(), msg);
        x.mode = OperandMode::Invalid;
    }

    /// Replaces the recorded untyped type of `e`, and of the untyped operands
    /// it was computed from, once the context has fixed it.
    pub fn update_expr_type(&mut self, e: &Expr, ty: TypeId) {
        let types = match self.chk.info.types.as_mut() {
            Some(types) => types,
            None => return,
        };

        match types.get_mut(&e.id) {
            Some(tv) if self.ws.is_untyped(tv.ty) => tv.ty = ty,
            _ => return,
        }

        // The result of a comparison is untyped independently of its operands.
        match &e.kind {
            ExprKind::Paren(inner) => self.update_expr_type(inner, ty),
            ExprKind::Unary { x, .. } => self.update_expr_type(x, ty),
            ExprKind::Binary { op, x, y } if !op.is_comparison() => {
                self.update_expr_type(x, ty);
                if !op.is_shift() {
                    self.update_expr_type(y, ty);
                }
            }
            _ => (),
        }
    }

    /// Reports a multi-valued operand used where one value is expected.
    pub fn single_value(&mut self, x: &mut Operand) {
        if x.mode == OperandMode::Value && matches!(self.ws.types.get(x.ty), Type::Tuple(_)) {
            let n = self.ws.tuple_len(x.ty);
            let msg = format!("{}-valued {} where single value is expected", n, x.text());
            self.invalid_op(x.span(), msg);
            x.mode = OperandMode::Invalid;
        }
    }

    /// Checks that `x` can be assigned to a variable of type `target`, giving
    /// untyped operands their final type. Without a target, untyped operands
    /// take their default type. On failure `x` becomes invalid.
    pub fn assignment(&mut self, x: &mut Operand, target: Option<TypeId>, context: &str) {
        self.single_value(x);

        match x.mode {
            OperandMode::Invalid => return,
            OperandMode::Constant
            | OperandMode::Variable
            | OperandMode::MapIndex
            | OperandMode::Value
            | OperandMode::CommaOk => (),
            _ => {
                let msg = format!("cannot assign {} in {}", self.describe(x), context);
                self.invalid_op(x.span(), msg);
                x.mode = OperandMode::Invalid;
                return;
            }
        }

        if self.ws.is_untyped(x.ty) {
            let to = match target {
                Some(t) if !self.ws.is_interface(t) => t,
                _ => {
                    if target.is_none() && self.ws.is_untyped_nil(x.ty) {
                        let msg = format!("use of untyped nil in {}", context);
                        self.invalid_op(x.span(), msg);
                        x.mode = OperandMode::Invalid;
                        return;
                    }
                    self.ws.default_type(x.ty)
                }
            };
            self.convert_untyped(x, to);
            if x.is_invalid() {
                return;
            }
        }

        let target = match target {
            Some(t) => t,
            None => return,
        };

        if self.ws.is_invalid(x.ty) || self.ws.is_invalid(target) {
            return;
        }

        if !self.ws.assignable_to(x.ty, target) {
            let mut msg = format!(
                "cannot use {} as {} value in {}",
                self.describe(x),
                self.type_str(target),
                context
            );
            if self.ws.is_interface(target) {
                if let Some(missing) = self.ws.missing_method(x.ty, target, true) {
                    let name = self.ws.object(missing.method).name;
                    if missing.wrong_type {
                        msg.push_str(&format!(": wrong type for method {}", name));
                    } else {
                        msg.push_str(&format!(": missing method {}", name));
                    }
                }
            }
            self.error(ErrorKind::TypeMismatch, x.span(), msg);
            x.mode = OperandMode::Invalid;
        }
    }
}
