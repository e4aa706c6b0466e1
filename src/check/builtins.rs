use super::{operand::Operand, CheckSess};
use crate::{
    ast::{ChanDir, Expr, ExprKind, UnaryOp},
    constant::ConstValue,
    info::{OperandMode, Selection, SelectionKind},
    types::{lookup::LookupResult, BasicKind, InterfaceType, Type, TypeId},
    workspace::object::BuiltinId,
};

impl<'s> CheckSess<'s> {
    /// Evaluates a call of a predeclared function or of `unsafe.Sizeof` and
    /// friends.
    pub fn builtin<'e>(&mut self, e: &'e Expr, id: BuiltinId, args: &'e [Expr], has_ellipsis: bool) -> Operand<'e> {
        let invalid = self.ws.types.invalid();
        let name = id.name();

        if has_ellipsis && id != BuiltinId::Append {
            self.invalid_op(e.span, format!("invalid use of ... with built-in {}", name));
            self.use_exprs(args);
            return Operand::invalid(invalid, e);
        }

        let (min, variadic) = id.arity();
        let n = args.len();
        if n < min || (!variadic && n > min) {
            let msg = if n < min {
                format!("not enough arguments for {} (expected {}, found {})", name, min, n)
            } else {
                format!("too many arguments for {} (expected {}, found {})", name, min, n)
            };
            self.invalid_op(e.span, msg);
            self.use_exprs(args);
            return Operand::invalid(invalid, e);
        }

        let int = self.ws.types.basic(BasicKind::Int);
        let no_value = self.ws.types.empty_tuple();

        match id {
            BuiltinId::Append => self.append(e, args, has_ellipsis),
            BuiltinId::Len | BuiltinId::Cap => self.len_or_cap(e, id, &args[0]),
            BuiltinId::Close => {
                let x = self.expr(&args[0]);
                if x.is_invalid() {
                    return Operand::invalid(invalid, e);
                }
                match self.ws.types.get(self.ws.underlying(x.ty)) {
                    Type::Chan(c) if c.dir == ChanDir::Recv => {
                        let msg = format!("invalid operation: cannot close receive-only channel {}", self.describe(&x));
                        self.invalid_op(x.span(), msg);
                        Operand::invalid(invalid, e)
                    }
                    Type::Chan(_) => Operand::new(OperandMode::NoValue, no_value, e),
                    _ => {
                        let msg = format!("invalid operation: {} is not a channel", self.describe(&x));
                        self.invalid_op(x.span(), msg);
                        Operand::invalid(invalid, e)
                    }
                }
            }
            BuiltinId::Copy => {
                let dst = self.expr(&args[0]);
                let src = self.expr(&args[1]);
                if dst.is_invalid() || src.is_invalid() {
                    return Operand::invalid(invalid, e);
                }

                let dst_elem = match self.ws.types.get(self.ws.underlying(dst.ty)) {
                    Type::Slice(elem) => Some(*elem),
                    _ => None,
                };
                let src_elem = match self.ws.types.get(self.ws.underlying(src.ty)) {
                    Type::Slice(elem) => Some(*elem),
                    // copy([]byte, string)
                    _ if self.ws.is_string(src.ty) => Some(self.ws.types.byte()),
                    _ => None,
                };

                match (dst_elem, src_elem) {
                    (Some(d), Some(s)) if self.ws.identical(d, s) => Operand::new(OperandMode::Value, int, e),
                    (Some(d), Some(s)) => {
                        let msg = format!(
                            "arguments to copy {} and {} have different element types {} and {}",
                            self.describe(&dst),
                            self.describe(&src),
                            self.type_str(d),
                            self.type_str(s)
                        );
                        self.invalid_op(e.span, msg);
                        Operand::invalid(invalid, e)
                    }
                    _ => {
                        let msg = format!(
                            "copy expects slice arguments; found {} and {}",
                            self.describe(&dst),
                            self.describe(&src)
                        );
                        self.invalid_op(e.span, msg);
                        Operand::invalid(invalid, e)
                    }
                }
            }
            BuiltinId::Delete => {
                let m = self.expr(&args[0]);
                let mut k = self.expr(&args[1]);
                if m.is_invalid() || k.is_invalid() {
                    return Operand::invalid(invalid, e);
                }
                let key = match self.ws.types.get(self.ws.underlying(m.ty)) {
                    Type::Map(map) => map.key,
                    _ => {
                        let msg = format!("{} is not a map", self.describe(&m));
                        self.invalid_op(m.span(), msg);
                        return Operand::invalid(invalid, e);
                    }
                };
                self.assignment(&mut k, Some(key), "argument to delete");
                if k.is_invalid() {
                    return Operand::invalid(invalid, e);
                }
                Operand::new(OperandMode::NoValue, no_value, e)
            }
            BuiltinId::Make => self.make(e, args),
            BuiltinId::New => {
                let t = self.typ(&args[0]);
                if self.ws.is_invalid(t) {
                    return Operand::invalid(invalid, e);
                }
                let ptr = self.ws.types.pointer(t);
                Operand::new(OperandMode::Value, ptr, e)
            }
            BuiltinId::Panic => {
                let any = self.empty_interface();
                let mut x = self.expr(&args[0]);
                self.assignment(&mut x, Some(any), "argument to panic");
                if x.is_invalid() {
                    return Operand::invalid(invalid, e);
                }
                Operand::new(OperandMode::NoValue, no_value, e)
            }
            BuiltinId::Print | BuiltinId::Println => {
                let mut ok = true;
                for arg in args {
                    let mut x = self.expr(arg);
                    self.assignment(&mut x, None, &format!("argument to {}", name));
                    ok &= !x.is_invalid();
                }
                if !ok {
                    return Operand::invalid(invalid, e);
                }
                Operand::new(OperandMode::NoValue, no_value, e)
            }
            BuiltinId::Recover => {
                let any = self.empty_interface();
                Operand::new(OperandMode::Value, any, e)
            }
            BuiltinId::Alignof | BuiltinId::Sizeof => {
                let mut x = self.expr(&args[0]);
                self.assignment(&mut x, None, &format!("argument to unsafe.{}", name));
                if x.is_invalid() {
                    return Operand::invalid(invalid, e);
                }
                let ws = &*self.ws;
                let n = self.conf.with_sizes(|s| {
                    if id == BuiltinId::Sizeof {
                        s.sizeof(ws, x.ty)
                    } else {
                        s.alignof(ws, x.ty)
                    }
                });
                let uintptr = self.ws.types.basic(BasicKind::Uintptr);
                Operand::constant(uintptr, ConstValue::int(n), e)
            }
            BuiltinId::Offsetof => self.offsetof(e, &args[0]),
        }
    }

    fn empty_interface(&mut self) -> TypeId {
        self.ws.types.insert(Type::Interface(InterfaceType {
            methods: vec![],
            embeddeds: vec![],
        }))
    }

    fn append<'e>(&mut self, e: &'e Expr, args: &'e [Expr], has_ellipsis: bool) -> Operand<'e> {
        let invalid = self.ws.types.invalid();
        let s = self.expr(&args[0]);
        if s.is_invalid() {
            self.use_exprs(&args[1..]);
            return Operand::invalid(invalid, e);
        }

        let elem = match self.ws.types.get(self.ws.underlying(s.ty)) {
            Type::Slice(elem) => *elem,
            _ => {
                let msg = format!("invalid append: first argument {} is not a slice", self.describe(&s));
                self.invalid_op(s.span(), msg);
                self.use_exprs(&args[1..]);
                return Operand::invalid(invalid, e);
            }
        };

        if has_ellipsis {
            if args.len() != 2 {
                self.invalid_op(e.span, "can only use ... with final argument to append");
                self.use_exprs(&args[1..]);
                return Operand::invalid(invalid, e);
            }
            let mut y = self.expr(&args[1]);
            // append([]byte, string...)
            let bytes = self.ws.types.byte();
            if self.ws.identical(elem, bytes) && self.ws.is_string(y.ty) {
                let string = self.ws.types.basic(BasicKind::String);
                self.assignment(&mut y, Some(string), "argument to append");
            } else {
                let slice = self.ws.types.slice(elem);
                self.assignment(&mut y, Some(slice), "argument to append");
            }
            if y.is_invalid() {
                return Operand::invalid(invalid, e);
            }
            return Operand::new(OperandMode::Value, s.ty, e);
        }

        let mut ok = true;
        for arg in &args[1..] {
            let mut x = self.expr(arg);
            self.assignment(&mut x, Some(elem), "argument to append");
            ok &= !x.is_invalid();
        }
        if !ok {
            return Operand::invalid(invalid, e);
        }
        Operand::new(OperandMode::Value, s.ty, e)
    }

    fn len_or_cap<'e>(&mut self, e: &'e Expr, id: BuiltinId, arg: &'e Expr) -> Operand<'e> {
        let invalid = self.ws.types.invalid();
        let int = self.ws.types.basic(BasicKind::Int);
        let x = self.expr(arg);
        if x.is_invalid() {
            return Operand::invalid(invalid, e);
        }

        if id == BuiltinId::Len && x.is_constant() {
            if let Some(s) = x.value().str_val() {
                return Operand::constant(int, ConstValue::int(s.len()), e);
            }
        }

        let under = self.ws.underlying(x.ty);
        let under = self.ws.deref_ptr_underlying(under).filter(|elem| {
            matches!(self.ws.types.get(self.ws.underlying(*elem)), Type::Array(_))
        }).map_or(under, |elem| self.ws.underlying(elem));

        let ok = match self.ws.types.get(under) {
            Type::Array(a) => {
                // The length of an array is constant unless evaluating the
                // operand has effects.
                if !has_call_or_recv(arg) {
                    return Operand::constant(int, ConstValue::int(a.len), e);
                }
                true
            }
            Type::Basic(_) => id == BuiltinId::Len && self.ws.is_string(under),
            Type::Slice(_) | Type::Chan(_) => true,
            Type::Map(_) => id == BuiltinId::Len,
            _ => false,
        };

        if !ok {
            let msg = format!("invalid argument: {} for {}", self.describe(&x), id.name());
            self.invalid_op(x.span(), msg);
            return Operand::invalid(invalid, e);
        }

        Operand::new(OperandMode::Value, int, e)
    }

    fn make<'e>(&mut self, e: &'e Expr, args: &'e [Expr]) -> Operand<'e> {
        let invalid = self.ws.types.invalid();
        let t = self.typ(&args[0]);
        if self.ws.is_invalid(t) {
            self.use_exprs(&args[1..]);
            return Operand::invalid(invalid, e);
        }

        let min = match self.ws.types.get(self.ws.underlying(t)) {
            Type::Slice(_) => 2,
            Type::Map(_) | Type::Chan(_) => 1,
            _ => {
                let msg = format!("cannot make {}; type must be slice, map, or channel", self.type_str(t));
                self.invalid_op(args[0].span, msg);
                self.use_exprs(&args[1..]);
                return Operand::invalid(invalid, e);
            }
        };

        let n = args.len();
        if n < min || n > min + 1 {
            let msg = format!(
                "invalid operation: {} expects {} or {} arguments; found {}",
                crate::ast::display::expr_string(e),
                min,
                min + 1,
                n
            );
            self.invalid_op(e.span, msg);
            self.use_exprs(&args[1..]);
            return Operand::invalid(invalid, e);
        }

        let sizes: Vec<Option<i64>> = args[1..].iter().map(|arg| self.index(arg, None)).collect();
        if let [Some(len), Some(cap)] = sizes.as_slice() {
            if len > cap {
                self.invalid_op(args[1].span, "length and capacity swapped");
            }
        }

        Operand::new(OperandMode::Value, t, e)
    }

    fn offsetof<'e>(&mut self, e: &'e Expr, arg: &'e Expr) -> Operand<'e> {
        let invalid = self.ws.types.invalid();
        let (base, sel) = match &arg.unparen().kind {
            ExprKind::Selector { x, sel } => (x, sel),
            _ => {
                let msg = format!(
                    "invalid argument: {} is not a selector expression",
                    crate::ast::display::expr_string(arg)
                );
                self.invalid_op(arg.span, msg);
                self.use_expr(arg);
                return Operand::invalid(invalid, e);
            }
        };

        let x = self.expr(base);
        if x.is_invalid() {
            return Operand::invalid(invalid, e);
        }

        let (field, index, indirect) = match self.ws.lookup_field_or_method(x.ty, false, sel.name) {
            LookupResult::Found { obj, index, indirect } if self.ws.object(obj).is_field() => (obj, index, indirect),
            _ => {
                let msg = format!(
                    "invalid argument: {}.{} is not a field of {}",
                    x.text(),
                    sel.name,
                    self.type_str(x.ty)
                );
                self.invalid_op(sel.span, msg);
                return Operand::invalid(invalid, e);
            }
        };

        if indirect {
            let msg = format!("invalid argument: field {} is embedded via a pointer in {}", sel.name, x.text());
            self.invalid_op(sel.span, msg);
            return Operand::invalid(invalid, e);
        }

        let field_ty = self.ws.obj_type(field);
        let selector = arg.unparen();
        self.record_use(sel.id, field);
        self.record_selection(
            selector.id,
            Selection {
                kind: SelectionKind::FieldVal,
                recv: x.ty,
                obj: field,
                index: index.clone(),
                indirect,
            },
        );
        self.record_type_and_value(selector.id, OperandMode::Variable, field_ty, None);

        // Sum the offsets along the path through embedded fields.
        let mut offset = 0;
        let mut ty = x.ty;
        for i in index {
            let fields = match self.ws.types.get(self.ws.underlying(ty)) {
                Type::Struct(s) => s.fields.clone(),
                _ => break,
            };
            let ws = &*self.ws;
            let offsets = self.conf.with_sizes(|s| s.offsetsof(ws, &fields));
            offset += offsets.get(i).copied().unwrap_or(0);
            ty = fields.get(i).map_or(ty, |f| self.ws.obj_type(*f));
        }

        let uintptr = self.ws.types.basic(BasicKind::Uintptr);
        Operand::constant(uintptr, ConstValue::int(offset), e)
    }
}

/// Reports whether evaluating `e` may call a function or receive from a
/// channel.
fn has_call_or_recv(e: &Expr) -> bool {
    match &e.kind {
        ExprKind::Call { .. } => true,
        ExprKind::Unary { op: UnaryOp::Recv, .. } => true,
        ExprKind::Paren(x) | ExprKind::Star(x) => has_call_or_recv(x),
        ExprKind::Unary { x, .. } => has_call_or_recv(x),
        ExprKind::Binary { x, y, .. } => has_call_or_recv(x) || has_call_or_recv(y),
        ExprKind::Selector { x, .. } => has_call_or_recv(x),
        ExprKind::Index { x, index } => has_call_or_recv(x) || has_call_or_recv(index),
        ExprKind::Slice { x, low, high, max, .. } => {
            has_call_or_recv(x) || [low, high, max].iter().any(|b| b.as_deref().map_or(false, has_call_or_recv))
        }
        ExprKind::TypeAssert { x, .. } => has_call_or_recv(x),
        ExprKind::CompositeLit { elts, .. } => elts.iter().any(has_call_or_recv),
        ExprKind::KeyValue { key, value } => has_call_or_recv(key) || has_call_or_recv(value),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::has_call_or_recv;
    use crate::ast::build::AstBuilder;

    #[test]
    fn array_length_stays_constant_without_effects() {
        let mut b = AstBuilder::new();
        let plain = b.ident("a");
        let zero = b.int(0);
        let indexed = b.index(plain.clone(), zero);
        let f = b.ident("f");
        let call = b.call(f, vec![]);
        let zero = b.int(0);
        let through_call = b.index(call, zero);

        assert!(!has_call_or_recv(&plain));
        assert!(!has_call_or_recv(&indexed));
        assert!(has_call_or_recv(&through_call));
    }
}
