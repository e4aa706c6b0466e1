use super::{ChanDir, Expr, ExprKind, FieldList, FuncType};
use itertools::Itertools;

/// Formats an expression in source form, for use in error messages.
pub fn expr_string(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr);
    out
}

fn write_expr(out: &mut String, expr: &Expr) {
    match &expr.kind {
        ExprKind::Bad => out.push_str("BadExpr"),
        ExprKind::Ident(name) => out.push_str(name),
        ExprKind::BasicLit(lit) => out.push_str(&lit.value),
        ExprKind::CompositeLit { ty, elts } => {
            if let Some(ty) = ty {
                write_expr(out, ty);
            }
            out.push('{');
            write_list(out, elts);
            out.push('}');
        }
        ExprKind::FuncLit { ty, .. } => {
            write_func_type(out, "func", ty);
            out.push_str(" {…}");
        }
        ExprKind::Paren(x) => {
            out.push('(');
            write_expr(out, x);
            out.push(')');
        }
        ExprKind::Selector { x, sel } => {
            write_expr(out, x);
            out.push('.');
            out.push_str(&sel.name);
        }
        ExprKind::Index { x, index } => {
            write_expr(out, x);
            out.push('[');
            write_expr(out, index);
            out.push(']');
        }
        ExprKind::Slice {
            x,
            low,
            high,
            max,
            slice3,
        } => {
            write_expr(out, x);
            out.push('[');
            if let Some(low) = low {
                write_expr(out, low);
            }
            out.push(':');
            if let Some(high) = high {
                write_expr(out, high);
            }
            if *slice3 {
                out.push(':');
                if let Some(max) = max {
                    write_expr(out, max);
                }
            }
            out.push(']');
        }
        ExprKind::TypeAssert { x, ty } => {
            write_expr(out, x);
            out.push_str(".(");
            match ty {
                Some(ty) => write_expr(out, ty),
                None => out.push_str("type"),
            }
            out.push(')');
        }
        ExprKind::Call {
            fun,
            args,
            has_ellipsis,
        } => {
            write_expr(out, fun);
            out.push('(');
            write_list(out, args);
            if *has_ellipsis {
                out.push_str("...");
            }
            out.push(')');
        }
        ExprKind::Star(x) => {
            out.push('*');
            write_expr(out, x);
        }
        ExprKind::Unary { op, x } => {
            out.push_str(&op.to_string());
            write_expr(out, x);
        }
        ExprKind::Binary { op, x, y } => {
            write_expr(out, x);
            out.push_str(&format!(" {} ", op));
            write_expr(out, y);
        }
        ExprKind::KeyValue { key, value } => {
            write_expr(out, key);
            out.push_str(": ");
            write_expr(out, value);
        }
        ExprKind::Ellipsis(elem) => {
            out.push_str("...");
            if let Some(elem) = elem {
                write_expr(out, elem);
            }
        }
        ExprKind::ArrayType { len, elem } => {
            out.push('[');
            if let Some(len) = len {
                write_expr(out, len);
            }
            out.push(']');
            write_expr(out, elem);
        }
        ExprKind::StructType(fields) => {
            out.push_str("struct{");
            write_fields(out, fields, "; ");
            out.push('}');
        }
        ExprKind::FuncType(ty) => write_func_type(out, "func", ty),
        ExprKind::InterfaceType(methods) => {
            out.push_str("interface{");
            let parts = methods
                .fields
                .iter()
                .map(|m| match (&m.names[..], &m.ty.kind) {
                    ([name], ExprKind::FuncType(ty)) => {
                        let mut s = String::new();
                        write_func_type(&mut s, &name.name, ty);
                        s
                    }
                    _ => expr_string(&m.ty),
                })
                .join("; ");
            out.push_str(&parts);
            out.push('}');
        }
        ExprKind::MapType { key, value } => {
            out.push_str("map[");
            write_expr(out, key);
            out.push(']');
            write_expr(out, value);
        }
        ExprKind::ChanType { dir, value } => {
            out.push_str(match dir {
                ChanDir::Both => "chan ",
                ChanDir::Send => "chan<- ",
                ChanDir::Recv => "<-chan ",
            });
            write_expr(out, value);
        }
    }
}

fn write_list(out: &mut String, exprs: &[Expr]) {
    out.push_str(&exprs.iter().map(expr_string).join(", "));
}

fn write_fields(out: &mut String, list: &FieldList, sep: &str) {
    let parts = list
        .fields
        .iter()
        .map(|f| {
            if f.names.is_empty() {
                expr_string(&f.ty)
            } else {
                format!(
                    "{} {}",
                    f.names.iter().map(|n| n.name.as_str()).join(", "),
                    expr_string(&f.ty)
                )
            }
        })
        .join(sep);
    out.push_str(&parts);
}

fn write_func_type(out: &mut String, prefix: &str, ty: &FuncType) {
    out.push_str(prefix);
    out.push('(');
    write_fields(out, &ty.params, ", ");
    out.push(')');

    if let Some(results) = &ty.results {
        match &results.fields[..] {
            [single] if single.names.is_empty() => {
                out.push(' ');
                write_expr(out, &single.ty);
            }
            _ => {
                out.push_str(" (");
                write_fields(out, results, ", ");
                out.push(')');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{build::AstBuilder, BinaryOp};

    #[test]
    fn formats_nested_expressions() {
        let mut b = AstBuilder::new();
        let x = b.ident("x");
        let one = b.int(1);
        let sum = b.binary(BinaryOp::Add, x, one);
        let f = b.qualified("fmt", "Println");
        let call = b.call(f, vec![sum]);
        assert_eq!(expr_string(&call), "fmt.Println(x + 1)");

        let int = b.ident("int");
        let string = b.ident("string");
        let slice = b.slice_type(int);
        let map = b.map_type(string, slice);
        assert_eq!(expr_string(&map), "map[string][]int");
    }
}
