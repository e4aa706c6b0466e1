//! Programmatic construction of syntax trees, for hosts that produce trees
//! without a parser and for tests. Every node gets a fresh `NodeId`; one
//! builder should be used for all files handed to the same checker.

use super::*;
use crate::span::{FileId, Span};
use ustr::ustr;

#[derive(Debug, Default)]
pub struct AstBuilder {
    next_id: usize,
    file_id: FileId,
    offset: usize,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes built from now on get spans inside `file_id`.
    pub fn set_file(&mut self, file_id: FileId) -> &mut Self {
        self.file_id = file_id;
        self.offset = 0;
        self
    }

    pub fn node_id(&mut self) -> NodeId {
        let id = NodeId::from(self.next_id);
        self.next_id += 1;
        id
    }

    /// A one byte span, distinct from every span handed out before in the
    /// same file.
    pub fn span(&mut self) -> Span {
        let span = Span::new(self.file_id, self.offset, self.offset + 1);
        self.offset += 1;
        span
    }

    fn expr(&mut self, kind: ExprKind) -> Expr {
        Expr {
            id: self.node_id(),
            kind,
            span: self.span(),
        }
    }

    fn stmt(&mut self, kind: StmtKind) -> Stmt {
        Stmt {
            id: self.node_id(),
            kind,
            span: self.span(),
        }
    }

    // Files and declarations

    pub fn file(&mut self, path: &str, package: &str, items: Vec<Item>) -> File {
        let package_name = self.name(package);
        File {
            id: self.node_id(),
            path: ustr(path),
            package_name,
            items,
            span: self.span(),
        }
    }

    pub fn name(&mut self, name: &str) -> Ident {
        Ident {
            id: self.node_id(),
            name: ustr(name),
            span: self.span(),
        }
    }

    pub fn gen_decl(&mut self, specs: Vec<Spec>) -> Item {
        Item::Decl(Decl::Gen(self.gen_decl_raw(specs)))
    }

    pub fn gen_decl_raw(&mut self, specs: Vec<Spec>) -> GenDecl {
        GenDecl {
            id: self.node_id(),
            specs,
            span: self.span(),
        }
    }

    /// `import "path"`
    pub fn import(&mut self, path: &str) -> Item {
        let spec = self.import_spec(None, path);
        self.gen_decl(vec![spec])
    }

    /// `import name "path"`
    pub fn import_as(&mut self, name: &str, path: &str) -> Item {
        let spec = self.import_spec(Some(name), path);
        self.gen_decl(vec![spec])
    }

    pub fn import_spec(&mut self, name: Option<&str>, path: &str) -> Spec {
        let name = name.map(|n| self.name(n));
        Spec::Import(ImportSpec {
            id: self.node_id(),
            name,
            path: ustr(path),
            span: self.span(),
        })
    }

    pub fn value_spec(&mut self, kind: ValueKind, names: &[&str], ty: Option<Expr>, values: Vec<Expr>) -> Spec {
        let names = names.iter().map(|n| self.name(n)).collect();
        Spec::Value(ValueSpec {
            id: self.node_id(),
            kind,
            names,
            ty,
            values,
            span: self.span(),
        })
    }

    /// `var names [ty] [= values]`
    pub fn var(&mut self, names: &[&str], ty: Option<Expr>, values: Vec<Expr>) -> Item {
        let spec = self.value_spec(ValueKind::Var, names, ty, values);
        self.gen_decl(vec![spec])
    }

    /// `const names [ty] = values`
    pub fn const_(&mut self, names: &[&str], ty: Option<Expr>, values: Vec<Expr>) -> Item {
        let spec = self.value_spec(ValueKind::Const, names, ty, values);
        self.gen_decl(vec![spec])
    }

    pub fn type_spec(&mut self, name: &str, is_alias: bool, ty: Expr) -> Spec {
        let name = self.name(name);
        Spec::Type(TypeSpec {
            id: self.node_id(),
            name,
            is_alias,
            ty,
            span: self.span(),
        })
    }

    /// `type name ty`
    pub fn type_(&mut self, name: &str, ty: Expr) -> Item {
        let spec = self.type_spec(name, false, ty);
        self.gen_decl(vec![spec])
    }

    /// `type name = ty`
    pub fn alias(&mut self, name: &str, ty: Expr) -> Item {
        let spec = self.type_spec(name, true, ty);
        self.gen_decl(vec![spec])
    }

    /// `func name(params) results { body }`
    pub fn func(&mut self, name: &str, ty: FuncType, body: Option<Block>) -> Item {
        Item::Decl(Decl::Func(self.func_decl(None, name, ty, body)))
    }

    /// `func (recv) name(params) results { body }`
    pub fn method(&mut self, recv: Field, name: &str, ty: FuncType, body: Option<Block>) -> Item {
        let recv = self.field_list(vec![recv]);
        Item::Decl(Decl::Func(self.func_decl(Some(recv), name, ty, body)))
    }

    fn func_decl(&mut self, recv: Option<FieldList>, name: &str, ty: FuncType, body: Option<Block>) -> FuncDecl {
        let name = self.name(name);
        FuncDecl {
            id: self.node_id(),
            recv,
            name,
            ty,
            body,
            span: self.span(),
        }
    }

    pub fn stmt_item(&mut self, stmt: Stmt) -> Item {
        Item::Stmt(stmt)
    }

    // Fields and signatures

    pub fn field(&mut self, names: &[&str], ty: Expr) -> Field {
        let names = names.iter().map(|n| self.name(n)).collect();
        Field {
            id: self.node_id(),
            names,
            ty,
            tag: None,
            span: self.span(),
        }
    }

    pub fn tagged_field(&mut self, names: &[&str], ty: Expr, tag: &str) -> Field {
        let mut field = self.field(names, ty);
        field.tag = Some(ustr(tag));
        field
    }

    pub fn field_list(&mut self, fields: Vec<Field>) -> FieldList {
        FieldList {
            id: self.node_id(),
            fields,
            span: self.span(),
        }
    }

    pub fn func_type(&mut self, params: Vec<Field>, results: Vec<Field>) -> FuncType {
        let params = self.field_list(params);
        let results = if results.is_empty() {
            None
        } else {
            Some(self.field_list(results))
        };
        FuncType {
            id: self.node_id(),
            params,
            results,
            span: self.span(),
        }
    }

    // Expressions

    pub fn ident(&mut self, name: &str) -> Expr {
        self.expr(ExprKind::Ident(ustr(name)))
    }

    pub fn lit(&mut self, kind: LitKind, raw: &str) -> Expr {
        self.expr(ExprKind::BasicLit(BasicLit {
            kind,
            value: ustr(raw),
        }))
    }

    pub fn int(&mut self, value: i128) -> Expr {
        self.lit(LitKind::Int, &value.to_string())
    }

    pub fn float(&mut self, raw: &str) -> Expr {
        self.lit(LitKind::Float, raw)
    }

    pub fn string(&mut self, value: &str) -> Expr {
        self.lit(LitKind::String, &format!("{:?}", value))
    }

    pub fn char(&mut self, value: char) -> Expr {
        let raw = match value {
            '\'' => "'\\''".to_string(),
            '\\' => "'\\\\'".to_string(),
            '\n' => "'\\n'".to_string(),
            c => format!("'{}'", c),
        };
        self.lit(LitKind::Char, &raw)
    }

    pub fn paren(&mut self, x: Expr) -> Expr {
        self.expr(ExprKind::Paren(Box::new(x)))
    }

    pub fn binary(&mut self, op: BinaryOp, x: Expr, y: Expr) -> Expr {
        self.expr(ExprKind::Binary {
            op,
            x: Box::new(x),
            y: Box::new(y),
        })
    }

    pub fn unary(&mut self, op: UnaryOp, x: Expr) -> Expr {
        self.expr(ExprKind::Unary { op, x: Box::new(x) })
    }

    pub fn star(&mut self, x: Expr) -> Expr {
        self.expr(ExprKind::Star(Box::new(x)))
    }

    pub fn call(&mut self, fun: Expr, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Call {
            fun: Box::new(fun),
            args,
            has_ellipsis: false,
        })
    }

    /// `fun(args...)`
    pub fn call_spread(&mut self, fun: Expr, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Call {
            fun: Box::new(fun),
            args,
            has_ellipsis: true,
        })
    }

    pub fn selector(&mut self, x: Expr, sel: &str) -> Expr {
        let sel = self.name(sel);
        self.expr(ExprKind::Selector { x: Box::new(x), sel })
    }

    /// `pkg.name`
    pub fn qualified(&mut self, pkg: &str, name: &str) -> Expr {
        let x = self.ident(pkg);
        self.selector(x, name)
    }

    pub fn index(&mut self, x: Expr, index: Expr) -> Expr {
        self.expr(ExprKind::Index {
            x: Box::new(x),
            index: Box::new(index),
        })
    }

    pub fn slice_expr(&mut self, x: Expr, low: Option<Expr>, high: Option<Expr>) -> Expr {
        self.expr(ExprKind::Slice {
            x: Box::new(x),
            low: low.map(Box::new),
            high: high.map(Box::new),
            max: None,
            slice3: false,
        })
    }

    pub fn type_assert(&mut self, x: Expr, ty: Option<Expr>) -> Expr {
        self.expr(ExprKind::TypeAssert {
            x: Box::new(x),
            ty: ty.map(Box::new),
        })
    }

    pub fn composite(&mut self, ty: Option<Expr>, elts: Vec<Expr>) -> Expr {
        self.expr(ExprKind::CompositeLit {
            ty: ty.map(Box::new),
            elts,
        })
    }

    pub fn key_value(&mut self, key: Expr, value: Expr) -> Expr {
        self.expr(ExprKind::KeyValue {
            key: Box::new(key),
            value: Box::new(value),
        })
    }

    pub fn func_lit(&mut self, ty: FuncType, body: Block) -> Expr {
        self.expr(ExprKind::FuncLit { ty, body })
    }

    // Type expressions

    pub fn array_type(&mut self, len: Expr, elem: Expr) -> Expr {
        self.expr(ExprKind::ArrayType {
            len: Some(Box::new(len)),
            elem: Box::new(elem),
        })
    }

    pub fn slice_type(&mut self, elem: Expr) -> Expr {
        self.expr(ExprKind::ArrayType {
            len: None,
            elem: Box::new(elem),
        })
    }

    pub fn ellipsis(&mut self, elem: Option<Expr>) -> Expr {
        self.expr(ExprKind::Ellipsis(elem.map(Box::new)))
    }

    pub fn map_type(&mut self, key: Expr, value: Expr) -> Expr {
        self.expr(ExprKind::MapType {
            key: Box::new(key),
            value: Box::new(value),
        })
    }

    pub fn chan_type(&mut self, dir: ChanDir, value: Expr) -> Expr {
        self.expr(ExprKind::ChanType {
            dir,
            value: Box::new(value),
        })
    }

    pub fn struct_type(&mut self, fields: Vec<Field>) -> Expr {
        let fields = self.field_list(fields);
        self.expr(ExprKind::StructType(fields))
    }

    /// Method fields carry a `FuncType` expression, embedded interfaces have
    /// no names.
    pub fn interface_type(&mut self, methods: Vec<Field>) -> Expr {
        let methods = self.field_list(methods);
        self.expr(ExprKind::InterfaceType(methods))
    }

    pub fn func_type_expr(&mut self, ty: FuncType) -> Expr {
        self.expr(ExprKind::FuncType(ty))
    }

    // Statements

    pub fn block(&mut self, stmts: Vec<Stmt>) -> Block {
        Block {
            id: self.node_id(),
            stmts,
            span: self.span(),
        }
    }

    pub fn expr_stmt(&mut self, x: Expr) -> Stmt {
        self.stmt(StmtKind::Expr(x))
    }

    pub fn decl_stmt(&mut self, specs: Vec<Spec>) -> Stmt {
        let decl = self.gen_decl_raw(specs);
        self.stmt(StmtKind::Decl(decl))
    }

    pub fn assign(&mut self, lhs: Vec<Expr>, op: AssignOp, rhs: Vec<Expr>) -> Stmt {
        self.stmt(StmtKind::Assign { lhs, op, rhs })
    }

    /// `names := values`
    pub fn define(&mut self, names: &[&str], rhs: Vec<Expr>) -> Stmt {
        let lhs = names.iter().map(|n| self.ident(n)).collect();
        self.assign(lhs, AssignOp::Define, rhs)
    }

    pub fn inc_dec(&mut self, x: Expr, inc: bool) -> Stmt {
        self.stmt(StmtKind::IncDec { x, inc })
    }

    pub fn send(&mut self, chan: Expr, value: Expr) -> Stmt {
        self.stmt(StmtKind::Send { chan, value })
    }

    pub fn ret(&mut self, results: Vec<Expr>) -> Stmt {
        self.stmt(StmtKind::Return(results))
    }

    pub fn go(&mut self, call: Expr) -> Stmt {
        self.stmt(StmtKind::Go(call))
    }

    pub fn defer(&mut self, call: Expr) -> Stmt {
        self.stmt(StmtKind::Defer(call))
    }

    pub fn branch(&mut self, kind: BranchKind, label: Option<&str>) -> Stmt {
        let label = label.map(|l| self.name(l));
        self.stmt(StmtKind::Branch { kind, label })
    }

    pub fn labeled(&mut self, label: &str, stmt: Stmt) -> Stmt {
        let label = self.name(label);
        self.stmt(StmtKind::Labeled {
            label,
            stmt: Box::new(stmt),
        })
    }

    pub fn block_stmt(&mut self, stmts: Vec<Stmt>) -> Stmt {
        let block = self.block(stmts);
        self.stmt(StmtKind::Block(block))
    }

    pub fn if_(&mut self, init: Option<Stmt>, cond: Expr, then: Block, els: Option<Stmt>) -> Stmt {
        self.stmt(StmtKind::If {
            init: init.map(Box::new),
            cond,
            then,
            els: els.map(Box::new),
        })
    }

    pub fn for_(&mut self, init: Option<Stmt>, cond: Option<Expr>, post: Option<Stmt>, body: Block) -> Stmt {
        self.stmt(StmtKind::For {
            init: init.map(Box::new),
            cond,
            post: post.map(Box::new),
            body,
        })
    }

    pub fn range(&mut self, key: Option<Expr>, value: Option<Expr>, define: bool, x: Expr, body: Block) -> Stmt {
        self.stmt(StmtKind::Range {
            key,
            value,
            define,
            x,
            body,
        })
    }

    pub fn case(&mut self, list: Option<Vec<Expr>>, body: Vec<Stmt>) -> CaseClause {
        CaseClause {
            id: self.node_id(),
            list,
            body,
            span: self.span(),
        }
    }

    pub fn switch(&mut self, init: Option<Stmt>, tag: Option<Expr>, body: Vec<CaseClause>) -> Stmt {
        self.stmt(StmtKind::Switch {
            init: init.map(Box::new),
            tag,
            body,
        })
    }

    /// `switch [bind :=] x.(type) { body }`
    pub fn type_switch(&mut self, bind: Option<&str>, x: Expr, body: Vec<CaseClause>) -> Stmt {
        let guard = self.type_assert(x, None);
        let assign = match bind {
            Some(name) => self.define(&[name], vec![guard]),
            None => self.expr_stmt(guard),
        };
        self.stmt(StmtKind::TypeSwitch {
            init: None,
            assign: Box::new(assign),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_unique() {
        let mut b = AstBuilder::new();
        let x = b.ident("x");
        let one = b.int(1);
        let sum = b.binary(BinaryOp::Add, x.clone(), one.clone());
        assert_ne!(x.id, one.id);
        assert_ne!(sum.id, x.id);
        assert_ne!(x.span, one.span);
    }

    #[test]
    fn string_literals_are_quoted() {
        let mut b = AstBuilder::new();
        let s = b.string("a\"b");
        match s.kind {
            ExprKind::BasicLit(lit) => assert_eq!(lit.value.as_str(), "\"a\\\"b\""),
            _ => panic!("expected a literal"),
        }
    }
}
