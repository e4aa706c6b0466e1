//! The syntax tree consumed by the checker. Trees are produced by an external
//! parser (or by `AstBuilder`); every node that the checker may record
//! information about carries a `NodeId` that is unique across all files handed
//! to one checker.

pub mod build;
pub mod display;

use crate::{define_id_type, span::Span};
use enum_as_inner::EnumAsInner;
use std::fmt::{self, Display};
use ustr::Ustr;

define_id_type!(NodeId);

#[derive(Debug, PartialEq, Clone)]
pub struct File {
    pub id: NodeId,
    /// Path of the file, used to compute the importing directory.
    pub path: Ustr,
    pub package_name: Ident,
    pub items: Vec<Item>,
    pub span: Span,
}

/// A top-level item. Statements at the top level are only accepted in
/// incremental mode.
#[derive(Debug, PartialEq, Clone, EnumAsInner)]
pub enum Item {
    Decl(Decl),
    Stmt(Stmt),
}

#[derive(Debug, PartialEq, Clone, EnumAsInner)]
pub enum Decl {
    Gen(GenDecl),
    Func(FuncDecl),
}

#[derive(Debug, PartialEq, Clone)]
pub struct GenDecl {
    pub id: NodeId,
    pub specs: Vec<Spec>,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone, EnumAsInner)]
pub enum Spec {
    Import(ImportSpec),
    Value(ValueSpec),
    Type(TypeSpec),
}

#[derive(Debug, PartialEq, Clone)]
pub struct ImportSpec {
    pub id: NodeId,
    /// `None` for a plain import, `_` for a blank import and `.` for a dot import.
    pub name: Option<Ident>,
    pub path: Ustr,
    pub span: Span,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ValueKind {
    Const,
    Var,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ValueSpec {
    pub id: NodeId,
    pub kind: ValueKind,
    pub names: Vec<Ident>,
    pub ty: Option<Expr>,
    pub values: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone)]
pub struct TypeSpec {
    pub id: NodeId,
    pub name: Ident,
    /// `type A = B`
    pub is_alias: bool,
    pub ty: Expr,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone)]
pub struct FuncDecl {
    pub id: NodeId,
    pub recv: Option<FieldList>,
    pub name: Ident,
    pub ty: FuncType,
    pub body: Option<Block>,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Ident {
    pub id: NodeId,
    pub name: Ustr,
    pub span: Span,
}

impl Ident {
    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Field {
    pub id: NodeId,
    /// Empty for anonymous parameters and embedded fields.
    pub names: Vec<Ident>,
    pub ty: Expr,
    pub tag: Option<Ustr>,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone)]
pub struct FieldList {
    pub id: NodeId,
    pub fields: Vec<Field>,
    pub span: Span,
}

impl FieldList {
    pub fn num_fields(&self) -> usize {
        self.fields.iter().map(|f| f.names.len().max(1)).sum()
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct FuncType {
    pub id: NodeId,
    pub params: FieldList,
    pub results: Option<FieldList>,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Block {
    pub id: NodeId,
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone, EnumAsInner)]
pub enum ExprKind {
    Bad,
    /// The identifier's own id is the id of the expression.
    Ident(Ustr),
    BasicLit(BasicLit),
    CompositeLit {
        ty: Option<Box<Expr>>,
        elts: Vec<Expr>,
    },
    FuncLit {
        ty: FuncType,
        body: Block,
    },
    Paren(Box<Expr>),
    Selector {
        x: Box<Expr>,
        sel: Ident,
    },
    Index {
        x: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        x: Box<Expr>,
        low: Option<Box<Expr>>,
        high: Option<Box<Expr>>,
        max: Option<Box<Expr>>,
        slice3: bool,
    },
    /// `x.(T)`, or `x.(type)` in a type switch header when `ty` is `None`.
    TypeAssert {
        x: Box<Expr>,
        ty: Option<Box<Expr>>,
    },
    Call {
        fun: Box<Expr>,
        args: Vec<Expr>,
        has_ellipsis: bool,
    },
    /// `*x`: a dereference or a pointer type.
    Star(Box<Expr>),
    Unary {
        op: UnaryOp,
        x: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        x: Box<Expr>,
        y: Box<Expr>,
    },
    KeyValue {
        key: Box<Expr>,
        value: Box<Expr>,
    },
    /// `...T` in a parameter list, or `[...]T` array length when `None`.
    Ellipsis(Option<Box<Expr>>),
    ArrayType {
        /// `None` for slice types.
        len: Option<Box<Expr>>,
        elem: Box<Expr>,
    },
    StructType(FieldList),
    FuncType(FuncType),
    InterfaceType(FieldList),
    MapType {
        key: Box<Expr>,
        value: Box<Expr>,
    },
    ChanType {
        dir: ChanDir,
        value: Box<Expr>,
    },
}

impl Expr {
    pub fn as_ident(&self) -> Option<Ident> {
        match &self.kind {
            ExprKind::Ident(name) => Some(Ident {
                id: self.id,
                name: *name,
                span: self.span,
            }),
            _ => None,
        }
    }

    /// Strips any number of enclosing parentheses.
    pub fn unparen(&self) -> &Expr {
        match &self.kind {
            ExprKind::Paren(inner) => inner.unparen(),
            _ => self,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct BasicLit {
    pub kind: LitKind,
    /// The literal exactly as written, including quotes.
    pub value: Ustr,
}

#[derive(strum_macros::IntoStaticStr, Debug, PartialEq, Eq, Clone, Copy)]
pub enum LitKind {
    Int,
    Float,
    Char,
    String,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, PartialEq, Clone, EnumAsInner)]
pub enum StmtKind {
    Bad,
    Decl(GenDecl),
    Empty,
    Labeled {
        label: Ident,
        stmt: Box<Stmt>,
    },
    Expr(Expr),
    Send {
        chan: Expr,
        value: Expr,
    },
    IncDec {
        x: Expr,
        inc: bool,
    },
    Assign {
        lhs: Vec<Expr>,
        op: AssignOp,
        rhs: Vec<Expr>,
    },
    Go(Expr),
    Defer(Expr),
    Return(Vec<Expr>),
    Branch {
        kind: BranchKind,
        label: Option<Ident>,
    },
    Block(Block),
    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        then: Block,
        els: Option<Box<Stmt>>,
    },
    Switch {
        init: Option<Box<Stmt>>,
        tag: Option<Expr>,
        body: Vec<CaseClause>,
    },
    /// `switch [init;] [x :=] y.(type) { ... }`; `assign` is either an
    /// expression statement or a `:=` assignment whose rhs is a type assertion
    /// without a type.
    TypeSwitch {
        init: Option<Box<Stmt>>,
        assign: Box<Stmt>,
        body: Vec<CaseClause>,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
    },
    Range {
        key: Option<Expr>,
        value: Option<Expr>,
        define: bool,
        x: Expr,
        body: Block,
    },
}

#[derive(Debug, PartialEq, Clone)]
pub struct CaseClause {
    pub id: NodeId,
    /// `None` for the default clause.
    pub list: Option<Vec<Expr>>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AssignOp {
    /// `=`
    Assign,
    /// `:=`
    Define,
    /// `op=`
    Op(BinaryOp),
}

#[derive(strum_macros::IntoStaticStr, Debug, PartialEq, Eq, Clone, Copy)]
pub enum BranchKind {
    Break,
    Continue,
    Goto,
    Fallthrough,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    AndNot,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_shift(&self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr)
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use BinaryOp::*;
        write!(
            f,
            "{}",
            match self {
                Add => "+",
                Sub => "-",
                Mul => "*",
                Div => "/",
                Rem => "%",
                Eq => "==",
                Ne => "!=",
                Lt => "<",
                Le => "<=",
                Gt => ">",
                Ge => ">=",
                And => "&&",
                Or => "||",
                Shl => "<<",
                Shr => ">>",
                BitAnd => "&",
                BitOr => "|",
                BitXor => "^",
                AndNot => "&^",
            }
        )
    }
}

#[derive(strum_macros::IntoStaticStr, Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum UnaryOp {
    Plus,
    Neg,
    Not,
    BitNot,
    Ref,
    Recv,
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                UnaryOp::Plus => "+",
                UnaryOp::Neg => "-",
                UnaryOp::Not => "!",
                UnaryOp::BitNot => "^",
                UnaryOp::Ref => "&",
                UnaryOp::Recv => "<-",
            }
        )
    }
}
