use super::{package::PackageId, scope::ScopeId};
use crate::{ast::NodeId, constant::ConstValue, define_id_type, span::Span, types::TypeId};
use bitflags::bitflags;
use enum_as_inner::EnumAsInner;
use ustr::Ustr;

define_id_type!(ObjectId);

#[derive(Debug, PartialEq, Clone, EnumAsInner)]
pub enum ObjectKind {
    /// The value is `Unknown` until the declaration has been checked.
    Const(ConstValue),
    Var,
    Func(FuncInfo),
    TypeName,
    PkgName(PackageId),
    Label,
    Builtin(BuiltinId),
    Nil,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct FuncInfo {
    /// The declaring `FuncDecl`, `None` for methods of imported or interface types.
    pub decl: Option<NodeId>,
}

bitflags! {
    pub struct ObjectFlags: u8 {
        // The object was referred to at least once.
        const USED = 1 << 0;
        // A struct field.
        const IS_FIELD = 1 << 1;
        // An embedded struct field or an embedded interface.
        const EMBEDDED = 1 << 2;
        // A function parameter or result.
        const IS_PARAM = 1 << 3;
        // Declared without an identifier of its own (see `Info::implicits`).
        const IMPLICIT = 1 << 4;
        // A package-level declaration.
        const PKG_LEVEL = 1 << 5;
    }
}

/// The state of an object during lazy declaration checking.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Color {
    White,
    Grey,
    Black,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Object {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub name: Ustr,
    pub span: Span,
    /// `None` for objects of the universe scope.
    pub pkg: Option<PackageId>,
    pub parent: Option<ScopeId>,
    /// Set exactly once, when the declaration has been resolved.
    pub ty: Option<TypeId>,
    /// Declaration order, used to break ties.
    pub order: u32,
    pub color: Color,
    pub flags: ObjectFlags,
}

impl Object {
    pub fn is_used(&self) -> bool {
        self.flags.contains(ObjectFlags::USED)
    }

    pub fn is_field(&self) -> bool {
        self.flags.contains(ObjectFlags::IS_FIELD)
    }

    pub fn is_embedded(&self) -> bool {
        self.flags.contains(ObjectFlags::EMBEDDED)
    }

    pub fn is_pkg_level(&self) -> bool {
        self.flags.contains(ObjectFlags::PKG_LEVEL)
    }

    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }

    pub fn is_exported(&self) -> bool {
        self.name.chars().next().map_or(false, char::is_uppercase)
    }

    pub fn is_var(&self) -> bool {
        matches!(self.kind, ObjectKind::Var)
    }

    pub fn is_type_name(&self) -> bool {
        matches!(self.kind, ObjectKind::TypeName)
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ObjectKind::Const(_) => "const",
            ObjectKind::Var if self.is_field() => "field",
            ObjectKind::Var => "var",
            ObjectKind::Func(_) => "func",
            ObjectKind::TypeName => "type",
            ObjectKind::PkgName(_) => "package",
            ObjectKind::Label => "label",
            ObjectKind::Builtin(_) => "builtin",
            ObjectKind::Nil => "nil",
        }
    }
}

/// Predeclared functions, including those of package `unsafe`.
#[derive(strum_macros::IntoStaticStr, Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum BuiltinId {
    Append,
    Cap,
    Close,
    Copy,
    Delete,
    Len,
    Make,
    New,
    Panic,
    Print,
    Println,
    Recover,
    Alignof,
    Offsetof,
    Sizeof,
}

impl BuiltinId {
    pub const UNIVERSE: [BuiltinId; 12] = [
        BuiltinId::Append,
        BuiltinId::Cap,
        BuiltinId::Close,
        BuiltinId::Copy,
        BuiltinId::Delete,
        BuiltinId::Len,
        BuiltinId::Make,
        BuiltinId::New,
        BuiltinId::Panic,
        BuiltinId::Print,
        BuiltinId::Println,
        BuiltinId::Recover,
    ];

    pub const UNSAFE: [BuiltinId; 3] = [BuiltinId::Alignof, BuiltinId::Offsetof, BuiltinId::Sizeof];

    pub fn name(&self) -> &'static str {
        match self {
            BuiltinId::Append => "append",
            BuiltinId::Cap => "cap",
            BuiltinId::Close => "close",
            BuiltinId::Copy => "copy",
            BuiltinId::Delete => "delete",
            BuiltinId::Len => "len",
            BuiltinId::Make => "make",
            BuiltinId::New => "new",
            BuiltinId::Panic => "panic",
            BuiltinId::Print => "print",
            BuiltinId::Println => "println",
            BuiltinId::Recover => "recover",
            BuiltinId::Alignof => "Alignof",
            BuiltinId::Offsetof => "Offsetof",
            BuiltinId::Sizeof => "Sizeof",
        }
    }

    /// Minimum number of arguments and whether more are accepted.
    pub fn arity(&self) -> (usize, bool) {
        match self {
            BuiltinId::Append => (1, true),
            BuiltinId::Cap | BuiltinId::Len | BuiltinId::Close | BuiltinId::New => (1, false),
            BuiltinId::Copy | BuiltinId::Delete => (2, false),
            BuiltinId::Make => (1, true),
            BuiltinId::Panic => (1, false),
            BuiltinId::Print | BuiltinId::Println => (0, true),
            BuiltinId::Recover => (0, false),
            BuiltinId::Alignof | BuiltinId::Offsetof | BuiltinId::Sizeof => (1, false),
        }
    }

    /// Whether a call may appear as an expression statement.
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            BuiltinId::Close
                | BuiltinId::Copy
                | BuiltinId::Delete
                | BuiltinId::Panic
                | BuiltinId::Print
                | BuiltinId::Println
                | BuiltinId::Recover
        )
    }
}
