//! Results of type checking, filled in as the checker goes. Each table is only
//! populated when the caller opted in by setting it to `Some`.

use crate::{
    ast::{display::expr_string, Expr, NodeId},
    constant::ConstValue,
    types::{BasicKind, TypeId},
    workspace::{object::ObjectId, scope::ScopeId, Workspace},
};
use itertools::Itertools;
use std::collections::HashMap;
use ustr::Ustr;

/// How an expression may be used.
#[derive(strum_macros::IntoStaticStr, Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum OperandMode {
    Invalid,
    /// A call without results.
    NoValue,
    Builtin,
    TypeExpr,
    Constant,
    /// An addressable value.
    Variable,
    /// The result of indexing a map.
    MapIndex,
    Value,
    /// A value that may be used on the lhs of a comma-ok assignment.
    CommaOk,
}

#[derive(Debug, PartialEq, Clone)]
pub struct TypeAndValue {
    pub mode: OperandMode,
    pub ty: TypeId,
    /// Set only in `OperandMode::Constant`.
    pub value: Option<ConstValue>,
}

impl TypeAndValue {
    pub fn is_void(&self) -> bool {
        self.mode == OperandMode::NoValue
    }

    pub fn is_type(&self) -> bool {
        self.mode == OperandMode::TypeExpr
    }

    pub fn is_builtin(&self) -> bool {
        self.mode == OperandMode::Builtin
    }

    pub fn is_value(&self) -> bool {
        matches!(
            self.mode,
            OperandMode::Constant
                | OperandMode::Variable
                | OperandMode::MapIndex
                | OperandMode::Value
                | OperandMode::CommaOk
        )
    }

    pub fn is_nil(&self) -> bool {
        self.mode == OperandMode::Value && self.ty == TypeId::from(BasicKind::UntypedNil as usize)
    }

    pub fn addressable(&self) -> bool {
        self.mode == OperandMode::Variable
    }

    pub fn assignable(&self) -> bool {
        matches!(self.mode, OperandMode::Variable | OperandMode::MapIndex)
    }

    pub fn has_ok(&self) -> bool {
        matches!(self.mode, OperandMode::CommaOk | OperandMode::MapIndex)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SelectionKind {
    /// `x.f` is a struct field.
    FieldVal,
    /// `x.f` is a method bound to `x`.
    MethodVal,
    /// `T.f` is a method expression.
    MethodExpr,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Selection {
    pub kind: SelectionKind,
    pub recv: TypeId,
    pub obj: ObjectId,
    /// Embedded field indices walked to reach `obj`, ending with its own index.
    pub index: Vec<usize>,
    /// A pointer indirection was needed.
    pub indirect: bool,
}

/// `var lhs... = rhs` at package level.
#[derive(Debug, PartialEq, Clone)]
pub struct Initializer {
    pub lhs: Vec<ObjectId>,
    pub rhs: Expr,
}

impl Initializer {
    pub fn display(&self, ws: &Workspace) -> String {
        format!(
            "{} = {}",
            self.lhs.iter().map(|v| ws.object(*v).name).join(", "),
            expr_string(&self.rhs)
        )
    }
}

/// The latest declaration of a package-level name.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct DeclSite {
    pub node: NodeId,
    pub scope: ScopeId,
    pub obj: ObjectId,
}

/// An entry of the incremental edit log: something a batch introduced that a
/// consumer has to replay.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct NewCode {
    /// The declared object, `None` for standalone statements.
    pub obj: Option<ObjectId>,
    pub scope: ScopeId,
    pub node: NodeId,
    /// A bare expression statement rather than a declaration.
    pub is_expr: bool,
    pub is_pkg_scope: bool,
    /// The binding this declaration displaced, if it was a redeclaration.
    pub replaced: Option<ObjectId>,
}

#[derive(Debug, Default, Clone)]
pub struct Info {
    pub types: Option<HashMap<NodeId, TypeAndValue>>,
    /// Identifiers that declare an object. Package clause names and the
    /// symbolic variable of a type switch map to `None`.
    pub defs: Option<HashMap<NodeId, Option<ObjectId>>>,
    pub uses: Option<HashMap<NodeId, ObjectId>>,
    /// Objects without an identifier of their own: `PkgName`s of imports
    /// without rename, type switch case variables and anonymous parameters.
    pub implicits: Option<HashMap<NodeId, ObjectId>>,
    /// Selector expressions other than qualified identifiers.
    pub selections: Option<HashMap<NodeId, Selection>>,
    pub scopes: Option<HashMap<NodeId, ScopeId>>,
    pub name2node: Option<HashMap<Ustr, DeclSite>>,
    pub init_order: Option<Vec<Initializer>>,
    pub new_code: Option<Vec<NewCode>>,
}

impl Info {
    /// An `Info` with every table enabled.
    pub fn all() -> Self {
        Self {
            types: Some(Default::default()),
            defs: Some(Default::default()),
            uses: Some(Default::default()),
            implicits: Some(Default::default()),
            selections: Some(Default::default()),
            scopes: Some(Default::default()),
            name2node: Some(Default::default()),
            init_order: Some(Default::default()),
            new_code: Some(Default::default()),
        }
    }

    /// The type of an expression, falling back to the type of the object an
    /// identifier denotes.
    pub fn type_of(&self, ws: &Workspace, expr: &Expr) -> Option<TypeId> {
        if let Some(tv) = self.types.as_ref().and_then(|t| t.get(&expr.id)) {
            return Some(tv.ty);
        }

        expr.as_ident()
            .and_then(|ident| self.object_of(ident.id))
            .and_then(|obj| ws.object(obj).ty)
    }

    /// The object an identifier declares or denotes.
    pub fn object_of(&self, ident: NodeId) -> Option<ObjectId> {
        self.defs
            .as_ref()
            .and_then(|defs| defs.get(&ident).copied().flatten())
            .or_else(|| self.uses.as_ref().and_then(|uses| uses.get(&ident).copied()))
    }

    pub fn type_and_value(&self, node: NodeId) -> Option<&TypeAndValue> {
        self.types.as_ref().and_then(|t| t.get(&node))
    }

    pub fn init_order(&self) -> &[Initializer] {
        self.init_order.as_deref().unwrap_or(&[])
    }

    pub fn new_code(&self) -> &[NewCode] {
        self.new_code.as_deref().unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_follow_mode() {
        let tv = |mode| TypeAndValue {
            mode,
            ty: TypeId::from(BasicKind::Int as usize),
            value: None,
        };

        assert!(tv(OperandMode::NoValue).is_void());
        assert!(tv(OperandMode::TypeExpr).is_type());
        assert!(tv(OperandMode::Builtin).is_builtin());
        assert!(!tv(OperandMode::Builtin).is_value());
        assert!(tv(OperandMode::Variable).addressable());
        assert!(tv(OperandMode::MapIndex).assignable());
        assert!(tv(OperandMode::MapIndex).has_ok());
        assert!(!tv(OperandMode::Value).has_ok());
        assert!(!tv(OperandMode::Value).is_nil());

        let nil = TypeAndValue {
            mode: OperandMode::Value,
            ty: TypeId::from(BasicKind::UntypedNil as usize),
            value: None,
        };
        assert!(nil.is_nil());
    }
}
