use super::object::ObjectId;
use crate::{define_id_type, span::Span};
use indexmap::IndexMap;
use ustr::Ustr;

define_id_type!(ScopeId);

/// A lexical scope. Elements keep their declaration order.
#[derive(Debug, PartialEq, Clone)]
pub struct Scope {
    pub id: ScopeId,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    pub elems: IndexMap<Ustr, ObjectId>,
    pub span: Span,
    pub comment: Ustr,
    /// Function scopes end the search for labels and local shadowing rules.
    pub is_func: bool,
}

/// Whether `Workspace::declare` may displace an existing binding.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedeclareMode {
    Forbid,
    Allow,
}

impl Scope {
    pub fn lookup(&self, name: Ustr) -> Option<ObjectId> {
        self.elems.get(&name).copied()
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = Ustr> + '_ {
        self.elems.keys().copied()
    }

    /// Inserts `obj` unless the name is taken, in which case the existing
    /// object is returned and the scope is left unchanged.
    pub fn insert(&mut self, name: Ustr, obj: ObjectId) -> Option<ObjectId> {
        match self.elems.get(&name) {
            Some(existing) => Some(*existing),
            None => {
                self.elems.insert(name, obj);
                None
            }
        }
    }

    /// Binds `name` to `obj`, returning the displaced object. The name keeps
    /// its original position in the declaration order.
    pub fn replace(&mut self, name: Ustr, obj: ObjectId) -> Option<ObjectId> {
        self.elems.insert(name, obj)
    }
}
