pub mod object;
pub mod package;
pub mod scope;
pub mod universe;

use crate::{
    common::id_cache::IdCache,
    span::Span,
    types::{BasicKind, Type, TypeCtx, TypeId},
};
use object::{Color, Object, ObjectFlags, ObjectId, ObjectKind};
use package::{Package, PackageId};
use scope::{RedeclareMode, Scope, ScopeId};
use universe::Universe;
use ustr::{ustr, Ustr};

/// Owns every package, scope, object and type of one checking session.
/// Entities refer to each other through ids into these arenas.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub packages: IdCache<PackageId, Package>,
    pub scopes: IdCache<ScopeId, Scope>,
    pub objects: IdCache<ObjectId, Object>,
    pub types: TypeCtx,

    // Predeclared identifiers
    pub universe: Universe,

    next_order: u32,
}

/// Returned by `Workspace::declare` when a name is already bound.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Redeclared {
    pub prev: ObjectId,
}

/// Everything needed to create an object, except its id.
#[derive(Debug, Clone)]
pub struct NewObject {
    pub kind: ObjectKind,
    pub name: Ustr,
    pub span: Span,
    pub pkg: Option<PackageId>,
    pub ty: Option<TypeId>,
    pub flags: ObjectFlags,
}

impl NewObject {
    pub fn new(kind: ObjectKind, name: Ustr, span: Span, pkg: Option<PackageId>) -> Self {
        Self {
            kind,
            name,
            span,
            pkg,
            ty: None,
            flags: ObjectFlags::empty(),
        }
    }

    pub fn with_type(mut self, ty: TypeId) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn with_pkg(mut self, pkg: PackageId) -> Self {
        self.pkg = Some(pkg);
        self
    }

    pub fn with_flags(mut self, flags: ObjectFlags) -> Self {
        self.flags |= flags;
        self
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    /// Creates a workspace holding the universe scope and package `unsafe`.
    pub fn new() -> Self {
        let mut workspace = Self {
            packages: IdCache::new(),
            scopes: IdCache::new(),
            objects: IdCache::new(),
            types: TypeCtx::new(),
            universe: Universe::placeholder(),
            next_order: 0,
        };

        workspace.universe = Universe::build(&mut workspace);
        workspace
    }

    pub fn new_package(&mut self, path: &str, name: &str) -> PackageId {
        let scope = self.new_scope(
            Some(self.universe.scope),
            Span::unknown(),
            &format!("package {:?}", path),
        );

        self.packages.insert_with(|id| Package {
            id,
            path: ustr(path),
            name: ustr(name),
            scope,
            complete: false,
            imports: vec![],
            fake: false,
        })
    }

    pub fn package(&self, id: PackageId) -> &Package {
        &self.packages[id]
    }

    pub fn package_mut(&mut self, id: PackageId) -> &mut Package {
        &mut self.packages[id]
    }

    pub fn new_scope(&mut self, parent: Option<ScopeId>, span: Span, comment: &str) -> ScopeId {
        let id = self.scopes.insert_with(|id| Scope {
            id,
            parent,
            children: vec![],
            elems: Default::default(),
            span,
            comment: ustr(comment),
            is_func: false,
        });

        if let Some(parent) = parent {
            self.scopes[parent].children.push(id);
        }

        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id]
    }

    pub fn new_object(&mut self, new: NewObject) -> ObjectId {
        let order = self.next_order;
        self.next_order += 1;

        self.objects.insert_with(|id| Object {
            id,
            kind: new.kind,
            name: new.name,
            span: new.span,
            pkg: new.pkg,
            parent: None,
            ty: new.ty,
            order,
            color: if new.ty.is_some() {
                Color::Black
            } else {
                Color::White
            },
            flags: new.flags,
        })
    }

    pub fn object(&self, id: ObjectId) -> &Object {
        &self.objects[id]
    }

    pub fn object_mut(&mut self, id: ObjectId) -> &mut Object {
        &mut self.objects[id]
    }

    /// The resolved type of an object, or the invalid type.
    pub fn obj_type(&self, id: ObjectId) -> TypeId {
        self.objects[id].ty.unwrap_or_else(|| self.types.invalid())
    }

    /// Sets the type of an object that has none yet.
    pub fn set_obj_type(&mut self, id: ObjectId, ty: TypeId) {
        let obj = &mut self.objects[id];
        if obj.ty.is_none() {
            obj.ty = Some(ty);
        } else {
            tracing::trace!(name = %obj.name, "object type already set");
        }
    }

    pub fn mark_used(&mut self, id: ObjectId) {
        self.objects[id].flags.insert(ObjectFlags::USED);
    }

    pub fn lookup(&self, scope: ScopeId, name: Ustr) -> Option<ObjectId> {
        self.scopes[scope].lookup(name)
    }

    /// Walks outward from `scope` and returns the innermost binding of `name`
    /// together with the scope holding it.
    pub fn lookup_parent(&self, scope: ScopeId, name: Ustr) -> Option<(ScopeId, ObjectId)> {
        let mut current = Some(scope);

        while let Some(id) = current {
            let scope = &self.scopes[id];
            if let Some(obj) = scope.lookup(name) {
                return Some((id, obj));
            }
            current = scope.parent;
        }

        None
    }

    /// Binds `obj` in `scope`. Blank names are never bound. With
    /// `RedeclareMode::Allow` an existing binding is displaced and returned.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        obj: ObjectId,
        mode: RedeclareMode,
    ) -> Result<Option<ObjectId>, Redeclared> {
        let name = self.objects[obj].name;

        if name == "_" {
            self.objects[obj].parent.get_or_insert(scope);
            return Ok(None);
        }

        let displaced = match (self.scopes[scope].insert(name, obj), mode) {
            (None, _) => None,
            (Some(prev), RedeclareMode::Forbid) => return Err(Redeclared { prev }),
            (Some(_), RedeclareMode::Allow) => self.scopes[scope].replace(name, obj),
        };

        self.objects[obj].parent.get_or_insert(scope);

        Ok(displaced)
    }

    /// The package's scope-level binding of `name`.
    pub fn pkg_lookup(&self, pkg: PackageId, name: &str) -> Option<ObjectId> {
        self.lookup(self.packages[pkg].scope, ustr(name))
    }

    /// A new `Var` with a resolved type, as used for parameters and results.
    pub fn new_var(
        &mut self,
        name: Ustr,
        span: Span,
        pkg: Option<PackageId>,
        ty: TypeId,
        flags: ObjectFlags,
    ) -> ObjectId {
        self.new_object(
            NewObject::new(ObjectKind::Var, name, span, pkg)
                .with_type(ty)
                .with_flags(flags),
        )
    }

    /// The variables of a tuple type.
    pub fn tuple_vars(&self, tuple: TypeId) -> &[ObjectId] {
        match self.types.get(tuple) {
            Type::Tuple(vars) => vars,
            _ => &[],
        }
    }

    pub fn tuple_len(&self, tuple: TypeId) -> usize {
        self.tuple_vars(tuple).len()
    }

    pub fn basic_kind(&self, ty: TypeId) -> Option<BasicKind> {
        match self.types.get(self.underlying(ty)) {
            Type::Basic(b) => Some(b.kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(ws: &mut Workspace, name: &str) -> ObjectId {
        let ty = ws.types.basic(BasicKind::Int);
        ws.new_var(ustr(name), Span::unknown(), None, ty, ObjectFlags::empty())
    }

    #[test]
    fn lookup_is_idempotent() {
        let mut ws = Workspace::new();
        let pkg = ws.new_package("p", "p");
        let scope = ws.package(pkg).scope;
        let x = var(&mut ws, "x");
        ws.declare(scope, x, RedeclareMode::Forbid).unwrap();

        for _ in 0..3 {
            assert_eq!(ws.lookup(scope, ustr("x")), Some(x));
        }
        assert_eq!(ws.object(x).parent, Some(scope));
    }

    #[test]
    fn redeclaration_is_gated_by_mode() {
        let mut ws = Workspace::new();
        let pkg = ws.new_package("p", "p");
        let scope = ws.package(pkg).scope;
        let first = var(&mut ws, "a");
        let second = var(&mut ws, "a");

        ws.declare(scope, first, RedeclareMode::Forbid).unwrap();
        assert_eq!(
            ws.declare(scope, second, RedeclareMode::Forbid),
            Err(Redeclared { prev: first })
        );
        assert_eq!(ws.lookup(scope, ustr("a")), Some(first));

        assert_eq!(ws.declare(scope, second, RedeclareMode::Allow), Ok(Some(first)));
        assert_eq!(ws.lookup(scope, ustr("a")), Some(second));
        assert_eq!(ws.scope(scope).len(), 1);
    }

    #[test]
    fn inner_scopes_shadow_outer_ones() {
        let mut ws = Workspace::new();
        let pkg = ws.new_package("p", "p");
        let outer = ws.package(pkg).scope;
        let inner = ws.new_scope(Some(outer), Span::unknown(), "block");
        let a = var(&mut ws, "x");
        let b = var(&mut ws, "x");
        ws.declare(outer, a, RedeclareMode::Forbid).unwrap();
        ws.declare(inner, b, RedeclareMode::Forbid).unwrap();

        assert_eq!(ws.lookup_parent(inner, ustr("x")), Some((inner, b)));
        assert_eq!(ws.lookup_parent(outer, ustr("x")), Some((outer, a)));
        let universe_int = ws.lookup_parent(inner, ustr("int")).map(|(s, _)| s);
        assert_eq!(universe_int, Some(ws.universe.scope));
    }

    #[test]
    fn blank_names_are_not_bound() {
        let mut ws = Workspace::new();
        let pkg = ws.new_package("p", "p");
        let scope = ws.package(pkg).scope;
        let a = var(&mut ws, "_");
        let b = var(&mut ws, "_");
        ws.declare(scope, a, RedeclareMode::Forbid).unwrap();
        ws.declare(scope, b, RedeclareMode::Forbid).unwrap();
        assert!(ws.scope(scope).is_empty());
    }
}
