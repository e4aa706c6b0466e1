use super::{
    object::{BuiltinId, Color, FuncInfo, ObjectFlags, ObjectId, ObjectKind},
    package::PackageId,
    scope::{RedeclareMode, ScopeId},
    NewObject, Workspace,
};
use crate::{
    constant::ConstValue,
    span::Span,
    types::{BasicInfo, BasicKind, InterfaceType, NamedType, Signature, Type, TypeId},
};
use ustr::ustr;

/// Handles to the predeclared entities of a workspace.
#[derive(Debug, Clone)]
pub struct Universe {
    pub scope: ScopeId,
    pub unsafe_pkg: PackageId,
    pub iota: ObjectId,
    pub nil: ObjectId,
    pub error_type: TypeId,
}

impl Universe {
    pub(super) fn placeholder() -> Self {
        Self {
            scope: ScopeId::unknown(),
            unsafe_pkg: PackageId::unknown(),
            iota: ObjectId::unknown(),
            nil: ObjectId::unknown(),
            error_type: TypeId::unknown(),
        }
    }

    pub(super) fn build(ws: &mut Workspace) -> Self {
        let scope = ws.new_scope(None, Span::unknown(), "universe");
        ws.universe.scope = scope;

        let define = |ws: &mut Workspace, new: NewObject| -> ObjectId {
            let id = ws.new_object(new);
            if let Err(err) = ws.declare(scope, id, RedeclareMode::Forbid) {
                panic!("duplicate universe object: {:?}", err);
            }
            id
        };

        for kind in BasicKind::ALL {
            let predeclared = !kind.info().contains(BasicInfo::UNTYPED)
                && !matches!(kind, BasicKind::Invalid | BasicKind::UnsafePointer);
            if predeclared {
                let ty = ws.types.basic(kind);
                define(ws, type_name(kind.name(), ty));
            }
        }

        let byte = ws.types.byte();
        define(ws, type_name("byte", byte));
        let rune = ws.types.rune();
        define(ws, type_name("rune", rune));

        let error_type = define_error(ws);

        let untyped_bool = ws.types.basic(BasicKind::UntypedBool);
        for (name, value) in [("true", true), ("false", false)] {
            define(
                ws,
                NewObject::new(
                    ObjectKind::Const(ConstValue::Bool(value)),
                    ustr(name),
                    Span::unknown(),
                    None,
                )
                .with_type(untyped_bool),
            );
        }

        let untyped_int = ws.types.basic(BasicKind::UntypedInt);
        let iota = define(
            ws,
            NewObject::new(
                ObjectKind::Const(ConstValue::int(0)),
                ustr("iota"),
                Span::unknown(),
                None,
            )
            .with_type(untyped_int),
        );

        let untyped_nil = ws.types.basic(BasicKind::UntypedNil);
        let nil = define(
            ws,
            NewObject::new(ObjectKind::Nil, ustr("nil"), Span::unknown(), None).with_type(untyped_nil),
        );

        let invalid = ws.types.invalid();
        for id in BuiltinId::UNIVERSE {
            define(ws, builtin(id, invalid, None));
        }

        let unsafe_pkg = define_unsafe(ws);

        tracing::trace!(objects = ws.scope(scope).len(), "universe built");

        Self {
            scope,
            unsafe_pkg,
            iota,
            nil,
            error_type,
        }
    }
}

fn type_name(name: &str, ty: TypeId) -> NewObject {
    NewObject::new(ObjectKind::TypeName, ustr(name), Span::unknown(), None).with_type(ty)
}

fn builtin(id: BuiltinId, invalid: TypeId, pkg: Option<PackageId>) -> NewObject {
    NewObject::new(ObjectKind::Builtin(id), ustr(id.name()), Span::unknown(), pkg).with_type(invalid)
}

/// `type error interface { Error() string }`
fn define_error(ws: &mut Workspace) -> TypeId {
    let obj = ws.new_object(NewObject::new(
        ObjectKind::TypeName,
        ustr("error"),
        Span::unknown(),
        None,
    ));
    let named = ws.types.insert(Type::Named(NamedType {
        obj,
        underlying: None,
        methods: vec![],
    }));

    let string = ws.types.basic(BasicKind::String);
    let result = ws.new_var(ustr(""), Span::unknown(), None, string, ObjectFlags::IS_PARAM);
    let recv = ws.new_var(ustr(""), Span::unknown(), None, named, ObjectFlags::IS_PARAM);
    let params = ws.types.empty_tuple();
    let results = ws.types.tuple(vec![result]);
    let sig = ws.types.insert(Type::Signature(Signature {
        scope: None,
        recv: Some(recv),
        params,
        results,
        variadic: false,
    }));

    let method = ws.new_object(
        NewObject::new(
            ObjectKind::Func(FuncInfo::default()),
            ustr("Error"),
            Span::unknown(),
            None,
        )
        .with_type(sig),
    );

    let iface = ws.types.insert(Type::Interface(InterfaceType {
        methods: vec![method],
        embeddeds: vec![],
    }));

    if let Type::Named(n) = ws.types.get_mut(named) {
        n.underlying = Some(iface);
    }

    ws.set_obj_type(obj, named);
    ws.object_mut(obj).color = Color::Black;

    let scope = ws.universe.scope;
    if let Err(err) = ws.declare(scope, obj, RedeclareMode::Forbid) {
        panic!("duplicate universe object: {:?}", err);
    }
    named
}

fn define_unsafe(ws: &mut Workspace) -> PackageId {
    let pkg = ws.new_package("unsafe", "unsafe");
    let scope = ws.package(pkg).scope;
    let invalid = ws.types.invalid();

    let pointer = ws.types.basic(BasicKind::UnsafePointer);
    let mut objs = vec![ws.new_object(type_name("Pointer", pointer).with_pkg(pkg))];
    for id in BuiltinId::UNSAFE {
        objs.push(ws.new_object(builtin(id, invalid, Some(pkg))));
    }

    for obj in objs {
        if let Err(err) = ws.declare(scope, obj, RedeclareMode::Forbid) {
            panic!("duplicate unsafe object: {:?}", err);
        }
    }

    ws.package_mut(pkg).complete = true;
    pkg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predeclared_names_resolve() {
        let ws = Workspace::new();
        let scope = ws.universe.scope;

        for name in ["int", "string", "byte", "rune", "error", "true", "nil", "len", "iota"] {
            assert!(ws.lookup(scope, ustr(name)).is_some(), "missing {}", name);
        }
        assert!(ws.lookup(scope, ustr("untyped int")).is_none());
    }

    #[test]
    fn unsafe_is_complete_and_populated() {
        let ws = Workspace::new();
        let pkg = ws.package(ws.universe.unsafe_pkg);
        assert!(pkg.complete);
        assert_eq!(pkg.path.as_str(), "unsafe");
        assert!(ws.pkg_lookup(pkg.id, "Sizeof").is_some());
        assert!(ws.pkg_lookup(pkg.id, "Pointer").is_some());
    }

    #[test]
    fn separate_workspaces_do_not_share_state() {
        let mut a = Workspace::new();
        let b = Workspace::new();
        a.new_package("x", "x");
        assert_eq!(b.packages.len(), a.packages.len() - 1);
    }
}
