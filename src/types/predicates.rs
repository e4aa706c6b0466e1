use super::{BasicInfo, BasicKind, Type, TypeId};
use crate::workspace::{object::ObjectId, Workspace};
use indexmap::IndexMap;
use std::collections::HashSet;
use ustr::Ustr;

impl Workspace {
    /// Follows named types to their underlying type. A named type whose
    /// declaration is still being resolved yields the invalid type.
    pub fn underlying(&self, ty: TypeId) -> TypeId {
        let mut current = ty;

        // Chains of named types are short; the bound only guards against
        // malformed input.
        for _ in 0..64 {
            match self.types.get(current) {
                Type::Named(named) => match named.underlying {
                    Some(underlying) => current = underlying,
                    None => return self.types.invalid(),
                },
                _ => return current,
            }
        }

        self.types.invalid()
    }

    pub fn basic_info(&self, ty: TypeId) -> BasicInfo {
        match self.types.get(self.underlying(ty)) {
            Type::Basic(b) => b.info,
            _ => BasicInfo::empty(),
        }
    }

    /// Basic and named types have a name; all other types are literals.
    pub fn is_named(&self, ty: TypeId) -> bool {
        matches!(self.types.get(ty), Type::Basic(_) | Type::Named(_))
    }

    pub fn is_invalid(&self, ty: TypeId) -> bool {
        self.basic_kind(ty) == Some(BasicKind::Invalid)
    }

    pub fn is_untyped(&self, ty: TypeId) -> bool {
        // Untyped types are never named by user declarations.
        matches!(self.types.get(ty), Type::Basic(b) if b.info.contains(BasicInfo::UNTYPED))
    }

    pub fn is_typed(&self, ty: TypeId) -> bool {
        !self.is_untyped(ty)
    }

    pub fn is_boolean(&self, ty: TypeId) -> bool {
        self.basic_info(ty).contains(BasicInfo::BOOLEAN)
    }

    pub fn is_integer(&self, ty: TypeId) -> bool {
        self.basic_info(ty).contains(BasicInfo::INTEGER)
    }

    pub fn is_unsigned(&self, ty: TypeId) -> bool {
        self.basic_info(ty).contains(BasicInfo::UNSIGNED)
    }

    pub fn is_float(&self, ty: TypeId) -> bool {
        self.basic_info(ty).contains(BasicInfo::FLOAT)
    }

    pub fn is_numeric(&self, ty: TypeId) -> bool {
        self.basic_info(ty).intersects(BasicInfo::NUMERIC)
    }

    pub fn is_string(&self, ty: TypeId) -> bool {
        self.basic_info(ty).contains(BasicInfo::STRING)
    }

    pub fn is_ordered(&self, ty: TypeId) -> bool {
        self.basic_info(ty).intersects(BasicInfo::ORDERED)
    }

    pub fn is_const_type(&self, ty: TypeId) -> bool {
        self.basic_info(ty).intersects(BasicInfo::CONST_TYPE)
    }

    pub fn is_interface(&self, ty: TypeId) -> bool {
        matches!(self.types.get(self.underlying(ty)), Type::Interface(_))
    }

    pub fn is_untyped_nil(&self, ty: TypeId) -> bool {
        ty == self.types.basic(BasicKind::UntypedNil)
    }

    /// Reports whether `nil` may be assigned to values of this type.
    pub fn has_nil(&self, ty: TypeId) -> bool {
        match self.types.get(self.underlying(ty)) {
            Type::Basic(b) => b.kind == BasicKind::UnsafePointer,
            Type::Slice(_)
            | Type::Pointer(_)
            | Type::Signature(_)
            | Type::Interface(_)
            | Type::Map(_)
            | Type::Chan(_) => true,
            _ => false,
        }
    }

    pub fn comparable(&self, ty: TypeId) -> bool {
        self.comparable_inner(ty, &mut HashSet::new())
    }

    fn comparable_inner(&self, ty: TypeId, seen: &mut HashSet<TypeId>) -> bool {
        if !seen.insert(ty) {
            return true;
        }

        match self.types.get(self.underlying(ty)) {
            Type::Basic(b) => b.kind != BasicKind::UntypedNil,
            Type::Pointer(_) | Type::Interface(_) | Type::Chan(_) => true,
            Type::Struct(s) => s
                .fields
                .iter()
                .all(|f| self.comparable_inner(self.obj_type(*f), seen)),
            Type::Array(a) => self.comparable_inner(a.elem, seen),
            _ => false,
        }
    }

    /// Strips one unnamed pointer: `*T` gives `(T, true)`.
    pub fn deref(&self, ty: TypeId) -> (TypeId, bool) {
        match self.types.get(ty) {
            Type::Pointer(elem) => (*elem, true),
            _ => (ty, false),
        }
    }

    /// The element type when the underlying type is a pointer.
    pub fn deref_ptr_underlying(&self, ty: TypeId) -> Option<TypeId> {
        match self.types.get(self.underlying(ty)) {
            Type::Pointer(elem) => Some(*elem),
            _ => None,
        }
    }

    /// The type an untyped value takes when its context does not say.
    pub fn default_type(&self, ty: TypeId) -> TypeId {
        match self.types.get(ty) {
            Type::Basic(b) => match b.kind {
                BasicKind::UntypedBool => self.types.basic(BasicKind::Bool),
                BasicKind::UntypedInt => self.types.basic(BasicKind::Int),
                BasicKind::UntypedRune => self.types.rune(),
                BasicKind::UntypedFloat => self.types.basic(BasicKind::Float64),
                BasicKind::UntypedString => self.types.basic(BasicKind::String),
                _ => ty,
            },
            _ => ty,
        }
    }

    /// Every method of an interface, including the ones of embedded
    /// interfaces, ordered by name.
    pub fn interface_methods(&self, ty: TypeId) -> Vec<ObjectId> {
        let mut methods: IndexMap<Ustr, ObjectId> = IndexMap::new();
        self.collect_interface_methods(ty, &mut methods, &mut HashSet::new());
        methods.sort_keys();
        methods.into_values().collect()
    }

    fn collect_interface_methods(
        &self,
        ty: TypeId,
        methods: &mut IndexMap<Ustr, ObjectId>,
        seen: &mut HashSet<TypeId>,
    ) {
        if !seen.insert(ty) {
            return;
        }

        if let Type::Interface(iface) = self.types.get(self.underlying(ty)) {
            for m in &iface.methods {
                methods.entry(self.object(*m).name).or_insert(*m);
            }
            for e in &iface.embeddeds {
                self.collect_interface_methods(*e, methods, seen);
            }
        }
    }

    pub fn is_empty_interface(&self, ty: TypeId) -> bool {
        self.is_interface(ty) && self.interface_methods(ty).is_empty()
    }

    /// Type identity: structural for type literals, nominal for named types.
    pub fn identical(&self, x: TypeId, y: TypeId) -> bool {
        if x == y {
            return true;
        }

        match (self.types.get(x), self.types.get(y)) {
            (Type::Basic(a), Type::Basic(b)) => a.kind == b.kind,
            (Type::Array(a), Type::Array(b)) => a.len == b.len && self.identical(a.elem, b.elem),
            (Type::Slice(a), Type::Slice(b)) => self.identical(*a, *b),
            (Type::Pointer(a), Type::Pointer(b)) => self.identical(*a, *b),
            (Type::Struct(a), Type::Struct(b)) => {
                a.fields.len() == b.fields.len()
                    && a.fields.iter().zip(&b.fields).enumerate().all(|(i, (f, g))| {
                        let (f, g) = (self.object(*f), self.object(*g));
                        f.is_embedded() == g.is_embedded()
                            && a.tag(i) == b.tag(i)
                            && f.name == g.name
                            && self.identical(self.obj_type(f.id), self.obj_type(g.id))
                    })
            }
            (Type::Tuple(a), Type::Tuple(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .zip(b)
                        .all(|(v, w)| self.identical(self.obj_type(*v), self.obj_type(*w)))
            }
            (Type::Signature(a), Type::Signature(b)) => {
                a.variadic == b.variadic
                    && self.identical(a.params, b.params)
                    && self.identical(a.results, b.results)
            }
            (Type::Interface(_), Type::Interface(_)) => {
                let (a, b) = (self.interface_methods(x), self.interface_methods(y));
                a.len() == b.len()
                    && a.iter().zip(&b).all(|(m, n)| {
                        self.object(*m).name == self.object(*n).name
                            && self.identical(self.obj_type(*m), self.obj_type(*n))
                    })
            }
            (Type::Map(a), Type::Map(b)) => {
                self.identical(a.key, b.key) && self.identical(a.elem, b.elem)
            }
            (Type::Chan(a), Type::Chan(b)) => a.dir == b.dir && self.identical(a.elem, b.elem),
            // Distinct named types are never identical.
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::ChanDir,
        span::Span,
        types::{ChanType, MapType, NamedType},
        workspace::{object::ObjectKind, NewObject},
    };
    use ustr::ustr;

    fn sample_types(ws: &mut Workspace) -> Vec<TypeId> {
        let int = ws.types.basic(BasicKind::Int);
        let string = ws.types.basic(BasicKind::String);
        let p1 = ws.types.pointer(int);
        let p2 = ws.types.pointer(int);
        let s = ws.types.slice(string);
        let m = ws.types.insert(Type::Map(MapType { key: string, elem: int }));
        let c = ws.types.insert(Type::Chan(ChanType {
            dir: ChanDir::Both,
            elem: int,
        }));
        let obj = ws.new_object(NewObject::new(ObjectKind::TypeName, ustr("T"), Span::unknown(), None));
        let named = ws.types.insert(Type::Named(NamedType {
            obj,
            underlying: Some(int),
            methods: vec![],
        }));
        vec![int, string, p1, p2, s, m, c, named, ws.types.byte(), ws.types.basic(BasicKind::Uint8)]
    }

    #[test]
    fn identity_is_reflexive_and_symmetric() {
        let mut ws = Workspace::new();
        let types = sample_types(&mut ws);

        for &x in &types {
            assert!(ws.identical(x, x));
            for &y in &types {
                assert_eq!(ws.identical(x, y), ws.identical(y, x));
            }
        }
    }

    #[test]
    fn literals_are_structural_and_names_are_nominal() {
        let mut ws = Workspace::new();
        let types = sample_types(&mut ws);
        let (int, p1, p2, named) = (types[0], types[2], types[3], types[7]);

        assert!(ws.identical(p1, p2));
        assert!(!ws.identical(int, named));
        assert_eq!(ws.underlying(named), int);
        assert!(ws.identical(types[8], types[9]), "byte is an alias for uint8");
    }

    #[test]
    fn unresolved_named_type_has_invalid_underlying() {
        let mut ws = Workspace::new();
        let obj = ws.new_object(NewObject::new(ObjectKind::TypeName, ustr("T"), Span::unknown(), None));
        let named = ws.types.insert(Type::Named(NamedType {
            obj,
            underlying: None,
            methods: vec![],
        }));
        assert!(ws.is_invalid(named));
    }

    #[test]
    fn default_types_of_untyped_kinds() {
        let ws = Workspace::new();
        let t = |k| ws.types.basic(k);
        assert_eq!(ws.default_type(t(BasicKind::UntypedInt)), t(BasicKind::Int));
        assert_eq!(ws.default_type(t(BasicKind::UntypedRune)), ws.types.rune());
        assert_eq!(ws.default_type(t(BasicKind::UntypedFloat)), t(BasicKind::Float64));
        assert_eq!(ws.default_type(t(BasicKind::UntypedNil)), t(BasicKind::UntypedNil));
    }

    #[test]
    fn comparability() {
        let mut ws = Workspace::new();
        let types = sample_types(&mut ws);
        assert!(ws.comparable(types[0]));
        assert!(ws.comparable(types[2]));
        assert!(!ws.comparable(types[4]));
        assert!(!ws.comparable(types[5]));
    }
}
