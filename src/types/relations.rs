use super::{lookup::LookupResult, BasicInfo, BasicKind, Type, TypeId};
use crate::{
    ast::ChanDir,
    workspace::{
        object::{ObjectId, ObjectKind},
        Workspace,
    },
};

/// The first method an interface requires that a type lacks.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct MissingMethod {
    pub method: ObjectId,
    /// The type has a method of that name, but with a different signature.
    pub wrong_type: bool,
}

impl Workspace {
    /// Reports whether a (non-constant) value of type `v` is assignable to a
    /// variable of type `t`.
    pub fn assignable_to(&self, v: TypeId, t: TypeId) -> bool {
        if self.identical(v, t) {
            return true;
        }

        let (vu, tu) = (self.underlying(v), self.underlying(t));

        if self.is_untyped(v) {
            if let Type::Basic(tb) = self.types.get(tu) {
                let vi = self.basic_info(v);
                if self.is_untyped_nil(v) {
                    return tb.kind == BasicKind::UnsafePointer;
                }
                return (vi.contains(BasicInfo::BOOLEAN) && tb.info.contains(BasicInfo::BOOLEAN))
                    || (vi.intersects(BasicInfo::NUMERIC) && tb.info.intersects(BasicInfo::NUMERIC))
                    || (vi.contains(BasicInfo::STRING) && tb.info.contains(BasicInfo::STRING));
            }
            if self.is_untyped_nil(v) {
                return self.has_nil(t);
            }
            return self.is_interface(t) && self.implements(self.default_type(v), t);
        }

        if self.identical(vu, tu) && (!self.is_named(v) || !self.is_named(t)) {
            return true;
        }

        if self.is_interface(t) {
            return self.implements(v, t);
        }

        // A bidirectional channel may be assigned to a directional one.
        if let (Type::Chan(vc), Type::Chan(tc)) = (self.types.get(vu), self.types.get(tu)) {
            if vc.dir == ChanDir::Both
                && self.identical(vc.elem, tc.elem)
                && (!self.is_named(v) || !self.is_named(t))
            {
                return true;
            }
        }

        false
    }

    /// Reports whether a (non-constant) value of type `v` can be converted to
    /// type `t`.
    pub fn convertible_to(&self, v: TypeId, t: TypeId) -> bool {
        if self.assignable_to(v, t) {
            return true;
        }

        let (vu, tu) = (self.underlying(v), self.underlying(t));

        if self.identical_ignore_tags(vu, tu) {
            return true;
        }

        // Unnamed pointers whose base types have identical underlying types.
        if let (Type::Pointer(vp), Type::Pointer(tp)) = (self.types.get(v), self.types.get(t)) {
            if self.identical_ignore_tags(self.underlying(*vp), self.underlying(*tp)) {
                return true;
            }
        }

        if self.is_numeric(vu) && self.is_numeric(tu) {
            return true;
        }

        if self.is_string(tu) && (self.is_integer(vu) || self.is_bytes_or_runes(vu)) {
            return true;
        }

        if self.is_string(vu) && self.is_bytes_or_runes(tu) {
            return true;
        }

        let unsafe_pointer = |ty: TypeId| self.basic_kind(ty) == Some(BasicKind::UnsafePointer);
        let uintptr = |ty: TypeId| self.basic_kind(ty) == Some(BasicKind::Uintptr);
        let pointer = |ty: TypeId| matches!(self.types.get(ty), Type::Pointer(_));

        if (pointer(vu) || uintptr(vu)) && unsafe_pointer(tu) {
            return true;
        }

        if unsafe_pointer(vu) && (pointer(tu) || uintptr(tu)) {
            return true;
        }

        false
    }

    fn is_bytes_or_runes(&self, ty: TypeId) -> bool {
        match self.types.get(ty) {
            Type::Slice(elem) => matches!(
                self.basic_kind(*elem),
                Some(BasicKind::Uint8) | Some(BasicKind::Int32)
            ),
            _ => false,
        }
    }

    fn identical_ignore_tags(&self, x: TypeId, y: TypeId) -> bool {
        match (self.types.get(x), self.types.get(y)) {
            (Type::Struct(a), Type::Struct(b)) => {
                a.fields.len() == b.fields.len()
                    && a.fields.iter().zip(&b.fields).all(|(f, g)| {
                        let (f, g) = (self.object(*f), self.object(*g));
                        f.name == g.name
                            && f.is_embedded() == g.is_embedded()
                            && self.identical(self.obj_type(f.id), self.obj_type(g.id))
                    })
            }
            _ => self.identical(x, y),
        }
    }

    /// Reports whether `v` has every method of interface `t`.
    pub fn implements(&self, v: TypeId, t: TypeId) -> bool {
        if self.is_invalid(v) || !self.is_interface(t) {
            return false;
        }
        self.missing_method(v, t, true).is_none()
    }

    /// Reports whether a value of interface type `v` may be asserted to have
    /// type `t`.
    pub fn assertable_to(&self, v: TypeId, t: TypeId) -> bool {
        // Any interface may hold a value of another interface type.
        if self.is_interface(t) {
            return true;
        }
        self.missing_method(t, v, false).is_none()
    }

    /// Returns the first method of interface `t` that `v` does not provide.
    /// When `v` is an interface and `is_static` is unset, methods missing from
    /// `v` are tolerated and only conflicting signatures are reported.
    pub fn missing_method(&self, v: TypeId, t: TypeId, is_static: bool) -> Option<MissingMethod> {
        let required = self.interface_methods(t);
        if required.is_empty() {
            return None;
        }

        if self.is_interface(v) {
            let provided = self.interface_methods(v);
            for m in required {
                let name = self.object(m).name;
                match provided.iter().find(|p| self.object(**p).name == name) {
                    None if is_static => {
                        return Some(MissingMethod {
                            method: m,
                            wrong_type: false,
                        })
                    }
                    None => (),
                    Some(p) if !self.identical(self.obj_type(*p), self.obj_type(m)) => {
                        return Some(MissingMethod {
                            method: m,
                            wrong_type: true,
                        })
                    }
                    Some(_) => (),
                }
            }
            return None;
        }

        for m in required {
            let name = self.object(m).name;
            match self.lookup_field_or_method(v, false, name) {
                LookupResult::Found { obj, .. } if matches!(self.object(obj).kind, ObjectKind::Func(_)) => {
                    if !self.identical(self.obj_type(obj), self.obj_type(m)) {
                        return Some(MissingMethod {
                            method: m,
                            wrong_type: true,
                        });
                    }
                }
                _ => {
                    return Some(MissingMethod {
                        method: m,
                        wrong_type: false,
                    })
                }
            }
        }

        None
    }
}
