use super::{Type, TypeId};
use crate::workspace::{
    object::{ObjectId, ObjectKind},
    Workspace,
};
use std::collections::HashSet;
use ustr::Ustr;

/// The outcome of looking up a field or method.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum LookupResult {
    Found {
        obj: ObjectId,
        /// Field indices walked through embedded fields, ending with the index
        /// of the field or method itself.
        index: Vec<usize>,
        /// A pointer was followed on the way.
        indirect: bool,
    },
    /// The method has a pointer receiver but the operand is neither a pointer
    /// nor addressable.
    PointerRequired { obj: ObjectId },
    /// Several candidates exist at the shallowest depth.
    Ambiguous,
    NotFound,
}

impl LookupResult {
    pub fn obj(&self) -> Option<ObjectId> {
        match self {
            LookupResult::Found { obj, .. } | LookupResult::PointerRequired { obj } => Some(*obj),
            _ => None,
        }
    }
}

struct Embedded {
    ty: TypeId,
    index: Vec<usize>,
    indirect: bool,
    multiples: bool,
}

impl Workspace {
    /// Looks up `name` in the fields and methods of `ty`, following embedded
    /// fields breadth first. Methods with pointer receivers are only found on
    /// pointers or when `addressable` is set.
    pub fn lookup_field_or_method(&self, ty: TypeId, addressable: bool, name: Ustr) -> LookupResult {
        if name == "_" {
            return LookupResult::NotFound;
        }

        let (ty, is_ptr) = self.deref(ty);

        // `*T` where `T` is itself a pointer has no methods or fields.
        if is_ptr && self.deref_ptr_underlying(ty).is_some() {
            return LookupResult::NotFound;
        }

        let mut current = vec![Embedded {
            ty,
            index: vec![],
            indirect: is_ptr,
            multiples: false,
        }];
        let mut seen = HashSet::new();

        while !current.is_empty() {
            let mut next = vec![];
            // (object, index path, indirect, multiples)
            let mut hits: Vec<(ObjectId, Vec<usize>, bool, bool)> = vec![];

            for e in current {
                let mut ty = e.ty;

                if let Type::Named(named) = self.types.get(ty) {
                    if !seen.insert(ty) {
                        continue;
                    }

                    if let Some(i) = named.methods.iter().position(|m| self.object(*m).name == name) {
                        let mut index = e.index.clone();
                        index.push(i);
                        hits.push((named.methods[i], index, e.indirect, e.multiples));
                        continue;
                    }

                    ty = self.underlying(ty);
                }

                match self.types.get(ty) {
                    Type::Struct(s) => {
                        for (i, f) in s.fields.iter().enumerate() {
                            let field = self.object(*f);
                            let mut index = e.index.clone();
                            index.push(i);

                            if field.name == name {
                                hits.push((*f, index, e.indirect, e.multiples));
                                continue;
                            }

                            if field.is_embedded() {
                                let (fty, is_ptr) = self.deref(self.obj_type(*f));
                                next.push(Embedded {
                                    ty: fty,
                                    index,
                                    indirect: e.indirect || is_ptr,
                                    multiples: e.multiples,
                                });
                            }
                        }
                    }
                    Type::Interface(_) => {
                        let methods = self.interface_methods(ty);
                        if let Some(i) = methods.iter().position(|m| self.object(*m).name == name) {
                            let mut index = e.index.clone();
                            index.push(i);
                            hits.push((methods[i], index, e.indirect, e.multiples));
                        }
                    }
                    _ => (),
                }
            }

            let count: usize = hits.iter().map(|h| if h.3 { 2 } else { 1 }).sum();
            if count > 1 {
                return LookupResult::Ambiguous;
            }

            if let Some((obj, index, indirect, _)) = hits.pop() {
                if self.has_pointer_receiver(obj) && !indirect && !addressable {
                    return LookupResult::PointerRequired { obj };
                }
                return LookupResult::Found {
                    obj,
                    index,
                    indirect,
                };
            }

            current = consolidate_multiples(next);
        }

        LookupResult::NotFound
    }

    /// Reports whether `func` is a method declared on `*T`.
    pub fn has_pointer_receiver(&self, func: ObjectId) -> bool {
        let obj = self.object(func);
        if !matches!(obj.kind, ObjectKind::Func(_)) {
            return false;
        }

        match obj.ty.map(|t| self.types.get(t)) {
            Some(Type::Signature(sig)) => match sig.recv {
                Some(recv) => {
                    let recv_ty = self.obj_type(recv);
                    self.deref(recv_ty).1
                }
                None => false,
            },
            _ => false,
        }
    }
}

/// Merges entries for the same type found through different paths at one
/// depth; such an entry can only produce ambiguous results.
fn consolidate_multiples(list: Vec<Embedded>) -> Vec<Embedded> {
    let mut out: Vec<Embedded> = Vec::with_capacity(list.len());

    for e in list {
        match out.iter_mut().find(|o| o.ty == e.ty) {
            Some(existing) => existing.multiples = true,
            None => out.push(e),
        }
    }

    out
}
