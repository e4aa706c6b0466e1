use super::{Type, TypeId};
use crate::{
    ast::ChanDir,
    workspace::{object::ObjectId, package::PackageId, Workspace},
};
use itertools::Itertools;
use std::collections::HashSet;

pub trait DisplayTy {
    fn display(&self, ws: &Workspace) -> String;
}

impl DisplayTy for TypeId {
    fn display(&self, ws: &Workspace) -> String {
        ws.type_string(*self, None)
    }
}

impl Workspace {
    /// Formats a type the way it would be written in source. Named types of
    /// packages other than `current` are qualified with their package name.
    pub fn type_string(&self, ty: TypeId, current: Option<PackageId>) -> String {
        let mut seen = HashSet::new();
        self.write_type(ty, current, &mut seen)
    }

    fn write_type(&self, ty: TypeId, current: Option<PackageId>, seen: &mut HashSet<TypeId>) -> String {
        match self.types.get(ty) {
            Type::Basic(b) => b.name.to_string(),
            Type::Array(a) => format!("[{}]{}", a.len, self.write_type(a.elem, current, seen)),
            Type::Slice(elem) => format!("[]{}", self.write_type(*elem, current, seen)),
            Type::Pointer(elem) => format!("*{}", self.write_type(*elem, current, seen)),
            Type::Struct(s) => format!(
                "struct{{{}}}",
                s.fields
                    .iter()
                    .enumerate()
                    .map(|(i, f)| {
                        let field = self.object(*f);
                        let ty = self.write_type(self.obj_type(*f), current, seen);
                        let decl = if field.is_embedded() {
                            ty
                        } else {
                            format!("{} {}", field.name, ty)
                        };
                        match s.tag(i) {
                            Some(tag) => format!("{} {:?}", decl, tag.as_str()),
                            None => decl,
                        }
                    })
                    .join("; ")
            ),
            Type::Tuple(vars) => format!("({})", self.write_vars(vars, false, current, seen)),
            Type::Signature(sig) => {
                let params = self.write_vars(self.tuple_vars(sig.params), sig.variadic, current, seen);
                let results = self.tuple_vars(sig.results);
                let results = match results {
                    [] => String::new(),
                    [single] if self.object(*single).name.is_empty() => {
                        format!(" {}", self.write_type(self.obj_type(*single), current, seen))
                    }
                    _ => format!(" ({})", self.write_vars(results, false, current, seen)),
                };
                format!("func({}){}", params, results)
            }
            Type::Interface(iface) => {
                if !seen.insert(ty) {
                    return "interface{...}".to_string();
                }
                let mut parts = iface
                    .methods
                    .iter()
                    .map(|m| {
                        let sig = self.write_type(self.obj_type(*m), current, seen);
                        format!("{}{}", self.object(*m).name, sig.trim_start_matches("func"))
                    })
                    .collect::<Vec<_>>();
                parts.extend(iface.embeddeds.iter().map(|e| self.write_type(*e, current, seen)));
                seen.remove(&ty);
                format!("interface{{{}}}", parts.join("; "))
            }
            Type::Map(m) => format!(
                "map[{}]{}",
                self.write_type(m.key, current, seen),
                self.write_type(m.elem, current, seen)
            ),
            Type::Chan(c) => {
                let prefix = match c.dir {
                    ChanDir::Both => "chan ",
                    ChanDir::Send => "chan<- ",
                    ChanDir::Recv => "<-chan ",
                };
                format!("{}{}", prefix, self.write_type(c.elem, current, seen))
            }
            Type::Named(named) => {
                let obj = self.object(named.obj);
                match obj.pkg {
                    Some(pkg) if Some(pkg) != current => {
                        format!("{}.{}", self.package(pkg).name, obj.name)
                    }
                    _ => obj.name.to_string(),
                }
            }
        }
    }

    fn write_vars(
        &self,
        vars: &[ObjectId],
        variadic: bool,
        current: Option<PackageId>,
        seen: &mut HashSet<TypeId>,
    ) -> String {
        vars.iter()
            .enumerate()
            .map(|(i, v)| {
                let var = self.object(*v);
                let mut ty = self.obj_type(*v);
                let mut prefix = "";

                if variadic && i == vars.len() - 1 {
                    if let Type::Slice(elem) = self.types.get(ty) {
                        ty = *elem;
                        prefix = "...";
                    }
                }

                let ty = format!("{}{}", prefix, self.write_type(ty, current, seen));
                if var.name.is_empty() {
                    ty
                } else {
                    format!("{} {}", var.name, ty)
                }
            })
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BasicKind, MapType};

    #[test]
    fn formats_type_literals() {
        let mut ws = Workspace::new();
        let int = ws.types.basic(BasicKind::Int);
        let string = ws.types.basic(BasicKind::String);
        let ptr = ws.types.pointer(int);
        let slice = ws.types.slice(ptr);
        let map = ws.types.insert(Type::Map(MapType {
            key: string,
            elem: slice,
        }));

        assert_eq!(map.display(&ws), "map[string][]*int");
        assert_eq!(ws.types.basic(BasicKind::UntypedFloat).display(&ws), "untyped float");
        assert_eq!(ws.universe.error_type.display(&ws), "error");
    }
}
