use super::{BasicKind, Type, TypeId};
use crate::workspace::{object::ObjectId, Workspace};

/// Memory layout of types, as needed by `unsafe.Sizeof` and friends.
pub trait Sizes {
    fn alignof(&self, ws: &Workspace, ty: TypeId) -> i64;
    fn offsetsof(&self, ws: &Workspace, fields: &[ObjectId]) -> Vec<i64>;
    fn sizeof(&self, ws: &Workspace, ty: TypeId) -> i64;
    fn word_size(&self) -> i64;
}

/// Sizes for a target with the given word size and maximum alignment, both
/// in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StdSizes {
    pub word_size: i64,
    pub max_align: i64,
}

impl Default for StdSizes {
    fn default() -> Self {
        Self::for_arch("amd64").unwrap_or(Self {
            word_size: 8,
            max_align: 8,
        })
    }
}

impl StdSizes {
    pub fn for_arch(arch: &str) -> Option<Self> {
        let (word_size, max_align) = match arch {
            "386" | "arm" | "mips" | "mipsle" => (4, 4),
            "amd64" | "arm64" | "mips64" | "mips64le" | "ppc64" | "ppc64le" | "s390x" => (8, 8),
            "amd64p32" => (4, 8),
            "wasm" => (8, 8),
            _ => return None,
        };

        Some(Self {
            word_size,
            max_align,
        })
    }
}

fn align(x: i64, a: i64) -> i64 {
    let y = x + a - 1;
    y - y % a
}

impl Sizes for StdSizes {
    fn alignof(&self, ws: &Workspace, ty: TypeId) -> i64 {
        match ws.types.get(ws.underlying(ty)) {
            Type::Array(a) => return self.alignof(ws, a.elem),
            Type::Struct(s) => {
                return s
                    .fields
                    .iter()
                    .map(|f| self.alignof(ws, ws.obj_type(*f)))
                    .max()
                    .unwrap_or(1)
                    .max(1)
            }
            Type::Slice(_) | Type::Interface(_) => return self.word_size,
            Type::Basic(b) if b.kind == BasicKind::String => return self.word_size,
            _ => (),
        }

        self.sizeof(ws, ty).clamp(1, self.max_align)
    }

    fn offsetsof(&self, ws: &Workspace, fields: &[ObjectId]) -> Vec<i64> {
        let mut offsets = Vec::with_capacity(fields.len());
        let mut offset = 0;

        for f in fields {
            let ty = ws.obj_type(*f);
            offset = align(offset, self.alignof(ws, ty));
            offsets.push(offset);
            offset += self.sizeof(ws, ty);
        }

        offsets
    }

    fn sizeof(&self, ws: &Workspace, ty: TypeId) -> i64 {
        match ws.types.get(ws.underlying(ty)) {
            Type::Basic(b) => match b.kind.fixed_size() {
                Some(size) => size,
                None if b.kind == BasicKind::String => self.word_size * 2,
                None => self.word_size,
            },
            Type::Array(a) => {
                if a.len <= 0 {
                    return 0;
                }
                let elem_align = self.alignof(ws, a.elem);
                let elem_size = self.sizeof(ws, a.elem);
                align(elem_size, elem_align) * (a.len - 1) + elem_size
            }
            Type::Slice(_) => self.word_size * 3,
            Type::Struct(s) => match s.fields.last() {
                None => 0,
                Some(last) => {
                    let offsets = self.offsetsof(ws, &s.fields);
                    offsets[offsets.len() - 1] + self.sizeof(ws, ws.obj_type(*last))
                }
            },
            Type::Interface(_) => self.word_size * 2,
            _ => self.word_size,
        }
    }

    fn word_size(&self) -> i64 {
        self.word_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        span::Span,
        types::{ArrayType, StructType},
        workspace::object::ObjectFlags,
    };
    use ustr::ustr;

    #[test]
    fn basic_sizes_follow_word_size() {
        let ws = Workspace::new();
        let sizes = StdSizes::default();
        assert_eq!(sizes.sizeof(&ws, ws.types.basic(BasicKind::Int)), 8);
        assert_eq!(sizes.sizeof(&ws, ws.types.basic(BasicKind::String)), 16);
        assert_eq!(sizes.sizeof(&ws, ws.types.basic(BasicKind::Int16)), 2);

        let small = StdSizes::for_arch("386").unwrap();
        assert_eq!(small.sizeof(&ws, ws.types.basic(BasicKind::Int)), 4);
        assert!(StdSizes::for_arch("z80").is_none());
    }

    #[test]
    fn struct_layout_pads_fields() {
        let mut ws = Workspace::new();
        let sizes = StdSizes::default();
        let int8 = ws.types.basic(BasicKind::Int8);
        let int64 = ws.types.basic(BasicKind::Int64);
        let a = ws.new_var(ustr("a"), Span::unknown(), None, int8, ObjectFlags::IS_FIELD);
        let b = ws.new_var(ustr("b"), Span::unknown(), None, int64, ObjectFlags::IS_FIELD);
        let s = ws.types.insert(Type::Struct(StructType {
            fields: vec![a, b],
            tags: vec![None, None],
        }));

        assert_eq!(sizes.offsetsof(&ws, &[a, b]), vec![0, 8]);
        assert_eq!(sizes.sizeof(&ws, s), 16);
        assert_eq!(sizes.alignof(&ws, s), 8);

        let arr = ws.types.insert(Type::Array(ArrayType { elem: s, len: 3 }));
        assert_eq!(sizes.sizeof(&ws, arr), 48);
    }
}
