pub mod display;
pub mod lookup;
pub mod predicates;
pub mod relations;
pub mod sizes;

use crate::{
    ast::ChanDir,
    common::id_cache::IdCache,
    define_id_type,
    workspace::{object::ObjectId, scope::ScopeId},
};
use bitflags::bitflags;
use enum_as_inner::EnumAsInner;
use ustr::Ustr;

define_id_type!(TypeId);

#[derive(Debug, PartialEq, Clone, EnumAsInner)]
pub enum Type {
    Basic(BasicType),
    Array(ArrayType),
    Slice(TypeId),
    Struct(StructType),
    Pointer(TypeId),
    /// Parameter and result lists, and the type of multi-valued expressions.
    Tuple(Vec<ObjectId>),
    Signature(Signature),
    Interface(InterfaceType),
    Map(MapType),
    Chan(ChanType),
    Named(NamedType),
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub enum BasicKind {
    Invalid,

    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    String,
    UnsafePointer,

    UntypedBool,
    UntypedInt,
    UntypedRune,
    UntypedFloat,
    UntypedString,
    UntypedNil,
}

impl BasicKind {
    pub const ALL: [BasicKind; 23] = [
        BasicKind::Invalid,
        BasicKind::Bool,
        BasicKind::Int,
        BasicKind::Int8,
        BasicKind::Int16,
        BasicKind::Int32,
        BasicKind::Int64,
        BasicKind::Uint,
        BasicKind::Uint8,
        BasicKind::Uint16,
        BasicKind::Uint32,
        BasicKind::Uint64,
        BasicKind::Uintptr,
        BasicKind::Float32,
        BasicKind::Float64,
        BasicKind::String,
        BasicKind::UnsafePointer,
        BasicKind::UntypedBool,
        BasicKind::UntypedInt,
        BasicKind::UntypedRune,
        BasicKind::UntypedFloat,
        BasicKind::UntypedString,
        BasicKind::UntypedNil,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BasicKind::Invalid => "invalid type",
            BasicKind::Bool => "bool",
            BasicKind::Int => "int",
            BasicKind::Int8 => "int8",
            BasicKind::Int16 => "int16",
            BasicKind::Int32 => "int32",
            BasicKind::Int64 => "int64",
            BasicKind::Uint => "uint",
            BasicKind::Uint8 => "uint8",
            BasicKind::Uint16 => "uint16",
            BasicKind::Uint32 => "uint32",
            BasicKind::Uint64 => "uint64",
            BasicKind::Uintptr => "uintptr",
            BasicKind::Float32 => "float32",
            BasicKind::Float64 => "float64",
            BasicKind::String => "string",
            BasicKind::UnsafePointer => "Pointer",
            BasicKind::UntypedBool => "untyped bool",
            BasicKind::UntypedInt => "untyped int",
            BasicKind::UntypedRune => "untyped rune",
            BasicKind::UntypedFloat => "untyped float",
            BasicKind::UntypedString => "untyped string",
            BasicKind::UntypedNil => "untyped nil",
        }
    }

    pub fn info(&self) -> BasicInfo {
        use BasicKind::*;
        match self {
            Invalid | UnsafePointer => BasicInfo::empty(),
            Bool => BasicInfo::BOOLEAN,
            Int | Int8 | Int16 | Int32 | Int64 => BasicInfo::INTEGER,
            Uint | Uint8 | Uint16 | Uint32 | Uint64 | Uintptr => {
                BasicInfo::INTEGER | BasicInfo::UNSIGNED
            }
            Float32 | Float64 => BasicInfo::FLOAT,
            String => BasicInfo::STRING,
            UntypedBool => BasicInfo::BOOLEAN | BasicInfo::UNTYPED,
            UntypedInt | UntypedRune => BasicInfo::INTEGER | BasicInfo::UNTYPED,
            UntypedFloat => BasicInfo::FLOAT | BasicInfo::UNTYPED,
            UntypedString => BasicInfo::STRING | BasicInfo::UNTYPED,
            UntypedNil => BasicInfo::UNTYPED,
        }
    }

    /// Size in bytes of fixed-size kinds, `None` for word-sized ones.
    pub fn fixed_size(&self) -> Option<i64> {
        use BasicKind::*;
        match self {
            Bool | Int8 | Uint8 => Some(1),
            Int16 | Uint16 => Some(2),
            Int32 | Uint32 | Float32 => Some(4),
            Int64 | Uint64 | Float64 => Some(8),
            _ => None,
        }
    }
}

bitflags! {
    pub struct BasicInfo: u8 {
        const BOOLEAN = 1 << 0;
        const INTEGER = 1 << 1;
        const UNSIGNED = 1 << 2;
        const FLOAT = 1 << 3;
        const STRING = 1 << 4;
        const UNTYPED = 1 << 5;

        const ORDERED = Self::INTEGER.bits | Self::FLOAT.bits | Self::STRING.bits;
        const NUMERIC = Self::INTEGER.bits | Self::FLOAT.bits;
        const CONST_TYPE = Self::BOOLEAN.bits | Self::NUMERIC.bits | Self::STRING.bits;
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct BasicType {
    pub kind: BasicKind,
    pub info: BasicInfo,
    /// `byte` and `rune` are distinct entries that share a kind.
    pub name: &'static str,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ArrayType {
    pub elem: TypeId,
    pub len: i64,
}

#[derive(Debug, PartialEq, Clone)]
pub struct StructType {
    /// Field variables, in declaration order.
    pub fields: Vec<ObjectId>,
    pub tags: Vec<Option<Ustr>>,
}

impl StructType {
    pub fn tag(&self, index: usize) -> Option<Ustr> {
        self.tags.get(index).copied().flatten()
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Signature {
    /// The function scope, holding parameters and results.
    pub scope: Option<ScopeId>,
    pub recv: Option<ObjectId>,
    /// Both are `Type::Tuple`s.
    pub params: TypeId,
    pub results: TypeId,
    /// The last parameter is a `...T` parameter, typed `[]T`.
    pub variadic: bool,
}

#[derive(Debug, PartialEq, Clone)]
pub struct InterfaceType {
    /// Explicitly declared methods.
    pub methods: Vec<ObjectId>,
    /// Embedded interfaces, which may be named.
    pub embeddeds: Vec<TypeId>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct MapType {
    pub key: TypeId,
    pub elem: TypeId,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ChanType {
    pub dir: ChanDir,
    pub elem: TypeId,
}

#[derive(Debug, PartialEq, Clone)]
pub struct NamedType {
    pub obj: ObjectId,
    /// Unset while the declaration is being resolved.
    pub underlying: Option<TypeId>,
    pub methods: Vec<ObjectId>,
}

/// The type arena. Basic types are inserted first, in `BasicKind` order, so
/// their ids are fixed.
#[derive(Debug, Clone)]
pub struct TypeCtx {
    types: IdCache<TypeId, Type>,
    byte: TypeId,
    rune: TypeId,
    empty_tuple: TypeId,
}

impl Default for TypeCtx {
    fn default() -> Self {
        let mut types = IdCache::new();

        for kind in BasicKind::ALL {
            types.insert(Type::Basic(BasicType {
                kind,
                info: kind.info(),
                name: kind.name(),
            }));
        }

        let byte = types.insert(Type::Basic(BasicType {
            kind: BasicKind::Uint8,
            info: BasicKind::Uint8.info(),
            name: "byte",
        }));

        let rune = types.insert(Type::Basic(BasicType {
            kind: BasicKind::Int32,
            info: BasicKind::Int32.info(),
            name: "rune",
        }));

        let empty_tuple = types.insert(Type::Tuple(vec![]));

        Self {
            types,
            byte,
            rune,
            empty_tuple,
        }
    }
}

impl TypeCtx {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn insert(&mut self, ty: Type) -> TypeId {
        self.types.insert(ty)
    }

    #[inline]
    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id]
    }

    #[inline]
    pub fn get_mut(&mut self, id: TypeId) -> &mut Type {
        &mut self.types[id]
    }

    #[inline]
    pub fn basic(&self, kind: BasicKind) -> TypeId {
        TypeId::from(kind as usize)
    }

    #[inline]
    pub fn invalid(&self) -> TypeId {
        self.basic(BasicKind::Invalid)
    }

    #[inline]
    pub fn byte(&self) -> TypeId {
        self.byte
    }

    #[inline]
    pub fn rune(&self) -> TypeId {
        self.rune
    }

    #[inline]
    pub fn empty_tuple(&self) -> TypeId {
        self.empty_tuple
    }

    pub fn tuple(&mut self, vars: Vec<ObjectId>) -> TypeId {
        if vars.is_empty() {
            self.empty_tuple
        } else {
            self.insert(Type::Tuple(vars))
        }
    }

    pub fn pointer(&mut self, elem: TypeId) -> TypeId {
        self.insert(Type::Pointer(elem))
    }

    pub fn slice(&mut self, elem: TypeId) -> TypeId {
        self.insert(Type::Slice(elem))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_ids_are_stable() {
        let tcx = TypeCtx::new();
        for kind in BasicKind::ALL {
            let ty = tcx.get(tcx.basic(kind)).as_basic().map(|b| b.kind);
            assert_eq!(ty, Some(kind));
        }
        assert_eq!(tcx.get(tcx.byte()).as_basic().map(|b| b.name), Some("byte"));
    }

    #[test]
    fn untyped_kinds_carry_the_untyped_flag() {
        assert!(BasicKind::UntypedRune.info().contains(BasicInfo::INTEGER | BasicInfo::UNTYPED));
        assert!(!BasicKind::Int.info().contains(BasicInfo::UNTYPED));
        assert!(BasicKind::Uintptr.info().contains(BasicInfo::UNSIGNED));
    }
}
