//! The native type universe.
//!
//! A closed set of variants describing C and Objective-C types as reported by
//! header indexing. Aggregate declarations (records, enums, typedefs, ObjC
//! classes and protocols) live in the [`NativeIndex`](crate::index::NativeIndex)
//! and are referenced here by id, so self-referential declarations need no
//! reference cycles.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of a struct or union declaration in a [`NativeIndex`](crate::index::NativeIndex).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructId(pub u32);

/// Index of an enum definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnumId(pub u32);

/// Index of a typedef definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypedefId(pub u32);

/// Index of an Objective-C class or protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjCContainerId(pub u32);

/// Builtin scalar types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    /// Plain `char`.
    Char,
    /// `_Bool` / `bool` / `BOOL`.
    Bool,
    /// An integer of `size` bytes.
    Integer {
        size: u8,
        signed: bool,
        spelling: String,
    },
    /// A floating-point value of `size` bytes.
    Floating { size: u8, spelling: String },
}

impl PrimitiveType {
    /// Convenience constructor for integer types.
    pub fn integer(size: u8, signed: bool, spelling: &str) -> Self {
        PrimitiveType::Integer {
            size,
            signed,
            spelling: spelling.to_string(),
        }
    }

    /// Convenience constructor for floating types.
    pub fn floating(size: u8, spelling: &str) -> Self {
        PrimitiveType::Floating {
            size,
            spelling: spelling.to_string(),
        }
    }

    /// The C spelling of this primitive.
    pub fn spelling(&self) -> &str {
        match self {
            PrimitiveType::Char => "char",
            PrimitiveType::Bool => "_Bool",
            PrimitiveType::Integer { spelling, .. } | PrimitiveType::Floating { spelling, .. } => {
                spelling
            }
        }
    }
}

/// Array length kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArrayKind {
    /// `T[length]`.
    Const { length: u64 },
    /// `T[]`.
    Incomplete,
}

/// Objective-C pointer nullability annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Nullability {
    Nullable,
    NonNull,
    #[default]
    Unspecified,
}

/// A function type: parameter types and a return type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionType {
    pub param_types: Vec<Type>,
    pub return_type: Box<Type>,
}

/// A native type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Type {
    Void,
    Primitive(PrimitiveType),
    /// A struct or union declaration, by value.
    Record(StructId),
    Enum(EnumId),
    Pointer {
        pointee: Box<Type>,
        pointee_is_const: bool,
    },
    Function(FunctionType),
    Array {
        elem: Box<Type>,
        kind: ArrayKind,
    },
    Typedef(TypedefId),
    /// `Class<P...> *`.
    ObjCObjectPointer {
        class: ObjCContainerId,
        nullability: Nullability,
        protocols: Vec<ObjCContainerId>,
    },
    /// `Class<P...>`.
    ObjCClassPointer {
        nullability: Nullability,
        protocols: Vec<ObjCContainerId>,
    },
    /// `id<P...>`.
    ObjCIdType {
        nullability: Nullability,
        protocols: Vec<ObjCContainerId>,
    },
    /// `instancetype`; only meaningful as a declared method return type.
    ObjCInstanceType { nullability: Nullability },
    /// A construct the indexer could not model.
    Unsupported,
}

impl Type {
    /// `char`.
    pub fn char() -> Self {
        Type::Primitive(PrimitiveType::Char)
    }

    /// `_Bool`.
    pub fn bool() -> Self {
        Type::Primitive(PrimitiveType::Bool)
    }

    /// `int8_t`.
    pub fn i8() -> Self {
        Type::Primitive(PrimitiveType::integer(1, true, "int8_t"))
    }

    /// `int16_t`.
    pub fn i16() -> Self {
        Type::Primitive(PrimitiveType::integer(2, true, "int16_t"))
    }

    /// `int32_t`.
    pub fn i32() -> Self {
        Type::Primitive(PrimitiveType::integer(4, true, "int32_t"))
    }

    /// `int64_t`.
    pub fn i64() -> Self {
        Type::Primitive(PrimitiveType::integer(8, true, "int64_t"))
    }

    /// `uint8_t`.
    pub fn u8() -> Self {
        Type::Primitive(PrimitiveType::integer(1, false, "uint8_t"))
    }

    /// `uint16_t`.
    pub fn u16() -> Self {
        Type::Primitive(PrimitiveType::integer(2, false, "uint16_t"))
    }

    /// `uint32_t`.
    pub fn u32() -> Self {
        Type::Primitive(PrimitiveType::integer(4, false, "uint32_t"))
    }

    /// `uint64_t`.
    pub fn u64() -> Self {
        Type::Primitive(PrimitiveType::integer(8, false, "uint64_t"))
    }

    /// `float`.
    pub fn f32() -> Self {
        Type::Primitive(PrimitiveType::floating(4, "float"))
    }

    /// `double`.
    pub fn f64() -> Self {
        Type::Primitive(PrimitiveType::floating(8, "double"))
    }

    /// A mutable pointer to `pointee`.
    pub fn pointer_to(pointee: Type) -> Self {
        Type::Pointer {
            pointee: Box::new(pointee),
            pointee_is_const: false,
        }
    }

    /// A pointer to const `pointee`.
    pub fn const_pointer_to(pointee: Type) -> Self {
        Type::Pointer {
            pointee: Box::new(pointee),
            pointee_is_const: true,
        }
    }

    /// Whether this type is `void` (without looking through typedefs).
    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Primitive(p) => write!(f, "{}", p.spelling()),
            Type::Record(id) => write!(f, "record#{}", id.0),
            Type::Enum(id) => write!(f, "enum#{}", id.0),
            Type::Pointer {
                pointee,
                pointee_is_const,
            } => {
                if *pointee_is_const {
                    write!(f, "const {pointee}*")
                } else {
                    write!(f, "{pointee}*")
                }
            }
            Type::Function(ft) => {
                write!(f, "{}(", ft.return_type)?;
                for (i, p) in ft.param_types.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")
            }
            Type::Array { elem, kind } => match kind {
                ArrayKind::Const { length } => write!(f, "{elem}[{length}]"),
                ArrayKind::Incomplete => write!(f, "{elem}[]"),
            },
            Type::Typedef(id) => write!(f, "typedef#{}", id.0),
            Type::ObjCObjectPointer { class, .. } => write!(f, "objc-class#{}*", class.0),
            Type::ObjCClassPointer { .. } => write!(f, "Class"),
            Type::ObjCIdType { .. } => write!(f, "id"),
            Type::ObjCInstanceType { .. } => write!(f, "instancetype"),
            Type::Unsupported => write!(f, "<unsupported>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_spellings() {
        assert_eq!(Type::i32().to_string(), "int32_t");
        assert_eq!(Type::u8().to_string(), "uint8_t");
        assert_eq!(Type::f64().to_string(), "double");
        assert_eq!(Type::bool().to_string(), "_Bool");
        assert_eq!(Type::char().to_string(), "char");
    }

    #[test]
    fn pointer_display() {
        assert_eq!(Type::pointer_to(Type::Void).to_string(), "void*");
        assert_eq!(Type::const_pointer_to(Type::char()).to_string(), "const char*");
    }

    #[test]
    fn function_display() {
        let ft = Type::Function(FunctionType {
            param_types: vec![Type::i32(), Type::f32()],
            return_type: Box::new(Type::Void),
        });
        assert_eq!(ft.to_string(), "void(int32_t, float)");
    }
}
