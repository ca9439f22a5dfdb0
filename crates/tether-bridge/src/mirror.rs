//! Mirrors: how a native type crosses the bridge.
//!
//! A [`Mirror`] tells the generators which bridged representation a type
//! uses and how to convert expressions between the managed, bridged and
//! native forms. [`DeclarationMapper`] derives mirrors from a
//! [`NativeIndex`].

use serde::{Deserialize, Serialize};
use tether_native::{NativeIndex, PrimitiveType, Type};

use crate::error::{BridgeError, Result};
use crate::expr::Expr;

/// Scalar wire representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl ScalarKind {
    /// The integer kind of the given byte width and signedness.
    pub fn integer(size: u8, signed: bool) -> Option<Self> {
        let kind = match (size, signed) {
            (1, true) => Self::I8,
            (2, true) => Self::I16,
            (4, true) => Self::I32,
            (8, true) => Self::I64,
            (1, false) => Self::U8,
            (2, false) => Self::U16,
            (4, false) => Self::U32,
            (8, false) => Self::U64,
            _ => return None,
        };
        Some(kind)
    }

    pub fn floating(size: u8) -> Option<Self> {
        match size {
            4 => Some(Self::F32),
            8 => Some(Self::F64),
            _ => None,
        }
    }

    pub fn managed_name(&self) -> &'static str {
        match self {
            Self::I8 => "Byte",
            Self::I16 => "Short",
            Self::I32 => "Int",
            Self::I64 => "Long",
            Self::U8 => "UByte",
            Self::U16 => "UShort",
            Self::U32 => "UInt",
            Self::U64 => "ULong",
            Self::F32 => "Float",
            Self::F64 => "Double",
        }
    }

    pub fn c_name(&self) -> &'static str {
        match self {
            Self::I8 => "int8_t",
            Self::I16 => "int16_t",
            Self::I32 => "int32_t",
            Self::I64 => "int64_t",
            Self::U8 => "uint8_t",
            Self::U16 => "uint16_t",
            Self::U32 => "uint32_t",
            Self::U64 => "uint64_t",
            Self::F32 => "float",
            Self::F64 => "double",
        }
    }
}

/// A value's representation while it crosses the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BridgedType {
    Void,
    NativePointer,
    Scalar(ScalarKind),
}

impl BridgedType {
    pub fn managed_name(&self) -> &'static str {
        match self {
            Self::Void => "Unit",
            Self::NativePointer => "NativePtr",
            Self::Scalar(kind) => kind.managed_name(),
        }
    }

    pub fn c_name(&self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::NativePointer => "void*",
            Self::Scalar(kind) => kind.c_name(),
        }
    }
}

/// What kind of managed value a mirror converts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MirrorKind {
    Char,
    Bool,
    Integer(ScalarKind),
    Floating(ScalarKind),
    Enum { name: String, base: ScalarKind },
    /// Data or function pointer; `pointee` is the managed pointee type name.
    Pointer { pointee: String },
    /// Any Objective-C object, class or `id` pointer.
    ObjCObject { class: String },
    Record { name: String },
}

/// The bridging descriptor of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mirror {
    kind: MirrorKind,
    c_type_name: String,
}

impl Mirror {
    pub fn new(kind: MirrorKind, c_type_name: impl Into<String>) -> Self {
        Self {
            kind,
            c_type_name: c_type_name.into(),
        }
    }

    pub fn kind(&self) -> &MirrorKind {
        &self.kind
    }

    pub fn bridged_type(&self) -> BridgedType {
        match &self.kind {
            MirrorKind::Char | MirrorKind::Bool => BridgedType::Scalar(ScalarKind::I8),
            MirrorKind::Integer(kind) | MirrorKind::Floating(kind) => BridgedType::Scalar(*kind),
            MirrorKind::Enum { base, .. } => BridgedType::Scalar(*base),
            MirrorKind::Pointer { .. }
            | MirrorKind::ObjCObject { .. }
            | MirrorKind::Record { .. } => BridgedType::NativePointer,
        }
    }

    /// The managed type of values described by this mirror.
    pub fn managed_type_name(&self) -> String {
        match &self.kind {
            MirrorKind::Char => "Byte".to_string(),
            MirrorKind::Bool => "Boolean".to_string(),
            MirrorKind::Integer(kind) | MirrorKind::Floating(kind) => {
                kind.managed_name().to_string()
            }
            MirrorKind::Enum { name, .. } | MirrorKind::Record { name } => name.clone(),
            MirrorKind::Pointer { pointee } => format!("CPointer<{pointee}>?"),
            MirrorKind::ObjCObject { class } => format!("{class}?"),
        }
    }

    /// The native type spelling.
    pub fn c_type_name(&self) -> &str {
        &self.c_type_name
    }

    /// Managed name of a temporary with the record's layout; `None` unless
    /// this mirror describes a record.
    pub fn pointed_type_name(&self) -> Option<&str> {
        match &self.kind {
            MirrorKind::Record { name } => Some(name),
            _ => None,
        }
    }

    /// Managed value → bridged value.
    pub fn arg_to_bridged(&self, value: &Expr) -> Expr {
        match &self.kind {
            MirrorKind::Char | MirrorKind::Integer(_) | MirrorKind::Floating(_) => value.clone(),
            MirrorKind::Bool => value.atomic().map(|t| format!("{t}.toByte()")),
            MirrorKind::Enum { .. } => value.atomic().map(|t| format!("{t}.value")),
            MirrorKind::Pointer { .. } => value.atomic().map(|t| format!("{t}.rawValue")),
            MirrorKind::ObjCObject { .. } => value.atomic().map(|t| format!("{t}.objcPtr()")),
            MirrorKind::Record { .. } => value.atomic().map(|t| format!("{t}.rawPtr")),
        }
    }

    /// Bridged value → managed value.
    pub fn arg_from_bridged(&self, value: &Expr) -> Expr {
        match &self.kind {
            MirrorKind::Char | MirrorKind::Integer(_) | MirrorKind::Floating(_) => value.clone(),
            MirrorKind::Bool => value.atomic().map(|t| format!("{t}.toBoolean()")),
            MirrorKind::Enum { name, .. } => value.map(|t| format!("{name}.byValue({t})")),
            MirrorKind::Pointer { pointee } => {
                value.map(|t| format!("interpretCPointer<{pointee}>({t})"))
            }
            MirrorKind::ObjCObject { class } => {
                value.map(|t| format!("interpretObjCPointer<{class}>({t})"))
            }
            MirrorKind::Record { name } => {
                value.map(|t| format!("interpretPointed<{name}>({t}).readValue()"))
            }
        }
    }

    /// Bridged value → native value.
    pub fn c_from_bridged(&self, value: &Expr) -> Expr {
        match &self.kind {
            MirrorKind::Record { .. } => {
                let c_name = &self.c_type_name;
                value.atomic().map(|t| format!("*({c_name}*){t}"))
            }
            _ => {
                let c_name = &self.c_type_name;
                value.atomic().map(|t| format!("({c_name}){t}"))
            }
        }
    }

    /// Convert a concrete managed value to its wire form.
    pub fn value_to_bridged(&self, value: ManagedValue) -> Result<BridgedValue> {
        let kind = self.bridged_type();
        let bits = match (&self.kind, value) {
            (MirrorKind::Bool, ManagedValue::Bool(b)) => u64::from(b),
            (MirrorKind::Char, ManagedValue::I8(v)) => v as i64 as u64,
            (MirrorKind::Pointer { .. } | MirrorKind::ObjCObject { .. }, ManagedValue::Pointer(p)) => p,
            (MirrorKind::Integer(k) | MirrorKind::Floating(k), v)
            | (MirrorKind::Enum { base: k, .. }, v)
                if v.scalar_kind() == Some(*k) =>
            {
                v.to_bits()
            }
            (_, v) => {
                return Err(BridgeError::unsupported(format!(
                    "value {v:?} does not fit a {} mirror",
                    self.c_type_name
                )))
            }
        };
        Ok(BridgedValue { kind, bits })
    }

    /// Convert a wire value back to its managed form.
    pub fn value_from_bridged(&self, value: BridgedValue) -> Result<ManagedValue> {
        if value.kind != self.bridged_type() {
            return Err(BridgeError::unsupported(format!(
                "bridged {:?} value given to a {} mirror",
                value.kind, self.c_type_name
            )));
        }
        let managed = match &self.kind {
            MirrorKind::Bool => ManagedValue::Bool(value.bits as u8 != 0),
            MirrorKind::Char => ManagedValue::I8(value.bits as i8),
            MirrorKind::Integer(k) | MirrorKind::Floating(k) | MirrorKind::Enum { base: k, .. } => {
                ManagedValue::from_bits(*k, value.bits)
            }
            MirrorKind::Pointer { .. } | MirrorKind::ObjCObject { .. } => {
                ManagedValue::Pointer(value.bits)
            }
            MirrorKind::Record { .. } => {
                return Err(BridgeError::unsupported(
                    "records are addressed, never passed as values",
                ))
            }
        };
        Ok(managed)
    }
}

/// A concrete managed-side value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ManagedValue {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    /// Raw address.
    Pointer(u64),
}

impl ManagedValue {
    fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            Self::I8(_) => Some(ScalarKind::I8),
            Self::I16(_) => Some(ScalarKind::I16),
            Self::I32(_) => Some(ScalarKind::I32),
            Self::I64(_) => Some(ScalarKind::I64),
            Self::U8(_) => Some(ScalarKind::U8),
            Self::U16(_) => Some(ScalarKind::U16),
            Self::U32(_) => Some(ScalarKind::U32),
            Self::U64(_) => Some(ScalarKind::U64),
            Self::F32(_) => Some(ScalarKind::F32),
            Self::F64(_) => Some(ScalarKind::F64),
            Self::Bool(_) | Self::Pointer(_) => None,
        }
    }

    /// Signed values are sign-extended, floats keep their exact bit pattern.
    fn to_bits(self) -> u64 {
        match self {
            Self::Bool(b) => u64::from(b),
            Self::I8(v) => v as i64 as u64,
            Self::I16(v) => v as i64 as u64,
            Self::I32(v) => v as i64 as u64,
            Self::I64(v) => v as u64,
            Self::U8(v) => u64::from(v),
            Self::U16(v) => u64::from(v),
            Self::U32(v) => u64::from(v),
            Self::U64(v) | Self::Pointer(v) => v,
            Self::F32(v) => u64::from(v.to_bits()),
            Self::F64(v) => v.to_bits(),
        }
    }

    fn from_bits(kind: ScalarKind, bits: u64) -> Self {
        match kind {
            ScalarKind::I8 => Self::I8(bits as i8),
            ScalarKind::I16 => Self::I16(bits as i16),
            ScalarKind::I32 => Self::I32(bits as i32),
            ScalarKind::I64 => Self::I64(bits as i64),
            ScalarKind::U8 => Self::U8(bits as u8),
            ScalarKind::U16 => Self::U16(bits as u16),
            ScalarKind::U32 => Self::U32(bits as u32),
            ScalarKind::U64 => Self::U64(bits),
            ScalarKind::F32 => Self::F32(f32::from_bits(bits as u32)),
            ScalarKind::F64 => Self::F64(f64::from_bits(bits)),
        }
    }

    /// Equality that compares floats by bit pattern.
    pub fn bitwise_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::F32(a), Self::F32(b)) => a.to_bits() == b.to_bits(),
            (Self::F64(a), Self::F64(b)) => a.to_bits() == b.to_bits(),
            (a, b) => a == b,
        }
    }
}

/// A concrete value on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BridgedValue {
    pub kind: BridgedType,
    pub bits: u64,
}

/// Resolves mirrors for native types.
pub trait MirrorSource: Send + Sync {
    fn mirror(&self, ty: &Type) -> Result<Mirror>;
}

/// Derives mirrors from the declarations in a [`NativeIndex`].
#[derive(Debug, Clone, Copy)]
pub struct DeclarationMapper<'a> {
    index: &'a NativeIndex,
}

impl<'a> DeclarationMapper<'a> {
    pub fn new(index: &'a NativeIndex) -> Self {
        Self { index }
    }

    /// Managed name used for `ty` behind a pointer.
    fn pointee_name(&self, ty: &Type) -> Result<String> {
        let name = match self.index.unwrap_typedefs(ty)? {
            Type::Void | Type::Unsupported | Type::Typedef(_) => "COpaque".to_string(),
            Type::Primitive(PrimitiveType::Char) => "ByteVar".to_string(),
            Type::Primitive(PrimitiveType::Bool) => "BooleanVar".to_string(),
            Type::Primitive(PrimitiveType::Integer { size, signed, .. }) => {
                match ScalarKind::integer(*size, *signed) {
                    Some(kind) => format!("{}Var", kind.managed_name()),
                    None => "COpaque".to_string(),
                }
            }
            Type::Primitive(PrimitiveType::Floating { size, .. }) => {
                match ScalarKind::floating(*size) {
                    Some(kind) => format!("{}Var", kind.managed_name()),
                    None => "COpaque".to_string(),
                }
            }
            Type::Record(id) => self
                .index
                .struct_decl(*id)
                .map(|d| d.name().to_string())
                .unwrap_or_else(|| "COpaque".to_string()),
            Type::Enum(id) => self
                .index
                .enum_def(*id)
                .map(|d| format!("{}Var", enum_name(&d.spelling)))
                .unwrap_or_else(|| "COpaque".to_string()),
            Type::Pointer { pointee, .. } => format!("CPointerVar<{}>", self.pointee_name(pointee)?),
            Type::Function(_) => "CFunction<*>".to_string(),
            Type::Array { elem, .. } => self.pointee_name(elem)?,
            Type::ObjCObjectPointer { .. }
            | Type::ObjCClassPointer { .. }
            | Type::ObjCIdType { .. }
            | Type::ObjCInstanceType { .. } => "ObjCObjectVar".to_string(),
        };
        Ok(name)
    }
}

fn enum_name(spelling: &str) -> &str {
    spelling.strip_prefix("enum ").unwrap_or(spelling)
}

impl MirrorSource for DeclarationMapper<'_> {
    fn mirror(&self, ty: &Type) -> Result<Mirror> {
        let index = self.index;
        let resolved = index.unwrap_typedefs(ty)?;
        let c_name = index.c_spelling(resolved);
        let unmapped = |reason: &str| BridgeError::unmapped(c_name.clone(), reason);

        let kind = match resolved {
            Type::Void => return Err(unmapped("void has no value representation")),
            Type::Primitive(PrimitiveType::Char) => MirrorKind::Char,
            Type::Primitive(PrimitiveType::Bool) => MirrorKind::Bool,
            Type::Primitive(PrimitiveType::Integer { size, signed, .. }) => {
                match ScalarKind::integer(*size, *signed) {
                    Some(kind) => MirrorKind::Integer(kind),
                    None => return Err(unmapped(&format!("no {size}-byte integer kind"))),
                }
            }
            Type::Primitive(PrimitiveType::Floating { size, .. }) => {
                match ScalarKind::floating(*size) {
                    Some(kind) => MirrorKind::Floating(kind),
                    None => return Err(unmapped(&format!("no {size}-byte floating kind"))),
                }
            }
            Type::Record(id) => {
                let decl = index
                    .struct_decl(*id)
                    .ok_or_else(|| unmapped("record is not in the index"))?;
                if decl.is_opaque() {
                    return Err(unmapped("opaque record has no layout"));
                }
                MirrorKind::Record {
                    name: decl.name().to_string(),
                }
            }
            Type::Enum(id) => {
                let def = index
                    .enum_def(*id)
                    .ok_or_else(|| unmapped("enum is not in the index"))?;
                let base = match index.unwrap_typedefs(&def.base_type)? {
                    Type::Primitive(PrimitiveType::Char) => Some(ScalarKind::I8),
                    Type::Primitive(PrimitiveType::Integer { size, signed, .. }) => {
                        ScalarKind::integer(*size, *signed)
                    }
                    _ => None,
                };
                match base {
                    Some(base) => MirrorKind::Enum {
                        name: enum_name(&def.spelling).to_string(),
                        base,
                    },
                    None => return Err(unmapped("enum base type is not an integer")),
                }
            }
            Type::Pointer { pointee, .. } => MirrorKind::Pointer {
                pointee: self.pointee_name(pointee)?,
            },
            Type::Function(_) => return Err(unmapped("functions cannot be passed by value")),
            Type::Array { .. } => {
                return Err(BridgeError::unsupported(format!(
                    "array '{c_name}' passed by value"
                )))
            }
            Type::Typedef(_) => return Err(unmapped("typedef did not resolve")),
            Type::ObjCObjectPointer { class, .. } => MirrorKind::ObjCObject {
                class: index
                    .objc_container(*class)
                    .map(|c| c.name.clone())
                    .ok_or_else(|| unmapped("class is not in the index"))?,
            },
            Type::ObjCClassPointer { .. } => MirrorKind::ObjCObject {
                class: "ObjCClass".to_string(),
            },
            Type::ObjCIdType { .. } => MirrorKind::ObjCObject {
                class: "ObjCObject".to_string(),
            },
            Type::ObjCInstanceType { .. } => {
                return Err(unmapped("instancetype must be resolved against a container"))
            }
            Type::Unsupported => return Err(unmapped("construct is not modelled")),
        };

        Ok(Mirror::new(kind, c_name))
    }
}
