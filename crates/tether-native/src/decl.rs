//! Aggregate C declaration records: structs, enums, functions, typedefs, constants.

use serde::{Deserialize, Serialize};

use crate::types::Type;

/// Whether a record is a `struct` or a `union`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    #[default]
    Struct,
    Union,
}

/// A struct or union declaration. `def` is `None` for forward declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDecl {
    /// C spelling, e.g. `struct Point`.
    pub spelling: String,
    pub def: Option<StructDef>,
}

impl StructDecl {
    /// An opaque (forward-declared) record.
    pub fn opaque(spelling: &str) -> Self {
        Self {
            spelling: spelling.to_string(),
            def: None,
        }
    }

    /// Whether only a forward declaration is known.
    pub fn is_opaque(&self) -> bool {
        self.def.is_none()
    }

    /// The tag name without any `struct `/`union ` keyword.
    pub fn name(&self) -> &str {
        self.spelling
            .strip_prefix("struct ")
            .or_else(|| self.spelling.strip_prefix("union "))
            .unwrap_or(&self.spelling)
    }
}

/// The layout of a defined record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDef {
    /// Size in bytes.
    pub size: u64,
    /// Alignment in bytes.
    pub align: u32,
    /// `false` for packed or otherwise non-natural layouts.
    pub has_natural_layout: bool,
    pub kind: RecordKind,
    pub fields: Vec<Field>,
    pub bit_fields: Vec<BitField>,
}

/// A regular record member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    /// Offset in bits from the start of the record.
    pub offset: u64,
    /// Alignment of the field type in bytes.
    pub type_align: u64,
}

impl Field {
    /// A field sits on its natural alignment when its bit offset is a
    /// multiple of `type_align * 8`. An alignment too large to express in
    /// bits is never satisfied.
    pub fn is_aligned(&self) -> bool {
        match self.type_align.checked_mul(8) {
            Some(align_bits) if align_bits != 0 => self.offset % align_bits == 0,
            _ => false,
        }
    }
}

/// A bit-field record member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitField {
    pub name: String,
    pub ty: Type,
    /// Offset in bits.
    pub offset: u64,
    /// Width in bits.
    pub size: u32,
}

/// An enum definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
    pub spelling: String,
    pub base_type: Type,
    pub constants: Vec<EnumConstant>,
}

impl EnumDef {
    /// Look up a constant by name.
    pub fn constant(&self, name: &str) -> Option<&EnumConstant> {
        self.constants.iter().find(|c| c.name == name)
    }
}

/// A single enumerator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumConstant {
    pub name: String,
    pub value: i64,
    /// `false` when the value was implied by the previous enumerator.
    pub is_explicitly_defined: bool,
}

/// A function or method parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name (may be empty if unnamed).
    pub name: String,
    pub ty: Type,
    /// Objective-C `ns_consumed` attribute.
    pub ns_consumed: bool,
}

impl Parameter {
    pub fn new(name: &str, ty: Type) -> Self {
        Self {
            name: name.to_string(),
            ty,
            ns_consumed: false,
        }
    }
}

/// A C function declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub return_type: Type,
    /// Linker-visible symbol name.
    pub binary_name: String,
    /// Whether a body is visible (e.g. `static inline`).
    pub is_defined: bool,
    pub is_vararg: bool,
}

impl FunctionDecl {
    /// A non-variadic external function whose binary name equals its name.
    pub fn new(name: &str, parameters: Vec<Parameter>, return_type: Type) -> Self {
        Self {
            name: name.to_string(),
            parameters,
            return_type,
            binary_name: name.to_string(),
            is_defined: false,
            is_vararg: false,
        }
    }
}

/// A `typedef`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedefDef {
    pub aliased: Type,
    pub name: String,
}

/// The value of a macro constant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConstantValue {
    Integer(i64),
    Floating(f64),
}

/// A macro constant with its C type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantDef {
    pub name: String,
    pub ty: Type,
    pub value: ConstantValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(offset: u64, type_align: u64) -> Field {
        Field {
            name: "f".to_string(),
            ty: Type::i32(),
            offset,
            type_align,
        }
    }

    #[test]
    fn field_alignment() {
        assert!(field(0, 4).is_aligned());
        // 4 mod 64 != 0
        assert!(!field(4, 8).is_aligned());
        assert!(field(64, 8).is_aligned());
    }

    #[test]
    fn zero_alignment_is_never_aligned() {
        assert!(!field(0, 0).is_aligned());
    }

    #[test]
    fn struct_names() {
        assert_eq!(StructDecl::opaque("struct Point").name(), "Point");
        assert_eq!(StructDecl::opaque("union Value").name(), "Value");
        assert_eq!(StructDecl::opaque("Anon").name(), "Anon");
        assert!(StructDecl::opaque("struct Point").is_opaque());
    }

    #[test]
    fn enum_constant_lookup() {
        let def = EnumDef {
            spelling: "enum Color".to_string(),
            base_type: Type::u32(),
            constants: vec![
                EnumConstant {
                    name: "RED".to_string(),
                    value: 0,
                    is_explicitly_defined: false,
                },
                EnumConstant {
                    name: "BLUE".to_string(),
                    value: 4,
                    is_explicitly_defined: true,
                },
            ],
        };
        assert_eq!(def.constant("BLUE").map(|c| c.value), Some(4));
        assert!(def.constant("GREEN").is_none());
    }
}
