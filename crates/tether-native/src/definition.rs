//! Library definition file (`.def.toml`) parsing.
//!
//! A definition file stands in for header indexing: it carries the library
//! configuration together with hand-declared records, enums, typedefs, macro
//! constants and C prototypes. [`LibraryDefinition::build_index`] resolves all
//! of it into a [`NativeIndex`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::LibraryConfig;
use crate::decl::{
    BitField, ConstantDef, ConstantValue, EnumConstant, EnumDef, Field, RecordKind, StructDef,
};
use crate::error::{NativeError, Result};
use crate::index::NativeIndex;
use crate::prototype::{parse_type, Prototype};
use crate::types::{ArrayKind, PrimitiveType, Type};

/// A complete library definition parsed from a `.def.toml` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryDefinition {
    pub library: LibraryConfig,
    #[serde(default)]
    pub structs: Vec<StructEntry>,
    #[serde(default)]
    pub enums: Vec<EnumEntry>,
    #[serde(default)]
    pub typedefs: Vec<TypedefEntry>,
    #[serde(default)]
    pub constants: Vec<ConstantEntry>,
    #[serde(default)]
    pub functions: Vec<FunctionEntry>,
}

/// A record declaration. Omitting `size` declares an opaque record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StructEntry {
    /// Tag name without the `struct`/`union` keyword.
    pub name: String,
    #[serde(default)]
    pub kind: RecordKind,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub align: Option<u32>,
    #[serde(default = "default_natural_layout")]
    pub natural_layout: bool,
    #[serde(default)]
    pub fields: Vec<FieldEntry>,
    #[serde(default)]
    pub bit_fields: Vec<BitFieldEntry>,
}

fn default_natural_layout() -> bool {
    true
}

/// A record member. `offset` is in bits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FieldEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub offset: u64,
    /// Alignment of the field type in bytes; derived from the type when absent.
    #[serde(default)]
    pub align: Option<u64>,
}

/// A bit-field member. `offset` and `size` are in bits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitFieldEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub offset: u64,
    pub size: u32,
}

/// An enum declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EnumEntry {
    pub name: String,
    #[serde(default = "default_enum_base")]
    pub base_type: String,
    #[serde(default)]
    pub constants: Vec<EnumConstantEntry>,
}

fn default_enum_base() -> String {
    "unsigned int".to_string()
}

/// An enumerator; without `value` it follows the previous one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumConstantEntry {
    pub name: String,
    #[serde(default)]
    pub value: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypedefEntry {
    pub name: String,
    pub aliased: String,
}

/// A macro constant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub value: ConstantLiteral,
}

/// The literal value of a macro constant as written in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstantLiteral {
    Integer(i64),
    Floating(f64),
}

/// A C function prototype and the header that declares it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionEntry {
    pub prototype: String,
    #[serde(default)]
    pub header: Option<String>,
    /// Whether this function is excluded from the index.
    #[serde(default)]
    pub excluded: bool,
}

impl LibraryDefinition {
    /// Parse a library definition from a TOML string.
    pub fn parse(input: &str) -> Result<Self> {
        let def: LibraryDefinition = toml::from_str(input).map_err(NativeError::Toml)?;
        def.validate()?;
        Ok(def)
    }

    /// Parse a library definition from a file path.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Functions that are neither flagged nor listed in `excluded-functions`.
    ///
    /// The name is taken from the prototype text, so this works before the
    /// prototypes are resolved against an index.
    pub fn active_functions(&self) -> Vec<&FunctionEntry> {
        self.functions
            .iter()
            .filter(|f| !f.excluded)
            .filter(|f| {
                prototype_name(&f.prototype)
                    .map_or(true, |name| !self.library.is_function_excluded(name))
            })
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.library.name.is_empty() {
            return Err(invalid("library.name is required"));
        }

        let mut tags = HashSet::new();
        for s in &self.structs {
            if !tags.insert(record_spelling(s)) {
                return Err(invalid(&format!("duplicate record '{}'", s.name)));
            }
            match (s.size, s.align) {
                (None, _) if !s.fields.is_empty() || !s.bit_fields.is_empty() => {
                    return Err(invalid(&format!(
                        "record '{}' has fields but no size",
                        s.name
                    )));
                }
                (Some(_), None | Some(0)) => {
                    return Err(invalid(&format!(
                        "record '{}' needs a non-zero align",
                        s.name
                    )));
                }
                _ => {}
            }
            if let Some(size) = s.size {
                let bits = size.checked_mul(8).ok_or_else(|| {
                    invalid(&format!("record '{}' size {size} overflows in bits", s.name))
                })?;
                if let Some(f) = s.fields.iter().find(|f| f.offset >= bits.max(1)) {
                    return Err(invalid(&format!(
                        "field '{}.{}' lies outside the record",
                        s.name, f.name
                    )));
                }
            }
        }

        let mut typedef_names = HashSet::new();
        for t in &self.typedefs {
            if !typedef_names.insert(t.name.as_str()) {
                return Err(invalid(&format!("duplicate typedef '{}'", t.name)));
            }
        }

        let mut enum_names = HashSet::new();
        for e in &self.enums {
            if !enum_names.insert(e.name.as_str()) {
                return Err(invalid(&format!("duplicate enum '{}'", e.name)));
            }
        }

        let mut function_names = HashSet::new();
        for f in &self.functions {
            let name = prototype_name(&f.prototype).ok_or_else(|| {
                invalid(&format!("cannot find a function name in '{}'", f.prototype))
            })?;
            if !function_names.insert(name) {
                return Err(invalid(&format!("duplicate function '{name}'")));
            }
        }

        Ok(())
    }

    /// Resolve every declaration into a [`NativeIndex`].
    ///
    /// Records and typedef names are declared up front so declarations may
    /// refer to each other in any order. Functions from headers rejected by
    /// the header filter, or excluded by name, are left out.
    #[tracing::instrument(level = "debug", skip_all, fields(library = %self.library.name))]
    pub fn build_index(&self) -> Result<NativeIndex> {
        let filter = self.library.header_filter()?;
        let mut index = NativeIndex::new();

        let record_ids: Vec<_> = self
            .structs
            .iter()
            .map(|s| index.declare_struct(&record_spelling(s)))
            .collect();
        let typedef_ids: Vec<_> = self
            .typedefs
            .iter()
            .map(|t| index.declare_typedef(&t.name))
            .collect();

        for e in &self.enums {
            let def = self.resolve_enum(e, &index)?;
            index.add_enum(def);
        }

        for (t, id) in self.typedefs.iter().zip(typedef_ids) {
            let aliased = parse_type(&t.aliased, &index)?;
            index.set_typedef_target(id, aliased)?;
        }

        for (s, id) in self.structs.iter().zip(record_ids) {
            if let Some(def) = self.resolve_struct(s, &index)? {
                index.define_struct(id, def)?;
            }
        }

        for c in &self.constants {
            let ty = parse_type(&c.ty, &index)?;
            let value = match c.value {
                ConstantLiteral::Integer(v) => ConstantValue::Integer(v),
                ConstantLiteral::Floating(v) => ConstantValue::Floating(v),
            };
            index.add_constant(ConstantDef {
                name: c.name.clone(),
                ty,
                value,
            });
        }

        for f in &self.functions {
            if f.excluded {
                tracing::debug!(prototype = %f.prototype, "function flagged as excluded");
                continue;
            }
            if let Some(header) = &f.header {
                if !filter.accepts(header) {
                    tracing::debug!(prototype = %f.prototype, %header, "header rejected by filter");
                    continue;
                }
            }
            let decl = Prototype::parse(&f.prototype, &index)?.into_function_decl();
            if self.library.is_function_excluded(&decl.name) {
                tracing::debug!(function = %decl.name, "function excluded by configuration");
                continue;
            }
            index.add_function(decl);
        }

        tracing::debug!(
            functions = index.functions().len(),
            constants = index.constants().len(),
            "index built"
        );
        Ok(index)
    }

    fn resolve_enum(&self, e: &EnumEntry, index: &NativeIndex) -> Result<EnumDef> {
        let base_type = parse_type(&e.base_type, index)?;
        let mut next = 0i64;
        let constants = e
            .constants
            .iter()
            .map(|c| {
                let value = c.value.unwrap_or(next);
                next = value.wrapping_add(1);
                EnumConstant {
                    name: c.name.clone(),
                    value,
                    is_explicitly_defined: c.value.is_some(),
                }
            })
            .collect();
        Ok(EnumDef {
            spelling: format!("enum {}", e.name),
            base_type,
            constants,
        })
    }

    fn resolve_struct(&self, s: &StructEntry, index: &NativeIndex) -> Result<Option<StructDef>> {
        let (Some(size), Some(align)) = (s.size, s.align) else {
            return Ok(None);
        };

        let fields = s
            .fields
            .iter()
            .map(|f| {
                let ty = parse_type(&f.ty, index)?;
                let type_align = match f.align {
                    Some(a) => a,
                    None => natural_align(&ty, index)?,
                };
                Ok(Field {
                    name: f.name.clone(),
                    ty,
                    offset: f.offset,
                    type_align,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let bit_fields = s
            .bit_fields
            .iter()
            .map(|b| {
                Ok(BitField {
                    name: b.name.clone(),
                    ty: parse_type(&b.ty, index)?,
                    offset: b.offset,
                    size: b.size,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(StructDef {
            size,
            align,
            has_natural_layout: s.natural_layout,
            kind: s.kind,
            fields,
            bit_fields,
        }))
    }
}

fn invalid(detail: &str) -> NativeError {
    NativeError::InvalidDefinition {
        detail: detail.to_string(),
    }
}

fn record_spelling(s: &StructEntry) -> String {
    match s.kind {
        RecordKind::Struct => format!("struct {}", s.name),
        RecordKind::Union => format!("union {}", s.name),
    }
}

/// The identifier immediately before the prototype's `(`.
fn prototype_name(prototype: &str) -> Option<&str> {
    let head = prototype[..prototype.find('(')?].trim_end();
    let start = head
        .rfind(|c: char| !(c.is_alphanumeric() || c == '_'))
        .map_or(0, |i| i + 1);
    let name = &head[start..];
    (!name.is_empty()).then_some(name)
}

/// Natural alignment in bytes of `ty` on an LP64 target.
fn natural_align(ty: &Type, index: &NativeIndex) -> Result<u64> {
    let align = match index.unwrap_typedefs(ty)? {
        Type::Primitive(PrimitiveType::Char | PrimitiveType::Bool) => 1,
        Type::Primitive(PrimitiveType::Integer { size, .. })
        | Type::Primitive(PrimitiveType::Floating { size, .. }) => u64::from(*size),
        Type::Enum(id) => {
            let def = index.enum_def(*id).ok_or_else(|| NativeError::UnknownType {
                name: format!("enum#{}", id.0),
            })?;
            natural_align(&def.base_type, index)?
        }
        Type::Record(id) => index
            .struct_decl(*id)
            .and_then(|d| d.def.as_ref())
            .map(|d| u64::from(d.align))
            .ok_or_else(|| {
                invalid(&format!(
                    "cannot derive the alignment of incomplete type '{}'",
                    index.c_spelling(ty)
                ))
            })?,
        Type::Array { elem, kind: ArrayKind::Const { .. } } => natural_align(elem, index)?,
        Type::Pointer { .. }
        | Type::ObjCObjectPointer { .. }
        | Type::ObjCClassPointer { .. }
        | Type::ObjCIdType { .. }
        | Type::ObjCInstanceType { .. } => 8,
        Type::Void
        | Type::Function(_)
        | Type::Array { kind: ArrayKind::Incomplete, .. }
        | Type::Typedef(_)
        | Type::Unsupported => {
            return Err(invalid(&format!(
                "cannot derive the alignment of '{}'",
                index.c_spelling(ty)
            )))
        }
    };
    Ok(align)
}
