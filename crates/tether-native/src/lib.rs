//! Native declaration model for Tether bridge generation.
//!
//! Describes C and Objective-C types and declarations as a header indexer
//! reports them, and provides a TOML-based stand-in for the indexer.
//!
//! ## Modules
//!
//! - [`types`] - The closed [`Type`] universe and declaration ids
//! - [`decl`] - Records, enums, functions, typedefs, macro constants
//! - [`objc`] - Objective-C classes, protocols, methods and properties
//! - [`index`] - [`NativeIndex`], the read-only result of indexing
//! - [`config`] - Library configuration and header filters
//! - [`prototype`] - C prototype and type-spelling parser
//! - [`definition`] - `.def.toml` library definition files

pub mod config;
pub mod decl;
pub mod definition;
pub mod error;
pub mod index;
pub mod objc;
pub mod prototype;
pub mod types;

pub use config::{HeaderFilter, Language, LibraryConfig};
pub use decl::{
    BitField, ConstantDef, ConstantValue, EnumConstant, EnumDef, Field, FunctionDecl, Parameter,
    RecordKind, StructDecl, StructDef, TypedefDef,
};
pub use definition::LibraryDefinition;
pub use error::{NativeError, Result};
pub use index::NativeIndex;
pub use objc::{resolve_return_type, ObjCContainer, ObjCContainerKind, ObjCMethod, ObjCProperty};
pub use prototype::{parse_type, Prototype};
pub use types::{
    ArrayKind, EnumId, FunctionType, Nullability, ObjCContainerId, PrimitiveType, StructId, Type,
    TypedefId,
};
