//! The aggregate result of indexing native headers.
//!
//! A [`NativeIndex`] owns every declaration discovered for a library and hands
//! out typed ids that [`Type`] values refer to. It is built once and read-only
//! afterwards; bridge generation only ever borrows it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::decl::{ConstantDef, EnumDef, FunctionDecl, StructDecl, StructDef, TypedefDef};
use crate::error::{NativeError, Result};
use crate::objc::{resolve_return_type, ObjCContainer, ObjCMethod};
use crate::types::{ArrayKind, EnumId, ObjCContainerId, StructId, Type, TypedefId};

/// Declarations discovered for one library.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NativeIndex {
    structs: Vec<StructDecl>,
    enums: Vec<EnumDef>,
    typedefs: Vec<TypedefDef>,
    objc_containers: Vec<ObjCContainer>,
    functions: Vec<FunctionDecl>,
    constants: Vec<ConstantDef>,
    #[serde(skip)]
    names: NameTable,
}

/// Name → id lookups, rebuilt on demand after deserialization.
#[derive(Debug, Clone, Default)]
struct NameTable {
    structs: HashMap<String, StructId>,
    enums: HashMap<String, EnumId>,
    typedefs: HashMap<String, TypedefId>,
    objc_containers: HashMap<String, ObjCContainerId>,
}

impl NativeIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    // --- construction ---

    /// Forward-declare a record. Returns the existing id if `spelling` is known.
    pub fn declare_struct(&mut self, spelling: &str) -> StructId {
        if let Some(id) = self.names.structs.get(spelling) {
            return *id;
        }
        let id = StructId(self.structs.len() as u32);
        self.structs.push(StructDecl::opaque(spelling));
        self.names.structs.insert(spelling.to_string(), id);
        id
    }

    /// Attach a layout to a declared record.
    pub fn define_struct(&mut self, id: StructId, def: StructDef) -> Result<()> {
        let decl = self
            .structs
            .get_mut(id.0 as usize)
            .ok_or_else(|| NativeError::UnknownType {
                name: format!("record#{}", id.0),
            })?;
        decl.def = Some(def);
        Ok(())
    }

    /// Declare and define a record in one step.
    pub fn add_struct(&mut self, spelling: &str, def: Option<StructDef>) -> StructId {
        let id = self.declare_struct(spelling);
        if let Some(def) = def {
            self.structs[id.0 as usize].def = Some(def);
        }
        id
    }

    pub fn add_enum(&mut self, def: EnumDef) -> EnumId {
        let id = EnumId(self.enums.len() as u32);
        self.names.enums.insert(def.spelling.clone(), id);
        self.enums.push(def);
        id
    }

    pub fn add_typedef(&mut self, def: TypedefDef) -> TypedefId {
        let id = TypedefId(self.typedefs.len() as u32);
        self.names.typedefs.insert(def.name.clone(), id);
        self.typedefs.push(def);
        id
    }

    /// Reserve a typedef slot so that mutually referring aliases can be modelled.
    pub fn declare_typedef(&mut self, name: &str) -> TypedefId {
        if let Some(id) = self.names.typedefs.get(name) {
            return *id;
        }
        self.add_typedef(TypedefDef {
            aliased: Type::Unsupported,
            name: name.to_string(),
        })
    }

    /// Set the aliased type of a declared typedef.
    pub fn set_typedef_target(&mut self, id: TypedefId, aliased: Type) -> Result<()> {
        let def = self
            .typedefs
            .get_mut(id.0 as usize)
            .ok_or_else(|| NativeError::UnknownType {
                name: format!("typedef#{}", id.0),
            })?;
        def.aliased = aliased;
        Ok(())
    }

    pub fn add_objc_container(&mut self, container: ObjCContainer) -> ObjCContainerId {
        let id = ObjCContainerId(self.objc_containers.len() as u32);
        self.names
            .objc_containers
            .insert(container.name.clone(), id);
        self.objc_containers.push(container);
        id
    }

    /// Mutable access for filling in methods after the container id is known.
    pub fn objc_container_mut(&mut self, id: ObjCContainerId) -> Option<&mut ObjCContainer> {
        self.objc_containers.get_mut(id.0 as usize)
    }

    pub fn add_function(&mut self, decl: FunctionDecl) {
        self.functions.push(decl);
    }

    pub fn add_constant(&mut self, def: ConstantDef) {
        self.constants.push(def);
    }

    /// Rebuild name lookups, e.g. after deserializing an index.
    pub fn reindex(&mut self) {
        let mut names = NameTable::default();
        for (i, s) in self.structs.iter().enumerate() {
            names.structs.insert(s.spelling.clone(), StructId(i as u32));
        }
        for (i, e) in self.enums.iter().enumerate() {
            names.enums.insert(e.spelling.clone(), EnumId(i as u32));
        }
        for (i, t) in self.typedefs.iter().enumerate() {
            names.typedefs.insert(t.name.clone(), TypedefId(i as u32));
        }
        for (i, c) in self.objc_containers.iter().enumerate() {
            names
                .objc_containers
                .insert(c.name.clone(), ObjCContainerId(i as u32));
        }
        self.names = names;
    }

    // --- lookup ---

    pub fn struct_decl(&self, id: StructId) -> Option<&StructDecl> {
        self.structs.get(id.0 as usize)
    }

    pub fn enum_def(&self, id: EnumId) -> Option<&EnumDef> {
        self.enums.get(id.0 as usize)
    }

    pub fn typedef_def(&self, id: TypedefId) -> Option<&TypedefDef> {
        self.typedefs.get(id.0 as usize)
    }

    pub fn objc_container(&self, id: ObjCContainerId) -> Option<&ObjCContainer> {
        self.objc_containers.get(id.0 as usize)
    }

    pub fn struct_by_spelling(&self, spelling: &str) -> Option<StructId> {
        self.names.structs.get(spelling).copied()
    }

    pub fn enum_by_spelling(&self, spelling: &str) -> Option<EnumId> {
        self.names.enums.get(spelling).copied()
    }

    pub fn typedef_by_name(&self, name: &str) -> Option<TypedefId> {
        self.names.typedefs.get(name).copied()
    }

    pub fn objc_container_by_name(&self, name: &str) -> Option<ObjCContainerId> {
        self.names.objc_containers.get(name).copied()
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn structs(&self) -> impl Iterator<Item = (StructId, &StructDecl)> {
        self.structs
            .iter()
            .enumerate()
            .map(|(i, s)| (StructId(i as u32), s))
    }

    pub fn enums(&self) -> impl Iterator<Item = (EnumId, &EnumDef)> {
        self.enums
            .iter()
            .enumerate()
            .map(|(i, e)| (EnumId(i as u32), e))
    }

    pub fn typedefs(&self) -> impl Iterator<Item = (TypedefId, &TypedefDef)> {
        self.typedefs
            .iter()
            .enumerate()
            .map(|(i, t)| (TypedefId(i as u32), t))
    }

    pub fn objc_containers(&self) -> impl Iterator<Item = (ObjCContainerId, &ObjCContainer)> {
        self.objc_containers
            .iter()
            .enumerate()
            .map(|(i, c)| (ObjCContainerId(i as u32), c))
    }

    pub fn functions(&self) -> &[FunctionDecl] {
        &self.functions
    }

    pub fn constants(&self) -> &[ConstantDef] {
        &self.constants
    }

    // --- queries ---

    /// Follow typedef aliases down to a non-typedef type.
    ///
    /// A chain can only be longer than the number of typedefs in the index if
    /// it revisits one, so that length bounds the walk.
    pub fn unwrap_typedefs<'a>(&'a self, ty: &'a Type) -> Result<&'a Type> {
        let mut current = ty;
        let mut steps = 0usize;
        while let Type::Typedef(id) = current {
            if steps > self.typedefs.len() {
                let name = self
                    .typedef_def(*id)
                    .map(|d| d.name.clone())
                    .unwrap_or_else(|| format!("typedef#{}", id.0));
                return Err(NativeError::TypedefCycle { name });
            }
            let def = self.typedef_def(*id).ok_or_else(|| NativeError::UnknownType {
                name: format!("typedef#{}", id.0),
            })?;
            current = &def.aliased;
            steps += 1;
        }
        Ok(current)
    }

    /// The concrete return type of an Objective-C method declared in `container`.
    pub fn method_return_type(&self, method: &ObjCMethod, container: ObjCContainerId) -> Result<Type> {
        let decl = self
            .objc_container(container)
            .ok_or_else(|| NativeError::UnknownType {
                name: format!("objc-container#{}", container.0),
            })?;
        Ok(resolve_return_type(method, container, decl))
    }

    /// Render `ty` as a C type spelling, using declared names where available.
    pub fn c_spelling(&self, ty: &Type) -> String {
        match ty {
            Type::Void => "void".to_string(),
            Type::Primitive(p) => p.spelling().to_string(),
            Type::Record(id) => self
                .struct_decl(*id)
                .map(|d| d.spelling.clone())
                .unwrap_or_else(|| ty.to_string()),
            Type::Enum(id) => self
                .enum_def(*id)
                .map(|d| d.spelling.clone())
                .unwrap_or_else(|| ty.to_string()),
            Type::Typedef(id) => self
                .typedef_def(*id)
                .map(|d| d.name.clone())
                .unwrap_or_else(|| ty.to_string()),
            Type::Pointer {
                pointee,
                pointee_is_const,
            } => match pointee.as_ref() {
                Type::Function(ft) => {
                    let params: Vec<String> =
                        ft.param_types.iter().map(|p| self.c_spelling(p)).collect();
                    format!("{} (*)({})", self.c_spelling(&ft.return_type), params.join(", "))
                }
                inner if *pointee_is_const => format!("const {}*", self.c_spelling(inner)),
                inner => format!("{}*", self.c_spelling(inner)),
            },
            Type::Function(ft) => {
                let params: Vec<String> =
                    ft.param_types.iter().map(|p| self.c_spelling(p)).collect();
                format!("{} ({})", self.c_spelling(&ft.return_type), params.join(", "))
            }
            Type::Array { .. } => {
                // Outermost dimension is written first.
                let mut dims = String::new();
                let mut elem = ty;
                while let Type::Array { elem: inner, kind } = elem {
                    match kind {
                        ArrayKind::Const { length } => dims.push_str(&format!("[{length}]")),
                        ArrayKind::Incomplete => dims.push_str("[]"),
                    }
                    elem = inner.as_ref();
                }
                format!("{}{dims}", self.c_spelling(elem))
            }
            Type::ObjCObjectPointer { class, .. } => self
                .objc_container(*class)
                .map(|c| format!("{}*", c.name))
                .unwrap_or_else(|| "id".to_string()),
            Type::ObjCClassPointer { .. } => "Class".to_string(),
            Type::ObjCIdType { .. } | Type::ObjCInstanceType { .. } => "id".to_string(),
            Type::Unsupported => "void".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{Field, RecordKind};
    use crate::objc::ObjCContainer;
    use crate::types::Nullability;

    fn point_def() -> StructDef {
        StructDef {
            size: 8,
            align: 4,
            has_natural_layout: true,
            kind: RecordKind::Struct,
            fields: vec![
                Field {
                    name: "x".to_string(),
                    ty: Type::i32(),
                    offset: 0,
                    type_align: 4,
                },
                Field {
                    name: "y".to_string(),
                    ty: Type::i32(),
                    offset: 32,
                    type_align: 4,
                },
            ],
            bit_fields: Vec::new(),
        }
    }

    #[test]
    fn self_referential_struct() {
        let mut index = NativeIndex::new();
        let node = index.declare_struct("struct node");
        let def = StructDef {
            size: 8,
            align: 8,
            has_natural_layout: true,
            kind: RecordKind::Struct,
            fields: vec![Field {
                name: "next".to_string(),
                ty: Type::pointer_to(Type::Record(node)),
                offset: 0,
                type_align: 8,
            }],
            bit_fields: Vec::new(),
        };
        index.define_struct(node, def).unwrap();
        assert!(!index.struct_decl(node).unwrap().is_opaque());
        assert_eq!(index.declare_struct("struct node"), node);
    }

    #[test]
    fn unwrap_nested_typedefs() {
        let mut index = NativeIndex::new();
        let inner = index.add_typedef(TypedefDef {
            aliased: Type::i32(),
            name: "coord_t".to_string(),
        });
        let outer = index.add_typedef(TypedefDef {
            aliased: Type::Typedef(inner),
            name: "x_coord_t".to_string(),
        });
        let ty = Type::Typedef(outer);
        assert_eq!(index.unwrap_typedefs(&ty).unwrap(), &Type::i32());
        assert_eq!(index.unwrap_typedefs(&Type::f32()).unwrap(), &Type::f32());
    }

    #[test]
    fn typedef_cycle_is_reported() {
        let mut index = NativeIndex::new();
        let a = index.declare_typedef("a_t");
        let b = index.declare_typedef("b_t");
        index.set_typedef_target(a, Type::Typedef(b)).unwrap();
        index.set_typedef_target(b, Type::Typedef(a)).unwrap();
        let err = index.unwrap_typedefs(&Type::Typedef(a)).unwrap_err();
        assert!(matches!(err, NativeError::TypedefCycle { .. }));
    }

    #[test]
    fn self_typedef_cycle_is_reported() {
        let mut index = NativeIndex::new();
        let a = index.declare_typedef("loop_t");
        index.set_typedef_target(a, Type::Typedef(a)).unwrap();
        assert!(index.unwrap_typedefs(&Type::Typedef(a)).is_err());
    }

    #[test]
    fn c_spelling_uses_declared_names() {
        let mut index = NativeIndex::new();
        let point = index.add_struct("struct Point", Some(point_def()));
        let coord = index.add_typedef(TypedefDef {
            aliased: Type::i32(),
            name: "coord_t".to_string(),
        });
        assert_eq!(index.c_spelling(&Type::Record(point)), "struct Point");
        assert_eq!(index.c_spelling(&Type::Typedef(coord)), "coord_t");
        assert_eq!(
            index.c_spelling(&Type::const_pointer_to(Type::Record(point))),
            "const struct Point*"
        );
    }

    #[test]
    fn reindex_restores_lookups() {
        let mut index = NativeIndex::new();
        let point = index.add_struct("struct Point", Some(point_def()));
        let mut copy = NativeIndex {
            names: NameTable::default(),
            ..index.clone()
        };
        assert!(copy.struct_by_spelling("struct Point").is_none());
        copy.reindex();
        assert_eq!(copy.struct_by_spelling("struct Point"), Some(point));
    }

    #[test]
    fn method_return_type_through_index() {
        let mut index = NativeIndex::new();
        let proto = index.add_objc_container(ObjCContainer::protocol("Copying"));
        let method = ObjCMethod {
            selector: "copy".to_string(),
            encoding: String::new(),
            parameters: Vec::new(),
            return_type: Type::ObjCInstanceType {
                nullability: Nullability::Nullable,
            },
            is_class: false,
            ns_consumes_self: false,
            ns_returns_retained: true,
            is_optional: false,
            is_init: false,
        };
        let ty = index.method_return_type(&method, proto).unwrap();
        assert_eq!(
            ty,
            Type::ObjCIdType {
                nullability: Nullability::Nullable,
                protocols: vec![proto],
            }
        );
    }
}
