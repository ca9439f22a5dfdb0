//! Objective-C classes, protocols, methods and properties.

use serde::{Deserialize, Serialize};

use crate::decl::Parameter;
use crate::types::{ObjCContainerId, Type};

/// Distinguishes classes from protocols; both share [`ObjCContainer`]'s shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjCContainerKind {
    Class { base_class: Option<ObjCContainerId> },
    Protocol,
}

/// An Objective-C class or protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjCContainer {
    pub name: String,
    pub kind: ObjCContainerKind,
    /// Adopted protocols.
    pub protocols: Vec<ObjCContainerId>,
    pub methods: Vec<ObjCMethod>,
    pub properties: Vec<ObjCProperty>,
}

impl ObjCContainer {
    /// An empty class.
    pub fn class(name: &str, base_class: Option<ObjCContainerId>) -> Self {
        Self {
            name: name.to_string(),
            kind: ObjCContainerKind::Class { base_class },
            protocols: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// An empty protocol.
    pub fn protocol(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ObjCContainerKind::Protocol,
            protocols: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self.kind, ObjCContainerKind::Protocol)
    }

    /// The superclass of a class; always `None` for protocols.
    pub fn base_class(&self) -> Option<ObjCContainerId> {
        match self.kind {
            ObjCContainerKind::Class { base_class } => base_class,
            ObjCContainerKind::Protocol => None,
        }
    }

    /// Find a method by selector and class/instance side.
    pub fn method(&self, selector: &str, is_class: bool) -> Option<&ObjCMethod> {
        self.methods
            .iter()
            .find(|m| m.selector == selector && m.is_class == is_class)
    }
}

/// An Objective-C method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjCMethod {
    pub selector: String,
    /// Objective-C type encoding.
    pub encoding: String,
    pub parameters: Vec<Parameter>,
    pub return_type: Type,
    /// `+` method.
    pub is_class: bool,
    pub ns_consumes_self: bool,
    pub ns_returns_retained: bool,
    /// `@optional` protocol method.
    pub is_optional: bool,
    /// Member of the `init` family.
    pub is_init: bool,
}

impl ObjCMethod {
    pub fn returns_instancetype(&self) -> bool {
        matches!(self.return_type, Type::ObjCInstanceType { .. })
    }
}

/// An Objective-C property backed by accessor methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjCProperty {
    pub name: String,
    pub getter: ObjCMethod,
    pub setter: Option<ObjCMethod>,
}

impl ObjCProperty {
    /// The property's type as seen through `container`.
    pub fn property_type(&self, container_id: ObjCContainerId, container: &ObjCContainer) -> Type {
        resolve_return_type(&self.getter, container_id, container)
    }

    pub fn is_read_only(&self) -> bool {
        self.setter.is_none()
    }
}

/// The concrete return type of `method` when invoked on `container`.
///
/// `instancetype` becomes a pointer to the class itself, or an `id` qualified
/// by exactly the protocol. Every other return type is returned unchanged.
pub fn resolve_return_type(
    method: &ObjCMethod,
    container_id: ObjCContainerId,
    container: &ObjCContainer,
) -> Type {
    match &method.return_type {
        Type::ObjCInstanceType { nullability } => match container.kind {
            ObjCContainerKind::Class { .. } => Type::ObjCObjectPointer {
                class: container_id,
                nullability: *nullability,
                protocols: Vec::new(),
            },
            ObjCContainerKind::Protocol => Type::ObjCIdType {
                nullability: *nullability,
                protocols: vec![container_id],
            },
        },
        other => other.clone(),
    }
}
