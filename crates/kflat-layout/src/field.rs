//! Field descriptors

use crate::class::ClassId;
use crate::host::HostField;
use crate::types::{DeclaredType, TypeInfo, TypeKind};
use serde::Serialize;

/// A used field of a class.
///
/// Immutable once created. Identity is the owning class plus the field name.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDescriptor {
    name: String,
    declared_type: DeclaredType,
    type_info: TypeInfo,
    is_static: bool,
    /// Back-reference to the declaring class (by id, not owned)
    owner: ClassId,
}

impl FieldDescriptor {
    /// Create a descriptor for a host field declared on `owner`
    pub fn new(owner: ClassId, field: HostField) -> Self {
        let type_info = TypeInfo::classify(&field.ty);
        Self {
            name: field.name,
            declared_type: field.ty,
            type_info,
            is_static: field.is_static,
            owner,
        }
    }

    /// Field name, unique within the owning class
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type as declared in the host program
    pub fn declared_type(&self) -> &DeclaredType {
        &self.declared_type
    }

    /// Device storage facts
    pub fn type_info(&self) -> &TypeInfo {
        &self.type_info
    }

    pub fn kind(&self) -> TypeKind {
        self.type_info.kind
    }

    /// Storage size in bytes
    pub fn size(&self) -> u32 {
        self.type_info.size
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn is_instance(&self) -> bool {
        !self.is_static
    }

    pub fn is_ref_type(&self) -> bool {
        self.type_info.is_ref_type()
    }

    /// Declaring class
    pub fn owner(&self) -> ClassId {
        self.owner
    }
}

impl PartialEq for FieldDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.name == other.name
    }
}

impl Eq for FieldDescriptor {}

impl std::hash::Hash for FieldDescriptor {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.owner.hash(state);
        self.name.hash(state);
    }
}
