//! Layout Table
//!
//! The frozen result of a compile run's layout phase: per class, the four
//! sorted field buckets with offsets, instance size, static block size and
//! device name, plus the used array types. This is everything code
//! generation and host-side serialization need to agree on.

use crate::class::ClassDescriptor;
use crate::config::LayoutConfig;
use crate::error::{LayoutError, LayoutResult};
use crate::field::FieldDescriptor;
use crate::offset::{FieldOffset, OffsetCalculator};
use crate::registry::ClassRegistry;
use crate::types::{DeclaredType, TypeInfo, TypeKind};
use serde::{Deserialize, Serialize};

/// One laid-out field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLayout {
    pub name: String,
    /// Host spelling of the declared type
    pub host_type: String,
    /// Device storage type
    pub device_type: String,
    pub kind: TypeKind,
    pub size: u32,
    /// Offset within the instance, or within the static block for statics
    pub offset: u32,
}

/// Layout of one class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassLayout {
    pub host_name: String,
    pub device_name: String,
    /// Host name of the direct parent
    pub parent: Option<String>,
    /// Instance size including ancestors and padding
    pub instance_size: u32,
    /// Sum of static field sizes
    pub static_size: u32,
    pub ref_field_count: usize,
    pub instance_ref_fields: Vec<FieldLayout>,
    pub instance_nonref_fields: Vec<FieldLayout>,
    pub static_ref_fields: Vec<FieldLayout>,
    pub static_nonref_fields: Vec<FieldLayout>,
}

impl ClassLayout {
    /// Own instance fields in offset order
    pub fn instance_fields(&self) -> impl Iterator<Item = &FieldLayout> {
        self.instance_ref_fields
            .iter()
            .chain(&self.instance_nonref_fields)
    }

    /// Static fields in static-block order
    pub fn static_fields(&self) -> impl Iterator<Item = &FieldLayout> {
        self.static_ref_fields.iter().chain(&self.static_nonref_fields)
    }

    /// Field by name, instance fields first
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.instance_fields()
            .chain(self.static_fields())
            .find(|f| f.name == name)
    }
}

/// A used array type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayTypeLayout {
    pub host_name: String,
    pub device_name: String,
    /// Device storage type of one element
    pub element_device_type: String,
    pub element_kind: TypeKind,
    pub element_size: u32,
}

/// Frozen layouts for a whole compile run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutTable {
    pub config: LayoutConfig,
    /// Classes in discovery order; ancestors precede descendants
    pub classes: Vec<ClassLayout>,
    pub array_types: Vec<ArrayTypeLayout>,
}

impl LayoutTable {
    /// Snapshot a registry whose classes are all laid out
    pub(crate) fn build(registry: &ClassRegistry<'_>) -> LayoutResult<Self> {
        let mut classes = Vec::with_capacity(registry.len());
        for class in registry.classes() {
            let calc = registry.cached_offset_calculator(class.id()).ok_or_else(|| {
                LayoutError::LayoutUnavailable {
                    class: class.host_name().to_string(),
                    reason: "not laid out before snapshot".to_string(),
                }
            })?;
            let parent = class
                .parent()
                .and_then(|p| registry.class(p))
                .map(|p| p.host_name().to_string());
            classes.push(class_layout(class, calc, parent));
        }

        let array_types = registry
            .used_array_types()
            .iter()
            .filter_map(array_layout)
            .collect();

        Ok(Self {
            config: *registry.config(),
            classes,
            array_types,
        })
    }

    /// Class layout by host name
    pub fn class(&self, host_name: &str) -> Option<&ClassLayout> {
        self.classes.iter().find(|c| c.host_name == host_name)
    }

    pub fn to_json(&self) -> LayoutResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> LayoutResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> LayoutResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn class_layout(class: &ClassDescriptor, calc: &OffsetCalculator, parent: Option<String>) -> ClassLayout {
    let instance = |fields: Vec<&FieldDescriptor>| fields_with_offsets(fields, calc.field_offsets());
    let statics = |fields: Vec<&FieldDescriptor>| fields_with_offsets(fields, calc.static_field_offsets());

    ClassLayout {
        host_name: class.host_name().to_string(),
        device_name: class.name(),
        parent,
        instance_size: calc.size(),
        static_size: class.calculate_static_field_size(),
        ref_field_count: class.ref_field_count(),
        instance_ref_fields: instance(class.instance_ref_fields()),
        instance_nonref_fields: instance(class.instance_nonref_fields()),
        static_ref_fields: statics(class.static_ref_fields()),
        static_nonref_fields: statics(class.static_nonref_fields()),
    }
}

fn fields_with_offsets(fields: Vec<&FieldDescriptor>, offsets: &[FieldOffset]) -> Vec<FieldLayout> {
    fields
        .into_iter()
        .filter_map(|field| {
            let placed = offsets.iter().find(|o| o.name == field.name())?;
            Some(FieldLayout {
                name: field.name().to_string(),
                host_type: field.declared_type().to_string(),
                device_type: field.type_info().device_name.clone(),
                kind: field.kind(),
                size: placed.size,
                offset: placed.offset,
            })
        })
        .collect()
}

fn array_layout(ty: &DeclaredType) -> Option<ArrayTypeLayout> {
    let element = TypeInfo::classify(ty.element()?);
    Some(ArrayTypeLayout {
        host_name: ty.to_string(),
        device_name: ty.device_name(),
        element_device_type: element.device_name,
        element_kind: element.kind,
        element_size: element.size,
    })
}
