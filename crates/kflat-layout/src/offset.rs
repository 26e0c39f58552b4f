//! Offset Calculation
//!
//! Assigns byte offsets to a class's own used instance fields, starting
//! after its parent's instance layout, and to its static fields inside the
//! static block. Fields are taken in classification order, so offsets
//! never overlap and never go backwards.

use crate::class::{ClassDescriptor, ClassId};
use crate::config::LayoutConfig;
use crate::error::{LayoutError, LayoutResult};
use crate::field::FieldDescriptor;
use serde::Serialize;

/// Where one field lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldOffset {
    /// Field name
    pub name: String,
    /// Byte offset from the start of the instance (or static block)
    pub offset: u32,
    /// Storage size in bytes
    pub size: u32,
}

/// Instance and static layout of one class
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OffsetCalculator {
    class: ClassId,
    base: u32,
    size: u32,
    fields: Vec<FieldOffset>,
    static_fields: Vec<FieldOffset>,
    static_extent: u32,
}

impl OffsetCalculator {
    /// Compute the layout of `class`.
    ///
    /// `parent_size` is the instance size of the direct parent, or `None`
    /// for a root class (which starts after the object header instead).
    /// The class must already be classified.
    pub fn compute(
        class: &ClassDescriptor,
        parent_size: Option<u32>,
        config: &LayoutConfig,
    ) -> LayoutResult<Self> {
        if !class.is_frozen() {
            return Err(LayoutError::NotClassified {
                class: class.host_name().to_string(),
            });
        }

        let overflow = |block: &str| LayoutError::LayoutUnavailable {
            class: class.host_name().to_string(),
            reason: format!("{} block exceeds the 32-bit offset range", block),
        };
        let base = parent_size.unwrap_or(config.object_header_size);
        let (fields, end) =
            place(class.all_used_instance_fields(), base, config).ok_or_else(|| overflow("instance"))?;
        let size = align_up(end, config.object_alignment).ok_or_else(|| overflow("instance"))?;
        let (static_fields, static_extent) =
            place(class.all_used_static_fields(), 0, config).ok_or_else(|| overflow("static"))?;

        log::debug!(
            "layout {}: base {}, size {}, {} fields, static block {}",
            class.host_name(),
            base,
            size,
            fields.len(),
            static_extent
        );

        Ok(Self {
            class: class.id(),
            base,
            size,
            fields,
            static_fields,
            static_extent,
        })
    }

    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Total instance size, including ancestors and padding
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Offset of the first own field (end of the parent's layout)
    pub fn base_offset(&self) -> u32 {
        self.base
    }

    /// Own instance fields in offset order
    pub fn field_offsets(&self) -> &[FieldOffset] {
        &self.fields
    }

    /// Static fields in offset order
    pub fn static_field_offsets(&self) -> &[FieldOffset] {
        &self.static_fields
    }

    /// Bytes spanned by the static block, including alignment padding
    pub fn static_extent(&self) -> u32 {
        self.static_extent
    }

    /// Offset of an own instance field
    pub fn offset_of(&self, name: &str) -> Option<u32> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.offset)
    }

    /// Offset of a static field within the static block
    pub fn static_offset_of(&self, name: &str) -> Option<u32> {
        self.static_fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.offset)
    }
}

/// Lay fields out one after another from `start`. Returns the offsets and
/// the end of the last field, or `None` if the block overflows `u32`.
fn place(
    fields: Vec<&FieldDescriptor>,
    start: u32,
    config: &LayoutConfig,
) -> Option<(Vec<FieldOffset>, u32)> {
    let mut offset = start;
    let mut placed = Vec::with_capacity(fields.len());
    for field in fields {
        let size = field.size();
        if config.align_fields {
            offset = align_up(offset, size)?;
        }
        placed.push(FieldOffset {
            name: field.name().to_string(),
            offset,
            size,
        });
        offset = offset.checked_add(size)?;
    }
    Some((placed, offset))
}

/// Round `value` up to a multiple of `align` (a power of two, or 0/1 for
/// none). `None` on overflow.
pub(crate) fn align_up(value: u32, align: u32) -> Option<u32> {
    if align <= 1 {
        return Some(value);
    }
    Some(value.checked_add(align - 1)? & !(align - 1))
}
