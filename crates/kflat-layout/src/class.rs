//! Class descriptors
//!
//! A [`ClassDescriptor`] collects the fields and methods of one host class
//! that are reachable from a kernel. Collection happens during discovery;
//! the first classification query freezes the field set and splits it into
//! four buckets (instance/static × reference/value), each held in packing
//! order. Registering a field after that is an error.

use crate::error::{LayoutError, LayoutResult};
use crate::field::FieldDescriptor;
use crate::host::HostField;
use crate::method::{MethodDescriptor, MethodRef};
use crate::registry::ClassRegistry;
use crate::sorter::{FieldPackingSorter, PackingPolicy};
use crate::types::mangle_class_name;
use once_cell::unsync::OnceCell;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Index of a class within its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(pub u32);

impl ClassId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class{}", self.0)
    }
}

/// Classified fields, as indices into the descriptor's field list.
/// Every bucket is already in packing order.
#[derive(Debug, Clone, Default)]
pub struct FieldBuckets {
    instance_ref: Vec<usize>,
    instance_nonref: Vec<usize>,
    static_ref: Vec<usize>,
    static_nonref: Vec<usize>,
}

impl FieldBuckets {
    /// Total number of classified fields
    pub fn len(&self) -> usize {
        self.instance_ref.len()
            + self.instance_nonref.len()
            + self.static_ref.len()
            + self.static_nonref.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reachable fields and methods of one host class
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    id: ClassId,
    host_name: String,
    parent: Option<ClassId>,
    packing: PackingPolicy,
    /// Methods in registration order
    methods: Vec<MethodDescriptor>,
    method_index: FxHashSet<MethodRef>,
    /// Fields in registration order
    fields: Vec<FieldDescriptor>,
    field_index: FxHashMap<String, usize>,
    buckets: OnceCell<FieldBuckets>,
    static_size: OnceCell<u32>,
    used_members_found: bool,
    array_types_found: bool,
}

impl ClassDescriptor {
    /// Create a descriptor for the host class `host_name`
    pub fn new(id: ClassId, host_name: impl Into<String>) -> Self {
        Self {
            id,
            host_name: host_name.into(),
            parent: None,
            packing: PackingPolicy::default(),
            methods: Vec::new(),
            method_index: FxHashSet::default(),
            fields: Vec::new(),
            field_index: FxHashMap::default(),
            buckets: OnceCell::new(),
            static_size: OnceCell::new(),
            used_members_found: false,
            array_types_found: false,
        }
    }

    /// Set the direct parent class
    pub fn with_parent(mut self, parent: ClassId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set the packing policy used when classifying
    pub fn with_packing(mut self, packing: PackingPolicy) -> Self {
        self.packing = packing;
        self
    }

    pub fn id(&self) -> ClassId {
        self.id
    }

    pub fn parent(&self) -> Option<ClassId> {
        self.parent
    }

    /// Fully-qualified host name
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Device-side struct name
    pub fn name(&self) -> String {
        mangle_class_name(&self.host_name)
    }

    // ========================================================================
    // Discovery
    // ========================================================================

    /// Register a used field. Returns `false` if it was already registered.
    ///
    /// Fails with [`LayoutError::ClassFrozen`] once fields have been
    /// classified.
    pub fn add_field(&mut self, field: HostField) -> LayoutResult<bool> {
        if self.field_index.contains_key(&field.name) {
            return Ok(false);
        }
        if self.is_frozen() {
            return Err(LayoutError::ClassFrozen {
                class: self.host_name.clone(),
                field: field.name,
            });
        }
        self.field_index.insert(field.name.clone(), self.fields.len());
        self.fields.push(FieldDescriptor::new(self.id, field));
        Ok(true)
    }

    /// Register a used method. Returns `false` if it was already registered.
    pub fn add_method(&mut self, method: MethodRef) -> bool {
        if !self.method_index.insert(method.clone()) {
            return false;
        }
        self.methods.push(MethodDescriptor::new(self.id, method));
        true
    }

    /// Used methods, in registration order
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// Used fields, in registration order
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn has_method(&self, method: &MethodRef) -> bool {
        self.method_index.contains(method)
    }

    /// Marks the class's members as walked. Returns `true` the first time only.
    pub(crate) fn mark_used_members_found(&mut self) -> bool {
        !std::mem::replace(&mut self.used_members_found, true)
    }

    /// Marks the class's array types as walked. Returns `true` the first time only.
    pub(crate) fn mark_array_types_found(&mut self) -> bool {
        !std::mem::replace(&mut self.array_types_found, true)
    }

    pub fn used_members_found(&self) -> bool {
        self.used_members_found
    }

    // ========================================================================
    // Classification
    // ========================================================================

    /// Whether the field set has been classified and frozen
    pub fn is_frozen(&self) -> bool {
        self.buckets.get().is_some()
    }

    /// Classify the registered fields. Computed once; later calls return
    /// the cached buckets.
    pub fn determine_field_types(&self) -> &FieldBuckets {
        self.buckets.get_or_init(|| {
            let mut buckets = FieldBuckets::default();
            for (idx, field) in self.fields.iter().enumerate() {
                let bucket = match (field.is_ref_type(), field.is_instance()) {
                    (true, true) => &mut buckets.instance_ref,
                    (false, true) => &mut buckets.instance_nonref,
                    (true, false) => &mut buckets.static_ref,
                    (false, false) => &mut buckets.static_nonref,
                };
                bucket.push(idx);
            }

            let sorter = FieldPackingSorter::new(self.packing);
            for bucket in [
                &mut buckets.instance_ref,
                &mut buckets.instance_nonref,
                &mut buckets.static_ref,
                &mut buckets.static_nonref,
            ] {
                bucket.sort_by(|&a, &b| sorter.compare(&self.fields[a], &self.fields[b]));
            }

            log::debug!(
                "classified {}: {} instance ref, {} instance value, {} static ref, {} static value",
                self.host_name,
                buckets.instance_ref.len(),
                buckets.instance_nonref.len(),
                buckets.static_ref.len(),
                buckets.static_nonref.len()
            );
            buckets
        })
    }

    fn resolve(&self, indices: &[usize]) -> Vec<&FieldDescriptor> {
        indices.iter().map(|&i| &self.fields[i]).collect()
    }

    /// Instance reference fields, in packing order
    pub fn instance_ref_fields(&self) -> Vec<&FieldDescriptor> {
        self.resolve(&self.determine_field_types().instance_ref)
    }

    /// Instance value fields, in packing order
    pub fn instance_nonref_fields(&self) -> Vec<&FieldDescriptor> {
        self.resolve(&self.determine_field_types().instance_nonref)
    }

    /// Static reference fields, in packing order
    pub fn static_ref_fields(&self) -> Vec<&FieldDescriptor> {
        self.resolve(&self.determine_field_types().static_ref)
    }

    /// Static value fields, in packing order
    pub fn static_nonref_fields(&self) -> Vec<&FieldDescriptor> {
        self.resolve(&self.determine_field_types().static_nonref)
    }

    /// All used instance fields: references first, then values.
    /// This is the order instance offsets are assigned in.
    pub fn all_used_instance_fields(&self) -> Vec<&FieldDescriptor> {
        let buckets = self.determine_field_types();
        buckets
            .instance_ref
            .iter()
            .chain(&buckets.instance_nonref)
            .map(|&i| &self.fields[i])
            .collect()
    }

    /// All used static fields: references first, then values
    pub fn all_used_static_fields(&self) -> Vec<&FieldDescriptor> {
        let buckets = self.determine_field_types();
        buckets
            .static_ref
            .iter()
            .chain(&buckets.static_nonref)
            .map(|&i| &self.fields[i])
            .collect()
    }

    /// Number of instance reference fields
    pub fn ref_field_count(&self) -> usize {
        self.determine_field_types().instance_ref.len()
    }

    /// Look up a used field by name, instance fields first.
    /// `None` is a normal answer for optional fields.
    pub fn get_field(&self, name: &str) -> Option<&FieldDescriptor> {
        let buckets = self.determine_field_types();
        buckets
            .instance_ref
            .iter()
            .chain(&buckets.instance_nonref)
            .chain(&buckets.static_ref)
            .chain(&buckets.static_nonref)
            .map(|&i| &self.fields[i])
            .find(|f| f.name() == name)
    }

    /// Instance size from the registry's memoized layout. 0 if no layout
    /// has been computed for this class; see [`ClassRegistry::class_size`].
    pub fn size(&self, registry: &ClassRegistry<'_>) -> u32 {
        match registry.cached_offset_calculator(self.id) {
            Some(calc) => calc.size(),
            None => {
                log::warn!("no layout computed for {}, reporting size 0", self.host_name);
                0
            }
        }
    }

    /// Size of the static block: the sum of the static fields' storage sizes.
    /// Instance fields never contribute.
    pub fn calculate_static_field_size(&self) -> u32 {
        *self.static_size.get_or_init(|| {
            self.all_used_static_fields()
                .iter()
                .map(|f| f.size())
                .sum()
        })
    }
}

impl PartialEq for ClassDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.host_name == other.host_name
    }
}

impl Eq for ClassDescriptor {}

impl Hash for ClassDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host_name.hash(state);
    }
}

impl fmt::Display for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
