//! Class Registry
//!
//! The per-compile-run authority over class descriptors. It owns every
//! [`ClassDescriptor`] (one per host class, keyed by fully-qualified name),
//! the used array types, the set of walked methods, and the memoized
//! [`OffsetCalculator`] for each class.
//!
//! A registry is created for one compile and dropped afterwards. It is not
//! `Sync`: lazy classification and layout memoization assume one thread.

use crate::class::{ClassDescriptor, ClassId};
use crate::config::LayoutConfig;
use crate::error::{LayoutError, LayoutResult};
use crate::host::{FieldRef, HostTypeModel};
use crate::method::MethodRef;
use crate::offset::OffsetCalculator;
use crate::table::LayoutTable;
use crate::types::DeclaredType;
use rustc_hash::{FxHashMap, FxHashSet};

/// Class descriptors and layouts for one compile run
pub struct ClassRegistry<'h> {
    /// Host type model everything is resolved against
    host: &'h dyn HostTypeModel,
    /// Layout settings
    config: LayoutConfig,
    /// Descriptors indexed by ClassId. Ancestors always precede descendants.
    classes: Vec<ClassDescriptor>,
    /// Host name → ClassId
    name_to_id: FxHashMap<String, ClassId>,
    /// Memoized layouts
    offsets: FxHashMap<ClassId, OffsetCalculator>,
    /// Used array types in discovery order
    array_types: Vec<DeclaredType>,
    array_type_index: FxHashSet<DeclaredType>,
    /// Methods the reachability walk has already expanded
    walked_methods: FxHashSet<MethodRef>,
}

impl<'h> ClassRegistry<'h> {
    /// Create an empty registry with default layout settings
    pub fn new(host: &'h dyn HostTypeModel) -> Self {
        Self::with_config(host, LayoutConfig::default())
    }

    /// Create an empty registry
    pub fn with_config(host: &'h dyn HostTypeModel, config: LayoutConfig) -> Self {
        Self {
            host,
            config,
            classes: Vec::new(),
            name_to_id: FxHashMap::default(),
            offsets: FxHashMap::default(),
            array_types: Vec::new(),
            array_type_index: FxHashSet::default(),
            walked_methods: FxHashSet::default(),
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn host(&self) -> &'h dyn HostTypeModel {
        self.host
    }

    // ========================================================================
    // Descriptor Lookup
    // ========================================================================

    /// Get the descriptor id for `host_name`, creating it (and descriptors
    /// for its whole ancestor chain) on first lookup.
    pub fn get_class_descriptor(&mut self, host_name: &str) -> LayoutResult<ClassId> {
        if let Some(&id) = self.name_to_id.get(host_name) {
            return Ok(id);
        }
        if !self.host.contains_class(host_name) {
            return Err(LayoutError::UnknownClass {
                name: host_name.to_string(),
            });
        }
        let ancestors = self
            .host
            .ancestors(host_name)
            .ok_or_else(|| LayoutError::UnresolvedAncestor {
                class: host_name.to_string(),
            })?;

        // Root first, so each parent exists before its child
        let mut parent: Option<ClassId> = None;
        for name in ancestors.iter().rev().map(String::as_str).chain([host_name]) {
            parent = Some(match self.name_to_id.get(name) {
                Some(&id) => id,
                None => self.insert_class(name, parent),
            });
        }
        parent.ok_or_else(|| LayoutError::UnknownClass {
            name: host_name.to_string(),
        })
    }

    fn insert_class(&mut self, name: &str, parent: Option<ClassId>) -> ClassId {
        let id = ClassId::new(self.classes.len() as u32);
        let mut class = ClassDescriptor::new(id, name).with_packing(self.config.packing);
        if let Some(parent) = parent {
            class = class.with_parent(parent);
        }
        log::debug!("new class descriptor {} for {}", id, name);
        self.classes.push(class);
        self.name_to_id.insert(name.to_string(), id);
        id
    }

    /// Look up an existing descriptor id without creating one
    pub fn lookup(&self, host_name: &str) -> Option<ClassId> {
        self.name_to_id.get(host_name).copied()
    }

    pub fn class(&self, id: ClassId) -> Option<&ClassDescriptor> {
        self.classes.get(id.index())
    }

    pub fn class_mut(&mut self, id: ClassId) -> Option<&mut ClassDescriptor> {
        self.classes.get_mut(id.index())
    }

    fn class_or_err(&self, id: ClassId) -> LayoutResult<&ClassDescriptor> {
        self.class(id).ok_or(LayoutError::UnknownClassId(id.as_u32()))
    }

    /// Descriptor by host name
    pub fn class_by_name(&self, host_name: &str) -> Option<&ClassDescriptor> {
        self.lookup(host_name).and_then(|id| self.class(id))
    }

    /// All descriptors in discovery order
    pub fn classes(&self) -> impl Iterator<Item = &ClassDescriptor> {
        self.classes.iter()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// `id` and its ancestors, root first
    pub fn ancestry(&self, id: ClassId) -> Vec<ClassId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(cid) = current {
            chain.push(cid);
            current = self.class(cid).and_then(|c| c.parent());
        }
        chain.reverse();
        chain
    }

    // ========================================================================
    // Discovery
    // ========================================================================

    /// Register a used method on its declaring class.
    /// Returns `true` if the method is new.
    pub fn register_method(&mut self, method: &MethodRef) -> LayoutResult<bool> {
        let id = self.get_class_descriptor(&method.class)?;
        Ok(self.classes[id.index()].add_method(method.clone()))
    }

    /// Register a field access. The field is recorded on the class that
    /// declares it, which may be an ancestor of `access.class`. A field of
    /// class type brings that class into the registry; a field of array type
    /// also records the array type.
    ///
    /// Returns `true` if the field is new.
    pub fn register_field_access(&mut self, access: &FieldRef) -> LayoutResult<bool> {
        let through = self.get_class_descriptor(&access.class)?;

        let mut declaring = None;
        for cid in self.ancestry(through).into_iter().rev() {
            let name = self.classes[cid.index()].host_name();
            if let Some(field) = self.host.declared_field(name, &access.name) {
                declaring = Some((cid, field.clone()));
                break;
            }
        }
        let (owner, field) = declaring.ok_or_else(|| LayoutError::UnknownField {
            class: access.class.clone(),
            field: access.name.clone(),
        })?;

        let ty = field.ty.clone();
        let added = self.classes[owner.index()].add_field(field)?;
        if added {
            if let Some(class) = ty.referenced_class() {
                self.get_class_descriptor(class)?;
            }
            if ty.is_array() {
                self.record_array_type(&ty)?;
            }
        }
        Ok(added)
    }

    /// Record a used array type and every array type nested in it
    /// (`T[][]` also records `T[]`). Non-array types are ignored.
    ///
    /// Returns how many array types were new.
    pub fn record_array_type(&mut self, ty: &DeclaredType) -> LayoutResult<usize> {
        let mut added = 0;
        let mut current = ty;
        while let DeclaredType::Array(elem) = current {
            if self.array_type_index.insert(current.clone()) {
                log::trace!("array type {}", current);
                self.array_types.push(current.clone());
                added += 1;
            }
            current = elem;
        }
        if added > 0 {
            if let Some(class) = ty.referenced_class() {
                self.get_class_descriptor(class)?;
            }
        }
        Ok(added)
    }

    /// Used array types, in discovery order
    pub fn used_array_types(&self) -> &[DeclaredType] {
        &self.array_types
    }

    /// Mark a method as walked. Returns `true` the first time.
    pub(crate) fn mark_method_walked(&mut self, method: &MethodRef) -> bool {
        if self.walked_methods.contains(method) {
            return false;
        }
        self.walked_methods.insert(method.clone());
        true
    }

    pub fn is_method_walked(&self, method: &MethodRef) -> bool {
        self.walked_methods.contains(method)
    }

    /// Number of methods walked so far
    pub fn walked_method_count(&self) -> usize {
        self.walked_methods.len()
    }

    // ========================================================================
    // Layout
    // ========================================================================

    /// Classify every class. Afterwards no class accepts new fields.
    pub fn classify_all(&self) {
        for class in &self.classes {
            class.determine_field_types();
        }
    }

    /// Layout of `id`, computed on first request (ancestors first) and
    /// memoized. Every class in the chain must be classified.
    pub fn get_offset_calculator(&mut self, id: ClassId) -> LayoutResult<&OffsetCalculator> {
        let target = self.class_or_err(id)?.host_name().to_string();

        if !self.offsets.contains_key(&id) {
            let mut parent_size = None;
            for cid in self.ancestry(id) {
                if let Some(calc) = self.offsets.get(&cid) {
                    parent_size = Some(calc.size());
                    continue;
                }
                let class = &self.classes[cid.index()];
                let calc = match OffsetCalculator::compute(class, parent_size, &self.config) {
                    Ok(calc) => calc,
                    Err(LayoutError::NotClassified { class }) if cid != id => {
                        return Err(LayoutError::LayoutUnavailable {
                            class: target,
                            reason: format!("ancestor {} has not been classified", class),
                        });
                    }
                    Err(e) => return Err(e),
                };
                parent_size = Some(calc.size());
                self.offsets.insert(cid, calc);
            }
        }

        self.offsets
            .get(&id)
            .ok_or_else(|| LayoutError::LayoutUnavailable {
                class: target,
                reason: "layout computation produced no result".to_string(),
            })
    }

    /// Memoized layout of `id`, if one has been computed
    pub fn cached_offset_calculator(&self, id: ClassId) -> Option<&OffsetCalculator> {
        self.offsets.get(&id)
    }

    /// Instance size of `id`, computing its layout if possible
    pub fn try_class_size(&mut self, id: ClassId) -> LayoutResult<u32> {
        self.get_offset_calculator(id).map(|calc| calc.size())
    }

    /// Instance size of `id`, or 0 when no layout can be produced.
    ///
    /// 0 means "unknown" here, not "empty". Use [`Self::try_class_size`] to
    /// tell the two apart.
    pub fn class_size(&mut self, id: ClassId) -> u32 {
        match self.try_class_size(id) {
            Ok(size) => size,
            Err(e) => {
                log::warn!("size of {} unavailable, reporting 0: {}", id, e);
                0
            }
        }
    }

    /// Classify everything, lay out every class and return the frozen
    /// snapshot handed to code generation.
    pub fn finalize(&mut self) -> LayoutResult<LayoutTable> {
        self.classify_all();
        for idx in 0..self.classes.len() {
            self.get_offset_calculator(ClassId::new(idx as u32))?;
        }
        LayoutTable::build(self)
    }
}

impl std::fmt::Debug for ClassRegistry<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("config", &self.config)
            .field("classes", &self.classes.len())
            .field("layouts", &self.offsets.len())
            .field("array_types", &self.array_types)
            .finish()
    }
}
