//! Reachability Walk
//!
//! Computes the methods, fields and array types a kernel needs, starting
//! from its entry methods. The walk is a breadth-first worklist over
//! methods; the registry remembers which methods have been expanded, so
//! cycles in the call graph terminate and walking the same entries again
//! changes nothing.

use crate::class::ClassId;
use crate::error::{LayoutError, LayoutResult};
use crate::host::CallGraph;
use crate::method::MethodRef;
use crate::registry::ClassRegistry;
use std::collections::VecDeque;

/// What a walk newly discovered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReachabilityReport {
    /// Methods expanded
    pub methods: usize,
    /// Fields registered
    pub fields: usize,
    /// Array types recorded
    pub array_types: usize,
    /// Class descriptors created
    pub classes: usize,
}

impl ReachabilityReport {
    /// Whether the walk found nothing new
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn merge(&mut self, other: ReachabilityReport) {
        self.methods += other.methods;
        self.fields += other.fields;
        self.array_types += other.array_types;
        self.classes += other.classes;
    }
}

/// Walks the call graph and records what it reaches in a registry
pub struct ReachabilityWalker<'r, 'h, 'g> {
    registry: &'r mut ClassRegistry<'h>,
    graph: &'g dyn CallGraph,
}

impl<'r, 'h, 'g> ReachabilityWalker<'r, 'h, 'g> {
    /// Create a walker over `graph` that records into `registry`
    pub fn new(registry: &'r mut ClassRegistry<'h>, graph: &'g dyn CallGraph) -> Self {
        Self { registry, graph }
    }

    /// Walk everything reachable from `entries`.
    ///
    /// Missing call-graph or host facts abort the walk.
    pub fn walk(&mut self, entries: &[MethodRef]) -> LayoutResult<ReachabilityReport> {
        let classes_before = self.registry.len();
        let arrays_before = self.registry.used_array_types().len();
        let mut report = ReachabilityReport::default();
        let mut worklist: VecDeque<MethodRef> = entries.iter().cloned().collect();

        while let Some(method) = worklist.pop_front() {
            if self.registry.is_method_walked(&method) {
                continue;
            }
            let facts = self
                .graph
                .facts(&method)
                .ok_or_else(|| LayoutError::UnknownMethod {
                    method: method.to_string(),
                })?;
            self.registry.register_method(&method)?;
            self.registry.mark_method_walked(&method);
            log::trace!(
                "walk {}: {} calls, {} fields, {} array types",
                method,
                facts.calls.len(),
                facts.fields.len(),
                facts.array_types.len()
            );

            report.methods += 1;

            for field in &facts.fields {
                if self.registry.register_field_access(field)? {
                    report.fields += 1;
                }
            }
            for ty in &facts.array_types {
                self.registry.record_array_type(ty)?;
            }
            for callee in &facts.calls {
                if !self.registry.is_method_walked(callee) {
                    worklist.push_back(callee.clone());
                }
            }
        }

        report.classes = self.registry.len() - classes_before;
        report.array_types = self.registry.used_array_types().len() - arrays_before;
        log::debug!(
            "reachability: {} methods, {} fields, {} array types, {} classes",
            report.methods,
            report.fields,
            report.array_types,
            report.classes
        );
        Ok(report)
    }

    /// Walk from every method registered on `class`. Only the first call
    /// per class does anything.
    pub fn walk_class(&mut self, class: ClassId) -> LayoutResult<ReachabilityReport> {
        let descriptor = self
            .registry
            .class_mut(class)
            .ok_or(LayoutError::UnknownClassId(class.as_u32()))?;
        if !descriptor.mark_used_members_found() {
            return Ok(ReachabilityReport::default());
        }
        let entries: Vec<MethodRef> = descriptor
            .methods()
            .iter()
            .map(|m| m.method_ref().clone())
            .collect();
        self.walk(&entries)
    }

    /// Record the array types used by the methods registered on `class`,
    /// without following calls. Only the first call per class does anything.
    pub fn walk_class_array_types(&mut self, class: ClassId) -> LayoutResult<ReachabilityReport> {
        let descriptor = self
            .registry
            .class_mut(class)
            .ok_or(LayoutError::UnknownClassId(class.as_u32()))?;
        if !descriptor.mark_array_types_found() {
            return Ok(ReachabilityReport::default());
        }
        let methods: Vec<MethodRef> = descriptor
            .methods()
            .iter()
            .map(|m| m.method_ref().clone())
            .collect();

        let classes_before = self.registry.len();
        let arrays_before = self.registry.used_array_types().len();
        for method in &methods {
            let facts = self
                .graph
                .facts(method)
                .ok_or_else(|| LayoutError::UnknownMethod {
                    method: method.to_string(),
                })?;
            for ty in &facts.array_types {
                self.registry.record_array_type(ty)?;
            }
        }
        Ok(ReachabilityReport {
            array_types: self.registry.used_array_types().len() - arrays_before,
            classes: self.registry.len() - classes_before,
            ..ReachabilityReport::default()
        })
    }

    /// Walk every class currently in the registry, repeating until no walk
    /// adds a class.
    pub fn walk_all_classes(&mut self) -> LayoutResult<ReachabilityReport> {
        let mut report = ReachabilityReport::default();
        let mut next = 0;
        while next < self.registry.len() {
            let id = ClassId::new(next as u32);
            report.merge(self.walk_class(id)?);
            report.merge(self.walk_class_array_types(id)?);
            next += 1;
        }
        Ok(report)
    }
}
