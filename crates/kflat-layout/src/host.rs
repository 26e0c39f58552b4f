//! Host program model
//!
//! The layout core reads everything it knows about the host program through
//! two traits: [`HostTypeModel`] for classes and their declared fields, and
//! [`CallGraph`] for per-method facts from whole-program analysis.
//! [`ProgramModel`] is an in-memory implementation of both.

use crate::method::MethodRef;
use crate::types::DeclaredType;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Host Facts
// ============================================================================

/// A field as declared in the host program
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostField {
    /// Field name
    pub name: String,
    /// Declared type
    pub ty: DeclaredType,
    /// Class-level (static) field
    pub is_static: bool,
}

impl HostField {
    /// Create a field
    pub fn new(name: impl Into<String>, ty: DeclaredType, is_static: bool) -> Self {
        Self {
            name: name.into(),
            ty,
            is_static,
        }
    }

    /// Create a per-instance field
    pub fn instance(name: impl Into<String>, ty: DeclaredType) -> Self {
        Self::new(name, ty, false)
    }

    /// Create a static field
    pub fn class_level(name: impl Into<String>, ty: DeclaredType) -> Self {
        Self::new(name, ty, true)
    }
}

/// A field access as the call graph reports it: `class.name`.
///
/// `class` is the class the access goes through, which may be a subclass of
/// the class that declares the field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldRef {
    /// Class the field is accessed through
    pub class: String,
    /// Field name
    pub name: String,
}

impl FieldRef {
    pub fn new(class: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.name)
    }
}

/// What one method does, as far as layout is concerned
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodFacts {
    /// Methods this one may invoke
    pub calls: Vec<MethodRef>,
    /// Fields it reads or writes
    pub fields: Vec<FieldRef>,
    /// Array types it allocates or indexes
    pub array_types: Vec<DeclaredType>,
}

impl MethodFacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an invoked method
    pub fn calls(mut self, method: MethodRef) -> Self {
        self.calls.push(method);
        self
    }

    /// Add an accessed field
    pub fn accesses(mut self, field: FieldRef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a used array type
    pub fn uses_array(mut self, ty: DeclaredType) -> Self {
        self.array_types.push(ty);
        self
    }
}

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Read-only view of the host type hierarchy
pub trait HostTypeModel {
    /// Whether the class exists
    fn contains_class(&self, class: &str) -> bool;

    /// Ancestors of `class`, direct parent first. `None` if the chain cannot
    /// be resolved.
    fn ancestors(&self, class: &str) -> Option<Vec<String>>;

    /// Fields declared directly on `class`, in declaration order
    fn declared_fields(&self, class: &str) -> Option<&[HostField]>;

    /// A field declared directly on `class`
    fn declared_field(&self, class: &str, name: &str) -> Option<&HostField> {
        self.declared_fields(class)?.iter().find(|f| f.name == name)
    }
}

/// Per-method facts from whole-program analysis
pub trait CallGraph {
    /// Facts for `method`, or `None` if the analysis never saw it
    fn facts(&self, method: &MethodRef) -> Option<&MethodFacts>;
}

// ============================================================================
// In-memory Program Model
// ============================================================================

#[derive(Debug, Clone, Default)]
struct HostClass {
    parent: Option<String>,
    fields: Vec<HostField>,
}

/// An in-memory host program: classes, fields, and method facts
#[derive(Debug, Clone, Default)]
pub struct ProgramModel {
    classes: FxHashMap<String, HostClass>,
    methods: FxHashMap<MethodRef, MethodFacts>,
}

impl ProgramModel {
    /// Create an empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a class with an optional parent
    pub fn declare_class(&mut self, name: &str, parent: Option<&str>) -> &mut Self {
        let class = self.classes.entry(name.to_string()).or_default();
        class.parent = parent.map(str::to_string);
        self
    }

    /// Declare a field on `class`, creating the class as a root if needed.
    /// Redeclaring a field replaces it.
    pub fn declare_field(&mut self, class: &str, field: HostField) -> &mut Self {
        let fields = &mut self.classes.entry(class.to_string()).or_default().fields;
        match fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => fields.push(field),
        }
        self
    }

    /// Record facts for a method
    pub fn declare_method(&mut self, method: MethodRef, facts: MethodFacts) -> &mut Self {
        self.methods.insert(method, facts);
        self
    }

    /// Number of declared classes
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }
}

impl HostTypeModel for ProgramModel {
    fn contains_class(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    fn ancestors(&self, class: &str) -> Option<Vec<String>> {
        let mut chain = Vec::new();
        let mut seen = FxHashSet::default();
        seen.insert(class);
        let mut current = self.classes.get(class)?;
        while let Some(parent) = &current.parent {
            // A cycle or a dangling parent leaves the chain unresolvable
            if !seen.insert(parent.as_str()) {
                return None;
            }
            current = self.classes.get(parent)?;
            chain.push(parent.clone());
        }
        Some(chain)
    }

    fn declared_fields(&self, class: &str) -> Option<&[HostField]> {
        self.classes.get(class).map(|c| c.fields.as_slice())
    }
}

impl CallGraph for ProgramModel {
    fn facts(&self, method: &MethodRef) -> Option<&MethodFacts> {
        self.methods.get(method)
    }
}
