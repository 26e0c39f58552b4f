//! kflat Layout Core
//!
//! Class layout and liveness analysis for compiling object-oriented
//! bytecode into flat, pointerless device kernels:
//! - **Reachability**: the methods, fields and array types a kernel's entry
//!   points transitively need (`reachability` module)
//! - **Classification**: each class's used fields split into instance/static
//!   × reference/value buckets in one canonical order (`class`, `sorter`)
//! - **Layout**: non-overlapping byte offsets and sizes for instance and
//!   static storage (`offset`), memoized per compile run (`registry`)
//!
//! The host program is read through the [`HostTypeModel`] and [`CallGraph`]
//! traits. Everything for one compile lives in a [`ClassRegistry`]; calling
//! [`ClassRegistry::finalize`] freezes it into a [`LayoutTable`] for code
//! generation.
//!
//! # Example
//!
//! ```rust,ignore
//! use kflat_layout::{ClassRegistry, ReachabilityWalker, MethodRef};
//!
//! let mut registry = ClassRegistry::new(&program);
//! ReachabilityWalker::new(&mut registry, &program)
//!     .walk(&[MethodRef::new("app.Kernel", "gpuMethod()V")])?;
//! let table = registry.finalize()?;
//! println!("{}", table.to_json_pretty()?);
//! ```

#![warn(rust_2018_idioms)]

// ============================================================================
// Modules
// ============================================================================

pub mod class;
pub mod config;
pub mod error;
pub mod field;
pub mod host;
pub mod method;
pub mod offset;
pub mod reachability;
pub mod registry;
pub mod sorter;
pub mod table;
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use class::{ClassDescriptor, ClassId, FieldBuckets};
pub use config::LayoutConfig;
pub use error::{LayoutError, LayoutResult};
pub use field::FieldDescriptor;
pub use host::{CallGraph, FieldRef, HostField, HostTypeModel, MethodFacts, ProgramModel};
pub use method::{MethodDescriptor, MethodRef};
pub use offset::{FieldOffset, OffsetCalculator};
pub use reachability::{ReachabilityReport, ReachabilityWalker};
pub use registry::ClassRegistry;
pub use sorter::{FieldPackingSorter, PackingPolicy};
pub use table::{ArrayTypeLayout, ClassLayout, FieldLayout, LayoutTable};
pub use types::{DeclaredType, PrimitiveType, TypeInfo, TypeKind, HANDLE_SIZE};
