//! Device-side type classification
//!
//! Maps declared host types onto device storage. Reference types become a
//! fixed-size handle into the flattened heap; primitives are stored inline
//! at their natural width.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Size in bytes of a heap handle on the device
pub const HANDLE_SIZE: u32 = 4;

/// Device type that stores a heap handle
pub const HANDLE_DEVICE_NAME: &str = "int";

/// Primitive host types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    /// 8-bit truth value
    Boolean,
    /// Signed 8-bit integer
    Byte,
    /// Unsigned 16-bit code unit
    Char,
    /// Signed 16-bit integer
    Short,
    /// Signed 32-bit integer
    Int,
    /// IEEE 754 single precision
    Float,
    /// Signed 64-bit integer
    Long,
    /// IEEE 754 double precision
    Double,
}

impl PrimitiveType {
    /// Inline storage size in bytes
    pub fn size(self) -> u32 {
        match self {
            PrimitiveType::Boolean | PrimitiveType::Byte => 1,
            PrimitiveType::Char | PrimitiveType::Short => 2,
            PrimitiveType::Int | PrimitiveType::Float => 4,
            PrimitiveType::Long | PrimitiveType::Double => 8,
        }
    }

    /// Device-side type name
    pub fn device_name(self) -> &'static str {
        match self {
            PrimitiveType::Boolean | PrimitiveType::Byte => "char",
            PrimitiveType::Char => "ushort",
            PrimitiveType::Short => "short",
            PrimitiveType::Int => "int",
            PrimitiveType::Float => "float",
            PrimitiveType::Long => "long",
            PrimitiveType::Double => "double",
        }
    }

    /// Host-side spelling
    pub fn host_name(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Byte => "byte",
            PrimitiveType::Char => "char",
            PrimitiveType::Short => "short",
            PrimitiveType::Int => "int",
            PrimitiveType::Float => "float",
            PrimitiveType::Long => "long",
            PrimitiveType::Double => "double",
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.host_name())
    }
}

/// A type as declared in the host program
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeclaredType {
    /// Inline primitive
    Primitive(PrimitiveType),
    /// Class or interface, by fully-qualified name
    Class(String),
    /// Array of the element type
    Array(Box<DeclaredType>),
}

impl DeclaredType {
    /// Class or interface type
    pub fn class(name: impl Into<String>) -> Self {
        DeclaredType::Class(name.into())
    }

    /// Array of `element`
    pub fn array_of(element: DeclaredType) -> Self {
        DeclaredType::Array(Box::new(element))
    }

    /// Element type if this is an array
    pub fn element(&self) -> Option<&DeclaredType> {
        match self {
            DeclaredType::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// Innermost non-array type
    pub fn base(&self) -> &DeclaredType {
        let mut ty = self;
        while let DeclaredType::Array(elem) = ty {
            ty = elem;
        }
        ty
    }

    /// Number of array dimensions (0 for non-arrays)
    pub fn dimensions(&self) -> usize {
        let mut dims = 0;
        let mut ty = self;
        while let DeclaredType::Array(elem) = ty {
            dims += 1;
            ty = elem;
        }
        dims
    }

    /// Class this type mentions, looking through arrays
    pub fn referenced_class(&self) -> Option<&str> {
        match self.base() {
            DeclaredType::Class(name) => Some(name),
            _ => None,
        }
    }

    /// Whether this is an array type
    pub fn is_array(&self) -> bool {
        matches!(self, DeclaredType::Array(_))
    }

    /// Canonical device-side name of the type itself (not its storage)
    ///
    /// `int` → `int`, `a.b.C` → `a_b_C`, `a.b.C[][]` → `a_b_C__array__array`.
    pub fn device_name(&self) -> String {
        match self {
            DeclaredType::Primitive(p) => p.device_name().to_string(),
            DeclaredType::Class(name) => mangle_class_name(name),
            DeclaredType::Array(elem) => format!("{}__array", elem.device_name()),
        }
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclaredType::Primitive(p) => write!(f, "{}", p),
            DeclaredType::Class(name) => write!(f, "{}", name),
            DeclaredType::Array(elem) => write!(f, "{}[]", elem),
        }
    }
}

impl From<PrimitiveType> for DeclaredType {
    fn from(p: PrimitiveType) -> Self {
        DeclaredType::Primitive(p)
    }
}

/// Turn a fully-qualified host class name into a device identifier
pub fn mangle_class_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Storage kind of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    /// Handle into the flattened heap
    Reference,
    /// Inline fixed-width value
    Value,
}

/// Device storage facts for a declared type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeInfo {
    /// Reference or value
    pub kind: TypeKind,
    /// Storage size in bytes
    pub size: u32,
    /// Device type used for storage
    pub device_name: String,
}

impl TypeInfo {
    /// Classify a declared type.
    ///
    /// Classes, interfaces and arrays are references and always take one
    /// handle, whatever the size of what they point at. That includes
    /// arrays of primitives like `int[]`: an array has no fixed inline
    /// width, so it is never a value field.
    pub fn classify(ty: &DeclaredType) -> Self {
        match ty {
            DeclaredType::Primitive(p) => Self {
                kind: TypeKind::Value,
                size: p.size(),
                device_name: p.device_name().to_string(),
            },
            DeclaredType::Class(_) | DeclaredType::Array(_) => Self {
                kind: TypeKind::Reference,
                size: HANDLE_SIZE,
                device_name: HANDLE_DEVICE_NAME.to_string(),
            },
        }
    }

    /// Whether this is a heap handle
    pub fn is_ref_type(&self) -> bool {
        self.kind == TypeKind::Reference
    }
}
