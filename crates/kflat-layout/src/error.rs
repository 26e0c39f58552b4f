//! Layout and reachability errors

use thiserror::Error;

/// Result alias used throughout the crate
pub type LayoutResult<T> = Result<T, LayoutError>;

/// Errors raised while discovering classes, walking reachability, or
/// computing layouts.
///
/// Discovery and reachability errors are fatal to a compile run. Layout
/// queries that callers probe speculatively (class sizes, field lookups)
/// degrade instead of returning these.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// The host type model has no class with this name
    #[error("Unknown class: {name}")]
    UnknownClass {
        /// Fully-qualified host class name
        name: String,
    },

    /// Neither the class nor any of its ancestors declares the field
    #[error("Unknown field: {class}.{field}")]
    UnknownField {
        /// Class the access was made through
        class: String,
        /// Field name
        field: String,
    },

    /// The call graph has no facts for this method
    #[error("Unknown method: {method}")]
    UnknownMethod {
        /// Method as `class.signature`
        method: String,
    },

    /// The ancestor chain of a class cannot be resolved
    #[error("Unresolved ancestor chain for class {class}")]
    UnresolvedAncestor {
        /// Class whose chain is missing or cyclic
        class: String,
    },

    /// A field was registered after the class's fields were classified
    #[error("Class {class} is frozen; cannot register field {field}")]
    ClassFrozen {
        /// Class name
        class: String,
        /// Field that was rejected
        field: String,
    },

    /// Layout was requested before the class was classified
    #[error("Class {class} has not been classified")]
    NotClassified {
        /// Class name
        class: String,
    },

    /// No layout is available for the class
    #[error("Layout unavailable for {class}: {reason}")]
    LayoutUnavailable {
        /// Class name
        class: String,
        /// Why the layout could not be produced
        reason: String,
    },

    /// A class id that does not belong to this registry
    #[error("Unknown class id: {0}")]
    UnknownClassId(u32),

    /// Invalid configuration value
    #[error("Invalid layout config: {0}")]
    Config(String),

    /// Failed to parse a TOML config
    #[error("Failed to parse layout config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Failed to read a config file
    #[error("Failed to read layout config: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize a layout table
    #[error("Failed to serialize layout table: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl LayoutError {
    /// Whether this error marks a missing layout rather than a broken program
    pub fn is_layout_unavailable(&self) -> bool {
        matches!(
            self,
            LayoutError::LayoutUnavailable { .. } | LayoutError::NotClassified { .. }
        )
    }
}
