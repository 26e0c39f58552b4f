//! Method descriptors

use crate::class::ClassId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a method as the call graph names it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodRef {
    /// Fully-qualified declaring class
    pub class: String,
    /// Name plus descriptor, e.g. `run(I)V`
    pub signature: String,
}

impl MethodRef {
    pub fn new(class: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            signature: signature.into(),
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.signature)
    }
}

/// A used method registered on its declaring class
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    method: MethodRef,
    owner: ClassId,
}

impl MethodDescriptor {
    pub fn new(owner: ClassId, method: MethodRef) -> Self {
        Self { method, owner }
    }

    pub fn method_ref(&self) -> &MethodRef {
        &self.method
    }

    pub fn signature(&self) -> &str {
        &self.method.signature
    }

    /// Declaring class
    pub fn owner(&self) -> ClassId {
        self.owner
    }
}
