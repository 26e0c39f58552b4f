//! Field Packing Order
//!
//! One canonical order for a set of fields. Offset assignment and code
//! generation both go through here, so the n-th field of an emitted struct
//! and the n-th entry of its offset table are always the same field.

use crate::field::FieldDescriptor;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How fields are ordered before packing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackingPolicy {
    /// Largest fields first, then by name. Avoids alignment padding.
    #[default]
    SizeDescending,
    /// Alphabetical by name
    ByName,
}

/// Orders fields under a packing policy.
///
/// The order is total: size (if the policy uses it), then name, then the
/// declaring class id. Two distinct fields never compare equal.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldPackingSorter {
    policy: PackingPolicy,
}

impl FieldPackingSorter {
    /// Create a sorter for `policy`
    pub fn new(policy: PackingPolicy) -> Self {
        Self { policy }
    }

    /// The active policy
    pub fn policy(&self) -> PackingPolicy {
        self.policy
    }

    /// Compare two fields
    pub fn compare(&self, a: &FieldDescriptor, b: &FieldDescriptor) -> Ordering {
        let primary = match self.policy {
            PackingPolicy::SizeDescending => b.size().cmp(&a.size()),
            PackingPolicy::ByName => Ordering::Equal,
        };
        primary
            .then_with(|| a.name().cmp(b.name()))
            .then_with(|| a.owner().cmp(&b.owner()))
    }

    /// Sort fields into packing order
    pub fn sort<'a, I>(&self, fields: I) -> Vec<&'a FieldDescriptor>
    where
        I: IntoIterator<Item = &'a FieldDescriptor>,
    {
        let mut sorted: Vec<&'a FieldDescriptor> = fields.into_iter().collect();
        sorted.sort_by(|a, b| self.compare(a, b));
        sorted
    }
}
