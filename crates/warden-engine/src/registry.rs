//! Capability registry: the catalog of action types the executor can run.
//!
//! Built once during wiring, then shared behind an `Arc`. There is no update
//! or unregister operation; once shared, the registry is read-only.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::descriptor::CapabilityDescriptor;
use crate::error::RegistryError;

/// Catalog mapping unique action-type strings to their descriptors.
pub struct CapabilityRegistry<C> {
    entries: Vec<Arc<CapabilityDescriptor<C>>>,
    index: HashMap<String, usize>,
}

impl<C> CapabilityRegistry<C> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a single descriptor.
    ///
    /// Fails with `DuplicateCapability` if the action type is already
    /// present; the existing descriptor is left intact.
    pub fn register(
        &mut self,
        descriptor: CapabilityDescriptor<C>,
    ) -> Result<&mut Self, RegistryError> {
        if self.index.contains_key(&descriptor.action_type) {
            return Err(RegistryError::DuplicateCapability(descriptor.action_type));
        }
        tracing::debug!(action_type = %descriptor.action_type, "Capability registered");
        self.index
            .insert(descriptor.action_type.clone(), self.entries.len());
        self.entries.push(Arc::new(descriptor));
        Ok(self)
    }

    /// Register a batch of descriptors atomically.
    ///
    /// Every action type is checked against the registry and against the
    /// rest of the batch before anything is inserted, so a duplicate leaves
    /// the registry exactly as it was.
    pub fn register_many(
        &mut self,
        descriptors: impl IntoIterator<Item = CapabilityDescriptor<C>>,
    ) -> Result<&mut Self, RegistryError> {
        let batch: Vec<CapabilityDescriptor<C>> = descriptors.into_iter().collect();
        let mut seen = HashSet::with_capacity(batch.len());
        for descriptor in &batch {
            let action_type = descriptor.action_type.as_str();
            if self.index.contains_key(action_type) || !seen.insert(action_type) {
                return Err(RegistryError::DuplicateCapability(action_type.to_string()));
            }
        }
        for descriptor in batch {
            self.register(descriptor)?;
        }
        Ok(self)
    }

    /// Look up a descriptor by action type.
    pub fn get(&self, action_type: &str) -> Option<Arc<CapabilityDescriptor<C>>> {
        self.index
            .get(action_type)
            .map(|&i| Arc::clone(&self.entries[i]))
    }

    pub fn contains(&self, action_type: &str) -> bool {
        self.index.contains_key(action_type)
    }

    /// Snapshot of every descriptor, in registration order.
    ///
    /// Callers must not depend on the order; the manifest re-sorts.
    pub fn list(&self) -> Vec<Arc<CapabilityDescriptor<C>>> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapabilityDescriptor<C>> {
        self.entries.iter().map(|d| d.as_ref())
    }
}

impl<C> Default for CapabilityRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for CapabilityRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|d| &d.action_type))
            .finish()
    }
}
