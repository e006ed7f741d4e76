//! Registration index over the descriptor list.

use std::any::TypeId;
use std::collections::HashMap;

use crate::descriptors::ServiceDescriptor;
use crate::key::Key;

/// Immutable lookup structure built once when the provider is created.
///
/// Descriptors keep their registration order; `by_service` maps a service
/// type to the positions of its registrations in that order.
pub(crate) struct DescriptorIndex {
    descriptors: Vec<ServiceDescriptor>,
    by_service: HashMap<TypeId, Vec<usize>, ahash::RandomState>,
    /// Distinct service keys, first registration first
    keys: Vec<Key>,
}

impl DescriptorIndex {
    pub(crate) fn new(descriptors: Vec<ServiceDescriptor>) -> Self {
        let mut by_service: HashMap<TypeId, Vec<usize>, ahash::RandomState> = HashMap::default();
        let mut keys = Vec::new();

        for (position, descriptor) in descriptors.iter().enumerate() {
            let key = descriptor.key();
            let slots = by_service.entry(key.type_id()).or_default();
            if slots.is_empty() {
                keys.push(key);
            }
            slots.push(position);
        }

        Self {
            descriptors,
            by_service,
            keys,
        }
    }

    /// Registrations of `key`'s service in registration order.
    pub(crate) fn registrations(&self, key: &Key) -> impl Iterator<Item = &ServiceDescriptor> + '_ {
        self.by_service
            .get(&key.type_id())
            .into_iter()
            .flatten()
            .map(move |&position| &self.descriptors[position])
    }

    /// The registration a single resolution uses: the last one.
    pub(crate) fn last(&self, key: &Key) -> Option<&ServiceDescriptor> {
        self.by_service
            .get(&key.type_id())
            .and_then(|positions| positions.last())
            .map(|&position| &self.descriptors[position])
    }

    pub(crate) fn count(&self, key: &Key) -> usize {
        self.by_service.get(&key.type_id()).map_or(0, Vec::len)
    }

    pub(crate) fn contains(&self, key: &Key) -> bool {
        self.by_service.contains_key(&key.type_id())
    }

    pub(crate) fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub(crate) fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }
}
