use crate::engine::{DescriptorId, EngineDescriptor, SharedEngine};
use crate::error::{ImeError, Result};

/// Descriptor list plus an instance arena indexed by [`DescriptorId`].
///
/// Each coordinator owns one registry, so every cached instance is bound to
/// exactly one coordinator. Instances persist until the coordinator is
/// disposed; deactivation never evicts them, which is what preserves engine
/// state across re-selection.
#[derive(Default)]
pub struct EngineRegistry {
    descriptors: Vec<EngineDescriptor>,
    instances: Vec<Option<SharedEngine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a descriptor; enumeration order is registration order.
    pub fn register(&mut self, descriptor: EngineDescriptor) -> DescriptorId {
        let id = DescriptorId(self.descriptors.len());
        self.descriptors.push(descriptor);
        self.instances.push(None);
        id
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn descriptor(&self, id: DescriptorId) -> Option<&EngineDescriptor> {
        self.descriptors.get(id.0)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = (DescriptorId, &EngineDescriptor)> {
        self.descriptors
            .iter()
            .enumerate()
            .map(|(idx, d)| (DescriptorId(idx), d))
    }

    /// Cache peek without instantiation.
    pub fn instance(&self, id: DescriptorId) -> Option<SharedEngine> {
        self.instances.get(id.0).and_then(|slot| slot.clone())
    }

    /// Scan descriptors in registration order for an exact locale match.
    ///
    /// A factory failure counts as "no match for this descriptor" and the
    /// scan continues; auto-selection is best effort.
    pub fn find_for_locale(&mut self, locale: &str) -> Option<(DescriptorId, SharedEngine)> {
        for idx in 0..self.descriptors.len() {
            if !self.descriptors[idx].supports_locale(locale) {
                continue;
            }
            if let Ok(engine) = self.materialize(idx) {
                return Some((DescriptorId(idx), engine));
            }
        }
        None
    }

    /// Cached instance or a fresh one; factory failures propagate here —
    /// an explicit user selection deserves the error.
    pub fn get_or_create(&mut self, id: DescriptorId) -> Result<SharedEngine> {
        if id.0 >= self.descriptors.len() {
            return Err(ImeError::UnknownDescriptor(id.0));
        }
        self.materialize(id.0)
    }

    /// Empty the arena, yielding every live instance exactly once.
    pub fn drain_instances(&mut self) -> Vec<SharedEngine> {
        self.instances
            .iter_mut()
            .filter_map(|slot| slot.take())
            .collect()
    }

    fn materialize(&mut self, idx: usize) -> Result<SharedEngine> {
        if let Some(existing) = &self.instances[idx] {
            return Ok(existing.clone());
        }
        let engine = self.descriptors[idx].instantiate()?;
        self.instances[idx] = Some(engine.clone());
        Ok(engine)
    }
}
