//! Entity identifiers, id allocation, and borrowed entity handles.
//!
//! An [`Entity`] is a bare 32-bit id. It carries no data and no pointer back
//! to its registry; the owning [`Registry`] is passed explicitly, either as an
//! argument or through the [`EntityRef`] / [`EntityMut`] views it hands out.
//!
//! Ids are recycled through a FIFO free-list once the registry has reconciled
//! a destroyed entity out of every system and index. At most `u32::MAX + 1`
//! entities can exist at the same time.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::component::Component;
use crate::registry::Registry;
use crate::EcsError;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// An entity id. Equality and ordering are by id only.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(u32);

impl Entity {
    /// Wrap a raw id.
    #[inline]
    pub fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// The numeric id.
    #[inline]
    pub fn get_entity_id(self) -> u32 {
        self.0
    }

    /// The id widened for indexing per-entity arrays.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Hands out entity ids and recycles released ones.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    /// Whether each id slot is currently alive.
    alive: Vec<bool>,
    /// Released ids waiting to be reused (FIFO).
    free_ids: VecDeque<u32>,
    /// Number of alive slots.
    alive_count: usize,
}

impl EntityAllocator {
    /// Create an empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an allocator with room for `capacity` ids.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            alive: Vec::with_capacity(capacity),
            free_ids: VecDeque::new(),
            alive_count: 0,
        }
    }

    /// Allocate an id, preferring the oldest released one.
    ///
    /// # Panics
    ///
    /// Panics if every `u32` id is alive at once.
    pub fn allocate(&mut self) -> Entity {
        self.alive_count += 1;
        if let Some(id) = self.free_ids.pop_front() {
            self.alive[id as usize] = true;
            return Entity(id);
        }
        let id = u32::try_from(self.alive.len()).unwrap_or_else(|_| {
            panic!("entity id space exhausted: more than {} live entities", u32::MAX)
        });
        self.alive.push(true);
        Entity(id)
    }

    /// Release `entity`'s id for reuse.
    ///
    /// Returns `false` if the id was not alive.
    pub fn release(&mut self, entity: Entity) -> bool {
        match self.alive.get_mut(entity.index()) {
            Some(alive) if *alive => {
                *alive = false;
                self.alive_count -= 1;
                self.free_ids.push_back(entity.0);
                true
            }
            _ => false,
        }
    }

    /// Whether `entity` is currently alive.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.alive.get(entity.index()).copied().unwrap_or(false)
    }

    /// Number of alive entities.
    pub fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Number of id slots ever allocated (alive or free).
    pub fn capacity_used(&self) -> usize {
        self.alive.len()
    }

    /// Iterate alive entities in id order.
    pub fn iter_alive(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, &alive)| alive)
            .map(|(id, _)| Entity(id as u32))
    }
}

// ---------------------------------------------------------------------------
// EntityRef / EntityMut
// ---------------------------------------------------------------------------

/// Read-only handle pairing an [`Entity`] with its registry.
#[derive(Clone, Copy)]
pub struct EntityRef<'r> {
    entity: Entity,
    registry: &'r Registry,
}

impl<'r> EntityRef<'r> {
    pub(crate) fn new(entity: Entity, registry: &'r Registry) -> Self {
        Self { entity, registry }
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn get_entity_id(&self) -> u32 {
        self.entity.get_entity_id()
    }

    pub fn has_component<T: Component>(&self) -> bool {
        self.registry.has_component::<T>(self.entity)
    }

    pub fn get_component<T: Component>(&self) -> Result<&'r T, EcsError> {
        self.registry.get_component::<T>(self.entity)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.registry.entity_has_tag(self.entity, tag)
    }

    pub fn belongs_to_group(&self, group: &str) -> bool {
        self.registry.entity_in_group(self.entity, group)
    }
}

impl fmt::Debug for EntityRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityRef").field(&self.entity).finish()
    }
}

/// Mutable handle pairing an [`Entity`] with its registry.
///
/// Every method forwards to the matching [`Registry`] operation.
pub struct EntityMut<'r> {
    entity: Entity,
    registry: &'r mut Registry,
}

impl<'r> EntityMut<'r> {
    pub(crate) fn new(entity: Entity, registry: &'r mut Registry) -> Self {
        Self { entity, registry }
    }

    pub fn entity(&self) -> Entity {
        self.entity
    }

    pub fn get_entity_id(&self) -> u32 {
        self.entity.get_entity_id()
    }

    /// Attach (or overwrite) a component. Returns `self` for chaining.
    pub fn add_component<T: Component>(&mut self, value: T) -> Result<&mut Self, EcsError> {
        self.registry.add_component(self.entity, value)?;
        Ok(self)
    }

    pub fn remove_component<T: Component>(&mut self) -> Option<T> {
        self.registry.remove_component::<T>(self.entity)
    }

    pub fn has_component<T: Component>(&self) -> bool {
        self.registry.has_component::<T>(self.entity)
    }

    pub fn get_component<T: Component>(&self) -> Result<&T, EcsError> {
        self.registry.get_component::<T>(self.entity)
    }

    pub fn get_component_mut<T: Component>(&mut self) -> Result<&mut T, EcsError> {
        self.registry.get_component_mut::<T>(self.entity)
    }

    /// Queue this entity for destruction at the next reconciliation.
    pub fn remove(&mut self) -> Result<(), EcsError> {
        self.registry.remove_entity(self.entity)
    }

    pub fn tag(&mut self, tag: &str) -> Result<&mut Self, EcsError> {
        self.registry.add_tag_to_entity(self.entity, tag)?;
        Ok(self)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.registry.entity_has_tag(self.entity, tag)
    }

    pub fn group(&mut self, group: &str) -> Result<&mut Self, EcsError> {
        self.registry.add_group_to_entity(self.entity, group)?;
        Ok(self)
    }

    pub fn belongs_to_group(&self, group: &str) -> bool {
        self.registry.entity_in_group(self.entity, group)
    }

    /// Reborrow the underlying registry.
    pub fn registry(&mut self) -> &mut Registry {
        self.registry
    }
}

impl fmt::Debug for EntityMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityMut").field(&self.entity).finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
