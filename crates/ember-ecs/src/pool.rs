//! Densely packed per-kind component storage.
//!
//! A [`ComponentPool<T>`] is a sparse set: component values live contiguously
//! in `dense`, `index_to_entity` records which entity owns each dense slot,
//! and `entity_to_index` maps an entity id back to its slot. Insert, update
//! and swap-remove are all O(1) and iteration only touches live data.
//!
//! The registry stores pools of different `T` side by side behind the
//! non-generic [`ErasedPool`] trait and downcasts with a checked
//! `downcast_ref` at call sites that know the concrete kind.

use std::any::Any;

use crate::entity::Entity;

// ---------------------------------------------------------------------------
// ErasedPool
// ---------------------------------------------------------------------------

/// Type-erased view of a component pool.
///
/// Lets the registry drop a destroyed entity's components across every kind
/// without knowing their concrete types.
pub trait ErasedPool: Any {
    /// Remove `entity`'s component if present. Returns whether one was removed.
    fn remove_entity(&mut self, entity: Entity) -> bool;

    /// Whether `entity` has a component in this pool.
    fn contains(&self, entity: Entity) -> bool;

    /// Number of live components.
    fn len(&self) -> usize;

    /// `true` if the pool holds no components.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all components.
    fn clear(&mut self);

    /// Type name of the stored component.
    fn component_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// ---------------------------------------------------------------------------
// ComponentPool
// ---------------------------------------------------------------------------

/// Sparse-set storage for components of type `T`.
///
/// Invariant: `dense.len() == index_to_entity.len()`, and for every slot `i`
/// in `[0, len)`, `entity_to_index[index_to_entity[i]] == Some(i)`.
#[derive(Debug, Clone)]
pub struct ComponentPool<T> {
    /// Component values, packed without gaps.
    dense: Vec<T>,
    /// Dense slot -> owning entity.
    index_to_entity: Vec<Entity>,
    /// Entity id -> dense slot. Grows to cover the highest id seen.
    entity_to_index: Vec<Option<usize>>,
}

impl<T> ComponentPool<T> {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty pool with room for `capacity` components.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            dense: Vec::with_capacity(capacity),
            index_to_entity: Vec::with_capacity(capacity),
            entity_to_index: Vec::with_capacity(capacity),
        }
    }

    /// Insert or overwrite the component for `entity`.
    ///
    /// An existing value is replaced in place at its dense slot and returned;
    /// otherwise the value is appended at slot `len()`.
    pub fn upsert(&mut self, entity: Entity, value: T) -> Option<T> {
        let id = entity.index();
        if let Some(idx) = self.slot(entity) {
            return Some(std::mem::replace(&mut self.dense[idx], value));
        }
        if id >= self.entity_to_index.len() {
            self.entity_to_index.resize(id + 1, None);
        }
        self.entity_to_index[id] = Some(self.dense.len());
        self.dense.push(value);
        self.index_to_entity.push(entity);
        None
    }

    /// Remove `entity`'s component, filling the hole with the last element.
    ///
    /// No-op returning `None` when the entity has no component here.
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let idx = self.slot(entity)?;
        let value = self.dense.swap_remove(idx);
        self.index_to_entity.swap_remove(idx);
        self.entity_to_index[entity.index()] = None;

        // The former last element now lives at `idx` (unless it was `entity`).
        if let Some(&moved) = self.index_to_entity.get(idx) {
            self.entity_to_index[moved.index()] = Some(idx);
        }
        Some(value)
    }

    /// Shared reference to `entity`'s component.
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.slot(entity).map(|idx| &self.dense[idx])
    }

    /// Mutable reference to `entity`'s component.
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.slot(entity).map(|idx| &mut self.dense[idx])
    }

    /// Whether `entity` has a component here.
    pub fn contains(&self, entity: Entity) -> bool {
        self.slot(entity).is_some()
    }

    /// Dense slot currently holding `entity`'s component.
    pub fn index_of(&self, entity: Entity) -> Option<usize> {
        self.slot(entity)
    }

    /// Number of live components.
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// `true` if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Drop every component and all index entries.
    pub fn clear(&mut self) {
        self.dense.clear();
        self.index_to_entity.clear();
        self.entity_to_index.clear();
    }

    /// Owners of the dense slots, in dense order.
    pub fn entities(&self) -> &[Entity] {
        &self.index_to_entity
    }

    /// Component values in dense order.
    pub fn values(&self) -> &[T] {
        &self.dense
    }

    /// Component values in dense order, mutably.
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.dense
    }

    /// Iterate `(entity, &component)` in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.index_to_entity.iter().copied().zip(self.dense.iter())
    }

    /// Iterate `(entity, &mut component)` in dense order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.index_to_entity
            .iter()
            .copied()
            .zip(self.dense.iter_mut())
    }

    #[inline]
    fn slot(&self, entity: Entity) -> Option<usize> {
        self.entity_to_index.get(entity.index()).copied().flatten()
    }
}

// ---------------------------------------------------------------------------
// PoolMut
// ---------------------------------------------------------------------------

/// Mutable view of a registry-owned pool.
///
/// Values can be read (through `Deref`) and written in place, but the set of
/// owners is fixed. Entries only come and go through the registry, which
/// keeps signatures in step with pool contents.
///
/// ```compile_fail
/// use ember_ecs::prelude::*;
///
/// let mut registry = Registry::new();
/// let e = registry.create_entity();
/// registry.add_component(e, 1u32).unwrap();
/// registry.pool_mut::<u32>().unwrap().remove(e);
/// ```
#[derive(Debug)]
pub struct PoolMut<'a, T> {
    pool: &'a mut ComponentPool<T>,
}

impl<'a, T> PoolMut<'a, T> {
    pub(crate) fn new(pool: &'a mut ComponentPool<T>) -> Self {
        Self { pool }
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.pool.get_mut(entity)
    }

    pub fn values_mut(&mut self) -> &mut [T] {
        self.pool.values_mut()
    }

    /// Iterate `(entity, &mut component)` in dense order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.pool.iter_mut()
    }
}

/// Read access goes straight to the pool.
impl<T> std::ops::Deref for PoolMut<'_, T> {
    type Target = ComponentPool<T>;

    fn deref(&self) -> &ComponentPool<T> {
        self.pool
    }
}

impl<T> Default for ComponentPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> ErasedPool for ComponentPool<T> {
    fn remove_entity(&mut self, entity: Entity) -> bool {
        self.remove(entity).is_some()
    }

    fn contains(&self, entity: Entity) -> bool {
        ComponentPool::contains(self, entity)
    }

    fn len(&self) -> usize {
        ComponentPool::len(self)
    }

    fn clear(&mut self) {
        ComponentPool::clear(self)
    }

    fn component_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
