//! The [`Registry`] is the top-level container for the ECS. It owns the id
//! allocator, the component type table, every component pool, per-entity
//! signatures, the system table, and the tag/group indices.
//!
//! Entity creation and destruction are deferred: [`create_entity`] and
//! [`remove_entity`] only queue the entity, and [`update`] applies the queues
//! at a single point per frame. Component writes go straight into the pools;
//! the resulting signature changes reach system membership at the next
//! [`update`] as well.
//!
//! [`create_entity`]: Registry::create_entity
//! [`remove_entity`]: Registry::remove_entity
//! [`update`]: Registry::update

use std::any::TypeId;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::component::{Component, ComponentTypeId, ComponentTypeRegistry};
use crate::entity::{Entity, EntityAllocator, EntityMut, EntityRef};
use crate::index::{GroupIndex, TagIndex};
use crate::pool::{ComponentPool, ErasedPool, PoolMut};
use crate::signature::Signature;
use crate::system::{self, System, SystemCore};
use crate::EcsError;

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

/// Sizing hints for a [`Registry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Entity slots to reserve up front.
    pub entity_capacity: usize,
    /// Initial capacity of each newly created component pool.
    pub pool_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            entity_capacity: 1024,
            pool_capacity: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// ReconcileReport
// ---------------------------------------------------------------------------

/// Summary of one [`Registry::update`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Pending entities made visible to systems.
    pub added: usize,
    /// Pending entities destroyed and recycled.
    pub removed: usize,
    /// (entity, system) memberships created.
    pub joined: usize,
    /// (entity, system) memberships dropped.
    pub left: usize,
}

impl ReconcileReport {
    /// `true` if the reconciliation changed nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct RegisteredSystem {
    type_id: TypeId,
    system: Box<dyn System>,
}

/// Membership kept on behalf of a system lent out by
/// [`Registry::run_system`].
struct DetachedSystem {
    type_id: TypeId,
    /// Copy of the system's core that reconciliation updates in its place.
    shadow: SystemCore,
    /// Set once an `update()` ran while the system was out.
    reconciled: bool,
}

fn cores_mut<'a>(
    systems: &'a mut [RegisteredSystem],
    detached: &'a mut [DetachedSystem],
) -> impl Iterator<Item = &'a mut SystemCore> + 'a {
    systems
        .iter_mut()
        .map(|entry| entry.system.core_mut())
        .chain(detached.iter_mut().map(|d| &mut d.shadow))
}

/// Owns all ECS state and mediates every entity, component, and system
/// operation.
pub struct Registry {
    config: RegistryConfig,
    allocator: EntityAllocator,
    component_types: ComponentTypeRegistry,
    /// Indexed by `ComponentTypeId`; `None` until the kind is first added.
    pools: Vec<Option<Box<dyn ErasedPool>>>,
    /// Current signature per entity id.
    signatures: Vec<Signature>,
    /// Signature as of the last reconciliation, per entity id.
    reconciled: Vec<Signature>,
    /// Whether the entity has been reconciled into system membership.
    visible: Vec<bool>,
    /// Registration order is iteration order.
    systems: Vec<RegisteredSystem>,
    /// Systems currently inside `run_system`, innermost last.
    detached: Vec<DetachedSystem>,
    entities_to_add: Vec<Entity>,
    entities_to_remove: BTreeSet<Entity>,
    /// Visible entities whose signature changed since the last update.
    dirty: BTreeSet<Entity>,
    tags: TagIndex,
    groups: GroupIndex,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("entity_count", &self.allocator.alive_count())
            .field("component_kinds", &self.component_types.len())
            .field("system_count", &self.systems.len())
            .field("pending_add", &self.entities_to_add.len())
            .field("pending_remove", &self.entities_to_remove.len())
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry with default sizing.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with the given sizing hints.
    pub fn with_config(config: RegistryConfig) -> Self {
        let capacity = config.entity_capacity;
        debug!(?config, "registry created");
        Self {
            allocator: EntityAllocator::with_capacity(capacity),
            component_types: ComponentTypeRegistry::new(),
            pools: Vec::new(),
            signatures: Vec::with_capacity(capacity),
            reconciled: Vec::with_capacity(capacity),
            visible: Vec::with_capacity(capacity),
            systems: Vec::new(),
            detached: Vec::new(),
            entities_to_add: Vec::new(),
            entities_to_remove: BTreeSet::new(),
            dirty: BTreeSet::new(),
            tags: TagIndex::new(),
            groups: GroupIndex::new(),
            config,
        }
    }

    /// The configuration this registry was built with.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Read-only access to the component type table.
    pub fn component_types(&self) -> &ComponentTypeRegistry {
        &self.component_types
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Create an entity.
    ///
    /// The entity is usable immediately (components may be attached), but it
    /// only joins systems at the next [`update`](Self::update).
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.allocator.allocate();
        let idx = entity.index();
        if idx >= self.signatures.len() {
            self.signatures.resize(idx + 1, Signature::EMPTY);
            self.reconciled.resize(idx + 1, Signature::EMPTY);
            self.visible.resize(idx + 1, false);
        }
        self.entities_to_add.push(entity);
        debug!(%entity, "entity created");
        entity
    }

    /// Queue `entity` for destruction at the next [`update`](Self::update).
    ///
    /// Queuing the same entity twice before then is harmless. Fails with
    /// [`EcsError::DeadEntity`] if the id is not alive.
    pub fn remove_entity(&mut self, entity: Entity) -> Result<(), EcsError> {
        if !self.allocator.is_alive(entity) {
            warn!(%entity, "tried to remove an entity that is not alive");
            return Err(EcsError::DeadEntity { entity });
        }
        if self.entities_to_remove.insert(entity) {
            debug!(%entity, "entity queued for removal");
        }
        Ok(())
    }

    /// Whether `entity` is alive (created and not yet reconciled out).
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.allocator.is_alive(entity)
    }

    /// Number of alive entities, including ones pending addition or removal.
    pub fn entity_count(&self) -> usize {
        self.allocator.alive_count()
    }

    /// Entities created since the last update.
    pub fn pending_additions(&self) -> &[Entity] {
        &self.entities_to_add
    }

    /// Entities queued for removal since the last update, in id order.
    pub fn pending_removals(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities_to_remove.iter().copied()
    }

    /// `true` if the entity is queued for removal at the next update.
    pub fn is_pending_removal(&self, entity: Entity) -> bool {
        self.entities_to_remove.contains(&entity)
    }

    /// The entity's current component signature (empty for dead ids).
    pub fn get_signature(&self, entity: Entity) -> Signature {
        self.signatures
            .get(entity.index())
            .copied()
            .unwrap_or(Signature::EMPTY)
    }

    /// Read-only handle for `entity`.
    pub fn entity(&self, entity: Entity) -> EntityRef<'_> {
        EntityRef::new(entity, self)
    }

    /// Mutable handle for `entity`.
    pub fn entity_mut(&mut self, entity: Entity) -> EntityMut<'_> {
        EntityMut::new(entity, self)
    }

    // -- component access ---------------------------------------------------

    /// Attach `value` to `entity`, overwriting any existing `T`.
    ///
    /// The first use of `T` allocates its kind id and pool, which fails with
    /// [`EcsError::ComponentLimitExceeded`] once all ids are taken.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), EcsError> {
        self.ensure_alive(entity)?;
        let id = self.component_types.id_for::<T>()?;
        let replaced = self.pool_or_insert::<T>(id).upsert(entity, value).is_some();

        let signature = &mut self.signatures[entity.index()];
        if !signature.test(id) {
            signature.set(id);
            self.mark_dirty(entity);
        }
        debug!(
            %entity,
            component = std::any::type_name::<T>(),
            id = id.index(),
            replaced,
            "component added"
        );
        Ok(())
    }

    /// Detach and return `entity`'s `T`.
    ///
    /// Logs a warning and returns `None` if the entity has no `T`.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Option<T> {
        let removed = match self.component_types.lookup::<T>() {
            Some(id) if self.get_signature(entity).test(id) => {
                self.signatures[entity.index()].unset(id);
                self.mark_dirty(entity);
                self.raw_pool_mut::<T>().and_then(|pool| pool.remove(entity))
            }
            _ => None,
        };

        match removed {
            Some(_) => debug!(
                %entity,
                component = std::any::type_name::<T>(),
                "component removed"
            ),
            None => warn!(
                %entity,
                component = std::any::type_name::<T>(),
                "failed to remove component: entity is missing it"
            ),
        }
        removed
    }

    /// Whether `entity` currently has a `T`.
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.component_types
            .lookup::<T>()
            .is_some_and(|id| self.get_signature(entity).test(id))
    }

    /// Borrow `entity`'s `T`, or [`EcsError::MissingComponent`].
    pub fn get_component<T: Component>(&self, entity: Entity) -> Result<&T, EcsError> {
        self.pool::<T>()
            .and_then(|pool| pool.get(entity))
            .ok_or_else(|| missing::<T>(entity))
    }

    /// Mutably borrow `entity`'s `T`, or [`EcsError::MissingComponent`].
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T, EcsError> {
        self.raw_pool_mut::<T>()
            .and_then(|pool| pool.get_mut(entity))
            .ok_or_else(|| missing::<T>(entity))
    }

    /// The pool for `T`, if any `T` was ever added.
    pub fn pool<T: Component>(&self) -> Option<&ComponentPool<T>> {
        let id = self.component_types.lookup::<T>()?;
        let pool: &dyn ErasedPool = self.pools.get(id.index() as usize)?.as_deref()?;
        pool.as_any().downcast_ref()
    }

    /// Mutable view of the pool for `T`.
    ///
    /// Values can be written in place; entities only gain or lose a `T`
    /// through [`add_component`](Self::add_component) and
    /// [`remove_component`](Self::remove_component).
    pub fn pool_mut<T: Component>(&mut self) -> Option<PoolMut<'_, T>> {
        self.raw_pool_mut::<T>().map(PoolMut::new)
    }

    fn raw_pool_mut<T: Component>(&mut self) -> Option<&mut ComponentPool<T>> {
        let id = self.component_types.lookup::<T>()?;
        let pool: &mut dyn ErasedPool = self.pools.get_mut(id.index() as usize)?.as_deref_mut()?;
        pool.as_any_mut().downcast_mut()
    }

    fn pool_or_insert<T: Component>(&mut self, id: ComponentTypeId) -> &mut ComponentPool<T> {
        let idx = id.index() as usize;
        if idx >= self.pools.len() {
            self.pools.resize_with(idx + 1, || None);
        }
        let capacity = self.config.pool_capacity;
        let pool: &mut dyn ErasedPool = self.pools[idx]
            .get_or_insert_with(|| Box::new(ComponentPool::<T>::with_capacity(capacity)))
            .as_mut();
        pool.as_any_mut()
            .downcast_mut()
            .expect("pool slot holds the pool for its component id")
    }

    // -- system management --------------------------------------------------

    /// Register `system`. Each system type may be registered once.
    ///
    /// The system's declared requirements are resolved into its signature
    /// here. Already-reconciled entities that satisfy it join immediately;
    /// pending ones join at the next [`update`](Self::update).
    pub fn add_system<S: System>(&mut self, mut system: S) -> Result<(), EcsError> {
        let name = std::any::type_name::<S>();
        if self.has_system::<S>() {
            return Err(EcsError::DuplicateSystem {
                name: name.to_owned(),
            });
        }

        let mut signature = Signature::new();
        for key in system.core().requirements() {
            signature.set(self.component_types.resolve(*key)?);
        }
        let core = system.core_mut();
        core.set_signature(signature);

        for entity in self.allocator.iter_alive() {
            let idx = entity.index();
            if self.visible[idx] && self.reconciled[idx].contains_all(signature) {
                core.add_entity_to_system(entity);
            }
        }

        debug!(
            system = name,
            ?signature,
            members = core.entities().len(),
            "system registered"
        );
        self.systems.push(RegisteredSystem {
            type_id: TypeId::of::<S>(),
            system: Box::new(system),
        });
        Ok(())
    }

    /// Whether a system of type `S` is registered, including while it is
    /// lent out by [`run_system`](Self::run_system).
    pub fn has_system<S: System>(&self) -> bool {
        self.position::<S>().is_some() || self.is_running::<S>()
    }

    /// Borrow the registered `S`.
    pub fn get_system<S: System>(&self) -> Result<&S, EcsError> {
        self.position::<S>()
            .and_then(|pos| system::downcast_ref::<S>(self.systems[pos].system.as_ref()))
            .ok_or_else(|| self.absent_system::<S>())
    }

    /// Mutably borrow the registered `S`.
    pub fn get_system_mut<S: System>(&mut self) -> Result<&mut S, EcsError> {
        match self.position::<S>() {
            Some(pos) => system::downcast_mut::<S>(self.systems[pos].system.as_mut())
                .ok_or_else(unknown_system::<S>),
            None => Err(self.absent_system::<S>()),
        }
    }

    /// Unregister `S` and hand it back.
    ///
    /// Fails with [`EcsError::SystemRunning`] from inside `S`'s own
    /// [`run_system`](Self::run_system) call.
    pub fn remove_system<S: System>(&mut self) -> Result<S, EcsError> {
        let pos = self.position::<S>().ok_or_else(|| self.absent_system::<S>())?;
        let entry = self.systems.remove(pos);
        debug!(system = std::any::type_name::<S>(), "system removed");
        system::downcast_box::<S>(entry.system).ok_or_else(unknown_system::<S>)
    }

    /// Run `f` with the registered `S` and this registry side by side.
    ///
    /// `S` is detached for the duration of the call, so `f` may freely
    /// create/remove entities and write components. An [`update`](Self::update)
    /// from inside `f` reconciles `S`'s membership into a copy that replaces
    /// the system's member list when `f` returns; `S`'s snapshot inside `f`
    /// stays as it was. While detached, `S` cannot be fetched, removed or
    /// registered again.
    pub fn run_system<S, R>(&mut self, f: impl FnOnce(&mut S, &mut Registry) -> R) -> Result<R, EcsError>
    where
        S: System,
    {
        let type_id = TypeId::of::<S>();
        let pos = self.position::<S>().ok_or_else(|| self.absent_system::<S>())?;
        let mut entry = self.systems.remove(pos);
        self.detached.push(DetachedSystem {
            type_id,
            shadow: entry.system.core().clone(),
            reconciled: false,
        });

        let result = system::downcast_mut::<S>(entry.system.as_mut())
            .map(|system| f(system, self))
            .ok_or_else(unknown_system::<S>);

        if let Some(i) = self.detached.iter().rposition(|d| d.type_id == type_id) {
            let detached = self.detached.remove(i);
            if detached.reconciled {
                entry
                    .system
                    .core_mut()
                    .set_entities(detached.shadow.into_entities());
            }
        }
        let pos = pos.min(self.systems.len());
        self.systems.insert(pos, entry);
        result
    }

    /// Registered systems in registration order.
    pub fn systems(&self) -> impl Iterator<Item = &dyn System> + '_ {
        self.systems.iter().map(|entry| entry.system.as_ref())
    }

    /// Number of attached systems. A system lent out by `run_system` is not
    /// counted until it returns.
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    fn position<S: System>(&self) -> Option<usize> {
        let type_id = TypeId::of::<S>();
        self.systems.iter().position(|entry| entry.type_id == type_id)
    }

    fn is_running<S: System>(&self) -> bool {
        let type_id = TypeId::of::<S>();
        self.detached.iter().any(|d| d.type_id == type_id)
    }

    fn absent_system<S: System>(&self) -> EcsError {
        if self.is_running::<S>() {
            EcsError::SystemRunning {
                name: std::any::type_name::<S>().to_owned(),
            }
        } else {
            unknown_system::<S>()
        }
    }

    // -- tags ---------------------------------------------------------------

    /// Give `entity` the unique `tag`.
    ///
    /// The entity's previous tag is dropped, and an entity that held `tag`
    /// before loses it.
    pub fn add_tag_to_entity(&mut self, entity: Entity, tag: &str) -> Result<(), EcsError> {
        self.ensure_alive(entity)?;
        if let Some(displaced) = self.tags.insert(entity, tag) {
            if displaced != entity {
                warn!(tag, from = %displaced, to = %entity, "tag moved to another entity");
            }
        }
        debug!(%entity, tag, "entity tagged");
        Ok(())
    }

    /// The entity holding `tag`, or [`EcsError::UnknownTag`].
    pub fn get_entity_by_tag(&self, tag: &str) -> Result<Entity, EcsError> {
        self.tags.entity(tag).ok_or_else(|| EcsError::UnknownTag {
            tag: tag.to_owned(),
        })
    }

    /// `true` if `entity` carries exactly `tag`.
    pub fn entity_has_tag(&self, entity: Entity, tag: &str) -> bool {
        self.tags.has(entity, tag)
    }

    /// The tag `entity` holds, if any.
    pub fn get_tag(&self, entity: Entity) -> Option<&str> {
        self.tags.tag(entity)
    }

    /// Clear `entity`'s tag. Silent no-op if it has none.
    pub fn remove_tag_from_entity(&mut self, entity: Entity) {
        if let Some(tag) = self.tags.remove(entity) {
            debug!(%entity, %tag, "tag removed");
        }
    }

    // -- groups -------------------------------------------------------------

    /// Put `entity` into `group`, leaving any group it was in.
    pub fn add_group_to_entity(&mut self, entity: Entity, group: &str) -> Result<(), EcsError> {
        self.ensure_alive(entity)?;
        if let Some(previous) = self.groups.insert(entity, group) {
            debug!(%entity, from = %previous, "entity left group");
        }
        debug!(%entity, group, "entity grouped");
        Ok(())
    }

    /// Members of `group` in id order, or [`EcsError::UnknownGroup`] if no
    /// entity was ever put in it.
    pub fn get_entities_by_group(&self, group: &str) -> Result<Vec<Entity>, EcsError> {
        self.groups
            .entities(group)
            .ok_or_else(|| EcsError::UnknownGroup {
                group: group.to_owned(),
            })
    }

    /// `true` if `entity` belongs to `group`.
    pub fn entity_in_group(&self, entity: Entity, group: &str) -> bool {
        self.groups.contains(entity, group)
    }

    /// The group `entity` belongs to, if any.
    pub fn get_group(&self, entity: Entity) -> Option<&str> {
        self.groups.group(entity)
    }

    /// Take `entity` out of its group. Silent no-op if it has none.
    pub fn remove_group_from_entity(&mut self, entity: Entity) {
        if let Some(group) = self.groups.remove(entity) {
            debug!(%entity, %group, "group removed");
        }
    }

    // -- reconciliation -----------------------------------------------------

    /// Apply pending entity additions and removals.
    ///
    /// Call exactly once per frame, between the previous frame's systems and
    /// the next frame's.
    ///
    /// 1. Each pending addition joins every system its signature satisfies.
    ///    Reconciled entities whose signature changed since the last update
    ///    join or leave systems to match.
    /// 2. Each pending removal leaves every system, loses its components,
    ///    signature, tag and group, and only then has its id recycled.
    pub fn update(&mut self) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        for detached in &mut self.detached {
            detached.reconciled = true;
        }

        for entity in std::mem::take(&mut self.entities_to_add) {
            let idx = entity.index();
            let signature = self.signatures[idx];
            for core in cores_mut(&mut self.systems, &mut self.detached) {
                if signature.contains_all(core.get_component_signature()) {
                    core.add_entity_to_system(entity);
                    report.joined += 1;
                }
            }
            self.reconciled[idx] = signature;
            self.visible[idx] = true;
            report.added += 1;
        }

        for entity in std::mem::take(&mut self.dirty) {
            let idx = entity.index();
            if !self.visible[idx] {
                continue;
            }
            let before = self.reconciled[idx];
            let after = self.signatures[idx];
            for core in cores_mut(&mut self.systems, &mut self.detached) {
                let required = core.get_component_signature();
                match (before.contains_all(required), after.contains_all(required)) {
                    (false, true) => {
                        core.add_entity_to_system(entity);
                        report.joined += 1;
                    }
                    (true, false) => {
                        core.remove_entity_from_system(entity);
                        report.left += 1;
                    }
                    _ => {}
                }
            }
            self.reconciled[idx] = after;
        }

        for entity in std::mem::take(&mut self.entities_to_remove) {
            let idx = entity.index();
            for core in cores_mut(&mut self.systems, &mut self.detached) {
                if core.remove_entity_from_system(entity) {
                    report.left += 1;
                }
            }
            for pool in self.pools.iter_mut().flatten() {
                pool.remove_entity(entity);
            }
            self.signatures[idx].reset();
            self.reconciled[idx].reset();
            self.visible[idx] = false;
            self.tags.remove(entity);
            self.groups.remove(entity);
            self.allocator.release(entity);
            report.removed += 1;
        }

        if !report.is_empty() {
            debug!(
                added = report.added,
                removed = report.removed,
                joined = report.joined,
                left = report.left,
                "registry reconciled"
            );
        }
        report
    }

    /// Destroy every entity immediately, keeping systems and kind ids.
    ///
    /// Meant for level teardown; all ids are recycled at once.
    pub fn clear(&mut self) {
        for detached in &mut self.detached {
            detached.reconciled = true;
        }
        for core in cores_mut(&mut self.systems, &mut self.detached) {
            core.clear_entities();
        }
        for pool in self.pools.iter_mut().flatten() {
            pool.clear();
        }
        let alive: Vec<Entity> = self.allocator.iter_alive().collect();
        for entity in alive {
            let idx = entity.index();
            self.signatures[idx].reset();
            self.reconciled[idx].reset();
            self.visible[idx] = false;
            self.tags.remove(entity);
            self.groups.remove(entity);
            self.allocator.release(entity);
        }
        self.entities_to_add.clear();
        self.entities_to_remove.clear();
        self.dirty.clear();
        debug!("registry cleared");
    }

    // -- helpers ------------------------------------------------------------

    fn ensure_alive(&self, entity: Entity) -> Result<(), EcsError> {
        if self.allocator.is_alive(entity) {
            Ok(())
        } else {
            Err(EcsError::DeadEntity { entity })
        }
    }

    fn mark_dirty(&mut self, entity: Entity) {
        if self.visible[entity.index()] {
            self.dirty.insert(entity);
        }
    }
}

fn missing<T: Component>(entity: Entity) -> EcsError {
    EcsError::MissingComponent {
        entity,
        component: std::any::type_name::<T>(),
    }
}

fn unknown_system<S: System>() -> EcsError {
    EcsError::UnknownSystem {
        name: std::any::type_name::<S>().to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::SystemCore;

    #[derive(Debug, Clone, PartialEq)]
    struct A(u32);
    #[derive(Debug, Clone, PartialEq)]
    struct B(u32);
    #[derive(Debug, Clone, PartialEq)]
    struct C;

    struct NeedsAB {
        core: SystemCore,
    }

    impl NeedsAB {
        fn new() -> Self {
            let mut core = SystemCore::new();
            core.require_component::<A>().require_component::<B>();
            Self { core }
        }
    }

    impl System for NeedsAB {
        fn core(&self) -> &SystemCore {
            &self.core
        }
        fn core_mut(&mut self) -> &mut SystemCore {
            &mut self.core
        }
    }

    struct NeedsABC {
        core: SystemCore,
    }

    impl NeedsABC {
        fn new() -> Self {
            let mut core = SystemCore::new();
            core.require_component::<A>()
                .require_component::<B>()
                .require_component::<C>();
            Self { core }
        }
    }

    impl System for NeedsABC {
        fn core(&self) -> &SystemCore {
            &self.core
        }
        fn core_mut(&mut self) -> &mut SystemCore {
            &mut self.core
        }
    }

    fn members<S: System>(registry: &Registry) -> Vec<Entity> {
        registry.get_system::<S>().unwrap().get_system_entities()
    }

    #[test]
    fn entity_with_required_components_joins_system() {
        let mut registry = Registry::new();
        let e = registry.create_entity();
        registry.add_component(e, A(1)).unwrap();
        registry.add_component(e, B(2)).unwrap();
        registry.add_system(NeedsAB::new()).unwrap();

        registry.update();
        assert_eq!(members::<NeedsAB>(&registry), vec![e]);
    }

    #[test]
    fn entity_missing_a_requirement_is_excluded() {
        let mut registry = Registry::new();
        let e = registry.create_entity();
        registry.add_component(e, A(1)).unwrap();
        registry.add_component(e, B(2)).unwrap();
        registry.add_system(NeedsABC::new()).unwrap();

        registry.update();
        assert!(members::<NeedsABC>(&registry).is_empty());
    }

    #[test]
    fn removal_is_deferred_until_update() {
        let mut registry = Registry::new();
        registry.add_system(NeedsAB::new()).unwrap();
        let e = registry.create_entity();
        registry.add_component(e, A(1)).unwrap();
        registry.add_component(e, B(2)).unwrap();
        registry.update();

        registry.entity_mut(e).remove().unwrap();
        assert_eq!(members::<NeedsAB>(&registry), vec![e]);
        assert!(registry.has_component::<A>(e));

        let report = registry.update();
        assert_eq!(report.removed, 1);
        assert!(members::<NeedsAB>(&registry).is_empty());
        assert!(registry.get_signature(e).is_empty());
        assert!(!registry.is_alive(e));
    }

    #[test]
    fn adding_twice_upserts() {
        let mut registry = Registry::new();
        let e = registry.create_entity();
        registry.add_component(e, A(1)).unwrap();
        registry.add_component(e, A(2)).unwrap();
        assert_eq!(registry.pool::<A>().unwrap().len(), 1);
        assert_eq!(registry.get_component::<A>(e).unwrap(), &A(2));
    }

    #[test]
    fn created_entity_is_invisible_until_update() {
        let mut registry = Registry::new();
        registry.add_system(NeedsAB::new()).unwrap();
        let e = registry.create_entity();
        registry.add_component(e, A(0)).unwrap();
        registry.add_component(e, B(0)).unwrap();
        assert!(members::<NeedsAB>(&registry).is_empty());
        assert_eq!(registry.pending_additions(), &[e]);
        registry.update();
        assert_eq!(members::<NeedsAB>(&registry), vec![e]);
    }

    #[test]
    fn id_is_recycled_only_after_update() {
        let mut registry = Registry::new();
        let e = registry.create_entity();
        registry.add_component(e, A(9)).unwrap();
        registry.add_tag_to_entity(e, "player").unwrap();
        registry.add_group_to_entity(e, "heroes").unwrap();
        registry.update();

        registry.remove_entity(e).unwrap();
        let before = registry.create_entity();
        assert_ne!(before, e);

        registry.update();
        let recycled = registry.create_entity();
        assert_eq!(recycled, e);
        assert!(registry.get_signature(recycled).is_empty());
        assert!(!registry.has_component::<A>(recycled));
        assert!(registry.get_component::<A>(recycled).is_err());
        assert!(!registry.entity_has_tag(recycled, "player"));
        assert!(!registry.entity_in_group(recycled, "heroes"));
    }

    #[test]
    fn double_remove_is_idempotent() {
        let mut registry = Registry::new();
        let e = registry.create_entity();
        registry.remove_entity(e).unwrap();
        registry.remove_entity(e).unwrap();
        assert_eq!(registry.pending_removals().count(), 1);
        let report = registry.update();
        assert_eq!(report.removed, 1);
        assert!(matches!(
            registry.remove_entity(e),
            Err(EcsError::DeadEntity { .. })
        ));
    }

    #[test]
    fn component_change_updates_membership_at_next_update() {
        let mut registry = Registry::new();
        registry.add_system(NeedsAB::new()).unwrap();
        let e = registry.create_entity();
        registry.add_component(e, A(1)).unwrap();
        registry.update();
        assert!(members::<NeedsAB>(&registry).is_empty());

        registry.add_component(e, B(1)).unwrap();
        assert!(members::<NeedsAB>(&registry).is_empty());
        registry.update();
        assert_eq!(members::<NeedsAB>(&registry), vec![e]);

        assert_eq!(registry.remove_component::<A>(e), Some(A(1)));
        registry.update();
        assert!(members::<NeedsAB>(&registry).is_empty());
    }

    #[test]
    fn late_system_is_backfilled() {
        let mut registry = Registry::new();
        let e = registry.create_entity();
        registry.add_component(e, A(1)).unwrap();
        registry.add_component(e, B(1)).unwrap();
        registry.update();

        registry.add_system(NeedsAB::new()).unwrap();
        assert_eq!(members::<NeedsAB>(&registry), vec![e]);
        registry.update();
        assert_eq!(members::<NeedsAB>(&registry), vec![e]);
    }

    #[test]
    fn remove_absent_component_is_not_fatal() {
        let mut registry = Registry::new();
        let e = registry.create_entity();
        assert_eq!(registry.remove_component::<C>(e), None);
        registry.add_component(e, A(3)).unwrap();
        assert_eq!(registry.remove_component::<B>(e), None);
        assert!(registry.has_component::<A>(e));
    }

    #[test]
    fn missing_component_is_an_error() {
        let mut registry = Registry::new();
        let e = registry.create_entity();
        let err = registry.get_component::<A>(e).unwrap_err();
        assert!(matches!(err, EcsError::MissingComponent { entity, .. } if entity == e));
        assert!(registry.get_component_mut::<A>(e).is_err());
    }

    #[test]
    fn duplicate_and_unknown_systems() {
        let mut registry = Registry::new();
        assert!(matches!(
            registry.get_system::<NeedsAB>(),
            Err(EcsError::UnknownSystem { .. })
        ));
        registry.add_system(NeedsAB::new()).unwrap();
        assert!(matches!(
            registry.add_system(NeedsAB::new()),
            Err(EcsError::DuplicateSystem { .. })
        ));
        assert_eq!(registry.system_count(), 1);

        let removed = registry.remove_system::<NeedsAB>().unwrap();
        assert!(removed.core().entities().is_empty());
        assert!(!registry.has_system::<NeedsAB>());
        assert!(registry.remove_system::<NeedsAB>().is_err());
    }

    #[test]
    fn run_system_detaches_and_restores() {
        let mut registry = Registry::new();
        registry.add_system(NeedsAB::new()).unwrap();
        registry.add_system(NeedsABC::new()).unwrap();
        let e = registry.create_entity();
        registry.add_component(e, A(5)).unwrap();
        registry.add_component(e, B(5)).unwrap();
        registry.update();

        let seen = registry
            .run_system::<NeedsAB, _>(|system, registry| {
                for entity in system.get_system_entities() {
                    registry.get_component_mut::<A>(entity).unwrap().0 += 1;
                }
                system.core().entities().len()
            })
            .unwrap();
        assert_eq!(seen, 1);
        assert_eq!(registry.get_component::<A>(e).unwrap(), &A(6));

        let order: Vec<_> = registry.systems().map(|s| s.name()).collect();
        assert!(order[0].ends_with("NeedsAB"));
        assert!(order[1].ends_with("NeedsABC"));
    }

    #[test]
    fn update_inside_run_system_reconciles_the_running_system() {
        let mut registry = Registry::new();
        registry.add_system(NeedsAB::new()).unwrap();
        let old = registry.create_entity();
        registry.add_component(old, A(1)).unwrap();
        registry.add_component(old, B(1)).unwrap();
        registry.update();

        let spawned = registry
            .run_system::<NeedsAB, _>(|system, registry| {
                registry.remove_entity(old).unwrap();
                let spawned = registry.create_entity();
                registry.add_component(spawned, A(2)).unwrap();
                registry.add_component(spawned, B(2)).unwrap();
                let report = registry.update();
                assert_eq!(report.left, 1);
                assert_eq!(report.joined, 1);
                // The running system's own snapshot is untouched.
                assert_eq!(system.get_system_entities(), vec![old]);
                spawned
            })
            .unwrap();
        assert_eq!(members::<NeedsAB>(&registry), vec![spawned]);

        // The recycled id must not inherit the old membership.
        registry.update();
        let recycled = registry.create_entity();
        assert_eq!(recycled, old);
        registry.update();
        assert!(registry.get_signature(recycled).is_empty());
        assert_eq!(members::<NeedsAB>(&registry), vec![spawned]);
    }

    #[test]
    fn running_system_cannot_be_removed_or_replaced() {
        let mut registry = Registry::new();
        registry.add_system(NeedsAB::new()).unwrap();

        registry
            .run_system::<NeedsAB, _>(|_system, registry| {
                assert!(registry.has_system::<NeedsAB>());
                assert!(matches!(
                    registry.remove_system::<NeedsAB>(),
                    Err(EcsError::SystemRunning { .. })
                ));
                assert!(matches!(
                    registry.get_system::<NeedsAB>(),
                    Err(EcsError::SystemRunning { .. })
                ));
                assert!(matches!(
                    registry.add_system(NeedsAB::new()),
                    Err(EcsError::DuplicateSystem { .. })
                ));
                assert!(matches!(
                    registry.run_system::<NeedsAB, _>(|_, _| ()),
                    Err(EcsError::SystemRunning { .. })
                ));
            })
            .unwrap();

        assert_eq!(registry.system_count(), 1);
        assert!(registry.get_system::<NeedsAB>().is_ok());
        assert!(registry.remove_system::<NeedsAB>().is_ok());
        assert!(matches!(
            registry.get_system::<NeedsAB>(),
            Err(EcsError::UnknownSystem { .. })
        ));
    }

    #[test]
    fn pool_mut_writes_values_without_changing_owners() {
        let mut registry = Registry::new();
        let e = registry.create_entity();
        let other = registry.create_entity();
        registry.add_component(e, A(1)).unwrap();
        registry.add_component(other, A(10)).unwrap();

        {
            let mut pool = registry.pool_mut::<A>().unwrap();
            pool.get_mut(e).unwrap().0 = 7;
            for (_, value) in pool.iter_mut() {
                value.0 += 1;
            }
            assert_eq!(pool.len(), 2);
            assert_eq!(pool.entities(), &[e, other]);
        }

        assert!(registry.has_component::<A>(e));
        assert_eq!(registry.get_component::<A>(e), Ok(&A(8)));
        assert_eq!(registry.get_component::<A>(other), Ok(&A(11)));
    }

    #[test]
    fn tags_are_unique_and_removable() {
        let mut registry = Registry::new();
        let e = registry.create_entity();
        registry.add_tag_to_entity(e, "player").unwrap();
        assert_eq!(registry.get_entity_by_tag("player").unwrap(), e);
        assert!(registry.entity_has_tag(e, "player"));

        registry.remove_tag_from_entity(e);
        assert!(!registry.entity_has_tag(e, "player"));
        assert!(matches!(
            registry.get_entity_by_tag("player"),
            Err(EcsError::UnknownTag { .. })
        ));
        registry.remove_tag_from_entity(e);
    }

    #[test]
    fn retagging_does_not_leave_stale_tag() {
        let mut registry = Registry::new();
        let e = registry.create_entity();
        registry.add_tag_to_entity(e, "player").unwrap();
        registry.add_tag_to_entity(e, "hero").unwrap();
        assert!(registry.get_entity_by_tag("player").is_err());
        assert_eq!(registry.get_entity_by_tag("hero").unwrap(), e);
        assert_eq!(registry.get_tag(e), Some("hero"));
    }

    #[test]
    fn groups_collect_many_entities() {
        let mut registry = Registry::new();
        let a = registry.create_entity();
        let b = registry.create_entity();
        registry.add_group_to_entity(a, "enemies").unwrap();
        registry.add_group_to_entity(b, "enemies").unwrap();
        assert_eq!(registry.get_entities_by_group("enemies").unwrap(), vec![a, b]);
        assert!(registry.entity_in_group(a, "enemies"));
        assert!(matches!(
            registry.get_entities_by_group("allies"),
            Err(EcsError::UnknownGroup { .. })
        ));

        registry.remove_group_from_entity(a);
        assert_eq!(registry.get_entities_by_group("enemies").unwrap(), vec![b]);
        assert_eq!(registry.get_group(a), None);
    }

    #[test]
    fn dead_entity_rejects_mutation() {
        let mut registry = Registry::new();
        let e = registry.create_entity();
        registry.remove_entity(e).unwrap();
        registry.update();
        assert!(matches!(
            registry.add_component(e, A(1)),
            Err(EcsError::DeadEntity { .. })
        ));
        assert!(registry.add_tag_to_entity(e, "x").is_err());
        assert!(registry.add_group_to_entity(e, "x").is_err());
    }

    #[test]
    fn clear_drops_all_entities_but_keeps_systems() {
        let mut registry = Registry::new();
        registry.add_system(NeedsAB::new()).unwrap();
        for i in 0..5 {
            let e = registry.create_entity();
            registry.add_component(e, A(i)).unwrap();
            registry.add_component(e, B(i)).unwrap();
        }
        registry.update();
        registry.clear();

        assert_eq!(registry.entity_count(), 0);
        assert!(members::<NeedsAB>(&registry).is_empty());
        assert!(registry.pool::<A>().unwrap().is_empty());
        assert!(registry.has_system::<NeedsAB>());
    }

    #[test]
    fn config_from_json_fills_defaults() {
        let config: RegistryConfig = serde_json::from_str(r#"{ "pool_capacity": 8 }"#).unwrap();
        assert_eq!(config.pool_capacity, 8);
        assert_eq!(config.entity_capacity, RegistryConfig::default().entity_capacity);
        let registry = Registry::with_config(config.clone());
        assert_eq!(registry.config(), &config);
    }
}
