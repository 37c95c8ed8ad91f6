//! Systems and their entity membership.
//!
//! A concrete system embeds a [`SystemCore`] and implements [`System`] to
//! expose it. The core records which component kinds the system requires
//! (as [`ComponentKey`]s, resolved into a [`Signature`] when the system is
//! registered) and the list of member entities the registry maintains.
//!
//! ```
//! use ember_ecs::prelude::*;
//!
//! struct Transform { x: f32 }
//! struct RigidBody { vx: f32 }
//!
//! struct Movement { core: SystemCore }
//!
//! impl Movement {
//!     fn new() -> Self {
//!         let mut core = SystemCore::new();
//!         core.require_component::<Transform>()
//!             .require_component::<RigidBody>();
//!         Self { core }
//!     }
//! }
//!
//! impl System for Movement {
//!     fn core(&self) -> &SystemCore { &self.core }
//!     fn core_mut(&mut self) -> &mut SystemCore { &mut self.core }
//! }
//!
//! let mut registry = Registry::new();
//! registry.add_system(Movement::new()).unwrap();
//! assert!(registry.has_system::<Movement>());
//! ```

use std::any::Any;

use crate::component::{Component, ComponentKey};
use crate::entity::Entity;
use crate::signature::Signature;

// ---------------------------------------------------------------------------
// AsAny
// ---------------------------------------------------------------------------

/// Upcast helper so boxed systems can be downcast to their concrete type.
///
/// Blanket-implemented for every `'static` type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

// ---------------------------------------------------------------------------
// SystemCore
// ---------------------------------------------------------------------------

/// Requirement signature and member list shared by every system.
#[derive(Debug, Clone, Default)]
pub struct SystemCore {
    /// Required kinds, in declaration order.
    requirements: Vec<ComponentKey>,
    /// Resolved on registration.
    signature: Signature,
    /// Members in insertion order.
    entities: Vec<Entity>,
}

impl SystemCore {
    /// A core with no requirements and no members.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that member entities must have a `T` component.
    ///
    /// Call while constructing the system, before it is registered.
    pub fn require_component<T: Component>(&mut self) -> &mut Self {
        let key = ComponentKey::of::<T>();
        if !self.requirements.contains(&key) {
            self.requirements.push(key);
        }
        self
    }

    /// Append `entity` to the member list. No duplicate check.
    pub fn add_entity_to_system(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    /// Remove the first member equal to `entity`, if any.
    pub fn remove_entity_from_system(&mut self, entity: Entity) -> bool {
        match self.entities.iter().position(|&e| e == entity) {
            Some(pos) => {
                self.entities.remove(pos);
                true
            }
            None => false,
        }
    }

    /// A snapshot copy of the member list.
    pub fn get_system_entities(&self) -> Vec<Entity> {
        self.entities.clone()
    }

    /// Borrow the member list without copying.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Whether `entity` is currently a member.
    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains(&entity)
    }

    /// The resolved requirement signature.
    pub fn get_component_signature(&self) -> Signature {
        self.signature
    }

    /// The declared requirements.
    pub fn requirements(&self) -> &[ComponentKey] {
        &self.requirements
    }

    pub(crate) fn set_signature(&mut self, signature: Signature) {
        self.signature = signature;
    }

    pub(crate) fn clear_entities(&mut self) {
        self.entities.clear();
    }

    pub(crate) fn set_entities(&mut self, entities: Vec<Entity>) {
        self.entities = entities;
    }

    pub(crate) fn into_entities(self) -> Vec<Entity> {
        self.entities
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// A registered unit of per-frame behavior.
///
/// The registry only needs access to the embedded [`SystemCore`]; the actual
/// per-frame work is an inherent method on the concrete type, driven by the
/// caller (see [`Registry::run_system`](crate::registry::Registry::run_system)).
pub trait System: AsAny {
    fn core(&self) -> &SystemCore;

    fn core_mut(&mut self) -> &mut SystemCore;

    /// Name used in logs and errors.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Snapshot of the current members.
    fn get_system_entities(&self) -> Vec<Entity> {
        self.core().get_system_entities()
    }

    fn get_component_signature(&self) -> Signature {
        self.core().get_component_signature()
    }
}

pub(crate) fn downcast_ref<S: System>(system: &dyn System) -> Option<&S> {
    system.as_any().downcast_ref()
}

pub(crate) fn downcast_mut<S: System>(system: &mut dyn System) -> Option<&mut S> {
    system.as_any_mut().downcast_mut()
}

pub(crate) fn downcast_box<S: System>(system: Box<dyn System>) -> Option<S> {
    system.into_any().downcast().ok().map(|boxed| *boxed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
