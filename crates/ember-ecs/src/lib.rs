//! Ember ECS -- sparse-set Entity Component System with deferred lifecycle.
//!
//! Components of each kind live in their own densely packed
//! [`ComponentPool`](pool::ComponentPool). Every entity carries a
//! [`Signature`](signature::Signature) of the kinds it owns, and every
//! [`System`](system::System) declares the kinds it requires. Entity creation
//! and destruction are queued and applied once per frame by
//! [`Registry::update`](registry::Registry::update), so systems iterating
//! their member snapshots never see membership change under them.
//!
//! # Quick Start
//!
//! ```
//! use ember_ecs::prelude::*;
//!
//! #[derive(Debug, PartialEq)]
//! struct Position { x: f32, y: f32 }
//!
//! #[derive(Debug, PartialEq)]
//! struct Velocity { dx: f32, dy: f32 }
//!
//! struct Movement { core: SystemCore }
//!
//! impl System for Movement {
//!     fn core(&self) -> &SystemCore { &self.core }
//!     fn core_mut(&mut self) -> &mut SystemCore { &mut self.core }
//! }
//!
//! let mut registry = Registry::new();
//! let mut core = SystemCore::new();
//! core.require_component::<Position>().require_component::<Velocity>();
//! registry.add_system(Movement { core }).unwrap();
//!
//! let entity = registry.create_entity();
//! registry.add_component(entity, Position { x: 0.0, y: 0.0 }).unwrap();
//! registry.add_component(entity, Velocity { dx: 1.0, dy: 0.0 }).unwrap();
//! registry.update();
//!
//! registry.run_system::<Movement, _>(|movement, registry| {
//!     for e in movement.get_system_entities() {
//!         let dx = registry.get_component::<Velocity>(e)?.dx;
//!         registry.get_component_mut::<Position>(e)?.x += dx;
//!     }
//!     Ok::<_, EcsError>(())
//! }).unwrap().unwrap();
//!
//! assert_eq!(registry.get_component::<Position>(entity).unwrap(), &Position { x: 1.0, y: 0.0 });
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod entity;
pub mod index;
pub mod pool;
pub mod registry;
pub mod signature;
pub mod system;

use entity::Entity;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// More distinct component kinds were used than a signature can hold.
    #[error("component type '{name}' would exceed the limit of {max} component kinds")]
    ComponentLimitExceeded { name: String, max: usize },

    /// A system type was registered twice.
    #[error("system '{name}' is already registered")]
    DuplicateSystem { name: String },

    /// A system type was looked up but never registered.
    #[error("system '{name}' is not registered")]
    UnknownSystem { name: String },

    /// The system is lent out by `Registry::run_system` and cannot be
    /// fetched, removed or registered again until that call returns.
    #[error("system '{name}' is running")]
    SystemRunning { name: String },

    /// The entity does not have the requested component.
    #[error("entity {entity} has no '{component}' component")]
    MissingComponent {
        entity: Entity,
        component: &'static str,
    },

    /// No entity holds the tag.
    #[error("no entity is tagged '{tag}'")]
    UnknownTag { tag: String },

    /// No entity was ever put in the group.
    #[error("group '{group}' does not exist")]
    UnknownGroup { group: String },

    /// The entity id is not alive.
    #[error("entity {entity} is not alive")]
    DeadEntity { entity: Entity },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{Component, ComponentKey, ComponentTypeId, ComponentTypeRegistry};
    pub use crate::entity::{Entity, EntityMut, EntityRef};
    pub use crate::index::{GroupIndex, TagIndex};
    pub use crate::pool::{ComponentPool, ErasedPool, PoolMut};
    pub use crate::registry::{ReconcileReport, Registry, RegistryConfig};
    pub use crate::signature::{Signature, MAX_COMPONENTS};
    pub use crate::system::{System, SystemCore};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
