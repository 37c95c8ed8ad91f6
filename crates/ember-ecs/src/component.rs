//! Component kinds and their type ids.
//!
//! Every distinct component type gets a small [`ComponentTypeId`] the first
//! time it is used by a [`Registry`](crate::registry::Registry) operation.
//! Ids are handed out sequentially from 0, never reclaimed, and bounded by
//! [`MAX_COMPONENTS`]. The table is owned by the registry rather than being
//! process-global, so two registries may number the same type differently.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::signature::MAX_COMPONENTS;
use crate::EcsError;

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// Marker for types that can be stored as components.
///
/// Any `'static` type qualifies; components are plain data records.
pub trait Component: Any {}

impl<T: Any> Component for T {}

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Small integer identifying a component kind within one registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub(crate) u32);

impl ComponentTypeId {
    /// The bit / pool index for this kind.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentKey
// ---------------------------------------------------------------------------

/// A compile-time type token: the Rust `TypeId` plus a readable name.
///
/// Systems record their requirements as keys at construction; the registry
/// resolves them to ids when the system is registered.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentKey {
    type_id: TypeId,
    name: &'static str,
}

impl ComponentKey {
    /// The key for component type `T`.
    pub fn of<T: Component>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Rust `TypeId` of the component.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified type name of the component.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentKey({})", self.name)
    }
}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// Metadata about an allocated component kind.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    /// Id assigned on first use.
    pub id: ComponentTypeId,
    /// `std::any::type_name::<T>()`
    pub name: &'static str,
    /// Rust `TypeId` for runtime type checking.
    pub type_id: TypeId,
}

// ---------------------------------------------------------------------------
// ComponentTypeRegistry
// ---------------------------------------------------------------------------

/// Maps Rust types to [`ComponentTypeId`]s, allocating lazily.
///
/// The first call to [`id_for`](Self::id_for) for a type wins the next id;
/// later calls return the same id.
#[derive(Debug, Default)]
pub struct ComponentTypeRegistry {
    /// TypeId -> ComponentTypeId for dedup.
    by_type: HashMap<TypeId, ComponentTypeId>,
    /// Indexed by ComponentTypeId.0.
    infos: Vec<ComponentInfo>,
}

impl ComponentTypeRegistry {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `T`, allocating one if this is the first use.
    pub fn id_for<T: Component>(&mut self) -> Result<ComponentTypeId, EcsError> {
        self.resolve(ComponentKey::of::<T>())
    }

    /// Id for a type token, allocating one if this is the first use.
    ///
    /// Fails with [`EcsError::ComponentLimitExceeded`] once
    /// [`MAX_COMPONENTS`] kinds exist.
    pub fn resolve(&mut self, key: ComponentKey) -> Result<ComponentTypeId, EcsError> {
        if let Some(&existing) = self.by_type.get(&key.type_id) {
            return Ok(existing);
        }
        if self.infos.len() >= MAX_COMPONENTS {
            return Err(EcsError::ComponentLimitExceeded {
                name: key.name.to_owned(),
                max: MAX_COMPONENTS,
            });
        }

        let id = ComponentTypeId(self.infos.len() as u32);
        self.infos.push(ComponentInfo {
            id,
            name: key.name,
            type_id: key.type_id,
        });
        self.by_type.insert(key.type_id, id);
        debug!(component = key.name, id = id.0, "allocated component type id");
        Ok(id)
    }

    /// Look up the id for `T` without allocating.
    pub fn lookup<T: Component>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Get the [`ComponentInfo`] for an allocated id.
    pub fn get_info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.infos.get(id.0 as usize)
    }

    /// Number of allocated kinds.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Whether no kind has been used yet.
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
