//! Fixed-width component signatures.
//!
//! A [`Signature`] is a bitset of width [`MAX_COMPONENTS`]. For an entity,
//! bit `k` means "owns a component of kind `k`"; for a system, it means
//! "requires a component of kind `k`".

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::component::ComponentTypeId;

/// Maximum number of distinct component kinds a registry can track.
pub const MAX_COMPONENTS: usize = 32;

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// A set of component kinds, stored as a `u32` bitmask.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(u32);

impl Signature {
    /// The empty signature.
    pub const EMPTY: Signature = Signature(0);

    /// Create an empty signature.
    #[inline]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Set the bit for `id`.
    #[inline]
    pub fn set(&mut self, id: ComponentTypeId) {
        self.0 |= 1 << id.index();
    }

    /// Clear the bit for `id`.
    #[inline]
    pub fn unset(&mut self, id: ComponentTypeId) {
        self.0 &= !(1 << id.index());
    }

    /// Whether the bit for `id` is set.
    #[inline]
    pub fn test(self, id: ComponentTypeId) -> bool {
        self.0 & (1 << id.index()) != 0
    }

    /// Clear every bit.
    #[inline]
    pub fn reset(&mut self) {
        self.0 = 0;
    }

    /// `true` when no bit is set.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of set bits.
    #[inline]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// `true` if every kind in `required` is also in `self`.
    ///
    /// This is the system acceptance test: `(entity & system) == system`.
    #[inline]
    pub fn contains_all(self, required: Signature) -> bool {
        self.0 & required.0 == required.0
    }

    /// Iterate over the component ids whose bits are set, lowest first.
    pub fn iter(self) -> impl Iterator<Item = ComponentTypeId> {
        (0..MAX_COMPONENTS as u32)
            .filter(move |bit| self.0 & (1 << bit) != 0)
            .map(ComponentTypeId)
    }

    /// Raw bitmask.
    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl FromIterator<ComponentTypeId> for Signature {
    fn from_iter<I: IntoIterator<Item = ComponentTypeId>>(iter: I) -> Self {
        let mut signature = Signature::new();
        for id in iter {
            signature.set(id);
        }
        signature
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({:#034b})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
