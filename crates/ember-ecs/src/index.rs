//! Tag and group indices.
//!
//! A tag names at most one entity and an entity holds at most one tag. A
//! group names any number of entities, while each entity belongs to at most
//! one group. Both indices are kept bidirectional so lookups either way are
//! O(1) and re-assignment never leaves a stale entry behind.

use std::collections::{BTreeSet, HashMap};

use crate::entity::Entity;

// ---------------------------------------------------------------------------
// TagIndex
// ---------------------------------------------------------------------------

/// One-to-one mapping between tag names and entities.
#[derive(Debug, Default)]
pub struct TagIndex {
    entity_by_tag: HashMap<String, Entity>,
    tag_by_entity: HashMap<Entity, String>,
}

impl TagIndex {
    /// An empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag `entity` with `tag`.
    ///
    /// Drops the entity's previous tag, and takes `tag` away from any other
    /// entity holding it. Returns that displaced entity, if any.
    pub fn insert(&mut self, entity: Entity, tag: &str) -> Option<Entity> {
        self.remove(entity);
        let displaced = self.entity_by_tag.insert(tag.to_owned(), entity);
        if let Some(previous) = displaced {
            self.tag_by_entity.remove(&previous);
        }
        self.tag_by_entity.insert(entity, tag.to_owned());
        displaced
    }

    /// The entity holding `tag`.
    pub fn entity(&self, tag: &str) -> Option<Entity> {
        self.entity_by_tag.get(tag).copied()
    }

    /// The tag held by `entity`.
    pub fn tag(&self, entity: Entity) -> Option<&str> {
        self.tag_by_entity.get(&entity).map(String::as_str)
    }

    /// Whether `entity` holds exactly `tag`.
    pub fn has(&self, entity: Entity, tag: &str) -> bool {
        self.entity_by_tag.get(tag) == Some(&entity)
    }

    /// Clear `entity`'s tag in both directions. Returns the removed tag.
    pub fn remove(&mut self, entity: Entity) -> Option<String> {
        let tag = self.tag_by_entity.remove(&entity)?;
        self.entity_by_tag.remove(&tag);
        Some(tag)
    }

    /// Number of tagged entities.
    pub fn len(&self) -> usize {
        self.entity_by_tag.len()
    }

    /// `true` when no entity is tagged.
    pub fn is_empty(&self) -> bool {
        self.entity_by_tag.is_empty()
    }
}

// ---------------------------------------------------------------------------
// GroupIndex
// ---------------------------------------------------------------------------

/// Many-to-one mapping from entities to group names.
///
/// A group stays known (and returns an empty member set) after its last
/// member leaves.
#[derive(Debug, Default)]
pub struct GroupIndex {
    entities_by_group: HashMap<String, BTreeSet<Entity>>,
    group_by_entity: HashMap<Entity, String>,
}

impl GroupIndex {
    /// An empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `entity` in `group`, leaving its previous group if it had one.
    ///
    /// Returns the previous group name when it differed.
    pub fn insert(&mut self, entity: Entity, group: &str) -> Option<String> {
        if self.group(entity) == Some(group) {
            return None;
        }
        let previous = self.remove(entity);
        self.entities_by_group
            .entry(group.to_owned())
            .or_default()
            .insert(entity);
        self.group_by_entity.insert(entity, group.to_owned());
        previous
    }

    /// Members of `group` in id order, or `None` if the group was never used.
    pub fn entities(&self, group: &str) -> Option<Vec<Entity>> {
        self.entities_by_group
            .get(group)
            .map(|members| members.iter().copied().collect())
    }

    /// The group `entity` belongs to.
    pub fn group(&self, entity: Entity) -> Option<&str> {
        self.group_by_entity.get(&entity).map(String::as_str)
    }

    /// Whether `entity` belongs to `group`.
    pub fn contains(&self, entity: Entity, group: &str) -> bool {
        self.entities_by_group
            .get(group)
            .is_some_and(|members| members.contains(&entity))
    }

    /// Take `entity` out of its group. Returns the group it left.
    pub fn remove(&mut self, entity: Entity) -> Option<String> {
        let group = self.group_by_entity.remove(&entity)?;
        if let Some(members) = self.entities_by_group.get_mut(&group) {
            members.remove(&entity);
        }
        Some(group)
    }

    /// Number of known groups.
    pub fn len(&self) -> usize {
        self.entities_by_group.len()
    }

    /// `true` when no group has members.
    pub fn is_empty(&self) -> bool {
        self.entities_by_group.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn e(id: u32) -> Entity {
        Entity::from_raw(id)
    }

    #[test]
    fn tag_round_trip() {
        let mut tags = TagIndex::new();
        tags.insert(e(1), "player");
        assert_eq!(tags.entity("player"), Some(e(1)));
        assert!(tags.has(e(1), "player"));
        assert_eq!(tags.remove(e(1)).as_deref(), Some("player"));
        assert_eq!(tags.entity("player"), None);
        assert!(!tags.has(e(1), "player"));
    }

    #[test]
    fn retagging_drops_old_tag() {
        let mut tags = TagIndex::new();
        tags.insert(e(1), "player");
        tags.insert(e(1), "boss");
        assert_eq!(tags.entity("player"), None);
        assert_eq!(tags.entity("boss"), Some(e(1)));
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn tag_moves_to_new_holder() {
        let mut tags = TagIndex::new();
        tags.insert(e(1), "player");
        assert_eq!(tags.insert(e(2), "player"), Some(e(1)));
        assert_eq!(tags.tag(e(1)), None);
        assert_eq!(tags.entity("player"), Some(e(2)));
    }

    #[test]
    fn removing_untagged_is_silent() {
        let mut tags = TagIndex::new();
        assert_eq!(tags.remove(e(5)), None);
        assert!(tags.is_empty());
    }

    #[test]
    fn groups_hold_many_entities() {
        let mut groups = GroupIndex::new();
        groups.insert(e(3), "enemies");
        groups.insert(e(1), "enemies");
        assert_eq!(groups.entities("enemies"), Some(vec![e(1), e(3)]));
        assert!(groups.contains(e(3), "enemies"));
        assert_eq!(groups.entities("allies"), None);
    }

    #[test]
    fn regrouping_leaves_old_group() {
        let mut groups = GroupIndex::new();
        groups.insert(e(1), "enemies");
        assert_eq!(groups.insert(e(1), "projectiles").as_deref(), Some("enemies"));
        assert!(!groups.contains(e(1), "enemies"));
        assert_eq!(groups.entities("enemies"), Some(vec![]));
        assert_eq!(groups.group(e(1)), Some("projectiles"));
    }

    #[test]
    fn same_group_twice_is_noop() {
        let mut groups = GroupIndex::new();
        groups.insert(e(1), "enemies");
        assert_eq!(groups.insert(e(1), "enemies"), None);
        assert_eq!(groups.entities("enemies"), Some(vec![e(1)]));
    }
}
