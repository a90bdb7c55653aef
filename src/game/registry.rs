//! Entity Registry
//!
//! Owns live entity records and hands out ids. Ids are never reissued: an
//! entity brought back by undo is a new id, and the alias table lets older
//! history records that still name the previous id find it.

use std::collections::BTreeMap;

use crate::game::entity::{Entity, EntityDef, EntityId, KindTag};

/// Live entities keyed by id.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    entities: BTreeMap<EntityId, Entity>,
    next_id: u32,
    /// old id -> id it was respawned as
    aliases: BTreeMap<EntityId, EntityId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id. Strictly increasing for the whole session.
    pub fn next_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Id the next `next_id()` call will return.
    pub fn peek_next_id(&self) -> EntityId {
        EntityId(self.next_id)
    }

    /// Create a record from `def` under a fresh id and store it.
    pub fn create(&mut self, def: &EntityDef) -> &Entity {
        let id = self.next_id();
        self.entities.entry(id).or_insert_with(|| def.instantiate(id))
    }

    /// Remove a record. `None` when the id is not live.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Follow the alias chain to the id currently standing for `id`.
    pub fn resolve(&self, id: EntityId) -> EntityId {
        let mut current = id;
        // Chains only ever point to larger ids, so this terminates.
        while let Some(next) = self.aliases.get(&current) {
            current = *next;
        }
        current
    }

    /// Record that `old` now lives on as `new`.
    pub fn alias(&mut self, old: EntityId, new: EntityId) {
        debug_assert!(old < new, "alias must point forward: {:?} -> {:?}", old, new);
        if old < new {
            self.aliases.insert(old, new);
        }
    }

    #[inline]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    #[inline]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All live entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Live entities of one kind, in id order.
    pub fn of_kind(&self, tag: KindTag) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(move |e| e.kind.tag() == tag)
    }

    /// Ids of every live entity, kind sweep order first, id order second.
    pub fn sweep_order(&self) -> Vec<EntityId> {
        KindTag::ALL
            .iter()
            .flat_map(|tag| self.of_kind(*tag).map(|e| e.id))
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::coord::Coord;
    use crate::game::entity::EntityKind;

    #[test]
    fn test_ids_strictly_increase() {
        let mut reg = Registry::new();
        let a = reg.create(&EntityDef::new(EntityKind::Player, Coord::ZERO, Coord::DOWN)).id;
        let b = reg.create(&EntityDef::new(EntityKind::Goal, Coord::ZERO, Coord::ZERO)).id;
        assert!(b > a);

        reg.remove(b);
        let c = reg.next_id();
        assert!(c > b, "removed ids are never reissued");
    }

    #[test]
    fn test_alias_chain_resolves() {
        let mut reg = Registry::new();
        reg.alias(EntityId(1), EntityId(4));
        reg.alias(EntityId(4), EntityId(9));
        assert_eq!(reg.resolve(EntityId(1)), EntityId(9));
        assert_eq!(reg.resolve(EntityId(4)), EntityId(9));
        assert_eq!(reg.resolve(EntityId(2)), EntityId(2));
    }

    #[test]
    fn test_sweep_order_by_kind_then_id() {
        let mut reg = Registry::new();
        let rock = reg.create(&EntityDef::new(EntityKind::ROCK, Coord::ZERO, Coord::DOWN)).id;
        let p1 = reg.create(&EntityDef::new(EntityKind::Player, Coord::ZERO, Coord::DOWN)).id;
        let wall = reg.create(&EntityDef::new(EntityKind::Wall, Coord::ZERO, Coord::ZERO)).id;
        let p2 = reg.create(&EntityDef::new(EntityKind::Player, Coord::ZERO, Coord::DOWN)).id;

        assert_eq!(reg.sweep_order(), vec![wall, p1, p2, rock]);
        assert_eq!(reg.of_kind(KindTag::Player).count(), 2);
    }
}
