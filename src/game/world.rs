//! World: Grid Index + Entity Registry
//!
//! The only place entities are mutated. Every mutation updates the registry
//! and the grid together, emits its presentation event, and returns the
//! action that undoes it.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::coord::Coord;
use crate::core::fixed::Fixed;
use crate::core::hash::{compute_state_hash, StateHash};
use crate::game::action::{Action, FieldEdit};
use crate::game::entity::{Entity, EntityDef, EntityId, EntityKind, KindTag, RockState, BOUNDARY_ENTITY};
use crate::game::events::{CueKind, EventLog, EventTiming, GameEvent, GameEventData};
use crate::game::grid::{is_pit, Bounds, Grid, RayHit};
use crate::game::registry::Registry;

/// How a destroyed entity leaves the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Defeat {
    /// Ordinary destruction (fell into the pit, crushed by a rock)
    Normal,
    /// Killed by a hazard
    Hazard,
    /// Squished by a push along `dir`
    Squish(Coord),
    /// Removed without delay (undo, restart)
    Instant,
}

/// Puzzle board.
#[derive(Clone, Debug)]
pub struct World {
    grid: Grid,
    registry: Registry,
    events: EventLog,
    timing: EventTiming,
}

impl World {
    /// Empty world over `bounds`.
    pub fn new(bounds: Bounds, timing: EventTiming) -> Self {
        Self {
            grid: Grid::new(bounds),
            registry: Registry::new(),
            events: EventLog::new(),
            timing,
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Level box, for camera layout.
    pub fn bounds(&self) -> Bounds {
        self.grid.bounds()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn timing(&self) -> &EventTiming {
        &self.timing
    }

    /// Live entity, or the boundary stand-in for `EntityId::BOUNDARY`.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        if id.is_boundary() {
            Some(&BOUNDARY_ENTITY)
        } else {
            self.registry.get(id)
        }
    }

    /// Current id standing for a possibly stale `id`.
    pub fn resolve(&self, id: EntityId) -> EntityId {
        self.registry.resolve(id)
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.registry.is_alive(id)
    }

    /// Occupant ids of `c`.
    pub fn entities_at(&self, c: Coord) -> BTreeSet<EntityId> {
        self.grid.entities_at(c)
    }

    /// Occupant records of `c`, in id order.
    pub fn occupants(&self, c: Coord) -> Vec<&Entity> {
        self.grid
            .entities_at(c)
            .into_iter()
            .filter_map(|id| self.entity(id))
            .collect()
    }

    /// Directed raycast for an entity kind; solid faces toward the ray stop it.
    pub fn sense(&self, start: Coord, dir: Coord, sought: KindTag) -> RayHit {
        self.grid.raycast_for(
            start,
            dir,
            |id| self.entity(id).map_or(false, |e| e.kind.tag() == sought),
            |id| self.entity(id).map_or(false, |e| e.is_blocking(-dir)),
        )
    }

    /// Does any player share a cell with a goal?
    pub fn is_won(&self) -> bool {
        self.registry.of_kind(KindTag::Player).any(|player| {
            player.cells().any(|c| {
                self.occupants(c).iter().any(|e| e.kind.tag() == KindTag::Goal)
            })
        })
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Spawn from `def` under a fresh id. `origin` names the id this entity
    /// used to have, when it is being brought back.
    ///
    /// Returns `None` (and changes nothing) if the shape leaves the level.
    pub fn spawn(&mut self, def: &EntityDef, origin: Option<EntityId>) -> Option<(EntityId, Action)> {
        let id = self.registry.peek_next_id();
        let ent = def.instantiate(id);
        if !self.grid.add(id, ent.cells()) {
            return None;
        }
        let id = self.registry.create(def).id;
        if let Some(old) = origin {
            self.registry.alias(old, id);
        }
        self.events.push(0, GameEventData::Existence { id, exists: true });
        tracing::trace!(?id, kind = ?def.kind, at = %def.position, "spawn");
        Some((id, Action::Despawn { id }))
    }

    /// Remove an entity. `None` if it is not alive.
    pub fn despawn(&mut self, id: EntityId, defeat: Defeat) -> Option<Action> {
        let ent = self.registry.remove(id)?;
        self.grid.remove(id, ent.cells());

        let data = match defeat {
            Defeat::Squish(dir) => GameEventData::Squished { id, dir: Coord::new(dir.x, dir.y, 0) },
            _ => GameEventData::Existence { id, exists: false },
        };
        let delay = match defeat {
            Defeat::Normal => self.timing.destroy_delay,
            Defeat::Hazard => self.timing.hazard_delay,
            Defeat::Squish(_) => self.timing.squish_delay,
            Defeat::Instant => 0,
        };
        self.events.push(delay, data);
        tracing::trace!(?id, ?defeat, "despawn");

        Some(Action::Spawn {
            def: EntityDef::from_entity(&ent),
            origin: Some(id),
        })
    }

    /// Move an entity's anchor. `None` if it is not alive.
    pub fn move_to(&mut self, id: EntityId, to: Coord) -> Option<Action> {
        let ent = self.registry.get(id)?;
        debug_assert!(!ent.is_fixed(), "moving fixed entity {:?}", id);
        let from = ent.position;
        let old_cells: Vec<Coord> = ent.cells().collect();
        let new_cells: Vec<Coord> = ent.cells_at(to).collect();

        self.grid.remove(id, old_cells.iter().copied());
        if !self.grid.add(id, new_cells) {
            self.grid.add(id, old_cells);
            return None;
        }
        if let Some(ent) = self.registry.get_mut(id) {
            ent.position = to;
        }

        let scale_hint = self.timing.scale_hint(to);
        self.events.push(0, GameEventData::Moved { id, to, scale_hint });
        Some(Action::Reposition { id, to: from })
    }

    /// Turn an entity. `None` if it is not alive.
    pub fn set_direction(&mut self, id: EntityId, dir: Coord) -> Option<Action> {
        let ent = self.registry.get_mut(id)?;
        let old = ent.direction;
        ent.direction = dir;
        if old != dir {
            self.events.push(0, GameEventData::Reoriented { id, quarter_turns: dir.quarter_turns() });
        }
        Some(Action::Reorient { id, to: old })
    }

    /// Apply a kind-specific field edit. `None` if the entity is not alive
    /// or does not have the field.
    pub fn edit(&mut self, id: EntityId, edit: FieldEdit) -> Option<Action> {
        let ent = self.registry.get_mut(id)?;
        match (edit, &mut ent.kind) {
            (FieldEdit::RockMoving(moving), EntityKind::Rock(state)) => {
                let old = state.moving;
                *state = RockState { moving };
                Some(Action::FieldEdit { id, edit: FieldEdit::RockMoving(old) })
            }
            (edit, kind) => {
                debug_assert!(false, "{:?} does not apply to {:?}", edit, kind);
                tracing::warn!(?id, ?edit, "field edit on the wrong kind skipped");
                None
            }
        }
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Feedback event that changes no state.
    pub fn emit(&mut self, data: GameEventData) {
        self.events.push(0, data);
    }

    /// Cosmetic cue.
    pub fn cue(&mut self, kind: CueKind, position: Coord, dir: Coord, delay: Fixed) {
        self.events.push_cue(delay, kind, position, dir);
    }

    /// Close the current animation group.
    pub fn batch_events(&mut self) {
        self.events.batch();
    }

    pub fn take_events(&mut self) -> Vec<GameEvent> {
        self.events.take()
    }

    // =========================================================================
    // VERIFICATION
    // =========================================================================

    /// Hash of the structural state. Ids are excluded, so an entity
    /// respawned by undo under a new id hashes the same.
    pub fn structural_hash(&self) -> StateHash {
        let mut entities: Vec<&Entity> = self.registry.iter().collect();
        entities.sort_by(|a, b| {
            (a.kind.tag(), a.position, a.direction, a.gravity, &a.shape, a.is_moving_rock())
                .cmp(&(b.kind.tag(), b.position, b.direction, b.gravity, &b.shape, b.is_moving_rock()))
        });
        compute_state_hash(self.is_won(), |hasher| {
            hasher.update_u32(entities.len() as u32);
            for ent in entities {
                ent.hash_into(hasher);
            }
        })
    }

    /// Does every indexed cell hold exactly the entities whose shape covers it?
    pub fn index_consistent(&self) -> bool {
        let mut expected: BTreeMap<Coord, BTreeSet<EntityId>> = BTreeMap::new();
        for ent in self.registry.iter() {
            for c in ent.cells().filter(|c| !is_pit(*c)) {
                expected.entry(c).or_default().insert(ent.id);
            }
        }
        let actual: BTreeMap<Coord, BTreeSet<EntityId>> = self
            .grid
            .occupied()
            .map(|(c, set)| (c, set.clone()))
            .collect();
        expected == actual
    }
}

// =============================================================================
// TESTS
// =============================================================================
