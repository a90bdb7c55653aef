//! Puzzle State
//!
//! The world together with its undo history and the level it was loaded
//! from. Everything a step reads or writes lives here.

use crate::core::hash::StateHash;
use crate::game::action::{BatchTag, UndoStack};
use crate::game::entity::EntityId;
use crate::game::events::{EventTiming, GameEvent};
use crate::game::grid::Bounds;
use crate::game::level::{Level, LevelError};
use crate::game::world::{Defeat, World};

/// A level in play.
#[derive(Clone, Debug)]
pub struct PuzzleState {
    /// Board
    pub world: World,
    /// Inverse actions, one batch per turn
    pub history: UndoStack,
    /// Turns taken (undo and redo do not count)
    pub turn: u32,
    level: Level,
}

impl PuzzleState {
    /// Load a level.
    pub fn new(level: Level, timing: EventTiming) -> Result<Self, LevelError> {
        let world = level.build_world(timing)?;
        Ok(Self {
            world,
            history: UndoStack::new(),
            turn: 0,
            level,
        })
    }

    /// Parse, validate and load a level.
    pub fn from_json(json: &str, timing: EventTiming) -> Result<Self, LevelError> {
        Self::new(Level::from_json(json)?, timing)
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    /// Level box, for camera layout.
    pub fn level_bounds(&self) -> Bounds {
        self.world.bounds()
    }

    pub fn is_won(&self) -> bool {
        self.world.is_won()
    }

    /// Structural hash of the board (ids excluded).
    pub fn compute_hash(&self) -> StateHash {
        self.world.structural_hash()
    }

    pub fn take_events(&mut self) -> Vec<GameEvent> {
        self.world.take_events()
    }

    // =========================================================================
    // HISTORY
    // =========================================================================

    /// Rewind one turn.
    pub fn undo(&mut self) -> bool {
        let undone = self.history.undo(&mut self.world);
        if undone {
            tracing::debug!(depth = self.history.depth(), "undo");
        }
        undone
    }

    /// Replay one undone turn.
    pub fn redo(&mut self) -> bool {
        let redone = self.history.redo(&mut self.world);
        if redone {
            tracing::debug!(depth = self.history.depth(), "redo");
        }
        redone
    }

    /// Put every non-terrain entity back where the level placed it, as one
    /// undoable batch. Ignored right after another restart.
    pub fn restart(&mut self) -> bool {
        if self.history.top_tag() == Some(BatchTag::Restart) {
            return false;
        }

        let doomed: Vec<EntityId> = self
            .world
            .registry()
            .sweep_order()
            .into_iter()
            .filter(|id| self.world.entity(*id).map_or(false, |e| !e.kind.is_terrain()))
            .collect();
        for id in doomed {
            self.history.record_opt(self.world.despawn(id, Defeat::Instant));
        }

        for def in &self.level.entities {
            match self.world.spawn(def, None) {
                Some((_, inverse)) => self.history.record(inverse),
                None => tracing::warn!(kind = ?def.kind, at = %def.position, "placement no longer fits"),
            }
        }

        let restarted = self.history.has_open();
        self.history.batch(Some(BatchTag::Restart));
        self.world.batch_events();
        tracing::debug!(restarted, "restart");
        restarted
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::coord::Coord;
    use crate::game::entity::KindTag;

    const CORRIDOR: &str = r#"{
        "name": "corridor",
        "base": [0, 0, 0],
        "size": [6, 3, 2],
        "map": [
            1, 1, 1, 1, 1, 1,
            1, 1, 1, 1, 1, 1,
            1, 1, 1, 1, 1, 1,

            1, 1, 1, 1, 1, 1,
            1, 0, 0, 0, 0, 1,
            1, 1, 1, 1, 1, 1
        ],
        "entities": [
            { "kind": { "type": "Player" }, "position": [1, 1, 1], "direction": [1, 0, 0] },
            { "kind": { "type": "PushBlock" }, "position": [2, 1, 1] }
        ]
    }"#;

    fn player(state: &PuzzleState) -> EntityId {
        state.world.registry().of_kind(KindTag::Player).next().unwrap().id
    }

    #[test]
    fn test_load_and_bounds() {
        let state = PuzzleState::from_json(CORRIDOR, EventTiming::default()).unwrap();
        assert_eq!(state.level_bounds(), Bounds::new(Coord::ZERO, Coord::new(6, 3, 2)));
        assert_eq!(state.level().name, "corridor");
        assert!(!state.is_won());
        assert_eq!(state.history.depth(), 0);
    }

    #[test]
    fn test_restart_restores_layout_and_is_undoable() {
        let mut state = PuzzleState::from_json(CORRIDOR, EventTiming::default()).unwrap();
        let initial = state.compute_hash();

        let id = player(&state);
        let turn = state.world.set_direction(id, Coord::UP);
        state.history.record_opt(turn);
        state.history.batch(None);
        let turned = state.compute_hash();
        assert_ne!(turned, initial);

        assert!(state.restart());
        assert_eq!(state.compute_hash(), initial);
        assert_eq!(state.history.top_tag(), Some(BatchTag::Restart));

        // A second restart right away does nothing
        assert!(!state.restart());
        assert_eq!(state.history.depth(), 2);

        assert!(state.undo());
        assert_eq!(state.compute_hash(), turned);
        assert!(state.world.index_consistent());
    }

    #[test]
    fn test_restart_keeps_terrain_ids() {
        let mut state = PuzzleState::from_json(CORRIDOR, EventTiming::default()).unwrap();
        let walls: Vec<EntityId> = state.world.registry().of_kind(KindTag::Wall).map(|e| e.id).collect();
        state.restart();
        let after: Vec<EntityId> = state.world.registry().of_kind(KindTag::Wall).map(|e| e.id).collect();
        assert_eq!(walls, after);
    }
}
