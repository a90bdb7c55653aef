//! Reversible Actions and the Undo Stack
//!
//! Every world mutation yields the action that reverses it. Applying an
//! action performs its effect and yields *its* inverse, so a stack of
//! recorded inverses can be replayed back and forth indefinitely.
//!
//! ```text
//! step:  m1, m2, m3        -> undo stack gets Batch[i1, i2, i3]
//! undo:  apply i3, i2, i1  -> redo stack gets Batch[m3', m2', m1']
//! redo:  apply m1', m2', m3' -> undo stack gets Batch[i1', i2', i3']
//! ```
//!
//! Actions name entities by id. Ids are resolved through the registry's
//! alias table at apply time, so a record naming an entity that was
//! destroyed and later brought back (under a fresh id) still finds it.

use serde::{Serialize, Deserialize};

use crate::core::coord::Coord;
use crate::game::entity::{EntityDef, EntityId};
use crate::game::world::{Defeat, World};

/// Batch tag, so callers can tell what the top batch was without looking
/// inside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchTag {
    Restart,
}

/// Kind-specific field edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldEdit {
    /// Set a rock's rolling flag
    RockMoving(bool),
}

/// A reversible world mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Bring an entity into existence. `origin` is the id it had before it
    /// was destroyed, if any.
    Spawn { def: EntityDef, origin: Option<EntityId> },
    /// Remove an entity.
    Despawn { id: EntityId },
    /// Move an entity's anchor.
    Reposition { id: EntityId, to: Coord },
    /// Turn an entity.
    Reorient { id: EntityId, to: Coord },
    /// Kind-specific field edit.
    FieldEdit { id: EntityId, edit: FieldEdit },
    /// Several actions, undone as one.
    Batch { actions: Vec<Action>, tag: Option<BatchTag> },
}

impl Action {
    /// Action that does nothing.
    pub fn noop() -> Self {
        Action::Batch { actions: Vec::new(), tag: None }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Action::Batch { actions, .. } if actions.iter().all(Action::is_noop))
    }

    /// Perform the action and return its inverse.
    ///
    /// A record naming an entity that no longer exists is a history bug:
    /// fatal in debug builds, skipped (inverse = no-op) in release.
    pub fn apply(&self, world: &mut World) -> Action {
        let inverse = match self {
            Action::Spawn { def, origin } => world.spawn(def, *origin).map(|(_, inv)| inv),
            Action::Despawn { id } => {
                let id = world.resolve(*id);
                world.despawn(id, Defeat::Instant)
            }
            Action::Reposition { id, to } => {
                let id = world.resolve(*id);
                world.move_to(id, *to)
            }
            Action::Reorient { id, to } => {
                let id = world.resolve(*id);
                world.set_direction(id, *to)
            }
            Action::FieldEdit { id, edit } => {
                let id = world.resolve(*id);
                world.edit(id, *edit)
            }
            Action::Batch { actions, tag } => {
                // Reverse insertion order; inverses in application order.
                let inverses = actions
                    .iter()
                    .rev()
                    .map(|a| a.apply(world))
                    .filter(|a| !a.is_noop())
                    .collect();
                Some(Action::Batch { actions: inverses, tag: *tag })
            }
        };

        match inverse {
            Some(inverse) => inverse,
            None => {
                debug_assert!(false, "history names a missing entity: {:?}", self);
                tracing::warn!(action = ?self, "skipping action on a missing entity");
                Action::noop()
            }
        }
    }
}

// =============================================================================
// UNDO STACK
// =============================================================================

/// Batched history of inverse actions.
#[derive(Clone, Debug, Default)]
pub struct UndoStack {
    open: Vec<Action>,
    undo: Vec<Action>,
    redo: Vec<Action>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an inverse to the open batch.
    pub fn record(&mut self, action: Action) {
        if !action.is_noop() {
            self.open.push(action);
        }
    }

    /// Record an optional inverse (mutations return `None` on dead entities).
    pub fn record_opt(&mut self, action: Option<Action>) {
        if let Some(action) = action {
            self.record(action);
        }
    }

    /// Close the open batch. No-op when nothing was recorded; otherwise the
    /// redo history is discarded.
    pub fn batch(&mut self, tag: Option<BatchTag>) {
        if self.open.is_empty() {
            return;
        }
        let actions = std::mem::take(&mut self.open);
        self.undo.push(Action::Batch { actions, tag });
        self.redo.clear();
    }

    /// Tag of the most recent batch.
    pub fn top_tag(&self) -> Option<BatchTag> {
        match self.undo.last() {
            Some(Action::Batch { tag, .. }) => *tag,
            _ => None,
        }
    }

    /// Number of undoable batches.
    pub fn depth(&self) -> usize {
        self.undo.len()
    }

    /// Number of redoable batches.
    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    /// Has anything been recorded since the last `batch`?
    pub fn has_open(&self) -> bool {
        !self.open.is_empty()
    }

    /// Rewind one batch. Returns `false` on an empty stack.
    pub fn undo(&mut self, world: &mut World) -> bool {
        debug_assert!(self.open.is_empty(), "undo with an open batch");
        let Some(batch) = self.undo.pop() else {
            return false;
        };
        let inverse = batch.apply(world);
        self.redo.push(inverse);
        true
    }

    /// Replay one undone batch. Returns `false` when there is nothing to redo.
    pub fn redo(&mut self, world: &mut World) -> bool {
        debug_assert!(self.open.is_empty(), "redo with an open batch");
        let Some(batch) = self.redo.pop() else {
            return false;
        };
        let inverse = batch.apply(world);
        self.undo.push(inverse);
        true
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entity::EntityKind;
    use crate::game::events::EventTiming;
    use crate::game::grid::Bounds;

    fn world() -> World {
        World::new(Bounds::new(Coord::ZERO, Coord::new(6, 6, 3)), EventTiming::default())
    }

    #[test]
    fn test_undo_on_empty_stack_is_noop() {
        let mut w = world();
        let mut stack = UndoStack::new();
        let before = w.structural_hash();
        assert!(!stack.undo(&mut w));
        assert!(!stack.redo(&mut w));
        assert_eq!(w.structural_hash(), before);
    }

    #[test]
    fn test_empty_batch_not_pushed() {
        let mut stack = UndoStack::new();
        stack.batch(None);
        stack.batch(Some(BatchTag::Restart));
        assert_eq!(stack.depth(), 0);
        assert_eq!(stack.top_tag(), None);
    }

    #[test]
    fn test_undo_redo_toggle() {
        let mut w = world();
        let mut stack = UndoStack::new();
        let (id, inv) = w.spawn(&EntityDef::new(EntityKind::Player, Coord::new(1, 1, 1), Coord::DOWN), None).unwrap();
        stack.record(inv);
        stack.batch(None);
        let h0 = w.structural_hash();

        stack.record_opt(w.move_to(id, Coord::new(2, 1, 1)));
        stack.record_opt(w.set_direction(id, Coord::RIGHT));
        stack.batch(None);
        let h1 = w.structural_hash();
        assert_ne!(h0, h1);

        for _ in 0..3 {
            assert!(stack.undo(&mut w));
            assert_eq!(w.structural_hash(), h0);
            assert!(stack.redo(&mut w));
            assert_eq!(w.structural_hash(), h1);
        }
        assert!(w.index_consistent());
    }

    #[test]
    fn test_respawn_gets_fresh_id_and_old_records_resolve() {
        let mut w = world();
        let mut stack = UndoStack::new();
        let (id, _) = w.spawn(&EntityDef::new(EntityKind::PushBlock, Coord::new(1, 1, 1), Coord::ZERO), None).unwrap();

        // Move, then destroy, in two turns
        stack.record_opt(w.move_to(id, Coord::new(2, 1, 1)));
        stack.batch(None);
        stack.record_opt(w.despawn(id, Defeat::Normal));
        stack.batch(None);

        // Undo the destruction: back under a new id
        assert!(stack.undo(&mut w));
        assert!(!w.is_alive(id));
        let respawned = w.resolve(id);
        assert!(respawned > id);
        assert_eq!(w.entity(respawned).unwrap().position, Coord::new(2, 1, 1));

        // Undo the move: the old record still finds the entity
        assert!(stack.undo(&mut w));
        assert_eq!(w.entity(respawned).unwrap().position, Coord::new(1, 1, 1));
        assert!(w.index_consistent());
    }

    #[test]
    fn test_new_batch_clears_redo() {
        let mut w = world();
        let mut stack = UndoStack::new();
        let (id, _) = w.spawn(&EntityDef::new(EntityKind::Player, Coord::new(1, 1, 1), Coord::DOWN), None).unwrap();
        stack.record_opt(w.set_direction(id, Coord::LEFT));
        stack.batch(None);
        stack.undo(&mut w);
        assert_eq!(stack.redo_depth(), 1);

        stack.record_opt(w.set_direction(id, Coord::UP));
        stack.batch(None);
        assert_eq!(stack.redo_depth(), 0);
    }

    #[test]
    fn test_restart_tag_survives_undo_redo() {
        let mut w = world();
        let mut stack = UndoStack::new();
        let (id, _) = w.spawn(&EntityDef::new(EntityKind::Player, Coord::new(1, 1, 1), Coord::DOWN), None).unwrap();
        stack.record_opt(w.set_direction(id, Coord::LEFT));
        stack.batch(Some(BatchTag::Restart));
        assert_eq!(stack.top_tag(), Some(BatchTag::Restart));

        stack.undo(&mut w);
        assert_eq!(stack.top_tag(), None);
        stack.redo(&mut w);
        assert_eq!(stack.top_tag(), Some(BatchTag::Restart));
    }

    #[test]
    fn test_action_log_serializes() {
        let action = Action::Batch {
            actions: vec![
                Action::Reposition { id: EntityId(3), to: Coord::new(1, 2, 1) },
                Action::FieldEdit { id: EntityId(4), edit: FieldEdit::RockMoving(true) },
            ],
            tag: Some(BatchTag::Restart),
        };
        let json = serde_json::to_string(&action).unwrap();
        let back: Action = serde_json::from_str(&json).unwrap();
        assert_eq!(back, action);
    }
}
