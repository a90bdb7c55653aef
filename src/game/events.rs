//! Presentation Events
//!
//! Abstract record of what changed during a step and when, for the
//! presentation layer to animate. The core never reads these back.
//!
//! Events are stamped with a group index: everything in one group animates
//! together, groups play in order. Each event also names its acting entity
//! (`None` for purely cosmetic cues) so presentation can tell which groups
//! conflict and must not overlap.

use serde::{Serialize, Deserialize};
use crate::core::coord::Coord;
use crate::core::fixed::{Fixed, FIXED_ONE, FIXED_QUARTER};
use crate::game::entity::EntityId;

/// Particle/sound cue kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum CueKind {
    /// Player destroyed by a hazard
    Poof = 0,
    /// Rock came to a stop
    Thud = 1,
    /// Brittle block smashed
    Crumble = 2,
}

/// Event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Entity moved to a new anchor cell
    Moved {
        id: EntityId,
        to: Coord,
        /// Display scale (FIXED_ONE on the floor)
        scale_hint: Fixed,
    },

    /// Entity turned to face a new direction
    Reoriented {
        id: EntityId,
        quarter_turns: u8,
    },

    /// Entity appeared or disappeared
    Existence {
        id: EntityId,
        exists: bool,
    },

    /// Failed push feedback
    Bumped {
        id: EntityId,
        dir: Coord,
    },

    /// Entity destroyed by a push
    Squished {
        id: EntityId,
        dir: Coord,
    },

    /// Particle/sound cue
    Cue {
        kind: CueKind,
        position: Coord,
        dir: Coord,
    },
}

impl GameEventData {
    /// Entity the event animates, if any.
    pub fn subject(&self) -> Option<EntityId> {
        match self {
            GameEventData::Moved { id, .. }
            | GameEventData::Reoriented { id, .. }
            | GameEventData::Existence { id, .. }
            | GameEventData::Bumped { id, .. }
            | GameEventData::Squished { id, .. } => Some(*id),
            GameEventData::Cue { .. } => None,
        }
    }
}

/// A presentation event with its timing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Animation group (groups play in order)
    pub group: u32,

    /// Delay relative to the group start, in tween units
    pub delay: Fixed,

    /// Entity whose animation this is (conflict key)
    pub acting: Option<EntityId>,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create an event acting on its own subject.
    pub fn new(group: u32, delay: Fixed, data: GameEventData) -> Self {
        Self {
            group,
            delay,
            acting: data.subject(),
            data,
        }
    }

    /// Create a cosmetic cue (no acting entity).
    pub fn cue(group: u32, delay: Fixed, kind: CueKind, position: Coord, dir: Coord) -> Self {
        Self::new(group, delay, GameEventData::Cue { kind, position, dir })
    }

    /// Playback position: group, then delay, then acting entity.
    /// Events sharing a key play at the same instant.
    pub fn timeline_key(&self) -> (u32, Fixed, Option<EntityId>) {
        (self.group, self.delay, self.acting)
    }
}

// =============================================================================
// TIMING
// =============================================================================

/// Delays and display hints stamped on emitted events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventTiming {
    /// Delay before an ordinary destruction shows
    pub destroy_delay: Fixed,
    /// Delay before a hazard kill shows
    pub hazard_delay: Fixed,
    /// Delay before a squish shows
    pub squish_delay: Fixed,
    /// Display scale for entities above the floor layer
    pub raised_layer_scale: Fixed,
}

impl Default for EventTiming {
    fn default() -> Self {
        Self {
            destroy_delay: FIXED_ONE,
            hazard_delay: FIXED_QUARTER,
            squish_delay: 0,
            raised_layer_scale: FIXED_ONE + FIXED_QUARTER,
        }
    }
}

impl EventTiming {
    /// Scale hint for an entity anchored at `c`.
    pub fn scale_hint(&self, c: Coord) -> Fixed {
        if c.layer > 0 { self.raised_layer_scale } else { FIXED_ONE }
    }
}

// =============================================================================
// EVENT LOG
// =============================================================================

/// Events collected during one step, grouped as they are emitted.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Vec<GameEvent>,
    group: u32,
    group_has_events: bool,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the current group.
    pub fn push(&mut self, delay: Fixed, data: GameEventData) {
        self.events.push(GameEvent::new(self.group, delay, data));
        self.group_has_events = true;
    }

    /// Append a cosmetic cue to the current group.
    pub fn push_cue(&mut self, delay: Fixed, kind: CueKind, position: Coord, dir: Coord) {
        self.events.push(GameEvent::cue(self.group, delay, kind, position, dir));
        self.group_has_events = true;
    }

    /// Close the current group. Empty groups are not counted.
    pub fn batch(&mut self) {
        if self.group_has_events {
            self.group += 1;
            self.group_has_events = false;
        }
    }

    /// Index of the group currently being filled.
    pub fn current_group(&self) -> u32 {
        self.group
    }

    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Take every event in playback order and start over at group 0.
    /// Events at the same playback position keep their emission order.
    pub fn take(&mut self) -> Vec<GameEvent> {
        self.group = 0;
        self.group_has_events = false;
        let mut events = std::mem::take(&mut self.events);
        events.sort_by_key(GameEvent::timeline_key);
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::FIXED_HALF;

    #[test]
    fn test_event_ordering() {
        let a = EntityId(1);
        let b = EntityId(2);

        let event1 = GameEvent::new(0, 0, GameEventData::Bumped { id: a, dir: Coord::RIGHT });
        let event2 = GameEvent::new(0, FIXED_HALF, GameEventData::Existence { id: a, exists: false });
        let event3 = GameEvent::new(0, 0, GameEventData::Bumped { id: b, dir: Coord::RIGHT });
        let event4 = GameEvent::new(1, 0, GameEventData::Bumped { id: a, dir: Coord::RIGHT });

        // Same group, earlier delay first
        assert!(event1.timeline_key() < event2.timeline_key());
        // Same group and delay, lower acting id first
        assert!(event1.timeline_key() < event3.timeline_key());
        // Groups dominate
        assert!(event2.timeline_key() < event4.timeline_key());
    }

    #[test]
    fn test_equality_includes_data() {
        let a = EntityId(1);
        let moved = GameEvent::new(0, 0, GameEventData::Moved { id: a, to: Coord::RIGHT, scale_hint: FIXED_ONE });
        let bumped = GameEvent::new(0, 0, GameEventData::Bumped { id: a, dir: Coord::RIGHT });

        assert_eq!(moved.timeline_key(), bumped.timeline_key());
        assert_ne!(moved, bumped);
        assert_eq!(moved, moved.clone());
    }

    #[test]
    fn test_take_returns_playback_order() {
        let a = EntityId(1);
        let b = EntityId(2);
        let mut log = EventLog::new();
        log.push(FIXED_HALF, GameEventData::Existence { id: a, exists: false });
        log.push(0, GameEventData::Bumped { id: b, dir: Coord::LEFT });
        log.push(0, GameEventData::Moved { id: b, to: Coord::LEFT, scale_hint: FIXED_ONE });

        let events = log.take();
        let keys: Vec<_> = events.iter().map(GameEvent::timeline_key).collect();
        assert_eq!(keys, vec![(0, 0, Some(b)), (0, 0, Some(b)), (0, FIXED_HALF, Some(a))]);
        // Ties keep emission order
        assert!(matches!(events[0].data, GameEventData::Bumped { .. }));
        assert!(matches!(events[1].data, GameEventData::Moved { .. }));
    }

    #[test]
    fn test_cues_have_no_acting_entity() {
        let cue = GameEvent::cue(0, 0, CueKind::Poof, Coord::ZERO, Coord::RISE);
        assert_eq!(cue.acting, None);
    }

    #[test]
    fn test_empty_groups_not_counted() {
        let mut log = EventLog::new();
        log.batch();
        log.batch();
        assert_eq!(log.current_group(), 0);

        log.push(0, GameEventData::Existence { id: EntityId(0), exists: true });
        log.batch();
        log.batch();
        log.push(0, GameEventData::Existence { id: EntityId(1), exists: true });

        let events = log.take();
        assert_eq!(events.iter().map(|e| e.group).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(log.current_group(), 0);
    }
}
