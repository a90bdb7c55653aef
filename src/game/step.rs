//! Step Resolver
//!
//! One input, one deterministic turn. Given the same state and the same
//! input sequence the resulting world, history and event stream are
//! identical on every run.
//!
//! ## Turn Phases
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Undo / Redo      replay one history batch, nothing else runs     │
//! │  Restart          reload placements as one tagged batch           │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  1. Players       turn, then push (priority order)                │
//! │  2. Rocks         sense players, then roll via the scheduler      │
//! │  3. Gravity       passes until nothing falls                      │
//! │  4. Hazards       players resting on spikes are destroyed         │
//! │  5. Win check                                                     │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutation is recorded; a turn closes exactly one history batch.

use std::collections::BTreeSet;
use serde::{Serialize, Deserialize};

use crate::core::coord::Coord;
use crate::core::fixed::{Fixed, COLLISION_TIE_EPSILON};
use crate::game::action::FieldEdit;
use crate::game::collision::{schedule_rocks, Schedule};
use crate::game::entity::{Entity, EntityId, EntityKind, KindTag};
use crate::game::events::{CueKind, EventTiming, GameEvent, GameEventData};
use crate::game::grid::RayHit;
use crate::game::input::Input;
use crate::game::push::{attempt_move, MoveOptions};
use crate::game::state::PuzzleState;
use crate::game::world::Defeat;

/// Result of a step.
#[derive(Debug, Default)]
pub struct StepResult {
    /// Events generated this step
    pub events: Vec<GameEvent>,
    /// Did the step change the board?
    pub changed: bool,
    /// Is the level solved after this step?
    pub won: bool,
    /// Gravity passes run (the last one moved nothing)
    pub gravity_passes: u32,
}

/// Configuration for the step resolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    /// Event delays and display hints
    pub timing: EventTiming,
    /// Contact time of perpendicular rocks aiming at the same cells
    pub collision_tie_epsilon: Fixed,
    /// Hard stop for the gravity fixpoint
    pub max_gravity_passes: u32,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            timing: EventTiming::default(),
            collision_tie_epsilon: COLLISION_TIE_EPSILON,
            max_gravity_passes: 1024,
        }
    }
}

impl StepConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Run one step.
///
/// # Determinism
///
/// - Entities are visited in registry (`BTreeMap`) order or an explicit
///   priority order, never hash order
/// - Collision times are Q16.16 fixed-point
/// - No system calls, no floating point
pub fn step(state: &mut PuzzleState, input: Input, config: &StepConfig) -> StepResult {
    let mut result = StepResult::default();

    match input {
        Input::Undo => result.changed = state.undo(),
        Input::Redo => result.changed = state.redo(),
        Input::Restart => result.changed = state.restart(),
        Input::Up | Input::Down | Input::Left | Input::Right | Input::Wait => {
            state.turn += 1;

            // 1. Players
            move_players(state, input.direction());

            // 2. Rocks
            detect_players(state);
            roll_rocks(state, config);

            // 3. Gravity
            result.gravity_passes = apply_gravity(state, config);

            // 4. Hazards
            apply_hazards(state);

            result.changed = state.history.has_open();
            state.history.batch(None);
        }
    }

    // 5. Win check
    result.won = state.is_won();
    result.events = state.take_events();

    tracing::debug!(
        turn = state.turn,
        %input,
        changed = result.changed,
        won = result.won,
        events = result.events.len(),
        "step"
    );
    result
}

// =============================================================================
// PLAYERS
// =============================================================================

/// Turn and push every player, highest priority first. Each player's move
/// is its own event group.
fn move_players(state: &mut PuzzleState, dir: Coord) {
    if dir.is_zero() {
        return;
    }
    let mut players: Vec<((u8, i32), EntityId)> = state
        .world
        .registry()
        .of_kind(KindTag::Player)
        .map(|p| (p.move_priority(), p.id))
        .collect();
    players.sort();

    for (_, id) in players {
        // An earlier player may have squished this one
        if !state.world.is_alive(id) {
            continue;
        }
        if state.world.entity(id).map_or(false, |p| p.direction != dir) {
            let turn = state.world.set_direction(id, dir);
            state.history.record_opt(turn);
        }
        attempt_move(&mut state.world, &mut state.history, id, dir, MoveOptions::PLAYER);
        state.world.batch_events();
    }
}

// =============================================================================
// ROCKS
// =============================================================================

/// Rays a resting rock casts, in the order they are tried: for each
/// column up then down, for each row left then right. Each ray starts on
/// the rock's own edge cell and is exclusive of it.
fn detection_rays(rock: &Entity) -> Vec<(Coord, Coord)> {
    let xs = rock.shape.iter().map(|o| o.x);
    let ys = rock.shape.iter().map(|o| o.y);
    let (Some(min_x), Some(max_x)) = (xs.clone().min(), xs.max()) else {
        return Vec::new();
    };
    let (Some(min_y), Some(max_y)) = (ys.clone().min(), ys.max()) else {
        return Vec::new();
    };

    let at = |x: i32, y: i32| rock.position + Coord::xy(x, y);
    let mut rays = Vec::new();
    for x in min_x..=max_x {
        rays.push((at(x, min_y), Coord::UP));
        rays.push((at(x, max_y), Coord::DOWN));
    }
    for y in min_y..=max_y {
        rays.push((at(min_x, y), Coord::LEFT));
        rays.push((at(max_x, y), Coord::RIGHT));
    }
    rays
}

/// Resting rocks that see a player turn toward it and start rolling.
fn detect_players(state: &mut PuzzleState) {
    let mut rocks: Vec<&Entity> = state.world.registry().of_kind(KindTag::Rock).collect();
    rocks.sort_by_key(|r| (r.move_priority(), r.id));

    let mut woken: Vec<(EntityId, Coord)> = Vec::new();
    for rock in rocks.into_iter().filter(|r| !r.is_moving_rock()) {
        let sighting = detection_rays(rock).into_iter().find(|(start, dir)| {
            matches!(state.world.sense(*start, *dir, KindTag::Player), RayHit::Hit { .. })
        });
        if let Some((_, dir)) = sighting {
            woken.push((rock.id, dir));
        }
    }

    for (id, dir) in woken {
        tracing::trace!(?id, ?dir, "rock sees a player");
        let turn = state.world.set_direction(id, dir);
        state.history.record_opt(turn);
        let edit = state.world.edit(id, FieldEdit::RockMoving(true));
        state.history.record_opt(edit);
    }
}

/// Resolve every rolling rock and apply the outcome.
fn roll_rocks(state: &mut PuzzleState, config: &StepConfig) {
    let Schedule { advancing, halted } = schedule_rocks(&state.world, config.collision_tie_epsilon);
    if advancing.is_empty() && halted.is_empty() {
        return;
    }

    for (id, hit) in &halted {
        let Some(rock) = state.world.entity(*id) else {
            continue;
        };
        let (position, facing) = (rock.position, rock.direction);
        tracing::trace!(?id, ?hit, "rock stops");

        let edit = state.world.edit(*id, FieldEdit::RockMoving(false));
        state.history.record_opt(edit);
        state.world.emit(GameEventData::Bumped { id: *id, dir: facing });
        state.world.cue(CueKind::Thud, position, facing, 0);
    }

    let mut footprints: Vec<(EntityId, BTreeSet<Coord>)> = Vec::new();
    for id in &advancing {
        let Some(to) = state.world.entity(*id).map(|r| r.position + r.direction) else {
            continue;
        };
        let inverse = state.world.move_to(*id, to);
        state.history.record_opt(inverse);
        if let Some(rock) = state.world.entity(*id) {
            footprints.push((*id, rock.cells().collect()));
        }
    }

    for (rock_id, footprint) in &footprints {
        crush_under(state, *rock_id, footprint);
    }

    state.world.batch_events();
}

/// Destroy whatever the kind rules say a rock landing on `footprint`
/// crushes.
fn crush_under(state: &mut PuzzleState, rock_id: EntityId, footprint: &BTreeSet<Coord>) {
    let candidates: BTreeSet<EntityId> = footprint
        .iter()
        .flat_map(|c| state.world.entities_at(*c))
        .filter(|id| *id != rock_id && !id.is_boundary())
        .collect();

    let delay = state.world.timing().destroy_delay;
    for id in candidates {
        let Some(ent) = state.world.entity(id) else {
            continue;
        };
        if !ent.kind.behavior().crushed_by(ent, footprint) {
            continue;
        }
        let (position, brittle) = (ent.position, ent.kind == EntityKind::Brittle);
        tracing::trace!(?rock_id, ?id, "crushed");
        let inverse = state.world.despawn(id, Defeat::Normal);
        state.history.record_opt(inverse);
        if brittle {
            state.world.cue(CueKind::Crumble, position, Coord::ZERO, delay);
        }
    }
}

// =============================================================================
// GRAVITY
// =============================================================================

/// Let everything fall until a pass moves nothing. Returns the number of
/// passes run.
fn apply_gravity(state: &mut PuzzleState, config: &StepConfig) -> u32 {
    let mut passes = 0;
    loop {
        if passes >= config.max_gravity_passes {
            tracing::warn!(passes, "gravity did not settle, stopping");
            break;
        }
        passes += 1;

        let mut moved = false;
        for id in state.world.registry().sweep_order() {
            let Some(gravity) = state
                .world
                .entity(id)
                .filter(|e| !e.is_fixed() && !e.gravity.is_zero())
                .map(|e| e.gravity)
            else {
                continue;
            };
            let fell = attempt_move(&mut state.world, &mut state.history, id, gravity, MoveOptions::GRAVITY);
            moved |= !fell.is_empty();
        }
        if !moved {
            break;
        }
    }
    state.world.batch_events();
    passes
}

// =============================================================================
// HAZARDS
// =============================================================================

/// Players resting on a hazard are destroyed.
fn apply_hazards(state: &mut PuzzleState) {
    let players: Vec<(EntityId, Coord, Coord)> = state
        .world
        .registry()
        .of_kind(KindTag::Player)
        .filter(|p| !p.gravity.is_zero())
        .map(|p| (p.id, p.position, p.gravity))
        .collect();

    let delay = state.world.timing().hazard_delay;
    for (id, position, gravity) in players {
        let on_hazard = state
            .world
            .occupants(position + gravity)
            .iter()
            .any(|e| e.kind.behavior().is_hazard() && e.is_blocking(-gravity));
        if !on_hazard {
            continue;
        }
        tracing::trace!(?id, "player hits a hazard");
        let inverse = state.world.despawn(id, Defeat::Hazard);
        state.history.record_opt(inverse);
        state.world.cue(CueKind::Poof, position, Coord::UP, delay);
    }
    state.world.batch_events();
}

// =============================================================================
// REPLAY
// =============================================================================

/// Run a whole input sequence. Returns every event, in order.
pub fn run_inputs(state: &mut PuzzleState, inputs: &[Input], config: &StepConfig) -> Vec<GameEvent> {
    let mut all_events = Vec::new();
    for input in inputs {
        let result = step(state, *input, config);
        all_events.extend(result.events);
    }
    all_events
}

// =============================================================================
// TESTS
// =============================================================================
