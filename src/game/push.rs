//! Push Resolution
//!
//! Builds the dependency graph for one attempted move from grid queries,
//! partitions it, and applies the outcome through the world so every
//! mutation lands in the undo history.

use std::collections::BTreeSet;

use crate::core::coord::Coord;
use crate::game::action::UndoStack;
use crate::game::entity::{EntityId, SquishResponse};
use crate::game::events::GameEventData;
use crate::game::graph::{push_relation, EdgeType, PushGraph, PushOutcome, PushRelation};
use crate::game::grid::is_pit;
use crate::game::world::{Defeat, World};

/// How a move is attempted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MoveOptions {
    /// The mover actively pushes what is in front of it
    pub pushing: bool,
    /// Emit bump events when the mover cannot move
    pub bump_feedback: bool,
}

impl MoveOptions {
    /// A player's move: pushing, with bump feedback.
    pub const PLAYER: Self = Self { pushing: true, bump_feedback: true };

    /// A fall: nothing is pushed, no feedback.
    pub const GRAVITY: Self = Self { pushing: false, bump_feedback: false };
}

/// Build the dependency graph for `mover` moving along `dir`.
pub fn build_push_graph(world: &World, mover: EntityId, dir: Coord, pushing: bool) -> PushGraph {
    build_push_graph_with(world, mover, dir, pushing, |_| {})
}

/// Same as [`build_push_graph`], with a hook that may reorder each node's
/// front occupants before they are examined. The partition must not depend
/// on that order.
pub fn build_push_graph_with<O>(
    world: &World,
    mover: EntityId,
    dir: Coord,
    pushing: bool,
    mut order: O,
) -> PushGraph
where
    O: FnMut(&mut Vec<EntityId>),
{
    let mut graph = PushGraph::new(mover);
    let mut stack = vec![mover];
    let mut visited = BTreeSet::new();

    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        let Some(ent) = world.entity(id) else {
            graph.add_node(id, false);
            continue;
        };
        graph.add_node(id, true);
        if ent.is_fixed() {
            graph.add_node(id, false);
            continue;
        }

        // Everything the shape would run into, excluding itself
        let mut fronts: Vec<EntityId> = ent
            .cells()
            .flat_map(|c| world.entities_at(c + dir))
            .filter(|f| *f != id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        order(&mut fronts);

        let relations: Vec<(EntityId, PushRelation)> = fronts
            .into_iter()
            .filter_map(|f| {
                world
                    .entity(f)
                    .map(|front| (f, push_relation(ent, front, dir, pushing && id == mover)))
            })
            .collect();

        if relations.iter().any(|(_, r)| *r == PushRelation::Blocking) {
            graph.add_node(id, false);
            continue;
        }

        for (f, relation) in relations {
            let kind = match relation {
                PushRelation::Forcing => EdgeType::Forcing,
                PushRelation::Rigid => EdgeType::Rigid,
                PushRelation::Phasing | PushRelation::Blocking => continue,
            };
            graph.add_edge(id, f, kind);
            stack.push(f);
        }
    }

    graph.mark_movability();

    #[cfg(feature = "debug-tracing")]
    tracing::trace!(?mover, ?dir, "push graph\n{}", graph.dump());

    graph
}

/// Resolve (without applying) what happens if `mover` moves along `dir`.
pub fn resolve_push(world: &World, mover: EntityId, dir: Coord, pushing: bool) -> (PushGraph, PushOutcome) {
    let graph = build_push_graph(world, mover, dir, pushing);
    let outcome = graph.moving_squished();
    (graph, outcome)
}

/// Attempt a move and apply the outcome. Returns the entities that moved.
///
/// Movers crossing into the pit are destroyed. Squished entities respond
/// per kind. If nothing moves and bump feedback was asked for, everything
/// the mover was pushing against bumps.
pub fn attempt_move(
    world: &mut World,
    history: &mut UndoStack,
    mover: EntityId,
    dir: Coord,
    options: MoveOptions,
) -> BTreeSet<EntityId> {
    if dir.is_zero() || !world.is_alive(mover) {
        return BTreeSet::new();
    }

    let (graph, outcome) = resolve_push(world, mover, dir, options.pushing);

    if outcome.moving.is_empty() && options.bump_feedback {
        for id in graph.bumping() {
            // Things that cannot move naturally do not bump
            if world.entity(id).map_or(false, |e| !e.is_fixed() && !id.is_boundary()) {
                world.emit(GameEventData::Bumped { id, dir });
            }
        }
    }

    for id in &outcome.moving {
        let Some(to) = world.entity(*id).map(|e| e.position + dir) else {
            continue;
        };
        let inverse = if is_pit(to) {
            world.despawn(*id, Defeat::Normal)
        } else {
            world.move_to(*id, to)
        };
        history.record_opt(inverse);
    }

    for id in &outcome.squished {
        let response = match world.entity(*id) {
            Some(ent) => ent.kind.behavior().on_squished(ent),
            None => continue,
        };
        if response == SquishResponse::Destroy {
            history.record_opt(world.despawn(*id, Defeat::Squish(dir)));
        }
    }

    if !outcome.is_empty() {
        tracing::trace!(
            ?mover,
            ?dir,
            moving = outcome.moving.len(),
            squished = outcome.squished.len(),
            "push resolved"
        );
    }

    outcome.moving
}

// =============================================================================
// TESTS
// =============================================================================
