//! Push-Dependency Graph
//!
//! Built fresh for one attempted move and thrown away afterwards. Nodes are
//! entity ids, each edge is stored twice (forward on its source, backward on
//! its target) so both traversal directions are a plain adjacency walk.
//!
//! ```text
//!   Forcing  e ──▶ f   e moving drags f along, no matter what
//!   Rigid    e ══▶ f   e moves only if f can move too
//! ```

use std::collections::{BTreeMap, BTreeSet};

use crate::core::coord::Coord;
use crate::game::entity::{Entity, EntityId};

// =============================================================================
// PUSH RELATION
// =============================================================================

/// How an entity interacts with an occupant in front of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushRelation {
    /// Absolute stop
    Blocking,
    /// No interaction
    Phasing,
    /// Front occupant is dragged along
    Forcing,
    /// Front occupant must have room
    Rigid,
}

use self::PushRelation::{Blocking as B, Forcing as F, Phasing as P, Rigid as R};

/// `[activity][front blocks][front pushable]`
///
/// Activity: 0 = inert, 1 = pushing but not solid, 2 = solid.
const PUSH_TABLE: [[[PushRelation; 2]; 2]; 3] = [
    //   non-block       block
    // non-push push   non-push push
    [[P, P], [B, B]], // inert
    [[P, P], [B, R]], // pushing
    [[P, F], [B, R]], // block
];

/// Relation between `ent` moving along `dir` and `front`, an occupant of a
/// cell it would enter. `pushing` says whether `ent` is the active pusher.
pub fn push_relation(ent: &Entity, front: &Entity, dir: Coord, pushing: bool) -> PushRelation {
    let activity = ((pushing as usize) + 2 * (ent.is_blocking(dir) as usize)).min(2);
    let blocks = front.is_blocking(-dir) as usize;
    let pushable = front.is_pushable(-dir) as usize;
    match PUSH_TABLE[activity][blocks][pushable] {
        PushRelation::Rigid if !front.is_rigid(-dir) => PushRelation::Forcing,
        relation => relation,
    }
}

// =============================================================================
// GRAPH
// =============================================================================

/// Edge type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeType {
    Forcing,
    Rigid,
}

#[derive(Clone, Copy, Debug)]
struct Edge {
    target: EntityId,
    kind: EdgeType,
    backward: bool,
}

#[derive(Clone, Debug)]
struct Node {
    can_move: bool,
    edges: Vec<Edge>,
}

impl Default for Node {
    fn default() -> Self {
        Self { can_move: true, edges: Vec::new() }
    }
}

/// Result of resolving one attempted move.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PushOutcome {
    /// Entities that move along the direction
    pub moving: BTreeSet<EntityId>,
    /// Entities dragged into something immovable
    pub squished: BTreeSet<EntityId>,
}

impl PushOutcome {
    pub fn is_empty(&self) -> bool {
        self.moving.is_empty() && self.squished.is_empty()
    }
}

/// Dependency graph of one attempted move.
#[derive(Clone, Debug)]
pub struct PushGraph {
    root: EntityId,
    nodes: BTreeMap<EntityId, Node>,
}

impl PushGraph {
    /// Graph for a move started by `root`.
    pub fn new(root: EntityId) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(root, Node::default());
        Self { root, nodes }
    }

    pub fn root(&self) -> EntityId {
        self.root
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a node, or overwrite the movability of an existing one.
    pub fn add_node(&mut self, id: EntityId, can_move: bool) {
        self.nodes.entry(id).or_default().can_move = can_move;
    }

    /// Add `from -> to` (and the mirrored backward edge).
    pub fn add_edge(&mut self, from: EntityId, to: EntityId, kind: EdgeType) {
        self.nodes.entry(from).or_default().edges.push(Edge { target: to, kind, backward: false });
        self.nodes.entry(to).or_default().edges.push(Edge { target: from, kind, backward: true });
    }

    /// Current movability flag (`false` for unknown ids).
    pub fn can_move(&self, id: EntityId) -> bool {
        self.nodes.get(&id).map_or(false, |n| n.can_move)
    }

    /// Spread immovability from every seeded-immovable node backward across
    /// Rigid edges. Each node is visited once.
    pub fn mark_movability(&mut self) {
        let mut stack: Vec<EntityId> = self
            .nodes
            .iter()
            .filter(|(_, node)| !node.can_move)
            .map(|(id, _)| *id)
            .collect();
        let mut visited = BTreeSet::new();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            node.can_move = false;
            stack.extend(
                node.edges
                    .iter()
                    .filter(|e| e.kind == EdgeType::Rigid && e.backward)
                    .map(|e| e.target),
            );
        }
    }

    /// Partition what the root's move drags along. Call after
    /// `mark_movability`.
    ///
    /// An immovable root yields an empty outcome: it is never squished by
    /// its own failed move.
    pub fn moving_squished(&self) -> PushOutcome {
        let mut outcome = PushOutcome::default();
        if !self.can_move(self.root) {
            return outcome;
        }

        let mut stack = vec![self.root];
        let mut visited = BTreeSet::new();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            if !self.can_move(id) {
                outcome.squished.insert(id);
                continue;
            }
            outcome.moving.insert(id);
            if let Some(node) = self.nodes.get(&id) {
                for edge in node.edges.iter().filter(|e| !e.backward) {
                    let follow = match edge.kind {
                        EdgeType::Forcing => true,
                        EdgeType::Rigid => self.can_move(edge.target),
                    };
                    if follow {
                        stack.push(edge.target);
                    }
                }
            }
        }
        outcome
    }

    /// Everything forward-reachable from the root, root first, for bump
    /// feedback after a failed move.
    pub fn bumping(&self) -> Vec<EntityId> {
        let mut stack = vec![self.root];
        let mut visited = BTreeSet::new();
        let mut bumping = Vec::new();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            bumping.push(id);
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.edges.iter().filter(|e| !e.backward).map(|e| e.target));
            }
        }
        bumping
    }

    /// Human-readable edge list, for trace output.
    #[cfg(feature = "debug-tracing")]
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (id, node) in &self.nodes {
            out.push_str(&format!("{:?}{} ->", id, if node.can_move { "" } else { "!" }));
            for edge in node.edges.iter().filter(|e| !e.backward) {
                let arrow = match edge.kind {
                    EdgeType::Forcing => "F",
                    EdgeType::Rigid => "R",
                };
                out.push_str(&format!(" {}{:?}", arrow, edge.target));
            }
            out.push('\n');
        }
        out
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entity::{EntityDef, EntityKind};

    fn ent(kind: EntityKind) -> Entity {
        EntityDef::new(kind, Coord::ZERO, Coord::RIGHT).instantiate(EntityId(0))
    }

    #[test]
    fn test_push_table() {
        let player = ent(EntityKind::Player);
        let block = ent(EntityKind::PushBlock);
        let wall = ent(EntityKind::Wall);
        let goal = ent(EntityKind::Goal);
        let brittle = ent(EntityKind::Brittle);
        let d = Coord::RIGHT;

        // Pushing player against a block: rigid
        assert_eq!(push_relation(&player, &block, d, true), PushRelation::Rigid);
        // Falling (not pushing) player against a block: blocked
        assert_eq!(push_relation(&player, &block, d, false), PushRelation::Blocking);
        // Block against a player: the player gets dragged
        assert_eq!(push_relation(&block, &player, d, false), PushRelation::Forcing);
        // Anything against a wall: blocked
        assert_eq!(push_relation(&block, &wall, d, true), PushRelation::Blocking);
        // Goals never interact
        assert_eq!(push_relation(&block, &goal, d, true), PushRelation::Phasing);
        // Brittle blocks are solid but not pushable
        assert_eq!(push_relation(&player, &brittle, d, true), PushRelation::Blocking);
    }

    #[test]
    fn test_pushable_block_never_blocks_active_pusher() {
        let block = ent(EntityKind::PushBlock);
        for mover in [EntityKind::Player, EntityKind::PushBlock, EntityKind::ROCK] {
            for d in Coord::CARDINALS {
                let r = push_relation(&ent(mover), &block, d, true);
                assert!(matches!(r, PushRelation::Rigid | PushRelation::Forcing), "{:?} {:?}", mover, r);
            }
        }
    }

    #[test]
    fn test_rigid_chain_into_blocked_node() {
        // 0 ══▶ 1 ══▶ 2(blocked)
        let mut g = PushGraph::new(EntityId(0));
        g.add_edge(EntityId(0), EntityId(1), EdgeType::Rigid);
        g.add_edge(EntityId(1), EntityId(2), EdgeType::Rigid);
        g.add_node(EntityId(2), false);
        g.mark_movability();

        assert!(!g.can_move(EntityId(0)));
        assert!(g.moving_squished().is_empty());
        assert_eq!(g.bumping(), vec![EntityId(0), EntityId(1), EntityId(2)]);
    }

    #[test]
    fn test_forcing_into_blocked_node_squishes() {
        // 0 ──▶ 1(blocked)
        let mut g = PushGraph::new(EntityId(0));
        g.add_edge(EntityId(0), EntityId(1), EdgeType::Forcing);
        g.add_node(EntityId(1), false);
        g.mark_movability();

        let out = g.moving_squished();
        assert_eq!(out.moving, BTreeSet::from([EntityId(0)]));
        assert_eq!(out.squished, BTreeSet::from([EntityId(1)]));
    }

    #[test]
    fn test_diamond_visits_once() {
        // 0 ══▶ 1 ══▶ 3, 0 ══▶ 2 ══▶ 3
        let mut g = PushGraph::new(EntityId(0));
        g.add_edge(EntityId(0), EntityId(1), EdgeType::Rigid);
        g.add_edge(EntityId(0), EntityId(2), EdgeType::Rigid);
        g.add_edge(EntityId(1), EntityId(3), EdgeType::Rigid);
        g.add_edge(EntityId(2), EntityId(3), EdgeType::Rigid);
        g.mark_movability();

        let out = g.moving_squished();
        assert_eq!(out.moving.len(), 4);
        assert!(out.squished.is_empty());
    }
}
