//! Rolling Rock Collision Scheduler
//!
//! Decides which rolling rocks advance one cell this turn and which halt.
//! Works on a snapshot and only proposes; the step resolver applies the
//! result.
//!
//! ## Contact Times
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  static solid in the way              t = 0                       │
//! │  resting rock in the way              t = 0                       │
//! │  opposing rock, one cell between      t = 0                       │
//! │  opposing rock, adjacent              t = just under 1            │
//! │  perpendicular rock, same target      t = tie epsilon             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Contacts drain from a min-heap in `(time, mover, hit)` order. Every
//! contact sharing the lowest time is judged against the state before any
//! of them is applied, so two rocks meeting head-on both stop. A rock that
//! halts falls back to its starting cells; rocks now rolling into those
//! cells get their contacts recomputed. Only those rocks are re-checked,
//! not every rock.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use crate::core::coord::{footprint, Coord, Shape};
use crate::core::fixed::{head_on_contact_time, Fixed, TURN_START};
use crate::game::entity::{EntityId, EntityKind, KindTag};
use crate::game::world::World;

/// A rock as the scheduler sees it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RockSnapshot {
    pub id: EntityId,
    pub anchor: Coord,
    pub shape: Shape,
    pub facing: Coord,
    pub moving: bool,
}

impl RockSnapshot {
    /// Every rock in the world, in id order.
    pub fn capture(world: &World) -> Vec<RockSnapshot> {
        world
            .registry()
            .of_kind(KindTag::Rock)
            .map(|e| RockSnapshot {
                id: e.id,
                anchor: e.position,
                shape: e.shape.clone(),
                facing: e.direction,
                moving: matches!(e.kind, EntityKind::Rock(state) if state.moving),
            })
            .collect()
    }

    /// Cells covered before moving.
    pub fn current(&self) -> BTreeSet<Coord> {
        footprint(self.anchor, &self.shape).collect()
    }

    /// Cells covered after advancing one step.
    pub fn destination(&self) -> BTreeSet<Coord> {
        footprint(self.anchor + self.facing, &self.shape).collect()
    }

    /// Distance along `facing` from this rock's leading edge to the near
    /// edge of `other`, in empty cells.
    fn gap_to(&self, other: &RockSnapshot) -> i32 {
        let lead = self.current().iter().map(|c| c.dot(self.facing)).max().unwrap_or(0);
        let near = other.current().iter().map(|c| c.dot(self.facing)).min().unwrap_or(0);
        near - lead - 1
    }
}

/// What a rock ran into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Hit {
    /// A solid, rigid non-rock (or the level edge)
    Static(EntityId),
    /// Another rock
    Rock(EntityId),
}

/// A pending contact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Collision {
    pub time: Fixed,
    pub mover: EntityId,
    pub hit: Hit,
}

/// Per-rock result.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Schedule {
    /// Rolling rocks that advance one cell
    pub advancing: BTreeSet<EntityId>,
    /// Rolling rocks that stop, with what stopped them
    pub halted: BTreeMap<EntityId, Hit>,
}

/// Collision scheduler for one turn.
pub struct CollisionScheduler<'a> {
    world: &'a World,
    rocks: BTreeMap<EntityId, RockSnapshot>,
    moving: BTreeSet<EntityId>,
    queue: BinaryHeap<Reverse<Collision>>,
    tie_epsilon: Fixed,
    halted: BTreeMap<EntityId, Hit>,
}

impl<'a> CollisionScheduler<'a> {
    pub fn new(world: &'a World, rocks: Vec<RockSnapshot>, tie_epsilon: Fixed) -> Self {
        let moving = rocks.iter().filter(|r| r.moving && !r.facing.is_zero()).map(|r| r.id).collect();
        Self {
            world,
            rocks: rocks.into_iter().map(|r| (r.id, r)).collect(),
            moving,
            queue: BinaryHeap::new(),
            tie_epsilon,
            halted: BTreeMap::new(),
        }
    }

    /// Run to completion.
    pub fn run(mut self) -> Schedule {
        let movers: Vec<EntityId> = self.moving.iter().copied().collect();
        for id in movers {
            self.enqueue_for(id);
        }

        while let Some(Reverse(first)) = self.queue.pop() {
            let mut batch = vec![first];
            while let Some(Reverse(next)) = self.queue.peek() {
                if next.time != first.time {
                    break;
                }
                batch.push(*next);
                self.queue.pop();
            }

            // Judge the whole batch before applying any of it
            let mut newly_halted = BTreeSet::new();
            for collision in &batch {
                if self.is_live(collision) && !newly_halted.contains(&collision.mover) {
                    newly_halted.insert(collision.mover);
                    self.halted.insert(collision.mover, collision.hit);
                    tracing::trace!(?collision, "rock halts");
                }
            }
            for id in &newly_halted {
                self.moving.remove(id);
            }

            // Re-check only rocks rolling into a halted rock's cells
            for halted in &newly_halted {
                let resting = self.footprint(*halted);
                let affected: Vec<EntityId> = self
                    .moving
                    .iter()
                    .copied()
                    .filter(|id| !self.destination(*id).is_disjoint(&resting))
                    .collect();
                for id in affected {
                    self.enqueue_for(id);
                }
            }
        }

        Schedule {
            advancing: self.moving,
            halted: self.halted,
        }
    }

    fn destination(&self, id: EntityId) -> BTreeSet<Coord> {
        self.rocks.get(&id).map(RockSnapshot::destination).unwrap_or_default()
    }

    /// Cells a rock covers in the working state.
    fn footprint(&self, id: EntityId) -> BTreeSet<Coord> {
        match self.rocks.get(&id) {
            Some(rock) if self.moving.contains(&id) => rock.destination(),
            Some(rock) => rock.current(),
            None => BTreeSet::new(),
        }
    }

    /// Queue every contact of a rolling rock.
    fn enqueue_for(&mut self, mover: EntityId) {
        let mut found = self.static_hits(mover);
        let others: Vec<EntityId> = self.rocks.keys().copied().filter(|o| *o != mover).collect();
        for other in others {
            if let Some(time) = self.rock_contact(mover, other) {
                found.push(Collision { time, mover, hit: Hit::Rock(other) });
            }
        }
        self.queue.extend(found.into_iter().map(Reverse));
    }

    /// Solid non-rocks in the destination.
    fn static_hits(&self, mover: EntityId) -> Vec<Collision> {
        let Some(rock) = self.rocks.get(&mover) else {
            return Vec::new();
        };
        let mut hits = BTreeSet::new();
        for cell in rock.destination() {
            for id in self.world.entities_at(cell) {
                if id == mover || self.rocks.contains_key(&id) {
                    continue;
                }
                let solid = self
                    .world
                    .entity(id)
                    .map_or(false, |e| e.is_blocking(-rock.facing) && e.is_rigid(-rock.facing));
                if solid {
                    hits.insert(id);
                }
            }
        }
        hits.into_iter()
            .map(|id| Collision { time: TURN_START, mover, hit: Hit::Static(id) })
            .collect()
    }

    /// Contact time of `mover` with `other` in the working state.
    fn rock_contact(&self, mover: EntityId, other: EntityId) -> Option<Fixed> {
        let rock = self.rocks.get(&mover)?;
        let o = self.rocks.get(&other)?;
        let dest = rock.destination();

        if !self.moving.contains(&other) {
            return (!dest.is_disjoint(&o.current())).then_some(TURN_START);
        }

        if o.facing == -rock.facing {
            let meets = !dest.is_disjoint(&o.current()) || !dest.is_disjoint(&o.destination());
            if meets {
                return head_on_contact_time(rock.gap_to(o));
            }
            None
        } else if o.facing.is_perpendicular(rock.facing) {
            (!dest.is_disjoint(&o.destination())).then_some(self.tie_epsilon)
        } else {
            // Same direction: only matters once the leader stops
            None
        }
    }

    /// Does a queued contact still hold?
    fn is_live(&self, collision: &Collision) -> bool {
        if !self.moving.contains(&collision.mover) {
            return false;
        }
        match collision.hit {
            Hit::Static(_) => true,
            Hit::Rock(other) => self.rock_contact(collision.mover, other).is_some(),
        }
    }
}

/// Schedule every rock in the world.
pub fn schedule_rocks(world: &World, tie_epsilon: Fixed) -> Schedule {
    let rocks = RockSnapshot::capture(world);
    if !rocks.iter().any(|r| r.moving) {
        return Schedule::default();
    }
    CollisionScheduler::new(world, rocks, tie_epsilon).run()
}

// =============================================================================
// TESTS
// =============================================================================
