//! Entity Records and Capabilities
//!
//! Every entity is a tagged record (`EntityKind`) plus a capability
//! implementation (`Behavior`) looked up per kind. A new kind is a new
//! variant and a zero-sized type implementing `Behavior`; nothing in the
//! registry, the push graph or the resolver needs to change.

use std::collections::BTreeSet;
use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::coord::{Coord, Shape, footprint, rect_shape, unit_shape};
use crate::core::hash::StateHasher;

// =============================================================================
// ENTITY ID
// =============================================================================

/// Session-unique entity identifier.
///
/// Allocated monotonically by the registry and never reused. It is a
/// surrogate key, not a durable level identity: an entity brought back by
/// undo gets a fresh id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    /// Synthetic occupant of every cell outside the level bounds.
    pub const BOUNDARY: Self = Self(u32::MAX);

    /// Is this the synthetic boundary occupant?
    #[inline]
    pub fn is_boundary(self) -> bool {
        self == Self::BOUNDARY
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_boundary() {
            write!(f, "#boundary")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// KINDS
// =============================================================================

/// Runtime state carried by rolling rocks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RockState {
    /// Rolling along its facing until something halts it.
    #[serde(default)]
    pub moving: bool,
}

/// Entity kind with its kind-specific fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EntityKind {
    /// Solid terrain
    Wall,
    /// Solid terrain that kills players resting on it
    Spikes,
    /// The controlled character
    Player,
    /// Sokoban crate
    PushBlock,
    /// Rolls toward a sighted player
    Rock(RockState),
    /// Terrain a rolling rock can smash
    Brittle,
    /// Win target
    Goal,
    /// Terrain open on its facing side only
    Stairs,
}

/// Payload-free kind discriminant.
///
/// Declaration order is the sweep order used by gravity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum KindTag {
    Wall = 0,
    Spikes = 1,
    Player = 2,
    PushBlock = 3,
    Rock = 4,
    Brittle = 5,
    Goal = 6,
    Stairs = 7,
}

impl KindTag {
    /// Every tag, in sweep order.
    pub const ALL: [KindTag; 8] = [
        KindTag::Wall,
        KindTag::Spikes,
        KindTag::Player,
        KindTag::PushBlock,
        KindTag::Rock,
        KindTag::Brittle,
        KindTag::Goal,
        KindTag::Stairs,
    ];
}

impl EntityKind {
    /// Rock that is not yet rolling.
    pub const ROCK: EntityKind = EntityKind::Rock(RockState { moving: false });

    /// Discriminant without payload.
    pub fn tag(&self) -> KindTag {
        match self {
            EntityKind::Wall => KindTag::Wall,
            EntityKind::Spikes => KindTag::Spikes,
            EntityKind::Player => KindTag::Player,
            EntityKind::PushBlock => KindTag::PushBlock,
            EntityKind::Rock(_) => KindTag::Rock,
            EntityKind::Brittle => KindTag::Brittle,
            EntityKind::Goal => KindTag::Goal,
            EntityKind::Stairs => KindTag::Stairs,
        }
    }

    /// Capability table for this kind.
    pub fn behavior(&self) -> &'static dyn Behavior {
        match self {
            EntityKind::Wall => &WallBehavior,
            EntityKind::Spikes => &SpikesBehavior,
            EntityKind::Player => &PlayerBehavior,
            EntityKind::PushBlock => &PushBlockBehavior,
            EntityKind::Rock(_) => &RockBehavior,
            EntityKind::Brittle => &BrittleBehavior,
            EntityKind::Goal => &GoalBehavior,
            EntityKind::Stairs => &StairsBehavior,
        }
    }

    /// Is this level terrain (loaded from the map, untouched by restart)?
    pub fn is_terrain(&self) -> bool {
        matches!(self, EntityKind::Wall | EntityKind::Spikes)
    }

    /// Shape used when a placement does not give one.
    pub fn default_shape(&self) -> Shape {
        match self {
            EntityKind::Rock(_) => rect_shape(2, 2),
            _ => unit_shape(),
        }
    }
}

// =============================================================================
// CAPABILITIES
// =============================================================================

/// What happens to an entity squished by a push.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SquishResponse {
    /// Remove it (default)
    Destroy,
    /// Leave it in place
    Survive,
}

/// Capability contract of an entity kind.
///
/// `dir` is always the face being queried: for "what is in front of me
/// when I move `d`" the front occupant is asked about `-d`.
/// Invariant: `is_rigid(dir)` implies `is_blocking(dir)`.
pub trait Behavior: Sync {
    /// Cannot move at all, not even by gravity.
    fn is_fixed(&self) -> bool {
        false
    }

    /// Occupies space solidly on the `dir` face.
    fn is_blocking(&self, _ent: &Entity, _dir: Coord) -> bool {
        false
    }

    /// Cannot be squished from the `dir` face.
    fn is_rigid(&self, _ent: &Entity, _dir: Coord) -> bool {
        false
    }

    /// Can be displaced by an active push on the `dir` face.
    fn is_pushable(&self, _ent: &Entity, _dir: Coord) -> bool {
        false
    }

    /// Kills players resting on it.
    fn is_hazard(&self) -> bool {
        false
    }

    /// Reaction to being squished.
    fn on_squished(&self, _ent: &Entity) -> SquishResponse {
        SquishResponse::Destroy
    }

    /// Is this entity destroyed by a rolling rock whose resting
    /// footprint is `footprint`?
    fn crushed_by(&self, _ent: &Entity, _footprint: &BTreeSet<Coord>) -> bool {
        false
    }

    /// Gravity used when a placement does not give one.
    fn default_gravity(&self) -> Coord {
        if self.is_fixed() { Coord::ZERO } else { Coord::FALL }
    }
}

/// Solid terrain; also answers for out-of-bounds cells.
pub struct WallBehavior;

impl Behavior for WallBehavior {
    fn is_fixed(&self) -> bool { true }
    fn is_blocking(&self, _ent: &Entity, _dir: Coord) -> bool { true }
    fn is_rigid(&self, _ent: &Entity, _dir: Coord) -> bool { true }
    fn on_squished(&self, _ent: &Entity) -> SquishResponse { SquishResponse::Survive }
}

pub struct SpikesBehavior;

impl Behavior for SpikesBehavior {
    fn is_fixed(&self) -> bool { true }
    fn is_blocking(&self, _ent: &Entity, _dir: Coord) -> bool { true }
    fn is_rigid(&self, _ent: &Entity, _dir: Coord) -> bool { true }
    fn is_hazard(&self) -> bool { true }
    fn on_squished(&self, _ent: &Entity) -> SquishResponse { SquishResponse::Survive }
}

pub struct PlayerBehavior;

impl Behavior for PlayerBehavior {
    fn is_pushable(&self, _ent: &Entity, _dir: Coord) -> bool { true }

    fn crushed_by(&self, ent: &Entity, footprint: &BTreeSet<Coord>) -> bool {
        ent.cells().any(|c| footprint.contains(&c))
    }
}

pub struct PushBlockBehavior;

impl Behavior for PushBlockBehavior {
    fn is_blocking(&self, _ent: &Entity, _dir: Coord) -> bool { true }
    fn is_rigid(&self, _ent: &Entity, _dir: Coord) -> bool { true }
    fn is_pushable(&self, _ent: &Entity, _dir: Coord) -> bool { true }
}

pub struct RockBehavior;

impl Behavior for RockBehavior {
    fn is_blocking(&self, _ent: &Entity, _dir: Coord) -> bool { true }
    fn is_rigid(&self, _ent: &Entity, _dir: Coord) -> bool { true }
}

pub struct BrittleBehavior;

impl Behavior for BrittleBehavior {
    fn is_fixed(&self) -> bool { true }
    fn is_blocking(&self, _ent: &Entity, _dir: Coord) -> bool { true }

    // The rock's whole footprint must land on the block: a small rock
    // never shaves a corner off a big block, and a block smaller than
    // the rock is left alone.
    fn crushed_by(&self, ent: &Entity, footprint: &BTreeSet<Coord>) -> bool {
        let cells: BTreeSet<Coord> = ent.cells().collect();
        !footprint.is_empty() && footprint.is_subset(&cells)
    }
}

pub struct GoalBehavior;

impl Behavior for GoalBehavior {
    fn is_fixed(&self) -> bool { true }
}

pub struct StairsBehavior;

impl Behavior for StairsBehavior {
    fn is_fixed(&self) -> bool { true }

    fn is_blocking(&self, ent: &Entity, dir: Coord) -> bool {
        dir != ent.direction
    }

    fn is_rigid(&self, ent: &Entity, dir: Coord) -> bool {
        self.is_blocking(ent, dir)
    }
}

// =============================================================================
// ENTITY RECORD
// =============================================================================

/// A live entity. Destroyed entities leave the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Session-unique id
    pub id: EntityId,
    /// Kind and kind fields
    pub kind: EntityKind,
    /// Anchor cell
    pub position: Coord,
    /// Facing (cardinal, or zero for terrain)
    pub direction: Coord,
    /// Fall direction (zero when floating)
    pub gravity: Coord,
    /// Offsets from the anchor, all on the anchor's layer
    pub shape: Shape,
}

/// Stand-in entity for cells outside the level.
pub static BOUNDARY_ENTITY: Entity = Entity {
    id: EntityId::BOUNDARY,
    kind: EntityKind::Wall,
    position: Coord::ZERO,
    direction: Coord::ZERO,
    gravity: Coord::ZERO,
    shape: Vec::new(),
};

impl Entity {
    /// Cells currently covered.
    pub fn cells(&self) -> impl Iterator<Item = Coord> + '_ {
        footprint(self.position, &self.shape)
    }

    /// Cells covered if the anchor were at `anchor`.
    pub fn cells_at(&self, anchor: Coord) -> impl Iterator<Item = Coord> + '_ {
        footprint(anchor, &self.shape)
    }

    #[inline]
    pub fn is_fixed(&self) -> bool {
        self.kind.behavior().is_fixed()
    }

    #[inline]
    pub fn is_blocking(&self, dir: Coord) -> bool {
        self.kind.behavior().is_blocking(self, dir)
    }

    /// Rigid on the `dir` face. Rigid without blocking is a kind bug.
    #[inline]
    pub fn is_rigid(&self, dir: Coord) -> bool {
        let behavior = self.kind.behavior();
        let rigid = behavior.is_rigid(self, dir);
        debug_assert!(
            !rigid || behavior.is_blocking(self, dir),
            "{:?} is rigid but not blocking toward {:?}", self.kind, dir
        );
        rigid && behavior.is_blocking(self, dir)
    }

    #[inline]
    pub fn is_pushable(&self, dir: Coord) -> bool {
        self.kind.behavior().is_pushable(self, dir)
    }

    /// Rolling rock?
    pub fn is_moving_rock(&self) -> bool {
        matches!(self.kind, EntityKind::Rock(RockState { moving: true }))
    }

    /// Movement priority: lane from facing (up, down, left, right), then
    /// entities further ahead in their own travel direction first.
    pub fn move_priority(&self) -> (u8, i32) {
        (self.direction.lane(), -self.position.dot(self.direction))
    }

    /// Structural hash (ids excluded).
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u8(self.kind.tag() as u8);
        hasher.update_bool(self.is_moving_rock());
        hasher.update_coord(self.position);
        hasher.update_coord(self.direction);
        hasher.update_coord(self.gravity);
        hasher.update_coords(&self.shape);
    }
}

// =============================================================================
// SPAWN PARAMETERS
// =============================================================================

/// Everything needed to spawn an entity.
///
/// Level placements leave `gravity`/`shape` out to take the kind default;
/// despawn records capture them explicitly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDef {
    pub kind: EntityKind,
    pub position: Coord,
    #[serde(default)]
    pub direction: Coord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gravity: Option<Coord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Shape>,
}

impl EntityDef {
    /// Placement with kind defaults.
    pub fn new(kind: EntityKind, position: Coord, direction: Coord) -> Self {
        Self { kind, position, direction, gravity: None, shape: None }
    }

    /// Override the shape.
    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Override gravity.
    pub fn with_gravity(mut self, gravity: Coord) -> Self {
        self.gravity = Some(gravity);
        self
    }

    /// Capture a live entity so it can be spawned again.
    pub fn from_entity(ent: &Entity) -> Self {
        Self {
            kind: ent.kind,
            position: ent.position,
            direction: ent.direction,
            gravity: Some(ent.gravity),
            shape: Some(ent.shape.clone()),
        }
    }

    /// Build the record for a freshly allocated id.
    pub fn instantiate(&self, id: EntityId) -> Entity {
        Entity {
            id,
            kind: self.kind,
            position: self.position,
            direction: self.direction,
            gravity: self.gravity.unwrap_or_else(|| self.kind.behavior().default_gravity()),
            shape: self.shape.clone().unwrap_or_else(|| self.kind.default_shape()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
