//! Level Descriptions
//!
//! A level is a bounding box, a flat terrain map and a list of entity
//! placements. Levels are read from JSON and fully validated before
//! anything spawns, so a bad file never leaves a half-built world.
//!
//! ```text
//! {
//!   "name": "first steps",
//!   "base": [0, 0, 0],
//!   "size": [5, 3, 2],
//!   "map":  [1, 1, 1, 1, 1,  ...],        x fastest, then y, then layer
//!   "entities": [
//!     { "kind": { "type": "Player" }, "position": [1, 1, 1], "direction": [1, 0, 0] }
//!   ]
//! }
//! ```

use std::collections::BTreeSet;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::coord::Coord;
use crate::game::entity::{EntityDef, EntityId, EntityKind};
use crate::game::events::EventTiming;
use crate::game::grid::Bounds;
use crate::game::world::World;

// =============================================================================
// TILES
// =============================================================================

/// Terrain map code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Tile {
    Empty = 0,
    Wall = 1,
    Spikes = 2,
}

impl Tile {
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(Tile::Empty),
            1 => Some(Tile::Wall),
            2 => Some(Tile::Spikes),
            _ => None,
        }
    }

    /// Entity kind a tile spawns, if any.
    pub fn kind(self) -> Option<EntityKind> {
        match self {
            Tile::Empty => None,
            Tile::Wall => Some(EntityKind::Wall),
            Tile::Spikes => Some(EntityKind::Spikes),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Why a level was rejected.
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("level size {0} must be positive on every axis")]
    BadSize(Coord),

    #[error("level size {0} exceeds the largest storable box")]
    TooLarge(Coord),

    #[error("map has {actual} cells, size {size} needs {expected}")]
    MapSizeMismatch { size: Coord, expected: usize, actual: usize },

    #[error("unknown tile code {code} at map index {index}")]
    UnknownTile { index: usize, code: u8 },

    #[error("entity {index} covers {cell}, outside the level")]
    EntityOutOfBounds { index: usize, cell: Coord },

    #[error("entity {index} faces {direction}, which is not a cardinal direction")]
    NonCardinalFacing { index: usize, direction: Coord },

    #[error("entity {index} has gravity {gravity}, which is not a unit step")]
    BadGravity { index: usize, gravity: Coord },

    #[error("entity {index} has an empty shape")]
    EmptyShape { index: usize },

    #[error("entity {index} shape offset {offset} is repeated or leaves the anchor's layer")]
    BadShape { index: usize, offset: Coord },
}

// =============================================================================
// LEVEL
// =============================================================================

/// A level description.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    #[serde(default)]
    pub name: String,
    /// Lowest corner of the level box
    pub base: Coord,
    /// Extent along x, y and layer
    pub size: Coord,
    /// Tile codes, x fastest, then y, then layer
    pub map: Vec<u8>,
    /// Non-terrain placements, spawned in order
    #[serde(default)]
    pub entities: Vec<EntityDef>,
}

impl Level {
    /// Parse and validate.
    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        let level: Level = serde_json::from_str(json)?;
        level.validate()?;
        Ok(level)
    }

    pub fn to_json(&self) -> Result<String, LevelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.base, self.size)
    }

    /// Check everything [`Level::build_world`] relies on.
    pub fn validate(&self) -> Result<(), LevelError> {
        if self.size.x <= 0 || self.size.y <= 0 || self.size.layer <= 0 {
            return Err(LevelError::BadSize(self.size));
        }
        let bounds = self.bounds();
        let expected = bounds.volume().ok_or(LevelError::TooLarge(self.size))?;
        if self.map.len() != expected {
            return Err(LevelError::MapSizeMismatch { size: self.size, expected, actual: self.map.len() });
        }
        if let Some((index, code)) = self.map.iter().enumerate().find(|(_, c)| Tile::from_u8(**c).is_none()) {
            return Err(LevelError::UnknownTile { index, code: *code });
        }

        for (index, def) in self.entities.iter().enumerate() {
            if !def.direction.is_zero() && !def.direction.is_cardinal() {
                return Err(LevelError::NonCardinalFacing { index, direction: def.direction });
            }
            if let Some(gravity) = def.gravity {
                if !gravity.is_zero() && !gravity.is_unit() {
                    return Err(LevelError::BadGravity { index, gravity });
                }
            }
            if let Some(shape) = &def.shape {
                if shape.is_empty() {
                    return Err(LevelError::EmptyShape { index });
                }
                let mut seen = BTreeSet::new();
                for offset in shape {
                    if offset.layer != 0 || !seen.insert(*offset) {
                        return Err(LevelError::BadShape { index, offset: *offset });
                    }
                }
            }
            let ent = def.instantiate(EntityId(0));
            if let Some(cell) = ent.cells().find(|c| !bounds.contains(*c)) {
                return Err(LevelError::EntityOutOfBounds { index, cell });
            };
        }
        Ok(())
    }

    /// Terrain placements from the map, in map order.
    pub fn terrain(&self) -> Vec<EntityDef> {
        let bounds = self.bounds();
        let (sx, sy) = (self.size.x.max(1) as usize, self.size.y.max(1) as usize);
        self.map
            .iter()
            .enumerate()
            .filter_map(|(i, code)| {
                let kind = Tile::from_u8(*code)?.kind()?;
                let offset = Coord::new((i % sx) as i32, ((i / sx) % sy) as i32, (i / (sx * sy)) as i32);
                Some(EntityDef::new(kind, bounds.base + offset, Coord::ZERO))
            })
            .collect()
    }

    /// Validate, then spawn terrain followed by the placements.
    pub fn build_world(&self, timing: EventTiming) -> Result<World, LevelError> {
        self.validate()?;
        let mut world = World::new(self.bounds(), timing);
        for def in self.terrain() {
            if world.spawn(&def, None).is_none() {
                return Err(LevelError::EntityOutOfBounds { index: usize::MAX, cell: def.position });
            }
        }
        self.spawn_placements(&mut world)?;
        // Loading is not something to animate
        world.take_events();
        tracing::debug!(
            name = %self.name,
            entities = world.registry().len(),
            "level loaded"
        );
        Ok(world)
    }

    /// Spawn the non-terrain placements, returning the spawned ids.
    fn spawn_placements(&self, world: &mut World) -> Result<Vec<EntityId>, LevelError> {
        let mut ids = Vec::with_capacity(self.entities.len());
        for (index, def) in self.entities.iter().enumerate() {
            match world.spawn(def, None) {
                Some((id, _)) => ids.push(id),
                None => return Err(LevelError::EntityOutOfBounds { index, cell: def.position }),
            }
        }
        Ok(ids)
    }
}

// =============================================================================
// TESTS
// =============================================================================
