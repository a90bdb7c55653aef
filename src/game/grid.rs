//! Grid Index
//!
//! Maps 3D cells to the set of entity ids covering them. Knows nothing about
//! rules: capability questions asked by the raycasts are answered by
//! caller-supplied predicates.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  layer < 0        pit: always empty          │
//! │  inside bounds    stored occupant sets       │
//! │  outside bounds   { EntityId::BOUNDARY }     │
//! └──────────────────────────────────────────────┘
//! ```

use std::collections::BTreeSet;
use serde::{Serialize, Deserialize};

use crate::core::coord::Coord;
use crate::game::entity::EntityId;

// =============================================================================
// BOUNDS
// =============================================================================

/// Largest box a grid will store.
pub const MAX_CELLS: usize = 1 << 24;

/// Axis-aligned level box: `base` is the lowest corner, `size` the extent
/// along x, y and layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub base: Coord,
    pub size: Coord,
}

impl Bounds {
    pub fn new(base: Coord, size: Coord) -> Self {
        Self { base, size }
    }

    /// Number of cells in the box, or `None` past [`MAX_CELLS`].
    pub fn volume(&self) -> Option<usize> {
        let [x, y, layer] = [self.size.x, self.size.y, self.size.layer].map(|n| n.max(0) as usize);
        x.checked_mul(y)
            .and_then(|xy| xy.checked_mul(layer))
            .filter(|v| *v <= MAX_CELLS)
    }

    #[inline]
    pub fn contains(&self, c: Coord) -> bool {
        let r = c - self.base;
        r.x >= 0 && r.y >= 0 && r.layer >= 0
            && r.x < self.size.x && r.y < self.size.y && r.layer < self.size.layer
    }

    /// Flat storage index (x fastest, then y, then layer).
    #[inline]
    fn index(&self, c: Coord) -> Option<usize> {
        if !self.contains(c) {
            return None;
        }
        let r = c - self.base;
        Some(((r.layer * self.size.y + r.y) * self.size.x + r.x) as usize)
    }

    fn coord(&self, index: usize) -> Coord {
        let i = index as i32;
        let x = i % self.size.x;
        let y = (i / self.size.x) % self.size.y;
        let layer = i / (self.size.x * self.size.y);
        self.base + Coord::new(x, y, layer)
    }
}

/// Is `c` inside the bottomless pit?
#[inline]
pub fn is_pit(c: Coord) -> bool {
    c.layer < 0
}

// =============================================================================
// RAYCAST RESULT
// =============================================================================

/// Outcome of a directed raycast.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RayHit {
    /// Found a sought occupant.
    Hit { cell: Coord, id: EntityId },
    /// Crossed a solid occupant (or the level edge) first.
    Blocked { cell: Coord },
    /// Fell into the pit, or the direction was zero.
    Miss,
}

// =============================================================================
// GRID
// =============================================================================

/// Dense occupancy index over the level bounds.
#[derive(Clone, Debug)]
pub struct Grid {
    bounds: Bounds,
    cells: Vec<BTreeSet<EntityId>>,
}

impl Grid {
    /// Empty grid over `bounds`. A box too large to store collapses to an
    /// empty one, so every cell reads as the level edge.
    pub fn new(bounds: Bounds) -> Self {
        let (bounds, volume) = match bounds.volume() {
            Some(volume) => (bounds, volume),
            None => {
                tracing::warn!(size = %bounds.size, "level box too large, grid left empty");
                (Bounds::new(bounds.base, Coord::ZERO), 0)
            }
        };
        Self {
            bounds,
            cells: vec![BTreeSet::new(); volume],
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Occupants of `c`, sorted by id.
    pub fn entities_at(&self, c: Coord) -> BTreeSet<EntityId> {
        if is_pit(c) {
            return BTreeSet::new();
        }
        match self.bounds.index(c) {
            Some(i) => self.cells[i].clone(),
            None => BTreeSet::from([EntityId::BOUNDARY]),
        }
    }

    /// Does `c` hold anything (the boundary included)?
    pub fn is_occupied(&self, c: Coord) -> bool {
        if is_pit(c) {
            return false;
        }
        match self.bounds.index(c) {
            Some(i) => !self.cells[i].is_empty(),
            None => true,
        }
    }

    /// Can every cell be stored (inside bounds or in the pit)?
    fn storable(&self, cells: &[Coord]) -> bool {
        cells.iter().all(|c| is_pit(*c) || self.bounds.contains(*c))
    }

    /// Register `id` on every cell. Pit cells are skipped.
    ///
    /// All-or-nothing: returns `false` and changes nothing if any cell lies
    /// outside the bounds.
    pub fn add<I>(&mut self, id: EntityId, cells: I) -> bool
    where
        I: IntoIterator<Item = Coord>,
    {
        let cells: Vec<Coord> = cells.into_iter().collect();
        if !self.storable(&cells) {
            tracing::debug!(?id, "refusing to index entity outside the level");
            return false;
        }
        for c in cells {
            if let Some(i) = self.bounds.index(c) {
                self.cells[i].insert(id);
            }
        }
        true
    }

    /// Unregister `id` from every cell. Same all-or-nothing rule as `add`.
    pub fn remove<I>(&mut self, id: EntityId, cells: I) -> bool
    where
        I: IntoIterator<Item = Coord>,
    {
        let cells: Vec<Coord> = cells.into_iter().collect();
        if !self.storable(&cells) {
            tracing::warn!(?id, "refusing to unindex entity outside the level");
            return false;
        }
        for c in cells {
            if let Some(i) = self.bounds.index(c) {
                self.cells[i].remove(&id);
            }
        }
        true
    }

    /// Every non-empty stored cell with its occupants.
    pub fn occupied(&self) -> impl Iterator<Item = (Coord, &BTreeSet<EntityId>)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, set)| !set.is_empty())
            .map(move |(i, set)| (self.bounds.coord(i), set))
    }

    /// Step from `start` (exclusive) along `dir` until the first occupied
    /// cell. Entering the pit ends the ray with no hit.
    pub fn raycast(&self, start: Coord, dir: Coord) -> Option<Coord> {
        if dir.is_zero() {
            return None;
        }
        let mut cell = start + dir;
        loop {
            if is_pit(cell) {
                return None;
            }
            if self.is_occupied(cell) {
                return Some(cell);
            }
            cell += dir;
        }
    }

    /// Directed raycast: report the first `sought` occupant, unless a cell
    /// holding a `blocks` occupant (or the level edge) comes first.
    ///
    /// A cell holding both counts as a hit.
    pub fn raycast_for<S, B>(&self, start: Coord, dir: Coord, sought: S, blocks: B) -> RayHit
    where
        S: Fn(EntityId) -> bool,
        B: Fn(EntityId) -> bool,
    {
        if dir.is_zero() {
            return RayHit::Miss;
        }
        let mut cell = start + dir;
        loop {
            if is_pit(cell) {
                return RayHit::Miss;
            }
            let Some(i) = self.bounds.index(cell) else {
                return RayHit::Blocked { cell };
            };
            let occupants = &self.cells[i];
            if let Some(id) = occupants.iter().copied().find(|id| sought(*id)) {
                return RayHit::Hit { cell, id };
            }
            if occupants.iter().copied().any(|id| blocks(id)) {
                return RayHit::Blocked { cell };
            }
            cell += dir;
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::coord::{footprint, rect_shape};

    fn grid() -> Grid {
        Grid::new(Bounds::new(Coord::ZERO, Coord::new(5, 4, 2)))
    }

    #[test]
    fn test_volume_is_checked() {
        assert_eq!(Bounds::new(Coord::ZERO, Coord::new(5, 4, 2)).volume(), Some(40));
        let huge = Bounds::new(Coord::ZERO, Coord::new(i32::MAX, i32::MAX, i32::MAX));
        assert_eq!(huge.volume(), None);
        let wide = Bounds::new(Coord::ZERO, Coord::new(1 << 13, 1 << 13, 2));
        assert_eq!(wide.volume(), None);
    }

    #[test]
    fn test_oversized_grid_is_all_edge() {
        let g = Grid::new(Bounds::new(Coord::ZERO, Coord::new(i32::MAX, i32::MAX, 2)));
        assert_eq!(g.bounds().volume(), Some(0));
        assert_eq!(g.entities_at(Coord::new(0, 0, 1)), BTreeSet::from([EntityId::BOUNDARY]));
        assert!(g.entities_at(Coord::new(0, 0, -1)).is_empty());
    }

    #[test]
    fn test_empty_and_boundary_cells() {
        let g = grid();
        assert!(g.entities_at(Coord::new(1, 1, 1)).is_empty());
        assert_eq!(g.entities_at(Coord::new(5, 0, 0)), BTreeSet::from([EntityId::BOUNDARY]));
        assert_eq!(g.entities_at(Coord::new(0, 0, 2)), BTreeSet::from([EntityId::BOUNDARY]));
        // The pit is empty even far outside the box
        assert!(g.entities_at(Coord::new(99, 99, -1)).is_empty());
    }

    #[test]
    fn test_add_remove_shape() {
        let mut g = grid();
        let id = EntityId(3);
        let shape = rect_shape(2, 2);
        assert!(g.add(id, footprint(Coord::new(1, 1, 1), &shape)));
        assert_eq!(g.occupied().count(), 4);
        assert!(g.entities_at(Coord::new(2, 2, 1)).contains(&id));

        assert!(g.remove(id, footprint(Coord::new(1, 1, 1), &shape)));
        assert_eq!(g.occupied().count(), 0);
    }

    #[test]
    fn test_pit_cells_not_stored() {
        let mut g = grid();
        assert!(g.add(EntityId(1), [Coord::new(0, 0, -1)]));
        assert_eq!(g.occupied().count(), 0);
    }

    #[test]
    fn test_occupied_coords_round_trip() {
        let mut g = Grid::new(Bounds::new(Coord::new(-2, -1, 0), Coord::new(4, 3, 2)));
        let c = Coord::new(1, 1, 1);
        g.add(EntityId(7), [c]);
        let cells: Vec<Coord> = g.occupied().map(|(c, _)| c).collect();
        assert_eq!(cells, vec![c]);
    }

    #[test]
    fn test_raycast_stops_at_first_occupied() {
        let mut g = grid();
        g.add(EntityId(1), [Coord::new(3, 1, 1)]);
        assert_eq!(g.raycast(Coord::new(0, 1, 1), Coord::RIGHT), Some(Coord::new(3, 1, 1)));
        // Leaving the box hits the boundary
        assert_eq!(g.raycast(Coord::new(0, 1, 1), Coord::UP), Some(Coord::new(0, -1, 1)));
        // Falling ends in the pit
        assert_eq!(g.raycast(Coord::new(0, 1, 1), Coord::FALL), None);
        assert_eq!(g.raycast(Coord::new(0, 1, 1), Coord::ZERO), None);
    }

    #[test]
    fn test_directed_raycast_does_not_see_through_walls() {
        let mut g = grid();
        let wall = EntityId(1);
        let target = EntityId(2);
        g.add(wall, [Coord::new(2, 0, 1)]);
        g.add(target, [Coord::new(4, 0, 1)]);

        let hit = g.raycast_for(Coord::new(0, 0, 1), Coord::RIGHT, |id| id == target, |id| id == wall);
        assert_eq!(hit, RayHit::Blocked { cell: Coord::new(2, 0, 1) });

        let hit = g.raycast_for(Coord::new(3, 0, 1), Coord::RIGHT, |id| id == target, |id| id == wall);
        assert_eq!(hit, RayHit::Hit { cell: Coord::new(4, 0, 1), id: target });

        let miss = g.raycast_for(Coord::new(0, 1, 1), Coord::RIGHT, |id| id == target, |id| id == wall);
        assert_eq!(miss, RayHit::Blocked { cell: Coord::new(5, 1, 1) });
    }
}
