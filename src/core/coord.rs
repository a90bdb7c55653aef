//! Integer Grid Coordinates
//!
//! 3D cell coordinates `(x, y, layer)` and the cardinal directions.
//! Screen convention: `-y` is up, `layer` grows away from the pit.

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub};
use serde::{Serialize, Deserialize};

/// A grid cell (or a direction between cells).
///
/// Serialized as a `[x, y, layer]` array to keep level files compact.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[i32; 3]", into = "[i32; 3]")]
pub struct Coord {
    /// Horizontal axis
    pub x: i32,
    /// Vertical axis (screen space, `-y` is up)
    pub y: i32,
    /// Layer: 0 = floor, >= 1 raised, < 0 pit
    pub layer: i32,
}

impl Coord {
    /// Zero vector (the Wait direction)
    pub const ZERO: Self = Self::new(0, 0, 0);

    /// Screen up
    pub const UP: Self = Self::new(0, -1, 0);

    /// Screen down
    pub const DOWN: Self = Self::new(0, 1, 0);

    /// Screen left
    pub const LEFT: Self = Self::new(-1, 0, 0);

    /// Screen right
    pub const RIGHT: Self = Self::new(1, 0, 0);

    /// Toward the pit (default gravity)
    pub const FALL: Self = Self::new(0, 0, -1);

    /// Away from the pit
    pub const RISE: Self = Self::new(0, 0, 1);

    /// The four planar directions in move-priority order.
    pub const CARDINALS: [Self; 4] = [Self::UP, Self::DOWN, Self::LEFT, Self::RIGHT];

    /// Create a coordinate.
    #[inline]
    pub const fn new(x: i32, y: i32, layer: i32) -> Self {
        Self { x, y, layer }
    }

    /// Planar coordinate on layer 0.
    #[inline]
    pub const fn xy(x: i32, y: i32) -> Self {
        Self { x, y, layer: 0 }
    }

    /// Dot product.
    #[inline]
    pub fn dot(self, other: Self) -> i32 {
        self.x * other.x + self.y * other.y + self.layer * other.layer
    }

    /// Componentwise scale.
    #[inline]
    pub fn scale(self, k: i32) -> Self {
        Self::new(self.x * k, self.y * k, self.layer * k)
    }

    /// Is this the zero vector?
    #[inline]
    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }

    /// Is this one of the four planar unit directions?
    #[inline]
    pub fn is_cardinal(self) -> bool {
        self.layer == 0 && (self.x.abs() + self.y.abs()) == 1
    }

    /// Is this a unit step along any axis (planar or layer)?
    #[inline]
    pub fn is_unit(self) -> bool {
        self.x.abs() + self.y.abs() + self.layer.abs() == 1
    }

    /// Are the two directions perpendicular (and both non-zero)?
    #[inline]
    pub fn is_perpendicular(self, other: Self) -> bool {
        !self.is_zero() && !other.is_zero() && self.dot(other) == 0
    }

    /// Facing angle in quarter turns, clockwise on screen from "down".
    ///
    /// Down = 0, Left = 1, Up = 2, Right = 3. Zero vector maps to 0.
    pub fn quarter_turns(self) -> u8 {
        match (self.x.signum(), self.y.signum()) {
            (-1, _) => 1,
            (1, _) => 3,
            (_, -1) => 2,
            _ => 0,
        }
    }

    /// Movement lane for priority sorting: up, down, left, right.
    pub fn lane(self) -> u8 {
        if self.y < 0 {
            0
        } else if self.y > 0 {
            1
        } else if self.x < 0 {
            2
        } else {
            3
        }
    }
}

impl Add for Coord {
    type Output = Self;
    #[inline]
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.layer + other.layer)
    }
}

impl AddAssign for Coord {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for Coord {
    type Output = Self;
    #[inline]
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.layer - other.layer)
    }
}

impl Neg for Coord {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.layer)
    }
}

impl From<[i32; 3]> for Coord {
    fn from(v: [i32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Coord> for [i32; 3] {
    fn from(c: Coord) -> Self {
        [c.x, c.y, c.layer]
    }
}

impl fmt::Debug for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.layer)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// SHAPES
// =============================================================================

/// Offsets covered by an entity, relative to its anchor.
pub type Shape = Vec<Coord>;

/// Single-cell shape.
pub fn unit_shape() -> Shape {
    vec![Coord::ZERO]
}

/// Filled `w` x `h` rectangle anchored at its top-left cell.
pub fn rect_shape(w: i32, h: i32) -> Shape {
    let mut shape = Vec::with_capacity((w.max(0) * h.max(0)) as usize);
    for y in 0..h {
        for x in 0..w {
            shape.push(Coord::xy(x, y));
        }
    }
    shape
}

/// Cells covered by `shape` placed at `anchor`.
pub fn footprint(anchor: Coord, shape: &[Coord]) -> impl Iterator<Item = Coord> + '_ {
    shape.iter().map(move |offset| anchor + *offset)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let a = Coord::new(1, 2, 1);
        assert_eq!(a + Coord::RIGHT, Coord::new(2, 2, 1));
        assert_eq!(a - Coord::RIGHT, Coord::new(0, 2, 1));
        assert_eq!(-Coord::UP, Coord::DOWN);
        assert_eq!(a.dot(Coord::DOWN), 2);
        assert_eq!(Coord::RIGHT.scale(3), Coord::xy(3, 0));
    }

    #[test]
    fn test_cardinal_checks() {
        for dir in Coord::CARDINALS {
            assert!(dir.is_cardinal());
            assert!(dir.is_unit());
        }
        assert!(!Coord::FALL.is_cardinal());
        assert!(Coord::FALL.is_unit());
        assert!(!Coord::new(1, 1, 0).is_cardinal());
        assert!(Coord::UP.is_perpendicular(Coord::LEFT));
        assert!(!Coord::UP.is_perpendicular(Coord::DOWN));
        assert!(!Coord::UP.is_perpendicular(Coord::ZERO));
    }

    #[test]
    fn test_quarter_turns() {
        assert_eq!(Coord::DOWN.quarter_turns(), 0);
        assert_eq!(Coord::LEFT.quarter_turns(), 1);
        assert_eq!(Coord::UP.quarter_turns(), 2);
        assert_eq!(Coord::RIGHT.quarter_turns(), 3);
    }

    #[test]
    fn test_lane_order() {
        let lanes: Vec<u8> = Coord::CARDINALS.iter().map(|d| d.lane()).collect();
        assert_eq!(lanes, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_rect_footprint() {
        let shape = rect_shape(2, 2);
        assert_eq!(shape.len(), 4);
        let cells: Vec<Coord> = footprint(Coord::new(3, 4, 1), &shape).collect();
        assert!(cells.contains(&Coord::new(3, 4, 1)));
        assert!(cells.contains(&Coord::new(4, 5, 1)));
        assert!(!cells.contains(&Coord::new(5, 5, 1)));
    }

    #[test]
    fn test_serde_as_array() {
        let c = Coord::new(1, -2, 3);
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "[1,-2,3]");
        let back: Coord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
